pub mod content;
pub mod log;
pub mod pubsub;
pub mod session;
pub mod store;
pub mod transport;

pub use content::{ContentStore, IpfsContentStore, StoredContent};
pub use log::{cid_from_entry_name, entry_name, ChannelLog, IpfsChannelLog};
pub use pubsub::{FeedPubSub, IpfsFeedPubSub};
pub use session::FeedSession;
pub use store::{ObserverId, PostStore};
