use crate::{
    config::Config,
    feed::{ChannelLog, ContentStore, FeedPubSub, PostStore},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: PostStore,
    pub log: Arc<dyn ChannelLog>,
    pub pubsub: Arc<dyn FeedPubSub>,
    pub content: Arc<dyn ContentStore>,
}
