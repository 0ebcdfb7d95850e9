pub mod client;
pub mod multibase;

pub use client::{AddResponse, IpfsClient, IpfsError};
