pub mod feed;
pub mod media;
pub mod posts;
