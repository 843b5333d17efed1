//! Data models for the photo backend.
//!
//! - `Post`: a feed entry as returned by the post resource
//! - `NewPost`, `PostUpdate`, `PostImage`: upload payloads
//! - `FeedItem`: a post together with its downloaded image

pub mod post;

pub use post::{FeedItem, NewPost, Post, PostImage, PostUpdate};
