//! Twitter/X mention timeline.
//!
//! Provides the paginated mention feed and username lookup.

mod client;
mod types;

pub use client::{MentionFeed, TwitterClient};
pub use types::{Mention, Page, PageRequest, User};
