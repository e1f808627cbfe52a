//! social-gateway adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - One vendor adapter per platform (`facebook`, `instagram`, `linkedin`,
//!   `pinterest`, `tiktok`, `youtube`, `google`)
//! - `tokens`: SQLite and in-memory token stores
//! - `stub`: a recording stub adapter for tests

mod common;
mod token_memory;
mod token_sqlite;

pub mod facebook;
pub mod google;
pub mod instagram;
pub mod linkedin;
pub mod pinterest;
pub mod stub;
pub mod tiktok;
pub mod youtube;

pub use common::OAuthApp;

/// Re-exports for token stores
pub mod tokens {
    pub use crate::token_memory::InMemoryTokenStore;
    pub use crate::token_sqlite::SqliteTokenStore;
}

pub use facebook::FacebookAdapter;
pub use google::GoogleBusinessAdapter;
pub use instagram::{InstagramAdapter, InstagramApi};
pub use linkedin::LinkedInAdapter;
pub use pinterest::PinterestAdapter;
pub use stub::StubPlatform;
pub use tiktok::TikTokAdapter;
pub use youtube::YouTubeAdapter;
