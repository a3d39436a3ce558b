//! API Routes
//!
//! Route handlers organized by functionality.

pub mod chat;
pub mod health;
pub mod matchmaking;
pub mod profile;
pub mod reports;
pub mod stats;
pub mod users;
