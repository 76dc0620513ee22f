//! Album Art Follower
//!
//! Watches the players of a Logitech Media Server through its CLI and decides
//! which one should drive a cover-art display.
//!
//! This library provides:
//! - A line-based LMS CLI session with player tracking and push subscriptions
//! - A sticky "current player" selection evaluated once per tick
//! - A reconnecting runner that publishes state and artwork events on a bus

pub mod adapters;
pub mod bus;
pub mod config;
pub mod error;

pub use adapters::lms::{LmsSession, SessionConfig, TickOutcome};
pub use bus::PlaybackState;
pub use error::LmsError;
