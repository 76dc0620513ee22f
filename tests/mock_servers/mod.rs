//! Mock servers for integration testing
//!
//! These simulate the LMS telnet CLI so the session can be exercised over a
//! real TCP socket without a media server.

pub mod lms_cli;

pub use lms_cli::{MockLmsCli, MockPlayer};
