use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bus::SharedBus;
use crate::error::LmsError;

// =============================================================================
// LineTransport - connected byte stream carrying CLI lines
// =============================================================================

/// Line-oriented connection to the LMS CLI.
///
/// Implementations own the socket; the session only ever sees whole lines
/// with the terminator removed.
#[async_trait]
pub trait LineTransport: Send {
    /// Open (or re-open) the connection.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), LmsError>;

    /// Whether the peer is still there. Goes false on EOF or read error.
    fn is_connected(&self) -> bool;

    /// Non-blocking: is at least one complete line already buffered?
    fn available(&self) -> bool;

    /// Wait for the next line. `None` once the stream has ended.
    ///
    /// Must be cancel safe: callers race it against a deadline.
    async fn read_line(&mut self) -> Option<String>;

    /// Send `line` followed by a newline.
    async fn write_line(&mut self, line: &str) -> Result<(), LmsError>;
}

// =============================================================================
// AdapterLogic - what AdapterHandle runs
// =============================================================================

/// Context passed to adapter run loop
pub struct AdapterContext {
    pub bus: SharedBus,
    pub shutdown: CancellationToken,
}

/// Core adapter logic - implement this, AdapterHandle handles lifecycle
#[async_trait]
pub trait AdapterLogic: Send + Sync + 'static {
    /// Prefix used in log lines and AdapterStopped events (e.g., "lms")
    fn prefix(&self) -> &'static str;

    /// Optional one-time setup before each run attempt
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Main loop. `Ok` means clean exit, `Err` asks the handle to retry.
    async fn run(&self, ctx: AdapterContext) -> Result<()>;
}
