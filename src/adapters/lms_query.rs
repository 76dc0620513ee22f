//! Request/response exchange on the LMS CLI
//!
//! The CLI answers a command by echoing it back with the results appended, but
//! push notifications for subscribed players can arrive in between. We
//! therefore read lines until one matches what we expect or the deadline hits.

use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::adapters::lms_players::shorten;
use crate::adapters::traits::LineTransport;
use crate::error::LmsError;

/// Default time to wait for a matching reply
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Responses are shortened to this many chars in the debug log
const LOG_RESPONSE_CHARS: usize = 60;

/// Which reply line a query waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect<'a> {
    /// The first line received
    Any,
    /// A line starting with the text (LMS echoes the command first)
    Prefix(&'a str),
    /// A line containing the text anywhere
    Contains(&'a str),
}

impl Expect<'_> {
    fn matches(&self, line: &str) -> bool {
        match self {
            Expect::Any => true,
            Expect::Prefix(prefix) => line.starts_with(prefix),
            Expect::Contains(needle) => line.contains(needle),
        }
    }
}

/// Send `command` and return the first reply line `expect` accepts, trimmed.
///
/// Returns an empty string on timeout, write failure or end of stream; each
/// is logged and none is retried. Lines that do not match are discarded.
pub async fn query<T>(
    transport: &mut T,
    command: &str,
    expect: Expect<'_>,
    timeout: Duration,
) -> String
where
    T: LineTransport + ?Sized,
{
    debug!("lms: query [{}]", command);

    if let Err(e) = transport.write_line(command).await {
        warn!("lms: sending [{}] failed: {}", command, e);
        return String::new();
    }

    let deadline = Instant::now() + timeout;
    loop {
        match timeout_at(deadline, transport.read_line()).await {
            Ok(Some(line)) => {
                let line = line.trim();
                if expect.matches(line) {
                    debug!(
                        "lms: resp  [{}] ({})",
                        shorten(line, LOG_RESPONSE_CHARS),
                        line.len()
                    );
                    return line.to_string();
                }
            }
            Ok(None) => {
                warn!("lms: no response to [{}]: {}", command, LmsError::ConnectionLost);
                return String::new();
            }
            Err(_) => {
                let err = LmsError::QueryTimeout {
                    command: command.to_string(),
                    timeout,
                };
                warn!("lms: {}", err);
                return String::new();
            }
        }
    }
}
