//! TCP transport for the LMS CLI (telnet-style, one command per line)
//!
//! A background task owns the read half and forwards complete lines into a
//! bounded channel. That keeps `available()` a cheap, non-blocking check and
//! makes `read_line()` cancel safe, which the query deadline relies on.

use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapters::traits::LineTransport;
use crate::error::LmsError;

/// CLI telnet port
pub const DEFAULT_CLI_PORT: u16 = 9090;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Lines buffered between the socket and the session. When full, the reader
/// stops pulling from the socket until the session drains.
const LINE_BUFFER: usize = 256;

struct Connection {
    writer: OwnedWriteHalf,
    lines: mpsc::Receiver<String>,
    connected: Arc<AtomicBool>,
    reader_shutdown: CancellationToken,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_shutdown.cancel();
    }
}

/// Line transport over a tokio TcpStream
#[derive(Default)]
pub struct TcpLineTransport {
    conn: Option<Connection>,
}

impl TcpLineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_lost(&self) {
        if let Some(conn) = &self.conn {
            conn.connected.store(false, Ordering::SeqCst);
        }
    }
}

/// Turn one raw line into text: terminator removed, invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match String::from_utf8_lossy(raw) {
        Cow::Borrowed(line) => line.to_string(),
        Cow::Owned(line) => {
            let err = LmsError::MalformedResponse {
                reason: "invalid UTF-8",
                line: line.clone(),
            };
            warn!("lms: {}", err);
            line
        }
    }
}

/// Forward lines from the socket until EOF, error, or shutdown.
async fn read_lines(
    reader: OwnedReadHalf,
    tx: mpsc::Sender<String>,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        tokio::select! {
            _ = shutdown.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    debug!("lms: CLI connection closed by server");
                    break;
                }
                Ok(_) => {
                    if tx.send(decode_line(&buf)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("lms: CLI read error: {}", e);
                    break;
                }
            },
        }
    }
    connected.store(false, Ordering::SeqCst);
}

#[async_trait]
impl LineTransport for TcpLineTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), LmsError> {
        // Dropping the old connection stops its reader task
        self.conn = None;

        let addr = format!("{}:{}", host, port);
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| LmsError::ConnectTimeout {
                addr: addr.clone(),
                timeout: CONNECT_TIMEOUT,
            })?
            .map_err(|source| LmsError::Connect {
                addr: addr.clone(),
                source,
            })?;
        // Commands are tiny; don't let Nagle hold them back
        if let Err(e) = stream.set_nodelay(true) {
            debug!("lms: set_nodelay failed: {}", e);
        }

        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_shutdown = CancellationToken::new();

        tokio::spawn(read_lines(
            reader,
            tx,
            connected.clone(),
            reader_shutdown.clone(),
        ));

        self.conn = Some(Connection {
            writer,
            lines: rx,
            connected,
            reader_shutdown,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|c| c.connected.load(Ordering::SeqCst))
    }

    fn available(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.lines.is_empty())
    }

    async fn read_line(&mut self) -> Option<String> {
        self.conn.as_mut()?.lines.recv().await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), LmsError> {
        let conn = self.conn.as_mut().ok_or(LmsError::ConnectionLost)?;
        let result = async {
            conn.writer.write_all(line.as_bytes()).await?;
            conn.writer.write_all(b"\n").await?;
            conn.writer.flush().await
        }
        .await;

        if let Err(e) = result {
            self.mark_lost();
            return Err(e.into());
        }
        Ok(())
    }
}
