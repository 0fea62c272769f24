//! udev event source
//!
//! Wraps a `udevadm monitor --udev --environment` child process and exposes
//! its output as a channel of parsed [`Event`]s. udevadm prints one
//! `KEY=VALUE` attribute per line, with a blank line terminating each event
//! block; informational lines (headers, the `UDEV [...]` banner per event)
//! carry no `=` assignment and are ignored.
//!
//! The produced sequence is lazy, infinite and non-restartable: the channel
//! closes when the child's stdout ends, and failure to start the child is a
//! startup error, not a per-event error.

use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use uudev_core::Event;

/// Capacity of the event handoff channel. Kept at one so the reader task
/// stays in near-synchronous lockstep with the engine loop.
const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors starting the event source
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The event-producing child process could not be spawned
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The child was spawned without a capturable stdout
    #[error("{command} did not expose a stdout pipe")]
    NoStdout { command: String },
}

/// Handle to a running event-producing child process.
///
/// Dropping the handle kills the child; the event channel then closes once
/// the remaining output is drained.
pub struct UdevMonitor {
    _child: Child,
}

impl UdevMonitor {
    /// Spawn `udevadm monitor --udev --environment` and return the parsed
    /// event stream.
    pub fn spawn() -> MonitorResult<(Self, mpsc::Receiver<Event>)> {
        Self::spawn_with("udevadm", &["monitor", "--udev", "--environment"])
    }

    /// Spawn an arbitrary line-oriented event producer.
    ///
    /// Any process that writes `KEY=VALUE` lines grouped into blank-line
    /// separated blocks satisfies the contract; the default udevadm source
    /// is not special.
    pub fn spawn_with(program: &str, args: &[&str]) -> MonitorResult<(Self, mpsc::Receiver<Event>)> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| MonitorError::Spawn {
            command: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| MonitorError::NoStdout {
            command: program.to_string(),
        })?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            read_events(BufReader::new(stdout), tx).await;
        });
        debug!(command = program, "event source started");

        Ok((Self { _child: child }, rx))
    }
}

/// Parse blank-line separated `KEY=VALUE` blocks from `reader`, sending one
/// [`Event`] per block until the stream ends or the receiver is dropped.
///
/// A blank line always flushes the current event, even an empty one; lines
/// that are not attribute assignments are dropped without affecting the
/// fields around them.
async fn read_events<R>(reader: R, tx: mpsc::Sender<Event>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut entry = Event::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.is_empty() {
                    if tx.send(std::mem::take(&mut entry)).await.is_err() {
                        return;
                    }
                    continue;
                }
                if let Some((key, value)) = split_attribute(&line) {
                    entry.insert(key, value);
                }
            }
            Ok(None) => {
                debug!("event stream ended");
                return;
            }
            Err(e) => {
                warn!(error = %e, "error reading event stream");
                return;
            }
        }
    }
}

/// Split an `IDENTIFIER=VALUE` line into key and value.
///
/// Returns `None` for lines that are not attribute assignments, such as the
/// informational header udevadm prints at startup.
fn split_attribute(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(input: &'static str) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(read_events(input.as_bytes(), tx));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_split_attribute() {
        assert_eq!(split_attribute("ACTION=add"), Some(("ACTION", "add")));
        assert_eq!(
            split_attribute("ID_MODEL=USB=Keyboard"),
            Some(("ID_MODEL", "USB=Keyboard"))
        );
        assert_eq!(split_attribute("monitor will print events:"), None);
        assert_eq!(split_attribute("UDEV  [4507.4] add /devices (usb)"), None);
        assert_eq!(split_attribute("=nokey"), None);
    }

    #[tokio::test]
    async fn test_blocks_become_events() {
        let events = parse("A=1\nB=2\n\nC=3\n\n").await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get("A"), Some("1"));
        assert_eq!(events[0].get("B"), Some("2"));
        assert_eq!(events[0].len(), 2);
        assert_eq!(events[1].get("C"), Some("3"));
        assert_eq!(events[1].len(), 1);
    }

    #[tokio::test]
    async fn test_non_attribute_lines_are_dropped() {
        let input = "monitor will print the received events for:\nUDEV - the event which udev sends out\n\nACTION=add\nUDEV  [4507.4] add /devices (usb)\nSUBSYSTEM=usb\n\n";
        let events = parse(input).await;

        // The header block flushes as an empty event at its blank line.
        assert_eq!(events.len(), 2);
        assert!(events[0].is_empty());
        assert_eq!(events[1].get("ACTION"), Some("add"));
        assert_eq!(events[1].get("SUBSYSTEM"), Some("usb"));
        assert_eq!(events[1].len(), 2);
    }

    #[tokio::test]
    async fn test_unterminated_block_is_not_flushed() {
        // No trailing blank line: the final partial block is discarded when
        // the stream ends, matching the blank-line-flush contract.
        let events = parse("A=1\n\nB=2\n").await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("A"), Some("1"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let result = UdevMonitor::spawn_with("uudev-no-such-binary", &[]);
        assert!(matches!(result, Err(MonitorError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_spawn_with_real_producer() {
        let (_monitor, mut rx) =
            UdevMonitor::spawn_with("printf", &["ACTION=add\\nSUBSYSTEM=usb\\n\\nACTION=remove\\n\\n"])
                .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.get("ACTION"), Some("add"));
        assert_eq!(first.get("SUBSYSTEM"), Some("usb"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.get("ACTION"), Some("remove"));

        // Stream ends when the producer exits.
        assert!(rx.recv().await.is_none());
    }
}
