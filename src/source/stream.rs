//! Stream-based topic source.
//!
//! Reads newline-delimited JSON [`BusEvent`]s from an async byte stream
//! (a TCP connection or a capture file) and applies them to a [`BusHub`].

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BusEvent, BusHub, TopicSource};
use crate::data::TopicSnapshot;

/// How often a followed file is checked for new lines.
const FOLLOW_POLL: Duration = Duration::from_millis(100);

/// A topic source backed by a background reader task.
///
/// Published topics and errors are read from the hub the task feeds; the
/// task is aborted when the source is dropped.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use std::sync::Arc;
/// use topicwatch::{BusHub, HubOptions, StreamSource, TypeRegistry};
///
/// # tokio_test::block_on(async {
/// let hub = BusHub::new(Arc::new(TypeRegistry::new()), HubOptions::default(), "demo");
/// let data = b"{\"op\":\"advertise\",\"topic\":\"/a\",\"type\":\"std_msgs/Header\"}\n";
/// let source = StreamSource::spawn(Cursor::new(data.to_vec()), hub, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    hub: BusHub,
    description: String,
    task: JoinHandle<()>,
}

impl StreamSource {
    /// Spawn a background task that reads events from `reader` until EOF.
    pub fn spawn<R>(reader: R, hub: BusHub, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let feed = hub.clone();
        let task = tokio::spawn(async move {
            read_events(reader, &feed, false).await;
        });

        Self {
            hub,
            description: format!("stream: {}", description),
            task,
        }
    }

    /// Spawn a background task that tails a capture file, waiting for new
    /// lines at its end.
    pub fn follow_file(path: &Path, hub: BusHub) -> Self {
        let feed = hub.clone();
        let file_path = path.to_path_buf();
        let task = tokio::spawn(async move {
            match tokio::fs::File::open(&file_path).await {
                Ok(file) => read_events(file, &feed, true).await,
                Err(e) => {
                    warn!("Cannot open {}: {}", file_path.display(), e);
                    feed.set_error(Some(format!("Cannot open {}: {}", file_path.display(), e)));
                }
            }
        });

        Self {
            hub,
            description: format!("file: {}", path.display()),
            task,
        }
    }

    /// Create a source fed from a raw bytes channel, one event per message.
    ///
    /// This is useful when events come from another transport without an
    /// `AsyncRead`.
    pub fn from_bytes_channel(
        mut rx: mpsc::Receiver<Vec<u8>>,
        hub: BusHub,
        description: &str,
    ) -> Self {
        let feed = hub.clone();
        let task = tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match serde_json::from_slice::<BusEvent>(&bytes) {
                    Ok(event) => {
                        feed.set_error(None);
                        feed.apply(event);
                    }
                    Err(e) => feed.set_error(Some(format!("Parse error: {}", e))),
                }
            }
        });

        Self {
            hub,
            description: format!("stream: {}", description),
            task,
        }
    }

    pub fn hub(&self) -> &BusHub {
        &self.hub
    }

    /// True once the reader task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TopicSource for StreamSource {
    fn published_topics(&mut self) -> TopicSnapshot {
        self.hub.published_topics()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.hub.error()
    }
}

/// Apply every line of `reader` to `hub`. With `follow`, EOF means "wait
/// for more" instead of "closed". Lines that do not decode are reported and
/// skipped; only an I/O error ends the stream.
async fn read_events<R>(reader: R, hub: &BusHub, follow: bool)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                if follow {
                    tokio::time::sleep(FOLLOW_POLL).await;
                    continue;
                }
                if !line.is_empty() {
                    apply_line(hub, &line);
                }
                hub.set_error(Some("Connection closed".to_string()));
                debug!("Event stream closed");
                break;
            }
            Ok(_) => {
                // A followed file may end in the middle of a line
                if follow && line.last() != Some(&b'\n') {
                    continue;
                }
                apply_line(hub, &line);
                line.clear();
            }
            Err(e) => {
                warn!("Event stream read error: {}", e);
                hub.set_error(Some(format!("Read error: {}", e)));
                break;
            }
        }
    }
}

fn apply_line(hub: &BusHub, line: &[u8]) {
    let line = line.trim_ascii();
    if line.is_empty() {
        return;
    }
    match serde_json::from_slice::<BusEvent>(line) {
        Ok(event) => {
            hub.set_error(None);
            hub.apply(event);
        }
        Err(e) => {
            debug!("Skipping malformed event: {}", e);
            hub.set_error(Some(format!("Parse error: {}", e)));
        }
    }
}
