//! Stdin demultiplexer: one JSON object per line, routed to the channel
//! feeds or the favorites command feed.
//!
//! ```text
//! {"channel": "fip", "event": {"kind": "track", "track": {"id": "..."}}}
//! {"favorite": {"type": "add", "track": {"id": "..."}}}
//! ```

use anyhow::Context;
use fip_engine::{ChannelSource, CommandSource};
use fip_proto::model::{ChannelEvent, FavoriteCommand};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const FEED_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Channel { channel: String, event: ChannelEvent },
    Favorite { favorite: FavoriteCommand },
}

/// Write side of every feed handed to the engine.  Dropping it ends them all.
pub struct Demux {
    channels: HashMap<String, mpsc::Sender<anyhow::Result<ChannelEvent>>>,
    commands: mpsc::Sender<FavoriteCommand>,
}

/// Create one feed per channel name plus the command feed.
pub fn feeds(names: &[String]) -> (Demux, Vec<(String, ChannelSource)>, CommandSource) {
    let mut senders = HashMap::new();
    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        senders.insert(name.clone(), tx);
        sources.push((name.clone(), receiver_stream(rx).boxed()));
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(FEED_BUFFER);
    let demux = Demux {
        channels: senders,
        commands: cmd_tx,
    };
    (demux, sources, receiver_stream(cmd_rx).boxed())
}

fn receiver_stream<T: Send + 'static>(
    rx: mpsc::Receiver<T>,
) -> impl futures_util::Stream<Item = T> + Send + 'static {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

impl Demux {
    /// Route one line.  Errors describe why the line was not delivered.
    pub async fn dispatch(&self, line: &str) -> anyhow::Result<()> {
        let parsed: InputLine = serde_json::from_str(line).context("malformed input line")?;
        match parsed {
            InputLine::Channel { channel, event } => {
                let tx = self
                    .channels
                    .get(&channel)
                    .with_context(|| format!("unknown channel {:?}", channel))?;
                tx.send(Ok(event))
                    .await
                    .map_err(|_| anyhow::anyhow!("channel {} no longer consumed", channel))
            }
            InputLine::Favorite { favorite } => self
                .commands
                .send(favorite)
                .await
                .map_err(|_| anyhow::anyhow!("favorites no longer consumed")),
        }
    }
}

/// Feed every line of `reader` through `demux` until EOF.  Bad lines are
/// logged and skipped; the feeds close when this returns.
pub async fn pump<R>(reader: R, demux: Demux) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut routed = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await.context("reading input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match demux.dispatch(line).await {
            Ok(()) => routed += 1,
            Err(e) => {
                skipped += 1;
                warn!("[input] skipping line: {:#}", e);
                debug!("[input] offending line: {}", line);
            }
        }
    }

    info!("[input] EOF after {} lines ({} skipped)", routed + skipped, skipped);
    Ok(())
}
