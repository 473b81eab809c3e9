//! Per-channel history: enrichment, de-duplication, archiving.
//!
//! Each channel is driven by one task that owns its `ChannelHistory`.  Track
//! events are enriched concurrently; whichever enrichment completes first is
//! applied first, so de-duplication always compares against the history as it
//! was actually published.  Non-track events skip enrichment and apply on
//! arrival.

use fip_proto::model::{ChannelEvent, ChannelState, NowPlaying, Track};
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, FuturesUnordered};
use futures_util::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::CatalogMatcher;
use crate::composer::Update;
use crate::error::EngineError;

/// Live feed of one channel.  An `Err` item ends the channel.
pub type ChannelSource = BoxStream<'static, anyhow::Result<ChannelEvent>>;

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The previous event (if any) moved to `past_events`.
    Advanced,
    /// Same track pushed again; `now_playing` refreshed, nothing archived.
    Repeated,
}

#[derive(Debug, Clone)]
pub struct ChannelHistory {
    name: String,
    state: ChannelState,
    /// 0 = unbounded.
    history_limit: usize,
}

impl ChannelHistory {
    pub fn new(name: impl Into<String>, history_limit: usize) -> Self {
        Self {
            name: name.into(),
            state: ChannelState::default(),
            history_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Apply an already-enriched event.
    pub fn apply(&mut self, event: ChannelEvent) -> Transition {
        if let ChannelEvent::Track { track } = &event {
            if is_repeat(&self.state.now_playing, track) {
                self.state.now_playing = NowPlaying::Playing(event);
                return Transition::Repeated;
            }
        }

        let previous = std::mem::replace(&mut self.state.now_playing, NowPlaying::Playing(event));
        if let NowPlaying::Playing(prev) = previous {
            self.state.past_events.insert(0, prev);
            if self.history_limit > 0 {
                self.state.past_events.truncate(self.history_limit);
            }
        }
        Transition::Advanced
    }
}

/// Same item pushed again with a start time that is not newer.
///
/// Equal start times count as a repeat; tracks without start times never do.
fn is_repeat(current: &NowPlaying, incoming: &Track) -> bool {
    let Some(current) = current.track() else {
        return false;
    };
    match (current.start_time, incoming.start_time) {
        (Some(cur), Some(new)) => current.id == incoming.id && cur >= new,
        _ => false,
    }
}

/// Log label: the track display text plus its start time, when known.
fn describe(event: &ChannelEvent) -> String {
    let Some(track) = event.as_track() else {
        return "other event".to_string();
    };
    match track.started_at() {
        Some(at) => format!("{} @ {}", track.display(), at.format("%H:%M:%S")),
        None => track.display(),
    }
}

/// Drive one channel until its source ends, publishing every transition.
///
/// In-flight enrichments are drained after the source ends (or fails) so the
/// last announced track still lands in the final state.
pub async fn run_channel(
    mut history: ChannelHistory,
    mut source: ChannelSource,
    matcher: CatalogMatcher,
    updates: mpsc::Sender<Update>,
) {
    info!("[channel:{}] started", history.name());

    let mut pending: FuturesUnordered<BoxFuture<'static, Track>> = FuturesUnordered::new();
    let mut source_done = false;

    loop {
        let event = tokio::select! {
            next = source.next(), if !source_done => match next {
                Some(Ok(ChannelEvent::Track { track })) => {
                    debug!("[channel:{}] enriching {}", history.name(), track.id);
                    let m = matcher.clone();
                    pending.push(async move { m.enrich(track).await }.boxed());
                    continue;
                }
                Some(Ok(other)) => other,
                Some(Err(e)) => {
                    let err = EngineError::channel_source(history.name(), &e);
                    warn!("[channel:{}] {}", history.name(), err);
                    source_done = true;
                    if updates.send(Update::Error(err)).await.is_err() {
                        return;
                    }
                    continue;
                }
                None => {
                    source_done = true;
                    continue;
                }
            },
            Some(track) = pending.next(), if !pending.is_empty() => ChannelEvent::Track { track },
            else => break,
        };

        let label = describe(&event);
        let transition = history.apply(event);
        debug!(
            "[channel:{}] {:?} {}, {} archived",
            history.name(),
            transition,
            label,
            history.state().past_events.len()
        );

        let update = Update::Channel {
            name: history.name().to_string(),
            state: history.state().clone(),
        };
        if updates.send(update).await.is_err() {
            warn!("[channel:{}] composer gone, stopping", history.name());
            return;
        }
    }

    info!("[channel:{}] source ended", history.name());
}
