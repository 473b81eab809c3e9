//! Stdout encoding: one JSON object per engine update.

use fip_engine::StateUpdate;
use fip_proto::model::AppState;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum OutputLine<'a> {
    State(&'a AppState),
    Error(String),
}

/// Encode one update as a newline-terminated JSON line.
pub fn encode(update: &StateUpdate) -> anyhow::Result<Vec<u8>> {
    let line = match update {
        StateUpdate::Snapshot(state) => OutputLine::State(state),
        StateUpdate::Error(e) => OutputLine::Error(e.to_string()),
    };
    let mut bytes = serde_json::to_vec(&line)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write every update until the engine closes the stream.
pub async fn write_updates<W>(mut updates: mpsc::Receiver<StateUpdate>, mut out: W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(update) = updates.recv().await {
        if let StateUpdate::Snapshot(state) = &update {
            debug!("[output] rev {}", state.rev);
        }
        out.write_all(&encode(&update)?).await?;
        out.flush().await?;
        written += 1;
    }
    info!("[output] engine finished after {} updates", written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fip_engine::EngineError;
    use serde_json::{json, Value};

    #[test]
    fn test_snapshot_line_shape() {
        let bytes = encode(&StateUpdate::Snapshot(AppState::default())).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));

        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            v,
            json!({ "state": { "rev": 0, "user": null, "channels": {}, "favorites": [] } })
        );
    }

    #[test]
    fn test_error_line_carries_message() {
        let err = EngineError::Identity("resolving user: 401".into());
        let v: Value = serde_json::from_slice(&encode(&StateUpdate::Error(err)).unwrap()).unwrap();
        assert_eq!(v, json!({ "error": "identity resolution failed: resolving user: 401" }));
    }

    #[tokio::test]
    async fn test_write_updates_until_close() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StateUpdate::Snapshot(AppState::default())).await.unwrap();
        tx.send(StateUpdate::Error(EngineError::Identity("x".into()))).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_updates(rx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"state":"#));
        assert!(lines[1].starts_with(r#"{"error":"#));
    }
}
