//! Status orb client — best-effort notification of the ESP32 display.
//!
//! The orb shows which artist is "at work" and what it is doing. A dead
//! or unreachable orb must never slow down or abort generation, so every
//! failure here is logged at warn and swallowed.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Externally-signaled stage of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// LLM calls in flight (scene or commentary).
    Thinking,
    /// Image render in flight.
    Drawing,
    /// A new piece was just persisted; the orb firmware decays this back
    /// to Finished on its own after a short celebration.
    Done,
    /// Idle / just viewing.
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Thinking => write!(f, "THINKING"),
            Phase::Drawing => write!(f, "DRAWING"),
            Phase::Done => write!(f, "DONE"),
            Phase::Finished => write!(f, "FINISHED"),
        }
    }
}

#[derive(Serialize)]
struct StatePayload<'a> {
    artist_id: &'a str,
    state: String,
}

/// Fire-and-forget notifier for the orb's `/state` endpoint.
#[derive(Clone)]
pub struct OrbClient {
    url: Option<String>,
    http: reqwest::Client,
}

impl OrbClient {
    /// An empty URL disables notification entirely.
    pub fn new(url: &str) -> Self {
        let url = if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        };
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }

    /// Tell the orb which artist is in which phase. Never fails.
    pub async fn notify(&self, artist_id: &str, phase: Phase) {
        let Some(url) = &self.url else { return };
        let payload = StatePayload {
            artist_id,
            state: phase.to_string(),
        };
        // Small timeout so a dead orb never blocks generation.
        let send = self
            .http
            .post(url)
            .timeout(Duration::from_secs(2))
            .json(&payload)
            .send();
        match send.await {
            Ok(resp) if !resp.status().is_success() => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let head: String = body.chars().take(200).collect();
                tracing::warn!(%artist_id, %phase, %status, "orb returned non-200: {head}");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%artist_id, %phase, "failed to update orb state: {e}");
            }
        }
    }
}
