//! Generation curator — the background pipeline that makes new pieces.
//!
//! One cycle: pick an artist, ask the LLM for a titled scene, ask it for
//! gallery wall text, render the image, persist the piece, tell the orb.
//! Exactly one cycle is ever in flight; the next one starts a fixed
//! interval after the previous one ends, success or failure alike.
//!
//! Any failure in generation, rendering, or persistence aborts the cycle,
//! discards its partial outputs, and parks the curator back at idle until
//! the next tick. Nothing partial ever reaches the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::artist::{ArtistProfile, Registry};
use crate::error::{GalleryError, Result};
use crate::llm::LlmClient;
use crate::orb::{OrbClient, Phase};
use crate::render::Renderer;
use crate::store::{Piece, PieceStore};

const SCENE_USER_PROMPT: &str = "Invent one new artwork now. Follow the format exactly.";
const SCENE_MAX_TOKENS: u32 = 200;
const COMMENTARY_MAX_TOKENS: u32 = 260;

/// Where the curator currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Selecting,
    DesigningScene,
    WritingCommentary,
    Rendering,
    Persisting,
    NotifyingDone,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Selecting => write!(f, "selecting"),
            Stage::DesigningScene => write!(f, "designing_scene"),
            Stage::WritingCommentary => write!(f, "writing_commentary"),
            Stage::Rendering => write!(f, "rendering"),
            Stage::Persisting => write!(f, "persisting"),
            Stage::NotifyingDone => write!(f, "notifying_done"),
        }
    }
}

/// The background generation pipeline.
pub struct Curator {
    registry: Arc<Registry>,
    llm: LlmClient,
    renderer: Renderer,
    orb: OrbClient,
    store: Arc<PieceStore>,
    images_dir: PathBuf,
    interval: Duration,
    startup_delay: Duration,
    stage: Arc<Mutex<Stage>>,
}

impl Curator {
    pub fn new(
        registry: Arc<Registry>,
        llm: LlmClient,
        renderer: Renderer,
        orb: OrbClient,
        store: Arc<PieceStore>,
        images_dir: PathBuf,
        interval: Duration,
        startup_delay: Duration,
    ) -> Self {
        Self {
            registry,
            llm,
            renderer,
            orb,
            store,
            images_dir,
            interval,
            startup_delay,
            stage: Arc::new(Mutex::new(Stage::Idle)),
        }
    }

    /// Shared handle for the status endpoint.
    pub fn stage_handle(&self) -> Arc<Mutex<Stage>> {
        self.stage.clone()
    }

    /// Run forever. Spawn this on its own task; it never returns.
    pub async fn run(self: Arc<Self>) {
        // Let llama-server and the rest of the box come up first.
        tokio::time::sleep(self.startup_delay).await;
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One scheduled cycle, with failure handling and cleanup.
    pub async fn tick(&self) {
        *self.stage.lock().await = Stage::Selecting;
        let artist = {
            let mut rng = rand::thread_rng();
            self.registry.choose(&mut rng).clone()
        };

        tracing::info!(artist = %artist.id, "starting generation cycle");
        match self.run_cycle(&artist).await {
            Ok(piece) => {
                tracing::info!(artist = %artist.id, id = piece.id, title = %piece.title, "new piece generated");
            }
            Err(GalleryError::StoreWrite { path, source }) => {
                // The render succeeded; its image file is now orphaned on
                // disk. Log this distinctly from a generation failure.
                tracing::error!(
                    artist = %artist.id,
                    path = %path.display(),
                    "piece lost: store write failed after successful render \
                     (image file may be orphaned): {source}"
                );
                self.orb.notify(&artist.id, Phase::Finished).await;
            }
            Err(e) => {
                tracing::error!(artist = %artist.id, "generation cycle failed: {e}");
                // Make sure the orb doesn't stay stuck mid-phase.
                self.orb.notify(&artist.id, Phase::Finished).await;
            }
        }
        *self.stage.lock().await = Stage::Idle;
    }

    /// The pipeline proper. Strictly sequential; first error wins.
    async fn run_cycle(&self, artist: &ArtistProfile) -> Result<Piece> {
        // Scene design and commentary are both "thinking" to the orb.
        self.orb.notify(&artist.id, Phase::Thinking).await;

        *self.stage.lock().await = Stage::DesigningScene;
        let raw_scene = self
            .llm
            .complete(&artist.scene_system_prompt, SCENE_USER_PROMPT, SCENE_MAX_TOKENS)
            .await?;
        let (title, scene) = match parse_scene(&raw_scene) {
            (title, Some(scene)) => (title, scene),
            (title, None) => {
                tracing::warn!(artist = %artist.id, "could not parse SCENE from output; using raw text");
                (title, raw_scene.trim().to_string())
            }
        };
        let image_prompt = format!("{} {}", artist.sd_style_prefix.trim(), scene);

        *self.stage.lock().await = Stage::WritingCommentary;
        let commentary_user = format!(
            "TITLE: {title}\nSCENE: {scene}\n\n\
             Write the gallery wall text / artist note for this piece. \
             Write in first person as the artist. Remember: \
             exactly TWO paragraphs, each 4-7 sentences, separated by a blank line. \
             Do not include labels or restate these instructions."
        );
        let commentary = self
            .llm
            .complete(
                &artist.commentary_system_prompt,
                &commentary_user,
                COMMENTARY_MAX_TOKENS,
            )
            .await?;

        *self.stage.lock().await = Stage::Rendering;
        self.orb.notify(&artist.id, Phase::Drawing).await;

        let created_at = Utc::now();
        let id = self.store.next_id(created_at);
        let folder = artist.folder_prefix();
        let image_filename = format!("{folder}/{id}.png");
        let out_path = self.images_dir.join(folder).join(format!("{id}.png"));
        self.renderer.render(&image_prompt, &out_path).await?;

        *self.stage.lock().await = Stage::Persisting;
        let piece = Piece {
            id,
            created_at,
            artist_id: artist.id.clone(),
            title,
            image_prompt,
            commentary,
            image_filename,
        };
        self.store.append(piece.clone()).await?;

        *self.stage.lock().await = Stage::NotifyingDone;
        // Short celebration; the orb falls back to FINISHED by itself.
        self.orb.notify(&artist.id, Phase::Done).await;

        Ok(piece)
    }
}

/// Parse the scene call's `TITLE:` / `SCENE:` lines (case-insensitive).
///
/// Returns the title (or "UNTITLED") and the scene if one was found.
fn parse_scene(raw: &str) -> (String, Option<String>) {
    let mut title = "UNTITLED".to_string();
    let mut scene = None;

    for line in raw.lines() {
        let line = line.trim();
        if let Some(value) = strip_label(line, "TITLE:") {
            if !value.is_empty() {
                title = value.to_string();
            }
        } else if let Some(value) = strip_label(line, "SCENE:")
            && !value.is_empty()
        {
            scene = Some(value.to_string());
        }
    }

    (title, scene)
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}
