//! Durable piece store.
//!
//! The persisted form is a single JSON array rewritten in full on every
//! append — fine at gallery scale (one piece per half hour). Durability
//! contract: write the whole list to a temp file, then rename over the
//! real one, then update the in-memory list. A crash mid-append leaves
//! the previous file intact and the new piece invisible; readers never
//! see a torn write.
//!
//! Single-writer discipline: only the curator task appends. The axum
//! handlers read snapshots through the `RwLock`.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, Result};

/// One generated artwork plus its metadata. Append-only; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    /// Unix seconds at creation, bumped if needed so ids are strictly
    /// monotonic within the store.
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub artist_id: String,
    pub title: String,
    pub image_prompt: String,
    pub commentary: String,
    /// Path relative to the images dir: `<folder_prefix>/<id>.png`.
    pub image_filename: String,
}

pub struct PieceStore {
    path: PathBuf,
    pieces: RwLock<Vec<Piece>>,
}

impl PieceStore {
    /// Open the store, loading any previously persisted pieces.
    ///
    /// A missing or empty file is an empty gallery, not an error. A file
    /// that exists but does not parse is an error — silently discarding
    /// the collection would be worse than refusing to start.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                GalleryError::Config(format!("can't create {}: {e}", parent.display()))
            })?;
        }

        let mut pieces: Vec<Piece> = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                GalleryError::Config(format!("corrupt piece list {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(GalleryError::Config(format!(
                    "can't read {}: {e}",
                    path.display()
                )));
            }
        };
        // Insertion order is creation order; re-sort in case the file was
        // hand-edited.
        pieces.sort_by_key(|p| p.id);

        Ok(Self {
            path: path.to_path_buf(),
            pieces: RwLock::new(pieces),
        })
    }

    /// Next piece id for a cycle completing now: unix seconds, bumped past
    /// the previous id if two cycles land in the same second.
    pub fn next_id(&self, now: DateTime<Utc>) -> u64 {
        let ts = now.timestamp().max(0) as u64;
        let pieces = self.pieces.read().unwrap();
        match pieces.last() {
            Some(last) => ts.max(last.id + 1),
            None => ts,
        }
    }

    /// Durably append a piece: temp file, atomic rename, then publish to
    /// readers. On error the store (file and memory) is unchanged.
    pub async fn append(&self, piece: Piece) -> Result<()> {
        let updated = {
            let pieces = self.pieces.read().unwrap();
            let mut updated = pieces.clone();
            updated.push(piece.clone());
            updated
        };

        let json = serde_json::to_vec_pretty(&updated).map_err(|e| GalleryError::StoreWrite {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let write = async {
            tokio::fs::write(&tmp, &json).await?;
            tokio::fs::rename(&tmp, &self.path).await
        };
        write.await.map_err(|e| GalleryError::StoreWrite {
            path: self.path.clone(),
            source: e,
        })?;

        self.pieces.write().unwrap().push(piece);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.pieces.read().unwrap().len()
    }

    /// Piece by insertion index (0 = oldest).
    pub fn get(&self, index: usize) -> Result<Piece> {
        self.pieces
            .read()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or(GalleryError::NotFound(index))
    }

    /// Newest piece.
    pub fn latest(&self) -> Result<Piece> {
        let pieces = self.pieces.read().unwrap();
        pieces
            .last()
            .cloned()
            .ok_or(GalleryError::NotFound(pieces.len().saturating_sub(1)))
    }

    /// Full copy for the presentation layer.
    pub fn snapshot(&self) -> Vec<Piece> {
        self.pieces.read().unwrap().clone()
    }
}
