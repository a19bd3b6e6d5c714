//! Artist registry — static personas loaded from YAML at startup.
//!
//! Each artist carries its own prompts, visual style prefix, and palette.
//! The registry is validated once and immutable afterwards; the curator
//! picks from it with a weighted random draw each cycle.

use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, Result};

/// One artist persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistProfile {
    /// Unique identifier, e.g. "pierre". Used as foreign key on pieces
    /// and in orb payloads.
    pub id: String,
    /// Display name for the gallery page.
    pub name: String,
    /// Subdirectory under the images dir; defaults to the id.
    #[serde(default)]
    pub folder_prefix: Option<String>,
    /// Relative selection weight. Zero means "never picked randomly".
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Named colors for the page and the orb firmware (passthrough).
    #[serde(default)]
    pub palette: HashMap<String, String>,
    /// System prompt for the TITLE/SCENE call.
    pub scene_system_prompt: String,
    /// System prompt for the gallery wall text call.
    pub commentary_system_prompt: String,
    /// Fixed style text prepended to every image prompt.
    pub sd_style_prefix: String,
}

fn default_weight() -> f64 {
    1.0
}

impl ArtistProfile {
    pub fn folder_prefix(&self) -> &str {
        self.folder_prefix.as_deref().unwrap_or(&self.id)
    }
}

/// How the curator picks an artist when none is requested explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Always the default artist.
    Manual,
    /// Weighted random draw (the normal mode).
    #[default]
    WeightedRandom,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SelectionConfig {
    #[serde(default)]
    mode: SelectionMode,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    artists: Vec<ArtistProfile>,
    #[serde(default)]
    selection: SelectionConfig,
}

/// Validated, immutable artist registry.
#[derive(Debug)]
pub struct Registry {
    artists: Vec<ArtistProfile>,
    index: HashMap<String, usize>,
    mode: SelectionMode,
    default_id: String,
}

impl Registry {
    /// Load and validate the registry from a YAML file.
    ///
    /// Fatal on: unreadable/unparseable file, no artists, duplicate ids,
    /// negative weights, or a configured default that names no artist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GalleryError::Config(format!("can't read {}: {e}", path.display()))
        })?;
        let file: RegistryFile = serde_yaml::from_str(&raw).map_err(|e| {
            GalleryError::Config(format!("bad registry {}: {e}", path.display()))
        })?;
        Self::from_parts(file.artists, file.selection)
    }

    fn from_parts(artists: Vec<ArtistProfile>, selection: SelectionConfig) -> Result<Self> {
        if artists.is_empty() {
            return Err(GalleryError::Config("no artists defined".into()));
        }

        let mut index = HashMap::new();
        for (i, artist) in artists.iter().enumerate() {
            if artist.weight < 0.0 || !artist.weight.is_finite() {
                return Err(GalleryError::Config(format!(
                    "artist {} has invalid weight {}",
                    artist.id, artist.weight
                )));
            }
            if index.insert(artist.id.clone(), i).is_some() {
                return Err(GalleryError::Config(format!(
                    "duplicate artist id {}",
                    artist.id
                )));
            }
        }

        // The effective default is selection.default or the first artist.
        let default_id = match selection.default {
            Some(id) => {
                if !index.contains_key(&id) {
                    return Err(GalleryError::Config(format!(
                        "default artist {id} is not in the registry"
                    )));
                }
                id
            }
            None => artists[0].id.clone(),
        };

        Ok(Self {
            artists,
            index,
            mode: selection.mode,
            default_id,
        })
    }

    pub fn get(&self, id: &str) -> Option<&ArtistProfile> {
        self.index.get(id).map(|&i| &self.artists[i])
    }

    pub fn default_artist(&self) -> &ArtistProfile {
        // Validated at load, always present.
        &self.artists[self.index[&self.default_id]]
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }

    /// Pick an artist for this cycle.
    ///
    /// Weighted random over artist weights; independent draws with no
    /// memory across calls. All-zero weights (or manual mode) fall back
    /// to the default artist.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &ArtistProfile {
        if self.mode == SelectionMode::Manual {
            return self.default_artist();
        }
        let weights: Vec<f64> = self.artists.iter().map(|a| a.weight).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => &self.artists[dist.sample(rng)],
            // All weights zero: WeightedIndex refuses, use the default.
            Err(_) => self.default_artist(),
        }
    }
}
