//! atelier: an autonomous gallery.
//!
//! A background curator task periodically picks an artist persona, asks a
//! local LLM for a scene and wall text, renders the scene with a Stable
//! Diffusion binary, and persists the finished piece. An axum front end
//! serves the gallery page and a read-only API; an ESP32 "orb" mirrors
//! the curator's current phase.

pub mod artist;
pub mod config;
pub mod curator;
pub mod error;
pub mod llm;
pub mod orb;
pub mod render;
pub mod store;
pub mod web;
