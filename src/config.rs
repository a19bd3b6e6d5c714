//! Service configuration.
//!
//! Everything is a flag with an env fallback so the service can run from a
//! systemd unit with no wrapper script.

use std::path::PathBuf;

use clap::Parser;

/// Autonomous gallery service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "atelier", about = "Autonomous gallery service")]
pub struct GalleryConfig {
    /// HTTP listen address for the gallery page and read API
    #[arg(long, env = "ATELIER_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// Artist registry file (YAML)
    #[arg(long, env = "ATELIER_ARTISTS", default_value = "artists.yaml")]
    pub artists_path: PathBuf,

    /// Data directory (pieces.json and generated images live here)
    #[arg(long, env = "ATELIER_DATA", default_value = "data")]
    pub data_dir: PathBuf,

    /// Chat-completions endpoint (llama-server, OpenAI-compatible)
    #[arg(
        long,
        env = "ATELIER_LLM_URL",
        default_value = "http://127.0.0.1:8080/v1/chat/completions"
    )]
    pub llm_url: String,

    /// Timeout for one completion request, in seconds
    #[arg(long, env = "ATELIER_LLM_TIMEOUT", default_value_t = 600)]
    pub llm_timeout_secs: u64,

    /// Stable Diffusion binary (OnnxStream sd)
    #[arg(long, env = "ATELIER_SD_BIN", default_value = "sd")]
    pub sd_bin: PathBuf,

    /// Models directory passed to the SD binary
    #[arg(long, env = "ATELIER_SD_MODELS", default_value = "onnx_models")]
    pub sd_models_dir: PathBuf,

    /// Diffusion steps
    #[arg(long, env = "ATELIER_SD_STEPS", default_value_t = 3)]
    pub sd_steps: u32,

    /// Output image width and height (square)
    #[arg(long, env = "ATELIER_IMAGE_SIZE", default_value_t = 512)]
    pub image_size: u32,

    /// Timeout for one render, in seconds
    #[arg(long, env = "ATELIER_SD_TIMEOUT", default_value_t = 1800)]
    pub sd_timeout_secs: u64,

    /// Status orb state endpoint; empty disables notification
    #[arg(long, env = "ATELIER_ORB_URL", default_value = "http://192.168.1.216/state")]
    pub orb_url: String,

    /// Seconds between generation cycles, measured from cycle end
    #[arg(long, env = "ATELIER_INTERVAL", default_value_t = 30 * 60)]
    pub interval_secs: u64,

    /// Startup delay before the first cycle, so the rest of the box can boot
    #[arg(long, env = "ATELIER_STARTUP_DELAY", default_value_t = 5)]
    pub startup_delay_secs: u64,
}

impl GalleryConfig {
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    pub fn pieces_path(&self) -> PathBuf {
        self.data_dir.join("pieces.json")
    }
}
