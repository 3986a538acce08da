//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, external tools, encoding and scratch space.
//! Every section defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub encode: EncodeConfig,
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_cover_bytes > self.server.max_upload_bytes {
            warnings.push("server.max_cover_bytes exceeds server.max_upload_bytes".into());
        }

        if self.encode.audio_codec.trim().is_empty() {
            warnings.push("encode.audio_codec is empty; ffmpeg will reject the job".into());
        }

        if !is_bitrate(&self.encode.audio_bitrate) {
            warnings.push(format!(
                "encode.audio_bitrate '{}' does not look like a bitrate (e.g. 64k, 128k)",
                self.encode.audio_bitrate
            ));
        }

        if self.encode.timeout_secs == 0 {
            warnings.push("encode.timeout_secs is 0; every encode will time out".into());
        }

        if self.encode.probe_concurrency == 0 {
            warnings.push("encode.probe_concurrency is 0; falling back to 1".into());
        }

        if let Some(ref root) = self.workspace.temp_root {
            if !root.is_dir() {
                warnings.push(format!(
                    "workspace.temp_root {} is not an existing directory",
                    root.display()
                ));
            }
        }

        for (name, path) in [
            ("ffmpeg_path", &self.tools.ffmpeg_path),
            ("ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} {} does not exist; PATH lookup will be used",
                        p.display()
                    ));
                }
            }
        }

        warnings
    }
}

fn is_bitrate(s: &str) -> bool {
    let digits = s.strip_suffix(['k', 'K', 'm', 'M']).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole multipart upload.
    pub max_upload_bytes: u64,
    /// Upper bound for the optional cover image.
    pub max_cover_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_upload_bytes: 2000 * 1024 * 1024,
            max_cover_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Paths to external tool binaries (overrides PATH lookup).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Encoding defaults for produced audiobooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Deadline for a single ffmpeg invocation.
    pub timeout_secs: u64,
    /// How many chapter files are probed concurrently.
    pub probe_concurrency: usize,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            timeout_secs: 6 * 60 * 60,
            probe_concurrency: 4,
        }
    }
}

/// Scratch-space settings for job and upload directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for scratch dirs; `None` uses the system temp dir.
    pub temp_root: Option<PathBuf>,
}
