//! ffmpeg/ffprobe-backed [`Engine`] implementation.
//!
//! Probing shells out to `ffprobe -v error -print_format json -show_format`
//! and reads `format.duration`. Muxing renders an [`EngineInvocation`] into an
//! ffmpeg argument vector and runs it under a deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::command::ToolCommand;
use crate::engine::Engine;
use crate::invocation::EngineInvocation;
use crate::tools::ToolRegistry;

/// Deadline for a single ffprobe run.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// How many trailing stderr lines are kept as encode diagnostics.
const DIAGNOSTIC_LINES: usize = 20;

/// An engine backed by the `ffmpeg` and `ffprobe` CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    mux_timeout: Duration,
}

impl FfmpegEngine {
    /// Create an engine from explicit binary paths.
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf, mux_timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            mux_timeout,
        }
    }

    /// Create an engine from discovered tools.
    ///
    /// # Errors
    ///
    /// Returns [`bf_core::Error::Tool`] if either ffmpeg or ffprobe is missing.
    pub fn from_registry(
        tools: &ToolRegistry,
        encode: &bf_core::config::EncodeConfig,
    ) -> bf_core::Result<Self> {
        Ok(Self::new(
            tools.require("ffmpeg")?.to_path_buf(),
            tools.require("ffprobe")?.to_path_buf(),
            Duration::from_secs(encode.timeout_secs),
        ))
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe_duration(&self, path: &Path) -> bf_core::Result<Duration> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "error", "-print_format", "json", "-show_format"]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.timeout(PROBE_TIMEOUT);

        let output = cmd.execute_checked().await?;
        parse_probe_duration(&output.stdout)
    }

    async fn mux(&self, invocation: &EngineInvocation) -> bf_core::Result<()> {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(invocation.to_args());
        cmd.timeout(self.mux_timeout);

        tracing::info!(
            inputs = invocation.plan().inputs().len(),
            filter = invocation.filter_complex(),
            "Spawning ffmpeg"
        );

        let output = cmd.execute().await.map_err(|e| match e {
            bf_core::Error::Tool { message, .. } => {
                bf_core::Error::encode(format!("ffmpeg {message}"), None)
            }
            other => other,
        })?;

        if !output.success() {
            tracing::error!("ffmpeg stderr:\n{}", output.stderr.trim_end());
            return Err(bf_core::Error::encode(
                format!("ffmpeg exited with {}", output.status),
                Some(summarize_diagnostics(&output.stderr, invocation.paths())),
            ));
        }

        if !invocation.output_path().is_file() {
            return Err(bf_core::Error::encode(
                "ffmpeg reported success but produced no output file",
                None,
            ));
        }

        tracing::info!("ffmpeg conversion finished successfully");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

fn parse_probe_duration(json: &str) -> bf_core::Result<Duration> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| bf_core::Error::tool("ffprobe", format!("JSON parse error: {e}")))?;

    let Some(raw) = probe.format.duration else {
        return Ok(Duration::ZERO);
    };

    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| bf_core::Error::tool("ffprobe", format!("unparseable duration '{raw}'")))?;

    Duration::try_from_secs_f64(secs)
        .map_err(|_| bf_core::Error::tool("ffprobe", format!("invalid duration '{raw}'")))
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Keep the tail of ffmpeg's stderr and replace every host path with its bare
/// file name (directories with `<workdir>`).
fn summarize_diagnostics<'a>(stderr: &str, paths: impl Iterator<Item = &'a Path>) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    let mut text = lines[start..].join("\n");

    let mut replacements: Vec<(String, String)> = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        replacements.push((path.to_string_lossy().into_owned(), name));
        if let Some(parent) = path.parent().filter(|p| p.components().count() > 1) {
            replacements.push((parent.to_string_lossy().into_owned(), "<workdir>".into()));
        }
    }
    // Longest first so a full path is replaced before its directory.
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    replacements.dedup();

    for (from, to) in replacements {
        if !from.is_empty() {
            text = text.replace(&from, &to);
        }
    }
    text
}
