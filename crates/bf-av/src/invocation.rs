//! Immutable description of a single mux run.
//!
//! Input indices are positional: ffmpeg numbers inputs in the order they are
//! registered, and the concat filter and every `-map` directive refer to those
//! numbers. [`EngineInputPlan`] is the only way to build the input list and it
//! always registers audio chapters first (`0..n`), then the optional cover
//! (`n`), then the metadata document (last).

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Label of the concatenated audio stream produced by the filter graph.
pub const CONCAT_LABEL: &str = "a_out";

/// What an engine input is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    Audio,
    Cover,
    MetadataDoc,
}

/// One registered engine input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInput {
    pub index: usize,
    pub role: InputRole,
    pub path: PathBuf,
}

/// Ordered engine inputs with fixed indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInputPlan {
    inputs: Vec<EngineInput>,
    audio_count: usize,
    cover_index: Option<usize>,
    metadata_index: usize,
}

impl EngineInputPlan {
    /// Register audio chapters (in iteration order), then the optional cover,
    /// then the metadata document.
    pub fn new(
        audio: impl IntoIterator<Item = PathBuf>,
        cover: Option<PathBuf>,
        metadata: PathBuf,
    ) -> Self {
        let mut inputs: Vec<EngineInput> = audio
            .into_iter()
            .enumerate()
            .map(|(index, path)| EngineInput {
                index,
                role: InputRole::Audio,
                path,
            })
            .collect();
        let audio_count = inputs.len();

        let cover_index = cover.map(|path| {
            let index = inputs.len();
            inputs.push(EngineInput {
                index,
                role: InputRole::Cover,
                path,
            });
            index
        });

        let metadata_index = inputs.len();
        inputs.push(EngineInput {
            index: metadata_index,
            role: InputRole::MetadataDoc,
            path: metadata,
        });

        Self {
            inputs,
            audio_count,
            cover_index,
            metadata_index,
        }
    }

    pub fn inputs(&self) -> &[EngineInput] {
        &self.inputs
    }

    pub fn audio_count(&self) -> usize {
        self.audio_count
    }

    pub fn cover_index(&self) -> Option<usize> {
        self.cover_index
    }

    pub fn metadata_index(&self) -> usize {
        self.metadata_index
    }
}

/// Build the filter that concatenates the first `n` inputs' audio streams in
/// index order into [`CONCAT_LABEL`].
pub fn concat_filter(n: usize) -> String {
    let mut filter: String = (0..n).map(|i| format!("[{i}:a]")).collect();
    filter.push_str(&format!("concat=n={n}:v=0:a=1[{CONCAT_LABEL}]"));
    filter
}

/// Audio encoding settings for the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::from(&bf_core::config::EncodeConfig::default())
    }
}

impl From<&bf_core::config::EncodeConfig> for OutputSpec {
    fn from(cfg: &bf_core::config::EncodeConfig) -> Self {
        Self {
            audio_codec: cfg.audio_codec.clone(),
            audio_bitrate: cfg.audio_bitrate.clone(),
        }
    }
}

/// Everything the engine needs for one mux run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInvocation {
    plan: EngineInputPlan,
    filter_complex: String,
    output: OutputSpec,
    output_path: PathBuf,
}

impl EngineInvocation {
    pub fn new(plan: EngineInputPlan, output: OutputSpec, output_path: PathBuf) -> Self {
        let filter_complex = concat_filter(plan.audio_count());
        Self {
            plan,
            filter_complex,
            output,
            output_path,
        }
    }

    pub fn plan(&self) -> &EngineInputPlan {
        &self.plan
    }

    pub fn filter_complex(&self) -> &str {
        &self.filter_complex
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Every filesystem path that appears in the invocation.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.plan
            .inputs()
            .iter()
            .map(|i| i.path.as_path())
            .chain(std::iter::once(self.output_path.as_path()))
    }

    /// Render the ffmpeg argument vector.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        for input in self.plan.inputs() {
            if input.role == InputRole::MetadataDoc {
                args.extend(["-f".into(), "ffmetadata".into()]);
            }
            args.push("-i".into());
            args.push(input.path.to_string_lossy().into_owned());
        }

        args.extend([
            "-filter_complex".into(),
            self.filter_complex.clone(),
            "-map".into(),
            format!("[{CONCAT_LABEL}]"),
            "-c:a".into(),
            self.output.audio_codec.clone(),
            "-b:a".into(),
            self.output.audio_bitrate.clone(),
        ]);

        if let Some(cover) = self.plan.cover_index() {
            args.extend([
                "-map".into(),
                format!("{cover}:v?"),
                "-c:v".into(),
                "copy".into(),
                "-disposition:v".into(),
                "attached_pic".into(),
            ]);
        }

        let meta = self.plan.metadata_index().to_string();
        args.extend([
            "-map_metadata".into(),
            meta.clone(),
            "-map_chapters".into(),
            meta,
        ]);

        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}
