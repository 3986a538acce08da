//! Muxing orchestration: turn a request plus its metadata document into one
//! engine invocation and run it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bf_av::{Engine, EngineInputPlan, EngineInvocation, OutputSpec};
use bf_core::{output_file_name, AudiobookRequest, Result};

use crate::timeline::METADATA_FILE_NAME;

/// Drives a single mux run per job.
#[derive(Clone)]
pub struct MuxOrchestrator {
    engine: Arc<dyn Engine>,
    output: OutputSpec,
}

impl MuxOrchestrator {
    pub fn new(engine: Arc<dyn Engine>, output: OutputSpec) -> Self {
        Self { engine, output }
    }

    /// Stage the cover and metadata document in `working_dir`, build the
    /// invocation, and run it.
    ///
    /// Returns the path of the produced container inside `working_dir`.
    pub async fn mux(
        &self,
        request: &AudiobookRequest,
        metadata_document: &str,
        working_dir: &Path,
    ) -> Result<PathBuf> {
        let invocation = self.prepare(request, metadata_document, working_dir).await?;

        tracing::info!(
            engine = self.engine.name(),
            chapters = invocation.plan().audio_count(),
            cover = invocation.plan().cover_index().is_some(),
            "Starting audiobook encode"
        );
        self.engine.mux(&invocation).await?;

        Ok(invocation.output_path().to_path_buf())
    }

    /// Write the intermediate inputs and build the invocation without
    /// running it.
    pub async fn prepare(
        &self,
        request: &AudiobookRequest,
        metadata_document: &str,
        working_dir: &Path,
    ) -> Result<EngineInvocation> {
        let cover = match &request.cover_art_path {
            Some(src) => Some(stage_cover(src, working_dir).await?),
            None => None,
        };

        let metadata_path = working_dir.join(METADATA_FILE_NAME);
        tokio::fs::write(&metadata_path, metadata_document).await?;
        tracing::debug!("Metadata file created at {}", metadata_path.display());

        let plan = EngineInputPlan::new(
            request.chapters.iter().map(|c| c.source_path.clone()),
            cover,
            metadata_path,
        );
        let output_path = working_dir.join(output_file_name(&request.book_title));

        Ok(EngineInvocation::new(plan, self.output.clone(), output_path))
    }
}

impl std::fmt::Debug for MuxOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxOrchestrator")
            .field("engine", &self.engine.name())
            .field("output", &self.output)
            .finish()
    }
}

/// Copy the cover into the working dir as `cover<ext>`.
async fn stage_cover(src: &Path, working_dir: &Path) -> Result<PathBuf> {
    let name = match src.extension() {
        Some(ext) => format!("cover.{}", ext.to_string_lossy().to_ascii_lowercase()),
        None => "cover".to_string(),
    };
    let dest = working_dir.join(name);
    tokio::fs::copy(src, &dest).await?;
    tracing::debug!("Cover art staged at {}", dest.display());
    Ok(dest)
}
