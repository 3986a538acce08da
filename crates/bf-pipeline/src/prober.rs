//! Chapter duration probing.

use std::sync::Arc;
use std::time::Duration;

use bf_av::Engine;
use bf_core::{ChapterSource, Error, Result};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Measures chapter durations through an [`Engine`].
#[derive(Clone)]
pub struct DurationProber {
    engine: Arc<dyn Engine>,
    concurrency: usize,
}

impl DurationProber {
    /// `concurrency` bounds how many probes run at once (minimum 1).
    pub fn new(engine: Arc<dyn Engine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    /// Duration of one chapter in whole milliseconds.
    ///
    /// # Errors
    ///
    /// [`Error::Probe`] naming the chapter's original file name when the file
    /// is missing, empty, or the engine cannot read it.
    pub async fn probe(&self, chapter: &ChapterSource) -> Result<u64> {
        let meta = tokio::fs::metadata(&chapter.source_path).await.map_err(|e| {
            Error::probe(&chapter.original_name, format!("cannot read file: {}", e.kind()))
        })?;
        if meta.len() == 0 {
            return Err(Error::probe(&chapter.original_name, "file is empty"));
        }

        let duration = self
            .engine
            .probe_duration(&chapter.source_path)
            .await
            .map_err(|e| {
                let source = chapter.source_path.to_string_lossy();
                let message =
                    probe_failure_message(e).replace(source.as_ref(), &chapter.original_name);
                Error::probe(&chapter.original_name, message)
            })?;

        let ms = duration_to_ms(duration);
        tracing::debug!(
            chapter = chapter.sequence_index,
            name = %chapter.original_name,
            duration_ms = ms,
            "Probed chapter"
        );
        Ok(ms)
    }

    /// Probe every chapter with bounded fan-out.
    ///
    /// Results are in the same order as `chapters`. The first failure drops
    /// every probe still in flight.
    pub async fn probe_all(&self, chapters: &[ChapterSource]) -> Result<Vec<u64>> {
        // The (lazy) probe futures are collected up front so no closure
        // ends up in the future's type; a closure taking `&ChapterSource`
        // trips rustc's higher-ranked `Send` inference in async callers.
        let probes: Vec<_> = chapters.iter().map(|c| self.probe(c)).collect();
        stream::iter(probes)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

impl std::fmt::Debug for DurationProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurationProber")
            .field("engine", &self.engine.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

fn probe_failure_message(err: Error) -> String {
    match err {
        Error::Tool { message, .. } => message,
        Error::Probe { message, .. } => message,
        other => other.to_string(),
    }
}

/// Round a duration to the nearest millisecond.
pub fn duration_to_ms(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1000.0).round() as u64
}
