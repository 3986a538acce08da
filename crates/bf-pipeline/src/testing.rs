//! Test doubles shared by the unit tests in this crate.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bf_av::{Engine, EngineInvocation};
use bf_core::ChapterSource;

/// Engine whose probe reads the chapter file as a millisecond count and whose
/// mux writes a small placeholder container.
#[derive(Default)]
pub struct MockEngine {
    pub fail_mux: bool,
    pub invocations: Mutex<Vec<EngineInvocation>>,
}

impl MockEngine {
    pub fn failing() -> Self {
        Self {
            fail_mux: true,
            ..Default::default()
        }
    }

    pub fn last_invocation(&self) -> Option<EngineInvocation> {
        self.invocations.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn probe_duration(&self, path: &Path) -> bf_core::Result<Duration> {
        let text = tokio::fs::read_to_string(path).await?;
        text.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                bf_core::Error::tool("mock", format!("{}: Invalid data found", path.display()))
            })
    }

    async fn mux(&self, invocation: &EngineInvocation) -> bf_core::Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self.fail_mux {
            return Err(bf_core::Error::encode(
                "mock exited with status 1",
                Some("Conversion failed!".into()),
            ));
        }
        let body = format!("m4b:{}", invocation.plan().audio_count());
        tokio::fs::write(invocation.output_path(), body).await?;
        Ok(())
    }
}

/// Write a chapter file whose contents the mock engine reads as its duration.
pub fn chapter_file(dir: &Path, index: usize, contents: &str) -> ChapterSource {
    let path = dir.join(format!("upload_{index}"));
    std::fs::write(&path, contents).unwrap();
    ChapterSource {
        source_path: path,
        title: format!("Chapter {}", index + 1),
        original_name: format!("chapter{index}.mp3"),
        sequence_index: index,
    }
}
