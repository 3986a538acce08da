//! Shared test harness for integration tests.
//!
//! Provides a [`ScriptedEngine`] that stands in for ffmpeg/ffprobe and a
//! [`TestHarness`] that wires it into a full [`AppContext`] rooted in a
//! private temp directory. [`TestHarness::with_server`] starts Axum on a
//! random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bf_av::{Engine, EngineInvocation, InputRole, ToolRegistry};
use bf_core::config::Config;
use bf_pipeline::JobCoordinator;
use bf_server::context::AppContext;
use bf_server::router::build_router;

/// Size of the container the scripted engine produces. Larger than one
/// delivery chunk so streaming is exercised.
pub const OUTPUT_SIZE: usize = 150 * 1024;

/// What the scripted engine saw during one mux call.
#[derive(Debug, Clone)]
pub struct MuxRecord {
    pub invocation: EngineInvocation,
    pub metadata_document: String,
    pub cover_bytes: Option<Vec<u8>>,
}

/// Engine double.
///
/// Probing reads the file as UTF-8 and parses a millisecond count, so a
/// chapter "file" containing `5000` is five seconds long. Anything else is
/// reported as unreadable. Muxing records the invocation and writes
/// [`OUTPUT_SIZE`] deterministic bytes to the output path.
#[derive(Default)]
pub struct ScriptedEngine {
    pub fail_mux: bool,
    pub records: Mutex<Vec<MuxRecord>>,
}

impl ScriptedEngine {
    pub fn failing() -> Self {
        Self {
            fail_mux: true,
            ..Default::default()
        }
    }

    pub fn mux_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn last(&self) -> MuxRecord {
        self.records
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("engine was never invoked")
    }
}

/// Bytes the scripted engine writes as output.
pub fn expected_output() -> Vec<u8> {
    (0..OUTPUT_SIZE).map(|i| (i % 251) as u8).collect()
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe_duration(&self, path: &Path) -> bf_core::Result<Duration> {
        let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
        text.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                bf_core::Error::tool(
                    "ffprobe",
                    format!("{}: Invalid data found when processing input", path.display()),
                )
            })
    }

    async fn mux(&self, invocation: &EngineInvocation) -> bf_core::Result<()> {
        let plan = invocation.plan();
        let metadata_path = &plan.inputs()[plan.metadata_index()].path;
        let metadata_document = std::fs::read_to_string(metadata_path)?;
        let cover_bytes = plan
            .inputs()
            .iter()
            .find(|i| i.role == InputRole::Cover)
            .map(|i| std::fs::read(&i.path))
            .transpose()?;

        self.records.lock().unwrap().push(MuxRecord {
            invocation: invocation.clone(),
            metadata_document,
            cover_bytes,
        });

        if self.fail_mux {
            return Err(bf_core::Error::encode(
                "ffmpeg exited with exit status: 1",
                Some("Error while decoding stream #0:0\nConversion failed!".into()),
            ));
        }

        tokio::fs::write(invocation.output_path(), expected_output()).await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] whose scratch
/// directories all live under a private root.
pub struct TestHarness {
    pub ctx: AppContext,
    pub engine: Arc<ScriptedEngine>,
    pub root: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_engine(ScriptedEngine::default())
    }

    pub fn with_engine(engine: ScriptedEngine) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp root");
        let mut config = Config::default();
        config.workspace.temp_root = Some(root.path().to_path_buf());

        let engine = Arc::new(engine);
        let ctx = AppContext::new(config, ToolRegistry::default(), engine.clone());
        Self { ctx, engine, root }
    }

    /// A coordinator sharing this harness's engine and temp root, with the
    /// metadata year pinned.
    pub fn coordinator(&self) -> JobCoordinator {
        JobCoordinator::new(self.engine.clone(), &self.ctx.config).with_year(2024)
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(engine: ScriptedEngine) -> (Self, SocketAddr) {
        let harness = Self::with_engine(engine);
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Scratch directories currently present under the temp root.
    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.root.path())
            .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Wait (briefly) until every scratch directory has been released.
    pub async fn assert_all_released(&self) {
        for _ in 0..100 {
            if self.scratch_dirs().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("scratch directories left behind: {:?}", self.scratch_dirs());
    }
}

/// Write a chapter file whose contents the scripted engine reads as its
/// duration in milliseconds.
pub fn write_chapter(dir: &Path, name: &str, duration: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, duration).expect("failed to write chapter");
    path
}
