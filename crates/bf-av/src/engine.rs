//! The [`Engine`] trait: the narrow seam in front of the external media tool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::invocation::EngineInvocation;

/// Media probing and muxing capability.
///
/// Implementations must be safe to share across threads (`Send + Sync`); a
/// single engine serves every concurrent job.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Human-readable name identifying this engine implementation.
    fn name(&self) -> &'static str;

    /// Return the duration of the media file at `path`.
    ///
    /// A file the engine reads successfully but reports no duration for
    /// yields [`Duration::ZERO`].
    async fn probe_duration(&self, path: &Path) -> bf_core::Result<Duration>;

    /// Run one mux invocation to completion.
    ///
    /// Resolves once the engine has exited successfully and the output file
    /// named by the invocation has been written.
    async fn mux(&self, invocation: &EngineInvocation) -> bf_core::Result<()>;
}
