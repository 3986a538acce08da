//! # bf-pipeline
//!
//! Audiobook assembly pipeline.
//!
//! This crate provides:
//!
//! - **[`DurationProber`]** -- per-chapter duration measurement with bounded
//!   fan-out.
//! - **[`build_timeline`]** -- contiguous chapter spans and the
//!   `FFMETADATA1` document describing them.
//! - **[`MuxOrchestrator`]** -- stages intermediate inputs and runs a single
//!   engine invocation.
//! - **[`JobCoordinator`]** -- sequences a submission from validation to an
//!   encoded [`CompletedJob`], releasing scratch directories on every path.
//! - **[`ScopedStream`]** -- chunked output delivery that releases the job
//!   directory on the stream's terminal event.

pub mod delivery;
pub mod job;
pub mod orchestrator;
pub mod prober;
pub mod timeline;

#[cfg(test)]
mod testing;

// Re-export key types at the crate root.
pub use delivery::{DeliveryHandle, DeliveryOutcome, ScopedStream, DELIVERY_CHUNK_SIZE};
pub use job::{CompletedJob, JobCoordinator, JobDelivery, JobState, JobTracker};
pub use orchestrator::MuxOrchestrator;
pub use prober::{duration_to_ms, DurationProber};
pub use timeline::{build_timeline, compute_timestamps, render_metadata, Timeline};
