//! Run lifecycle orchestration.
//!
//! This module owns polling of a submitted run (controller), the synthetic
//! progress estimate, the readiness predicate, the data-availability gate and
//! post-run processing. CLI layers call into it and only consume events.

mod controller;
mod gate;
mod post_process;
pub(crate) mod progress;
pub(crate) mod readiness;

pub(crate) use controller::{ActiveRuns, PollSettings, RunOrchestrator};
pub(crate) use gate::Page;
pub(crate) use post_process::{export_json, process_run_completion};
