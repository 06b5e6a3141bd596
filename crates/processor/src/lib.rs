//! Cookie processing: rule evaluation, enrichment, and the worker pool
//! draining the jar's dirty queue.

mod manager;
mod processor;

pub use manager::{ManagerConfig, ProcessorManager, WorkerDump};
pub use processor::{Outcome, Processor};
