pub mod config;
pub mod location;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;

pub use pipeline::{PipelineError, RollupPipeline, RollupSettings};
pub use scheduler::{RollupScheduler, ScheduleSettings};
