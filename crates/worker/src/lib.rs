pub mod config;
pub mod git;
pub mod init;
pub mod logging;
pub mod materialize;
pub mod pipeline;
pub mod repo;
pub mod server;
pub mod storage;
pub mod workspace;

pub use config::WorkerConfig;
pub use pipeline::{JobPipeline, JobReport, JobState, PipelineError, Stage};
