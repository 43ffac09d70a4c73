// ghsync-common: job wire types and helpers shared by the ghsync crates

pub mod job;
pub mod path;
pub mod protocol;

pub use job::{DecodeError, Job, JobMessage};
