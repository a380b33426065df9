pub mod job;
pub mod pool;
pub mod runner;

pub use job::{TaskJob, TaskResult};
pub use pool::WorkerPool;
pub use runner::{JobReport, JobRunner, RunnerError};
