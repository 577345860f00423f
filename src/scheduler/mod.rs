pub mod batch;
pub mod budget;
pub mod runner;

pub use batch::MeasurementBatch;
pub use budget::ConcurrencyBudget;
pub use runner::{plan_batches, BatchResult, JobScheduler, SchedulerError, SchedulerSettings};
