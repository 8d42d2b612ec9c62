pub mod batch_executor;
pub mod batch_planner;
pub mod detector;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod stage_runner;
pub mod stage_set;

#[cfg(test)]
pub(crate) mod testing;
