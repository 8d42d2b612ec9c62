use std::sync::{Mutex, MutexGuard};

use crate::pipeline::batch_planner::Batch;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage_runner::{run_batch, BatchOutput};
use crate::pipeline::stage_set::StageSet;
use crate::registry::resolver::ResolvedConfig;
use crate::results::aggregator::FaceRecord;
use crate::shared::error::{ConfigurationError, FeatError, FeatResult};
use crate::shared::frame::Frame;

/// Abstracts how planned batches are spread over provider sets.
///
/// Implementations must return one face list per frame in input order,
/// whatever order batches actually complete in. The first failing batch
/// fails the whole call.
pub trait BatchExecutor: Send + Sync {
    fn execute(
        &self,
        workers: &[Mutex<StageSet>],
        config: &ResolvedConfig,
        frames: &[Frame],
        batches: &[Batch],
        logger: &mut dyn PipelineLogger,
    ) -> FeatResult<Vec<Vec<FaceRecord>>>;
}

/// Runs every batch on the first provider set, in order.
#[derive(Default)]
pub struct SerialBatchExecutor;

impl BatchExecutor for SerialBatchExecutor {
    fn execute(
        &self,
        workers: &[Mutex<StageSet>],
        config: &ResolvedConfig,
        frames: &[Frame],
        batches: &[Batch],
        logger: &mut dyn PipelineLogger,
    ) -> FeatResult<Vec<Vec<FaceRecord>>> {
        let mut stages = lock(workers.first().ok_or_else(no_workers)?)?;
        let mut faces = Vec::with_capacity(frames.len());
        let mut done = 0;
        for batch in batches {
            let output = run_batch(&mut stages, config, batch.frames(frames))?;
            done += batch.len();
            report(logger, &output, done, frames.len());
            faces.extend(output.faces);
        }
        Ok(faces)
    }
}

pub(crate) fn no_workers() -> FeatError {
    ConfigurationError::InvalidParameter {
        name: "n_jobs",
        message: "no provider sets to run on".into(),
    }
    .into()
}

/// Takes exclusive hold of one provider set for the rest of a request.
pub(crate) fn lock(stages: &Mutex<StageSet>) -> FeatResult<MutexGuard<'_, StageSet>> {
    stages
        .lock()
        .map_err(|_| FeatError::Worker("provider set poisoned by an earlier panic".into()))
}

/// Forwards one finished batch to the logger.
pub(crate) fn report(logger: &mut dyn PipelineLogger, output: &BatchOutput, done: usize, total: usize) {
    for (stage, ms) in &output.timings {
        logger.timing(&stage.to_string(), *ms);
    }
    let faces: usize = output.faces.iter().map(Vec::len).sum();
    logger.metric("faces_per_batch", faces as f64);
    logger.progress(done, total);
}
