use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::ScopedJoinHandle;

use crate::pipeline::batch_executor::{lock, no_workers, report, BatchExecutor, SerialBatchExecutor};
use crate::pipeline::batch_planner::Batch;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage_runner::{run_batch, BatchOutput};
use crate::pipeline::stage_set::StageSet;
use crate::registry::resolver::ResolvedConfig;
use crate::results::aggregator::FaceRecord;
use crate::shared::error::{FeatError, FeatResult};
use crate::shared::frame::Frame;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Runs batches on one thread per provider set.
///
/// Layout: `feeder → [worker × n] → main [collect/report]`
///
/// Each worker locks one [`StageSet`] for the whole request and pulls
/// batches from a shared queue, so completion order is arbitrary; the main
/// thread puts outputs back in batch order. After the first failure the
/// remaining batches are skipped.
pub struct ThreadedBatchExecutor {
    channel_capacity: usize,
}

impl ThreadedBatchExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ThreadedBatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

type Completed = (usize, FeatResult<BatchOutput>);

impl BatchExecutor for ThreadedBatchExecutor {
    fn execute(
        &self,
        workers: &[Mutex<StageSet>],
        config: &ResolvedConfig,
        frames: &[Frame],
        batches: &[Batch],
        logger: &mut dyn PipelineLogger,
    ) -> FeatResult<Vec<Vec<FaceRecord>>> {
        match workers.len() {
            0 => return Err(no_workers()),
            1 => return SerialBatchExecutor.execute(workers, config, frames, batches, logger),
            _ => {}
        }

        let cap = self.channel_capacity;
        let cancelled = AtomicBool::new(false);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<&Batch>(cap);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<Completed>(cap);

        let (outputs, first_error) = std::thread::scope(|scope| {
            let handles: Vec<ScopedJoinHandle<'_, ()>> = workers
                .iter()
                .map(|stages| {
                    let job_rx = job_rx.clone();
                    let done_tx = done_tx.clone();
                    let cancelled = &cancelled;
                    scope.spawn(move || {
                        let mut guard = lock(stages);
                        for batch in job_rx {
                            if cancelled.load(Ordering::Relaxed) {
                                break;
                            }
                            let result = match guard.as_mut() {
                                Ok(stages) => run_batch(stages, config, batch.frames(frames)),
                                Err(_) => Err(FeatError::Worker("provider set unavailable".into())),
                            };
                            if done_tx.send((batch.index, result)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            drop(job_rx);
            drop(done_tx);

            let feeder = scope.spawn(move || {
                for batch in batches {
                    if job_tx.send(batch).is_err() {
                        break;
                    }
                }
            });

            let collected = collect(done_rx, batches, frames.len(), &cancelled, logger);
            join_threads(feeder, handles, collected)
        });

        if let Some(e) = first_error {
            return Err(e);
        }
        let mut faces = Vec::with_capacity(frames.len());
        for (batch, output) in batches.iter().zip(outputs) {
            let output = output.ok_or_else(|| FeatError::Worker(format!("batch {} produced no output", batch.index)))?;
            faces.extend(output);
        }
        Ok(faces)
    }
}

type Collected = (Vec<Option<Vec<Vec<FaceRecord>>>>, Option<FeatError>);

/// Receives finished batches until every worker has hung up.
fn collect(
    done_rx: crossbeam_channel::Receiver<Completed>,
    batches: &[Batch],
    total: usize,
    cancelled: &AtomicBool,
    logger: &mut dyn PipelineLogger,
) -> Collected {
    let mut outputs: Vec<Option<Vec<Vec<FaceRecord>>>> = (0..batches.len()).map(|_| None).collect();
    let mut first_error = None;
    let mut done = 0;

    for (index, result) in done_rx {
        match result {
            Ok(output) => {
                done += batches.get(index).map_or(0, Batch::len);
                report(logger, &output, done, total);
                if let Some(slot) = outputs.get_mut(index) {
                    *slot = Some(output.faces);
                }
            }
            Err(e) => {
                cancelled.store(true, Ordering::Relaxed);
                log::debug!("Batch {index} failed, cancelling remaining batches");
                set_if_none(&mut first_error, e);
            }
        }
    }

    (outputs, first_error)
}

/// Joins feeder and workers and coalesces the first error encountered.
fn join_threads(
    feeder: ScopedJoinHandle<'_, ()>,
    workers: Vec<ScopedJoinHandle<'_, ()>>,
    (outputs, mut first_error): Collected,
) -> Collected {
    if feeder.join().is_err() {
        set_if_none(&mut first_error, FeatError::Worker("feeder thread panicked".into()));
    }
    for (i, handle) in workers.into_iter().enumerate() {
        if handle.join().is_err() {
            set_if_none(&mut first_error, FeatError::Worker(format!("worker {i} panicked")));
        }
    }
    (outputs, first_error)
}

fn set_if_none(slot: &mut Option<FeatError>, err: FeatError) {
    if slot.is_none() {
        *slot = Some(err);
    }
}
