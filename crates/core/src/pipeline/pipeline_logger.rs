use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for detection runs: batch progress, stage timings and metrics.
///
/// The detector reports through this trait so callers choose between
/// silence and `log` output without touching orchestration code.
pub trait PipelineLogger: Send {
    /// Frames finished so far out of `total` for the current request.
    fn progress(&mut self, current: usize, total: usize);

    /// Milliseconds one stage spent on one batch.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event. Used when `verbose` is off and in tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Writes progress through `log::info!` and keeps per-stage timings for a
/// closing summary.
///
/// Progress is batch-granular, so a line is written whenever at least
/// `throttle_frames` frames have finished since the previous line, and on
/// completion.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    last_reported: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    start_time: Instant,
    frames_done: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            last_reported: 0,
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_done: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_done;
        let mut lines = vec![format!(
            "Detection summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let per_batch = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:12}: {per_batch:7.1}ms/batch  total {total_ms:7.0}ms"
            ));
        }

        for (name, values) in &self.metrics {
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} frames/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn should_report(&self, current: usize, total: usize) -> bool {
        current == total || current >= self.last_reported + self.throttle_frames
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_done = current;
        if total > 0 && self.should_report(current, total) {
            self.last_reported = current;
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("face", 5.0);
        logger.metric("faces_per_batch", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("face", 20.0);
        logger.timing("face", 30.0);
        logger.timing("landmark", 5.0);

        assert_eq!(logger.timings_for("face").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("landmark").unwrap(), &[5.0]);
        assert!(logger.timings_for("emotion").is_none());
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(10, 10);
        logger.timing("face", 20.0);
        logger.timing("emotion", 4.0);
        logger.metric("faces_per_batch", 3.0);
        logger.metric("faces_per_batch", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Detection summary (10 frames"));
        assert!(summary.contains("face"));
        assert!(summary.contains("emotion"));
        assert!(summary.contains("faces_per_batch: avg 3.5"));
        assert!(summary.contains("frames/s"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_throttle_tracks_batches() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(5, 23);
        assert_eq!(logger.last_reported, 0);
        logger.progress(10, 23);
        assert_eq!(logger.last_reported, 10);
        logger.progress(15, 23);
        assert_eq!(logger.last_reported, 10);
        logger.progress(23, 23);
        assert_eq!(logger.last_reported, 23);
        assert_eq!(logger.frames_done, 23);
    }
}
