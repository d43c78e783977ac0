use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for orchestration events: per-stage timings, per-image metrics
/// and batch progress.
///
/// Use cases report through this trait so the CLI can summarise a run while
/// tests stay silent.
pub trait PipelineLogger: Send {
    /// Report image-level progress within a batch.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one image.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-image metric such as the number of faces.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects timings and metrics and reports them through `log::info!`.
///
/// Progress lines are throttled to one every `throttle_images` images.
pub struct StdoutPipelineLogger {
    throttle_images: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    started: Instant,
    total_images: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_images: usize) -> Self {
        Self {
            throttle_images: throttle_images.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            total_images: 0,
        }
    }

    /// Formatted summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let images = self.total_images.max(self.samples());
        let mut lines = vec![format!(
            "Run summary ({images} images, {:.2}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            lines.push(format!(
                "  {stage:10}: avg {:7.2}ms  total {total_ms:8.1}ms",
                mean(durations)
            ));
        }
        for (name, values) in &self.metrics {
            let total: f64 = values.iter().sum();
            lines.push(format!("  {name}: avg {:.1}  total {total:.0}", mean(values)));
        }

        if images > 0 && elapsed_ms > 0.0 {
            let rate = images as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.1} images/sec"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    /// Images seen so far, inferred from the busiest stage.
    fn samples(&self) -> usize {
        self.timings.values().map(Vec::len).max().unwrap_or(0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_images = total;
        if total > 0 && (current % self.throttle_images == 0 || current == total) {
            log::info!("Analyzed {current}/{total} images");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
