//! Progress reporting and cancellation for registration runs.
//!
//! The Demons loop reports once per iteration through a [`ProgressTracker`],
//! which fans the report out to every registered [`ProgressCallback`]. A
//! [`CancellationToken`] lets another thread stop the run; the loop checks
//! it between iterations only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info};

/// Progress information for one Demons iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Pyramid level, coarsest is 0.
    pub level: usize,
    /// Iteration within the level, starting at 1.
    pub iteration: usize,
    /// Iteration budget of the level.
    pub total_iterations: Option<usize>,
    /// Mean squared intensity difference before the update.
    pub mse: f64,
    /// Root mean square length of the applied update, in voxels.
    pub rms_update: f64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
    /// Estimated remaining time of the current level.
    pub estimated_remaining: Option<Duration>,
    /// Named extras attached by the tracker.
    pub extras: Vec<(String, f64)>,
}

impl ProgressInfo {
    pub fn new(level: usize, iteration: usize, budget: Option<usize>, mse: f64, rms_update: f64, elapsed: Duration) -> Self {
        Self {
            level,
            iteration,
            total_iterations: budget,
            mse,
            rms_update,
            elapsed,
            estimated_remaining: None,
            extras: Vec::new(),
        }
    }

    /// Share of the level budget done, in percent.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| (self.iteration as f64 / total as f64) * 100.0)
    }

    /// Extrapolates the level's remaining time from its mean iteration time.
    pub fn calculate_remaining(&mut self, level_elapsed: Duration) {
        let (Some(budget), true) = (self.total_iterations, self.iteration > 0) else {
            return;
        };
        let per_iteration = level_elapsed.as_secs_f64() / self.iteration as f64;
        let left = budget.saturating_sub(self.iteration) as f64;
        self.estimated_remaining = Some(Duration::from_secs_f64(per_iteration * left));
    }

    pub fn add_metric(&mut self, name: impl Into<String>, value: f64) {
        self.extras.push((name.into(), value));
    }
}

/// Observer of a registration run. Only `on_progress` is mandatory.
pub trait ProgressCallback: Send + Sync {
    /// One call per Demons iteration.
    fn on_progress(&self, info: &ProgressInfo);

    fn on_start(&self) {}

    /// Called before the first iteration of a level.
    fn on_level_start(&self, _level: usize, _size: &[usize]) {}

    fn on_complete(&self, _elapsed: Duration) {}

    /// Failures, cancellation included.
    fn on_error(&self, _error: &str) {}
}

/// Writes every `log_interval`-th iteration, and the last of each level, to `tracing`.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, progress: &ProgressInfo) {
        let last = progress.total_iterations == Some(progress.iteration);
        if progress.iteration % self.log_interval != 0 && !last {
            return;
        }
        let budget = progress
            .total_iterations
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let eta = progress
            .estimated_remaining
            .map_or_else(|| "-".to_string(), |d| format!("{:.1}s", d.as_secs_f64()));
        info!(
            "[level {}] {}/{} MSE={:.6} rms(v)={:.4} t={:.1}s eta={}",
            progress.level,
            progress.iteration,
            budget,
            progress.mse,
            progress.rms_update,
            progress.elapsed.as_secs_f64(),
            eta
        );
        for (name, value) in &progress.extras {
            info!("[level {}]   {} = {:.4}", progress.level, name, value);
        }
    }

    fn on_start(&self) {
        info!("Demons registration starting");
    }

    fn on_level_start(&self, level: usize, size: &[usize]) {
        info!("[level {}] grid {:?}", level, size);
    }

    fn on_complete(&self, elapsed: Duration) {
        info!("Demons registration done after {:.1}s", elapsed.as_secs_f64());
    }

    fn on_error(&self, message: &str) {
        error!("Demons registration aborted: {}", message);
    }
}

/// Keeps every iteration report; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    entries: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all reports so far.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reports of one level, in order.
    pub fn level_history(&self, level: usize) -> Vec<ProgressInfo> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().filter(|entry| entry.level == level).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, progress: &ProgressInfo) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(progress.clone());
    }
}

/// Shared flag that asks a running registration to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fans run events out to observers and carries the cancellation flag.
///
/// Clones share timers, observers and the token.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    observers: Vec<Arc<dyn ProgressCallback>>,
    cancellation: CancellationToken,
    run_start: Arc<Mutex<Option<Instant>>>,
    level_start: Arc<Mutex<Option<Instant>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback(&mut self, observer: Arc<dyn ProgressCallback>) {
        self.observers.push(observer);
    }

    /// Builder form of [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, observer: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(observer);
        self
    }

    /// Shares `token` with the tracker; cancelling it stops the run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn start(&self) {
        Self::stamp(&self.run_start);
        self.observers.iter().for_each(|o| o.on_start());
    }

    pub fn start_level(&self, level: usize, size: &[usize]) {
        Self::stamp(&self.level_start);
        self.observers.iter().for_each(|o| o.on_level_start(level, size));
    }

    /// Reports one finished iteration.
    pub fn update(&self, level: usize, iteration: usize, budget: Option<usize>, mse: f64, rms_update: f64) {
        let level_elapsed = Self::since(&self.level_start);
        let mut progress = ProgressInfo::new(level, iteration, budget, mse, rms_update, Self::since(&self.run_start));
        progress.calculate_remaining(level_elapsed);
        progress.add_metric("level_seconds", level_elapsed.as_secs_f64());
        self.observers.iter().for_each(|o| o.on_progress(&progress));
    }

    pub fn complete(&self) {
        let elapsed = Self::since(&self.run_start);
        self.observers.iter().for_each(|o| o.on_complete(elapsed));
    }

    pub fn error(&self, message: &str) {
        self.observers.iter().for_each(|o| o.on_error(message));
    }

    fn stamp(slot: &Mutex<Option<Instant>>) {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn since(slot: &Mutex<Option<Instant>>) -> Duration {
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(Duration::ZERO, |t| t.elapsed())
    }
}
