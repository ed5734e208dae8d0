//! Single-task runner with timestamped messages and throttled progress
//!
//! Only one task runs at a time. A task receives a [`TaskContext`] that
//! collects `[HH:MM:SS] message` lines and forwards progress (0-100) to a
//! [`ProgressSink`].

use crate::error::{Result, WorkflowError};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Minimum interval between two non-forced progress updates
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Receiver of progress updates
pub trait ProgressSink: Send + Sync {
    fn update(&self, percent: u8, message: Option<&str>);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, Option<&str>) + Send + Sync,
{
    fn update(&self, percent: u8, message: Option<&str>) {
        self(percent, message)
    }
}

/// Sink that discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _percent: u8, _message: Option<&str>) {}
}

/// Scale `current / total` to 0-100
pub fn scale_progress(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((current as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as u8
}

/// Timestamped log line, `[HH:MM:SS] message`
pub fn log_line(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
}

/// Handle given to a running task
pub struct TaskContext<'a> {
    sink: &'a dyn ProgressSink,
    messages: Vec<String>,
    last_update: Option<Instant>,
    percent: u8,
    window: (f64, f64),
}

impl<'a> TaskContext<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            messages: Vec::new(),
            last_update: None,
            percent: 0,
            window: (0.0, 100.0),
        }
    }

    /// Map subsequent progress into `start..=end` of the overall range,
    /// for tasks made of several weighted stages
    pub fn set_window(&mut self, start: f64, end: f64) {
        let start = start.clamp(0.0, 100.0);
        self.window = (start, end.clamp(start, 100.0));
    }

    /// Record a message and log it
    pub fn log(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.messages.push(log_line(message));
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{}", message);
        self.messages.push(log_line(message));
    }

    /// Report progress; dropped if the previous update is under 100 ms old
    pub fn progress(&mut self, current: usize, total: usize, message: Option<&str>) {
        let due = self
            .last_update
            .map_or(true, |t| t.elapsed() > PROGRESS_INTERVAL);
        if due {
            self.emit(scale_progress(current, total), message);
        }
    }

    /// Report progress regardless of the throttle
    pub fn force_progress(&mut self, current: usize, total: usize, message: Option<&str>) {
        self.emit(scale_progress(current, total), message);
    }

    fn emit(&mut self, percent: u8, message: Option<&str>) {
        let (start, end) = self.window;
        let percent = (start + (end - start) * f64::from(percent) / 100.0).round() as u8;
        self.percent = percent;
        self.last_update = Some(Instant::now());
        let sink = self.sink;
        if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.update(percent, message)
        })) {
            warn!("progress sink failed: {:?}", panic);
        }
    }

    /// Last reported percentage
    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// Outcome of a successful task
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: String,
    pub messages: Vec<String>,
    pub elapsed: Duration,
}

/// Runs at most one task at a time
#[derive(Debug, Default)]
pub struct TaskRunner {
    running: AtomicBool,
    current: Mutex<Option<String>>,
}

/// Clears the running flag when dropped, including on unwind
struct RunningGuard<'a> {
    runner: &'a TaskRunner,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.runner.current.lock() {
            *current = None;
        }
        self.runner.running.store(false, Ordering::Release);
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Name of the running task, if any
    pub fn current_task(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }

    /// Run `task`, failing with [`WorkflowError::Busy`] if another task is
    /// in progress. A failure is wrapped with the messages logged so far.
    pub fn run<F>(&self, name: &str, sink: &dyn ProgressSink, task: F) -> Result<TaskReport>
    where
        F: FnOnce(&mut TaskContext<'_>) -> Result<()>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let running = self.current_task().unwrap_or_default();
            warn!("A task is already running ({}), rejecting {}", running, name);
            return Err(WorkflowError::Busy(running));
        }
        let _guard = RunningGuard { runner: self };
        if let Ok(mut current) = self.current.lock() {
            *current = Some(name.to_string());
        }

        let start = Instant::now();
        let mut ctx = TaskContext::new(sink);
        ctx.log(format!("Starting {}...", name));

        match task(&mut ctx) {
            Ok(()) => {
                let elapsed = start.elapsed();
                ctx.log(format!("{} completed in {:.1}s", name, elapsed.as_secs_f64()));
                Ok(TaskReport {
                    name: name.to_string(),
                    messages: ctx.into_messages(),
                    elapsed,
                })
            }
            Err(err) => {
                ctx.warn(format!("Error: {}", err));
                Err(WorkflowError::Step {
                    task: name.to_string(),
                    messages: ctx.into_messages(),
                    source: Box::new(err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scale_progress() {
        assert_eq!(scale_progress(0, 0), 0);
        assert_eq!(scale_progress(1, 4), 25);
        assert_eq!(scale_progress(4, 4), 100);
        assert_eq!(scale_progress(9, 4), 100);
    }

    #[test]
    fn test_log_line_format() {
        let line = log_line("hello");
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] hello");
        assert_eq!(line.as_bytes()[3], b':');
    }

    #[test]
    fn test_throttle_and_force() {
        let updates = Mutex::new(Vec::new());
        let sink = |p: u8, _m: Option<&str>| updates.lock().unwrap().push(p);
        let mut ctx = TaskContext::new(&sink);

        ctx.progress(1, 10, None);
        ctx.progress(2, 10, None);
        ctx.force_progress(3, 10, Some("forced"));
        assert_eq!(*updates.lock().unwrap(), vec![10, 30]);
        assert_eq!(ctx.percent(), 30);
    }

    #[test]
    fn test_window_scaling() {
        let mut ctx = TaskContext::new(&NoProgress);
        ctx.set_window(20.0, 60.0);
        ctx.force_progress(1, 2, None);
        assert_eq!(ctx.percent(), 40);
        ctx.force_progress(2, 2, None);
        assert_eq!(ctx.percent(), 60);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = |_p: u8, _m: Option<&str>| panic!("sink down");
        let mut ctx = TaskContext::new(&sink);
        ctx.force_progress(1, 2, None);
        assert_eq!(ctx.percent(), 50);
    }

    #[test]
    fn test_run_reports_messages() {
        let runner = TaskRunner::new();
        let report = runner
            .run("demo", &NoProgress, |ctx| {
                ctx.log("working");
                Ok(())
            })
            .unwrap();
        assert_eq!(report.name, "demo");
        assert_eq!(report.messages.len(), 3);
        assert!(report.messages[1].ends_with("] working"));
        assert!(!runner.is_running());
    }

    #[test]
    fn test_failure_carries_messages() {
        let runner = TaskRunner::new();
        let err = runner
            .run("broken", &NoProgress, |ctx| {
                ctx.log("step one");
                Err(WorkflowError::missing("P cube"))
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Step { .. }));
        assert!(err.messages().iter().any(|m| m.ends_with("step one")));
        assert!(!runner.is_running());
    }

    #[test]
    fn test_busy_while_running() {
        let runner = Arc::new(TaskRunner::new());
        let inner = Arc::clone(&runner);
        let result = runner
            .run("outer", &NoProgress, |_ctx| {
                assert_eq!(inner.current_task().as_deref(), Some("outer"));
                let nested = inner.run("inner", &NoProgress, |_| Ok(()));
                assert!(matches!(nested, Err(WorkflowError::Busy(ref n)) if n == "outer"));
                Ok(())
            });
        assert!(result.is_ok());
        assert!(runner.current_task().is_none());
    }

    #[test]
    fn test_flag_cleared_after_panic() {
        let runner = TaskRunner::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = runner.run("panics", &NoProgress, |_| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert!(!runner.is_running());
        assert!(runner.run("next", &NoProgress, |_| Ok(())).is_ok());
    }
}
