//! Weighted sequence of workflow stages run as one task

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::runner::{ProgressSink, TaskContext, TaskReport, TaskRunner};
use crate::steps::{build_cubes, interception_step, summary_step, water_balance_step};
use std::fmt;

/// A workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cubes,
    Interception,
    WaterBalance,
    Summary,
}

impl Stage {
    /// Relative cost used to split overall progress
    pub fn weight(self) -> u32 {
        match self {
            Stage::Cubes => 100,
            Stage::Interception => 300,
            Stage::WaterBalance => 500,
            Stage::Summary => 200,
        }
    }

    pub fn run(self, config: &WorkflowConfig, ctx: &mut TaskContext<'_>) -> Result<()> {
        match self {
            Stage::Cubes => build_cubes(config, ctx).map(|_| ()),
            Stage::Interception => interception_step(&config.cube_dir(), ctx).map(|_| ()),
            Stage::WaterBalance => water_balance_step(config, ctx).map(|_| ()),
            Stage::Summary => summary_step(config, ctx).map(|_| ()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Cubes => "cube creation",
            Stage::Interception => "rainfall interception",
            Stage::WaterBalance => "water balance",
            Stage::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Stages run in order under a single [`TaskRunner`] task
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: WorkflowConfig,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Every stage, from cube creation to summaries
    pub fn full(config: WorkflowConfig) -> Self {
        Self::new(
            config,
            vec![
                Stage::Cubes,
                Stage::Interception,
                Stage::WaterBalance,
                Stage::Summary,
            ],
        )
    }

    pub fn new(config: WorkflowConfig, stages: Vec<Stage>) -> Self {
        Self { config, stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Overall progress window `(start, end)` of each stage
    pub fn windows(&self) -> Vec<(f64, f64)> {
        let total: u32 = self.stages.iter().map(|s| s.weight()).sum();
        let mut start = 0.0;
        self.stages
            .iter()
            .map(|s| {
                let span = if total == 0 {
                    0.0
                } else {
                    100.0 * f64::from(s.weight()) / f64::from(total)
                };
                let window = (start, start + span);
                start += span;
                window
            })
            .collect()
    }

    /// Run every stage; the first failure stops the run
    pub fn run(&self, runner: &TaskRunner, sink: &dyn ProgressSink) -> Result<TaskReport> {
        let windows = self.windows();
        runner.run("workflow", sink, |ctx| {
            for (stage, (start, end)) in self.stages.iter().zip(windows) {
                ctx.set_window(start, end);
                ctx.force_progress(0, 1, Some(&format!("Starting {}", stage)));
                ctx.log(format!("Starting {}", stage));
                stage.run(&self.config, ctx)?;
                ctx.force_progress(1, 1, Some(&format!("Completed {}", stage)));
                ctx.log(format!("Completed {}", stage));
            }
            ctx.set_window(0.0, 100.0);
            ctx.force_progress(1, 1, Some("Workflow completed"));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> WorkflowConfig {
        WorkflowConfig::from_toml(
            r#"
basin_name = "Awash"
input_dir = "in"
boundary = "b.geojson"
template = "t.tif"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_full_windows() {
        let pipeline = Pipeline::full(config());
        let windows = pipeline.windows();
        assert_eq!(windows.len(), 4);
        assert_relative_eq!(windows[0].1, 100.0 / 11.0, epsilon = 1e-9);
        assert_relative_eq!(windows[2].0, 400.0 / 11.0, epsilon = 1e-9);
        assert_relative_eq!(windows[3].1, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_failure_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.output_dir = dir.path().join("out");
        let pipeline = Pipeline::new(config, vec![Stage::Summary, Stage::Cubes]);

        let runner = TaskRunner::new();
        let err = pipeline
            .run(&runner, &crate::runner::NoProgress)
            .unwrap_err();
        let messages = err.messages();
        assert!(messages.iter().any(|m| m.ends_with("Starting summary")));
        assert!(!messages.iter().any(|m| m.ends_with("Starting cube creation")));
        assert!(!runner.is_running());
    }
}
