//! # basinkit workflow
//!
//! Basin water-accounting pipeline: input catalog, masked data cubes,
//! rainfall interception, monthly water balance and yearly summaries.
//!
//! Work runs through a [`TaskRunner`] that allows one task at a time and
//! reports `[HH:MM:SS]` messages and 0-100 progress.
//!
//! ```ignore
//! use basinkit_workflow::{NoProgress, Pipeline, TaskRunner, WorkflowConfig};
//!
//! let config = WorkflowConfig::load("workflow.toml")?;
//! let report = Pipeline::full(config).run(&TaskRunner::new(), &NoProgress)?;
//! ```

pub mod catalog;
pub mod config;
pub mod cube;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod steps;

pub use catalog::{classify_cubes, parse_timestamp, scan_inputs, DatasetSpec, DATASETS};
pub use config::WorkflowConfig;
pub use cube::{Cube, CubeManifest};
pub use error::{Result, WorkflowError};
pub use pipeline::{Pipeline, Stage};
pub use runner::{NoProgress, ProgressSink, TaskContext, TaskReport, TaskRunner};
pub use steps::{build_cubes, interception_step, summary_step, water_balance_step};
