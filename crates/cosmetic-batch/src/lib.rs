//! # cosmetic-batch
//!
//! Batch hot/cold pixel correction of astronomical frames.
//!
//! A run takes a list of target files, finds defective pixels with up to
//! three independent methods and writes corrected copies that keep the
//! source keywords and color profile:
//!
//! - **Reference** - a calibration frame (master dark) thresholded by level,
//!   quantity or sigma, built once and shared by every target
//! - **Auto-detect** - per-target statistics with hot/cold multipliers
//! - **Defect list** - explicit rows and columns
//!
//! # Modules
//!
//! - [`config`] - YAML configuration and pre-flight validation
//! - [`scheduler`] - Worker pool and control loop ([`BatchRunner`])
//! - [`task`] - Loading, correcting and writing one sub-image
//! - [`reference`] - Calibration frame and threshold resolution
//! - [`output`] - Output file naming
//! - [`report`] - Progress events and the run report
//!
//! # Example
//!
//! ```rust,no_run
//! use cosmetic_batch::{BatchConfig, BatchRunner};
//!
//! let config = BatchConfig::load("cosmetic.yaml")?;
//! let report = BatchRunner::new(config).run()?;
//! println!("{}", report);
//! # Ok::<(), cosmetic_batch::BatchError>(())
//! ```
//!
//! # Errors
//!
//! [`BatchRunner::run`] fails only before any target is touched: on an
//! invalid configuration or an unusable calibration frame. Broken targets
//! and failed tasks are skipped and counted.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod config;
pub mod output;
pub mod reference;
pub mod report;
pub mod scheduler;
pub mod task;

pub use config::{BatchConfig, ImageItem, ThresholdSpec};
pub use error::{BatchError, BatchResult};
pub use report::{BatchEvent, BatchObserver, BatchReport};
pub use scheduler::BatchRunner;
