//! # cosmetic-ops
//!
//! Hot and cold pixel detection and correction.
//!
//! This crate holds the per-image algorithms of cosmetic correction: the
//! structuring-element filters that estimate a pixel from its neighbors,
//! the three defect-map sources, and the replacement step.
//!
//! # Modules
//!
//! - [`structure`] - Neighbor-inclusion masks and derived images
//! - [`stats`] - Histograms, medians, deviations
//! - [`threshold`] - Level, quantity and sigma threshold conversions
//! - [`defect`] - Reference, auto-detect and list defect maps
//! - [`correct`] - Blending flagged pixels toward an estimate
//! - [`cancel`] - Cooperative cancellation
//!
//! # Example
//!
//! ```rust
//! use cosmetic_core::Image;
//! use cosmetic_ops::{AutoDetect, CancelToken, CorrectionPlan, Layout};
//!
//! let background = 1000.0 / 65535.0;
//! let mut img = Image::filled(32, 32, 1, background).unwrap();
//! img.set_pixel(10, 10, 0, 1.0);
//!
//! let plan = CorrectionPlan {
//!     auto: AutoDetect { hot: Some(3.0), cold: None },
//!     ..CorrectionPlan::new(Layout::Plain, 1.0)
//! };
//! let n = plan.run(&mut img, &CancelToken::new()).unwrap();
//! assert_eq!(n, 1);
//! assert_eq!(img.pixel(10, 10, 0), background);
//! ```
//!
//! # Parallelism
//!
//! Structuring filters split rows across the current rayon pool. Run them
//! inside [`rayon::ThreadPool::install`] to bound the worker count.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod cancel;
pub mod correct;
pub mod defect;
pub mod stats;
pub mod structure;
pub mod threshold;

pub use cancel::CancelToken;
pub use correct::{AutoDetect, CorrectionPlan, correct};
pub use defect::{DefectItem, DerivedImages, ReferenceMaps, list_map, reference_map};
pub use error::{OpsError, OpsResult};
pub use structure::{Layout, Shape, Statistic, StructuringElement};
pub use threshold::{FrameStatistics, Polarity, ThresholdSummary};
