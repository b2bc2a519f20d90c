#![allow(clippy::similar_names, clippy::module_name_repetitions)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
//! Kinematic and state model of a robotic survey telescope.
//!
//! [`ObservatoryModel`] tracks telescope, dome, rotator and filter configuration over time and
//! predicts the delay of slewing between pointings as the critical path through a graph of
//! motion and readiness activities.
mod logger;
pub mod observatory;

pub use observatory::activity::Activity;
pub use observatory::approximate::{DomeModel, HorizontalCandidate};
pub use observatory::common::target::{Band, DeepDrilling, Orientation, Pointing, Target};
pub use observatory::config::{ConfigError, ObservatoryConfig};
pub use observatory::observatory_state::{FailFlags, FailKind, ObservatoryState, Position};
pub use observatory::sky::{SiteCoordinates, SkyCoordinates};
pub use observatory::{ObservatoryModel, SlewDelay};
