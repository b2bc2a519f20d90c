use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Photometric band of a camera filter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
}

/// Where a target points, either fixed on the sky or fixed in the horizontal frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Pointing {
    Equatorial { ra: f64, dec: f64 },
    Horizontal { alt: f64, az: f64 },
}

/// Camera orientation requested for a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Orientation {
    /// Angle of the camera relative to celestial north.
    SkyAngle(f64),
    /// Angle of the rotator relative to the telescope.
    Rotator(f64),
}

#[derive(Debug, Display, PartialEq)]
pub enum TargetError {
    NoExposures,
    NegativeExposureTime,
}

impl std::error::Error for TargetError {}

/// A requested visit as handed over by the scheduler. All angles are in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    id: u64,
    filter: Band,
    pointing: Pointing,
    orientation: Orientation,
    exp_times: Vec<f64>,
}

impl Target {
    const DEFAULT_EXP_TIMES: [f64; 2] = [15.0, 15.0];

    /// A sky-fixed target with a sky angle and a standard pair of 15 s exposures.
    pub fn equatorial(id: u64, ra: f64, dec: f64, ang: f64, filter: Band) -> Self {
        Self {
            id,
            filter,
            pointing: Pointing::Equatorial { ra, dec },
            orientation: Orientation::SkyAngle(ang),
            exp_times: Self::DEFAULT_EXP_TIMES.to_vec(),
        }
    }

    /// A horizontally fixed target with an explicit rotator angle and two 15 s exposures.
    pub fn horizontal(id: u64, alt: f64, az: f64, rot: f64, filter: Band) -> Self {
        Self {
            id,
            filter,
            pointing: Pointing::Horizontal { alt, az },
            orientation: Orientation::Rotator(rot),
            exp_times: Self::DEFAULT_EXP_TIMES.to_vec(),
        }
    }

    /// Replaces the exposure sequence of this target.
    ///
    /// # Errors
    /// - [`TargetError::NoExposures`] for an empty sequence.
    /// - [`TargetError::NegativeExposureTime`] if any exposure time is negative or not finite.
    pub fn with_exposures(mut self, exp_times: Vec<f64>) -> Result<Self, TargetError> {
        if exp_times.is_empty() {
            return Err(TargetError::NoExposures);
        }
        if exp_times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(TargetError::NegativeExposureTime);
        }
        self.exp_times = exp_times;
        Ok(self)
    }

    pub fn with_filter(mut self, filter: Band) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn id(&self) -> u64 { self.id }
    pub fn filter(&self) -> Band { self.filter }
    pub fn pointing(&self) -> Pointing { self.pointing }
    pub fn orientation(&self) -> Orientation { self.orientation }
    pub fn exp_times(&self) -> &[f64] { &self.exp_times }
    pub fn num_exp(&self) -> usize { self.exp_times.len() }
}

/// A deep drilling sequence: many exposures at a fixed pointing with a few filter changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeepDrilling {
    pub exp_time: f64,
    pub exposures: u32,
    pub filter_changes: u32,
}
