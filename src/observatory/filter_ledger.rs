use super::common::target::Band;
use super::config::{ConfigError, RateWindow, validate_filter_sets};
use crate::logger::{event, warn};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The filters currently loaded into the camera and those kept in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMagazine {
    mounted: Vec<Band>,
    unmounted: Vec<Band>,
}

impl FilterMagazine {
    /// Builds a magazine from disjoint, duplicate free filter lists.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidFilterSets`] if a band appears twice.
    pub fn new(mounted: Vec<Band>, unmounted: Vec<Band>) -> Result<Self, ConfigError> {
        validate_filter_sets(&mounted, &unmounted)?;
        Ok(Self { mounted, unmounted })
    }

    pub fn mounted(&self) -> &[Band] { &self.mounted }

    pub fn unmounted(&self) -> &[Band] { &self.unmounted }

    pub fn is_mounted(&self, band: Band) -> bool { self.mounted.contains(&band) }

    /// Exchanges `band` with the most recently stored filter.
    /// Returns the band that got mounted in its place.
    fn swap(&mut self, band: Band) -> Option<Band> {
        let idx = self.mounted.iter().position(|b| *b == band)?;
        let replacement = self.unmounted.pop()?;
        self.mounted.remove(idx);
        self.mounted.push(replacement);
        self.unmounted.push(band);
        Some(replacement)
    }
}

/// History of filter changes and the two rate windows that limit them.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChangeLedger {
    changes: Vec<f64>,
    burst: RateWindow,
    average: RateWindow,
    magazine: FilterMagazine,
}

impl FilterChangeLedger {
    pub fn new(burst: RateWindow, average: RateWindow, magazine: FilterMagazine) -> Self {
        Self { changes: Vec::new(), burst, average, magazine }
    }

    /// Appends `time` to the history if `next` differs from the `installed` filter.
    ///
    /// # Returns
    /// - `true` if a change was recorded.
    pub fn record_if_changed(&mut self, installed: Band, next: Band, time: f64) -> bool {
        if installed == next {
            return false;
        }
        debug_assert!(self.last_change().is_none_or(|last| last <= time));
        self.changes.push(time);
        event!("Filter change {installed} -> {next} at t={time:.1}, {} total", self.changes.len());
        true
    }

    /// Checks whether `target` can be put into the beam at `now`.
    ///
    /// The band must be mounted and both the burst and the average window must have elapsed
    /// since the respective n-th most recent change. A window with fewer recorded changes than
    /// its count does not restrict anything.
    pub fn is_change_allowed(&self, target: Band, now: f64) -> bool {
        if !self.magazine.is_mounted(target) {
            return false;
        }
        let elapsed = |window: RateWindow| {
            self.delta_window(window.count, now).is_none_or(|dt| dt >= window.duration)
        };
        elapsed(self.burst) && elapsed(self.average)
    }

    /// Physically exchanges the mounted `band` with a stored filter.
    /// Unknown or unmounted bands are rejected with a note and leave the magazine unchanged.
    pub fn swap(&mut self, band: Band) -> bool {
        match self.magazine.swap(band) {
            Some(replacement) => {
                event!(
                    "Swapped filter {band} for {replacement}, mounted: [{}]",
                    self.magazine.mounted().iter().join(", ")
                );
                true
            }
            None => {
                warn!("Rejected swap of filter {band}: not mounted or no spare filter stored");
                false
            }
        }
    }

    pub fn magazine(&self) -> &FilterMagazine { &self.magazine }

    pub fn len(&self) -> usize { self.changes.len() }

    pub fn is_empty(&self) -> bool { self.changes.is_empty() }

    pub fn changes(&self) -> &[f64] { &self.changes }

    pub fn last_change(&self) -> Option<f64> { self.changes.last().copied() }

    /// Seconds from the last change to `now`.
    pub fn delta_since_last(&self, now: f64) -> Option<f64> { self.delta_window(1, now) }

    /// Seconds from the change that opens the burst window to `now`.
    pub fn delta_burst(&self, now: f64) -> Option<f64> { self.delta_window(self.burst.count, now) }

    /// Seconds from the change that opens the average window to `now`.
    pub fn delta_average(&self, now: f64) -> Option<f64> {
        self.delta_window(self.average.count, now)
    }

    fn delta_window(&self, count: usize, now: f64) -> Option<f64> {
        if count == 0 || count > self.changes.len() {
            return None;
        }
        Some(now - self.changes[self.changes.len() - count])
    }
}
