use super::common::target::Band;
use super::filter_ledger::FilterMagazine;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter};

/// Pointing of the observatory at an instant. Angles in radians, time in Unix seconds.
///
/// The rotator angle and the sky angle are linked by `rot = (pa - ang) mod 2π`; whichever one is
/// held fixed, the other is re-derived whenever the pointing is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub time: f64,
    pub ra: f64,
    pub dec: f64,
    pub ang: f64,
    pub filter: Band,
    pub tracking: bool,
    pub alt: f64,
    pub az: f64,
    pub pa: f64,
    pub rot: f64,
}

impl Position {
    /// A position at time zero with every angle zeroed.
    pub fn at_rest(filter: Band) -> Self {
        Self {
            time: 0.0,
            ra: 0.0,
            dec: 0.0,
            ang: 0.0,
            filter,
            tracking: false,
            alt: 0.0,
            az: 0.0,
            pa: 0.0,
            rot: 0.0,
        }
    }
}

/// One value per moving axis, used for both axis angles and peak speeds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisSet {
    pub tel_alt: f64,
    pub tel_az: f64,
    pub tel_rot: f64,
    pub dom_alt: f64,
    pub dom_az: f64,
}

/// Constraint that can reject or clamp a pointing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCountMacro, Serialize, Deserialize,
)]
pub enum FailKind {
    AltEmax,
    AltEmin,
    AzEmax,
    AzEmin,
    RotEmax,
    RotEmin,
    Filter,
}

impl FailKind {
    pub fn bit(self) -> u8 { 1 << self as u8 }
}

/// Bitmask of the [`FailKind`]s raised by the most recent resolution or slew delay query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailFlags(u8);

impl FailFlags {
    pub const NONE: Self = Self(0);

    pub fn of(kind: FailKind) -> Self { Self(kind.bit()) }

    pub fn insert(&mut self, kind: FailKind) { self.0 |= kind.bit(); }

    pub fn contains(self, kind: FailKind) -> bool { self.0 & kind.bit() != 0 }

    pub fn is_empty(self) -> bool { self.0 == 0 }

    pub fn bits(self) -> u8 { self.0 }

    pub fn iter(self) -> impl Iterator<Item = FailKind> {
        FailKind::iter().filter(move |kind| self.contains(*kind))
    }
}

/// Cumulative number of failures per [`FailKind`] over the lifetime of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailRecord([u64; FailKind::COUNT]);

impl FailRecord {
    pub fn bump(&mut self, kind: FailKind) { self.0[kind as usize] += 1; }

    pub fn count(&self, kind: FailKind) -> u64 { self.0[kind as usize] }

    pub fn total(&self) -> u64 { self.0.iter().sum() }
}

/// Complete snapshot of the observatory: pointing, axis angles, peak speeds, filters and the
/// failure diagnostics of the last resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservatoryState {
    position: Position,
    axes: AxisSet,
    peak_speeds: AxisSet,
    magazine: FilterMagazine,
    fail_flags: FailFlags,
    fail_record: FailRecord,
}

impl ObservatoryState {
    pub fn new(position: Position, axes: AxisSet, magazine: FilterMagazine) -> Self {
        Self {
            position,
            axes,
            peak_speeds: AxisSet::default(),
            magazine,
            fail_flags: FailFlags::NONE,
            fail_record: FailRecord::default(),
        }
    }

    /// Copies pointing, axes, peak speeds and filters of `other`. Failure diagnostics stay.
    pub fn set(&mut self, other: &ObservatoryState) {
        self.position = other.position;
        self.axes = other.axes;
        self.peak_speeds = other.peak_speeds;
        self.magazine.clone_from(&other.magazine);
    }

    /// Takes over `position`, aligning all axes with it and zeroing the peak speeds.
    /// The filter magazine is left as is.
    pub fn set_position(&mut self, position: &Position) {
        self.position = *position;
        self.axes = AxisSet {
            tel_alt: position.alt,
            tel_az: position.az,
            tel_rot: position.rot,
            dom_alt: position.alt,
            dom_az: position.az,
        };
        self.peak_speeds = AxisSet::default();
    }

    pub fn record_failure(&mut self, kind: FailKind) {
        self.fail_flags.insert(kind);
        self.fail_record.bump(kind);
    }

    pub fn clear_fail_flags(&mut self) { self.fail_flags = FailFlags::NONE; }

    pub fn set_fail_flags(&mut self, flags: FailFlags) { self.fail_flags = flags; }

    pub fn position(&self) -> &Position { &self.position }
    pub fn position_mut(&mut self) -> &mut Position { &mut self.position }
    pub fn axes(&self) -> &AxisSet { &self.axes }
    pub fn axes_mut(&mut self) -> &mut AxisSet { &mut self.axes }
    pub fn peak_speeds(&self) -> &AxisSet { &self.peak_speeds }
    pub fn peak_speeds_mut(&mut self) -> &mut AxisSet { &mut self.peak_speeds }
    pub fn magazine(&self) -> &FilterMagazine { &self.magazine }
    pub fn set_magazine(&mut self, magazine: &FilterMagazine) { self.magazine.clone_from(magazine) }
    pub fn fail_flags(&self) -> FailFlags { self.fail_flags }
    pub fn fail_record(&self) -> &FailRecord { &self.fail_record }
    pub fn time(&self) -> f64 { self.position.time }
    pub fn filter(&self) -> Band { self.position.filter }
    pub fn is_tracking(&self) -> bool { self.position.tracking }
}

impl fmt::Display for ObservatoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        write!(
            f,
            "t={:.1} ra={:.3} dec={:.3} ang={:.3} filter={} track={} alt={:.3} az={:.3} pa={:.3} \
             rot={:.3} telaz={:.3} telrot={:.3} mounted=[{}] unmounted=[{}]",
            p.time,
            p.ra.to_degrees(),
            p.dec.to_degrees(),
            p.ang.to_degrees(),
            p.filter,
            p.tracking,
            p.alt.to_degrees(),
            p.az.to_degrees(),
            p.pa.to_degrees(),
            p.rot.to_degrees(),
            self.axes.tel_az.to_degrees(),
            self.axes.tel_rot.to_degrees(),
            self.magazine.mounted().iter().join(", "),
            self.magazine.unmounted().iter().join(", "),
        )
    }
}
