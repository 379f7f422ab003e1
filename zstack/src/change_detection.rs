//! Sharp-change detection on a 1D series.
//!
//! Flags positions where consecutive values jump by more than a threshold.
//! Typically fed with a per-slice statistic such as the reference mean series.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::math::series_mean_and_std;

/// Which jumps to report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    #[default]
    Both,
}

/// First differences `data[i + 1] - data[i]`.
pub fn differences(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Population standard deviation of the finite differences. NaN when there are none.
fn default_threshold(diff: &[f64]) -> f64 {
    let finite: Vec<f64> = diff.iter().copied().filter(|d| d.is_finite()).collect();
    series_mean_and_std(&finite).map_or(f64::NAN, |(_, std)| std)
}

/// Indices into the difference sequence where the jump exceeds `threshold`.
///
/// Index `i` refers to the step from `data[i]` to `data[i + 1]`. Without an
/// explicit threshold the standard deviation of the finite differences is used.
/// The result is sorted ascending. NaN differences are never flagged.
pub fn detect_sharp_changes(data: &[f64], threshold: Option<f64>, direction: Direction) -> Vec<usize> {
    let diff = differences(data);
    let threshold = threshold.unwrap_or_else(|| default_threshold(&diff));

    diff.iter()
        .enumerate()
        .filter(|&(_, &d)| match direction {
            Direction::Increase => d > threshold,
            Direction::Decrease => d < -threshold,
            Direction::Both => d > threshold || d < -threshold,
        })
        .map(|(i, _)| i)
        .collect()
}

/// A flagged step between two defined entries of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharpChange {
    /// Position of the value before the jump.
    pub from: usize,
    /// Position of the value after the jump; entries in between were undefined.
    pub to: usize,
}

/// Change detection over a series with undefined entries.
///
/// `None` entries are skipped: differences are taken between consecutive
/// defined values, and every flagged step is mapped back to positions in `series`.
pub fn detect_sharp_changes_in_series(
    series: &[Option<f64>],
    threshold: Option<f64>,
    direction: Direction,
) -> Vec<SharpChange> {
    let (positions, values): (Vec<usize>, Vec<f64>) = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .unzip();

    detect_sharp_changes(&values, threshold, direction)
        .into_iter()
        .map(|i| SharpChange {
            from: positions[i],
            to: positions[i + 1],
        })
        .collect()
}
