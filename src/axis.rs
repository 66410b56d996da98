use approx::abs_diff_eq;
use itertools::Itertools;
use log::trace;

use crate::error::{DistributionError, Result};

/// Relative tolerance under which a span is treated as a whole number of steps.
const WHOLE_STEP_TOLERANCE: f64 = 1e-9;

/// An ordered, strictly increasing sequence of distances along a ray.
/// Every curve of a [`crate::layers::LayerCollection`] is sampled at these distances.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceAxis {
    distances: Vec<f64>,
}

impl DistanceAxis {
    /// Create an axis from the given distances.
    ///
    /// # Errors
    ///
    /// * If fewer than 2 distances are given.
    /// * If any distance is not finite.
    /// * If the distances are not strictly increasing.
    pub fn new(distances: Vec<f64>) -> Result<Self> {
        if distances.len() < 2 {
            return Err(DistributionError::AxisTooShort(distances.len()));
        }
        if let Some((index, distance)) = distances
            .iter()
            .enumerate()
            .find(|(_, distance)| !distance.is_finite())
        {
            return Err(DistributionError::InvalidParameter(format!(
                "distance[{index}] = {distance} is not finite"
            )));
        }
        if let Some((index, (_, next))) = distances
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (previous, next))| next <= previous)
        {
            return Err(DistributionError::NonIncreasingAxis {
                index: index + 1,
                value: *next,
            });
        }
        Ok(Self { distances })
    }

    /// Create the half-open grid `start, start + step, start + 2 * step, ...`
    /// that stops before reaching `stop`.
    ///
    /// # Arguments
    /// * `start`: The first distance.
    /// * `stop`: The exclusive upper end of the grid.
    /// * `step`: The spacing between two distances.
    ///
    /// # Errors
    ///
    /// * If `step` is not positive or the resulting grid has fewer than 2 samples.
    pub fn arange(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !step.is_finite() || step <= 0f64 {
            return Err(DistributionError::InvalidParameter(format!(
                "step size must be positive and finite, got {step}"
            )));
        }
        if !start.is_finite() || !stop.is_finite() || stop <= start {
            return Err(DistributionError::InvalidParameter(format!(
                "grid end {stop} must be greater than grid start {start}"
            )));
        }
        let count = ((stop - start) / step).ceil() as usize;
        Self::new(
            (0..count)
                .map(|idx| (idx as f64).mul_add(step, start))
                .collect(),
        )
    }

    /// Create a grid that subdivides `[start, end]` into exactly `intervals` equal intervals,
    /// hitting both `start` and `end` exactly, and continues for `margin_steps` samples of the
    /// same spacing beyond either end.
    ///
    /// # Errors
    ///
    /// * If `intervals` is 0 or `end` is not greater than `start`.
    /// * If the spacing is too small to keep the distances strictly increasing.
    pub fn aligned(start: f64, end: f64, intervals: usize, margin_steps: usize) -> Result<Self> {
        if intervals == 0 {
            return Err(DistributionError::InvalidParameter(
                "the number of intervals must be at least 1".to_owned(),
            ));
        }
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(DistributionError::InvalidParameter(format!(
                "grid end {end} must be greater than grid start {start}"
            )));
        }
        let step = (end - start) / intervals as f64;
        let intervals_float = intervals as f64;
        let leading = (1..=margin_steps)
            .rev()
            .map(|idx| (idx as f64).mul_add(-step, start));
        let inner = (0..=intervals).map(|idx| lerp(start, end, idx as f64 / intervals_float));
        let trailing = (1..=margin_steps).map(|idx| (idx as f64).mul_add(step, end));
        Self::new(leading.chain(inner).chain(trailing).collect())
    }

    /// Return a copy of this axis with the given breakpoints merged in.
    /// Grid distances that (almost) coincide with a breakpoint are replaced by it,
    /// so the breakpoints end up on the axis exactly. Distinct breakpoints are all kept,
    /// however close they are.
    ///
    /// # Errors
    ///
    /// * If a breakpoint is not finite.
    pub fn with_breakpoints(&self, breakpoints: &[f64]) -> Result<Self> {
        let tolerance = self.min_spacing() * 1e-6;
        let merged: Vec<f64> = self
            .distances
            .iter()
            .map(|&distance| (distance, false))
            .chain(breakpoints.iter().map(|&distance| (distance, true)))
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .coalesce(|previous, current| {
                if !abs_diff_eq!(previous.0, current.0, epsilon = tolerance) {
                    return Err((previous, current));
                }
                match (previous.1, current.1) {
                    (true, true) if previous.0.total_cmp(&current.0).is_ne() => {
                        Err((previous, current))
                    }
                    (false, true) => Ok(current),
                    _ => Ok(previous),
                }
            })
            .map(|(distance, _)| distance)
            .collect();
        trace!(
            "merged {} breakpoints into an axis of {} samples, now {} samples",
            breakpoints.len(),
            self.len(),
            merged.len()
        );
        Self::new(merged)
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn into_distances(self) -> Vec<f64> {
        self.distances
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// Always false, an axis holds at least 2 distances.
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.distances[0]
    }

    pub fn last(&self) -> f64 {
        self.distances[self.distances.len() - 1]
    }

    /// The smallest gap between two neighbouring distances.
    pub fn min_spacing(&self) -> f64 {
        self.distances
            .iter()
            .tuple_windows()
            .map(|(previous, next)| next - previous)
            .fold(f64::INFINITY, f64::min)
    }

    /// Get the index of the sample that lies exactly at `distance`, if there is one.
    pub fn position(&self, distance: f64) -> Option<usize> {
        self.distances
            .binary_search_by(|probe| probe.total_cmp(&distance))
            .ok()
    }

    /// Get the index of the sample closest to `distance`.
    /// Ties are resolved towards the smaller distance.
    pub fn nearest_index(&self, distance: f64) -> usize {
        let upper = self.distances.partition_point(|&probe| probe < distance);
        if upper == 0 {
            return 0;
        }
        if upper == self.distances.len() {
            return upper - 1;
        }
        if distance - self.distances[upper - 1] <= self.distances[upper] - distance {
            upper - 1
        } else {
            upper
        }
    }
}

/// Linearly interpolate between `start` (at `t = 0`) and `end` (at `t = 1`).
/// Both ends are reproduced exactly.
fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start.mul_add(1f64 - t, end * t)
}

/// Count how many steps of size `step` are needed to cover `span`.
/// Spans that are a whole number of steps up to rounding noise are not rounded up.
pub(crate) fn whole_steps(span: f64, step: f64) -> usize {
    let raw = span / step;
    if (raw - raw.round()).abs() <= raw.abs() * WHOLE_STEP_TOLERANCE {
        raw.round() as usize
    } else {
        raw.ceil() as usize
    }
}
