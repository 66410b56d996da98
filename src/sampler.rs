use std::str::FromStr;

use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    axis::{whole_steps, DistanceAxis},
    error::{DistributionError, Result},
    layers::{LayerCollection, LayerDistribution},
    DEFAULT_MARGIN, DEFAULT_STEPS,
};

/// A single homogeneous absorbing slab spanning `[start, end]` along the ray.
///
/// The slab absorbs with a uniform free-flight probability density,
/// i.e. a ray entering it is absorbed at a uniformly distributed distance within it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slab {
    start: f64,
    end: f64,
}

impl Slab {
    /// Create a slab spanning `[start, end]`.
    ///
    /// # Errors
    ///
    /// * If either bound is not finite.
    /// * If the slab width `end - start` is not positive.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(DistributionError::InvalidParameter(format!(
                "slab bounds must be finite, got [{start}, {end}]"
            )));
        }
        if end <= start {
            return Err(DistributionError::InvalidParameter(format!(
                "slab end {end} must be greater than slab start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> f64 {
        self.start
    }

    pub const fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Check whether the given distance lies within `[start, end]`.
    pub fn contains(&self, distance: f64) -> bool {
        self.start <= distance && distance <= self.end
    }

    /// The local absorption coefficient at `distance`: the inverse of the remaining slab
    /// thickness inside the slab and 0 outside of it.
    /// At the trailing edge this is `f64::INFINITY`.
    pub fn material_density_at(&self, distance: f64) -> f64 {
        if !self.contains(distance) {
            return 0f64;
        }
        let remaining = self.end - distance;
        if remaining == 0f64 {
            f64::INFINITY
        } else {
            1f64 / remaining
        }
    }

    /// The free-flight probability density at `distance`.
    pub fn probability_density_at(&self, distance: f64) -> f64 {
        if self.contains(distance) {
            1f64 / self.width()
        } else {
            0f64
        }
    }

    /// The probability that a ray has been absorbed by the time it reaches `distance`.
    pub fn cumulative_probability_at(&self, distance: f64) -> f64 {
        let width = self.width();
        num::clamp(distance - self.start, 0f64, width) / width
    }

    /// The probability that a ray reaches `distance` without being absorbed.
    pub fn transmittance_at(&self, distance: f64) -> f64 {
        1f64 - self.cumulative_probability_at(distance)
    }
}

/// How the sampling window around a slab is discretised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingMode {
    /// The slab is split into exactly `steps` intervals whose edges are hit exactly,
    /// and the margins are stepped at the same spacing, rounded to whole steps.
    #[default]
    Aligned,
    /// The half-open grid `start - margin, start - margin + step, ...` up to `end + margin`,
    /// with `step = width / steps`. The slab edges are only hit if the grid happens to land on them.
    Inherited,
}

impl FromStr for SamplingMode {
    type Err = DistributionError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "aligned" => Ok(Self::Aligned),
            "inherited" => Ok(Self::Inherited),
            _ => Err(DistributionError::InvalidParameter(format!(
                "unknown sampling mode \"{value}\", expected \"aligned\" or \"inherited\""
            ))),
        }
    }
}

/// Resolution settings for sampling slabs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerConfig {
    /// The number of intervals the (thinnest) slab is split into.
    pub steps: usize,
    /// How far the sampling window extends beyond the slabs on either side.
    pub margin: f64,
    pub mode: SamplingMode,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            margin: DEFAULT_MARGIN,
            mode: SamplingMode::default(),
        }
    }
}

impl SamplerConfig {
    /// Check that these settings can be sampled with.
    ///
    /// # Errors
    ///
    /// * If `steps` is 0.
    /// * If `margin` is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(DistributionError::InvalidParameter(
                "the number of steps must be at least 1".to_owned(),
            ));
        }
        if !self.margin.is_finite() || self.margin < 0f64 {
            return Err(DistributionError::InvalidParameter(format!(
                "the margin must be a non-negative finite distance, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}

/// A slab together with its curves and the axis they were sampled on.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledSlab {
    pub slab: Slab,
    pub axis: DistanceAxis,
    pub layer: LayerDistribution,
}

/// Sample the curves of the slab `[slab_start, slab_end]` with the default sampling mode.
///
/// # Arguments
/// * `slab_start`: The distance at which the slab begins.
/// * `slab_end`: The distance at which the slab ends.
/// * `steps`: The number of intervals the slab is split into.
/// * `margin`: How far the sampled window extends beyond the slab on either side.
///
/// # Errors
///
/// * If the slab is empty or inverted, `steps` is 0 or `margin` is negative.
pub fn sample(slab_start: f64, slab_end: f64, steps: usize, margin: f64) -> Result<SampledSlab> {
    sample_with(
        Slab::new(slab_start, slab_end)?,
        &SamplerConfig {
            steps,
            margin,
            mode: SamplingMode::default(),
        },
    )
}

/// Sample the curves of the given slab on a window around it.
///
/// # Errors
///
/// * If `config` is invalid.
/// * If the resolution is too fine to produce strictly increasing distances.
pub fn sample_with(slab: Slab, config: &SamplerConfig) -> Result<SampledSlab> {
    config.validate()?;
    let step = slab.width() / config.steps as f64;
    let axis = match config.mode {
        SamplingMode::Aligned => DistanceAxis::aligned(
            slab.start,
            slab.end,
            config.steps,
            margin_steps(config.margin, step),
        )?,
        SamplingMode::Inherited => {
            let axis =
                DistanceAxis::arange(slab.start - config.margin, slab.end + config.margin, step)?;
            end_is_sampled(&slab, &axis);
            axis
        }
    };
    debug!(
        "sampling slab [{}, {}] at {} distances",
        slab.start,
        slab.end,
        axis.len()
    );
    let layer = sample_on_axis(&slab, &axis);
    Ok(SampledSlab { slab, axis, layer })
}

/// Evaluate the curves of the given slab at every distance of the given axis.
pub fn sample_on_axis(slab: &Slab, axis: &DistanceAxis) -> LayerDistribution {
    let distances = axis.distances();
    LayerDistribution::from_parts(
        distances
            .iter()
            .map(|&distance| slab.material_density_at(distance))
            .collect(),
        distances
            .iter()
            .map(|&distance| slab.probability_density_at(distance))
            .collect(),
        distances
            .iter()
            .map(|&distance| slab.cumulative_probability_at(distance))
            .collect(),
    )
}

/// Sample several named slabs onto one shared axis and collect them in the given order.
///
/// The shared axis spans all slabs plus the margin on either side and uses the step size
/// of the thinnest slab. In [`SamplingMode::Aligned`] the edges of every slab are merged
/// into the axis, so every slab is hit exactly at both ends.
///
/// # Errors
///
/// * If no slabs are given.
/// * If `config` is invalid or two slabs share a name.
pub fn sample_layers<S>(slabs: &[(S, Slab)], config: &SamplerConfig) -> Result<LayerCollection>
where
    S: AsRef<str> + Sync,
{
    config.validate()?;
    if slabs.is_empty() {
        return Err(DistributionError::EmptyCollection);
    }
    let start = slabs
        .iter()
        .map(|(_, slab)| slab.start)
        .fold(f64::INFINITY, f64::min);
    let end = slabs
        .iter()
        .map(|(_, slab)| slab.end)
        .fold(f64::NEG_INFINITY, f64::max);
    let step = slabs
        .iter()
        .map(|(_, slab)| slab.width())
        .fold(f64::INFINITY, f64::min)
        / config.steps as f64;

    let axis = match config.mode {
        SamplingMode::Aligned => {
            let edges: Vec<f64> = slabs
                .iter()
                .flat_map(|(_, slab)| [slab.start, slab.end])
                .collect();
            DistanceAxis::aligned(
                start,
                end,
                whole_steps(end - start, step).max(1),
                margin_steps(config.margin, step),
            )?
            .with_breakpoints(&edges)?
        }
        SamplingMode::Inherited => {
            let axis = DistanceAxis::arange(start - config.margin, end + config.margin, step)?;
            for (_, slab) in slabs {
                end_is_sampled(slab, &axis);
            }
            axis
        }
    };
    debug!(
        "sampling {} slabs over [{}, {}] at {} shared distances",
        slabs.len(),
        axis.first(),
        axis.last(),
        axis.len()
    );

    let layers: Vec<LayerDistribution> = slabs
        .par_iter()
        .map(|(_, slab)| sample_on_axis(slab, &axis))
        .collect();
    let mut collection = LayerCollection::new(axis);
    for ((name, _), layer) in slabs.iter().zip(layers) {
        collection.push(name.as_ref(), layer)?;
    }
    Ok(collection)
}

/// Whether the slab's end lies on the axis. Warns if it doesn't, as the infinite
/// material density at the end is lost then.
fn end_is_sampled(slab: &Slab, axis: &DistanceAxis) -> bool {
    let sampled = axis.position(slab.end).is_some();
    if !sampled {
        warn!(
            "the sampled window misses the slab end {}, its infinite material density won't show up",
            slab.end
        );
    }
    sampled
}

/// The margin expressed in whole steps of the given size.
fn margin_steps(margin: f64, step: f64) -> usize {
    (margin / step).round() as usize
}
