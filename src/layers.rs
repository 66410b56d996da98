use std::fmt;

use itertools::Itertools;

use crate::{
    axis::DistanceAxis,
    error::{DistributionError, Result},
};

/// Names the three per-layer curves, mostly for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    MaterialDensity,
    ProbabilityDensity,
    CumulativeProbability,
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MaterialDensity => "material densities",
            Self::ProbabilityDensity => "probability densities",
            Self::CumulativeProbability => "cumulative probabilities",
        })
    }
}

/// The three characteristic curves of one material layer, sampled along a [`DistanceAxis`].
///
/// * `material_densities`: the local absorption coefficient. May contain `f64::INFINITY`
///   at the trailing edge of a slab.
/// * `probability_densities`: the free-flight probability density.
/// * `cumulative_probabilities`: the probability that absorption has occurred by each distance.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerDistribution {
    material_densities: Vec<f64>,
    probability_densities: Vec<f64>,
    cumulative_probabilities: Vec<f64>,
}

impl LayerDistribution {
    /// Create a layer from three parallel curves.
    ///
    /// # Errors
    ///
    /// * If the curves differ in length.
    /// * If a material density is NaN or negative.
    /// * If a probability density is not finite or negative.
    /// * If a cumulative probability is not within `[0, 1]` or decreases.
    pub fn new(
        material_densities: Vec<f64>,
        probability_densities: Vec<f64>,
        cumulative_probabilities: Vec<f64>,
    ) -> Result<Self> {
        let expected = material_densities.len();
        for (curve, values) in [
            (Curve::ProbabilityDensity, &probability_densities),
            (Curve::CumulativeProbability, &cumulative_probabilities),
        ] {
            if values.len() != expected {
                return Err(DistributionError::ShapeMismatch {
                    curve,
                    expected,
                    actual: values.len(),
                });
            }
        }

        check_values(Curve::MaterialDensity, &material_densities, |value| {
            if value.is_nan() {
                Some("not a number")
            } else if value < 0f64 {
                Some("densities must not be negative")
            } else {
                None
            }
        })?;
        check_values(Curve::ProbabilityDensity, &probability_densities, |value| {
            if !value.is_finite() {
                Some("probability densities must be finite")
            } else if value < 0f64 {
                Some("densities must not be negative")
            } else {
                None
            }
        })?;
        check_values(
            Curve::CumulativeProbability,
            &cumulative_probabilities,
            |value| {
                if (0f64..=1f64).contains(&value) {
                    None
                } else {
                    Some("probabilities must lie within [0, 1]")
                }
            },
        )?;
        if let Some((index, (_, next))) = cumulative_probabilities
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (previous, next))| next < previous)
        {
            return Err(DistributionError::InvalidValue {
                curve: Curve::CumulativeProbability,
                index: index + 1,
                value: *next,
                reason: "cumulative probabilities must not decrease",
            });
        }

        Ok(Self::from_parts(
            material_densities,
            probability_densities,
            cumulative_probabilities,
        ))
    }

    /// Create a layer without validating it. Only for curves that are valid by construction.
    pub(crate) const fn from_parts(
        material_densities: Vec<f64>,
        probability_densities: Vec<f64>,
        cumulative_probabilities: Vec<f64>,
    ) -> Self {
        Self {
            material_densities,
            probability_densities,
            cumulative_probabilities,
        }
    }

    pub fn material_densities(&self) -> &[f64] {
        &self.material_densities
    }

    pub fn probability_densities(&self) -> &[f64] {
        &self.probability_densities
    }

    pub fn cumulative_probabilities(&self) -> &[f64] {
        &self.cumulative_probabilities
    }

    /// The probability of passing each distance without being absorbed by this layer.
    pub fn transmittances(&self) -> Vec<f64> {
        self.cumulative_probabilities
            .iter()
            .map(|cumulative| 1f64 - cumulative)
            .collect()
    }

    /// The number of samples per curve.
    pub fn len(&self) -> usize {
        self.material_densities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material_densities.is_empty()
    }

    /// Split this layer back into its material density, probability density and
    /// cumulative probability curves.
    pub fn into_curves(self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            self.material_densities,
            self.probability_densities,
            self.cumulative_probabilities,
        )
    }
}

/// Return an `InvalidValue` error for the first value `reject` has a complaint about.
fn check_values<F>(curve: Curve, values: &[f64], reject: F) -> Result<()>
where
    F: Fn(f64) -> Option<&'static str>,
{
    for (index, &value) in values.iter().enumerate() {
        if let Some(reason) = reject(value) {
            return Err(DistributionError::InvalidValue {
                curve,
                index,
                value,
                reason,
            });
        }
    }
    Ok(())
}

/// Named layers sharing one [`DistanceAxis`], kept in insertion order.
/// The order is the order in which a ray passes the layers, the first layer being the most upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerCollection {
    axis: DistanceAxis,
    layers: Vec<(String, LayerDistribution)>,
}

impl LayerCollection {
    /// Create an empty collection over the given axis.
    pub const fn new(axis: DistanceAxis) -> Self {
        Self {
            axis,
            layers: Vec::new(),
        }
    }

    /// Create a collection over the given axis containing all given layers in order.
    ///
    /// # Errors
    ///
    /// * See [`LayerCollection::push`].
    pub fn from_layers<I, S>(axis: DistanceAxis, layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, LayerDistribution)>,
        S: Into<String>,
    {
        let mut collection = Self::new(axis);
        for (name, layer) in layers {
            collection.push(name, layer)?;
        }
        Ok(collection)
    }

    /// Append a layer downstream of all layers already in this collection.
    ///
    /// # Errors
    ///
    /// * If a layer with the same name already exists.
    /// * If the layer's curves don't have one sample per distance of this collection's axis.
    pub fn push<S: Into<String>>(&mut self, name: S, layer: LayerDistribution) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(DistributionError::DuplicateLayer(name));
        }
        if layer.len() != self.axis.len() {
            return Err(DistributionError::ShapeMismatch {
                curve: Curve::MaterialDensity,
                expected: self.axis.len(),
                actual: layer.len(),
            }
            .in_layer(&name));
        }
        self.layers.push((name, layer));
        Ok(())
    }

    pub const fn axis(&self) -> &DistanceAxis {
        &self.axis
    }

    /// The number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Fail if this collection holds no layers, for callers that need at least one.
    ///
    /// # Errors
    ///
    /// * If the collection is empty.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.layers.is_empty() {
            Err(DistributionError::EmptyCollection)
        } else {
            Ok(())
        }
    }

    pub fn get(&self, name: &str) -> Option<&LayerDistribution> {
        self.layers
            .iter()
            .find(|(layer_name, _)| layer_name == name)
            .map(|(_, layer)| layer)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over all layers in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayerDistribution)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    /// Return the same layers applied in the opposite order.
    pub fn reversed(&self) -> Self {
        Self {
            axis: self.axis.clone(),
            layers: self.layers.iter().rev().cloned().collect(),
        }
    }

    pub fn into_parts(self) -> (DistanceAxis, Vec<(String, LayerDistribution)>) {
        (self.axis, self.layers)
    }
}
