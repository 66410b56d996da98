use itertools::izip;
use log::debug;

use crate::layers::{LayerCollection, LayerDistribution};

/// The aggregate curves of a sequence of independent layers, aligned to their shared axis.
///
/// * `material_density_sum`: the densities of all layers added up.
/// * `free_flight_probability_sum`: the probability densities of all layers added up.
/// * `absorption_combined`: the probability that any of the layers has absorbed the ray
///   by each distance.
/// * `transmittance_combined`: the probability that the ray has passed all layers unabsorbed.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeDistribution {
    pub material_density_sum: Vec<f64>,
    pub free_flight_probability_sum: Vec<f64>,
    pub absorption_combined: Vec<f64>,
    pub transmittance_combined: Vec<f64>,
}

impl CompositeDistribution {
    /// The composition of zero layers: no density, nothing absorbed, everything transmitted.
    pub fn identity(len: usize) -> Self {
        Self {
            material_density_sum: vec![0f64; len],
            free_flight_probability_sum: vec![0f64; len],
            absorption_combined: vec![0f64; len],
            transmittance_combined: vec![1f64; len],
        }
    }

    pub fn len(&self) -> usize {
        self.material_density_sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material_density_sum.is_empty()
    }

    /// Put the given layer downstream of everything composed so far.
    /// Assumes the layer has as many samples as this composition.
    fn absorb(&mut self, layer: &LayerDistribution) {
        for (
            density_sum,
            probability_sum,
            absorption,
            transmittance,
            density,
            probability,
            cumulative,
        ) in izip!(
            &mut self.material_density_sum,
            &mut self.free_flight_probability_sum,
            &mut self.absorption_combined,
            &mut self.transmittance_combined,
            layer.material_densities(),
            layer.probability_densities(),
            layer.cumulative_probabilities(),
        ) {
            let survival = 1f64 - cumulative;
            *density_sum += density;
            *probability_sum += probability;
            *absorption = (1f64 - *absorption).mul_add(-survival, 1f64);
            *transmittance *= survival;
        }
    }

    /// The largest finite material density, skipping the infinite trailing-edge values.
    /// Useful as an upper bound when clipping the curve for log-scaled display.
    pub fn finite_material_density_max(&self) -> Option<f64> {
        self.material_density_sum
            .iter()
            .copied()
            .filter(|density| density.is_finite())
            .reduce(f64::max)
    }
}

/// The state of the composition right before and right after one layer was added,
/// together with the curves of that layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerBand {
    pub name: String,
    pub layer: LayerDistribution,
    pub previous: CompositeDistribution,
    pub accumulated: CompositeDistribution,
}

impl LayerBand {
    /// What this layer added to each curve, i.e. the band a stacked plot draws for it.
    ///
    /// The two sums grow by exactly the layer's own densities, also where an upstream
    /// layer's trailing edge already made them infinite.
    /// Absorption and transmittance grow by `accumulated - previous`.
    pub fn increment(&self) -> CompositeDistribution {
        CompositeDistribution {
            material_density_sum: self.layer.material_densities().to_vec(),
            free_flight_probability_sum: self.layer.probability_densities().to_vec(),
            absorption_combined: difference(
                &self.accumulated.absorption_combined,
                &self.previous.absorption_combined,
            ),
            transmittance_combined: difference(
                &self.accumulated.transmittance_combined,
                &self.previous.transmittance_combined,
            ),
        }
    }
}

fn difference(accumulated: &[f64], previous: &[f64]) -> Vec<f64> {
    accumulated
        .iter()
        .zip(previous)
        .map(|(accumulated, previous)| accumulated - previous)
        .collect()
}

/// The final composition together with the band each layer contributed, in layer order.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub totals: CompositeDistribution,
    pub bands: Vec<LayerBand>,
}

/// Compose all layers of the collection in order.
/// An empty collection yields [`CompositeDistribution::identity`].
pub fn compose(collection: &LayerCollection) -> CompositeDistribution {
    let mut composite = CompositeDistribution::identity(collection.axis().len());
    for (name, layer) in collection.iter() {
        debug!("composing layer \"{name}\"");
        composite.absorb(layer);
    }
    composite
}

/// Compose all layers of the collection in order, keeping the state before and after
/// each layer as a [`LayerBand`].
pub fn compose_with_bands(collection: &LayerCollection) -> Composition {
    let mut totals = CompositeDistribution::identity(collection.axis().len());
    let mut bands = Vec::with_capacity(collection.len());
    for (name, layer) in collection.iter() {
        debug!("composing layer \"{name}\" with bands");
        let previous = totals.clone();
        totals.absorb(layer);
        bands.push(LayerBand {
            name: name.to_owned(),
            layer: layer.clone(),
            previous,
            accumulated: totals.clone(),
        });
    }
    Composition { totals, bands }
}

#[cfg(test)]
mod tests {
    use super::{compose, compose_with_bands, difference, CompositeDistribution};
    use crate::{
        axis::DistanceAxis,
        layers::{LayerCollection, LayerDistribution},
        test_utils::assert_curve_abs_diff_eq,
    };

    fn collection(layers: &[(&str, [f64; 3])]) -> LayerCollection {
        let axis = DistanceAxis::new(vec![0f64, 1f64, 2f64]).unwrap();
        LayerCollection::from_layers(
            axis,
            layers.iter().map(|(name, cumulative)| {
                (
                    *name,
                    LayerDistribution::new(vec![1f64; 3], vec![0.5; 3], cumulative.to_vec())
                        .unwrap(),
                )
            }),
        )
        .unwrap()
    }

    #[test]
    fn empty_collection_is_identity() {
        let composite = compose(&collection(&[]));
        assert_eq!(CompositeDistribution::identity(3), composite);
        assert_eq!(vec![1f64; 3], composite.transmittance_combined);
    }

    #[test]
    fn two_layers_compose_independently() {
        let composite = compose(&collection(&[
            ("a", [0f64, 0.5, 1f64]),
            ("b", [0.2, 0.5, 0.5]),
        ]));
        assert_curve_abs_diff_eq(&[2f64; 3], &composite.material_density_sum);
        assert_curve_abs_diff_eq(&[1f64; 3], &composite.free_flight_probability_sum);
        assert_curve_abs_diff_eq(&[0.2, 0.75, 1f64], &composite.absorption_combined);
        assert_curve_abs_diff_eq(&[0.8, 0.25, 0f64], &composite.transmittance_combined);
    }

    #[test]
    fn bands_chain_previous_to_accumulated() {
        let composition = compose_with_bands(&collection(&[
            ("a", [0f64, 0.5, 1f64]),
            ("b", [0.2, 0.5, 0.5]),
        ]));
        assert_eq!(2, composition.bands.len());
        assert_eq!("a", composition.bands[0].name);
        assert_eq!(CompositeDistribution::identity(3), composition.bands[0].previous);
        assert_eq!(composition.bands[0].accumulated, composition.bands[1].previous);
        assert_eq!(composition.totals, composition.bands[1].accumulated);
    }

    #[test]
    fn band_increment_of_second_layer() {
        let composition = compose_with_bands(&collection(&[
            ("a", [0f64, 0.5, 1f64]),
            ("b", [0.2, 0.5, 0.5]),
        ]));
        let increment = composition.bands[1].increment();
        assert_curve_abs_diff_eq(&[1f64; 3], &increment.material_density_sum);
        assert_curve_abs_diff_eq(&[0.2, 0.25, 0f64], &increment.absorption_combined);
        assert_curve_abs_diff_eq(&[-0.2, -0.25, 0f64], &increment.transmittance_combined);
    }

    #[test]
    fn band_increment_is_the_layers_own_density_behind_an_infinite_edge() {
        let axis = DistanceAxis::new(vec![0f64, 1f64, 2f64]).unwrap();
        let upstream = LayerDistribution::new(
            vec![1f64, f64::INFINITY, 0f64],
            vec![1f64, 1f64, 0f64],
            vec![0f64, 1f64, 1f64],
        )
        .unwrap();
        let downstream =
            LayerDistribution::new(vec![0f64, 0f64, 1f64], vec![0f64, 0f64, 1f64], vec![0f64; 3])
                .unwrap();
        let collection =
            LayerCollection::from_layers(axis, [("upstream", upstream), ("downstream", downstream)])
                .unwrap();
        let composition = compose_with_bands(&collection);
        assert_eq!(f64::INFINITY, composition.totals.material_density_sum[1]);
        let increment = composition.bands[1].increment();
        assert_eq!(vec![0f64, 0f64, 1f64], increment.material_density_sum);
        assert_eq!(vec![0f64, 0f64, 1f64], increment.free_flight_probability_sum);
        assert_eq!(
            vec![1f64, f64::INFINITY, 0f64],
            composition.bands[0].increment().material_density_sum
        );
    }

    #[test]
    fn difference_subtracts_elementwise() {
        assert_eq!(vec![0.5, 0f64], difference(&[0.75, 1f64], &[0.25, 1f64]));
    }

    #[test]
    fn finite_maximum_skips_infinity() {
        let mut composite = CompositeDistribution::identity(3);
        composite.material_density_sum = vec![1f64, 7f64, f64::INFINITY];
        assert_eq!(Some(7f64), composite.finite_material_density_max());
        assert_eq!(None, CompositeDistribution::identity(0).finite_material_density_max());
    }
}
