use approx::assert_abs_diff_eq;
use distributions::{
    composer::{compose, compose_with_bands, CompositeDistribution},
    layers::{LayerCollection, LayerDistribution},
    sampler::{sample, sample_layers, SamplerConfig, Slab},
};

/// Two identical unit slabs `[0, 1]` sampled on the same axis.
fn two_unit_slabs() -> LayerCollection {
    let sampled = sample(0f64, 1f64, 1000, 0.1).unwrap();
    LayerCollection::from_layers(
        sampled.axis,
        [("front", sampled.layer.clone()), ("back", sampled.layer)],
    )
    .unwrap()
}

#[test]
fn two_unit_slabs_at_center() {
    let collection = two_unit_slabs();
    let center = collection.axis().position(0.5).unwrap();
    let composite = compose(&collection);
    assert_abs_diff_eq!(0.75, composite.absorption_combined[center]);
    assert_abs_diff_eq!(0.25, composite.transmittance_combined[center]);
    assert_abs_diff_eq!(4f64, composite.material_density_sum[center]);
    assert_abs_diff_eq!(2f64, composite.free_flight_probability_sum[center]);
}

#[test]
fn two_unit_slabs_absorb_everything_at_the_end() {
    let collection = two_unit_slabs();
    let end = collection.axis().position(1f64).unwrap();
    let composite = compose(&collection);
    assert_eq!(f64::INFINITY, composite.material_density_sum[end]);
    assert_abs_diff_eq!(1f64, composite.absorption_combined[end]);
    assert_abs_diff_eq!(0f64, composite.transmittance_combined[end]);
}

#[test]
fn single_layer_round_trip() {
    let sampled = sample(0.2, 0.9, 100, 0.1).unwrap();
    let layer = sampled.layer.clone();
    let collection = LayerCollection::from_layers(sampled.axis, [("only", sampled.layer)]).unwrap();
    let composite = compose(&collection);
    assert_eq!(layer.material_densities(), composite.material_density_sum.as_slice());
    assert_eq!(
        layer.probability_densities(),
        composite.free_flight_probability_sum.as_slice()
    );
    for idx in 0..layer.len() {
        assert_abs_diff_eq!(
            layer.cumulative_probabilities()[idx],
            composite.absorption_combined[idx],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            1f64 - layer.cumulative_probabilities()[idx],
            composite.transmittance_combined[idx],
            epsilon = 1e-12
        );
    }
}

#[test]
fn empty_collection_yields_seed_values() {
    let sampled = sample(0f64, 1f64, 10, 0.1).unwrap();
    let len = sampled.axis.len();
    let composite = compose(&LayerCollection::new(sampled.axis));
    assert_eq!(vec![0f64; len], composite.material_density_sum);
    assert_eq!(vec![0f64; len], composite.free_flight_probability_sum);
    assert_eq!(vec![0f64; len], composite.absorption_combined);
    assert_eq!(vec![1f64; len], composite.transmittance_combined);
}

#[test]
fn staggered_slabs_compose_in_order() {
    let slabs = [
        ("near", Slab::new(0f64, 1f64).unwrap()),
        ("middle", Slab::new(0.5, 1.5).unwrap()),
        ("far", Slab::new(1f64, 3f64).unwrap()),
    ];
    let collection = sample_layers(&slabs, &SamplerConfig::default()).unwrap();
    let composite = compose(&collection);
    let axis = collection.axis();

    // only "near" has started absorbing
    let idx = axis.nearest_index(0.25);
    assert_abs_diff_eq!(axis.distances()[idx], composite.absorption_combined[idx], epsilon = 1e-9);

    // "near" is done, so nothing gets through anymore
    let idx = axis.position(1f64).unwrap();
    assert_abs_diff_eq!(1f64, composite.absorption_combined[idx]);
    assert_abs_diff_eq!(0f64, composite.transmittance_combined[idx]);

    // before anything starts
    assert_eq!(0f64, composite.absorption_combined[0]);
    assert_eq!(1f64, composite.transmittance_combined[0]);
}

#[test]
fn bands_stack_up_to_totals() {
    let slabs = [
        ("a", Slab::new(0f64, 2f64).unwrap()),
        ("b", Slab::new(1f64, 2f64).unwrap()),
    ];
    let collection = sample_layers(&slabs, &SamplerConfig::default()).unwrap();
    let composition = compose_with_bands(&collection);
    assert_eq!(compose(&collection), composition.totals);
    assert_eq!(
        vec!["a", "b"],
        composition
            .bands
            .iter()
            .map(|band| band.name.as_str())
            .collect::<Vec<_>>()
    );

    let mut stacked = CompositeDistribution::identity(collection.axis().len());
    for band in &composition.bands {
        let increment = band.increment();
        for idx in 0..stacked.len() {
            stacked.free_flight_probability_sum[idx] += increment.free_flight_probability_sum[idx];
            stacked.absorption_combined[idx] += increment.absorption_combined[idx];
        }
    }
    for idx in 0..stacked.len() {
        assert_abs_diff_eq!(
            composition.totals.free_flight_probability_sum[idx],
            stacked.free_flight_probability_sum[idx],
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            composition.totals.absorption_combined[idx],
            stacked.absorption_combined[idx],
            epsilon = 1e-9
        );
    }
}

#[test]
fn externally_supplied_layer_composes() {
    let collection = LayerCollection::from_layers(
        distributions::axis::DistanceAxis::new(vec![0f64, 1f64, 2f64, 3f64]).unwrap(),
        [
            (
                "measured",
                LayerDistribution::new(
                    vec![0f64, 0.3, 0.3, 0f64],
                    vec![0f64, 0.2, 0.2, 0f64],
                    vec![0f64, 0.1, 0.4, 0.4],
                )
                .unwrap(),
            ),
            (
                "modelled",
                LayerDistribution::new(
                    vec![0f64, 0f64, 1f64, 1f64],
                    vec![0f64, 0f64, 0.5, 0.5],
                    vec![0f64, 0f64, 0.5, 1f64],
                )
                .unwrap(),
            ),
        ],
    )
    .unwrap();
    let composite = compose(&collection);
    assert_abs_diff_eq!(0.1, composite.absorption_combined[1], epsilon = 1e-12);
    assert_abs_diff_eq!(0.7, composite.absorption_combined[2], epsilon = 1e-12);
    assert_abs_diff_eq!(0.3, composite.transmittance_combined[2], epsilon = 1e-12);
    assert_abs_diff_eq!(1f64, composite.absorption_combined[3], epsilon = 1e-12);
}

#[test]
fn later_band_stays_empty_behind_earlier_trailing_edge() {
    let slabs = [
        ("a", Slab::new(0f64, 1f64).unwrap()),
        ("b", Slab::new(2f64, 3f64).unwrap()),
    ];
    let config = SamplerConfig {
        steps: 10,
        ..SamplerConfig::default()
    };
    let collection = sample_layers(&slabs, &config).unwrap();
    let edge = collection.axis().position(1f64).unwrap();
    let composition = compose_with_bands(&collection);
    assert_eq!(f64::INFINITY, composition.totals.material_density_sum[edge]);

    let b = composition.bands[1].increment();
    assert_eq!(0f64, b.material_density_sum[edge]);
    assert_eq!(0f64, b.free_flight_probability_sum[edge]);
    assert_eq!(
        collection.get("b").unwrap().material_densities(),
        b.material_density_sum.as_slice()
    );
    assert_eq!(f64::INFINITY, composition.bands[0].increment().material_density_sum[edge]);
}
