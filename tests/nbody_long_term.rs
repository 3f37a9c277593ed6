mod common;

use cometprop::constants::GAUSS_GRAV_SQUARED;
use cometprop::ephemeris::{PerturberEphemeris, Planet};
use cometprop::nbody::{IntegratorSettings, NBodyPropagator};
use cometprop::two_body::TwoBodyPropagator;

use common::encke_like_elements;

#[test]
fn test_unperturbed_energy_over_fifty_years() {
    let elements = encke_like_elements();
    let propagator = NBodyPropagator::new(
        elements,
        &[],
        PerturberEphemeris::analytic_only().unwrap(),
        IntegratorSettings::default(),
    )
    .unwrap();

    let start = elements.epoch();
    let solution = propagator
        .propagate_range(start, start + 50.0 * 365.25, 51)
        .unwrap();
    let e0 = solution.states[0].specific_energy(GAUSS_GRAV_SQUARED);
    for state in &solution.states {
        let drift = ((state.specific_energy(GAUSS_GRAV_SQUARED) - e0) / e0).abs();
        assert!(drift < 1e-3, "energy drift {drift} at JD {}", state.time);
    }
    assert!(solution.ephemeris_usage.lookups.is_empty());
}

#[test]
fn test_perturbed_and_unperturbed_agree_at_epoch() {
    let elements = encke_like_elements();
    let ephemeris = PerturberEphemeris::analytic_only().unwrap();
    let propagator = NBodyPropagator::new(
        elements,
        &[Planet::Jupiter, Planet::Saturn, Planet::Jupiter],
        ephemeris,
        IntegratorSettings::default(),
    )
    .unwrap();
    assert_eq!(propagator.perturbers(), &[Planet::Jupiter, Planet::Saturn]);

    let kepler = TwoBodyPropagator::new(elements).unwrap();
    let at_epoch = propagator.propagate(elements.epoch()).unwrap();
    common::assert_state_close(&at_epoch, &kepler.propagate(elements.epoch()).unwrap(), 1e-14);

    // a few weeks out the planets have barely acted
    let later = elements.epoch() + 30.0;
    let perturbed = propagator.propagate(later).unwrap();
    let unperturbed = kepler.propagate(later).unwrap();
    let offset = (perturbed.position - unperturbed.position).norm();
    assert!(offset > 0.0 && offset < 1e-3, "offset {offset}");
}

#[test]
fn test_dense_output_matches_sampled_solve() {
    let elements = encke_like_elements();
    let propagator = NBodyPropagator::new(
        elements,
        &[Planet::Jupiter],
        PerturberEphemeris::analytic_only().unwrap(),
        IntegratorSettings {
            max_step: 5.0,
            ..IntegratorSettings::default()
        },
    )
    .unwrap();

    let start = elements.epoch();
    let end = start + 400.0;
    let dense = propagator.dense(start, end).unwrap();
    let sampled = propagator.propagate_range(start, end, 9).unwrap();

    for state in &sampled.states {
        let interpolated = dense.state_at(state.time).unwrap();
        let dr = (interpolated.position - state.position).norm();
        assert!(dr < 1e-6, "dense/sampled mismatch {dr} at JD {}", state.time);
    }
    assert!(dense.state_at(end + 1.0).is_err());
}
