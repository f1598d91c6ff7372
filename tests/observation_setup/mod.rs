use crate::test_environment;
use approx::{assert_abs_diff_eq, assert_relative_eq};
use hemera::linalg::{DVector, Vector6, U1, U2, U3};
use hemera::od::bias::{create_bias_calculator, ObservationBias};
use hemera::od::doppler::create_proper_time_rate_calculator;
use hemera::od::link::{link_end_indices, LinkEndId, LinkEndType, LinkEnds};
use hemera::od::model::{ObservationModel, ObservationModelBuilder};
use hemera::od::settings::{
    LightTimeCorrectionSettings, ObservationBiasSettings, ObservationSettings,
    ProperTimeRateSettings,
};
use hemera::od::simulator::{
    create_observation_simulators_unsorted, ObservationSimulatorSet,
};
use hemera::od::viability::{create_viability_calculators, ViabilityCalculator, ViabilitySettings};
use hemera::od::{ObsError, ObservableType};
use hemera::time::{Epoch, TimeUnits, Unit};
use rstest::rstest;
use std::sync::Arc;

fn epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2023, 11, 16)
}

fn earth_moon() -> LinkEnds {
    LinkEnds::one_way(LinkEndId::body("Earth"), LinkEndId::body("Moon"))
}

#[test]
fn one_way_range_evaluates_to_separation() {
    let env = test_environment();
    let settings = ObservationSettings::one_way_range(Vec::new(), None);
    let model = ObservationModelBuilder::<U1>::build(&earth_moon(), &settings, &env).unwrap();

    assert_eq!(model.observable_type(), ObservableType::OneWayRange);
    let (observed, times) = model.observe_with_times(epoch());
    assert_relative_eq!(observed[0], 384_400.0, max_relative = 1e-9);
    // Transmission precedes reception by the light time.
    assert!(times[0] < times[1]);
    assert_eq!(times[1], epoch());
}

#[test]
fn one_way_range_applies_constant_bias() {
    let env = test_environment();
    let settings = ObservationSettings::one_way_range(
        Vec::new(),
        Some(ObservationBiasSettings::ConstantAbsolute(
            DVector::from_element(1, 0.25),
        )),
    );
    let model = ObservationModelBuilder::<U1>::build(&earth_moon(), &settings, &env).unwrap();
    assert_relative_eq!(model.observe(epoch())[0], 384_400.25, max_relative = 1e-9);
}

#[test]
fn constant_bias_of_wrong_length_is_rejected() {
    let env = test_environment();
    let settings = ObservationSettings::one_way_range(
        Vec::new(),
        Some(ObservationBiasSettings::ConstantAbsolute(
            DVector::from_element(3, 0.25),
        )),
    );
    let err = ObservationModelBuilder::<U1>::build(&earth_moon(), &settings, &env).unwrap_err();
    assert_eq!(
        err,
        ObsError::DimensionMismatch {
            expected: 1,
            got: 3
        }
    );
}

#[test]
fn arc_wise_bias_selects_latest_started_arc() {
    let env = test_environment();
    let t0 = epoch();
    let settings = ObservationBiasSettings::ArcWiseAbsolute {
        arc_start_times: vec![t0, t0 + 10.0.seconds(), t0 + 20.0.seconds()],
        biases: vec![
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 2.0),
            DVector::from_element(1, 3.0),
        ],
        time_link_end: LinkEndType::Receiver,
    };
    let calculator =
        create_bias_calculator::<U1>(&earth_moon(), ObservableType::OneWayRange, &settings, &env)
            .unwrap();

    let computed = hemera::linalg::Vector1::new(0.0);
    // The receiver time of a one-way observable sits at index 1.
    let at = |offset_s: f64| {
        let rx = t0 + Unit::Second * offset_s;
        calculator.bias(&[rx - 1.0.seconds(), rx], &computed)[0]
    };
    assert_eq!(at(15.0), 2.0);
    assert_eq!(at(25.0), 3.0);
    assert_eq!(at(-5.0), 1.0);
}

#[test]
fn n_way_range_chains_all_legs() {
    let env = test_environment();
    let link_ends = LinkEnds::chain(vec![
        LinkEndId::body("Earth"),
        LinkEndId::body("Relay-1"),
        LinkEndId::body("Relay-2"),
        LinkEndId::body("Moon"),
    ]);
    let settings = ObservationSettings::n_way_range_uniform(Vec::new(), 4, None, None);
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &settings, &env).unwrap();

    // Three legs along the x axis sum to the full separation.
    let (observed, times) = model.observe_with_times(epoch());
    assert_relative_eq!(observed[0], 384_400.0, max_relative = 1e-9);
    assert_eq!(times.len(), 6);

    // Retransmission delays lengthen the observable.
    let delayed = ObservationSettings::n_way_range_uniform(
        Vec::new(),
        4,
        Some(Arc::new(|_| vec![1.0.seconds(), 1.0.seconds()])),
        None,
    );
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &delayed, &env).unwrap();
    assert!(model.observe(epoch())[0] > 384_400.0);
}

#[test]
fn n_way_range_without_receiver_is_rejected() {
    let env = test_environment();
    let mut link_ends = LinkEnds::chain(vec![
        LinkEndId::body("Earth"),
        LinkEndId::body("Relay-1"),
        LinkEndId::body("Relay-2"),
        LinkEndId::body("Moon"),
    ]);
    link_ends.remove(LinkEndType::Receiver);

    let settings = ObservationSettings::n_way_range_uniform(Vec::new(), 3, None, None);
    let err = ObservationModelBuilder::<U1>::build(&link_ends, &settings, &env).unwrap_err();
    assert!(matches!(
        err,
        ObsError::InvalidLinkEndTopology {
            observable: ObservableType::NWayRange,
            ..
        }
    ));
}

#[test]
fn n_way_range_leg_count_must_match_hops() {
    let env = test_environment();
    let link_ends = LinkEnds::chain(vec![
        LinkEndId::body("Earth"),
        LinkEndId::body("Relay-1"),
        LinkEndId::body("Moon"),
    ]);
    // Two hops, three constituent links.
    let settings = ObservationSettings::n_way_range_uniform(Vec::new(), 4, None, None);
    let err = ObservationModelBuilder::<U1>::build(&link_ends, &settings, &env).unwrap_err();
    assert!(matches!(err, ObsError::InvalidSettings { .. }));
}

#[test]
fn two_way_doppler_requires_a_reflector() {
    let env = test_environment();
    let settings = ObservationSettings::two_way_doppler_from_corrections(Vec::new(), None);
    let err = ObservationModelBuilder::<U1>::build(&earth_moon(), &settings, &env).unwrap_err();
    assert!(matches!(
        err,
        ObsError::InvalidLinkEndTopology {
            observable: ObservableType::TwoWayDoppler,
            ..
        }
    ));
}

#[test]
fn two_way_doppler_synthesized_legs_inherit_corrections() {
    let env = test_environment();
    let link_ends = LinkEnds::two_way(
        LinkEndId::body("Earth"),
        LinkEndId::body("Relay-1"),
        LinkEndId::body("Moon"),
    );

    // Static geometry: both legs see zero range rate.
    let plain = ObservationSettings::two_way_doppler_from_corrections(Vec::new(), None);
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &plain, &env).unwrap();
    assert_abs_diff_eq!(model.observe(epoch())[0], 0.0, epsilon = 1e-12);

    // The synthesized legs carry the parent's corrections: a correction
    // naming an unknown perturber must fail inside the legs.
    let broken = ObservationSettings::two_way_doppler_from_corrections(
        vec![LightTimeCorrectionSettings::FirstOrderRelativistic {
            perturbing_bodies: vec!["Nemesis".to_string()],
        }],
        None,
    );
    let err = ObservationModelBuilder::<U1>::build(&link_ends, &broken, &env).unwrap_err();
    assert_eq!(
        err,
        ObsError::BodyNotFound {
            body: "Nemesis".to_string()
        }
    );
}

#[test]
fn two_way_doppler_accepts_explicit_legs() {
    let env = test_environment();
    let link_ends = LinkEnds::two_way(
        LinkEndId::body("Earth"),
        LinkEndId::body("Relay-1"),
        LinkEndId::body("Moon"),
    );
    let leg = |rate: Option<ProperTimeRateSettings>| {
        ObservationSettings::one_way_doppler_with_rates(Vec::new(), rate, None, None)
    };
    let settings = ObservationSettings::two_way_doppler(
        leg(Some(ProperTimeRateSettings::DirectFirstOrder {
            central_body: "Sun".to_string(),
        })),
        leg(None),
        None,
    );
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &settings, &env).unwrap();
    // The proper time rate at the transmitter shifts the composition away from zero.
    assert_abs_diff_eq!(model.observe(epoch())[0], 0.0, epsilon = 1e-7);
    assert_ne!(model.observe(epoch())[0], 0.0);

    // A constituent link of the wrong type is rejected.
    let broken = ObservationSettings::two_way_doppler(
        ObservationSettings::one_way_range(Vec::new(), None),
        leg(None),
        None,
    );
    let err = ObservationModelBuilder::<U1>::build(&link_ends, &broken, &env).unwrap_err();
    assert!(matches!(err, ObsError::InvalidSettings { .. }));
}

#[test]
fn proper_time_rate_rejects_central_body_as_link_end() {
    let env = test_environment();
    let settings = ProperTimeRateSettings::DirectFirstOrder {
        central_body: "Earth".to_string(),
    };
    let err = create_proper_time_rate_calculator(
        &settings,
        &earth_moon(),
        &env,
        LinkEndType::Transmitter,
    )
    .unwrap_err();
    assert!(matches!(err, ObsError::Unsupported { .. }));

    // About a body that is not a link end, the calculator is well defined
    // and slows the clock.
    let settings = ProperTimeRateSettings::DirectFirstOrder {
        central_body: "Sun".to_string(),
    };
    let calculator =
        create_proper_time_rate_calculator(&settings, &earth_moon(), &env, LinkEndType::Receiver)
            .unwrap();
    let state = Vector6::new(7000.0, 0.0, 0.0, 0.0, 7.5, 0.0);
    assert!(calculator.proper_time_rate(epoch(), &state) < 0.0);
}

#[test]
fn differenced_range_tracks_a_receding_target() {
    use hemera::cosmic::{Body, Environment, FixedEphemeris, LinearEphemeris};
    use hemera::linalg::Vector3;

    let mut env = Environment::new();
    env.add_body(
        "Earth",
        Body::builder()
            .ephemeris(Arc::new(FixedEphemeris::at_position(Vector3::zeros())))
            .build(),
    );
    // One km/s straight away from the receiver.
    env.add_body(
        "Probe",
        Body::builder()
            .ephemeris(Arc::new(LinearEphemeris::new(
                epoch(),
                Vector6::new(1.0e5, 0.0, 0.0, 1.0, 0.0, 0.0),
            )))
            .build(),
    );
    let link_ends = LinkEnds::one_way(LinkEndId::body("Probe"), LinkEndId::body("Earth"));

    let settings = ObservationSettings::differenced_range(
        Arc::new(|_| 60.0.seconds()),
        Vec::new(),
        None,
    );
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &settings, &env).unwrap();
    assert_relative_eq!(model.observe(epoch())[0], 1.0, max_relative = 1e-3);

    // An opening link also drives the Doppler shift negative.
    let doppler = ObservationSettings::one_way_doppler(Vec::new(), None);
    let model = ObservationModelBuilder::<U1>::build(&link_ends, &doppler, &env).unwrap();
    assert!(model.observe(epoch())[0] < 0.0);
}

#[test]
fn differenced_range_is_zero_for_static_geometry() {
    let env = test_environment();
    let settings = ObservationSettings::differenced_range(
        Arc::new(|_| 60.0.seconds()),
        Vec::new(),
        None,
    );
    let model = ObservationModelBuilder::<U1>::build(&earth_moon(), &settings, &env).unwrap();
    let (observed, times) = model.observe_with_times(epoch());
    assert_abs_diff_eq!(observed[0], 0.0, epsilon = 1e-12);
    // Four events: start leg then end leg.
    assert_eq!(times.len(), 4);
    assert_eq!(times[3], epoch());
}

#[test]
fn angular_position_points_at_the_transmitter() {
    let env = test_environment();
    let link_ends = LinkEnds::one_way(LinkEndId::body("Moon"), LinkEndId::body("Earth"));
    let settings = ObservationSettings::angular_position(Vec::new(), None);
    let model = ObservationModelBuilder::<U2>::build(&link_ends, &settings, &env).unwrap();

    let observed = model.observe(epoch());
    // The Moon of this environment sits on the +x axis.
    assert_abs_diff_eq!(observed[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(observed[1], 0.0, epsilon = 1e-12);
}

#[test]
fn position_observable_validations() {
    let env = test_environment();
    let observed_moon = LinkEnds::observed(LinkEndId::body("Moon"));

    let settings = ObservationSettings::position_observable(None);
    let model = ObservationModelBuilder::<U3>::build(&observed_moon, &settings, &env).unwrap();
    let position = model.observe(epoch());
    assert_relative_eq!(position[0], 384_400.0, max_relative = 1e-12);

    // Light time corrections make no sense on a direct state readout.
    let mut corrected = ObservationSettings::position_observable(None);
    corrected.light_time_corrections = vec![LightTimeCorrectionSettings::FirstOrderRelativistic {
        perturbing_bodies: vec!["Sun".to_string()],
    }];
    assert!(matches!(
        ObservationModelBuilder::<U3>::build(&observed_moon, &corrected, &env).unwrap_err(),
        ObsError::InvalidSettings { .. }
    ));

    // Reference points are not observable yet.
    let station = LinkEnds::observed(LinkEndId::station("Earth", "DSS-65"));
    assert!(matches!(
        ObservationModelBuilder::<U3>::build(&station, &settings, &env).unwrap_err(),
        ObsError::Unsupported { .. }
    ));

    // Wrong dimension for this size.
    assert!(matches!(
        ObservationModelBuilder::<U3>::build(
            &earth_moon(),
            &ObservationSettings::one_way_range(Vec::new(), None),
            &env
        )
        .unwrap_err(),
        ObsError::UnsupportedObservable { size: 3, .. }
    ));
}

#[test]
fn simulators_group_models_per_observable_type() {
    extern crate pretty_env_logger;
    let _ = pretty_env_logger::try_init();

    let env = test_environment();
    let range = ObservationSettings::one_way_range(Vec::new(), None);
    let doppler = ObservationSettings::one_way_doppler(Vec::new(), None);
    let em = earth_moon();
    let ev = LinkEnds::one_way(LinkEndId::body("Earth"), LinkEndId::body("Vehicle"));

    let unsorted = vec![
        (em.clone(), range.clone()),
        (ev.clone(), range.clone()),
        (em.clone(), doppler.clone()),
        (LinkEnds::observed(LinkEndId::body("Moon")), ObservationSettings::position_observable(None)),
    ];
    let simulators = create_observation_simulators_unsorted(unsorted, &env).unwrap();

    assert_eq!(simulators.len(), 3);
    match &simulators[&ObservableType::OneWayRange] {
        ObservationSimulatorSet::Scalar(sim) => {
            assert_eq!(sim.len(), 2);
            assert!(sim.model(&em).is_some());
            assert!(sim.model(&ev).is_some());

            let observed = sim.observe_all(epoch());
            assert_eq!(observed.len(), 2);
            assert_relative_eq!(observed[&em][0], 384_400.0, max_relative = 1e-9);
            assert_relative_eq!(
                observed[&em][0],
                env.state_in_base_frame("Moon", epoch()).unwrap()[0],
                max_relative = 1e-9
            );
        }
        _ => panic!("one-way range must build a scalar simulator"),
    }
    match &simulators[&ObservableType::PositionObservable] {
        ObservationSimulatorSet::Cartesian(sim) => assert_eq!(sim.len(), 1),
        _ => panic!("position observable must build a cartesian simulator"),
    }

    // Duplicate settings for the same link ends and type are an error, not a
    // silent overwrite.
    let duplicated = vec![(em.clone(), range.clone()), (em, range)];
    assert!(matches!(
        create_observation_simulators_unsorted(duplicated, &env).unwrap_err(),
        ObsError::InvalidSettings { .. }
    ));
}

#[rstest]
#[case(ObservableType::OneWayRange, LinkEndType::Transmitter, vec![0])]
#[case(ObservableType::OneWayRange, LinkEndType::Receiver, vec![1])]
#[case(ObservableType::OneWayDifferencedRange, LinkEndType::Transmitter, vec![0, 2])]
#[case(ObservableType::TwoWayDoppler, LinkEndType::Reflector(1), vec![1, 2])]
fn link_end_index_convention(
    #[case] observable: ObservableType,
    #[case] role: LinkEndType,
    #[case] expected: Vec<usize>,
) {
    let n = match observable {
        ObservableType::TwoWayDoppler => 3,
        _ => 2,
    };
    assert_eq!(link_end_indices(observable, n, role).unwrap(), expected);
}

#[test]
fn elevation_viability_fans_out_to_stations() {
    let env = test_environment();
    let link_ends = LinkEnds::one_way(
        LinkEndId::station("Earth", "DSS-65"),
        LinkEndId::body("Vehicle"),
    );
    // No station named: every ground station of Earth gets its own check.
    let settings = vec![ViabilitySettings::MinimumElevationAngle {
        link_end: LinkEndId::body("Earth"),
        min_elevation_deg: 10.0,
    }];
    let calculators =
        create_viability_calculators(&env, &link_ends, ObservableType::OneWayRange, &settings)
            .unwrap();
    assert_eq!(calculators.len(), 1);

    let station = Vector6::new(6378.137, 0.0, 0.0, 0.0, 0.0, 0.0);
    let overhead = Vector6::new(20_000.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let on_horizon = Vector6::new(6378.137, 100_000.0, 0.0, 0.0, 0.0, 0.0);
    let times = [epoch(), epoch()];
    assert!(calculators[0].is_viable(&[station, overhead], &times));
    assert!(!calculators[0].is_viable(&[station, on_horizon], &times));
}

#[test]
fn occultation_viability_blocks_crossing_lines_of_sight() {
    let env = test_environment();
    let link_ends = LinkEnds::one_way(LinkEndId::body("Earth"), LinkEndId::body("Vehicle"));
    let settings = vec![ViabilitySettings::Occultation {
        link_end: LinkEndId::body("Earth"),
        occulting_body: "Moon".to_string(),
    }];
    let calculators =
        create_viability_calculators(&env, &link_ends, ObservableType::OneWayRange, &settings)
            .unwrap();
    assert_eq!(calculators.len(), 1);

    // The Moon sits at x = 384400 km with a 1737 km radius: a link along the
    // x axis through it is occulted, one well off the axis is not.
    let origin = Vector6::zeros();
    let behind_moon = Vector6::new(500_000.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let off_axis = Vector6::new(500_000.0, 300_000.0, 0.0, 0.0, 0.0, 0.0);
    let times = [epoch(), epoch()];
    assert!(!calculators[0].is_viable(&[origin, behind_moon], &times));
    assert!(calculators[0].is_viable(&[origin, off_axis], &times));
}

#[test]
fn avoidance_viability_checks_the_separation_angle() {
    let env = test_environment();
    let link_ends = LinkEnds::one_way(LinkEndId::body("Earth"), LinkEndId::body("Vehicle"));
    let settings = vec![ViabilitySettings::BodyAvoidanceAngle {
        link_end: LinkEndId::body("Earth"),
        body_to_avoid: "Sun".to_string(),
        min_angle_deg: 30.0,
    }];
    let calculators =
        create_viability_calculators(&env, &link_ends, ObservableType::OneWayRange, &settings)
            .unwrap();

    // The Sun sits on the +x axis: looking along +x violates the avoidance
    // angle, looking along +y keeps 90 degrees of separation.
    let origin = Vector6::zeros();
    let sunward = Vector6::new(10_000.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let orthogonal = Vector6::new(0.0, 10_000.0, 0.0, 0.0, 0.0, 0.0);
    let times = [epoch(), epoch()];
    assert!(!calculators[0].is_viable(&[origin, sunward], &times));
    assert!(calculators[0].is_viable(&[origin, orthogonal], &times));
}
