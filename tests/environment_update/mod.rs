use crate::test_environment;
use hemera::cosmic::{Body, Environment, FixedEphemeris, FlightConditions, InertiallyFixedRotation};
use hemera::dynamics::{
    AccelerationMap, AccelerationModel, MassRateMap, MassRateModel, TorqueMap, TorqueModel,
};
use hemera::linalg::Vector3;
use hemera::propagation::{
    check_validity, full_update_set, updates_from_accelerations, updates_from_dependent_variables,
    updates_from_mass_rates, updates_from_termination, updates_from_torques, DependentVariable,
    DependentVariableRequest, EnvironmentUpdate, TerminationCondition, UpdateError, UpdateSet,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The vehicle of the shared environment has no flight conditions until a
/// resolver attaches them; this helper presets them for validity checks.
fn env_with_vehicle_conditions() -> Environment {
    let mut env = test_environment();
    env.body_mut("Vehicle")
        .unwrap()
        .set_flight_conditions(FlightConditions {
            central_body: "Earth".to_string(),
            atmospheric: true,
        });
    env
}

#[test]
fn validity_requires_the_implied_sub_models() {
    let mut env = Environment::new();
    env.add_body(
        "Eros",
        Body::builder().mass_kg(6.687e15).build(),
    );

    let mut requested = UpdateSet::new();
    requested.add(EnvironmentUpdate::TranslationalState, "Eros");
    assert_eq!(
        check_validity(&requested, &env).unwrap_err(),
        UpdateError::MissingEnvironmentModel {
            body: "Eros".to_string(),
            model: "ephemeris"
        }
    );

    env.add_body(
        "Eros",
        Body::builder()
            .ephemeris(Arc::new(FixedEphemeris::at_position(Vector3::zeros())))
            .mass_kg(6.687e15)
            .build(),
    );
    check_validity(&requested, &env).unwrap();

    // Bodies that do not exist at all are reported as such.
    let mut requested = UpdateSet::new();
    requested.add(EnvironmentUpdate::Mass, "Nemesis");
    assert_eq!(
        check_validity(&requested, &env).unwrap_err(),
        UpdateError::BodyNotFound {
            body: "Nemesis".to_string()
        }
    );

    // Global entries carry an empty body name and are skipped.
    let mut requested = UpdateSet::new();
    requested.add(EnvironmentUpdate::FlightConditions, "");
    check_validity(&requested, &env).unwrap();
}

#[test]
fn accelerations_resolve_to_a_deduplicated_update_set() {
    let env = env_with_vehicle_conditions();

    let mut on_vehicle = BTreeMap::new();
    on_vehicle.insert(
        "Earth".to_string(),
        vec![
            AccelerationModel::PointMassGravity,
            AccelerationModel::SphericalHarmonicGravity,
            AccelerationModel::Aerodynamic,
        ],
    );
    on_vehicle.insert(
        "Moon".to_string(),
        vec![AccelerationModel::ThirdBodyPointMassGravity {
            central_body: "Earth".to_string(),
        }],
    );
    on_vehicle.insert(
        "Sun".to_string(),
        vec![AccelerationModel::CannonballRadiationPressure],
    );
    let mut models = AccelerationMap::new();
    models.insert("Vehicle".to_string(), on_vehicle);

    let updates = updates_from_accelerations(&models, &env).unwrap();

    // Exerting bodies are refreshed, the propagated vehicle is not.
    assert_eq!(
        updates.bodies(EnvironmentUpdate::TranslationalState),
        ["Earth", "Moon", "Sun"]
    );
    assert_eq!(updates.bodies(EnvironmentUpdate::RotationalState), ["Earth"]);
    assert_eq!(
        updates.bodies(EnvironmentUpdate::SphericalHarmonicGravityField),
        ["Earth"]
    );
    assert_eq!(
        updates.bodies(EnvironmentUpdate::FlightConditions),
        ["Vehicle"]
    );
    assert_eq!(
        updates.bodies(EnvironmentUpdate::RadiationPressure),
        ["Vehicle"]
    );
    // Aerodynamic and radiation pressure both ask for the mass: deduplicated.
    assert_eq!(updates.bodies(EnvironmentUpdate::Mass), ["Vehicle"]);
    assert!(!updates.contains(EnvironmentUpdate::TranslationalState, "Vehicle"));
}

#[test]
fn third_body_center_already_propagated_needs_no_refresh() {
    let env = test_environment();

    let mut on_vehicle = BTreeMap::new();
    on_vehicle.insert(
        "Moon".to_string(),
        vec![AccelerationModel::ThirdBodyPointMassGravity {
            central_body: "Earth".to_string(),
        }],
    );
    let mut models = AccelerationMap::new();
    models.insert("Vehicle".to_string(), on_vehicle);
    // Earth itself under propagation, e.g. in a planetary ephemeris fit.
    models.insert("Earth".to_string(), BTreeMap::new());

    let updates = updates_from_accelerations(&models, &env).unwrap();
    assert_eq!(
        updates.bodies(EnvironmentUpdate::TranslationalState),
        ["Moon"]
    );
}

#[test]
fn thrust_updates_are_merged_in() {
    let env = test_environment();

    let mut required_updates = UpdateSet::new();
    required_updates.add(EnvironmentUpdate::TranslationalState, "Sun");
    let mut on_vehicle = BTreeMap::new();
    on_vehicle.insert(
        "Vehicle".to_string(),
        vec![AccelerationModel::Thrust { required_updates }],
    );
    let mut models = AccelerationMap::new();
    models.insert("Vehicle".to_string(), on_vehicle);

    let updates = updates_from_accelerations(&models, &env).unwrap();
    assert_eq!(
        updates.bodies(EnvironmentUpdate::TranslationalState),
        ["Sun"]
    );
    assert_eq!(updates.bodies(EnvironmentUpdate::Mass), ["Vehicle"]);
}

#[test]
fn acceleration_validity_failures_surface_immediately() {
    // The vehicle of the plain environment has no flight conditions, so an
    // aerodynamic acceleration cannot be accommodated.
    let env = test_environment();

    let mut on_vehicle = BTreeMap::new();
    on_vehicle.insert("Earth".to_string(), vec![AccelerationModel::Aerodynamic]);
    let mut models = AccelerationMap::new();
    models.insert("Vehicle".to_string(), on_vehicle);

    assert_eq!(
        updates_from_accelerations(&models, &env).unwrap_err(),
        UpdateError::MissingEnvironmentModel {
            body: "Vehicle".to_string(),
            model: "flight conditions"
        }
    );
}

#[test]
fn torques_resolve_their_smaller_table() {
    let env = env_with_vehicle_conditions();

    let mut on_vehicle = BTreeMap::new();
    on_vehicle.insert(
        "Earth".to_string(),
        vec![
            TorqueModel::SecondOrderGravitational,
            TorqueModel::Aerodynamic,
        ],
    );
    let mut models = TorqueMap::new();
    models.insert("Vehicle".to_string(), on_vehicle);

    let updates = updates_from_torques(&models, &env).unwrap();
    assert_eq!(updates.bodies(EnvironmentUpdate::RotationalState), ["Earth"]);
    assert_eq!(
        updates.bodies(EnvironmentUpdate::FlightConditions),
        ["Vehicle"]
    );
    assert!(updates.bodies(EnvironmentUpdate::TranslationalState).is_empty());
}

#[test]
fn mass_rates_require_nothing() {
    let env = test_environment();
    let mut models = MassRateMap::new();
    models.insert(
        "Vehicle".to_string(),
        vec![MassRateModel::FromThrust, MassRateModel::Custom],
    );
    assert!(updates_from_mass_rates(&models, &env).unwrap().is_empty());
}

#[test]
fn brute_force_set_mirrors_the_present_sub_models() {
    let mut env = Environment::new();
    env.add_body(
        "Spinner",
        Body::builder()
            .ephemeris(Arc::new(FixedEphemeris::at_position(Vector3::zeros())))
            .rotation(Arc::new(InertiallyFixedRotation))
            .mass_kg(100.0)
            .build(),
    );
    env.add_body(
        "Inert",
        Body::builder()
            .ephemeris(Arc::new(FixedEphemeris::at_position(Vector3::zeros())))
            .mass_kg(200.0)
            .build(),
    );
    // Only a time varying field needs refreshing.
    env.add_body(
        "Tidal",
        Body::builder()
            .ephemeris(Arc::new(FixedEphemeris::at_position(Vector3::zeros())))
            .gravity(Arc::new(hemera::cosmic::GravityField::SphericalHarmonic {
                mu_km3_s2: 4902.8,
                reference_radius_km: 1737.4,
                degree: 32,
                order: 32,
                time_dependent: true,
            }))
            .mass_kg(7.342e22)
            .build(),
    );

    let updates = full_update_set(&env).unwrap();
    assert_eq!(
        updates.bodies(EnvironmentUpdate::RotationalState),
        ["Spinner"]
    );
    // Masses refresh unconditionally, for every body.
    assert_eq!(
        updates.bodies(EnvironmentUpdate::Mass),
        ["Inert", "Spinner", "Tidal"]
    );
    assert_eq!(
        updates.bodies(EnvironmentUpdate::SphericalHarmonicGravityField),
        ["Tidal"]
    );
}

#[test]
fn dependent_variables_attach_flight_conditions_lazily() {
    extern crate pretty_env_logger;
    let _ = pretty_env_logger::try_init();

    let mut env = test_environment();
    assert!(env.body("Vehicle").unwrap().flight_conditions().is_none());

    let requests = vec![
        DependentVariableRequest::new(DependentVariable::Altitude, "Vehicle", "Earth"),
        DependentVariableRequest::new(DependentVariable::RelativePosition, "Vehicle", "Moon"),
        DependentVariableRequest::new(DependentVariable::TotalAccelerationNorm, "Vehicle", ""),
    ];
    let updates = updates_from_dependent_variables(&requests, &mut env).unwrap();

    // Earth carries an atmosphere and the vehicle aero coefficients, so the
    // conditions were attached as a side effect.
    let conditions = env.body("Vehicle").unwrap().flight_conditions().unwrap();
    assert_eq!(conditions.central_body, "Earth");
    assert!(conditions.atmospheric);

    assert_eq!(
        updates.bodies(EnvironmentUpdate::FlightConditions),
        ["Vehicle"]
    );
    assert_eq!(updates.bodies(EnvironmentUpdate::RotationalState), ["Earth"]);
    assert_eq!(
        updates.bodies(EnvironmentUpdate::TranslationalState),
        ["Vehicle", "Earth", "Moon"]
    );
}

#[test]
fn dependent_variables_without_prerequisites_stay_unattached() {
    let mut env = test_environment();
    // An altitude over the Moon: no atmosphere there, nothing to attach.
    let requests = vec![DependentVariableRequest::new(
        DependentVariable::Altitude,
        "Vehicle",
        "Moon",
    )];
    let updates = updates_from_dependent_variables(&requests, &mut env).unwrap();
    assert!(env.body("Vehicle").unwrap().flight_conditions().is_none());
    assert_eq!(
        updates.bodies(EnvironmentUpdate::FlightConditions),
        ["Vehicle"]
    );
}

#[test]
fn termination_trees_union_their_requirements() {
    let mut env = test_environment();
    let condition = TerminationCondition::Hybrid {
        conditions: vec![
            TerminationCondition::TimeLimit {
                end: hemera::time::Epoch::from_gregorian_utc_at_midnight(2023, 11, 17),
            },
            TerminationCondition::Hybrid {
                conditions: vec![TerminationCondition::DependentVariable {
                    request: DependentVariableRequest::new(
                        DependentVariable::Altitude,
                        "Vehicle",
                        "Earth",
                    ),
                    limit: 120.0,
                    terminate_when_above: false,
                }],
                fulfill_any: false,
            },
        ],
        fulfill_any: true,
    };

    let updates = updates_from_termination(&condition, &mut env).unwrap();
    assert_eq!(
        updates.bodies(EnvironmentUpdate::FlightConditions),
        ["Vehicle"]
    );
    // The nested dependent variable condition attached the conditions.
    assert!(env.body("Vehicle").unwrap().flight_conditions().is_some());
}

#[test]
fn update_sets_serialize_for_configuration_layers() {
    let mut updates = UpdateSet::new();
    updates.add(EnvironmentUpdate::TranslationalState, "Earth");
    updates.add(EnvironmentUpdate::Mass, "Vehicle");

    let serialized = serde_yaml::to_string(&updates).unwrap();
    let deserd: UpdateSet = serde_yaml::from_str(&serialized).unwrap();
    assert_eq!(deserd, updates);
}
