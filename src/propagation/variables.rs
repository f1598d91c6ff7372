/*
    Hemera, observation and propagation setup for astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::update::{EnvironmentUpdate, UpdateSet};
use super::UpdateError;
use crate::cosmic::{Environment, FlightConditions};
use serde_derive::{Deserialize, Serialize};

/// A dependent variable that can be saved or used in a termination condition.
///
/// Each kind pulls a fixed set of environment facets for the request's
/// subject and secondary bodies; kinds reading already-computed model outputs
/// (total acceleration, torques, ...) need nothing at the environment level.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependentVariable {
    MachNumber,
    Altitude,
    Airspeed,
    LocalDensity,
    RelativeSpeed,
    RelativePosition,
    RelativeDistance,
    RelativeVelocity,
    TotalAccelerationNorm,
    SingleAccelerationNorm,
    TotalAcceleration,
    SingleAcceleration,
    AerodynamicForceCoefficients,
    AerodynamicMomentCoefficients,
    RotationMatrixToBodyFixedFrame,
    IntermediateAerodynamicRotationMatrix,
    RelativeBodyAerodynamicOrientationAngle,
    BodyFixedAirspeedVelocity,
    TotalAerodynamicGLoad,
    StagnationPointHeatFlux,
    LocalTemperature,
    GeodeticLatitude,
    BodyFixedGroundspeedVelocity,
    TotalMassRate,
    TotalTorqueNorm,
    SingleTorqueNorm,
    TotalTorque,
    SingleTorque,
    KeplerianState,
    ModifiedEquinoctialState,
    SphericalHarmonicAccelerationTerms,
    BodyFixedRelativeCartesianPosition,
    BodyFixedRelativeSphericalPosition,
    LvlhToInertialFrameRotation,
    ControlSurfaceDeflection,
    RadiationPressure,
    PeriapsisAltitude,
}

/// A request to evaluate one dependent variable of `body`, usually with
/// respect to `secondary_body` (the central body of aerodynamic variables,
/// the other end of relative ones).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentVariableRequest {
    pub variable: DependentVariable,
    pub body: String,
    pub secondary_body: String,
}

impl DependentVariableRequest {
    pub fn new(
        variable: DependentVariable,
        body: impl Into<String>,
        secondary_body: impl Into<String>,
    ) -> Self {
        Self {
            variable,
            body: body.into(),
            secondary_body: secondary_body.into(),
        }
    }
}

/// The facet requirements of a single request.
pub(crate) fn single_request_updates(request: &DependentVariableRequest) -> UpdateSet {
    use DependentVariable::*;

    let mut updates = UpdateSet::new();
    let body = request.body.clone();
    let secondary = request.secondary_body.clone();

    match request.variable {
        // Everything evaluated in the airflow needs the subject's flight
        // conditions and both states, plus the central body's orientation.
        MachNumber
        | Altitude
        | Airspeed
        | LocalDensity
        | AerodynamicForceCoefficients
        | AerodynamicMomentCoefficients
        | IntermediateAerodynamicRotationMatrix
        | RelativeBodyAerodynamicOrientationAngle
        | BodyFixedAirspeedVelocity
        | TotalAerodynamicGLoad
        | StagnationPointHeatFlux
        | LocalTemperature
        | GeodeticLatitude
        | BodyFixedGroundspeedVelocity => {
            updates.add(EnvironmentUpdate::FlightConditions, body.clone());
            updates.add(EnvironmentUpdate::RotationalState, secondary.clone());
            updates.add(EnvironmentUpdate::TranslationalState, body);
            updates.add(EnvironmentUpdate::TranslationalState, secondary);
        }
        RelativeSpeed | RelativePosition | RelativeDistance | RelativeVelocity
        | KeplerianState | ModifiedEquinoctialState | LvlhToInertialFrameRotation
        | PeriapsisAltitude => {
            updates.add(EnvironmentUpdate::TranslationalState, body);
            updates.add(EnvironmentUpdate::TranslationalState, secondary);
        }
        RotationMatrixToBodyFixedFrame => {
            updates.add(EnvironmentUpdate::RotationalState, body);
        }
        BodyFixedRelativeCartesianPosition | BodyFixedRelativeSphericalPosition => {
            updates.add(EnvironmentUpdate::TranslationalState, body);
            updates.add(EnvironmentUpdate::TranslationalState, secondary.clone());
            updates.add(EnvironmentUpdate::RotationalState, secondary);
        }
        ControlSurfaceDeflection => {
            updates.add(EnvironmentUpdate::FlightConditions, body);
        }
        RadiationPressure => {
            updates.add(EnvironmentUpdate::RadiationPressure, body.clone());
            updates.add(EnvironmentUpdate::TranslationalState, body);
            updates.add(EnvironmentUpdate::TranslationalState, secondary);
        }
        // Read back from already-computed model evaluations.
        TotalAccelerationNorm | SingleAccelerationNorm | TotalAcceleration
        | SingleAcceleration | SphericalHarmonicAccelerationTerms | TotalMassRate
        | TotalTorqueNorm | SingleTorqueNorm | TotalTorque | SingleTorque => {}
    }

    updates
}

/// Attaches flight conditions to the request's body when they are missing and
/// the environment carries the prerequisites: an atmosphere on the secondary
/// body and aerodynamic coefficients on the subject.
fn ensure_flight_conditions(
    request: &DependentVariableRequest,
    env: &mut Environment,
) -> Result<(), UpdateError> {
    let has_conditions = env
        .body(&request.body)
        .ok_or_else(|| UpdateError::BodyNotFound {
            body: request.body.clone(),
        })?
        .flight_conditions()
        .is_some();
    if has_conditions {
        return Ok(());
    }

    let atmospheric = env
        .body(&request.secondary_body)
        .is_some_and(|secondary| secondary.atmosphere().is_some());
    let has_coefficients = env
        .body(&request.body)
        .is_some_and(|body| body.aero_coefficients().is_some());

    if atmospheric && has_coefficients {
        if let Some(body) = env.body_mut(&request.body) {
            warn!(
                "attaching flight conditions to {} about {} for a dependent variable",
                request.body, request.secondary_body
            );
            body.set_flight_conditions(FlightConditions {
                central_body: request.secondary_body.clone(),
                atmospheric: true,
            });
        }
    }
    Ok(())
}

/// Derives the update set required to evaluate the requested dependent
/// variables.
///
/// This is the one non-pure resolver: a request needing flight conditions on
/// a body that lacks them lazily attaches them (see
/// [ensure_flight_conditions]), mutating the environment in place. Do not
/// share the environment across concurrent calls of this function.
pub fn updates_from_dependent_variables(
    requests: &[DependentVariableRequest],
    env: &mut Environment,
) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();
    for request in requests {
        let single = single_request_updates(request);
        if !single.bodies(EnvironmentUpdate::FlightConditions).is_empty() {
            ensure_flight_conditions(request, env)?;
        }
        updates.merge(&single);
    }
    updates.dedup();
    Ok(updates)
}
