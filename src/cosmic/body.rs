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

use crate::linalg::{Matrix3, Vector3, Vector6};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// A translational state source for one body, in the base frame of the environment.
pub trait Ephemeris: Send + Sync {
    /// Cartesian state (position in km, velocity in km/s) at the requested epoch.
    fn state_at(&self, epoch: Epoch) -> Vector6<f64>;
}

/// An ephemeris returning the same state at every epoch.
#[derive(Clone, Debug)]
pub struct FixedEphemeris {
    pub state: Vector6<f64>,
}

impl FixedEphemeris {
    pub fn new(state: Vector6<f64>) -> Self {
        Self { state }
    }

    pub fn at_position(position_km: Vector3<f64>) -> Self {
        let mut state = Vector6::zeros();
        state.fixed_rows_mut::<3>(0).copy_from(&position_km);
        Self { state }
    }
}

impl Ephemeris for FixedEphemeris {
    fn state_at(&self, _epoch: Epoch) -> Vector6<f64> {
        self.state
    }
}

/// An ephemeris propagating a reference state along its velocity, without any dynamics.
#[derive(Clone, Debug)]
pub struct LinearEphemeris {
    pub reference_epoch: Epoch,
    pub reference_state: Vector6<f64>,
}

impl LinearEphemeris {
    pub fn new(reference_epoch: Epoch, reference_state: Vector6<f64>) -> Self {
        Self {
            reference_epoch,
            reference_state,
        }
    }
}

impl Ephemeris for LinearEphemeris {
    fn state_at(&self, epoch: Epoch) -> Vector6<f64> {
        let dt = (epoch - self.reference_epoch).to_seconds();
        let vel = self.reference_state.fixed_rows::<3>(3).into_owned();
        let mut state = self.reference_state;
        state
            .fixed_rows_mut::<3>(0)
            .copy_from(&(self.reference_state.fixed_rows::<3>(0) + vel * dt));
        state
    }
}

/// An orientation source for one body: rotation from the body-fixed frame to the base frame.
pub trait RotationModel: Send + Sync {
    fn body_fixed_to_inertial(&self, epoch: Epoch) -> Matrix3<f64>;
}

/// A body whose fixed frame coincides with the base frame at all epochs.
#[derive(Clone, Copy, Debug, Default)]
pub struct InertiallyFixedRotation;

impl RotationModel for InertiallyFixedRotation {
    fn body_fixed_to_inertial(&self, _epoch: Epoch) -> Matrix3<f64> {
        Matrix3::identity()
    }
}

/// Gravity field of a body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GravityField {
    PointMass {
        mu_km3_s2: f64,
    },
    SphericalHarmonic {
        mu_km3_s2: f64,
        reference_radius_km: f64,
        degree: usize,
        order: usize,
        /// Whether the coefficients vary with time (tides, libration corrections, ...).
        time_dependent: bool,
    },
}

impl GravityField {
    pub fn point_mass(mu_km3_s2: f64) -> Self {
        Self::PointMass { mu_km3_s2 }
    }

    /// Gravitational parameter in km^3/s^2.
    pub fn mu(&self) -> f64 {
        match self {
            Self::PointMass { mu_km3_s2 } => *mu_km3_s2,
            Self::SphericalHarmonic { mu_km3_s2, .. } => *mu_km3_s2,
        }
    }

    pub fn is_spherical_harmonic(&self) -> bool {
        matches!(self, Self::SphericalHarmonic { .. })
    }

    pub fn is_time_dependent(&self) -> bool {
        matches!(
            self,
            Self::SphericalHarmonic {
                time_dependent: true,
                ..
            }
        )
    }
}

/// Flight conditions of a vehicle with respect to a central body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightConditions {
    pub central_body: String,
    /// Whether these conditions are computed against an atmosphere model of the central body.
    pub atmospheric: bool,
}

/// Exponential atmosphere of a body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereModel {
    pub surface_density_kg_m3: f64,
    pub scale_height_km: f64,
}

/// Aerodynamic coefficient interface of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AerodynamicCoefficients {
    pub reference_area_m2: f64,
    pub cd: f64,
}

/// Radiation pressure interface of a vehicle for a single source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadiationPressureInterface {
    pub reference_area_m2: f64,
    pub cr: f64,
}

/// One body of the environment and all of its optional sub-models.
///
/// All sub-models default to absent: `Body::builder().build()` is an empty
/// body, and the factories of this crate report a missing sub-model as an
/// error naming the body and the model.
#[derive(Clone, Default, TypedBuilder)]
pub struct Body {
    #[builder(default, setter(strip_option))]
    ephemeris: Option<Arc<dyn Ephemeris>>,
    #[builder(default, setter(strip_option))]
    rotation: Option<Arc<dyn RotationModel>>,
    /// Orientation computed from the current state rather than from an a priori model.
    #[builder(default, setter(strip_option))]
    orientation_calculator: Option<Arc<dyn RotationModel>>,
    #[builder(default, setter(strip_option))]
    gravity: Option<Arc<GravityField>>,
    #[builder(default, setter(strip_option))]
    flight_conditions: Option<FlightConditions>,
    #[builder(default, setter(strip_option))]
    atmosphere: Option<AtmosphereModel>,
    #[builder(default, setter(strip_option))]
    aero_coefficients: Option<AerodynamicCoefficients>,
    /// Radiation pressure interfaces, keyed by source body name.
    #[builder(default)]
    radiation_pressure: BTreeMap<String, RadiationPressureInterface>,
    #[builder(default, setter(strip_option))]
    mass_kg: Option<f64>,
    #[builder(default, setter(strip_option))]
    mean_radius_km: Option<f64>,
    /// Ground stations of this body, with their body-fixed positions in km.
    #[builder(default)]
    ground_stations: BTreeMap<String, Vector3<f64>>,
}

impl Body {
    pub fn ephemeris(&self) -> Option<&Arc<dyn Ephemeris>> {
        self.ephemeris.as_ref()
    }

    pub fn rotation(&self) -> Option<&Arc<dyn RotationModel>> {
        self.rotation.as_ref()
    }

    pub fn orientation_calculator(&self) -> Option<&Arc<dyn RotationModel>> {
        self.orientation_calculator.as_ref()
    }

    /// Whether any orientation source is available, a priori or state-dependent.
    pub fn has_rotation_source(&self) -> bool {
        self.rotation.is_some() || self.orientation_calculator.is_some()
    }

    pub fn gravity(&self) -> Option<&Arc<GravityField>> {
        self.gravity.as_ref()
    }

    pub fn flight_conditions(&self) -> Option<&FlightConditions> {
        self.flight_conditions.as_ref()
    }

    /// Attaches flight conditions to this body, replacing any previous ones.
    pub fn set_flight_conditions(&mut self, conditions: FlightConditions) {
        self.flight_conditions = Some(conditions);
    }

    pub fn atmosphere(&self) -> Option<&AtmosphereModel> {
        self.atmosphere.as_ref()
    }

    pub fn aero_coefficients(&self) -> Option<&AerodynamicCoefficients> {
        self.aero_coefficients.as_ref()
    }

    pub fn radiation_pressure(&self) -> &BTreeMap<String, RadiationPressureInterface> {
        &self.radiation_pressure
    }

    pub fn mass_kg(&self) -> Option<f64> {
        self.mass_kg
    }

    pub fn mean_radius_km(&self) -> Option<f64> {
        self.mean_radius_km
    }

    pub fn ground_stations(&self) -> &BTreeMap<String, Vector3<f64>> {
        &self.ground_stations
    }
}
