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

use crate::propagation::UpdateSet;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Descriptor of one acceleration model acting on a body.
///
/// The update-set resolver only needs to know the kind of each model and the
/// few names a kind drags in (central body of a third-body term, primary body
/// of a relativistic correction, the update needs of a thrust model), so
/// models are described rather than evaluated here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AccelerationModel {
    PointMassGravity,
    ThirdBodyPointMassGravity {
        central_body: String,
    },
    Aerodynamic,
    CannonballRadiationPressure,
    SphericalHarmonicGravity,
    MutualSphericalHarmonicGravity,
    ThirdBodySphericalHarmonicGravity {
        central_body: String,
    },
    ThirdBodyMutualSphericalHarmonicGravity {
        central_body: String,
    },
    Thrust {
        /// Environment refreshes the guidance/engine model needs, merged into the resolved set.
        required_updates: UpdateSet,
    },
    RelativisticCorrection {
        compute_de_sitter: bool,
        primary_body: String,
    },
    DirectTidalDissipation,
    Empirical,
}

impl fmt::Display for AccelerationModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PointMassGravity => write!(f, "point mass gravity"),
            Self::ThirdBodyPointMassGravity { central_body } => {
                write!(f, "third body point mass gravity about {central_body}")
            }
            Self::Aerodynamic => write!(f, "aerodynamic"),
            Self::CannonballRadiationPressure => write!(f, "cannonball radiation pressure"),
            Self::SphericalHarmonicGravity => write!(f, "spherical harmonic gravity"),
            Self::MutualSphericalHarmonicGravity => write!(f, "mutual spherical harmonic gravity"),
            Self::ThirdBodySphericalHarmonicGravity { central_body } => {
                write!(f, "third body spherical harmonic gravity about {central_body}")
            }
            Self::ThirdBodyMutualSphericalHarmonicGravity { central_body } => write!(
                f,
                "third body mutual spherical harmonic gravity about {central_body}"
            ),
            Self::Thrust { .. } => write!(f, "thrust"),
            Self::RelativisticCorrection { .. } => write!(f, "relativistic correction"),
            Self::DirectTidalDissipation => write!(f, "direct tidal dissipation"),
            Self::Empirical => write!(f, "empirical"),
        }
    }
}

/// Descriptor of one torque model acting on a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TorqueModel {
    SecondOrderGravitational,
    Aerodynamic,
}

/// Descriptor of one mass rate model of a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassRateModel {
    Custom,
    FromThrust,
}

/// All accelerations of a propagation: accelerated body -> exerting body -> models.
///
/// A body appearing as a key of the outer map is being propagated
/// translationally; the resolvers rely on this to skip state refreshes for
/// bodies the integrator already maintains.
pub type AccelerationMap = BTreeMap<String, BTreeMap<String, Vec<AccelerationModel>>>;

/// All torques of a propagation: torqued body -> exerting body -> models.
pub type TorqueMap = BTreeMap<String, BTreeMap<String, Vec<TorqueModel>>>;

/// All mass rate models of a propagation, per body.
pub type MassRateMap = BTreeMap<String, Vec<MassRateModel>>;
