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

use super::link::{viability_link_end_indices, LinkEndId, LinkEnds};
use super::{ObsError, ObservableType};
use crate::cosmic::{Environment, Ephemeris, RotationModel};
use crate::linalg::{Vector3, Vector6};
use crate::time::Epoch;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Settings for one viability condition on an observation geometry.
///
/// The link end of each condition may name a station explicitly, or just a
/// body; a body-wide condition fans out to every ground station of the body
/// where a station is required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ViabilitySettings {
    /// The target must be at least this high above the local horizon of a station.
    MinimumElevationAngle {
        link_end: LinkEndId,
        min_elevation_deg: f64,
    },
    /// The line of sight must stay at least this far from the direction to a third body.
    BodyAvoidanceAngle {
        link_end: LinkEndId,
        body_to_avoid: String,
        min_angle_deg: f64,
    },
    /// The line of sight must not cross a third body's sphere.
    Occultation {
        link_end: LinkEndId,
        occulting_body: String,
    },
}

impl ViabilitySettings {
    pub fn link_end(&self) -> &LinkEndId {
        match self {
            Self::MinimumElevationAngle { link_end, .. } => link_end,
            Self::BodyAvoidanceAngle { link_end, .. } => link_end,
            Self::Occultation { link_end, .. } => link_end,
        }
    }
}

/// Checks one geometric condition over the link end states of an observation.
///
/// `link_end_states` and `link_end_times` follow the index convention of
/// [super::link::link_end_indices], which is exactly the ordering the
/// observation models produce.
pub trait ViabilityCalculator: Send + Sync {
    fn is_viable(&self, link_end_states: &[Vector6<f64>], link_end_times: &[Epoch]) -> bool;
}

fn position(states: &[Vector6<f64>], index: usize) -> Option<Vector3<f64>> {
    states.get(index).map(|s| s.fixed_rows::<3>(0).into_owned())
}

/// Elevation of the opposite link end above a ground station's horizon.
pub struct MinimumElevationAngleCalculator {
    indices: Vec<(usize, usize)>,
    min_elevation_rad: f64,
    rotation: Arc<dyn RotationModel>,
    station_position_km: Vector3<f64>,
}

impl ViabilityCalculator for MinimumElevationAngleCalculator {
    fn is_viable(&self, link_end_states: &[Vector6<f64>], link_end_times: &[Epoch]) -> bool {
        for (check, opposite) in &self.indices {
            let (Some(own), Some(other)) = (
                position(link_end_states, *check),
                position(link_end_states, *opposite),
            ) else {
                return false;
            };
            let Some(epoch) = link_end_times.get(*check) else {
                return false;
            };
            let zenith =
                (self.rotation.body_fixed_to_inertial(*epoch) * self.station_position_km).normalize();
            let link = (other - own).normalize();
            let elevation = std::f64::consts::FRAC_PI_2 - zenith.dot(&link).acos();
            if elevation < self.min_elevation_rad {
                return false;
            }
        }
        true
    }
}

/// Angle between the line of sight and the direction to a body to avoid.
pub struct BodyAvoidanceAngleCalculator {
    indices: Vec<(usize, usize)>,
    min_angle_rad: f64,
    body_to_avoid: Arc<dyn Ephemeris>,
}

impl ViabilityCalculator for BodyAvoidanceAngleCalculator {
    fn is_viable(&self, link_end_states: &[Vector6<f64>], link_end_times: &[Epoch]) -> bool {
        for (check, opposite) in &self.indices {
            let (Some(own), Some(other)) = (
                position(link_end_states, *check),
                position(link_end_states, *opposite),
            ) else {
                return false;
            };
            let Some(epoch) = link_end_times.get(*check) else {
                return false;
            };
            let avoided = self
                .body_to_avoid
                .state_at(*epoch)
                .fixed_rows::<3>(0)
                .into_owned();
            let to_avoided = (avoided - own).normalize();
            let link = (other - own).normalize();
            if to_avoided.dot(&link).acos() < self.min_angle_rad {
                return false;
            }
        }
        true
    }
}

/// Line of sight intersection with an occulting body's sphere.
pub struct OccultationCalculator {
    indices: Vec<(usize, usize)>,
    occulting_body: Arc<dyn Ephemeris>,
    radius_km: f64,
}

impl ViabilityCalculator for OccultationCalculator {
    fn is_viable(&self, link_end_states: &[Vector6<f64>], link_end_times: &[Epoch]) -> bool {
        for (check, opposite) in &self.indices {
            let (Some(own), Some(other)) = (
                position(link_end_states, *check),
                position(link_end_states, *opposite),
            ) else {
                return false;
            };
            let Some(epoch) = link_end_times.get(*check) else {
                return false;
            };
            let occulter = self
                .occulting_body
                .state_at(*epoch)
                .fixed_rows::<3>(0)
                .into_owned();

            // Closest approach of the segment to the occulter center.
            let link = other - own;
            let fraction = ((occulter - own).dot(&link) / link.norm_squared()).clamp(0.0, 1.0);
            let closest = own + link * fraction;
            if (closest - occulter).norm() < self.radius_km {
                return false;
            }
        }
        true
    }
}

/// Retains only the settings relevant to one set of link ends.
pub fn filter_viability_settings(
    settings: &[ViabilitySettings],
    link_ends: &LinkEnds,
) -> Vec<ViabilitySettings> {
    settings
        .iter()
        .filter(|s| link_ends.iter().any(|(_, id)| s.link_end().matches(id)))
        .cloned()
        .collect()
}

fn third_body_ephemeris(
    env: &Environment,
    name: &str,
) -> Result<Arc<dyn Ephemeris>, ObsError> {
    env.body(name)
        .ok_or_else(|| ObsError::BodyNotFound {
            body: name.to_string(),
        })?
        .ephemeris()
        .cloned()
        .ok_or_else(|| ObsError::MissingEnvironmentModel {
            body: name.to_string(),
            model: "ephemeris",
        })
}

/// Creates an elevation condition for one ground station of the settings'
/// body. `station_name` decides the station when the settings do not.
pub fn create_minimum_elevation_calculator(
    env: &Environment,
    link_ends: &LinkEnds,
    observable: ObservableType,
    settings: &ViabilitySettings,
    station_name: &str,
) -> Result<MinimumElevationAngleCalculator, ObsError> {
    let ViabilitySettings::MinimumElevationAngle {
        link_end,
        min_elevation_deg,
    } = settings
    else {
        return Err(ObsError::InvalidSettings {
            observable,
            reason: "viability settings are not an elevation condition".to_string(),
        });
    };

    let station = link_end.station.as_deref().unwrap_or(station_name);
    let body = env
        .body(&link_end.body)
        .ok_or_else(|| ObsError::BodyNotFound {
            body: link_end.body.clone(),
        })?;
    let rotation = body
        .rotation()
        .or_else(|| body.orientation_calculator())
        .cloned()
        .ok_or_else(|| ObsError::MissingEnvironmentModel {
            body: link_end.body.clone(),
            model: "rotation model",
        })?;
    let station_position_km = *body.ground_stations().get(station).ok_or_else(|| {
        ObsError::MissingEnvironmentModel {
            body: link_end.body.clone(),
            model: "ground station",
        }
    })?;

    let id = LinkEndId::station(link_end.body.clone(), station);
    Ok(MinimumElevationAngleCalculator {
        indices: viability_link_end_indices(link_ends, observable, &id)?,
        min_elevation_rad: min_elevation_deg.to_radians(),
        rotation,
        station_position_km,
    })
}

/// Creates an avoidance angle condition; a station-less link end covers every
/// station of its body at once.
pub fn create_body_avoidance_calculator(
    env: &Environment,
    link_ends: &LinkEnds,
    observable: ObservableType,
    settings: &ViabilitySettings,
) -> Result<BodyAvoidanceAngleCalculator, ObsError> {
    let ViabilitySettings::BodyAvoidanceAngle {
        link_end,
        body_to_avoid,
        min_angle_deg,
    } = settings
    else {
        return Err(ObsError::InvalidSettings {
            observable,
            reason: "viability settings are not an avoidance condition".to_string(),
        });
    };

    Ok(BodyAvoidanceAngleCalculator {
        indices: viability_link_end_indices(link_ends, observable, link_end)?,
        min_angle_rad: min_angle_deg.to_radians(),
        body_to_avoid: third_body_ephemeris(env, body_to_avoid)?,
    })
}

/// Creates an occultation condition; a station-less link end covers every
/// station of its body at once.
pub fn create_occultation_calculator(
    env: &Environment,
    link_ends: &LinkEnds,
    observable: ObservableType,
    settings: &ViabilitySettings,
) -> Result<OccultationCalculator, ObsError> {
    let ViabilitySettings::Occultation {
        link_end,
        occulting_body,
    } = settings
    else {
        return Err(ObsError::InvalidSettings {
            observable,
            reason: "viability settings are not an occultation condition".to_string(),
        });
    };

    let radius_km = env
        .body(occulting_body)
        .ok_or_else(|| ObsError::BodyNotFound {
            body: occulting_body.clone(),
        })?
        .mean_radius_km()
        .ok_or_else(|| ObsError::MissingEnvironmentModel {
            body: occulting_body.clone(),
            model: "mean radius",
        })?;

    Ok(OccultationCalculator {
        indices: viability_link_end_indices(link_ends, observable, link_end)?,
        occulting_body: third_body_ephemeris(env, occulting_body)?,
        radius_km,
    })
}

/// Creates the viability calculators for one set of link ends, fanning
/// body-wide elevation conditions out to every ground station of the body.
pub fn create_viability_calculators(
    env: &Environment,
    link_ends: &LinkEnds,
    observable: ObservableType,
    settings: &[ViabilitySettings],
) -> Result<Vec<Box<dyn ViabilityCalculator>>, ObsError> {
    let mut calculators: Vec<Box<dyn ViabilityCalculator>> = Vec::new();
    for condition in filter_viability_settings(settings, link_ends) {
        match &condition {
            ViabilitySettings::MinimumElevationAngle { link_end, .. } => {
                match &link_end.station {
                    Some(station) => calculators.push(Box::new(
                        create_minimum_elevation_calculator(
                            env, link_ends, observable, &condition, station,
                        )?,
                    )),
                    None => {
                        let body = env.body(&link_end.body).ok_or_else(|| {
                            ObsError::BodyNotFound {
                                body: link_end.body.clone(),
                            }
                        })?;
                        for station in body.ground_stations().keys() {
                            calculators.push(Box::new(create_minimum_elevation_calculator(
                                env, link_ends, observable, &condition, station,
                            )?));
                        }
                    }
                }
            }
            ViabilitySettings::BodyAvoidanceAngle { .. } => calculators.push(Box::new(
                create_body_avoidance_calculator(env, link_ends, observable, &condition)?,
            )),
            ViabilitySettings::Occultation { .. } => calculators.push(Box::new(
                create_occultation_calculator(env, link_ends, observable, &condition)?,
            )),
        }
    }
    Ok(calculators)
}

/// Creates the viability calculators for several sets of link ends of a
/// single observable type.
pub fn create_viability_calculators_per_link_ends(
    env: &Environment,
    link_ends_list: &[LinkEnds],
    observable: ObservableType,
    settings: &[ViabilitySettings],
) -> Result<BTreeMap<LinkEnds, Vec<Box<dyn ViabilityCalculator>>>, ObsError> {
    let mut calculators = BTreeMap::new();
    for link_ends in link_ends_list {
        calculators.insert(
            link_ends.clone(),
            create_viability_calculators(env, link_ends, observable, settings)?,
        );
    }
    Ok(calculators)
}

/// Creates the viability calculators for any number of link ends sets and
/// observable types.
pub fn create_viability_calculators_per_observable(
    env: &Environment,
    link_ends_per_observable: &BTreeMap<ObservableType, Vec<LinkEnds>>,
    settings: &[ViabilitySettings],
) -> Result<BTreeMap<ObservableType, BTreeMap<LinkEnds, Vec<Box<dyn ViabilityCalculator>>>>, ObsError>
{
    let mut calculators = BTreeMap::new();
    for (observable, link_ends_list) in link_ends_per_observable {
        calculators.insert(
            *observable,
            create_viability_calculators_per_link_ends(env, link_ends_list, *observable, settings)?,
        );
    }
    Ok(calculators)
}
