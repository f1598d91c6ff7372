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

use super::link::{LinkEndId, LinkEndType, LinkEnds};
use super::settings::ProperTimeRateSettings;
use super::ObsError;
use crate::cosmic::{Environment, Ephemeris, GravityField, SPEED_OF_LIGHT_KMS};
use crate::linalg::Vector6;
use crate::time::Epoch;
use std::sync::Arc;

/// First order proper time rate deviation of a clock at one link end, with
/// respect to coordinate time, due to the monopole of a single central body.
pub struct ProperTimeRateCalculator {
    link_end: LinkEndType,
    central_body: String,
    gravity: Arc<GravityField>,
    central_ephemeris: Arc<dyn Ephemeris>,
}

impl ProperTimeRateCalculator {
    /// The link end whose clock this calculator models.
    pub fn link_end(&self) -> LinkEndType {
        self.link_end
    }

    pub fn central_body(&self) -> &str {
        &self.central_body
    }

    /// d(tau)/dt - 1 for a clock in `link_end_state` at `epoch`.
    ///
    /// The gravitational parameter is read from the gravity model at every
    /// call, so coefficient updates between evaluations are picked up.
    pub fn proper_time_rate(&self, epoch: Epoch, link_end_state: &Vector6<f64>) -> f64 {
        let central = self.central_ephemeris.state_at(epoch);
        let rel_pos = link_end_state.fixed_rows::<3>(0) - central.fixed_rows::<3>(0);
        let rel_vel = link_end_state.fixed_rows::<3>(3) - central.fixed_rows::<3>(3);
        let c2 = SPEED_OF_LIGHT_KMS * SPEED_OF_LIGHT_KMS;
        -(self.gravity.mu() / rel_pos.norm() + 0.5 * rel_vel.norm_squared()) / c2
    }
}

/// Creates the proper time rate calculator for the clock at `target` in a
/// one-way Doppler observable.
pub fn create_proper_time_rate_calculator(
    settings: &ProperTimeRateSettings,
    link_ends: &LinkEnds,
    env: &Environment,
    target: LinkEndType,
) -> Result<ProperTimeRateCalculator, ObsError> {
    match settings {
        ProperTimeRateSettings::DirectFirstOrder { central_body } => {
            if !link_ends.contains(target) {
                return Err(ObsError::InvalidLinkEndTopology {
                    observable: super::ObservableType::OneWayDoppler,
                    reason: format!("link end {target} not found for proper time rate"),
                });
            }
            let body = env
                .body(central_body)
                .ok_or_else(|| ObsError::BodyNotFound {
                    body: central_body.clone(),
                })?;
            let gravity =
                body.gravity()
                    .cloned()
                    .ok_or_else(|| ObsError::MissingEnvironmentModel {
                        body: central_body.clone(),
                        model: "gravity field",
                    })?;
            let central_ephemeris =
                body.ephemeris()
                    .cloned()
                    .ok_or_else(|| ObsError::MissingEnvironmentModel {
                        body: central_body.clone(),
                        model: "ephemeris",
                    })?;

            // A clock sitting on the central body itself would need the
            // reference point formulation, which does not exist yet.
            let central_id = LinkEndId::body(central_body.clone());
            let coincides = [LinkEndType::Transmitter, LinkEndType::Receiver]
                .iter()
                .any(|role| link_ends.get(*role) == Some(&central_id));
            if coincides {
                return Err(ObsError::Unsupported {
                    reason: format!(
                        "proper time reference point {central_body} as a link end is not implemented"
                    ),
                });
            }

            Ok(ProperTimeRateCalculator {
                link_end: target,
                central_body: central_body.clone(),
                gravity,
                central_ephemeris,
            })
        }
    }
}
