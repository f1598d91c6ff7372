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

use super::link::LinkEndId;
use super::settings::LightTimeCorrectionSettings;
use super::ObsError;
use crate::cosmic::{Environment, Ephemeris, GravityField, SPEED_OF_LIGHT_KMS};
use crate::linalg::{Vector3, Vector6};
use crate::time::{Epoch, Unit};
use std::sync::Arc;

/// Convergence tolerance on the light time, in seconds.
const LIGHT_TIME_TOLERANCE: f64 = 1e-12;
/// Iteration cap of the point-to-point solution.
const MAX_ITERATIONS: usize = 20;

/// One light time correction bound to the environment.
struct LightTimeCorrection {
    perturbers: Vec<(Arc<GravityField>, Arc<dyn Ephemeris>)>,
}

impl LightTimeCorrection {
    /// First order relativistic (Shapiro) delay in seconds, summed over the perturbing bodies.
    fn delay(&self, tx_pos: &Vector3<f64>, rx_pos: &Vector3<f64>, epoch: Epoch) -> f64 {
        let c = SPEED_OF_LIGHT_KMS;
        let mut delay = 0.0;
        for (gravity, ephemeris) in &self.perturbers {
            let perturber = ephemeris.state_at(epoch).fixed_rows::<3>(0).into_owned();
            let r1 = (tx_pos - perturber).norm();
            let r2 = (rx_pos - perturber).norm();
            let r12 = (rx_pos - tx_pos).norm();
            delay += 2.0 * gravity.mu() / c.powi(3) * ((r1 + r2 + r12) / (r1 + r2 - r12)).ln();
        }
        delay
    }
}

/// Computes the signal travel time between two link ends, including corrections.
///
/// The solution is found by fixed point iteration with the reception time
/// held fixed, which is the convention of every observation model built by
/// this crate.
pub struct LightTimeCalculator {
    transmitter: Arc<dyn Ephemeris>,
    receiver: Arc<dyn Ephemeris>,
    corrections: Vec<LightTimeCorrection>,
}

impl LightTimeCalculator {
    /// Light time in seconds for a signal received at `reception_epoch`.
    pub fn light_time(&self, reception_epoch: Epoch) -> f64 {
        self.solve(reception_epoch).0
    }

    /// Light time plus the transmitter state at transmission and the receiver
    /// state at reception.
    pub fn states_and_light_time(
        &self,
        reception_epoch: Epoch,
    ) -> (f64, Vector6<f64>, Vector6<f64>) {
        let (light_time, tx_state) = self.solve(reception_epoch);
        let rx_state = self.receiver.state_at(reception_epoch);
        (light_time, tx_state, rx_state)
    }

    fn solve(&self, reception_epoch: Epoch) -> (f64, Vector6<f64>) {
        let rx_pos = self
            .receiver
            .state_at(reception_epoch)
            .fixed_rows::<3>(0)
            .into_owned();

        let mut tx_state = self.transmitter.state_at(reception_epoch);
        let mut light_time = (rx_pos - tx_state.fixed_rows::<3>(0)).norm() / SPEED_OF_LIGHT_KMS;
        for _ in 0..MAX_ITERATIONS {
            let transmission_epoch = reception_epoch - Unit::Second * light_time;
            tx_state = self.transmitter.state_at(transmission_epoch);
            let tx_pos = tx_state.fixed_rows::<3>(0).into_owned();
            let mut updated = (rx_pos - tx_pos).norm() / SPEED_OF_LIGHT_KMS;
            for correction in &self.corrections {
                updated += correction.delay(&tx_pos, &rx_pos, transmission_epoch);
            }
            let converged = (updated - light_time).abs() < LIGHT_TIME_TOLERANCE;
            light_time = updated;
            if converged {
                break;
            }
        }
        (light_time, tx_state)
    }
}

fn bound_ephemeris(id: &LinkEndId, env: &Environment) -> Result<Arc<dyn Ephemeris>, ObsError> {
    let body = env.body(&id.body).ok_or_else(|| ObsError::BodyNotFound {
        body: id.body.clone(),
    })?;
    // Station offsets are folded into the body ephemeris by the environment setup.
    body.ephemeris()
        .cloned()
        .ok_or_else(|| ObsError::MissingEnvironmentModel {
            body: id.body.clone(),
            model: "ephemeris",
        })
}

/// Creates a light time calculator between two link ends, with the requested
/// corrections bound to the environment.
pub fn create_light_time_calculator(
    transmitter: &LinkEndId,
    receiver: &LinkEndId,
    env: &Environment,
    corrections: &[LightTimeCorrectionSettings],
) -> Result<LightTimeCalculator, ObsError> {
    let mut bound_corrections = Vec::with_capacity(corrections.len());
    for settings in corrections {
        match settings {
            LightTimeCorrectionSettings::FirstOrderRelativistic { perturbing_bodies } => {
                let mut perturbers = Vec::with_capacity(perturbing_bodies.len());
                for name in perturbing_bodies {
                    let body = env.body(name).ok_or_else(|| ObsError::BodyNotFound {
                        body: name.clone(),
                    })?;
                    let gravity = body.gravity().cloned().ok_or_else(|| {
                        ObsError::MissingEnvironmentModel {
                            body: name.clone(),
                            model: "gravity field",
                        }
                    })?;
                    perturbers.push((gravity, bound_ephemeris(&LinkEndId::body(name), env)?));
                }
                bound_corrections.push(LightTimeCorrection { perturbers });
            }
        }
    }

    Ok(LightTimeCalculator {
        transmitter: bound_ephemeris(transmitter, env)?,
        receiver: bound_ephemeris(receiver, env)?,
        corrections: bound_corrections,
    })
}
