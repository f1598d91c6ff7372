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

use super::bias::{create_bias_calculator, ObservationBias};
use super::doppler::{create_proper_time_rate_calculator, ProperTimeRateCalculator};
use super::light_time::{create_light_time_calculator, LightTimeCalculator};
use super::link::{LinkEndId, LinkEndType, LinkEnds};
use super::settings::{
    IntegrationTimeFn, ObservationDetails, ObservationSettings, RetransmissionDelayFn,
};
use super::{ObsError, ObservableType};
use crate::cosmic::{Environment, Ephemeris, SPEED_OF_LIGHT_KMS};
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector, Vector1, Vector2, Vector3, Vector6, U1, U2, U3};
use crate::time::{Epoch, Unit};
use std::marker::PhantomData;
use std::sync::Arc;

/// A runtime observation model of fixed size `N`.
///
/// Evaluations are referenced at the final reception time of the signal
/// (the epoch of the single event for a position observable).
pub trait ObservationModel<N: DimName>: Send + Sync + std::fmt::Debug
where
    DefaultAllocator: Allocator<N>,
{
    fn observable_type(&self) -> ObservableType;

    /// Computed observable, bias included, plus the link end event times in
    /// the convention of [super::link::link_end_indices].
    fn observe_with_times(&self, epoch: Epoch) -> (OVector<f64, N>, Vec<Epoch>);

    fn observe(&self, epoch: Epoch) -> OVector<f64, N> {
        self.observe_with_times(epoch).0
    }
}

fn apply_bias<N: DimName>(
    bias: &Option<Box<dyn ObservationBias<N>>>,
    times: &[Epoch],
    ideal: OVector<f64, N>,
) -> OVector<f64, N>
where
    DefaultAllocator: Allocator<N>,
{
    match bias {
        Some(bias) => &ideal + bias.bias(times, &ideal),
        None => ideal,
    }
}

/// Range between two link ends, from the one-way light time.
pub struct OneWayRangeModel {
    light_time: LightTimeCalculator,
    bias: Option<Box<dyn ObservationBias<U1>>>,
}

impl ObservationModel<U1> for OneWayRangeModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::OneWayRange
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector1<f64>, Vec<Epoch>) {
        let light_time = self.light_time.light_time(epoch);
        let times = vec![epoch - Unit::Second * light_time, epoch];
        let ideal = Vector1::new(light_time * SPEED_OF_LIGHT_KMS);
        (apply_bias(&self.bias, &times, ideal), times)
    }
}

/// First order one-way Doppler, optionally with proper time rate
/// contributions at the transmitter and receiver clocks.
pub struct OneWayDopplerModel {
    light_time: LightTimeCalculator,
    transmitter_rate: Option<ProperTimeRateCalculator>,
    receiver_rate: Option<ProperTimeRateCalculator>,
    bias: Option<Box<dyn ObservationBias<U1>>>,
}

impl OneWayDopplerModel {
    /// Unbiased Doppler value plus the transmission and reception epochs.
    fn ideal(&self, epoch: Epoch) -> (f64, Epoch, Epoch) {
        let (light_time, tx_state, rx_state) = self.light_time.states_and_light_time(epoch);
        let transmission = epoch - Unit::Second * light_time;

        let separation = rx_state.fixed_rows::<3>(0) - tx_state.fixed_rows::<3>(0);
        let range_rate = separation
            .dot(&(rx_state.fixed_rows::<3>(3) - tx_state.fixed_rows::<3>(3)))
            / separation.norm();
        let coordinate_ratio = 1.0 - range_rate / SPEED_OF_LIGHT_KMS;

        let tx_rate = match &self.transmitter_rate {
            Some(rate) => rate.proper_time_rate(transmission, &tx_state),
            None => 0.0,
        };
        let rx_rate = match &self.receiver_rate {
            Some(rate) => rate.proper_time_rate(epoch, &rx_state),
            None => 0.0,
        };

        let doppler = (1.0 + tx_rate) * coordinate_ratio / (1.0 + rx_rate) - 1.0;
        (doppler, transmission, epoch)
    }
}

impl ObservationModel<U1> for OneWayDopplerModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::OneWayDoppler
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector1<f64>, Vec<Epoch>) {
        let (doppler, transmission, reception) = self.ideal(epoch);
        let times = vec![transmission, reception];
        (apply_bias(&self.bias, &times, Vector1::new(doppler)), times)
    }
}

/// Two-way Doppler composed of an uplink and a downlink one-way leg.
pub struct TwoWayDopplerModel {
    uplink: OneWayDopplerModel,
    downlink: OneWayDopplerModel,
    bias: Option<Box<dyn ObservationBias<U1>>>,
}

impl ObservationModel<U1> for TwoWayDopplerModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::TwoWayDoppler
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector1<f64>, Vec<Epoch>) {
        let (down, reflection, reception) = self.downlink.ideal(epoch);
        let (up, transmission, _) = self.uplink.ideal(reflection);
        let doppler = (1.0 + up) * (1.0 + down) - 1.0;
        let times = vec![transmission, reflection, reflection, reception];
        (apply_bias(&self.bias, &times, Vector1::new(doppler)), times)
    }
}

/// Range averaged over an integration interval, i.e. closed-loop Doppler.
pub struct OneWayDifferencedRangeModel {
    arc_start_light_time: LightTimeCalculator,
    arc_end_light_time: LightTimeCalculator,
    integration_time: IntegrationTimeFn,
    bias: Option<Box<dyn ObservationBias<U1>>>,
}

impl ObservationModel<U1> for OneWayDifferencedRangeModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::OneWayDifferencedRange
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector1<f64>, Vec<Epoch>) {
        let integration = (self.integration_time)(epoch);
        let arc_start = epoch - integration;
        let start_light_time = self.arc_start_light_time.light_time(arc_start);
        let end_light_time = self.arc_end_light_time.light_time(epoch);

        let times = vec![
            arc_start - Unit::Second * start_light_time,
            arc_start,
            epoch - Unit::Second * end_light_time,
            epoch,
        ];
        let ideal = Vector1::new(
            (end_light_time - start_light_time) * SPEED_OF_LIGHT_KMS / integration.to_seconds(),
        );
        (apply_bias(&self.bias, &times, ideal), times)
    }
}

/// Range accumulated over a transmitter -> reflectors -> receiver chain.
pub struct NWayRangeModel {
    light_times: Vec<LightTimeCalculator>,
    retransmission_delays: Option<RetransmissionDelayFn>,
    bias: Option<Box<dyn ObservationBias<U1>>>,
}

impl NWayRangeModel {
    pub fn n_legs(&self) -> usize {
        self.light_times.len()
    }
}

impl ObservationModel<U1> for NWayRangeModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::NWayRange
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector1<f64>, Vec<Epoch>) {
        let delays = match &self.retransmission_delays {
            Some(func) => func(epoch),
            None => Vec::new(),
        };

        // Walk the chain backwards from the reception event.
        let mut total_time = 0.0;
        let mut events = Vec::with_capacity(2 * self.light_times.len());
        let mut reception = epoch;
        for (leg, calculator) in self.light_times.iter().enumerate().rev() {
            let light_time = calculator.light_time(reception);
            let transmission = reception - Unit::Second * light_time;
            events.push(reception);
            events.push(transmission);
            total_time += light_time;
            let delay = delays.get(leg.wrapping_sub(1)).map_or(0.0, |d| d.to_seconds());
            total_time += delay;
            reception = transmission - Unit::Second * delay;
        }
        events.reverse();

        let ideal = Vector1::new(total_time * SPEED_OF_LIGHT_KMS);
        (apply_bias(&self.bias, &events, ideal), events)
    }
}

/// Right ascension and declination of the transmitter as seen by the receiver.
pub struct AngularPositionModel {
    light_time: LightTimeCalculator,
    bias: Option<Box<dyn ObservationBias<U2>>>,
}

impl ObservationModel<U2> for AngularPositionModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::AngularPosition
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector2<f64>, Vec<Epoch>) {
        let (light_time, tx_state, rx_state) = self.light_time.states_and_light_time(epoch);
        let direction: Vector3<f64> =
            tx_state.fixed_rows::<3>(0) - rx_state.fixed_rows::<3>(0);
        let right_ascension = direction.y.atan2(direction.x);
        let declination = (direction.z / direction.norm()).asin();

        let times = vec![epoch - Unit::Second * light_time, epoch];
        let ideal = Vector2::new(right_ascension, declination);
        (apply_bias(&self.bias, &times, ideal), times)
    }
}

/// Cartesian position of a body, straight from its ephemeris.
pub struct PositionObservableModel {
    ephemeris: Arc<dyn Ephemeris>,
    bias: Option<Box<dyn ObservationBias<U3>>>,
}

impl ObservationModel<U3> for PositionObservableModel {
    fn observable_type(&self) -> ObservableType {
        ObservableType::PositionObservable
    }

    fn observe_with_times(&self, epoch: Epoch) -> (Vector3<f64>, Vec<Epoch>) {
        let state: Vector6<f64> = self.ephemeris.state_at(epoch);
        let times = vec![epoch];
        let ideal = state.fixed_rows::<3>(0).into_owned();
        (apply_bias(&self.bias, &times, ideal), times)
    }
}

/// Checks that `link_ends` holds exactly the expected roles, and returns
/// their identities in the expected order.
fn require_roles<'a>(
    link_ends: &'a LinkEnds,
    observable: ObservableType,
    expected: &[LinkEndType],
) -> Result<Vec<&'a LinkEndId>, ObsError> {
    if link_ends.len() != expected.len() {
        return Err(ObsError::InvalidLinkEndTopology {
            observable,
            reason: format!(
                "{} link ends found, expected {}",
                link_ends.len(),
                expected.len()
            ),
        });
    }
    expected
        .iter()
        .map(|role| {
            link_ends
                .get(*role)
                .ok_or_else(|| ObsError::InvalidLinkEndTopology {
                    observable,
                    reason: format!("no {role} found"),
                })
        })
        .collect()
}

fn one_way_ids<'a>(
    link_ends: &'a LinkEnds,
    observable: ObservableType,
) -> Result<(&'a LinkEndId, &'a LinkEndId), ObsError> {
    let ids = require_roles(
        link_ends,
        observable,
        &[LinkEndType::Transmitter, LinkEndType::Receiver],
    )?;
    Ok((ids[0], ids[1]))
}

fn build_one_way_doppler(
    link_ends: &LinkEnds,
    settings: &ObservationSettings,
    env: &Environment,
) -> Result<OneWayDopplerModel, ObsError> {
    let observable = ObservableType::OneWayDoppler;
    let (transmitter, receiver) = one_way_ids(link_ends, observable)?;

    let bias = match &settings.bias {
        Some(bias_settings) => Some(create_bias_calculator::<U1>(
            link_ends,
            observable,
            bias_settings,
            env,
        )?),
        None => None,
    };

    let (transmitter_rate, receiver_rate) = match &settings.details {
        ObservationDetails::Standard => (None, None),
        ObservationDetails::OneWayDoppler {
            transmitter_rate,
            receiver_rate,
        } => {
            let tx = match transmitter_rate {
                Some(rate_settings) => Some(create_proper_time_rate_calculator(
                    rate_settings,
                    link_ends,
                    env,
                    LinkEndType::Transmitter,
                )?),
                None => None,
            };
            let rx = match receiver_rate {
                Some(rate_settings) => Some(create_proper_time_rate_calculator(
                    rate_settings,
                    link_ends,
                    env,
                    LinkEndType::Receiver,
                )?),
                None => None,
            };
            (tx, rx)
        }
        _ => {
            return Err(ObsError::InvalidSettings {
                observable,
                reason: "payload does not belong to a one-way Doppler observable".to_string(),
            })
        }
    };

    Ok(OneWayDopplerModel {
        light_time: create_light_time_calculator(
            transmitter,
            receiver,
            env,
            &settings.light_time_corrections,
        )?,
        transmitter_rate,
        receiver_rate,
        bias,
    })
}

/// Creates observation models of a fixed size from settings and link ends.
///
/// One inherent `build` exists per supported observation size, so that the
/// returned trait object carries the right dimension; the aggregation layer
/// dispatches between them from [ObservableType::dimension].
pub struct ObservationModelBuilder<N: DimName>(PhantomData<N>);

impl ObservationModelBuilder<U1> {
    pub fn build(
        link_ends: &LinkEnds,
        settings: &ObservationSettings,
        env: &Environment,
    ) -> Result<Box<dyn ObservationModel<U1>>, ObsError> {
        let observable = settings.observable;
        match observable {
            ObservableType::OneWayRange => {
                if !matches!(settings.details, ObservationDetails::Standard) {
                    return Err(ObsError::InvalidSettings {
                        observable,
                        reason: "payload does not belong to a one-way range observable".to_string(),
                    });
                }
                let (transmitter, receiver) = one_way_ids(link_ends, observable)?;
                let bias = Self::bias(link_ends, observable, settings, env)?;
                Ok(Box::new(OneWayRangeModel {
                    light_time: create_light_time_calculator(
                        transmitter,
                        receiver,
                        env,
                        &settings.light_time_corrections,
                    )?,
                    bias,
                }))
            }
            ObservableType::OneWayDoppler => {
                Ok(Box::new(build_one_way_doppler(link_ends, settings, env)?))
            }
            ObservableType::TwoWayDoppler => {
                let ids = require_roles(
                    link_ends,
                    observable,
                    &[
                        LinkEndType::Transmitter,
                        LinkEndType::Reflector(1),
                        LinkEndType::Receiver,
                    ],
                )?;
                let bias = Self::bias(link_ends, observable, settings, env)?;

                let (transmitter, reflector, receiver) =
                    (ids[0].clone(), ids[1].clone(), ids[2].clone());
                let uplink_ends = LinkEnds::one_way(transmitter, reflector.clone());
                let downlink_ends = LinkEnds::one_way(reflector, receiver);

                let (uplink, downlink) = match &settings.details {
                    ObservationDetails::TwoWayDoppler { uplink, downlink } => {
                        for leg in [uplink.as_ref(), downlink.as_ref()] {
                            if leg.observable != ObservableType::OneWayDoppler {
                                return Err(ObsError::InvalidSettings {
                                    observable,
                                    reason: format!(
                                        "constituent link is of type {}, not one-way Doppler",
                                        leg.observable
                                    ),
                                });
                            }
                        }
                        (
                            build_one_way_doppler(&uplink_ends, uplink, env)?,
                            build_one_way_doppler(&downlink_ends, downlink, env)?,
                        )
                    }
                    ObservationDetails::Standard => {
                        // Synthesize both legs, inheriting the corrections.
                        let synthesized = ObservationSettings::one_way_doppler(
                            settings.light_time_corrections.clone(),
                            None,
                        );
                        (
                            build_one_way_doppler(&uplink_ends, &synthesized, env)?,
                            build_one_way_doppler(&downlink_ends, &synthesized, env)?,
                        )
                    }
                    _ => {
                        return Err(ObsError::InvalidSettings {
                            observable,
                            reason: "payload does not belong to a two-way Doppler observable"
                                .to_string(),
                        })
                    }
                };

                Ok(Box::new(TwoWayDopplerModel {
                    uplink,
                    downlink,
                    bias,
                }))
            }
            ObservableType::OneWayDifferencedRange => {
                let integration_time = match &settings.details {
                    ObservationDetails::DifferencedRange { integration_time } => {
                        integration_time.clone()
                    }
                    _ => {
                        return Err(ObsError::InvalidSettings {
                            observable,
                            reason: "differenced range requires an integration time function"
                                .to_string(),
                        })
                    }
                };
                let (transmitter, receiver) = one_way_ids(link_ends, observable)?;
                let bias = Self::bias(link_ends, observable, settings, env)?;
                Ok(Box::new(OneWayDifferencedRangeModel {
                    arc_start_light_time: create_light_time_calculator(
                        transmitter,
                        receiver,
                        env,
                        &settings.light_time_corrections,
                    )?,
                    arc_end_light_time: create_light_time_calculator(
                        transmitter,
                        receiver,
                        env,
                        &settings.light_time_corrections,
                    )?,
                    integration_time,
                    bias,
                }))
            }
            ObservableType::NWayRange => {
                if link_ends.len() < 2 {
                    return Err(ObsError::InvalidLinkEndTopology {
                        observable,
                        reason: format!("{} link ends found, expected at least 2", link_ends.len()),
                    });
                }
                // The chain must be complete: transmitter, every intermediate
                // reflector in order, receiver.
                let roles = LinkEndType::chain(link_ends.len());
                for role in &roles {
                    if !link_ends.contains(*role) {
                        return Err(ObsError::InvalidLinkEndTopology {
                            observable,
                            reason: format!("no {role} found"),
                        });
                    }
                }

                let bias = Self::bias(link_ends, observable, settings, env)?;
                let n_legs = link_ends.len() - 1;

                let (leg_corrections, retransmission_delays) = match &settings.details {
                    ObservationDetails::Standard => {
                        (vec![settings.light_time_corrections.clone(); n_legs], None)
                    }
                    ObservationDetails::NWayRange {
                        legs,
                        retransmission_delays,
                    } => {
                        if legs.len() != n_legs {
                            return Err(ObsError::InvalidSettings {
                                observable,
                                reason: format!(
                                    "{} constituent links for {} hops",
                                    legs.len(),
                                    n_legs
                                ),
                            });
                        }
                        let mut corrections = Vec::with_capacity(n_legs);
                        for leg in legs {
                            if leg.observable != ObservableType::OneWayRange {
                                return Err(ObsError::InvalidSettings {
                                    observable,
                                    reason: format!(
                                        "constituent link is of type {}, not one-way range",
                                        leg.observable
                                    ),
                                });
                            }
                            corrections.push(leg.light_time_corrections.clone());
                        }
                        (corrections, retransmission_delays.clone())
                    }
                    _ => {
                        return Err(ObsError::InvalidSettings {
                            observable,
                            reason: "payload does not belong to an n-way range observable"
                                .to_string(),
                        })
                    }
                };

                let ids: Vec<&LinkEndId> = link_ends.iter().map(|(_, id)| id).collect();
                let mut light_times = Vec::with_capacity(n_legs);
                for (hop, corrections) in leg_corrections.iter().enumerate() {
                    light_times.push(create_light_time_calculator(
                        ids[hop],
                        ids[hop + 1],
                        env,
                        corrections,
                    )?);
                }

                Ok(Box::new(NWayRangeModel {
                    light_times,
                    retransmission_delays,
                    bias,
                }))
            }
            _ => Err(ObsError::UnsupportedObservable {
                observable,
                size: 1,
            }),
        }
    }

    fn bias(
        link_ends: &LinkEnds,
        observable: ObservableType,
        settings: &ObservationSettings,
        env: &Environment,
    ) -> Result<Option<Box<dyn ObservationBias<U1>>>, ObsError> {
        settings
            .bias
            .as_ref()
            .map(|bias| create_bias_calculator::<U1>(link_ends, observable, bias, env))
            .transpose()
    }
}

impl ObservationModelBuilder<U2> {
    pub fn build(
        link_ends: &LinkEnds,
        settings: &ObservationSettings,
        env: &Environment,
    ) -> Result<Box<dyn ObservationModel<U2>>, ObsError> {
        let observable = settings.observable;
        match observable {
            ObservableType::AngularPosition => {
                if !matches!(settings.details, ObservationDetails::Standard) {
                    return Err(ObsError::InvalidSettings {
                        observable,
                        reason: "payload does not belong to an angular position observable"
                            .to_string(),
                    });
                }
                let (transmitter, receiver) = one_way_ids(link_ends, observable)?;
                let bias = settings
                    .bias
                    .as_ref()
                    .map(|bias| create_bias_calculator::<U2>(link_ends, observable, bias, env))
                    .transpose()?;
                Ok(Box::new(AngularPositionModel {
                    light_time: create_light_time_calculator(
                        transmitter,
                        receiver,
                        env,
                        &settings.light_time_corrections,
                    )?,
                    bias,
                }))
            }
            _ => Err(ObsError::UnsupportedObservable {
                observable,
                size: 2,
            }),
        }
    }
}

impl ObservationModelBuilder<U3> {
    pub fn build(
        link_ends: &LinkEnds,
        settings: &ObservationSettings,
        env: &Environment,
    ) -> Result<Box<dyn ObservationModel<U3>>, ObsError> {
        let observable = settings.observable;
        match observable {
            ObservableType::PositionObservable => {
                if !matches!(settings.details, ObservationDetails::Standard) {
                    return Err(ObsError::InvalidSettings {
                        observable,
                        reason: "payload does not belong to a position observable".to_string(),
                    });
                }
                let ids = require_roles(link_ends, observable, &[LinkEndType::ObservedBody])?;
                if !settings.light_time_corrections.is_empty() {
                    return Err(ObsError::InvalidSettings {
                        observable,
                        reason: "light time corrections found on a direct state observable"
                            .to_string(),
                    });
                }
                let observed = ids[0];
                if observed.station.is_some() {
                    return Err(ObsError::Unsupported {
                        reason: "cannot yet observe the position of a reference point".to_string(),
                    });
                }

                let body = env
                    .body(&observed.body)
                    .ok_or_else(|| ObsError::BodyNotFound {
                        body: observed.body.clone(),
                    })?;
                let ephemeris =
                    body.ephemeris()
                        .cloned()
                        .ok_or_else(|| ObsError::MissingEnvironmentModel {
                            body: observed.body.clone(),
                            model: "ephemeris",
                        })?;
                let bias = settings
                    .bias
                    .as_ref()
                    .map(|bias| create_bias_calculator::<U3>(link_ends, observable, bias, env))
                    .transpose()?;
                Ok(Box::new(PositionObservableModel { ephemeris, bias }))
            }
            _ => Err(ObsError::UnsupportedObservable {
                observable,
                size: 3,
            }),
        }
    }
}
