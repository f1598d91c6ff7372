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

use super::link::LinkEndType;
use super::ObservableType;
use crate::linalg::DVector;
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;

/// Returns the integration time of a differenced range observable as a function of observation time.
pub type IntegrationTimeFn = Arc<dyn Fn(Epoch) -> Duration + Send + Sync>;

/// Returns the retransmission delays at each reflector of an n-way observable as a function of observation time.
pub type RetransmissionDelayFn = Arc<dyn Fn(Epoch) -> Vec<Duration> + Send + Sync>;

/// Settings for one light time correction of a link.
///
/// These attach to observation settings as an ordered list and are consumed
/// by the light time calculator construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightTimeCorrectionSettings {
    /// First order relativistic delay due to the listed perturbing bodies.
    FirstOrderRelativistic { perturbing_bodies: Vec<String> },
}

/// Settings for the creation of an observation bias calculator.
#[derive(Clone, Debug, PartialEq)]
pub enum ObservationBiasSettings {
    /// A fixed vector added to every evaluation. Its length must equal the observable dimension.
    ConstantAbsolute(DVector<f64>),
    /// A fixed vector multiplied element-wise with the computed observable, then added.
    ConstantRelative(DVector<f64>),
    ArcWiseAbsolute {
        /// Start time of each arc, ascending.
        arc_start_times: Vec<Epoch>,
        /// One bias vector per arc.
        biases: Vec<DVector<f64>>,
        /// Link end whose event time decides the current arc.
        time_link_end: LinkEndType,
    },
    ArcWiseRelative {
        arc_start_times: Vec<Epoch>,
        biases: Vec<DVector<f64>>,
        time_link_end: LinkEndType,
    },
    /// Nested biases composed by summation at evaluation time.
    Multiple(Vec<ObservationBiasSettings>),
}

/// Settings for the proper time rate at a single link end of a one-way Doppler observable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProperTimeRateSettings {
    /// First order rate from the monopole of a single central body.
    DirectFirstOrder { central_body: String },
}

/// The per-observable payload of [ObservationSettings].
///
/// The observable tag and this payload can disagree when hand-constructed;
/// the factories re-check the combination and reject inconsistent pairs.
#[derive(Clone)]
pub enum ObservationDetails {
    /// No payload beyond the common fields.
    Standard,
    OneWayDoppler {
        transmitter_rate: Option<ProperTimeRateSettings>,
        receiver_rate: Option<ProperTimeRateSettings>,
    },
    TwoWayDoppler {
        uplink: Box<ObservationSettings>,
        downlink: Box<ObservationSettings>,
    },
    DifferencedRange {
        integration_time: IntegrationTimeFn,
    },
    NWayRange {
        /// One one-way range settings object per consecutive hop.
        legs: Vec<ObservationSettings>,
        retransmission_delays: Option<RetransmissionDelayFn>,
    },
}

/// Settings for the creation of one observation model.
#[derive(Clone)]
pub struct ObservationSettings {
    pub observable: ObservableType,
    /// Ordered light time corrections, owned by value; possibly empty.
    pub light_time_corrections: Vec<LightTimeCorrectionSettings>,
    /// At most one bias; `None` for an unbiased observable.
    pub bias: Option<ObservationBiasSettings>,
    pub details: ObservationDetails,
}

impl ObservationSettings {
    pub fn one_way_range(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::OneWayRange,
            light_time_corrections,
            bias,
            details: ObservationDetails::Standard,
        }
    }

    /// One-way Doppler without proper time rate contributions.
    pub fn one_way_doppler(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::OneWayDoppler,
            light_time_corrections,
            bias,
            details: ObservationDetails::Standard,
        }
    }

    pub fn one_way_doppler_with_rates(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        transmitter_rate: Option<ProperTimeRateSettings>,
        receiver_rate: Option<ProperTimeRateSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::OneWayDoppler,
            light_time_corrections,
            bias,
            details: ObservationDetails::OneWayDoppler {
                transmitter_rate,
                receiver_rate,
            },
        }
    }

    /// Two-way Doppler from explicit uplink and downlink one-way settings.
    pub fn two_way_doppler(
        uplink: ObservationSettings,
        downlink: ObservationSettings,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::TwoWayDoppler,
            light_time_corrections: Vec::new(),
            bias,
            details: ObservationDetails::TwoWayDoppler {
                uplink: Box::new(uplink),
                downlink: Box::new(downlink),
            },
        }
    }

    /// Two-way Doppler whose uplink and downlink legs are synthesized at
    /// build time, inheriting these light time corrections.
    pub fn two_way_doppler_from_corrections(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::TwoWayDoppler,
            light_time_corrections,
            bias,
            details: ObservationDetails::Standard,
        }
    }

    pub fn differenced_range(
        integration_time: IntegrationTimeFn,
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::OneWayDifferencedRange,
            light_time_corrections,
            bias,
            details: ObservationDetails::DifferencedRange { integration_time },
        }
    }

    /// N-way range from explicit per-hop one-way range settings.
    pub fn n_way_range(
        legs: Vec<ObservationSettings>,
        retransmission_delays: Option<RetransmissionDelayFn>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::NWayRange,
            light_time_corrections: Vec::new(),
            bias,
            details: ObservationDetails::NWayRange {
                legs,
                retransmission_delays,
            },
        }
    }

    /// N-way range with the same light time corrections on every one of the
    /// `n_link_ends - 1` hops.
    pub fn n_way_range_uniform(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        n_link_ends: usize,
        retransmission_delays: Option<RetransmissionDelayFn>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        let legs = (0..n_link_ends.saturating_sub(1))
            .map(|_| Self::one_way_range(light_time_corrections.clone(), None))
            .collect();
        Self::n_way_range(legs, retransmission_delays, bias)
    }

    pub fn angular_position(
        light_time_corrections: Vec<LightTimeCorrectionSettings>,
        bias: Option<ObservationBiasSettings>,
    ) -> Self {
        Self {
            observable: ObservableType::AngularPosition,
            light_time_corrections,
            bias,
            details: ObservationDetails::Standard,
        }
    }

    /// Direct Cartesian position observable; no light time corrections apply.
    pub fn position_observable(bias: Option<ObservationBiasSettings>) -> Self {
        Self {
            observable: ObservableType::PositionObservable,
            light_time_corrections: Vec::new(),
            bias,
            details: ObservationDetails::Standard,
        }
    }
}
