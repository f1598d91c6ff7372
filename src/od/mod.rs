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

use serde_derive::{Deserialize, Serialize};
use snafu::prelude::Snafu;
use std::fmt;

/// Provides link end roles, identifiers and topologies.
pub mod link;
pub use link::{LinkEndId, LinkEndType, LinkEnds};

/// Provides the settings data model for observation construction.
pub mod settings;
pub use settings::{
    LightTimeCorrectionSettings, ObservationBiasSettings, ObservationDetails, ObservationSettings,
    ProperTimeRateSettings,
};

/// Provides observation bias calculators and their factory.
pub mod bias;

/// Provides the one-way Doppler proper time rate calculator and its factory.
pub mod doppler;

/// Provides light time calculator construction.
pub mod light_time;

/// Provides the observation models and the size-specific model factory.
pub mod model;

/// Provides aggregation of observation models into simulators.
pub mod simulator;

/// Provides observation viability calculators and their factories.
pub mod viability;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::bias::*;
    pub use super::doppler::*;
    pub use super::light_time::*;
    pub use super::model::*;
    pub use super::settings::*;
    pub use super::simulator::*;
    pub use super::viability::*;
    pub use super::*;

    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

/// The type of an observable, which keys every per-observable dispatch of this module.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObservableType {
    OneWayRange,
    OneWayDoppler,
    TwoWayDoppler,
    /// One-way differenced range rate, i.e. closed-loop Doppler.
    OneWayDifferencedRange,
    NWayRange,
    AngularPosition,
    PositionObservable,
}

impl ObservableType {
    /// The fixed dimension of this observable.
    pub fn dimension(self) -> usize {
        match self {
            Self::OneWayRange
            | Self::OneWayDoppler
            | Self::TwoWayDoppler
            | Self::OneWayDifferencedRange
            | Self::NWayRange => 1,
            Self::AngularPosition => 2,
            Self::PositionObservable => 3,
        }
    }
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OneWayRange => write!(f, "one-way range"),
            Self::OneWayDoppler => write!(f, "one-way Doppler"),
            Self::TwoWayDoppler => write!(f, "two-way Doppler"),
            Self::OneWayDifferencedRange => write!(f, "one-way differenced range"),
            Self::NWayRange => write!(f, "n-way range"),
            Self::AngularPosition => write!(f, "angular position"),
            Self::PositionObservable => write!(f, "position observable"),
        }
    }
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ObsError {
    #[snafu(display("settings for {observable} are inconsistent: {reason}"))]
    InvalidSettings {
        observable: ObservableType,
        reason: String,
    },
    #[snafu(display("invalid link end topology for {observable}: {reason}"))]
    InvalidLinkEndTopology {
        observable: ObservableType,
        reason: String,
    },
    #[snafu(display("bias vector of length {got} inconsistent with observable of size {expected}"))]
    DimensionMismatch { expected: usize, got: usize },
    #[snafu(display("body {body} does not exist in the environment"))]
    BodyNotFound { body: String },
    #[snafu(display("no {model} found for {body}"))]
    MissingEnvironmentModel {
        body: String,
        model: &'static str,
    },
    #[snafu(display("observable {observable} not recognized when making size {size} observation models"))]
    UnsupportedObservable {
        observable: ObservableType,
        size: usize,
    },
    #[snafu(display("cannot create an observation simulator for size {size}, only 1, 2 and 3"))]
    UnsupportedDimension { size: usize },
    #[snafu(display("{reason}"))]
    Unsupported { reason: String },
}
