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

/*! # hemera

Hemera builds the runtime machinery of a tracking simulation from declarative
settings: observation models (range, Doppler, angular position, ...) with their
biases, proper-time rates and viability checks, and the minimal set of
environment refreshes a propagation needs before each evaluation step.
*/

/// Provides the environment container: bodies and their sub-models (ephemerides, gravity fields, flight conditions, ...).
pub mod cosmic;

/// Provides the descriptors of the dynamical models attached to a propagation.
pub mod dynamics;

/// Provides the observation setup: link topologies, observation settings, and the factories turning them into calculators.
pub mod od;

/// Provides the environment update set resolution for propagation.
pub mod propagation;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{Body, Environment};
