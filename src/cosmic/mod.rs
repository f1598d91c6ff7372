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

use crate::linalg::Vector6;
use crate::time::Epoch;
use std::collections::BTreeMap;

mod body;
pub use self::body::*;

/// Speed of light in meters per second
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Speed of light in kilometers per second
pub const SPEED_OF_LIGHT_KMS: f64 = SPEED_OF_LIGHT / 1000.0;

/// Astronomical unit, in kilometers, according to the [IAU](https://www.iau.org/public/themes/measuring/).
pub const AU: f64 = 149_597_870.700;

/// From NIST special publication 330, 2008 edition, in meters per second squared
pub const STD_GRAVITY: f64 = 9.80665;

/// The environment: all of the bodies of a simulation, by name.
///
/// This is the container every factory of this crate reads from. The only
/// mutation performed by this crate is the lazy attachment of flight
/// conditions in [crate::propagation::updates_from_dependent_variables].
#[derive(Clone, Default)]
pub struct Environment {
    bodies: BTreeMap<String, Body>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a body.
    pub fn add_body(&mut self, name: impl Into<String>, body: Body) {
        self.bodies.insert(name.into(), body);
    }

    pub fn has_body(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.get(name)
    }

    pub fn body_mut(&mut self, name: &str) -> Option<&mut Body> {
        self.bodies.get_mut(name)
    }

    /// Iterate over all bodies in name order.
    pub fn bodies(&self) -> impl Iterator<Item = (&String, &Body)> {
        self.bodies.iter()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// State of the named body in the base frame, from its ephemeris.
    pub fn state_in_base_frame(&self, name: &str, epoch: Epoch) -> Option<Vector6<f64>> {
        self.body(name)
            .and_then(|body| body.ephemeris())
            .map(|eph| eph.state_at(epoch))
    }
}
