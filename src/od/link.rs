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

use super::{ObsError, ObservableType};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The role of one link end in an observation geometry.
///
/// The derived ordering follows the signal path: transmitter, then the
/// reflectors in order, then the receiver. [LinkEnds] iterates in that order.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkEndType {
    Transmitter,
    /// Retransmitting link end of an n-way observable, 1-based along the chain.
    Reflector(usize),
    Receiver,
    /// The single link end of a direct state observable.
    ObservedBody,
}

impl LinkEndType {
    /// The ordered roles of a relay chain with `n_link_ends` ends:
    /// transmitter, reflector 1 through `n_link_ends - 2`, receiver.
    pub fn chain(n_link_ends: usize) -> Vec<LinkEndType> {
        let mut roles = Vec::with_capacity(n_link_ends);
        roles.push(Self::Transmitter);
        for k in 1..n_link_ends.saturating_sub(1) {
            roles.push(Self::Reflector(k));
        }
        if n_link_ends >= 2 {
            roles.push(Self::Receiver);
        }
        roles
    }
}

impl fmt::Display for LinkEndType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Transmitter => write!(f, "transmitter"),
            Self::Reflector(k) => write!(f, "reflector {k}"),
            Self::Receiver => write!(f, "receiver"),
            Self::ObservedBody => write!(f, "observed body"),
        }
    }
}

/// The identity of a link end: a body, and optionally one of its reference points (e.g. a ground station).
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEndId {
    pub body: String,
    pub station: Option<String>,
}

impl LinkEndId {
    /// A link end at the center of mass of a body.
    pub fn body(name: impl Into<String>) -> Self {
        Self {
            body: name.into(),
            station: None,
        }
    }

    /// A link end at a named station of a body.
    pub fn station(body: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            station: Some(station.into()),
        }
    }

    /// Whether this identity designates `other`, treating a station-less
    /// identity as matching every station of its body.
    pub fn matches(&self, other: &LinkEndId) -> bool {
        self.body == other.body && (self.station.is_none() || self.station == other.station)
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.station {
            Some(station) => write!(f, "{}/{}", self.body, station),
            None => write!(f, "{}", self.body),
        }
    }
}

/// The link ends of one observation: an ordered mapping from role to identity.
///
/// Immutable once handed to a factory.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEnds(BTreeMap<LinkEndType, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one_way(transmitter: LinkEndId, receiver: LinkEndId) -> Self {
        let mut ends = Self::new();
        ends.insert(LinkEndType::Transmitter, transmitter);
        ends.insert(LinkEndType::Receiver, receiver);
        ends
    }

    pub fn two_way(transmitter: LinkEndId, reflector: LinkEndId, receiver: LinkEndId) -> Self {
        let mut ends = Self::new();
        ends.insert(LinkEndType::Transmitter, transmitter);
        ends.insert(LinkEndType::Reflector(1), reflector);
        ends.insert(LinkEndType::Receiver, receiver);
        ends
    }

    /// Builds a transmitter -> reflectors -> receiver chain in the order of the provided identities.
    pub fn chain(ids: Vec<LinkEndId>) -> Self {
        let roles = LinkEndType::chain(ids.len());
        let mut ends = Self::new();
        for (role, id) in roles.into_iter().zip(ids) {
            ends.insert(role, id);
        }
        ends
    }

    pub fn observed(body: LinkEndId) -> Self {
        let mut ends = Self::new();
        ends.insert(LinkEndType::ObservedBody, body);
        ends
    }

    pub fn insert(&mut self, role: LinkEndType, id: LinkEndId) {
        self.0.insert(role, id);
    }

    pub fn remove(&mut self, role: LinkEndType) -> Option<LinkEndId> {
        self.0.remove(&role)
    }

    pub fn get(&self, role: LinkEndType) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn contains(&self, role: LinkEndType) -> bool {
        self.0.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in signal-path order.
    pub fn iter(&self) -> impl Iterator<Item = (&LinkEndType, &LinkEndId)> {
        self.0.iter()
    }
}

/// Indices of the link end events associated with `role` in the flattened
/// state/time vectors of an observation of type `observable`.
///
/// This convention is shared by the observation model factory, the arc-wise
/// bias factory and the viability factory: a chain of `n` link ends flattens
/// to `2(n - 1)` events, departure then arrival per leg, so an intermediate
/// end owns an arrival index and the following departure index. The one-way
/// differenced range observable owns four events, start leg then end leg.
pub fn link_end_indices(
    observable: ObservableType,
    n_link_ends: usize,
    role: LinkEndType,
) -> Result<Vec<usize>, ObsError> {
    let undefined = || ObsError::InvalidLinkEndTopology {
        observable,
        reason: format!("link end {role} plays no part in this observable"),
    };

    match observable {
        ObservableType::OneWayRange | ObservableType::OneWayDoppler | ObservableType::AngularPosition => {
            match role {
                LinkEndType::Transmitter => Ok(vec![0]),
                LinkEndType::Receiver => Ok(vec![1]),
                _ => Err(undefined()),
            }
        }
        ObservableType::OneWayDifferencedRange => match role {
            LinkEndType::Transmitter => Ok(vec![0, 2]),
            LinkEndType::Receiver => Ok(vec![1, 3]),
            _ => Err(undefined()),
        },
        ObservableType::TwoWayDoppler | ObservableType::NWayRange => {
            let roles = LinkEndType::chain(n_link_ends);
            let position = roles.iter().position(|r| *r == role).ok_or_else(undefined)?;
            if position == 0 {
                Ok(vec![0])
            } else if position == n_link_ends - 1 {
                Ok(vec![2 * (n_link_ends - 1) - 1])
            } else {
                Ok(vec![2 * position - 1, 2 * position])
            }
        }
        ObservableType::PositionObservable => match role {
            LinkEndType::ObservedBody => Ok(vec![0]),
            _ => Err(undefined()),
        },
    }
}

/// Pairs of (index to check, index of the opposite end of the same leg) for
/// every link end of `link_ends` designated by `id`, used by the viability
/// calculators. Departure events pair with the next index, arrivals with the
/// previous one.
pub fn viability_link_end_indices(
    link_ends: &LinkEnds,
    observable: ObservableType,
    id: &LinkEndId,
) -> Result<Vec<(usize, usize)>, ObsError> {
    let mut pairs = Vec::new();
    for (role, end_id) in link_ends.iter() {
        if !id.matches(end_id) {
            continue;
        }
        for index in link_end_indices(observable, link_ends.len(), *role)? {
            let opposite = if index % 2 == 0 { index + 1 } else { index - 1 };
            pairs.push((index, opposite));
        }
    }
    Ok(pairs)
}
