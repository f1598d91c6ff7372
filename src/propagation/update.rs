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

use super::UpdateError;
use crate::cosmic::Environment;
use crate::dynamics::{AccelerationMap, AccelerationModel, MassRateMap, TorqueMap, TorqueModel};
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// One facet of the environment that may need refreshing before a model evaluation.
#[derive(
    Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum EnvironmentUpdate {
    TranslationalState,
    RotationalState,
    SphericalHarmonicGravityField,
    FlightConditions,
    RadiationPressure,
    Mass,
}

impl fmt::Display for EnvironmentUpdate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TranslationalState => write!(f, "translational state"),
            Self::RotationalState => write!(f, "rotational state"),
            Self::SphericalHarmonicGravityField => write!(f, "spherical harmonic gravity field"),
            Self::FlightConditions => write!(f, "flight conditions"),
            Self::RadiationPressure => write!(f, "radiation pressure"),
            Self::Mass => write!(f, "mass"),
        }
    }
}

/// The set of environment refreshes a propagation needs each step: facet to
/// the names of the bodies requiring it.
///
/// [UpdateSet::merge] appends verbatim and may leave duplicate names behind;
/// the resolvers of this module deduplicate once before returning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSet {
    updates: BTreeMap<EnvironmentUpdate, Vec<String>>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.values().all(Vec::is_empty)
    }

    /// Requests `facet` to be refreshed for `body`.
    pub fn add(&mut self, facet: EnvironmentUpdate, body: impl Into<String>) {
        self.updates.entry(facet).or_default().push(body.into());
    }

    /// The bodies requiring `facet`, in insertion order.
    pub fn bodies(&self, facet: EnvironmentUpdate) -> &[String] {
        self.updates.get(&facet).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, facet: EnvironmentUpdate, body: &str) -> bool {
        self.bodies(facet).iter().any(|name| name == body)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EnvironmentUpdate, &Vec<String>)> {
        self.updates.iter()
    }

    /// Appends every entry of `other`, in `other`'s order, without removing
    /// or deduplicating anything.
    pub fn merge(&mut self, other: &UpdateSet) {
        for (facet, bodies) in &other.updates {
            self.updates
                .entry(*facet)
                .or_default()
                .extend(bodies.iter().cloned());
        }
    }

    /// Removes duplicate bodies per facet, keeping first occurrences.
    pub fn dedup(&mut self) {
        for bodies in self.updates.values_mut() {
            let mut seen = Vec::with_capacity(bodies.len());
            bodies.retain(|name| {
                if seen.contains(name) {
                    false
                } else {
                    seen.push(name.clone());
                    true
                }
            });
        }
    }

    /// Drops the facet refresh of every body whose corresponding state is
    /// already maintained by the integrator, so that the update does not
    /// overwrite a propagated state. Removes the first matching entry per
    /// propagated body.
    pub fn remove_propagated_states(&mut self, propagated: &PropagatedStateList) {
        for (kind, bodies) in propagated.iter() {
            let facet = match kind {
                PropagatedStateKind::Translational => EnvironmentUpdate::TranslationalState,
                PropagatedStateKind::Rotational => EnvironmentUpdate::RotationalState,
                PropagatedStateKind::Mass => EnvironmentUpdate::Mass,
                PropagatedStateKind::Custom => continue,
            };
            if let Entry::Occupied(mut entry) = self.updates.entry(facet) {
                for body in bodies {
                    if let Some(found) = entry.get().iter().position(|name| name == body) {
                        entry.get_mut().remove(found);
                    }
                }
            }
        }
    }
}

/// The kind of one propagated state variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropagatedStateKind {
    Translational,
    Rotational,
    Mass,
    /// User-defined states never shadow an environment facet.
    Custom,
}

/// The states a propagation maintains itself, per kind and body name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagatedStateList {
    states: BTreeMap<PropagatedStateKind, Vec<String>>,
}

impl PropagatedStateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translational(bodies: Vec<String>) -> Self {
        let mut list = Self::new();
        for body in bodies {
            list.add(PropagatedStateKind::Translational, body);
        }
        list
    }

    pub fn add(&mut self, kind: PropagatedStateKind, body: impl Into<String>) {
        self.states.entry(kind).or_default().push(body.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropagatedStateKind, &Vec<String>)> {
        self.states.iter()
    }
}

/// Checks that every requested (facet, body) pair can actually be refreshed:
/// the body must exist and carry the sub-model the facet implies. Entries
/// with an empty body name are global requirements and are skipped.
pub fn check_validity(requested: &UpdateSet, env: &Environment) -> Result<(), UpdateError> {
    for (facet, bodies) in requested.iter() {
        for name in bodies {
            if name.is_empty() {
                continue;
            }
            let body = env.body(name).ok_or_else(|| UpdateError::BodyNotFound {
                body: name.clone(),
            })?;
            let missing = |model: &'static str| UpdateError::MissingEnvironmentModel {
                body: name.clone(),
                model,
            };
            match facet {
                EnvironmentUpdate::TranslationalState => {
                    if body.ephemeris().is_none() {
                        return Err(missing("ephemeris"));
                    }
                }
                EnvironmentUpdate::RotationalState => {
                    if !body.has_rotation_source() {
                        return Err(missing("rotational ephemeris or orientation calculator"));
                    }
                }
                EnvironmentUpdate::SphericalHarmonicGravityField => {
                    if !body.gravity().is_some_and(|g| g.is_spherical_harmonic()) {
                        return Err(missing("spherical harmonic gravity field"));
                    }
                }
                EnvironmentUpdate::FlightConditions => {
                    if body.flight_conditions().is_none() {
                        return Err(missing("flight conditions"));
                    }
                }
                EnvironmentUpdate::RadiationPressure => {
                    if body.radiation_pressure().is_empty() {
                        return Err(missing("radiation pressure interface"));
                    }
                }
                EnvironmentUpdate::Mass => {
                    if body.mass_kg().is_none() {
                        return Err(missing("mass"));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Derives the update set required by the translational acceleration models.
///
/// Every contribution of a single model is validated against the environment
/// before being merged into the full set.
pub fn updates_from_accelerations(
    models: &AccelerationMap,
    env: &Environment,
) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();

    for (accelerated, per_exerting) in models {
        for (exerting, accelerations) in per_exerting {
            let mut single = UpdateSet::new();
            for acceleration in accelerations {
                // An exerting body not under propagation needs its state refreshed.
                if !models.contains_key(exerting) {
                    single.add(EnvironmentUpdate::TranslationalState, exerting.clone());
                }

                match acceleration {
                    AccelerationModel::PointMassGravity | AccelerationModel::Empirical => {}
                    AccelerationModel::ThirdBodyPointMassGravity { central_body } => {
                        if !models.contains_key(central_body) {
                            single.add(EnvironmentUpdate::TranslationalState, central_body.clone());
                        }
                    }
                    AccelerationModel::Aerodynamic => {
                        single.add(EnvironmentUpdate::RotationalState, exerting.clone());
                        single.add(EnvironmentUpdate::FlightConditions, accelerated.clone());
                        single.add(EnvironmentUpdate::Mass, accelerated.clone());
                    }
                    AccelerationModel::CannonballRadiationPressure => {
                        single.add(EnvironmentUpdate::RadiationPressure, accelerated.clone());
                        single.add(EnvironmentUpdate::Mass, accelerated.clone());
                    }
                    AccelerationModel::SphericalHarmonicGravity => {
                        single.add(EnvironmentUpdate::RotationalState, exerting.clone());
                        single.add(
                            EnvironmentUpdate::SphericalHarmonicGravityField,
                            exerting.clone(),
                        );
                    }
                    AccelerationModel::MutualSphericalHarmonicGravity => {
                        for body in [exerting, accelerated] {
                            single.add(EnvironmentUpdate::RotationalState, body.clone());
                            single.add(
                                EnvironmentUpdate::SphericalHarmonicGravityField,
                                body.clone(),
                            );
                        }
                    }
                    AccelerationModel::ThirdBodySphericalHarmonicGravity { central_body } => {
                        single.add(EnvironmentUpdate::RotationalState, exerting.clone());
                        single.add(
                            EnvironmentUpdate::SphericalHarmonicGravityField,
                            exerting.clone(),
                        );
                        if !models.contains_key(central_body) {
                            single.add(EnvironmentUpdate::TranslationalState, central_body.clone());
                        }
                    }
                    AccelerationModel::ThirdBodyMutualSphericalHarmonicGravity { central_body } => {
                        for body in [exerting, accelerated] {
                            single.add(EnvironmentUpdate::RotationalState, body.clone());
                            single.add(
                                EnvironmentUpdate::SphericalHarmonicGravityField,
                                body.clone(),
                            );
                        }
                        if !models.contains_key(central_body) {
                            single.add(EnvironmentUpdate::TranslationalState, central_body.clone());
                            single.add(EnvironmentUpdate::RotationalState, central_body.clone());
                            single.add(
                                EnvironmentUpdate::SphericalHarmonicGravityField,
                                central_body.clone(),
                            );
                        }
                    }
                    AccelerationModel::Thrust { required_updates } => {
                        single.merge(required_updates);
                        single.add(EnvironmentUpdate::Mass, accelerated.clone());
                    }
                    AccelerationModel::RelativisticCorrection {
                        compute_de_sitter,
                        primary_body,
                    } => {
                        if *compute_de_sitter && !models.contains_key(primary_body) {
                            single.add(EnvironmentUpdate::TranslationalState, primary_body.clone());
                        }
                    }
                    AccelerationModel::DirectTidalDissipation => {
                        single.add(EnvironmentUpdate::RotationalState, exerting.clone());
                        single.add(
                            EnvironmentUpdate::SphericalHarmonicGravityField,
                            exerting.clone(),
                        );
                    }
                }
            }

            check_validity(&single, env)?;
            updates.merge(&single);
        }
    }

    updates.dedup();
    Ok(updates)
}

/// Derives the update set required by the torque models.
pub fn updates_from_torques(models: &TorqueMap, env: &Environment) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();

    for (torqued, per_exerting) in models {
        for (exerting, torques) in per_exerting {
            let mut single = UpdateSet::new();
            for torque in torques {
                match torque {
                    TorqueModel::SecondOrderGravitational => {}
                    TorqueModel::Aerodynamic => {
                        single.add(EnvironmentUpdate::RotationalState, exerting.clone());
                        single.add(EnvironmentUpdate::FlightConditions, torqued.clone());
                    }
                }
            }
            check_validity(&single, env)?;
            updates.merge(&single);
        }
    }

    updates.dedup();
    Ok(updates)
}

/// Derives the update set required by the mass rate models. The known kinds
/// need no refreshes of their own; the set stays empty.
pub fn updates_from_mass_rates(
    models: &MassRateMap,
    env: &Environment,
) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();

    for rates in models.values() {
        for _rate in rates {
            let single = UpdateSet::new();
            check_validity(&single, env)?;
            updates.merge(&single);
        }
    }

    updates.dedup();
    Ok(updates)
}

/// Builds the brute-force update set refreshing every facet any body of the
/// environment carries, for when fine-grained dependency tracking is not
/// performed. Every body's mass is refreshed unconditionally.
pub fn full_update_set(env: &Environment) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();

    for (name, body) in env.bodies() {
        let mut single = UpdateSet::new();

        if body.flight_conditions().is_some() {
            single.add(EnvironmentUpdate::FlightConditions, name.clone());
        }
        for _interface in body.radiation_pressure().values() {
            single.add(EnvironmentUpdate::RadiationPressure, name.clone());
        }
        if body.has_rotation_source() {
            single.add(EnvironmentUpdate::RotationalState, name.clone());
        }
        if body.gravity().is_some_and(|g| g.is_time_dependent()) {
            single.add(EnvironmentUpdate::SphericalHarmonicGravityField, name.clone());
        }
        single.add(EnvironmentUpdate::Mass, name.clone());

        check_validity(&single, env)?;
        updates.merge(&single);
    }

    updates.dedup();
    debug!(
        "brute-force update set covers {} facet(s) over {} bodies",
        updates.iter().count(),
        env.len()
    );
    Ok(updates)
}
