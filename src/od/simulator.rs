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

use super::model::{ObservationModel, ObservationModelBuilder};
use super::settings::ObservationSettings;
use super::{LinkEnds, ObsError, ObservableType};
use crate::cosmic::Environment;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector, U1, U2, U3};
use crate::time::Epoch;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// All observation models of one observable type, keyed by their link ends.
pub struct ObservationSimulator<N: DimName>
where
    DefaultAllocator: Allocator<N>,
{
    observable: ObservableType,
    models: BTreeMap<LinkEnds, Box<dyn ObservationModel<N>>>,
}

impl<N: DimName> ObservationSimulator<N>
where
    DefaultAllocator: Allocator<N>,
{
    pub fn observable_type(&self) -> ObservableType {
        self.observable
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, link_ends: &LinkEnds) -> Option<&dyn ObservationModel<N>> {
        self.models.get(link_ends).map(|model| model.as_ref())
    }

    pub fn link_ends(&self) -> impl Iterator<Item = &LinkEnds> {
        self.models.keys()
    }

    /// Evaluates every model of this simulator at `epoch`.
    pub fn observe_all(&self, epoch: Epoch) -> BTreeMap<LinkEnds, OVector<f64, N>> {
        self.models
            .iter()
            .map(|(link_ends, model)| (link_ends.clone(), model.observe(epoch)))
            .collect()
    }
}

/// A simulator of any observation size, the value type of the full registry.
pub enum ObservationSimulatorSet {
    Scalar(ObservationSimulator<U1>),
    Angular(ObservationSimulator<U2>),
    Cartesian(ObservationSimulator<U3>),
}

impl ObservationSimulatorSet {
    pub fn observable_type(&self) -> ObservableType {
        match self {
            Self::Scalar(sim) => sim.observable_type(),
            Self::Angular(sim) => sim.observable_type(),
            Self::Cartesian(sim) => sim.observable_type(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(sim) => sim.len(),
            Self::Angular(sim) => sim.len(),
            Self::Cartesian(sim) => sim.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observation settings sorted per observable type, the regrouped form of the
/// unsorted per-link-ends list. Entries keep their relative order.
pub type SortedObservationSettings = BTreeMap<ObservableType, Vec<(LinkEnds, ObservationSettings)>>;

fn collect_models<N, F>(
    observable: ObservableType,
    settings_per_link_ends: &[(LinkEnds, ObservationSettings)],
    env: &Environment,
    build: F,
) -> Result<ObservationSimulator<N>, ObsError>
where
    N: DimName,
    DefaultAllocator: Allocator<N>,
    F: Fn(&LinkEnds, &ObservationSettings, &Environment) -> Result<Box<dyn ObservationModel<N>>, ObsError>
        + Sync,
{
    let built: Vec<(LinkEnds, Box<dyn ObservationModel<N>>)> = settings_per_link_ends
        .par_iter()
        .map(|(link_ends, settings)| {
            build(link_ends, settings, env).map(|model| (link_ends.clone(), model))
        })
        .collect::<Result<_, _>>()?;

    let mut models = BTreeMap::new();
    for (link_ends, model) in built {
        if models.insert(link_ends.clone(), model).is_some() {
            // Refusing to overwrite keeps the entry count honest.
            return Err(ObsError::InvalidSettings {
                observable,
                reason: format!("duplicate settings for link ends {link_ends:?}"),
            });
        }
    }

    debug!("built {} {} model(s)", models.len(), observable);
    Ok(ObservationSimulator {
        observable,
        models,
    })
}

/// Creates the simulator of one observable type from its per-link-ends settings.
pub fn create_observation_simulator(
    observable: ObservableType,
    settings_per_link_ends: &[(LinkEnds, ObservationSettings)],
    env: &Environment,
) -> Result<ObservationSimulatorSet, ObsError> {
    match observable.dimension() {
        1 => Ok(ObservationSimulatorSet::Scalar(collect_models(
            observable,
            settings_per_link_ends,
            env,
            ObservationModelBuilder::<U1>::build,
        )?)),
        2 => Ok(ObservationSimulatorSet::Angular(collect_models(
            observable,
            settings_per_link_ends,
            env,
            ObservationModelBuilder::<U2>::build,
        )?)),
        3 => Ok(ObservationSimulatorSet::Cartesian(collect_models(
            observable,
            settings_per_link_ends,
            env,
            ObservationModelBuilder::<U3>::build,
        )?)),
        size => Err(ObsError::UnsupportedDimension { size }),
    }
}

/// Creates one simulator per observable type from settings sorted per type.
pub fn create_observation_simulators(
    sorted: &SortedObservationSettings,
    env: &Environment,
) -> Result<BTreeMap<ObservableType, ObservationSimulatorSet>, ObsError> {
    let mut simulators = BTreeMap::new();
    for (observable, settings_per_link_ends) in sorted {
        simulators.insert(
            *observable,
            create_observation_simulator(*observable, settings_per_link_ends, env)?,
        );
    }
    info!(
        "created {} observation simulator(s) for {} observable type(s)",
        simulators.values().map(ObservationSimulatorSet::len).sum::<usize>(),
        simulators.len()
    );
    Ok(simulators)
}

/// Regroups an unsorted per-link-ends settings list into per-observable-type
/// buckets, reading the type out of each settings object.
///
/// Pure: every entry lands in exactly one bucket, in its original relative
/// order; nothing is dropped or merged.
pub fn sort_observation_settings(
    unsorted: Vec<(LinkEnds, ObservationSettings)>,
) -> SortedObservationSettings {
    let mut sorted = SortedObservationSettings::new();
    for (link_ends, settings) in unsorted {
        sorted
            .entry(settings.observable)
            .or_default()
            .push((link_ends, settings));
    }
    sorted
}

/// Creates one simulator per observable type from an unsorted settings list.
pub fn create_observation_simulators_unsorted(
    unsorted: Vec<(LinkEnds, ObservationSettings)>,
    env: &Environment,
) -> Result<BTreeMap<ObservableType, ObservationSimulatorSet>, ObsError> {
    create_observation_simulators(&sort_observation_settings(unsorted), env)
}
