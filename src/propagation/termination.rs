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

use super::update::UpdateSet;
use super::variables::DependentVariableRequest;
use super::UpdateError;
use crate::cosmic::Environment;
use crate::time::{Duration, Epoch};

/// A condition deciding when a propagation stops.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminationCondition {
    /// Stop at a fixed epoch.
    TimeLimit { end: Epoch },
    /// Stop after this much wall-clock computation time.
    CpuTimeLimit { limit: Duration },
    /// Stop when a dependent variable crosses a limit value.
    DependentVariable {
        request: DependentVariableRequest,
        limit: f64,
        terminate_when_above: bool,
    },
    /// Combine several conditions; `fulfill_any` stops on the first one met,
    /// otherwise all must be met.
    Hybrid {
        conditions: Vec<TerminationCondition>,
        fulfill_any: bool,
    },
}

fn collect_updates(
    condition: &TerminationCondition,
    env: &mut Environment,
    updates: &mut UpdateSet,
) -> Result<(), UpdateError> {
    match condition {
        TerminationCondition::TimeLimit { .. } | TerminationCondition::CpuTimeLimit { .. } => {
            Ok(())
        }
        TerminationCondition::DependentVariable { request, .. } => {
            let single = super::variables::updates_from_dependent_variables(
                std::slice::from_ref(request),
                env,
            )?;
            updates.merge(&single);
            Ok(())
        }
        TerminationCondition::Hybrid { conditions, .. } => {
            for child in conditions {
                collect_updates(child, env, updates)?;
            }
            Ok(())
        }
    }
}

/// Derives the update set required to evaluate a termination condition tree.
///
/// Dependent variable conditions share the lazy flight-conditions attachment
/// of [super::variables::updates_from_dependent_variables], hence the
/// mutable environment.
pub fn updates_from_termination(
    condition: &TerminationCondition,
    env: &mut Environment,
) -> Result<UpdateSet, UpdateError> {
    let mut updates = UpdateSet::new();
    collect_updates(condition, env, &mut updates)?;
    updates.dedup();
    Ok(updates)
}
