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

use snafu::prelude::Snafu;

/// Provides the environment update facets, the update set container and the
/// resolvers deriving update sets from dynamical models.
pub mod update;
pub use update::{
    check_validity, full_update_set, updates_from_accelerations, updates_from_mass_rates,
    updates_from_torques, EnvironmentUpdate, PropagatedStateKind, PropagatedStateList, UpdateSet,
};

/// Provides the dependent variable requests and their update resolution.
pub mod variables;
pub use variables::{
    updates_from_dependent_variables, DependentVariable, DependentVariableRequest,
};

/// Provides the termination conditions and their update resolution.
pub mod termination;
pub use termination::{updates_from_termination, TerminationCondition};

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UpdateError {
    #[snafu(display("could not find body {body} for an environment update"))]
    BodyNotFound { body: String },
    #[snafu(display("could not find {model} of body {body} for an environment update"))]
    MissingEnvironmentModel {
        body: String,
        model: &'static str,
    },
}
