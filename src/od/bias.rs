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

use super::link::{link_end_indices, LinkEnds};
use super::settings::ObservationBiasSettings;
use super::{ObsError, ObservableType};
use crate::cosmic::Environment;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DVector, DefaultAllocator, DimName, OVector};
use crate::time::Epoch;

/// A systematic offset or scaling applied to a computed observable of size `N`.
///
/// `link_end_times` holds the event times of the observation, in the index
/// convention of [link_end_indices].
pub trait ObservationBias<N: DimName>: Send + Sync + std::fmt::Debug
where
    DefaultAllocator: Allocator<N>,
{
    fn bias(&self, link_end_times: &[Epoch], computed: &OVector<f64, N>) -> OVector<f64, N>;
}

/// Adds a constant vector to every evaluation.
#[derive(Debug)]
pub struct ConstantBias<N: DimName>
where
    DefaultAllocator: Allocator<N>,
{
    bias: OVector<f64, N>,
}

impl<N: DimName> ObservationBias<N> for ConstantBias<N>
where
    DefaultAllocator: Allocator<N>,
    <DefaultAllocator as Allocator<N>>::Buffer<f64>: Send + Sync,
{
    fn bias(&self, _link_end_times: &[Epoch], _computed: &OVector<f64, N>) -> OVector<f64, N> {
        self.bias.clone()
    }
}

/// Scales the computed observable element-wise by a constant vector.
#[derive(Debug)]
pub struct ConstantRelativeBias<N: DimName>
where
    DefaultAllocator: Allocator<N>,
{
    bias: OVector<f64, N>,
}

impl<N: DimName> ObservationBias<N> for ConstantRelativeBias<N>
where
    DefaultAllocator: Allocator<N>,
    <DefaultAllocator as Allocator<N>>::Buffer<f64>: Send + Sync,
{
    fn bias(&self, _link_end_times: &[Epoch], computed: &OVector<f64, N>) -> OVector<f64, N> {
        computed.component_mul(&self.bias)
    }
}

/// Applies the bias of the arc containing the current observation time.
#[derive(Debug)]
pub struct ArcWiseBias<N: DimName>
where
    DefaultAllocator: Allocator<N>,
{
    arc_start_times: Vec<Epoch>,
    biases: Vec<OVector<f64, N>>,
    /// Index into the link end times deciding the current arc.
    time_index: usize,
    relative: bool,
}

impl<N: DimName> ArcWiseBias<N>
where
    DefaultAllocator: Allocator<N>,
{
    /// Index of the arc whose start is the latest at or before `epoch`, or
    /// the first arc when `epoch` precedes all starts.
    fn current_arc(&self, epoch: Epoch) -> usize {
        self.arc_start_times
            .iter()
            .rposition(|start| *start <= epoch)
            .unwrap_or(0)
    }
}

impl<N: DimName> ObservationBias<N> for ArcWiseBias<N>
where
    DefaultAllocator: Allocator<N>,
    <DefaultAllocator as Allocator<N>>::Buffer<f64>: Send + Sync,
{
    fn bias(&self, link_end_times: &[Epoch], computed: &OVector<f64, N>) -> OVector<f64, N> {
        let arc = match link_end_times
            .get(self.time_index)
            .or_else(|| link_end_times.first())
        {
            Some(epoch) => self.current_arc(*epoch),
            None => 0,
        };
        if self.relative {
            computed.component_mul(&self.biases[arc])
        } else {
            self.biases[arc].clone()
        }
    }
}

/// Sums the contributions of an ordered list of biases.
pub struct MultiBias<N: DimName>
where
    DefaultAllocator: Allocator<N>,
{
    biases: Vec<Box<dyn ObservationBias<N>>>,
}

impl<N: DimName> ObservationBias<N> for MultiBias<N>
where
    DefaultAllocator: Allocator<N>,
{
    fn bias(&self, link_end_times: &[Epoch], computed: &OVector<f64, N>) -> OVector<f64, N> {
        let mut total = OVector::<f64, N>::zeros();
        for bias in &self.biases {
            total += bias.bias(link_end_times, computed);
        }
        total
    }
}

fn sized_bias<N: DimName>(vector: &DVector<f64>) -> Result<OVector<f64, N>, ObsError>
where
    DefaultAllocator: Allocator<N>,
{
    if vector.nrows() != N::dim() {
        return Err(ObsError::DimensionMismatch {
            expected: N::dim(),
            got: vector.nrows(),
        });
    }
    Ok(OVector::<f64, N>::from_iterator(vector.iter().copied()))
}

fn sized_arc_biases<N: DimName>(
    observable: ObservableType,
    arc_start_times: &[Epoch],
    biases: &[DVector<f64>],
) -> Result<Vec<OVector<f64, N>>, ObsError>
where
    DefaultAllocator: Allocator<N>,
{
    if biases.is_empty() {
        return Err(ObsError::InvalidSettings {
            observable,
            reason: "arc-wise bias without any arcs".to_string(),
        });
    }
    if arc_start_times.len() != biases.len() {
        return Err(ObsError::InvalidSettings {
            observable,
            reason: format!(
                "{} arc start times for {} arc biases",
                arc_start_times.len(),
                biases.len()
            ),
        });
    }
    biases.iter().map(sized_bias::<N>).collect()
}

/// Creates the bias calculator matching `settings`, for an observable of
/// fixed size `N` on `link_ends`.
///
/// Nested biases of a `Multiple` settings object are built with the same
/// size; the first failure aborts the whole construction.
pub fn create_bias_calculator<N: DimName>(
    link_ends: &LinkEnds,
    observable: ObservableType,
    settings: &ObservationBiasSettings,
    env: &Environment,
) -> Result<Box<dyn ObservationBias<N>>, ObsError>
where
    DefaultAllocator: Allocator<N>,
    <DefaultAllocator as Allocator<N>>::Buffer<f64>: Send + Sync,
{
    match settings {
        ObservationBiasSettings::ConstantAbsolute(vector) => Ok(Box::new(ConstantBias {
            bias: sized_bias::<N>(vector)?,
        })),
        ObservationBiasSettings::ConstantRelative(vector) => Ok(Box::new(ConstantRelativeBias {
            bias: sized_bias::<N>(vector)?,
        })),
        ObservationBiasSettings::ArcWiseAbsolute {
            arc_start_times,
            biases,
            time_link_end,
        } => {
            let time_index = link_end_indices(observable, link_ends.len(), *time_link_end)?[0];
            Ok(Box::new(ArcWiseBias {
                arc_start_times: arc_start_times.clone(),
                biases: sized_arc_biases::<N>(observable, arc_start_times, biases)?,
                time_index,
                relative: false,
            }))
        }
        ObservationBiasSettings::ArcWiseRelative {
            arc_start_times,
            biases,
            time_link_end,
        } => {
            let time_index = link_end_indices(observable, link_ends.len(), *time_link_end)?[0];
            Ok(Box::new(ArcWiseBias {
                arc_start_times: arc_start_times.clone(),
                biases: sized_arc_biases::<N>(observable, arc_start_times, biases)?,
                time_index,
                relative: true,
            }))
        }
        ObservationBiasSettings::Multiple(list) => {
            let mut nested = Vec::with_capacity(list.len());
            for settings in list {
                nested.push(create_bias_calculator::<N>(
                    link_ends, observable, settings, env,
                )?);
            }
            Ok(Box::new(MultiBias { biases: nested }))
        }
    }
}
