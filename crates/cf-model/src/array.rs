//! Masked N-dimensional arrays.
//!
//! `MaskedArray` pairs an `ndarray::ArrayD<f64>` with a boolean mask of the
//! same shape (`true` = missing). It supports the small capability set the
//! regridding core relies on: slicing, mask access, elementwise transforms
//! and concatenation.

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{CfError, CfResult};

/// An N-dimensional array of `f64` values with a missing-data mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedArray {
    data: ArrayD<f64>,
    mask: ArrayD<bool>,
    /// With a hard mask, assigning a value to a masked element leaves it
    /// masked.
    hardmask: bool,
}

impl MaskedArray {
    /// Create an unmasked array.
    pub fn new(data: ArrayD<f64>) -> Self {
        let mask = ArrayD::from_elem(data.raw_dim(), false);
        Self {
            data,
            mask,
            hardmask: true,
        }
    }

    /// Create an array from a shape and row-major values.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f64>) -> CfResult<Self> {
        let len = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| CfError::shape_mismatch(shape, &[len]))?;
        Ok(Self::new(data))
    }

    /// Create an array with an explicit mask.
    pub fn with_mask(data: ArrayD<f64>, mask: ArrayD<bool>) -> CfResult<Self> {
        if data.shape() != mask.shape() {
            return Err(CfError::shape_mismatch(data.shape(), mask.shape()));
        }
        Ok(Self {
            data,
            mask,
            hardmask: true,
        })
    }

    /// Create an array from optional values; `None` becomes masked.
    pub fn from_options(shape: &[usize], values: Vec<Option<f64>>) -> CfResult<Self> {
        let mask: Vec<bool> = values.iter().map(Option::is_none).collect();
        let data: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        let len = data.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|_| CfError::shape_mismatch(shape, &[len]))?;
        let mask = ArrayD::from_shape_vec(IxDyn(shape), mask)
            .map_err(|_| CfError::shape_mismatch(shape, &[len]))?;
        Self::with_mask(data, mask)
    }

    /// Mask every element for which `predicate` holds (e.g. NaN or a fill value).
    pub fn masked_where(mut self, predicate: impl Fn(f64) -> bool) -> Self {
        Zip::from(&mut self.mask)
            .and(&self.data)
            .for_each(|m, &v| *m = *m || predicate(v));
        self
    }

    /// The underlying values, including those under the mask.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// The mask (`true` = missing).
    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `index`, or `None` when masked or out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        match (self.data.get(IxDyn(index)), self.mask.get(IxDyn(index))) {
            (Some(&v), Some(&false)) => Some(v),
            _ => None,
        }
    }

    /// Whether the element at `index` is masked. Out-of-range counts as masked.
    pub fn is_masked_at(&self, index: &[usize]) -> bool {
        self.mask.get(IxDyn(index)).copied().unwrap_or(true)
    }

    /// Whether any element is masked.
    pub fn any_masked(&self) -> bool {
        self.mask.iter().any(|&m| m)
    }

    pub fn count_masked(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn is_hardmask(&self) -> bool {
        self.hardmask
    }

    pub fn harden_mask(&mut self) {
        self.hardmask = true;
    }

    pub fn soften_mask(&mut self) {
        self.hardmask = false;
    }

    /// Assign an element. `None` masks it.
    ///
    /// Returns `false` when the assignment was refused because the element is
    /// under a hard mask.
    pub fn set(&mut self, index: &[usize], value: Option<f64>) -> CfResult<bool> {
        let ix = IxDyn(index);
        let masked = *self.mask.get(ix.clone()).ok_or_else(|| {
            CfError::shape_mismatch(self.data.shape(), index)
        })?;
        match value {
            Some(_) if masked && self.hardmask => Ok(false),
            Some(v) => {
                self.data[ix.clone()] = v;
                self.mask[ix] = false;
                Ok(true)
            }
            None => {
                self.mask[ix] = true;
                Ok(true)
            }
        }
    }

    /// Apply `f` to every unmasked element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let data = Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &m| if m { v } else { f(v) });
        Self {
            data,
            mask: self.mask.clone(),
            hardmask: self.hardmask,
        }
    }

    /// Insert a new axis of size 1 at `position`.
    pub fn insert_axis(&self, position: usize) -> CfResult<Self> {
        if position > self.ndim() {
            return Err(CfError::InvalidAxis {
                position,
                ndim: self.ndim(),
            });
        }
        Ok(Self {
            data: self.data.clone().insert_axis(Axis(position)),
            mask: self.mask.clone().insert_axis(Axis(position)),
            hardmask: self.hardmask,
        })
    }

    /// Reorder the axes; `order[i]` is the old axis that becomes axis `i`.
    pub fn permuted_axes(&self, order: &[usize]) -> CfResult<Self> {
        check_permutation(order, self.ndim())?;
        Ok(Self {
            data: self.data.clone().permuted_axes(order.to_vec()),
            mask: self.mask.clone().permuted_axes(order.to_vec()),
            hardmask: self.hardmask,
        })
    }

    /// Fix `axis` at `index`, dropping the axis.
    pub fn index_axis(&self, axis: usize, index: usize) -> CfResult<Self> {
        if axis >= self.ndim() {
            return Err(CfError::InvalidAxis {
                position: axis,
                ndim: self.ndim(),
            });
        }
        if index >= self.shape()[axis] {
            return Err(CfError::shape_mismatch(&[self.shape()[axis]], &[index]));
        }
        Ok(Self {
            data: self.data.index_axis(Axis(axis), index).to_owned(),
            mask: self.mask.index_axis(Axis(axis), index).to_owned(),
            hardmask: self.hardmask,
        })
    }

    /// Join arrays along an existing axis.
    pub fn concatenate(axis: usize, arrays: &[MaskedArray]) -> CfResult<Self> {
        let first = arrays
            .first()
            .ok_or_else(|| CfError::Concatenate("no arrays given".to_string()))?;
        let data_views: Vec<_> = arrays.iter().map(|a| a.data.view()).collect();
        let mask_views: Vec<_> = arrays.iter().map(|a| a.mask.view()).collect();
        let data = ndarray::concatenate(Axis(axis), &data_views)
            .map_err(|e| CfError::Concatenate(e.to_string()))?;
        let mask = ndarray::concatenate(Axis(axis), &mask_views)
            .map_err(|e| CfError::Concatenate(e.to_string()))?;
        Ok(Self {
            data,
            mask,
            hardmask: first.hardmask,
        })
    }

    /// The values with masked elements replaced by `fill`.
    pub fn filled(&self, fill: f64) -> ArrayD<f64> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&v, &m| if m { fill } else { v })
    }

    /// Elements in logical (row-major) order, `None` where masked.
    pub fn to_options(&self) -> Vec<Option<f64>> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .map(|(&v, &m)| if m { None } else { Some(v) })
            .collect()
    }
}

pub(crate) fn check_permutation(order: &[usize], ndim: usize) -> CfResult<()> {
    let mut seen = vec![false; ndim];
    if order.len() != ndim {
        return Err(CfError::shape_mismatch(&[ndim], &[order.len()]));
    }
    for &axis in order {
        if axis >= ndim || seen[axis] {
            return Err(CfError::InvalidAxis {
                position: axis,
                ndim,
            });
        }
        seen[axis] = true;
    }
    Ok(())
}
