//! Partitioning of N-d field data into sections over the regrid axes.
//!
//! A section fixes every non-regrid axis and spans the regrid axes. Values
//! are read and written in solver order (first regrid axis fastest).

use std::collections::HashMap;

use cf_model::MaskedArray;
use ndarray::ArrayD;

/// Sections sharing one source mask, in loop order.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGroup {
    pub mask: Vec<bool>,
    pub sections: Vec<usize>,
}

/// The sections of an array, in loop order.
#[derive(Debug, Clone)]
pub struct SectionPlan {
    regrid_positions: Vec<usize>,
    sections: Vec<Vec<usize>>,
}

impl SectionPlan {
    /// Plan the sections of an array of `shape`.
    ///
    /// # Arguments
    /// * `shape` - Shape of the array
    /// * `regrid_positions` - Array positions of the regrid axes, solver order
    /// * `loop_order` - Non-regrid positions to loop over outermost first;
    ///   unlisted ones follow in array order
    pub fn new(shape: &[usize], regrid_positions: Vec<usize>, loop_order: &[usize]) -> Self {
        let mut order: Vec<usize> = Vec::with_capacity(shape.len());
        for p in loop_order.iter().copied().chain(0..shape.len()) {
            if p < shape.len() && !regrid_positions.contains(&p) && !order.contains(&p) {
                order.push(p);
            }
        }

        let count: usize = order.iter().map(|&p| shape[p]).product();
        let mut sections = Vec::with_capacity(count);
        let mut index = vec![0usize; shape.len()];
        for _ in 0..count {
            sections.push(index.clone());
            // Odometer: the last axis in loop order turns fastest.
            for &p in order.iter().rev() {
                index[p] += 1;
                if index[p] < shape[p] {
                    break;
                }
                index[p] = 0;
            }
        }

        Self {
            regrid_positions,
            sections,
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Fixed array index of each section; regrid positions hold 0.
    pub fn sections(&self) -> &[Vec<usize>] {
        &self.sections
    }

    pub fn regrid_positions(&self) -> &[usize] {
        &self.regrid_positions
    }

    /// Array indices of a section's cells, in solver order.
    fn cells<'a>(&'a self, section: usize, sizes: &'a [usize]) -> impl Iterator<Item = Vec<usize>> + 'a {
        let base = &self.sections[section];
        let n: usize = sizes.iter().product();
        (0..n).map(move |mut flat| {
            let mut index = base.clone();
            for (&p, &size) in self.regrid_positions.iter().zip(sizes) {
                index[p] = flat % size;
                flat /= size;
            }
            index
        })
    }

    /// Values of a section, missing where masked.
    pub fn read(&self, data: &MaskedArray, section: usize) -> Vec<Option<f64>> {
        let sizes = self.sizes_in(data.shape());
        self.cells(section, &sizes).map(|idx| data.get(&idx)).collect()
    }

    /// Mask of a section.
    pub fn mask(&self, data: &MaskedArray, section: usize) -> Vec<bool> {
        let sizes = self.sizes_in(data.shape());
        self.cells(section, &sizes)
            .map(|idx| data.is_masked_at(&idx))
            .collect()
    }

    /// Group sections by identical mask, in order of first appearance.
    pub fn group_by_mask(&self, data: &MaskedArray) -> Vec<MaskGroup> {
        let mut groups: Vec<MaskGroup> = Vec::new();
        let mut lookup: HashMap<Vec<bool>, usize> = HashMap::new();
        for section in 0..self.len() {
            let mask = self.mask(data, section);
            match lookup.get(&mask) {
                Some(&g) => groups[g].sections.push(section),
                None => {
                    lookup.insert(mask.clone(), groups.len());
                    groups.push(MaskGroup {
                        mask,
                        sections: vec![section],
                    });
                }
            }
        }
        groups
    }

    /// Write a section's values into output arrays whose regrid axes have
    /// the destination sizes.
    pub fn write(
        &self,
        data: &mut ArrayD<f64>,
        mask: &mut ArrayD<bool>,
        section: usize,
        values: &[Option<f64>],
    ) {
        let sizes = self.sizes_in(data.shape());
        for (idx, value) in self.cells(section, &sizes).zip(values) {
            match value {
                Some(v) => {
                    data[idx.as_slice()] = *v;
                    mask[idx.as_slice()] = false;
                }
                None => {
                    data[idx.as_slice()] = 0.0;
                    mask[idx.as_slice()] = true;
                }
            }
        }
    }

    fn sizes_in(&self, shape: &[usize]) -> Vec<usize> {
        self.regrid_positions.iter().map(|&p| shape[p]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    /// (t=2, y=2, x=3) with the second time step masked at (0, 0).
    fn data() -> MaskedArray {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let mut mask = vec![false; 12];
        mask[6] = true;
        MaskedArray::with_mask(
            ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), values).unwrap(),
            ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), mask).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_sections_over_non_regrid_axes() {
        let plan = SectionPlan::new(&[2, 2, 3], vec![2, 1], &[]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.sections(), &[vec![0, 0, 0], vec![1, 0, 0]]);
    }

    #[test]
    fn test_read_in_solver_order() {
        let d = data();
        let plan = SectionPlan::new(d.shape(), vec![2, 1], &[]);
        let first: Vec<Option<f64>> = plan.read(&d, 0);
        assert_eq!(
            first,
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
        );
        // Swapping the solver order of the axes transposes the read.
        let plan = SectionPlan::new(d.shape(), vec![1, 2], &[]);
        assert_eq!(&plan.read(&d, 0)[..3], &[Some(0.0), Some(3.0), Some(1.0)]);
    }

    #[test]
    fn test_group_by_mask() {
        let d = data();
        let plan = SectionPlan::new(d.shape(), vec![2, 1], &[]);
        let groups = plan.group_by_mask(&d);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].sections, vec![1]);
        assert!(groups[1].mask[0]);
        assert!(!groups[0].mask.iter().any(|&m| m));
    }

    #[test]
    fn test_loop_order() {
        // (a=2, x=2, b=3): loop over b outermost.
        let plan = SectionPlan::new(&[2, 2, 3], vec![1], &[2]);
        let firsts: Vec<(usize, usize)> = plan.sections().iter().map(|s| (s[0], s[2])).collect();
        assert_eq!(firsts, vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2), (1, 2)]);

        let plan = SectionPlan::new(&[2, 2, 3], vec![1], &[]);
        let firsts: Vec<(usize, usize)> = plan.sections().iter().map(|s| (s[0], s[2])).collect();
        assert_eq!(firsts, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_repeated_loop_axis_counted_once() {
        let plan = SectionPlan::new(&[2, 2, 3], vec![1], &[2, 2]);
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn test_no_other_axes_is_one_section() {
        let plan = SectionPlan::new(&[4, 5], vec![1, 0], &[]);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_write_resized_section() {
        let plan = SectionPlan::new(&[2, 4], vec![1], &[]);
        let mut out = ArrayD::zeros(IxDyn(&[2, 2]));
        let mut mask = ArrayD::from_elem(IxDyn(&[2, 2]), false);
        plan.write(&mut out, &mut mask, 1, &[Some(7.0), None]);
        assert_eq!(out[[1, 0]], 7.0);
        assert!(mask[[1, 1]]);
        assert!(!mask[[0, 1]]);
    }
}
