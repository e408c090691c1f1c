//! Sparse weight matrices and solver results.

use serde::{Deserialize, Serialize};

/// A sparse destination-by-source weight matrix.
///
/// Entries are `(dst, src, weight)` triples sorted by destination then
/// source, with duplicates merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightMatrix {
    n_dst: usize,
    n_src: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl WeightMatrix {
    /// Build from unsorted triples, summing duplicates and dropping zeros.
    pub fn from_triples(n_dst: usize, n_src: usize, mut triples: Vec<(usize, usize, f64)>) -> Self {
        triples.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let mut entries: Vec<(usize, usize, f64)> = Vec::with_capacity(triples.len());
        for (d, s, w) in triples {
            match entries.last_mut() {
                Some(last) if last.0 == d && last.1 == s => last.2 += w,
                _ => entries.push((d, s, w)),
            }
        }
        entries.retain(|e| e.2 != 0.0);
        Self {
            n_dst,
            n_src,
            entries,
        }
    }

    pub fn n_dst(&self) -> usize {
        self.n_dst
    }

    pub fn n_src(&self) -> usize {
        self.n_src
    }

    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one destination row.
    pub fn row(&self, dst: usize) -> &[(usize, usize, f64)] {
        let start = self.entries.partition_point(|e| e.0 < dst);
        let end = self.entries.partition_point(|e| e.0 <= dst);
        &self.entries[start..end]
    }

    /// Sum of weights per destination.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_dst];
        for &(d, _, w) in &self.entries {
            sums[d] += w;
        }
        sums
    }

    /// Whether each destination has at least one entry.
    pub fn mapped(&self) -> Vec<bool> {
        let mut mapped = vec![false; self.n_dst];
        for &(d, _, _) in &self.entries {
            mapped[d] = true;
        }
        mapped
    }
}

/// Output of one weight computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegridWeights {
    pub matrix: WeightMatrix,
    /// Fraction of each source cell that contributes, in solver order.
    pub src_frac: Vec<f64>,
    /// Fraction of each destination cell covered by unmasked source.
    pub dst_frac: Vec<f64>,
    /// Source cell measures (conservative methods).
    pub src_area: Option<Vec<f64>>,
    /// Destination cell measures (conservative methods).
    pub dst_area: Option<Vec<f64>>,
}
