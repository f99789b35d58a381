//! Decomposition dictionary
//!
//! The dictionary is the ordered set of basis vectors considered for one
//! solve: every admissible (atom, start offset) placement on the frame grid.
//! It is never materialized as a dense L x K matrix; each column is nonzero
//! only over its atom's support, so the solver's mat-vec products scatter and
//! gather over those support regions instead.

pub mod builder;

use rayon::prelude::*;

use crate::library::TemplateLibrary;

/// One column of the dictionary: an atom placed at a start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasisVector {
    /// Index of the parent atom in the template library
    pub atom: usize,
    /// Start offset in samples on the frame grid
    pub offset: usize,
}

/// Ordered collection of basis vectors for one solve.
///
/// Ordering is fixed at build time (atom index, then ascending offset) and
/// every downstream stage indexes into it.
#[derive(Debug)]
pub struct Dictionary<'a> {
    library: &'a TemplateLibrary,
    entries: Vec<BasisVector>,
    signal_len: usize,
    /// Squared L2 norm per atom, shared by all placements of that atom
    atom_norms_sq: Vec<f64>,
}

impl<'a> Dictionary<'a> {
    pub(crate) fn new(
        library: &'a TemplateLibrary,
        entries: Vec<BasisVector>,
        signal_len: usize,
    ) -> Self {
        let atom_norms_sq = library
            .atoms()
            .iter()
            .map(|atom| atom.samples.iter().map(|&s| (s as f64) * (s as f64)).sum())
            .collect();
        Self {
            library,
            entries,
            signal_len,
            atom_norms_sq,
        }
    }

    /// Number of basis vectors (columns).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target signal length L.
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    /// The basis vectors in dictionary order.
    pub fn entries(&self) -> &[BasisVector] {
        &self.entries
    }

    /// The library this dictionary indexes into.
    pub fn library(&self) -> &TemplateLibrary {
        self.library
    }

    /// Squared L2 norm of column `k`.
    pub fn column_norm_sq(&self, k: usize) -> f64 {
        self.atom_norms_sq[self.entries[k].atom]
    }

    /// `D * w`: accumulate every weighted atom into an L-length signal.
    ///
    /// Runs sequentially so the float summation order is fixed and repeated
    /// solves are bit-for-bit reproducible.
    pub fn apply(&self, weights: &[f32]) -> Vec<f32> {
        debug_assert_eq!(weights.len(), self.entries.len());

        let mut out = vec![0.0f32; self.signal_len];
        for (entry, &w) in self.entries.iter().zip(weights) {
            if w == 0.0 {
                continue;
            }
            let atom = &self.library.atoms()[entry.atom].samples;
            let slot = &mut out[entry.offset..entry.offset + atom.len()];
            for (o, &s) in slot.iter_mut().zip(atom) {
                *o += w * s;
            }
        }
        out
    }

    /// `D^T * r`: per-column dot products against an L-length residual.
    ///
    /// Each column is independent, so this side parallelizes without any
    /// shared accumulator; results land at fixed indices and stay
    /// deterministic.
    pub fn apply_transpose(&self, residual: &[f32]) -> Vec<f32> {
        debug_assert_eq!(residual.len(), self.signal_len);

        self.entries
            .par_iter()
            .map(|entry| {
                let atom = &self.library.atoms()[entry.atom].samples;
                let window = &residual[entry.offset..entry.offset + atom.len()];
                let dot: f64 = atom
                    .iter()
                    .zip(window)
                    .map(|(&a, &r)| (a as f64) * (r as f64))
                    .sum();
                dot as f32
            })
            .collect()
    }

    /// Squared reconstruction error `||D*w - y||^2` in f64.
    pub fn objective(&self, weights: &[f32], target: &[f32]) -> f64 {
        let approx = self.apply(weights);
        approx
            .iter()
            .zip(target)
            .map(|(&a, &y)| {
                let d = (a - y) as f64;
                d * d
            })
            .sum()
    }
}
