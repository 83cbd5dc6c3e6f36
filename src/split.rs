/// Contiguous cross-validation folds over sample indices
use std::ops::Range;

/// Split `[0, n)` into `k` contiguous chunks of near-equal size
///
/// The first `n % k` chunks hold one extra element, so sizes differ by at
/// most one. `k == 0` yields no chunks.
pub fn array_split(n: usize, k: usize) -> Vec<Range<usize>> {
    if k == 0 {
        return Vec::new();
    }

    let base = n / k;
    let extra = n % k;

    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Training/test index sets for one cross-validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvSplit {
    /// Position of the test fold
    pub fold: usize,
    /// Concatenation of every other fold, ascending
    pub training: Vec<usize>,
    /// The held-out fold
    pub test: Vec<usize>,
}

/// Folds covering every usable sample index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossValidation {
    folds: Vec<Range<usize>>,
}

impl CrossValidation {
    /// Partition `num_samples` indices into `num_cvs` folds
    pub fn new(num_samples: usize, num_cvs: usize) -> Self {
        Self {
            folds: array_split(num_samples, num_cvs),
        }
    }

    /// Folds for a recording of `total_rows` rows windowed by `window`
    ///
    /// Usable sample indices are `[0, total_rows - window)`.
    pub fn for_recording(total_rows: usize, window: usize, num_cvs: usize) -> Self {
        Self::new(total_rows.saturating_sub(window), num_cvs)
    }

    pub fn folds(&self) -> &[Range<usize>] {
        &self.folds
    }

    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }

    /// Total number of indices across all folds
    pub fn num_samples(&self) -> usize {
        self.folds.last().map_or(0, |f| f.end)
    }

    /// Hold out fold `test_fold`, train on the rest in original order
    pub fn split(&self, test_fold: usize) -> crate::Result<CvSplit> {
        let test = self
            .folds
            .get(test_fold)
            .ok_or_else(|| {
                crate::DecoderError::Config(format!(
                    "test fold {} out of range for {} folds",
                    test_fold,
                    self.folds.len()
                ))
            })?
            .clone()
            .collect();

        let training = self
            .folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != test_fold)
            .flat_map(|(_, fold)| fold.clone())
            .collect();

        Ok(CvSplit {
            fold: test_fold,
            training,
            test,
        })
    }

    /// The evaluation split: last fold held out
    pub fn last_fold_split(&self) -> crate::Result<CvSplit> {
        self.split(self.folds.len().saturating_sub(1))
    }

    /// Every split, one per held-out fold
    pub fn splits(&self) -> impl Iterator<Item = CvSplit> + '_ {
        (0..self.folds.len()).filter_map(move |i| self.split(i).ok())
    }
}
