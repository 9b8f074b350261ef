use rayon::prelude::*;

use crate::volume::VolumeError;

/// Global minimum and maximum density of a volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundsPair {
    pub min: i32,
    pub max: i32,
}

impl BoundsPair {
    /// Width of the density interval. Zero for a constant volume.
    ///
    /// Widened to `i64` so the full `i32` span fits.
    pub fn range(&self) -> i64 {
        i64::from(self.max) - i64::from(self.min)
    }

    /// Offset of `value` above the minimum
    #[inline]
    pub fn offset(&self, value: i32) -> i64 {
        i64::from(value) - i64::from(self.min)
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Reduce a density buffer to its (min, max) pair.
///
/// Min/max is associative and commutative so the scan is split across the
/// rayon pool and the partial pairs are merged.
///
/// # Errors
///
/// Returns [`VolumeError::EmptyVolume`] when `densities` is empty
pub fn reduce(densities: &[i32]) -> Result<BoundsPair, VolumeError> {
    densities
        .par_iter()
        .map(|&value| BoundsPair {
            min: value,
            max: value,
        })
        .reduce_with(|a, b| BoundsPair {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        })
        .ok_or(VolumeError::EmptyVolume)
}
