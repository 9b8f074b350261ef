use bytemuck::{Pod, Zeroable};
use half::f16;
use ndarray::{ArrayView3, Zip};
use rayon::prelude::*;

use crate::{
    bounds::BoundsPair,
    volume::{VolumeDataset, VolumeError},
};

/// Density rescaled to `[0, 1]` by the global bounds, one value per voxel
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedField {
    values: Vec<f32>,
}

impl NormalizedField {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }

    /// Half precision copy for renderers that upload 16-bit float textures
    pub fn to_f16(&self) -> Vec<f16> {
        self.values.par_iter().map(|&v| f16::from_f32(v)).collect()
    }
}

/// Gradient direction plus the voxel's normalized intensity
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GradientSample {
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    pub a: f32,
}

impl GradientSample {
    pub fn to_f16(self) -> [f16; 4] {
        [
            f16::from_f32(self.gx),
            f16::from_f32(self.gy),
            f16::from_f32(self.gz),
            f16::from_f32(self.a),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    samples: Vec<GradientSample>,
}

impl GradientField {
    pub fn samples(&self) -> &[GradientSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<GradientSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Tightly packed `gx, gy, gz, a` floats
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }

    pub fn to_f16(&self) -> Vec<[f16; 4]> {
        self.samples.par_iter().map(|s| s.to_f16()).collect()
    }
}

/// Everything a renderer needs from one import
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub densities: Vec<i32>,
    pub normalized: NormalizedField,
    pub gradient: GradientField,
    /// `(size_x, size_y, size_z)`
    pub size: (usize, usize, usize),
    /// Aspect scale with the longest axis at `1.0`
    pub scale: (f32, f32, f32),
}

/// Derives renderer-facing fields from a dataset.
///
/// Both fields share one normalization so the gradient's `a` channel is
/// bit-identical to the normalized field.
pub struct FieldBuilder<'a> {
    volume: &'a VolumeDataset,
}

impl<'a> FieldBuilder<'a> {
    pub fn new(volume: &'a VolumeDataset) -> Self {
        Self { volume }
    }

    /// # Errors
    ///
    /// Returns [`VolumeError::EmptyVolume`] for a volume without voxels
    pub fn normalized(&self) -> Result<NormalizedField, VolumeError> {
        let bounds = self.volume.bounds()?;
        if bounds.is_degenerate() {
            log::warn!(
                "Volume {:?} is constant ({}); normalized field is all zero",
                self.volume.name(),
                bounds.min
            );
        }
        let values = self
            .volume
            .densities()
            .par_iter()
            .map(|&density| Self::normalize(density, bounds))
            .collect();
        Ok(NormalizedField { values })
    }

    /// Central-difference gradient in index space.
    ///
    /// Neighbours are clamped at the faces, so a boundary voxel takes a
    /// one-sided difference that is still divided as if two-sided. Each
    /// component is `(backward - forward) / range`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::EmptyVolume`] for a volume without voxels
    pub fn gradient(&self) -> Result<GradientField, VolumeError> {
        let bounds = self.volume.bounds()?;
        let data = self.volume.view();

        let (samples, _) = Zip::indexed(&data)
            .par_map_collect(|(z, y, x), _| Self::gradient_at(&data, (x, y, z), bounds))
            .into_raw_vec_and_offset();
        Ok(GradientField { samples })
    }

    /// Build both fields and package them with size and normalized scale
    pub fn build(&self) -> Result<RenderPayload, VolumeError> {
        let normalized = self.normalized()?;
        let gradient = self.gradient()?;
        log::info!(
            "Built fields for {:?}: {} voxels",
            self.volume.name(),
            normalized.len()
        );
        Ok(RenderPayload {
            densities: self.volume.densities().to_vec(),
            normalized,
            gradient,
            size: self.volume.size(),
            scale: self.volume.normalized_scale(),
        })
    }

    /// `(density - min) / range`, or `0.0` for a degenerate volume
    #[inline]
    fn normalize(density: i32, bounds: BoundsPair) -> f32 {
        if bounds.is_degenerate() {
            return 0.0;
        }
        bounds.offset(density) as f32 / bounds.range() as f32
    }

    fn gradient_at(
        data: &ArrayView3<'_, i32>,
        (x, y, z): (usize, usize, usize),
        bounds: BoundsPair,
    ) -> GradientSample {
        let a = Self::normalize(data[[z, y, x]], bounds);
        if bounds.is_degenerate() {
            return GradientSample {
                a,
                ..GradientSample::default()
            };
        }

        let (depth, height, width) = data.dim();
        let range = bounds.range() as f32;

        let x1 = bounds.offset(data[[z, y, (x + 1).min(width - 1)]]);
        let x2 = bounds.offset(data[[z, y, x.saturating_sub(1)]]);
        let y1 = bounds.offset(data[[z, (y + 1).min(height - 1), x]]);
        let y2 = bounds.offset(data[[z, y.saturating_sub(1), x]]);
        let z1 = bounds.offset(data[[(z + 1).min(depth - 1), y, x]]);
        let z2 = bounds.offset(data[[z.saturating_sub(1), y, x]]);

        GradientSample {
            gx: (x2 - x1) as f32 / range,
            gy: (y2 - y1) as f32 / range,
            gz: (z2 - z1) as f32 / range,
            a,
        }
    }
}
