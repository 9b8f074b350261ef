use std::sync::OnceLock;

use image::{GrayImage, ImageBuffer};
use ndarray::{Array3, ArrayView2, ArrayView3, s};
use thiserror::Error;

use crate::bounds::{self, BoundsPair};
use crate::enums::Orientation;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Bounds requested on an empty volume")]
    EmptyVolume,

    /// `expected_len` is `None` when the extents overflow `usize`
    #[error(
        "Density buffer holds {actual_len} values but dimensions {dim:?} require {expected_len:?}"
    )]
    ShapeMismatch {
        dim: (usize, usize, usize),
        expected_len: Option<usize>,
        actual_len: usize,
    },
}

/// Scalar density volume assembled from a slice stack.
///
/// Densities are stored as `(z, y, x)` in standard layout, so the flat buffer
/// is indexed by `x + y * size_x + z * size_x * size_y`. The dataset is
/// immutable after construction; the only derived state is the bounds memo.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    name: String,
    data: Array3<i32>,
    scale: (f32, f32, f32),
    bounds: OnceLock<BoundsPair>,
}

impl VolumeDataset {
    /// Build a dataset from a flat density buffer.
    ///
    /// `size` is `(size_x, size_y, size_z)`. Zero extents are accepted and
    /// produce an empty volume whose bounds cannot be computed.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::ShapeMismatch`] when `densities.len()` is not the
    /// product of the extents
    pub fn new(
        name: impl Into<String>,
        densities: Vec<i32>,
        size: (usize, usize, usize),
        scale: (f32, f32, f32),
    ) -> Result<Self, VolumeError> {
        let (size_x, size_y, size_z) = size;
        let expected_len = size_x
            .checked_mul(size_y)
            .and_then(|n| n.checked_mul(size_z));
        let actual_len = densities.len();
        let mismatch = || VolumeError::ShapeMismatch {
            dim: size,
            expected_len,
            actual_len,
        };
        if expected_len != Some(actual_len) {
            return Err(mismatch());
        }
        let data =
            Array3::from_shape_vec((size_z, size_y, size_x), densities).map_err(|_| mismatch())?;

        Ok(Self::from_array(name, data, scale))
    }

    /// Wrap an already shaped `(z, y, x)` array
    pub(crate) fn from_array(
        name: impl Into<String>,
        data: Array3<i32>,
        scale: (f32, f32, f32),
    ) -> Self {
        Self {
            name: name.into(),
            data: if data.is_standard_layout() {
                data
            } else {
                data.as_standard_layout().into_owned()
            },
            scale,
            bounds: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Voxel extents as `(size_x, size_y, size_z)`
    pub fn size(&self) -> (usize, usize, usize) {
        let (depth, height, width) = self.data.dim();
        (width, height, depth)
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Physical aspect `(scale_x, scale_y, scale_z)` as assembled by the loader
    pub fn scale(&self) -> (f32, f32, f32) {
        self.scale
    }

    /// Scale divided by its largest component, so the longest axis is `1.0`.
    ///
    /// A zero component leaves the scale as is.
    pub fn normalized_scale(&self) -> (f32, f32, f32) {
        let (x, y, z) = self.scale;
        if x == 0.0 || y == 0.0 || z == 0.0 {
            return self.scale;
        }
        let max = x.max(y).max(z);
        (x / max, y / max, z / max)
    }

    /// Flat density buffer in `x + y * size_x + z * size_x * size_y` order
    pub fn densities(&self) -> &[i32] {
        self.data
            .as_slice()
            .expect("volume data is stored in standard layout")
    }

    /// Get a view of the densities shaped `(z, y, x)`
    pub fn view(&self) -> ArrayView3<'_, i32> {
        self.data.view()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        let (size_x, size_y, _) = self.size();
        x + y * size_x + z * size_x * size_y
    }

    pub fn density(&self, x: usize, y: usize, z: usize) -> Option<i32> {
        self.data.get([z, y, x]).copied()
    }

    /// Global (min, max) of the densities, scanned once and cached.
    ///
    /// Racing first calls may each scan the buffer; only one result is kept
    /// and every scan yields the same pair.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::EmptyVolume`] if the dataset holds no voxels
    pub fn bounds(&self) -> Result<BoundsPair, VolumeError> {
        if let Some(cached) = self.bounds.get() {
            return Ok(*cached);
        }
        let computed = bounds::reduce(self.densities())?;
        Ok(*self.bounds.get_or_init(|| computed))
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, i32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice)
    }

    /// Render one axis-aligned slice as 8-bit grayscale, rescaled by the
    /// volume bounds. A constant volume renders black.
    pub fn slice_image(&self, index: usize, orientation: Orientation) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, orientation)?;
        let bounds = self.bounds().ok()?;
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .iter()
            .map(|&value| Self::normalize_to_u8(value, bounds))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    #[inline]
    fn normalize_to_u8(value: i32, bounds: BoundsPair) -> u8 {
        if bounds.is_degenerate() {
            return 0;
        }
        let t = bounds.offset(value) as f32 / bounds.range() as f32;
        (t * 255.0).round().clamp(0.0, 255.0) as u8
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: (usize, usize, usize)) -> VolumeDataset {
        let len = size.0 * size.1 * size.2;
        VolumeDataset::new("ramp", (0..len as i32).collect(), size, (1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = VolumeDataset::new("bad", vec![0; 7], (2, 2, 2), (1.0, 1.0, 1.0)).unwrap_err();
        match err {
            VolumeError::ShapeMismatch {
                dim,
                expected_len,
                actual_len,
            } => {
                assert_eq!(dim, (2, 2, 2));
                assert_eq!(expected_len, Some(8));
                assert_eq!(actual_len, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn new_rejects_overflowing_extents() {
        let err =
            VolumeDataset::new("huge", vec![0; 4], (usize::MAX, 2, 1), (1.0, 1.0, 1.0)).unwrap_err();
        match err {
            VolumeError::ShapeMismatch {
                dim,
                expected_len,
                actual_len,
            } => {
                assert_eq!(dim, (usize::MAX, 2, 1));
                assert_eq!(expected_len, None);
                assert_eq!(actual_len, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn from_array_keeps_flat_order() {
        let data = Array3::from_shape_vec((2, 1, 2), vec![1, 2, 3, 4]).unwrap();
        let volume = VolumeDataset::from_array("a", data, (1.0, 0.5, 1.0));
        assert_eq!(volume.size(), (2, 1, 2));
        assert_eq!(volume.densities(), &[1, 2, 3, 4]);

        let flipped = Array3::from_shape_vec((2, 1, 2), vec![1, 2, 3, 4])
            .unwrap()
            .slice_move(s![..;-1, .., ..]);
        let volume = VolumeDataset::from_array("b", flipped, (1.0, 0.5, 1.0));
        assert_eq!(volume.densities(), &[3, 4, 1, 2]);
    }

    #[test]
    fn full_i32_span_does_not_overflow() {
        let volume =
            VolumeDataset::new("wide", vec![i32::MIN, 0, i32::MAX], (3, 1, 1), (1.0, 1.0, 1.0))
                .unwrap();
        let bounds = volume.bounds().unwrap();
        assert_eq!(bounds.range(), u32::MAX as i64);
        let image = volume.slice_image(0, Orientation::Axial).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 0).0, [128]);
        assert_eq!(image.get_pixel(2, 0).0, [255]);
    }

    #[test]
    fn flat_index_matches_xyz_layout() {
        let volume = ramp((3, 2, 4));
        assert_eq!(volume.size(), (3, 2, 4));
        assert_eq!(volume.dim(), (4, 2, 3));
        for z in 0..4 {
            for y in 0..2 {
                for x in 0..3 {
                    let index = volume.index(x, y, z);
                    assert_eq!(index, x + y * 3 + z * 6);
                    assert_eq!(volume.densities()[index], index as i32);
                    assert_eq!(volume.density(x, y, z), Some(index as i32));
                }
            }
        }
        assert_eq!(volume.density(3, 0, 0), None);
    }

    #[test]
    fn bounds_are_cached() {
        let volume = VolumeDataset::new("v", vec![5, -2, 9, 0], (2, 2, 1), (1.0, 1.0, 0.5))
            .unwrap();
        let first = volume.bounds().unwrap();
        assert_eq!(first, BoundsPair { min: -2, max: 9 });
        assert_eq!(volume.bounds.get(), Some(&first));
        assert_eq!(volume.bounds().unwrap(), first);
    }

    #[test]
    fn bounds_on_empty_volume_fail() {
        let volume = VolumeDataset::new("empty", Vec::new(), (0, 4, 4), (1.0, 1.0, 1.0)).unwrap();
        assert!(volume.is_empty());
        assert!(matches!(volume.bounds(), Err(VolumeError::EmptyVolume)));
        assert!(volume.bounds.get().is_none());
    }

    #[test]
    fn bounds_from_many_threads_agree() {
        let volume = ramp((16, 16, 16));
        let results: Vec<BoundsPair> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| volume.bounds().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|b| *b == BoundsPair { min: 0, max: 4095 }));
    }

    #[test]
    fn normalized_scale_puts_longest_axis_at_one() {
        let volume = VolumeDataset::new("v", vec![0; 8], (2, 2, 2), (1.0, 0.5, 2.0)).unwrap();
        assert_eq!(volume.normalized_scale(), (0.5, 0.25, 1.0));

        let flat = VolumeDataset::new("v", vec![0; 8], (2, 2, 2), (1.0, 0.0, 2.0)).unwrap();
        assert_eq!(flat.normalized_scale(), (1.0, 0.0, 2.0));
    }

    #[test]
    fn slices_follow_orientation() {
        let volume = ramp((3, 2, 4));
        let axial = volume.get_slice_from_axis(1, Orientation::Axial).unwrap();
        assert_eq!(axial.dim(), (2, 3));
        assert_eq!(axial[[1, 2]], volume.densities()[volume.index(2, 1, 1)]);

        let coronal = volume.get_slice_from_axis(0, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (4, 3));

        let sagittal = volume.get_slice_from_axis(2, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (4, 2));
        assert_eq!(sagittal[[3, 1]], volume.densities()[volume.index(2, 1, 3)]);

        assert!(volume.get_slice_from_axis(4, Orientation::Axial).is_none());
        assert!(volume.get_slice_from_axis(3, Orientation::Sagittal).is_none());
    }

    #[test]
    fn slice_image_rescales_by_bounds() {
        let volume =
            VolumeDataset::new("v", vec![10, 20, 30, 110], (2, 2, 1), (1.0, 1.0, 0.5)).unwrap();
        let image = volume.slice_image(0, Orientation::Axial).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 1).0, [255]);

        let constant = VolumeDataset::new("c", vec![7; 4], (2, 2, 1), (1.0, 1.0, 0.5)).unwrap();
        let image = constant.slice_image(0, Orientation::Axial).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0]));
    }
}
