use crate::{
    enums::{ChannelSelector, RoundingRule, RowOrder},
    volume::VolumeDataset,
};

use image::{ImageError, ImageReader};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceLoaderError {
    #[error("Slice source not found or unreadable: {path:?}: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No slice images found in {path:?}")]
    EmptySequence { path: PathBuf },

    #[error("Slice {path:?} has size {actual:?} but the sequence expects {expected:?}")]
    NonUniformDimensions {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Failed to decode slice {path:?}: {source}")]
    MalformedImage {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Call-time options for a slice import
#[derive(Clone, Debug)]
pub struct LoadOptions {
    extensions: Vec<String>,
    channel: ChannelSelector,
    rounding: RoundingRule,
    row_order: RowOrder,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["png".to_string()],
            channel: ChannelSelector::default(),
            rounding: RoundingRule::default(),
            row_order: RowOrder::default(),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted file extensions. A leading dot is ignored and
    /// matching is case-insensitive.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn with_channel(mut self, channel: ChannelSelector) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_rounding(mut self, rounding: RoundingRule) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
    }
}

pub struct SliceSetLoader;

impl SliceSetLoader {
    /// Load a volume from a directory of same-sized slice images.
    ///
    /// Files matching the configured extensions are sorted lexicographically
    /// by path; that order is the Z order of the volume.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be listed, holds no matching images,
    /// holds images of differing size, or any image fails to decode. No
    /// partial volume is returned.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<VolumeDataset, SliceLoaderError> {
        let source = path.as_ref();
        log::info!("Importing slice sequence from {}", source.display());

        let paths = Self::discover(source, options)?;
        if paths.is_empty() {
            return Err(SliceLoaderError::EmptySequence {
                path: source.to_path_buf(),
            });
        }

        let volume = Self::load_from_file_paths(Self::dataset_name(source), &paths, options)?;
        log::info!(
            "Imported {:?} with size {:?}",
            volume.name(),
            volume.size()
        );
        Ok(volume)
    }

    /// Load a volume from an already ordered list of slice paths
    pub fn load_from_file_paths(
        name: impl Into<String>,
        paths: &[impl AsRef<Path> + Sync],
        options: &LoadOptions,
    ) -> Result<VolumeDataset, SliceLoaderError> {
        let Some(first) = paths.first() else {
            return Err(SliceLoaderError::EmptySequence {
                path: PathBuf::new(),
            });
        };
        let (width, height) = Self::validate_dimensions(first.as_ref(), paths)?;

        let images: Vec<Array2<i32>> = paths
            .par_iter()
            .map(|path| Self::decode_slice(path.as_ref(), (width, height), options))
            .collect::<Result<_, _>>()?;

        let volume_array = Self::build_volume_array(&images);
        let scale = Self::default_scale((width as usize, height as usize, images.len()));

        Ok(VolumeDataset::from_array(name, volume_array, scale))
    }

    fn discover(source: &Path, options: &LoadOptions) -> Result<Vec<PathBuf>, SliceLoaderError> {
        let entries = fs::read_dir(source)
            .map_err(|err| Self::not_found(source, err))?
            .map(|entry| entry.map(|entry| entry.path()));
        Self::select_slices(source, entries, options)
    }

    /// Keep accepted files in lexicographic order. Any entry that cannot be
    /// read fails the whole listing.
    fn select_slices(
        source: &Path,
        entries: impl Iterator<Item = io::Result<PathBuf>>,
        options: &LoadOptions,
    ) -> Result<Vec<PathBuf>, SliceLoaderError> {
        let entries = entries
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Self::not_found(source, err))?;
        let mut paths: Vec<_> = entries
            .into_iter()
            .filter(|path| path.is_file() && options.accepts(path))
            .collect();

        paths.sort();
        log::debug!("Discovered {} slice files", paths.len());
        Ok(paths)
    }

    fn not_found(source: &Path, err: io::Error) -> SliceLoaderError {
        SliceLoaderError::SourceNotFound {
            path: source.to_path_buf(),
            source: err,
        }
    }

    fn dataset_name(source: &Path) -> String {
        source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string())
    }

    /// Read only the image headers and check every slice against the first
    fn validate_dimensions(
        first: &Path,
        paths: &[impl AsRef<Path>],
    ) -> Result<(u32, u32), SliceLoaderError> {
        let expected = Self::read_dimensions(first)?;
        for path in paths.iter().skip(1) {
            let path = path.as_ref();
            let actual = Self::read_dimensions(path)?;
            if actual != expected {
                return Err(SliceLoaderError::NonUniformDimensions {
                    path: path.to_path_buf(),
                    expected,
                    actual,
                });
            }
        }
        Ok(expected)
    }

    fn read_dimensions(path: &Path) -> Result<(u32, u32), SliceLoaderError> {
        Self::open(path)?
            .into_dimensions()
            .map_err(|source| SliceLoaderError::MalformedImage {
                path: path.to_path_buf(),
                source,
            })
    }

    fn open(path: &Path) -> Result<ImageReader<io::BufReader<fs::File>>, SliceLoaderError> {
        ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| SliceLoaderError::MalformedImage {
                path: path.to_path_buf(),
                source: ImageError::IoError(err),
            })
    }

    /// Decode one slice into a `(height, width)` density grid
    fn decode_slice(
        path: &Path,
        expected: (u32, u32),
        options: &LoadOptions,
    ) -> Result<Array2<i32>, SliceLoaderError> {
        let image = Self::open(path)?
            .decode()
            .map_err(|source| SliceLoaderError::MalformedImage {
                path: path.to_path_buf(),
                source,
            })?;

        let actual = (image.width(), image.height());
        if actual != expected {
            return Err(SliceLoaderError::NonUniformDimensions {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
        log::debug!("Decoded slice {}", path.display());

        let channel = options.channel.rgba_index();
        let densities: Vec<i32> = image
            .to_rgba32f()
            .pixels()
            .map(|pixel| Self::channel_to_density(pixel.0[channel], options.rounding))
            .collect();

        let grid = Array2::from_shape_vec((actual.1 as usize, actual.0 as usize), densities)
            .map_err(|err| SliceLoaderError::MalformedImage {
                path: path.to_path_buf(),
                source: ImageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err)),
            })?;

        Ok(match options.row_order {
            RowOrder::TopDown => grid,
            RowOrder::BottomUp => grid.slice_move(s![..;-1, ..]),
        })
    }

    /// Map a `[0, 1]` channel sample to an integer density in `[0, 255]`
    #[inline]
    fn channel_to_density(sample: f32, rounding: RoundingRule) -> i32 {
        rounding.apply(sample * 255.0).clamp(0.0, 255.0) as i32
    }

    fn build_volume_array(images: &[Array2<i32>]) -> Array3<i32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<i32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    /// One unit per pixel and per slice, expressed relative to the width
    fn default_scale((width, height, depth): (usize, usize, usize)) -> (f32, f32, f32) {
        let width = width as f32;
        (1.0, height as f32 / width, depth as f32 / width)
    }
}
