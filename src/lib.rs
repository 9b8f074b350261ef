//! # slice-volume library
//!
//! This crate turns an ordered stack of 2D images into a scalar volume and
//! derives the two fields a volume renderer consumes: a normalized intensity
//! field and a per-voxel gradient field.
//!
//! Slices are read from a directory. Every file with an accepted extension
//! (`.png` by default) is one Z layer, ordered lexicographically by path, so
//! `slice_000.png`, `slice_001.png`, ... stack in the expected order. All
//! slices must share one size. Each pixel is reduced to an integer density in
//! `[0, 255]` from a single color channel (red by default). Slices are decoded
//! in parallel using rayon.
//!
//! The dataset caches its global (min, max) bounds on first request.
//! [`FieldBuilder`] uses them to produce:
//!  - a [`NormalizedField`] of `(density - min) / (max - min)`
//!  - a [`GradientField`] of clamped central differences plus the normalized
//!    intensity as a fourth component
//!
//! A constant volume yields all-zero fields instead of dividing by zero.
//!
//! # Examples
//!
//! ```no_run
//! # use slice_volume::{FieldBuilder, LoadOptions, SliceSetLoader};
//! let volume = SliceSetLoader::load_from_directory("scans/head", &LoadOptions::default())
//!     .expect("should have loaded slices from directory");
//! let payload = FieldBuilder::new(&volume)
//!     .build()
//!     .expect("volume should not be empty");
//! println!("{:?} voxels, scale {:?}", payload.size, payload.scale);
//! ```

pub mod bounds;
pub mod enums;
pub mod fields;
pub mod slice_loader;
pub mod volume;

pub use bounds::BoundsPair;
pub use enums::{ChannelSelector, Orientation, RoundingRule, RowOrder};
pub use fields::{FieldBuilder, GradientField, GradientSample, NormalizedField, RenderPayload};
pub use slice_loader::{LoadOptions, SliceLoaderError, SliceSetLoader};
pub use volume::{VolumeDataset, VolumeError};
