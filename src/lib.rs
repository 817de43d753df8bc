//! # ndframes
//!
//! Lazy, indexable access to N-dimensional imaging data:
//! microscopy stacks, multi-file image series, raw plane
//! dumps. Each dataset has auxiliary axes (`t`, `z`, `c`, ...)
//! plus the spatial `y`, `x`. The caller picks which axes to
//! iterate over and which to bundle into each returned array;
//! frames are assembled on demand from single-plane reads.
//!
//! ```rust, ignore
//! let mut frames = ndframes::open("data/cells/")?;   // cells_t001z05.png ...
//! frames.set_iter_axes(&["t"])?;
//! frames.set_bundle_axes(&["z"])?;
//! println!("{}", frames);
//! let stack = frames.get_frame(0)?;                 // shape (z, y, x)
//! ```

use std::path::Path;

pub mod backends;
pub mod data;
pub mod metadata;
pub mod options;
pub mod sequence;
pub mod source;
pub mod utils;

pub use backends::{BackendRegistry, DynBackend};
pub use data::assemble::FrameAssembler;
pub use data::axes::{AxisRegistry, Planner};
pub use data::frame::{Frame, FrameMetadata, MetadataField};
pub use data::pixel::{Pixel, PixelArray, PixelType};
pub use metadata::{MetadataTable, MetadataValue, PlaneMetadata};
pub use options::OpenOptions;
pub use sequence::{FrameSlice, FramesSequenceND};
pub use source::{coords, Backend, Coords, PlaneSource};
pub use utils::{ConfigurationError, FramesError, FramesResult};

/// `open(path)` opens a dataset with the default backends and
/// options: a directory or image file becomes an image
/// sequence.
///
/// ## Arguments
///
/// * `path` - A directory of images or a single file
///
/// ## Example
///
/// ```rust, ignore
/// let frames = ndframes::open("movie_t001.png")?;
/// ```
pub fn open<P : AsRef<Path>>(path : P) -> FramesResult<FramesSequenceND<DynBackend>> {
    open_with(path, &OpenOptions::default())
}

/// `open_with(path, options)` opens a dataset with the default
/// backends and explicit options.
///
/// ## Arguments
///
/// * `path` - A directory or file
/// * `options` - Dimension identifiers, forced pixel type,
/// extension filter, backend name, raw layout...
pub fn open_with<P : AsRef<Path>>(
    path : P,
    options : &OpenOptions,
) -> FramesResult<FramesSequenceND<DynBackend>> {
    BackendRegistry::with_defaults().open(path, options)
}
