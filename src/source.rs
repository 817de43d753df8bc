//! The plane source contract.
//!
//! Everything that actually touches pixels on disk (or in
//! memory) implements `PlaneSource`: given one coordinate per
//! auxiliary axis it returns a single `(y, x)` or
//! `(y, x, samples)` plane. Sources that can also tell which
//! axes they have implement `Backend`, and can be opened
//! directly by `FramesSequenceND::open`.

pub mod memory;

use std::collections::BTreeMap;

use crate::data::pixel::PixelArray;
use crate::metadata::PlaneMetadata;
use crate::utils::FramesResult;

/// One index per auxiliary axis, keyed by axis name. The
/// spatial axes are never present: a plane source always
/// returns the whole `(y, x)` plane.
pub type Coords = BTreeMap<String, usize>;

/// Builds a `Coords` from `(axis, index)` pairs.
///
/// ```
/// let coords = ndframes::coords(&[("t", 1), ("z", 0)]);
/// assert_eq!(coords["t"], 1);
/// ```
pub fn coords(pairs : &[(&str, usize)]) -> Coords {
    pairs.iter().map(|(axis, idx)| (axis.to_string(), *idx)).collect()
}

/// Reads single planes. `read_plane` must return an array
/// whose first two dimensions are `(size(y), size(x))`; an
/// optional third dimension carries per-pixel samples (RGB).
///
/// Implementations own whatever file handles or external
/// resources they need and take `&self`, opening local
/// readers per call when necessary, so that independent
/// planes can be read from several threads.
pub trait PlaneSource {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)>;
}

/// A plane source that can also discover its own axes.
pub trait Backend : PlaneSource {
    /// Short human readable name used in summaries and logs
    fn name(&self) -> &str;

    /// Auxiliary axes and their sizes, in the order they should
    /// be presented. Must not include `y` or `x`.
    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>>;

    /// Axes iterated over by default
    fn default_iter_axes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Axes bundled into each frame by default
    fn default_bundle_axes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Coordinates of a plane that is known to exist, read once
    /// at open time for the spatial size and pixel type. All
    /// zeros unless the source can be sparse.
    fn first_plane_coords(&self, axes : &[String]) -> Coords {
        axes.iter().map(|a| (a.clone(), 0)).collect()
    }
}

impl<P : PlaneSource + ?Sized> PlaneSource for Box<P> {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        (**self).read_plane(coords)
    }
}

impl<B : Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str { (**self).name() }

    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>> {
        (**self).discover_axes()
    }

    fn default_iter_axes(&self) -> Vec<String> { (**self).default_iter_axes() }

    fn default_bundle_axes(&self) -> Vec<String> { (**self).default_bundle_axes() }

    fn first_plane_coords(&self, axes : &[String]) -> Coords { (**self).first_plane_coords(axes) }
}

impl<P : PlaneSource + ?Sized> PlaneSource for &P {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        (**self).read_plane(coords)
    }
}

/// Wraps a closure from coordinates to a plane as a source.
///
/// ```rust, ignore
/// let source = FnSource(|coords : &Coords| {
///     Ok((Array2::<u8>::zeros((4, 4)).into(), PlaneMetadata::new()))
/// });
/// ```
pub struct FnSource<F>(pub F);

impl<F> PlaneSource for FnSource<F>
where F : Fn(&Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        (self.0)(coords)
    }
}
