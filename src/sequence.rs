//! `FramesSequenceND` -- list-like access to an N-dimensional
//! dataset.
//!
//! The sequence owns a plane source and a `Planner`. Indexing
//! resolves through the planner and is assembled by a
//! `FrameAssembler`; changing `iter_axes` or `bundle_axes`
//! immediately changes `len()` and `frame_shape()`.
//!
//! ```rust, ignore
//! let mut frames = FramesSequenceND::open(source)?;
//! frames.set_iter_axes(&["t"])?;
//! frames.set_bundle_axes(&["z"])?;
//! let stack = frames.get_frame(-1)?;   // (z, y, x)
//! for frame in frames.slice(None, None, 2)?.iter() {
//!     let frame = frame?;
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;

use crate::data::assemble::{FrameAssembler, DEFAULT_CHUNK_SIZE};
use crate::data::axes::planner::normalize_index;
use crate::data::axes::{AxisRegistry, Planner};
use crate::data::frame::Frame;
use crate::data::pixel::PixelType;
use crate::source::{Backend, Coords, PlaneSource};
use crate::utils::{parallelize_op, ConfigurationError, FramesError, FramesResult};

/// Lazily assembled frames over the iteration axes of one
/// plane source.
pub struct FramesSequenceND<S> {
    source : S,
    planner : Planner,
    /// Pixel type of the first plane read
    native_type : PixelType,
    forced_type : Option<PixelType>,
    /// `[y, x]` or `[y, x, samples]`
    plane_shape : Vec<usize>,
    chunk_size : usize,
    parallel : bool,
    /// `sequential_frame` or `parallel_frame`, picked by `set_parallel`
    frame_fn : fn(&FramesSequenceND<S>, i64) -> FramesResult<Frame>,
}

fn sequential_frame<S : PlaneSource>(frames : &FramesSequenceND<S>, index : i64) -> FramesResult<Frame> {
    frames.assembler().assemble(index)
}

fn parallel_frame<S : PlaneSource + Sync>(frames : &FramesSequenceND<S>, index : i64) -> FramesResult<Frame> {
    frames.assembler().assemble_parallel(index, frames.chunk_size)
}

/// Reads the plane at `coords` and returns its pixel type and
/// shape.
fn read_first_plane<S : PlaneSource + ?Sized>(
    source : &S,
    registry : &AxisRegistry,
    coords : Coords,
) -> FramesResult<(PixelType, Vec<usize>)> {
    let (plane, _) = source.read_plane(&coords)
        .map_err(|source| FramesError::Read { coords : coords.clone(), source })?;

    let shape = plane.shape().to_vec();
    if shape.len() != 2 && shape.len() != 3 {
        return Err(FramesError::PlaneMismatch {
            coords,
            expected : registry.spatial_size().map(|(y, x)| vec![y, x]).unwrap_or_default(),
            found : shape,
        });
    }
    tracing::debug!(?shape, pixel_type = %plane.pixel_type(), "read first plane");
    Ok((plane.pixel_type(), shape))
}

/// Builds a registry from discovered axes plus the spatial
/// size of the first plane read.
fn discover<B : Backend + ?Sized>(source : &B) -> FramesResult<(AxisRegistry, PixelType, Vec<usize>)> {
    let axes = source.discover_axes()?;
    let mut registry = AxisRegistry::from_axes(&axes)?;
    let coords = source.first_plane_coords(registry.aux_axes());
    let (pixel_type, plane_shape) = read_first_plane(source, &registry, coords)?;
    registry.set_spatial_size(plane_shape[0], plane_shape[1])?;
    Ok((registry, pixel_type, plane_shape))
}

/// Applies a backend's default axes, skipping any it names
/// that are not present.
fn apply_backend_defaults<B : Backend + ?Sized>(
    planner : &mut Planner,
    source : &B,
) -> Result<(), ConfigurationError> {
    let registry = planner.registry();
    let iter_axes : Vec<String> = source.default_iter_axes().into_iter()
        .filter(|a| registry.contains(a))
        .collect();
    let bundle_axes : Vec<String> = source.default_bundle_axes().into_iter()
        .filter(|a| registry.contains(a) && !iter_axes.contains(a))
        .collect();

    // clear first so the two lists never overlap mid-update
    planner.set_bundle_axes::<String>(&[])?;
    planner.set_iter_axes(&iter_axes)?;
    planner.set_bundle_axes(&bundle_axes)
}

/// Positions selected by `[start:stop:step]` on a sequence of
/// length `len`. Negative bounds count from the end, bounds
/// past either end are clamped, and a negative step walks
/// backwards from the end.
fn slice_positions(
    start : Option<i64>,
    stop : Option<i64>,
    step : i64,
    len : usize,
) -> FramesResult<Vec<usize>> {
    if step == 0 {
        return Err(FramesError::InvalidSlice("slice step cannot be zero".to_string()));
    }
    let len = len as i64;
    let clamp = |bound : i64, low : i64, high : i64| -> i64 {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    let positions = if step > 0 {
        let start = start.map_or(0, |s| clamp(s, 0, len));
        let stop = stop.map_or(len, |s| clamp(s, 0, len));
        (start..stop.max(start)).step_by(step as usize).map(|i| i as usize).collect()
    } else {
        let start = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = stop.map_or(-1, |s| clamp(s, -1, len - 1));
        let mut positions = Vec::new();
        let mut i = start;
        while i > stop {
            positions.push(i as usize);
            i += step;
        }
        positions
    };
    Ok(positions)
}

impl<S : Backend> FramesSequenceND<S> {
    /// Opens a backend: discovers its axes, reads the first
    /// plane for the spatial size and pixel type, and applies
    /// the backend's default iteration and bundle axes.
    ///
    /// ## Arguments
    ///
    /// * `source` - Any `Backend`, including `Box<dyn Backend>`
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let source = InMemorySource::from_fn(&[("t", 3)], (4, 4), |idx| idx[0] as u8);
    /// let frames = FramesSequenceND::open(source.with_defaults(&["t"], &[]))?;
    /// assert_eq!(frames.len(), 3);
    /// ```
    pub fn open(source : S) -> FramesResult<Self> {
        let (registry, native_type, plane_shape) = discover(&source)?;
        let mut planner = Planner::new(registry);
        apply_backend_defaults(&mut planner, &source)?;
        tracing::info!(
            source = source.name(),
            len = planner.len(),
            "opened sequence"
        );
        Ok(FramesSequenceND {
            source,
            planner,
            native_type,
            forced_type : None,
            plane_shape,
            chunk_size : DEFAULT_CHUNK_SIZE,
            parallel : false,
            frame_fn : sequential_frame::<S>,
        })
    }

    /// Swaps in a new source (e.g. another series of the same
    /// file): re-discovers its axes and re-reads its first
    /// plane before anything is replaced. Axis settings that
    /// still fit the new axes are kept; if any had to be
    /// dropped, the iteration and bundle axes fall back to the
    /// backend defaults.
    ///
    /// Returns the previous source.
    ///
    /// ## Errors
    ///
    /// Any discovery or first-plane error of the new source. The
    /// sequence is left exactly as it was and the new source is
    /// dropped.
    pub fn replace_source(&mut self, source : S) -> FramesResult<S> {
        let (registry, native_type, plane_shape) = discover(&source)?;

        let mut planner = self.planner.clone();
        if planner.replace_registry(registry) {
            tracing::debug!("axis configuration no longer fits, using backend defaults");
            apply_backend_defaults(&mut planner, &source)?;
        }

        self.planner = planner;
        self.native_type = native_type;
        self.plane_shape = plane_shape;
        Ok(std::mem::replace(&mut self.source, source))
    }

    /// Builds a replacement from the current source and swaps
    /// it in with `replace_source`.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let previous = frames.reconfigure_source(|reader| reader.with_series(2))?;
    /// ```
    pub fn reconfigure_source<F>(&mut self, f : F) -> FramesResult<S>
    where F : FnOnce(&S) -> FramesResult<S> {
        let candidate = f(&self.source)?;
        self.replace_source(candidate)
    }
}

impl<S : PlaneSource> FramesSequenceND<S> {
    /// Wraps a plain plane source with an explicit axis
    /// registry. The spatial size, if already set, must match
    /// the first plane; otherwise it is taken from it.
    pub fn with_registry(source : S, mut registry : AxisRegistry) -> FramesResult<Self> {
        let origin : Coords = registry.aux_axes().iter()
            .map(|a| (a.clone(), 0))
            .collect();
        let (native_type, plane_shape) = read_first_plane(&source, &registry, origin)?;
        registry.set_spatial_size(plane_shape[0], plane_shape[1])?;
        Ok(FramesSequenceND {
            source,
            planner : Planner::new(registry),
            native_type,
            forced_type : None,
            plane_shape,
            chunk_size : DEFAULT_CHUNK_SIZE,
            parallel : false,
            frame_fn : sequential_frame::<S>,
        })
    }

    fn assembler(&self) -> FrameAssembler<'_, S> {
        FrameAssembler::new(&self.planner, &self.source, self.pixel_type(), &self.plane_shape)
    }

    /// Number of frames: product of the iteration axis sizes
    pub fn len(&self) -> usize {
        self.planner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planner.is_empty()
    }

    /// Assembles one frame. Negative indices count from the end.
    /// Planes are read on the rayon pool if `set_parallel(true)`
    /// was called.
    pub fn get_frame(&self, index : i64) -> FramesResult<Frame> {
        (self.frame_fn)(self, index)
    }

    /// Lazily selects frames with `[start:stop:step]` semantics.
    /// Nothing is read until the result is iterated.
    ///
    /// ## Arguments
    ///
    /// * `start` - First index, or the beginning (end if `step < 0`)
    /// * `stop` - One past the last index, or the end (beginning if `step < 0`)
    /// * `step` - Must not be zero
    pub fn slice(&self, start : Option<i64>, stop : Option<i64>, step : i64) -> FramesResult<FrameSlice<'_, S>> {
        Ok(FrameSlice {
            sequence : self,
            indices : slice_positions(start, stop, step, self.len())?,
        })
    }

    /// Lazily selects an explicit list of frames. Indices are
    /// validated now, frames are read when iterated.
    pub fn select(&self, indices : &[i64]) -> FramesResult<FrameSlice<'_, S>> {
        let indices = indices.iter()
            .map(|&i| normalize_index(i, self.len()))
            .collect::<FramesResult<Vec<_>>>()?;
        Ok(FrameSlice { sequence : self, indices })
    }

    /// Every frame, lazily
    pub fn iter(&self) -> impl Iterator<Item = FramesResult<Frame>> + '_ {
        (0..self.len()).map(move |i| self.get_frame(i as i64))
    }

    /// Shape of the frames `get_frame` returns: bundle sizes
    /// (size-1 axes squeezed), then the plane shape.
    pub fn frame_shape(&self) -> Vec<usize> {
        self.assembler().frame_shape()
    }

    /// Pixel type of returned frames
    pub fn pixel_type(&self) -> PixelType {
        self.forced_type.unwrap_or(self.native_type)
    }

    /// Forces frames to be cast to `pixel_type`, or back to the
    /// source's own type with `None`.
    pub fn set_pixel_type(&mut self, pixel_type : Option<PixelType>) {
        self.forced_type = pixel_type;
    }

    pub fn axes(&self) -> Vec<String> {
        self.planner.registry().axes()
    }

    pub fn sizes(&self) -> Vec<(String, usize)> {
        self.planner.registry().sizes()
    }

    pub fn ndim(&self) -> usize {
        self.planner.registry().ndim()
    }

    pub fn iter_axes(&self) -> &[String] {
        self.planner.iter_axes()
    }

    pub fn set_iter_axes<N : AsRef<str>>(&mut self, names : &[N]) -> FramesResult<()> {
        Ok(self.planner.set_iter_axes(names)?)
    }

    pub fn bundle_axes(&self) -> &[String] {
        self.planner.bundle_axes()
    }

    pub fn set_bundle_axes<N : AsRef<str>>(&mut self, names : &[N]) -> FramesResult<()> {
        Ok(self.planner.set_bundle_axes(names)?)
    }

    pub fn default_coords(&self) -> &BTreeMap<String, usize> {
        self.planner.default_coords()
    }

    pub fn set_default_coord(&mut self, name : &str, value : usize) -> FramesResult<()> {
        Ok(self.planner.set_default_coord(name, value)?)
    }

    /// Removes a size-1 axis that is not referenced anywhere.
    /// Larger axes are refused with `NotDegenerate`.
    pub fn remove_axis(&mut self, name : &str) -> FramesResult<()> {
        Ok(self.planner.remove_axis(name)?)
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Planes per rayon task for the parallel paths
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether `get_frame` reads on the rayon pool
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn set_chunk_size(&mut self, chunk_size : usize) {
        self.chunk_size = chunk_size.max(1);
    }
}

impl<S : PlaneSource + Sync> FramesSequenceND<S> {
    /// Like `get_frame`, but reads the planes of the bundle in
    /// parallel. The result is identical.
    pub fn get_frame_parallel(&self, index : i64) -> FramesResult<Frame> {
        parallel_frame(self, index)
    }

    /// Makes `get_frame` (and everything built on it) read the
    /// planes of each bundle in parallel, `chunk_size` at a time.
    pub fn set_parallel(&mut self, parallel : bool) {
        self.parallel = parallel;
        self.frame_fn = if parallel { parallel_frame::<S> } else { sequential_frame::<S> };
    }
}

impl<S : Backend> fmt::Display for FramesSequenceND<S> {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "<FramesSequenceND>")?;
        writeln!(f, "Source: {}", self.source.name())?;
        writeln!(f, "Length: {} frames", self.len())?;
        writeln!(f, "Frame shape: {:?}", self.frame_shape())?;
        writeln!(f, "Axes: {}", self.ndim())?;
        for (axis, size) in self.sizes() {
            writeln!(f, "Axis '{}' size: {}", axis, size)?;
        }
        writeln!(f, "Iterating: {:?}, bundling: {:?}", self.iter_axes(), self.bundle_axes())?;
        write!(f, "Pixel Datatype: {}", self.pixel_type())
    }
}

/// A lazy, finite, restartable selection of frames. Holds only
/// indices; each call to `iter` reads the frames afresh.
pub struct FrameSlice<'s, S> {
    sequence : &'s FramesSequenceND<S>,
    indices : Vec<usize>,
}

impl<'s, S : PlaneSource> FrameSlice<'s, S> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Frame numbers in the parent sequence, in selection order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The `i`-th selected frame (negative counts from the end)
    pub fn get(&self, i : i64) -> FramesResult<Frame> {
        let position = normalize_index(i, self.indices.len())?;
        self.sequence.get_frame(self.indices[position] as i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = FramesResult<Frame>> + '_ {
        self.indices.iter().map(move |&i| self.sequence.get_frame(i as i64))
    }

    /// Slices the selection again, still without reading anything.
    pub fn slice(&self, start : Option<i64>, stop : Option<i64>, step : i64) -> FramesResult<FrameSlice<'s, S>> {
        let positions = slice_positions(start, stop, step, self.indices.len())?;
        Ok(FrameSlice {
            sequence : self.sequence,
            indices : positions.into_iter().map(|p| self.indices[p]).collect(),
        })
    }
}

impl<'s, S : PlaneSource + Sync> FrameSlice<'s, S> {
    /// Reads every selected frame, several frames at a time on
    /// the rayon pool. Frames come back in selection order.
    pub fn collect_parallel(&self) -> FramesResult<Vec<Frame>> {
        let sequence = self.sequence;
        let chunks = parallelize_op!(
            sequence.chunk_size,
            self.indices,
            |indices : &[usize]| {
                indices.iter()
                    .map(|&i| sequence.get_frame(i as i64))
                    .collect::<FramesResult<Vec<_>>>()
            }
        )?;
        Ok(chunks.into_iter().flatten().collect())
    }
}
