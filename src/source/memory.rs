//! A backend holding the whole dataset in one array.
//!
//! Mostly useful for tests, benchmarks and synthetic data:
//! the array's leading dimensions are the auxiliary axes (in
//! declaration order) and the trailing two or three are the
//! plane. With `with_read_log` it also records every
//! coordinate it is asked for, so callers can check exactly
//! which planes were read.

use std::cell::RefCell;
use std::sync::Mutex;

use ndarray::prelude::*;
use rand::Rng;

use crate::data::pixel::{Pixel, PixelArray, PixelType, with_pixel_array};
use crate::metadata::{MetadataValue, PlaneMetadata};
use crate::source::{Backend, Coords, PlaneSource};
use crate::utils::{FramesError, FramesResult};

type MetadataFn = Box<dyn Fn(&Coords) -> MetadataValue + Send + Sync>;

pub struct InMemorySource {
    name : String,
    axes : Vec<(String, usize)>,
    data : PixelArray,
    metadata : Vec<(String, MetadataFn)>,
    iter_axes : Vec<String>,
    bundle_axes : Vec<String>,
    /// Requested coordinates, if logging was switched on
    reads : Option<Mutex<Vec<Coords>>>,
}

/// Indexes the leading (auxiliary) axes of `array` and
/// returns an owned copy of the remaining plane.
fn plane_at<T : Pixel>(array : &ArrayD<T>, index : &[usize]) -> ArrayD<T> {
    let mut view = array.view();
    for &i in index {
        view = view.index_axis_move(Axis(0), i);
    }
    view.to_owned()
}

impl InMemorySource {
    /// Wraps `data`, whose leading dimensions must match `axes`
    /// and which must have two or three trailing plane dimensions.
    pub fn new(axes : &[(&str, usize)], data : impl Into<PixelArray>) -> FramesResult<Self> {
        let data = data.into();
        let shape = data.shape();
        if shape.len() != axes.len() + 2 && shape.len() != axes.len() + 3 {
            return Err(FramesError::discovery(format!(
                "array with {} dimensions cannot hold {} axes plus a plane",
                shape.len(), axes.len()
            )));
        }
        for (dim, (name, size)) in axes.iter().enumerate() {
            if shape[dim] != *size {
                return Err(FramesError::discovery(format!(
                    "axis '{}' declared with size {} but the array has {}",
                    name, size, shape[dim]
                )));
            }
        }
        Ok(InMemorySource {
            name : "in-memory".to_string(),
            axes : axes.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            data,
            metadata : Vec::new(),
            iter_axes : Vec::new(),
            bundle_axes : Vec::new(),
            reads : None,
        })
    }

    /// Builds the data array by calling `f` with the full index
    /// (auxiliary axes, then `y`, `x`) of every pixel.
    pub fn from_fn<T, F>(axes : &[(&str, usize)], plane_shape : (usize, usize), f : F) -> Self
    where T : Pixel, F : Fn(&[usize]) -> T {
        let mut shape : Vec<usize> = axes.iter().map(|(_, s)| *s).collect();
        shape.extend([plane_shape.0, plane_shape.1]);
        let data = ArrayD::from_shape_fn(IxDyn(&shape), |idx| f(idx.slice()));
        // shape is consistent by construction
        InMemorySource {
            name : "in-memory".to_string(),
            axes : axes.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            data : T::wrap(data),
            metadata : Vec::new(),
            iter_axes : Vec::new(),
            bundle_axes : Vec::new(),
            reads : None,
        }
    }

    /// Uniformly random data of the requested pixel type.
    pub fn random(axes : &[(&str, usize)], plane_shape : (usize, usize), pixel_type : PixelType) -> Self {
        // `from_fn` takes `Fn`, so draw through a cell
        let rng = RefCell::new(rand::thread_rng());
        let mut source = match pixel_type {
            PixelType::U8 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<u8>()),
            PixelType::U16 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<u16>()),
            PixelType::I16 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<i16>()),
            PixelType::U32 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<u32>()),
            PixelType::I32 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<i32>()),
            PixelType::F32 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<f32>()),
            PixelType::F64 => InMemorySource::from_fn(axes, plane_shape, |_| rng.borrow_mut().gen::<f64>()),
        };
        source.name = "random".to_string();
        source
    }

    /// Adds a per-plane metadata field computed from the coordinates.
    pub fn with_metadata<F>(mut self, key : &str, f : F) -> Self
    where F : Fn(&Coords) -> MetadataValue + Send + Sync + 'static {
        self.metadata.push((key.to_string(), Box::new(f)));
        self
    }

    /// Sets the axes the facade will iterate and bundle by default.
    pub fn with_defaults(mut self, iter_axes : &[&str], bundle_axes : &[&str]) -> Self {
        self.iter_axes = iter_axes.iter().map(|a| a.to_string()).collect();
        self.bundle_axes = bundle_axes.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Records every coordinate passed to `read_plane`.
    pub fn with_read_log(mut self) -> Self {
        self.reads = Some(Mutex::new(Vec::new()));
        self
    }

    pub fn with_name(mut self, name : &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// The full backing array
    pub fn data(&self) -> &PixelArray {
        &self.data
    }

    /// Every coordinate requested so far, in call order. Always
    /// empty without `with_read_log`.
    pub fn reads(&self) -> Vec<Coords> {
        self.reads.as_ref()
            .and_then(|reads| reads.lock().ok().map(|r| r.clone()))
            .unwrap_or_default()
    }

    pub fn clear_reads(&self) {
        if let Some(Ok(mut reads)) = self.reads.as_ref().map(|r| r.lock()) {
            reads.clear();
        }
    }
}

impl PlaneSource for InMemorySource {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        let mut index = Vec::with_capacity(self.axes.len());
        for (axis, size) in &self.axes {
            let i = *coords.get(axis)
                .ok_or_else(|| anyhow::anyhow!("missing coordinate for axis '{}'", axis))?;
            if i >= *size {
                anyhow::bail!("coordinate {} out of range for axis '{}' of size {}", i, axis, size);
            }
            index.push(i);
        }

        if let Some(Ok(mut reads)) = self.reads.as_ref().map(|r| r.lock()) {
            reads.push(coords.clone());
        }

        let plane : PixelArray = with_pixel_array!(&self.data, arr => plane_at(arr, &index).into());
        let metadata = self.metadata.iter()
            .map(|(key, f)| (key.clone(), f(coords)))
            .collect();
        Ok((plane, metadata))
    }
}

impl Backend for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>> {
        Ok(self.axes.clone())
    }

    fn default_iter_axes(&self) -> Vec<String> {
        self.iter_axes.clone()
    }

    fn default_bundle_axes(&self) -> Vec<String> {
        self.bundle_axes.clone()
    }
}
