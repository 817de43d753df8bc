//! Decides which axes are iterated, which are bundled into
//! each frame, and where every other axis is pinned.
//!
//! A logical index `i` is unravelled row-major over the
//! `iter_axes` sizes (the last listed axis varies fastest),
//! exactly like `numpy.unravel_index`. Axes in neither list
//! take their value from `default_coords`, or 0.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::data::axes::registry::{AxisRegistry, is_spatial, X_AXIS, Y_AXIS};
use crate::source::Coords;
use crate::utils::{ConfigurationError, FramesError, FramesResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Planner {
    registry : AxisRegistry,
    iter_axes : Vec<String>,
    bundle_axes : Vec<String>,
    default_coords : BTreeMap<String, usize>,
    /// Product of the `iter_axes` sizes
    len : usize,
    /// Sizes of the `bundle_axes`, in listed order
    bundle_sizes : Vec<usize>,
}

/// Normalizes a possibly negative index against `len` once:
/// `-1` is the last element, and nothing wraps twice.
pub (crate) fn normalize_index(index : i64, len : usize) -> FramesResult<usize> {
    let wrapped = if index < 0 { index + len as i64 } else { index };
    if wrapped < 0 || wrapped as usize >= len {
        return Err(FramesError::Index { index, len });
    }
    Ok(wrapped as usize)
}

impl Planner {
    /// A planner with nothing iterated or bundled: one frame,
    /// every auxiliary axis pinned at 0.
    pub fn new(registry : AxisRegistry) -> Self {
        let mut planner = Planner {
            registry,
            ..Default::default()
        };
        planner.rederive();
        planner
    }

    pub fn registry(&self) -> &AxisRegistry {
        &self.registry
    }

    pub fn iter_axes(&self) -> &[String] {
        &self.iter_axes
    }

    pub fn bundle_axes(&self) -> &[String] {
        &self.bundle_axes
    }

    pub fn default_coords(&self) -> &BTreeMap<String, usize> {
        &self.default_coords
    }

    /// Logical length: product of the `iter_axes` sizes (1 if none)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bundle_sizes(&self) -> &[usize] {
        &self.bundle_sizes
    }

    /// Bundle sizes followed by `(size(y), size(x))`
    pub fn bundle_shape(&self) -> FramesResult<Vec<usize>> {
        let (y, x) = self.registry.spatial_size()
            .ok_or(ConfigurationError::SpatialSizeUnset)?;
        let mut shape = self.bundle_sizes.clone();
        shape.extend([y, x]);
        Ok(shape)
    }

    fn rederive(&mut self) {
        let size = |a : &String| self.registry.axis_size(a).unwrap_or(1);
        self.len = self.iter_axes.iter().map(size).product();
        self.bundle_sizes = self.bundle_axes.iter().map(size).collect();
    }

    /// Checks that every name is a declared, non-spatial axis
    /// listed only once and absent from `other`.
    fn validate_axes(&self, names : &[String], other : &[String]) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for name in names {
            if is_spatial(name) {
                return Err(ConfigurationError::SpatialAxis(name.clone()));
            }
            if !self.registry.contains(name) {
                return Err(ConfigurationError::UnknownAxis(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigurationError::DuplicateAxis(name.clone()));
            }
            if other.contains(name) {
                return Err(ConfigurationError::Overlap(name.clone()));
            }
        }
        Ok(())
    }

    /// Sets the iteration axes. The last one varies fastest.
    /// On error the previous configuration is kept.
    pub fn set_iter_axes<N : AsRef<str>>(&mut self, names : &[N]) -> Result<(), ConfigurationError> {
        let names : Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.validate_axes(&names, &self.bundle_axes)?;
        self.iter_axes = names;
        self.rederive();
        Ok(())
    }

    /// Sets the bundle axes, in the order they will appear in
    /// each frame. A trailing `["y", "x"]` is accepted and
    /// dropped since the spatial axes are always appended.
    pub fn set_bundle_axes<N : AsRef<str>>(&mut self, names : &[N]) -> Result<(), ConfigurationError> {
        let mut names : Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        if names.len() >= 2 && names[names.len() - 2] == Y_AXIS && names[names.len() - 1] == X_AXIS {
            names.truncate(names.len() - 2);
        }
        self.validate_axes(&names, &self.iter_axes)?;
        self.bundle_axes = names;
        self.rederive();
        Ok(())
    }

    /// Pins a non-iterated, non-bundled axis at `value`.
    pub fn set_default_coord(&mut self, name : &str, value : usize) -> Result<(), ConfigurationError> {
        if is_spatial(name) {
            return Err(ConfigurationError::SpatialAxis(name.to_string()));
        }
        let size = self.registry.axis_size(name)?;
        if value >= size {
            return Err(ConfigurationError::DefaultOutOfRange {
                axis : name.to_string(),
                value,
                size,
            });
        }
        self.default_coords.insert(name.to_string(), value);
        Ok(())
    }

    /// Forgets a default coordinate; the axis goes back to 0.
    pub fn clear_default_coord(&mut self, name : &str) -> Option<usize> {
        self.default_coords.remove(name)
    }

    /// Removes a degenerate (size-1) axis that nothing refers to.
    pub fn remove_axis(&mut self, name : &str) -> Result<(), ConfigurationError> {
        if is_spatial(name) {
            return Err(ConfigurationError::ReservedAxis(name.to_string()));
        }
        let in_use = self.iter_axes.iter().any(|a| a == name)
            || self.bundle_axes.iter().any(|a| a == name)
            || self.default_coords.contains_key(name);
        if in_use {
            return Err(ConfigurationError::AxisInUse(name.to_string()));
        }
        let size = self.registry.axis_size(name)?;
        if size != 1 {
            return Err(ConfigurationError::NotDegenerate { axis : name.to_string(), size });
        }
        self.registry.remove_axis(name)?;
        self.rederive();
        Ok(())
    }

    /// Swaps in a new registry (e.g. after the source changed
    /// series). Iteration and bundle axes that no longer exist
    /// are dropped, as are default coordinates that no longer
    /// fit. Returns `true` if anything had to be dropped.
    pub fn replace_registry(&mut self, registry : AxisRegistry) -> bool {
        let before = (
            self.iter_axes.len(),
            self.bundle_axes.len(),
            self.default_coords.len(),
        );
        self.registry = registry;
        let registry = &self.registry;
        self.iter_axes.retain(|a| registry.contains(a));
        self.bundle_axes.retain(|a| registry.contains(a));
        self.default_coords.retain(|a, v| {
            registry.axis_size(a).map(|size| *v < size).unwrap_or(false)
        });
        self.rederive();
        before != (
            self.iter_axes.len(),
            self.bundle_axes.len(),
            self.default_coords.len(),
        )
    }

    /// Converts a logical index into the coordinates of every
    /// auxiliary axis that is not bundled. Negative indices
    /// count from the end.
    pub fn resolve(&self, logical_index : i64) -> FramesResult<Coords> {
        let mut remainder = normalize_index(logical_index, self.len)?;

        let mut coords = Coords::new();
        for axis in self.iter_axes.iter().rev() {
            let size = self.registry.axis_size(axis)?;
            coords.insert(axis.clone(), remainder % size);
            remainder /= size;
        }

        for axis in self.registry.aux_axes() {
            if coords.contains_key(axis) || self.bundle_axes.contains(axis) {
                continue;
            }
            let value = self.default_coords.get(axis).copied().unwrap_or(0);
            coords.insert(axis.clone(), value);
        }
        Ok(coords)
    }

    /// Every combination of bundle-axis values, in row-major
    /// order over `bundle_axes`. Each entry lines up with
    /// `bundle_axes`. With no bundle axes there is exactly one
    /// (empty) combination.
    pub fn bundle_coordinate_grid(&self) -> Vec<Vec<usize>> {
        if self.bundle_sizes.is_empty() {
            return vec![Vec::new()];
        }
        self.bundle_sizes.iter()
            .map(|&size| 0..size)
            .multi_cartesian_product()
            .collect()
    }

    /// Merges one bundle combination into resolved coordinates.
    pub fn full_coords(&self, base : &Coords, combination : &[usize]) -> Coords {
        let mut coords = base.clone();
        for (axis, &value) in self.bundle_axes.iter().zip(combination) {
            coords.insert(axis.clone(), value);
        }
        coords
    }
}
