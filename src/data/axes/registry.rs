//! The set of axes a dataset has, and their sizes.

use std::collections::HashMap;

use crate::utils::ConfigurationError;

pub const Y_AXIS : &str = "y";
pub const X_AXIS : &str = "x";

/// Whether `name` is one of the two reserved spatial axes
pub fn is_spatial(name : &str) -> bool {
    name == Y_AXIS || name == X_AXIS
}

/// `AxisRegistry` owns the known axes of one dataset.
///
/// Auxiliary axes (`t`, `z`, `c`, ...) are kept in declaration
/// order; the spatial axes `y` and `x` are always last and are
/// sized exactly once, from the shape of the first plane read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisRegistry {
    aux : Vec<String>,
    sizes : HashMap<String, usize>,
    spatial : Option<(usize, usize)>,
}

impl AxisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(name, size)` pairs in order.
    pub fn from_axes<N : AsRef<str>>(axes : &[(N, usize)]) -> Result<Self, ConfigurationError> {
        let mut registry = AxisRegistry::new();
        for (name, size) in axes {
            registry.declare_axis(name.as_ref(), *size)?;
        }
        Ok(registry)
    }

    /// Declares an auxiliary axis. Redeclaring an axis with the
    /// same size is a no-op.
    ///
    /// ## Errors
    ///
    /// * `ReservedAxis` - `name` is `y` or `x`
    /// * `EmptyAxisName` / `ZeroSize` - invalid name or size
    /// * `ConflictingSize` - already declared with another size
    pub fn declare_axis(&mut self, name : &str, size : usize) -> Result<(), ConfigurationError> {
        if is_spatial(name) {
            return Err(ConfigurationError::ReservedAxis(name.to_string()));
        }
        if name.is_empty() {
            return Err(ConfigurationError::EmptyAxisName);
        }
        if size == 0 {
            return Err(ConfigurationError::ZeroSize(name.to_string()));
        }
        match self.sizes.get(name) {
            Some(&declared) if declared != size => {
                Err(ConfigurationError::ConflictingSize {
                    axis : name.to_string(),
                    declared,
                    requested : size,
                })
            },
            Some(_) => Ok(()),
            None => {
                self.aux.push(name.to_string());
                self.sizes.insert(name.to_string(), size);
                Ok(())
            }
        }
    }

    /// Sizes the spatial axes. May be repeated with the same
    /// values, but never changed once set.
    pub fn set_spatial_size(&mut self, y_size : usize, x_size : usize) -> Result<(), ConfigurationError> {
        if y_size == 0 {
            return Err(ConfigurationError::ZeroSize(Y_AXIS.to_string()));
        }
        if x_size == 0 {
            return Err(ConfigurationError::ZeroSize(X_AXIS.to_string()));
        }
        match self.spatial {
            Some((y, x)) if (y, x) != (y_size, x_size) => {
                Err(ConfigurationError::SpatialSizeConflict {
                    declared_y : y,
                    declared_x : x,
                    requested_y : y_size,
                    requested_x : x_size,
                })
            },
            _ => {
                self.spatial = Some((y_size, x_size));
                Ok(())
            }
        }
    }

    /// `(size(y), size(x))`, if already known
    pub fn spatial_size(&self) -> Option<(usize, usize)> {
        self.spatial
    }

    /// Size of any axis, spatial included.
    pub fn axis_size(&self, name : &str) -> Result<usize, ConfigurationError> {
        match name {
            Y_AXIS => self.spatial.map(|(y, _)| y)
                .ok_or(ConfigurationError::SpatialSizeUnset),
            X_AXIS => self.spatial.map(|(_, x)| x)
                .ok_or(ConfigurationError::SpatialSizeUnset),
            _ => self.sizes.get(name).copied()
                .ok_or_else(|| ConfigurationError::UnknownAxis(name.to_string())),
        }
    }

    pub fn contains(&self, name : &str) -> bool {
        if is_spatial(name) {
            self.spatial.is_some()
        } else {
            self.sizes.contains_key(name)
        }
    }

    /// Removes an auxiliary axis. Whether anything still refers
    /// to it is the planner's business (`Planner::remove_axis`).
    pub fn remove_axis(&mut self, name : &str) -> Result<(), ConfigurationError> {
        if is_spatial(name) {
            return Err(ConfigurationError::ReservedAxis(name.to_string()));
        }
        if self.sizes.remove(name).is_none() {
            return Err(ConfigurationError::UnknownAxis(name.to_string()));
        }
        self.aux.retain(|a| a != name);
        Ok(())
    }

    /// Auxiliary axes in declaration order
    pub fn aux_axes(&self) -> &[String] {
        &self.aux
    }

    /// All axis names, auxiliary first, then `y`, `x` once sized
    pub fn axes(&self) -> Vec<String> {
        let mut axes = self.aux.clone();
        if self.spatial.is_some() {
            axes.push(Y_AXIS.to_string());
            axes.push(X_AXIS.to_string());
        }
        axes
    }

    /// `(name, size)` for every axis, in the order of `axes()`
    pub fn sizes(&self) -> Vec<(String, usize)> {
        let mut sizes : Vec<(String, usize)> = self.aux.iter()
            .map(|a| (a.clone(), self.sizes[a]))
            .collect();
        if let Some((y, x)) = self.spatial {
            sizes.push((Y_AXIS.to_string(), y));
            sizes.push((X_AXIS.to_string(), x));
        }
        sizes
    }

    pub fn ndim(&self) -> usize {
        self.aux.len() + if self.spatial.is_some() { 2 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_query() {
        let mut registry = AxisRegistry::new();
        registry.declare_axis("t", 3).unwrap();
        registry.declare_axis("z", 2).unwrap();
        registry.set_spatial_size(4, 5).unwrap();

        assert_eq!(registry.axes(), vec!["t", "z", "y", "x"]);
        assert_eq!(registry.axis_size("z").unwrap(), 2);
        assert_eq!(registry.axis_size("y").unwrap(), 4);
        assert_eq!(registry.axis_size("x").unwrap(), 5);
        assert_eq!(registry.ndim(), 4);
        assert_eq!(
            registry.sizes(),
            vec![
                ("t".to_string(), 3),
                ("z".to_string(), 2),
                ("y".to_string(), 4),
                ("x".to_string(), 5)
            ]
        );
    }

    #[test]
    fn spatial_names_are_reserved() {
        let mut registry = AxisRegistry::new();
        assert_eq!(
            registry.declare_axis("y", 10),
            Err(ConfigurationError::ReservedAxis("y".to_string()))
        );
        assert!(registry.declare_axis("x", 10).is_err());
        assert!(registry.remove_axis("x").is_err());
    }

    #[test]
    fn redeclaring_requires_same_size() {
        let mut registry = AxisRegistry::new();
        registry.declare_axis("c", 2).unwrap();
        assert!(registry.declare_axis("c", 2).is_ok());
        assert_eq!(
            registry.declare_axis("c", 3),
            Err(ConfigurationError::ConflictingSize {
                axis : "c".to_string(), declared : 2, requested : 3
            })
        );
        assert_eq!(registry.aux_axes(), &["c".to_string()]);
        assert!(registry.declare_axis("q", 0).is_err());
        assert!(registry.declare_axis("", 1).is_err());
    }

    #[test]
    fn spatial_size_set_once() {
        let mut registry = AxisRegistry::new();
        assert_eq!(registry.axis_size("y"), Err(ConfigurationError::SpatialSizeUnset));
        registry.set_spatial_size(8, 8).unwrap();
        registry.set_spatial_size(8, 8).unwrap();
        assert!(matches!(
            registry.set_spatial_size(8, 9),
            Err(ConfigurationError::SpatialSizeConflict { .. })
        ));
        assert_eq!(registry.spatial_size(), Some((8, 8)));
    }

    #[test]
    fn unknown_axes_and_removal() {
        let mut registry = AxisRegistry::from_axes(&[("t", 4), ("c", 1)]).unwrap();
        assert_eq!(
            registry.axis_size("z"),
            Err(ConfigurationError::UnknownAxis("z".to_string()))
        );
        registry.remove_axis("c").unwrap();
        assert!(!registry.contains("c"));
        assert_eq!(registry.aux_axes(), &["t".to_string()]);
        assert!(registry.remove_axis("c").is_err());
    }
}
