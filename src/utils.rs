mod parallelize_op;
pub mod natural_sort;

pub (crate) use parallelize_op::parallelize_op;

use std::path::PathBuf;

use crate::source::Coords;

/// Errors raised while declaring or configuring axes. These
/// are always surfaced at the call that caused them and leave
/// the previous configuration untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("axis '{0}' is reserved for the spatial dimensions")]
    ReservedAxis(String),

    #[error("axis name must not be empty")]
    EmptyAxisName,

    #[error("axis '{0}' must have a size of at least 1")]
    ZeroSize(String),

    #[error("axis '{axis}' already declared with size {declared}, requested {requested}")]
    ConflictingSize { axis : String, declared : usize, requested : usize },

    #[error("spatial size already set to ({declared_y}, {declared_x}), requested ({requested_y}, {requested_x})")]
    SpatialSizeConflict {
        declared_y : usize,
        declared_x : usize,
        requested_y : usize,
        requested_x : usize,
    },

    #[error("spatial size has not been set")]
    SpatialSizeUnset,

    #[error("unknown axis '{0}'")]
    UnknownAxis(String),

    #[error("spatial axis '{0}' cannot be used here")]
    SpatialAxis(String),

    #[error("axis '{0}' listed more than once")]
    DuplicateAxis(String),

    #[error("axis '{0}' cannot be both iterated and bundled")]
    Overlap(String),

    #[error("default coordinate {value} for axis '{axis}' is outside [0, {size})")]
    DefaultOutOfRange { axis : String, value : usize, size : usize },

    #[error("axis '{0}' is referenced by the current configuration")]
    AxisInUse(String),

    #[error("axis '{axis}' has size {size}; only size-1 axes can be removed")]
    NotDegenerate { axis : String, size : usize },
}

/// Errors that can occur while addressing or assembling
/// frames, either from the configuration (the `Configuration`
/// variant), the requested indices, or the plane source.
#[derive(thiserror::Error, Debug)]
pub enum FramesError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("index {index} out of range for sequence of length {len}")]
    Index { index : i64, len : usize },

    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    #[error("failed to read plane at {coords:?}: {source}")]
    Read {
        coords : Coords,
        #[source]
        source : anyhow::Error,
    },

    #[error("plane at {coords:?} has shape {found:?}, expected {expected:?}")]
    PlaneMismatch {
        coords : Coords,
        expected : Vec<usize>,
        found : Vec<usize>,
    },

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("no available backend can open {0:?}")]
    NoBackend(PathBuf),

    #[error("external runtime failed to start: {0}")]
    RuntimeStart(#[source] anyhow::Error),

    #[error("external runtime has been stopped")]
    RuntimeStopped,

    #[error("external runtime still has {0} live handle(s)")]
    RuntimeInUse(usize),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    #[error("ShapeError: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl FramesError {
    pub fn discovery(msg : impl Into<String>) -> Self {
        FramesError::Discovery(msg.into())
    }
}

impl From<binrw::Error> for FramesError {
    fn from(err : binrw::Error) -> Self {
        FramesError::Io(
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string()
            )
        )
    }
}

pub type FramesResult<T> = Result<T, FramesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_wrapped() {
        let err : FramesError = ConfigurationError::Overlap("z".to_string()).into();
        assert!(matches!(err, FramesError::Configuration(ConfigurationError::Overlap(_))));
        assert!(err.to_string().contains("configuration error:"));
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn read_errors_keep_coordinates_and_source() {
        let mut coords = Coords::new();
        coords.insert("t".to_string(), 3);
        let err = FramesError::Read {
            coords,
            source : anyhow::anyhow!("stream truncated"),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"t\": 3"));
        assert!(msg.contains("stream truncated"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
