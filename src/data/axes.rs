//! Axis bookkeeping: which axes exist (`registry`) and how
//! they map onto frames (`planner`).

pub mod planner;
pub mod registry;

pub use planner::Planner;
pub use registry::{AxisRegistry, is_spatial, X_AXIS, Y_AXIS};
