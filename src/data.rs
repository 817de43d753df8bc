//! Pixel containers, axis bookkeeping, and frame assembly.

pub mod assemble;
pub mod axes;
pub mod frame;
pub mod pixel;
