//! Builds one `Frame` out of as many plane reads as the
//! bundle axes require.
//!
//! For a logical index the planner gives the coordinates of
//! every non-bundled axis; the assembler then walks the bundle
//! grid, reads one plane per combination, and writes each
//! plane into its own slice of a freshly allocated output
//! array. Size-1 bundle dimensions are squeezed away at the
//! end; the plane dimensions never are.

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::data::axes::planner::{normalize_index, Planner};
use crate::data::frame::{fold_metadata, Frame};
use crate::data::pixel::{Pixel, PixelType};
use crate::metadata::PlaneMetadata;
use crate::source::{Coords, PlaneSource};
use crate::utils::{parallelize_op, FramesError, FramesResult};

/// Planes handed to each rayon task by `assemble_parallel`
pub const DEFAULT_CHUNK_SIZE : usize = 4;

/// Evaluates `$body` with the type alias `$T` bound to the
/// Rust type of the runtime pixel type.
macro_rules! dispatch_pixel_type {
    ($pixel_type : expr, $T : ident => $body : expr) => {
        match $pixel_type {
            PixelType::U8 => { type $T = u8; $body },
            PixelType::U16 => { type $T = u16; $body },
            PixelType::I16 => { type $T = i16; $body },
            PixelType::U32 => { type $T = u32; $body },
            PixelType::I32 => { type $T = i32; $body },
            PixelType::F32 => { type $T = f32; $body },
            PixelType::F64 => { type $T = f64; $body },
        }
    };
}

/// Borrows everything needed to assemble frames: the axis
/// configuration, the plane source, the output pixel type,
/// and the shape every plane must have.
pub struct FrameAssembler<'a, S : ?Sized> {
    planner : &'a Planner,
    source : &'a S,
    pixel_type : PixelType,
    plane_shape : &'a [usize],
}

impl<'a, S : PlaneSource + ?Sized> FrameAssembler<'a, S> {
    /// `plane_shape` is `[size(y), size(x)]`, plus the number
    /// of samples per pixel for multi-channel planes.
    pub fn new(
        planner : &'a Planner,
        source : &'a S,
        pixel_type : PixelType,
        plane_shape : &'a [usize],
    ) -> Self {
        FrameAssembler { planner, source, pixel_type, plane_shape }
    }

    /// Shape of the frames this assembler returns
    pub fn frame_shape(&self) -> Vec<usize> {
        let mut shape : Vec<usize> = self.planner.bundle_sizes().iter()
            .copied()
            .filter(|&s| s != 1)
            .collect();
        shape.extend_from_slice(self.plane_shape);
        shape
    }

    /// Assembles the frame at `logical_index` (negative counts
    /// from the end), reading planes one after another.
    ///
    /// ## Errors
    ///
    /// * `FramesError::Index` if the index is out of range
    /// * `FramesError::Read` if the source fails on any plane
    /// * `FramesError::PlaneMismatch` if a plane has the wrong shape
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn assemble(&self, logical_index : i64) -> FramesResult<Frame> {
        dispatch_pixel_type!(self.pixel_type, T => {
            self.build::<T, _>(logical_index, |base, grid, mut flat| {
                flat.outer_iter_mut().zip(grid)
                    .map(|(slot, combination)| self.read_into(base, combination, slot))
                    .collect::<FramesResult<Vec<_>>>()
            })
        })
    }

    /// Reads the plane at `base` + `combination` into `target`.
    fn read_into<T : Pixel>(
        &self,
        base : &Coords,
        combination : &[usize],
        mut target : ArrayViewMutD<T>,
    ) -> FramesResult<PlaneMetadata> {
        let coords = self.planner.full_coords(base, combination);
        tracing::trace!(?coords, "reading plane");

        let (plane, metadata) = self.source.read_plane(&coords)
            .map_err(|source| FramesError::Read { coords : coords.clone(), source })?;

        if plane.shape() != self.plane_shape {
            return Err(FramesError::PlaneMismatch {
                expected : self.plane_shape.to_vec(),
                found : plane.shape().to_vec(),
                coords,
            });
        }

        let plane = match plane.into_type(T::PIXEL_TYPE).into_array::<T>() {
            Some(plane) => plane,
            None => return Err(FramesError::Read {
                source : anyhow::anyhow!("could not convert plane to {}", T::PIXEL_TYPE),
                coords,
            }),
        };
        target.assign(&plane);
        Ok(metadata)
    }

    /// Allocates the output, hands `fill` a view of it with one
    /// row per bundle combination, then squeezes and wraps it.
    fn build<T, F>(&self, logical_index : i64, fill : F) -> FramesResult<Frame>
    where
        T : Pixel,
        F : FnOnce(&Coords, &[Vec<usize>], ArrayViewMutD<T>) -> FramesResult<Vec<PlaneMetadata>>,
    {
        let frame_no = normalize_index(logical_index, self.planner.len())?;
        let base = self.planner.resolve(frame_no as i64)?;
        let grid = self.planner.bundle_coordinate_grid();

        let mut full_shape = self.planner.bundle_sizes().to_vec();
        full_shape.extend_from_slice(self.plane_shape);
        let mut out = ArrayD::<T>::default(IxDyn(&full_shape));

        let mut flat_shape = vec![grid.len()];
        flat_shape.extend_from_slice(self.plane_shape);

        let plane_metadata = {
            let flat = out.view_mut().into_shape_with_order(flat_shape)?;
            fill(&base, &grid, flat)?
        };
        tracing::debug!(frame_no, planes = grid.len(), "assembled frame");

        let array = out.into_shape_with_order(self.frame_shape())?;
        Ok(Frame {
            array : T::wrap(array),
            frame_no,
            coords : base,
            metadata : fold_metadata(&plane_metadata),
        })
    }
}

impl<'a, S : PlaneSource + Sync + ?Sized> FrameAssembler<'a, S> {
    /// Assembles the frame at `logical_index`, spreading the
    /// bundle grid over the rayon pool in chunks of
    /// `chunk_size` planes. Output and metadata order match
    /// `assemble` exactly.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn assemble_parallel(&self, logical_index : i64, chunk_size : usize) -> FramesResult<Frame> {
        dispatch_pixel_type!(self.pixel_type, T => {
            self.build::<T, _>(logical_index, |base, grid, mut flat| {
                let per_chunk = parallelize_op!(
                    flat,
                    chunk_size,
                    grid,
                    |combinations : &[Vec<usize>], chunk : &mut ArrayViewMutD<T>| {
                        chunk.outer_iter_mut().zip(combinations)
                            .map(|(slot, combination)| self.read_into(base, combination, slot))
                            .collect::<FramesResult<Vec<_>>>()
                    }
                )?;
                Ok(per_chunk.into_iter().flatten().collect())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::axes::AxisRegistry;
    use crate::data::frame::MetadataField;
    use crate::data::pixel::PixelArray;
    use crate::metadata::MetadataValue;
    use crate::source::FnSource;

    /// Planes whose every pixel encodes the coordinates they
    /// were read at: `100 * t + 10 * z + c`.
    fn coded_source() -> impl PlaneSource + Sync {
        FnSource(|coords : &Coords| -> anyhow::Result<(PixelArray, PlaneMetadata)> {
            let value = 100 * coords.get("t").copied().unwrap_or(0)
                + 10 * coords.get("z").copied().unwrap_or(0)
                + coords.get("c").copied().unwrap_or(0);
            let plane = Array2::<u16>::from_elem((2, 3), value as u16).into_dyn();
            let mut md = PlaneMetadata::new();
            md.insert("z".to_string(), MetadataValue::from(coords.get("z").copied().unwrap_or(0)));
            md.insert("series".to_string(), MetadataValue::Int(0));
            Ok((PixelArray::from(plane), md))
        })
    }

    fn planner(axes : &[(&str, usize)]) -> Planner {
        let mut registry = AxisRegistry::from_axes(axes).unwrap();
        registry.set_spatial_size(2, 3).unwrap();
        Planner::new(registry)
    }

    #[test]
    fn bundles_z_in_grid_order() {
        let mut planner = planner(&[("t", 2), ("z", 3)]);
        planner.set_iter_axes(&["t"]).unwrap();
        planner.set_bundle_axes(&["z"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        let frame = assembler.assemble(1).unwrap();
        assert_eq!(frame.shape(), &[3, 2, 3]);
        assert_eq!(frame.frame_no, 1);
        assert_eq!(frame.coords.get("t"), Some(&1));

        let data = frame.as_array::<u16>().unwrap();
        for z in 0..3 {
            assert!(data.index_axis(Axis(0), z).iter().all(|&v| v == 100 + 10 * z as u16));
        }
        assert_eq!(frame.metadata["series"], MetadataField::Scalar(MetadataValue::Int(0)));
        assert_eq!(
            frame.metadata["z"],
            MetadataField::PerPlane((0..3).map(|z| Some(MetadataValue::Int(z))).collect())
        );
    }

    #[test]
    fn two_bundle_axes_keep_their_order() {
        let mut planner = planner(&[("t", 1), ("z", 2), ("c", 3)]);
        planner.set_iter_axes(&["t"]).unwrap();
        planner.set_bundle_axes(&["c", "z"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        let frame = assembler.assemble(0).unwrap();
        assert_eq!(frame.shape(), &[3, 2, 2, 3]);
        let data = frame.as_array::<u16>().unwrap();
        assert_eq!(data[[2, 1, 0, 0]], 12);
        assert_eq!(data[[1, 0, 1, 2]], 1);
    }

    #[test]
    fn size_one_bundle_axes_are_squeezed() {
        let mut planner = planner(&[("t", 3), ("z", 1)]);
        planner.set_iter_axes(&["t"]).unwrap();
        planner.set_bundle_axes(&["z"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        assert_eq!(assembler.frame_shape(), vec![2, 3]);
        let frame = assembler.assemble(-1).unwrap();
        assert_eq!(frame.shape(), &[2, 3]);
        assert_eq!(frame.frame_no, 2);
        assert!(frame.as_array::<u16>().unwrap().iter().all(|&v| v == 200));
    }

    #[test]
    fn casts_to_requested_pixel_type() {
        let mut planner = planner(&[("t", 2)]);
        planner.set_iter_axes(&["t"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::F64, &plane_shape);

        let frame = assembler.assemble(1).unwrap();
        assert_eq!(frame.pixel_type(), PixelType::F64);
        assert!(frame.as_array::<f64>().unwrap().iter().all(|&v| v == 100.0));
    }

    #[test]
    fn out_of_range_index() {
        let mut planner = planner(&[("t", 2)]);
        planner.set_iter_axes(&["t"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        assert!(matches!(assembler.assemble(2), Err(FramesError::Index { index : 2, len : 2 })));
        assert!(matches!(assembler.assemble(-3), Err(FramesError::Index { .. })));
    }

    #[test]
    fn wrong_plane_shape_is_reported_with_coords() {
        let mut planner = planner(&[("t", 2)]);
        planner.set_iter_axes(&["t"]).unwrap();

        let source = coded_source();
        let plane_shape = [4, 4];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        match assembler.assemble(1) {
            Err(FramesError::PlaneMismatch { coords, expected, found }) => {
                assert_eq!(coords.get("t"), Some(&1));
                assert_eq!(expected, vec![4, 4]);
                assert_eq!(found, vec![2, 3]);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn read_failures_carry_coords() {
        let mut planner = planner(&[("t", 2), ("z", 2)]);
        planner.set_iter_axes(&["t"]).unwrap();
        planner.set_bundle_axes(&["z"]).unwrap();

        let source = FnSource(|coords : &Coords| -> anyhow::Result<(PixelArray, PlaneMetadata)> {
            if coords["z"] == 1 {
                anyhow::bail!("corrupt plane");
            }
            Ok((PixelArray::from(Array2::<u8>::zeros((2, 3)).into_dyn()), PlaneMetadata::new()))
        });
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U8, &plane_shape);

        match assembler.assemble(0) {
            Err(FramesError::Read { coords, .. }) => {
                assert_eq!(coords.get("z"), Some(&1));
                assert_eq!(coords.get("t"), Some(&0));
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut planner = planner(&[("t", 2), ("z", 5), ("c", 3)]);
        planner.set_iter_axes(&["t"]).unwrap();
        planner.set_bundle_axes(&["z", "c"]).unwrap();

        let source = coded_source();
        let plane_shape = [2, 3];
        let assembler = FrameAssembler::new(&planner, &source, PixelType::U16, &plane_shape);

        for chunk_size in [1, 2, DEFAULT_CHUNK_SIZE, 100] {
            let sequential = assembler.assemble(1).unwrap();
            let parallel = assembler.assemble_parallel(1, chunk_size).unwrap();
            assert_eq!(sequential, parallel);
        }
        // zero is treated as one
        assert_eq!(assembler.assemble(0).unwrap(), assembler.assemble_parallel(0, 0).unwrap());
    }
}
