//! Raw binary plane stacks: headerless (or fixed-header)
//! files of equally sized planes laid out one after another,
//! optionally separated by a fixed gap.
//!
//! ```text
//! | header | plane 0 | gap | plane 1 | gap | ... | plane n-1 |
//! ```
//!
//! Planes are numbered row-major over the declared axes (the
//! first axis varies slowest). If no axes are declared, every
//! plane in the file goes on a single `t` axis.

use std::fs::File;
use std::io::{BufReader, Error as IOError, ErrorKind as IOErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::{BinRead, Endian, VecArgs};
use ndarray::prelude::*;

use crate::data::pixel::{Pixel, PixelArray, PixelType};
use crate::metadata::{Accessor, MetadataTable, MetadataValue, PlaneMetadata};
use crate::source::{Backend, Coords, PlaneSource};
use crate::utils::{FramesError, FramesResult};

#[cfg(target_endian = "little")]
const NATIVE_ENDIAN : Endian = Endian::Little;
#[cfg(target_endian = "big")]
const NATIVE_ENDIAN : Endian = Endian::Big;

/// Axis used when a layout declares none
pub const PLANE_AXIS : &str = "t";

/// How planes are laid out in a raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLayout {
    /// `(size(y), size(x))` of every plane
    pub plane_shape : (usize, usize),
    pub pixel_type : PixelType,
    pub endian : Endian,
    /// Bytes to skip before the first plane
    pub header_bytes : u64,
    /// Bytes between consecutive planes
    pub gap_bytes : u64,
    /// Auxiliary axes, first varying slowest. Empty means
    /// "one `t` axis holding every plane in the file".
    pub axes : Vec<(String, usize)>,
}

impl RawLayout {
    /// Little-endian, no header, no gaps, axes inferred.
    pub fn new(ydim : usize, xdim : usize, pixel_type : PixelType) -> Self {
        RawLayout {
            plane_shape : (ydim, xdim),
            pixel_type,
            endian : Endian::Little,
            header_bytes : 0,
            gap_bytes : 0,
            axes : Vec::new(),
        }
    }

    pub fn with_endian(mut self, endian : Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_header(mut self, header_bytes : u64) -> Self {
        self.header_bytes = header_bytes;
        self
    }

    pub fn with_gap(mut self, gap_bytes : u64) -> Self {
        self.gap_bytes = gap_bytes;
        self
    }

    pub fn with_axes(mut self, axes : &[(&str, usize)]) -> Self {
        self.axes = axes.iter().map(|(a, s)| (a.to_string(), *s)).collect();
        self
    }

    /// Bytes in one plane
    pub fn plane_bytes(&self) -> u64 {
        (self.plane_shape.0 * self.plane_shape.1 * self.pixel_type.byte_size()) as u64
    }

    /// Byte offset of plane number `plane`
    pub fn offset(&self, plane : usize) -> u64 {
        self.header_bytes + plane as u64 * (self.plane_bytes() + self.gap_bytes)
    }

    /// How many whole planes fit in a file of `file_len` bytes
    pub fn planes_in(&self, file_len : u64) -> usize {
        let plane_bytes = self.plane_bytes();
        if plane_bytes == 0 || file_len < self.header_bytes + plane_bytes {
            return 0;
        }
        ((file_len - self.header_bytes - plane_bytes) / (plane_bytes + self.gap_bytes) + 1) as usize
    }
}

/// Where one plane lives in the file; the context for the
/// raw stack's metadata accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneLocation {
    pub plane : usize,
    pub offset : u64,
}

/// Converts raw plane bytes into a typed array, swapping
/// bytes if the file's endianness is not the machine's.
fn decode_plane<T>(data : &[u8], endian : Endian, shape : (usize, usize)) -> binrw::BinResult<ArrayD<T>>
where T : Pixel + bytemuck::Pod + for<'a> BinRead<Args<'a> = ()> {
    let values : Vec<T> = if endian == NATIVE_ENDIAN {
        bytemuck::pod_collect_to_vec(data)
    } else {
        let mut cursor = binrw::io::Cursor::new(data);
        Vec::<T>::read_options(&mut cursor, endian, VecArgs { count : shape.0 * shape.1, inner : () })?
    };
    Array::from_shape_vec(IxDyn(&[shape.0, shape.1]), values).map_err(|err| binrw::Error::Io(
        IOError::new(IOErrorKind::InvalidData, err))
    )
}

/// Parses one plane of `pixel_type` at the reader's position.
#[binrw::parser(reader, endian)]
fn parse_plane(pixel_type : PixelType, ydim : usize, xdim : usize) -> binrw::BinResult<PixelArray> {
    let mut data : Vec<u8> = vec![0; ydim * xdim * pixel_type.byte_size()];
    reader.read_exact(&mut data)?;

    let shape = (ydim, xdim);
    Ok(match pixel_type {
        PixelType::U8 => decode_plane::<u8>(&data, endian, shape)?.into(),
        PixelType::U16 => decode_plane::<u16>(&data, endian, shape)?.into(),
        PixelType::I16 => decode_plane::<i16>(&data, endian, shape)?.into(),
        PixelType::U32 => decode_plane::<u32>(&data, endian, shape)?.into(),
        PixelType::I32 => decode_plane::<i32>(&data, endian, shape)?.into(),
        PixelType::F32 => decode_plane::<f32>(&data, endian, shape)?.into(),
        PixelType::F64 => decode_plane::<f64>(&data, endian, shape)?.into(),
    })
}

fn metadata_candidates() -> Vec<(&'static str, Accessor<PlaneLocation>)> {
    vec![
        ("plane", Box::new(|loc : &PlaneLocation| -> anyhow::Result<MetadataValue> {
            Ok(MetadataValue::from(loc.plane))
        }) as Accessor<PlaneLocation>),
        ("offset", Box::new(|loc : &PlaneLocation| -> anyhow::Result<MetadataValue> {
            Ok(MetadataValue::Int(i64::try_from(loc.offset)?))
        }) as Accessor<PlaneLocation>),
    ]
}

/// A raw binary plane stack on disk. The file is opened anew
/// for each read, so reads from several threads are fine.
pub struct RawStack {
    path : PathBuf,
    layout : RawLayout,
    axes : Vec<(String, usize)>,
    metadata : MetadataTable<PlaneLocation>,
}

impl RawStack {
    /// Opens `path` with the given layout.
    ///
    /// ## Errors
    ///
    /// * `FramesError::Io` if the file cannot be inspected
    /// * `FramesError::Discovery` if the declared axes need more
    /// planes than the file holds, or the plane size is zero
    pub fn open<P : AsRef<Path>>(path : P, layout : RawLayout) -> FramesResult<Self> {
        let path = path.as_ref().to_path_buf();
        if layout.plane_bytes() == 0 {
            return Err(FramesError::discovery("raw plane shape must be non-empty"));
        }

        let file_len = std::fs::metadata(&path)?.len();
        let available = layout.planes_in(file_len);

        let axes = if layout.axes.is_empty() {
            if available > 1 { vec![(PLANE_AXIS.to_string(), available)] } else { Vec::new() }
        } else {
            layout.axes.clone()
        };
        let needed : usize = axes.iter().map(|(_, s)| *s).product();
        if needed > available {
            return Err(FramesError::discovery(format!(
                "{:?} holds {} planes of {} bytes, layout needs {}",
                path, available, layout.plane_bytes(), needed
            )));
        }
        if needed < available {
            tracing::debug!(needed, available, "raw stack has trailing planes");
        }

        let metadata = MetadataTable::detect(
            &PlaneLocation { plane : 0, offset : layout.offset(0) },
            metadata_candidates(),
        );

        Ok(RawStack { path, layout, axes, metadata })
    }

    pub fn layout(&self) -> &RawLayout {
        &self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Plane number and byte offset for a coordinate
    pub fn locate(&self, coords : &Coords) -> anyhow::Result<PlaneLocation> {
        let mut plane = 0;
        for (axis, size) in &self.axes {
            let i = *coords.get(axis)
                .ok_or_else(|| anyhow::anyhow!("missing coordinate for axis '{}'", axis))?;
            if i >= *size {
                anyhow::bail!("coordinate {} out of range for axis '{}' of size {}", i, axis, size);
            }
            plane = plane * size + i;
        }
        Ok(PlaneLocation { plane, offset : self.layout.offset(plane) })
    }
}

impl PlaneSource for RawStack {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        let location = self.locate(coords)?;

        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(location.offset))?;

        let (ydim, xdim) = self.layout.plane_shape;
        let plane = parse_plane(
            &mut reader,
            self.layout.endian,
            (self.layout.pixel_type, ydim, xdim),
        ).map_err(FramesError::from)?;

        Ok((plane, self.metadata.collect(&location)))
    }
}

impl Backend for RawStack {
    fn name(&self) -> &str {
        "raw stack"
    }

    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>> {
        Ok(self.axes.clone())
    }

    fn default_iter_axes(&self) -> Vec<String> {
        self.axes.first().map(|(a, _)| vec![a.clone()]).unwrap_or_default()
    }
}
