//! Pixel arrays whose element type is only known at runtime.
//!
//! Plane sources report whatever dtype their format stores,
//! and callers may force a different one, so planes move
//! through the engine as a `PixelArray` -- an enum over the
//! `ndarray::ArrayD` of each supported element type. Typed
//! code (the assembler) gets at the concrete array through
//! the `Pixel` trait.

use ndarray::prelude::*;

/// The element type of a plane or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    /// Size of one sample in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    /// Parses the usual short names (`"u16"`, `"uint16"`, `"float32"`, ...).
    pub fn from_string_slice(name : &str) -> Option<PixelType> {
        match name.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Some(PixelType::U8),
            "u16" | "uint16" => Some(PixelType::U16),
            "i16" | "int16" => Some(PixelType::I16),
            "u32" | "uint32" => Some(PixelType::U32),
            "i32" | "int32" => Some(PixelType::I32),
            "f32" | "float32" => Some(PixelType::F32),
            "f64" | "float64" => Some(PixelType::F64),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            PixelType::U8 => "uint8",
            PixelType::U16 => "uint16",
            PixelType::I16 => "int16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        };
        write!(f, "{}", name)
    }
}

/// An n-dimensional array of one of the supported pixel types.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    I16(ArrayD<i16>),
    U32(ArrayD<u32>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Applies `$body` to the inner array of any `PixelArray`
/// variant, binding it to `$arr`.
///
/// ```rust, ignore
/// let shape = with_pixel_array!(&pixel_array, arr => arr.shape().to_vec());
/// ```
macro_rules! with_pixel_array {
    ($value : expr, $arr : ident => $body : expr) => {
        match $value {
            PixelArray::U8($arr) => $body,
            PixelArray::U16($arr) => $body,
            PixelArray::I16($arr) => $body,
            PixelArray::U32($arr) => $body,
            PixelArray::I32($arr) => $body,
            PixelArray::F32($arr) => $body,
            PixelArray::F64($arr) => $body,
        }
    };
}

/// Builds a `PixelArray` of type `$target` from a typed
/// array by casting every element with `as`.
macro_rules! cast_array {
    ($arr : expr, $target : expr) => {
        match $target {
            PixelType::U8 => PixelArray::U8($arr.mapv(|v| v as u8)),
            PixelType::U16 => PixelArray::U16($arr.mapv(|v| v as u16)),
            PixelType::I16 => PixelArray::I16($arr.mapv(|v| v as i16)),
            PixelType::U32 => PixelArray::U32($arr.mapv(|v| v as u32)),
            PixelType::I32 => PixelArray::I32($arr.mapv(|v| v as i32)),
            PixelType::F32 => PixelArray::F32($arr.mapv(|v| v as f32)),
            PixelType::F64 => PixelArray::F64($arr.mapv(|v| v as f64)),
        }
    };
}

pub (crate) use with_pixel_array;

impl PixelArray {
    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelArray::U8(_) => PixelType::U8,
            PixelArray::U16(_) => PixelType::U16,
            PixelArray::I16(_) => PixelType::I16,
            PixelArray::U32(_) => PixelType::U32,
            PixelArray::I32(_) => PixelType::I32,
            PixelArray::F32(_) => PixelType::F32,
            PixelArray::F64(_) => PixelType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_pixel_array!(self, arr => arr.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        with_pixel_array!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts to `target`, casting each element numerically
    /// (`as` semantics). Free when the type already matches.
    pub fn into_type(self, target : PixelType) -> PixelArray {
        if self.pixel_type() == target {
            return self;
        }
        with_pixel_array!(&self, arr => cast_array!(arr, target))
    }

    /// Borrows the inner array if it holds elements of type `T`.
    pub fn as_array<T : Pixel>(&self) -> Option<&ArrayD<T>> {
        T::from_pixel_array(self)
    }

    /// Takes the inner array if it holds elements of type `T`.
    pub fn into_array<T : Pixel>(self) -> Option<ArrayD<T>> {
        T::into_typed(self)
    }
}

/// Element types that can live in a `PixelArray`.
pub trait Pixel : Copy + Default + Send + Sync + std::fmt::Debug + 'static {
    const PIXEL_TYPE : PixelType;

    fn from_pixel_array(array : &PixelArray) -> Option<&ArrayD<Self>>;

    fn into_typed(array : PixelArray) -> Option<ArrayD<Self>>;

    fn wrap(array : ArrayD<Self>) -> PixelArray;
}

macro_rules! impl_pixel {
    ($t : ty, $variant : ident) => {
        impl Pixel for $t {
            const PIXEL_TYPE : PixelType = PixelType::$variant;

            fn from_pixel_array(array : &PixelArray) -> Option<&ArrayD<Self>> {
                match array {
                    PixelArray::$variant(arr) => Some(arr),
                    _ => None,
                }
            }

            fn into_typed(array : PixelArray) -> Option<ArrayD<Self>> {
                match array {
                    PixelArray::$variant(arr) => Some(arr),
                    _ => None,
                }
            }

            fn wrap(array : ArrayD<Self>) -> PixelArray {
                PixelArray::$variant(array)
            }
        }

        impl From<ArrayD<$t>> for PixelArray {
            fn from(array : ArrayD<$t>) -> Self {
                PixelArray::$variant(array)
            }
        }

        impl From<Array2<$t>> for PixelArray {
            fn from(array : Array2<$t>) -> Self {
                PixelArray::$variant(array.into_dyn())
            }
        }

        impl From<Array3<$t>> for PixelArray {
            fn from(array : Array3<$t>) -> Self {
                PixelArray::$variant(array.into_dyn())
            }
        }
    };
}

impl_pixel!(u8, U8);
impl_pixel!(u16, U16);
impl_pixel!(i16, I16);
impl_pixel!(u32, U32);
impl_pixel!(i32, I32);
impl_pixel!(f32, F32);
impl_pixel!(f64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_converts_values_and_type() {
        let plane : PixelArray = array![[1u16, 2], [300, 4]].into();
        let cast = plane.clone().into_type(PixelType::F32);
        assert_eq!(cast.pixel_type(), PixelType::F32);
        assert_eq!(
            cast.as_array::<f32>().unwrap(),
            &array![[1.0f32, 2.0], [300.0, 4.0]].into_dyn()
        );

        // Narrowing follows `as` semantics
        let narrowed = plane.into_type(PixelType::U8);
        assert_eq!(narrowed.as_array::<u8>().unwrap()[[1, 0]], 300u16 as u8);
    }

    #[test]
    fn same_type_cast_is_identity() {
        let plane : PixelArray = array![[5i16, -5]].into();
        assert_eq!(plane.clone().into_type(PixelType::I16), plane);
    }

    #[test]
    fn parse_pixel_type_names() {
        assert_eq!(PixelType::from_string_slice("uint16"), Some(PixelType::U16));
        assert_eq!(PixelType::from_string_slice("F32"), Some(PixelType::F32));
        assert_eq!(PixelType::from_string_slice("complex"), None);
        assert_eq!(PixelType::U16.to_string(), "uint16");
        assert_eq!(PixelType::F64.byte_size(), 8);
    }
}
