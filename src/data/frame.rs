//! `Frame` -- the array returned for one logical index,
//! tagged with where it came from.

use std::collections::BTreeMap;

use crate::data::pixel::{Pixel, PixelArray, PixelType};
use crate::metadata::{MetadataValue, PlaneMetadata};
use crate::source::Coords;

/// One metadata field of an assembled frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataField {
    /// Every contributing plane reported this value
    Scalar(MetadataValue),
    /// Values per plane, in bundle-grid order; `None` where a
    /// plane did not report the field
    PerPlane(Vec<Option<MetadataValue>>),
}

impl MetadataField {
    /// The value if the field collapsed to a scalar
    pub fn scalar(&self) -> Option<&MetadataValue> {
        match self {
            MetadataField::Scalar(v) => Some(v),
            MetadataField::PerPlane(_) => None,
        }
    }

    /// The value contributed by plane `i` of the bundle
    pub fn for_plane(&self, i : usize) -> Option<&MetadataValue> {
        match self {
            MetadataField::Scalar(v) => Some(v),
            MetadataField::PerPlane(values) => values.get(i).and_then(|v| v.as_ref()),
        }
    }
}

pub type FrameMetadata = BTreeMap<String, MetadataField>;

/// Folds per-plane metadata (in bundle-grid order) into one
/// map. A field collapses to a scalar when every plane
/// reported the same value, otherwise it stays per-plane.
pub fn fold_metadata(planes : &[PlaneMetadata]) -> FrameMetadata {
    let mut keys : Vec<&String> = planes.iter().flat_map(|md| md.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter().map(|key| {
        let values : Vec<Option<MetadataValue>> = planes.iter()
            .map(|md| md.get(key).cloned())
            .collect();
        let field = match values.first() {
            Some(Some(first)) if values.iter().all(|v| v.as_ref() == Some(first)) => {
                MetadataField::Scalar(first.clone())
            },
            _ => MetadataField::PerPlane(values),
        };
        (key.clone(), field)
    }).collect()
}

/// An assembled frame: the pixel data, the logical index it
/// was requested with, the coordinates of every non-bundled
/// axis, and the folded plane metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub array : PixelArray,
    pub frame_no : usize,
    pub coords : Coords,
    pub metadata : FrameMetadata,
}

impl Frame {
    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn pixel_type(&self) -> PixelType {
        self.array.pixel_type()
    }

    /// Typed view of the data, `None` if `T` is the wrong type
    pub fn as_array<T : Pixel>(&self) -> Option<&ndarray::ArrayD<T>> {
        self.array.as_array::<T>()
    }

    /// Consumes the frame, returning the typed data
    pub fn into_array<T : Pixel>(self) -> Option<ndarray::ArrayD<T>> {
        self.array.into_array::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_md(pairs : &[(&str, MetadataValue)]) -> PlaneMetadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn constant_fields_collapse() {
        let planes = vec![
            plane_md(&[("series", MetadataValue::Int(0)), ("indexZ", MetadataValue::Int(0))]),
            plane_md(&[("series", MetadataValue::Int(0)), ("indexZ", MetadataValue::Int(1))]),
            plane_md(&[("series", MetadataValue::Int(0)), ("indexZ", MetadataValue::Int(2))]),
        ];
        let folded = fold_metadata(&planes);
        assert_eq!(folded["series"], MetadataField::Scalar(MetadataValue::Int(0)));
        assert_eq!(
            folded["indexZ"],
            MetadataField::PerPlane(vec![
                Some(MetadataValue::Int(0)),
                Some(MetadataValue::Int(1)),
                Some(MetadataValue::Int(2)),
            ])
        );
        assert_eq!(folded["indexZ"].for_plane(2), Some(&MetadataValue::Int(2)));
        assert!(folded["indexZ"].scalar().is_none());
    }

    #[test]
    fn missing_fields_stay_per_plane() {
        let planes = vec![
            plane_md(&[("T", MetadataValue::Float(0.5))]),
            plane_md(&[]),
        ];
        let folded = fold_metadata(&planes);
        assert_eq!(
            folded["T"],
            MetadataField::PerPlane(vec![Some(MetadataValue::Float(0.5)), None])
        );
    }

    #[test]
    fn single_plane_is_all_scalars() {
        let planes = vec![plane_md(&[("filename", "a.png".into())])];
        let folded = fold_metadata(&planes);
        assert_eq!(folded["filename"].scalar(), Some(&MetadataValue::Text("a.png".to_string())));
        assert!(fold_metadata(&[]).is_empty());
    }
}
