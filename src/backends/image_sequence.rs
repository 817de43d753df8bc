//! A directory (or explicit list) of image files whose names
//! carry their coordinates, e.g. `cells_t001z05c2.png`.
//!
//! Every file is one plane. For each dimension identifier
//! (`t`, `z`, `c` by default) the number following it in the
//! file name is that file's index on the axis. Identifiers
//! that never appear, or are always 0, do not become axes;
//! the others are shifted so their smallest index is 0.
//!
//! Files with no identifiers at all are treated as a plain
//! sequence along a single `file` axis, in natural order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use image::{DynamicImage, ImageFormat};
use ndarray::prelude::*;

use crate::data::axes::is_spatial;
use crate::data::pixel::PixelArray;
use crate::metadata::{Accessor, MetadataTable, MetadataValue, PlaneMetadata};
use crate::source::{Backend, Coords, PlaneSource};
use crate::utils::natural_sort::natural_cmp;
use crate::utils::{ConfigurationError, FramesError, FramesResult};

/// Identifiers used when none are given
pub const DEFAULT_IDENTIFIERS : [&str; 3] = ["t", "z", "c"];

/// Axis for sequences whose file names carry no identifiers
pub const FILE_AXIS : &str = "file";

/// Reads one image file into a `(y, x)` or `(y, x, samples)` array.
pub type ImageReader = Arc<dyn Fn(&Path) -> anyhow::Result<PixelArray> + Send + Sync>;

/// Finds the index following each identifier in `filename`.
///
/// Scans left to right for any identifier immediately
/// followed by digits. If there are more such matches than
/// identifiers, only the last `identifiers.len()` count. An
/// identifier that does not appear gets 0.
///
/// ## Example
///
/// ```
/// use ndframes::backends::image_sequence::filename_to_indices;
/// assert_eq!(filename_to_indices("file_t001c05z32.png", &["t", "z", "c"]), vec![1, 32, 5]);
/// assert_eq!(filename_to_indices("img_t3.png", &["t", "z", "c"]), vec![3, 0, 0]);
/// ```
pub fn filename_to_indices<S : AsRef<str>>(filename : &str, identifiers : &[S]) -> Vec<usize> {
    let bytes = filename.as_bytes();
    let mut found : Vec<(usize, usize)> = Vec::new();

    let mut pos = 0;
    while pos < bytes.len() {
        let matched = identifiers.iter().enumerate().find_map(|(n, id)| {
            let id = id.as_ref().as_bytes();
            if id.is_empty() || !bytes[pos..].starts_with(id) {
                return None;
            }
            let digits = bytes[pos + id.len()..].iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            (digits > 0).then_some((n, id.len(), digits))
        });

        match matched {
            Some((n, id_len, digits)) => {
                let start = pos + id_len;
                let value = filename[start..start + digits].parse::<usize>().unwrap_or(0);
                found.push((n, value));
                pos = start + digits;
            },
            None => pos += 1,
        }
    }

    if found.len() > identifiers.len() {
        found.drain(..found.len() - identifiers.len());
    }

    (0..identifiers.len())
        .map(|n| found.iter().find(|(id, _)| *id == n).map_or(0, |(_, v)| *v))
        .collect()
}

/// Whether the `image` crate can decode files with this extension.
pub fn is_readable_extension(extension : &str) -> bool {
    ImageFormat::from_extension(extension)
        .map_or(false, |format| format.reading_enabled())
}

/// Converts a decoded image into a pixel array without
/// changing its sample type. Single-channel images become
/// `(y, x)`, the rest `(y, x, samples)`.
fn dynamic_to_pixel_array(image : DynamicImage) -> anyhow::Result<PixelArray> {
    let (h, w) = (image.height() as usize, image.width() as usize);
    let array = match image {
        DynamicImage::ImageLuma8(img) => Array::from_shape_vec((h, w), img.into_raw())?.into(),
        DynamicImage::ImageLumaA8(img) => Array::from_shape_vec((h, w, 2), img.into_raw())?.into(),
        DynamicImage::ImageRgb8(img) => Array::from_shape_vec((h, w, 3), img.into_raw())?.into(),
        DynamicImage::ImageRgba8(img) => Array::from_shape_vec((h, w, 4), img.into_raw())?.into(),
        DynamicImage::ImageLuma16(img) => Array::from_shape_vec((h, w), img.into_raw())?.into(),
        DynamicImage::ImageLumaA16(img) => Array::from_shape_vec((h, w, 2), img.into_raw())?.into(),
        DynamicImage::ImageRgb16(img) => Array::from_shape_vec((h, w, 3), img.into_raw())?.into(),
        DynamicImage::ImageRgba16(img) => Array::from_shape_vec((h, w, 4), img.into_raw())?.into(),
        DynamicImage::ImageRgb32F(img) => Array::from_shape_vec((h, w, 3), img.into_raw())?.into(),
        DynamicImage::ImageRgba32F(img) => Array::from_shape_vec((h, w, 4), img.into_raw())?.into(),
        other => Array::from_shape_vec((h, w, 4), other.into_rgba32f().into_raw())?.into(),
    };
    Ok(array)
}

/// The default reader: decodes with the `image` crate.
pub fn read_image(path : &Path) -> anyhow::Result<PixelArray> {
    let image = image::open(path)
        .map_err(|err| anyhow::anyhow!("could not decode {:?}: {}", path, err))?;
    dynamic_to_pixel_array(image)
}

fn metadata_candidates() -> Vec<(&'static str, Accessor<PathBuf>)> {
    vec![
        ("filename", Box::new(|path : &PathBuf| -> anyhow::Result<MetadataValue> {
            let name = path.file_name()
                .ok_or_else(|| anyhow::anyhow!("no file name"))?;
            Ok(name.to_string_lossy().into_owned().into())
        }) as Accessor<PathBuf>),
        ("file_size", Box::new(|path : &PathBuf| -> anyhow::Result<MetadataValue> {
            Ok(MetadataValue::Int(i64::try_from(std::fs::metadata(path)?.len())?))
        }) as Accessor<PathBuf>),
        ("modified", Box::new(|path : &PathBuf| -> anyhow::Result<MetadataValue> {
            let modified = std::fs::metadata(path)?.modified()?;
            Ok(MetadataValue::Float(modified.duration_since(UNIX_EPOCH)?.as_secs_f64()))
        }) as Accessor<PathBuf>),
    ]
}

/// Image files addressed by the indices in their names.
pub struct ImageSequenceND {
    name : String,
    files : Vec<PathBuf>,
    axes : Vec<(String, usize)>,
    /// Coordinates (in `axes` order) -> index into `files`
    lookup : HashMap<Vec<usize>, usize>,
    reader : ImageReader,
    metadata : MetadataTable<PathBuf>,
}

impl ImageSequenceND {
    /// Opens every readable image in `dir` (optionally only
    /// those with `extension`), in natural order.
    pub fn from_dir<P : AsRef<Path>, S : AsRef<str>>(
        dir : P,
        extension : Option<&str>,
        identifiers : &[S],
    ) -> FramesResult<Self> {
        let dir = dir.as_ref();
        let mut files : Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                match extension {
                    Some(wanted) => ext.eq_ignore_ascii_case(wanted.trim_start_matches('.')),
                    None => is_readable_extension(ext),
                }
            })
            .collect();
        files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

        if extension.is_none() {
            tracing::warn!(
                dir = %dir.display(),
                files = files.len(),
                "loading every image file in the directory; pass an extension to be stricter"
            );
        }
        let mut sequence = Self::from_paths(files, identifiers)?;
        sequence.name = dir.display().to_string();
        Ok(sequence)
    }

    /// Opens an explicit list of files.
    ///
    /// ## Errors
    ///
    /// * `FramesError::Discovery` if `files` is empty or two
    /// files map to the same coordinates
    /// * `FramesError::Configuration` for identifiers that are
    /// empty or name a spatial axis
    pub fn from_paths<S : AsRef<str>>(files : Vec<PathBuf>, identifiers : &[S]) -> FramesResult<Self> {
        for id in identifiers {
            let id = id.as_ref();
            if id.is_empty() {
                return Err(ConfigurationError::EmptyAxisName.into());
            }
            if is_spatial(id) {
                return Err(ConfigurationError::ReservedAxis(id.to_string()).into());
            }
        }
        if files.is_empty() {
            return Err(FramesError::discovery("no image files found"));
        }

        let toc : Vec<Vec<usize>> = files.iter()
            .map(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                filename_to_indices(&name, identifiers)
            })
            .collect();

        // keep only columns that vary, shifted to start at 0
        let mut axes = Vec::new();
        let mut columns : Vec<Vec<usize>> = Vec::new();
        for (n, id) in identifiers.iter().enumerate() {
            let column : Vec<usize> = toc.iter().map(|row| row[n]).collect();
            if column.iter().all(|&v| v == 0) {
                continue;
            }
            let min = column.iter().copied().min().unwrap_or(0);
            let column : Vec<usize> = column.into_iter().map(|v| v - min).collect();
            let size = column.iter().copied().max().unwrap_or(0) + 1;
            axes.push((id.as_ref().to_string(), size));
            columns.push(column);
        }
        if axes.is_empty() && files.len() > 1 {
            axes.push((FILE_AXIS.to_string(), files.len()));
            columns.push((0..files.len()).collect());
        }

        let mut lookup = HashMap::with_capacity(files.len());
        for i in 0..files.len() {
            let key : Vec<usize> = columns.iter().map(|c| c[i]).collect();
            if let Some(previous) = lookup.insert(key, i) {
                return Err(FramesError::discovery(format!(
                    "{:?} and {:?} have the same indices",
                    files[previous], files[i]
                )));
            }
        }
        let expected : usize = axes.iter().map(|(_, s)| *s).product();
        if lookup.len() < expected {
            tracing::warn!(
                files = lookup.len(),
                expected,
                "image sequence is sparse; missing planes will fail to read"
            );
        }

        let metadata = MetadataTable::detect(&files[0], metadata_candidates());
        tracing::debug!(files = files.len(), ?axes, ?metadata, "indexed image sequence");

        Ok(ImageSequenceND {
            name : "(list of images)".to_string(),
            files,
            axes,
            lookup,
            reader : Arc::new(read_image),
            metadata,
        })
    }

    /// Replaces the image decoder, e.g. for a format the
    /// `image` crate does not read.
    pub fn with_reader(mut self, reader : ImageReader) -> Self {
        self.reader = reader;
        self
    }

    /// Files in natural order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The file holding the plane at `coords`
    pub fn file_for(&self, coords : &Coords) -> anyhow::Result<&Path> {
        let key = self.axes.iter()
            .map(|(axis, _)| coords.get(axis).copied()
                .ok_or_else(|| anyhow::anyhow!("missing coordinate for axis '{}'", axis)))
            .collect::<anyhow::Result<Vec<usize>>>()?;
        let i = self.lookup.get(&key)
            .ok_or_else(|| anyhow::anyhow!("no file for coordinates {:?}", coords))?;
        Ok(self.files[*i].as_path())
    }
}

impl PlaneSource for ImageSequenceND {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        let path = self.file_for(coords)?;
        let plane = (self.reader)(path)?;
        Ok((plane, self.metadata.collect(&path.to_path_buf())))
    }
}

impl Backend for ImageSequenceND {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>> {
        Ok(self.axes.clone())
    }

    /// Iterate over `t` (or `file`) if present
    fn default_iter_axes(&self) -> Vec<String> {
        ["t", FILE_AXIS].iter()
            .filter(|a| self.axes.iter().any(|(name, _)| name == *a))
            .map(|a| a.to_string())
            .collect()
    }

    /// Return z-stacks if there is a `z`
    fn default_bundle_axes(&self) -> Vec<String> {
        self.axes.iter()
            .filter(|(name, _)| name == "z")
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The first file's coordinates; a sparse grid may have
    /// no file at the origin.
    fn first_plane_coords(&self, axes : &[String]) -> Coords {
        let first = self.lookup.iter().find(|(_, &i)| i == 0).map(|(key, _)| key);
        axes.iter().map(|axis| {
            let index = first
                .and_then(|key| {
                    self.axes.iter().position(|(name, _)| name == axis).map(|n| key[n])
                })
                .unwrap_or(0);
            (axis.clone(), index)
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::coords;

    #[test]
    fn parses_identifiers_in_any_order() {
        let ids = DEFAULT_IDENTIFIERS;
        assert_eq!(filename_to_indices("file_t001c05z32.tif", &ids), vec![1, 32, 5]);
        assert_eq!(filename_to_indices("z2_t7.png", &ids), vec![7, 2, 0]);
        assert_eq!(filename_to_indices("plain.png", &ids), vec![0, 0, 0]);
        // identifiers without digits are ignored
        assert_eq!(filename_to_indices("cat_t4.png", &ids), vec![4, 0, 0]);
    }

    #[test]
    fn keeps_only_the_last_matches() {
        let ids = DEFAULT_IDENTIFIERS;
        // "c1" in the prefix is dropped: four matches, three identifiers
        assert_eq!(filename_to_indices("c1_t2z3c4.png", &ids), vec![2, 3, 4]);
        assert_eq!(filename_to_indices("exp_t10", &["exp", "t"]), vec![0, 10]);
    }

    #[test]
    fn multi_character_identifiers() {
        assert_eq!(filename_to_indices("pos12_time003.png", &["pos", "time"]), vec![12, 3]);
    }

    fn paths(names : &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn builds_axes_from_filenames() {
        let files = paths(&[
            "a_t1z1.png", "a_t1z2.png", "a_t2z1.png", "a_t2z2.png", "a_t3z1.png", "a_t3z2.png",
        ]);
        let seq = ImageSequenceND::from_paths(files, &DEFAULT_IDENTIFIERS).unwrap();
        assert_eq!(
            seq.discover_axes().unwrap(),
            vec![("t".to_string(), 3), ("z".to_string(), 2)]
        );
        assert_eq!(seq.default_iter_axes(), vec!["t".to_string()]);
        assert_eq!(seq.default_bundle_axes(), vec!["z".to_string()]);
        assert_eq!(
            seq.file_for(&coords(&[("t", 2), ("z", 0)])).unwrap(),
            Path::new("a_t3z1.png")
        );
        assert!(seq.file_for(&coords(&[("t", 2)])).is_err());
    }

    #[test]
    fn unnumbered_files_become_a_file_axis() {
        let seq = ImageSequenceND::from_paths(paths(&["a.png", "b.png"]), &DEFAULT_IDENTIFIERS).unwrap();
        assert_eq!(seq.discover_axes().unwrap(), vec![(FILE_AXIS.to_string(), 2)]);
        assert_eq!(seq.default_iter_axes(), vec![FILE_AXIS.to_string()]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ImageSequenceND::from_paths(paths(&["a_t1.png"]), &["t", "y"]),
            Err(FramesError::Configuration(ConfigurationError::ReservedAxis(_)))
        ));
        assert!(matches!(
            ImageSequenceND::from_paths(Vec::new(), &DEFAULT_IDENTIFIERS),
            Err(FramesError::Discovery(_))
        ));
        assert!(matches!(
            ImageSequenceND::from_paths(paths(&["a_t1.png", "b_t1.png", "c_t2.png"]), &DEFAULT_IDENTIFIERS),
            Err(FramesError::Discovery(_))
        ));
    }

    #[test]
    fn custom_reader_and_metadata() {
        let seq = ImageSequenceND::from_paths(paths(&["x_t0.raw", "x_t1.raw"]), &DEFAULT_IDENTIFIERS)
            .unwrap()
            .with_reader(Arc::new(|path : &Path| -> anyhow::Result<PixelArray> {
                let t = filename_to_indices(&path.to_string_lossy(), &["t"])[0];
                Ok(Array2::<u8>::from_elem((2, 2), t as u8).into())
            }));
        // the files do not exist, so only the name survives probing
        let (plane, md) = seq.read_plane(&coords(&[("t", 1)])).unwrap();
        assert_eq!(plane.as_array::<u8>().unwrap()[[1, 1]], 1);
        assert_eq!(md.get("filename"), Some(&MetadataValue::Text("x_t1.raw".to_string())));
        assert!(md.get("file_size").is_none());
    }

    #[test]
    fn sparse_grid_opens_at_its_first_file() {
        // no file at (t, z) = (0, 0) after shifting
        let files = paths(&["a_t1z2.png", "a_t2z1.png", "a_t2z2.png"]);
        let seq = ImageSequenceND::from_paths(files, &DEFAULT_IDENTIFIERS)
            .unwrap()
            .with_reader(Arc::new(|path : &Path| -> anyhow::Result<PixelArray> {
                let idx = filename_to_indices(&path.to_string_lossy(), &["t", "z"]);
                Ok(Array2::<u8>::from_elem((3, 2), (10 * idx[0] + idx[1]) as u8).into())
            }));
        let axes = vec!["t".to_string(), "z".to_string()];
        assert_eq!(seq.first_plane_coords(&axes), coords(&[("t", 0), ("z", 1)]));

        let mut frames = crate::FramesSequenceND::open(seq).unwrap();
        assert_eq!(frames.frame_shape(), vec![2, 3, 2]);
        let frame = frames.get_frame(1).unwrap();
        assert_eq!(frame.as_array::<u8>().unwrap()[[0, 0, 0]], 21);

        // the hole only fails when it is read
        assert!(matches!(frames.get_frame(0), Err(FramesError::Read { .. })));
        frames.set_bundle_axes::<&str>(&[]).unwrap();
        frames.set_default_coord("z", 1).unwrap();
        assert_eq!(frames.get_frame(0).unwrap().as_array::<u8>().unwrap()[[0, 0]], 12);
    }

    #[test]
    fn decodes_grey_and_rgb() {
        let grey = image::GrayImage::from_fn(3, 2, |x, y| image::Luma([(10 * y + x) as u8]));
        let grey = dynamic_to_pixel_array(DynamicImage::ImageLuma8(grey)).unwrap();
        assert_eq!(grey.shape(), &[2, 3]);
        assert_eq!(grey.as_array::<u8>().unwrap()[[1, 2]], 12);

        let rgb = image::ImageBuffer::from_fn(2, 2, |x, _| image::Rgb([x as u16, 7, 9]));
        let rgb = dynamic_to_pixel_array(DynamicImage::ImageRgb16(rgb)).unwrap();
        assert_eq!(rgb.shape(), &[2, 2, 3]);
        assert_eq!(rgb.as_array::<u16>().unwrap()[[0, 1, 0]], 1);
    }
}
