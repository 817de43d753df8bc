//! Options for opening a dataset through a `BackendRegistry`.

use crate::backends::image_sequence::DEFAULT_IDENTIFIERS;
use crate::backends::raw_stack::RawLayout;
use crate::data::assemble::DEFAULT_CHUNK_SIZE;
use crate::data::pixel::PixelType;

/// How to open a dataset.
///
/// ## Example
///
/// ```rust, ignore
/// let options = OpenOptions::default()
///     .with_dim_identifiers(&["t", "c"])
///     .with_pixel_type(PixelType::F32)
///     .with_parallel(true);
/// let frames = ndframes::open_with("data/", &options)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    /// Strings preceding the axis indices in image file names
    pub dim_identifiers : Vec<String>,
    /// Cast every frame to this type
    pub pixel_type : Option<PixelType>,
    /// Only open files with this extension (directories)
    pub extension : Option<String>,
    /// Use the backend with this name instead of resolving
    /// one from the path
    pub backend : Option<String>,
    /// Make `get_frame` read the planes of each bundle on the
    /// rayon pool
    pub parallel : bool,
    /// Planes per rayon task when `parallel` is set
    pub chunk_size : usize,
    /// Plane layout, required by the raw stack backend
    pub raw_layout : Option<RawLayout>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            dim_identifiers : DEFAULT_IDENTIFIERS.iter().map(|s| s.to_string()).collect(),
            pixel_type : None,
            extension : None,
            backend : None,
            parallel : false,
            chunk_size : DEFAULT_CHUNK_SIZE,
            raw_layout : None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dim_identifiers<S : AsRef<str>>(mut self, identifiers : &[S]) -> Self {
        self.dim_identifiers = identifiers.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_pixel_type(mut self, pixel_type : PixelType) -> Self {
        self.pixel_type = Some(pixel_type);
        self
    }

    pub fn with_extension(mut self, extension : &str) -> Self {
        self.extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn with_backend(mut self, name : &str) -> Self {
        self.backend = Some(name.to_string());
        self
    }

    pub fn with_parallel(mut self, parallel : bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size : usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_raw_layout(mut self, layout : RawLayout) -> Self {
        self.raw_layout = Some(layout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = OpenOptions::default();
        assert_eq!(options.dim_identifiers, vec!["t", "z", "c"]);
        assert!(!options.parallel);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(options.raw_layout.is_none());
    }

    #[test]
    fn builder() {
        let options = OpenOptions::new()
            .with_extension(".PNG")
            .with_chunk_size(0)
            .with_pixel_type(PixelType::U8)
            .with_dim_identifiers(&["pos", "t"]);
        assert_eq!(options.extension.as_deref(), Some("PNG"));
        assert_eq!(options.chunk_size, 1);
        assert_eq!(options.pixel_type, Some(PixelType::U8));
        assert_eq!(options.dim_identifiers, vec!["pos", "t"]);
    }
}
