//! Backends: plane sources that know how to discover their
//! own axes, and the registry that picks one for a path.
//!
//! Each backend is registered under a name with the file
//! extensions it handles, whether it opens directories, a
//! priority, and a capability check. Checks run once, when
//! the backend is registered; backends whose check fails are
//! kept (so they show up in listings) but never chosen.

pub mod image_sequence;
pub mod raw_stack;
pub mod runtime;

use std::path::Path;

use crate::options::OpenOptions;
use crate::sequence::FramesSequenceND;
use crate::source::Backend;
use crate::utils::{FramesError, FramesResult};

use image_sequence::{is_readable_extension, ImageSequenceND};
use raw_stack::RawStack;

/// A boxed backend that can be shared across threads
pub type DynBackend = Box<dyn Backend + Send + Sync>;

/// Constructs a backend for a path
pub type OpenFn = fn(&Path, &OpenOptions) -> FramesResult<DynBackend>;

/// Reports whether a backend can work in this build/environment
pub type CapabilityFn = fn() -> bool;

/// Extensions the image sequence backend claims if the
/// `image` crate can decode them
const IMAGE_EXTENSIONS : [&str; 10] = [
    "png", "tif", "tiff", "jpg", "jpeg", "bmp", "gif", "webp", "pnm", "tga",
];

const RAW_EXTENSIONS : [&str; 3] = ["raw", "bin", "dat"];

/// One registered backend
pub struct BackendEntry {
    pub name : String,
    pub extensions : Vec<String>,
    pub directories : bool,
    pub priority : i32,
    available : bool,
    open : OpenFn,
}

impl BackendEntry {
    /// Result of the capability check
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn handles(&self, path : &Path) -> bool {
        if path.is_dir() {
            return self.directories;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl std::fmt::Debug for BackendEntry {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BackendEntry")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("directories", &self.directories)
            .field("priority", &self.priority)
            .field("available", &self.available)
            .finish()
    }
}

/// Named backend constructors, resolved by path.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    entries : Vec<BackendEntry>,
}

fn open_image_sequence(path : &Path, options : &OpenOptions) -> FramesResult<DynBackend> {
    let sequence = if path.is_dir() {
        ImageSequenceND::from_dir(path, options.extension.as_deref(), &options.dim_identifiers)?
    } else {
        ImageSequenceND::from_paths(vec![path.to_path_buf()], &options.dim_identifiers)?
    };
    Ok(Box::new(sequence))
}

fn open_raw_stack(path : &Path, options : &OpenOptions) -> FramesResult<DynBackend> {
    let layout = options.raw_layout.clone()
        .ok_or_else(|| FramesError::discovery("raw stacks need a RawLayout in the open options"))?;
    Ok(Box::new(RawStack::open(path, layout)?))
}

fn image_available() -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| is_readable_extension(ext))
}

fn always() -> bool {
    true
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        BackendRegistry { entries : Vec::new() }
    }

    /// The image sequence and raw stack backends
    pub fn with_defaults() -> Self {
        let mut registry = BackendRegistry::new();
        let image_extensions : Vec<&str> = IMAGE_EXTENSIONS.iter()
            .copied()
            .filter(|ext| is_readable_extension(ext))
            .collect();
        registry.register("image_sequence", &image_extensions, true, 10, image_available, open_image_sequence);
        registry.register("raw_stack", &RAW_EXTENSIONS, false, 0, always, open_raw_stack);
        registry
    }

    /// Adds a backend, running its capability check now.
    ///
    /// ## Arguments
    ///
    /// * `name` - Used by `OpenOptions::backend` and in logs
    /// * `extensions` - File extensions it opens, without the dot
    /// * `directories` - Whether it opens directories
    /// * `priority` - Higher wins when several backends match
    /// * `check` - Capability check, evaluated once
    /// * `open` - Constructor
    pub fn register(
        &mut self,
        name : &str,
        extensions : &[&str],
        directories : bool,
        priority : i32,
        check : CapabilityFn,
        open : OpenFn,
    ) {
        let available = check();
        if !available {
            tracing::debug!(backend = name, "backend unavailable");
        }
        self.entries.push(BackendEntry {
            name : name.to_string(),
            extensions : extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            directories,
            priority,
            available,
            open,
        });
    }

    pub fn entries(&self) -> &[BackendEntry] {
        &self.entries
    }

    /// Names of the backends whose capability check succeeded
    pub fn available(&self) -> Vec<&str> {
        self.entries.iter()
            .filter(|e| e.available)
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Picks the backend for `path`: the one named in
    /// `options.backend` if set, otherwise the highest-priority
    /// available backend that handles the path (earliest
    /// registered on ties).
    pub fn resolve(&self, path : &Path, options : &OpenOptions) -> FramesResult<&BackendEntry> {
        let mut best : Option<&BackendEntry> = None;
        for entry in self.entries.iter().filter(|e| e.available) {
            let matches = match &options.backend {
                Some(name) => &entry.name == name,
                None => entry.handles(path),
            };
            if matches && best.map_or(true, |b| entry.priority > b.priority) {
                best = Some(entry);
            }
        }
        best.ok_or_else(|| FramesError::NoBackend(path.to_path_buf()))
    }

    /// Resolves a backend for `path`, opens it, and wraps it in
    /// a sequence configured by `options`.
    pub fn open<P : AsRef<Path>>(
        &self,
        path : P,
        options : &OpenOptions,
    ) -> FramesResult<FramesSequenceND<DynBackend>> {
        let path = path.as_ref();
        let entry = self.resolve(path, options)?;
        tracing::info!(path = %path.display(), backend = %entry.name, "opening");

        let backend = (entry.open)(path, options)?;
        let mut frames = FramesSequenceND::open(backend)?;
        frames.set_pixel_type(options.pixel_type);
        frames.set_chunk_size(options.chunk_size);
        frames.set_parallel(options.parallel);
        Ok(frames)
    }
}
