//! Metadata carried alongside planes and frames.
//!
//! Plane sources report a flat `PlaneMetadata` map of scalar
//! values for every plane they read. Backends that can ask a
//! reader for many optional fields (positions, timestamps,
//! file attributes...) describe them with a `MetadataTable`:
//! a table of named fallible accessors, detected once when the
//! backend is opened, so that only the fields the reader
//! actually supports are ever queried.

use std::collections::BTreeMap;
use std::fmt;

/// A single scalar metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value : i64) -> Self { MetadataValue::Int(value) }
}

impl From<usize> for MetadataValue {
    fn from(value : usize) -> Self { MetadataValue::Int(value as i64) }
}

impl From<f64> for MetadataValue {
    fn from(value : f64) -> Self { MetadataValue::Float(value) }
}

impl From<&str> for MetadataValue {
    fn from(value : &str) -> Self { MetadataValue::Text(value.to_string()) }
}

impl From<String> for MetadataValue {
    fn from(value : String) -> Self { MetadataValue::Text(value) }
}

/// Metadata reported by a plane source for one plane.
pub type PlaneMetadata = BTreeMap<String, MetadataValue>;

/// A fallible accessor for one metadata field.
pub type Accessor<T> = Box<dyn Fn(&T) -> anyhow::Result<MetadataValue> + Send + Sync>;

/// An explicit capability table: field name -> accessor.
///
/// Candidates are registered with `MetadataTable::detect`, which
/// calls each one against a sample context and keeps only
/// those that succeed. Afterwards fields are looked up by
/// presence (`has`) instead of trying and failing at read time.
///
/// ## Example
///
/// ```rust, ignore
/// let table = MetadataTable::detect(&sample, vec![
///     ("filename", Box::new(|p : &PathBuf| Ok(p.display().to_string().into())) as _),
///     ("modified", Box::new(|p : &PathBuf| modified_time(p)) as _),
/// ]);
/// if table.has("modified") { ... }
/// ```
pub struct MetadataTable<T> {
    accessors : BTreeMap<String, Accessor<T>>,
}

impl<T> Default for MetadataTable<T> {
    fn default() -> Self {
        MetadataTable { accessors : BTreeMap::new() }
    }
}

impl<T> MetadataTable<T> {
    /// Builds the table by calling every candidate accessor
    /// on `sample`. Accessors that fail are dropped.
    pub fn detect<N>(sample : &T, candidates : Vec<(N, Accessor<T>)>) -> Self
    where N : Into<String> {
        let mut accessors = BTreeMap::new();
        for (name, accessor) in candidates {
            let name = name.into();
            match accessor(sample) {
                Ok(_) => { accessors.insert(name, accessor); },
                Err(err) => {
                    tracing::debug!(field = %name, error = %err, "metadata field unsupported");
                },
            }
        }
        MetadataTable { accessors }
    }

    /// Whether the field survived probing
    pub fn has(&self, field : &str) -> bool {
        self.accessors.contains_key(field)
    }

    /// Names of all supported fields, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    /// Evaluates one field. `None` if the field is not supported.
    pub fn get(&self, field : &str, context : &T) -> Option<anyhow::Result<MetadataValue>> {
        self.accessors.get(field).map(|accessor| accessor(context))
    }

    /// Evaluates every supported field, skipping any that
    /// fail for this particular context.
    pub fn collect(&self, context : &T) -> PlaneMetadata {
        self.accessors.iter()
            .filter_map(|(name, accessor)| {
                accessor(context).ok().map(|value| (name.clone(), value))
            })
            .collect()
    }
}

impl<T> fmt::Debug for MetadataTable<T> {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MetadataTable")
            .field("fields", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}
