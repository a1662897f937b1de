//! Resolved resources and the package attributes stamped onto them.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Package-level manifest attributes consulted by sealing and versioning checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    SpecTitle,
    SpecVersion,
    SpecVendor,
    ImplTitle,
    ImplVersion,
    ImplVendor,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::SpecTitle,
        Attribute::SpecVersion,
        Attribute::SpecVendor,
        Attribute::ImplTitle,
        Attribute::ImplVersion,
        Attribute::ImplVendor,
    ];

    /// Header name in the manifest's main section.
    pub fn manifest_key(self) -> &'static str {
        match self {
            Attribute::SpecTitle => "Specification-Title",
            Attribute::SpecVersion => "Specification-Version",
            Attribute::SpecVendor => "Specification-Vendor",
            Attribute::ImplTitle => "Implementation-Title",
            Attribute::ImplVersion => "Implementation-Version",
            Attribute::ImplVendor => "Implementation-Vendor",
        }
    }

    pub fn from_manifest_key(key: &str) -> Option<Attribute> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.manifest_key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageAttributes(BTreeMap<Attribute, String>);

impl PackageAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: Attribute, value: impl Into<String>) {
        self.0.insert(kind, value.into());
    }

    pub fn get(&self, kind: Attribute) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// One resolved artifact: content plus provenance.
pub trait Resource: fmt::Debug + Send + Sync {
    /// Entry name relative to its root, `/`-separated.
    fn name(&self) -> &str;

    /// Origin URL: the root's base URL followed by the entry name.
    fn url(&self) -> &str;

    fn bytes(&self) -> io::Result<Cow<'_, [u8]>>;

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;

    fn content_length(&self) -> Option<u64>;

    fn attributes(&self) -> &PackageAttributes;

    fn attribute(&self, kind: Attribute) -> Option<&str> {
        self.attributes().get(kind)
    }
}

/// A resource whose bytes are already in memory.
#[derive(Clone)]
pub struct MemoryResource {
    name: String,
    url: String,
    content: Arc<[u8]>,
    attributes: Arc<PackageAttributes>,
}

impl MemoryResource {
    pub fn new(
        base_url: &str,
        name: &str,
        content: impl Into<Arc<[u8]>>,
        attributes: Arc<PackageAttributes>,
    ) -> Self {
        Self {
            name: name.to_string(),
            url: format!("{base_url}{name}"),
            content: content.into(),
            attributes,
        }
    }

    /// Reads the entry fully from `reader`. `size_hint` is the archive's declared length.
    pub fn load(
        base_url: &str,
        name: &str,
        reader: &mut impl Read,
        size_hint: u64,
        attributes: Arc<PackageAttributes>,
    ) -> io::Result<Self> {
        let content = read_declared(reader, size_hint)?;
        Ok(Self::new(base_url, name, content, attributes))
    }

    pub fn content(&self) -> &Arc<[u8]> {
        &self.content
    }
}

/// Upper bound on buffer space reserved up front from a declared entry size.
const PRESIZE_LIMIT: u64 = 1 << 20;

/// Reads `reader` to the end. `declared` comes from the archive header and
/// reserves at most [`PRESIZE_LIMIT`] bytes; anything past that grows with
/// the bytes actually read.
pub(crate) fn read_declared(reader: &mut impl Read, declared: u64) -> io::Result<Vec<u8>> {
    let capacity = usize::try_from(declared.min(PRESIZE_LIMIT)).unwrap_or(0);
    let mut content = Vec::with_capacity(capacity);
    reader.read_to_end(&mut content)?;
    Ok(content)
}

impl fmt::Debug for MemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResource")
            .field("url", &self.url)
            .field("len", &self.content.len())
            .finish()
    }
}

impl Resource for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn bytes(&self) -> io::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(&self.content[..]))
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(&self.content[..])))
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.content.len() as u64)
    }

    fn attributes(&self) -> &PackageAttributes {
        &self.attributes
    }
}

/// A resource in a directory root, read from disk when asked.
#[derive(Debug, Clone)]
pub struct FileResource {
    name: String,
    url: String,
    path: PathBuf,
    len: Option<u64>,
    attributes: Arc<PackageAttributes>,
}

impl FileResource {
    pub fn new(base_url: &str, name: &str, path: PathBuf, len: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            url: format!("{base_url}{name}"),
            path,
            len,
            attributes: Arc::new(PackageAttributes::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn bytes(&self) -> io::Result<Cow<'_, [u8]>> {
        std::fs::read(&self.path).map(Cow::Owned)
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn content_length(&self) -> Option<u64> {
        self.len
    }

    fn attributes(&self) -> &PackageAttributes {
        &self.attributes
    }
}
