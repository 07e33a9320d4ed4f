//! Class hierarchy lookups used when climbing for inherited members.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek, Write};
use std::sync::Mutex;

use dashmap::DashMap;
use zip::ZipArchive;

use crate::classfile::ClassHeader;
use crate::utils::strip_comment;

/// Supplies the direct parents of a class.
///
/// Parents are the superclass first, then the interfaces in declaration order.
/// `None` means the provider knows nothing about the class.
pub trait InheritanceProvider: Send + Sync {
    /// Returns the direct parents of `class`.
    fn parents(&self, class: &str) -> Option<Vec<String>>;
}

/// A provider over an explicit table of class headers.
#[derive(Clone, Debug, Default)]
pub struct StaticProvider {
    parents: HashMap<String, Vec<String>>,
}

impl StaticProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the parents of `class`.
    pub fn insert(&mut self, class: impl Into<String>, parents: Vec<String>) {
        self.parents.insert(class.into(), parents);
    }

    /// Records a decoded class header.
    pub fn insert_header(&mut self, header: &ClassHeader) {
        self.parents.insert(header.name.clone(), header.parents());
    }

    /// Number of known classes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether no class is known.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl InheritanceProvider for StaticProvider {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        self.parents.get(class).cloned()
    }
}

/// Reads class headers on demand from a jar, such as a library on the class path.
pub struct ClassPathProvider<R> {
    archive: Mutex<ZipArchive<R>>,
}

impl<R: Read + Seek> ClassPathProvider<R> {
    /// Opens the archive.
    pub fn new(reader: R) -> zip::result::ZipResult<Self> {
        Ok(Self {
            archive: Mutex::new(ZipArchive::new(reader)?),
        })
    }
}

impl<R> fmt::Debug for ClassPathProvider<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassPathProvider").finish_non_exhaustive()
    }
}

impl<R: Read + Seek + Send> InheritanceProvider for ClassPathProvider<R> {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        let mut archive = self.archive.lock().ok()?;
        let mut entry = archive.by_name(&format!("{class}.class")).ok()?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).ok()?;
        match ClassHeader::parse(&data) {
            Ok(header) => Some(header.parents()),
            Err(err) => {
                log::warn!("Unreadable class {class} on class path: {err}");
                None
            }
        }
    }
}

/// Asks each provider in turn, the first answer wins.
#[derive(Default)]
pub struct JointProvider {
    providers: Vec<Box<dyn InheritanceProvider>>,
}

impl JointProvider {
    /// Creates a provider with no delegates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a delegate.
    pub fn add(&mut self, provider: impl InheritanceProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

impl fmt::Debug for JointProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JointProvider")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl InheritanceProvider for JointProvider {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        self.providers.iter().find_map(|p| p.parents(class))
    }
}

/// A memoizing cache of class parents in front of an optional provider.
///
/// A class is asked from the provider at most once; an unknown class is cached
/// with no parents. Concurrent first lookups of the same class may both reach
/// the provider, which is harmless since they store equal values.
#[derive(Default)]
pub struct InheritanceMap {
    parents: DashMap<String, Vec<String>>,
    provider: Option<Box<dyn InheritanceProvider>>,
}

impl fmt::Debug for InheritanceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InheritanceMap")
            .field("classes", &self.parents.len())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl InheritanceMap {
    /// Creates an empty map without a fallback provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map that fills itself from `provider`.
    pub fn with_provider(provider: impl InheritanceProvider + 'static) -> Self {
        Self {
            parents: DashMap::new(),
            provider: Some(Box::new(provider)),
        }
    }

    /// Whether `class` already has a cached entry.
    pub fn has_parents(&self, class: &str) -> bool {
        self.parents.contains_key(class)
    }

    /// Caches the parents of `class`.
    pub fn set_parents(&self, class: impl Into<String>, parents: Vec<String>) {
        self.parents.insert(class.into(), parents);
    }

    /// Returns the parents of `class`, asking the provider on the first miss.
    pub fn parents(&self, class: &str) -> Vec<String> {
        if let Some(parents) = self.parents.get(class) {
            return parents.clone();
        }
        let parents = self
            .provider
            .as_ref()
            .and_then(|p| p.parents(class))
            .unwrap_or_default();
        self.parents.insert(class.to_owned(), parents.clone());
        parents
    }

    /// Number of cached classes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Adds the entries of a saved map, one `class parent...` line per class.
    pub fn load(&self, source: &str) {
        for line in source.lines().map(strip_comment) {
            let mut tokens = line.split_whitespace();
            let Some(class) = tokens.next() else {
                continue;
            };
            self.set_parents(class, tokens.map(str::to_owned).collect());
        }
    }

    /// Writes the cached entries sorted by class, in the form [`load`](Self::load) reads.
    ///
    /// Classes without parents are omitted.
    pub fn save<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut entries: Vec<(String, Vec<String>)> = self
            .parents
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort();
        for (class, parents) in entries {
            writeln!(out, "{} {}", class, parents.join(" "))?;
        }
        Ok(())
    }
}

impl InheritanceProvider for InheritanceMap {
    fn parents(&self, class: &str) -> Option<Vec<String>> {
        Some(InheritanceMap::parents(self, class))
    }
}
