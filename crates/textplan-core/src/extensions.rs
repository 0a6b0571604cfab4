//! Extension registry: URIs, functions and user-defined types keyed by anchor.
//!
//! Anchors are dense and 1-based within each table. Registration order is
//! the anchor order, so a registry filled by a fixed traversal is
//! reproducible byte for byte.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Small positive integer standing in for an extension in the plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Anchor(u32);

impl Anchor {
    /// Returns `None` for 0, which the wire format reserves for "absent".
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Zero-based table index. A zero anchor maps past any table.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 as usize).wrapping_sub(1)
    }

    fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

/// A function or type entry: the URI anchor it lives under plus its name.
///
/// Function names use the compound `name:signature` form, e.g. `add:i64_i64`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionName {
    pub uri: Anchor,
    pub name: String,
}

impl ExtensionName {
    /// The part of the name before the signature separator.
    pub fn base_name(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("function anchor {} is not registered", .0.get())]
    DanglingFunction(Anchor),
    #[error("type anchor {} is not registered", .0.get())]
    DanglingType(Anchor),
    #[error("uri anchor {} is not registered", .0.get())]
    DanglingUri(Anchor),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRegistry {
    uris: IndexSet<String>,
    functions: IndexSet<ExtensionName>,
    types: IndexSet<ExtensionName>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty() && self.functions.is_empty() && self.types.is_empty()
    }

    /// Get or assign the anchor for a URI.
    pub fn register_uri(&mut self, uri: &str) -> Anchor {
        if let Some(index) = self.uris.get_index_of(uri) {
            return Anchor::from_index(index);
        }
        let (index, _) = self.uris.insert_full(uri.to_owned());
        Anchor::from_index(index)
    }

    /// Get or assign the anchor for a function, registering its URI first.
    pub fn register_function(&mut self, uri: &str, name: &str) -> Anchor {
        let uri = self.register_uri(uri);
        let (index, _) = self.functions.insert_full(ExtensionName {
            uri,
            name: name.to_owned(),
        });
        Anchor::from_index(index)
    }

    /// Get or assign the anchor for a user-defined type.
    pub fn register_type(&mut self, uri: &str, name: &str) -> Anchor {
        let uri = self.register_uri(uri);
        let (index, _) = self.types.insert_full(ExtensionName {
            uri,
            name: name.to_owned(),
        });
        Anchor::from_index(index)
    }

    /// Appends an entry read from an existing table. Returns `None` when the
    /// entry is already present, since the anchors would no longer be dense.
    pub fn push_uri(&mut self, uri: String) -> Option<Anchor> {
        let (index, is_new) = self.uris.insert_full(uri);
        is_new.then(|| Anchor::from_index(index))
    }

    pub fn push_function(&mut self, entry: ExtensionName) -> Result<Option<Anchor>, AnchorError> {
        self.check_uri(entry.uri)?;
        let (index, is_new) = self.functions.insert_full(entry);
        Ok(is_new.then(|| Anchor::from_index(index)))
    }

    pub fn push_type(&mut self, entry: ExtensionName) -> Result<Option<Anchor>, AnchorError> {
        self.check_uri(entry.uri)?;
        let (index, is_new) = self.types.insert_full(entry);
        Ok(is_new.then(|| Anchor::from_index(index)))
    }

    fn check_uri(&self, uri: Anchor) -> Result<(), AnchorError> {
        if uri.index() < self.uris.len() {
            Ok(())
        } else {
            Err(AnchorError::DanglingUri(uri))
        }
    }

    pub fn uri(&self, anchor: Anchor) -> Option<&str> {
        self.uris.get_index(anchor.index()).map(String::as_str)
    }

    pub fn function(&self, anchor: Anchor) -> Option<&ExtensionName> {
        self.functions.get_index(anchor.index())
    }

    pub fn type_ext(&self, anchor: Anchor) -> Option<&ExtensionName> {
        self.types.get_index(anchor.index())
    }

    pub fn uris(&self) -> impl Iterator<Item = (Anchor, &str)> {
        self.uris
            .iter()
            .enumerate()
            .map(|(i, u)| (Anchor::from_index(i), u.as_str()))
    }

    pub fn functions(&self) -> impl Iterator<Item = (Anchor, &ExtensionName)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (Anchor::from_index(i), f))
    }

    pub fn types(&self) -> impl Iterator<Item = (Anchor, &ExtensionName)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (Anchor::from_index(i), t))
    }

    pub fn uri_count(&self) -> usize {
        self.uris.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Resolves a function anchor to its (URI, name) pair.
    pub fn resolve_function(&self, anchor: Anchor) -> Result<(&str, &str), AnchorError> {
        let entry = self
            .function(anchor)
            .ok_or(AnchorError::DanglingFunction(anchor))?;
        let uri = self
            .uri(entry.uri)
            .ok_or(AnchorError::DanglingUri(entry.uri))?;
        Ok((uri, &entry.name))
    }

    pub fn resolve_type(&self, anchor: Anchor) -> Result<(&str, &str), AnchorError> {
        let entry = self
            .type_ext(anchor)
            .ok_or(AnchorError::DanglingType(anchor))?;
        let uri = self
            .uri(entry.uri)
            .ok_or(AnchorError::DanglingUri(entry.uri))?;
        Ok((uri, &entry.name))
    }
}
