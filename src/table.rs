//! The in-memory symbol table produced by a mapping load.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use dashmap::DashSet;
use indexmap::IndexMap;

use crate::error::{MappingError, MappingErrorKind};
use crate::ownable::{member_key, NodeType, Ownable};
use crate::writer::MappingWriter;

/// One field or method mapping: the member as it is named before and after.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberMapping {
    /// The member under its old owner, name and descriptor.
    pub original: Ownable,
    /// The member under its new owner, name and descriptor.
    pub mapped: Ownable,
}

/// Package, class, field and method renames.
///
/// The table is filled by a [`MappingLoader`](crate::MappingLoader) and is
/// read-only afterwards, except for the record of which entries were consulted.
/// Lookups through [`SymbolResolver`](crate::SymbolResolver) mark entries as
/// used; [`unused`](Self::unused) returns everything that never was.
#[derive(Clone, Debug, Default)]
pub struct MappingTable {
    packages: IndexMap<String, String>,
    classes: HashMap<String, String>,
    class_targets: HashSet<String>,
    fields: HashMap<String, MemberMapping>,
    methods: HashMap<String, MemberMapping>,
    excluded_packages: Vec<String>,
    used_classes: DashSet<String>,
    used_fields: DashSet<String>,
    used_methods: DashSet<String>,
}

impl MappingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the table holds no mappings at all.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.classes.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
    }

    /// Package prefix renames, in the order they were declared.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.packages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Exact class renames, in no particular order.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field mappings, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = &MemberMapping> + '_ {
        self.fields.values()
    }

    /// Method mappings, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &MemberMapping> + '_ {
        self.methods.values()
    }

    /// Number of exact class renames.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of field renames.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of method renames.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Looks up an exact class rename without marking it used.
    pub fn get_class(&self, old: &str) -> Option<&str> {
        self.classes.get(old).map(String::as_str)
    }

    /// Looks up a package prefix rename without marking it used.
    pub fn get_package(&self, old: &str) -> Option<&str> {
        self.packages.get(old).map(String::as_str)
    }

    /// Looks up a field rename declared directly on `owner`, without climbing.
    pub fn get_field(&self, owner: &str, name: &str) -> Option<&str> {
        let key = member_key(NodeType::Field, owner, name, "");
        self.fields.get(&key).map(|m| m.mapped.name.as_str())
    }

    /// Looks up a method rename declared directly on `owner`, without climbing.
    pub fn get_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<&str> {
        let key = member_key(NodeType::Method, owner, name, descriptor);
        self.methods.get(&key).map(|m| m.mapped.name.as_str())
    }

    /// Whether `name` is already the target of some class rename.
    pub fn is_class_target(&self, name: &str) -> bool {
        self.class_targets.contains(name)
    }

    /// Protects a package prefix from renaming.
    ///
    /// Only affects lines loaded after the call.
    pub fn add_excluded_package(&mut self, prefix: &str) {
        log::info!("Protecting Package: {prefix}");
        self.excluded_packages.push(prefix.to_owned());
    }

    /// Whether `class` starts with a protected package prefix.
    pub fn is_excluded(&self, class: &str) -> bool {
        self.excluded_packages
            .iter()
            .any(|prefix| class.starts_with(prefix.as_str()))
    }

    pub(crate) fn excluded_packages(&self) -> &[String] {
        &self.excluded_packages
    }

    pub(crate) fn insert_package(
        &mut self,
        old: String,
        new: String,
        line: &str,
    ) -> Result<(), MappingError> {
        check_conflict(self.packages.get(&old), &old, &new, line)?;
        self.packages.insert(old, new);
        Ok(())
    }

    pub(crate) fn insert_class(
        &mut self,
        old: String,
        new: String,
        line: &str,
    ) -> Result<(), MappingError> {
        check_conflict(self.classes.get(&old), &old, &new, line)?;
        self.class_targets.insert(new.clone());
        self.classes.insert(old, new);
        Ok(())
    }

    pub(crate) fn insert_member(
        &mut self,
        mapping: MemberMapping,
        line: &str,
    ) -> Result<(), MappingError> {
        let key = mapping.original.key();
        let map = match mapping.original.kind {
            NodeType::Field => &mut self.fields,
            NodeType::Method => &mut self.methods,
        };
        check_conflict(
            map.get(&key).map(|m| &m.mapped.name),
            &key,
            &mapping.mapped.name,
            line,
        )?;
        map.insert(key, mapping);
        Ok(())
    }

    pub(crate) fn class_entry(&self, old: &str) -> Option<&str> {
        let mapped = self.classes.get(old)?;
        if !self.used_classes.contains(old) {
            self.used_classes.insert(old.to_owned());
        }
        Some(mapped)
    }

    pub(crate) fn member_entry(&self, kind: NodeType, key: &str) -> Option<&str> {
        let (map, used) = match kind {
            NodeType::Field => (&self.fields, &self.used_fields),
            NodeType::Method => (&self.methods, &self.used_methods),
        };
        let mapping = map.get(key)?;
        if !used.contains(key) {
            used.insert(key.to_owned());
        }
        Some(&mapping.mapped.name)
    }

    /// Returns the classes, fields and methods that were never consulted.
    ///
    /// Package prefixes are not tracked and never appear in the result.
    pub fn unused(&self) -> MappingTable {
        let mut unused = MappingTable::new();
        for (old, new) in &self.classes {
            if !self.used_classes.contains(old) {
                unused.class_targets.insert(new.clone());
                unused.classes.insert(old.clone(), new.clone());
            }
        }
        for (key, mapping) in &self.fields {
            if !self.used_fields.contains(key) {
                unused.fields.insert(key.clone(), mapping.clone());
            }
        }
        for (key, mapping) in &self.methods {
            if !self.used_methods.contains(key) {
                unused.methods.insert(key.clone(), mapping.clone());
            }
        }
        unused
    }

    /// Forgets which entries were consulted so far.
    pub fn reset_usage(&self) {
        self.used_classes.clear();
        self.used_fields.clear();
        self.used_methods.clear();
    }

    /// Writes every mapping in this table with `writer`.
    pub fn write_all<W: Write>(
        &self,
        writer: &dyn MappingWriter,
        out: &mut W,
    ) -> std::io::Result<()> {
        writer.write(self, out)
    }

    /// Writes the entries that were never consulted with `writer`.
    pub fn write_unused<W: Write>(
        &self,
        writer: &dyn MappingWriter,
        out: &mut W,
    ) -> std::io::Result<()> {
        writer.write(&self.unused(), out)
    }
}

fn check_conflict(
    existing: Option<&String>,
    old: &str,
    new: &str,
    line: &str,
) -> Result<(), MappingError> {
    match existing {
        Some(existing) if existing != new => Err(MappingError::new(
            MappingErrorKind::Conflict,
            line,
        )
        .with_detail(format!(
            "{old} -> {new} but already mapped to {existing}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(owner: &str, name: &str, new: &str) -> MemberMapping {
        MemberMapping {
            original: Ownable::method(owner, name, "()V"),
            mapped: Ownable::method(owner, new, "()V"),
        }
    }

    #[test]
    fn conflicting_class_is_rejected() {
        let mut table = MappingTable::new();
        table
            .insert_class("a/B".into(), "x/Y".into(), "CL: a/B x/Y")
            .unwrap();
        table
            .insert_class("a/B".into(), "x/Y".into(), "CL: a/B x/Y")
            .unwrap();
        let err = table
            .insert_class("a/B".into(), "x/Z".into(), "CL: a/B x/Z")
            .unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Conflict);
        assert_eq!(table.get_class("a/B"), Some("x/Y"));
    }

    #[test]
    fn unused_is_declared_minus_consumed() {
        let mut table = MappingTable::new();
        table.insert_class("a".into(), "x/A".into(), "").unwrap();
        table.insert_class("b".into(), "x/B".into(), "").unwrap();
        table.insert_member(method("a", "c", "run"), "").unwrap();
        table.insert_member(method("a", "d", "stop"), "").unwrap();

        assert_eq!(table.class_entry("a"), Some("x/A"));
        assert_eq!(table.member_entry(NodeType::Method, "a/c ()V"), Some("run"));
        assert_eq!(table.member_entry(NodeType::Method, "a/e ()V"), None);

        let unused = table.unused();
        assert_eq!(unused.classes().collect::<Vec<_>>(), vec![("b", "x/B")]);
        assert_eq!(unused.method_count(), 1);
        assert_eq!(unused.get_method("a", "d", "()V"), Some("stop"));

        table.reset_usage();
        assert_eq!(table.unused().method_count(), 2);
    }

    #[test]
    fn exclusion_prefixes() {
        let mut table = MappingTable::new();
        table.add_excluded_package("org/bukkit/");
        assert!(table.is_excluded("org/bukkit/Server"));
        assert!(!table.is_excluded("org/other/Server"));
    }
}
