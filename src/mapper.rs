//! Resolution of class and member names against a [`MappingTable`].

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;

use crate::inheritance::InheritanceMap;
use crate::ownable::{is_inheritable, NodeType};
use crate::table::MappingTable;
use crate::utils::{matches_package, move_package, to_base26};

#[derive(Debug, Default)]
struct AutoState {
    counter: usize,
    assigned: IndexMap<String, String>,
    names: HashSet<String>,
}

/// Allocates short placeholder names for classes without any mapping.
///
/// Names are `a`, `b`, ... `z`, `aa`, `ab`, ... from a counter that only moves
/// forward. A name is skipped when it is already taken, either by an earlier
/// allocation or by a mapping target. A class always receives the same name
/// within one allocator.
#[derive(Debug, Default)]
pub struct AutoRemapper {
    filter: Vec<String>,
    state: Mutex<AutoState>,
}

impl AutoRemapper {
    /// Creates an allocator.
    ///
    /// With a non-empty `filter`, only classes whose name contains one of the
    /// filter strings are renamed.
    pub fn new(filter: Vec<String>) -> Self {
        Self {
            filter,
            state: Mutex::new(AutoState::default()),
        }
    }

    /// Whether `class` passes the filter.
    pub fn accepts(&self, class: &str) -> bool {
        self.filter.is_empty() || self.filter.iter().any(|f| class.contains(f.as_str()))
    }

    /// Returns the placeholder for `class`, allocating one on first use.
    ///
    /// `is_taken` reports names that are already used elsewhere.
    pub fn allocate(&self, class: &str, is_taken: impl Fn(&str) -> bool) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(name) = state.assigned.get(class) {
            return name.clone();
        }
        let name = loop {
            state.counter += 1;
            let candidate = to_base26(state.counter);
            if !state.names.contains(&candidate) && !is_taken(&candidate) {
                break candidate;
            }
        };
        log::debug!("Auto remapping {class} to {name}");
        state.names.insert(name.clone());
        state.assigned.insert(class.to_owned(), name.clone());
        name
    }

    /// Returns the placeholder already allocated for `class`.
    pub fn get(&self, class: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.assigned.get(class).cloned()
    }

    /// All `(class, placeholder)` pairs, in allocation order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .assigned
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of allocated names.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.assigned.len()
    }

    /// Whether no name was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves class, field and method names.
///
/// Member lookups climb the class hierarchy: when `owner` has no entry, its
/// parents are searched, superclass first. Private and static members are
/// never looked up in parents. Class lookups try, in order, an exact entry,
/// the outer class of a nested class, the package prefixes in declaration
/// order and finally the auto remapper, if one is configured.
///
/// Resolution returning `None` means the name stays as it is.
#[derive(Clone)]
pub struct SymbolResolver {
    table: Arc<MappingTable>,
    inheritance: Arc<InheritanceMap>,
    auto: Option<Arc<AutoRemapper>>,
}

impl fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("classes", &self.table.class_count())
            .field("inheritance", &self.inheritance)
            .field("auto_remap", &self.auto.is_some())
            .finish()
    }
}

impl SymbolResolver {
    /// Creates a resolver with an empty inheritance cache and no auto remapping.
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self {
            table,
            inheritance: Arc::new(InheritanceMap::new()),
            auto: None,
        }
    }

    /// Uses `inheritance` for climbing.
    pub fn with_inheritance(mut self, inheritance: Arc<InheritanceMap>) -> Self {
        self.inheritance = inheritance;
        self
    }

    /// Allocates placeholder names for unmapped classes with `auto`.
    pub fn with_auto_remapper(mut self, auto: Arc<AutoRemapper>) -> Self {
        self.auto = Some(auto);
        self
    }

    /// The underlying table.
    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// The inheritance cache.
    pub fn inheritance(&self) -> &InheritanceMap {
        &self.inheritance
    }

    /// The auto remapper, if configured.
    pub fn auto_remapper(&self) -> Option<&AutoRemapper> {
        self.auto.as_deref()
    }

    /// Resolves a member by its key, `name` for fields or `name descriptor`
    /// for methods, declared on or inherited by `owner`.
    pub fn resolve(&self, kind: NodeType, owner: &str, key: &str, access: i32) -> Option<String> {
        let mut visited = HashSet::new();
        self.climb(kind, owner, key, access, &mut visited)
    }

    fn climb(
        &self,
        kind: NodeType,
        owner: &str,
        key: &str,
        access: i32,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if !visited.insert(owner.to_owned()) {
            return None;
        }
        if let Some(mapped) = self.table.member_entry(kind, &format!("{owner}/{key}")) {
            return Some(mapped.to_owned());
        }
        if !is_inheritable(access) {
            return None;
        }
        self.inheritance
            .parents(owner)
            .iter()
            .find_map(|parent| self.climb(kind, parent, key, access, visited))
    }

    /// Resolves a field name.
    pub fn map_field(&self, owner: &str, name: &str, access: i32) -> Option<String> {
        self.resolve(NodeType::Field, owner, name, access)
    }

    /// Resolves a method name.
    pub fn map_method(&self, owner: &str, name: &str, descriptor: &str, access: i32) -> Option<String> {
        self.resolve(NodeType::Method, owner, &format!("{name} {descriptor}"), access)
    }

    /// Resolves a class name. Array descriptors are never passed here.
    pub fn map_class(&self, class: &str) -> Option<String> {
        if let Some(mapped) = self.table.class_entry(class) {
            return Some(mapped.to_owned());
        }
        if let Some(auto) = self.auto.as_deref().and_then(|a| a.get(class)) {
            return Some(auto);
        }

        if let Some((outer, inner)) = class.rsplit_once('$').filter(|(o, _)| !o.is_empty()) {
            return self.map_class(outer).map(|outer| format!("{outer}${inner}"));
        }

        if let Some((old, new)) = self
            .table
            .packages()
            .find(|(old, _)| matches_package(old, class))
        {
            return Some(move_package(old, new, class));
        }

        let auto = self.auto.as_deref()?;
        if !auto.accepts(class) {
            return None;
        }
        Some(auto.allocate(class, |name| self.table.is_class_target(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownable::{ACCESS_ANY, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};

    fn table(source: &str) -> Arc<MappingTable> {
        Arc::new(source.parse().unwrap())
    }

    #[test]
    fn first_names() {
        let auto = AutoRemapper::new(Vec::new());
        let names: Vec<_> = (0..27)
            .map(|i| auto.allocate(&format!("pkg/Class{i}"), |_| false))
            .collect();
        assert_eq!(names[0], "a");
        assert_eq!(names[1], "b");
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "aa");
        assert_eq!(auto.allocate("pkg/Class0", |_| false), "a");
        assert_eq!(auto.len(), 27);
    }

    #[test]
    fn taken_names_are_skipped() {
        let resolver = SymbolResolver::new(table("CL: x/Mapped b\n"))
            .with_auto_remapper(Arc::new(AutoRemapper::new(Vec::new())));
        assert_eq!(resolver.map_class("p/One").as_deref(), Some("a"));
        assert_eq!(resolver.map_class("p/Two").as_deref(), Some("c"));
        assert_eq!(resolver.map_class("p/One").as_deref(), Some("a"));
        assert_eq!(
            resolver.auto_remapper().unwrap().snapshot(),
            vec![
                ("p/One".to_owned(), "a".to_owned()),
                ("p/Two".to_owned(), "c".to_owned())
            ]
        );
    }

    #[test]
    fn auto_remap_filter() {
        let resolver = SymbolResolver::new(table(""))
            .with_auto_remapper(Arc::new(AutoRemapper::new(vec!["obf/".to_owned()])));
        assert_eq!(resolver.map_class("java/lang/Object"), None);
        assert_eq!(resolver.map_class("obf/Thing").as_deref(), Some("a"));
    }

    #[test]
    fn packages_and_inner_classes() {
        let resolver = SymbolResolver::new(table(
            "PK: com/foo/ com/bar/\nCL: com/foo/Baz NewBaz\nPK: . net/root\n",
        ));
        assert_eq!(resolver.map_class("com/foo/Qux").as_deref(), Some("com/bar/Qux"));
        assert_eq!(resolver.map_class("com/foo/Baz").as_deref(), Some("NewBaz"));
        assert_eq!(resolver.map_class("com/foo/Baz$1").as_deref(), Some("NewBaz$1"));
        assert_eq!(resolver.map_class("Top").as_deref(), Some("net/root/Top"));
        assert_eq!(resolver.map_class("org/Other"), None);
        assert_eq!(resolver.map_class("org/Other$Inner"), None);
    }

    #[test]
    fn first_declared_prefix_wins() {
        let resolver = SymbolResolver::new(table("PK: com/ x/\nPK: com/foo/ y/\n"));
        assert_eq!(resolver.map_class("com/foo/Baz").as_deref(), Some("x/foo/Baz"));

        let resolver = SymbolResolver::new(table("PK: com/foo/ y/\nPK: com/ x/\n"));
        assert_eq!(resolver.map_class("com/foo/Baz").as_deref(), Some("y/Baz"));
    }

    #[test]
    fn climbing() {
        let inheritance = InheritanceMap::new();
        inheritance.set_parents("a/C", vec!["a/P".to_owned(), "a/I".to_owned()]);
        inheritance.set_parents("a/P", vec!["java/lang/Object".to_owned()]);
        let resolver = SymbolResolver::new(table(
            "FD: a/P/f a/P/field\nMD: a/P/m ()V a/P/method ()V\nMD: a/I/n ()V a/I/iface ()V\n",
        ))
        .with_inheritance(Arc::new(inheritance));

        let public = ACC_PUBLIC as i32;
        assert_eq!(resolver.map_field("a/C", "f", public), resolver.map_field("a/P", "f", public));
        assert_eq!(resolver.map_field("a/C", "f", ACCESS_ANY).as_deref(), Some("field"));
        assert_eq!(resolver.map_method("a/C", "m", "()V", public).as_deref(), Some("method"));
        assert_eq!(resolver.map_method("a/C", "n", "()V", public).as_deref(), Some("iface"));

        assert_eq!(resolver.map_field("a/C", "f", ACC_PRIVATE as i32), None);
        assert_eq!(resolver.map_method("a/C", "m", "()V", ACC_STATIC as i32), None);
        assert_eq!(resolver.map_field("a/P", "f", ACC_PRIVATE as i32).as_deref(), Some("field"));
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let inheritance = InheritanceMap::new();
        inheritance.set_parents("a/A", vec!["a/B".to_owned()]);
        inheritance.set_parents("a/B", vec!["a/A".to_owned()]);
        let resolver = SymbolResolver::new(table("")).with_inheritance(Arc::new(inheritance));
        assert_eq!(resolver.map_field("a/A", "f", ACCESS_ANY), None);
    }

    #[test]
    fn usage_is_tracked() {
        let resolver = SymbolResolver::new(table("CL: a x/A\nCL: b x/B\nFD: a/f x/A/g\n"));
        resolver.map_class("a");
        resolver.map_field("a", "f", ACCESS_ANY);
        let unused = resolver.table().unused();
        assert_eq!(unused.classes().collect::<Vec<_>>(), vec![("b", "x/B")]);
        assert_eq!(unused.field_count(), 0);
    }
}
