//! Name transformers applied to the input or output side of a mapping load.

use std::collections::HashMap;
use std::fmt;

use crate::descriptor::remap_descriptor;
use crate::error::{ClassError, MappingError, MappingErrorKind};
use crate::mapper::SymbolResolver;
use crate::ownable::ACCESS_ANY;

/// Rewrites names as they are read from a mapping file.
///
/// Every method defaults to the identity, so an implementation only overrides
/// the kinds of names it cares about.
pub trait MappingTransformer: Send + Sync {
    /// Transforms a fully qualified class name.
    fn transform_class(&self, name: &str) -> String {
        name.to_owned()
    }

    /// Transforms a field name declared on `owner`.
    fn transform_field(&self, owner: &str, name: &str) -> String {
        let _ = owner;
        name.to_owned()
    }

    /// Transforms a method name declared on `owner`.
    fn transform_method(&self, owner: &str, name: &str, descriptor: &str) -> String {
        let _ = (owner, descriptor);
        name.to_owned()
    }

    /// Transforms the class names inside a method descriptor.
    fn transform_descriptor(&self, descriptor: &str) -> Result<String, ClassError> {
        remap_descriptor(descriptor, |class| {
            let mapped = self.transform_class(class);
            (mapped != class).then_some(mapped)
        })
    }
}

/// The transformer that changes nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl MappingTransformer for Identity {}

/// Maven shade style package relocation.
///
/// Relocations are written as `from=to` pairs separated by commas, with either
/// `.` or `/` as package separator, e.g. `org.bukkit=shaded.org.bukkit`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShadeRelocation {
    relocations: Vec<(String, String)>,
}

impl ShadeRelocation {
    /// Parses a comma separated relocation list.
    pub fn parse(list: &str) -> Result<Self, MappingError> {
        let mut relocations = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (from, to) = part.split_once('=').ok_or_else(|| {
                MappingError::new(MappingErrorKind::Parse, list)
                    .with_detail(format!("relocation `{part}` is missing `=`"))
            })?;
            relocations.push((from.replace('.', "/"), to.replace('.', "/")));
        }
        Ok(Self { relocations })
    }

    /// The parsed `(from, to)` pairs, with `/` separators.
    pub fn relocations(&self) -> &[(String, String)] {
        &self.relocations
    }
}

impl MappingTransformer for ShadeRelocation {
    fn transform_class(&self, name: &str) -> String {
        for (from, to) in &self.relocations {
            if let Some(rest) = name.strip_prefix(from.as_str()) {
                return format!("{to}{rest}");
            }
        }
        name.to_owned()
    }
}

/// Maps every input name through an auxiliary mapping table.
///
/// Used to load a table whose input side is already remapped, for example to
/// turn `obf -> descriptive` plus `obf -> numeric` into `descriptive -> numeric`.
pub struct ChainingTransformer {
    resolver: SymbolResolver,
}

impl ChainingTransformer {
    /// Wraps a resolver over the auxiliary table.
    ///
    /// The resolver should not auto-remap, every unmapped name is kept.
    pub fn new(resolver: SymbolResolver) -> Self {
        Self { resolver }
    }
}

impl fmt::Debug for ChainingTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainingTransformer").finish_non_exhaustive()
    }
}

impl MappingTransformer for ChainingTransformer {
    fn transform_class(&self, name: &str) -> String {
        self.resolver
            .map_class(name)
            .unwrap_or_else(|| name.to_owned())
    }

    fn transform_field(&self, owner: &str, name: &str) -> String {
        self.resolver
            .map_field(owner, name, ACCESS_ANY)
            .unwrap_or_else(|| name.to_owned())
    }

    fn transform_method(&self, owner: &str, name: &str, descriptor: &str) -> String {
        self.resolver
            .map_method(owner, name, descriptor, ACCESS_ANY)
            .unwrap_or_else(|| name.to_owned())
    }
}

/// Display names from MCP style `fields.csv`, `methods.csv` and `packages.csv`.
///
/// Field and method tables are keyed by the member name alone (first column to
/// second column). The package table re-packages classes by simple name.
#[derive(Clone, Debug, Default)]
pub struct CsvOverlay {
    fields: HashMap<String, String>,
    methods: HashMap<String, String>,
    packages: HashMap<String, String>,
}

impl CsvOverlay {
    /// Creates an overlay from the text of the csv files.
    ///
    /// Any table may be omitted. The first row of each file is a header.
    pub fn parse(
        fields: Option<&str>,
        methods: Option<&str>,
        packages: Option<&str>,
    ) -> Result<Self, MappingError> {
        let mut overlay = Self::default();
        if let Some(fields) = fields {
            fill_table(&mut overlay.fields, fields)?;
        }
        if let Some(methods) = methods {
            fill_table(&mut overlay.methods, methods)?;
        }
        if let Some(packages) = packages {
            fill_table(&mut overlay.packages, packages)?;
        }
        Ok(overlay)
    }

    /// Whether the overlay would change nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.methods.is_empty() && self.packages.is_empty()
    }
}

fn fill_table(map: &mut HashMap<String, String>, source: &str) -> Result<(), MappingError> {
    for line in source.lines().skip(1) {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split(',').map(|c| c.trim_matches('"')).collect();
        if cols.len() < 2 {
            return Err(MappingError::new(MappingErrorKind::Parse, line)
                .with_detail("csv row needs at least two columns"));
        }
        map.insert(cols[0].to_owned(), cols[1].to_owned());
    }
    Ok(())
}

impl MappingTransformer for CsvOverlay {
    fn transform_class(&self, name: &str) -> String {
        let simple = name.rsplit('/').next().unwrap_or(name);
        match self.packages.get(simple) {
            Some(package) => format!("{package}/{simple}"),
            None => name.to_owned(),
        }
    }

    fn transform_field(&self, _owner: &str, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_else(|| name.to_owned())
    }

    fn transform_method(&self, _owner: &str, name: &str, _descriptor: &str) -> String {
        self.methods.get(name).cloned().unwrap_or_else(|| name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        assert_eq!(Identity.transform_class("a/B"), "a/B");
        assert_eq!(Identity.transform_method("a/B", "c", "()V"), "c");
        assert_eq!(Identity.transform_descriptor("(La/B;)V").unwrap(), "(La/B;)V");
    }

    #[test]
    fn shade_relocation() {
        let shade = ShadeRelocation::parse("org.bukkit=shaded.bukkit, net/minecraft=nms").unwrap();
        assert_eq!(
            shade.relocations(),
            &[
                ("org/bukkit".to_owned(), "shaded/bukkit".to_owned()),
                ("net/minecraft".to_owned(), "nms".to_owned()),
            ]
        );
        assert_eq!(shade.transform_class("org/bukkit/Server"), "shaded/bukkit/Server");
        assert_eq!(shade.transform_class("net/minecraft/Block"), "nms/Block");
        assert_eq!(shade.transform_class("com/Other"), "com/Other");
        assert_eq!(
            shade.transform_descriptor("(Lorg/bukkit/Server;I)Lcom/Other;").unwrap(),
            "(Lshaded/bukkit/Server;I)Lcom/Other;"
        );

        let err = ShadeRelocation::parse("org.bukkit").unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Parse);
    }

    #[test]
    fn csv_overlay() {
        let fields = "searge,name,side,desc\nfield_1_a,blockID,2,\n";
        let methods = "searge,name,side,desc\nfunc_2_b,tick,2,Ticks\n";
        let packages = "class,package\nBlock,net/minecraft/block\n";
        let overlay = CsvOverlay::parse(Some(fields), Some(methods), Some(packages)).unwrap();

        assert_eq!(overlay.transform_field("net/Block", "field_1_a"), "blockID");
        assert_eq!(overlay.transform_field("net/Block", "field_9_z"), "field_9_z");
        assert_eq!(overlay.transform_method("net/Block", "func_2_b", "()V"), "tick");
        assert_eq!(
            overlay.transform_class("net/minecraft/src/Block"),
            "net/minecraft/block/Block"
        );
        assert_eq!(overlay.transform_class("net/minecraft/src/Item"), "net/minecraft/src/Item");
    }

    #[test]
    fn csv_overlay_rejects_short_rows() {
        let err = CsvOverlay::parse(Some("searge,name\nfield_1_a\n"), None, None).unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Parse);
    }
}
