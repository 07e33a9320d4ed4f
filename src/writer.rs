//! Serializing mapping tables back to text.

use std::io::{self, Write};

use crate::table::{MappingTable, MemberMapping};
use crate::utils::DEFAULT_PACKAGE;

/// Writes a [`MappingTable`] in some mapping dialect.
pub trait MappingWriter: Send + Sync {
    /// Writes all entries of `table` to `out`.
    fn write(&self, table: &MappingTable, out: &mut dyn Write) -> io::Result<()>;
}

fn sorted_classes(table: &MappingTable) -> Vec<(&str, &str)> {
    let mut classes: Vec<_> = table.classes().collect();
    classes.sort_unstable();
    classes
}

fn sorted_members<'t>(members: impl Iterator<Item = &'t MemberMapping>) -> Vec<&'t MemberMapping> {
    let mut members: Vec<_> = members.collect();
    members.sort_unstable();
    members
}

/// The verbose `srg` dialect: `PK:`, `CL:`, `FD:` and `MD:` lines.
///
/// Packages keep their declaration order, everything else is sorted so the
/// output does not depend on hashing.
#[derive(Clone, Debug, Default)]
pub struct Searge {
    header: Option<String>,
}

impl Searge {
    /// Creates a writer without a header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a comment naming the two artifacts the mappings translate between.
    pub fn with_header(old: &str, new: &str) -> Self {
        Self {
            header: Some(format!("# {old} -> {new}")),
        }
    }
}

impl MappingWriter for Searge {
    fn write(&self, table: &MappingTable, out: &mut dyn Write) -> io::Result<()> {
        if let Some(header) = &self.header {
            writeln!(out, "{header}")?;
        }
        for (old, new) in table.packages() {
            writeln!(out, "PK: {old} {new}")?;
        }
        for (old, new) in sorted_classes(table) {
            writeln!(out, "CL: {old} {new}")?;
        }
        for field in sorted_members(table.fields()) {
            let (original, mapped) = (&field.original, &field.mapped);
            writeln!(
                out,
                "FD: {}/{} {}/{}",
                original.owner, original.name, mapped.owner, mapped.name
            )?;
        }
        for method in sorted_members(table.methods()) {
            let (original, mapped) = (&method.original, &method.mapped);
            writeln!(
                out,
                "MD: {}/{} {} {}/{} {}",
                original.owner,
                original.name,
                original.descriptor,
                mapped.owner,
                mapped.name,
                mapped.descriptor
            )?;
        }
        Ok(())
    }
}

/// The compact `csrg` dialect: 2, 3 and 4 token lines.
///
/// Package lines need a trailing `/`, so the default package is written as `./`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompactSearge;

impl MappingWriter for CompactSearge {
    fn write(&self, table: &MappingTable, out: &mut dyn Write) -> io::Result<()> {
        for (old, new) in table.packages() {
            writeln!(out, "{} {}", compact_package(old), compact_package(new))?;
        }
        for (old, new) in sorted_classes(table) {
            writeln!(out, "{old} {new}")?;
        }
        for field in sorted_members(table.fields()) {
            writeln!(
                out,
                "{} {} {}",
                field.original.owner, field.original.name, field.mapped.name
            )?;
        }
        for method in sorted_members(table.methods()) {
            writeln!(
                out,
                "{} {} {} {}",
                method.original.owner,
                method.original.name,
                method.original.descriptor,
                method.mapped.name
            )?;
        }
        Ok(())
    }
}

fn compact_package(package: &str) -> &str {
    if package == DEFAULT_PACKAGE {
        "./"
    } else {
        package
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
PK: old/ new/
CL: b net/B
CL: a net/A
FD: a/f net/A/field
MD: a/m (La;)V net/A/method (Lnet/A;)V
";

    fn write(writer: &dyn MappingWriter, table: &MappingTable) -> String {
        let mut out = Vec::new();
        writer.write(table, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn searge() {
        let table: MappingTable = SOURCE.parse().unwrap();
        assert_eq!(
            write(&Searge::with_header("in.jar", "out.jar"), &table),
            "\
# in.jar -> out.jar
PK: old/ new/
CL: a net/A
CL: b net/B
FD: a/f net/A/field
MD: a/m (La;)V net/A/method (Lnet/A;)V
"
        );
    }

    #[test]
    fn compact_searge_reloads() {
        let table: MappingTable = SOURCE.parse().unwrap();
        let text = write(&CompactSearge, &table);
        assert_eq!(
            text,
            "\
old/ new/
a net/A
b net/B
a f field
a m (La;)V method
"
        );
        let reloaded: MappingTable = text.parse().unwrap();
        assert_eq!(reloaded.get_method("a", "m", "(La;)V"), Some("method"));
        assert_eq!(reloaded.get_package("old/"), Some("new/"));
    }

    #[test]
    fn default_package_reloads() {
        let table: MappingTable = "PK: . net/root/\nPK: flat/ .\n".parse().unwrap();
        let text = write(&CompactSearge, &table);
        assert_eq!(text, "./ net/root/\nflat/ ./\n");

        let reloaded: MappingTable = text.parse().unwrap();
        assert_eq!(reloaded.get_package("."), Some("net/root/"));
        assert_eq!(reloaded.get_package("flat/"), Some("."));
        assert_eq!(reloaded.class_count(), 0);
        assert_eq!(write(&Searge::new(), &reloaded), write(&Searge::new(), &table));
    }
}
