//! Loading mapping files into a [`MappingTable`].
//!
//! A load runs in two passes over the lines of a source. The first collects
//! the raw class renames, which reversing a compact member line needs to find
//! the member's new owner. The second applies every record to a fresh table.
//! Loads are all-or-nothing: on error the partially filled table is dropped.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::LoadOptions;
use crate::descriptor::remap_descriptor;
use crate::error::{ClassError, MappingError, MappingErrorKind};
use crate::mapper::SymbolResolver;
use crate::mapping::{MappingRecord, SrgMapping};
use crate::ownable::Ownable;
use crate::table::{MappingTable, MemberMapping};
use crate::transformer::{ChainingTransformer, CsvOverlay, Identity, MappingTransformer, ShadeRelocation};
use crate::utils::normalize_package;

/// Finds and reads mapping sources by location.
///
/// Locations are plain strings so that remote directories can be served by a
/// custom implementation.
pub trait MappingLocator: Send + Sync {
    /// Whether `location` names a mapping directory.
    fn is_dir(&self, location: &str) -> bool;

    /// Whether a file exists at `location`.
    fn exists(&self, location: &str) -> bool;

    /// Reads the whole file at `location`.
    fn read_to_string(&self, location: &str) -> Result<String, MappingError>;

    /// The location of `file` inside the directory `dir`.
    fn join(&self, dir: &str, file: &str) -> String {
        format!("{}/{}", dir.trim_end_matches('/'), file)
    }
}

/// Reads mappings from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLocator;

impl MappingLocator for FsLocator {
    fn is_dir(&self, location: &str) -> bool {
        Path::new(location).is_dir()
    }

    fn exists(&self, location: &str) -> bool {
        Path::new(location).is_file()
    }

    fn read_to_string(&self, location: &str) -> Result<String, MappingError> {
        std::fs::read_to_string(location).map_err(|err| MappingError::from(err).with_detail(location))
    }
}

/// Loads mapping files, directories and strings into tables.
///
/// # Examples
///
/// ```
/// use srgremap::{LoadOptions, MappingLoader};
///
/// let source = "CL: a net/Block\nFD: a/b net/Block/id\n";
/// let reversed = MappingLoader::new(LoadOptions::default().reverse(true))
///     .load_str(source)
///     .unwrap();
/// assert_eq!(reversed.get_class("net/Block"), Some("a"));
/// assert_eq!(reversed.get_field("net/Block", "id"), Some("b"));
/// ```
pub struct MappingLoader {
    options: LoadOptions,
    locator: Box<dyn MappingLocator>,
}

impl Default for MappingLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl std::fmt::Debug for MappingLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingLoader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MappingLoader {
    /// Creates a loader reading from the filesystem.
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            locator: Box::new(FsLocator),
        }
    }

    /// Reads sources through `locator` instead of the filesystem.
    pub fn with_locator(mut self, locator: impl MappingLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// The options this loader applies.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    fn fresh_table(&self) -> MappingTable {
        let mut table = MappingTable::new();
        for prefix in &self.options.excluded_packages {
            table.add_excluded_package(prefix);
        }
        table
    }

    fn shade_transformers(&self) -> Result<(Box<dyn MappingTransformer>, Box<dyn MappingTransformer>), MappingError> {
        let side = |relocation: &Option<String>| -> Result<Box<dyn MappingTransformer>, MappingError> {
            Ok(match relocation {
                Some(relocation) => Box::new(ShadeRelocation::parse(relocation)?),
                None => Box::new(Identity),
            })
        };
        Ok((
            side(&self.options.in_shade_relocation)?,
            side(&self.options.out_shade_relocation)?,
        ))
    }

    /// Loads a mapping file, or a mapping directory when `location` is one or
    /// ends with `/`.
    pub fn load(&self, location: &str) -> Result<MappingTable, MappingError> {
        if self.locator.is_dir(location) || location.ends_with('/') {
            if self.options.in_shade_relocation.is_some() || self.options.out_shade_relocation.is_some() {
                return Err(MappingError::from(MappingErrorKind::Unsupported)
                    .with_detail(format!("shade relocation is not supported on directory {location}")));
            }
            return self.load_dir(location);
        }
        if self.options.numeric_srg_names {
            return Err(MappingError::from(MappingErrorKind::Unsupported)
                .with_detail(format!("numeric names need a mapping directory, not {location}")));
        }
        let source = self.locator.read_to_string(location)?;
        self.load_str(&source)
    }

    /// Loads mappings from text, applying shade relocations, exclusions and
    /// reversal.
    pub fn load_str(&self, source: &str) -> Result<MappingTable, MappingError> {
        let (input, output) = self.shade_transformers()?;
        let mut table = self.fresh_table();
        load_mappings(
            &mut table,
            &SrgMapping::new(source),
            input.as_ref(),
            output.as_ref(),
            self.options.reverse,
        )?;
        Ok(table)
    }

    /// Loads an MCP style mapping directory.
    ///
    /// The directory must contain `joined.srg`, or at least one of `server.srg`
    /// and `client.srg`. When both `fields.csv` and `methods.csv` are present
    /// their display names replace the new side of member lines, and an
    /// optional `packages.csv` re-packages classes.
    pub fn load_dir(&self, dir: &str) -> Result<MappingTable, MappingError> {
        self.load_dir_with(dir, false, self.options.numeric_srg_names)
    }

    fn load_dir_with(&self, dir: &str, ignore_csv: bool, numeric: bool) -> Result<MappingTable, MappingError> {
        let locator = self.locator.as_ref();
        let file = |name: &str| locator.join(dir, name);

        let mut srg_files = Vec::new();
        if locator.exists(&file("joined.srg")) {
            srg_files.push(file("joined.srg"));
        } else {
            for side in ["server.srg", "client.srg"] {
                if locator.exists(&file(side)) {
                    srg_files.push(file(side));
                }
            }
        }
        if srg_files.is_empty() {
            return Err(MappingError::from(MappingErrorKind::MissingFiles).with_detail(dir));
        }

        let mut ignore_csv = ignore_csv;
        let input: Box<dyn MappingTransformer> = if numeric {
            // obf -> descriptive first, then chain obf input through it while
            // keeping the numeric names on the output side
            let chain = self.load_dir_with(dir, false, false)?;
            ignore_csv = true;
            Box::new(ChainingTransformer::new(SymbolResolver::new(Arc::new(chain))))
        } else {
            Box::new(Identity)
        };

        let fields_csv = file("fields.csv");
        let methods_csv = file("methods.csv");
        let packages_csv = file("packages.csv");
        let output: Box<dyn MappingTransformer> =
            if locator.exists(&fields_csv) && locator.exists(&methods_csv) {
                let read = |location: &str, skip: bool| -> Result<Option<String>, MappingError> {
                    if skip || !locator.exists(location) {
                        return Ok(None);
                    }
                    locator.read_to_string(location).map(Some)
                };
                let fields = read(&fields_csv, ignore_csv)?;
                let methods = read(&methods_csv, ignore_csv)?;
                let packages = read(&packages_csv, false)?;
                Box::new(CsvOverlay::parse(
                    fields.as_deref(),
                    methods.as_deref(),
                    packages.as_deref(),
                )?)
            } else {
                Box::new(Identity)
            };

        let mut table = self.fresh_table();
        for srg in &srg_files {
            log::debug!("Loading mappings from {srg}");
            let source = locator.read_to_string(srg)?;
            load_mappings(
                &mut table,
                &SrgMapping::new(&source),
                input.as_ref(),
                output.as_ref(),
                self.options.reverse,
            )?;
        }
        Ok(table)
    }
}

impl FromStr for MappingTable {
    type Err = MappingError;

    /// Loads a table from text with default options.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        MappingLoader::default().load_str(source)
    }
}

/// Applies every line of `mapping` to `table`.
///
/// `input` rewrites the old side of each line, `output` the new side, and
/// `reverse` swaps the sides afterwards.
pub fn load_mappings(
    table: &mut MappingTable,
    mapping: &SrgMapping<'_>,
    input: &dyn MappingTransformer,
    output: &dyn MappingTransformer,
    reverse: bool,
) -> Result<(), MappingError> {
    let records = mapping
        .lines()
        .map(|line| MappingRecord::try_parse(line).map(|record| (line, record)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut class_map = HashMap::new();
    for (_, record) in &records {
        match *record {
            MappingRecord::Class { old, new } if !(old.ends_with("/*") && new.ends_with("/*")) => {
                class_map.insert(old, new);
            }
            MappingRecord::CompactClass { old, new } if !old.ends_with('/') => {
                class_map.insert(old, new);
            }
            _ => {}
        }
    }

    let mut loader = LineLoader {
        table,
        input,
        output,
        reverse,
        class_map,
        current_class: None,
    };
    for (line, record) in records {
        loader.apply(line, record)?;
    }
    Ok(())
}

struct LineLoader<'a, 's> {
    table: &'a mut MappingTable,
    input: &'a dyn MappingTransformer,
    output: &'a dyn MappingTransformer,
    reverse: bool,
    class_map: HashMap<&'s str, &'s str>,
    current_class: Option<&'s str>,
}

fn descriptor_error(line: &str) -> impl FnOnce(ClassError) -> MappingError + '_ {
    move |err| MappingError::new(MappingErrorKind::Parse, line).with_detail(err.to_string())
}

impl<'a, 's> LineLoader<'a, 's> {
    fn excluded(&self, old_class: &str, line: &str) -> bool {
        if self.table.is_excluded(old_class) {
            log::info!("Ignored {line}");
            return true;
        }
        false
    }

    fn swap(&self, old: String, new: String) -> (String, String) {
        if self.reverse {
            (new, old)
        } else {
            (old, new)
        }
    }

    fn apply(&mut self, line: &'s str, record: MappingRecord<'s>) -> Result<(), MappingError> {
        match record {
            MappingRecord::Package { old, new } => self.package(line, old, new),
            MappingRecord::Class { old, new } => {
                if old.ends_with("/*") && new.ends_with("/*") {
                    let old = old.trim_end_matches('*');
                    let new = new.trim_end_matches('*');
                    self.package(line, old, new)
                } else {
                    self.class(line, old, new)
                }
            }
            MappingRecord::CompactClass { old, new } => {
                if old.ends_with('/') {
                    self.package(line, old, new)
                } else {
                    self.class(line, old, new)
                }
            }
            MappingRecord::Field {
                old_owner,
                old_name,
                new_owner,
                new_name,
            } => {
                let old_class = self.input.transform_class(old_owner);
                if self.excluded(&old_class, line) {
                    return Ok(());
                }
                let old_field = self.input.transform_field(old_owner, old_name);
                let new_class = self.output.transform_class(new_owner);
                let new_field = self.output.transform_field(old_owner, new_name);
                let (original, mapped) = if self.reverse {
                    (Ownable::field(&new_class, &new_field), Ownable::field(&old_class, &old_field))
                } else {
                    (Ownable::field(&old_class, &old_field), Ownable::field(&new_class, &new_field))
                };
                self.table.insert_member(MemberMapping { original, mapped }, line)
            }
            MappingRecord::Method {
                old_owner,
                old_name,
                old_desc,
                new_owner,
                new_name,
                new_desc,
            } => {
                let old_class = self.input.transform_class(old_owner);
                if self.excluded(&old_class, line) {
                    return Ok(());
                }
                let old_method = self.input.transform_method(old_owner, old_name, old_desc);
                let old_desc_t = self
                    .input
                    .transform_descriptor(old_desc)
                    .map_err(descriptor_error(line))?;
                let new_class = self.output.transform_class(new_owner);
                let new_method = self.output.transform_method(old_owner, new_name, old_desc);
                let new_desc_t = self
                    .output
                    .transform_descriptor(new_desc)
                    .map_err(descriptor_error(line))?;
                let old = Ownable::method(&old_class, &old_method, &old_desc_t);
                let new = Ownable::method(&new_class, &new_method, &new_desc_t);
                let (original, mapped) = if self.reverse { (new, old) } else { (old, new) };
                self.table.insert_member(MemberMapping { original, mapped }, line)
            }
            MappingRecord::CompactField { owner, old, new } => {
                let owner = self.owner(owner, line)?;
                let old_class = self.input.transform_class(owner);
                if self.excluded(&old_class, line) {
                    return Ok(());
                }
                let new_class = self.forward_class(owner, &old_class, line)?;
                let old_field = self.input.transform_field(owner, old);
                let new_field = self.output.transform_field(owner, new);
                let (original, mapped) = if self.reverse {
                    (Ownable::field(&new_class, &new_field), Ownable::field(&old_class, &old_field))
                } else {
                    (Ownable::field(&old_class, &old_field), Ownable::field(&new_class, &new_field))
                };
                self.table.insert_member(MemberMapping { original, mapped }, line)
            }
            MappingRecord::CompactMethod {
                owner,
                old,
                desc,
                new,
            } => {
                let owner = self.owner(owner, line)?;
                let old_class = self.input.transform_class(owner);
                if self.excluded(&old_class, line) {
                    return Ok(());
                }
                let new_class = self.forward_class(owner, &old_class, line)?;
                let old_method = self.input.transform_method(owner, old, desc);
                let new_method = self.output.transform_method(owner, new, desc);
                let old_desc = self
                    .input
                    .transform_descriptor(desc)
                    .map_err(descriptor_error(line))?;
                let new_desc = remap_descriptor(desc, |class| {
                    self.class_map
                        .get(class)
                        .map(|mapped| self.output.transform_class(mapped))
                })
                .map_err(descriptor_error(line))?;
                let old = Ownable::method(&old_class, &old_method, &old_desc);
                let new = Ownable::method(&new_class, &new_method, &new_desc);
                let (original, mapped) = if self.reverse { (new, old) } else { (old, new) };
                self.table.insert_member(MemberMapping { original, mapped }, line)
            }
        }
    }

    fn package(&mut self, line: &str, old: &str, new: &str) -> Result<(), MappingError> {
        let old = self.input.transform_class(old);
        if self.excluded(&old, line) {
            return Ok(());
        }
        let new = self.output.transform_class(new);
        let (old, new) = self.swap(old, new);
        self.table
            .insert_package(normalize_package(&old), normalize_package(&new), line)
    }

    fn class(&mut self, line: &str, old: &'s str, new: &str) -> Result<(), MappingError> {
        self.current_class = Some(old);
        let old_t = self.input.transform_class(old);
        if self.excluded(&old_t, line) {
            return Ok(());
        }
        let new_t = self.output.transform_class(new);
        let (old_t, new_t) = self.swap(old_t, new_t);
        self.table.insert_class(old_t, new_t, line)
    }

    fn owner(&self, owner: Option<&'s str>, line: &str) -> Result<&'s str, MappingError> {
        owner.or(self.current_class).ok_or_else(|| {
            MappingError::new(MappingErrorKind::MissingContext, line)
        })
    }

    /// The new name of a compact line's owner class, as declared in the same
    /// source. Reversal cannot proceed without it.
    fn forward_class(&self, owner: &str, old_class: &str, line: &str) -> Result<String, MappingError> {
        match self.class_map.get(owner) {
            Some(&mapped) if mapped != owner => Ok(self.output.transform_class(mapped)),
            _ if self.reverse => Err(MappingError::new(MappingErrorKind::Reversal, line)
                .with_detail(format!("class {owner} has no mapping"))),
            _ => Ok(old_class.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verbose_dialect() {
        let table: MappingTable = "\
PK: . net/minecraft/server
CL: a net/minecraft/Block
CL: b/* net/util/*
FD: a/c net/minecraft/Block/blockID
MD: a/d (La;)V net/minecraft/Block/setParent (Lnet/minecraft/Block;)V
"
        .parse()
        .unwrap();
        assert_eq!(
            table.packages().collect::<Vec<_>>(),
            vec![(".", "net/minecraft/server/"), ("b/", "net/util/")]
        );
        assert_eq!(table.get_class("a"), Some("net/minecraft/Block"));
        assert_eq!(table.get_field("a", "c"), Some("blockID"));
        assert_eq!(table.get_method("a", "d", "(La;)V"), Some("setParent"));
    }

    #[test]
    fn compact_dialects() {
        let csrg: MappingTable = "\
a net/Block
pkg/ net/pkg/
a c blockID
a d (La;)V setParent
"
        .parse()
        .unwrap();
        let tsrg: MappingTable = "\
a net/Block
pkg/ net/pkg/
\tc blockID
\td (La;)V setParent
"
        .parse()
        .unwrap();
        for table in [&csrg, &tsrg] {
            assert_eq!(table.get_class("a"), Some("net/Block"));
            assert_eq!(table.get_package("pkg/"), Some("net/pkg/"));
            assert_eq!(table.get_field("a", "c"), Some("blockID"));
            assert_eq!(table.get_method("a", "d", "(La;)V"), Some("setParent"));
        }
    }

    #[test]
    fn tsrg_needs_class_context() {
        let err = "\tc blockID\n".parse::<MappingTable>().unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::MissingContext);
    }

    #[test]
    fn compact_reverse() {
        let source = "a net/Block\na c blockID\n\td (La;)V setParent\n";
        let table = MappingLoader::new(LoadOptions::default().reverse(true))
            .load_str(source)
            .unwrap();
        assert_eq!(table.get_class("net/Block"), Some("a"));
        assert_eq!(table.get_field("net/Block", "blockID"), Some("c"));
        assert_eq!(
            table.get_method("net/Block", "setParent", "(Lnet/Block;)V"),
            Some("d")
        );
    }

    #[test]
    fn compact_reverse_needs_owner_mapping() {
        let err = MappingLoader::new(LoadOptions::default().reverse(true))
            .load_str("a c blockID\n")
            .unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Reversal);
    }

    #[test]
    fn conflicts_fail_the_load() {
        let err = "CL: a/B x/Y\nCL: a/B x/Z\n"
            .parse::<MappingTable>()
            .unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Conflict);
        assert_eq!(err.line(), Some("CL: a/B x/Z"));

        let err = "FD: a/b x/c\nFD: a/b x/d\n"
            .parse::<MappingTable>()
            .unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Conflict);
    }

    #[test]
    fn excluded_packages_use_the_old_name() {
        let options = LoadOptions::default().exclude_package("org/bukkit/");
        let table = MappingLoader::new(options.clone())
            .load_str("CL: org/bukkit/Server a\nCL: b net/B\nFD: org/bukkit/Server/x a/y\n")
            .unwrap();
        assert_eq!(table.get_class("org/bukkit/Server"), None);
        assert_eq!(table.get_class("b"), Some("net/B"));
        assert_eq!(table.field_count(), 0);

        // the old side decides, even when reversed
        let table = MappingLoader::new(options.reverse(true))
            .load_str("CL: org/bukkit/Server a\nCL: net/Other org/bukkit/Other\n")
            .unwrap();
        assert_eq!(table.get_class("a"), None);
        assert_eq!(table.get_class("org/bukkit/Other"), Some("net/Other"));
    }

    #[test]
    fn shade_relocation_on_both_sides() {
        let options = LoadOptions::default()
            .in_shade_relocation("org.bukkit=shaded.bukkit")
            .out_shade_relocation("net=relocated.net");
        let table = MappingLoader::new(options)
            .load_str("CL: org/bukkit/A net/B\nMD: org/bukkit/A/m (Lorg/bukkit/A;)V net/B/n (Lnet/B;)V\n")
            .unwrap();
        assert_eq!(table.get_class("shaded/bukkit/A"), Some("relocated/net/B"));
        assert_eq!(
            table.get_method("shaded/bukkit/A", "m", "(Lshaded/bukkit/A;)V"),
            Some("n")
        );
    }
}
