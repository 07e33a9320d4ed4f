//! Remapping whole jar archives.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::classfile::ClassHeader;
use crate::config::{RemapOptions, RemapReport};
use crate::error::RemapError;
use crate::inheritance::InheritanceMap;
use crate::mapper::{AutoRemapper, SymbolResolver};
use crate::rewriter::{ClassRewriter, RemapperProcessor};
use crate::table::MappingTable;
use crate::writer::{MappingWriter, Searge};

const SIGNATURE_SUFFIXES: [&str; 4] = [".SF", ".DSA", ".RSA", ".EC"];

struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    unix_mode: Option<u32>,
}

enum Action {
    Remap,
    Copy,
    Skip,
}

/// Remaps every class of an archive and copies its resources.
///
/// Entries are processed in parallel unless auto remapping is enabled, in
/// which case they are processed in archive order so that generated names do
/// not depend on thread scheduling. The output always lists entries in input
/// order.
#[derive(Debug)]
pub struct ArchiveRemapper {
    rewriter: ClassRewriter,
    options: RemapOptions,
}

impl ArchiveRemapper {
    /// Creates a remapper for `table`.
    pub fn new(table: Arc<MappingTable>, options: RemapOptions) -> Self {
        let mut resolver = SymbolResolver::new(table);
        if options.auto_remap {
            let auto = AutoRemapper::new(options.auto_remap_filter.clone());
            resolver = resolver.with_auto_remapper(Arc::new(auto));
        }
        let rewriter = ClassRewriter::new(resolver)
            .api_only(options.api_only)
            .identifier(options.identifier.clone());
        Self { rewriter, options }
    }

    /// Uses `inheritance` for classes outside the archive, usually backed by
    /// a provider over the libraries the archive links against.
    pub fn with_inheritance(mut self, inheritance: Arc<InheritanceMap>) -> Self {
        self.rewriter.resolver = self.rewriter.resolver.clone().with_inheritance(inheritance);
        self
    }

    /// Runs `processor` on every class before it is remapped.
    pub fn with_pre_processor(mut self, processor: impl RemapperProcessor + 'static) -> Self {
        self.rewriter = self.rewriter.with_pre_processor(processor);
        self
    }

    /// Runs `processor` on every class after it was remapped.
    pub fn with_post_processor(mut self, processor: impl RemapperProcessor + 'static) -> Self {
        self.rewriter = self.rewriter.with_post_processor(processor);
        self
    }

    /// The options of this remapper.
    pub fn options(&self) -> &RemapOptions {
        &self.options
    }

    /// The resolver used for every class.
    pub fn resolver(&self) -> &SymbolResolver {
        self.rewriter.resolver()
    }

    /// Remaps the archive read from `input` into `output`.
    pub fn remap_archive<R, W>(&self, input: R, output: W) -> Result<RemapReport, RemapError>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        self.remap(input, output, None)
    }

    /// Remaps the jar at `input` into `output`.
    ///
    /// The output is written next to its final location first and only moved
    /// into place once the whole archive was written.
    pub fn remap_jar_file(&self, input: &Path, output: &Path) -> Result<RemapReport, RemapError> {
        let reader = File::open(input)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let work_file = output.with_file_name(format!(".{file_name}.tmp"));

        let names = (
            input.to_string_lossy().into_owned(),
            output.to_string_lossy().into_owned(),
        );
        let result = File::create(&work_file)
            .map_err(RemapError::from)
            .and_then(|writer| {
                let names = Some((names.0.as_str(), names.1.as_str()));
                self.remap(reader, BufWriter::new(writer), names)
            });
        match result {
            Ok(report) => {
                fs::rename(&work_file, output)?;
                Ok(report)
            }
            Err(err) => {
                let _ = fs::remove_file(&work_file);
                Err(err)
            }
        }
    }

    fn remap<R, W>(
        &self,
        input: R,
        output: W,
        names: Option<(&str, &str)>,
    ) -> Result<RemapReport, RemapError>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let entries = read_entries(input)?;
        self.learn_hierarchy(&entries);

        let auto_remap = self.resolver().auto_remapper().is_some();
        let processed: Vec<Option<(String, Vec<u8>)>> = if auto_remap {
            entries
                .iter()
                .map(|entry| self.process(entry))
                .collect::<Result<_, _>>()?
        } else {
            entries
                .par_iter()
                .map(|entry| self.process(entry))
                .collect::<Result<_, _>>()?
        };

        let mut report = RemapReport {
            entries_read: entries.len(),
            classes_remapped: entries
                .iter()
                .filter(|e| matches!(self.action(&e.name), Action::Remap))
                .count(),
            ..RemapReport::default()
        };
        let mut writer = ZipWriter::new(output);
        for (entry, result) in entries.iter().zip(processed) {
            let Some((name, data)) = result else {
                report.entries_skipped += 1;
                continue;
            };
            let mut options = SimpleFileOptions::default().compression_method(entry.compression);
            if self.options.stable {
                options = options.last_modified_time(zip::DateTime::default());
            }
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }
            writer.start_file(name.as_str(), options)?;
            writer.write_all(&data)?;
            report.entries_written += 1;
        }
        writer.finish()?.flush()?;

        if let Some(auto) = self.resolver().auto_remapper() {
            report.auto_remapped = auto.snapshot();
            self.write_auto_remap_log(&report.auto_remapped, names)?;
        }
        let unused = self.resolver().table().unused();
        report.unused_classes = unused.class_count();
        report.unused_fields = unused.field_count();
        report.unused_methods = unused.method_count();

        log::info!(
            "Remapped {} classes, wrote {} of {} entries",
            report.classes_remapped,
            report.entries_written,
            report.entries_read
        );
        Ok(report)
    }

    /// Seeds the inheritance cache with the classes of the archive itself.
    fn learn_hierarchy(&self, entries: &[Entry]) {
        let inheritance = self.resolver().inheritance();
        for entry in entries.iter().filter(|e| e.name.ends_with(".class")) {
            match ClassHeader::parse(&entry.data) {
                Ok(header) if !inheritance.has_parents(&header.name) => {
                    let parents = header.parents();
                    inheritance.set_parents(header.name, parents);
                }
                Ok(_) => {}
                Err(err) => log::warn!("Could not read class header of {}: {err}", entry.name),
            }
        }
    }

    fn action(&self, name: &str) -> Action {
        if name.ends_with('/') {
            return Action::Skip;
        }
        let package_info = name.ends_with("package-info.class");
        if name.ends_with(".class")
            && self.options.should_handle(name)
            && !(package_info && self.options.kill_package_info)
        {
            return Action::Remap;
        }
        if SIGNATURE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            || package_info
            || !self.options.copies_resources()
        {
            return Action::Skip;
        }
        Action::Copy
    }

    fn process(&self, entry: &Entry) -> Result<Option<(String, Vec<u8>)>, RemapError> {
        match self.action(&entry.name) {
            Action::Skip => {
                log::debug!("Skipping {}", entry.name);
                Ok(None)
            }
            Action::Copy => Ok(Some((entry.name.clone(), entry.data.clone()))),
            Action::Remap => {
                let class = entry.name.strip_suffix(".class").unwrap_or(&entry.name);
                let name = format!("{}.class", self.rewriter.map_class_name(class));
                let data = self
                    .rewriter
                    .rewrite(&entry.data)
                    .map_err(|err| err.in_entry(&entry.name))?;
                Ok(Some((name, data)))
            }
        }
    }

    fn write_auto_remap_log(
        &self,
        assigned: &[(String, String)],
        names: Option<(&str, &str)>,
    ) -> Result<(), RemapError> {
        let Some(path) = &self.options.auto_remap_log else {
            return Ok(());
        };
        if assigned.is_empty() {
            return Ok(());
        }
        let mut table = MappingTable::new();
        for (old, new) in assigned {
            if let Err(err) = table.insert_class(old.clone(), new.clone(), "") {
                log::warn!("Not logging generated name {new} for {old}: {err}");
            }
        }
        let file = if self.options.write_method.is_append() {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };
        let writer = match names {
            Some((old, new)) => Searge::with_header(old, new),
            None => Searge::new(),
        };
        let mut out = BufWriter::new(file);
        writer.write(&table, &mut out)?;
        out.flush()?;
        Ok(())
    }
}

fn read_entries<R: Read + Seek>(input: R) -> Result<Vec<Entry>, RemapError> {
    let mut archive = ZipArchive::new(input)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        let name = file.name().to_owned();
        entries.push(Entry {
            name: if file.is_dir() && !name.ends_with('/') {
                format!("{name}/")
            } else {
                name
            },
            data,
            compression: file.compression(),
            unix_mode: file.unix_mode(),
        });
    }
    Ok(entries)
}
