//! Options for loading mappings and remapping archives.
//!
//! All option structs can be read from JSON. Missing keys take their default.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a mapping load interprets its source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Swap old and new names after the transformers ran.
    pub reverse: bool,
    /// For mapping directories, produce `descriptive -> numeric` names.
    pub numeric_srg_names: bool,
    /// Shade relocation applied to the old side of every line.
    pub in_shade_relocation: Option<String>,
    /// Shade relocation applied to the new side of every line.
    pub out_shade_relocation: Option<String>,
    /// Class name prefixes whose mappings are dropped.
    pub excluded_packages: Vec<String>,
}

impl LoadOptions {
    /// Reads options from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Sets [`reverse`](Self::reverse).
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Sets [`numeric_srg_names`](Self::numeric_srg_names).
    pub fn numeric_srg_names(mut self, numeric: bool) -> Self {
        self.numeric_srg_names = numeric;
        self
    }

    /// Sets [`in_shade_relocation`](Self::in_shade_relocation).
    pub fn in_shade_relocation(mut self, relocation: impl Into<String>) -> Self {
        self.in_shade_relocation = Some(relocation.into());
        self
    }

    /// Sets [`out_shade_relocation`](Self::out_shade_relocation).
    pub fn out_shade_relocation(mut self, relocation: impl Into<String>) -> Self {
        self.out_shade_relocation = Some(relocation.into());
        self
    }

    /// Adds an entry to [`excluded_packages`](Self::excluded_packages).
    pub fn exclude_package(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_packages.push(prefix.into());
        self
    }
}

/// Whether a side log is extended or overwritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMethod {
    /// Append to an existing file.
    Append,
    /// Replace the file.
    #[default]
    Replace,
}

impl WriteMethod {
    /// Whether existing content is kept.
    pub fn is_append(self) -> bool {
        self == WriteMethod::Append
    }
}

/// How an archive is remapped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapOptions {
    /// Entry name prefixes to remap, empty for all. `.` matches entries
    /// outside any directory.
    pub includes: Vec<String>,
    /// Strip method bodies and drop resources, producing a stub jar.
    pub api_only: bool,
    /// Copy non-class entries. Ignored in API mode.
    pub copy_resources: bool,
    /// Drop `package-info` classes.
    pub kill_package_info: bool,
    /// Pin entry timestamps so repeated runs are byte identical.
    pub stable: bool,
    /// Give unmapped classes short generated names.
    pub auto_remap: bool,
    /// Only auto remap classes containing one of these substrings.
    pub auto_remap_filter: Vec<String>,
    /// Where generated names are logged in the verbose dialect.
    pub auto_remap_log: Option<PathBuf>,
    /// Whether the auto remap log is appended to or replaced.
    pub write_method: WriteMethod,
    /// Extra UTF8 constant stamped into every rewritten class.
    pub identifier: Option<String>,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            api_only: false,
            copy_resources: true,
            kill_package_info: false,
            stable: false,
            auto_remap: false,
            auto_remap_filter: Vec::new(),
            auto_remap_log: None,
            write_method: WriteMethod::default(),
            identifier: None,
        }
    }
}

impl RemapOptions {
    /// Reads options from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Whether an entry name passes [`includes`](Self::includes).
    pub fn should_handle(&self, entry: &str) -> bool {
        self.includes.is_empty()
            || self.includes.iter().any(|prefix| {
                (prefix == "." && !entry.contains('/')) || entry.starts_with(prefix.as_str())
            })
    }

    /// Whether resources are copied, taking API mode into account.
    pub fn copies_resources(&self) -> bool {
        self.copy_resources && !self.api_only
    }
}

/// What an archive pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapReport {
    /// Entries in the input archive.
    pub entries_read: usize,
    /// Entries in the output archive.
    pub entries_written: usize,
    /// Entries left out of the output.
    pub entries_skipped: usize,
    /// Class entries that went through the rewriter.
    pub classes_remapped: usize,
    /// Names generated by auto remapping, in allocation order.
    pub auto_remapped: Vec<(String, String)>,
    /// Class mappings never consulted so far.
    pub unused_classes: usize,
    /// Field mappings never consulted so far.
    pub unused_fields: usize,
    /// Method mappings never consulted so far.
    pub unused_methods: usize,
}

impl RemapReport {
    /// Serializes the report as pretty printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_json() {
        let options = RemapOptions::from_json(
            r#"{"includes": ["net/"], "stable": true, "write_method": "append"}"#,
        )
        .unwrap();
        assert_eq!(options.includes, vec!["net/".to_owned()]);
        assert!(options.stable);
        assert!(options.copy_resources);
        assert!(options.write_method.is_append());

        let load = LoadOptions::from_json(r#"{"reverse": true}"#).unwrap();
        assert_eq!(load, LoadOptions::default().reverse(true));
    }

    #[test]
    fn report_to_json() {
        let report = RemapReport {
            entries_read: 2,
            auto_remapped: vec![("obf/A".to_owned(), "a".to_owned())],
            ..RemapReport::default()
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["entries_read"], 2);
        assert_eq!(json["auto_remapped"][0][1], "a");
    }

    #[test]
    fn includes() {
        let mut options = RemapOptions::default();
        assert!(options.should_handle("a/B.class"));
        options.includes = vec![".".to_owned(), "net/".to_owned()];
        assert!(options.should_handle("Top.class"));
        assert!(options.should_handle("net/a/B.class"));
        assert!(!options.should_handle("org/a/B.class"));
    }

    #[test]
    fn api_mode_drops_resources() {
        let options = RemapOptions {
            api_only: true,
            ..RemapOptions::default()
        };
        assert!(!options.copies_resources());
    }
}
