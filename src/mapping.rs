//! A line parser for SRG style mapping files.
//!
//! Three dialects are understood, and may even be mixed in one file:
//!
//! * the verbose `srg` dialect with typed lines such as `CL: a net/Foo`,
//! * the compact `csrg` dialect with 2, 3 or 4 space separated tokens,
//! * the indented `tsrg` dialect, where member lines start with a tab and
//!   inherit the owner from the last class line.
//!
//! Everything from `#` to the end of a line is a comment, blank lines are
//! ignored.

use std::fmt;

use crate::error::{MappingError, MappingErrorKind};
use crate::utils::strip_comment;

/// A single parsed mapping line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingRecord<'s> {
    /// `PK: old new`, a package prefix rename.
    Package {
        /// Old package prefix.
        old: &'s str,
        /// New package prefix.
        new: &'s str,
    },
    /// `CL: old new`, an exact class rename or, with `/*` wildcards, a prefix rename.
    Class {
        /// Old fully qualified class name.
        old: &'s str,
        /// New fully qualified class name.
        new: &'s str,
    },
    /// `FD: old/name new/name`.
    Field {
        /// Owner class of the old field.
        old_owner: &'s str,
        /// Old field name.
        old_name: &'s str,
        /// Owner class as written on the new side.
        new_owner: &'s str,
        /// New field name.
        new_name: &'s str,
    },
    /// `MD: old/name old_desc new/name new_desc`.
    Method {
        /// Owner class of the old method.
        old_owner: &'s str,
        /// Old method name.
        old_name: &'s str,
        /// Old method descriptor.
        old_desc: &'s str,
        /// Owner class as written on the new side.
        new_owner: &'s str,
        /// New method name.
        new_name: &'s str,
        /// Method descriptor as written on the new side.
        new_desc: &'s str,
    },
    /// A compact two token line: a class, or a package when `old` ends in `/`.
    CompactClass {
        /// Old class name or package prefix.
        old: &'s str,
        /// New class name or package prefix.
        new: &'s str,
    },
    /// A compact three token field line.
    ///
    /// `owner` is `None` for indented lines, which inherit the last class.
    CompactField {
        /// Owner class, if written on the line.
        owner: Option<&'s str>,
        /// Old field name.
        old: &'s str,
        /// New field name.
        new: &'s str,
    },
    /// A compact four token method line.
    ///
    /// `owner` is `None` for indented lines, which inherit the last class.
    CompactMethod {
        /// Owner class, if written on the line.
        owner: Option<&'s str>,
        /// Old method name.
        old: &'s str,
        /// Old method descriptor.
        desc: &'s str,
        /// New method name.
        new: &'s str,
    },
}

impl<'s> MappingRecord<'s> {
    /// Parses one comment-stripped, non-empty mapping line.
    ///
    /// # Examples
    ///
    /// ```
    /// use srgremap::MappingRecord;
    ///
    /// assert_eq!(
    ///     MappingRecord::try_parse("CL: a net/minecraft/Block").unwrap(),
    ///     MappingRecord::Class { old: "a", new: "net/minecraft/Block" },
    /// );
    ///
    /// assert_eq!(
    ///     MappingRecord::try_parse("\tb (I)V tick").unwrap(),
    ///     MappingRecord::CompactMethod { owner: None, old: "b", desc: "(I)V", new: "tick" },
    /// );
    /// ```
    pub fn try_parse(line: &'s str) -> Result<Self, MappingError> {
        if line.contains(':') {
            parse_verbose(line)
        } else {
            parse_compact(line)
        }
    }

    /// The old class name the record belongs to, if it is known from the line alone.
    pub fn old_class(&self) -> Option<&'s str> {
        match *self {
            MappingRecord::Package { old, .. } => Some(old),
            MappingRecord::Class { old, .. } => Some(old),
            MappingRecord::Field { old_owner, .. } => Some(old_owner),
            MappingRecord::Method { old_owner, .. } => Some(old_owner),
            MappingRecord::CompactClass { old, .. } => Some(old),
            MappingRecord::CompactField { owner, .. } => owner,
            MappingRecord::CompactMethod { owner, .. } => owner,
        }
    }
}

impl fmt::Display for MappingRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MappingRecord::Package { old, new } => write!(f, "PK: {old} {new}"),
            MappingRecord::Class { old, new } => write!(f, "CL: {old} {new}"),
            MappingRecord::Field {
                old_owner,
                old_name,
                new_owner,
                new_name,
            } => write!(f, "FD: {old_owner}/{old_name} {new_owner}/{new_name}"),
            MappingRecord::Method {
                old_owner,
                old_name,
                old_desc,
                new_owner,
                new_name,
                new_desc,
            } => write!(
                f,
                "MD: {old_owner}/{old_name} {old_desc} {new_owner}/{new_name} {new_desc}"
            ),
            MappingRecord::CompactClass { old, new } => write!(f, "{old} {new}"),
            MappingRecord::CompactField { owner, old, new } => match owner {
                Some(owner) => write!(f, "{owner} {old} {new}"),
                None => write!(f, "\t{old} {new}"),
            },
            MappingRecord::CompactMethod {
                owner,
                old,
                desc,
                new,
            } => match owner {
                Some(owner) => write!(f, "{owner} {old} {desc} {new}"),
                None => write!(f, "\t{old} {desc} {new}"),
            },
        }
    }
}

fn parse_error(line: &str, detail: &str) -> MappingError {
    MappingError::new(MappingErrorKind::Parse, line).with_detail(detail)
}

/// Splits `owner/name` at the last separator.
fn split_member<'s>(full: &'s str, line: &str) -> Result<(&'s str, &'s str), MappingError> {
    full.rsplit_once('/')
        .ok_or_else(|| parse_error(line, "member name is not fully qualified"))
}

fn parse_verbose(line: &str) -> Result<MappingRecord<'_>, MappingError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let expect_len = |len: usize| {
        if tokens.len() == len {
            Ok(())
        } else {
            Err(parse_error(
                line,
                &format!("expected {} tokens, found {}", len, tokens.len()),
            ))
        }
    };

    match tokens.first().copied() {
        Some("PK:") => {
            expect_len(3)?;
            Ok(MappingRecord::Package {
                old: tokens[1],
                new: tokens[2],
            })
        }
        Some("CL:") => {
            expect_len(3)?;
            Ok(MappingRecord::Class {
                old: tokens[1],
                new: tokens[2],
            })
        }
        Some("FD:") => {
            expect_len(3)?;
            let (old_owner, old_name) = split_member(tokens[1], line)?;
            let (new_owner, new_name) = split_member(tokens[2], line)?;
            Ok(MappingRecord::Field {
                old_owner,
                old_name,
                new_owner,
                new_name,
            })
        }
        Some("MD:") => {
            expect_len(5)?;
            let (old_owner, old_name) = split_member(tokens[1], line)?;
            let (new_owner, new_name) = split_member(tokens[3], line)?;
            Ok(MappingRecord::Method {
                old_owner,
                old_name,
                old_desc: tokens[2],
                new_owner,
                new_name,
                new_desc: tokens[4],
            })
        }
        _ => Err(parse_error(line, "unrecognized mapping type")),
    }
}

fn parse_compact(line: &str) -> Result<MappingRecord<'_>, MappingError> {
    let (indented, body) = match line.strip_prefix('\t') {
        Some(body) => (true, body),
        None => (false, line),
    };
    let tokens: Vec<&str> = body.split_whitespace().collect();

    if indented {
        return match tokens[..] {
            [old, new] => Ok(MappingRecord::CompactField {
                owner: None,
                old,
                new,
            }),
            [old, desc, new] => Ok(MappingRecord::CompactMethod {
                owner: None,
                old,
                desc,
                new,
            }),
            _ => Err(parse_error(
                line,
                &format!("token count {} unexpected", tokens.len() + 1),
            )),
        };
    }

    match tokens[..] {
        [old, new] => Ok(MappingRecord::CompactClass { old, new }),
        [owner, old, new] => Ok(MappingRecord::CompactField {
            owner: Some(owner),
            old,
            new,
        }),
        [owner, old, desc, new] => Ok(MappingRecord::CompactMethod {
            owner: Some(owner),
            old,
            desc,
            new,
        }),
        _ => Err(parse_error(
            line,
            &format!("token count {} unexpected", tokens.len()),
        )),
    }
}

/// Counts of the records in a mapping file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingSummary {
    package_count: usize,
    class_count: usize,
    field_count: usize,
    method_count: usize,
}

impl MappingSummary {
    /// Returns the number of package lines.
    pub fn package_count(&self) -> usize {
        self.package_count
    }

    /// Returns the number of class lines.
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Returns the number of field lines.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Returns the number of method lines.
    pub fn method_count(&self) -> usize {
        self.method_count
    }
}

/// A borrowed SRG mapping source.
#[derive(Clone, Default)]
pub struct SrgMapping<'s> {
    source: &'s str,
}

impl fmt::Debug for SrgMapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrgMapping").finish()
    }
}

impl<'s> SrgMapping<'s> {
    /// Create a new mapping over some text.
    pub fn new(source: &'s str) -> Self {
        Self { source }
    }

    /// The raw source text.
    pub fn source(&self) -> &'s str {
        self.source
    }

    /// Iterates over the comment-stripped, non-empty lines.
    pub fn lines(&self) -> impl Iterator<Item = &'s str> + 's {
        self.source
            .lines()
            .map(strip_comment)
            .filter(|line| !line.trim().is_empty())
    }

    /// Create an Iterator over [`MappingRecord`]s.
    pub fn iter(&self) -> impl Iterator<Item = Result<MappingRecord<'s>, MappingError>> + 's {
        self.lines().map(MappingRecord::try_parse)
    }

    /// Returns a summary of the file. Malformed lines are not counted.
    pub fn summary(&self) -> MappingSummary {
        let mut summary = MappingSummary::default();
        for record in self.iter().filter_map(Result::ok) {
            match record {
                MappingRecord::Package { .. } => summary.package_count += 1,
                MappingRecord::Class { old, new } => {
                    if old.ends_with("/*") && new.ends_with("/*") {
                        summary.package_count += 1;
                    } else {
                        summary.class_count += 1;
                    }
                }
                MappingRecord::CompactClass { old, .. } => {
                    if old.ends_with('/') {
                        summary.package_count += 1;
                    } else {
                        summary.class_count += 1;
                    }
                }
                MappingRecord::Field { .. } | MappingRecord::CompactField { .. } => {
                    summary.field_count += 1
                }
                MappingRecord::Method { .. } | MappingRecord::CompactMethod { .. } => {
                    summary.method_count += 1
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_parse_package() {
        assert_eq!(
            MappingRecord::try_parse("PK: . net/minecraft/server").unwrap(),
            MappingRecord::Package {
                old: ".",
                new: "net/minecraft/server"
            }
        );
    }

    #[test]
    fn try_parse_field() {
        assert_eq!(
            MappingRecord::try_parse("FD: a/b net/minecraft/Block/blockID").unwrap(),
            MappingRecord::Field {
                old_owner: "a",
                old_name: "b",
                new_owner: "net/minecraft/Block",
                new_name: "blockID",
            }
        );
    }

    #[test]
    fn try_parse_method() {
        assert_eq!(
            MappingRecord::try_parse("MD: a/b (La;)V net/Block/setParent (Lnet/Block;)V").unwrap(),
            MappingRecord::Method {
                old_owner: "a",
                old_name: "b",
                old_desc: "(La;)V",
                new_owner: "net/Block",
                new_name: "setParent",
                new_desc: "(Lnet/Block;)V",
            }
        );
    }

    #[test]
    fn try_parse_field_not_qualified() {
        let err = MappingRecord::try_parse("FD: b net/Block/blockID").unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Parse);
        assert_eq!(err.line(), Some("FD: b net/Block/blockID"));
    }

    #[test]
    fn try_parse_wrong_token_count() {
        for line in ["CL: a", "MD: a/b (I)V c/d", "XX: a b", "a b c d e"] {
            let err = MappingRecord::try_parse(line).unwrap_err();
            assert_eq!(err.kind(), MappingErrorKind::Parse, "{line}");
        }
        let err = MappingRecord::try_parse("\ta").unwrap_err();
        assert_eq!(err.kind(), MappingErrorKind::Parse);
    }

    #[test]
    fn try_parse_compact() {
        assert_eq!(
            MappingRecord::try_parse("a net/Block").unwrap(),
            MappingRecord::CompactClass {
                old: "a",
                new: "net/Block"
            }
        );
        assert_eq!(
            MappingRecord::try_parse("a b blockID").unwrap(),
            MappingRecord::CompactField {
                owner: Some("a"),
                old: "b",
                new: "blockID"
            }
        );
        assert_eq!(
            MappingRecord::try_parse("a c (I)V tick").unwrap(),
            MappingRecord::CompactMethod {
                owner: Some("a"),
                old: "c",
                desc: "(I)V",
                new: "tick"
            }
        );
        assert_eq!(
            MappingRecord::try_parse("\tb blockID").unwrap(),
            MappingRecord::CompactField {
                owner: None,
                old: "b",
                new: "blockID"
            }
        );
    }

    #[test]
    fn display_roundtrips_line() {
        for line in [
            "PK: a/ b/",
            "CL: a b",
            "FD: a/b c/d",
            "MD: a/b (I)V c/d (I)V",
            "a b",
            "a b c",
            "\ta b c",
        ] {
            assert_eq!(MappingRecord::try_parse(line).unwrap().to_string(), line);
        }
    }

    #[test]
    fn iter_skips_comments_and_blanks() {
        let source = "\
# header comment
CL: a net/Block # trailing


a b blockID
";
        let mapping = SrgMapping::new(source);
        let records = mapping.iter().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(
            records,
            vec![
                MappingRecord::Class {
                    old: "a",
                    new: "net/Block"
                },
                MappingRecord::CompactField {
                    owner: Some("a"),
                    old: "b",
                    new: "blockID"
                },
            ]
        );
    }

    #[test]
    fn summary() {
        let source = "\
PK: a/ b/
CL: c/* d/*
CL: a x/A
FD: a/b x/A/c
MD: a/b ()V x/A/c ()V
e f
e g h
e i ()V j
";
        let summary = SrgMapping::new(source).summary();
        assert_eq!(summary.package_count(), 2);
        assert_eq!(summary.class_count(), 2);
        assert_eq!(summary.field_count(), 2);
        assert_eq!(summary.method_count(), 2);
    }
}
