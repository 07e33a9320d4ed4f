//! Access transformers: class file processors that rewrite visibility flags.
//!
//! An access map holds one rule per line:
//!
//! ```text
//! public net/Main
//! protected-f net/Main counter
//! private+f net/Main run (I)V
//! public net/Helper *
//! ```
//!
//! A member rule without a descriptor applies to fields and to every method
//! overload of that name; `*` applies to all members of the class.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::classfile::ClassFile;
use crate::error::{MappingError, MappingErrorKind, RemapError};
use crate::ownable::{ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC};
use crate::rewriter::RemapperProcessor;
use crate::utils::strip_comment;

const VISIBILITY: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED;

/// What happens to the `final` flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FinalChange {
    /// Keep it as it is.
    #[default]
    Keep,
    /// Set it (`+f`).
    Add,
    /// Clear it (`-f`).
    Remove,
}

/// One access rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessChange {
    /// The new visibility bits: one of the public, protected or private flags, or zero.
    pub visibility: u16,
    /// The change to the `final` flag.
    pub final_change: FinalChange,
}

impl AccessChange {
    /// Applies the rule to a set of access flags.
    pub fn apply(self, access: u16) -> u16 {
        let access = (access & !VISIBILITY) | self.visibility;
        match self.final_change {
            FinalChange::Keep => access,
            FinalChange::Add => access | ACC_FINAL,
            FinalChange::Remove => access & !ACC_FINAL,
        }
    }
}

impl FromStr for AccessChange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        let (visibility, final_change) = if let Some(visibility) = s.strip_suffix("+f") {
            (visibility, FinalChange::Add)
        } else if let Some(visibility) = s.strip_suffix("-f") {
            (visibility, FinalChange::Remove)
        } else {
            (s, FinalChange::Keep)
        };
        let visibility = match visibility {
            "public" => ACC_PUBLIC,
            "protected" => ACC_PROTECTED,
            "private" => ACC_PRIVATE,
            "default" => 0,
            _ => return Err(()),
        };
        Ok(Self {
            visibility,
            final_change,
        })
    }
}

impl fmt::Display for AccessChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visibility = match self.visibility {
            ACC_PUBLIC => "public",
            ACC_PROTECTED => "protected",
            ACC_PRIVATE => "private",
            _ => "default",
        };
        let suffix = match self.final_change {
            FinalChange::Keep => "",
            FinalChange::Add => "+f",
            FinalChange::Remove => "-f",
        };
        write!(f, "{visibility}{suffix}")
    }
}

/// A set of access rules, usable as a [`RemapperProcessor`].
#[derive(Clone, Debug, Default)]
pub struct AccessMap {
    classes: HashMap<String, AccessChange>,
    members: HashMap<String, AccessChange>,
}

impl AccessMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one rule line. Blank and comment lines are ignored.
    pub fn add_line(&mut self, line: &str) -> Result<(), MappingError> {
        let tokens: Vec<&str> = strip_comment(line).split_whitespace().collect();
        let parse_error = || MappingError::new(MappingErrorKind::Parse, line);
        let (access, key, target) = match tokens[..] {
            [] => return Ok(()),
            [access, class] => (access, class.replace('.', "/"), &mut self.classes),
            [access, class, member] => (
                access,
                format!("{}/{member}", class.replace('.', "/")),
                &mut self.members,
            ),
            [access, class, member, desc] => (
                access,
                format!("{}/{member} {desc}", class.replace('.', "/")),
                &mut self.members,
            ),
            _ => return Err(parse_error()),
        };
        let change: AccessChange = access
            .parse()
            .map_err(|_| parse_error().with_detail(format!("unknown access `{access}`")))?;
        if let Some(previous) = target.insert(key, change) {
            if previous != change {
                log::warn!("Access rule `{line}` replaces an earlier `{previous}` rule");
            }
        }
        Ok(())
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.classes.len() + self.members.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.members.is_empty()
    }

    /// The rule for a class.
    pub fn class_change(&self, class: &str) -> Option<AccessChange> {
        self.classes.get(class).copied()
    }

    /// The rule for a member. Fields pass no descriptor.
    pub fn member_change(&self, class: &str, name: &str, desc: Option<&str>) -> Option<AccessChange> {
        let exact = desc.and_then(|desc| self.members.get(&format!("{class}/{name} {desc}")));
        exact
            .or_else(|| self.members.get(&format!("{class}/{name}")))
            .or_else(|| self.members.get(&format!("{class}/*")))
            .copied()
    }
}

impl FromStr for AccessMap {
    type Err = MappingError;

    fn from_str(source: &str) -> Result<Self, MappingError> {
        let mut map = AccessMap::new();
        for line in source.lines() {
            map.add_line(line)?;
        }
        Ok(map)
    }
}

impl RemapperProcessor for AccessMap {
    fn process(&self, class: &[u8]) -> Result<Option<Vec<u8>>, RemapError> {
        let mut class = ClassFile::parse(class)?;
        let name = class.name()?.to_owned();
        let mut changed = false;

        if let Some(change) = self.class_change(&name) {
            let access = change.apply(class.access_flags);
            changed |= access != class.access_flags;
            class.access_flags = access;
        }

        let pool = &class.constant_pool;
        let members = class
            .fields
            .iter_mut()
            .map(|m| (m, false))
            .chain(class.methods.iter_mut().map(|m| (m, true)));
        for (member, is_method) in members {
            let member_name = member.name(pool)?;
            let desc = if is_method {
                Some(member.descriptor(pool)?)
            } else {
                None
            };
            if let Some(change) = self.member_change(&name, member_name, desc) {
                let access = change.apply(member.access_flags);
                changed |= access != member.access_flags;
                member.access_flags = access;
            }
        }

        if !changed {
            return Ok(None);
        }
        Ok(Some(class.to_bytes()?))
    }
}
