use std::fmt;

use serde::{Deserialize, Serialize};

/// Access flag value meaning "unknown, match any member".
pub const ACCESS_ANY: i32 = -1;

pub(crate) const ACC_PUBLIC: u16 = 0x0001;
pub(crate) const ACC_PRIVATE: u16 = 0x0002;
pub(crate) const ACC_PROTECTED: u16 = 0x0004;
pub(crate) const ACC_STATIC: u16 = 0x0008;
pub(crate) const ACC_FINAL: u16 = 0x0010;

/// The kind of class member a mapping entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    /// A field.
    Field,
    /// A method.
    Method,
}

/// One class member: its owner, name, descriptor and access flags.
///
/// Field descriptors are usually empty, since the mapping formats key fields by
/// name only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ownable {
    /// Whether this is a field or a method.
    pub kind: NodeType,
    /// Slash separated name of the declaring class.
    pub owner: String,
    /// Simple member name.
    pub name: String,
    /// JVM descriptor, empty for most fields.
    pub descriptor: String,
    /// JVM access flags, or [`ACCESS_ANY`].
    pub access: i32,
}

impl Ownable {
    /// Creates a field member.
    pub fn field(owner: &str, name: &str) -> Self {
        Self {
            kind: NodeType::Field,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: String::new(),
            access: ACCESS_ANY,
        }
    }

    /// Creates a method member.
    pub fn method(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            kind: NodeType::Method,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access: ACCESS_ANY,
        }
    }

    /// Returns a copy with the given access flags.
    pub fn with_access(mut self, access: i32) -> Self {
        self.access = access;
        self
    }

    /// The lookup key of this member inside a mapping table.
    ///
    /// Fields are keyed as `owner/name`, methods as `owner/name descriptor`.
    pub fn key(&self) -> String {
        member_key(self.kind, &self.owner, &self.name, &self.descriptor)
    }
}

impl fmt::Display for Ownable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeType::Field => write!(f, "{}/{}", self.owner, self.name),
            NodeType::Method => write!(f, "{}/{} {}", self.owner, self.name, self.descriptor),
        }
    }
}

/// Builds the `owner/name[ descriptor]` key used by the member maps.
pub(crate) fn member_key(kind: NodeType, owner: &str, name: &str, descriptor: &str) -> String {
    match kind {
        NodeType::Field => format!("{owner}/{name}"),
        NodeType::Method => format!("{owner}/{name} {descriptor}"),
    }
}

/// Whether a member with these access flags takes part in inheritance lookups.
///
/// Private and static members are never inherited, so climbing to a parent for
/// them would produce wrong matches.
pub(crate) fn is_inheritable(access: i32) -> bool {
    if access == ACCESS_ANY {
        return true;
    }
    let access = access as u16;
    access & (ACC_PRIVATE | ACC_STATIC) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert_eq!(Ownable::field("a/B", "c").key(), "a/B/c");
        assert_eq!(Ownable::method("a/B", "c", "(I)V").key(), "a/B/c (I)V");
        assert_eq!(Ownable::method("a/B", "c", "(I)V").to_string(), "a/B/c (I)V");
    }

    #[test]
    fn inheritable_access() {
        assert!(is_inheritable(ACCESS_ANY));
        assert!(is_inheritable(ACC_PUBLIC as i32));
        assert!(is_inheritable((ACC_PROTECTED | ACC_FINAL) as i32));
        assert!(!is_inheritable(ACC_PRIVATE as i32));
        assert!(!is_inheritable((ACC_PUBLIC | ACC_STATIC) as i32));
    }
}
