//! This crate remaps the symbols of compiled JVM classes using SRG style
//! mapping tables.
//!
//! Mappings are loaded from the verbose `srg` dialect (`PK:`, `CL:`, `FD:` and
//! `MD:` lines) or the compact `csrg`/`tsrg` dialects into a [`MappingTable`].
//! A [`SymbolResolver`] answers name lookups against that table, climbing the
//! class hierarchy for inherited members, and the [`ClassRewriter`] and
//! [`ArchiveRemapper`] apply it to single class files or to whole jars.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use srgremap::{ClassFile, ClassRewriter, MappingLoader, SymbolResolver};
//!
//! let table = MappingLoader::default()
//!     .load_str("CL: a net/example/Main\nMD: a/a (I)V net/example/Main/run (I)V")
//!     .unwrap();
//! let resolver = SymbolResolver::new(Arc::new(table));
//!
//! // looking up single names
//! assert_eq!(resolver.map_class("a").as_deref(), Some("net/example/Main"));
//! assert_eq!(
//!     resolver.map_method("a", "a", "(I)V", srgremap::ACCESS_ANY).as_deref(),
//!     Some("run")
//! );
//!
//! // rewriting a class file
//! let mut class = ClassFile::new(0x21, "a", Some("java/lang/Object")).unwrap();
//! class.add_method(0x01, "a", "(I)V", None).unwrap();
//! let output = ClassRewriter::new(resolver)
//!     .rewrite(&class.to_bytes().unwrap())
//!     .unwrap();
//!
//! let remapped = ClassFile::parse(&output).unwrap();
//! assert_eq!(remapped.name().unwrap(), "net/example/Main");
//! assert_eq!(remapped.methods[0].name(&remapped.constant_pool).unwrap(), "run");
//! ```

#![warn(missing_docs)]

mod access;
mod builder;
pub mod classfile;
mod config;
mod descriptor;
mod error;
mod inheritance;
mod jar;
mod mapper;
mod mapping;
mod ownable;
mod rewriter;
mod table;
mod transformer;
mod utils;
mod writer;

pub use access::{AccessChange, AccessMap, FinalChange};
pub use builder::{load_mappings, FsLocator, MappingLoader, MappingLocator};
pub use classfile::{ClassFile, ClassHeader};
pub use config::{LoadOptions, RemapOptions, RemapReport, WriteMethod};
pub use descriptor::{remap_descriptor, remap_signature, remap_type_name, SignatureKind};
pub use error::{ClassError, MappingError, MappingErrorKind, RemapError, RemapErrorKind};
pub use inheritance::{
    ClassPathProvider, InheritanceMap, InheritanceProvider, JointProvider, StaticProvider,
};
pub use jar::ArchiveRemapper;
pub use mapper::{AutoRemapper, SymbolResolver};
pub use mapping::{MappingRecord, MappingSummary, SrgMapping};
pub use ownable::{NodeType, Ownable, ACCESS_ANY};
pub use rewriter::{ClassRewriter, ProcessorChain, RemapperProcessor};
pub use table::{MappingTable, MemberMapping};
pub use transformer::{ChainingTransformer, CsvOverlay, Identity, MappingTransformer, ShadeRelocation};
pub use writer::{CompactSearge, MappingWriter, Searge};

#[cfg(feature = "uuid")]
use uuid::Uuid;

/// Calculates the UUID of a mapping file.
///
/// Equal mapping files always get the same UUID, so it can serve as a cache
/// key for loaded tables.
#[cfg(feature = "uuid")]
pub fn mapping_uuid(mapping: &[u8]) -> Uuid {
    lazy_static::lazy_static! {
        static ref NAMESPACE: Uuid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"md-5.net");
    }
    Uuid::new_v5(&NAMESPACE, mapping)
}

#[cfg(all(test, feature = "uuid"))]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_stable() {
        let mapping = b"CL: a net/example/Main\n";
        assert_eq!(mapping_uuid(mapping), mapping_uuid(mapping));
        assert_ne!(mapping_uuid(mapping), mapping_uuid(b"CL: a net/example/Other\n"));
    }
}
