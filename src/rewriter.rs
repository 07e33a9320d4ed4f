//! Rewriting the symbols of a single class file.
//!
//! The rewriter works on the constant pool instead of regenerating the class.
//! Constant entries are never changed in place when other entries may share
//! them: a renamed class gets its `Class` entry pointed at a fresh Utf8, and a
//! renamed member reference gets a new `NameAndType`. Everything the rewriter
//! does not understand is copied through byte for byte.

use std::fmt;
use std::sync::Arc;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::classfile::{
    read_attributes, take, write_attributes, Attribute, ClassFile, CodeAttribute, Constant,
    ConstantPool,
};
use crate::descriptor::{remap_descriptor, remap_signature, remap_type_name, return_class, SignatureKind};
use crate::error::{ClassError, RemapError};
use crate::mapper::SymbolResolver;
use crate::ownable::ACCESS_ANY;

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

/// A pluggable byte level transformation of a class file.
///
/// Processors run before or after symbol rewriting. Returning `Ok(None)`
/// leaves the class as it was.
pub trait RemapperProcessor: Send + Sync {
    /// Transforms one class.
    fn process(&self, class: &[u8]) -> Result<Option<Vec<u8>>, RemapError>;
}

/// Runs several processors in order, each on the output of the previous one.
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn RemapperProcessor>>,
}

impl ProcessorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor.
    pub fn push(&mut self, processor: impl RemapperProcessor + 'static) {
        self.processors.push(Box::new(processor));
    }

    /// Number of processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain does nothing.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl RemapperProcessor for ProcessorChain {
    fn process(&self, class: &[u8]) -> Result<Option<Vec<u8>>, RemapError> {
        let mut current: Option<Vec<u8>> = None;
        for processor in &self.processors {
            let input = current.as_deref().unwrap_or(class);
            if let Some(output) = processor.process(input)? {
                current = Some(output);
            }
        }
        Ok(current)
    }
}

/// Rewrites class files according to a [`SymbolResolver`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use srgremap::{ClassFile, ClassRewriter, MappingTable, SymbolResolver};
///
/// let table: MappingTable = "CL: a net/Main".parse().unwrap();
/// let rewriter = ClassRewriter::new(SymbolResolver::new(Arc::new(table)));
///
/// let class = ClassFile::new(0x21, "a", Some("java/lang/Object")).unwrap();
/// let output = rewriter.rewrite(&class.to_bytes().unwrap()).unwrap();
/// assert_eq!(ClassFile::parse(&output).unwrap().name().unwrap(), "net/Main");
/// ```
#[derive(Clone)]
pub struct ClassRewriter {
    pub(crate) resolver: SymbolResolver,
    pre: Option<Arc<dyn RemapperProcessor>>,
    post: Option<Arc<dyn RemapperProcessor>>,
    api_only: bool,
    identifier: Option<String>,
}

impl fmt::Debug for ClassRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRewriter")
            .field("resolver", &self.resolver)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .field("api_only", &self.api_only)
            .field("identifier", &self.identifier)
            .finish()
    }
}

impl ClassRewriter {
    /// Creates a rewriter without processors.
    pub fn new(resolver: SymbolResolver) -> Self {
        Self {
            resolver,
            pre: None,
            post: None,
            api_only: false,
            identifier: None,
        }
    }

    /// Runs `processor` on the input bytes before rewriting.
    pub fn with_pre_processor(mut self, processor: impl RemapperProcessor + 'static) -> Self {
        self.pre = Some(Arc::new(processor));
        self
    }

    /// Runs `processor` on the rewritten bytes.
    pub fn with_post_processor(mut self, processor: impl RemapperProcessor + 'static) -> Self {
        self.post = Some(Arc::new(processor));
        self
    }

    /// Drops all method bodies, producing API stubs.
    pub fn api_only(mut self, api_only: bool) -> Self {
        self.api_only = api_only;
        self
    }

    /// Stamps every output class with an extra Utf8 constant.
    pub fn identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    /// The resolver names are looked up in.
    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// Returns the new name of a class, or the old one if it is not mapped.
    pub fn map_class_name(&self, class: &str) -> String {
        self.resolver
            .map_class(class)
            .unwrap_or_else(|| class.to_owned())
    }

    /// Rewrites one class file.
    pub fn rewrite(&self, data: &[u8]) -> Result<Vec<u8>, RemapError> {
        let pre_processed = match &self.pre {
            Some(pre) => pre.process(data)?,
            None => None,
        };
        let data = pre_processed.as_deref().unwrap_or(data);

        let mut class = ClassFile::parse(data)?;
        self.remap(&mut class)?;
        let output = class.to_bytes()?;

        match &self.post {
            Some(post) => Ok(post.process(&output)?.unwrap_or(output)),
            None => Ok(output),
        }
    }

    fn remap(&self, class: &mut ClassFile) -> Result<(), ClassError> {
        let old = class.constant_pool.clone();
        let this = old.class_name(class.this_class)?.to_owned();

        if self.api_only {
            for method in &mut class.methods {
                method
                    .attributes
                    .retain(|a| a.name(&old).map_or(true, |name| name != "Code"));
            }
        }

        let bootstrap = match class.find_attribute("BootstrapMethods") {
            Some(attribute) => parse_bootstrap_methods(&attribute.info)?,
            None => Vec::new(),
        };

        let mut remapper = Remapper {
            resolver: &self.resolver,
            old: &old,
            pool: &mut class.constant_pool,
            this: &this,
            bootstrap: &bootstrap,
        };
        remapper.constants()?;

        for field in &mut class.fields {
            let name = old.utf8(field.name_index)?;
            let mapped = remapper
                .resolver
                .map_field(&this, name, i32::from(field.access_flags));
            if let Some(mapped) = mapped.filter(|m| m != name) {
                field.name_index = remapper.pool.add_utf8(&mapped)?;
            }
            field.descriptor_index = remapper.descriptor_index(field.descriptor_index)?;
            remapper.attributes(&mut field.attributes, Site::Field)?;
        }

        for method in &mut class.methods {
            let name = old.utf8(method.name_index)?;
            let desc = old.utf8(method.descriptor_index)?;
            if !name.starts_with('<') {
                let mapped =
                    remapper
                        .resolver
                        .map_method(&this, name, desc, i32::from(method.access_flags));
                if let Some(mapped) = mapped.filter(|m| m != name) {
                    method.name_index = remapper.pool.add_utf8(&mapped)?;
                }
            }
            method.descriptor_index = remapper.descriptor_index(method.descriptor_index)?;
            remapper.attributes(&mut method.attributes, Site::Method)?;
        }

        remapper.attributes(&mut class.attributes, Site::Class)?;

        if let Some(identifier) = &self.identifier {
            class.constant_pool.add_utf8(identifier)?;
        }
        Ok(())
    }
}

struct BootstrapMethod {
    method_ref: u16,
    arguments: Vec<u16>,
}

fn parse_bootstrap_methods(info: &[u8]) -> Result<Vec<BootstrapMethod>, ClassError> {
    let mut rdr = info;
    let count = rdr.read_u16::<BE>()?;
    (0..count)
        .map(|_| {
            let method_ref = rdr.read_u16::<BE>()?;
            let arg_count = rdr.read_u16::<BE>()?;
            let arguments = (0..arg_count)
                .map(|_| rdr.read_u16::<BE>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BootstrapMethod {
                method_ref,
                arguments,
            })
        })
        .collect()
}

/// Where an attribute list hangs, which decides how a `Signature` is parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Site {
    Class,
    Field,
    Method,
    Code,
}

/// Rewrites one class. Reads always go to the untouched copy of the pool so
/// that indices found in attribute bodies keep their original meaning.
struct Remapper<'a> {
    resolver: &'a SymbolResolver,
    old: &'a ConstantPool,
    pool: &'a mut ConstantPool,
    this: &'a str,
    bootstrap: &'a [BootstrapMethod],
}

impl<'a> Remapper<'a> {
    fn map_class(&self, class: &str) -> Option<String> {
        self.resolver.map_class(class).filter(|mapped| mapped != class)
    }

    fn descriptor(&self, desc: &str) -> Result<String, ClassError> {
        remap_descriptor(desc, |class| self.map_class(class))
    }

    fn descriptor_index(&mut self, index: u16) -> Result<u16, ClassError> {
        let desc = self.old.utf8(index)?;
        let mapped = self.descriptor(desc)?;
        self.replace_utf8(index, desc, &mapped)
    }

    fn signature_index(&mut self, index: u16, kind: SignatureKind) -> Result<u16, ClassError> {
        let signature = self.old.utf8(index)?;
        match remap_signature(signature, kind, |class| self.map_class(class)) {
            Ok(mapped) => self.replace_utf8(index, signature, &mapped),
            Err(err) => {
                log::warn!("Keeping unparseable signature `{signature}` of {}: {err}", self.this);
                Ok(index)
            }
        }
    }

    fn replace_utf8(&mut self, index: u16, old: &str, new: &str) -> Result<u16, ClassError> {
        if old == new {
            Ok(index)
        } else {
            self.pool.add_utf8(new)
        }
    }

    fn member_name(&self, field: bool, owner: &str, name: &str, desc: &str) -> String {
        let mapped = if field {
            self.resolver.map_field(owner, name, ACCESS_ANY)
        } else if name.starts_with('<') || owner.starts_with('[') {
            None
        } else {
            self.resolver.map_method(owner, name, desc, ACCESS_ANY)
        };
        mapped.unwrap_or_else(|| name.to_owned())
    }

    /// Remaps a NameAndType, returning the original index when nothing changed.
    fn name_and_type(&mut self, index: u16, name: &str, desc: &str) -> Result<u16, ClassError> {
        let (old_name, old_desc) = self.old.name_and_type(index)?;
        if old_name == name && old_desc == desc {
            Ok(index)
        } else {
            self.pool.add_name_and_type(name, desc)
        }
    }

    fn constants(&mut self) -> Result<(), ClassError> {
        let old = self.old;
        for (index, constant) in old.iter() {
            match *constant {
                Constant::Class { name_index } => {
                    let name = old.utf8(name_index)?;
                    let mapped = remap_type_name(name, |class| self.map_class(class))?;
                    let new_index = self.replace_utf8(name_index, name, &mapped)?;
                    if new_index != name_index {
                        self.pool.set(index, Constant::Class { name_index: new_index })?;
                    }
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    let owner = old.class_name(class_index)?;
                    let (name, desc) = old.name_and_type(name_and_type_index)?;
                    let field = matches!(constant, Constant::FieldRef { .. });
                    let new_name = self.member_name(field, owner, name, desc);
                    let new_desc = self.descriptor(desc)?;
                    let nat = self.name_and_type(name_and_type_index, &new_name, &new_desc)?;
                    if nat != name_and_type_index {
                        let replaced = match *constant {
                            Constant::FieldRef { .. } => Constant::FieldRef {
                                class_index,
                                name_and_type_index: nat,
                            },
                            Constant::MethodRef { .. } => Constant::MethodRef {
                                class_index,
                                name_and_type_index: nat,
                            },
                            _ => Constant::InterfaceMethodRef {
                                class_index,
                                name_and_type_index: nat,
                            },
                        };
                        self.pool.set(index, replaced)?;
                    }
                }
                Constant::MethodType { descriptor_index } => {
                    let new_index = self.descriptor_index(descriptor_index)?;
                    if new_index != descriptor_index {
                        self.pool.set(
                            index,
                            Constant::MethodType {
                                descriptor_index: new_index,
                            },
                        )?;
                    }
                }
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    let (name, desc) = old.name_and_type(name_and_type_index)?;
                    let new_name = self
                        .lambda_name(bootstrap_method_attr_index, name, desc)?
                        .unwrap_or_else(|| name.to_owned());
                    let new_desc = self.descriptor(desc)?;
                    let nat = self.name_and_type(name_and_type_index, &new_name, &new_desc)?;
                    if nat != name_and_type_index {
                        self.pool.set(
                            index,
                            Constant::InvokeDynamic {
                                bootstrap_method_attr_index,
                                name_and_type_index: nat,
                            },
                        )?;
                    }
                }
                Constant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    let (name, desc) = old.name_and_type(name_and_type_index)?;
                    let new_desc = self.descriptor(desc)?;
                    let nat = self.name_and_type(name_and_type_index, name, &new_desc)?;
                    if nat != name_and_type_index {
                        self.pool.set(
                            index,
                            Constant::Dynamic {
                                bootstrap_method_attr_index,
                                name_and_type_index: nat,
                            },
                        )?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// For lambdas, the call site name is the implemented interface method:
    /// it is looked up on the class the call site returns, using the erased
    /// method type from the first bootstrap argument.
    fn lambda_name(&self, bootstrap_index: u16, name: &str, desc: &str) -> Result<Option<String>, ClassError> {
        let Some(bootstrap) = self.bootstrap.get(bootstrap_index as usize) else {
            return Ok(None);
        };
        let reference_index = match *self.old.get(bootstrap.method_ref)? {
            Constant::MethodHandle {
                reference_index, ..
            } => reference_index,
            _ => return Ok(None),
        };
        let (owner, factory, _) = self.old.member_ref(reference_index)?;
        if owner != LAMBDA_METAFACTORY || !matches!(factory, "metafactory" | "altMetafactory") {
            return Ok(None);
        }
        let Some(interface) = return_class(desc) else {
            return Ok(None);
        };
        let sam_desc = match bootstrap.arguments.first().map(|&i| self.old.get(i)) {
            Some(Ok(&Constant::MethodType { descriptor_index })) => self.old.utf8(descriptor_index)?,
            _ => return Ok(None),
        };
        Ok(self.resolver.map_method(interface, name, sam_desc, ACCESS_ANY))
    }

    fn attributes(&mut self, attributes: &mut [Attribute], site: Site) -> Result<(), ClassError> {
        for attribute in attributes {
            let name = self.old.utf8(attribute.name_index)?;
            let info = &attribute.info;
            let rewritten = match name {
                "Signature" => {
                    let kind = match site {
                        Site::Class => SignatureKind::Class,
                        Site::Method => SignatureKind::Method,
                        Site::Field | Site::Code => SignatureKind::Type,
                    };
                    rewrite(info, |rdr, out| {
                        let index = rdr.read_u16::<BE>()?;
                        out.write_u16::<BE>(self.signature_index(index, kind)?)?;
                        Ok(())
                    })?
                }
                "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                    rewrite(info, |rdr, out| self.annotations(rdr, out))?
                }
                "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                    rewrite(info, |rdr, out| {
                        let parameters = copy_u8(rdr, out)?;
                        for _ in 0..parameters {
                            self.annotations(rdr, out)?;
                        }
                        Ok(())
                    })?
                }
                "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                    rewrite(info, |rdr, out| {
                        let count = copy_u16(rdr, out)?;
                        for _ in 0..count {
                            self.type_annotation(rdr, out)?;
                        }
                        Ok(())
                    })?
                }
                "AnnotationDefault" => rewrite(info, |rdr, out| self.element_value(rdr, out))?,
                "LocalVariableTable" | "LocalVariableTypeTable" if site == Site::Code => {
                    let generic = name == "LocalVariableTypeTable";
                    rewrite(info, |rdr, out| {
                        let count = copy_u16(rdr, out)?;
                        for _ in 0..count {
                            copy_bytes(rdr, out, 6)?;
                            let index = rdr.read_u16::<BE>()?;
                            let index = if generic {
                                self.signature_index(index, SignatureKind::Type)?
                            } else {
                                self.descriptor_index(index)?
                            };
                            out.write_u16::<BE>(index)?;
                            copy_u16(rdr, out)?;
                        }
                        Ok(())
                    })?
                }
                "InnerClasses" if site == Site::Class => {
                    rewrite(info, |rdr, out| self.inner_classes(rdr, out))?
                }
                "EnclosingMethod" if site == Site::Class => {
                    rewrite(info, |rdr, out| self.enclosing_method(rdr, out))?
                }
                "Record" if site == Site::Class => rewrite(info, |rdr, out| self.record(rdr, out))?,
                "Code" if site == Site::Method => {
                    let mut code = CodeAttribute::parse(info)?;
                    self.attributes(&mut code.attributes, Site::Code)?;
                    code.to_bytes()?
                }
                _ => continue,
            };
            attribute.info = rewritten;
        }
        Ok(())
    }

    fn inner_classes(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let count = copy_u16(rdr, out)?;
        for _ in 0..count {
            let inner_class = copy_u16(rdr, out)?;
            copy_u16(rdr, out)?;
            let inner_name = rdr.read_u16::<BE>()?;
            let inner_name = if inner_name == 0 {
                0
            } else {
                let simple = self.old.utf8(inner_name)?;
                let full = self.old.class_name(inner_class)?;
                match self.map_class(full) {
                    Some(mapped) => {
                        let new_simple = inner_simple_name(&mapped).unwrap_or(simple);
                        self.replace_utf8(inner_name, simple, new_simple)?
                    }
                    None => inner_name,
                }
            };
            out.write_u16::<BE>(inner_name)?;
            copy_u16(rdr, out)?;
        }
        Ok(())
    }

    fn enclosing_method(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let class_index = copy_u16(rdr, out)?;
        let method_index = rdr.read_u16::<BE>()?;
        let method_index = if method_index == 0 {
            0
        } else {
            let owner = self.old.class_name(class_index)?;
            let (name, desc) = self.old.name_and_type(method_index)?;
            let new_name = self.member_name(false, owner, name, desc);
            let new_desc = self.descriptor(desc)?;
            self.name_and_type(method_index, &new_name, &new_desc)?
        };
        out.write_u16::<BE>(method_index)?;
        Ok(())
    }

    fn record(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let count = copy_u16(rdr, out)?;
        for _ in 0..count {
            let name_index = rdr.read_u16::<BE>()?;
            let name = self.old.utf8(name_index)?;
            let name_index = match self.resolver.map_field(self.this, name, ACCESS_ANY) {
                Some(mapped) => self.replace_utf8(name_index, name, &mapped)?,
                None => name_index,
            };
            out.write_u16::<BE>(name_index)?;
            let desc = rdr.read_u16::<BE>()?;
            out.write_u16::<BE>(self.descriptor_index(desc)?)?;
            let mut attributes = read_attributes(rdr)?;
            self.attributes(&mut attributes, Site::Field)?;
            write_attributes(out, &attributes)?;
        }
        Ok(())
    }

    fn annotations(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let count = copy_u16(rdr, out)?;
        for _ in 0..count {
            self.annotation(rdr, out)?;
        }
        Ok(())
    }

    fn annotation(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let type_index = rdr.read_u16::<BE>()?;
        out.write_u16::<BE>(self.descriptor_index(type_index)?)?;
        let pairs = copy_u16(rdr, out)?;
        for _ in 0..pairs {
            copy_u16(rdr, out)?;
            self.element_value(rdr, out)?;
        }
        Ok(())
    }

    fn element_value(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let tag = copy_u8(rdr, out)?;
        match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
                copy_u16(rdr, out)?;
            }
            b'e' => {
                let type_index = rdr.read_u16::<BE>()?;
                out.write_u16::<BE>(self.descriptor_index(type_index)?)?;
                copy_u16(rdr, out)?;
            }
            b'c' => {
                let class_index = rdr.read_u16::<BE>()?;
                out.write_u16::<BE>(self.descriptor_index(class_index)?)?;
            }
            b'@' => self.annotation(rdr, out)?,
            b'[' => {
                let count = copy_u16(rdr, out)?;
                for _ in 0..count {
                    self.element_value(rdr, out)?;
                }
            }
            _ => return Err(ClassError::Attribute),
        }
        Ok(())
    }

    fn type_annotation(&mut self, rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<(), ClassError> {
        let target_info = match copy_u8(rdr, out)? {
            0x00 | 0x01 | 0x16 => 1,
            0x10 | 0x11 | 0x12 | 0x17 | 0x42..=0x46 => 2,
            0x13..=0x15 => 0,
            0x47..=0x4B => 3,
            0x40 | 0x41 => {
                let count = copy_u16(rdr, out)?;
                6 * count as usize
            }
            _ => return Err(ClassError::Attribute),
        };
        copy_bytes(rdr, out, target_info)?;
        let path_length = copy_u8(rdr, out)?;
        copy_bytes(rdr, out, 2 * path_length as usize)?;
        self.annotation(rdr, out)
    }
}

/// Returns the simple name a nested class gets under its new binary name:
/// whatever follows the last `$` and any digits after it.
fn inner_simple_name(mapped: &str) -> Option<&str> {
    let (_, tail) = mapped.rsplit_once('$')?;
    Some(tail.trim_start_matches(|c: char| c.is_ascii_digit()))
}

/// Runs `body` over an attribute and checks it consumed all bytes.
fn rewrite<F>(info: &[u8], body: F) -> Result<Vec<u8>, ClassError>
where
    F: FnOnce(&mut &[u8], &mut Vec<u8>) -> Result<(), ClassError>,
{
    let mut rdr = info;
    let mut out = Vec::with_capacity(info.len());
    body(&mut rdr, &mut out)?;
    if !rdr.is_empty() {
        return Err(ClassError::Attribute);
    }
    Ok(out)
}

fn copy_u8(rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<u8, ClassError> {
    let value = rdr.read_u8()?;
    out.write_u8(value)?;
    Ok(value)
}

fn copy_u16(rdr: &mut &[u8], out: &mut Vec<u8>) -> Result<u16, ClassError> {
    let value = rdr.read_u16::<BE>()?;
    out.write_u16::<BE>(value)?;
    Ok(value)
}

fn copy_bytes(rdr: &mut &[u8], out: &mut Vec<u8>, len: usize) -> Result<(), ClassError> {
    out.extend_from_slice(take(rdr, len)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inheritance::InheritanceMap;
    use crate::ownable::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};
    use crate::table::MappingTable;
    use pretty_assertions::assert_eq;

    const MAPPINGS: &str = "\
CL: a net/Main
CL: b net/Helper
CL: a$c net/Main$Inner
FD: a/f net/Main/counter
FD: b/g net/Helper/shared
MD: a/m (Lb;)La; net/Main/run (Lnet/Helper;)Lnet/Main;
MD: b/h ()V net/Helper/help ()V
MD: d/apply (Ljava/lang/Object;)V net/Action/accept (Ljava/lang/Object;)V
";

    fn rewriter() -> ClassRewriter {
        let table: MappingTable = MAPPINGS.parse().unwrap();
        ClassRewriter::new(SymbolResolver::new(Arc::new(table)))
    }

    fn code(pool_refs: &[(u8, u16)]) -> CodeAttribute {
        let mut code = Vec::new();
        for &(opcode, index) in pool_refs {
            code.push(opcode);
            code.extend_from_slice(&index.to_be_bytes());
        }
        code.push(0xb1);
        CodeAttribute {
            max_stack: 2,
            max_locals: 2,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn declarations_and_references() {
        let mut class = ClassFile::new(ACC_PUBLIC, "a", Some("b")).unwrap();
        let field_ref = class.constant_pool.add_field_ref("b", "g", "I").unwrap();
        let method_ref = class.constant_pool.add_method_ref("b", "h", "()V").unwrap();
        let clone_ref = class
            .constant_pool
            .add_method_ref("[La;", "clone", "()Ljava/lang/Object;")
            .unwrap();
        class.add_field(ACC_PRIVATE, "f", "Lb;").unwrap();
        class
            .add_method(
                ACC_PUBLIC,
                "m",
                "(Lb;)La;",
                Some(code(&[(0xb2, field_ref), (0xb6, method_ref), (0xb6, clone_ref)])),
            )
            .unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        let pool = &remapped.constant_pool;

        assert_eq!(remapped.name().unwrap(), "net/Main");
        assert_eq!(remapped.super_name().unwrap(), Some("net/Helper"));
        assert_eq!(remapped.fields[0].name(pool).unwrap(), "counter");
        assert_eq!(remapped.fields[0].descriptor(pool).unwrap(), "Lnet/Helper;");
        assert_eq!(remapped.methods[0].name(pool).unwrap(), "run");
        assert_eq!(
            remapped.methods[0].descriptor(pool).unwrap(),
            "(Lnet/Helper;)Lnet/Main;"
        );
        assert_eq!(pool.member_ref(field_ref).unwrap(), ("net/Helper", "shared", "I"));
        assert_eq!(pool.member_ref(method_ref).unwrap(), ("net/Helper", "help", "()V"));
        assert_eq!(
            pool.member_ref(clone_ref).unwrap(),
            ("[Lnet/Main;", "clone", "()Ljava/lang/Object;")
        );

        let code = remapped.methods[0]
            .attributes
            .iter()
            .find(|a| a.name(pool).unwrap() == "Code")
            .unwrap();
        let original = class.methods[0].attributes[0].info.clone();
        assert_eq!(code.info, original);
    }

    #[test]
    fn inherited_members_follow_parents() {
        let table: MappingTable = MAPPINGS.parse().unwrap();
        let inheritance = InheritanceMap::new();
        inheritance.set_parents("e", vec!["b".to_owned()]);
        let resolver =
            SymbolResolver::new(Arc::new(table)).with_inheritance(Arc::new(inheritance));

        let mut class = ClassFile::new(ACC_PUBLIC, "e", Some("b")).unwrap();
        let inherited = class.constant_pool.add_field_ref("e", "g", "I").unwrap();
        class.add_method(ACC_PUBLIC, "h", "()V", None).unwrap();
        class.add_method(ACC_PRIVATE | ACC_STATIC, "h", "(I)V", None).unwrap();

        let output = ClassRewriter::new(resolver)
            .rewrite(&class.to_bytes().unwrap())
            .unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        let pool = &remapped.constant_pool;
        assert_eq!(pool.member_ref(inherited).unwrap(), ("e", "shared", "I"));
        assert_eq!(remapped.methods[0].name(pool).unwrap(), "help");
        assert_eq!(remapped.methods[1].name(pool).unwrap(), "h");
    }

    #[test]
    fn shared_name_and_type_is_not_mutated() {
        let mut class = ClassFile::new(ACC_PUBLIC, "x", None).unwrap();
        let mapped = class.constant_pool.add_method_ref("b", "h", "()V").unwrap();
        let unmapped = class.constant_pool.add_method_ref("x", "h", "()V").unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let pool = ClassFile::parse(&output).unwrap().constant_pool;
        assert_eq!(pool.member_ref(mapped).unwrap(), ("net/Helper", "help", "()V"));
        assert_eq!(pool.member_ref(unmapped).unwrap(), ("x", "h", "()V"));
    }

    #[test]
    fn signatures_and_inner_classes() {
        let mut class = ClassFile::new(ACC_PUBLIC, "a", None).unwrap();
        let signature = class.constant_pool.add_utf8("<T:Lb;>Ljava/lang/Object;").unwrap();
        class
            .add_attribute("Signature", signature.to_be_bytes().to_vec())
            .unwrap();

        let inner = class.constant_pool.add_class("a$c").unwrap();
        let outer = class.this_class;
        let simple = class.constant_pool.add_utf8("c").unwrap();
        let mut info = Vec::new();
        for value in [1, inner, outer, simple, ACC_PUBLIC | ACC_STATIC] {
            info.extend_from_slice(&value.to_be_bytes());
        }
        class.add_attribute("InnerClasses", info).unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        let pool = &remapped.constant_pool;

        let signature = remapped.find_attribute("Signature").unwrap();
        let index = u16::from_be_bytes([signature.info[0], signature.info[1]]);
        assert_eq!(pool.utf8(index).unwrap(), "<T:Lnet/Helper;>Ljava/lang/Object;");

        let inner_classes = remapped.find_attribute("InnerClasses").unwrap();
        let name_index = u16::from_be_bytes([inner_classes.info[6], inner_classes.info[7]]);
        assert_eq!(pool.class_name(inner).unwrap(), "net/Main$Inner");
        assert_eq!(pool.utf8(name_index).unwrap(), "Inner");
    }

    #[test]
    fn malformed_signatures_are_kept() {
        let mut class = ClassFile::new(ACC_PUBLIC, "a", None).unwrap();
        let signature = class.constant_pool.add_utf8("<garbage").unwrap();
        class
            .add_attribute("Signature", signature.to_be_bytes().to_vec())
            .unwrap();
        let text = class
            .constant_pool
            .push(Constant::RawUtf8(vec![0xED, 0xA0, 0x80]))
            .unwrap();
        class.constant_pool.push(Constant::String { string_index: text }).unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        let pool = &remapped.constant_pool;
        assert_eq!(remapped.name().unwrap(), "net/Main");

        let attribute = remapped.find_attribute("Signature").unwrap();
        assert_eq!(attribute.info, signature.to_be_bytes());
        assert_eq!(pool.utf8(signature).unwrap(), "<garbage");
        assert_eq!(
            pool.get(text).unwrap(),
            &Constant::RawUtf8(vec![0xED, 0xA0, 0x80])
        );
    }

    #[test]
    fn lambda_call_sites_use_the_interface_method() {
        let mut class = ClassFile::new(ACC_PUBLIC, "x", None).unwrap();
        let pool = &mut class.constant_pool;
        let factory = pool
            .add_method_ref(
                LAMBDA_METAFACTORY,
                "metafactory",
                "(Ljava/lang/invoke/MethodHandles$Lookup;)Ljava/lang/invoke/CallSite;",
            )
            .unwrap();
        let handle = pool
            .push(Constant::MethodHandle {
                reference_kind: 6,
                reference_index: factory,
            })
            .unwrap();
        let sam_utf8 = pool.add_utf8("(Ljava/lang/Object;)V").unwrap();
        let sam = pool
            .push(Constant::MethodType {
                descriptor_index: sam_utf8,
            })
            .unwrap();
        let nat = pool.add_name_and_type("apply", "(La;)Ld;").unwrap();
        let indy = pool
            .push(Constant::InvokeDynamic {
                bootstrap_method_attr_index: 0,
                name_and_type_index: nat,
            })
            .unwrap();
        let mut bootstrap = Vec::new();
        for value in [1, handle, 1, sam] {
            bootstrap.extend_from_slice(&value.to_be_bytes());
        }
        class.add_attribute("BootstrapMethods", bootstrap).unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let pool = ClassFile::parse(&output).unwrap().constant_pool;
        let Constant::InvokeDynamic {
            name_and_type_index, ..
        } = *pool.get(indy).unwrap()
        else {
            panic!("not an invokedynamic constant");
        };
        assert_eq!(
            pool.name_and_type(name_and_type_index).unwrap(),
            ("accept", "(Lnet/Main;)Ld;")
        );
    }

    #[test]
    fn annotations() {
        let mut class = ClassFile::new(ACC_PUBLIC, "x", None).unwrap();
        let pool = &mut class.constant_pool;
        let annotation_type = pool.add_utf8("La;").unwrap();
        let element = pool.add_utf8("value").unwrap();
        let class_value = pool.add_utf8("Lb;").unwrap();
        let mut info = Vec::new();
        for value in [1, annotation_type, 1, element] {
            info.extend_from_slice(&value.to_be_bytes());
        }
        info.push(b'c');
        info.extend_from_slice(&class_value.to_be_bytes());
        class.add_attribute("RuntimeVisibleAnnotations", info).unwrap();

        let output = rewriter().rewrite(&class.to_bytes().unwrap()).unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        let pool = &remapped.constant_pool;
        let info = &remapped.find_attribute("RuntimeVisibleAnnotations").unwrap().info;
        let read = |at: usize| u16::from_be_bytes([info[at], info[at + 1]]);
        assert_eq!(pool.utf8(read(2)).unwrap(), "Lnet/Main;");
        assert_eq!(pool.utf8(read(6)).unwrap(), "value");
        assert_eq!(pool.utf8(read(9)).unwrap(), "Lnet/Helper;");
    }

    #[test]
    fn api_mode_and_identifier() {
        let mut class = ClassFile::new(ACC_PUBLIC, "a", None).unwrap();
        class
            .add_method(ACC_PUBLIC, "m", "(Lb;)La;", Some(code(&[])))
            .unwrap();

        let output = rewriter()
            .api_only(true)
            .identifier(Some("remapped-by-test".to_owned()))
            .rewrite(&class.to_bytes().unwrap())
            .unwrap();
        let remapped = ClassFile::parse(&output).unwrap();
        assert!(remapped.methods[0].attributes.is_empty());
        assert!(remapped
            .constant_pool
            .iter()
            .any(|(_, c)| *c == Constant::Utf8("remapped-by-test".to_owned())));
    }

    struct Marker(&'static str);

    impl RemapperProcessor for Marker {
        fn process(&self, class: &[u8]) -> Result<Option<Vec<u8>>, RemapError> {
            let mut class = ClassFile::parse(class)?;
            class.constant_pool.add_utf8(self.0)?;
            Ok(Some(class.to_bytes()?))
        }
    }

    struct Untouched;

    impl RemapperProcessor for Untouched {
        fn process(&self, _: &[u8]) -> Result<Option<Vec<u8>>, RemapError> {
            Ok(None)
        }
    }

    #[test]
    fn processors_run_around_rewriting() {
        let mut chain = ProcessorChain::new();
        chain.push(Untouched);
        chain.push(Marker("pre"));
        assert_eq!(chain.len(), 2);

        let class = ClassFile::new(ACC_PUBLIC, "a", None).unwrap();
        let output = rewriter()
            .with_pre_processor(chain)
            .with_post_processor(Marker("post"))
            .rewrite(&class.to_bytes().unwrap())
            .unwrap();
        let pool = ClassFile::parse(&output).unwrap().constant_pool;
        let strings: Vec<_> = pool
            .iter()
            .filter_map(|(_, c)| match c {
                Constant::Utf8(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(strings.contains(&"pre"));
        assert!(strings.contains(&"post"));
        assert!(strings.contains(&"net/Main"));
    }

    #[test]
    fn inner_simple_names() {
        assert_eq!(inner_simple_name("net/Main$Inner"), Some("Inner"));
        assert_eq!(inner_simple_name("net/Main$1Local"), Some("Local"));
        assert_eq!(inner_simple_name("net/Main"), None);
    }
}
