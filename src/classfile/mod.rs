//! A minimal class file codec.
//!
//! Only the structure needed for symbol remapping is decoded: the constant
//! pool, the class header, field and method declarations and their attributes.
//! Attribute bodies stay raw bytes, with [`CodeAttribute`] as the one nested
//! structure that callers usually need to look into. Encoding a decoded class
//! without changes reproduces the input bytes.

mod constant_pool;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

pub use self::constant_pool::{Constant, ConstantPool};
use crate::error::ClassError;

const MAGIC: u32 = 0xCAFE_BABE;

/// Splits `len` bytes off the front of `rdr`.
pub(crate) fn take<'a>(rdr: &mut &'a [u8], len: usize) -> Result<&'a [u8], ClassError> {
    if rdr.len() < len {
        return Err(ClassError::UnexpectedEof);
    }
    let (head, tail) = rdr.split_at(len);
    *rdr = tail;
    Ok(head)
}

/// A raw attribute: its name index and undecoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Utf8 index of the attribute name.
    pub name_index: u16,
    /// The attribute body.
    pub info: Vec<u8>,
}

impl Attribute {
    /// Creates an attribute named `name`.
    pub fn new(pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> Result<Self, ClassError> {
        Ok(Self {
            name_index: pool.add_utf8(name)?,
            info,
        })
    }

    /// The attribute name.
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.utf8(self.name_index)
    }

    fn read(rdr: &mut &[u8]) -> Result<Self, ClassError> {
        let name_index = rdr.read_u16::<BE>()?;
        let len = rdr.read_u32::<BE>()? as usize;
        let info = take(rdr, len)?.to_vec();
        Ok(Self { name_index, info })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassError> {
        let len = u32::try_from(self.info.len()).map_err(|_| ClassError::Attribute)?;
        out.write_u16::<BE>(self.name_index)?;
        out.write_u32::<BE>(len)?;
        out.extend_from_slice(&self.info);
        Ok(())
    }
}

pub(crate) fn read_attributes(rdr: &mut &[u8]) -> Result<Vec<Attribute>, ClassError> {
    let count = rdr.read_u16::<BE>()?;
    (0..count).map(|_| Attribute::read(rdr)).collect()
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> Result<(), ClassError> {
    let count = u16::try_from(attributes.len()).map_err(|_| ClassError::Attribute)?;
    out.write_u16::<BE>(count)?;
    for attribute in attributes {
        attribute.write(out)?;
    }
    Ok(())
}

/// A field or method declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    /// JVM access flags.
    pub access_flags: u16,
    /// Utf8 index of the name.
    pub name_index: u16,
    /// Utf8 index of the descriptor.
    pub descriptor_index: u16,
    /// Member attributes, such as `Code` or `Signature`.
    pub attributes: Vec<Attribute>,
}

impl MemberInfo {
    fn read(rdr: &mut &[u8]) -> Result<Self, ClassError> {
        Ok(Self {
            access_flags: rdr.read_u16::<BE>()?,
            name_index: rdr.read_u16::<BE>()?,
            descriptor_index: rdr.read_u16::<BE>()?,
            attributes: read_attributes(rdr)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassError> {
        out.write_u16::<BE>(self.access_flags)?;
        out.write_u16::<BE>(self.name_index)?;
        out.write_u16::<BE>(self.descriptor_index)?;
        write_attributes(out, &self.attributes)
    }

    /// The member name.
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.utf8(self.name_index)
    }

    /// The member descriptor.
    pub fn descriptor<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.utf8(self.descriptor_index)
    }
}

/// A decoded `Code` attribute.
///
/// The bytecode and exception table are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth.
    pub max_stack: u16,
    /// Number of local variable slots.
    pub max_locals: u16,
    /// The bytecode.
    pub code: Vec<u8>,
    /// Raw exception table entries, 8 bytes each.
    pub exception_table: Vec<u8>,
    /// Nested attributes, such as `LocalVariableTable`.
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Decodes the body of a `Code` attribute.
    pub fn parse(info: &[u8]) -> Result<Self, ClassError> {
        let mut rdr = info;
        let max_stack = rdr.read_u16::<BE>()?;
        let max_locals = rdr.read_u16::<BE>()?;
        let code_len = rdr.read_u32::<BE>()? as usize;
        let code = take(&mut rdr, code_len)?.to_vec();
        let exception_count = rdr.read_u16::<BE>()? as usize;
        let exception_table = take(&mut rdr, exception_count * 8)?.to_vec();
        let attributes = read_attributes(&mut rdr)?;
        if !rdr.is_empty() {
            return Err(ClassError::Attribute);
        }
        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Encodes the attribute body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassError> {
        let mut out = Vec::with_capacity(self.code.len() + 32);
        out.write_u16::<BE>(self.max_stack)?;
        out.write_u16::<BE>(self.max_locals)?;
        let code_len = u32::try_from(self.code.len()).map_err(|_| ClassError::Attribute)?;
        out.write_u32::<BE>(code_len)?;
        out.extend_from_slice(&self.code);
        out.write_u16::<BE>((self.exception_table.len() / 8) as u16)?;
        out.extend_from_slice(&self.exception_table);
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }
}

/// A decoded class file.
#[derive(Clone, Debug)]
pub struct ClassFile {
    /// Minor version.
    pub minor_version: u16,
    /// Major version.
    pub major_version: u16,
    /// The constant pool.
    pub constant_pool: ConstantPool,
    /// JVM access flags.
    pub access_flags: u16,
    /// Class index of this class.
    pub this_class: u16,
    /// Class index of the superclass, 0 for `java/lang/Object` and modules.
    pub super_class: u16,
    /// Class indices of the implemented interfaces.
    pub interfaces: Vec<u16>,
    /// Field declarations.
    pub fields: Vec<MemberInfo>,
    /// Method declarations.
    pub methods: Vec<MemberInfo>,
    /// Class attributes.
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Creates an empty Java 8 class with the given name and superclass.
    pub fn new(access_flags: u16, name: &str, super_name: Option<&str>) -> Result<Self, ClassError> {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class(name)?;
        let super_class = match super_name {
            Some(super_name) => constant_pool.add_class(super_name)?,
            None => 0,
        };
        Ok(Self {
            minor_version: 0,
            major_version: 52,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Decodes a class file.
    pub fn parse(data: &[u8]) -> Result<Self, ClassError> {
        let mut rdr = data;
        if rdr.read_u32::<BE>()? != MAGIC {
            return Err(ClassError::BadMagic);
        }
        let minor_version = rdr.read_u16::<BE>()?;
        let major_version = rdr.read_u16::<BE>()?;
        let constant_pool = ConstantPool::read(&mut rdr)?;
        let access_flags = rdr.read_u16::<BE>()?;
        let this_class = rdr.read_u16::<BE>()?;
        let super_class = rdr.read_u16::<BE>()?;

        let interface_count = rdr.read_u16::<BE>()?;
        let interfaces = (0..interface_count)
            .map(|_| rdr.read_u16::<BE>())
            .collect::<Result<Vec<_>, _>>()?;

        let field_count = rdr.read_u16::<BE>()?;
        let fields = (0..field_count)
            .map(|_| MemberInfo::read(&mut rdr))
            .collect::<Result<Vec<_>, _>>()?;
        let method_count = rdr.read_u16::<BE>()?;
        let methods = (0..method_count)
            .map(|_| MemberInfo::read(&mut rdr))
            .collect::<Result<Vec<_>, _>>()?;
        let attributes = read_attributes(&mut rdr)?;

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Encodes the class file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassError> {
        let mut out = Vec::with_capacity(4096);
        out.write_u32::<BE>(MAGIC)?;
        out.write_u16::<BE>(self.minor_version)?;
        out.write_u16::<BE>(self.major_version)?;
        self.constant_pool.write(&mut out)?;
        out.write_u16::<BE>(self.access_flags)?;
        out.write_u16::<BE>(self.this_class)?;
        out.write_u16::<BE>(self.super_class)?;
        out.write_u16::<BE>(self.interfaces.len() as u16)?;
        for interface in &self.interfaces {
            out.write_u16::<BE>(*interface)?;
        }
        out.write_u16::<BE>(self.fields.len() as u16)?;
        for field in &self.fields {
            field.write(&mut out)?;
        }
        out.write_u16::<BE>(self.methods.len() as u16)?;
        for method in &self.methods {
            method.write(&mut out)?;
        }
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// The internal name of this class.
    pub fn name(&self) -> Result<&str, ClassError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// The internal name of the superclass, if any.
    pub fn super_name(&self) -> Result<Option<&str>, ClassError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    /// The internal names of the implemented interfaces.
    pub fn interface_names(&self) -> Result<Vec<&str>, ClassError> {
        self.interfaces
            .iter()
            .map(|&i| self.constant_pool.class_name(i))
            .collect()
    }

    /// Adds an interface.
    pub fn add_interface(&mut self, name: &str) -> Result<(), ClassError> {
        let index = self.constant_pool.add_class(name)?;
        self.interfaces.push(index);
        Ok(())
    }

    /// Declares a field.
    pub fn add_field(&mut self, access_flags: u16, name: &str, descriptor: &str) -> Result<&mut MemberInfo, ClassError> {
        let member = self.member(access_flags, name, descriptor)?;
        self.fields.push(member);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Declares a method, with a `Code` attribute when `code` is given.
    pub fn add_method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: Option<CodeAttribute>,
    ) -> Result<&mut MemberInfo, ClassError> {
        let mut member = self.member(access_flags, name, descriptor)?;
        if let Some(code) = code {
            let attribute = Attribute::new(&mut self.constant_pool, "Code", code.to_bytes()?)?;
            member.attributes.push(attribute);
        }
        self.methods.push(member);
        let last = self.methods.len() - 1;
        Ok(&mut self.methods[last])
    }

    fn member(&mut self, access_flags: u16, name: &str, descriptor: &str) -> Result<MemberInfo, ClassError> {
        Ok(MemberInfo {
            access_flags,
            name_index: self.constant_pool.add_utf8(name)?,
            descriptor_index: self.constant_pool.add_utf8(descriptor)?,
            attributes: Vec::new(),
        })
    }

    /// Adds a class level attribute.
    pub fn add_attribute(&mut self, name: &str, info: Vec<u8>) -> Result<(), ClassError> {
        let attribute = Attribute::new(&mut self.constant_pool, name, info)?;
        self.attributes.push(attribute);
        Ok(())
    }

    /// Finds the first class level attribute called `name`.
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name(&self.constant_pool).map_or(false, |n| n == name))
    }
}

/// The inheritance relevant part of a class: its name and direct parents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassHeader {
    /// JVM access flags.
    pub access_flags: u16,
    /// Internal class name.
    pub name: String,
    /// Superclass name, if any.
    pub super_name: Option<String>,
    /// Implemented interface names.
    pub interfaces: Vec<String>,
}

impl ClassHeader {
    /// Decodes just enough of a class file to know its parents.
    pub fn parse(data: &[u8]) -> Result<Self, ClassError> {
        ClassFile::parse(data)?.header()
    }

    /// Superclass first, then interfaces in declaration order.
    pub fn parents(&self) -> Vec<String> {
        self.super_name
            .iter()
            .chain(self.interfaces.iter())
            .cloned()
            .collect()
    }
}

impl ClassFile {
    /// Extracts the [`ClassHeader`].
    pub fn header(&self) -> Result<ClassHeader, ClassError> {
        Ok(ClassHeader {
            access_flags: self.access_flags,
            name: self.name()?.to_owned(),
            super_name: self.super_name()?.map(str::to_owned),
            interfaces: self
                .interface_names()?
                .into_iter()
                .map(str::to_owned)
                .collect(),
        })
    }
}
