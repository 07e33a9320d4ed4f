use std::collections::HashMap;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use super::take;
use crate::error::ClassError;

const UTF_8: u8 = 1;
const INTEGER: u8 = 3;
const FLOAT: u8 = 4;
const LONG: u8 = 5;
const DOUBLE: u8 = 6;
const CLASS: u8 = 7;
const STRING: u8 = 8;
const FIELD_REF: u8 = 9;
const METHOD_REF: u8 = 10;
const INTERFACE_METHOD_REF: u8 = 11;
const NAME_AND_TYPE: u8 = 12;
const METHOD_HANDLE: u8 = 15;
const METHOD_TYPE: u8 = 16;
const DYNAMIC: u8 = 17;
const INVOKE_DYNAMIC: u8 = 18;
const MODULE: u8 = 19;
const PACKAGE: u8 = 20;

/// One constant pool entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Slot 0 and the second slot of longs and doubles.
    Unusable,
    /// `CONSTANT_Utf8`, decoded from modified UTF-8.
    Utf8(String),
    /// `CONSTANT_Utf8` holding unpaired surrogates, kept as raw bytes.
    ///
    /// Such strings never name a class or member, so they are written back
    /// unchanged.
    RawUtf8(Vec<u8>),
    /// `CONSTANT_Integer`.
    Integer(i32),
    /// `CONSTANT_Float`, as raw bits.
    Float(u32),
    /// `CONSTANT_Long`.
    Long(i64),
    /// `CONSTANT_Double`, as raw bits.
    Double(u64),
    /// `CONSTANT_Class`.
    Class {
        /// Utf8 index of the internal name or array descriptor.
        name_index: u16,
    },
    /// `CONSTANT_String`.
    String {
        /// Utf8 index of the string value.
        string_index: u16,
    },
    /// `CONSTANT_Fieldref`.
    FieldRef {
        /// Class index of the owner.
        class_index: u16,
        /// NameAndType index.
        name_and_type_index: u16,
    },
    /// `CONSTANT_Methodref`.
    MethodRef {
        /// Class index of the owner.
        class_index: u16,
        /// NameAndType index.
        name_and_type_index: u16,
    },
    /// `CONSTANT_InterfaceMethodref`.
    InterfaceMethodRef {
        /// Class index of the owner.
        class_index: u16,
        /// NameAndType index.
        name_and_type_index: u16,
    },
    /// `CONSTANT_NameAndType`.
    NameAndType {
        /// Utf8 index of the member name.
        name_index: u16,
        /// Utf8 index of the descriptor.
        descriptor_index: u16,
    },
    /// `CONSTANT_MethodHandle`.
    MethodHandle {
        /// Bytecode behavior kind, 1 to 9.
        reference_kind: u8,
        /// Index of the referenced member constant.
        reference_index: u16,
    },
    /// `CONSTANT_MethodType`.
    MethodType {
        /// Utf8 index of the method descriptor.
        descriptor_index: u16,
    },
    /// `CONSTANT_Dynamic`.
    Dynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// NameAndType index.
        name_and_type_index: u16,
    },
    /// `CONSTANT_InvokeDynamic`.
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// NameAndType index.
        name_and_type_index: u16,
    },
    /// `CONSTANT_Module`.
    Module {
        /// Utf8 index of the module name.
        name_index: u16,
    },
    /// `CONSTANT_Package`.
    Package {
        /// Utf8 index of the package name.
        name_index: u16,
    },
}

impl Constant {
    fn read(rdr: &mut &[u8]) -> Result<Self, ClassError> {
        Ok(match rdr.read_u8()? {
            UTF_8 => {
                let len = rdr.read_u16::<BE>()? as usize;
                let bytes = take(rdr, len)?;
                match cesu8::from_java_cesu8(bytes) {
                    Ok(text) => Constant::Utf8(text.into_owned()),
                    Err(_) => Constant::RawUtf8(bytes.to_vec()),
                }
            }
            INTEGER => Constant::Integer(rdr.read_i32::<BE>()?),
            FLOAT => Constant::Float(rdr.read_u32::<BE>()?),
            LONG => Constant::Long(rdr.read_i64::<BE>()?),
            DOUBLE => Constant::Double(rdr.read_u64::<BE>()?),
            CLASS => Constant::Class {
                name_index: rdr.read_u16::<BE>()?,
            },
            STRING => Constant::String {
                string_index: rdr.read_u16::<BE>()?,
            },
            tag @ (FIELD_REF | METHOD_REF | INTERFACE_METHOD_REF) => {
                let class_index = rdr.read_u16::<BE>()?;
                let name_and_type_index = rdr.read_u16::<BE>()?;
                match tag {
                    FIELD_REF => Constant::FieldRef {
                        class_index,
                        name_and_type_index,
                    },
                    METHOD_REF => Constant::MethodRef {
                        class_index,
                        name_and_type_index,
                    },
                    _ => Constant::InterfaceMethodRef {
                        class_index,
                        name_and_type_index,
                    },
                }
            }
            NAME_AND_TYPE => Constant::NameAndType {
                name_index: rdr.read_u16::<BE>()?,
                descriptor_index: rdr.read_u16::<BE>()?,
            },
            METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: rdr.read_u8()?,
                reference_index: rdr.read_u16::<BE>()?,
            },
            METHOD_TYPE => Constant::MethodType {
                descriptor_index: rdr.read_u16::<BE>()?,
            },
            tag @ (DYNAMIC | INVOKE_DYNAMIC) => {
                let bootstrap_method_attr_index = rdr.read_u16::<BE>()?;
                let name_and_type_index = rdr.read_u16::<BE>()?;
                if tag == DYNAMIC {
                    Constant::Dynamic {
                        bootstrap_method_attr_index,
                        name_and_type_index,
                    }
                } else {
                    Constant::InvokeDynamic {
                        bootstrap_method_attr_index,
                        name_and_type_index,
                    }
                }
            }
            MODULE => Constant::Module {
                name_index: rdr.read_u16::<BE>()?,
            },
            PACKAGE => Constant::Package {
                name_index: rdr.read_u16::<BE>()?,
            },
            tag => return Err(ClassError::BadConstant(tag)),
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassError> {
        match *self {
            Constant::Unusable => {}
            Constant::Utf8(ref text) => {
                let bytes = cesu8::to_java_cesu8(text);
                let len = u16::try_from(bytes.len()).map_err(|_| ClassError::InvalidUtf8)?;
                out.write_u8(UTF_8)?;
                out.write_u16::<BE>(len)?;
                out.extend_from_slice(&bytes);
            }
            Constant::RawUtf8(ref bytes) => {
                let len = u16::try_from(bytes.len()).map_err(|_| ClassError::InvalidUtf8)?;
                out.write_u8(UTF_8)?;
                out.write_u16::<BE>(len)?;
                out.extend_from_slice(bytes);
            }
            Constant::Integer(v) => {
                out.write_u8(INTEGER)?;
                out.write_i32::<BE>(v)?;
            }
            Constant::Float(v) => {
                out.write_u8(FLOAT)?;
                out.write_u32::<BE>(v)?;
            }
            Constant::Long(v) => {
                out.write_u8(LONG)?;
                out.write_i64::<BE>(v)?;
            }
            Constant::Double(v) => {
                out.write_u8(DOUBLE)?;
                out.write_u64::<BE>(v)?;
            }
            Constant::Class { name_index } => {
                out.write_u8(CLASS)?;
                out.write_u16::<BE>(name_index)?;
            }
            Constant::String { string_index } => {
                out.write_u8(STRING)?;
                out.write_u16::<BE>(string_index)?;
            }
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => write_pair(out, FIELD_REF, class_index, name_and_type_index)?,
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => write_pair(out, METHOD_REF, class_index, name_and_type_index)?,
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => write_pair(out, INTERFACE_METHOD_REF, class_index, name_and_type_index)?,
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => write_pair(out, NAME_AND_TYPE, name_index, descriptor_index)?,
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                out.write_u8(METHOD_HANDLE)?;
                out.write_u8(reference_kind)?;
                out.write_u16::<BE>(reference_index)?;
            }
            Constant::MethodType { descriptor_index } => {
                out.write_u8(METHOD_TYPE)?;
                out.write_u16::<BE>(descriptor_index)?;
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => write_pair(out, DYNAMIC, bootstrap_method_attr_index, name_and_type_index)?,
            Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => write_pair(
                out,
                INVOKE_DYNAMIC,
                bootstrap_method_attr_index,
                name_and_type_index,
            )?,
            Constant::Module { name_index } => {
                out.write_u8(MODULE)?;
                out.write_u16::<BE>(name_index)?;
            }
            Constant::Package { name_index } => {
                out.write_u8(PACKAGE)?;
                out.write_u16::<BE>(name_index)?;
            }
        }
        Ok(())
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

fn write_pair(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) -> Result<(), ClassError> {
    out.write_u8(tag)?;
    out.write_u16::<BE>(a)?;
    out.write_u16::<BE>(b)?;
    Ok(())
}

/// A class file constant pool.
///
/// Indices are the on-disk ones: slot 0 is unusable, and longs and doubles
/// occupy two slots. New entries are only ever appended.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    utf8_lookup: HashMap<String, u16>,
    nat_lookup: HashMap<(u16, u16), u16>,
}

impl ConstantPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
            utf8_lookup: HashMap::new(),
            nat_lookup: HashMap::new(),
        }
    }

    pub(crate) fn read(rdr: &mut &[u8]) -> Result<Self, ClassError> {
        let count = rdr.read_u16::<BE>()? as usize;
        let mut pool = Self::new();
        pool.entries.reserve(count);
        while pool.entries.len() < count {
            let constant = Constant::read(rdr)?;
            pool.index_entry(pool.entries.len() as u16, &constant);
            let wide = constant.is_wide();
            pool.entries.push(constant);
            if wide {
                pool.entries.push(Constant::Unusable);
            }
        }
        Ok(pool)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassError> {
        let count = u16::try_from(self.entries.len()).map_err(|_| ClassError::PoolOverflow)?;
        out.write_u16::<BE>(count)?;
        for constant in &self.entries {
            constant.write(out)?;
        }
        Ok(())
    }

    fn index_entry(&mut self, index: u16, constant: &Constant) {
        match *constant {
            Constant::Utf8(ref text) => {
                self.utf8_lookup.entry(text.clone()).or_insert(index);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                self.nat_lookup
                    .entry((name_index, descriptor_index))
                    .or_insert(index);
            }
            _ => {}
        }
    }

    /// The value to write as `constant_pool_count`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no usable entries.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Iterates over `(index, constant)` pairs, skipping unusable slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| (i as u16, c))
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: u16) -> Result<&Constant, ClassError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(ClassError::BadIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    /// Replaces the entry at `index` with one of the same width.
    pub fn set(&mut self, index: u16, constant: Constant) -> Result<(), ClassError> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or(ClassError::BadIndex(index))?;
        if matches!(slot, Constant::Unusable) || slot.is_wide() != constant.is_wide() {
            return Err(ClassError::BadIndex(index));
        }
        let previous = std::mem::replace(slot, constant.clone());
        match previous {
            Constant::Utf8(text) if self.utf8_lookup.get(&text) == Some(&index) => {
                self.utf8_lookup.remove(&text);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } if self.nat_lookup.get(&(name_index, descriptor_index)) == Some(&index) => {
                self.nat_lookup.remove(&(name_index, descriptor_index));
            }
            _ => {}
        }
        self.index_entry(index, &constant);
        Ok(())
    }

    /// Returns the string of the Utf8 entry at `index`.
    pub fn utf8(&self, index: u16) -> Result<&str, ClassError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassError::BadIndex(index)),
        }
    }

    /// Returns the name of the Class entry at `index`.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassError> {
        match *self.get(index)? {
            Constant::Class { name_index } => self.utf8(name_index),
            _ => Err(ClassError::BadIndex(index)),
        }
    }

    /// Returns the `(name, descriptor)` of the NameAndType entry at `index`.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassError> {
        match *self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?)),
            _ => Err(ClassError::BadIndex(index)),
        }
    }

    /// Returns `(owner, name, descriptor)` of a field, method or interface
    /// method reference.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str), ClassError> {
        match *self.get(index)? {
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
                let (name, desc) = self.name_and_type(name_and_type_index)?;
                Ok((self.class_name(class_index)?, name, desc))
            }
            _ => Err(ClassError::BadIndex(index)),
        }
    }

    /// Appends an entry and returns its index.
    pub fn push(&mut self, constant: Constant) -> Result<u16, ClassError> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(ClassError::PoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.index_entry(index, &constant);
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Returns the index of a Utf8 entry with this text, appending one if needed.
    pub fn add_utf8(&mut self, text: &str) -> Result<u16, ClassError> {
        if let Some(&index) = self.utf8_lookup.get(text) {
            return Ok(index);
        }
        self.push(Constant::Utf8(text.to_owned()))
    }

    /// Returns the index of a NameAndType entry, appending one if needed.
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassError> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        if let Some(&index) = self.nat_lookup.get(&(name_index, descriptor_index)) {
            return Ok(index);
        }
        self.push(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Returns the index of a Class entry for `name`, appending one if needed.
    pub fn add_class(&mut self, name: &str) -> Result<u16, ClassError> {
        let name_index = self.add_utf8(name)?;
        let existing = self.iter().find_map(|(i, c)| match *c {
            Constant::Class { name_index: n } if n == name_index => Some(i),
            _ => None,
        });
        match existing {
            Some(index) => Ok(index),
            None => self.push(Constant::Class { name_index }),
        }
    }

    /// Appends a String entry.
    pub fn add_string(&mut self, value: &str) -> Result<u16, ClassError> {
        let string_index = self.add_utf8(value)?;
        self.push(Constant::String { string_index })
    }

    /// Appends a field reference.
    pub fn add_field_ref(&mut self, owner: &str, name: &str, desc: &str) -> Result<u16, ClassError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, desc)?;
        self.push(Constant::FieldRef {
            class_index,
            name_and_type_index,
        })
    }

    /// Appends a method reference.
    pub fn add_method_ref(&mut self, owner: &str, name: &str, desc: &str) -> Result<u16, ClassError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, desc)?;
        self.push(Constant::MethodRef {
            class_index,
            name_and_type_index,
        })
    }

    /// Appends an interface method reference.
    pub fn add_interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<u16, ClassError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, desc)?;
        self.push(Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        })
    }
}
