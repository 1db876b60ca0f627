//! Constant pool parsing and symbolic rendering.
//!
//! Rendering resolves every reference down to names and descriptors, so the
//! text produced for a constant never depends on where the constant sits in
//! the pool. That is what lets two encodings of the same class compare equal.

use crate::error::ClassFormatError;
use crate::reader::ByteReader;

/// One constant pool slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0, and the second slot of every long/double.
    Unusable,
    Utf8(String),
    Integer(i32),
    /// Raw IEEE-754 bits; kept as bits so NaN payloads stay distinguishable.
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

/// Parsed constant pool, indexed exactly like the class file (1-based).
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

const HANDLE_KINDS: [&str; 9] = [
    "getField",
    "getStatic",
    "putField",
    "putStatic",
    "invokeVirtual",
    "invokeStatic",
    "invokeSpecial",
    "newInvokeSpecial",
    "invokeInterface",
];

impl ConstantPool {
    /// Parse `constant_pool_count` followed by the pool entries.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFormatError> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut slot: u32 = 1;
        while slot < u32::from(count) {
            let index = slot as u16;
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    let raw = reader.bytes(len)?;
                    Constant::Utf8(
                        decode_modified_utf8(raw).ok_or(ClassFormatError::InvalidUtf8(index))?,
                    )
                }
                3 => Constant::Integer(reader.i32()?),
                4 => Constant::Float(reader.u32()?),
                5 => Constant::Long(reader.u64()? as i64),
                6 => Constant::Double(reader.u64()?),
                7 => Constant::Class(reader.u16()?),
                8 => Constant::String(reader.u16()?),
                9 => Constant::Fieldref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                10 => Constant::Methodref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                11 => Constant::InterfaceMethodref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                16 => Constant::MethodType(reader.u16()?),
                17 => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                19 => Constant::Module(reader.u16()?),
                20 => Constant::Package(reader.u16()?),
                tag => return Err(ClassFormatError::UnknownConstantTag { index, tag }),
            };

            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            slot += 1;
            if wide {
                // The second slot must still fall inside the pool.
                if slot >= u32::from(count) {
                    return Err(ClassFormatError::BadConstantIndex(index));
                }
                entries.push(Constant::Unusable);
                slot += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFormatError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(ClassFormatError::BadConstantIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(ClassFormatError::WrongConstantKind {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal name of a `CONSTANT_Class` entry (e.g. `java/lang/Object`).
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(ClassFormatError::WrongConstantKind {
                index,
                expected: "Class",
            }),
        }
    }

    /// Like [`class_name`](Self::class_name) but index 0 means "absent".
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ClassFormatError> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    /// `(name, descriptor)` of a `CONSTANT_NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFormatError> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(ClassFormatError::WrongConstantKind {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Render the constant at `index` symbolically, independent of pool layout.
    pub fn render(&self, index: u16) -> Result<String, ClassFormatError> {
        let text = match self.get(index)? {
            Constant::Unusable => return Err(ClassFormatError::BadConstantIndex(index)),
            Constant::Utf8(s) => format!("{:?}", s),
            Constant::Integer(v) => v.to_string(),
            Constant::Float(bits) => {
                let v = f32::from_bits(*bits);
                if v.is_nan() {
                    format!("NaN(0x{:08x})F", bits)
                } else {
                    format!("{:?}F", v)
                }
            }
            Constant::Long(v) => format!("{}L", v),
            Constant::Double(bits) => {
                let v = f64::from_bits(*bits);
                if v.is_nan() {
                    format!("NaN(0x{:016x})D", bits)
                } else {
                    format!("{:?}D", v)
                }
            }
            Constant::Class(_) => self.class_name(index)?.to_string(),
            Constant::String(s) => format!("{:?}", self.utf8(*s)?),
            Constant::Fieldref { .. }
            | Constant::Methodref { .. }
            | Constant::InterfaceMethodref { .. } => self.member_ref(index)?,
            Constant::NameAndType { .. } => {
                let (name, desc) = self.name_and_type(index)?;
                format!("{} {}", name, desc)
            }
            Constant::MethodHandle { kind, reference } => {
                let kind_name = HANDLE_KINDS
                    .get((*kind as usize).wrapping_sub(1))
                    .ok_or(ClassFormatError::WrongConstantKind {
                        index,
                        expected: "MethodHandle with kind 1..=9",
                    })?;
                format!("handle {} {}", kind_name, self.member_ref(*reference)?)
            }
            Constant::MethodType(desc) => format!("methodtype {}", self.utf8(*desc)?),
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, desc) = self.name_and_type(*name_and_type)?;
                format!("condy {} {} bsm#{}", name, desc, bootstrap)
            }
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, desc) = self.name_and_type(*name_and_type)?;
                format!("indy {} {} bsm#{}", name, desc, bootstrap)
            }
            Constant::Module(name) => format!("module {}", self.utf8(*name)?),
            Constant::Package(name) => format!("package {}", self.utf8(*name)?),
        };
        Ok(text)
    }

    /// `owner.name descriptor` of a field or method reference; interface
    /// methods carry an ` (itf)` suffix.
    pub fn member_ref(&self, index: u16) -> Result<String, ClassFormatError> {
        let (class, name_and_type, itf) = match self.get(index)? {
            Constant::Fieldref {
                class,
                name_and_type,
            }
            | Constant::Methodref {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            _ => {
                return Err(ClassFormatError::WrongConstantKind {
                    index,
                    expected: "Fieldref, Methodref or InterfaceMethodref",
                })
            }
        };
        let (name, desc) = self.name_and_type(name_and_type)?;
        let owner = self.class_name(class)?;
        Ok(if itf {
            format!("{}.{} {} (itf)", owner, name, desc)
        } else {
            format!("{}.{} {}", owner, name, desc)
        })
    }
}

/// Decode the JVM's modified UTF-8 (two-byte NUL, surrogate pairs as two
/// three-byte sequences).
pub fn decode_modified_utf8(raw: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let a = raw[i] as u16;
        if a & 0x80 == 0 {
            if a == 0 {
                return None;
            }
            units.push(a);
            i += 1;
        } else if a & 0xE0 == 0xC0 {
            let b = *raw.get(i + 1)? as u16;
            if b & 0xC0 != 0x80 {
                return None;
            }
            units.push(((a & 0x1F) << 6) | (b & 0x3F));
            i += 2;
        } else if a & 0xF0 == 0xE0 {
            let b = *raw.get(i + 1)? as u16;
            let c = *raw.get(i + 2)? as u16;
            if b & 0xC0 != 0x80 || c & 0xC0 != 0x80 {
                return None;
            }
            units.push(((a & 0x0F) << 12) | ((b & 0x3F) << 6) | (c & 0x3F));
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

/// Encode a string as modified UTF-8.
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
