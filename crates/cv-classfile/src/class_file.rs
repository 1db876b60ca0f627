//! Top-level class-file structure (JVMS §4.1).

use serde::Serialize;

use crate::constant_pool::ConstantPool;
use crate::error::ClassFormatError;
use crate::reader::ByteReader;

/// Class-file magic number.
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// A raw attribute: resolved name plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub data: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

impl Member {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A parsed class file.
///
/// Names are resolved out of the constant pool; the pool itself is kept so
/// attribute payloads that still carry indices can be decoded later.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parse a complete class file. Trailing bytes are an error.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ByteReader::new(bytes);

        let magic = reader.u32()?;
        if magic != CLASS_MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.u16()?;
        let this_class = constant_pool.class_name(reader.u16()?)?.to_string();
        let super_class = constant_pool
            .optional_class_name(reader.u16()?)?
            .map(str::to_string);

        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(constant_pool.class_name(reader.u16()?)?.to_string());
        }

        let fields = parse_members(&mut reader, &constant_pool)?;
        let methods = parse_members(&mut reader, &constant_pool)?;
        let attributes = parse_attributes(&mut reader, &constant_pool)?;

        if !reader.is_empty() {
            return Err(ClassFormatError::TrailingBytes(reader.remaining()));
        }

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

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

fn parse_members(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Member>, ClassFormatError> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.u16()?;
        let name = pool.utf8(reader.u16()?)?.to_string();
        let descriptor = pool.utf8(reader.u16()?)?.to_string();
        let attributes = parse_attributes(reader, pool)?;
        members.push(Member {
            access_flags,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

/// Parse an `attributes_count` + `attribute_info[]` table.
pub fn parse_attributes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Attribute>, ClassFormatError> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(reader.u16()?)?.to_string();
        let len = reader.u32()? as usize;
        let data = reader.bytes(len)?.to_vec();
        attributes.push(Attribute { name, data });
    }
    Ok(attributes)
}
