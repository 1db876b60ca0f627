//! JVM class-file support for codegen-verify.
//!
//! Parses the class-file container into a structural model (constant pool,
//! members, raw attributes), decodes bytecode, decodes the structured
//! attributes that reference the constant pool, and writes class files for
//! fixtures.

pub mod attributes;
mod class_file;
mod code;
mod constant_pool;
mod error;
pub mod opcodes;
mod reader;
mod writer;

pub use class_file::{parse_attributes, Attribute, ClassFile, Member, CLASS_MAGIC};
pub use code::{decode_instructions, CodeAttribute, ExceptionHandler, Instruction, Operand};
pub use constant_pool::{decode_modified_utf8, encode_modified_utf8, Constant, ConstantPool};
pub use error::ClassFormatError;
pub use reader::ByteReader;
pub use writer::{ClassWriter, CodeBuilder, PoolBuilder};

/// Parse a complete class file.
pub fn parse(bytes: &[u8]) -> Result<ClassFile, ClassFormatError> {
    ClassFile::parse(bytes)
}

/// True if `bytes` starts with the class-file magic number.
pub fn has_class_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == CLASS_MAGIC.to_be_bytes()
}
