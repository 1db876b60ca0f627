//! Error types for class-file parsing.

/// Errors raised while reading a class file or one of its attributes.
///
/// Offsets are byte positions within the buffer being read (the whole class
/// file for structural errors, the `code` array for bytecode errors).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFormatError {
    #[error("unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("bad magic 0x{0:08X} (expected 0xCAFEBABE)")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { index: u16, tag: u8 },

    #[error("constant pool index {0} is out of range or unusable")]
    BadConstantIndex(u16),

    #[error("constant pool index {index} is not a {expected}")]
    WrongConstantKind { index: u16, expected: &'static str },

    #[error("constant pool index {0} holds invalid modified UTF-8")]
    InvalidUtf8(u16),

    #[error("unknown opcode 0x{opcode:02X} at code offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("branch at code offset {offset} targets {target}, which is not an instruction boundary")]
    BadBranchTarget { offset: usize, target: i64 },

    #[error("malformed {attribute} attribute: {reason}")]
    MalformedAttribute {
        attribute: &'static str,
        reason: String,
    },

    #[error("{0} trailing bytes after end of class file")]
    TrailingBytes(usize),
}
