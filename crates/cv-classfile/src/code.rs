//! `Code` attribute parsing and bytecode decoding.

use crate::class_file::{parse_attributes, Attribute};
use crate::constant_pool::ConstantPool;
use crate::error::ClassFormatError;
use crate::opcodes::{self, mnemonic};
use crate::reader::ByteReader;

/// One entry of a method's exception table, still in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant pool index of the caught class, 0 for `finally`.
    pub catch_type: u16,
}

/// Decoded `Code` attribute (JVMS §4.7.3).
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    pub fn parse(data: &[u8], pool: &ConstantPool) -> Result<Self, ClassFormatError> {
        let mut reader = ByteReader::new(data);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_len = reader.u32()? as usize;
        let code = reader.bytes(code_len)?.to_vec();

        let handler_count = reader.u16()?;
        let mut exception_table = Vec::with_capacity(handler_count as usize);
        for _ in 0..handler_count {
            exception_table.push(ExceptionHandler {
                start_pc: reader.u16()?,
                end_pc: reader.u16()?,
                handler_pc: reader.u16()?,
                catch_type: reader.u16()?,
            });
        }

        let attributes = parse_attributes(&mut reader, pool)?;
        if !reader.is_empty() {
            return Err(ClassFormatError::MalformedAttribute {
                attribute: "Code",
                reason: format!("{} bytes past the nested attribute table", reader.remaining()),
            });
        }

        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Decode the bytecode array.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ClassFormatError> {
        decode_instructions(&self.code)
    }
}

/// Operand of a decoded instruction. Branch targets are absolute byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    /// `bipush` / `sipush` immediate.
    Int(i32),
    /// Local variable slot (`iload`, `astore`, `ret`, ...).
    Local(u16),
    /// Constant pool reference (`ldc`, field/method instructions, `new`, ...).
    Constant(u16),
    Iinc { local: u16, delta: i16 },
    Branch(usize),
    InvokeInterface { index: u16, count: u8 },
    NewArray(u8),
    MultiANewArray { index: u16, dimensions: u8 },
    TableSwitch {
        default: usize,
        low: i32,
        targets: Vec<usize>,
    },
    LookupSwitch {
        default: usize,
        pairs: Vec<(i32, usize)>,
    },
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset within the code array.
    pub offset: usize,
    /// Opcode, with `wide` already unwrapped to the modified opcode.
    pub opcode: u8,
    /// Whether the instruction was encoded behind a `wide` prefix.
    pub wide: bool,
    pub operand: Operand,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        // decode_instructions never yields an undefined opcode
        mnemonic(self.opcode).unwrap_or("???")
    }
}

/// Decode a bytecode array into instructions, validating branch targets.
pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, ClassFormatError> {
    let mut reader = ByteReader::new(code);
    let mut out = Vec::new();

    while !reader.is_empty() {
        let offset = reader.offset();
        let mut opcode = reader.u8()?;
        let mut wide = false;
        if mnemonic(opcode).is_none() {
            return Err(ClassFormatError::UnknownOpcode { offset, opcode });
        }

        let branch = |delta: i64| -> Result<usize, ClassFormatError> {
            let target = offset as i64 + delta;
            usize::try_from(target).map_err(|_| ClassFormatError::BadBranchTarget { offset, target })
        };

        let operand = match opcode {
            opcodes::BIPUSH => Operand::Int(reader.i8()? as i32),
            opcodes::SIPUSH => Operand::Int(reader.i16()? as i32),
            opcodes::LDC => Operand::Constant(reader.u8()? as u16),
            opcodes::LDC_W | opcodes::LDC2_W => Operand::Constant(reader.u16()?),
            0x15..=0x19 | 0x36..=0x3a | 0xa9 => Operand::Local(reader.u8()? as u16),
            opcodes::IINC => Operand::Iinc {
                local: reader.u8()? as u16,
                delta: reader.i8()? as i16,
            },
            0x99..=0xa8 | opcodes::IFNULL | opcodes::IFNONNULL => {
                Operand::Branch(branch(reader.i16()? as i64)?)
            }
            opcodes::GOTO_W | opcodes::JSR_W => Operand::Branch(branch(reader.i32()? as i64)?),
            opcodes::TABLESWITCH => {
                reader.align4()?;
                let default = branch(reader.i32()? as i64)?;
                let low = reader.i32()?;
                let high = reader.i32()?;
                if high < low {
                    return Err(ClassFormatError::MalformedAttribute {
                        attribute: "Code",
                        reason: format!("tableswitch at {} has high {} < low {}", offset, high, low),
                    });
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                if count > reader.remaining() / 4 {
                    return Err(ClassFormatError::UnexpectedEof {
                        offset: reader.offset(),
                        needed: count * 4 - reader.remaining(),
                    });
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(branch(reader.i32()? as i64)?);
                }
                Operand::TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            opcodes::LOOKUPSWITCH => {
                reader.align4()?;
                let default = branch(reader.i32()? as i64)?;
                let npairs = reader.i32()?;
                let npairs = usize::try_from(npairs).map_err(|_| {
                    ClassFormatError::MalformedAttribute {
                        attribute: "Code",
                        reason: format!("lookupswitch at {} has negative npairs", offset),
                    }
                })?;
                if npairs > reader.remaining() / 8 {
                    return Err(ClassFormatError::UnexpectedEof {
                        offset: reader.offset(),
                        needed: npairs * 8 - reader.remaining(),
                    });
                }
                let mut pairs = Vec::with_capacity(npairs);
                for _ in 0..npairs {
                    let key = reader.i32()?;
                    pairs.push((key, branch(reader.i32()? as i64)?));
                }
                Operand::LookupSwitch { default, pairs }
            }
            opcodes::GETSTATIC..=opcodes::INVOKESTATIC
            | opcodes::NEW
            | opcodes::ANEWARRAY
            | opcodes::CHECKCAST
            | opcodes::INSTANCEOF => Operand::Constant(reader.u16()?),
            opcodes::INVOKEINTERFACE => {
                let index = reader.u16()?;
                let count = reader.u8()?;
                reader.u8()?;
                Operand::InvokeInterface { index, count }
            }
            opcodes::INVOKEDYNAMIC => {
                let index = reader.u16()?;
                reader.u16()?;
                Operand::Constant(index)
            }
            opcodes::NEWARRAY => Operand::NewArray(reader.u8()?),
            opcodes::MULTIANEWARRAY => Operand::MultiANewArray {
                index: reader.u16()?,
                dimensions: reader.u8()?,
            },
            opcodes::WIDE => {
                let inner_offset = reader.offset();
                opcode = reader.u8()?;
                wide = true;
                match opcode {
                    opcodes::IINC => Operand::Iinc {
                        local: reader.u16()?,
                        delta: reader.i16()?,
                    },
                    0x15..=0x19 | 0x36..=0x3a | 0xa9 => Operand::Local(reader.u16()?),
                    _ => {
                        return Err(ClassFormatError::UnknownOpcode {
                            offset: inner_offset,
                            opcode,
                        })
                    }
                }
            }
            _ => Operand::None,
        };

        out.push(Instruction {
            offset,
            opcode,
            wide,
            operand,
        });
    }

    validate_branch_targets(&out, code.len())?;
    Ok(out)
}

fn validate_branch_targets(
    instructions: &[Instruction],
    code_len: usize,
) -> Result<(), ClassFormatError> {
    let is_boundary = |target: usize| {
        target < code_len
            && instructions
                .binary_search_by_key(&target, |insn| insn.offset)
                .is_ok()
    };

    for insn in instructions {
        let targets: Vec<usize> = match &insn.operand {
            Operand::Branch(t) => vec![*t],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, t)| *t))
                .collect(),
            _ => continue,
        };
        if let Some(bad) = targets.into_iter().find(|t| !is_boundary(*t)) {
            return Err(ClassFormatError::BadBranchTarget {
                offset: insn.offset,
                target: bad as i64,
            });
        }
    }
    Ok(())
}
