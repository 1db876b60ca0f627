//! Decoders for the structured attributes that carry constant pool indices.
//!
//! Each decoder consumes the whole payload; leftover bytes are reported as a
//! malformed attribute.

use crate::class_file::{parse_attributes, Attribute};
use crate::constant_pool::ConstantPool;
use crate::error::ClassFormatError;
use crate::reader::ByteReader;

fn finish(reader: &ByteReader<'_>, attribute: &'static str) -> Result<(), ClassFormatError> {
    if reader.is_empty() {
        Ok(())
    } else {
        Err(ClassFormatError::MalformedAttribute {
            attribute,
            reason: format!("{} unexpected trailing bytes", reader.remaining()),
        })
    }
}

/// Payload that is exactly one pool index (`Signature`, `ConstantValue`,
/// `NestHost`, `SourceFile`, ...).
pub fn single_index(data: &[u8], attribute: &'static str) -> Result<u16, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let index = reader.u16()?;
    finish(&reader, attribute)?;
    Ok(index)
}

/// Payload that is a u16 count followed by pool indices (`Exceptions`,
/// `NestMembers`, `PermittedSubclasses`).
pub fn index_list(data: &[u8], attribute: &'static str) -> Result<Vec<u16>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(reader.u16()?);
    }
    finish(&reader, attribute)?;
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class: u16,
    pub outer_class: u16,
    pub inner_name: u16,
    pub access_flags: u16,
}

pub fn inner_classes(data: &[u8]) -> Result<Vec<InnerClassEntry>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(InnerClassEntry {
            inner_class: reader.u16()?,
            outer_class: reader.u16()?,
            inner_name: reader.u16()?,
            access_flags: reader.u16()?,
        });
    }
    finish(&reader, "InnerClasses")?;
    Ok(out)
}

/// `(class_index, method_index)`; the method index is a NameAndType or 0.
pub fn enclosing_method(data: &[u8]) -> Result<(u16, u16), ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let class = reader.u16()?;
    let method = reader.u16()?;
    finish(&reader, "EnclosingMethod")?;
    Ok((class, method))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

pub fn bootstrap_methods(data: &[u8]) -> Result<Vec<BootstrapMethod>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let method_ref = reader.u16()?;
        let argc = reader.u16()?;
        let mut arguments = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            arguments.push(reader.u16()?);
        }
        out.push(BootstrapMethod {
            method_ref,
            arguments,
        });
    }
    finish(&reader, "BootstrapMethods")?;
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

pub fn record_components(
    data: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<RecordComponent>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(RecordComponent {
            name: reader.u16()?,
            descriptor: reader.u16()?,
            attributes: parse_attributes(&mut reader, pool)?,
        });
    }
    finish(&reader, "Record")?;
    Ok(out)
}

/// An annotation (JVMS §4.7.16).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub type_index: u16,
    pub elements: Vec<(u16, ElementValue)>,
}

/// An annotation element value (JVMS §4.7.16.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant; `tag` is one of `BCDFIJSZs`.
    Const { tag: u8, index: u16 },
    Enum { type_name: u16, const_name: u16 },
    Class(u16),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

/// Deepest nesting of annotations and arrays accepted in an element value.
pub const MAX_ELEMENT_DEPTH: usize = 64;

fn annotation(reader: &mut ByteReader<'_>, depth: usize) -> Result<Annotation, ClassFormatError> {
    let type_index = reader.u16()?;
    let count = reader.u16()?;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.u16()?;
        elements.push((name, element_value(reader, depth)?));
    }
    Ok(Annotation {
        type_index,
        elements,
    })
}

fn element_value(reader: &mut ByteReader<'_>, depth: usize) -> Result<ElementValue, ClassFormatError> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(ClassFormatError::MalformedAttribute {
            attribute: "annotation",
            reason: format!("element values nested deeper than {}", MAX_ELEMENT_DEPTH),
        });
    }
    let tag = reader.u8()?;
    Ok(match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
            tag,
            index: reader.u16()?,
        },
        b'e' => ElementValue::Enum {
            type_name: reader.u16()?,
            const_name: reader.u16()?,
        },
        b'c' => ElementValue::Class(reader.u16()?),
        b'@' => ElementValue::Annotation(annotation(reader, depth + 1)?),
        b'[' => {
            let count = reader.u16()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(element_value(reader, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => {
            return Err(ClassFormatError::MalformedAttribute {
                attribute: "annotation",
                reason: format!("unknown element_value tag {:?}", other as char),
            })
        }
    })
}

/// `Runtime{Visible,Invisible}Annotations`.
pub fn annotations(data: &[u8]) -> Result<Vec<Annotation>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(annotation(&mut reader, 0)?);
    }
    finish(&reader, "RuntimeAnnotations")?;
    Ok(out)
}

/// `Runtime{Visible,Invisible}ParameterAnnotations`, one list per parameter.
pub fn parameter_annotations(data: &[u8]) -> Result<Vec<Vec<Annotation>>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let params = reader.u8()?;
    let mut out = Vec::with_capacity(params as usize);
    for _ in 0..params {
        let count = reader.u16()?;
        let mut list = Vec::with_capacity(count as usize);
        for _ in 0..count {
            list.push(annotation(&mut reader, 0)?);
        }
        out.push(list);
    }
    finish(&reader, "RuntimeParameterAnnotations")?;
    Ok(out)
}

/// `AnnotationDefault`: a single element value.
pub fn annotation_default(data: &[u8]) -> Result<ElementValue, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let value = element_value(&mut reader, 0)?;
    finish(&reader, "AnnotationDefault")?;
    Ok(value)
}

/// A `verification_type_info` entry (JVMS §4.7.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Pool index of a `CONSTANT_Class`.
    Object(u16),
    /// Code offset of the `new` that created the value.
    Uninitialized(usize),
}

/// What a frame says about locals and stack, relative to the previous one.
///
/// The `_extended` encodings fold into their short forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    Chop(u8),
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

/// One stack map frame, at an absolute code offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub offset: usize,
    pub kind: FrameKind,
}

fn verification_type(reader: &mut ByteReader<'_>) -> Result<VerificationType, ClassFormatError> {
    Ok(match reader.u8()? {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(reader.u16()?),
        8 => VerificationType::Uninitialized(reader.u16()? as usize),
        tag => {
            return Err(ClassFormatError::MalformedAttribute {
                attribute: "StackMapTable",
                reason: format!("unknown verification type tag {}", tag),
            })
        }
    })
}

fn verification_types(
    reader: &mut ByteReader<'_>,
    count: usize,
) -> Result<Vec<VerificationType>, ClassFormatError> {
    (0..count).map(|_| verification_type(reader)).collect()
}

/// `StackMapTable`, with offset deltas resolved to absolute offsets.
pub fn stack_map_table(data: &[u8]) -> Result<Vec<StackMapFrame>, ClassFormatError> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<usize> = None;
    for _ in 0..count {
        let frame_type = reader.u8()?;
        let (delta, kind) = match frame_type {
            0..=63 => (frame_type as usize, FrameKind::Same),
            64..=127 => (
                frame_type as usize - 64,
                FrameKind::SameLocals1StackItem(verification_type(&mut reader)?),
            ),
            247 => {
                let delta = reader.u16()? as usize;
                (
                    delta,
                    FrameKind::SameLocals1StackItem(verification_type(&mut reader)?),
                )
            }
            248..=250 => (reader.u16()? as usize, FrameKind::Chop(251 - frame_type)),
            251 => (reader.u16()? as usize, FrameKind::Same),
            252..=254 => {
                let delta = reader.u16()? as usize;
                let locals = verification_types(&mut reader, (frame_type - 251) as usize)?;
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = reader.u16()? as usize;
                let local_count = reader.u16()? as usize;
                let locals = verification_types(&mut reader, local_count)?;
                let stack_count = reader.u16()? as usize;
                let stack = verification_types(&mut reader, stack_count)?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => {
                return Err(ClassFormatError::MalformedAttribute {
                    attribute: "StackMapTable",
                    reason: format!("reserved frame type {}", reserved),
                })
            }
        };
        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame { offset, kind });
    }
    finish(&reader, "StackMapTable")?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_list() {
        let data = [0x00, 0x02, 0x00, 0x05, 0x00, 0x09];
        assert_eq!(index_list(&data, "Exceptions").unwrap(), vec![5, 9]);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = single_index(&[0x00, 0x01, 0xff], "Signature").unwrap_err();
        assert!(matches!(
            err,
            ClassFormatError::MalformedAttribute {
                attribute: "Signature",
                ..
            }
        ));
    }

    #[test]
    fn test_nested_annotation() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x01,             // one annotation
            0x00, 0x04, 0x00, 0x01, // type #4, one element
            0x00, 0x05,             // name #5
            b'[', 0x00, 0x02,       // array of two
            b's', 0x00, 0x06,
            b'e', 0x00, 0x07, 0x00, 0x08,
        ];
        let parsed = annotations(&data).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed[0].elements[0].1,
            ElementValue::Array(vec![
                ElementValue::Const { tag: b's', index: 6 },
                ElementValue::Enum {
                    type_name: 7,
                    const_name: 8
                },
            ])
        );
    }

    #[test]
    fn test_element_nesting_is_bounded() {
        let mut data = Vec::new();
        for _ in 0..10_000 {
            data.extend_from_slice(&[b'[', 0x00, 0x01]);
        }
        data.extend_from_slice(&[b'I', 0x00, 0x01]);
        let err = annotation_default(&data).unwrap_err();
        assert!(matches!(
            err,
            ClassFormatError::MalformedAttribute {
                attribute: "annotation",
                ..
            }
        ));
    }

    #[test]
    fn test_element_nesting_within_limit() {
        let mut data = Vec::new();
        for _ in 0..MAX_ELEMENT_DEPTH {
            data.extend_from_slice(&[b'[', 0x00, 0x01]);
        }
        data.extend_from_slice(&[b'I', 0x00, 0x01]);
        assert!(annotation_default(&data).is_ok());
    }

    #[test]
    fn test_stack_map_offsets_are_absolute() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x04,                   // four frames
            0x03,                         // same @3
            0x40, 0x01,                   // same_locals_1_stack_item @4, int
            0xFC, 0x00, 0x02, 0x07, 0x00, 0x09, // append @7, Object #9
            0xFF, 0x00, 0x00,             // full @8
            0x00, 0x01, 0x08, 0x00, 0x00, // locals: uninitialized @0
            0x00, 0x00,                   // empty stack
        ];
        let frames = stack_map_table(&data).unwrap();
        let offsets: Vec<usize> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![3, 4, 7, 8]);
        assert_eq!(
            frames[1].kind,
            FrameKind::SameLocals1StackItem(VerificationType::Integer)
        );
        assert_eq!(
            frames[2].kind,
            FrameKind::Append(vec![VerificationType::Object(9)])
        );
        assert_eq!(
            frames[3].kind,
            FrameKind::Full {
                locals: vec![VerificationType::Uninitialized(0)],
                stack: vec![],
            }
        );
    }

    #[test]
    fn test_extended_frames_fold_to_short_forms() {
        #[rustfmt::skip]
        let short = [0x00, 0x02, 0x05, 0x41, 0x02];
        #[rustfmt::skip]
        let extended = [
            0x00, 0x02,
            0xFB, 0x00, 0x05,       // same_frame_extended @5
            0xF7, 0x00, 0x01, 0x02, // same_locals_1_stack_item_extended @7, float
        ];
        assert_eq!(
            stack_map_table(&short).unwrap(),
            stack_map_table(&extended).unwrap()
        );
    }

    #[test]
    fn test_reserved_frame_type_rejected() {
        assert!(stack_map_table(&[0x00, 0x01, 0x80]).is_err());
    }

    #[test]
    fn test_unknown_element_tag() {
        let data = [0x00, 0x01, 0x00, 0x04, 0x00, 0x01, 0x00, 0x05, b'?'];
        assert!(annotations(&data).is_err());
    }
}
