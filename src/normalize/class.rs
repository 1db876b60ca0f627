//! JVM class-file canonicalization.
//!
//! Produces a textual listing in the spirit of a bytecode disassembler:
//! every constant pool reference is resolved to names and descriptors,
//! instructions are labelled by ordinal rather than byte offset, and
//! `ldc`/`ldc_w`/`wide` encodings collapse to one spelling. With members
//! sorted and stripped attributes dropped, two class files that differ only
//! in layout or debug metadata yield identical text.

use cv_classfile::attributes::{
    self, Annotation, ElementValue, FrameKind, StackMapFrame, VerificationType,
};
use cv_classfile::{
    opcodes, Attribute, ClassFile, ClassFormatError, CodeAttribute, ConstantPool, Instruction,
    Member, Operand,
};

use super::opaque::hex_lines;
use super::{ArtifactFormat, MalformedArtifactError, NormalizeOptions};
use crate::artifact::{ArtifactKind, NamedArtifact};

/// Attributes may nest (`Record` components, `Code` attributes); past this
/// indentation the input is rejected.
const MAX_NESTING: usize = 32;

const CLASS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0010, "final"),
    (0x0020, "super"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
    (0x8000, "module"),
];

const FIELD_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0040, "volatile"),
    (0x0080, "transient"),
    (0x1000, "synthetic"),
    (0x4000, "enum"),
];

const METHOD_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0020, "synchronized"),
    (0x0040, "bridge"),
    (0x0080, "varargs"),
    (0x0100, "native"),
    (0x0400, "abstract"),
    (0x0800, "strict"),
    (0x1000, "synthetic"),
];

const INNER_CLASS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
];

fn access(flags: u16, table: &[(u16, &str)]) -> String {
    let mut out = format!("access 0x{:04x}", flags);
    for (bit, name) in table {
        if flags & bit != 0 {
            out.push(' ');
            out.push_str(name);
        }
    }
    out
}

/// Canonicalizes `.class` artifacts (or anything starting with `0xCAFEBABE`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JvmClassFormat;

impl ArtifactFormat for JvmClassFormat {
    fn id(&self) -> &'static str {
        "jvm-class"
    }

    fn claims(&self, artifact: &NamedArtifact) -> bool {
        artifact.kind() == ArtifactKind::Binary
            && (artifact.name().ends_with(".class")
                || cv_classfile::has_class_magic(artifact.content()))
    }

    fn canonicalize(
        &self,
        artifact: &NamedArtifact,
        options: &NormalizeOptions,
    ) -> Result<String, MalformedArtifactError> {
        let malformed = |e: ClassFormatError| MalformedArtifactError {
            name: artifact.name().to_string(),
            format: "jvm-class",
            reason: e.to_string(),
        };
        let class = cv_classfile::parse(artifact.content()).map_err(malformed)?;
        let mut printer = ClassPrinter {
            pool: &class.constant_pool,
            options,
            lines: Vec::new(),
        };
        printer.class(&class).map_err(malformed)?;
        Ok(printer.lines.join("\n"))
    }
}

struct ClassPrinter<'a> {
    pool: &'a ConstantPool,
    options: &'a NormalizeOptions,
    lines: Vec<String>,
}

type PrintResult = Result<(), ClassFormatError>;

type Label<'l> = &'l dyn Fn(usize) -> Result<String, ClassFormatError>;

impl<'a> ClassPrinter<'a> {
    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", "  ".repeat(depth), text.as_ref()));
    }

    fn class(&mut self, class: &ClassFile) -> PrintResult {
        self.line(0, format!("class {}", class.this_class));
        self.line(
            1,
            format!("version {}.{}", class.major_version, class.minor_version),
        );
        self.line(1, access(class.access_flags, CLASS_FLAGS));
        match &class.super_class {
            Some(s) => self.line(1, format!("extends {}", s)),
            None => self.line(1, "extends <none>"),
        }
        for interface in &class.interfaces {
            self.line(1, format!("implements {}", interface));
        }
        self.attributes(1, &class.attributes)?;

        for field in self.ordered(&class.fields) {
            self.line(1, format!("field {} {}", field.name, field.descriptor));
            self.line(2, access(field.access_flags, FIELD_FLAGS));
            self.attributes(2, &field.attributes)?;
        }
        for method in self.ordered(&class.methods) {
            self.line(1, format!("method {} {}", method.name, method.descriptor));
            self.line(2, access(method.access_flags, METHOD_FLAGS));
            self.attributes(2, &method.attributes)?;
        }
        Ok(())
    }

    fn ordered<'m>(&self, members: &'m [Member]) -> Vec<&'m Member> {
        let mut out: Vec<&Member> = members.iter().collect();
        if self.options.sort_members {
            out.sort_by(|a, b| (&a.name, &a.descriptor).cmp(&(&b.name, &b.descriptor)));
        }
        out
    }

    fn kept<'x>(
        &self,
        depth: usize,
        attributes: &'x [Attribute],
    ) -> Result<Vec<&'x Attribute>, ClassFormatError> {
        if depth > MAX_NESTING {
            return Err(ClassFormatError::MalformedAttribute {
                attribute: "attribute",
                reason: format!("attributes nested deeper than {}", MAX_NESTING),
            });
        }
        let mut kept: Vec<&Attribute> = attributes
            .iter()
            .filter(|a| !self.options.strips(&a.name))
            .collect();
        kept.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(kept)
    }

    fn attributes(&mut self, depth: usize, attributes: &[Attribute]) -> PrintResult {
        for attribute in self.kept(depth, attributes)? {
            self.attribute(depth, attribute)?;
        }
        Ok(())
    }

    fn attribute(&mut self, depth: usize, attribute: &Attribute) -> PrintResult {
        let pool = self.pool;
        let data = attribute.data.as_slice();
        let name = attribute.name.as_str();
        match name {
            "Code" => {
                self.line(depth, "code");
                self.code(depth + 1, &CodeAttribute::parse(data, pool)?)?;
            }
            "ConstantValue" => {
                let index = attributes::single_index(data, "ConstantValue")?;
                self.line(depth, format!("constant {}", pool.render(index)?));
            }
            "Signature" => {
                let index = attributes::single_index(data, "Signature")?;
                self.line(depth, format!("signature {:?}", pool.utf8(index)?));
            }
            "SourceFile" => {
                let index = attributes::single_index(data, "SourceFile")?;
                self.line(depth, format!("source_file {:?}", pool.utf8(index)?));
            }
            "NestHost" => {
                let index = attributes::single_index(data, "NestHost")?;
                self.line(depth, format!("nest_host {}", pool.class_name(index)?));
            }
            "Exceptions" | "NestMembers" | "PermittedSubclasses" => {
                let label = match name {
                    "Exceptions" => "throws",
                    "NestMembers" => "nest_member",
                    _ => "permits",
                };
                for index in attributes::index_list(data, "class list")? {
                    self.line(depth, format!("{} {}", label, pool.class_name(index)?));
                }
            }
            "InnerClasses" => {
                for entry in attributes::inner_classes(data)? {
                    let outer = pool
                        .optional_class_name(entry.outer_class)?
                        .unwrap_or("<none>");
                    let simple = if entry.inner_name == 0 {
                        "<anonymous>"
                    } else {
                        pool.utf8(entry.inner_name)?
                    };
                    self.line(
                        depth,
                        format!(
                            "inner_class {} outer {} name {} {}",
                            pool.class_name(entry.inner_class)?,
                            outer,
                            simple,
                            access(entry.access_flags, INNER_CLASS_FLAGS)
                        ),
                    );
                }
            }
            "EnclosingMethod" => {
                let (class, method) = attributes::enclosing_method(data)?;
                let method = if method == 0 {
                    "<none>".to_string()
                } else {
                    let (n, d) = pool.name_and_type(method)?;
                    format!("{} {}", n, d)
                };
                self.line(
                    depth,
                    format!("enclosing_method {} {}", pool.class_name(class)?, method),
                );
            }
            "BootstrapMethods" => {
                for (i, bsm) in attributes::bootstrap_methods(data)?.iter().enumerate() {
                    let args = bsm
                        .arguments
                        .iter()
                        .map(|a| pool.render(*a))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.line(
                        depth,
                        format!(
                            "bootstrap #{} {} [{}]",
                            i,
                            pool.render(bsm.method_ref)?,
                            args.join(", ")
                        ),
                    );
                }
            }
            "Record" => {
                for component in attributes::record_components(data, pool)? {
                    self.line(
                        depth,
                        format!(
                            "record_component {} {}",
                            pool.utf8(component.name)?,
                            pool.utf8(component.descriptor)?
                        ),
                    );
                    self.attributes(depth + 1, &component.attributes)?;
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let label = if name.contains("Invisible") {
                    "invisible_annotation"
                } else {
                    "annotation"
                };
                for annotation in attributes::annotations(data)? {
                    self.line(depth, format!("{} {}", label, self.annotation(&annotation)?));
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let label = if name.contains("Invisible") {
                    "invisible_parameter_annotation"
                } else {
                    "parameter_annotation"
                };
                for (param, list) in attributes::parameter_annotations(data)?.iter().enumerate() {
                    for annotation in list {
                        self.line(
                            depth,
                            format!("{} {} {}", label, param, self.annotation(annotation)?),
                        );
                    }
                }
            }
            "AnnotationDefault" => {
                let value = attributes::annotation_default(data)?;
                self.line(depth, format!("annotation_default {}", self.element(&value)?));
            }
            "Deprecated" | "Synthetic" if data.is_empty() => {
                self.line(depth, name.to_lowercase());
            }
            _ => {
                self.line(depth, format!("attribute {} {} bytes", name, data.len()));
                for hex in hex_lines(data) {
                    self.line(depth + 1, hex);
                }
            }
        }
        Ok(())
    }

    fn code(&mut self, depth: usize, code: &CodeAttribute) -> PrintResult {
        let insns = code.instructions()?;
        self.line(
            depth,
            format!("max_stack {} max_locals {}", code.max_stack, code.max_locals),
        );

        let label = |offset: usize| -> Result<String, ClassFormatError> {
            if offset == code.code.len() {
                return Ok("#end".to_string());
            }
            insns
                .binary_search_by_key(&offset, |i| i.offset)
                .map(|ordinal| format!("#{}", ordinal))
                .map_err(|_| ClassFormatError::MalformedAttribute {
                    attribute: "Code",
                    reason: format!("offset {} is not an instruction boundary", offset),
                })
        };

        for (ordinal, insn) in insns.iter().enumerate() {
            let text = self.instruction(insn, &label)?;
            self.line(depth, format!("#{} {}", ordinal, text));
            match &insn.operand {
                Operand::TableSwitch { low, targets, .. } => {
                    for (i, target) in targets.iter().enumerate() {
                        let key = *low as i64 + i as i64;
                        self.line(depth + 1, format!("case {} -> {}", key, label(*target)?));
                    }
                }
                Operand::LookupSwitch { pairs, .. } => {
                    for (key, target) in pairs {
                        self.line(depth + 1, format!("case {} -> {}", key, label(*target)?));
                    }
                }
                _ => {}
            }
        }

        for handler in &code.exception_table {
            let catch = self
                .pool
                .optional_class_name(handler.catch_type)?
                .unwrap_or("<finally>");
            self.line(
                depth,
                format!(
                    "try {} {} handler {} catch {}",
                    label(handler.start_pc as usize)?,
                    label(handler.end_pc as usize)?,
                    label(handler.handler_pc as usize)?,
                    catch
                ),
            );
        }

        for attribute in self.kept(depth, &code.attributes)? {
            if attribute.name == "StackMapTable" {
                for frame in attributes::stack_map_table(&attribute.data)? {
                    let text = self.frame(&frame, &label)?;
                    self.line(depth, text);
                }
            } else {
                self.attribute(depth, attribute)?;
            }
        }
        Ok(())
    }

    fn frame(&self, frame: &StackMapFrame, label: Label<'_>) -> Result<String, ClassFormatError> {
        let types = |list: &[VerificationType]| -> Result<String, ClassFormatError> {
            let items = list
                .iter()
                .map(|t| self.verification_type(t, label))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        };
        let at = label(frame.offset)?;
        Ok(match &frame.kind {
            FrameKind::Same => format!("frame {} same", at),
            FrameKind::SameLocals1StackItem(item) => format!(
                "frame {} same1 stack {}",
                at,
                types(std::slice::from_ref(item))?
            ),
            FrameKind::Chop(k) => format!("frame {} chop {}", at, k),
            FrameKind::Append(locals) => format!("frame {} append {}", at, types(locals)?),
            FrameKind::Full { locals, stack } => format!(
                "frame {} full locals {} stack {}",
                at,
                types(locals)?,
                types(stack)?
            ),
        })
    }

    fn verification_type(
        &self,
        item: &VerificationType,
        label: Label<'_>,
    ) -> Result<String, ClassFormatError> {
        Ok(match item {
            VerificationType::Top => "top".to_string(),
            VerificationType::Integer => "int".to_string(),
            VerificationType::Float => "float".to_string(),
            VerificationType::Double => "double".to_string(),
            VerificationType::Long => "long".to_string(),
            VerificationType::Null => "null".to_string(),
            VerificationType::UninitializedThis => "uninitialized_this".to_string(),
            VerificationType::Object(index) => self.pool.class_name(*index)?.to_string(),
            VerificationType::Uninitialized(offset) => format!("uninitialized {}", label(*offset)?),
        })
    }

    fn instruction(&self, insn: &Instruction, label: Label<'_>) -> Result<String, ClassFormatError> {
        let pool = self.pool;
        let mnemonic = match insn.opcode {
            opcodes::LDC | opcodes::LDC_W | opcodes::LDC2_W => "ldc",
            _ => insn.mnemonic(),
        };
        Ok(match &insn.operand {
            Operand::None => mnemonic.to_string(),
            Operand::Int(v) => format!("{} {}", mnemonic, v),
            Operand::Local(slot) => format!("{} {}", mnemonic, slot),
            Operand::Constant(index) => format!("{} {}", mnemonic, pool.render(*index)?),
            Operand::Iinc { local, delta } => format!("{} {} {}", mnemonic, local, delta),
            Operand::Branch(target) => format!("{} {}", mnemonic, label(*target)?),
            Operand::InvokeInterface { index, count } => {
                format!("{} {} count {}", mnemonic, pool.render(*index)?, count)
            }
            Operand::NewArray(atype) => match opcodes::newarray_type(*atype) {
                Some(t) => format!("{} {}", mnemonic, t),
                None => {
                    return Err(ClassFormatError::MalformedAttribute {
                        attribute: "Code",
                        reason: format!("newarray with unknown element type {}", atype),
                    })
                }
            },
            Operand::MultiANewArray { index, dimensions } => {
                format!("{} {} {}", mnemonic, pool.render(*index)?, dimensions)
            }
            Operand::TableSwitch { default, low, .. } => {
                format!("{} low {} default {}", mnemonic, low, label(*default)?)
            }
            Operand::LookupSwitch { default, .. } => {
                format!("{} default {}", mnemonic, label(*default)?)
            }
        })
    }

    fn annotation(&self, annotation: &Annotation) -> Result<String, ClassFormatError> {
        let elements = annotation
            .elements
            .iter()
            .map(|(name, value)| Ok(format!("{}={}", self.pool.utf8(*name)?, self.element(value)?)))
            .collect::<Result<Vec<_>, ClassFormatError>>()?;
        Ok(format!(
            "@{}({})",
            self.pool.utf8(annotation.type_index)?,
            elements.join(", ")
        ))
    }

    fn element(&self, value: &ElementValue) -> Result<String, ClassFormatError> {
        Ok(match value {
            ElementValue::Const { tag, index } => {
                format!("{}:{}", *tag as char, self.pool.render(*index)?)
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => format!(
                "{}.{}",
                self.pool.utf8(*type_name)?,
                self.pool.utf8(*const_name)?
            ),
            ElementValue::Class(index) => format!("class {}", self.pool.utf8(*index)?),
            ElementValue::Annotation(nested) => self.annotation(nested)?,
            ElementValue::Array(values) => {
                let items = values
                    .iter()
                    .map(|v| self.element(v))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", items.join(", "))
            }
        })
    }
}
