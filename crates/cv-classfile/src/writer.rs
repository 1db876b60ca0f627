//! Minimal class-file writer.
//!
//! Enough of the format to synthesize realistic generator output: constant
//! pool with de-duplication, fields, methods with `Code` (exception table,
//! line numbers, local variables) and arbitrary raw attributes.

use std::collections::HashMap;

use crate::class_file::CLASS_MAGIC;
use crate::constant_pool::encode_modified_utf8;
use crate::opcodes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(String),
    String(String),
    NameAndType(String, String),
    Field(String, String, String),
    Method(String, String, String),
    InterfaceMethod(String, String, String),
    MethodHandle(u8, u16),
}

/// Constant pool under construction. Equal constants share one slot.
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    index: HashMap<PoolKey, u16>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            index: HashMap::new(),
        }
    }
}

impl PoolBuilder {
    fn intern(&mut self, key: PoolKey, slots: u16, encode: impl FnOnce(&mut Self) -> Vec<u8>) -> u16 {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let entry = encode(self);
        let i = self.next;
        self.bytes.extend_from_slice(&entry);
        self.next += slots;
        self.index.insert(key, i);
        i
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        self.intern(PoolKey::Utf8(s.to_string()), 1, |_| {
            let raw = encode_modified_utf8(s);
            let mut out = vec![1];
            out.extend_from_slice(&(raw.len() as u16).to_be_bytes());
            out.extend_from_slice(&raw);
            out
        })
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        self.intern(PoolKey::Integer(v), 1, |_| {
            let mut out = vec![3];
            out.extend_from_slice(&v.to_be_bytes());
            out
        })
    }

    pub fn long(&mut self, v: i64) -> u16 {
        self.intern(PoolKey::Long(v), 2, |_| {
            let mut out = vec![5];
            out.extend_from_slice(&v.to_be_bytes());
            out
        })
    }

    pub fn class(&mut self, name: &str) -> u16 {
        self.intern(PoolKey::Class(name.to_string()), 1, |p| {
            tagged_u16(7, p.utf8(name))
        })
    }

    pub fn string(&mut self, s: &str) -> u16 {
        self.intern(PoolKey::String(s.to_string()), 1, |p| tagged_u16(8, p.utf8(s)))
    }

    pub fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        self.intern(
            PoolKey::NameAndType(name.to_string(), desc.to_string()),
            1,
            |p| {
                let n = p.utf8(name);
                let d = p.utf8(desc);
                tagged_u16_pair(12, n, d)
            },
        )
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let key = PoolKey::Field(owner.to_string(), name.to_string(), desc.to_string());
        self.intern(key, 1, |p| {
            let c = p.class(owner);
            let nt = p.name_and_type(name, desc);
            tagged_u16_pair(9, c, nt)
        })
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let key = PoolKey::Method(owner.to_string(), name.to_string(), desc.to_string());
        self.intern(key, 1, |p| {
            let c = p.class(owner);
            let nt = p.name_and_type(name, desc);
            tagged_u16_pair(10, c, nt)
        })
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let key = PoolKey::InterfaceMethod(owner.to_string(), name.to_string(), desc.to_string());
        self.intern(key, 1, |p| {
            let c = p.class(owner);
            let nt = p.name_and_type(name, desc);
            tagged_u16_pair(11, c, nt)
        })
    }

    /// `CONSTANT_MethodHandle`; `reference` is taken as given, unchecked.
    pub fn method_handle(&mut self, kind: u8, reference: u16) -> u16 {
        self.intern(PoolKey::MethodHandle(kind, reference), 1, |_| {
            let mut out = vec![15, kind];
            out.extend_from_slice(&reference.to_be_bytes());
            out
        })
    }

    /// Number of slots used so far, i.e. the `constant_pool_count` to emit.
    pub fn count(&self) -> u16 {
        self.next
    }
}

fn tagged_u16(tag: u8, v: u16) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&v.to_be_bytes());
    out
}

fn tagged_u16_pair(tag: u8, a: u16, b: u16) -> Vec<u8> {
    let mut out = tagged_u16(tag, a);
    out.extend_from_slice(&b.to_be_bytes());
    out
}

#[derive(Debug, Clone)]
struct PendingHandler {
    start: u16,
    end: u16,
    handler: u16,
    catch_type: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingLocal {
    start: u16,
    length: u16,
    name: String,
    descriptor: String,
    slot: u16,
}

/// Bytecode body for a method, assembled by offset.
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    handlers: Vec<PendingHandler>,
    line_numbers: Vec<(u16, u16)>,
    locals: Vec<PendingLocal>,
    raw_attributes: Vec<(String, Vec<u8>)>,
}

impl CodeBuilder {
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            max_stack,
            max_locals,
            code: Vec::new(),
            handlers: Vec::new(),
            line_numbers: Vec::new(),
            locals: Vec::new(),
            raw_attributes: Vec::new(),
        }
    }

    /// Offset the next instruction will be written at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn op(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    pub fn op_u8(mut self, opcode: u8, operand: u8) -> Self {
        self.code.extend_from_slice(&[opcode, operand]);
        self
    }

    pub fn op_u16(mut self, opcode: u8, operand: u16) -> Self {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self
    }

    /// `ldc` for small pool indices, `ldc_w` otherwise.
    pub fn ldc(self, index: u16) -> Self {
        match u8::try_from(index) {
            Ok(small) => self.op_u8(opcodes::LDC, small),
            Err(_) => self.op_u16(opcodes::LDC_W, index),
        }
    }

    /// Branch instruction with a 16-bit offset to absolute `target`.
    pub fn branch(mut self, opcode: u8, target: usize) -> Self {
        let delta = target as i64 - self.code.len() as i64;
        self.code.push(opcode);
        self.code.extend_from_slice(&(delta as i16).to_be_bytes());
        self
    }

    pub fn invoke_interface(mut self, index: u16, count: u8) -> Self {
        self.code.push(opcodes::INVOKEINTERFACE);
        self.code.extend_from_slice(&index.to_be_bytes());
        self.code.extend_from_slice(&[count, 0]);
        self
    }

    /// Raw bytes, for encodings the helpers above don't cover.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn handler(mut self, start: u16, end: u16, handler: u16, catch_type: Option<&str>) -> Self {
        self.handlers.push(PendingHandler {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
        self
    }

    pub fn line(mut self, start_pc: u16, line: u16) -> Self {
        self.line_numbers.push((start_pc, line));
        self
    }

    pub fn local_variable(
        mut self,
        start: u16,
        length: u16,
        name: &str,
        descriptor: &str,
        slot: u16,
    ) -> Self {
        self.locals.push(PendingLocal {
            start,
            length,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            slot,
        });
        self
    }

    pub fn attribute(mut self, name: &str, data: Vec<u8>) -> Self {
        self.raw_attributes.push((name.to_string(), data));
        self
    }

    fn encode(&self, pool: &mut PoolBuilder) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.max_stack.to_be_bytes());
        out.extend_from_slice(&self.max_locals.to_be_bytes());
        out.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.code);

        out.extend_from_slice(&(self.handlers.len() as u16).to_be_bytes());
        for h in &self.handlers {
            let catch = h.catch_type.as_deref().map(|c| pool.class(c)).unwrap_or(0);
            for v in [h.start, h.end, h.handler, catch] {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if !self.line_numbers.is_empty() {
            let mut data = (self.line_numbers.len() as u16).to_be_bytes().to_vec();
            for (pc, line) in &self.line_numbers {
                data.extend_from_slice(&pc.to_be_bytes());
                data.extend_from_slice(&line.to_be_bytes());
            }
            attributes.push((pool.utf8("LineNumberTable"), data));
        }
        if !self.locals.is_empty() {
            let mut data = (self.locals.len() as u16).to_be_bytes().to_vec();
            for local in &self.locals {
                let name = pool.utf8(&local.name);
                let desc = pool.utf8(&local.descriptor);
                for v in [local.start, local.length, name, desc, local.slot] {
                    data.extend_from_slice(&v.to_be_bytes());
                }
            }
            attributes.push((pool.utf8("LocalVariableTable"), data));
        }
        for (name, data) in &self.raw_attributes {
            attributes.push((pool.utf8(name), data.clone()));
        }
        write_attributes(&mut out, &attributes);
        out
    }
}

#[derive(Debug, Clone)]
struct PendingMember {
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<(u16, Vec<u8>)>,
}

/// Builds a class file in memory.
#[derive(Debug, Clone)]
pub struct ClassWriter {
    pool: PoolBuilder,
    minor_version: u16,
    major_version: u16,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<PendingMember>,
    methods: Vec<PendingMember>,
    attributes: Vec<(u16, Vec<u8>)>,
}

impl ClassWriter {
    pub fn new(major_version: u16, access: u16, name: &str, super_name: Option<&str>) -> Self {
        Self::with_pool(PoolBuilder::default(), major_version, access, name, super_name)
    }

    /// Start from a pre-populated pool; changes every index the class uses.
    pub fn with_pool(
        mut pool: PoolBuilder,
        major_version: u16,
        access: u16,
        name: &str,
        super_name: Option<&str>,
    ) -> Self {
        let this_class = pool.class(name);
        let super_class = super_name.map(|s| pool.class(s)).unwrap_or(0);
        Self {
            pool,
            minor_version: 0,
            major_version,
            access,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn pool(&mut self) -> &mut PoolBuilder {
        &mut self.pool
    }

    pub fn minor_version(&mut self, minor: u16) -> &mut Self {
        self.minor_version = minor;
        self
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let i = self.pool.class(name);
        self.interfaces.push(i);
        self
    }

    /// Add a field; returns its position for [`field_attribute`](Self::field_attribute).
    pub fn field(&mut self, access: u16, name: &str, descriptor: &str) -> usize {
        let member = PendingMember {
            access,
            name: self.pool.utf8(name),
            descriptor: self.pool.utf8(descriptor),
            attributes: Vec::new(),
        };
        self.fields.push(member);
        self.fields.len() - 1
    }

    pub fn field_attribute(&mut self, field: usize, name: &str, data: Vec<u8>) {
        let name = self.pool.utf8(name);
        if let Some(f) = self.fields.get_mut(field) {
            f.attributes.push((name, data));
        }
    }

    /// Add a method; abstract/native methods pass `None` for the body.
    pub fn method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Option<CodeBuilder>,
    ) -> usize {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        let mut attributes = Vec::new();
        if let Some(code) = code {
            let code_name = self.pool.utf8("Code");
            attributes.push((code_name, code.encode(&mut self.pool)));
        }
        self.methods.push(PendingMember {
            access,
            name,
            descriptor,
            attributes,
        });
        self.methods.len() - 1
    }

    pub fn method_attribute(&mut self, method: usize, name: &str, data: Vec<u8>) {
        let name = self.pool.utf8(name);
        if let Some(m) = self.methods.get_mut(method) {
            m.attributes.push((name, data));
        }
    }

    pub fn class_attribute(&mut self, name: &str, data: Vec<u8>) -> &mut Self {
        let name = self.pool.utf8(name);
        self.attributes.push((name, data));
        self
    }

    pub fn source_file(&mut self, file: &str) -> &mut Self {
        let file = self.pool.utf8(file);
        self.class_attribute("SourceFile", file.to_be_bytes().to_vec())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        out.extend_from_slice(&self.pool.count().to_be_bytes());
        out.extend_from_slice(&self.pool.bytes);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        for members in [&self.fields, &self.methods] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for m in members {
                out.extend_from_slice(&m.access.to_be_bytes());
                out.extend_from_slice(&m.name.to_be_bytes());
                out.extend_from_slice(&m.descriptor.to_be_bytes());
                write_attributes(&mut out, &m.attributes);
            }
        }
        write_attributes(&mut out, &self.attributes);
        out
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for (name, data) in attributes {
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_file::ClassFile;
    use crate::code::{CodeAttribute, Operand};

    #[test]
    fn test_pool_deduplicates() {
        let mut pool = PoolBuilder::default();
        let a = pool.method_ref("java/lang/Object", "<init>", "()V");
        let b = pool.method_ref("java/lang/Object", "<init>", "()V");
        assert_eq!(a, b);
        let before = pool.count();
        pool.utf8("<init>");
        assert_eq!(pool.count(), before);
    }

    #[test]
    fn test_long_reserves_two_slots() {
        let mut pool = PoolBuilder::default();
        let l = pool.long(7);
        let next = pool.utf8("x");
        assert_eq!(next, l + 2);
    }

    #[test]
    fn test_written_method_parses_back() {
        let mut w = ClassWriter::new(52, 0x0021, "Foo", Some("java/lang/Object"));
        let init = w.pool().method_ref("java/lang/Object", "<init>", "()V");
        let code = CodeBuilder::new(1, 1)
            .op(opcodes::ALOAD_0)
            .op_u16(opcodes::INVOKESPECIAL, init)
            .op(opcodes::RETURN)
            .line(0, 3)
            .local_variable(0, 5, "this", "LFoo;", 0);
        w.method(0x0001, "<init>", "()V", Some(code));
        w.source_file("Foo.java");

        let class = ClassFile::parse(&w.to_bytes()).unwrap();
        let method = &class.methods[0];
        let code = CodeAttribute::parse(&method.attribute("Code").unwrap().data, &class.constant_pool)
            .unwrap();
        assert_eq!(code.max_stack, 1);
        let names: Vec<_> = code.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["LineNumberTable", "LocalVariableTable"]);
        let insns = code.instructions().unwrap();
        assert_eq!(insns[1].operand, Operand::Constant(init));
        assert!(class.attribute("SourceFile").is_some());
    }

    #[test]
    fn test_ldc_switches_to_wide_form() {
        let code = CodeBuilder::new(1, 0).ldc(3).ldc(300);
        assert_eq!(code.code, vec![opcodes::LDC, 3, opcodes::LDC_W, 0x01, 0x2c]);
    }
}
