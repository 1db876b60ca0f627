//! Shared fixtures: class files synthesized with `cv_classfile::ClassWriter`.

#![allow(dead_code)]

use cv_classfile::{opcodes, ClassWriter, CodeBuilder, PoolBuilder};

/// Knobs that change a class file's encoding but not its meaning.
#[derive(Debug, Clone, Default)]
pub struct Encoding {
    /// Emit SourceFile, LineNumberTable and LocalVariableTable.
    pub debug: bool,
    /// Pre-intern this many unrelated constants, shifting every pool index.
    pub padding: usize,
    /// Write members in reverse order.
    pub reverse_members: bool,
}

impl Encoding {
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }
}

fn padded_pool(padding: usize) -> PoolBuilder {
    let mut pool = PoolBuilder::default();
    for i in 0..padding {
        pool.utf8(&format!("unused constant {}", i));
    }
    pool
}

/// `public class <name> { private int count; <init>; String greet() { return <greeting>; } }`
pub fn greeter(name: &str, greeting: &str, encoding: &Encoding) -> Vec<u8> {
    let mut w = ClassWriter::with_pool(
        padded_pool(encoding.padding),
        52,
        0x0021,
        name,
        Some("java/lang/Object"),
    );
    let object_init = w.pool().method_ref("java/lang/Object", "<init>", "()V");
    let greeting = w.pool().string(greeting);
    let descriptor = format!("L{};", name);

    let mut ctor = CodeBuilder::new(1, 1)
        .op(opcodes::ALOAD_0)
        .op_u16(opcodes::INVOKESPECIAL, object_init)
        .op(opcodes::RETURN);
    let mut greet = CodeBuilder::new(1, 1).ldc(greeting).op(opcodes::ARETURN);
    if encoding.debug {
        ctor = ctor.line(0, 1).local_variable(0, 5, "this", &descriptor, 0);
        greet = greet.line(0, 4).local_variable(0, 3, "this", &descriptor, 0);
    }

    if encoding.reverse_members {
        w.method(0x0001, "greet", "()Ljava/lang/String;", Some(greet));
        w.method(0x0001, "<init>", "()V", Some(ctor));
        w.field(0x0002, "count", "I");
    } else {
        w.field(0x0002, "count", "I");
        w.method(0x0001, "<init>", "()V", Some(ctor));
        w.method(0x0001, "greet", "()Ljava/lang/String;", Some(greet));
    }
    if encoding.debug {
        let simple = name.rsplit('/').next().unwrap_or(name);
        let file = format!("{}.java", simple.split('$').next().unwrap_or(simple));
        w.source_file(&file);
    }
    w.to_bytes()
}

/// `static int pick(int)` using a local in slot 5, optionally `wide`-encoded.
pub fn local_slot_user(wide: bool) -> Vec<u8> {
    let mut w = ClassWriter::new(52, 0x0021, "Slots", Some("java/lang/Object"));
    let code = CodeBuilder::new(1, 6);
    let code = if wide {
        code.raw(&[opcodes::WIDE, opcodes::ILOAD, 0x00, 0x05])
    } else {
        code.op_u8(opcodes::ILOAD, 5)
    };
    w.method(0x0009, "pick", "(I)I", Some(code.op(opcodes::IRETURN)));
    w.to_bytes()
}
