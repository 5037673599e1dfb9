//! Test-only class synthesis through the writer, plus a control flow checker
//! for instrumented method bodies.

use crate::classfile::code::{self, CodeOp, CodeTrailer, Insn, Label, CODE};
use crate::classfile::constant_pool::MemberRef;
use crate::classfile::opcodes;
use crate::classfile::{ClassAccess, ClassFile};
use crate::hierarchy::{DescriptorStore, HierarchyResolver, MemorySource};
use crate::types::MethodDescriptor;
use crate::visitor::{ClassHeader, ClassVisitor, ClassWriter, MethodHeader};
use std::collections::{HashMap, HashSet};

pub(crate) const OBJECT: &str = "java/lang/Object";
pub(crate) const MIDLET: &str = "javax/microedition/midlet/MIDlet";
pub(crate) const COMMAND: &str = "javax/microedition/lcdui/Command";
pub(crate) const DISPLAYABLE: &str = "javax/microedition/lcdui/Displayable";
pub(crate) const ITEM: &str = "javax/microedition/lcdui/Item";
pub(crate) const COMMAND_LISTENER: &str = "javax/microedition/lcdui/CommandListener";
pub(crate) const ITEM_COMMAND_LISTENER: &str = "javax/microedition/lcdui/ItemCommandListener";
pub(crate) const RIM_APPLICATION: &str = "net/rim/device/api/system/Application";
pub(crate) const COMMAND_ACTION_DISPLAYABLE: &str =
    "(Ljavax/microedition/lcdui/Command;Ljavax/microedition/lcdui/Displayable;)V";
pub(crate) const COMMAND_ACTION_ITEM: &str = "(Ljavax/microedition/lcdui/Command;Ljavax/microedition/lcdui/Item;)V";

struct TestMethod {
    header: MethodHeader,
    body: Option<(Vec<CodeOp>, CodeTrailer)>,
}

/// A class described op by op and serialized with [`ClassWriter`]
pub(crate) struct TestClass {
    header: ClassHeader,
    methods: Vec<TestMethod>,
}

impl TestClass {
    pub fn new(name: &str, super_name: &str) -> TestClass {
        TestClass {
            header: ClassHeader {
                minor_version: 0,
                major_version: 47,
                access: ClassAccess::PUBLIC | ClassAccess::SUPER,
                name: name.to_string(),
                super_name: Some(super_name.to_string()),
                interfaces: vec![],
            },
            methods: vec![],
        }
    }

    pub fn interface(name: &str, extends: &[&str]) -> TestClass {
        let mut class = TestClass::new(name, OBJECT).implements(extends);
        class.header.access = ClassAccess::PUBLIC | ClassAccess::INTERFACE | ClassAccess::ABSTRACT;
        class
    }

    pub fn implements(mut self, interfaces: &[&str]) -> TestClass {
        self.header.interfaces = interfaces.iter().map(|i| i.to_string()).collect();
        self
    }

    /// A public method; max_locals covers `this` and the arguments
    pub fn method(self, name: &str, descriptor: &str, max_stack: u16, ops: Vec<CodeOp>) -> TestClass {
        let locals = argument_slots(descriptor) + 1;
        self.with_body(ClassAccess::PUBLIC, name, descriptor, ops, CodeTrailer::new(max_stack, locals))
    }

    pub fn static_method(self, name: &str, descriptor: &str, max_stack: u16, ops: Vec<CodeOp>) -> TestClass {
        let locals = argument_slots(descriptor);
        self.with_body(ClassAccess::PUBLIC | ClassAccess::STATIC, name, descriptor, ops, CodeTrailer::new(max_stack, locals))
    }

    pub fn with_body(mut self, access: ClassAccess, name: &str, descriptor: &str, ops: Vec<CodeOp>, trailer: CodeTrailer) -> TestClass {
        self.methods.push(TestMethod { header: method_header(access, name, descriptor), body: Some((ops, trailer)) });
        self
    }

    pub fn abstract_method(mut self, name: &str, descriptor: &str) -> TestClass {
        let header = method_header(ClassAccess::PUBLIC | ClassAccess::ABSTRACT, name, descriptor);
        self.methods.push(TestMethod { header, body: None });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = ClassWriter::new();
        w.visit(&self.header).unwrap();
        for m in &self.methods {
            let mut mv = w.visit_method(&m.header).unwrap();
            match &m.body {
                Some((ops, trailer)) => {
                    for op in ops {
                        mv.visit_op(op.clone()).unwrap();
                    }
                    mv.visit_end(Some(trailer.clone())).unwrap();
                }
                None => mv.visit_end(None).unwrap(),
            }
        }
        w.visit_end().unwrap();
        w.into_bytes().unwrap()
    }
}

fn method_header(access: ClassAccess, name: &str, descriptor: &str) -> MethodHeader {
    MethodHeader { access, name: name.to_string(), descriptor: descriptor.to_string(), source: None }
}

fn argument_slots(descriptor: &str) -> u16 {
    MethodDescriptor::from_descriptor(descriptor).unwrap().argument_slots() as u16
}

pub(crate) fn insn(opcode: u8) -> CodeOp {
    CodeOp::Insn(Insn::Plain { opcode, operands: vec![] })
}

pub(crate) fn label(n: u32) -> CodeOp {
    CodeOp::Label(Label(n))
}

pub(crate) fn jump(opcode: u8, target: u32) -> CodeOp {
    CodeOp::Insn(Insn::Jump { opcode, target: Label(target) })
}

pub(crate) fn invoke(opcode: u8, owner: &str, name: &str, descriptor: &str) -> CodeOp {
    CodeOp::Insn(Insn::Invoke { opcode, cp_index: None, method: MemberRef::new(owner, name, descriptor), interface: false })
}

pub(crate) fn ret() -> CodeOp {
    insn(opcodes::RETURN)
}

/// Stubs of the device library classes the application classes extend
pub(crate) fn device_library() -> Vec<Vec<u8>> {
    vec![
        TestClass::new(MIDLET, OBJECT).build(),
        TestClass::new(COMMAND, OBJECT).build(),
        TestClass::new(DISPLAYABLE, OBJECT).build(),
        TestClass::new("javax/microedition/lcdui/Screen", DISPLAYABLE).build(),
        TestClass::new("javax/microedition/lcdui/Form", "javax/microedition/lcdui/Screen").build(),
        TestClass::new("javax/microedition/lcdui/Canvas", DISPLAYABLE).build(),
        TestClass::new(ITEM, OBJECT).build(),
        TestClass::new("javax/microedition/lcdui/StringItem", ITEM).build(),
        TestClass::interface(COMMAND_LISTENER, &[]).build(),
        TestClass::interface(ITEM_COMMAND_LISTENER, &[]).build(),
        TestClass::new(RIM_APPLICATION, OBJECT).build(),
        TestClass::new("net/rim/device/api/ui/UiApplication", RIM_APPLICATION).build(),
    ]
}

/// A resolver over `classes`, the device library and the host table
pub(crate) fn resolver_for(classes: &[Vec<u8>]) -> HierarchyResolver {
    let mut source = MemorySource::new();
    for bytes in device_library().into_iter().chain(classes.iter().cloned()) {
        source.add(bytes).unwrap();
    }
    HierarchyResolver::new(DescriptorStore::new(false).with_source(source))
}

/// The decoded body of `name` + `descriptor` in a class file
pub(crate) fn method_code(bytes: &[u8], name: &str, descriptor: &str) -> code::MethodCode {
    let class = ClassFile::from_bytes(bytes).unwrap();
    let pool = &class.constant_pool;
    let method = class
        .methods
        .iter()
        .find(|m| pool.utf8(m.name_index).unwrap() == name && pool.utf8(m.descriptor_index).unwrap() == descriptor)
        .unwrap_or_else(|| panic!("no method {}{}", name, descriptor));
    let attribute = method.attribute(pool, CODE).unwrap();
    code::decode(&attribute.info, pool).unwrap()
}

pub(crate) fn insns(ops: &[CodeOp]) -> Vec<&Insn> {
    ops.iter()
        .filter_map(|op| match op {
            CodeOp::Insn(i) => Some(i),
            _ => None,
        })
        .collect()
}

/// True if `insn` invokes a method called `name`
pub(crate) fn calls(insn: &Insn, name: &str) -> bool {
    matches!(insn, Insn::Invoke { method, .. } if method.name == name)
}

pub(crate) fn count_calls(ops: &[CodeOp], name: &str) -> usize {
    insns(ops).into_iter().filter(|i| calls(i, name)).count()
}

/// True if on every path from the method entry, the instruction executed
/// right before any instruction matching `goal` matches `required`. An
/// exception edge runs from each instruction of a protected range to its
/// handler, with nothing executed right before the handler.
pub(crate) fn always_preceded_by(code: &code::MethodCode, required: impl Fn(&Insn) -> bool, goal: impl Fn(&Insn) -> bool) -> bool {
    let mut body: Vec<&Insn> = vec![];
    let mut label_at: HashMap<Label, usize> = HashMap::new();
    for op in &code.ops {
        match op {
            CodeOp::Label(l) => {
                label_at.insert(*l, body.len());
            }
            CodeOp::Insn(i) => body.push(i),
            _ => {}
        }
    }
    let at = |l: &Label| label_at[l];
    let handlers_of = |ix: usize| -> Vec<usize> {
        code.trailer
            .try_catch
            .iter()
            .filter(|t| at(&t.start) <= ix && ix < at(&t.end))
            .map(|t| at(&t.handler))
            .collect()
    };
    let successors = |ix: usize| -> Vec<usize> {
        match body[ix] {
            Insn::Jump { opcode, target } if *opcode == opcodes::GOTO || *opcode == opcodes::GOTO_W => vec![at(target)],
            Insn::Jump { target, .. } => vec![at(target), ix + 1],
            Insn::TableSwitch { default, targets, .. } => std::iter::once(default).chain(targets.iter()).map(&at).collect(),
            Insn::LookupSwitch { default, pairs } => std::iter::once(default).chain(pairs.iter().map(|(_, l)| l)).map(&at).collect(),
            i if i.is_return() || i.opcode() == opcodes::ATHROW => vec![],
            _ => vec![ix + 1],
        }
    };

    let mut seen = HashSet::new();
    let mut work = vec![(0usize, false)];
    while let Some((ix, after_required)) = work.pop() {
        if ix >= body.len() || !seen.insert((ix, after_required)) {
            continue;
        }
        if goal(body[ix]) && !after_required {
            return false;
        }
        let here = required(body[ix]);
        for s in successors(ix) {
            work.push((s, here));
        }
        for h in handlers_of(ix) {
            work.push((h, false));
        }
    }
    true
}

/// A method body of `ops` with no exception handlers
pub(crate) fn plain_code(ops: Vec<CodeOp>) -> code::MethodCode {
    code::MethodCode { ops, trailer: CodeTrailer::new(1, 1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_finds_an_unguarded_path() {
        // iconst_0; ifeq L0; nop; L0: return
        let ops = vec![insn(opcodes::ICONST_0), jump(0x99, 0), insn(0x00), label(0), ret()];
        assert!(!always_preceded_by(&plain_code(ops), |i| i.opcode() == 0x00, |i| i.is_return()));
        let guarded = vec![insn(opcodes::ICONST_0), insn(0x00), ret()];
        assert!(always_preceded_by(&plain_code(guarded), |i| i.opcode() == 0x00, |i| i.is_return()));
    }

    #[test]
    fn checker_follows_exception_handlers() {
        // L0: nop; return; L1: L2: return, with L0..L1 handled at L2
        let ops = vec![label(0), insn(0x00), ret(), label(1), label(2), ret()];
        let mut code = plain_code(ops);
        assert!(always_preceded_by(&code, |i| i.opcode() == 0x00, |i| i.is_return()));
        code.trailer.try_catch.push(code::TryCatchBlock { start: Label(0), end: Label(1), handler: Label(2), catch_type: 0 });
        assert!(!always_preceded_by(&code, |i| i.opcode() == 0x00, |i| i.is_return()));
    }
}
