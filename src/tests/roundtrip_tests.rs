#[cfg(test)]
mod tests {
    use crate::classfile::code::{CodeOp, CodeTrailer, Insn, Label, TryCatchBlock};
    use crate::classfile::opcodes::{ALOAD_0, ICONST_0, INVOKEVIRTUAL, IRETURN};
    use crate::classfile::stack_map::{StackFrame, VerificationType};
    use crate::classfile::{ClassAccess, ClassFile};
    use crate::instrument::{CoverageInitializationData, CoverageMode, Instrumenter, Platform};
    use crate::tests::builder::*;
    use crate::visitor::{ClassReader, ClassWriter};

    const ILOAD_1: u8 = 0x1b;
    const ASTORE_1: u8 = 0x4c;

    /// A class exercising switches, handlers, frames and line numbers
    fn busy_class() -> Vec<u8> {
        let switch = vec![
            CodeOp::Line(5),
            insn(ILOAD_1),
            CodeOp::Insn(Insn::TableSwitch { default: Label(3), low: 0, high: 1, targets: vec![Label(1), Label(2)] }),
            label(1),
            CodeOp::Frame(StackFrame::Same { extended: false }),
            CodeOp::Line(6),
            insn(ICONST_0 + 1),
            insn(IRETURN),
            label(2),
            CodeOp::Frame(StackFrame::Same { extended: false }),
            CodeOp::Line(7),
            insn(ILOAD_1),
            CodeOp::Insn(Insn::LookupSwitch { default: Label(3), pairs: vec![(-5, Label(4)), (1000, Label(3))] }),
            label(4),
            CodeOp::Frame(StackFrame::Same { extended: false }),
            insn(ICONST_0 + 2),
            insn(IRETURN),
            label(3),
            CodeOp::Frame(StackFrame::Same { extended: false }),
            insn(ICONST_0),
            insn(IRETURN),
        ];
        let guarded = vec![
            label(0),
            insn(ALOAD_0),
            invoke(INVOKEVIRTUAL, "com/example/Busy", "work", "()V"),
            label(1),
            ret(),
            label(2),
            CodeOp::Frame(StackFrame::SameLocals1StackItem { stack: VerificationType::Null, extended: false }),
            insn(ASTORE_1),
            ret(),
        ];
        let mut guarded_trailer = CodeTrailer::new(1, 2);
        guarded_trailer.try_catch.push(TryCatchBlock { start: Label(0), end: Label(1), handler: Label(2), catch_type: 0 });

        TestClass::new("com/example/Busy", OBJECT)
            .method("pick", "(I)I", 1, switch)
            .with_body(ClassAccess::PUBLIC, "guarded", "()V", guarded, guarded_trailer)
            .method("work", "()V", 0, vec![ret()])
            .abstract_method("later", "()V")
            .build()
    }

    #[test]
    fn read_write_is_byte_identical() {
        let original = busy_class();
        let reader = ClassReader::from_bytes(&original).unwrap();
        let mut writer = ClassWriter::from_source(reader.class_file().clone());
        reader.accept(&mut writer).unwrap();
        assert_eq!(writer.synthetic_count(), 0);
        assert_eq!(writer.into_bytes().unwrap(), original);
    }

    #[test]
    fn decoded_ops_survive_a_second_pass() {
        let original = busy_class();
        let pick = method_code(&original, "pick", "(I)I");
        assert_eq!(pick.ops.iter().filter(|op| matches!(op, CodeOp::Frame(_))).count(), 4);
        let guarded = method_code(&original, "guarded", "()V");
        assert_eq!(guarded.trailer.try_catch.len(), 1);

        let class = ClassFile::from_bytes(&original).unwrap();
        assert_eq!(class.to_bytes(), original);
    }

    #[test]
    fn instrumented_switches_and_handlers_stay_consistent() {
        let original = busy_class();
        let data = CoverageInitializationData::new(CoverageMode::Line, "busy", Some("file:///lines")).unwrap();
        let instrumenter = Instrumenter::new(Platform::Rim, data, resolver_for(&[original.clone()]));
        let out = instrumenter.instrument_class(&original).unwrap();
        assert!(out.changed);

        let pick = method_code(&out.bytes, "pick", "(I)I");
        assert!(always_preceded_by(&pick, |i| calls(i, "markMethodCovered"), |i| i.is_return()));
        assert_eq!(count_calls(&pick.ops, "markMethodCovered"), 3);
        assert_eq!(count_calls(&pick.ops, "markLineCovered"), 3);
        assert_eq!(pick.ops.iter().filter(|op| matches!(op, CodeOp::Frame(_))).count(), 4);

        let guarded = method_code(&out.bytes, "guarded", "()V");
        assert!(always_preceded_by(&guarded, |i| calls(i, "markMethodCovered"), |i| i.is_return()));
        let handler = guarded.trailer.try_catch[0].handler;
        let at = guarded.ops.iter().position(|op| *op == CodeOp::Label(handler)).unwrap();
        assert!(matches!(guarded.ops[at + 1], CodeOp::Frame(_)));
        assert!(matches!(&guarded.ops[at + 2], CodeOp::Insn(i) if i.opcode() == ASTORE_1));

        // Rewriting the instrumented class again changes nothing
        let reader = ClassReader::from_bytes(&out.bytes).unwrap();
        let mut writer = ClassWriter::from_source(reader.class_file().clone());
        reader.accept(&mut writer).unwrap();
        assert_eq!(writer.into_bytes().unwrap(), out.bytes);
    }
}
