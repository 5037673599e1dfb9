#[cfg(test)]
mod tests {
    use crate::classfile::code::{CodeOp, CodeTrailer, Insn, Label, TryCatchBlock};
    use crate::classfile::ClassAccess;
    use crate::classfile::opcodes::{self, ALOAD_0, ALOAD_1, ALOAD_2, GOTO, ICONST_0, INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL};
    use crate::instrument::{
        CoverageInitializationData, CoverageInitializationStage, CoverageMode, DecoratorStage, InstrumentedClass, Instrumenter,
        Platform,
    };
    use crate::tests::builder::*;
    use crate::visitor::ClassWriter;
    use std::sync::Arc;

    const IFEQ: u8 = 0x99;
    const ILOAD_1: u8 = 0x1b;
    const NOP: u8 = 0x00;
    const GAME: &str = "com/example/Game";

    fn summary() -> CoverageInitializationData {
        CoverageInitializationData::new(CoverageMode::Summary, "run-7", None).unwrap()
    }

    fn lines() -> CoverageInitializationData {
        CoverageInitializationData::new(CoverageMode::Line, "run-8", Some("file:///SDCard/lines.txt")).unwrap()
    }

    fn game() -> Vec<u8> {
        TestClass::new(GAME, MIDLET)
            .method("<init>", "()V", 1, vec![insn(ALOAD_0), invoke(INVOKESPECIAL, MIDLET, "<init>", "()V"), ret()])
            .method(
                "startApp",
                "()V",
                1,
                vec![
                    label(0),
                    CodeOp::Line(10),
                    insn(ICONST_0 + 1),
                    jump(IFEQ, 1),
                    CodeOp::Line(11),
                    ret(),
                    label(1),
                    CodeOp::Line(12),
                    jump(GOTO, 0),
                ],
            )
            .method("pauseApp", "()V", 0, vec![CodeOp::Line(20), ret()])
            .method("spin", "()V", 0, vec![CodeOp::Line(30), insn(NOP), CodeOp::Line(30), ret()])
            .method(
                "destroyApp",
                "(Z)V",
                1,
                vec![
                    insn(ILOAD_1),
                    jump(IFEQ, 0),
                    insn(ALOAD_0),
                    invoke(INVOKEVIRTUAL, GAME, "notifyDestroyed", "()V"),
                    ret(),
                    label(0),
                    insn(ALOAD_0),
                    invoke(INVOKEVIRTUAL, MIDLET, "notifyDestroyed", "()V"),
                    ret(),
                ],
            )
            .build()
    }

    fn instrument(platform: Platform, data: CoverageInitializationData, class: &[u8]) -> InstrumentedClass {
        let resolver = resolver_for(&[class.to_vec()]);
        Instrumenter::new(platform, data, resolver).instrument_class(class).unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    /// Index among the instructions of the one bound to `label`
    fn insn_index_of(ops: &[CodeOp], label: Label) -> usize {
        let mut count = 0;
        for op in ops {
            match op {
                CodeOp::Label(l) if *l == label => return count,
                CodeOp::Insn(_) => count += 1,
                _ => {}
            }
        }
        panic!("label {} not bound", label);
    }

    #[test]
    fn startup_method_begins_the_run_once() {
        let out = instrument(Platform::Midp, summary(), &game());
        assert!(out.changed);
        assert_eq!(out.name, GAME);
        assert!(contains(&out.bytes, b"run-7"));

        let code = method_code(&out.bytes, "startApp", "()V");
        let body = insns(&code.ops);
        assert_eq!(body[0].opcode(), opcodes::LDC);
        assert!(calls(body[1], "beginMethodCoverage"));
        assert!(calls(body[2], "enableCoverage"));
        assert_eq!(count_calls(&code.ops, "beginMethodCoverage"), 1);

        // The loop back to the top skips the startup calls
        let target = body
            .iter()
            .find_map(|i| match i {
                Insn::Jump { opcode, target } if *opcode == GOTO => Some(*target),
                _ => None,
            })
            .unwrap();
        assert_eq!(insn_index_of(&code.ops, target), 3);

        for other in [("pauseApp", "()V"), ("<init>", "()V"), ("destroyApp", "(Z)V")] {
            let code = method_code(&out.bytes, other.0, other.1);
            assert_eq!(count_calls(&code.ops, "beginMethodCoverage"), 0, "{:?}", other);
        }
    }

    #[test]
    fn every_return_is_marked() {
        let out = instrument(Platform::Midp, summary(), &game());
        for (name, descriptor) in [("startApp", "()V"), ("pauseApp", "()V"), ("<init>", "()V"), ("spin", "()V")] {
            let code = method_code(&out.bytes, name, descriptor);
            assert!(
                always_preceded_by(&code, |i| calls(i, "markMethodCovered"), |i| i.is_return()),
                "{} has an unmarked return",
                name
            );
            assert_eq!(count_calls(&code.ops, "markLineCovered"), 0);
        }
        let start = method_code(&out.bytes, "startApp", "()V");
        assert_eq!(start.trailer.max_stack, 2);
        let pause = method_code(&out.bytes, "pauseApp", "()V");
        assert_eq!(pause.trailer.max_stack, 1);
    }

    #[test]
    fn report_is_flushed_before_every_termination() {
        let out = instrument(Platform::Midp, summary(), &game());
        let code = method_code(&out.bytes, "destroyApp", "(Z)V");
        assert!(always_preceded_by(&code, |i| calls(i, "writeReport"), |i| calls(i, "notifyDestroyed")));
        assert_eq!(count_calls(&code.ops, "writeReport"), 2);
        assert_eq!(count_calls(&code.ops, "markMethodCovered"), 0);
    }

    #[test]
    fn report_is_flushed_before_termination_in_finally_blocks() {
        const ASTORE_2: u8 = 0x4d;
        // try { notifyDestroyed(); } finally { notifyDestroyed(); }
        let ops = vec![
            label(0),
            insn(ALOAD_0),
            invoke(INVOKEVIRTUAL, GAME, "notifyDestroyed", "()V"),
            label(1),
            ret(),
            label(2),
            insn(ASTORE_2),
            insn(ALOAD_0),
            invoke(INVOKEVIRTUAL, GAME, "notifyDestroyed", "()V"),
            insn(ALOAD_2),
            insn(opcodes::ATHROW),
        ];
        let mut trailer = CodeTrailer::new(1, 3);
        trailer.try_catch.push(TryCatchBlock { start: Label(0), end: Label(1), handler: Label(2), catch_type: 0 });
        let class = TestClass::new(GAME, MIDLET).with_body(ClassAccess::PUBLIC, "destroyApp", "(Z)V", ops, trailer).build();

        let out = instrument(Platform::Midp, summary(), &class);
        let code = method_code(&out.bytes, "destroyApp", "(Z)V");
        assert_eq!(code.trailer.try_catch.len(), 1);
        assert_eq!(count_calls(&code.ops, "writeReport"), 2);
        assert!(always_preceded_by(&code, |i| calls(i, "writeReport"), |i| calls(i, "notifyDestroyed")));

        // The flush inside the protected range stays protected
        let handled = &code.trailer.try_catch[0];
        let start = code.ops.iter().position(|op| *op == CodeOp::Label(handled.start)).unwrap();
        let end = code.ops.iter().position(|op| *op == CodeOp::Label(handled.end)).unwrap();
        assert_eq!(count_calls(&code.ops[start..end], "writeReport"), 1);
    }

    #[test]
    fn line_mode_marks_each_distinct_line() {
        let out = instrument(Platform::Midp, lines(), &game());
        assert!(contains(&out.bytes, b"file:///SDCard/lines.txt"));

        let start = method_code(&out.bytes, "startApp", "()V");
        assert_eq!(count_calls(&start.ops, "beginLineCoverage"), 1);
        assert_eq!(count_calls(&start.ops, "beginMethodCoverage"), 0);
        assert_eq!(count_calls(&start.ops, "markLineCovered"), 3);
        assert!(start.trailer.max_stack >= 3);
        assert!(always_preceded_by(&start, |i| calls(i, "markMethodCovered"), |i| i.is_return()));

        // Line entries now point at the line marks
        let after_line = start.ops.iter().position(|op| *op == CodeOp::Line(10)).map(|p| &start.ops[p + 1]);
        assert!(matches!(after_line, Some(CodeOp::Insn(i)) if i.opcode() == opcodes::LDC));

        let spin = method_code(&out.bytes, "spin", "()V");
        assert_eq!(count_calls(&spin.ops, "markLineCovered"), 1);

        let listed: Vec<_> = out.manifest.methods.iter().map(|m| (m.method.as_str(), m.lines.clone())).collect();
        assert_eq!(
            listed,
            vec![("<init>()V", vec![]), ("startApp()V", vec![10, 11, 12]), ("pauseApp()V", vec![20]), ("spin()V", vec![30])]
        );
    }

    #[test]
    fn disabled_coverage_leaves_classes_alone() {
        let original = game();
        let out = instrument(Platform::Midp, CoverageInitializationData::disabled(), &original);
        assert!(!out.changed);
        assert_eq!(out.bytes, original);
    }

    #[test]
    fn runtime_and_interface_classes_are_untouched() {
        let runtime = TestClass::new("cldc/instrument/runtime/Coverage", OBJECT)
            .static_method("writeReport", "()V", 0, vec![ret()])
            .build();
        let out = instrument(Platform::Midp, summary(), &runtime);
        assert!(!out.changed);
        assert_eq!(out.bytes, runtime);

        let iface = TestClass::interface("com/example/Listener", &[]).abstract_method("fire", "()V").build();
        let out = instrument(Platform::Midp, summary(), &iface);
        assert!(!out.changed);
    }

    #[test]
    fn legacy_entry_point_is_initialized() {
        let legacy = TestClass::new("com/example/Legacy", OBJECT).method("startApp", "()V", 0, vec![ret()]).build();
        let resolver = resolver_for(&[legacy.clone()]);
        let plain = Instrumenter::new(Platform::Midp, summary(), resolver);
        let code = method_code(&plain.instrument_class(&legacy).unwrap().bytes, "startApp", "()V");
        assert_eq!(count_calls(&code.ops, "beginMethodCoverage"), 0);

        let resolver = resolver_for(&[legacy.clone()]);
        let with_legacy = Instrumenter::new(Platform::Midp, summary(), resolver).with_legacy_entry_point("com/example/Legacy");
        let code = method_code(&with_legacy.instrument_class(&legacy).unwrap().bytes, "startApp", "()V");
        assert_eq!(count_calls(&code.ops, "beginMethodCoverage"), 1);
    }

    #[test]
    fn command_callbacks_log_before_the_body() {
        let menu = TestClass::new("com/example/Menu", "javax/microedition/lcdui/Form")
            .implements(&[COMMAND_LISTENER])
            .method("commandAction", COMMAND_ACTION_DISPLAYABLE, 0, vec![ret()])
            .build();
        let field = TestClass::new("com/example/Field", "javax/microedition/lcdui/StringItem")
            .method("commandAction", COMMAND_ACTION_ITEM, 0, vec![ret()])
            .build();
        let helper = TestClass::new("com/example/Helper", OBJECT)
            .method("commandAction", COMMAND_ACTION_DISPLAYABLE, 0, vec![ret()])
            .build();
        let statics = TestClass::new("com/example/Statics", OBJECT)
            .implements(&[COMMAND_LISTENER])
            .static_method("commandAction", COMMAND_ACTION_DISPLAYABLE, 0, vec![ret()])
            .build();

        for (class, descriptor) in [(&menu, COMMAND_ACTION_DISPLAYABLE), (&field, COMMAND_ACTION_ITEM)] {
            let out = instrument(Platform::Midp, CoverageInitializationData::disabled(), class);
            assert!(out.changed);
            let code = method_code(&out.bytes, "commandAction", descriptor);
            let body = insns(&code.ops);
            assert_eq!(body[0].opcode(), ALOAD_2);
            assert_eq!(body[1].opcode(), ALOAD_1);
            assert!(calls(body[2], "logCommand"));
            assert!(body[3].is_return());
            assert_eq!(code.trailer.max_stack, 2);
        }

        let out = instrument(Platform::Midp, summary(), &menu);
        let code = method_code(&out.bytes, "commandAction", COMMAND_ACTION_DISPLAYABLE);
        let body = insns(&code.ops);
        assert!(calls(body[2], "logCommand"));
        assert!(always_preceded_by(&code, |i| calls(i, "markMethodCovered"), |i| i.is_return()));

        for class in [&helper, &statics] {
            let out = instrument(Platform::Midp, CoverageInitializationData::disabled(), class);
            assert!(!out.changed);
        }
    }

    #[test]
    fn rim_applications() {
        let app = TestClass::new("com/example/App", "net/rim/device/api/ui/UiApplication")
            .static_method("main", "([Ljava/lang/String;)V", 0, vec![ret()])
            .method("onExit", "()V", 1, vec![insn(ICONST_0), invoke(INVOKESTATIC, "java/lang/System", "exit", "(I)V"), ret()])
            .method("commandAction", COMMAND_ACTION_DISPLAYABLE, 0, vec![ret()])
            .build();
        let out = instrument(Platform::Rim, summary(), &app);

        let main = method_code(&out.bytes, "main", "([Ljava/lang/String;)V");
        let body = insns(&main.ops);
        assert!(calls(body[1], "beginMethodCoverage"));
        assert!(calls(body[2], "enableCoverage"));

        let exit = method_code(&out.bytes, "onExit", "()V");
        assert!(always_preceded_by(&exit, |i| calls(i, "writeReport"), |i| calls(i, "exit")));
        assert_eq!(count_calls(&exit.ops, "markMethodCovered"), 0);

        let callback = method_code(&out.bytes, "commandAction", COMMAND_ACTION_DISPLAYABLE);
        assert_eq!(count_calls(&callback.ops, "logCommand"), 0);

        let other = TestClass::new("com/example/Other", OBJECT)
            .method("quit", "()V", 1, vec![insn(ICONST_0), invoke(INVOKESTATIC, "java/lang/System", "exit", "(I)V"), ret()])
            .build();
        let out = instrument(Platform::Rim, summary(), &other);
        let quit = method_code(&out.bytes, "quit", "()V");
        assert_eq!(count_calls(&quit.ops, "writeReport"), 0);
        assert_eq!(count_calls(&quit.ops, "markMethodCovered"), 1);
    }

    #[test]
    #[should_panic]
    fn initialization_stage_needs_coverage() {
        let resolver = resolver_for(&[]);
        let _ = CoverageInitializationStage::new(
            Box::new(ClassWriter::new()),
            &resolver,
            Platform::Midp.descriptor(),
            Arc::new(CoverageInitializationData::disabled()),
            None,
        );
    }

    #[test]
    #[should_panic]
    fn decorator_needs_ui_events() {
        let resolver = resolver_for(&[]);
        let _ = DecoratorStage::new(Box::new(ClassWriter::new()), &resolver, Platform::Rim.descriptor());
    }
}
