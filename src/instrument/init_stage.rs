use crate::classfile::code::{CodeOp, CodeTrailer, Insn};
use crate::classfile::error::ClassError;
use crate::hierarchy::HierarchyResolver;
use crate::instrument::{
    CoverageInitializationData, CoverageMode, InstrumentationContext, PlatformDescriptor, BEGIN_LINE_COVERAGE, BEGIN_METHOD_COVERAGE,
    ENABLE_COVERAGE,
};
use crate::visitor::{ClassHeader, ClassVisitor, ForwardingMethodVisitor, MethodHeader, MethodVisitor};
use log::info;
use std::sync::Arc;

/// Starts a coverage run when the application starts.
///
/// Only the entry-point class's startup method is touched: its body begins
/// with the call that opens the run, followed by the call enabling coverage.
pub struct CoverageInitializationStage<'a>
{
    next: Box<dyn ClassVisitor + 'a>,
    resolver: &'a HierarchyResolver,
    platform: &'static PlatformDescriptor,
    data: Arc<CoverageInitializationData>,
    legacy_entry_point: Option<&'a str>,
    context: Option<InstrumentationContext>,
}

impl<'a> CoverageInitializationStage<'a>
{
    /// # Panics
    ///
    /// If coverage is disabled; the stage must not be part of the chain then.
    pub fn new(
        next: Box<dyn ClassVisitor + 'a>,
        resolver: &'a HierarchyResolver,
        platform: &'static PlatformDescriptor,
        data: Arc<CoverageInitializationData>,
        legacy_entry_point: Option<&'a str>,
    ) -> Self
    {
        assert!(data.mode() != CoverageMode::Disabled, "coverage initialization stage built with coverage disabled");
        CoverageInitializationStage { next, resolver, platform, data, legacy_entry_point, context: None }
    }

    fn startup_ops(&self) -> (Vec<CodeOp>, u16)
    {
        let mut ops = vec![CodeOp::Insn(Insn::PushString(self.data.run_id().to_string()))];
        let stack = match (self.data.mode(), self.data.line_output_path())
        {
            (CoverageMode::Line, Some(path)) => {
                ops.push(CodeOp::Insn(Insn::PushString(path.to_string())));
                ops.push(CodeOp::Insn(Insn::invoke_static(BEGIN_LINE_COVERAGE.member())));
                BEGIN_LINE_COVERAGE.stack
            }
            _ => {
                ops.push(CodeOp::Insn(Insn::invoke_static(BEGIN_METHOD_COVERAGE.member())));
                BEGIN_METHOD_COVERAGE.stack
            }
        };
        ops.push(CodeOp::Insn(Insn::invoke_static(ENABLE_COVERAGE.member())));
        (ops, stack)
    }
}

impl ClassVisitor for CoverageInitializationStage<'_>
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        let context =
            InstrumentationContext::for_class(header, self.resolver, self.platform, self.data.mode(), self.legacy_entry_point)?;
        if context.is_entry_point_class
        {
            info!("{}: application entry point, coverage run starts in {}", header.name, self.platform.startup.name);
        }
        self.context = Some(context);
        self.next.visit(header)
    }

    fn visit_method<'m>(&'m mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'm>, ClassError>
    {
        let startup = self.platform.startup;
        let applies = self.context.as_ref().map(|c| c.is_entry_point_class).unwrap_or(false)
            && header.matches(startup.name, startup.descriptor);
        let inserted = if applies { Some(self.startup_ops()) } else { None };

        let next = self.next.visit_method(header)?;
        let adapter: Box<dyn MethodVisitor + 'm> = match inserted
        {
            Some((ops, stack)) => Box::new(BodyStartAdapter { next, pending: Some(ops), stack }),
            None => ForwardingMethodVisitor::new(next),
        };
        Ok(adapter)
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        self.context = None;
        self.next.visit_end()
    }
}

/// Emits queued ops ahead of the first event of the body, labels included,
/// so a branch back to the method start never re-runs them.
pub(crate) struct BodyStartAdapter<'m>
{
    pub(crate) next: Box<dyn MethodVisitor + 'm>,
    pub(crate) pending: Option<Vec<CodeOp>>,
    pub(crate) stack: u16,
}

impl MethodVisitor for BodyStartAdapter<'_>
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>
    {
        if let Some(ops) = self.pending.take()
        {
            for synthetic in ops
            {
                self.next.visit_op(synthetic)?;
            }
        }
        self.next.visit_op(op)
    }

    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        let BodyStartAdapter { next, pending, stack } = *self;
        let trailer = match trailer
        {
            Some(mut t) if pending.is_none() => {
                // The stack is empty at body start
                t.max_stack = t.max_stack.max(stack);
                Some(t)
            }
            other => other,
        };
        next.visit_end(trailer)
    }
}
