use crate::classfile::code::{CodeOp, CodeTrailer, Insn};
use crate::classfile::constant_pool::MemberRef;
use crate::classfile::error::{ClassError, ErrorKind};
use crate::coverage::ClassManifest;
use crate::hierarchy::HierarchyResolver;
use crate::instrument::{
    method_id, CoverageInitializationData, CoverageMode, Hook, InstrumentationContext, PlatformDescriptor, MARK_LINE_COVERED,
    MARK_METHOD_COVERED, WRITE_REPORT,
};
use crate::visitor::{ClassHeader, ClassVisitor, ForwardingMethodVisitor, InsertionPoint, MethodHeader, MethodVisitor};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Records which methods, and in line mode which lines, run.
///
/// Every method with code reports itself covered before each of its returns.
/// The entry-point class's shutdown method instead flushes the coverage report
/// right before each call to the platform's termination primitive.
pub struct CoverageCollectionStage<'a>
{
    next: Box<dyn ClassVisitor + 'a>,
    resolver: &'a HierarchyResolver,
    platform: &'static PlatformDescriptor,
    data: Arc<CoverageInitializationData>,
    legacy_entry_point: Option<&'a str>,
    context: Option<InstrumentationContext>,
    manifest: Option<&'a mut ClassManifest>,
}

impl<'a> CoverageCollectionStage<'a>
{
    pub fn new(
        next: Box<dyn ClassVisitor + 'a>,
        resolver: &'a HierarchyResolver,
        platform: &'static PlatformDescriptor,
        data: Arc<CoverageInitializationData>,
        legacy_entry_point: Option<&'a str>,
    ) -> Self
    {
        CoverageCollectionStage { next, resolver, platform, data, legacy_entry_point, context: None, manifest: None }
    }

    /// Lists each marked method and its marked lines in `manifest`
    pub fn with_manifest(mut self, manifest: &'a mut ClassManifest) -> Self
    {
        self.manifest = Some(manifest);
        self
    }
}

impl ClassVisitor for CoverageCollectionStage<'_>
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        let context =
            InstrumentationContext::for_class(header, self.resolver, self.platform, self.data.mode(), self.legacy_entry_point)?;
        if context.is_shutdown_capable
        {
            info!("{}: coverage report flushed in {}", header.name, self.platform.shutdown.name);
        }
        self.context = Some(context);
        self.next.visit(header)
    }

    fn visit_method<'m>(&'m mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'm>, ClassError>
    {
        let Some(context) = self.context.clone() else {
            fail!("Method {} visited before class-start", header.name);
        };
        let shutdown = self.platform.shutdown;
        let resolver = self.resolver;
        let termination = self.platform.termination;
        let base_class = self.platform.base_class;

        let next = self.next.visit_method(header)?;
        let manifest = self.manifest.as_deref_mut();
        let adapter: Box<dyn MethodVisitor + 'm> = if context.mode == CoverageMode::Disabled
        {
            ForwardingMethodVisitor::new(next)
        }
        else if context.is_shutdown_capable && header.matches(shutdown.name, shutdown.descriptor)
        {
            Box::new(FlushBeforeTermination {
                next,
                resolver,
                termination,
                base_class,
                class_name: context.class_name.clone(),
                method_name: header.name.clone(),
                flushes: 0,
            })
        }
        else
        {
            Box::new(MarkCovered {
                next,
                id: method_id(&context.class_name, &header.name, &header.descriptor),
                line_mode: context.mode == CoverageMode::Line,
                method: format!("{}{}", header.name, header.descriptor),
                manifest,
                insertion: InsertionPoint::default(),
                lines: HashSet::new(),
                stack: 0,
            })
        };
        Ok(adapter)
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        self.context = None;
        self.next.visit_end()
    }
}

fn call(hook: &Hook) -> CodeOp
{
    CodeOp::Insn(Insn::invoke_static(hook.member()))
}

/// Marks the method covered before every return and, in line mode, each
/// distinct line the first time it starts.
struct MarkCovered<'m>
{
    next: Box<dyn MethodVisitor + 'm>,
    id: String,
    line_mode: bool,
    method: String,
    manifest: Option<&'m mut ClassManifest>,
    insertion: InsertionPoint,
    lines: HashSet<u16>,
    /// Largest operand push of the sequences inserted so far
    stack: u16,
}

impl MethodVisitor for MarkCovered<'_>
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>
    {
        match &op
        {
            CodeOp::Line(line) if self.line_mode => {
                let line = *line;
                self.insertion.forward(op, &mut *self.next)?;
                if self.lines.insert(line)
                {
                    self.insertion.before_next_insn([
                        CodeOp::Insn(Insn::PushString(self.id.clone())),
                        CodeOp::Insn(Insn::PushInt(line as i32)),
                        call(&MARK_LINE_COVERED),
                    ]);
                    self.stack = self.stack.max(MARK_LINE_COVERED.stack);
                }
                Ok(())
            }
            CodeOp::Insn(insn) if insn.is_return() => {
                self.insertion.before_next_insn([CodeOp::Insn(Insn::PushString(self.id.clone())), call(&MARK_METHOD_COVERED)]);
                self.stack = self.stack.max(MARK_METHOD_COVERED.stack);
                self.insertion.forward(op, &mut *self.next)
            }
            _ => self.insertion.forward(op, &mut *self.next),
        }
    }

    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        let MarkCovered { next, insertion, stack, id, method, manifest, lines, .. } = *self;
        if !insertion.is_empty()
        {
            fail!("{} ends with instrumentation queued after its last instruction", id);
        }
        // Nothing marked means nothing can ever report the method
        if let Some(manifest) = manifest.filter(|_| trailer.is_some() && stack > 0)
        {
            manifest.add_method(&method, lines);
        }
        // A return leaves its value on the stack below the inserted pushes
        let trailer = trailer.map(|mut t| {
            t.max_stack = t.max_stack.saturating_add(stack);
            t
        });
        next.visit_end(trailer)
    }
}

/// Calls the report flush right before each call to the termination primitive
struct FlushBeforeTermination<'m>
{
    next: Box<dyn MethodVisitor + 'm>,
    resolver: &'m HierarchyResolver,
    termination: Hook,
    base_class: &'static str,
    class_name: String,
    method_name: String,
    flushes: usize,
}

impl FlushBeforeTermination<'_>
{
    fn is_termination(&self, method: &MemberRef) -> Result<bool, ClassError>
    {
        if method.name != self.termination.name || method.descriptor != self.termination.descriptor
        {
            return Ok(false);
        }
        if method.owner == self.termination.owner
        {
            return Ok(true);
        }
        // An inherited primitive is called through the subclass, typically this class
        if method.owner == self.class_name && self.termination.owner == self.base_class
        {
            return Ok(true);
        }
        match self.resolver.is_assignable_from(self.termination.owner, &method.owner)
        {
            Ok(found) => Ok(found),
            Err(e) if e.kind() == ErrorKind::UnknownClass => {
                debug!("owner {} of {} is not resolvable", method.owner, method);
                Ok(false)
            }
            Err(e) if matches!(e.kind(), ErrorKind::Malformed | ErrorKind::Io) => {
                warn!("owner {} of {} cannot be read: {}", method.owner, method, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl MethodVisitor for FlushBeforeTermination<'_>
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>
    {
        if let CodeOp::Insn(Insn::Invoke { method, cp_index: Some(_), .. }) = &op
        {
            if self.is_termination(method)?
            {
                self.next.visit_op(call(&WRITE_REPORT))?;
                self.flushes += 1;
            }
        }
        self.next.visit_op(op)
    }

    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        if trailer.is_some() && self.flushes == 0
        {
            warn!(
                "{}.{} never calls {}.{}, coverage is not flushed there",
                self.class_name, self.method_name, self.termination.owner, self.termination.name
            );
        }
        self.next.visit_end(trailer)
    }
}
