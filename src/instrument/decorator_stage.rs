use crate::classfile::code::{CodeOp, Insn};
use crate::classfile::error::ClassError;
use crate::hierarchy::HierarchyResolver;
use crate::instrument::init_stage::BodyStartAdapter;
use crate::instrument::{is_subtype, PlatformDescriptor, LOG_COMMAND};
use crate::visitor::{ClassHeader, ClassVisitor, ForwardingMethodVisitor, MethodHeader, MethodVisitor};
use log::{debug, info};

/// Logs every command fired at a UI component, so a test run can be replayed.
///
/// A class is decorated when it is a displayable, an item or a command
/// listener of either kind. Its command callbacks then start with a call
/// handing the component and the command to the command log.
pub struct DecoratorStage<'a>
{
    next: Box<dyn ClassVisitor + 'a>,
    resolver: &'a HierarchyResolver,
    platform: &'static PlatformDescriptor,
    applicable: bool,
}

impl<'a> DecoratorStage<'a>
{
    /// # Panics
    ///
    /// If the platform has no scriptable UI events.
    pub fn new(next: Box<dyn ClassVisitor + 'a>, resolver: &'a HierarchyResolver, platform: &'static PlatformDescriptor) -> Self
    {
        assert!(
            platform.decoration && platform.capabilities.is_some(),
            "decorator stage built for {}, which has no UI events",
            platform.platform
        );
        DecoratorStage { next, resolver, platform, applicable: false }
    }

    fn applies_to(&self, header: &ClassHeader) -> Result<bool, ClassError>
    {
        let Some(capabilities) = self.platform.capabilities else { return Ok(false) };
        for capability in capabilities.all()
        {
            if is_subtype(self.resolver, header, capability)?
            {
                debug!("{} is a {}", header.name, capability);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl ClassVisitor for DecoratorStage<'_>
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        self.applicable = !header.is_interface() && self.applies_to(header)?;
        if self.applicable
        {
            info!("{}: logging fired commands", header.name);
        }
        self.next.visit(header)
    }

    fn visit_method<'m>(&'m mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'm>, ClassError>
    {
        let callback = self.applicable
            && !header.is_static()
            && self.platform.command_callbacks.iter().any(|c| header.matches(c.name, c.descriptor));

        let next = self.next.visit_method(header)?;
        let adapter: Box<dyn MethodVisitor + 'm> = if callback
        {
            // commandAction(Command command, <component>): the component is
            // local 2 and the command local 1
            let ops = vec![
                CodeOp::Insn(Insn::load_reference(2)),
                CodeOp::Insn(Insn::load_reference(1)),
                CodeOp::Insn(Insn::invoke_static(LOG_COMMAND.member())),
            ];
            Box::new(BodyStartAdapter { next, pending: Some(ops), stack: LOG_COMMAND.stack })
        }
        else
        {
            ForwardingMethodVisitor::new(next)
        };
        Ok(adapter)
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        self.applicable = false;
        self.next.visit_end()
    }
}
