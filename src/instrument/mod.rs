//! Platform tables, runtime hooks and the stages that insert calls to them.

pub mod collect_stage;
pub mod decorator_stage;
pub mod init_stage;
pub mod pipeline;

pub use collect_stage::CoverageCollectionStage;
pub use decorator_stage::DecoratorStage;
pub use init_stage::CoverageInitializationStage;
pub use pipeline::{BatchOutcome, InstrumentedClass, Instrumenter, JarReport};

use crate::classfile::constant_pool::MemberRef;
use crate::classfile::error::{ClassError, ErrorKind};
use crate::hierarchy::HierarchyResolver;
use crate::visitor::ClassHeader;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Package holding the support classes instrumented code calls into
pub const RUNTIME_PACKAGE: &str = "cldc/instrument/runtime/";
pub const COVERAGE_RUNTIME: &str = "cldc/instrument/runtime/Coverage";
pub const COMMAND_LOG_RUNTIME: &str = "cldc/instrument/runtime/CommandLog";

/// A static method of the support runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hook
{
    pub owner: &'static str,
    pub name: &'static str,
    pub descriptor: &'static str,
    /// Operand stack slots the call's arguments take
    pub stack: u16,
}

impl Hook
{
    pub fn member(&self) -> MemberRef
    {
        MemberRef::new(self.owner, self.name, self.descriptor)
    }
}

pub const BEGIN_METHOD_COVERAGE: Hook =
    Hook { owner: COVERAGE_RUNTIME, name: "beginMethodCoverage", descriptor: "(Ljava/lang/String;)V", stack: 1 };
pub const BEGIN_LINE_COVERAGE: Hook =
    Hook { owner: COVERAGE_RUNTIME, name: "beginLineCoverage", descriptor: "(Ljava/lang/String;Ljava/lang/String;)V", stack: 2 };
pub const ENABLE_COVERAGE: Hook = Hook { owner: COVERAGE_RUNTIME, name: "enableCoverage", descriptor: "()V", stack: 0 };
pub const MARK_METHOD_COVERED: Hook =
    Hook { owner: COVERAGE_RUNTIME, name: "markMethodCovered", descriptor: "(Ljava/lang/String;)V", stack: 1 };
pub const MARK_LINE_COVERED: Hook =
    Hook { owner: COVERAGE_RUNTIME, name: "markLineCovered", descriptor: "(Ljava/lang/String;I)V", stack: 2 };
pub const WRITE_REPORT: Hook = Hook { owner: COVERAGE_RUNTIME, name: "writeReport", descriptor: "()V", stack: 0 };
pub const LOG_COMMAND: Hook = Hook {
    owner: COMMAND_LOG_RUNTIME,
    name: "logCommand",
    descriptor: "(Ljava/lang/Object;Ljavax/microedition/lcdui/Command;)V",
    stack: 2,
};

/// The id a method's coverage is recorded under: class and method separated
/// by a space, e.g. `com/example/Main startApp()V`
pub fn method_id(class_name: &str, name: &str, descriptor: &str) -> String
{
    format!("{} {}{}", class_name, name, descriptor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform
{
    /// CLDC/MIDP MIDlet suites
    Midp,
    /// RIM BlackBerry device API applications
    Rim,
}

impl Platform
{
    pub fn descriptor(&self) -> &'static PlatformDescriptor
    {
        &PLATFORMS[self]
    }
}

impl fmt::Display for Platform
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Platform::Midp => write!(f, "midp"),
            Platform::Rim => write!(f, "rim"),
        }
    }
}

/// A method by name and descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSig
{
    pub name: &'static str,
    pub descriptor: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities
{
    pub displayable: &'static str,
    pub item: &'static str,
    pub command_listener: &'static str,
    pub item_command_listener: &'static str,
}

impl Capabilities
{
    pub fn all(&self) -> [&'static str; 4]
    {
        [self.displayable, self.item, self.command_listener, self.item_command_listener]
    }
}

/// The names a platform's application model is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor
{
    pub platform: Platform,
    pub base_class: &'static str,
    pub startup: MethodSig,
    pub shutdown: MethodSig,
    /// The call that ends the process; coverage must be flushed before it
    pub termination: Hook,
    /// None on platforms without scriptable UI events
    pub capabilities: Option<Capabilities>,
    pub command_callbacks: &'static [MethodSig],
    pub decoration: bool,
    /// True if the platform's standard library has the hierarchy of the
    /// bundled host table
    pub shares_host_hierarchy: bool,
}

static MIDP_COMMAND_CALLBACKS: [MethodSig; 2] = [
    MethodSig {
        name: "commandAction",
        descriptor: "(Ljavax/microedition/lcdui/Command;Ljavax/microedition/lcdui/Displayable;)V",
    },
    MethodSig { name: "commandAction", descriptor: "(Ljavax/microedition/lcdui/Command;Ljavax/microedition/lcdui/Item;)V" },
];

static PLATFORMS: Lazy<HashMap<Platform, PlatformDescriptor>> = Lazy::new(|| {
    let midp = PlatformDescriptor {
        platform: Platform::Midp,
        base_class: "javax/microedition/midlet/MIDlet",
        startup: MethodSig { name: "startApp", descriptor: "()V" },
        shutdown: MethodSig { name: "destroyApp", descriptor: "(Z)V" },
        termination: Hook { owner: "javax/microedition/midlet/MIDlet", name: "notifyDestroyed", descriptor: "()V", stack: 1 },
        capabilities: Some(Capabilities {
            displayable: "javax/microedition/lcdui/Displayable",
            item: "javax/microedition/lcdui/Item",
            command_listener: "javax/microedition/lcdui/CommandListener",
            item_command_listener: "javax/microedition/lcdui/ItemCommandListener",
        }),
        command_callbacks: &MIDP_COMMAND_CALLBACKS,
        decoration: true,
        shares_host_hierarchy: false,
    };
    let rim = PlatformDescriptor {
        platform: Platform::Rim,
        base_class: "net/rim/device/api/system/Application",
        startup: MethodSig { name: "main", descriptor: "([Ljava/lang/String;)V" },
        shutdown: MethodSig { name: "onExit", descriptor: "()V" },
        termination: Hook { owner: "java/lang/System", name: "exit", descriptor: "(I)V", stack: 1 },
        capabilities: None,
        command_callbacks: &[],
        decoration: false,
        shares_host_hierarchy: false,
    };
    HashMap::from([(Platform::Midp, midp), (Platform::Rim, rim)])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode
{
    Disabled,
    /// Method coverage only
    Summary,
    /// Method and line coverage
    Line,
}

/// Coverage settings for one instrumentation run, shared by every class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageInitializationData
{
    mode: CoverageMode,
    run_id: String,
    line_output_path: Option<String>,
}

impl CoverageInitializationData
{
    /// Line mode needs somewhere to write line data
    pub fn new(mode: CoverageMode, run_id: &str, line_output_path: Option<&str>) -> Result<Self, ClassError>
    {
        if mode == CoverageMode::Line && line_output_path.is_none()
        {
            return Err(err!(InvalidArgument, "line coverage needs a line output path"));
        }
        Ok(CoverageInitializationData {
            mode,
            run_id: run_id.to_string(),
            line_output_path: line_output_path.map(str::to_string),
        })
    }

    pub fn disabled() -> Self
    {
        CoverageInitializationData { mode: CoverageMode::Disabled, run_id: String::new(), line_output_path: None }
    }

    pub fn mode(&self) -> CoverageMode
    {
        self.mode
    }

    pub fn run_id(&self) -> &str
    {
        &self.run_id
    }

    pub fn line_output_path(&self) -> Option<&str>
    {
        self.line_output_path.as_deref()
    }
}

/// Per-class facts the stages decide on, computed at class-start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationContext
{
    pub class_name: String,
    pub is_entry_point_class: bool,
    /// The class inherits the platform's shutdown method
    pub is_shutdown_capable: bool,
    pub mode: CoverageMode,
    pub platform: Platform,
}

impl InstrumentationContext
{
    pub fn for_class(
        header: &ClassHeader,
        resolver: &HierarchyResolver,
        platform: &PlatformDescriptor,
        mode: CoverageMode,
        legacy_entry_point: Option<&str>,
    ) -> Result<InstrumentationContext, ClassError>
    {
        let is_entry_point_class = !header.is_interface()
            && (legacy_entry_point == Some(header.name.as_str()) || is_subtype(resolver, header, platform.base_class)?);
        Ok(InstrumentationContext {
            class_name: header.name.clone(),
            is_entry_point_class,
            is_shutdown_capable: is_entry_point_class,
            mode,
            platform: platform.platform,
        })
    }
}

/// True if the class described by `header` is `target` or extends or
/// implements it. The class itself need not be resolvable, since it may be
/// the one being rewritten; unresolvable or unreadable ancestors count as
/// unrelated.
pub fn is_subtype(resolver: &HierarchyResolver, header: &ClassHeader, target: &str) -> Result<bool, ClassError>
{
    if header.name == target
    {
        return Ok(true);
    }
    for ancestor in header.super_name.iter().chain(header.interfaces.iter())
    {
        if ancestor == target
        {
            return Ok(true);
        }
        match resolver.is_assignable_from(target, ancestor)
        {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) if e.kind() == ErrorKind::UnknownClass => {}
            Err(e) if matches!(e.kind(), ErrorKind::Malformed | ErrorKind::Io) => {
                warn!("{}: ancestor {} cannot be read, treating it as unrelated: {}", header.name, ancestor, e);
            }
            Err(e) => return Err(ClassError::with_context(e, header.name.clone())),
        }
    }
    Ok(false)
}
