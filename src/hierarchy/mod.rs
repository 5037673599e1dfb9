//! Class hierarchy queries for classes the tool cannot load.
//!
//! Descriptors come from class files (the batch being instrumented, classpath
//! directories and JARs) or from a bundled table of standard library classes.

pub mod descriptor;
pub mod host;
pub mod resolver;
pub mod store;

pub use descriptor::{ClassDescriptor, Origin, JAVA_LANG_OBJECT};
pub use resolver::HierarchyResolver;
pub use store::{ClassSource, DescriptorStore, DirectorySource, JarSource, MemorySource};
