use crate::classfile::error::{ClassError, ErrorKind};
use crate::hierarchy::descriptor::{ClassDescriptor, JAVA_LANG_OBJECT};
use crate::hierarchy::store::{DescriptorStore, MemorySource};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Type relationship queries over the classes a [`DescriptorStore`] can find.
///
/// Only the directly queried class must be resolvable. An ancestor no source
/// knows, or whose class file cannot be read, ends that branch of the walk, so
/// answers are a lower bound when the classpath is incomplete.
pub struct HierarchyResolver
{
    store: Arc<DescriptorStore>,
}

impl HierarchyResolver
{
    pub fn new(store: DescriptorStore) -> HierarchyResolver
    {
        HierarchyResolver { store: Arc::new(store) }
    }

    /// A resolver that also knows `classes`, ahead of this one's sources.
    /// This resolver's cache is shared, not changed.
    pub fn with_classes(&self, classes: MemorySource) -> HierarchyResolver
    {
        HierarchyResolver { store: Arc::new(DescriptorStore::layered(classes, self.store.clone())) }
    }

    pub fn store(&self) -> &DescriptorStore
    {
        &self.store
    }

    /// The descriptor of `name`, failing with `UnknownClass` if no source has it
    pub fn descriptor(&self, name: &str) -> Result<Arc<ClassDescriptor>, ClassError>
    {
        self.store.require(name)
    }

    /// The immediate superclass: None for java/lang/Object, java/lang/Object
    /// for every interface.
    pub fn superclass(&self, name: &str) -> Result<Option<String>, ClassError>
    {
        let d = self.descriptor(name)?;
        if d.is_interface
        {
            return Ok(Some(JAVA_LANG_OBJECT.to_string()));
        }
        Ok(d.super_name.clone())
    }

    pub fn is_interface(&self, name: &str) -> Result<bool, ClassError>
    {
        Ok(self.descriptor(name)?.is_interface)
    }

    /// `name` followed by every resolvable superclass, nearest first
    pub fn superclass_chain(&self, name: &str) -> Result<Vec<Arc<ClassDescriptor>>, ClassError>
    {
        let first = self.descriptor(name)?;
        let mut seen = HashSet::new();
        seen.insert(first.name.clone());
        let mut chain = vec![first];
        loop
        {
            let current = &chain[chain.len() - 1];
            let Some(super_name) = current.super_name.clone() else { break };
            if !seen.insert(super_name.clone())
            {
                return Err(err!(Cycle, "Superclass chain of {} loops back to {}", name, super_name));
            }
            match self.ancestor(&super_name)?
            {
                Some(d) => chain.push(d),
                None => {
                    debug!("superclass {} of {} is not resolvable, chain ends there", super_name, current.name);
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// True iff a value of class `b` can be stored in a variable of type `a`:
    /// `b` is `a`, or `a` is a superclass of `b`, or `a` is an interface `b`
    /// implements directly or through its superclasses and superinterfaces.
    pub fn is_assignable_from(&self, a: &str, b: &str) -> Result<bool, ClassError>
    {
        let chain = self.superclass_chain(b)?;
        if a == b || a == JAVA_LANG_OBJECT
        {
            return Ok(true);
        }
        // An unresolvable superclass still counts by name
        if chain.iter().any(|d| d.name == a || d.super_name.as_deref() == Some(a))
        {
            return Ok(true);
        }
        self.reaches_interface(&chain, a)
    }

    /// True iff `iface` is among the interfaces `class` implements, directly or
    /// through its superclasses and superinterfaces.
    pub fn is_implementing(&self, class: &str, iface: &str) -> Result<bool, ClassError>
    {
        let chain = self.superclass_chain(class)?;
        self.reaches_interface(&chain, iface)
    }

    /// An ancestor's descriptor, None if it is missing or unreadable
    fn ancestor(&self, name: &str) -> Result<Option<Arc<ClassDescriptor>>, ClassError>
    {
        match self.store.lookup(name)
        {
            Ok(d) => Ok(d),
            Err(e) if matches!(e.kind(), ErrorKind::Malformed | ErrorKind::Io) => {
                warn!("ancestor {} cannot be read, treating it as unresolvable: {}", name, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn reaches_interface(&self, chain: &[Arc<ClassDescriptor>], target: &str) -> Result<bool, ClassError>
    {
        let mut visited = HashSet::new();
        let mut path = vec![];
        for class in chain
        {
            if self.walk_interfaces(&class.interfaces, target, &mut visited, &mut path)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn walk_interfaces(
        &self,
        interfaces: &[String],
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Result<bool, ClassError>
    {
        for iface in interfaces
        {
            if iface == target
            {
                return Ok(true);
            }
            if path.contains(iface)
            {
                warn!("interface cycle through {}: {}", iface, path.join(" -> "));
                continue;
            }
            if !visited.insert(iface.clone())
            {
                continue;
            }
            let Some(d) = self.ancestor(iface)?
            else
            {
                debug!("interface {} is not resolvable, skipping its superinterfaces", iface);
                continue;
            };
            path.push(iface.clone());
            let found = self.walk_interfaces(&d.interfaces, target, visited, path)?;
            path.pop();
            if found
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_resolver() -> HierarchyResolver {
        HierarchyResolver::new(DescriptorStore::new(true))
    }

    #[test]
    fn server_socket_channel_chain() {
        let r = host_resolver();
        let chain: Vec<_> = r.superclass_chain("java/nio/channels/ServerSocketChannel").unwrap().iter().map(|d| d.name.clone()).collect();
        assert_eq!(
            chain,
            vec![
                "java/nio/channels/ServerSocketChannel",
                "java/nio/channels/spi/AbstractSelectableChannel",
                "java/nio/channels/SelectableChannel",
                "java/nio/channels/spi/AbstractInterruptibleChannel",
                "java/lang/Object",
            ]
        );
        assert_eq!(r.superclass("java/lang/Object").unwrap(), None);
    }

    #[test]
    fn server_socket_channel_superclass_steps() {
        let r = host_resolver();
        let mut name = "java/nio/channels/ServerSocketChannel".to_string();
        let mut steps = vec![];
        for _ in 0..4 {
            name = r.superclass(&name).unwrap().unwrap();
            steps.push(name.clone());
        }
        assert_eq!(
            steps,
            vec![
                "java/nio/channels/spi/AbstractSelectableChannel",
                "java/nio/channels/SelectableChannel",
                "java/nio/channels/spi/AbstractInterruptibleChannel",
                "java/lang/Object",
            ]
        );
        assert!(!r.is_assignable_from("java/nio/channels/ServerSocketChannel", "java/lang/Object").unwrap());
        assert!(r.is_assignable_from("java/lang/Object", "java/nio/channels/ServerSocketChannel").unwrap());
    }

    #[test]
    fn implementing_through_superclasses_and_superinterfaces() {
        let r = host_resolver();
        assert!(r.is_implementing("java/nio/channels/ServerSocketChannel", "java/io/Closeable").unwrap());
        assert!(r.is_implementing("java/nio/channels/ServerSocketChannel", "java/nio/channels/InterruptibleChannel").unwrap());
        assert!(r.is_implementing("java/nio/channels/ServerSocketChannel", "java/lang/AutoCloseable").unwrap());
        assert!(!r.is_implementing("java/nio/channels/ServerSocketChannel", "java/nio/channels/ByteChannel").unwrap());
        assert!(!r.is_implementing("java/lang/Thread", "java/io/Closeable").unwrap());
        assert!(r.is_implementing("java/io/ByteArrayOutputStream", "java/io/Closeable").unwrap());
        assert!(r.is_implementing("java/io/DataOutputStream", "java/io/Closeable").unwrap());
        assert!(!r.is_implementing("java/io/ByteArrayOutputStream", "java/nio/channels/InterruptibleChannel").unwrap());
        assert!(!r.is_implementing("java/io/DataOutputStream", "java/nio/channels/InterruptibleChannel").unwrap());
    }

    #[test]
    fn interfaces_report_object_as_superclass() {
        let r = host_resolver();
        assert!(r.is_interface("java/io/Closeable").unwrap());
        assert_eq!(r.superclass("java/io/Closeable").unwrap().as_deref(), Some(JAVA_LANG_OBJECT));
    }

    #[test]
    fn assignability_basics() {
        let r = host_resolver();
        assert!(r.is_assignable_from("java/lang/Exception", "java/io/EOFException").unwrap());
        assert!(!r.is_assignable_from("java/io/EOFException", "java/lang/Exception").unwrap());
        assert!(r.is_assignable_from("java/util/Collection", "java/util/Stack").unwrap());
        assert!(r.is_assignable_from("java/lang/Object", "java/io/Closeable").unwrap());
        assert!(r.is_assignable_from("java/lang/Iterable", "java/util/List").unwrap());
    }

    #[test]
    fn unknown_query_class_is_an_error() {
        let r = host_resolver();
        assert_eq!(r.superclass("no/such/Thing").unwrap_err().kind(), ErrorKind::UnknownClass);
        assert_eq!(r.is_assignable_from("java/lang/Object", "no/such/Thing").unwrap_err().kind(), ErrorKind::UnknownClass);
    }
}
