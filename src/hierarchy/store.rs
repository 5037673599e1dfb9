use crate::classfile::error::{ClassError, ErrorKind};
use crate::hierarchy::descriptor::ClassDescriptor;
use crate::hierarchy::host::host_class;
use crate::jar::JarFile;
use log::debug;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Somewhere class files can be looked up by internal name
pub trait ClassSource: Send + Sync
{
    /// Short description for log messages
    fn describe(&self) -> String;

    /// The class file bytes for `class_name`, or None if this source lacks it
    fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError>;
}

/// Class files held in memory, keyed by the name inside each file
#[derive(Debug, Default, Clone)]
pub struct MemorySource
{
    classes: HashMap<String, Vec<u8>>,
}

impl MemorySource
{
    pub fn new() -> MemorySource
    {
        MemorySource::default()
    }

    /// Adds a class file, returning its name
    pub fn add(&mut self, bytes: Vec<u8>) -> Result<String, ClassError>
    {
        let name = ClassDescriptor::from_bytes(&bytes)?.name;
        self.classes.insert(name.clone(), bytes);
        Ok(name)
    }

    pub fn len(&self) -> usize
    {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.classes.is_empty()
    }
}

impl ClassSource for MemorySource
{
    fn describe(&self) -> String
    {
        format!("{} in-memory classes", self.classes.len())
    }

    fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError>
    {
        Ok(self.classes.get(class_name).cloned())
    }
}

/// A classpath directory laid out as `a/b/C.class`
#[derive(Debug, Clone)]
pub struct DirectorySource
{
    root: PathBuf,
}

impl DirectorySource
{
    pub fn new(root: impl AsRef<Path>) -> DirectorySource
    {
        DirectorySource { root: root.as_ref().to_path_buf() }
    }
}

impl ClassSource for DirectorySource
{
    fn describe(&self) -> String
    {
        self.root.display().to_string()
    }

    fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError>
    {
        let path = self.root.join(format!("{}.class", class_name));
        match fs::read(&path)
        {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClassError::with_context(e.into(), path.display().to_string())),
        }
    }
}

/// A classpath JAR, read into memory once
#[derive(Debug)]
pub struct JarSource
{
    path: PathBuf,
    jar: JarFile,
}

impl JarSource
{
    pub fn open(path: impl AsRef<Path>) -> Result<JarSource, ClassError>
    {
        let path = path.as_ref().to_path_buf();
        let jar = JarFile::from_file(&path)
            .map_err(|e| ClassError::with_context(err!(Io, "{}", e), path.display().to_string()))?;
        Ok(JarSource { path, jar })
    }

    pub fn from_jar(path: impl AsRef<Path>, jar: JarFile) -> JarSource
    {
        JarSource { path: path.as_ref().to_path_buf(), jar }
    }
}

impl ClassSource for JarSource
{
    fn describe(&self) -> String
    {
        self.path.display().to_string()
    }

    fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError>
    {
        Ok(self.jar.class_bytes(class_name).map(<[u8]>::to_vec))
    }
}

type CacheSlot = Arc<OnceCell<Option<Arc<ClassDescriptor>>>>;

/// Resolves class names to descriptors and caches the answer, found or not.
///
/// Each name is filled at most once even when many threads ask at the same
/// time; the map lock is only held long enough to fetch the name's slot.
pub struct DescriptorStore
{
    sources: Vec<Box<dyn ClassSource>>,
    prefer_host: bool,
    /// Asked after this store's own sources, sharing its cache between layers
    parent: Option<Arc<DescriptorStore>>,
    cache: Mutex<HashMap<String, CacheSlot>>,
}

impl DescriptorStore
{
    /// `prefer_host` is set when the target platform's standard library has
    /// the same hierarchy as the bundled table, which is then consulted first.
    pub fn new(prefer_host: bool) -> DescriptorStore
    {
        DescriptorStore { sources: vec![], prefer_host, parent: None, cache: Mutex::new(HashMap::new()) }
    }

    /// A store that looks in `source` first and then in `parent`
    pub fn layered(source: impl ClassSource + 'static, parent: Arc<DescriptorStore>) -> DescriptorStore
    {
        let mut store = DescriptorStore::new(parent.prefer_host);
        store.parent = Some(parent);
        store.add_source(Box::new(source));
        store
    }

    pub fn with_source(mut self, source: impl ClassSource + 'static) -> DescriptorStore
    {
        self.add_source(Box::new(source));
        self
    }

    pub fn add_source(&mut self, source: Box<dyn ClassSource>)
    {
        debug!("class source added: {}", source.describe());
        self.sources.push(source);
    }

    pub fn prefers_host(&self) -> bool
    {
        self.prefer_host
    }

    /// The descriptor for `class_name`, None if no source has it
    pub fn lookup(&self, class_name: &str) -> Result<Option<Arc<ClassDescriptor>>, ClassError>
    {
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.entry(class_name.to_string()).or_default().clone()
        };
        slot.get_or_try_init(|| self.load(class_name)).cloned()
    }

    /// Number of names resolved so far, including misses
    pub fn cached(&self) -> usize
    {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn load(&self, class_name: &str) -> Result<Option<Arc<ClassDescriptor>>, ClassError>
    {
        if self.prefer_host
        {
            if let Some(d) = host_class(class_name)
            {
                return Ok(Some(d));
            }
        }
        for source in &self.sources
        {
            if let Some(bytes) = source.find(class_name)?
            {
                let d = ClassDescriptor::from_bytes(&bytes)
                    .map_err(|e| ClassError::with_context(e, format!("{} in {}", class_name, source.describe())))?;
                if d.name != class_name
                {
                    return Err(err!(Malformed, "{} in {} declares itself as {}", class_name, source.describe(), d.name));
                }
                debug!("{} resolved from {}", class_name, source.describe());
                return Ok(Some(Arc::new(d)));
            }
        }
        if let Some(parent) = &self.parent
        {
            return parent.lookup(class_name);
        }
        if !self.prefer_host
        {
            if let Some(d) = host_class(class_name)
            {
                return Ok(Some(d));
            }
        }
        debug!("{} not found in any class source", class_name);
        Ok(None)
    }

    /// Like [`DescriptorStore::lookup`] but a miss is an `UnknownClass` error
    pub fn require(&self, class_name: &str) -> Result<Arc<ClassDescriptor>, ClassError>
    {
        self.lookup(class_name)?
            .ok_or_else(|| ClassError::of_kind(ErrorKind::UnknownClass, &format!("Class {} not found", class_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::descriptor::Origin;
    use crate::tests::builder::TestClass;

    struct CountingSource {
        inner: MemorySource,
        hits: std::sync::atomic::AtomicUsize,
    }

    impl ClassSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError> {
            self.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.find(class_name)
        }
    }

    #[test]
    fn misses_are_cached_too() {
        let store = DescriptorStore::new(true);
        assert!(store.lookup("no/such/Class").unwrap().is_none());
        assert!(store.lookup("no/such/Class").unwrap().is_none());
        assert_eq!(store.cached(), 1);
        assert_eq!(store.require("no/such/Class").unwrap_err().kind(), ErrorKind::UnknownClass);
    }

    #[test]
    fn host_table_answers_standard_classes() {
        let store = DescriptorStore::new(false);
        let d = store.require("java/lang/Thread").unwrap();
        assert_eq!(d.origin, Origin::HostEquivalent);
        assert_eq!(d.interfaces, vec!["java/lang/Runnable"]);
    }

    #[test]
    fn each_name_is_loaded_once_across_threads() {
        let source = Arc::new(CountingSource { inner: MemorySource::new(), hits: Default::default() });
        struct Shared(Arc<CountingSource>);
        impl ClassSource for Shared {
            fn describe(&self) -> String {
                self.0.describe()
            }
            fn find(&self, class_name: &str) -> Result<Option<Vec<u8>>, ClassError> {
                self.0.find(class_name)
            }
        }
        let store = Arc::new(DescriptorStore::new(false).with_source(Shared(source.clone())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.lookup("a/Missing").unwrap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_none());
        }
        assert_eq!(source.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn layers_shadow_their_parent() {
        let mut base = MemorySource::new();
        base.add(TestClass::new("p/Base", "java/lang/Object").build()).unwrap();
        base.add(TestClass::new("p/Game", "java/lang/Object").build()).unwrap();
        let parent = Arc::new(DescriptorStore::new(false).with_source(base));

        let mut batch = MemorySource::new();
        batch.add(TestClass::new("p/Game", "p/Base").build()).unwrap();
        let layer = DescriptorStore::layered(batch, parent.clone());

        assert_eq!(layer.require("p/Game").unwrap().super_name.as_deref(), Some("p/Base"));
        assert_eq!(parent.require("p/Game").unwrap().super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(layer.require("p/Base").unwrap().name, "p/Base");
        assert_eq!(layer.require("java/lang/Thread").unwrap().origin, Origin::HostEquivalent);
        assert!(layer.lookup("p/Missing").unwrap().is_none());
    }

    #[test]
    fn missing_directory_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(source.find("a/B").unwrap().is_none());
    }
}
