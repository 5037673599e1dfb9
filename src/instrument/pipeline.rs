use crate::classfile::error::ClassError;
use crate::config::InstrumentConfig;
use crate::coverage::ClassManifest;
use crate::hierarchy::{HierarchyResolver, JarSource, MemorySource};
use crate::instrument::{
    CoverageCollectionStage, CoverageInitializationData, CoverageInitializationStage, CoverageMode, DecoratorStage, Platform,
    PlatformDescriptor, RUNTIME_PACKAGE,
};
use crate::jar::{JarFile, JarResult};
use crate::visitor::{ClassReader, ClassVisitor, ClassWriter};
use log::{debug, error, info};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Result of running one class through the stage chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedClass
{
    pub name: String,
    pub bytes: Vec<u8>,
    /// False if no stage inserted anything; `bytes` are then the input
    pub changed: bool,
    /// What the instrumented class can report covered
    pub manifest: ClassManifest,
}

/// One entry of a batch with its own result, so a bad file fails alone
#[derive(Debug)]
pub struct BatchOutcome
{
    pub entry: String,
    pub result: Result<InstrumentedClass, ClassError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JarReport
{
    /// Entries rewritten with instrumentation
    pub instrumented: Vec<String>,
    pub unchanged: usize,
    /// Entries kept as they were because they could not be processed, with the reason
    pub failures: Vec<(String, String)>,
    /// Manifests of the instrumented classes, in entry order
    pub manifest: Vec<ClassManifest>,
}

/// Builds the stage chain for each class of an application and runs it.
///
/// The chain, outermost first, is coverage initialization, coverage
/// collection, the command decorator and the writer. Coverage stages are left
/// out when coverage is disabled, the decorator on platforms without UI events.
pub struct Instrumenter
{
    platform: &'static PlatformDescriptor,
    coverage: Arc<CoverageInitializationData>,
    legacy_entry_point: Option<String>,
    resolver: HierarchyResolver,
}

impl Instrumenter
{
    pub fn new(platform: Platform, coverage: CoverageInitializationData, resolver: HierarchyResolver) -> Instrumenter
    {
        Instrumenter { platform: platform.descriptor(), coverage: Arc::new(coverage), legacy_entry_point: None, resolver }
    }

    pub fn with_legacy_entry_point(mut self, class_name: impl Into<String>) -> Instrumenter
    {
        self.legacy_entry_point = Some(class_name.into());
        self
    }

    /// An instrumenter resolving classes from the configured classpath only
    pub fn from_config(config: &InstrumentConfig) -> Result<Instrumenter, ClassError>
    {
        let store = config.descriptor_store()?;
        let mut instrumenter = Instrumenter::new(config.platform, config.to_coverage_data()?, HierarchyResolver::new(store));
        instrumenter.legacy_entry_point = config.legacy_entry_point_name();
        Ok(instrumenter)
    }

    /// An instrumenter for the classes of `jar`, which are resolvable ahead
    /// of the configured classpath
    pub fn for_jar(config: &InstrumentConfig, jar: &JarFile) -> Result<Instrumenter, ClassError>
    {
        let mut store = config.descriptor_store()?;
        store.add_source(Box::new(JarSource::from_jar("<application>", jar.clone())));
        let mut instrumenter = Instrumenter::new(config.platform, config.to_coverage_data()?, HierarchyResolver::new(store));
        instrumenter.legacy_entry_point = config.legacy_entry_point_name();
        Ok(instrumenter)
    }

    pub fn platform(&self) -> &'static PlatformDescriptor
    {
        self.platform
    }

    pub fn coverage(&self) -> &CoverageInitializationData
    {
        &self.coverage
    }

    pub fn resolver(&self) -> &HierarchyResolver
    {
        &self.resolver
    }

    /// Runs one class file through the chain
    pub fn instrument_class(&self, bytes: &[u8]) -> Result<InstrumentedClass, ClassError>
    {
        self.instrument_with(&self.resolver, bytes)
    }

    fn instrument_with(&self, resolver: &HierarchyResolver, bytes: &[u8]) -> Result<InstrumentedClass, ClassError>
    {
        let reader = ClassReader::from_bytes(bytes)?;
        let name = reader.class_file().name()?.to_string();
        let unchanged = |name: String| InstrumentedClass {
            manifest: ClassManifest::new(&name),
            name,
            bytes: bytes.to_vec(),
            changed: false,
        };
        if name.starts_with(RUNTIME_PACKAGE)
        {
            return Ok(unchanged(name));
        }

        let mut writer = ClassWriter::from_source(reader.class_file().clone());
        let mut manifest = ClassManifest::new(&name);
        {
            let legacy = self.legacy_entry_point.as_deref();
            let mut chain: Box<dyn ClassVisitor + '_> = Box::new(&mut writer);
            if self.platform.decoration
            {
                chain = Box::new(DecoratorStage::new(chain, resolver, self.platform));
            }
            if self.coverage.mode() != CoverageMode::Disabled
            {
                chain = Box::new(
                    CoverageCollectionStage::new(chain, resolver, self.platform, self.coverage.clone(), legacy)
                        .with_manifest(&mut manifest),
                );
                chain = Box::new(CoverageInitializationStage::new(chain, resolver, self.platform, self.coverage.clone(), legacy));
            }
            reader.accept(chain.as_mut())?;
        }

        if writer.synthetic_count() == 0
        {
            return Ok(unchanged(name));
        }
        info!("{}: {} instructions inserted", name, writer.synthetic_count());
        Ok(InstrumentedClass { name, bytes: writer.into_bytes()?, changed: true, manifest })
    }

    /// Instruments `(entry, bytes)` pairs in parallel. Outcomes come back in
    /// input order. Classes of the batch resolve ahead of the resolver's own
    /// sources.
    pub fn instrument_batch(&self, inputs: &[(String, Vec<u8>)]) -> Vec<BatchOutcome>
    {
        let mut batch = MemorySource::new();
        for (entry, bytes) in inputs
        {
            if let Err(e) = batch.add(bytes.clone())
            {
                debug!("{} is not resolvable within its batch: {}", entry, e);
            }
        }
        let resolver = self.resolver.with_classes(batch);

        inputs
            .par_iter()
            .map(|(entry, bytes)| BatchOutcome {
                entry: entry.clone(),
                result: self.instrument_with(&resolver, bytes).map_err(|e| ClassError::with_context(e, entry.clone())),
            })
            .collect()
    }

    /// Instruments every class entry of `jar`. Entries that fail keep their
    /// original bytes and are listed in the report.
    pub fn instrument_jar(&self, jar: &JarFile) -> JarResult<(JarFile, JarReport)>
    {
        let inputs: Vec<(String, Vec<u8>)> = jar
            .class_entries()
            .filter_map(|name| jar.entry(name).map(|e| (name.to_string(), e.data.clone())))
            .collect();

        let mut output = jar.clone();
        let mut report = JarReport::default();
        for outcome in self.instrument_batch(&inputs)
        {
            match outcome.result
            {
                Ok(class) if class.changed => {
                    output.replace_entry(&outcome.entry, class.bytes)?;
                    report.instrumented.push(outcome.entry);
                    if !class.manifest.is_empty()
                    {
                        report.manifest.push(class.manifest);
                    }
                }
                Ok(_) => report.unchanged += 1,
                Err(e) => {
                    error!("{} left uninstrumented: {}", outcome.entry, e);
                    report.failures.push((outcome.entry, e.to_string()));
                }
            }
        }
        info!(
            "{} classes instrumented, {} unchanged, {} failed",
            report.instrumented.len(),
            report.unchanged,
            report.failures.len()
        );
        Ok((output, report))
    }

    /// Instruments the class files under `input`, writing the whole tree to
    /// `output`
    pub fn instrument_directory(&self, input: &Path, output: &Path) -> JarResult<JarReport>
    {
        let tree = JarFile::from_directory(input)?;
        let (instrumented, report) = self.instrument_jar(&tree)?;
        instrumented.write_to_directory(output)?;
        Ok(report)
    }
}
