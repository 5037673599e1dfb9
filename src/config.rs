//! Settings of one instrumentation run, usually read from a JSON file.
//!
//! ```
//! use cldc_instrument::config::InstrumentConfig;
//! use cldc_instrument::instrument::{CoverageMode, Platform};
//!
//! let config = InstrumentConfig::from_json(r#"{ "platform": "midp", "coverage": "summary", "run_id": "nightly" }"#).unwrap();
//! assert_eq!(config.platform, Platform::Midp);
//! assert_eq!(config.coverage, CoverageMode::Summary);
//! assert_eq!(config.to_coverage_data().unwrap().run_id(), "nightly");
//! ```

use crate::classfile::error::ClassError;
use crate::hierarchy::{DescriptorStore, DirectorySource, JarSource};
use crate::instrument::{CoverageInitializationData, CoverageMode, Platform};
use crate::types::internal_name;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentConfig
{
    pub platform: Platform,
    #[serde(default = "default_coverage")]
    pub coverage: CoverageMode,
    /// Generated when missing
    #[serde(default)]
    pub run_id: Option<String>,
    /// Where the device writes line data; required in line mode
    #[serde(default)]
    pub line_output_path: Option<String>,
    /// A class treated as the entry point even if it does not extend the
    /// platform's application class, in dotted or internal form
    #[serde(default)]
    pub legacy_entry_point: Option<String>,
    /// Overrides whether the bundled standard library hierarchy is consulted
    /// before the classpath
    #[serde(default)]
    pub prefer_host: Option<bool>,
    /// Directories and JARs the application is compiled against
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
}

fn default_coverage() -> CoverageMode
{
    CoverageMode::Summary
}

impl InstrumentConfig
{
    pub fn new(platform: Platform) -> InstrumentConfig
    {
        InstrumentConfig {
            platform,
            coverage: default_coverage(),
            run_id: None,
            line_output_path: None,
            legacy_entry_point: None,
            prefer_host: None,
            classpath: vec![],
        }
    }

    pub fn from_json(json: &str) -> Result<InstrumentConfig, ClassError>
    {
        serde_json::from_str(json).map_err(|e| err!(InvalidArgument, "Bad configuration: {}", e))
    }

    pub fn from_file(path: &Path) -> Result<InstrumentConfig, ClassError>
    {
        let json = fs::read_to_string(path).map_err(|e| ClassError::with_context(e.into(), path.display().to_string()))?;
        InstrumentConfig::from_json(&json).map_err(|e| ClassError::with_context(e, path.display().to_string()))
    }

    pub fn prefers_host(&self) -> bool
    {
        self.prefer_host.unwrap_or(self.platform.descriptor().shares_host_hierarchy)
    }

    /// The legacy entry point class in internal form
    pub fn legacy_entry_point_name(&self) -> Option<String>
    {
        self.legacy_entry_point.as_deref().map(internal_name)
    }

    /// The coverage settings, with a random run id if none is configured
    pub fn to_coverage_data(&self) -> Result<CoverageInitializationData, ClassError>
    {
        if self.coverage == CoverageMode::Disabled
        {
            return Ok(CoverageInitializationData::disabled());
        }
        let run_id = match &self.run_id
        {
            Some(id) => id.clone(),
            None => {
                let id = format!("{:016x}", rand::random::<u64>());
                debug!("generated run id {}", id);
                id
            }
        };
        CoverageInitializationData::new(self.coverage, &run_id, self.line_output_path.as_deref())
    }

    /// A store over the configured classpath, in order
    pub fn descriptor_store(&self) -> Result<DescriptorStore, ClassError>
    {
        let mut store = DescriptorStore::new(self.prefers_host());
        for entry in &self.classpath
        {
            if entry.is_dir()
            {
                store.add_source(Box::new(DirectorySource::new(entry)));
            }
            else
            {
                store.add_source(Box::new(JarSource::open(entry)?));
            }
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::error::ErrorKind;

    #[test]
    fn defaults() {
        let config = InstrumentConfig::from_json(r#"{ "platform": "rim" }"#).unwrap();
        assert_eq!(config, InstrumentConfig::new(Platform::Rim));
        assert!(!config.prefers_host());
        assert!(config.classpath.is_empty());
    }

    #[test]
    fn prefer_host_override() {
        let config = InstrumentConfig::from_json(r#"{ "platform": "midp", "prefer_host": true }"#).unwrap();
        assert!(config.prefers_host());
        assert!(config.descriptor_store().unwrap().prefers_host());
    }

    #[test]
    fn generated_run_ids_differ() {
        let config = InstrumentConfig::new(Platform::Midp);
        let a = config.to_coverage_data().unwrap();
        let b = config.to_coverage_data().unwrap();
        assert_eq!(a.run_id().len(), 16);
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn line_mode_without_path_is_rejected() {
        let config = InstrumentConfig::from_json(r#"{ "platform": "midp", "coverage": "line" }"#).unwrap();
        assert_eq!(config.to_coverage_data().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let e = InstrumentConfig::from_json(r#"{ "platform": "midp", "colour": "blue" }"#).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn dotted_entry_point_names() {
        let config = InstrumentConfig::from_json(r#"{ "platform": "midp", "legacy_entry_point": "com.example.Main" }"#).unwrap();
        assert_eq!(config.legacy_entry_point_name().as_deref(), Some("com/example/Main"));
        assert_eq!(InstrumentConfig::new(Platform::Midp).legacy_entry_point_name(), None);
    }

    #[test]
    fn disabled_coverage() {
        let config = InstrumentConfig::from_json(r#"{ "platform": "midp", "coverage": "disabled" }"#).unwrap();
        assert_eq!(config.to_coverage_data().unwrap().mode(), CoverageMode::Disabled);
    }
}
