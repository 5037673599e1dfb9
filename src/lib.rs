//! # cldc-instrument
//!
//! Offline instrumentation of CLDC/MIDP and RIM application class files:
//! coverage collection, coverage-run lifecycle hooks and UI command logging,
//! inserted by a chain of visitor stages that resolve class relationships
//! without loading any class.
//!
//! ```no_run
//!  use cldc_instrument::config::InstrumentConfig;
//!  use cldc_instrument::instrument::Instrumenter;
//!  use cldc_instrument::jar::JarFile;
//!
//!  let config = InstrumentConfig::from_file("instrument.json".as_ref()).unwrap();
//!  let jar = JarFile::from_file("game.jar").unwrap();
//!  let instrumenter = Instrumenter::for_jar(&config, &jar).unwrap();
//!  let (instrumented, report) = instrumenter.instrument_jar(&jar).unwrap();
//!  instrumented.write_to_file("game-instrumented.jar").unwrap();
//!  println!("{:} classes instrumented.", report.instrumented.len());
//! ```
use crate::classfile::error::ClassError;
use std::path::{Path, PathBuf};

#[macro_use]
pub mod classfile;
pub mod config;
pub mod coverage;
pub mod hierarchy;
pub mod instrument;
pub mod jar;
pub mod types;
pub mod visitor;
#[cfg(test)]
mod tests;

/// Recurses a base path, typically a compiler output folder, returning the
/// paths of all class files found, sorted
///
/// # Examples
///
/// ```no_run
///  use cldc_instrument::find_class_files;
///  use std::path::Path;
///
///  let classes = find_class_files(Path::new("classes")).unwrap();
///  println!("{:} class files found.", classes.len());
/// ```
pub fn find_class_files(dir: &Path) -> Result<Vec<PathBuf>, ClassError>
{
    let mut results = vec![];
    let entries = dir.read_dir().map_err(|e| ClassError::with_context(e.into(), dir.display().to_string()))?;
    for p in entries
    {
        let p = p?;
        let f = p.file_type()?;
        if f.is_dir()
        {
            // Directory: recurse sub-directory
            results.extend(find_class_files(&p.path())?);
        }
        else if p.file_name().to_string_lossy().ends_with(".class")
        {
            results.push(p.path());
        }
    }
    results.sort();
    Ok(results)
}
