//! Coverage counters per package and the outcome list of a test run.

pub mod records;

pub use records::{parse_record, parse_records, CoverageRecord};

use crate::classfile::error::ClassError;
use log::warn;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// `covered` as a percentage of `total`, None when there is nothing to cover
pub fn percent<T>(covered: T, total: T) -> Option<f64>
where
    T: ToPrimitive + Zero + PartialEq,
{
    if total == T::zero()
    {
        return None;
    }
    Some(covered.to_f64()? * 100.0 / total.to_f64()?)
}

/// The package of an internal class name, empty for the default package
pub fn package_of(class_name: &str) -> &str
{
    class_name.rfind('/').map(|i| &class_name[..i]).unwrap_or("")
}

/// Coverage counters of one package.
///
/// A class counts as covered once any of its methods ran; the flag never goes
/// back to false through [`PackageReportContainer::add_method_from_class`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReportContainer
{
    pub package_name: String,
    pub class_covered: BTreeMap<String, bool>,
    pub all_classes: u64,
    pub covered_classes: u64,
    pub all_methods: u64,
    pub covered_methods: u64,
    pub all_lines: u64,
    pub covered_lines: u64,
}

impl PackageReportContainer
{
    pub fn new(package_name: &str) -> PackageReportContainer
    {
        PackageReportContainer { package_name: package_name.to_string(), ..Default::default() }
    }

    pub fn add_method_from_class(&mut self, class_name: &str, covered: bool)
    {
        let flag = match self.class_covered.entry(class_name.to_string())
        {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.all_classes += 1;
                e.insert(false)
            }
        };
        if covered && !*flag
        {
            *flag = true;
            self.covered_classes += 1;
        }
        self.all_methods += 1;
        if covered
        {
            self.covered_methods += 1;
        }
    }

    /// Adds one method's line counts. Negative counts or more covered than
    /// total lines are rejected and leave the container untouched.
    pub fn add_method_lines_coverage(&mut self, covered: i64, total: i64) -> Result<(), ClassError>
    {
        if covered < 0 || total < 0 || covered > total
        {
            return Err(err!(InvalidArgument, "Bad line coverage {} of {}", covered, total));
        }
        self.all_lines += total as u64;
        self.covered_lines += covered as u64;
        Ok(())
    }

    /// Adds `other`'s counters to these. Class flags present in `other`
    /// replace the ones here, even a covered class going back to uncovered.
    pub fn include_report(&mut self, other: &PackageReportContainer)
    {
        self.all_classes += other.all_classes;
        self.covered_classes += other.covered_classes;
        self.all_methods += other.all_methods;
        self.covered_methods += other.covered_methods;
        self.all_lines += other.all_lines;
        self.covered_lines += other.covered_lines;
        for (class, covered) in &other.class_covered
        {
            self.class_covered.insert(class.clone(), *covered);
        }
    }

    pub fn class_percent(&self) -> Option<f64>
    {
        percent(self.covered_classes, self.all_classes)
    }

    pub fn method_percent(&self) -> Option<f64>
    {
        percent(self.covered_methods, self.all_methods)
    }

    pub fn line_percent(&self) -> Option<f64>
    {
        percent(self.covered_lines, self.all_lines)
    }
}

/// A method coverage marks, with the distinct lines marked in it, empty
/// outside line mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodManifest
{
    /// Name and descriptor, e.g. `startApp()V`
    pub method: String,
    pub lines: Vec<u16>,
}

/// The methods of one class that instrumentation made reportable.
///
/// Runtime records only name what ran; the manifest is what the totals are
/// counted against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassManifest
{
    pub class: String,
    pub methods: Vec<MethodManifest>,
}

impl ClassManifest
{
    pub fn new(class: &str) -> ClassManifest
    {
        ClassManifest { class: class.to_string(), methods: vec![] }
    }

    pub fn add_method(&mut self, method: &str, lines: impl IntoIterator<Item = u16>)
    {
        let mut lines: Vec<u16> = lines.into_iter().collect();
        lines.sort_unstable();
        lines.dedup();
        self.methods.push(MethodManifest { method: method.to_string(), lines });
    }

    pub fn is_empty(&self) -> bool
    {
        self.methods.is_empty()
    }
}

/// Per-package containers of a run and their total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary
{
    pub packages: BTreeMap<String, PackageReportContainer>,
    pub total: PackageReportContainer,
}

impl CoverageSummary
{
    pub fn from_records(records: &[CoverageRecord]) -> Result<CoverageSummary, ClassError>
    {
        let mut packages: BTreeMap<String, PackageReportContainer> = BTreeMap::new();
        for record in records
        {
            let package = package_of(record.class());
            let container =
                packages.entry(package.to_string()).or_insert_with(|| PackageReportContainer::new(package));
            match record
            {
                CoverageRecord::Method { class, covered, .. } => container.add_method_from_class(class, *covered),
                CoverageRecord::Lines { class, method, covered, total } => container
                    .add_method_lines_coverage(*covered, *total)
                    .map_err(|e| ClassError::with_context(e, format!("{} {}", class, method)))?,
            }
        }
        Ok(CoverageSummary::from_packages(packages))
    }

    /// Counts every manifest method, covered or not, against the records of
    /// a run. Line totals come from the manifests, covered lines from the
    /// largest `L` count recorded for the method.
    pub fn from_run(manifests: &[ClassManifest], records: &[CoverageRecord]) -> Result<CoverageSummary, ClassError>
    {
        let mut ran: HashSet<(&str, &str)> = HashSet::new();
        let mut lines_hit: HashMap<(&str, &str), i64> = HashMap::new();
        for record in records
        {
            match record
            {
                CoverageRecord::Method { class, method, covered } => {
                    if *covered
                    {
                        ran.insert((class.as_str(), method.as_str()));
                    }
                }
                CoverageRecord::Lines { class, method, covered, .. } => {
                    let hit = lines_hit.entry((class.as_str(), method.as_str())).or_insert(0);
                    *hit = (*hit).max(*covered);
                }
            }
        }

        let mut known: HashSet<(&str, &str)> = HashSet::new();
        let mut packages: BTreeMap<String, PackageReportContainer> = BTreeMap::new();
        for manifest in manifests
        {
            let package = package_of(&manifest.class);
            let container =
                packages.entry(package.to_string()).or_insert_with(|| PackageReportContainer::new(package));
            for m in &manifest.methods
            {
                let key = (manifest.class.as_str(), m.method.as_str());
                known.insert(key);
                container.add_method_from_class(&manifest.class, ran.contains(&key));
                if !m.lines.is_empty()
                {
                    let hit = lines_hit.get(&key).copied().unwrap_or(0);
                    container
                        .add_method_lines_coverage(hit, m.lines.len() as i64)
                        .map_err(|e| ClassError::with_context(e, format!("{} {}", manifest.class, m.method)))?;
                }
            }
        }

        let strays: HashSet<_> = ran.iter().chain(lines_hit.keys()).filter(|key| !known.contains(*key)).collect();
        if !strays.is_empty()
        {
            warn!("coverage recorded for {} methods no manifest lists", strays.len());
        }
        Ok(CoverageSummary::from_packages(packages))
    }

    fn from_packages(packages: BTreeMap<String, PackageReportContainer>) -> CoverageSummary
    {
        let mut total = PackageReportContainer::new("");
        for container in packages.values()
        {
            total.include_report(container);
        }
        CoverageSummary { packages, total }
    }

    pub fn to_json(&self) -> Result<String, ClassError>
    {
        serde_json::to_string_pretty(self).map_err(|e| err!("Cannot serialize coverage summary: {}", e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome
{
    Success,
    /// The application misbehaved: an assertion failed
    Fault,
    /// The test itself could not run
    Error,
}

impl fmt::Display for Outcome
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Outcome::Success => write!(f, "success"),
            Outcome::Fault => write!(f, "fault"),
            Outcome::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry
{
    pub outcome: Outcome,
    pub message: String,
    pub detailed_description: String,
}

/// Outcomes of a test run in the order they were reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportList
{
    entries: Vec<ReportEntry>,
}

impl ReportList
{
    pub fn new() -> ReportList
    {
        ReportList::default()
    }

    pub fn add(&mut self, outcome: Outcome, message: &str, detailed_description: &str)
    {
        self.entries.push(ReportEntry {
            outcome,
            message: message.to_string(),
            detailed_description: detailed_description.to_string(),
        });
    }

    pub fn entries(&self) -> &[ReportEntry]
    {
        &self.entries
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn count(&self, outcome: Outcome) -> usize
    {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// True if every entry succeeded
    pub fn passed(&self) -> bool
    {
        self.entries.iter().all(|e| e.outcome == Outcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::error::ErrorKind;

    #[test]
    fn class_flag_is_monotonic() {
        let mut c = PackageReportContainer::new("com/example");
        for _ in 0..50 {
            c.add_method_from_class("com/example/Game", false);
        }
        c.add_method_from_class("com/example/Game", true);
        c.add_method_from_class("com/example/Game", false);
        c.add_method_from_class("com/example/Game", true);

        assert_eq!(c.all_classes, 1);
        assert_eq!(c.covered_classes, 1);
        assert_eq!(c.all_methods, 53);
        assert_eq!(c.covered_methods, 2);
        assert_eq!(c.class_covered.get("com/example/Game"), Some(&true));
    }

    #[test]
    fn bad_line_deltas_change_nothing() {
        let mut c = PackageReportContainer::new("p");
        c.add_method_lines_coverage(3, 10).unwrap();
        let before = c.clone();
        for (covered, total) in [(-1, 10), (1, -1), (11, 10)] {
            let e = c.add_method_lines_coverage(covered, total).unwrap_err();
            assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(c, before);
        c.add_method_lines_coverage(0, 0).unwrap();
        assert_eq!((c.covered_lines, c.all_lines), (3, 10));
    }

    #[test]
    fn include_report_adds_counters_and_overwrites_flags() {
        let mut a = PackageReportContainer::new("p");
        a.add_method_from_class("p/A", true);
        let mut b = PackageReportContainer::new("p");
        b.add_method_from_class("p/A", false);
        b.add_method_from_class("p/B", true);
        b.add_method_lines_coverage(2, 4).unwrap();

        a.include_report(&b);
        assert_eq!(a.all_classes, 3);
        assert_eq!(a.covered_classes, 2);
        assert_eq!(a.all_methods, 3);
        assert_eq!(a.covered_methods, 2);
        assert_eq!((a.covered_lines, a.all_lines), (2, 4));
        assert_eq!(a.class_covered.get("p/A"), Some(&false));
        assert_eq!(a.class_covered.get("p/B"), Some(&true));
    }

    #[test]
    fn percentages() {
        assert_eq!(percent(1u64, 4u64), Some(25.0));
        assert_eq!(percent(0i32, 0i32), None);
        let c = PackageReportContainer::new("p");
        assert_eq!(c.method_percent(), None);
    }

    #[test]
    fn summary_from_log() {
        let log = "M a/A run()V 1\nM a/A stop()V 0\nL a/A run()V 3 4\nM b/c/D <init>()V 0\nM Top main([Ljava/lang/String;)V 1\n";
        let summary = CoverageSummary::from_records(&parse_records(log).unwrap()).unwrap();
        assert_eq!(summary.packages.keys().cloned().collect::<Vec<_>>(), vec!["", "a", "b/c"]);
        assert_eq!(summary.packages["a"].method_percent(), Some(50.0));
        assert_eq!(summary.total.all_classes, 3);
        assert_eq!(summary.total.covered_classes, 2);
        assert_eq!(summary.total.all_methods, 4);
        assert_eq!(summary.total.line_percent(), Some(75.0));

        let json = summary.to_json().unwrap();
        let back: CoverageSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn bad_line_record_fails_summary() {
        let records = parse_records("L a/A run()V 5 4\n").unwrap();
        let e = CoverageSummary::from_records(&records).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        assert!(e.to_string().contains("a/A run()V"));
    }

    #[test]
    fn summary_counts_methods_that_never_ran() {
        let mut game = ClassManifest::new("a/Game");
        game.add_method("startApp()V", [12, 10, 11, 10]);
        game.add_method("pauseApp()V", [20]);
        let mut model = ClassManifest::new("a/m/Model");
        model.add_method("score()I", []);
        assert_eq!(game.methods[0].lines, vec![10, 11, 12]);

        let log = "M a/Game startApp()V 1\nL a/Game startApp()V 2 3\nM other/Gone run()V 1\n";
        let summary = CoverageSummary::from_run(&[game, model], &parse_records(log).unwrap()).unwrap();
        assert_eq!(summary.total.all_methods, 3);
        assert_eq!(summary.total.covered_methods, 1);
        assert_eq!(summary.total.all_classes, 2);
        assert_eq!(summary.total.covered_classes, 1);
        assert_eq!((summary.total.covered_lines, summary.total.all_lines), (2, 4));
        assert_eq!(summary.packages["a/m"].method_percent(), Some(0.0));
        assert!(!summary.packages.contains_key("other"));
    }

    #[test]
    fn more_lines_hit_than_listed_is_rejected() {
        let mut game = ClassManifest::new("a/Game");
        game.add_method("startApp()V", [10]);
        let records = parse_records("L a/Game startApp()V 2 2\n").unwrap();
        let e = CoverageSummary::from_run(&[game], &records).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn report_list_counts() {
        let mut list = ReportList::new();
        list.add(Outcome::Success, "menu opens", "");
        list.add(Outcome::Fault, "score", "expected 10, was 9");
        assert_eq!(list.len(), 2);
        assert_eq!(list.count(Outcome::Fault), 1);
        assert!(!list.passed());
        assert_eq!(list.entries()[1].detailed_description, "expected 10, was 9");
        assert_eq!(Outcome::Error.to_string(), "error");
    }
}
