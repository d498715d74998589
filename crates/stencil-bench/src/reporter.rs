//! Summary statistics of benchmark measurements and the persisted JSON
//! result document.
//!
//! The document maps benchmark name to stencil name to domain (`"i j k"`) to
//! the list of mean runtimes of every run:
//!
//! ```json
//! {
//!   "dycore": {
//!     "laplacian": {
//!       "122 122 80": [0.0021, 0.0020]
//!     }
//!   }
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::spec::{BenchmarkSpec, FileMode};
use crate::{BenchError, Result};

/// Mean and population standard deviation of a set of runtimes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchmarkStats {
    pub mean: f64,
    pub stdev: f64,
    pub samples: usize,
}

impl BenchmarkStats {
    /// `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        Some(Self {
            mean,
            stdev: var.sqrt(),
            samples: samples.len(),
        })
    }
}

/// Collects the runtimes of one `<Benchmark>.<Stencil>` and reports them.
#[derive(Clone, Debug)]
pub struct BenchmarkReporter {
    name: String,
    spec: BenchmarkSpec,
    measurements: Vec<f64>,
}

impl BenchmarkReporter {
    pub fn new(name: impl Into<String>, spec: BenchmarkSpec) -> Self {
        let measurements = Vec::with_capacity(spec.reps());
        Self {
            name: name.into(),
            spec,
            measurements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &BenchmarkSpec {
        &self.spec
    }

    /// Record one elapsed time in seconds.
    pub fn add_measurement(&mut self, seconds: f64) {
        self.measurements.push(seconds);
    }

    pub fn measurements(&self) -> &[f64] {
        &self.measurements
    }

    /// Print the configuration table.
    pub fn print_header(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "Benchmark configuration:")?;
        write!(out, "{}", self.spec.summary())
    }

    /// Summarize the measurements: print the one-line summary to `out`
    /// unless quiet, and merge the mean into the result file if one is
    /// configured.
    pub fn report(&self, out: &mut impl Write) -> Result<BenchmarkStats> {
        let stats = BenchmarkStats::from_samples(&self.measurements)
            .ok_or_else(|| BenchError::NoMeasurements(self.name.clone()))?;

        let (benchmark, stencil) = match self.name.split('.').collect::<Vec<_>>()[..] {
            [b, s] if !b.is_empty() && !s.is_empty() => (b, s),
            _ => return Err(BenchError::InvalidName(self.name.clone())),
        };

        if !self.spec.quiet() {
            writeln!(
                out,
                "  {stencil:<23}     {:18.10}   +/- {:15.10} [s]",
                stats.mean, stats.stdev
            )?;
        }

        if let Some(path) = self.spec.file() {
            let domain = format!(
                "{} {} {}",
                self.spec.i_size(),
                self.spec.j_size(),
                self.spec.k_size()
            );
            let mut root = match self.spec.file_mode() {
                FileMode::Append => read_document(path)?,
                FileMode::New => Map::new(),
            };
            insert_measurement(&mut root, path, benchmark, stencil, &domain, stats.mean)?;

            info!(file = %path.display(), "writing benchmark results");
            let mut text = serde_json::to_string_pretty(&Value::Object(root))?;
            text.push('\n');
            fs::write(path, text)?;
        }
        Ok(stats)
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> BenchError {
    BenchError::InvalidDocument {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// The existing document at `path`; empty if the file is absent or blank.
fn read_document(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    info!(file = %path.display(), "opening benchmark file");
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    info!(file = %path.display(), "parsing benchmark file");
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(malformed(path, "top level is not an object")),
    }
}

/// The object stored under `key`, inserted empty if missing.
fn object_entry<'m>(
    map: &'m mut Map<String, Value>,
    path: &Path,
    key: &str,
) -> Result<&'m mut Map<String, Value>> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| malformed(path, format!("'{key}' is not an object")))
}

fn insert_measurement(
    root: &mut Map<String, Value>,
    path: &Path,
    benchmark: &str,
    stencil: &str,
    domain: &str,
    mean: f64,
) -> Result<()> {
    if root.contains_key(benchmark) {
        info!(benchmark, "found already existing benchmark");
    } else {
        info!(benchmark, "inserting benchmark");
    }
    let stencils = object_entry(root, path, benchmark)?;

    if stencils.contains_key(stencil) {
        info!(stencil, "found already existing stencil");
    } else {
        info!(stencil, benchmark, "inserting stencil");
    }
    let domains = object_entry(stencils, path, stencil)?;

    if domains.contains_key(domain) {
        info!(domain, stencil, "extending domain");
    } else {
        info!(domain, stencil, "inserting domain");
    }
    domains
        .entry(domain)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| malformed(path, format!("'{domain}' is not an array")))?
        .push(Value::from(mean));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let stats = BenchmarkStats::from_samples(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(stats.mean, 2.0);
        assert!((stats.stdev - (2.0f64 / 3.0).sqrt()).abs() < 1e-15);
        assert_eq!(stats.samples, 3);
        assert!(BenchmarkStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_no_measurements() {
        let reporter = BenchmarkReporter::new("dycore.lap", BenchmarkSpec::default());
        let err = reporter.report(&mut Vec::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "BenchmarkReporter of 'dycore.lap': no measurements found"
        );
    }

    #[test]
    fn test_invalid_name() {
        for name in ["lap", "a.b.c", ".lap", "dycore."] {
            let mut reporter = BenchmarkReporter::new(name, BenchmarkSpec::default());
            reporter.add_measurement(1.0);
            assert!(matches!(
                reporter.report(&mut Vec::new()),
                Err(BenchError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_summary_line() {
        let mut reporter = BenchmarkReporter::new("dycore.lap", BenchmarkSpec::default());
        reporter.add_measurement(0.5);
        reporter.add_measurement(1.5);
        let mut out = Vec::new();
        reporter.report(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("  {:<23}     {:18.10}   +/- {:15.10} [s]\n", "lap", 1.0, 0.5)
        );

        let mut quiet =
            BenchmarkReporter::new("dycore.lap", BenchmarkSpec::parse("quiet").unwrap());
        quiet.add_measurement(1.0);
        let mut out = Vec::new();
        quiet.report(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_insert_creates_each_level() {
        let path = Path::new("results.json");
        let mut root = Map::new();
        insert_measurement(&mut root, path, "b", "s", "1 1 1", 1.0).unwrap();
        insert_measurement(&mut root, path, "b", "s", "1 1 1", 2.0).unwrap();
        insert_measurement(&mut root, path, "b", "s", "2 2 2", 3.0).unwrap();
        insert_measurement(&mut root, path, "b", "t", "1 1 1", 4.0).unwrap();
        insert_measurement(&mut root, path, "c", "s", "1 1 1", 5.0).unwrap();
        assert_eq!(
            Value::Object(root),
            serde_json::json!({
                "b": {
                    "s": { "1 1 1": [1.0, 2.0], "2 2 2": [3.0] },
                    "t": { "1 1 1": [4.0] }
                },
                "c": { "s": { "1 1 1": [5.0] } }
            })
        );
    }

    #[test]
    fn test_insert_rejects_malformed_document() {
        let path = Path::new("results.json");
        let mut root = Map::new();
        root.insert("b".to_owned(), Value::from(1.0));
        assert!(matches!(
            insert_measurement(&mut root, path, "b", "s", "1 1 1", 1.0),
            Err(BenchError::InvalidDocument { .. })
        ));
    }
}
