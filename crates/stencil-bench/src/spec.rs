//! Benchmark options parsed from the `--benchmark` keyword string.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use console::style;
use stencil_core::utility::{keywords, split_string, tokenize};
use stencil_core::{Extents, Result, StencilError};
use tracing::debug;

const OPTION: &str = "--benchmark";

/// Last-level cache size assumed when none is given (8 MiB).
pub const DEFAULT_CACHE_SIZE: usize = 8 * 1024 * 1024;

/// What happens to an existing result file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileMode {
    /// Merge into the existing document.
    #[default]
    Append,
    /// Discard the existing document.
    New,
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Append => write!(f, "append"),
            FileMode::New => write!(f, "new"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkSpec {
    domain: Extents,
    reps: usize,
    cache_size: usize,
    quiet: bool,
    file: Option<PathBuf>,
    file_mode: FileMode,
    help: bool,
}

impl Default for BenchmarkSpec {
    fn default() -> Self {
        Self {
            domain: Extents::new(122, 122, 80),
            reps: 10,
            cache_size: DEFAULT_CACHE_SIZE,
            quiet: false,
            file: None,
            file_mode: FileMode::Append,
            help: false,
        }
    }
}

fn parse_error(what: String) -> StencilError {
    StencilError::Parse(format!("parsing error in '{OPTION}': {what}"))
}

impl BenchmarkSpec {
    /// Parse the argument of `--benchmark`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut spec = Self::default();

        for kw in keywords(OPTION, s) {
            match kw.name {
                "reps" => spec.reps = kw.parse_value()?,
                "cache-size" => spec.cache_size = kw.parse_value()?,
                "quiet" => {
                    kw.flag()?;
                    spec.quiet = true;
                }
                "file" => {
                    let value = kw.value()?;
                    let mut parts = tokenize(value, ":");
                    let file = parts.next().ok_or_else(|| kw.invalid(value))?;
                    if let Some(mode) = parts.next() {
                        spec.file_mode = match mode.chars().next() {
                            Some('A') => FileMode::Append,
                            Some('N') => FileMode::New,
                            _ => {
                                return Err(parse_error(format!(
                                    "invalid file-mode '{mode}' in argument '{value}'"
                                )));
                            }
                        };
                    }
                    spec.file = Some(PathBuf::from(file));
                }
                "domain" => {
                    let value = kw.value()?;
                    let sizes: Vec<&str> = tokenize(value, ":").collect();
                    let [i, j, k] = sizes[..] else {
                        return Err(parse_error(format!(
                            "invalid format '{value}' of keyword '{}', expected triple of the form <X>:<Y>:<Z>",
                            kw.name
                        )));
                    };
                    let size = |s: &str| match s.trim().parse::<usize>() {
                        Ok(n) if n > 0 => Ok(n),
                        _ => Err(parse_error(format!("invalid domain '{value}'"))),
                    };
                    spec.domain = Extents::new(size(i)?, size(j)?, size(k)?);
                }
                "help" => {
                    kw.flag()?;
                    spec.help = true;
                }
                _ => return Err(kw.unrecognised()),
            }
        }

        debug!(option = OPTION, spec = %spec, "parsed keywords");
        Ok(spec)
    }

    /// Interior size of the benchmark domain, halo excluded.
    pub fn domain(&self) -> Extents {
        self.domain
    }

    pub fn i_size(&self) -> usize {
        self.domain.i
    }

    pub fn j_size(&self) -> usize {
        self.domain.j
    }

    pub fn k_size(&self) -> usize {
        self.domain.k
    }

    /// Repetitions of each stencil.
    pub fn reps(&self) -> usize {
        self.reps
    }

    /// Last-level cache size in bytes.
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// JSON result file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn file_mode(&self) -> FileMode {
        self.file_mode
    }

    pub fn help(&self) -> bool {
        self.help
    }

    /// Configuration table, one `  <key> <value>` line per setting.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let rows: [(&str, String); 6] = [
            (
                "domain",
                format!("{} {} {}", self.domain.i, self.domain.j, self.domain.k),
            ),
            ("repetitions", self.reps.to_string()),
            ("cacheSize", self.cache_size.to_string()),
            ("quiet", self.quiet.to_string()),
            (
                "file",
                self.file
                    .as_ref()
                    .map(|f| f.display().to_string())
                    .unwrap_or_default(),
            ),
            ("fileMode", self.file_mode.to_string()),
        ];
        for (key, value) in rows {
            out.push_str(&format!("  {key:<28} {value}\n"));
        }
        out
    }

    /// Describe every keyword.
    pub fn print_help(out: &mut impl Write, executable: &str) -> io::Result<()> {
        let entries: [(&str, &[&str]); 5] = [
            (
                "domain=<X>:<Y>:<Z>",
                &[
                    "Integer triple of the domain dimensions (without the halo) where <X> is the \
                     i-dimension, <Y> the j-dimension and <Z> the k-dimension.",
                    "Example: domain=25:25:80",
                ],
            ),
            ("reps=<int>", &["Number of repetitions of each stencil."]),
            ("quiet", &["Do not write the summary to stdout."]),
            (
                "cache-size=<int>",
                &["Size of the last level cache in bytes [default: 8MB]."],
            ),
            (
                "file=<name>[:<mode>]",
                &[
                    "Write the results as JSON to the file <name>. The file mode <mode> decides \
                     what happens to an existing file:",
                    " - A : merge into the file if it exists [default]",
                    " - N : discard any existing content",
                    "Example: file=results.json:A",
                ],
            ),
        ];

        writeln!(
            out,
            "Usage: {executable} {OPTION}=<keyword>[,<keyword>...]\n"
        )?;
        writeln!(
            out,
            "{}\n",
            split_string(
                "Control how benchmarks are run. The argument is a comma-separated list of the \
                 following keywords:",
                80,
                0,
            )
        )?;
        for (keyword, lines) in entries {
            writeln!(out, "  {}", style(keyword).bold().green())?;
            for line in lines {
                writeln!(out, "     {}", split_string(line, 80, 5))?;
            }
            writeln!(out)?;
        }
        writeln!(out, "Example:\n  {executable} {OPTION}=domain=30:30:80,reps=100")
    }
}

impl fmt::Display for BenchmarkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "domain={}:{}:{} reps={} cache-size={} quiet={} file={:?} mode={}",
            self.domain.i,
            self.domain.j,
            self.domain.k,
            self.reps,
            self.cache_size,
            self.quiet,
            self.file,
            self.file_mode
        )
    }
}

impl std::str::FromStr for BenchmarkSpec {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
