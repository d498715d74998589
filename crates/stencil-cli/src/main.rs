mod laplacian;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use console::style;
use stencil_bench::{
    BenchError, BenchmarkReporter, BenchmarkSpec, CacheFlusher, FieldInitializer, Timer,
};
use stencil_core::error::{fatal, or_fatal, warning};
use stencil_core::logging::LogConfig;
use stencil_core::{
    Extents, FieldView, Halo, HostField, Savepoint, Serialization, Serializer, StencilError,
    StorageMeta,
};
use stencil_io::Archive;
use stencil_verify::environment::{INPUT_SUFFIX, OUTPUT_SUFFIX};
use stencil_verify::{BoundaryExtent, TestEnvironment, VerificationSpec};
use tracing::info;

use crate::laplacian::laplacian;

const HALO: Halo = Halo::uniform(1);

#[derive(Parser)]
#[command(name = "stencil-verify")]
#[command(about = "Record, check and benchmark stencil traces")]
struct Cli {
    /// Enable logging to stderr (also enabled by VERIFICATION_LOG=1).
    #[arg(long, global = true)]
    log: bool,

    /// Failure reporting keywords, see `--error=help`.
    #[arg(long, global = true, value_name = "KEYWORDS")]
    error: Option<String>,

    /// Benchmark keywords, see `--benchmark=help`.
    #[arg(long, global = true, value_name = "KEYWORDS")]
    benchmark: Option<String>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Record a reference trace of the Laplacian.
    Record(RecordArgs),
    /// Replay a reference trace and verify the results.
    Check(CheckArgs),
    /// Time the Laplacian on the benchmark domain.
    Bench(BenchArgs),
}

#[derive(Args)]
struct RecordArgs {
    /// Archive directory; an existing archive is replaced.
    #[arg(long)]
    path: PathBuf,
    #[arg(long, default_value = "laplacian")]
    stencil: String,
    #[arg(long, default_value_t = 3)]
    iterations: usize,
    /// Interior domain size.
    #[arg(long, default_value = "32:32:16", value_parser = parse_domain)]
    domain: Extents,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args)]
struct CheckArgs {
    /// Reference archive directory.
    #[arg(long)]
    path: PathBuf,
    #[arg(long, default_value = "laplacian")]
    stencil: String,
    /// Archive holding the outputs under test at the reference output
    /// savepoints. Without it the outputs are recomputed from the inputs.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write failing output fields to an archive in this directory.
    #[arg(long)]
    errors: Option<PathBuf>,
    #[arg(long, default_value_t = 1e-6)]
    rtol: f64,
    #[arg(long, default_value_t = 1e-10)]
    atol: f64,
}

#[derive(Args)]
struct BenchArgs {
    /// `<Benchmark>.<Stencil>` name of the measurement.
    #[arg(long, default_value = "dycore.laplacian")]
    name: String,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Stencil(#[from] StencilError),
    #[error(transparent)]
    Bench(#[from] BenchError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn parse_domain(s: &str) -> Result<Extents, String> {
    let sizes: Vec<usize> = s
        .split(':')
        .map(|t| t.trim().parse::<usize>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match sizes[..] {
        [i, j, k] if i > 0 && j > 0 && k > 0 => Ok(Extents::new(i, j, k)),
        _ => Err(format!("invalid domain '{s}', expected <X>:<Y>:<Z>")),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = LogConfig::from_env(cli.log).install() {
        warning(e);
    }

    let executable = std::env::args()
        .next()
        .unwrap_or_else(|| "stencil-verify".to_owned());

    let error_spec = or_fatal(VerificationSpec::parse(cli.error.as_deref().unwrap_or("")));
    if error_spec.help() {
        or_fatal(VerificationSpec::print_help(&mut io::stdout(), &executable));
        std::process::exit(0);
    }

    let bench_spec = or_fatal(BenchmarkSpec::parse(cli.benchmark.as_deref().unwrap_or("")));
    if bench_spec.help() {
        or_fatal(BenchmarkSpec::print_help(&mut io::stdout(), &executable));
        std::process::exit(0);
    }

    let result = match cli.cmd {
        Some(Cmd::Record(args)) => record(args),
        Some(Cmd::Check(args)) => check(args, error_spec),
        Some(Cmd::Bench(args)) => bench(args, bench_spec),
        None => fatal("no command given, see --help"),
    };
    or_fatal(result);
}

fn record(args: RecordArgs) -> Result<(), CliError> {
    let meta = StorageMeta::with_halo(args.domain, HALO);
    let phi = HostField::<f64>::new("phi", meta);
    let lap = HostField::<f64>::new("lap", meta);
    let (phi_view, lap_view) = (FieldView::new(&phi), FieldView::new(&lap));

    let archive = Archive::create(&args.path)?;
    let serialization = Serialization::new(&archive);
    let mut init = FieldInitializer::with_seed(args.seed);

    for n in 0..args.iterations {
        init.init_default(&phi_view)?;
        laplacian(&phi_view, &lap_view, HALO);

        let input = Savepoint::new(format!("{}{INPUT_SUFFIX}", args.stencil)).with("iteration", n);
        let output =
            Savepoint::new(format!("{}{OUTPUT_SUFFIX}", args.stencil)).with("iteration", n);
        serialization.write("phi", &phi_view, &input)?;
        serialization.write("lap", &lap_view, &output)?;
    }
    archive.flush()?;

    info!(path = %args.path.display(), iterations = args.iterations, "recorded trace");
    println!(
        "recorded {} iteration{} of '{}' to {}",
        args.iterations,
        if args.iterations == 1 { "" } else { "s" },
        args.stencil,
        args.path.display()
    );
    Ok(())
}

fn check(args: CheckArgs, spec: VerificationSpec) -> Result<(), CliError> {
    let reference = Arc::new(Archive::open(&args.path)?);
    let dims = reference.field_info("phi")?.dims;
    let meta = StorageMeta::new(dims[0].max(1), dims[1].max(1), dims[2].max(1));

    let mut env = TestEnvironment::new(reference, spec);
    let errors = args.errors.as_ref().map(Archive::create).transpose()?.map(Arc::new);
    if let Some(errors) = &errors {
        env = env.with_error_serializer(errors.clone());
    }
    let output = args.output.as_ref().map(Archive::open).transpose()?;

    let phi = HostField::<f64>::new("phi", meta);
    let lap = HostField::<f64>::new("lap", meta);
    let (phi_view, lap_view) = (FieldView::new(&phi), FieldView::new(&lap));

    let mut collection = env.create_field_collection(&args.stencil);
    collection.register_input_field("phi", &phi);
    collection.register_output_and_reference_field("lap", &lap, BoundaryExtent::from_halo(HALO));
    let metric = env.create_metric(args.rtol, args.atol);

    let mut failed = 0;
    while let Some(n) = env.next_iteration(&mut collection) {
        match (&output, collection.active_pair()) {
            (Some(archive), Some(pair)) => {
                Serialization::new(archive).load("lap", &lap_view, &pair.output)?;
            }
            _ => laplacian(&phi_view, &lap_view, HALO),
        }

        match env.verify_collection(&mut collection, &metric) {
            Ok(()) => println!("{} {} iteration {n}", style("[       OK ]").green(), args.stencil),
            Err(message) => {
                println!("{} {} iteration {n}", style("[  FAILED  ]").red(), args.stencil);
                println!("{message}");
                failed += 1;
                if collection.error_serializer().is_some() {
                    let savepoint =
                        Savepoint::new(format!("{}-error", args.stencil)).with("iteration", n);
                    collection.serialize_errors(&savepoint)?;
                }
            }
        }
    }

    if let Some(errors) = &errors {
        errors.flush()?;
    }
    env.print_skipped_tests(&mut io::stdout())?;

    let total = collection.iterations().len();
    if failed > 0 {
        fatal(format!("{failed} of {total} iterations of '{}' failed", args.stencil));
    }
    Ok(())
}

fn bench(args: BenchArgs, spec: BenchmarkSpec) -> Result<(), CliError> {
    let meta = StorageMeta::with_halo(spec.domain(), HALO);
    let phi = HostField::<f64>::new("phi", meta);
    let lap = HostField::<f64>::new("lap", meta);
    let (phi_view, lap_view) = (FieldView::new(&phi), FieldView::new(&lap));
    FieldInitializer::with_seed(args.seed).init_default(&phi_view)?;

    let mut flusher = CacheFlusher::new(spec.cache_size());
    let mut reporter = BenchmarkReporter::new(args.name, spec.clone());
    let mut out = io::stdout().lock();
    if !spec.quiet() {
        reporter.print_header(&mut out)?;
    }

    let mut timer = Timer::new();
    for _ in 0..spec.reps() {
        flusher.flush();
        timer.reset();
        timer.start();
        laplacian(&phi_view, &lap_view, HALO);
        timer.pause();
        reporter.add_measurement(timer.seconds());
    }
    reporter.report(&mut out)?;
    out.flush()?;
    Ok(())
}
