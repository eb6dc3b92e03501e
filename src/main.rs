use {
    anyhow::{Context, Result},
    clap::Parser,
    routestat::{
        Cancellation,
        OccupancyBase,
        Options,
        ReportOutput,
        RouteError,
        TcpNodeClient,
        compute,
        parse_remotes,
    },
    std::{fs::File, io, path::PathBuf, process::ExitCode, sync::Mutex, time::Duration},
    tracing::Level,
};

/// Polled when no remote is given.
const DEFAULT_REMOTE: &str = "localhost:1025:2";

/// Exit status of an interrupted run.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "routestat")]
#[command(about = "Get remote route tables and print their statistics")]
struct Args {
    /// Remote nodes to connect to and grab route tables from. Format:
    /// addr:port:family, where family is 2 for IPv4 and 10 for IPv6
    #[arg(value_name = "REMOTE")]
    remotes: Vec<String>,

    /// Dump the part of the ring each node occupies (in percents)
    #[arg(long)]
    percentage: bool,

    /// Compute percentages against the whole ring rather than its assigned part
    #[arg(long, requires = "percentage")]
    full_ring: bool,

    /// Timeout in milliseconds, applied separately to connecting to each
    /// node and to awaiting its reply, so a node may take up to twice as long
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Maximum number of nodes polled at once
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Log file, standard error when absent
    #[arg(long)]
    log: Option<PathBuf>,

    #[arg(long, default_value = "error")]
    log_level: Level,
}

fn init_logging(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt().with_max_level(args.log_level);
    match &args.log {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            subscriber
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => subscriber.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn options(args: &Args) -> Options {
    let mut options = Options::new()
        .with_timeout_per_node(Duration::from_millis(args.timeout_ms))
        .with_percentage_mode(args.percentage);
    if args.full_ring {
        options = options.with_occupancy_base(OccupancyBase::FullRing);
    }
    if let Some(max) = args.max_parallel {
        options = options.with_max_parallel_fetches(max);
    }
    options
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args)?;

    let remotes = if args.remotes.is_empty() {
        parse_remotes(&[DEFAULT_REMOTE])?
    } else {
        parse_remotes(&args.remotes)?
    };
    let options = options(&args);

    let (handle, cancel) = Cancellation::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let report = match compute(TcpNodeClient::new(), &remotes, &options, &cancel).await {
        Ok(report) => report,
        Err(RouteError::Cancelled) => {
            eprintln!("Interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(RouteError::AggregateFailure(failures)) => {
            for failure in &failures {
                eprintln!("error: {failure}");
            }
            anyhow::bail!("none of {} remotes returned a route table", failures.len());
        }
        Err(err) => return Err(err.into()),
    };

    for failure in &report.failures {
        eprintln!("warning: {failure}");
    }
    for conflict in &report.conflicts {
        eprintln!("warning: {conflict}");
    }

    print!("{}", report.output);
    if let ReportOutput::Routes(_) = report.output {
        println!("Fingerprint: {:016x}", report.fingerprint);
    }

    Ok(ExitCode::SUCCESS)
}
