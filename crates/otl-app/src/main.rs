use std::{io, process, time::Duration};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use otl_client::{OtlClient, ProgressEvent, TOTAL_STAGES};
use tracing_subscriber::{filter::LevelFilter, fmt};

use otl_app::{
    cli::{Cli, Commands, QueryArgs},
    config,
    error::AppError,
    output::write_table,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

/// Without `-v` the progress bar is the only feedback on stderr.
fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let verbosity = cli.verbose;

    match cli.command {
        Some(Commands::Query(args)) => run_query(args, verbosity).await?,
        Some(Commands::Config(_)) => {
            let cfg = config::load()?;
            println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
        }
        None => Cli::print_help(),
    }

    Ok(())
}

async fn run_query(args: QueryArgs, verbosity: u8) -> Result<(), AppError> {
    let cfg = config::load()?;
    let client = OtlClient::new(&cfg.client_options())?;
    let request = cfg.job_request(args.code, args.tws, args.twf, args.timeout, args.cache_ttl);

    let bar = (verbosity == 0).then(make_progress_bar);
    let progress = |event: ProgressEvent| {
        if let Some(bar) = &bar {
            bar.set_position(event.stage as u64);
            bar.set_message(event.message);
        }
    };

    let outcome = client.run(&cfg.credentials(), &request, progress).await;
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let table = outcome?;
    let mut stdout = io::stdout().lock();
    write_table(&mut stdout, &table, args.format)
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(TOTAL_STAGES as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
