mod validators;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};

pub use validators::{non_blank_query, positive_secs};

/// Top-level CLI entry point.
#[derive(Debug, Default, Parser)]
#[command(
    name = "otl",
    version,
    about = "Run OTL queries against a remote job server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a query, wait for it and print the result table.
    Query(QueryArgs),
    /// Print the effective configuration (password redacted).
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// OTL query text.
    #[arg(value_name = "CODE", value_parser = non_blank_query)]
    pub code: String,
    /// Time-window start.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub tws: i64,
    /// Time-window finish.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub twf: i64,
    /// Overall budget in seconds (defaults to `caching.default_job_timeout`).
    #[arg(long, value_parser = positive_secs)]
    pub timeout: Option<u64>,
    /// How long result locations stay cached, in seconds
    /// (defaults to `caching.default_request_cache_ttl`).
    #[arg(long = "cache-ttl")]
    pub cache_ttl: Option<u64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ConfigArgs;

/// How result rows are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated with a header row.
    Table,
    /// One JSON object per row.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "otl", "-vv", "query", "| head 5", "--tws", "-60", "--twf", "0", "--timeout", "90",
            "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Some(Commands::Query(args)) = cli.command else {
            panic!("expected query subcommand");
        };
        assert_eq!(args.code, "| head 5");
        assert_eq!(args.tws, -60);
        assert_eq!(args.timeout, Some(90));
        assert_eq!(args.cache_ttl, None);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn zero_timeout_is_refused() {
        assert!(Cli::try_parse_from(["otl", "query", "x", "--timeout", "0"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
