//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use debridfs_remote::{ByteRange, DEFAULT_API_URL};
use debridfs_telemetry::{LogFormat, LoggingConfig, command_span, init_logging};
use tracing::{Instrument, debug};
use url::Url;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::{maintenance, namespace};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    if let Err(err) = install_logging(&cli) {
        eprintln!("error: {err}");
        return err.exit_code();
    }
    let command_name = command_label(&cli.command);

    let result = async move {
        let ctx = AppContext::from_cli(&cli)?;
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        dispatch(&ctx, cli.command, cli.output).await
    }
    .instrument(command_span(command_name))
    .await;

    match result {
        Ok(()) => 0,
        Err(err) => {
            debug!(command = command_name, exit_code = err.exit_code(), "command failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn install_logging(cli: &Cli) -> CliResult<()> {
    let format = cli
        .log_format
        .parse::<LogFormat>()
        .map_err(|_| CliError::validation(format!("unknown log format '{}'", cli.log_format)))?;
    init_logging(&LoggingConfig {
        level: &cli.log_level,
        format,
        ..LoggingConfig::default()
    })
    .map_err(CliError::failure)
}

pub(crate) async fn dispatch(ctx: &AppContext, command: Command, output: OutputFormat) -> CliResult<()> {
    match command {
        Command::Ls(args) => namespace::handle_ls(ctx, args, output).await,
        Command::Mv(args) => namespace::handle_mv(ctx, args).await,
        Command::Rm(args) => namespace::handle_rm(ctx, args).await,
        Command::Mkdir(args) => namespace::handle_mkdir(ctx, args).await,
        Command::Rmdir(args) => namespace::handle_rmdir(ctx, args).await,
        Command::Purge(args) => namespace::handle_purge(ctx, args).await,
        Command::Link(args) => namespace::handle_link(ctx, args).await,
        Command::Cat(args) => namespace::handle_cat(ctx, args).await,
        Command::Refresh(args) => maintenance::handle_refresh(ctx, args, output).await,
        Command::Rules(RulesCommand::Check) => maintenance::handle_rules_check(ctx, output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "debridfs",
    about = "Browse and organise a Real-Debrid library as folders"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "DEBRIDFS_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "DEBRIDFS_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "DEBRIDFS_RULE_FILE",
        help = "Rule file (defaults to <config dir>/debridfs/sorting.txt)"
    )]
    pub(crate) rule_file: Option<PathBuf>,
    #[arg(long, global = true, help = "Serve this folder as the root")]
    pub(crate) root: Option<String>,
    #[arg(
        long,
        global = true,
        env = "DEBRIDFS_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(long, global = true, env = "DEBRIDFS_LOG_FORMAT", default_value = "auto")]
    pub(crate) log_format: String,
    #[arg(long, global = true, env = "DEBRIDFS_LOG", default_value = DEFAULT_CLI_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List a folder.
    Ls(ListArgs),
    /// Move or rename a file or folder.
    Mv(MoveArgs),
    /// Trash a file.
    Rm(PathArgs),
    /// Create a folder.
    Mkdir(PathArgs),
    /// Remove an empty folder.
    Rmdir(PathArgs),
    /// Trash every file under a folder.
    Purge(PathArgs),
    /// Print the direct download URL of a file.
    Link(PathArgs),
    /// Write file content to stdout.
    Cat(CatArgs),
    /// Rebuild the namespace.
    Refresh(RefreshArgs),
    /// Inspect the rule file.
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(Subcommand)]
pub(crate) enum RulesCommand {
    /// Report rule lines that are ignored.
    Check,
}

#[derive(Args, Default)]
pub(crate) struct ListArgs {
    #[arg(default_value = "", help = "Folder to list, relative to the root")]
    pub(crate) path: String,
}

#[derive(Args)]
pub(crate) struct PathArgs {
    pub(crate) path: String,
}

#[derive(Args)]
pub(crate) struct MoveArgs {
    pub(crate) source: String,
    #[arg(help = "Destination; a trailing '/' or an existing folder keeps the file name")]
    pub(crate) destination: String,
}

#[derive(Args)]
pub(crate) struct CatArgs {
    pub(crate) path: String,
    #[arg(long, value_parser = parse_range, help = "Byte range as start-end or start-")]
    pub(crate) range: Option<ByteRange>,
}

#[derive(Args, Default)]
pub(crate) struct RefreshArgs {
    #[arg(long, help = "Refetch the inventory even when counts are unchanged")]
    pub(crate) force: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Ls(_) => "ls",
        Command::Mv(_) => "mv",
        Command::Rm(_) => "rm",
        Command::Mkdir(_) => "mkdir",
        Command::Rmdir(_) => "rmdir",
        Command::Purge(_) => "purge",
        Command::Link(_) => "link",
        Command::Cat(_) => "cat",
        Command::Refresh(_) => "refresh",
        Command::Rules(RulesCommand::Check) => "rules_check",
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

pub(crate) fn parse_range(input: &str) -> Result<ByteRange, String> {
    let (start, end) = input
        .split_once('-')
        .ok_or_else(|| format!("range '{input}' must look like start-end or start-"))?;
    let start = start
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid range start '{start}': {err}"))?;
    let end = match end.trim() {
        "" => None,
        raw => Some(
            raw.parse::<u64>()
                .map_err(|err| format!("invalid range end '{raw}': {err}"))?,
        ),
    };
    if end.is_some_and(|end| end < start) {
        return Err(format!("range '{input}' ends before it starts"));
    }
    Ok(ByteRange { start, end })
}
