//! fontpull CLI (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::info;

use fontpull_core::aggregate::aggregate;
use fontpull_core::emit::{render, EmitOptions};
use fontpull_core::install::{append_fragment, combine_css, FontInstaller, InstallOptions};
use fontpull_core::model::{AggregatedFontFace, ClientIdentity};
use fontpull_core::output::{write_json_pretty, write_ndjson};
use fontpull_core::parse::{FontFaceParser, DEFAULT_ASSET_ORIGIN};

/// CLI entrypoint for fontpull.
#[derive(Debug, Parser)]
#[command(
    name = "fontpull",
    about = "Download web fonts and emit local @font-face CSS (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    /// Log progress to stderr (RUST_LOG still wins)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, cache and print CSS for one or more font families
    Install(InstallArgs),
    /// Parse a saved API stylesheet offline
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
struct InstallArgs {
    /// Font families (CSS font-family values; only the first entry of each is used)
    #[arg(required = true, value_hint = ValueHint::Other)]
    families: Vec<String>,

    /// Directory receiving the font binaries [env: FONTPULL_CACHE_DIR]
    #[arg(long = "cache-dir", value_hint = ValueHint::DirPath)]
    cache_dir: Option<PathBuf>,

    /// Prefix of local URLs written into the CSS [env: FONTPULL_PUBLIC_PREFIX]
    #[arg(long = "public-prefix")]
    public_prefix: Option<String>,

    /// Font API root [env: FONTPULL_API_BASE]
    #[arg(long = "api-base", value_hint = ValueHint::Url)]
    api_base: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Number of worker threads for requests
    #[arg(short = 'J', long = "jobs")]
    jobs: Option<usize>,

    /// Skip @font-face blocks that would only contain local('')
    #[arg(long = "omit-empty-blocks", action = ArgAction::SetTrue)]
    omit_empty_blocks: bool,

    /// Append the CSS to this existing stylesheet instead of printing it
    #[arg(
        long = "append-to",
        value_hint = ValueHint::FilePath,
        conflicts_with_all = ["json", "ndjson"]
    )]
    append_to: Option<PathBuf>,

    /// Emit full install reports as a JSON array
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit install reports as newline-delimited JSON
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Stylesheet file, or `-` for STDIN
    #[arg(value_hint = ValueHint::FilePath)]
    path: PathBuf,

    /// Client the stylesheet was fetched as
    #[arg(long = "client", default_value_t = ClientArg::Truetype, value_enum)]
    client: ClientArg,

    /// Accept asset URLs under this origin
    #[arg(long = "asset-origin", default_value = DEFAULT_ASSET_ORIGIN)]
    asset_origin: String,

    /// Render CSS with the remote URLs instead of printing JSON
    #[arg(long = "css", action = ArgAction::SetTrue)]
    css: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ClientArg {
    Eot,
    Woff2,
    Woff,
    Truetype,
}

impl From<ClientArg> for ClientIdentity {
    fn from(value: ClientArg) -> Self {
        match value {
            ClientArg::Eot => ClientIdentity::Eot,
            ClientArg::Woff2 => ClientIdentity::Woff2,
            ClientArg::Woff => ClientIdentity::Woff,
            ClientArg::Truetype => ClientIdentity::TrueType,
        }
    }
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Install(args) => run_install(args),
        Command::Parse(args) => {
            let stdin = io::stdin();
            run_parse(args, stdin.lock())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

fn build_options(args: &InstallArgs, base: InstallOptions) -> InstallOptions {
    let mut opts = base;
    if let Some(dir) = &args.cache_dir {
        opts.cache_dir = dir.clone();
    }
    if let Some(prefix) = &args.public_prefix {
        opts.public_prefix = prefix.clone();
    }
    if let Some(api) = &args.api_base {
        opts.api_base = api.clone();
    }
    if let Some(secs) = args.timeout {
        opts.connect_timeout_secs = secs;
        opts.timeout_secs = secs;
    }
    if args.jobs.is_some() {
        opts.jobs = args.jobs;
    }
    opts.omit_empty_blocks |= args.omit_empty_blocks;
    opts
}

fn run_install(args: InstallArgs) -> Result<()> {
    let opts = build_options(&args, InstallOptions::from_env());
    let installer = FontInstaller::with_http(opts)?;
    let reports = installer.install_many(&args.families);

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if args.ndjson {
        return write_ndjson(&reports, &mut handle);
    }
    if args.json {
        return write_json_pretty(&reports, &mut handle);
    }

    let css = combine_css(&reports);
    match &args.append_to {
        Some(path) => {
            append_fragment(path, &css)?;
            info!("appended {} bytes of CSS to {}", css.len(), path.display());
            Ok(())
        }
        None => write_css(&css, &mut handle),
    }
}

fn run_parse(args: ParseArgs, stdin: impl Read) -> Result<()> {
    let text = read_source(&args.path, stdin)?;
    let faces = parse_faces(&text, args.client.into(), &args.asset_origin)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.css {
        write_css(&render(&faces, &EmitOptions::default()), &mut handle)
    } else {
        let json = serde_json::to_string_pretty(&faces)?;
        writeln!(handle, "{json}")?;
        Ok(())
    }
}

fn parse_faces(
    text: &str,
    client: ClientIdentity,
    asset_origin: &str,
) -> Result<Vec<AggregatedFontFace>> {
    let parser = FontFaceParser::new(asset_origin)?;
    let records = parser.parse(text);
    Ok(aggregate([(client, &records)]))
}

fn read_source(path: &Path, mut stdin: impl Read) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        stdin.read_to_string(&mut buf).context("reading stylesheet from STDIN")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("reading stylesheet {}", path.display()))
}

fn write_css(css: &str, mut w: impl Write) -> Result<()> {
    if !css.is_empty() {
        writeln!(w, "{css}")?;
    }
    Ok(())
}
