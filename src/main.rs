//! Checks a tracing program without attaching it.
//!
//! Usage: `tracec [--unsafe] [-v] <program> [params...]`

use std::{fs::read_to_string, io::IsTerminal, path::PathBuf, process, rc::Rc};

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tracec::{
    config::{AnalyserConfig, DEFAULT_MAX_PASSES, DEFAULT_MAX_STRLEN},
    lexer::lexer::tokenize,
    log::{Log, LogType},
    parser::parser::parse,
    pass_manager::{create_semantic_pass, PassContext, PassManager},
    providers::{PermissiveSymbols, StaticFeatures},
};

#[derive(Parser, Debug)]
#[command(name = "tracec")]
#[command(about = "Type-check a tracing program")]
struct Args {
    /// Path to the program
    program: PathBuf,

    /// Positional parameters available as $1, $2, ...
    #[arg(trailing_var_arg = true)]
    params: Vec<String>,

    /// Allow unsafe builtins such as signal() and override()
    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    /// Give up after this many passes
    #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Longest string value in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_STRLEN)]
    max_strlen: usize,

    /// The program runs alongside a child command
    #[arg(short = 'c', long = "child")]
    child: bool,

    /// Only list probes, skipping attach point checks
    #[arg(short = 'l', long = "listing")]
    listing: bool,

    /// Hide warnings
    #[arg(long)]
    no_warnings: bool,

    /// Colorize diagnostics
    #[arg(long)]
    color: bool,

    /// Verbose output
    #[arg(short = 'v')]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "warn" })
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = match read_to_string(&args.program) {
        Ok(source) => source,
        Err(err) => {
            error!("Failed to read {}: {}", args.program.display(), err);
            process::exit(1);
        }
    };

    let file_name = args
        .program
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("stdin"));

    let colorize = args.color && std::io::stderr().is_terminal();
    let mut log = Log::new(file_name.clone(), source.clone()).with_color(colorize);
    if args.verbose {
        log.enable(LogType::V1);
    }
    if args.no_warnings {
        let _ = log.disable(LogType::Warning);
    }

    let tokens = match tokenize(source, Some(file_name.clone())) {
        Ok(tokens) => tokens,
        Err(err) => {
            err.report(&mut log);
            process::exit(1);
        }
    };
    debug!(tokens = tokens.len(), "tokenized");

    let mut program = match parse(tokens, Rc::new(file_name)).1 {
        Ok(program) => program,
        Err(err) => {
            err.report(&mut log);
            process::exit(1);
        }
    };
    debug!(probes = program.probes.len(), "parsed");

    let config = AnalyserConfig::new()
        .with_max_passes(args.max_passes)
        .with_max_strlen(args.max_strlen)
        .with_unsafe(args.unsafe_mode)
        .with_child(args.child)
        .with_listing(args.listing)
        .with_params(args.params);

    let features = StaticFeatures::all();
    let mut manager = PassManager::new();
    manager.add_pass(create_semantic_pass());

    let mut ctx = PassContext {
        program: &mut program,
        sink: &mut log,
        features: &features,
        symbols: &PermissiveSymbols,
        config: &config,
    };

    if let Err(err) = manager.run(&mut ctx) {
        error!("{}", err);
        process::exit(1);
    }

    info!("{}: OK", args.program.display());
}
