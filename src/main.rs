use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::{LoxError, StderrReporter, Tally};
use rox::parser::Parser;
use rox::scanner::{scan_tokens, Scanner};
use rox::{Lox, Outcome};

const EXIT_DATA_ERROR: u8 = 65;
const EXIT_SOFTWARE: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

/// Stack for the thread that scans, parses and runs; deep enough for
/// `MAX_CALL_DEPTH` nested Lox calls in an unoptimised build.
const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the token stream as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints each statement's syntax tree
    Parse { filename: PathBuf },

    /// Runs a file as a Lox program
    Run { filename: PathBuf },

    /// Starts an interactive prompt (the default)
    Repl,
}

/// Reads a whole script as UTF‑8 text.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    let text = String::from_utf8(buf)
        .map_err(LoxError::from)
        .context(format!("{:?} is not valid UTF-8", filename))?;

    Ok(text)
}

/// Reads the script or reports why it could not be read, mapping the failure
/// to the I/O exit status.
fn load_source(filename: &Path) -> std::result::Result<String, ExitCode> {
    read_file(filename).map_err(|e| {
        eprintln!("{:#}", e);
        ExitCode::from(EXIT_IO_ERROR)
    })
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<ExitCode> {
    let source = match load_source(filename) {
        Ok(source) => source,
        Err(code) => return Ok(code),
    };
    let mut tokens = Vec::new();
    let mut tokenized = true;

    for item in Scanner::new(&source) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(if tokenized {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DATA_ERROR)
    })
}

fn parse(filename: &Path) -> Result<ExitCode> {
    let source = match load_source(filename) {
        Ok(source) => source,
        Err(code) => return Ok(code),
    };
    let mut reporter = StderrReporter;
    let mut tally = Tally::new(&mut reporter);

    let tokens = scan_tokens(&source, &mut tally);
    let statements = Parser::new(&tokens, &mut tally).parse();

    for stmt in &statements {
        println!("{}", AstPrinter::print_stmt(stmt));
    }

    Ok(if tally.had_error() {
        ExitCode::from(EXIT_DATA_ERROR)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_file(filename: &Path) -> Result<ExitCode> {
    let source = match load_source(filename) {
        Ok(source) => source,
        Err(code) => return Ok(code),
    };

    let mut lox = Lox::new();

    Ok(match lox.run(&source) {
        Outcome::Ok => ExitCode::SUCCESS,
        Outcome::StaticError => ExitCode::from(EXIT_DATA_ERROR),
        Outcome::RuntimeError => ExitCode::from(EXIT_SOFTWARE),
    })
}

/// Read‑eval‑print loop.  Each line is its own source unit; errors are
/// reported and forgotten, globals persist.
fn run_prompt() -> Result<ExitCode> {
    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        let outcome = lox.run(&line);
        debug!("REPL line finished: {:?}", outcome);
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Keep the `log` macros quiet without a file.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let command = args.command.unwrap_or(Commands::Repl);

    let worker = thread::Builder::new()
        .name("rox".into())
        .stack_size(STACK_SIZE)
        .spawn(move || dispatch(command))
        .context("Failed to spawn interpreter thread")?;

    worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))?
}

fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Tokenize { filename, json } => tokenize(&filename, json),
        Commands::Parse { filename } => parse(&filename),
        Commands::Run { filename } => run_file(&filename),
        Commands::Repl => run_prompt(),
    }
}
