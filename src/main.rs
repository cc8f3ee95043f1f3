use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tapeworm::{DEFAULT_MEMORY_LEN, Interpreter, InterpreterConfig, Machine, RunStats};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tapeworm",
    about = "Streaming tape interpreter: program and input share one byte stream"
)]
struct Cli {
    /// Number of memory cells (0 selects the default).
    #[arg(long, default_value_t = DEFAULT_MEMORY_LEN)]
    memory_len: usize,

    /// Opcodes to forbid, e.g. "[-". Forbidding either bracket forbids both.
    #[arg(long, default_value = "")]
    forbid: String,

    /// Abort after this many dispatched operations.
    #[arg(long)]
    step_limit: Option<usize>,

    /// Read program and input from a file instead of standard input.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Register `#` to print the tape around the memory pointer to stderr.
    #[arg(long)]
    dump: bool,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,
}

/// Directives from `RUST_LOG` when set, otherwise a level chosen by `--verbose`.
fn env_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => {
            EnvFilter::builder().parse_lossy(directives)
        }
        _ => EnvFilter::new(if verbose { "debug" } else { "warn" }),
    }
}

fn init_tracing(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose, rust_log.as_deref()))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Print up to eight cells either side of the memory pointer.
fn dump_tape(m: &mut Machine<'_>) -> io::Result<()> {
    let pointer = *m.mem_pointer;
    let lo = pointer.saturating_sub(8);
    let hi = pointer.saturating_add(9).min(m.memory.len());
    let mut line = format!("#{} mp={pointer}:", *m.code_pointer);
    for (i, value) in m.memory[lo.min(hi)..hi].iter().enumerate() {
        if lo + i == pointer {
            line.push_str(&format!(" [{value}]"));
        } else {
            line.push_str(&format!(" {value}"));
        }
    }
    eprintln!("{line}");
    Ok(())
}

fn execute<R: Read, W: Write>(cli: &Cli, reader: R, writer: W) -> tapeworm::Result<RunStats> {
    let config = InterpreterConfig {
        memory_len: cli.memory_len,
        step_limit: cli.step_limit,
    };
    let mut interpreter = Interpreter::with_io(config, reader, writer);
    interpreter.forbid(cli.forbid.as_bytes());
    if cli.dump {
        interpreter.add_operation(b'#', dump_tape);
    }
    interpreter.run()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Unbuffered beyond stdout's own line buffering, so prompts show up
    // before `,` blocks on input.
    let writer = io::stdout().lock();
    let stats = match &cli.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            execute(&cli, BufReader::new(file), writer)
        }
        None => execute(&cli, io::stdin().lock(), writer),
    }
    .context("program failed")?;

    info!(
        steps = stats.steps,
        program_len = stats.program_len,
        memoized_jumps = stats.memoized_jumps,
        "done"
    );
    Ok(())
}
