//! Tarn CLI: execute files, evaluate snippets, or run the REPL.

use std::env;
use std::path::Path;
use std::process;
use std::time::Instant;

use colored::Colorize;

use tarnlang::error::TarnError;
use tarnlang::repl::Repl;
use tarnlang::ExecutionMode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
    /// Start the REPL
    Repl,
    /// Time a fixed recursive-fibonacci program on each engine
    Bench,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    mode: ExecutionMode,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Tarn {} - a small scripting language", VERSION);
    eprintln!();
    eprintln!("Usage: tarn [options] [script.tn]");
    eprintln!("       tarn -e '<code>'");
    eprintln!("       tarn bench");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  bench           Compile and run a recursive fibonacci program,");
    eprintln!("                  reporting wall-clock duration per engine");
    eprintln!("  -e <code>       Evaluate code and print the result");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --tree-walk     Use the tree-walking interpreter instead of the VM");
    eprintln!("  --disassemble   Dump compiled bytecode before running");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  tarn                          Start the interactive REPL");
    eprintln!("  tarn script.tn                Run a script file");
    eprintln!("  tarn --disassemble script.tn  Show bytecode, then run");
    eprintln!("  tarn -e 'puts(1 + 2)'         Evaluate code directly");
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        mode: ExecutionMode::default(),
        disassemble: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--tree-walk" => options.mode = ExecutionMode::TreeWalk,
            "--disassemble" => options.disassemble = true,
            "bench" => options.command = Command::Bench,
            "-e" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("-e requires a code argument");
                    process::exit(64);
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                process::exit(64);
            }
            file => {
                options.command = Command::Run {
                    file: file.to_string(),
                };
            }
        }
        i += 1;
    }

    options
}

fn exit_code(err: &TarnError) -> i32 {
    match err {
        TarnError::Runtime(_) => 70,
        TarnError::Io(_) => 66,
        _ => 65,
    }
}

fn report(err: &TarnError) -> ! {
    eprintln!("{}", err.to_string().red());
    process::exit(exit_code(err));
}

fn run_file(file: &str, mode: ExecutionMode, disassemble: bool) {
    if let Err(err) = tarnlang::run_file(Path::new(file), mode, disassemble) {
        report(&err);
    }
}

fn run_eval(code: &str, mode: ExecutionMode) {
    match tarnlang::eval(code, mode) {
        Ok(value) => println!("{}", value),
        Err(err) => report(&err),
    }
}

/// The fixed benchmark program: recursive fibonacci.
const BENCH_PROGRAM: &str = "
let fibonacci = fn(x) {
    if (x < 2) { x } else { fibonacci(x - 1) + fibonacci(x - 2) }
};
fibonacci(25);
";

fn run_bench() {
    for (name, mode) in [
        ("bytecode", ExecutionMode::Bytecode),
        ("tree-walk", ExecutionMode::TreeWalk),
    ] {
        let start = Instant::now();
        match tarnlang::eval(BENCH_PROGRAM, mode) {
            Ok(value) => {
                let elapsed = start.elapsed();
                println!("{:9}  result={}  duration={:?}", name, value, elapsed);
            }
            Err(err) => report(&err),
        }
    }
}

fn main() {
    let options = parse_args();

    match options.command {
        Command::Run { file } => run_file(&file, options.mode, options.disassemble),
        Command::Eval { code } => run_eval(&code, options.mode),
        Command::Bench => run_bench(),
        Command::Repl => Repl::new(options.mode).run(),
    }
}
