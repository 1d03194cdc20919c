// ABOUTME: CLI driver: interactive REPL and batch file runner

mod helper;

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing_subscriber::EnvFilter;

use helper::ReplHelper;
use rfexproto::config;
use rfexproto::error::{EvalAbort, ReadError};
use rfexproto::eval::Interpreter;
use rfexproto::reader::Reader;
use rfexproto::trace::render_trace;
use rfexproto::value::Value;

/// Fexpr-based Lisp interpreter in the Kernel tradition
#[derive(Parser, Debug)]
#[command(name = "rfexproto")]
#[command(version = config::VERSION)]
#[command(about = "A fexpr-based Lisp interpreter with first-class continuations")]
struct CliArgs {
    /// Program to evaluate (a path, or - for standard input); omit for a REPL
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Skip loading the prelude
    #[arg(long = "no-prelude")]
    no_prelude: bool,

    /// Load the prelude from this path instead of ./std.lisp
    #[arg(long = "prelude", value_name = "PATH")]
    prelude: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    if let Some(tuning) = config::jit_config() {
        tracing::debug!(tuning = %tuning, "jit tuning requested, but this build carries no jit subsystem");
    }

    let mut interp = Interpreter::new();
    if !args.no_prelude {
        load_prelude(&mut interp, args.prelude.as_deref());
    }

    match &args.script {
        Some(path) => run_batch(&interp, path),
        None => {
            if std::io::stdin().is_terminal() {
                run_repl(&interp)
            } else {
                run_batch(&interp, Path::new("-"))
            }
        }
    }
}

/// Prefers an explicit path, then ./std.lisp from the working
/// directory, then the embedded copy.
fn load_prelude(interp: &mut Interpreter, explicit: Option<&Path>) {
    let loaded = match explicit {
        Some(path) => std::fs::read_to_string(path)
            .map(|text| (text, path.display().to_string())),
        None => {
            if Path::new(config::PRELUDE_FILE).exists() {
                std::fs::read_to_string(config::PRELUDE_FILE)
                    .map(|text| (text, config::PRELUDE_FILE.to_string()))
            } else {
                Ok((config::DEFAULT_PRELUDE.to_string(), "<prelude>".to_string()))
            }
        }
    };
    match loaded {
        Ok((text, name)) => {
            if let Err(err) = interp.load_prelude(&text, &name) {
                eprintln!("warning: failed to load prelude {}: {}", name, err);
            }
        }
        Err(err) => eprintln!("warning: cannot read prelude: {}", err),
    }
}

fn run_batch(interp: &Interpreter, path: &Path) -> ExitCode {
    let (source, name) = if path == Path::new("-") {
        let mut text = String::new();
        if let Err(err) = std::io::stdin().read_to_string(&mut text) {
            eprintln!("error: cannot read standard input: {}", err);
            return ExitCode::FAILURE;
        }
        (text, "<stdin>".to_string())
    } else {
        match std::fs::read_to_string(path) {
            Ok(text) => (text, path.display().to_string()),
            Err(err) => {
                eprintln!("error: cannot read {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    };

    let mut reader = Reader::new(&source, &name);
    loop {
        match reader.read() {
            Ok(None) => return ExitCode::SUCCESS,
            Ok(Some(expr)) => match interp.eval(&expr) {
                Ok(Value::Inert) => {}
                Ok(value) => println!("{}", value),
                Err(abort) => {
                    report_abort(&abort);
                    return ExitCode::FAILURE;
                }
            },
            Err(err) => {
                report_syntax_error(&name, &err);
                return ExitCode::FAILURE;
            }
        }
    }
}

fn run_repl(interp: &Interpreter) -> ExitCode {
    println!("{}", config::BANNER);
    println!("{}", config::BANNER_HINT);
    println!("{}", config::BANNER_EXAMPLE);

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<ReplHelper, DefaultHistory> = match Editor::with_config(rl_config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("error: cannot initialize line editor: {}", err);
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(ReplHelper));

    loop {
        match rl.readline("? ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                repl_line(interp, &line);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {}", err);
                break;
            }
        }
    }
    ExitCode::SUCCESS
}

/// Evaluates every expression on the line. Results bind `last-value`;
/// an error prints its trace, binds `last-error-continuation` and
/// `last-error-message`, and abandons the rest of the line.
fn repl_line(interp: &Interpreter, line: &str) {
    let mut reader = Reader::new(line, "<repl>");
    loop {
        match reader.read() {
            Ok(None) => break,
            Ok(Some(expr)) => match interp.eval(&expr) {
                Ok(value) => {
                    interp.env().define(Rc::from("last-value"), value.clone());
                    if !matches!(value, Value::Inert) {
                        println!("> {}", value);
                    }
                }
                Err(abort) => {
                    report_abort(&abort);
                    let continuation = abort
                        .source_continuation()
                        .map(Value::Continuation)
                        .unwrap_or(Value::Inert);
                    interp
                        .env()
                        .define(Rc::from("last-error-continuation"), continuation);
                    interp
                        .env()
                        .define(Rc::from("last-error-message"), abort.message());
                    break;
                }
            },
            Err(err) => {
                report_syntax_error("<repl>", &err);
                break;
            }
        }
    }
}

fn report_abort(abort: &EvalAbort) {
    if let Some(cont) = abort.source_continuation() {
        println!("! --- stack trace ---");
        print!("{}", render_trace(&cont));
    }
    println!(
        "! {}",
        Value::cons(Value::symbol("error"), abort.message())
    );
}

fn report_syntax_error(filename: &str, err: &ReadError) {
    println!("! --- syntax error ---");
    match err {
        ReadError::Syntax { message, line, col } => {
            println!("  in {} at {} [{}:]", filename, line, col);
            println!("! (syntax-error \"{}\")", message);
        }
        ReadError::Incomplete => {
            println!("! (syntax-error \"unexpected end of input\")");
        }
    }
}
