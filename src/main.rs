use clap::{Parser as ClapParser, Subcommand};
use expressive::cli::{self, CheckOptions, CheckResult, CliError};
use std::{
    fs,
    io::{self, Read},
};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "expressive")]
#[command(about = "Expressive - boolean validation expressions compiled against typed models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an expression, and evaluate it when an instance is given
    Check {
        /// The expression to check
        expression: String,

        /// Model schema: inline JSON or a path to a JSON file
        #[arg(short, long)]
        schema: Option<String>,

        /// JSON instance (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Only validate syntax, don't compile
        #[arg(long)]
        syntax_only: bool,

        /// Match field, enum and function names ignoring case
        #[arg(long)]
        ignore_case: bool,
    },

    /// List the standard library functions
    Functions,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("expressive=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            expression,
            schema,
            input,
            syntax_only,
            ignore_case,
        } => run_check(expression, schema, input, syntax_only, ignore_case),
        Commands::Functions => {
            for line in cli::list_functions() {
                println!("{line}");
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run_check(
    expression: String,
    schema: Option<String>,
    input: Option<String>,
    syntax_only: bool,
    ignore_case: bool,
) -> Result<(), CliError> {
    let schema = match schema {
        Some(s) if s.trim_start().starts_with('{') => Some(s),
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };

    let input = match input {
        Some(s) => Some(s),
        None if !syntax_only && !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer).filter(|b| !b.trim().is_empty())
        }
        None => None,
    };

    let options = CheckOptions {
        expression,
        schema,
        input,
        syntax_only,
        ignore_case,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Compiled(model) => println!("Expression compiles against {model}"),
        CheckResult::Evaluated(result) => println!("{result}"),
    }
    Ok(())
}
