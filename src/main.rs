/*!
Main binary for jsonwhere.
*/

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::generate;
use clap_verbosity_flag::Verbosity;
use serde_json::Value;
use std::io::{self, IsTerminal, Read, stdout};
use std::path::PathBuf;

use jsonwhere::{
    ConditionSet, QueryEngine, document::DocumentFormat, utils::write_colored_result,
};

/// Filter the records of a JSON document with a WHERE expression.
#[derive(Parser)]
#[command(name = "jw", version, about, arg_required_else_help = true, long_about = None, disable_help_subcommand = true)]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    command: Option<Commands>,
    /// WHERE expression (e.g., 'age >= 30 and name startswith "R" or vip = true')
    expression: Option<String>,
    #[arg(value_name = "FILE")]
    /// Optional path to the document. If omitted, reads from STDIN
    input: Option<PathBuf>,
    /// Node path of the collection to filter (e.g., "data.users")
    #[arg(short, long, value_name = "PATH")]
    from: Option<String>,
    /// Document format; detected from the file extension when omitted
    #[arg(long)]
    format: Option<DocumentFormat>,
    /// Display the number of matching records instead of the records
    #[arg(long, action = ArgAction::SetTrue)]
    count: bool,
    /// Display only the first matching record
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "count")]
    first: bool,
    /// Do not pretty-print the JSON output, instead use compact
    #[arg(long, action = ArgAction::SetTrue)]
    compact: bool,
    /// Never colorize output
    #[arg(long, action = ArgAction::SetTrue)]
    no_color: bool,
    #[command(flatten)]
    verbose: Verbosity,
}

/// Available subcommands for `jw`
#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    /// Generate shell completions
    Generate(GenerateCommand),
}

/// Generate shell completions
#[derive(Subcommand)]
enum GenerateCommand {
    /// Generate shell completions for the given shell to stdout.
    Shell { shell: clap_complete::Shell },
}

/// Entry point for main binary.
///
/// Loads the document (from FILE or piped STDIN), navigates to the node path,
/// filters it with the expression and prints the result to STDOUT.
fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    if let Some(Commands::Generate(GenerateCommand::Shell { shell })) =
        args.command
    {
        let mut cmd = Args::command();
        generate(shell, &mut cmd, "jw", &mut stdout().lock());
        return Ok(());
    }

    // Parse expression
    let conditions: ConditionSet = args
        .expression
        .as_deref()
        .unwrap_or_default()
        .parse()
        .with_context(|| "Failed to parse WHERE expression")?;

    // Load document
    let mut engine = if let Some(path) = args.input {
        match args.format {
            Some(format) => QueryEngine::import_with_format(&path, format),
            None => QueryEngine::import(&path),
        }
        .with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        if io::stdin().is_terminal() {
            // No piped input and no file specified
            let mut cmd = Args::command();
            return Ok(cmd.print_help()?);
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        let value = args
            .format
            .unwrap_or_default()
            .decode(&buffer)
            .with_context(|| "Failed to parse STDIN")?;
        QueryEngine::from_value(value)
    };

    // Execute query
    if let Some(from) = args.from {
        engine.at(from);
    }
    engine.where_set(&conditions);

    let output = if args.count {
        Value::from(engine.count()?)
    } else if args.first {
        engine.first()?.unwrap_or(Value::Null)
    } else {
        engine.get()?
    };

    // Display output
    if args.no_color || !stdout().is_terminal() {
        colored::control::set_override(false);
    }
    write_colored_result(&mut stdout().lock(), &output, !args.compact)?;

    Ok(())
}
