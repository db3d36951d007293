//! qail-ir — developer CLI over the IR pipeline
//!
//! Reads IR trees as JSON and prints what each stage makes of them.
//!
//! # Usage
//!
//! ```bash
//! # Render a query for MySQL
//! qail-ir render people.json --dialect mysql
//!
//! # Render an insert with bound parameters
//! qail-ir render insert.json --kind action --bindings values.json
//!
//! # Show hygiene violations
//! qail-ir verify people.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use qail_ir::analysis::HygieneReport;
use qail_ir::ast::{ActionKind, Binding, Expr, Ident};
use qail_ir::config;
use qail_ir::prelude::*;
use qail_ir::transpiler::traits::{ConflictStyle, KeyStyle, ReturningStyle, SqlGenerator};

#[derive(Parser)]
#[command(name = "qail-ir")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query IR to dialect SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-ir render people.json --dialect sqlserver
    qail-ir render insert.json --kind action --bindings values.json --json
    qail-ir normalize people.json
    qail-ir dialects")]
struct Cli {
    /// Target SQL dialect (overrides the config file)
    #[arg(short, long, value_enum, global = true)]
    dialect: Option<CliDialect>,

    /// Naming case: literal, snake_case, camel_case, upper_case, lower_case
    #[arg(short, long, global = true)]
    naming: Option<String>,

    /// Config file (default: ./qail-ir.toml, then the user config dir)
    #[arg(short, long, env = "QAIL_IR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Dump intermediate trees at trace level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDialect {
    Postgres,
    Mysql,
    Sqlserver,
    Sqlite,
    H2,
}

impl From<CliDialect> for Dialect {
    fn from(val: CliDialect) -> Self {
        match val {
            CliDialect::Postgres => Dialect::Postgres,
            CliDialect::Mysql => Dialect::MySQL,
            CliDialect::Sqlserver => Dialect::SqlServer,
            CliDialect::Sqlite => Dialect::SQLite,
            CliDialect::H2 => Dialect::H2,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TreeKind {
    Query,
    Action,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a tree to SQL and its parameter list
    Render {
        /// JSON file holding the tree
        tree: PathBuf,
        /// Whether the tree is a query or an action
        #[arg(short, long, value_enum, default_value = "query")]
        kind: TreeKind,
        /// JSON array of placeholder bindings
        #[arg(short, long)]
        bindings: Option<PathBuf>,
        /// JSON array of `[name, expression]` definitions
        #[arg(long)]
        definitions: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report hygiene violations of a query
    Verify {
        tree: PathBuf,
        #[arg(long)]
        definitions: Option<PathBuf>,
    },
    /// Print the flattened relational model of a query
    Normalize {
        tree: PathBuf,
        #[arg(long)]
        definitions: Option<PathBuf>,
    },
    /// Show what each dialect can render
    Dialects,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "qail_ir=trace" } else { "qail_ir=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Render {
            tree,
            kind,
            bindings,
            definitions,
            json,
        } => {
            let compiler = compiler(cli, definitions.as_deref())?;
            let bindings: Vec<Binding> = match bindings {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let rendered = match kind {
                TreeKind::Query => compiler.compile_query(&read_json(tree)?, &bindings)?,
                TreeKind::Action => compiler.compile_action(&read_json(tree)?, &bindings)?,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&rendered)?);
            } else {
                print_rendered(&rendered);
            }
        }
        Commands::Verify { tree, definitions } => {
            let compiler = compiler(cli, definitions.as_deref())?;
            match compiler.verify(&read_json(tree)?) {
                Ok(()) => println!("{} no free identifiers", "✓".green()),
                Err(IrError::Hygiene(report)) => {
                    print_report(&report);
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Normalize { tree, definitions } => {
            let compiler = compiler(cli, definitions.as_deref())?;
            let model = compiler.normalize(&read_json(tree)?)?;
            println!("{}", serde_json::to_string_pretty(&model)?);
        }
        Commands::Dialects => print_capabilities(),
    }
    Ok(())
}

/// Options from the config file with command-line overrides applied.
fn compiler(cli: &Cli, definitions: Option<&Path>) -> Result<Compiler> {
    let mut options = config::load(cli.config.as_deref())?;
    if let Some(dialect) = cli.dialect {
        options.dialect = dialect.into();
    }
    if let Some(naming) = &cli.naming {
        options.naming.case = naming.parse::<Case>()?;
    }
    if cli.verbose {
        options.trace = true;
    }
    let definitions: Vec<(Ident, Expr)> = match definitions {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    Ok(Compiler::new(options).with_definitions(definitions))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_rendered(rendered: &Rendered) {
    println!("{}", rendered.sql.white().bold());
    if !rendered.params.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan());
        for p in &rendered.params {
            let id = p.id.as_deref().unwrap_or("-");
            println!(
                "  {:>3}  {}  {} {}",
                p.index,
                p.value.to_string().yellow(),
                id.dimmed(),
                format!("({:?}, {})", p.ty, p.codec).dimmed()
            );
        }
    }
    let shape = match &rendered.return_shape {
        ReturnShape::AffectedRows => "affected rows".to_string(),
        ReturnShape::GeneratedKeys(cols) => format!("generated keys [{}]", cols.join(", ")),
        ReturnShape::Rows(cols) => format!("rows [{}]", cols.join(", ")),
    };
    println!();
    println!("{} {}", "Returns:".cyan(), shape);
}

fn print_report(report: &HygieneReport) {
    println!("{}", "Hygiene violations:".red().bold());
    for v in &report.violations {
        let names: Vec<&str> = v.free.iter().map(String::as_str).collect();
        println!(
            "  {} {} in {}",
            v.clause.to_string().yellow(),
            names.join(", ").red(),
            v.subtree.dimmed()
        );
    }
}

fn print_capabilities() {
    println!(
        "{:<11} {:<10} {:<9} {:<12} {:<14} {:<12} {}",
        "dialect".bold(),
        "markers".bold(),
        "booleans".bold(),
        "distinct on".bold(),
        "returning".bold(),
        "keys".bold(),
        "on conflict".bold()
    );
    for dialect in Dialect::ALL {
        let g = dialect.generator();
        let returning = match g.returning(ActionKind::Insert) {
            Ok(ReturningStyle::Returning) => "RETURNING".green(),
            Ok(ReturningStyle::Output(_)) => "OUTPUT".green(),
            Err(_) => "-".dimmed(),
        };
        let keys = match g.generated_keys(ActionKind::Insert) {
            Ok(KeyStyle::Clause(_)) => "in text".green(),
            Ok(KeyStyle::Driver) => "driver".yellow(),
            Ok(KeyStyle::Empty) | Err(_) => "-".dimmed(),
        };
        let conflict = match g.on_conflict() {
            ConflictStyle::OnConflict => "ON CONFLICT".green(),
            ConflictStyle::DuplicateKey => "ON DUPLICATE KEY".green(),
            ConflictStyle::Unsupported => "-".dimmed(),
        };
        let distinct_on = if g.distinct_on(Vec::new()).is_ok() {
            "yes".green()
        } else {
            "-".dimmed()
        };
        let booleans = if g.native_booleans() {
            "native".green()
        } else {
            "0/1".yellow()
        };
        println!(
            "{:<11} {:<10} {:<9} {:<12} {:<14} {:<12} {}",
            dialect.to_string(),
            format!("{}, {}", g.placeholder(1), g.placeholder(2)),
            booleans,
            distinct_on,
            returning,
            keys,
            conflict
        );
    }
}
