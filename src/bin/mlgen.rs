//! Command-line driver: parse a textual operation graph and emit it for one
//! target.

use bumpalo::Bump;
use clap::Parser;
use mlgen::codegen::{generate_module, GeneratorOptions, Language, ScopeConfig};
use mlgen::core::{CodegenError, GenerationSession};
use mlgen::ir::parse_module;
use mlgen::targets::TargetRegistry;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

/// Generate C, VHDL or Gappa source from an operation graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operation graph file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Target name
    #[arg(short, long, default_value = "generic")]
    target: String,

    /// Output language (defaults to the target's first language)
    #[arg(short, long)]
    language: Option<String>,

    /// Output file (prints to stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Declare every constant instead of inlining literals
    #[arg(long)]
    declare_constants: bool,

    /// Store every tagged node in a named temporary
    #[arg(long)]
    materialize_tagged: bool,

    /// Declare constants once at file level
    #[arg(long)]
    static_constants: bool,

    /// Prefix prepended to every generated name
    #[arg(long, default_value = "")]
    uniquifier: String,

    /// Omit the header and include block
    #[arg(long)]
    no_headers: bool,

    /// Keep vector values in memory formats
    #[arg(long)]
    no_promotion: bool,

    /// Print the target's compiler flags and exit
    #[arg(long)]
    print_flags: bool,

    /// List registered targets and exit
    #[arg(long)]
    list_targets: bool,

    /// Print generation statistics to stderr
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let registry = TargetRegistry::with_builtins()?;

    if cli.list_targets {
        for target in registry.iter() {
            match target.parent() {
                Some(parent) => println!("{:<12} (extends {parent}) {}", target.name(), target.description()),
                None => println!("{:<12} {}", target.name(), target.description()),
            }
        }
        return Ok(());
    }

    let target = registry.get(&cli.target)?;
    if cli.print_flags {
        println!("{}", target.get_compiler_flags().join(" "));
        return Ok(());
    }

    let language = match &cli.language {
        Some(name) => Language::from_name(name).ok_or_else(|| format!("unknown language '{name}'"))?,
        None => target.default_language().ok_or_else(|| CodegenError::MissingRuleTable {
            target: target.name().to_string(),
            language: "any".to_string(),
        })?,
    };

    let text = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let mut module = parse_module(&text)?;
    log::info!(
        "Parsed {} function(s), {} node(s)",
        module.functions.len(),
        module.graph.len()
    );

    let options = GeneratorOptions {
        language,
        declare_constants: cli.declare_constants,
        materialize_tagged: cli.materialize_tagged,
        headers: !cli.no_headers,
        header_comments: vec![format!("generated by mlgen for target {}", target.name())],
        scope: ScopeConfig {
            static_constants: cli.static_constants,
            uniquifier: cli.uniquifier.clone(),
            ..ScopeConfig::default()
        },
        promote_registers: !cli.no_promotion,
    };

    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    let code = generate_module(target, &session, options, &mut module.graph, &module.functions)?;

    match &cli.output {
        Some(path) => fs::write(path, &code)?,
        None => print!("{code}"),
    }
    if cli.stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}
