//! NodeLink Factory CLI
//!
//! Usage:
//!   nodelink-factory [OPTIONS] [TEMPLATE]
//!
//! Options:
//!   -c, --config <FILE>      Factory config (TOML format)
//!   -b, --base <PATH>        Base path for relative template identifiers
//!   -r, --root <PREFIX=DIR>  Map a URI prefix to a directory (repeatable)
//!   -a, --attrs <FILE>       Attributes to apply (TOML format)
//!       --async              Compile through the event queue
//!   -g, --grammar            Show markup grammar reference
//!   -v, --verbose            Log every construction step
//!   -h, --help               Print help

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nodelink_factory::{
    AttributeFile, CompileMode, ComponentFactory, ContainerRef, FactoryConfig, LocalEventQueue,
    MarkupEngine, Ownership, SceneNode,
};

#[derive(Parser)]
#[command(name = "nodelink-factory")]
#[command(about = "Instantiate node-graph components from markup templates")]
struct Cli {
    /// Template identifier, relative to the base path or absolute
    template: Option<String>,

    /// Factory config file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base path for relative template identifiers
    #[arg(short, long)]
    base: Option<String>,

    /// Map a URI prefix to a directory, as PREFIX=DIR
    #[arg(short, long, value_parser = parse_root)]
    root: Vec<(String, PathBuf)>,

    /// Attribute file with [context], [direct] and optional [batch] tables
    #[arg(short, long)]
    attrs: Option<PathBuf>,

    /// Compile asynchronously and wait on the event queue
    #[arg(long = "async")]
    asynchronous: bool,

    /// Show markup grammar reference
    #[arg(short, long)]
    grammar: bool,

    /// Log every construction step
    #[arg(short, long)]
    verbose: bool,
}

fn parse_root(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((prefix, dir)) if !prefix.is_empty() && !dir.is_empty() => {
            Ok((prefix.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected PREFIX=DIR, got '{}'", arg)),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.grammar {
        print_grammar();
        return;
    }

    let Some(template) = cli.template.as_deref() else {
        print_intro();
        return;
    };

    // Load config, then let flags override it
    let mut config = match &cli.config {
        Some(path) => match FactoryConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FactoryConfig::default().with_compile_mode(CompileMode::Synchronous),
    };
    if let Some(base) = &cli.base {
        config.base_path = base.clone();
    }
    for (prefix, dir) in &cli.root {
        config.roots.insert(prefix.clone(), dir.clone());
    }
    if cli.asynchronous {
        config.compile_mode = CompileMode::Asynchronous;
    }

    let attrs = match &cli.attrs {
        Some(path) => match AttributeFile::from_file(path) {
            Ok(attrs) => attrs,
            Err(e) => {
                eprintln!("Error loading attributes '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AttributeFile::default(),
    };

    let queue = LocalEventQueue::new();
    let engine = MarkupEngine::new()
        .with_roots(config.roots.clone())
        .with_queue(Rc::clone(&queue));
    let mut factory = ComponentFactory::new(config)
        .with_engine(Rc::new(engine))
        .with_event_pump(queue);

    let root = SceneNode::new("root").shared();
    let container: ContainerRef = root.clone();

    match &attrs.batch {
        Some(batch) => {
            let created = factory.create_many(
                &batch.key,
                &batch.values,
                Some(&container),
                template,
                &attrs.direct,
                Ownership::Delegated,
            );
            if created.len() < batch.values.len() {
                eprintln!(
                    "Warning: created {} of {} instances",
                    created.len(),
                    batch.values.len()
                );
            }
            if created.is_empty() {
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = factory.create(
                Some(&container),
                template,
                &attrs.context,
                &attrs.direct,
                Ownership::Delegated,
            ) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    print!("{}", root.borrow().dump());
}

fn print_intro() {
    println!(
        r#"NodeLink Factory - instantiate node-graph components from markup templates

USAGE:
    nodelink-factory [OPTIONS] <TEMPLATE>

OPTIONS:
    -c, --config       Factory config (TOML file)
    -b, --base         Base path for relative identifiers
    -r, --root         Map a URI prefix to a directory, PREFIX=DIR
    -a, --attrs        Attributes to apply (TOML file)
    --async            Compile through the event queue
    -g, --grammar      Show markup grammar reference
    -v, --verbose      Log every construction step
    -h, --help         Print help

QUICK START:
    nodelink-factory --base views/ NodeView.tmpl

Run --grammar for the markup syntax."#
    );
}

fn print_grammar() {
    println!(
        r##"NODELINK MARKUP GRAMMAR
=======================

COMPONENTS
----------
item <Name> {{ ... }}      Visual component, attachable to a container
object <Name> {{ ... }}    Non-visual component

PROPERTIES
----------
property <name>                 Declared, starts as null
property <name>: <value>        Declared with an initial value
required property <name>        Must be non-null when construction completes

VALUES
------
Strings:   "text"
Numbers:   42, -3, 2.5
Colors:    #4488ff (stored as a string)
Booleans:  true, false
Null:      null
Lists:     [1, 2, "three"]
Context:   heading   (a bare name reads the construction context)

ATTRIBUTE FILES
---------------
[context]            Written into the construction context first
heading = "Input"

[direct]             Written onto the object before completion
node = 3

[batch]              One instance per value, written under `key`
key = "node"
values = [1, 2, 3]

COMMENTS
--------
// line comment
/* block comment */"##
    );
}
