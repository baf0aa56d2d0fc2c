//! luaclang CLI
//!
//! - `luaclang run SCRIPT [ARGS..]`: run a Lua script with `luaclang` preloaded
//! - `luaclang dump FILE`: print the cursor tree of a source file as JSON

// Exercised through tests/test_cli_integration.rs
#![cfg_attr(tarpaulin, ignore)]

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use tracing_subscriber::EnvFilter;

use luaclang::engine::SourceLanguage;
use luaclang::{BindingError, Cursor, Directive, Session, SessionOptions, VisitError, VisitorBridge};

#[derive(Parser, Debug)]
#[command(name = "luaclang")]
#[command(version = luaclang::VERSION)]
#[command(about = "Explore C and C++ syntax trees from Lua")]
#[command(after_help = "EXAMPLES:
    luaclang run list_functions.lua src/main.c
    luaclang dump src/main.c --depth 2 --pretty
    RUST_LOG=luaclang=debug luaclang run script.lua")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a Lua script with the luaclang module available
    Run {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Passed to the script as `arg[1]`, `arg[2]`, ...
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the cursor tree of a source file as JSON
    Dump {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Source language; inferred from the extension by default
        #[arg(long, value_enum)]
        language: Option<Language>,

        /// Maximum depth below the translation unit
        #[arg(long, value_name = "N")]
        depth: Option<usize>,

        #[arg(long)]
        pretty: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Language {
    C,
    #[value(name = "c++", alias = "cpp")]
    Cpp,
}

impl From<Language> for SourceLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::C => SourceLanguage::C,
            Language::Cpp => SourceLanguage::Cpp,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "luaclang=debug,luaclang_engine=debug",
        _ => "luaclang=trace,luaclang_engine=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run { script, args } => run_script(&script, &args),
        Command::Dump {
            file,
            language,
            depth,
            pretty,
        } => dump(&file, language, depth, pretty),
    };

    if let Err(err) = result {
        eprintln!("luaclang: {:#}", err);
        std::process::exit(1);
    }
}

// ============================================================================
// run
// ============================================================================

fn run_script(script: &Path, args: &[String]) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("cannot read script {}", script.display()))?;

    let lua = mlua::Lua::new();
    luaclang::preload(&lua).map_err(lua_error)?;

    let arg = lua.create_table().map_err(lua_error)?;
    arg.raw_set(0, script.display().to_string()).map_err(lua_error)?;
    for (i, value) in args.iter().enumerate() {
        arg.raw_set(i + 1, value.as_str()).map_err(lua_error)?;
    }
    lua.globals().set("arg", arg).map_err(lua_error)?;

    lua.load(source)
        .set_name(format!("@{}", script.display()))
        .exec()
        .map_err(lua_error)
}

fn lua_error(err: mlua::Error) -> anyhow::Error {
    anyhow::anyhow!("{}", err)
}

// ============================================================================
// dump
// ============================================================================

/// One cursor of the dump, listed in pre-order with its child count
#[derive(Debug)]
struct Node {
    kind: &'static str,
    spelling: String,
    ty: Option<String>,
    line: usize,
    column: usize,
    children: usize,
}

fn dump(file: &Path, language: Option<Language>, depth: Option<usize>, pretty: bool) -> Result<()> {
    let options = SessionOptions {
        language: language.map(Into::into),
        ..SessionOptions::default()
    };

    let nodes = Session::scoped(file, &options, |session| -> Result<Vec<Node>> {
        let root = session
            .root_cursor()?
            .context("no translation unit")?;
        Ok(preorder(root, depth)?)
    })??;

    let mut out = BufWriter::new(std::io::stdout().lock());
    if pretty {
        write_tree(&mut out, &mut PrettyFormatter::new(), &nodes)?;
    } else {
        write_tree(&mut out, &mut CompactFormatter, &nodes)?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Cursors below `root` down to `depth`, in pre-order
fn preorder(root: Cursor, depth: Option<usize>) -> Result<Vec<Node>, BindingError> {
    let mut nodes = Vec::new();
    let mut stack = vec![(root, depth)];
    while let Some((cursor, depth)) = stack.pop() {
        let children = match depth {
            Some(0) => Vec::new(),
            _ => direct_children(&cursor)?,
        };
        let (_, at) = cursor.location()?;
        nodes.push(Node {
            kind: cursor.kind_spelling()?,
            spelling: cursor.spelling()?,
            ty: cursor.cursor_type()?.map(|ty| ty.spelling()).transpose()?,
            line: at.line,
            column: at.column,
            children: children.len(),
        });
        let below = depth.map(|d| d - 1);
        stack.extend(children.into_iter().rev().map(|child| (child, below)));
    }
    Ok(nodes)
}

/// Write pre-order nodes as nested JSON objects without recursing
fn write_tree<W: Write, F: Formatter>(
    out: &mut W,
    fmt: &mut F,
    nodes: &[Node],
) -> std::io::Result<()> {
    // Remaining child count of each open node, and whether it has written one yet
    let mut open: Vec<(usize, bool)> = Vec::new();

    for node in nodes {
        if let Some((remaining, first)) = open.last_mut() {
            fmt.begin_array_value(out, *first)?;
            *first = false;
            *remaining -= 1;
        }

        fmt.begin_object(out)?;
        field(out, fmt, true, "kind", &node.kind)?;
        field(out, fmt, false, "spelling", &node.spelling)?;
        if let Some(ty) = &node.ty {
            field(out, fmt, false, "type", ty)?;
        }
        field(out, fmt, false, "line", &node.line)?;
        field(out, fmt, false, "column", &node.column)?;

        if node.children > 0 {
            fmt.begin_object_key(out, false)?;
            serde_json::to_writer(&mut *out, "children")?;
            fmt.end_object_key(out)?;
            fmt.begin_object_value(out)?;
            fmt.begin_array(out)?;
            open.push((node.children, true));
            continue;
        }

        fmt.end_object(out)?;
        while let Some((remaining, _)) = open.last() {
            fmt.end_array_value(out)?;
            if *remaining > 0 {
                break;
            }
            open.pop();
            fmt.end_array(out)?;
            fmt.end_object_value(out)?;
            fmt.end_object(out)?;
        }
    }
    Ok(())
}

fn field<W: Write, F: Formatter, T: Serialize + ?Sized>(
    out: &mut W,
    fmt: &mut F,
    first: bool,
    key: &str,
    value: &T,
) -> std::io::Result<()> {
    fmt.begin_object_key(out, first)?;
    serde_json::to_writer(&mut *out, key)?;
    fmt.end_object_key(out)?;
    fmt.begin_object_value(out)?;
    serde_json::to_writer(&mut *out, value)?;
    fmt.end_object_value(out)
}

fn direct_children(cursor: &Cursor) -> Result<Vec<Cursor>, BindingError> {
    let mut children = Vec::new();
    let mut bridge = VisitorBridge::<_, std::convert::Infallible>::new(|child: Cursor, _| {
        children.push(child);
        Ok(Directive::Continue)
    });
    bridge.run(cursor).map_err(|err| match err {
        VisitError::Binding(err) => err,
        VisitError::Host(never) => match never {},
    })?;
    drop(bridge);
    Ok(children)
}
