//! Command-line driver: parse a program, then either run it on the
//! reference VM or run shape inference over its entry function.

mod error;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use error::CliError;
use myia_core::{GraphId, GraphManager, MapResolver, NamespaceValue, Primitive};
use myia_infer::{Engine, InferenceConfig, Shape, Dim};
use myia_vm::{Value, Vm};

/// The Myia reference compiler front end, VM, and shape-inference engine.
#[derive(Parser)]
#[command(name = "myia", about = "Myia reference front end, VM, and shape inferrer")]
struct Cli {
    /// Source file holding one or more top-level function definitions.
    file: PathBuf,

    /// Entry function name (default: the first/only top-level def).
    #[arg(long)]
    entry: Option<String>,

    /// JSON-encoded argument list, e.g. `[2, 3]`.
    #[arg(long, default_value = "[]")]
    args: String,

    /// Raise log verbosity to surface VM node-value events.
    #[arg(long)]
    trace: bool,

    /// Run shape inference over the parsed graph and print the inferred
    /// shape of the return node instead of evaluating it.
    #[arg(long)]
    infer_shapes: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.trace { tracing::Level::TRACE } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&cli.file)?;
    let json_args: serde_json::Value = serde_json::from_str(&cli.args)?;

    let mut core = GraphManager::new();
    let resolver = operator_resolver();
    let graphs = myia_parser::parse_module(&source, &mut core, &resolver)?;
    let entry = pick_entry(&core, &graphs, cli.entry.as_deref())?;

    let arg_values = json_to_args(&json_args)?;

    if cli.infer_shapes {
        let arg_shapes: Vec<Shape> = arg_values.iter().map(value_to_shape).collect();
        let engine = Engine::new(&core, InferenceConfig::default());
        let shape = engine.infer_graph_blocking(entry, &arg_shapes)?;
        println!("{shape}");
    } else {
        let mut vm = Vm::new(&core, &resolver);
        let result = vm.evaluate(entry, arg_values, None)?;
        println!("{result:?}");
    }
    Ok(())
}

fn pick_entry(core: &GraphManager, graphs: &[GraphId], entry: Option<&str>) -> Result<GraphId, CliError> {
    match entry {
        Some(name) => graphs
            .iter()
            .copied()
            .find(|&g| core.graph(g).ok().and_then(|d| d.debug.name.as_deref()) == Some(name))
            .ok_or_else(|| CliError::NoSuchEntry(name.to_string())),
        None => graphs.first().copied().ok_or(CliError::EmptyProgram),
    }
}

/// Binds every `operator`-module symbol the parser emits `resolve` calls
/// against to its primitive, so evaluating a freshly parsed program never
/// hits an unresolved name for a surface operator.
fn operator_resolver() -> MapResolver {
    use Primitive::*;
    [
        Add, Sub, Mul, TrueDiv, FloorDiv, Mod, Pow, MatMul, LShift, RShift, And, Or, Xor, Pos, Neg, Invert, Not, Eq, Ne, Lt, Gt, Le, Ge, Is,
        IsNot, Contains, GetItem,
    ]
    .into_iter()
    .filter_map(|p| p.operator_symbol().map(|sym| (sym, p)))
    .fold(MapResolver::new(), |resolver, (sym, p)| resolver.with(sym, NamespaceValue::Primitive(p)))
}

fn json_to_args(json: &serde_json::Value) -> Result<Vec<Value>, CliError> {
    match json {
        serde_json::Value::Array(items) => items.iter().map(json_to_value).collect(),
        other => Err(CliError::UnsupportedArg(format!("--args must be a JSON array, got {other}"))),
    }
}

fn json_to_value(json: &serde_json::Value) -> Result<Value, CliError> {
    match json {
        serde_json::Value::Null => Ok(Value::None_),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(CliError::UnsupportedArg(format!("number out of range: {n}")))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Array(items) => items.iter().map(json_to_value).collect::<Result<_, _>>().map(Value::Tuple),
        serde_json::Value::Object(_) => Err(CliError::UnsupportedArg("objects are not a surface-language value".to_string())),
    }
}

/// Derives a starting shape for `--infer-shapes` from a concrete argument:
/// a tuple of integers is treated as an explicit array shape literal, any
/// other tuple or scalar is a non-array value with no interesting shape.
fn value_to_shape(value: &Value) -> Shape {
    match value {
        Value::Tuple(items) if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Int(_))) => {
            let dims = items
                .iter()
                .map(|v| match v {
                    Value::Int(i) if *i >= 0 => Dim::Known(*i as u64),
                    _ => Dim::Anything,
                })
                .collect();
            Shape::Known(dims)
        }
        _ => Shape::SCALAR,
    }
}
