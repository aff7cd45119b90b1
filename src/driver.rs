//! Driver for the Element compiler.
use crate::cmdline::{Opts, Target};
use element_ir::{
    intrinsics, CompilationContext, CompiledFunction, CompilerMessage, ExprRef,
    MessageCode, Printer, Trace, Value,
};
use element_opt::{passes::ConstantFolding, traversal::Named};
use element_utils::{ElementResult, Error};
use itertools::Itertools;
use std::io::Write;

/// A compiled target after optimization.
#[derive(Debug)]
pub struct Output {
    pub name: String,
    /// Number of inputs the host supplies.
    pub inputs: usize,
    pub value: Value,
    /// Flat representation, when the value folded to constants.
    pub serialized: Option<Vec<f32>>,
}

/// Run the compiler from the command line.
pub fn run_compiler() -> ElementResult<()> {
    let opts = Opts::get_opts()?;

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let out = &mut opts.output.get_write()?;

    // list the available intrinsics when --list-intrinsics is enabled
    if opts.list_intrinsics {
        for name in intrinsics::names() {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    let mut ctx = CompilationContext::from_input(opts.compilation_input())?;
    if opts.log_json {
        ctx.set_log_callback(Box::new(|message: &CompilerMessage| {
            match serde_json::to_string(message) {
                Ok(json) => eprintln!("{json}"),
                Err(err) => log::error!("Failed to serialize message: {err}"),
            }
        }));
    }

    let targets = opts.targets();
    if targets.is_empty() {
        return Err(Error::misc(
            "nothing to compile: pass --expression or --function",
        ));
    }

    ctx.validate()?;
    let compiled = compile(&mut ctx, &targets)?;
    if ctx.input().debug {
        writeln!(out, "# before {}", ConstantFolding::name())?;
        write_values(&ctx, compiled.iter().map(|c| (c.name.as_str(), &c.value)), out)?;
        writeln!(out)?;
    }
    let outputs = optimize(&mut ctx, compiled)?;
    write_outputs(&ctx, &outputs, out)?;
    out.flush()?;

    if ctx.has_errors() {
        return Err(Error::misc(format!(
            "compilation failed with {} error(s)",
            ctx.error_count()
        )));
    }
    Ok(())
}

/// Resolve every target. Failures are reported through the context and
/// leave an error value in place of the target.
pub fn compile(
    ctx: &mut CompilationContext,
    targets: &[Target],
) -> ElementResult<Vec<CompiledFunction>> {
    targets
        .iter()
        .map(|target| match target {
            Target::Function(name) => ctx.compile_function(name),
            Target::Expression(text) => Ok(CompiledFunction {
                name: text.clone(),
                inputs: 0,
                value: ctx.compile_expression(text)?,
            }),
        })
        .collect()
}

/// Optimize every compiled value in one run of constant folding and
/// serialize the ones that fold to constants. A target without any graph
/// form is reported as a serialization error.
pub fn optimize(
    ctx: &mut CompilationContext,
    compiled: Vec<CompiledFunction>,
) -> ElementResult<Vec<Output>> {
    let mut folding = ConstantFolding::default();
    let mut outputs = Vec::with_capacity(compiled.len());
    for CompiledFunction {
        name,
        inputs,
        value,
    } in compiled
    {
        let value = folding.optimize_value(ctx.pool_mut(), &value)?;
        log::debug!("{name}: {} cached expressions", folding.cached());
        let serialized = serialize(ctx, &name, &value)?;
        outputs.push(Output {
            name,
            inputs,
            value,
            serialized,
        });
    }
    Ok(outputs)
}

fn serialize(
    ctx: &mut CompilationContext,
    name: &str,
    value: &Value,
) -> ElementResult<Option<Vec<f32>>> {
    if value.is_error() {
        return Ok(None);
    }
    if value.flatten().is_none() {
        let desc = ctx.describe(value);
        ctx.report(
            MessageCode::SerializationError,
            format!("'{name}' is {desc} and has no serialized form"),
            &Trace::empty(),
        )?;
        return Ok(None);
    }
    let Some(size) = value.serialized_size(ctx.pool()) else {
        return Ok(None);
    };
    let mut buffer = Vec::with_capacity(size);
    let mut position = 0;
    if !value.serialize(ctx.pool(), &mut buffer, &mut position) {
        return Err(Error::internal(format!(
            "'{name}' reported a serialized size but could not be serialized"
        )));
    }
    Ok(Some(buffer))
}

/// Print the graph of every output followed by the serialized values.
pub fn write_outputs<F: Write>(
    ctx: &CompilationContext,
    outputs: &[Output],
    out: &mut F,
) -> ElementResult<()> {
    write_values(ctx, outputs.iter().map(|o| (o.name.as_str(), &o.value)), out)?;
    for output in outputs {
        if let Some(values) = &output.serialized {
            writeln!(out, "{} => [{}]", output.name, values.iter().join(", "))?;
        } else if output.inputs > 0 {
            writeln!(out, "{} takes {} input(s)", output.name, output.inputs)?;
        }
    }
    Ok(())
}

fn write_values<'a, F: Write>(
    ctx: &CompilationContext,
    values: impl Iterator<Item = (&'a str, &'a Value)>,
    out: &mut F,
) -> ElementResult<()> {
    let mut named = Vec::new();
    for (name, value) in values {
        leaves(ctx, name.to_string(), value, &mut named);
    }
    Printer::write_graph(ctx.pool(), &named, out)?;
    Ok(())
}

/// Name every expression inside `value`. Fields of instances are named by
/// their path from the target.
fn leaves(
    ctx: &CompilationContext,
    name: String,
    value: &Value,
    named: &mut Vec<(String, ExprRef)>,
) {
    match value {
        Value::Num(e) | Value::Bool(e) => named.push((name, *e)),
        Value::Instance(instance) => {
            for (field, value) in instance.fields() {
                leaves(ctx, format!("{name}.{field}"), value, named);
            }
        }
        Value::Error => log::debug!("{name} failed to compile"),
        other => log::debug!("{name} is {}", ctx.describe(other)),
    }
}
