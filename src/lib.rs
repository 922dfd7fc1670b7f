//! yulopt is an optimising middle-end for Yul, the intermediate language of
//! the SVM stack machine.
//!
//! Source text is parsed into [`object::Object`]s, analysed, rewritten by a
//! configurable sequence of optimiser steps and lowered to SVM bytecode.
//! A dry run of code generation reports functions whose variables would be
//! out of stack reach, and a reference interpreter runs code directly so
//! rewrites can be checked against it.
//!
//! The pipeline is single threaded. Every compilation owns its tree, its
//! dialect and its analysis results, so independent compilations can run
//! on separate threads without coordination.

#![warn(clippy::too_many_lines)]

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};

use tracing::{info, level_filters::LevelFilter, subscriber::DefaultGuard, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    self,
    filter::FilterFn,
    fmt::format::FmtSpan,
    layer::{Filter, SubscriberExt},
    Layer,
};

pub mod analysis;
pub mod common;
pub mod compilability_checker;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod optimiser;
pub mod parser;
pub mod prelude;
pub mod svm;

use compilability_checker::CompilabilityChecker;
use interpreter::{Interpreter, InterpreterLimits, InterpreterResult};
use object::Object;
use optimiser::{OptimiserSuite, Step};
use parser::YulParser;
use prelude::YulString;
use svm::{
    svm_assembly::log_disassembly, CodeTransformOptions, Dialect, ObjectCompiler, SvmAssembly,
};

enum LevelOrFn {
    Level(LevelFilter),
    Fn(FilterFn),
}

impl<S> Filter<S> for LevelOrFn {
    fn enabled(
        &self,
        meta: &tracing::Metadata<'_>,
        cx: &tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        match self {
            LevelOrFn::Level(l) => tracing_subscriber::layer::Filter::enabled(l, meta, cx),
            LevelOrFn::Fn(f) => tracing_subscriber::layer::Filter::enabled(f, meta, cx),
        }
    }
}

pub fn set_log_verbosity(verbose: usize) -> Result<(DefaultGuard, WorkerGuard)> {
    let outfile =
        std::fs::File::create("output.ansi").context("While creating debug output file")?;

    let (non_blocking, g) = tracing_appender::non_blocking(outfile);

    let file_trace = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(non_blocking)
        .with_filter(match verbose {
            1 => LevelOrFn::Level(LevelFilter::DEBUG),
            n if n > 1 => LevelOrFn::Level(LevelFilter::TRACE),
            _ => LevelOrFn::Fn(tracing_subscriber::filter::filter_fn(|_| false)),
        });

    let err_trace = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(match verbose {
            n if n > 1 => LevelFilter::DEBUG,
            _ => LevelFilter::INFO,
        });

    let subscriber = tracing_subscriber::registry()
        .with(file_trace)
        .with(err_trace);

    Ok((tracing::subscriber::set_default(subscriber), g))
}

/// Parses an object, or a bare block which becomes an object named
/// `object`.
pub fn parse(source: &str, dialect: &dyn Dialect) -> Result<Object> {
    YulParser::parse_object(source, dialect).context("Failed to parse source")
}

/// Optimises the code of `object` and of every nested object.
pub fn optimize(object: &mut Object, dialect: &dyn Dialect, steps: &[Step]) -> Result<()> {
    OptimiserSuite::run(dialect, &mut object.code, &BTreeSet::new(), steps)
        .with_context(|| format!("While optimising object {}", object.name))?;
    for sub_object in object.objects_mut() {
        optimize(sub_object, dialect, steps)?;
    }
    Ok(())
}

/// Compiles `object` to bytecode, sub-objects and data included.
pub fn assemble(object: &Object, dialect: &dyn Dialect) -> Result<Vec<u8>> {
    let mut assembly = SvmAssembly::new();
    ObjectCompiler::compile(
        &mut assembly,
        object,
        dialect,
        CodeTransformOptions::default(),
    )
    .context("Failed to compile")?;
    let bytecode = assembly.finalize().context("Failed to assemble")?;
    info!("Assembled {} byte(s)", bytecode.len());
    log_disassembly(&object.name, &bytecode, Level::TRACE);
    Ok(bytecode)
}

/// Stack overshoot per function of the code of `object` itself.
pub fn check(object: &Object, dialect: &dyn Dialect) -> Result<BTreeMap<YulString, i32>> {
    CompilabilityChecker::run(dialect, &object.code)
}

/// Interprets the code of `object` with the given call data.
pub fn run(object: &Object, dialect: &dyn Dialect, calldata: &[u8]) -> Result<InterpreterResult> {
    Interpreter::run(dialect, &object.code, calldata, InterpreterLimits::default())
        .context("Failed to interpret")
}
