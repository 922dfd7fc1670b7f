use std::{env::args, fs};

use anyhow::{bail, Context, Result};
use getopts::Options;
use yulopt::{
    assemble, check, optimize, optimiser::{OptimiserSuite, Step}, parse, run, set_log_verbosity,
    svm::SvmDialect,
};

fn usage(prog: &str, opts: &Options) {
    let req = format!("{prog} path");
    let brief = opts.short_usage(&req);
    print!("{}", opts.usage(&brief));
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn main() -> Result<()> {
    let args: Vec<String> = args().collect();
    let prog = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("v", "verbose", "enable verbose output", "LEVEL");
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "O",
        "steps",
        "comma separated optimiser steps (default sequence if omitted)",
        "STEPS",
    );
    opts.optopt(
        "",
        "mode",
        "print, optimize, assemble, check or run (default optimize)",
        "MODE",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            usage(&prog, &opts);
            bail!("{f}")
        }
    };

    if matches.opt_present("h") {
        usage(&prog, &opts);
        return Ok(());
    }

    let verbose = matches.opt_get_default("v", 0).unwrap_or(0);
    let _guard = set_log_verbosity(verbose)?;

    let [path] = matches.free.as_slice() else {
        usage(&prog, &opts);
        bail!("Usage: {prog} path [-v LEVEL] [-O STEPS] [--mode MODE]")
    };
    let steps = match matches.opt_str("O") {
        Some(text) => Step::parse_sequence(&text)?,
        None => OptimiserSuite::DEFAULT_SEQUENCE.to_vec(),
    };

    let source = fs::read_to_string(path).context("Failed to read file")?;
    let dialect = SvmDialect::strict_assembly_for_objects();
    let mut object = parse(&source, &dialect)?;

    match matches.opt_str("mode").as_deref().unwrap_or("optimize") {
        "print" => println!("{object}"),
        "optimize" => {
            optimize(&mut object, &dialect, &steps)?;
            println!("{object}");
        }
        "assemble" => {
            optimize(&mut object, &dialect, &steps)?;
            println!("{}", hex(&assemble(&object, &dialect)?));
        }
        "check" => {
            let depths = check(&object, &dialect)?;
            if depths.is_empty() {
                println!("ok");
            }
            for (function, depth) in depths {
                let function = if function.is_empty() { "<top level>" } else { function.as_str() };
                println!("{function}: {depth}");
            }
        }
        "run" => {
            let result = run(&object, &dialect, &[])?;
            for line in &result.state.trace {
                println!("{line}");
            }
            for (key, value) in &result.state.storage {
                println!("sstore 0x{key:x} 0x{value:x}");
            }
            match result.termination {
                Some(termination) => println!("{termination}: 0x{}", hex(&result.state.return_data)),
                None => println!("finished"),
            }
        }
        mode => bail!("Unknown mode {mode:?}"),
    }
    Ok(())
}
