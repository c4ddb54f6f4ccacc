use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use cachesim::diag::DiagnosableError;
use cachesim::log;

#[derive(Debug, StructOpt)]
#[structopt(name = "cachesim", about = "Trace-driven web-object cache simulator")]
struct Opt {
    /// One or more trace files to replay, merged by timestamp.
    #[structopt(required = true)]
    trace_files: Vec<String>,

    /// Cache policy to simulate (e.g. LRU, FIFO).
    #[structopt(long = "cache-type", short = "t")]
    cache_type: String,

    /// Cache capacity in bytes.
    #[structopt(long = "cache-size", short = "s")]
    cache_size: u64,

    /// Harness or policy option as key=value; may be repeated.
    #[structopt(long = "set")]
    options: Vec<String>,

    /// Write the result document here instead of stdout.
    #[structopt(long = "output", short = "o")]
    output: Option<PathBuf>,
}

fn parse_options(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("option '{}' is not in key=value form", entry))?;
        options.insert(key.to_string(), value.to_string());
    }
    Ok(options)
}

fn main_try() -> Result<()> {
    let opt = Opt::from_args();
    let options = parse_options(&opt.options)?;

    let result = cachesim::run_simulation(&opt.trace_files, &opt.cache_type, opt.cache_size, options)
        .map_err(anyhow::Error::from)
        .context("simulation failed")?;

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result document")?;

    match opt.output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
            log::status("Wrote", format!("result document to {}", path.display()));
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn main() {
    if let Err(e) = main_try() {
        log::err(e.to_string());
        if let Some(sim_err) = e.downcast_ref::<cachesim::SimulationError>() {
            for hint in sim_err.diagnose() {
                log::hint(hint);
            }
        }
        std::process::exit(1);
    }
}
