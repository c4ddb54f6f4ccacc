use crate::diag::DiagnosableError;
use thiserror::Error;

/// Fatal errors that can terminate a simulation run.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("failed to open trace file {path}")]
    TraceOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no cache policy registered under '{0}'")]
    UnknownPolicy(String),

    #[error("invalid value for option '{key}': {value}")]
    InvalidOption { key: String, value: String },

    #[error("trace sanity check failed: {0}")]
    SanityCheck(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DiagnosableError for SimulationError {
    fn diagnose(&self) -> Vec<String> {
        match self {
            SimulationError::TraceOpen { path, .. } => vec![format!(
                "check that '{}' exists and is readable by this process",
                path
            )],
            SimulationError::UnknownPolicy(name) => vec![format!(
                "'{}' is not registered; see the policy registry for available names",
                name
            )],
            SimulationError::InvalidOption { key, .. } => {
                vec![format!("'{}' could not be parsed; check its expected type", key)]
            }
            SimulationError::SanityCheck(_) => vec![
                "pass enable_trace_format_check=0 to skip this check if the trace is intentionally irregular".into(),
            ],
            _ => vec![],
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
