//! Provenance records for CLI outputs.
//!
//! Every file the CLI writes gets a sibling `<stem>.provenance.json` naming
//! the subcommand, its parameters, the engine settings, the stridekit
//! version and the source revision. `report` prints the same record with no
//! outputs.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What a subcommand knows about the output it just wrote.
pub struct Payload {
    pub op: String,
    pub params: Value,
    /// Absent for commands that never touch an engine (`sample`).
    pub engine: Option<Value>,
}

impl Payload {
    pub fn new(op: &str, params: Value) -> Self {
        Self {
            op: op.to_string(),
            params,
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: Value) -> Self {
        self.engine = Some(engine);
        self
    }
}

#[derive(Serialize)]
pub struct Callsite<'a> {
    file: &'a str,
    line: u32,
}

/// Serialized form of a sidecar.
#[derive(Serialize)]
pub struct Record<'a> {
    code_rev: String,
    stridekit: &'static str,
    callsite: Callsite<'a>,
    op: &'a str,
    engine: Option<&'a Value>,
    params: &'a Value,
    outputs: &'a [String],
}

pub fn document<'a>(
    payload: &'a Payload,
    outputs: &'a [String],
    callsite: &'a Location<'a>,
) -> Record<'a> {
    Record {
        code_rev: current_git_rev(),
        stridekit: stridekit::VERSION,
        callsite: Callsite {
            file: callsite.file(),
            line: callsite.line(),
        },
        op: &payload.op,
        engine: payload.engine.as_ref(),
        params: &payload.params,
        outputs,
    }
}

/// Write the sidecar for `artifact` and return its path.
#[track_caller]
pub fn write_sidecar<P: AsRef<Path>>(artifact: P, payload: Payload) -> Result<PathBuf> {
    let artifact = artifact.as_ref();
    let path = provenance_path(artifact);
    crate::table::create_parent(&path)?;
    let outputs = [artifact.display().to_string()];
    let record = document(&payload, &outputs, Location::caller());
    let bytes = serde_json::to_vec_pretty(&record)?;
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(sidecar = %path.display(), op = %payload.op, "provenance written");
    Ok(path)
}

fn provenance_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map_or_else(|| "artifact".into(), |s| s.to_string_lossy().into_owned());
    artifact.with_file_name(format!("{stem}.provenance.json"))
}

/// `GIT_COMMIT` at build time, then at run time, then `git rev-parse HEAD`.
pub fn current_git_rev() -> String {
    let from_env = option_env!("GIT_COMMIT")
        .map(str::to_string)
        .or_else(|| std::env::var("GIT_COMMIT").ok())
        .filter(|rev| !rev.is_empty());
    if let Some(rev) = from_env {
        return rev;
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
