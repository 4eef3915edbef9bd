//! Isolated execution of generated parser code.
//!
//! Generated code never runs inside this process. [`ProcessSandbox`] writes
//! each parser into its own scratch directory and runs it under a separate
//! interpreter with a cleared environment, a wall-clock limit and an output
//! cap. The page goes in as JSON on stdin and the parse result comes back as
//! JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use herald_browser::WebPage;
use herald_config::{SandboxConfig, WorkspaceConfig};
use herald_core::{HeraldError, Result};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::synthesis::BoundParser;

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Run `parser` against `page` and return what its `parse` function returned.
    async fn execute(&self, parser: &BoundParser, page: &WebPage) -> Result<Value>;
}

/// File the generated segment is written to, importable as `generated_parser`.
const PARSER_FILE: &str = "generated_parser.py";
const HARNESS_FILE: &str = "harness.py";
const STDERR_LIMIT: u64 = 64 * 1024;

/// Loads the page, hands the generated `parse` function a BeautifulSoup
/// document when bs4 is installed (raw HTML otherwise), prints the result.
const HARNESS: &str = r#"import json
import os
import sys

sys.path.insert(0, os.path.dirname(os.path.abspath(__file__)))
page = json.load(sys.stdin)
try:
    from bs4 import BeautifulSoup
    document = BeautifulSoup(page["html"], "html.parser")
except ImportError:
    document = page["html"]

import generated_parser

result = generated_parser.parse(document)
json.dump(result, sys.stdout, default=str)
"#;

pub struct ProcessSandbox {
    interpreter: String,
    args: Vec<String>,
    root: PathBuf,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(interpreter: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let defaults = SandboxConfig::default();
        Self {
            interpreter: interpreter.into(),
            args: defaults.args,
            root: root.into(),
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_output_bytes: defaults.max_output_bytes,
        }
    }

    pub fn from_config(sandbox: &SandboxConfig, workspace: &WorkspaceConfig) -> Self {
        Self {
            interpreter: sandbox.interpreter.clone(),
            args: sandbox.args.clone(),
            root: workspace.root.join("parsers"),
            timeout: Duration::from_secs(sandbox.timeout_secs),
            max_output_bytes: sandbox.max_output_bytes,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self, parser: &BoundParser) -> Result<tempfile::TempDir> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", parser.namespace))
            .tempdir_in(&self.root)?;
        tokio::fs::write(dir.path().join(PARSER_FILE), &parser.source).await?;
        tokio::fs::write(dir.path().join(HARNESS_FILE), HARNESS).await?;
        Ok(dir)
    }
}

/// Keep the first `cap` bytes of `reader` and discard the rest, so a chatty
/// child never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, cap: u64, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    (&mut reader).take(cap).read_to_end(buf).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(())
}

#[async_trait]
impl CodeSandbox for ProcessSandbox {
    async fn execute(&self, parser: &BoundParser, page: &WebPage) -> Result<Value> {
        let dir = self.prepare(parser).await?;
        let input = serde_json::to_vec(&page.parser_input())?;

        info!(
            url = %parser.url,
            namespace = %parser.namespace,
            interpreter = %self.interpreter,
            "running generated parser"
        );

        let mut cmd = tokio::process::Command::new(&self.interpreter);
        cmd.args(&self.args)
            .arg(HARNESS_FILE)
            .current_dir(dir.path())
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            HeraldError::Sandbox(format!("failed to start '{}': {e}", self.interpreter))
        })?;
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => return Err(HeraldError::Sandbox("parser pipes unavailable".into())),
        };
        let limit = self.max_output_bytes;
        let stdin = child.stdin.take();
        let collect = async {
            let feed = async {
                if let Some(mut stdin) = stdin {
                    // A parser that exits without reading stdin is not an error here.
                    if let Err(e) = stdin.write_all(&input).await {
                        debug!(error = %e, "parser closed stdin early");
                    }
                }
            };
            let mut out = Vec::new();
            let mut err = Vec::new();
            let ((), read_out, read_err) = tokio::join!(
                feed,
                read_capped(stdout, limit as u64 + 1, &mut out),
                read_capped(stderr, STDERR_LIMIT, &mut err),
            );
            read_out?;
            read_err?;
            let status = child.wait().await?;
            Ok::<_, HeraldError>((status, out, err))
        };

        let (status, out, err) = tokio::time::timeout(self.timeout, collect)
            .await
            .map_err(|_| HeraldError::Timeout {
                what: format!("parser for {}", parser.url),
                secs: self.timeout.as_secs(),
            })??;

        if out.len() > limit {
            return Err(HeraldError::Sandbox(format!(
                "parser for {} wrote more than {} bytes",
                parser.url, limit
            )));
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            let tail: String = stderr
                .chars()
                .rev()
                .take(2_000)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            warn!(url = %parser.url, status = %status, "generated parser failed");
            return Err(HeraldError::Sandbox(format!(
                "parser for {} exited with {}: {}",
                parser.url,
                status,
                tail.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&out);
        Ok(serde_json::from_str(stdout.trim())
            .unwrap_or_else(|_| Value::String(stdout.trim().to_string())))
    }
}
