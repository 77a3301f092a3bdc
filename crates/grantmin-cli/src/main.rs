use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use grantmin_core::{
    reduce, reduce_with_progress, MemoOracle, Oracle, Progress, Reason, ReasonKind, Reduction,
    Status,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

#[derive(Parser)]
#[command(name = "grantmin")]
#[command(version)]
#[command(about = "Finds a minimal subset of candidate items that still passes an oracle command")]
struct Cli {
    /// File with one candidate item per line; blank lines and `#` comments are skipped.
    items: PathBuf,

    /// Kill a single oracle evaluation after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[arg(long)]
    output: Option<PathBuf>,

    /// Report each round and each reduction on stderr.
    #[arg(long)]
    progress: bool,

    /// Oracle command, given after `--`. It receives the candidate subset on
    /// stdin, one item per line; exit status 0 means the subset passes.
    #[arg(last = true, required = true, value_name = "CMD")]
    oracle: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Serialize)]
struct ResultJson {
    schema_version: String,
    tool: ToolInfo,
    invocation: Invocation,
    inputs: Vec<InputInfo>,
    status: Status,
    exit_code: i32,
    started_at: String,
    finished_at: String,
    duration_ms: u64,
    candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<Reason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minimal: Option<MinimalJson>,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    version: String,
    git_sha: String,
}

#[derive(Serialize)]
struct Invocation {
    items: String,
    oracle: Vec<String>,
    format: String,
    timeout_ms: Option<u64>,
    progress: bool,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    sha256: String,
}

#[derive(Serialize)]
struct MinimalJson {
    items: Vec<String>,
    item_count: usize,
    stats: RunStats,
}

#[derive(Serialize)]
struct RunStats {
    queries: u64,
    rounds: u64,
    reductions: u64,
    oracle_evaluations: u64,
    cache_hits: u64,
}

struct Outcome {
    status: Status,
    candidate_count: usize,
    reason: Option<Reason>,
    minimal: Option<MinimalJson>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tool error: {err}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let started_at = Utc::now();
    let timer = Instant::now();

    let outcome = execute(&cli);
    let exit_code = exit_code_for(&outcome.status);

    let finished_at = Utc::now();
    let duration_ms = timer.elapsed().as_millis() as u64;

    let result = ResultJson {
        schema_version: "0.1".to_string(),
        tool: ToolInfo {
            name: "grantmin".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: std::env::var("GRANTMIN_GIT_SHA").unwrap_or_else(|_| "UNKNOWN".to_string()),
        },
        invocation: Invocation {
            items: cli.items.to_string_lossy().to_string(),
            oracle: cli.oracle.clone(),
            format: match cli.format {
                OutputFormat::Json => "json".to_string(),
                OutputFormat::Text => "text".to_string(),
            },
            timeout_ms: cli.timeout_ms,
            progress: cli.progress,
        },
        inputs: build_inputs(&cli.items),
        status: outcome.status,
        exit_code,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        duration_ms,
        candidate_count: outcome.candidate_count,
        reason: outcome.reason,
        minimal: outcome.minimal,
    };

    match cli.format {
        OutputFormat::Json => emit_json(&result, cli.output.as_deref())?,
        OutputFormat::Text => emit_text(&result, cli.output.as_deref())?,
    }

    Ok(exit_code)
}

fn execute(cli: &Cli) -> Outcome {
    let text = match fs::read_to_string(&cli.items) {
        Ok(text) => text,
        Err(err) => {
            return Outcome {
                status: Status::Error,
                candidate_count: 0,
                reason: Some(Reason {
                    kind: ReasonKind::InvalidInput,
                    message: Some(format!("{}: {err}", cli.items.display())),
                }),
                minimal: None,
            }
        }
    };

    let items = parse_items(&text);
    let candidate_count = items.len();
    let mut oracle = MemoOracle::new(CommandOracle::new(cli.oracle.clone(), cli.timeout_ms));

    // The search assumes a passing starting point and will not detect a
    // violated precondition on its own, so check it here.
    match oracle.evaluate(&items) {
        Ok(true) => {}
        Ok(false) => {
            return Outcome {
                status: Status::Fail,
                candidate_count,
                reason: Some(Reason {
                    kind: ReasonKind::PreconditionFailed,
                    message: Some(
                        "the full candidate set does not pass the oracle command".to_string(),
                    ),
                }),
                minimal: None,
            }
        }
        Err(err) => return oracle_failure(err, candidate_count),
    }

    let result = if cli.progress {
        reduce_with_progress(items, &mut oracle, &mut StderrProgress)
    } else {
        reduce(items, &mut oracle)
    };

    match result {
        Ok(Reduction { items, stats }) => Outcome {
            status: Status::Pass,
            candidate_count,
            reason: None,
            minimal: Some(MinimalJson {
                item_count: items.len(),
                items,
                stats: RunStats {
                    queries: stats.queries,
                    rounds: stats.rounds,
                    reductions: stats.reductions,
                    oracle_evaluations: oracle.evaluations(),
                    cache_hits: oracle.cache_hits(),
                },
            }),
        },
        Err(err) => oracle_failure(err, candidate_count),
    }
}

fn oracle_failure(err: OracleCommandError, candidate_count: usize) -> Outcome {
    let (status, kind) = match err {
        OracleCommandError::Timeout { .. } => (Status::Timeout, ReasonKind::Timeout),
        OracleCommandError::Spawn { .. } | OracleCommandError::Io { .. } => {
            (Status::Error, ReasonKind::OracleFailure)
        }
    };

    Outcome {
        status,
        candidate_count,
        reason: Some(Reason {
            kind,
            message: Some(err.to_string()),
        }),
        minimal: None,
    }
}

fn parse_items(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if seen.insert(line.to_string()) {
            items.push(line.to_string());
        }
    }

    items
}

#[derive(Debug)]
enum OracleCommandError {
    Spawn {
        command: String,
        source: std::io::Error,
    },
    Io {
        command: String,
        source: std::io::Error,
    },
    Timeout {
        command: String,
        timeout_ms: u64,
    },
}

impl Display for OracleCommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleCommandError::Spawn { command, source } => {
                write!(f, "failed to spawn oracle command `{command}`: {source}")
            }
            OracleCommandError::Io { command, source } => {
                write!(f, "oracle command `{command}` failed: {source}")
            }
            OracleCommandError::Timeout {
                command,
                timeout_ms,
            } => {
                write!(
                    f,
                    "oracle command `{command}` exceeded the {timeout_ms} ms timeout"
                )
            }
        }
    }
}

impl std::error::Error for OracleCommandError {}

struct CommandOracle {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandOracle {
    fn new(command: Vec<String>, timeout_ms: Option<u64>) -> Self {
        Self {
            command,
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    fn rendered(&self) -> String {
        self.command.join(" ")
    }
}

impl Oracle<String> for CommandOracle {
    type Error = OracleCommandError;

    fn evaluate(&mut self, subset: &[String]) -> Result<bool, OracleCommandError> {
        let mut command = Command::new(&self.command[0]);
        if self.command.len() > 1 {
            command.args(&self.command[1..]);
        }
        command.stdin(Stdio::piped()).stdout(Stdio::null());

        let mut child = command.spawn().map_err(|err| OracleCommandError::Spawn {
            command: self.rendered(),
            source: err,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut payload = subset.join("\n");
            if !subset.is_empty() {
                payload.push('\n');
            }
            match stdin.write_all(payload.as_bytes()) {
                Ok(()) => {}
                // A command may exit without draining stdin; its exit status
                // still decides the answer.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
                Err(err) => {
                    child.kill().ok();
                    let _ = child.wait();
                    return Err(OracleCommandError::Io {
                        command: self.rendered(),
                        source: err,
                    });
                }
            }
        }

        let status = if let Some(timeout) = self.timeout {
            match child
                .wait_timeout(timeout)
                .map_err(|err| OracleCommandError::Io {
                    command: self.rendered(),
                    source: err,
                })? {
                Some(status) => status,
                None => {
                    child.kill().ok();
                    let _ = child.wait();
                    return Err(OracleCommandError::Timeout {
                        command: self.rendered(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        } else {
            child.wait().map_err(|err| OracleCommandError::Io {
                command: self.rendered(),
                source: err,
            })?
        };

        Ok(status.success())
    }
}

struct StderrProgress;

impl Progress<String> for StderrProgress {
    fn on_round(&mut self, working: &[String], splits: usize) {
        eprintln!("round: {} items, {} splits", working.len(), splits);
    }

    fn on_reduction(&mut self, reduced: &[String]) {
        eprintln!("reduced to {} items: {}", reduced.len(), reduced.join(" "));
    }
}

fn build_inputs(path: &Path) -> Vec<InputInfo> {
    let sha256 = compute_sha256(path).unwrap_or_else(|_| "UNKNOWN".to_string());

    vec![InputInfo {
        path: path.to_string_lossy().to_string(),
        sha256,
    }]
}

fn compute_sha256(path: &Path) -> std::io::Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn exit_code_for(status: &Status) -> i32 {
    match status {
        Status::Pass => 0,
        Status::Fail => 1,
        Status::Error => 2,
        Status::Timeout => 4,
    }
}

fn emit_json(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(result).context("serialize result json")?;
    if let Some(path) = output {
        write_atomic(path, payload.as_bytes())?;
        return Ok(());
    }

    println!("{payload}");
    Ok(())
}

fn emit_text(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let mut summary = format!(
        "status={} exit_code={} candidates={}",
        status_label(&result.status),
        result.exit_code,
        result.candidate_count
    );
    if let Some(minimal) = &result.minimal {
        summary.push_str(&format!(" minimal={}", minimal.item_count));
        for item in &minimal.items {
            summary.push('\n');
            summary.push_str(item);
        }
    }

    if let Some(path) = output {
        write_atomic(path, summary.as_bytes())?;
        return Ok(());
    }
    println!("{summary}");
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("rename {}", path.display()))?;
    Ok(())
}

fn status_label(status: &Status) -> &'static str {
    match status {
        Status::Pass => "pass",
        Status::Fail => "fail",
        Status::Error => "error",
        Status::Timeout => "timeout",
    }
}

#[cfg(test)]
mod tests {
    use super::parse_items;

    #[test]
    fn parse_items_skips_blanks_comments_and_duplicates() {
        let text = "alpha\n\n# comment\n  beta  \nalpha\ngamma\n";

        assert_eq!(parse_items(text), vec!["alpha", "beta", "gamma"]);
    }
}
