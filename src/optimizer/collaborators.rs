//! Contracts for the external tools the controller drives, plus
//! implementations that run them as child processes.

use crate::config::CollaboratorParams;
use crate::error::{ForgeError, ForgeResult};
use crate::metrics::outputs::{self, RawFileKind, RawFiles};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One synthesis run. The library must already be written at `library_path`.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub circuit: &'a str,
    pub library_path: &'a Path,
    pub output_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisOutput {
    pub output_path: PathBuf,
    pub raw_files: RawFiles,
}

/// Turns a circuit description plus a constraint library into a DNA layout.
pub trait SynthesisEngine: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> ForgeResult<SynthesisOutput>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRequest {
    pub sequence: String,
    pub target_strength: f64,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub success: bool,
    #[serde(default)]
    pub optimized_sequence: String,
    #[serde(default)]
    pub predicted_strength: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl SequenceResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            optimized_sequence: String::new(),
            predicted_strength: 0.0,
            error: Some(message.into()),
        }
    }
}

/// Proposes a new sequence for a part, aiming at a target strength in [0, 1].
pub trait SequenceOptimizer: Send + Sync {
    fn optimize(&self, request: &SequenceRequest) -> ForgeResult<SequenceResult>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn spawn_error(tool: &str, program: &str, e: std::io::Error) -> ForgeError {
    if e.kind() == ErrorKind::NotFound {
        ForgeError::collaborator(tool, format!("executable '{}' not found", program))
    } else {
        ForgeError::collaborator(tool, format!("could not start '{}': {}", program, e))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Runs `cmd` to completion or kills it once `timeout` elapses.
pub fn run_with_timeout(
    tool: &str,
    cmd: &mut Command,
    input: Option<&[u8]>,
    timeout: Duration,
) -> ForgeResult<Output> {
    let program = cmd.get_program().to_string_lossy().to_string();
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn().map_err(|e| spawn_error(tool, &program, e))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
        if let Err(e) = stdin.write_all(data) {
            debug!("{} closed its input early: {}", tool, e);
        }
    }

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            warn!("⏱️  {} exceeded {}s; killing it", tool, timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Err(ForgeError::Timeout {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("exited with {}", output.status)
}

/// Runs the synthesis tool named in the configuration.
#[derive(Debug, Clone)]
pub struct CommandSynthesis {
    params: CollaboratorParams,
}

impl CommandSynthesis {
    pub const TOOL: &'static str = "synthesis";
    pub const CIRCUIT_FILE: &'static str = "circuit.v";

    pub fn new(params: CollaboratorParams) -> Self {
        Self { params }
    }
}

impl SynthesisEngine for CommandSynthesis {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> ForgeResult<SynthesisOutput> {
        fs::create_dir_all(request.output_dir)?;
        let circuit_path = request.output_dir.join(Self::CIRCUIT_FILE);
        fs::write(&circuit_path, request.circuit)?;

        let args = self.params.render_synthesis_args(
            &circuit_path.to_string_lossy(),
            &request.library_path.to_string_lossy(),
            &request.output_dir.to_string_lossy(),
        );
        debug!("Running {} {}", self.params.synthesis_command, args.join(" "));

        let mut cmd = Command::new(&self.params.synthesis_command);
        cmd.args(&args);
        let timeout = self.params.synthesis_timeout();
        let output = run_with_timeout(Self::TOOL, &mut cmd, None, timeout)?;
        if !output.status.success() {
            return Err(ForgeError::collaborator(Self::TOOL, failure_message(&output)));
        }

        let raw_files = outputs::discover(request.output_dir);
        for kind in [RawFileKind::CircuitScore, RawFileKind::ActivityTable] {
            if !raw_files.contains_key(&kind) {
                warn!("⚠️  Synthesis finished without a {} table", kind);
            }
        }
        Ok(SynthesisOutput {
            output_path: request.output_dir.to_path_buf(),
            raw_files,
        })
    }
}

/// Runs a sequence optimizer that reads a JSON request on stdin and answers
/// with a JSON result on stdout.
#[derive(Debug, Clone)]
pub struct CommandSequenceOptimizer {
    program: String,
    timeout: Duration,
}

impl CommandSequenceOptimizer {
    pub const TOOL: &'static str = "sequence optimizer";

    pub fn new(params: &CollaboratorParams) -> Self {
        Self {
            program: params.sequence_optimizer_command.clone(),
            timeout: params.sequence_timeout(),
        }
    }
}

impl SequenceOptimizer for CommandSequenceOptimizer {
    fn optimize(&self, request: &SequenceRequest) -> ForgeResult<SequenceResult> {
        let payload = serde_json::to_vec(request)?;
        let mut cmd = Command::new(&self.program);
        let output = run_with_timeout(Self::TOOL, &mut cmd, Some(&payload), self.timeout)?;
        if !output.status.success() {
            return Err(ForgeError::collaborator(Self::TOOL, failure_message(&output)));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| {
            ForgeError::collaborator(Self::TOOL, format!("unreadable reply: {}", e))
        })
    }
}
