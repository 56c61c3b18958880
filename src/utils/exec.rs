//! External command execution utilities.
//!
//! Collaborator processes (renderer, rasterizer) receive their input on
//! stdin and are bounded by a timeout. A timed-out child is killed and the
//! failure is reported to the caller rather than aborting the run.

use regex::Regex;
use std::{
    borrow::Cow,
    ffi::OsString,
    io::{self, Read, Write},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Interval between `try_wait` polls while waiting for a child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    Empty,

    #[error("failed to execute `{0}`")]
    Spawn(String, #[source] io::Error),

    #[error("`{name}` timed out after {secs}s")]
    Timeout { name: String, secs: u64 },

    #[error("{0}")]
    Failed(String),

    #[error("I/O error while talking to `{0}`")]
    Io(String, #[source] io::Error),
}

/// Captured result of a successful run.
#[derive(Debug)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

// ============================================================================
// Command Execution
// ============================================================================

/// Run `cmd` + `args`, feed `input` to stdin, and collect stdout.
///
/// Non-zero exit status is an error carrying the (ANSI-stripped) stderr.
pub fn run_with_input(
    cmd: &[OsString],
    args: &[OsString],
    input: &[u8],
    root: Option<&Path>,
    timeout: Duration,
) -> Result<Captured, ExecError> {
    let (name, mut command) = prepare(root, cmd, args)?;
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|err| ExecError::Spawn(name.clone(), err))?;

    // Writer and readers run on their own threads so a child that fills its
    // output pipe before draining stdin cannot deadlock us.
    let stdin = child.stdin.take();
    let input = input.to_vec();
    let writer = thread::spawn(move || -> io::Result<()> {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(&input) {
                // The child may legitimately exit without reading everything.
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }
        Ok(())
    });
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = wait_timeout(&mut child, timeout).map_err(|err| ExecError::Io(name.clone(), err))?;

    let Some(status) = status else {
        child.kill().ok();
        child.wait().ok();
        return Err(ExecError::Timeout {
            name,
            secs: timeout.as_secs(),
        });
    };

    let join = |handle: thread::JoinHandle<io::Result<Vec<u8>>>| {
        handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("reader thread panicked")))
    };
    let stdout = join(stdout).map_err(|err| ExecError::Io(name.clone(), err))?;
    let stderr = join(stderr).map_err(|err| ExecError::Io(name.clone(), err))?;
    writer
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("writer thread panicked")))
        .map_err(|err| ExecError::Io(name.clone(), err))?;

    if !status.success() {
        return Err(ExecError::Failed(format_error(&name, status, &stdout, &stderr)));
    }

    Ok(Captured { stdout, stderr })
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            source.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// Poll until the child exits or `timeout` elapses (`Ok(None)`).
fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Prepare a `Command` from components.
fn prepare(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
) -> Result<(String, Command), ExecError> {
    let (program, rest) = cmd.split_first().ok_or(ExecError::Empty)?;
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(rest).args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

// ============================================================================
// Output Formatting
// ============================================================================

fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    match RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").ok()) {
        Some(re) => re.replace_all(s, ""),
        None => Cow::Borrowed(s),
    }
}

fn format_error(name: &str, status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);

    let mut msg = format!("Command `{name}` failed with {status}");
    let error_msg = strip_ansi(stderr.trim()).into_owned();
    if !error_msg.is_empty() {
        msg.push('\n');
        msg.push_str(&error_msg);
    }

    let stdout_trimmed = stdout.trim();
    if !stdout_trimmed.is_empty() {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout_trimmed);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================
