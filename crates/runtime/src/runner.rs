use crate::preprocess::{class_name_for, wrap_sketch};
use crate::toolchain::{Toolchain, ToolchainLocator, ToolchainMode};
use crate::{Result, RuntimeError};
use entropic_protocol::{OutputChannel, SessionEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(2000);
pub const BUILD_DIR_NAME: &str = "entropic";

const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Receives every output line and the final exit event of a run.
pub type EventSink = mpsc::UnboundedSender<SessionEvent>;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Generated Java lands in `<build_dir>/<ClassName>/`.
    pub build_dir: PathBuf,
    /// Time between SIGTERM and a forced kill.
    pub stop_grace: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            build_dir: std::env::temp_dir().join(BUILD_DIR_NAME),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// Returned once the sketch process has been spawned.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunStarted {
    pub class_name: String,
    pub java_file: PathBuf,
    pub mode: ToolchainMode,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stopped: bool,
}

impl From<RunOutcome> for SessionEvent {
    fn from(outcome: RunOutcome) -> Self {
        SessionEvent::SketchExited {
            exit_code: outcome.exit_code,
            success: outcome.success,
            stopped: outcome.stopped,
        }
    }
}

struct ActiveRun {
    class_name: String,
    stop_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<RunOutcome>,
}

impl ActiveRun {
    fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    async fn stop(mut self) -> Option<RunOutcome> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.supervisor.await.ok()
    }
}

/// Owns the single sketch process. Starting a run terminates the previous
/// one and waits for it to exit before anything new is spawned.
pub struct SketchRunner {
    locator: ToolchainLocator,
    config: RunConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl SketchRunner {
    pub fn new(locator: ToolchainLocator, config: RunConfig) -> Self {
        Self {
            locator,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn locator(&self) -> &ToolchainLocator {
        &self.locator
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.is_finished())
    }

    /// Wraps, compiles and launches `code`. Output and the final
    /// `sketch_exited` event go to `sink`; compiler output is streamed there
    /// too, before any error is returned.
    pub async fn run(&self, code: &str, sketch_name: &str, sink: EventSink) -> Result<RunStarted> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            if !previous.is_finished() {
                log::info!("Stopping {} before starting a new run", previous.class_name);
            }
            previous.stop().await;
        }

        let toolchain = self.locator.locate().ok_or_else(|| {
            emit(
                &sink,
                OutputChannel::Stderr,
                "❌ Processing not found. Please ensure Processing is installed.",
            );
            RuntimeError::ToolchainMissing(format!(
                "no JDK with Processing jars under {} or the system install roots",
                self.locator.resources_dir().display()
            ))
        })?;
        match toolchain.mode {
            ToolchainMode::Bundled => {
                emit(&sink, OutputChannel::Stdout, "✓ Using bundled Processing runtime");
            }
            ToolchainMode::System => emit(
                &sink,
                OutputChannel::Stdout,
                &format!("✓ Using system Processing: {}", toolchain.base.display()),
            ),
        }

        let class_name = class_name_for(sketch_name);
        let work_dir = self.config.build_dir.join(&class_name);
        tokio::fs::create_dir_all(&work_dir).await?;
        let java_file = work_dir.join(format!("{class_name}.java"));
        tokio::fs::write(&java_file, wrap_sketch(code, &class_name)).await?;
        emit(&sink, OutputChannel::Stdout, "✓ Preprocessing completed");

        match toolchain.javac.as_deref().filter(|javac| javac.is_file()) {
            Some(javac) => compile(javac, &toolchain, &work_dir, &java_file, &sink).await?,
            None => emit(
                &sink,
                OutputChannel::Stdout,
                "⚠️ javac not found, attempting direct execution...",
            ),
        }

        emit(&sink, OutputChannel::Stdout, "🚀 Launching sketch...");
        let mut child = Command::new(&toolchain.java)
            .arg("-cp")
            .arg(toolchain.classpath_with(&work_dir)?)
            .arg(&class_name)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                emit(
                    &sink,
                    OutputChannel::Stderr,
                    &format!("❌ Runtime error: {err}"),
                );
                RuntimeError::RuntimeFailure(format!(
                    "failed to launch {}: {err}",
                    toolchain.java.display()
                ))
            })?;

        let pid = child.id();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, OutputChannel::Stdout, sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, OutputChannel::Stderr, sink.clone()));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(
            child,
            stop_rx,
            self.config.stop_grace,
            readers,
            sink,
        ));
        log::info!("Started sketch {class_name} (pid {pid:?})");
        *active = Some(ActiveRun {
            class_name: class_name.clone(),
            stop_tx: Some(stop_tx),
            supervisor,
        });

        Ok(RunStarted {
            class_name,
            java_file,
            mode: toolchain.mode,
            pid,
        })
    }

    /// Terminates the active run. Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(run) if !run.is_finished() => {
                log::info!("Stopping sketch {}", run.class_name);
                run.stop().await;
                true
            }
            Some(run) => {
                run.stop().await;
                false
            }
            None => false,
        }
    }
}

async fn compile(
    javac: &Path,
    toolchain: &Toolchain,
    work_dir: &Path,
    java_file: &Path,
    sink: &EventSink,
) -> Result<()> {
    emit(sink, OutputChannel::Stdout, "⚙️ Compiling...");
    let mut child = Command::new(javac)
        .arg("-encoding")
        .arg("UTF-8")
        .arg("-cp")
        .arg(toolchain.classpath()?)
        .arg("-d")
        .arg(work_dir)
        .arg(java_file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| {
            RuntimeError::RuntimeFailure(format!("failed to launch {}: {err}", javac.display()))
        })?;

    let stdout_reader = child
        .stdout
        .take()
        .map(|stdout| forward_lines(stdout, OutputChannel::Stdout, sink.clone()));
    let mut diagnostics = String::new();
    if let Some(stderr) = child.stderr.take() {
        let mut reader = BufReader::new(stderr);
        while let Some(line) = read_line_lossy(&mut reader).await? {
            emit(sink, OutputChannel::Stderr, &line);
            diagnostics.push_str(&line);
            diagnostics.push('\n');
        }
    }
    let status = child.wait().await?;
    if let Some(reader) = stdout_reader {
        let _ = reader.await;
    }

    if !status.success() {
        let exit_code = status.code();
        emit(
            sink,
            OutputChannel::Stderr,
            &match exit_code {
                Some(code) => format!("❌ Compilation failed (exit code {code})"),
                None => "❌ Compilation failed".to_string(),
            },
        );
        return Err(RuntimeError::CompileFailure {
            exit_code,
            stderr: diagnostics,
        });
    }
    emit(sink, OutputChannel::Stdout, "✓ Compilation succeeded");
    Ok(())
}

async fn supervise(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    grace: Duration,
    readers: Vec<JoinHandle<()>>,
    sink: EventSink,
) -> RunOutcome {
    let mut stopped = false;
    // A dropped sender (runner gone) also counts as a stop request.
    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_rx => {
            stopped = true;
            terminate(&mut child, grace).await
        }
    };

    for reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            log::debug!("Sketch output reader still open after exit");
        }
    }

    let outcome = match status {
        Ok(status) => outcome_for(status, stopped),
        Err(err) => {
            emit(&sink, OutputChannel::Stderr, &format!("❌ Runtime error: {err}"));
            RunOutcome {
                exit_code: None,
                success: false,
                stopped,
            }
        }
    };
    if !stopped {
        let message = match outcome.exit_code {
            Some(0) => "✓ Sketch finished".to_string(),
            Some(code) => format!("Sketch exited with code {code}"),
            None => "Sketch terminated by a signal".to_string(),
        };
        emit(&sink, OutputChannel::Stdout, &message);
    }
    log::info!(
        "Sketch exited (code {:?}, stopped {})",
        outcome.exit_code,
        outcome.stopped
    );
    let _ = sink.send(outcome.into());
    outcome
}

fn outcome_for(status: ExitStatus, stopped: bool) -> RunOutcome {
    RunOutcome {
        exit_code: status.code(),
        success: status.success() && !stopped,
        stopped,
    }
}

/// SIGTERM, then a forced kill once `grace` elapses. Non-unix platforms kill directly.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        unsafe {
            let _ = libc::kill(pid, libc::SIGTERM);
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => return status,
            Err(_) => log::warn!("Sketch pid {pid} ignored SIGTERM for {grace:?}; killing"),
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

fn forward_lines<R>(reader: R, channel: OutputChannel, sink: EventSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            match read_line_lossy(&mut reader).await {
                Ok(Some(text)) => {
                    if sink.send(SessionEvent::SketchOutput { channel, text }).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    log::debug!("Sketch output stream closed: {err}");
                    break;
                }
            }
        }
    })
}

/// One line without its terminator; invalid UTF-8 is replaced rather than fatal.
async fn read_line_lossy<R>(reader: &mut BufReader<R>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

fn emit(sink: &EventSink, channel: OutputChannel, text: &str) {
    let _ = sink.send(SessionEvent::SketchOutput {
        channel,
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stopped_runs_never_count_as_success() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let clean = ExitStatus::from_raw(0);
            assert_eq!(
                outcome_for(clean, true),
                RunOutcome {
                    exit_code: Some(0),
                    success: false,
                    stopped: true
                }
            );
            assert!(outcome_for(clean, false).success);
        }
    }

    #[test]
    fn outcome_converts_to_exit_event() {
        let event: SessionEvent = RunOutcome {
            exit_code: Some(3),
            success: false,
            stopped: false,
        }
        .into();
        assert_eq!(
            event,
            SessionEvent::SketchExited {
                exit_code: Some(3),
                success: false,
                stopped: false
            }
        );
    }

    #[tokio::test]
    async fn missing_toolchain_is_reported_before_anything_runs() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let runner = SketchRunner::new(
            ToolchainLocator::new(dir.path().join("resources"), Vec::new()),
            RunConfig {
                build_dir: dir.path().join("build"),
                stop_grace: Duration::from_millis(50),
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = runner
            .run("void draw() {}", "Dots", tx)
            .await
            .expect_err("no toolchain");
        assert!(matches!(err, RuntimeError::ToolchainMissing(_)));
        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::SketchOutput {
                channel: OutputChannel::Stderr,
                ..
            })
        ));
        assert!(!dir.path().join("build").exists());
        assert!(!runner.stop().await);
    }
}
