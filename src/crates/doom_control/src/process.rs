//! Engine Link that runs the engine as a child process.
//!
//! The child is launched with command-line options derived from the
//! [`GameConfig`], announces readiness on stdout and is then driven with the
//! line protocol from [`crate::protocol`]. Everything the engine prints on
//! stderr (and any non-protocol stdout line) is kept in a log buffer.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{EngineError, EngineResult};
use crate::link::{EngineLink, EngineVariables, Frame};
use crate::protocol::{encode_line, EngineReply, EngineRequest, FramePayload, READY_LINE};
use crate::registry::ButtonBuffer;

/// Origin stream for captured log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Single captured log line with its source.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub stream: LogStream,
    pub line: String,
}

/// Process-level settings that are not part of the game configuration.
#[derive(Debug, Clone)]
pub struct ProcessLinkConfig {
    /// Upper bound on how long to wait for the ready line.
    pub startup_timeout: Duration,
    /// Watchdog for every request; an engine silent for longer is reported unresponsive.
    pub reply_timeout: Duration,
    /// How long a graceful shutdown may take before the child is killed.
    pub shutdown_grace: Duration,
    /// Extra environment variables applied to the child process.
    pub env: BTreeMap<String, String>,
    /// Optional working directory override for the child process.
    pub working_directory: Option<PathBuf>,
}

impl Default for ProcessLinkConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
            env: BTreeMap::new(),
            working_directory: None,
        }
    }
}

impl ProcessLinkConfig {
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: mpsc::Receiver<String>,
    readers: Vec<thread::JoinHandle<()>>,
}

/// Engine Link backed by a child process.
pub struct ProcessLink {
    options: ProcessLinkConfig,
    process: Option<EngineProcess>,
    log_buffer: Arc<Mutex<Vec<LogLine>>>,
    variables: EngineVariables,
    frame: Option<Frame>,
    generation: u64,
}

impl ProcessLink {
    pub fn new(options: ProcessLinkConfig) -> Self {
        Self {
            options,
            process: None,
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            variables: EngineVariables::default(),
            frame: None,
            generation: 0,
        }
    }

    /// All captured log lines across streams.
    pub fn logs(&self) -> Vec<LogLine> {
        self.log_buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    fn spawn(&mut self, config: &GameConfig) -> EngineResult<()> {
        let mut cmd = Command::new(&config.doom_game_path);
        cmd.args(engine_args(config));
        if let Some(dir) = &self.options.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.options.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| EngineError::start(format!("{}: {err}", config.doom_game_path.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::start("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::start("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::start("failed to capture stderr"))?;

        let (reply_tx, reply_rx) = mpsc::channel();
        let readers = vec![
            spawn_stdout_reader(stdout, reply_tx),
            spawn_stderr_reader(stderr, self.log_buffer.clone()),
        ];

        let mut process = EngineProcess {
            child,
            stdin: Some(stdin),
            replies: reply_rx,
            readers,
        };
        if let Err(err) = wait_for_ready(&mut process, &self.log_buffer, self.options.startup_timeout) {
            terminate(process, Duration::ZERO);
            return Err(err);
        }
        self.process = Some(process);
        Ok(())
    }

    fn request(&mut self, request: &EngineRequest) -> EngineResult<EngineReply> {
        let timeout = self.options.reply_timeout;
        let process = self.process.as_mut().ok_or(EngineError::NotStarted)?;

        let line = encode_line(request)?;
        let written = match process.stdin.as_mut() {
            Some(stdin) => stdin
                .write_all(line.as_bytes())
                .and_then(|()| stdin.flush()),
            None => return Err(EngineError::ConnectionClosed),
        };
        if let Err(err) = written {
            if let Some(status) = process.child.try_wait()? {
                return Err(EngineError::Exited(status));
            }
            return Err(EngineError::Io(err));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match process.replies.recv_timeout(remaining) {
                Ok(line) => {
                    if !line.starts_with('{') {
                        push_log(&self.log_buffer, LogStream::Stdout, line);
                        continue;
                    }
                    return match serde_json::from_str::<EngineReply>(&line)? {
                        EngineReply::Error { message } => Err(EngineError::unexpected(message)),
                        reply => Ok(reply),
                    };
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Some(status) = process.child.try_wait()? {
                        return Err(EngineError::Exited(status));
                    }
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    // Give the child a moment to be reaped so the exit status is reported.
                    thread::sleep(Duration::from_millis(20));
                    if let Some(status) = process.child.try_wait()? {
                        return Err(EngineError::Exited(status));
                    }
                    return Err(EngineError::ConnectionClosed);
                }
            }
        }

        // A late reply would be read as the answer to the next request, so the
        // engine is not reused once the watchdog fires.
        warn!(timeout = ?timeout, "engine_unresponsive_killed");
        if let Some(hung) = self.process.take() {
            terminate(hung, Duration::ZERO);
        }
        Err(EngineError::Unresponsive(timeout))
    }

    fn expect_ok(&mut self, request: &EngineRequest) -> EngineResult<()> {
        match self.request(request)? {
            EngineReply::Ok => Ok(()),
            other => Err(EngineError::unexpected(format!(
                "expected ok, got {other:?}"
            ))),
        }
    }

    fn expect_state(&mut self, request: &EngineRequest) -> EngineResult<()> {
        match self.request(request)? {
            EngineReply::State { variables, frame } => {
                self.variables = variables;
                if let Some(payload) = frame {
                    self.store_frame(payload);
                }
                Ok(())
            }
            other => Err(EngineError::unexpected(format!(
                "expected state, got {other:?}"
            ))),
        }
    }

    fn store_frame(&mut self, payload: FramePayload) {
        self.generation += 1;
        self.frame = Some(Frame::new(
            payload.data,
            payload.width,
            payload.height,
            payload.format,
            self.generation,
        ));
    }
}

impl EngineLink for ProcessLink {
    fn start(&mut self, config: &GameConfig) -> EngineResult<()> {
        self.shutdown();
        self.variables = EngineVariables::default();
        self.frame = None;

        self.spawn(config)?;
        info!(binary = %config.doom_game_path.display(), "engine_process_started");
        self.expect_state(&EngineRequest::Advance {
            tics: 0,
            render: true,
        })
    }

    fn new_episode(&mut self, seed: Option<u32>) -> EngineResult<()> {
        self.expect_state(&EngineRequest::NewEpisode { seed })
    }

    fn write_action(&mut self, buttons: &ButtonBuffer) -> EngineResult<()> {
        self.expect_ok(&EngineRequest::SetButtons {
            values: buttons.to_vec(),
        })
    }

    fn advance(&mut self, tics: u32, render: bool) -> EngineResult<()> {
        self.expect_state(&EngineRequest::Advance { tics, render })
    }

    fn read_variables(&self) -> EngineVariables {
        self.variables.clone()
    }

    fn read_frame(&self) -> Option<Frame> {
        self.frame.clone()
    }

    fn send_command(&mut self, command: &str) -> EngineResult<()> {
        self.expect_ok(&EngineRequest::Command {
            text: command.to_string(),
        })
    }

    fn is_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn shutdown(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        if let Some(stdin) = process.stdin.as_mut() {
            if let Ok(line) = encode_line(&EngineRequest::Shutdown) {
                let _ = stdin.write_all(line.as_bytes());
                let _ = stdin.flush();
            }
        }
        terminate(process, self.options.shutdown_grace);
        info!("engine_process_stopped");
    }
}

impl Drop for ProcessLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Command-line options understood by the engine for a configuration.
pub fn engine_args(config: &GameConfig) -> Vec<String> {
    let (width, height) = config.screen_dimensions();
    let mut args = vec![
        "-iwad".to_string(),
        config.doom_iwad_path.display().to_string(),
    ];
    if let Some(path) = &config.doom_file_path {
        args.push("-file".to_string());
        args.push(path.display().to_string());
    }
    if let Some(path) = &config.doom_config_path {
        args.push("-config".to_string());
        args.push(path.display().to_string());
    }
    args.push("+map".to_string());
    args.push(config.doom_map.clone());
    args.push("-skill".to_string());
    args.push(config.doom_skill.to_string());
    if let Some(seed) = config.seed {
        args.push("-seed".to_string());
        args.push(seed.to_string());
    }
    args.push("-width".to_string());
    args.push(width.to_string());
    args.push("-height".to_string());
    args.push(height.to_string());
    args.push("+screen_format".to_string());
    args.push(wire_name(&config.screen_format));
    args.push("+mode".to_string());
    args.push(wire_name(&config.mode));

    let toggles = [
        ("+render_hud", config.render.hud),
        ("+render_weapon", config.render.weapon),
        ("+render_crosshair", config.render.crosshair),
        ("+render_decals", config.render.decals),
        ("+render_particles", config.render.particles),
        ("+window_visible", config.window_visible),
        ("+console", config.console_enabled),
    ];
    for (flag, enabled) in toggles {
        args.push(flag.to_string());
        args.push(if enabled { "1" } else { "0" }.to_string());
    }

    args.extend(config.custom_args.iter().cloned());
    args
}

fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn push_log(buffer: &Arc<Mutex<Vec<LogLine>>>, stream: LogStream, line: String) {
    if let Ok(mut guard) = buffer.lock() {
        guard.push(LogLine { stream, line });
    }
}

fn spawn_stdout_reader<R: std::io::Read + Send + 'static>(
    reader: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let buf_reader = BufReader::new(reader);
        for line in buf_reader.lines().map_while(Result::ok) {
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
        }
    })
}

fn spawn_stderr_reader<R: std::io::Read + Send + 'static>(
    reader: R,
    buffer: Arc<Mutex<Vec<LogLine>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let buf_reader = BufReader::new(reader);
        for line in buf_reader.lines().map_while(Result::ok) {
            let line = line.trim().to_string();
            debug!(line = %line, "engine_stderr");
            push_log(&buffer, LogStream::Stderr, line);
        }
    })
}

fn wait_for_ready(
    process: &mut EngineProcess,
    log_buffer: &Arc<Mutex<Vec<LogLine>>>,
    timeout: Duration,
) -> EngineResult<()> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = process.child.try_wait()? {
            return Err(EngineError::Exited(status));
        }

        match process.replies.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => {
                if line.eq_ignore_ascii_case(READY_LINE) {
                    return Ok(());
                }
                push_log(log_buffer, LogStream::Stdout, line);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(status) = process.child.try_wait()? {
        return Err(EngineError::Exited(status));
    }
    Err(EngineError::StartupTimeout(timeout))
}

fn terminate(mut process: EngineProcess, grace: Duration) {
    // Closing stdin lets a well-behaved engine notice the session is over.
    process.stdin.take();

    let start = Instant::now();
    let mut exited = false;
    while start.elapsed() < grace {
        if let Ok(Some(_status)) = process.child.try_wait() {
            exited = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    if !exited {
        // Force terminate if graceful shutdown did not complete.
        if process.child.kill().is_err() {
            warn!("engine_kill_failed");
        }
        let _ = process.child.wait();
    }

    for handle in process.readers.drain(..) {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defines::{Mode, ScreenFormat, ScreenResolution};

    #[test]
    fn args_carry_resolved_options() {
        let config = GameConfig::new("engine", "/wads/doom2.wad")
            .with_scenario_path("/wads/basic.wad")
            .with_map("map02")
            .with_seed(9)
            .with_screen(ScreenResolution::Res160x120, ScreenFormat::Gray8)
            .with_mode(Mode::AsyncPlayer)
            .with_arg("+sv_cheats")
            .with_arg("1");

        let args = engine_args(&config);
        let joined = args.join(" ");
        assert!(joined.starts_with("-iwad /wads/doom2.wad -file /wads/basic.wad"));
        assert!(joined.contains("+map map02"));
        assert!(joined.contains("-seed 9"));
        assert!(joined.contains("-width 160 -height 120"));
        assert!(joined.contains("+screen_format GRAY8"));
        assert!(joined.contains("+mode ASYNC_PLAYER"));
        assert!(joined.contains("+render_crosshair 0"));
        assert!(joined.ends_with("+sv_cheats 1"));
    }

    #[test]
    fn missing_binary_fails_to_start() {
        let mut link = ProcessLink::new(ProcessLinkConfig::default());
        let config = GameConfig::new("/definitely/not/an/engine", "doom2.wad");
        let err = link.start(&config).unwrap_err();
        assert!(matches!(err, EngineError::Start(_)));
        assert!(!link.is_alive());
    }

    #[test]
    fn requests_before_start_report_not_started() {
        let mut link = ProcessLink::new(ProcessLinkConfig::default());
        assert!(matches!(
            link.advance(1, false),
            Err(EngineError::NotStarted)
        ));
        link.shutdown();
    }
}
