//! Session on the local machine, backed by child processes

use super::{AccessMode, CommandResult, Session, LOCALHOST};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration, Instant};
use tracing::debug;

/// Shell used to interpret commands
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellConfig {
    pub fn posix() -> Self {
        Self {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }

    pub fn powershell() -> Self {
        Self {
            program: "powershell.exe".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
            ],
        }
    }

    pub fn is_powershell(&self) -> bool {
        let program = self.program.to_ascii_lowercase();
        program.contains("powershell") || program.contains("pwsh")
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self::powershell()
        } else {
            Self::posix()
        }
    }
}

/// A [`Session`] that runs everything on this machine
#[derive(Debug, Clone)]
pub struct LocalSession {
    shell: ShellConfig,
    working_directory: Option<PathBuf>,
    workspace: Option<PathBuf>,
    /// Loaded modules as (name, source), imported ahead of each command
    modules: Arc<Mutex<Vec<(String, String)>>>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self {
            shell: ShellConfig::default(),
            working_directory: None,
            workspace: None,
            modules: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_working_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_workspace<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.workspace = Some(dir.into());
        self
    }

    /// `command` preceded by an import of every loaded module
    fn script(&self, command: &str) -> String {
        let modules = self.modules.lock();
        let mut script = String::new();
        for (name, source) in modules.iter() {
            script.push_str(&format!(
                "New-Module -Name {} -ScriptBlock {{\n{}\n}} | Import-Module; ",
                name, source
            ));
        }
        script.push_str(command);
        script
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for LocalSession {
    fn hostname(&self) -> &str {
        LOCALHOST
    }

    fn delimiter(&self) -> char {
        std::path::MAIN_SEPARATOR
    }

    fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    async fn temp_dir(&self) -> Result<String> {
        Ok(std::env::temp_dir().to_string_lossy().into_owned())
    }

    async fn load_module(&self, name: &str, source: &str) -> Result<()> {
        if !self.shell.is_powershell() {
            return Err(Error::invalid_argument(format!(
                "{} cannot load PowerShell module {}",
                self.shell.program, name
            )));
        }
        let mut modules = self.modules.lock();
        modules.retain(|(loaded, _)| loaded != name);
        modules.push((name.to_string(), source.to_string()));
        debug!(module = name, "module registered");
        Ok(())
    }

    async fn execute(&self, command: &str, budget: Duration) -> Result<CommandResult> {
        let start_time = Instant::now();

        let mut cmd = Command::new(&self.shell.program);
        cmd.args(&self.shell.args).arg(self.script(command));

        if let Some(working_dir) = &self.working_directory {
            cmd.current_dir(working_dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Error::transport(command, e))?;
        let stdout = child.stdout.take().ok_or("Failed to capture stdout")?;
        let stderr = child.stderr.take().ok_or("Failed to capture stderr")?;

        let mut stdout_reader = BufReader::new(stdout);
        let mut stderr_reader = BufReader::new(stderr);
        let mut stdout_text = String::new();
        let mut stderr_text = String::new();

        let result = timeout(budget, async {
            let (out, err) = tokio::join!(
                drain(&mut stdout_reader, &mut stdout_text),
                drain(&mut stderr_reader, &mut stderr_text)
            );
            out?;
            err?;
            let status = child.wait().await?;
            Ok::<i32, std::io::Error>(status.code().unwrap_or(-1))
        })
        .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(exit_code)) => Ok(CommandResult {
                exit_code,
                stdout: stdout_text,
                stderr: stderr_text,
                duration_ms,
                timed_out: false,
            }),
            Ok(Err(e)) => Err(Error::transport(command, e)),
            Err(_) => {
                // Kill the process if it's still running
                let _ = child.kill().await;
                debug!(command, duration_ms, "local command timed out");

                Ok(CommandResult {
                    exit_code: -1,
                    stdout: stdout_text,
                    stderr: stderr_text,
                    duration_ms,
                    timed_out: true,
                })
            }
        }
    }

    async fn exists(&self, path: &str, _mode: AccessMode) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn length(&self, path: &str, _mode: AccessMode) -> Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn is_directory(&self, path: &str, _mode: AccessMode) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, path: &str, _mode: AccessMode) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

/// Read a stream to its end, keeping whatever arrived if interrupted
async fn drain<R: AsyncBufRead + Unpin>(reader: &mut R, sink: &mut String) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            return Ok(());
        }
        sink.push_str(&String::from_utf8_lossy(&buffer));
    }
}
