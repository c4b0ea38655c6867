//! Execution channel: run commands on a session under a timeout tier

use crate::driver::Shell;
use crate::error::{ExecError, Result};
use crate::session::{CommandResult, Session, TimeoutTier, TimeoutTiers};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest command text echoed into logs
const LOG_COMMAND_LIMIT: usize = 200;

/// Runs commands and scripts on one session.
///
/// Never retries. A non-zero exit status is reported through the
/// returned output, not as an error; only an exhausted budget and
/// transport failures are errors.
#[derive(Clone)]
pub struct ExecutionChannel {
    session: Arc<dyn Session>,
    tiers: TimeoutTiers,
}

impl ExecutionChannel {
    pub fn new(session: Arc<dyn Session>, tiers: TimeoutTiers) -> Self {
        Self { session, tiers }
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn tiers(&self) -> &TimeoutTiers {
        &self.tiers
    }

    /// Run a command and return its standard output
    pub async fn run(&self, command: &str, tier: TimeoutTier) -> Result<String> {
        let result = self.execute(command, tier).await?;
        Ok(result.stdout)
    }

    /// Run a command with its output redirected into `path` on the host
    pub async fn run_to_file(
        &self,
        shell: Shell,
        command: &str,
        path: &str,
        tier: TimeoutTier,
    ) -> Result<String> {
        let redirected = shell.redirect(command, path);
        let result = self.execute(&redirected, tier).await?;
        if !result.stderr.trim().is_empty() {
            debug!(
                path,
                stderr = %truncate_for_log(result.stderr.trim()),
                "search wrote diagnostics"
            );
        }
        Ok(path.to_string())
    }

    async fn execute(&self, command: &str, tier: TimeoutTier) -> Result<CommandResult> {
        let budget = self.tiers.get(tier);
        debug!(
            host = self.session.hostname(),
            %tier,
            budget_ms = budget.as_millis() as u64,
            command = %truncate_for_log(command),
            "executing"
        );

        let result = self.session.execute(command, budget).await?;

        if result.timed_out {
            warn!(
                %tier,
                elapsed_ms = result.duration_ms,
                command = %truncate_for_log(command),
                "command timed out"
            );
            return Err(ExecError::Timeout {
                command: command.to_string(),
                elapsed: Duration::from_millis(result.duration_ms),
                partial_output: result.stdout,
            }
            .into());
        }

        if result.exit_code != 0 {
            debug!(exit_code = result.exit_code, "command exited non-zero");
        }
        Ok(result)
    }
}

/// Shorten long command text for log lines
fn truncate_for_log(text: &str) -> String {
    if text.len() <= LOG_COMMAND_LIMIT {
        return text.to_string();
    }
    let mut end = LOG_COMMAND_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... <{} more bytes>", &text[..end], text.len() - end)
}
