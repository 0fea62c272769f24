//! Debounced command dispatch
//!
//! For every matched rule the [`Dispatcher`] schedules an independent task:
//! wait out the rule's settle delay, re-check the cooldown guard, then run
//! the command under a cancellable timeout. The caller never blocks on
//! command completion, and a failed command only affects its own dispatch;
//! the rule stays eligible for the next matching event.
//!
//! Two dispatches of the same rule can race through their own delay windows
//! and both pass the guard before either records a run; the cooldown is a
//! coarse rule-scoped throttle, not an at-most-once-per-window guarantee.

use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;
use tracing::{debug, error, info};

use uudev_rules::Rule;

/// Default bound on a single command execution.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command exited successfully and the rule's last run was recorded.
    Succeeded,
    /// Command failed to start or exited non-zero; last run untouched.
    Failed,
    /// Command was cancelled by the execution timeout; last run untouched.
    TimedOut,
    /// The cooldown guard rejected the run (empty command line, or a
    /// successful run too recently).
    Skipped,
}

/// Schedules debounced, timeout-bounded command executions.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    exec_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the default 30s execution timeout.
    pub fn new() -> Self {
        Self::with_exec_timeout(DEFAULT_EXEC_TIMEOUT)
    }

    /// Create a dispatcher with a custom execution timeout.
    pub fn with_exec_timeout(exec_timeout: Duration) -> Self {
        Self { exec_timeout }
    }

    /// Schedule a debounced execution of `rule`'s command.
    ///
    /// Returns immediately; delay, guard check and execution happen on an
    /// unsupervised task that outlives the triggering event's processing.
    /// There is no bound on in-flight dispatches; the cooldown guard is
    /// what limits steady-state command storms.
    pub fn dispatch(&self, rule: Arc<Rule>) {
        let exec_timeout = self.exec_timeout;
        tokio::spawn(async move {
            execute_rule(rule, exec_timeout).await;
        });
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one dispatch to its terminal state: settle delay, cooldown guard,
/// then bounded execution.
pub async fn execute_rule(rule: Arc<Rule>, exec_timeout: Duration) -> DispatchOutcome {
    time::sleep(rule.delay()).await;

    if !rule.must_run() {
        debug!(rule = rule.name(), "guard rejected run");
        return DispatchOutcome::Skipped;
    }

    // First whitespace-separated token is the program, the rest are
    // arguments. No shell quoting: arguments containing spaces are not
    // supported.
    let mut argv = rule.command().split_whitespace();
    let Some(program) = argv.next() else {
        error!(rule = rule.name(), "command line is blank");
        return DispatchOutcome::Failed;
    };

    let mut cmd = Command::new(program);
    cmd.args(argv).kill_on_drop(true);

    info!(
        rule = rule.name(),
        command = rule.command(),
        delay = ?rule.delay(),
        "executing command"
    );

    let result = if rule.no_timeout() {
        Some(cmd.output().await)
    } else {
        // On expiry the output future is dropped, which kills the child.
        time::timeout(exec_timeout, cmd.output()).await.ok()
    };

    match result {
        Some(Ok(output)) if output.status.success() => {
            rule.record_success();
            debug!(rule = rule.name(), "command completed");
            DispatchOutcome::Succeeded
        }
        Some(Ok(output)) => {
            error!(
                rule = rule.name(),
                command = rule.command(),
                status = %output.status,
                output = %combined_output(&output),
                "command failed"
            );
            DispatchOutcome::Failed
        }
        Some(Err(e)) => {
            error!(
                rule = rule.name(),
                command = rule.command(),
                error = %e,
                "failed to run command"
            );
            DispatchOutcome::Failed
        }
        None => {
            error!(
                rule = rule.name(),
                command = rule.command(),
                timeout = ?exec_timeout,
                "command timed out"
            );
            DispatchOutcome::TimedOut
        }
    }
}

/// The command's captured stdout and stderr as one lossy string.
fn combined_output(output: &Output) -> String {
    let mut combined = Vec::with_capacity(output.stdout.len() + output.stderr.len());
    combined.extend_from_slice(&output.stdout);
    combined.extend_from_slice(&output.stderr);
    String::from_utf8_lossy(&combined).into_owned()
}
