//! Shutdown coordination
//!
//! Two participants race to end the running phase: an external
//! [`CancellationToken`] (process lifetime, usually wired to OS signals) and
//! the internal [`ShutdownHandle`] application code holds. Both resolve the
//! same completion, and only the first one counts.

use crate::config::WaitMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use strum_macros::Display;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// What the orchestrator does once the running phase ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ShutdownInstruction {
    /// Return to the caller without finalizing; the wake-up was advisory.
    Ignore,
    /// Finalize and terminate.
    Shutdown,
}

/// Recorded outcome of the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum OperationResult {
    Completed,
    Canceled,
}

/// Which participant ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownCause {
    /// The external token was cancelled.
    External,
    /// Application code asked for shutdown.
    Requested,
    /// Application code woke the runtime without asking it to stop.
    Wake,
    /// The attended wait finished by itself.
    AttendedCompleted,
}

impl ShutdownCause {
    pub fn instruction(self) -> ShutdownInstruction {
        match self {
            ShutdownCause::Wake => ShutdownInstruction::Ignore,
            _ => ShutdownInstruction::Shutdown,
        }
    }
}

/// Resolved exactly once; later attempts are no-ops.
#[derive(Default)]
struct Completion {
    cause: OnceLock<ShutdownCause>,
    notify: Notify,
    transitions: AtomicUsize,
}

impl Completion {
    fn try_complete(&self, cause: ShutdownCause) -> bool {
        if self.cause.set(cause).is_err() {
            tracing::debug!("Shutdown already resolved; ignoring {}", cause);
            return false;
        }
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        true
    }

    async fn wait(&self) -> ShutdownCause {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(cause) = self.cause.get() {
                return *cause;
            }
            notified.await;
        }
    }
}

/// Internal shutdown signal handed to application code
///
/// Cloning shares the same signal.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    completion: Arc<Completion>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the runtime to finalize and stop. Returns whether this call won the race.
    pub fn request_shutdown(&self) -> bool {
        self.completion.try_complete(ShutdownCause::Requested)
    }

    /// Wake the runtime without finalizing. Returns whether this call won the race.
    pub fn request_wake(&self) -> bool {
        self.completion.try_complete(ShutdownCause::Wake)
    }

    pub fn cause(&self) -> Option<ShutdownCause> {
        self.completion.cause.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.cause().is_some()
    }

    /// Number of times the signal changed state; never more than one.
    pub fn transitions(&self) -> usize {
        self.completion.transitions.load(Ordering::SeqCst)
    }

    fn try_complete(&self, cause: ShutdownCause) -> bool {
        self.completion.try_complete(cause)
    }

    async fn wait(&self) -> ShutdownCause {
        self.completion.wait().await
    }
}

/// An interactive wait run while the application is attended
#[async_trait]
pub trait AttendedWait: Send + Sync {
    /// Return when the interaction ends, or promptly once `token` is cancelled.
    async fn attend(&self, token: CancellationToken) -> OperationResult;
}

/// Waits on stdin until the quit command (or end of input)
///
/// A pending stdin read lives on a blocking thread, so the runtime may only
/// exit after the next line arrives. Hosts that need a prompt exit should shut
/// the runtime down with a timeout.
pub struct ConsoleAttendant {
    quit_command: String,
}

impl ConsoleAttendant {
    pub fn new(quit_command: impl Into<String>) -> Self {
        Self {
            quit_command: quit_command.into(),
        }
    }
}

#[async_trait]
impl AttendedWait for ConsoleAttendant {
    async fn attend(&self, token: CancellationToken) -> OperationResult {
        println!("Type '{}' to stop.", self.quit_command);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = token.cancelled() => return OperationResult::Canceled,
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim().eq_ignore_ascii_case(&self.quit_command) => {
                        return OperationResult::Completed;
                    }
                    Ok(Some(_)) => continue,
                    Ok(None) => return OperationResult::Completed,
                    Err(e) => {
                        tracing::warn!("Console read failed: {}", e);
                        return OperationResult::Completed;
                    }
                },
            }
        }
    }
}

/// Blocks the running phase until a shutdown condition
///
/// # Example
///
/// ```rust,ignore
/// let handle = ShutdownHandle::new();
/// let awaiter = ShutdownAwaiter::new(handle.clone(), WaitMode::Unattended, None);
///
/// tokio::spawn(async move { handle.request_shutdown() });
/// let (result, instruction) = awaiter.wait_for_shutdown(&os_shutdown_token()).await;
/// ```
pub struct ShutdownAwaiter {
    handle: ShutdownHandle,
    mode: WaitMode,
    attendant: Option<Arc<dyn AttendedWait>>,
}

impl ShutdownAwaiter {
    pub fn new(
        handle: ShutdownHandle,
        mode: WaitMode,
        attendant: Option<Arc<dyn AttendedWait>>,
    ) -> Self {
        Self {
            handle,
            mode,
            attendant,
        }
    }

    pub async fn wait_for_shutdown(
        &self,
        external: &CancellationToken,
    ) -> (OperationResult, ShutdownInstruction) {
        let (result, cause) = match (self.mode, &self.attendant) {
            (WaitMode::Attended, Some(attendant)) => self.attended(attendant, external).await,
            (WaitMode::Attended, None) => {
                tracing::warn!("Attended wait requested but no attendant configured; waiting unattended");
                self.unattended(external).await
            }
            (WaitMode::Unattended, _) => self.unattended(external).await,
        };

        let instruction = cause.instruction();
        tracing::info!(
            "Shutdown wait ended by {} ({}, instruction {})",
            cause,
            result,
            instruction
        );
        (result, instruction)
    }

    async fn unattended(&self, external: &CancellationToken) -> (OperationResult, ShutdownCause) {
        let cause = tokio::select! {
            cause = self.handle.wait() => cause,
            _ = external.cancelled() => {
                self.handle.try_complete(ShutdownCause::External);
                self.handle.wait().await
            }
        };

        let result = match cause {
            ShutdownCause::External => OperationResult::Canceled,
            _ => OperationResult::Completed,
        };
        (result, cause)
    }

    async fn attended(
        &self,
        attendant: &Arc<dyn AttendedWait>,
        external: &CancellationToken,
    ) -> (OperationResult, ShutdownCause) {
        let interaction = external.child_token();
        let mut interactive_result = None;

        tokio::select! {
            outcome = attendant.attend(interaction.clone()) => {
                if self.handle.try_complete(ShutdownCause::AttendedCompleted) {
                    interactive_result = Some(outcome);
                }
            }
            _ = self.handle.wait() => {}
            _ = external.cancelled() => {
                self.handle.try_complete(ShutdownCause::External);
            }
        }
        interaction.cancel();

        let cause = self.handle.wait().await;
        (interactive_result.unwrap_or(OperationResult::Canceled), cause)
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// ```rust,ignore
/// use hostweave::lifecycle::shutdown_signal;
///
/// tokio::select! {
///     _ = shutdown_signal() => {
///         println!("Shutdown signal received");
///     }
///     _ = worker.run() => {}
/// }
/// ```
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

/// A process-lifetime token cancelled by Ctrl+C or SIGTERM
///
/// Must be called from within a Tokio runtime.
pub fn os_shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Forever;

    #[async_trait]
    impl AttendedWait for Forever {
        async fn attend(&self, token: CancellationToken) -> OperationResult {
            token.cancelled().await;
            OperationResult::Canceled
        }
    }

    struct Immediate;

    #[async_trait]
    impl AttendedWait for Immediate {
        async fn attend(&self, _token: CancellationToken) -> OperationResult {
            OperationResult::Completed
        }
    }

    #[tokio::test]
    async fn test_internal_request_shuts_down() {
        let handle = ShutdownHandle::new();
        let awaiter = ShutdownAwaiter::new(handle.clone(), WaitMode::Unattended, None);

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.request_shutdown();
        });

        let (result, instruction) = awaiter.wait_for_shutdown(&CancellationToken::new()).await;
        assert_eq!(result, OperationResult::Completed);
        assert_eq!(instruction, ShutdownInstruction::Shutdown);
    }

    #[tokio::test]
    async fn test_wake_is_ignored() {
        let handle = ShutdownHandle::new();
        assert!(handle.request_wake());
        let awaiter = ShutdownAwaiter::new(handle, WaitMode::Unattended, None);

        let (_, instruction) = awaiter.wait_for_shutdown(&CancellationToken::new()).await;
        assert_eq!(instruction, ShutdownInstruction::Ignore);
    }

    #[tokio::test]
    async fn test_external_token_cancels() {
        let handle = ShutdownHandle::new();
        let awaiter = ShutdownAwaiter::new(handle.clone(), WaitMode::Unattended, None);
        let external = CancellationToken::new();
        external.cancel();

        let (result, instruction) = awaiter.wait_for_shutdown(&external).await;
        assert_eq!(result, OperationResult::Canceled);
        assert_eq!(instruction, ShutdownInstruction::Shutdown);
        assert_eq!(handle.cause(), Some(ShutdownCause::External));
    }

    #[tokio::test]
    async fn test_second_signal_is_a_no_op() {
        let handle = ShutdownHandle::new();
        assert!(handle.request_shutdown());
        assert!(!handle.request_wake());
        assert!(!handle.request_shutdown());
        assert_eq!(handle.transitions(), 1);
        assert_eq!(handle.cause(), Some(ShutdownCause::Requested));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signals_resolve_once() {
        for _ in 0..50 {
            let handle = ShutdownHandle::new();
            let external = CancellationToken::new();
            let awaiter = ShutdownAwaiter::new(handle.clone(), WaitMode::Unattended, None);

            let internal = handle.clone();
            let token = external.clone();
            let a = tokio::spawn(async move { internal.request_shutdown() });
            let b = tokio::spawn(async move { token.cancel() });

            let (_, instruction) = awaiter.wait_for_shutdown(&external).await;
            a.await.unwrap();
            b.await.unwrap();

            assert_eq!(instruction, ShutdownInstruction::Shutdown);
            assert_eq!(handle.transitions(), 1);
        }
    }

    #[tokio::test]
    async fn test_attended_completion() {
        let handle = ShutdownHandle::new();
        let awaiter =
            ShutdownAwaiter::new(handle.clone(), WaitMode::Attended, Some(Arc::new(Immediate)));

        let (result, instruction) = awaiter.wait_for_shutdown(&CancellationToken::new()).await;
        assert_eq!(result, OperationResult::Completed);
        assert_eq!(instruction, ShutdownInstruction::Shutdown);
        assert_eq!(handle.cause(), Some(ShutdownCause::AttendedCompleted));
    }

    #[tokio::test]
    async fn test_attended_preempted_by_external_signal() {
        let handle = ShutdownHandle::new();
        let awaiter =
            ShutdownAwaiter::new(handle.clone(), WaitMode::Attended, Some(Arc::new(Forever)));
        let external = CancellationToken::new();

        let trigger = external.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let (result, instruction) = awaiter.wait_for_shutdown(&external).await;
        assert_eq!(result, OperationResult::Canceled);
        assert_eq!(instruction, ShutdownInstruction::Shutdown);
    }

    #[tokio::test]
    async fn test_attended_preempted_by_wake() {
        let handle = ShutdownHandle::new();
        let awaiter =
            ShutdownAwaiter::new(handle.clone(), WaitMode::Attended, Some(Arc::new(Forever)));

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.request_wake();
        });

        let (result, instruction) = awaiter.wait_for_shutdown(&CancellationToken::new()).await;
        assert_eq!(result, OperationResult::Canceled);
        assert_eq!(instruction, ShutdownInstruction::Ignore);
    }

    #[tokio::test]
    async fn test_attended_without_attendant_falls_back() {
        let handle = ShutdownHandle::new();
        handle.request_shutdown();
        let awaiter = ShutdownAwaiter::new(handle, WaitMode::Attended, None);

        let (result, _) = awaiter.wait_for_shutdown(&CancellationToken::new()).await;
        assert_eq!(result, OperationResult::Completed);
    }
}
