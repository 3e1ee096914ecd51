//! Off-thread work whose result is committed later
//!
//! Slow I/O (reading an attachment file, loading another vault for import)
//! runs on tokio's blocking pool and reports through a `oneshot` channel. The
//! caller commits the result through the transaction log only after `wait`
//! returns `Ok`; dropping a `Staged` abandons the work and nothing reaches
//! the store.

use pwledger_core::errors::{Result, VaultError};
use pwledger_core_types::OperationId;
use tokio::sync::oneshot;

/// Handle to a unit of blocking work running in the background
#[derive(Debug)]
#[must_use = "staged work is abandoned when dropped"]
pub struct Staged<T> {
    id: OperationId,
    op: &'static str,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> Staged<T> {
    /// Run `work` on the blocking pool
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(op: &'static str, work: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let id = OperationId::new();
        let (tx, rx) = oneshot::channel();
        let operation_id = id.clone();
        tokio::task::spawn_blocking(move || {
            let result = work();
            tracing::debug!(
                op,
                operation_id = operation_id.as_str(),
                ok = result.is_ok(),
                "staged work finished"
            );
            if tx.send(result).is_err() {
                tracing::debug!(op, operation_id = operation_id.as_str(), "staged result discarded");
            }
        });
        Self { id, op, rx }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Wait for the work to finish
    ///
    /// # Errors
    ///
    /// The work's own error, or `Cancelled` if the worker went away without
    /// reporting (for example it panicked).
    pub async fn wait(self) -> Result<T> {
        let op = self.op;
        self.rx.await.map_err(|_| VaultError::Cancelled {
            op: op.to_string(),
        })?
    }

    /// Abandon the work; its result will be discarded
    pub fn cancel(self) {
        tracing::debug!(
            op = self.op,
            operation_id = self.id.as_str(),
            "staged work cancelled"
        );
    }
}
