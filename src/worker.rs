use log::debug;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Catalog,
    Assembly,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Catalog => write!(f, "catalog query"),
            OperationKind::Assembly => write!(f, "chapter download"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("a {0} is already running")]
pub struct Busy(pub OperationKind);

/// Runs user actions in the background, one per kind at a time.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<Semaphore>,
    assembly: Arc<Semaphore>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Semaphore::new(1)),
            assembly: Arc::new(Semaphore::new(1)),
        }
    }

    fn slot(&self, kind: OperationKind) -> &Arc<Semaphore> {
        match kind {
            OperationKind::Catalog => &self.catalog,
            OperationKind::Assembly => &self.assembly,
        }
    }

    #[cfg(test)]
    fn is_busy(&self, kind: OperationKind) -> bool {
        self.slot(kind).available_permits() == 0
    }

    /// Spawn `operation` unless another operation of the same kind is still
    /// running. The slot frees up when the task ends, however it ends.
    pub fn try_spawn<F>(&self, kind: OperationKind, operation: F) -> Result<JoinHandle<F::Output>, Busy>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .slot(kind)
            .clone()
            .try_acquire_owned()
            .map_err(|_| Busy(kind))?;
        debug!("Starting {}", kind);
        Ok(tokio::spawn(async move {
            let _permit = permit;
            operation.await
        }))
    }
}
