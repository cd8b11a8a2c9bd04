//! Contract for executing shell snippets against the host.
//!
//! Concrete implementations live in `poolward-zfs`. Keeping the trait here lets
//! the pool handle be exercised with recording doubles instead of real binaries.

use crate::error::PoolResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared flag that aborts an in-flight script when set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-call deadline and cancellation.
///
/// `timeout: None` defers to the runner's configured default.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn cancellable(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancelToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// One script invocation.
///
/// `script` reads its inputs as `$1`, `$2`, ...; `args` are handed to the
/// interpreter positionally and are never spliced into the script text.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRequest<'a> {
    /// Human-readable name of the calling operation, used in logs and errors.
    pub operation: &'a str,
    pub script: &'a str,
    pub args: &'a [&'a str],
    pub options: &'a CallOptions,
}

/// Executes a script once and returns its standard output.
pub trait ScriptRunner {
    /// Run `request` to completion.
    ///
    /// # Errors
    /// `PoolError::Timeout` when the deadline passes, `PoolError::Cancelled` when the
    /// request's token fires, and `PoolError::Execution` for spawn failures or a
    /// non-zero exit.
    fn run(&self, request: &ScriptRequest<'_>) -> PoolResult<Vec<u8>>;
}

impl<T> ScriptRunner for &T
where
    T: ScriptRunner + ?Sized,
{
    fn run(&self, request: &ScriptRequest<'_>) -> PoolResult<Vec<u8>> {
        (**self).run(request)
    }
}

impl<T> ScriptRunner for Arc<T>
where
    T: ScriptRunner + ?Sized,
{
    fn run(&self, request: &ScriptRequest<'_>) -> PoolResult<Vec<u8>> {
        (**self).run(request)
    }
}
