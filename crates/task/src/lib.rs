#![forbid(unsafe_code)]

//! # Plexus Task
//!
//! A cooperative task tree inspired by a conventional parent-child process
//! model, built over tokio tasks.
//!
//! Every long-lived resource in the SDK — session, app instance, pin — runs
//! as a [`Context`]: a tree node owning a label, a closing signal, a done
//! signal, and a list of child contexts. Cancellation flows parent to
//! child: closing a parent signals every descendant's closing channel, and
//! each node's watcher then runs its close hooks, waits for its own
//! children to drain, and detaches. An optional idle-close watchdog
//! reclaims dormant subtrees without explicit teardown code.

mod context;

pub use context::{Context, Task};

use plexus_types::{Error, ErrorKind};

/// Starts a new root context with no parent.
pub fn start(task: Task) -> Context {
    Context::start_root(task)
}

pub(crate) fn not_running() -> Error {
    ErrorKind::ShuttingDown.err("not running")
}
