//! The task tree node and its lifecycle machinery.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use plexus_types::tag::Uid;
use plexus_types::{Error, ErrorKind, Result};

use crate::not_running;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Hook = Box<dyn FnOnce() + Send + 'static>;
type OnRun = Box<dyn FnOnce(Context) -> BoxFuture + Send + 'static>;

/// Parameter block used to start a new [`Context`], with hooks for each
/// stage of its lifecycle.
#[derive(Default)]
pub struct Task {
    /// Logging and debugging label.
    pub label: String,
    /// Optional caller-assigned task UID; a fresh one is minted when nil.
    pub task_id: Uid,
    /// When non-zero, the context auto-arms [`Context::close_when_idle`]
    /// with this delay once its run body completes or its last child
    /// closes, whichever happens later.
    pub idle_close: Duration,
    pub(crate) on_run: Option<OnRun>,
    pub(crate) on_closing: Option<Hook>,
    pub(crate) on_closed: Option<Hook>,
}

impl Task {
    /// A task with the given label and defaults everywhere else.
    pub fn new(label: impl Into<String>) -> Task {
        Task {
            label: label.into(),
            ..Task::default()
        }
    }

    /// Sets the auto idle-close delay.
    pub fn idle_close(mut self, delay: Duration) -> Task {
        self.idle_close = delay;
        self
    }

    /// Sets the async work body. The context closes itself (via idle-close
    /// when configured) after the body completes.
    pub fn on_run<F, Fut>(mut self, f: F) -> Task
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_run = Some(Box::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Hook fired once close begins, while children are still closing.
    pub fn on_closing<F: FnOnce() + Send + 'static>(mut self, f: F) -> Task {
        self.on_closing = Some(Box::new(f));
        self
    }

    /// Hook fired after close fully executes, immediately before `done`.
    pub fn on_closed<F: FnOnce() + Send + 'static>(mut self, f: F) -> Task {
        self.on_closed = Some(Box::new(f));
        self
    }
}

struct State {
    running: bool,
    idle: bool,
    idle_close_retry: Duration,
    idle_close_min: Option<Instant>,
    children: Vec<Context>,
    on_closing: Option<Hook>,
    on_closed: Option<Hook>,
}

struct Inner {
    label: String,
    task_id: Uid,
    auto_idle_close: Duration,
    closing: watch::Sender<bool>,
    closed: watch::Sender<bool>,
    busy: AtomicUsize,
    idle_notify: Notify,
    mu: Mutex<State>,
}

/// A handle to one node of the task tree. Cheap to clone; all clones refer
/// to the same task.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    fn new(task: &mut Task) -> Context {
        let task_id = if task.task_id.is_nil() {
            Uid::now()
        } else {
            task.task_id
        };
        let label = if task.label.is_empty() {
            task_id.label()
        } else {
            task.label.clone()
        };
        Context {
            inner: Arc::new(Inner {
                label,
                task_id,
                auto_idle_close: task.idle_close,
                closing: watch::Sender::new(false),
                closed: watch::Sender::new(false),
                busy: AtomicUsize::new(0),
                idle_notify: Notify::new(),
                mu: Mutex::new(State {
                    running: true,
                    idle: false,
                    idle_close_retry: Duration::ZERO,
                    idle_close_min: None,
                    children: Vec::new(),
                    on_closing: task.on_closing.take(),
                    on_closed: task.on_closed.take(),
                }),
            }),
        }
    }

    /// Starts a context with no parent.
    pub fn start_root(task: Task) -> Context {
        Context::start_impl(None, task).expect("root start cannot fail")
    }

    /// Starts `task` as a child of this context.
    ///
    /// Fails with [`ErrorKind::ShuttingDown`] when this context has already
    /// begun closing. Closing this context later closes the child first.
    pub fn start_child(&self, task: Task) -> Result<Context> {
        Context::start_impl(Some(self.clone()), task)
    }

    /// Convenience wrapper for a short-lived child: runs `f` and idle-closes
    /// as soon as it completes.
    pub fn go<F, Fut>(&self, label: &str, f: F) -> Result<Context>
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start_child(
            Task::new(label)
                .idle_close(Duration::from_nanos(1))
                .on_run(f),
        )
    }

    fn start_impl(parent: Option<Context>, mut task: Task) -> Result<Context> {
        let mut on_run = task.on_run.take();
        let child = Context::new(&mut task);

        if let Some(parent) = &parent {
            let mut st = parent.lock();
            if !st.running {
                return Err(not_running());
            }
            parent.inner.busy.fetch_add(1, Ordering::AcqRel);
            st.idle = false;
            st.children.push(child.clone());
        }

        tracing::debug!(target: "task", label = %child.inner.label, "start");

        // watcher: propagate parent close, then drive the closing sequence
        {
            let parent = parent.clone();
            let child = child.clone();
            tokio::spawn(async move {
                match &parent {
                    Some(parent) => {
                        tokio::select! {
                            _ = parent.closing() => child.close(),
                            _ = child.closing() => {}
                        }
                    }
                    None => child.closing().await,
                }

                let on_closing = child.lock().on_closing.take();
                if let Some(hook) = on_closing {
                    hook();
                }

                // wait for grandchildren and the run body to drain
                child.wait_idle().await;

                let mut parent_idle_close = Duration::ZERO;
                if let Some(parent) = &parent {
                    let mut st = parent.lock();
                    st.children
                        .retain(|c| !Arc::ptr_eq(&c.inner, &child.inner));
                    if st.children.is_empty() {
                        parent_idle_close = parent.inner.auto_idle_close;
                    }
                }

                let on_closed = child.lock().on_closed.take();
                if let Some(hook) = on_closed {
                    hook();
                }
                child.inner.closed.send_replace(true);
                tracing::debug!(target: "task", label = %child.inner.label, "closed");

                if let Some(parent) = &parent {
                    parent.busy_dec();
                    if parent_idle_close > Duration::ZERO {
                        parent.close_when_idle(parent_idle_close);
                    }
                }
            });
        }

        if let Some(f) = on_run.take() {
            let child2 = child.clone();
            child.inner.busy.fetch_add(1, Ordering::AcqRel);
            tokio::spawn(async move {
                f(child2.clone()).await;
                let auto = child2.inner.auto_idle_close;
                child2.busy_dec();
                if auto > Duration::ZERO {
                    child2.close_when_idle(auto);
                }
            });
        }

        Ok(child)
    }

    /// Initiates shutdown: signals `closing` for this context, which in
    /// turn closes every child. Idempotent and non-blocking; `done` fires
    /// once all close execution completes.
    pub fn close(&self) {
        let first = {
            let mut st = self.lock();
            std::mem::replace(&mut st.running, false)
        };
        if first {
            self.inner.closing.send_replace(true);
        }
    }

    /// Resolves when close has been initiated.
    pub async fn closing(&self) {
        let mut rx = self.inner.closing.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Resolves when close has fully executed: children drained and the
    /// `on_closed` hook complete.
    pub async fn done(&self) {
        let mut rx = self.inner.closed.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// True once close has been initiated.
    pub fn is_closing(&self) -> bool {
        !self.lock().running
    }

    /// The context's error once closing: [`ErrorKind::Cancelled`].
    pub fn err(&self) -> Option<Error> {
        if self.is_closing() {
            Some(ErrorKind::Cancelled.err("context closed"))
        } else {
            None
        }
    }

    /// Arms a pending close for when this context is idle — no children and
    /// no running body — after `delay`. Subsequent calls update the delay,
    /// but a watchdog already waiting finishes its current period first.
    pub fn close_when_idle(&self, delay: Duration) {
        let prev = {
            let mut st = self.lock();
            std::mem::replace(&mut st.idle_close_retry, delay)
        };
        // a watchdog is already running; it will pick up the new delay
        if prev > Duration::ZERO {
            return;
        }
        let ctx = self.clone();
        tokio::spawn(async move { ctx.idle_watchdog().await });
    }

    /// Ensures this context will not idle-close until `delay` has passed.
    /// Returns false when the context is already closing.
    pub fn prevent_idle_close(&self, delay: Duration) -> bool {
        let mut st = self.lock();
        st.idle_close_min = Some(Instant::now() + delay);
        st.idle = false;
        st.running
    }

    async fn idle_watchdog(self) {
        loop {
            self.lock().idle = true;
            self.wait_idle().await;

            let mut delay;
            {
                let mut st = self.lock();
                if !st.idle {
                    continue; // new work appeared while waiting
                }
                let retry = st.idle_close_retry;
                if retry == Duration::ZERO {
                    return;
                }
                delay = retry;
                if let Some(min) = st.idle_close_min {
                    let floor = min.saturating_duration_since(Instant::now());
                    if floor == Duration::ZERO {
                        st.idle_close_min = None;
                    }
                    if delay < floor {
                        delay = floor;
                    }
                }
            }

            if delay > Duration::ZERO {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.closing() => return,
                }
            }

            // close only if no new children arrived while we slept
            let close_now = self.lock().idle;
            if close_now {
                self.close();
                return;
            }
        }
    }

    fn busy_dec(&self) {
        if self.inner.busy.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle_notify.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle_notify.notified();
            if self.inner.busy.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.mu.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The logging label of this context.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The task UID of this context.
    pub fn task_id(&self) -> Uid {
        self.inner.task_id
    }

    /// A snapshot of the current children.
    pub fn children(&self) -> Vec<Context> {
        self.lock().children.clone()
    }

    /// Calls `f` for each current child while holding the child-list lock.
    pub fn for_each_child(&self, mut f: impl FnMut(&Context)) {
        for child in self.lock().children.iter() {
            f(child);
        }
    }

    /// True when both handles refer to the same task.
    pub fn same_task(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Context({} {})",
            self.inner.label,
            self.inner.task_id.label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn spawn_n(parent: &Context, count: usize, delay: Duration) {
        for i in 0..count {
            parent
                .go(&format!("#{}", i + 1), move |_ctx| async move {
                    tokio::time::sleep(delay).await;
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn basic_idle_close() {
        let root = Context::start_root(
            Task::new("root").idle_close(Duration::from_nanos(1)),
        );
        spawn_n(&root, 1, Duration::from_millis(50));

        tokio::time::timeout(Duration::from_secs(5), root.done())
            .await
            .expect("root did not close");
    }

    #[tokio::test]
    async fn nested_idle_close() {
        let root = Context::start_root(
            Task::new("root").idle_close(Duration::from_nanos(1)),
        );
        let child = root
            .start_child(Task::new("child").idle_close(Duration::from_nanos(1)))
            .unwrap();
        spawn_n(&child, 10, Duration::from_millis(20));

        tokio::time::timeout(Duration::from_secs(5), root.done())
            .await
            .expect("tree did not close");
    }

    #[tokio::test]
    async fn close_cancels_children() {
        let root = Context::start_root(Task::new("close tester"));
        let child = root.start_child(Task::new("child")).unwrap();

        let cancelled1 = Arc::new(AtomicBool::new(false));
        let cancelled2 = Arc::new(AtomicBool::new(false));

        let saw1 = cancelled1.clone();
        let foo1 = root
            .go("foo1", move |ctx| async move {
                ctx.closing().await;
                saw1.store(true, Ordering::SeqCst);
            })
            .unwrap();

        let saw2 = cancelled2.clone();
        let foo2 = child
            .go("foo2", move |ctx| async move {
                ctx.closing().await;
                saw2.store(true, Ordering::SeqCst);
            })
            .unwrap();

        root.close();

        tokio::time::timeout(Duration::from_secs(5), async {
            root.done().await;
            child.done().await;
            foo1.done().await;
            foo2.done().await;
        })
        .await
        .expect("close did not propagate");

        assert!(cancelled1.load(Ordering::SeqCst));
        assert!(cancelled2.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_child_after_close_fails() {
        let root = Context::start_root(Task::new("root"));
        root.close();
        let err = root.start_child(Task::new("late")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ShuttingDown);
    }

    #[tokio::test]
    async fn close_when_idle_with_no_children() {
        let root = Context::start_root(Task::new("idle root"));
        root.close_when_idle(Duration::from_millis(30));
        tokio::time::timeout(Duration::from_millis(500), root.done())
            .await
            .expect("idle close did not fire");
    }

    #[tokio::test]
    async fn prevent_idle_close_extends_floor() {
        let root = Context::start_root(Task::new("floored root"));
        assert!(root.prevent_idle_close(Duration::from_millis(200)));
        root.close_when_idle(Duration::from_millis(10));

        // must still be open before the floor elapses
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!root.is_closing());

        tokio::time::timeout(Duration::from_secs(2), root.done())
            .await
            .expect("idle close never fired");
    }

    #[tokio::test]
    async fn on_closing_runs_before_done() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let root = Context::start_root(
            Task::new("hooks")
                .on_closing(move || o1.lock().unwrap().push("closing"))
                .on_closed(move || o2.lock().unwrap().push("closed")),
        );
        root.close();
        root.done().await;
        assert_eq!(*order.lock().unwrap(), vec!["closing", "closed"]);
    }

    #[tokio::test]
    async fn hooks_fire_on_parent_close_too() {
        let flag = Arc::new(AtomicBool::new(false));
        let saw = flag.clone();
        let root = Context::start_root(Task::new("root"));
        let _child = root
            .start_child(
                Task::new("child").on_closing(move || saw.store(true, Ordering::SeqCst)),
            )
            .unwrap();
        root.close();
        root.done().await;
        assert!(flag.load(Ordering::SeqCst));
    }
}
