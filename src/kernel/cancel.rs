use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owner of at most one timer-driven task.
///
/// Arming always cancels the previous task before the new one is spawned,
/// so a slot never has two live timers.
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels whatever is armed, then spawns the task built by `task`.
    /// The task receives the token it must watch.
    pub fn arm<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = CancellationToken::new();
        let handle = tokio::spawn(task(token.clone()));
        self.current = Some(ArmedTimer { token, handle });
    }

    /// Returns `true` if a task was armed. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(timer) => {
                timer.token.cancel();
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forgets the armed task without aborting it. Used by a task that is
    /// finishing on its own and must not abort itself mid-step.
    pub fn release(&mut self) {
        if let Some(timer) = self.current.take() {
            timer.token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| !t.token.is_cancelled() && !t.handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
