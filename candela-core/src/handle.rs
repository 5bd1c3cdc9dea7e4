use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a spawned per-series driver task.
///
/// Stopping is cooperative: `stop` signals the task and awaits it. Dropping
/// the handle without stopping sends the signal and aborts the task.
#[derive(Debug)]
pub struct TaskHandle {
    join: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl TaskHandle {
    /// Wrap a spawned task and its stop signal.
    #[must_use]
    pub const fn new(join: JoinHandle<()>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            join: Some(join),
            stop_tx: Some(stop_tx),
        }
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    /// Disarm the handle without stopping or aborting the task.
    ///
    /// Used when the task disposes of its own handle: the drop guard must
    /// not abort the caller.
    pub fn detach(mut self) {
        self.join = None;
        self.stop_tx = None;
    }

    /// Whether the underlying task has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take()
            && !join.is_finished()
        {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_signals_the_task_and_waits_for_it() {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, mut done_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let _ = stop_rx.await;
            let _ = done_tx.send(());
        });

        let handle = TaskHandle::new(join, stop_tx);
        assert!(!handle.is_finished());
        handle.stop().await;
        // stop() returned only after the task ran to completion.
        assert!(done_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn detach_leaves_the_task_running() {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let _ = release_rx.await;
            let stopped = stop_rx.try_recv().is_ok();
            let _ = done_tx.send(stopped);
        });

        TaskHandle::new(join, stop_tx).detach();
        let _ = release_tx.send(());
        // Neither a stop signal nor an abort reached the task.
        assert!(!done_rx.await.unwrap());
    }
}
