//! The UI executor: one task owns the app state and runs jobs in order.
//!
//! Anything that reads or mutates the state posts a job through a
//! [`UiHandle`]. Capture completions, background file writes, and frontend
//! commands all funnel through here, so the state needs no locks.

use tokio::sync::{mpsc, oneshot};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Job(Job<S>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("UI executor has shut down")]
pub struct UiClosed;

/// Posts work to the executor. Cheap to clone.
pub struct UiHandle<S> {
    tx: mpsc::UnboundedSender<Message<S>>,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> std::fmt::Debug for UiHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<S: 'static> UiHandle<S> {
    /// Queues `job` without waiting for it.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<(), UiClosed> {
        self.tx
            .send(Message::Job(Box::new(job)))
            .map_err(|_| UiClosed)
    }

    /// Queues `job` and waits for its result.
    pub async fn call<R>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> Result<R, UiClosed>
    where
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(move |state| {
            let _ = reply_tx.send(job(state));
        })?;
        reply_rx.await.map_err(|_| UiClosed)
    }

    /// Asks the executor to stop after the jobs already queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end, handed to [`UiExecutor::new`] once the state exists.
pub struct UiReceiver<S> {
    rx: mpsc::UnboundedReceiver<Message<S>>,
}

/// Creates a connected handle/receiver pair. The handle can be given to the
/// state before the executor is built.
pub fn channel<S>() -> (UiHandle<S>, UiReceiver<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiReceiver { rx })
}

pub struct UiExecutor<S> {
    rx: mpsc::UnboundedReceiver<Message<S>>,
    state: S,
    stopped: bool,
}

impl<S> UiExecutor<S> {
    pub fn new(receiver: UiReceiver<S>, state: S) -> Self {
        Self {
            rx: receiver.rx,
            state,
            stopped: false,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Runs jobs until shutdown or until every handle is gone, then returns
    /// the state.
    pub async fn run(mut self) -> S {
        log::info!("[UI] Executor started");
        let mut handled = 0usize;
        while !self.stopped {
            match self.rx.recv().await {
                Some(message) => {
                    if self.handle(message) {
                        handled += 1;
                    }
                }
                None => break,
            }
        }
        log::info!("[UI] Executor stopped after {} jobs", handled);
        self.state
    }

    /// Runs whatever is queued right now without waiting. Returns the number
    /// of jobs run.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while !self.stopped {
            match self.rx.try_recv() {
                Ok(message) => {
                    if self.handle(message) {
                        handled += 1;
                    }
                }
                Err(_) => break,
            }
        }
        handled
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn handle(&mut self, message: Message<S>) -> bool {
        match message {
            Message::Job(job) => {
                job(&mut self.state);
                true
            }
            Message::Shutdown => {
                self.stopped = true;
                self.rx.close();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_run_in_post_order() {
        let (ui, rx) = channel::<Vec<u32>>();
        let mut exec = UiExecutor::new(rx, Vec::new());
        for i in 0..5 {
            ui.post(move |log| log.push(i)).unwrap();
        }
        assert_eq!(exec.drain(), 5);
        assert_eq!(exec.state(), &vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn jobs_can_post_follow_ups() {
        let (ui, rx) = channel::<Vec<&'static str>>();
        let mut exec = UiExecutor::new(rx, Vec::new());
        let inner = ui.clone();
        ui.post(move |log| {
            log.push("first");
            inner.post(|log| log.push("follow-up")).unwrap();
        })
        .unwrap();
        ui.post(|log| log.push("second")).unwrap();
        exec.drain();
        assert_eq!(exec.state(), &vec!["first", "second", "follow-up"]);
    }

    #[tokio::test]
    async fn call_returns_job_result() {
        let (ui, rx) = channel::<u32>();
        let exec = tokio::spawn(UiExecutor::new(rx, 40).run());
        let value = ui
            .call(|n| {
                *n += 2;
                *n
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        ui.shutdown();
        assert_eq!(exec.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let (ui, rx) = channel::<Vec<usize>>();
        let exec = tokio::spawn(UiExecutor::new(rx, Vec::new()).run());
        let mut calls = Vec::new();
        for i in 0..20 {
            let ui = ui.clone();
            calls.push(tokio::spawn(async move {
                ui.call(move |v| {
                    v.push(i);
                    v.len()
                })
                .await
                .unwrap()
            }));
        }
        let mut lens = Vec::new();
        for c in calls {
            lens.push(c.await.unwrap());
        }
        lens.sort_unstable();
        assert_eq!(lens, (1..=20).collect::<Vec<_>>());
        ui.shutdown();
        assert_eq!(exec.await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn handle_reports_closed_after_shutdown() {
        let (ui, rx) = channel::<()>();
        let exec = tokio::spawn(UiExecutor::new(rx, ()).run());
        ui.shutdown();
        exec.await.unwrap();
        assert_eq!(ui.post(|_| {}), Err(UiClosed));
        assert_eq!(ui.call(|_| 1).await, Err(UiClosed));
    }
}
