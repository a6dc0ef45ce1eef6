//! Effects returned from `update`: futures and streams whose outputs are fed
//! back into the event loop as messages.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[must_use = "a Task does nothing until it is spawned"]
pub enum Task<M> {
    None,
    Future(BoxFuture<'static, M>),
    Stream(BoxStream<'static, M>),
    Batch(Vec<Task<M>>),
}

impl<M: Send + 'static> Task<M> {
    pub fn none() -> Self {
        Task::None
    }

    pub fn future(fut: impl Future<Output = M> + Send + 'static) -> Self {
        Task::Future(fut.boxed())
    }

    pub fn stream(stream: impl Stream<Item = M> + Send + 'static) -> Self {
        Task::Stream(stream.boxed())
    }

    pub fn batch(tasks: impl IntoIterator<Item = Task<M>>) -> Self {
        let tasks: Vec<_> = tasks.into_iter().filter(|t| !t.is_none()).collect();
        if tasks.is_empty() {
            Task::None
        } else {
            Task::Batch(tasks)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Task::None)
    }

    /// Race a future against `token`; a cancelled future resolves to `on_cancel`.
    pub fn guarded(
        token: &CancellationToken,
        on_cancel: M,
        fut: impl Future<Output = M> + Send + 'static,
    ) -> Self {
        let token = token.clone();
        Task::future(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => on_cancel,
                msg = fut => msg,
            }
        })
    }

    /// Spawn every effect onto the runtime, forwarding outputs to `tx`.
    pub fn spawn(self, tx: &UnboundedSender<M>) {
        match self {
            Task::None => {}
            Task::Future(fut) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(fut.await);
                });
            }
            Task::Stream(mut stream) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Some(msg) = stream.next().await {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                });
            }
            Task::Batch(tasks) => {
                for task in tasks {
                    task.spawn(tx);
                }
            }
        }
    }
}

impl<M> std::fmt::Debug for Task<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::None => f.write_str("Task::None"),
            Task::Future(_) => f.write_str("Task::Future(..)"),
            Task::Stream(_) => f.write_str("Task::Stream(..)"),
            Task::Batch(tasks) => f.debug_tuple("Task::Batch").field(tasks).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn batch_of_nothing_is_none() {
        let task: Task<u32> = Task::batch(vec![Task::none(), Task::none()]);
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn spawned_futures_and_streams_report_back() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Task::batch(vec![
            Task::future(async { 1 }),
            Task::stream(futures::stream::iter(vec![2, 3])),
        ])
        .spawn(&tx);
        drop(tx);

        let mut seen = Vec::new();
        while let Some(v) = rx.recv().await {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_future_yields_fallback_once_cancelled() {
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        Task::guarded(&token, 0, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            1
        })
        .spawn(&tx);
        token.cancel();
        assert_eq!(rx.recv().await, Some(0));
    }
}
