//! Bounded processing queue: single producer side fed by the watcher (and
//! worker re-enqueues), single consumer (the worker task).
//!
//! Queue membership is not the source of truth for pending work; the intake
//! directory is. A full queue therefore rejects instead of blocking, and the
//! rejected file simply stays in the intake directory for the watcher to
//! re-announce.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("processing queue is full ({0} entries)")]
    Full(usize),
}

struct QueueState {
    items: VecDeque<PathBuf>,
    closed: bool,
}

pub struct ProcessingQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl ProcessingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn enqueue(&self, path: PathBuf) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            if state.items.len() >= self.capacity {
                return Err(QueueError::Full(self.capacity));
            }
            state.items.push_back(path);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for the next entry. Returns `None` once the queue has been
    /// closed and drained, which is the worker's signal to exit.
    ///
    /// Single-consumer: `notify_one` stores a permit, so a notification
    /// sent between the state check and the await is never lost for the
    /// one worker this queue feeds.
    pub async fn dequeue(&self) -> Option<PathBuf> {
        loop {
            {
                let mut state = self.state.lock().expect("queue mutex poisoned");
                if let Some(path) = state.items.pop_front() {
                    return Some(path);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Cooperative shutdown: in-flight processing finishes, the worker
    /// exits once the queue is drained.
    pub fn close(&self) {
        self.state.lock().expect("queue mutex poisoned").closed = true;
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fifo_order() {
        let q = ProcessingQueue::new(8);
        q.enqueue(PathBuf::from("a")).unwrap();
        q.enqueue(PathBuf::from("b")).unwrap();
        q.enqueue(PathBuf::from("c")).unwrap();
        assert_eq!(q.dequeue().await, Some(PathBuf::from("a")));
        assert_eq!(q.dequeue().await, Some(PathBuf::from("b")));
        assert_eq!(q.dequeue().await, Some(PathBuf::from("c")));
    }

    #[tokio::test]
    async fn rejects_when_full() {
        let q = ProcessingQueue::new(2);
        q.enqueue(PathBuf::from("a")).unwrap();
        q.enqueue(PathBuf::from("b")).unwrap();
        assert_eq!(q.enqueue(PathBuf::from("c")), Err(QueueError::Full(2)));
        // Draining frees capacity again.
        q.dequeue().await.unwrap();
        q.enqueue(PathBuf::from("c")).unwrap();
    }

    #[tokio::test]
    async fn close_drains_then_returns_none() {
        let q = ProcessingQueue::new(8);
        q.enqueue(PathBuf::from("a")).unwrap();
        q.close();
        assert_eq!(q.dequeue().await, Some(PathBuf::from("a")));
        assert_eq!(q.dequeue().await, None);
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_enqueue() {
        let q = Arc::new(ProcessingQueue::new(8));
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.dequeue().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        q.enqueue(PathBuf::from("late")).unwrap();
        assert_eq!(consumer.await.unwrap(), Some(PathBuf::from("late")));
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_close() {
        let q = Arc::new(ProcessingQueue::new(8));
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.dequeue().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        q.close();
        assert_eq!(consumer.await.unwrap(), None);
    }
}
