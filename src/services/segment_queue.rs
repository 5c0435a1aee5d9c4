use crate::models::SegmentHandle;
use tokio::sync::{mpsc, Mutex};

/// Capacity of the Segment Queue.
pub const Q_MAX: usize = 5;

/// Bounded FIFO of rendered segment handles. Single producer (the
/// scheduler), single consumer (the transport). `peek_len` is a cheap size
/// read the scheduler polls to decide whether to plan more.
pub struct SegmentQueue {
    tx: mpsc::Sender<SegmentHandle>,
    rx: Mutex<mpsc::Receiver<SegmentHandle>>,
    len: std::sync::atomic::AtomicUsize,
}

impl SegmentQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(Q_MAX);
        Self {
            tx,
            rx: Mutex::new(rx),
            len: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Non-blocking offer; the scheduler is expected to gate on `peek_len`
    /// before calling this, but a full queue still fails cleanly rather
    /// than blocking the scheduler task.
    pub fn offer(&self, handle: SegmentHandle) -> Result<(), SegmentHandle> {
        match self.tx.try_send(handle) {
            Ok(()) => {
                self.len.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(h)) => Err(h),
            Err(mpsc::error::TrySendError::Closed(h)) => Err(h),
        }
    }

    /// Transport removes and returns the head, or `None` if empty —
    /// callers treat `None` as "emit silence until the next handle arrives".
    pub async fn consume_head(&self) -> Option<SegmentHandle> {
        let mut rx = self.rx.lock().await;
        let handle = rx.recv().await;
        if handle.is_some() {
            self.len.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        }
        handle
    }

    /// Non-blocking variant for request/response callers (the transport
    /// polling `/segments/next`): returns `None` immediately rather than
    /// waiting for a handle to arrive.
    pub async fn try_consume_head(&self) -> Option<SegmentHandle> {
        let mut rx = self.rx.lock().await;
        match rx.try_recv() {
            Ok(handle) => {
                self.len.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                Some(handle)
            }
            Err(_) => None,
        }
    }

    pub fn peek_len(&self) -> usize {
        self.len.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for SegmentQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn handle(i: i64) -> SegmentHandle {
        SegmentHandle {
            segment_index: i,
            track_id: Uuid::new_v4(),
            file_path: format!("segment_{i}.mp3"),
            duration_sec: 30.0,
        }
    }

    #[tokio::test]
    async fn offer_fails_once_capacity_is_reached() {
        let q = SegmentQueue::new();
        for i in 0..Q_MAX as i64 {
            assert!(q.offer(handle(i)).is_ok());
        }
        assert!(q.offer(handle(99)).is_err());
        assert_eq!(q.peek_len(), Q_MAX);
    }

    #[tokio::test]
    async fn consume_head_is_strict_fifo() {
        let q = SegmentQueue::new();
        q.offer(handle(0)).unwrap();
        q.offer(handle(1)).unwrap();

        let first = q.consume_head().await.unwrap();
        assert_eq!(first.segment_index, 0);
        let second = q.consume_head().await.unwrap();
        assert_eq!(second.segment_index, 1);
        assert_eq!(q.peek_len(), 0);
    }
}
