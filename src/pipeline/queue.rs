//! 有界交接队列 (Bounded hand-off queue)
//!
//! 一个生产者, 一个消费者, 先进先出。队列满时按 `OverflowPolicy` 处理:
//! - DropOldest: 丢弃最旧的一项再放入 (实时显示优先)
//! - Block:      生产者等待空位, 直到取消信号触发

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use super::CancelToken;

/// 阻塞模式下每次等待的时间片
const BLOCK_SLICE: Duration = Duration::from_millis(10);

/// 队列溢出策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    Block,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    DroppedOldest(u64), // 为放入本项而丢弃的旧项数量
}

/// 发送失败时把数据还给调用方
#[derive(Debug)]
pub enum PublishError<T> {
    Disconnected(T),
    Cancelled(T),
}

impl<T> PublishError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PublishError::Disconnected(item) | PublishError::Cancelled(item) => item,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TakeError {
    Timeout,
    Disconnected,
}

/// 创建一对生产者/消费者
pub fn handoff<T>(capacity: usize, policy: OverflowPolicy) -> (Publisher<T>, Subscriber<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let closed = Arc::new(AtomicBool::new(false));
    (
        Publisher {
            tx,
            evict: rx.clone(),
            policy,
            dropped: dropped.clone(),
            closed: closed.clone(),
        },
        Subscriber {
            rx,
            dropped,
            closed,
        },
    )
}

pub struct Publisher<T> {
    tx: Sender<T>,
    evict: Receiver<T>, // 仅用于丢弃最旧项
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl<T> Publisher<T> {
    pub fn publish(&self, item: T, cancel: &CancelToken) -> Result<PublishOutcome, PublishError<T>> {
        if self.is_closed() {
            return Err(PublishError::Disconnected(item));
        }
        match self.policy {
            OverflowPolicy::DropOldest => self.publish_drop_oldest(item),
            OverflowPolicy::Block => self.publish_blocking(item, cancel),
        }
    }

    fn publish_drop_oldest(&self, mut item: T) -> Result<PublishOutcome, PublishError<T>> {
        let mut evicted = 0;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    return Ok(if evicted == 0 {
                        PublishOutcome::Delivered
                    } else {
                        PublishOutcome::DroppedOldest(evicted)
                    });
                }
                Err(TrySendError::Full(back)) => {
                    item = back;
                    // 消费者可能刚好取走了一项, 此时直接重试
                    if self.evict.try_recv().is_ok() {
                        evicted += 1;
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(TrySendError::Disconnected(back)) => return Err(PublishError::Disconnected(back)),
            }
        }
    }

    fn publish_blocking(&self, mut item: T, cancel: &CancelToken) -> Result<PublishOutcome, PublishError<T>> {
        loop {
            match self.tx.send_timeout(item, BLOCK_SLICE) {
                Ok(()) => return Ok(PublishOutcome::Delivered),
                Err(SendTimeoutError::Timeout(back)) => {
                    if self.is_closed() {
                        return Err(PublishError::Disconnected(back));
                    }
                    if cancel.is_cancelled() {
                        return Err(PublishError::Cancelled(back));
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(back)) => return Err(PublishError::Disconnected(back)),
            }
        }
    }

    /// 消费者已被释放
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct Subscriber<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl<T> Subscriber<T> {
    /// 非阻塞获取 (界面线程使用)
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// 最多等待 `timeout` (工作线程使用)
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, TakeError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TakeError::Timeout,
            RecvTimeoutError::Disconnected => TakeError::Disconnected,
        })
    }

    /// 供 `select!` 使用
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 生产者因队列满而丢弃的数量
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let cancel = CancelToken::new();
        let (tx, rx) = handoff::<u32>(16, OverflowPolicy::Block);
        for i in 0..10 {
            assert_eq!(tx.publish(i, &cancel).unwrap(), PublishOutcome::Delivered);
        }
        let got: Vec<u32> = std::iter::from_fn(|| rx.try_take()).collect();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let cancel = CancelToken::new();
        let (tx, rx) = handoff::<u32>(3, OverflowPolicy::DropOldest);
        for i in 0..3 {
            tx.publish(i, &cancel).unwrap();
        }
        assert_eq!(tx.publish(3, &cancel).unwrap(), PublishOutcome::DroppedOldest(1));
        assert_eq!(tx.publish(4, &cancel).unwrap(), PublishOutcome::DroppedOldest(1));
        let got: Vec<u32> = std::iter::from_fn(|| rx.try_take()).collect();
        assert_eq!(got, vec![2, 3, 4]);
        assert_eq!(rx.dropped(), 2);
    }

    #[test]
    fn test_block_gives_up_on_cancel() {
        let cancel = CancelToken::new();
        let (tx, _rx) = handoff::<u32>(1, OverflowPolicy::Block);
        tx.publish(1, &cancel).unwrap();

        let canceller = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });
        match tx.publish(2, &cancel) {
            Err(PublishError::Cancelled(item)) => assert_eq!(item, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_block_waits_for_consumer() {
        let cancel = CancelToken::new();
        let (tx, rx) = handoff::<u32>(1, OverflowPolicy::Block);
        tx.publish(1, &cancel).unwrap();
        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let first = rx.take_timeout(Duration::from_secs(1)).unwrap();
            let second = rx.take_timeout(Duration::from_secs(1)).unwrap();
            (first, second)
        });
        assert_eq!(tx.publish(2, &cancel).unwrap(), PublishOutcome::Delivered);
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn test_subscriber_sees_disconnect_after_drain() {
        let cancel = CancelToken::new();
        let (tx, rx) = handoff::<u32>(4, OverflowPolicy::DropOldest);
        tx.publish(7, &cancel).unwrap();
        drop(tx);
        assert_eq!(rx.take_timeout(Duration::from_millis(10)), Ok(7));
        assert_eq!(rx.take_timeout(Duration::from_millis(10)), Err(TakeError::Disconnected));
    }

    #[test]
    fn test_publisher_sees_closed_subscriber() {
        let cancel = CancelToken::new();
        let (tx, rx) = handoff::<u32>(4, OverflowPolicy::DropOldest);
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.publish(1, &cancel), Err(PublishError::Disconnected(1))));
    }

    #[test]
    fn test_empty_queue_timeout() {
        let (_tx, rx) = handoff::<u32>(4, OverflowPolicy::Block);
        assert!(rx.try_take().is_none());
        assert_eq!(rx.take_timeout(Duration::from_millis(5)), Err(TakeError::Timeout));
    }
}
