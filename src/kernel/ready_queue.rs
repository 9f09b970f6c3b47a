use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex};

use super::{ProcessControlBlock, ProcessSnapshot};

struct QueueState {
    pcbs: VecDeque<ProcessControlBlock>,
    interrupted: bool,
}

/// FIFO hand-off between admission and dispatch.
///
/// Ordering is strictly by enqueue; the short-term scheduler decides which
/// entry actually runs next.
pub struct ReadyQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ReadyQueue {
    pub fn new() -> ReadyQueue {
        ReadyQueue {
            state: Mutex::new(QueueState {
                pcbs: VecDeque::new(),
                interrupted: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn enqueue(&self, pcb: ProcessControlBlock) {
        debug!("[ReadyQueue] Process added: {:?}", pcb);
        self.state.lock().pcbs.push_back(pcb);
        self.available.notify_one();
    }

    /// Enqueues unless the queue has been interrupted, in which case the
    /// process is handed back. The check and the push happen under one lock.
    pub fn try_enqueue(&self, pcb: ProcessControlBlock) -> Result<(), ProcessControlBlock> {
        let mut state = self.state.lock();
        if state.interrupted {
            return Err(pcb);
        }
        debug!("[ReadyQueue] Process added: {:?}", pcb);
        state.pcbs.push_back(pcb);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    pub fn extend(&self, pcbs: Vec<ProcessControlBlock>) {
        let count = pcbs.len();
        self.state.lock().pcbs.extend(pcbs);
        for _ in 0..count {
            self.available.notify_one();
        }
    }

    /// Blocks until a process is available. Returns `None` once the queue has
    /// been interrupted and is empty.
    pub fn dequeue(&self) -> Option<ProcessControlBlock> {
        let mut state = self.state.lock();
        loop {
            if let Some(pcb) = state.pcbs.pop_front() {
                return Some(pcb);
            }
            if state.interrupted {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<ProcessControlBlock> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(pcb) = state.pcbs.pop_front() {
                return Some(pcb);
            }
            if state.interrupted {
                return None;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return state.pcbs.pop_front();
            }
        }
    }

    /// Wakes every blocked `dequeue`. Queued entries can still be taken.
    pub fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.available.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pcbs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().pcbs.len()
    }

    /// Removes every queued process in FIFO order.
    pub fn drain(&self) -> Vec<ProcessControlBlock> {
        self.state.lock().pcbs.drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.state.lock().pcbs.iter().map(|pcb| pcb.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crossbeam_channel::{unbounded, RecvTimeoutError};

    use super::*;
    use crate::kernel::{Instruction, MemoryRange};

    fn pcb(id: u32) -> ProcessControlBlock {
        let range = MemoryRange {
            start: id as usize * 100,
            end: id as usize * 100 + 99,
        };
        ProcessControlBlock::new(id, range, 0, id as u64, vec![Instruction::print("x")]).unwrap()
    }

    #[test]
    fn test_ready_queue_is_fifo() {
        let queue = ReadyQueue::new();
        queue.enqueue(pcb(1));
        queue.enqueue(pcb(2));
        queue.enqueue(pcb(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().map(|p| p.get_id()), Some(1));
        assert_eq!(queue.dequeue().map(|p| p.get_id()), Some(2));
        assert_eq!(queue.dequeue().map(|p| p.get_id()), Some(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ready_queue_drain_and_extend_keep_order() {
        let queue = ReadyQueue::new();
        queue.extend(vec![pcb(1), pcb(2)]);
        queue.enqueue(pcb(3));

        let drained: Vec<_> = queue.drain().iter().map(|p| p.get_id()).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ready_queue_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(ReadyQueue::new());
        let (tx, rx) = unbounded();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let pcb = queue.dequeue();
                let _ = tx.send(pcb.map(|p| p.get_id()));
            })
        };

        assert_eq!(rx.recv_timeout(Duration::from_millis(50)), Err(RecvTimeoutError::Timeout));

        queue.enqueue(pcb(9));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(Some(9)));
        consumer.join().unwrap();
    }

    #[test]
    fn test_ready_queue_one_enqueue_wakes_one_waiter() {
        let queue = Arc::new(ReadyQueue::new());
        let (tx, rx) = unbounded();

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    let _ = tx.send(queue.dequeue().map(|p| p.get_id()));
                })
            })
            .collect();
        drop(tx);

        queue.enqueue(pcb(1));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(Some(1)));
        assert_eq!(rx.recv_timeout(Duration::from_millis(50)), Err(RecvTimeoutError::Timeout));

        queue.interrupt();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(None));
        for consumer in consumers {
            consumer.join().unwrap();
        }
    }

    #[test]
    fn test_ready_queue_interrupt_releases_blocked_dequeue() {
        let queue = Arc::new(ReadyQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue().map(|p| p.get_id()))
        };

        thread::sleep(Duration::from_millis(20));
        queue.interrupt();

        assert_eq!(consumer.join().unwrap(), None);
        assert!(queue.is_interrupted());
    }

    #[test]
    fn test_ready_queue_interrupted_still_drains_entries() {
        let queue = ReadyQueue::new();
        queue.enqueue(pcb(1));
        queue.interrupt();

        assert_eq!(queue.dequeue().map(|p| p.get_id()), Some(1));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_ready_queue_try_enqueue_refused_after_interrupt() {
        let queue = ReadyQueue::new();
        assert!(queue.try_enqueue(pcb(1)).is_ok());

        queue.interrupt();
        let refused = queue.try_enqueue(pcb(2)).unwrap_err();

        assert_eq!(refused.get_id(), 2);
        assert_eq!(queue.len(), 1);
        // Plain enqueue still works so the dispatcher can put work back.
        queue.enqueue(pcb(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_ready_queue_dequeue_timeout_on_empty_queue() {
        let queue = ReadyQueue::new();
        let start = Instant::now();
        assert!(queue.dequeue_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));

        queue.enqueue(pcb(4));
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(30)).map(|p| p.get_id()), Some(4));
    }

    #[test]
    fn test_ready_queue_snapshot() {
        let queue = ReadyQueue::new();
        queue.enqueue(pcb(1));
        queue.enqueue(pcb(2));

        let ids: Vec<_> = queue.snapshot().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(queue.len(), 2);
    }
}
