use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Append-only queue between the simulation thread and the client-poll path
///
/// `drain` swaps the whole queue out under the lock, so every pushed item
/// is returned by exactly one drain, in push order.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    queue: Mutex<VecDeque<T>>,
}

impl<T> SampleBuffer<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, item: T) {
        self.queue().push_back(item);
    }

    /// Remove and return everything pending; never waits for new data
    pub fn drain(&self) -> Vec<T> {
        let pending = std::mem::take(&mut *self.queue());
        pending.into()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_empties_buffer() {
        let buffer = SampleBuffer::new();
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.drain(), vec![1, 2]);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_concurrent_drain_loses_nothing() {
        let buffer = Arc::new(SampleBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    buffer.push(i);
                }
            })
        };
        let mut seen = Vec::new();
        while !producer.is_finished() {
            seen.extend(buffer.drain());
        }
        producer.join().unwrap();
        seen.extend(buffer.drain());
        assert_eq!(seen, (0..10_000).collect::<Vec<_>>());
    }
}
