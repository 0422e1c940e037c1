//! In-memory queue implementation.

use std::sync::Mutex;

use crate::queue::{MessageIter, Queue, QueueError};

/// A concurrent-safe message bag backed by a growable vector.
///
/// The iterator dequeues from the tail (LIFO). That is intentional:
/// popping from the head would shift the buffer and prevent reuse of
/// the already allocated storage for future supersteps.
pub struct InMemoryQueue<M> {
    messages: Mutex<Vec<M>>,
}

impl<M> InMemoryQueue<M> {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl<M> Default for InMemoryQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + Sync> Queue<M> for InMemoryQueue<M> {
    fn enqueue(&self, message: M) -> Result<(), QueueError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn has_pending(&self) -> bool {
        !self.messages.lock().unwrap().is_empty()
    }

    fn discard(&self) -> Result<(), QueueError> {
        // Truncates the length, retaining capacity.
        self.messages.lock().unwrap().clear();
        Ok(())
    }

    fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }

    fn messages(&self) -> Box<dyn MessageIter<M> + '_> {
        Box::new(InMemoryIter {
            messages: &self.messages,
        })
    }
}

struct InMemoryIter<'a, M> {
    messages: &'a Mutex<Vec<M>>,
}

impl<M> MessageIter<M> for InMemoryIter<'_, M> {
    fn next_message(&mut self) -> Option<M> {
        self.messages.lock().unwrap().pop()
    }

    fn error(&self) -> Option<QueueError> {
        None
    }
}
