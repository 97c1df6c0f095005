//! Fixed-capacity circular FIFO queue backing one scheduler lane.

use crate::types::Task;

/// Ring buffer of tasks; never grows past the capacity it was created with.
pub struct TaskQueue {
    slots: Vec<Option<Task>>,
    head: usize,
    tail: usize,
    size: usize,
}

impl TaskQueue {
    /// Create an empty queue with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    /// Push a task at the tail; returns the task back if the queue is full.
    pub fn enqueue(&mut self, task: Task) -> Result<(), Task> {
        if self.is_full() {
            return Err(task);
        }
        debug_assert!(self.slots[self.tail].is_none(), "tail slot occupied");
        self.slots[self.tail] = Some(task);
        self.tail = (self.tail + 1) % self.capacity();
        self.size += 1;
        Ok(())
    }

    /// Pop the head task, leaving its slot empty.
    pub fn dequeue(&mut self) -> Option<Task> {
        if self.size == 0 {
            return None;
        }
        let task = self.slots[self.head].take();
        debug_assert!(task.is_some(), "head slot empty while size > 0");
        self.head = (self.head + 1) % self.capacity();
        self.size -= 1;
        task
    }

    #[allow(dead_code)]
    pub fn peek_front(&self) -> Option<&Task> {
        if self.size == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Current number of queued tasks.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// A zero-capacity queue is always full.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Tasks in FIFO order, head first.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            offset: 0,
        }
    }
}

/// Borrowing FIFO iterator over a [`TaskQueue`].
pub struct Iter<'a> {
    queue: &'a TaskQueue,
    offset: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.queue.size {
            return None;
        }
        let index = (self.queue.head + self.offset) % self.queue.capacity();
        self.offset += 1;
        self.queue.slots[index].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.queue.size - self.offset;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a TaskQueue {
    type Item = &'a Task;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
