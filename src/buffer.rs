use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::Error;
use crate::Frame;

pub const DEFAULT_CAPACITY: usize = 2;

#[derive(thiserror::Error, Debug)]
#[error("stream buffer is closed")]
pub struct Closed(pub Frame);

pub struct StreamBuffer {
    state: Mutex<BufferState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct BufferState {
    frames: VecDeque<Frame>,
    closed: bool,
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        StreamBuffer {
            state: Mutex::new(BufferState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    // the queue stays valid even if a holder panicked
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, frame: Frame) -> Result<(), Closed> {
        let mut state = self.lock();
        while !state.closed && state.frames.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(Closed(frame));
        }
        state.frames.push_back(frame);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                self.not_full.notify_one();
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn close(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::AlreadyClosed);
        }
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
