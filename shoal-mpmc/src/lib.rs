//! Blocking multi-producer, multi-consumer channels.
//!
//! This crate provides MPMC channels similar to `std::sync::mpsc` but with
//! support for multiple receivers, in both unbounded ([`channel`]) and
//! bounded ([`sync_channel`]) variants. The bounded variant blocks senders
//! while the buffer is full, which is what the reduction engine relies on
//! for backpressure between its driver, workers and assembler.
//!
//! **Note**: this implementation should be replaced with `std::sync::mpmc`
//! once it becomes stabilized in the Rust standard library.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// Creates a new unbounded channel, returning the sender/receiver halves.
///
/// Messages become available on the [`Receiver`] in send order. `send` never
/// blocks; `recv` blocks until a message is available while at least one
/// [`Sender`] (including clones) is alive. Once every sender is dropped,
/// `recv` drains the remaining buffer and then reports disconnection.
///
/// Both halves can be cloned to share the channel between threads.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Shared::new(None);
    (Sender(shared.clone()), Receiver(shared))
}

/// Creates a new bounded channel with an internal buffer of `bound` messages.
///
/// When the buffer is full, `send` blocks until a receiver makes room or all
/// receivers disconnect. Everything else behaves as for [`channel`].
///
/// # Panics
///
/// Panics if `bound` is zero (rendezvous channels are not supported).
pub fn sync_channel<T>(bound: usize) -> (Sender<T>, Receiver<T>) {
    assert_ne!(bound, 0, "sync_channel does not support zero bound");
    let shared = Shared::new(Some(bound));
    (Sender(shared.clone()), Receiver(shared))
}

/// The sending half of a [`channel`] or [`sync_channel`].
pub struct Sender<T>(Arc<Shared<T>>);

impl<T> Sender<T> {
    /// Sends a value, blocking while a bounded buffer is full.
    ///
    /// Returns the message back inside [`std::sync::mpsc::SendError`] when
    /// every receiver has been dropped; the message will never be received.
    pub fn send(&self, msg: T) -> Result<(), std::sync::mpsc::SendError<T>> {
        self.0.push(msg).map_err(std::sync::mpsc::SendError)
    }

    /// Attempts to send without blocking.
    pub fn try_send(&self, msg: T) -> Result<(), std::sync::mpsc::TrySendError<T>> {
        self.0.try_push(msg)
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.0.state.lock().expect("mpmc lock").senders += 1;
        Sender(self.0.clone())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.0.drop_sender();
    }
}

/// The receiving half of a [`channel`] or [`sync_channel`]. Clone it to
/// share one stream of messages between several consumer threads.
pub struct Receiver<T>(Arc<Shared<T>>);

impl<T> Receiver<T> {
    /// Receives a value, blocking until one is available.
    ///
    /// When every sender is gone, the remaining buffered messages are still
    /// delivered; only then does `recv` report disconnection.
    pub fn recv(&self) -> Result<T, std::sync::mpsc::RecvError> {
        self.0.pop()
    }

    /// Attempts to receive without blocking.
    pub fn try_recv(&self) -> Result<T, std::sync::mpsc::TryRecvError> {
        self.0.try_pop()
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.0.state.lock().expect("mpmc lock").receivers += 1;
        Receiver(self.0.clone())
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.0.drop_receiver();
    }
}

struct State<T> {
    queue: VecDeque<T>,
    senders: usize,
    receivers: usize,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// `None` for unbounded channels.
    capacity: Option<usize>,
    /// Signaled when a message is pushed or the last sender leaves.
    readable: Condvar,
    /// Signaled when a message is popped or the last receiver leaves.
    writable: Condvar,
}

impl<T> Shared<T> {
    fn new(capacity: Option<usize>) -> Arc<Shared<T>> {
        Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                senders: 1,
                receivers: 1,
            }),
            capacity,
            readable: Condvar::new(),
            writable: Condvar::new(),
        })
    }

    fn push(&self, msg: T) -> Result<(), T> {
        let mut state = self.state.lock().expect("mpmc lock");
        loop {
            if state.receivers == 0 {
                return Err(msg);
            }
            match self.capacity {
                Some(cap) if state.queue.len() >= cap => {
                    state = self.writable.wait(state).expect("mpmc lock");
                }
                _ => break,
            }
        }
        state.queue.push_back(msg);
        drop(state);
        self.readable.notify_one();
        Ok(())
    }

    fn try_push(&self, msg: T) -> Result<(), std::sync::mpsc::TrySendError<T>> {
        let mut state = self.state.lock().expect("mpmc lock");
        if state.receivers == 0 {
            return Err(std::sync::mpsc::TrySendError::Disconnected(msg));
        }
        if let Some(cap) = self.capacity {
            if state.queue.len() >= cap {
                return Err(std::sync::mpsc::TrySendError::Full(msg));
            }
        }
        state.queue.push_back(msg);
        drop(state);
        self.readable.notify_one();
        Ok(())
    }

    fn pop(&self) -> Result<T, std::sync::mpsc::RecvError> {
        let mut state = self.state.lock().expect("mpmc lock");
        loop {
            if let Some(msg) = state.queue.pop_front() {
                drop(state);
                self.writable.notify_one();
                return Ok(msg);
            }
            if state.senders == 0 {
                return Err(std::sync::mpsc::RecvError);
            }
            state = self.readable.wait(state).expect("mpmc lock");
        }
    }

    fn try_pop(&self) -> Result<T, std::sync::mpsc::TryRecvError> {
        let mut state = self.state.lock().expect("mpmc lock");
        if let Some(msg) = state.queue.pop_front() {
            drop(state);
            self.writable.notify_one();
            return Ok(msg);
        }
        if state.senders == 0 {
            return Err(std::sync::mpsc::TryRecvError::Disconnected);
        }
        Err(std::sync::mpsc::TryRecvError::Empty)
    }

    fn drop_sender(&self) {
        let mut state = self.state.lock().expect("mpmc lock");
        state.senders -= 1;
        if state.senders == 0 {
            drop(state);
            // Wake receivers blocked on an empty queue so they can observe
            // the disconnect.
            self.readable.notify_all();
        }
    }

    fn drop_receiver(&self) {
        let mut state = self.state.lock().expect("mpmc lock");
        state.receivers -= 1;
        if state.receivers == 0 {
            drop(state);
            self.writable.notify_all();
        }
    }
}
