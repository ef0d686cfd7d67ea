//! Dispatch queues
//!
//! The handoff point between classification and packet consumers: every
//! class of service dispatches into one of these.
//!
//! # Design
//! - Multi-producer: any number of workers enqueue concurrently
//! - FIFO: a single lock serializes enqueues into one total order
//! - Blocking consume: `dequeue` parks until a packet or close arrives
//! - Close-and-drain: after `close`, queued packets remain readable;
//!   a drained closed queue reports [`SteerError::QueueClosed`]

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use steer_common::{RawPacket, SteerError, SteerResult};

#[derive(Debug)]
struct Inner {
    items: VecDeque<RawPacket>,
    closed: bool,
}

/// FIFO packet queue feeding one class of service
#[derive(Debug)]
pub struct DispatchQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: Option<usize>,
}

impl DispatchQueue {
    /// Queue that grows without bound
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue that refuses enqueues beyond `capacity` packets
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Append a packet
    ///
    /// Never blocks. A bounded queue at capacity returns
    /// [`SteerError::QueueFull`]; a closed queue returns
    /// [`SteerError::QueueClosed`] and the packet is dropped.
    pub fn enqueue(&self, pkt: RawPacket) -> SteerResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SteerError::QueueClosed);
        }
        if let Some(cap) = self.capacity {
            if inner.items.len() >= cap {
                return Err(SteerError::QueueFull(cap));
            }
        }
        inner.items.push_back(pkt);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest packet, blocking until one is available
    ///
    /// Returns [`SteerError::QueueClosed`] once the queue is closed and
    /// every remaining packet has been drained.
    pub fn dequeue(&self) -> SteerResult<RawPacket> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(pkt) = inner.items.pop_front() {
                return Ok(pkt);
            }
            if inner.closed {
                return Err(SteerError::QueueClosed);
            }
            self.available.wait(&mut inner);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`,
    /// returning `Ok(None)`
    pub fn dequeue_timeout(&self, timeout: Duration) -> SteerResult<Option<RawPacket>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(pkt) = inner.items.pop_front() {
                return Ok(Some(pkt));
            }
            if inner.closed {
                return Err(SteerError::QueueClosed);
            }
            if self.available.wait_until(&mut inner, deadline).timed_out() {
                return Ok(None);
            }
        }
    }

    /// Non-blocking dequeue; `Ok(None)` when the queue is open but empty
    pub fn try_dequeue(&self) -> SteerResult<Option<RawPacket>> {
        let mut inner = self.inner.lock();
        match inner.items.pop_front() {
            Some(pkt) => Ok(Some(pkt)),
            None if inner.closed => Err(SteerError::QueueClosed),
            None => Ok(None),
        }
    }

    /// Close the queue and wake every blocked consumer
    ///
    /// Enqueues fail from this point on; already-queued packets stay
    /// readable. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.closed = true;
            drop(inner);
            self.available.notify_all();
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Packets currently queued
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// True when no packets are queued
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Configured bound, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}
