// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Event queue between the interrupt dispatcher and the channel worker.
//!
//! A ring buffer over caller-provided storage. The dispatcher posts from
//! interrupt context, the worker receives from thread context; both sides
//! run inside a critical section. One slot of the storage is always left
//! empty, so a ring of `n` slots holds at most `n - 1` events.

use core::cell::RefCell;

use critical_section::Mutex;

use super::interrupt::{DmaEvent, DmaEventSink};
use crate::ErrorCode;

struct Ring<'a> {
    ring: &'a mut [DmaEvent],
    head: usize,
    tail: usize,
}

impl Ring<'_> {
    fn is_full(&self) -> bool {
        self.head == ((self.tail + 1) % self.ring.len())
    }

    fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            (self.ring.len() - self.head) + self.tail
        }
    }

    fn enqueue(&mut self, event: DmaEvent) -> bool {
        if self.ring.is_empty() || self.is_full() {
            false
        } else {
            self.ring[self.tail] = event;
            self.tail = (self.tail + 1) % self.ring.len();
            true
        }
    }

    fn dequeue(&mut self) -> Option<DmaEvent> {
        if self.head != self.tail {
            let event = self.ring[self.head];
            self.head = (self.head + 1) % self.ring.len();
            Some(event)
        } else {
            None
        }
    }
}

pub struct EventQueue<'a> {
    inner: Mutex<RefCell<Ring<'a>>>,
}

impl<'a> EventQueue<'a> {
    pub fn new(ring: &'a mut [DmaEvent]) -> EventQueue<'a> {
        EventQueue {
            inner: Mutex::new(RefCell::new(Ring {
                ring,
                head: 0,
                tail: 0,
            })),
        }
    }

    /// Take the oldest event, if any.
    pub fn receive(&self) -> Option<DmaEvent> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().dequeue())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DmaEventSink for EventQueue<'_> {
    fn post(&self, event: DmaEvent) -> Result<(), ErrorCode> {
        critical_section::with(|cs| {
            if self.inner.borrow(cs).borrow_mut().enqueue(event) {
                Ok(())
            } else {
                Err(ErrorCode::BUSY)
            }
        })
    }
}
