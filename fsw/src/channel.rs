//! Bounded single-producer single-consumer path for received bus datagrams.
//!
//! The producer half belongs to the bus driver (interrupt context on the
//! real board, the scenario harness in simulation). The consumer half is
//! drained by the mode manager, at most one datagram per control cycle.

use cdh_protocol::BusDatagram;
use heapless::spsc::{Consumer, Producer, Queue};
use thiserror::Error;
use tracing::warn;

/// One slot of the underlying ring is always kept free
pub const BUS_RX_SLOTS: usize = 4;
pub const BUS_RX_CAPACITY: usize = BUS_RX_SLOTS - 1;

pub struct BusRxQueue {
    queue: Queue<BusDatagram, BUS_RX_SLOTS>,
}

impl Default for BusRxQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BusRxQueue {
    pub fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    pub fn split(&mut self) -> (BusRxProducer<'_>, BusRxConsumer<'_>) {
        let (tx, rx) = self.queue.split();
        (BusRxProducer(tx), BusRxConsumer(rx))
    }
}

pub struct BusRxProducer<'q>(Producer<'q, BusDatagram, BUS_RX_SLOTS>);

impl<'q> BusRxProducer<'q> {
    /// Hand a received datagram to the control loop. When the queue is full
    /// the datagram is dropped.
    pub fn push(&mut self, dg: BusDatagram) -> Result<(), ChannelError> {
        self.0.enqueue(dg).map_err(|dropped| {
            warn!(id = %dropped.id, "Bus receive queue full, dropping datagram");
            ChannelError::QueueFull
        })
    }

    pub fn is_full(&self) -> bool {
        !self.0.ready()
    }
}

pub struct BusRxConsumer<'q>(Consumer<'q, BusDatagram, BUS_RX_SLOTS>);

impl<'q> BusRxConsumer<'q> {
    /// Non-blocking, returns at most one datagram
    pub fn recv(&mut self) -> Option<BusDatagram> {
        self.0.dequeue()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.0.ready()
    }

    /// Drop everything still queued
    pub fn clear(&mut self) {
        while self.0.dequeue().is_some() {}
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum ChannelError {
    #[error("Queue full")]
    QueueFull,
}
