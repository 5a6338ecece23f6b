// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Socket interrupt dispatch.
//!
//! Each IP block raises one interrupt for all of its sockets. The block
//! handler reads the block's socket interrupt bitmap and services every
//! socket with a bit set. What happens next depends on who owns the socket:
//!
//! - A socket attached to a channel has its interrupts drained and the
//!   combined status is posted as a [`DmaEvent`] to the worker through the
//!   [`DmaEventSink`]. The handler never calls into the channel layer.
//! - A socket without a channel goes to the [`SocketEventClient`]
//!   registered with [`DmaSubsystem::register_callback`], which is then
//!   responsible for acknowledging it.
//! - Anything else is spurious; it is logged and acknowledged.
//!
//! Suspend and partial buffer interrupts are *masked* rather than
//! acknowledged on a channel socket. The latched condition stays visible in
//! the interrupt register until the channel resumes the socket.

use tock_registers::LocalRegisterCopy;

use super::socket::{IpBlock, SocketId, SocketReg, SCK_INTR, SUSPEND_INTERRUPTS};
use super::DmaSubsystem;
use crate::config::CONFIG;
use crate::support;
use crate::ErrorCode;

/// Interrupt vectors of the socket interrupts.
pub mod irqs {
    pub const PIB_DMA: u32 = 5;
    pub const UIB_INGRESS_DMA: u32 = 6;
    pub const UIB_EGRESS_DMA: u32 = 7;
    pub const SIB_DMA: u32 = 16;
    pub const LPP_DMA: u32 = 24;
}

/// Identifies the module that produced a worker message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleId(pub u16);

impl ModuleId {
    /// Messages posted from socket interrupt context.
    pub const DMA_INTERRUPT: ModuleId = ModuleId(0x0010);
}

/// Opaque token the channel layer attaches to a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelHandle(pub usize);

/// Message delivered to the channel worker for a socket interrupt.
#[derive(Clone, Copy)]
pub struct DmaEvent {
    /// Set for events raised by hardware, clear for replies.
    pub request: bool,
    pub source: ModuleId,
    pub socket: SocketId,
    pub channel: ChannelHandle,
    /// Every interrupt collected while draining the socket.
    pub status: LocalRegisterCopy<u32, SCK_INTR::Register>,
    /// Descriptor the socket was working on.
    pub chain_head: u16,
}

impl Default for DmaEvent {
    fn default() -> DmaEvent {
        DmaEvent {
            request: false,
            source: ModuleId(0),
            socket: SocketId::from_raw(0),
            channel: ChannelHandle(0),
            status: LocalRegisterCopy::new(0),
            chain_head: 0,
        }
    }
}

/// Destination of events posted from interrupt context.
pub trait DmaEventSink {
    /// Queue `event` without blocking. Fails with `BUSY` when full.
    fn post(&self, event: DmaEvent) -> Result<(), ErrorCode>;
}

/// Receiver of interrupts on sockets that no channel owns.
pub trait SocketEventClient {
    /// `status` is the pending, unmasked interrupt set. The interrupt has not
    /// been acknowledged.
    fn socket_event(&self, socket: SocketId, status: u32);
}

/// Who a socket's interrupts are routed to.
#[derive(Clone, Copy)]
pub enum SocketOwner<'a> {
    Channel(ChannelHandle),
    Callback(&'a dyn SocketEventClient),
    Unowned,
}

impl<'a> DmaSubsystem<'a> {
    /// Route the interrupts of `id` to the channel identified by `handle`.
    pub fn attach(&self, id: SocketId, handle: ChannelHandle) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let slot = &self.handles[block as usize][number as usize];
        if slot.is_some() {
            return Err(ErrorCode::ALREADY);
        }
        slot.set(handle);
        Ok(())
    }

    pub fn detach(&self, id: SocketId) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        self.handles[block as usize][number as usize].clear();
        Ok(())
    }

    /// Install the client for sockets without a channel. Passing `None`
    /// removes it.
    pub fn register_callback(&self, client: Option<&'a dyn SocketEventClient>) {
        self.callback.insert(client);
    }

    pub fn owner_of(&self, id: SocketId) -> Result<SocketOwner<'a>, ErrorCode> {
        let (block, number) = id.decode().ok_or(ErrorCode::INVAL)?;
        if number as usize >= block.info().socket_count {
            return Err(ErrorCode::INVAL);
        }
        Ok(self.owner(block, number))
    }

    fn owner(&self, block: IpBlock, number: u8) -> SocketOwner<'a> {
        self.handles[block as usize][number as usize].map_or_else(
            || {
                self.callback
                    .map_or(SocketOwner::Unowned, |client| SocketOwner::Callback(*client))
            },
            |handle| SocketOwner::Channel(*handle),
        )
    }

    /// Dispatch a hardware interrupt. Returns `false` if `irq` is not a
    /// socket interrupt.
    pub fn service_interrupt(&self, irq: u32) -> bool {
        let block = match irq {
            irqs::LPP_DMA => IpBlock::LowPowerPeripheral,
            irqs::PIB_DMA => IpBlock::ParallelInterface,
            irqs::SIB_DMA => IpBlock::StorageInterface,
            irqs::UIB_INGRESS_DMA => IpBlock::UsbIngress,
            irqs::UIB_EGRESS_DMA => IpBlock::UsbEgress,
            _ => return false,
        };
        self.handle_interrupt(block);
        true
    }

    /// Service every socket of `block` with an interrupt pending.
    pub fn handle_interrupt(&self, block: IpBlock) {
        let count = block.info().socket_count;
        support::barrier();
        let pending = self.registers.interrupt_status(block);

        if count > 16 {
            self.handle_sockets(block, 0, pending & 0xFFFF, count);
            self.handle_sockets(block, 16, pending >> 16, count);
        } else {
            self.handle_sockets(block, 0, pending & ((1 << count) - 1), count);
        }
    }

    fn handle_sockets(&self, block: IpBlock, first: usize, mut pending: u32, count: usize) {
        while pending != 0 {
            let number = first + pending.trailing_zeros() as usize;
            pending &= pending - 1;
            if number < count {
                self.handle_socket_interrupt(block, number as u8);
            }
        }
    }

    fn pending_interrupts(&self, block: IpBlock, number: u8) -> u32 {
        self.registers.read(block, number, SocketReg::Intr)
            & self.registers.read(block, number, SocketReg::IntrMask)
    }

    fn handle_socket_interrupt(&self, block: IpBlock, number: u8) {
        let socket = SocketId::new(block, number);
        let status = self.pending_interrupts(block, number);
        let owner = self.owner(block, number);

        if CONFIG.trace_interrupts {
            log::trace!("DMA: {:?} intr {:#06x}", socket, status);
        }

        match owner {
            SocketOwner::Channel(channel) => {
                let status = self.drain_interrupts(block, number, status);
                if status == 0 {
                    return;
                }
                let event = DmaEvent {
                    request: true,
                    source: ModuleId::DMA_INTERRUPT,
                    socket,
                    channel,
                    status: LocalRegisterCopy::new(status),
                    chain_head: self.chain_head(block, number),
                };
                if let Err(e) = self.events.post(event) {
                    panic!("DMA: cannot post event for {:?}: {}", socket, e);
                }
            }
            SocketOwner::Callback(client) => client.socket_event(socket, status),
            SocketOwner::Unowned => {
                let raw = self.registers.read(block, number, SocketReg::Intr);
                log::warn!("DMA: spurious interrupt {:#06x} on {:?}", raw, socket);
                self.registers.write(block, number, SocketReg::Intr, raw);
                support::barrier();
            }
        }
    }

    /// Clear or mask everything pending on the socket, including bits that
    /// arrive while doing so, and return the union.
    fn drain_interrupts(&self, block: IpBlock, number: u8, mut pending: u32) -> u32 {
        let mut combined = 0;
        while pending != 0 {
            combined |= pending;

            let masked = pending & SUSPEND_INTERRUPTS;
            if masked != 0 {
                let mask = self.registers.read(block, number, SocketReg::IntrMask);
                self.registers
                    .write(block, number, SocketReg::IntrMask, mask & !masked);
            }
            let acked = pending & !SUSPEND_INTERRUPTS;
            if acked != 0 {
                self.registers.write(block, number, SocketReg::Intr, acked);
            }
            support::barrier();

            pending = self.pending_interrupts(block, number);
        }
        combined
    }
}
