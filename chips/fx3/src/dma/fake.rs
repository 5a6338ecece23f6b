// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Register and buffer models for unit tests.
//!
//! [`FakeSockets`] keeps the socket registers of every block in memory and
//! reproduces the hardware behaviour the DMA core depends on:
//!
//! - `Intr` is write-one-to-clear.
//! - `ENABLED` follows `GO_ENABLE` immediately.
//! - `SUSPENDED` is set by `GO_SUSPEND`, released when `GO_SUSPEND` is
//!   cleared, and dropped when the socket is disabled.
//! - `WRAPUP` is committed (cleared) on the first status read after it was
//!   set, unless wrap-up is being held.
//! - A late interrupt can be armed to appear right after the next
//!   acknowledgement, which is the race the dispatcher has to survive.

use core::cell::Cell;

use super::chain::BufferArena;
use super::socket::{IpBlock, SocketReg, SocketRegisterFile, SCK_STATUS};
use super::socket::{IP_BLOCK_COUNT, MAX_SOCKETS_PER_BLOCK};

const REG_COUNT: usize = 7;

const ENABLED: u32 = SCK_STATUS::ENABLED::SET.value;
const SUSPENDED: u32 = SCK_STATUS::SUSPENDED::SET.value;
const GO_ENABLE: u32 = SCK_STATUS::GO_ENABLE::SET.value;
const GO_SUSPEND: u32 = SCK_STATUS::GO_SUSPEND::SET.value;
const WRAPUP: u32 = SCK_STATUS::WRAPUP::SET.value;

struct SocketModel {
    regs: [Cell<u32>; REG_COUNT],
    status_writes: Cell<usize>,
    late: Cell<u32>,
}

impl SocketModel {
    fn new() -> SocketModel {
        SocketModel {
            regs: core::array::from_fn(|_| Cell::new(0)),
            status_writes: Cell::new(0),
            late: Cell::new(0),
        }
    }

    fn reg(&self, reg: SocketReg) -> &Cell<u32> {
        &self.regs[reg as usize]
    }
}

pub(crate) struct FakeSockets {
    sockets: [[SocketModel; MAX_SOCKETS_PER_BLOCK]; IP_BLOCK_COUNT],
    powered: [Cell<bool>; IP_BLOCK_COUNT],
    hold_wrapup: Cell<bool>,
}

impl FakeSockets {
    /// All blocks powered, all registers zero.
    pub(crate) fn new() -> FakeSockets {
        FakeSockets {
            sockets: core::array::from_fn(|_| core::array::from_fn(|_| SocketModel::new())),
            powered: core::array::from_fn(|_| Cell::new(true)),
            hold_wrapup: Cell::new(false),
        }
    }

    fn socket(&self, block: IpBlock, number: u8) -> &SocketModel {
        &self.sockets[block as usize][number as usize]
    }

    pub(crate) fn set_power(&self, block: IpBlock, on: bool) {
        self.powered[block as usize].set(on);
    }

    pub(crate) fn set_hold_wrapup(&self, hold: bool) {
        self.hold_wrapup.set(hold);
    }

    /// Latch interrupt flags as hardware would.
    pub(crate) fn raise(&self, block: IpBlock, number: u8, bits: u32) {
        let intr = self.socket(block, number).reg(SocketReg::Intr);
        intr.set(intr.get() | bits);
    }

    /// Raise `bits` immediately after the next acknowledgement.
    pub(crate) fn inject_on_ack(&self, block: IpBlock, number: u8, bits: u32) {
        self.socket(block, number).late.set(bits);
    }

    /// Suspend the socket without software having asked for it.
    pub(crate) fn suspend_by_hardware(&self, block: IpBlock, number: u8) {
        let status = self.socket(block, number).reg(SocketReg::Status);
        status.set(status.get() | SUSPENDED);
    }

    /// Unmasked interrupts still pending.
    pub(crate) fn pending(&self, block: IpBlock, number: u8) -> u32 {
        let socket = self.socket(block, number);
        socket.reg(SocketReg::Intr).get() & socket.reg(SocketReg::IntrMask).get()
    }

    /// Raw register value, without any side effects.
    pub(crate) fn peek(&self, block: IpBlock, number: u8, reg: SocketReg) -> u32 {
        self.socket(block, number).reg(reg).get()
    }

    /// Set a register directly, bypassing the hardware behaviour.
    pub(crate) fn poke(&self, block: IpBlock, number: u8, reg: SocketReg, value: u32) {
        self.socket(block, number).reg(reg).set(value);
    }

    pub(crate) fn status_writes(&self, block: IpBlock, number: u8) -> usize {
        self.socket(block, number).status_writes.get()
    }

    pub(crate) fn last_event(&self, block: IpBlock, number: u8) -> u32 {
        self.peek(block, number, SocketReg::Event)
    }

    fn write_status(&self, socket: &SocketModel, value: u32) {
        let old = socket.reg(SocketReg::Status).get();
        let mut new = value & !(ENABLED | SUSPENDED);

        let enabled = new & GO_ENABLE != 0;
        let suspended = if !enabled {
            false
        } else if new & GO_SUSPEND != 0 {
            true
        } else if old & GO_SUSPEND != 0 {
            false
        } else {
            old & SUSPENDED != 0
        };

        if enabled {
            new |= ENABLED;
        }
        if suspended {
            new |= SUSPENDED;
        }
        socket.reg(SocketReg::Status).set(new);
        socket.status_writes.set(socket.status_writes.get() + 1);
    }
}

impl SocketRegisterFile for FakeSockets {
    fn read(&self, block: IpBlock, number: u8, reg: SocketReg) -> u32 {
        let socket = self.socket(block, number);
        let value = socket.reg(reg).get();
        if reg == SocketReg::Status && value & WRAPUP != 0 && !self.hold_wrapup.get() {
            socket.reg(reg).set(value & !WRAPUP);
            return value & !WRAPUP;
        }
        value
    }

    fn write(&self, block: IpBlock, number: u8, reg: SocketReg, value: u32) {
        let socket = self.socket(block, number);
        match reg {
            SocketReg::Status => self.write_status(socket, value),
            SocketReg::Intr => {
                let intr = socket.reg(reg);
                intr.set((intr.get() & !value) | socket.late.take());
            }
            _ => socket.reg(reg).set(value),
        }
    }

    fn block_active(&self, block: IpBlock) -> bool {
        self.powered[block as usize].get()
    }

    fn interrupt_status(&self, block: IpBlock) -> u32 {
        (0..block.info().socket_count)
            .filter(|&number| self.pending(block, number as u8) != 0)
            .fold(0, |bitmap, number| bitmap | (1 << number))
    }
}

/// Bump allocator standing in for the DMA buffer heap.
pub(crate) struct FakeArena {
    next: Cell<u32>,
    calls: Cell<usize>,
    live: Cell<usize>,
    fail_on: Cell<usize>,
    out_of_range_on: Cell<usize>,
}

const ARENA_BASE: u32 = 0x4004_0000;
const ARENA_LIMIT: u32 = 0x4008_0000;

impl FakeArena {
    pub(crate) fn new() -> FakeArena {
        FakeArena {
            next: Cell::new(ARENA_BASE),
            calls: Cell::new(0),
            live: Cell::new(0),
            fail_on: Cell::new(0),
            out_of_range_on: Cell::new(0),
        }
    }

    /// Make the `n`th allocation (counting from 1) fail.
    pub(crate) fn fail_on(&self, n: usize) {
        self.fail_on.set(n);
    }

    /// Make the `n`th allocation return an address past the arena.
    pub(crate) fn out_of_range_on(&self, n: usize) {
        self.out_of_range_on.set(n);
    }

    /// Buffers allocated and not yet freed.
    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }
}

impl BufferArena for FakeArena {
    fn alloc(&self, size: u32) -> Option<u32> {
        self.calls.set(self.calls.get() + 1);
        let call = self.calls.get();
        if call == self.fail_on.get() {
            return None;
        }
        self.live.set(self.live.get() + 1);
        if call == self.out_of_range_on.get() {
            return Some(ARENA_LIMIT + 0x100);
        }
        let address = self.next.get();
        self.next.set(address + size.next_multiple_of(32));
        Some(address)
    }

    fn free(&self, _address: u32) {
        self.live.set(self.live.get() - 1);
    }

    fn base(&self) -> u32 {
        ARENA_BASE
    }

    fn limit(&self) -> u32 {
        ARENA_LIMIT
    }
}
