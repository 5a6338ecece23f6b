// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! DMA sockets: identification, register access and control.
//!
//! A socket is addressed by a 16 bit [`SocketId`] holding the IP block in the
//! high byte and the socket number in the low byte. Every block publishes a
//! bank of socket registers, a socket interrupt bitmap and a power register;
//! no socket register may be touched while the block is powered down.
//!
//! Socket state machine, as driven from here:
//!
//! ```text
//!   Disabled --enable--> Enabled --suspend--> Suspended
//!      ^                  |   ^                  |
//!      +-----disable------+   +-----resume-------+
//! ```
//!
//! `Enabled` additionally has a wrap-up pending sub-state between
//! [`DmaSubsystem::wrap_up`] and the hardware committing the short buffer.
//!
//! Register access goes through the [`SocketRegisterFile`] trait so the
//! control logic can run against [`MmioSocketRegisters`] on the device and a
//! register model in unit tests.

use core::fmt;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

use super::descriptor::DESCRIPTOR_COUNT;
use super::DmaSubsystem;
use crate::support::{self, PollDelay, Timeout};
use crate::{ErrorCode, StaticRef};

pub(crate) const IP_BLOCK_COUNT: usize = 5;
pub(crate) const MAX_SOCKETS_PER_BLOCK: usize = 32;

const SOCKET_BANK_STRIDE: usize = 0x80;

register_bitfields![u32,
    pub SCK_DSCR [
        /// Descriptor the socket is currently working on
        DSCR_NUMBER OFFSET(0) NUMBITS(16) [],
        /// Number of descriptors still available to the socket
        DSCR_COUNT OFFSET(16) NUMBITS(8) [],
        /// Low watermark for DSCR_COUNT
        DSCR_LOW OFFSET(24) NUMBITS(8) []
    ],
    pub SCK_STATUS [
        AVL_COUNT OFFSET(0) NUMBITS(5) [],
        AVL_MIN OFFSET(5) NUMBITS(5) [],
        AVL_ENABLE OFFSET(10) NUMBITS(1) [],
        /// Internal state of the socket engine
        STATE OFFSET(15) NUMBITS(3) [],
        ZLP_RCVD OFFSET(18) NUMBITS(1) [],
        /// Hardware has suspended the socket
        SUSPENDED OFFSET(19) NUMBITS(1) [],
        /// Hardware reports the socket enabled
        ENABLED OFFSET(20) NUMBITS(1) [],
        TRUNCATE OFFSET(21) NUMBITS(1) [],
        EN_PROD_EVENTS OFFSET(22) NUMBITS(1) [],
        EN_CONS_EVENTS OFFSET(23) NUMBITS(1) [],
        /// Suspend when a consumer finds a partially filled buffer
        SUSP_PARTIAL OFFSET(24) NUMBITS(1) [],
        /// Suspend after the last buffer of the transfer
        SUSP_LAST OFFSET(25) NUMBITS(1) [],
        /// Suspend at the end of the transfer
        SUSP_TRANS OFFSET(26) NUMBITS(1) [],
        /// Suspend at the end of a packet
        SUSP_EOP OFFSET(27) NUMBITS(1) [],
        /// Flush the buffer in progress as a short buffer
        WRAPUP OFFSET(28) NUMBITS(1) [],
        /// Transfer size is counted in buffers instead of bytes
        UNIT OFFSET(29) NUMBITS(1) [],
        /// Software suspend request
        GO_SUSPEND OFFSET(30) NUMBITS(1) [],
        /// Software enable request
        GO_ENABLE OFFSET(31) NUMBITS(1) []
    ],
    pub SCK_INTR [
        PRODUCE_EVENT OFFSET(0) NUMBITS(1) [],
        CONSUME_EVENT OFFSET(1) NUMBITS(1) [],
        DSCR_IS_LOW OFFSET(2) NUMBITS(1) [],
        DSCR_NOT_AVL OFFSET(3) NUMBITS(1) [],
        STALL OFFSET(4) NUMBITS(1) [],
        SUSPEND OFFSET(5) NUMBITS(1) [],
        ERROR OFFSET(6) NUMBITS(1) [],
        /// Transfer complete
        TRANS_DONE OFFSET(7) NUMBITS(1) [],
        PARTIAL_BUF OFFSET(8) NUMBITS(1) [],
        LAST_BUF OFFSET(9) NUMBITS(1) [],
        EVENT_RCVD OFFSET(10) NUMBITS(1) []
    ],
    pub SCK_EVENT [
        ACTIVE_DSCR OFFSET(0) NUMBITS(16) [],
        EVENT_TYPE OFFSET(16) NUMBITS(1) [
            Consumed = 0,
            Produced = 1
        ]
    ],
    BLOCK_POWER [
        /// Block is powered and out of reset
        ACTIVE OFFSET(0) NUMBITS(1) [],
        RESETN OFFSET(31) NUMBITS(1) []
    ]
];

/// Interrupts that are masked, not acknowledged, while software decides how
/// to handle a suspended socket.
pub(crate) const SUSPEND_INTERRUPTS: u32 =
    SCK_INTR::SUSPEND::SET.value | SCK_INTR::PARTIAL_BUF::SET.value;

register_structs! {
    SocketRegisters {
        (0x00 => dscr: ReadWrite<u32, SCK_DSCR::Register>),
        (0x04 => size: ReadWrite<u32>),
        (0x08 => count: ReadWrite<u32>),
        (0x0C => status: ReadWrite<u32, SCK_STATUS::Register>),
        (0x10 => intr: ReadWrite<u32, SCK_INTR::Register>),
        (0x14 => intr_mask: ReadWrite<u32, SCK_INTR::Register>),
        (0x18 => _reserved0),
        (0x7C => event: WriteOnly<u32, SCK_EVENT::Register>),
        (0x80 => @END),
    }
}

/// The IP blocks that own DMA sockets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IpBlock {
    /// Serial peripherals: UART, I2C, I2S and SPI.
    LowPowerPeripheral = 0,
    /// GPIF II parallel interface.
    ParallelInterface = 1,
    /// Storage (SD / MMC) ports.
    StorageInterface = 2,
    /// USB endpoints, data leaving memory toward the host.
    UsbIngress = 3,
    /// USB endpoints, data arriving from the host.
    UsbEgress = 4,
}

/// Inclusive range of socket numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketRange {
    pub first: u8,
    pub last: u8,
}

impl SocketRange {
    const fn new(first: u8, last: u8) -> SocketRange {
        SocketRange { first, last }
    }

    pub fn contains(&self, number: u8) -> bool {
        self.first <= number && number <= self.last
    }
}

/// Layout and capabilities of one IP block.
pub struct IpBlockInfo {
    pub socket_count: usize,
    /// Socket numbers usable as producers, `None` if the block has none.
    pub producers: Option<SocketRange>,
    /// Socket numbers usable as consumers, `None` if the block has none.
    pub consumers: Option<SocketRange>,
    power: usize,
    sockets: usize,
    interrupt_status: usize,
}

static IP_BLOCKS: [IpBlockInfo; IP_BLOCK_COUNT] = [
    IpBlockInfo {
        socket_count: 8,
        producers: Some(SocketRange::new(5, 7)),
        consumers: Some(SocketRange::new(0, 4)),
        power: 0xE000_0000,
        sockets: 0xE000_8000,
        interrupt_status: 0xE000_FF00,
    },
    IpBlockInfo {
        socket_count: 32,
        producers: Some(SocketRange::new(0, 31)),
        consumers: Some(SocketRange::new(0, 31)),
        power: 0xE001_0000,
        sockets: 0xE001_8000,
        interrupt_status: 0xE001_FF00,
    },
    IpBlockInfo {
        socket_count: 6,
        producers: Some(SocketRange::new(0, 5)),
        consumers: Some(SocketRange::new(0, 5)),
        power: 0xE002_0000,
        sockets: 0xE002_8000,
        interrupt_status: 0xE002_FF00,
    },
    IpBlockInfo {
        socket_count: 16,
        producers: None,
        consumers: Some(SocketRange::new(0, 15)),
        power: 0xE003_1000,
        sockets: 0xE003_C000,
        interrupt_status: 0xE003_FF04,
    },
    IpBlockInfo {
        socket_count: 16,
        producers: Some(SocketRange::new(0, 15)),
        consumers: None,
        power: 0xE003_1000,
        sockets: 0xE003_8000,
        interrupt_status: 0xE003_FF00,
    },
];

impl IpBlock {
    pub const ALL: [IpBlock; IP_BLOCK_COUNT] = [
        IpBlock::LowPowerPeripheral,
        IpBlock::ParallelInterface,
        IpBlock::StorageInterface,
        IpBlock::UsbIngress,
        IpBlock::UsbEgress,
    ];

    pub fn info(self) -> &'static IpBlockInfo {
        &IP_BLOCKS[self as usize]
    }

    fn from_id(id: u8) -> Option<IpBlock> {
        IpBlock::ALL.get(id as usize).copied()
    }
}

/// Packed `(block << 8) | number` socket identifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SocketId(u16);

impl SocketId {
    pub const fn new(block: IpBlock, number: u8) -> SocketId {
        SocketId(((block as u16) << 8) | number as u16)
    }

    pub const fn from_raw(raw: u16) -> SocketId {
        SocketId(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Split into block and socket number. The number is not range checked.
    pub fn decode(self) -> Option<(IpBlock, u8)> {
        IpBlock::from_id((self.0 >> 8) as u8).map(|block| (block, self.0 as u8))
    }
}

impl fmt::Debug for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some((block, number)) => write!(f, "{:?}[{}]", block, number),
            None => write!(f, "SocketId({:#06x})", self.0),
        }
    }
}

/// Registers of one socket, as seen through [`SocketRegisterFile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum SocketReg {
    Dscr = 0,
    XferSize = 1,
    XferCount = 2,
    Status = 3,
    /// Write-one-to-clear interrupt flags
    Intr = 4,
    IntrMask = 5,
    /// Write-only event register
    Event = 6,
}

/// Access to the socket register banks of all IP blocks.
pub trait SocketRegisterFile {
    fn read(&self, block: IpBlock, number: u8, reg: SocketReg) -> u32;
    fn write(&self, block: IpBlock, number: u8, reg: SocketReg, value: u32);
    /// Whether the block is powered and its sockets may be accessed.
    fn block_active(&self, block: IpBlock) -> bool;
    /// Bitmap of sockets in the block with an unmasked interrupt pending.
    fn interrupt_status(&self, block: IpBlock) -> u32;
}

/// The socket register banks of the device.
pub struct MmioSocketRegisters {
    _private: (),
}

impl MmioSocketRegisters {
    /// # Safety
    ///
    /// At most one instance may exist, and only on FX3 hardware where the
    /// addresses in the IP block table are mapped.
    pub const unsafe fn new() -> MmioSocketRegisters {
        MmioSocketRegisters { _private: () }
    }

    fn bank(&self, block: IpBlock, number: u8) -> StaticRef<SocketRegisters> {
        let base = block.info().sockets + number as usize * SOCKET_BANK_STRIDE;
        // SAFETY: `new` is only called on hardware where every socket bank
        // in the block table is mapped.
        unsafe { StaticRef::new(base as *const SocketRegisters) }
    }
}

impl SocketRegisterFile for MmioSocketRegisters {
    fn read(&self, block: IpBlock, number: u8, reg: SocketReg) -> u32 {
        let regs = self.bank(block, number);
        match reg {
            SocketReg::Dscr => regs.dscr.get(),
            SocketReg::XferSize => regs.size.get(),
            SocketReg::XferCount => regs.count.get(),
            SocketReg::Status => regs.status.get(),
            SocketReg::Intr => regs.intr.get(),
            SocketReg::IntrMask => regs.intr_mask.get(),
            SocketReg::Event => 0,
        }
    }

    fn write(&self, block: IpBlock, number: u8, reg: SocketReg, value: u32) {
        let regs = self.bank(block, number);
        match reg {
            SocketReg::Dscr => regs.dscr.set(value),
            SocketReg::XferSize => regs.size.set(value),
            SocketReg::XferCount => regs.count.set(value),
            SocketReg::Status => regs.status.set(value),
            SocketReg::Intr => regs.intr.set(value),
            SocketReg::IntrMask => regs.intr_mask.set(value),
            SocketReg::Event => regs.event.set(value),
        }
    }

    fn block_active(&self, block: IpBlock) -> bool {
        // SAFETY: see `bank`.
        let power: StaticRef<ReadOnly<u32, BLOCK_POWER::Register>> =
            unsafe { StaticRef::new(block.info().power as *const _) };
        power.is_set(BLOCK_POWER::ACTIVE)
    }

    fn interrupt_status(&self, block: IpBlock) -> u32 {
        // SAFETY: see `bank`.
        let status: StaticRef<ReadOnly<u32>> =
            unsafe { StaticRef::new(block.info().interrupt_status as *const _) };
        status.get()
    }
}

/// Software copy of the mutable socket registers.
#[derive(Clone, Copy)]
pub struct SocketConfig {
    pub dscr: LocalRegisterCopy<u32, SCK_DSCR::Register>,
    pub xfer_size: u32,
    pub xfer_count: u32,
    pub status: LocalRegisterCopy<u32, SCK_STATUS::Register>,
    /// On read, the pending interrupts. On write, the interrupts to
    /// acknowledge.
    pub intr: LocalRegisterCopy<u32, SCK_INTR::Register>,
    pub intr_mask: LocalRegisterCopy<u32, SCK_INTR::Register>,
}

impl Default for SocketConfig {
    fn default() -> SocketConfig {
        SocketConfig {
            dscr: LocalRegisterCopy::new(0),
            xfer_size: 0,
            xfer_count: 0,
            status: LocalRegisterCopy::new(0),
            intr: LocalRegisterCopy::new(0),
            intr_mask: LocalRegisterCopy::new(0),
        }
    }
}

impl PartialEq for SocketConfig {
    fn eq(&self, other: &SocketConfig) -> bool {
        self.dscr.get() == other.dscr.get()
            && self.xfer_size == other.xfer_size
            && self.xfer_count == other.xfer_count
            && self.status.get() == other.status.get()
            && self.intr.get() == other.intr.get()
            && self.intr_mask.get() == other.intr_mask.get()
    }
}

impl fmt::Debug for SocketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketConfig")
            .field("dscr", &format_args!("{:#010x}", self.dscr.get()))
            .field("xfer_size", &self.xfer_size)
            .field("xfer_count", &self.xfer_count)
            .field("status", &format_args!("{:#010x}", self.status.get()))
            .field("intr", &format_args!("{:#06x}", self.intr.get()))
            .field("intr_mask", &format_args!("{:#06x}", self.intr_mask.get()))
            .finish()
    }
}

/// When a socket should stop to let software look at its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspendOption {
    /// Never suspend.
    None,
    /// Suspend at the end of the next packet.
    EndOfPacket,
    /// Suspend as soon as the buffer in progress completes.
    CurrentBuffer,
    /// Suspend when the consumer reaches a partially filled buffer.
    ConsumerPartialBuffer,
}

fn is_disabled(status: LocalRegisterCopy<u32, SCK_STATUS::Register>) -> bool {
    !status.is_set(SCK_STATUS::GO_ENABLE) && !status.is_set(SCK_STATUS::ENABLED)
}

fn is_suspended(status: LocalRegisterCopy<u32, SCK_STATUS::Register>) -> bool {
    status.is_set(SCK_STATUS::SUSPENDED) || status.is_set(SCK_STATUS::GO_SUSPEND)
}

/// Clear every suspend option and arm `option` in its place.
///
/// Interrupt masks are only re-armed while the socket is running: unmasking
/// them with a suspend latched would refire immediately.
fn arm_suspend(config: &mut SocketConfig, option: SuspendOption, suspended: bool, request: bool) {
    config.status.modify(
        SCK_STATUS::SUSP_PARTIAL::CLEAR
            + SCK_STATUS::SUSP_LAST::CLEAR
            + SCK_STATUS::SUSP_TRANS::CLEAR
            + SCK_STATUS::SUSP_EOP::CLEAR,
    );
    config
        .intr_mask
        .modify(SCK_INTR::SUSPEND::CLEAR + SCK_INTR::PARTIAL_BUF::CLEAR);

    match option {
        SuspendOption::None => {}
        SuspendOption::EndOfPacket => {
            config.status.modify(SCK_STATUS::SUSP_EOP::SET);
            if !suspended {
                config.intr_mask.modify(SCK_INTR::SUSPEND::SET);
            }
        }
        SuspendOption::CurrentBuffer => {
            if !suspended {
                if request {
                    config.status.modify(SCK_STATUS::GO_SUSPEND::SET);
                }
                config.intr_mask.modify(SCK_INTR::SUSPEND::SET);
            }
        }
        SuspendOption::ConsumerPartialBuffer => {
            config.status.modify(SCK_STATUS::SUSP_PARTIAL::SET);
            if !suspended {
                config.intr_mask.modify(SCK_INTR::PARTIAL_BUF::SET);
            }
        }
    }
}

impl DmaSubsystem<'_> {
    /// Resolve `id` to a block and socket number that may be accessed.
    pub(crate) fn locate(&self, id: SocketId) -> Result<(IpBlock, u8), ErrorCode> {
        let (block, number) = id.decode().ok_or(ErrorCode::INVAL)?;
        if number as usize >= block.info().socket_count {
            return Err(ErrorCode::INVAL);
        }
        if !self.registers.block_active(block) {
            return Err(ErrorCode::OFF);
        }
        Ok((block, number))
    }

    fn status(&self, block: IpBlock, number: u8) -> LocalRegisterCopy<u32, SCK_STATUS::Register> {
        LocalRegisterCopy::new(self.registers.read(block, number, SocketReg::Status))
    }

    fn write_status(
        &self,
        block: IpBlock,
        number: u8,
        status: LocalRegisterCopy<u32, SCK_STATUS::Register>,
    ) {
        self.registers
            .write(block, number, SocketReg::Status, status.get());
        support::barrier();
    }

    fn read_config(&self, block: IpBlock, number: u8) -> SocketConfig {
        support::barrier();
        let regs = self.registers;
        SocketConfig {
            dscr: LocalRegisterCopy::new(regs.read(block, number, SocketReg::Dscr)),
            xfer_size: regs.read(block, number, SocketReg::XferSize),
            xfer_count: regs.read(block, number, SocketReg::XferCount),
            status: LocalRegisterCopy::new(regs.read(block, number, SocketReg::Status)),
            intr: LocalRegisterCopy::new(regs.read(block, number, SocketReg::Intr)),
            intr_mask: LocalRegisterCopy::new(regs.read(block, number, SocketReg::IntrMask)),
        }
    }

    fn write_config(&self, block: IpBlock, number: u8, config: &SocketConfig) {
        let regs = self.registers;
        regs.write(block, number, SocketReg::Dscr, config.dscr.get());
        regs.write(block, number, SocketReg::XferSize, config.xfer_size);
        regs.write(block, number, SocketReg::XferCount, config.xfer_count);
        regs.write(block, number, SocketReg::IntrMask, config.intr_mask.get());
        regs.write(block, number, SocketReg::Intr, config.intr.get());
        regs.write(block, number, SocketReg::Status, config.status.get());
        support::barrier();
    }

    fn acknowledge(&self, block: IpBlock, number: u8, bits: u32) {
        self.registers.write(block, number, SocketReg::Intr, bits);
    }

    /// Whether `id` names an existing socket on a powered block.
    pub fn is_valid_socket(&self, id: SocketId) -> bool {
        self.locate(id).is_ok()
    }

    /// Whether `id` may act as a producer.
    pub fn is_valid_producer(&self, id: SocketId) -> bool {
        self.check_role(id, |info| info.producers)
    }

    /// Whether `id` may act as a consumer.
    pub fn is_valid_consumer(&self, id: SocketId) -> bool {
        self.check_role(id, |info| info.consumers)
    }

    fn check_role(&self, id: SocketId, range: fn(&IpBlockInfo) -> Option<SocketRange>) -> bool {
        match id.decode() {
            Some((block, number)) => {
                self.registers.block_active(block)
                    && range(block.info()).is_some_and(|r| r.contains(number))
            }
            None => false,
        }
    }

    pub fn get_config(&self, id: SocketId) -> Result<SocketConfig, ErrorCode> {
        let (block, number) = self.locate(id)?;
        Ok(self.read_config(block, number))
    }

    /// Program every mutable socket register from `config`.
    ///
    /// `config.intr` acknowledges the interrupts whose bits are set. The
    /// status register is written last, so a `GO_ENABLE` in it starts the
    /// socket only once the rest of the configuration is in place.
    pub fn set_config(&self, id: SocketId, config: &SocketConfig) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        self.write_config(block, number, config);
        Ok(())
    }

    /// Start the socket and wait for hardware to report it running.
    pub fn enable(&self, id: SocketId) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut status = self.status(block, number);
        status.modify(SCK_STATUS::GO_ENABLE::SET);
        self.write_status(block, number, status);
        support::wait_for_condition(|| self.status(block, number).is_set(SCK_STATUS::ENABLED));
        Ok(())
    }

    /// Stop the socket and wait for hardware to let go of it. Any pending
    /// wrap-up request is dropped.
    pub fn disable(&self, id: SocketId) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut status = self.status(block, number);
        if is_disabled(status) {
            return Ok(());
        }
        status.modify(SCK_STATUS::GO_ENABLE::CLEAR + SCK_STATUS::WRAPUP::CLEAR);
        self.write_status(block, number, status);
        support::wait_for_condition(|| !self.status(block, number).is_set(SCK_STATUS::ENABLED));
        Ok(())
    }

    /// Ask the socket to commit its partially filled buffer.
    pub fn wrap_up(&self, id: SocketId) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut status = self.status(block, number);
        if is_disabled(status) {
            return Ok(());
        }
        status.modify(SCK_STATUS::WRAPUP::SET);
        self.write_status(block, number, status);
        Ok(())
    }

    /// Wait until hardware has acted on a wrap-up request.
    pub fn wait_for_wrapup(
        &self,
        id: SocketId,
        timeout: Timeout,
        delay: &dyn PollDelay,
    ) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        support::wait_for_condition_timeout(timeout, delay, || {
            support::barrier();
            !self.status(block, number).is_set(SCK_STATUS::WRAPUP)
        })
    }

    /// Let a suspended socket continue. Sockets that are not suspended are
    /// left alone.
    pub fn resume(&self, id: SocketId) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut status = self.status(block, number);
        if !is_suspended(status) {
            return Ok(());
        }
        status.modify(SCK_STATUS::GO_SUSPEND::CLEAR);
        self.registers
            .write(block, number, SocketReg::Status, status.get());
        self.acknowledge(block, number, SUSPEND_INTERRUPTS);
        support::barrier();
        Ok(())
    }

    /// Replace the socket's suspend option.
    ///
    /// A suspend that hardware raised on its own is first latched with
    /// `GO_SUSPEND`, so that clearing the option bits below cannot release
    /// it behind software's back.
    pub fn update_suspend_option(
        &self,
        id: SocketId,
        option: SuspendOption,
    ) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut config = self.read_config(block, number);
        let mut suspended = config.status.is_set(SCK_STATUS::SUSPENDED);

        if suspended && !config.status.is_set(SCK_STATUS::GO_SUSPEND) {
            config.status.modify(SCK_STATUS::GO_SUSPEND::SET);
            self.registers
                .write(block, number, SocketReg::Status, config.status.get());
            self.acknowledge(block, number, SUSPEND_INTERRUPTS);
            config = self.read_config(block, number);
            suspended = config.status.is_set(SCK_STATUS::SUSPENDED);
        }

        arm_suspend(&mut config, option, suspended, true);
        self.registers
            .write(block, number, SocketReg::IntrMask, config.intr_mask.get());
        self.write_status(block, number, config.status);
        Ok(())
    }

    /// Resume a suspended socket and arm `option` for the next suspend.
    ///
    /// `CurrentBuffer` only unmasks the suspend interrupt here; it does not
    /// immediately request another suspend.
    pub fn update_resume_option(
        &self,
        id: SocketId,
        option: SuspendOption,
    ) -> Result<(), ErrorCode> {
        let (block, number) = self.locate(id)?;
        let mut config = self.read_config(block, number);
        if !is_suspended(config.status) {
            return Ok(());
        }

        config.status.modify(SCK_STATUS::GO_SUSPEND::CLEAR);
        arm_suspend(&mut config, option, false, false);
        self.acknowledge(block, number, SUSPEND_INTERRUPTS);
        self.registers
            .write(block, number, SocketReg::IntrMask, config.intr_mask.get());
        self.write_status(block, number, config.status);
        Ok(())
    }

    /// Hand descriptor `dscr_index` to the peer engine behind the socket,
    /// marked occupied (data ready) or free.
    pub fn send_event(
        &self,
        id: SocketId,
        dscr_index: u16,
        occupied: bool,
    ) -> Result<(), ErrorCode> {
        if dscr_index as usize >= DESCRIPTOR_COUNT {
            return Err(ErrorCode::INVAL);
        }
        let (block, number) = self.locate(id)?;
        let kind = if occupied {
            SCK_EVENT::EVENT_TYPE::Produced
        } else {
            SCK_EVENT::EVENT_TYPE::Consumed
        };
        let event = SCK_EVENT::ACTIVE_DSCR.val(dscr_index as u32) + kind;
        self.registers
            .write(block, number, SocketReg::Event, event.value);
        support::barrier();
        Ok(())
    }

    /// The descriptor the socket is currently working on.
    pub fn active_descriptor(&self, id: SocketId) -> Result<u16, ErrorCode> {
        let (block, number) = self.locate(id)?;
        Ok(self.chain_head(block, number))
    }

    pub(crate) fn chain_head(&self, block: IpBlock, number: u8) -> u16 {
        support::barrier();
        let dscr: LocalRegisterCopy<u32, SCK_DSCR::Register> =
            LocalRegisterCopy::new(self.registers.read(block, number, SocketReg::Dscr));
        dscr.read(SCK_DSCR::DSCR_NUMBER) as u16
    }
}
