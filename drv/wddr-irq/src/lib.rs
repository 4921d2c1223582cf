// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast-IRQ router for the WDDR MCU interrupt block.
//!
//! The hardware multiplexes a few dozen sticky interrupt sources behind
//! fifteen vectored "fast" lines into the MCU. The kernel turns an enabled
//! fast line into a task notification bit; this crate owns the bookkeeping
//! on both sides of that hand-off:
//!
//! - sticky-source configuration, masking, and the double-write clear
//!   ritual on the MCU CSR block;
//! - per-line kernel enable/disable;
//! - a binding table from fast line to a caller-chosen handler token, so
//!   the firmware task can translate fired notification bits into events
//!   without a function-pointer table.
//!
//! Handlers run in task context. The only work done against the hardware
//! before an event is posted is mask + sticky-clear, per the firmware's
//! ISR policy.

#![cfg_attr(target_os = "none", no_std)]

use drv_wddr_regbus::RegisterBus;
use userlib::sys_irq_control;

/// Vectored fast interrupt lines into the MCU, in hardware order. The
/// kernel numbers these starting at [`FAST_IRQ_BASE`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FastIrq {
    Host2PhyReq = 0,
    Phy2HostAck,
    Ibuf,
    Ebuf,
    InitStart,
    InitComplete,
    LpReq,
    Pll,
    Ext0,
    Ext1,
    CtrlupdReq,
    PhyupdAck,
    PhymstrAck,
    AhbDet,
    Ch1,
}

pub const FAST_IRQ_COUNT: usize = 15;

/// First kernel interrupt number of the fast block.
pub const FAST_IRQ_BASE: u32 = 16;

/// Notification bits 0 and 1 are reserved by the firmware task (timer and
/// mailbox); fast lines occupy the bits above them.
pub const FAST_IRQ_NOTIFICATION_SHIFT: u32 = 2;

impl FastIrq {
    pub const fn kernel_line(self) -> u32 {
        FAST_IRQ_BASE + self as u32
    }

    pub const fn notification_bit(self) -> u32 {
        1 << (self as u32 + FAST_IRQ_NOTIFICATION_SHIFT)
    }
}

/// Mask of every fast-line notification bit.
pub const FAST_IRQ_NOTIFICATION_MASK: u32 =
    ((1 << FAST_IRQ_COUNT) - 1) << FAST_IRQ_NOTIFICATION_SHIFT;

/// Sticky interrupt sources, by bit position in the sticky CSRs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StickyIrq {
    Host2PhyReq = 0,
    Phy2HostAck,
    Ch0IbufEmpty,
    Ch0IbufFull,
    Ch0EbufNotEmpty,
    Ch0EbufFull,
    InitStart,
    InitComplete,
    LpDataReq,
    LpCtrlReq,
    Pll,
    Ext0,
    Ext1,
    CtrlupdReqAssertion,
    CtrlupdReqDeassertion,
    PhyupdAck,
    PhymstrAck,
}

pub const fn sticky_mask(irq: StickyIrq) -> u32 {
    1 << irq as u32
}

/// MCU interrupt CSR block.
pub mod regs {
    use abi::mem_map;

    pub const IRQ_FAST_STICKY_CFG: u32 = mem_map::MCU + 0x0010;
    pub const IRQ_FAST_MSK_CFG: u32 = mem_map::MCU + 0x0014;
    pub const IRQ_FAST_CLR_CFG: u32 = mem_map::MCU + 0x0018;
    pub const IRQ_FAST_STA: u32 = mem_map::MCU + 0x001c;
}

/// The router proper. `H` is whatever token the owner wants back when a
/// bound line fires; the firmware task uses its event kind.
pub struct IrqRouter<B, H> {
    bus: B,
    bindings: [Option<H>; FAST_IRQ_COUNT],
}

impl<B: RegisterBus, H: Copy> IrqRouter<B, H> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            bindings: [None; FAST_IRQ_COUNT],
        }
    }

    /// Binds a fast line to a handler token. The line stays disabled until
    /// `enable_irq`.
    pub fn request_irq(&mut self, line: FastIrq, handler: H) {
        self.bindings[line as usize] = Some(handler);
        sys_irq_control(line.kernel_line(), false);
    }

    pub fn enable_irq(&self, line: FastIrq) {
        sys_irq_control(line.kernel_line(), true);
    }

    pub fn disable_irq(&self, line: FastIrq) {
        sys_irq_control(line.kernel_line(), false);
    }

    /// Turns on sticky capture for the given sources.
    pub fn sticky_enable(&self, sources: u32) {
        let cur = self.bus.read32(regs::IRQ_FAST_STICKY_CFG);
        self.bus.write32(regs::IRQ_FAST_STICKY_CFG, cur | sources);
    }

    /// Masks or unmasks sticky sources at the aggregation point.
    pub fn sticky_set_masked(&self, sources: u32, masked: bool) {
        let cur = self.bus.read32(regs::IRQ_FAST_MSK_CFG);
        let new = if masked { cur | sources } else { cur & !sources };
        self.bus.write32(regs::IRQ_FAST_MSK_CFG, new);
    }

    /// Clears latched sticky sources. The clear register is
    /// edge-triggered: write the mask, then write zero.
    pub fn sticky_clear(&self, sources: u32) {
        self.bus.write32(regs::IRQ_FAST_CLR_CFG, sources);
        self.bus.write32(regs::IRQ_FAST_CLR_CFG, 0);
    }

    pub fn sticky_status(&self) -> u32 {
        self.bus.read32(regs::IRQ_FAST_STA)
    }

    /// Translates a fired notification word into bound handler tokens, in
    /// line order. Unbound lines are skipped.
    pub fn dispatch(&self, bits: u32) -> impl Iterator<Item = (FastIrq, H)> + '_ {
        const LINES: [FastIrq; FAST_IRQ_COUNT] = [
            FastIrq::Host2PhyReq,
            FastIrq::Phy2HostAck,
            FastIrq::Ibuf,
            FastIrq::Ebuf,
            FastIrq::InitStart,
            FastIrq::InitComplete,
            FastIrq::LpReq,
            FastIrq::Pll,
            FastIrq::Ext0,
            FastIrq::Ext1,
            FastIrq::CtrlupdReq,
            FastIrq::PhyupdAck,
            FastIrq::PhymstrAck,
            FastIrq::AhbDet,
            FastIrq::Ch1,
        ];
        LINES.into_iter().filter_map(move |line| {
            if bits & line.notification_bit() != 0 {
                self.bindings[line as usize].map(|h| (line, h))
            } else {
                None
            }
        })
    }
}
