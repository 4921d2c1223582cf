// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The DFI command buffer: ingress and egress packet FIFOs.
//!
//! Loading a packet is a word-at-a-time handshake: write the data CSR,
//! toggle `WDATA_ENABLE`; after the last word, toggle `WDATA_UPDATE` to
//! push the packet. The egress side mirrors it with `RDATA_UPDATE` /
//! `RDATA_ENABLE`. Turning on buffer mode plus the timestamp comparator
//! starts emission; the hardware sends each packet when its counter
//! reaches the packet's timestamp and stops at the final timestamp-only
//! marker.
//!
//! The blocking send path parks the task on the ingress-empty interrupt;
//! the non-blocking variant spins on the FIFO state register and is safe
//! from any context.

use crate::packet::{RxPacket, TxPacket, TxPacketSeq, FIFO_DEPTH, PACKET_WORDS};
use abi::{mem_map, PhyError};
use drv_wddr_irq::{sticky_mask, FastIrq, IrqRouter, StickyIrq};
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};
use userlib::{sys_irq_control, sys_recv_notification};

/// FIFO state encodings in the status register.
pub const FIFO_STATE_EMPTY: u32 = 1;
pub const FIFO_STATE_FULL: u32 = 2;

/// DFI channel register map, relative to the channel base.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const TOP_1_CFG: u32 = 0x00;
    pub const BUF_CLK_EN: Field = Field::bit(0);
    pub const TS_RESET: Field = Field::bit(1);
    pub const RDATA_CLR: Field = Field::bit(2);
    pub const WDATA_CLR: Field = Field::bit(3);
    pub const BUF_MODE: Field = Field::bit(4);
    pub const TS_ENABLE: Field = Field::bit(5);
    pub const WDATA_HOLD: Field = Field::bit(6);
    pub const WDATA_ENABLE: Field = Field::bit(8);
    pub const WDATA_UPDATE: Field = Field::bit(9);
    pub const RDATA_ENABLE: Field = Field::bit(10);
    pub const RDATA_UPDATE: Field = Field::bit(11);

    pub const TOP_STA: u32 = 0x04;
    pub const IG_STATE: Field = Field::new(0, 2);
    pub const EG_STATE: Field = Field::new(4, 2);

    pub const IG_DATA_CFG: u32 = 0x08;
    pub const EG_DATA_STA: u32 = 0x0c;
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Fill { packets: u8 },
    FifoFull,
    Send { blocking: bool },
    Drained,
    ReadEg { packets: u8 },
}

ringbuf!(Trace, 16, Trace::None);

pub struct DfiBuffer<B> {
    bus: B,
    base: u32,
}

impl<B: RegisterBus + Copy> DfiBuffer<B> {
    pub fn new(bus: B) -> Self {
        let buffer = Self {
            bus,
            base: mem_map::DFICH0,
        };
        // Hold write data between packets by default.
        buffer.set_wdata_hold(true);
        buffer
    }

    fn cfg(&self) -> u32 {
        self.base + regs::TOP_1_CFG
    }

    /// Enables the buffer clock and clears both FIFOs and the timestamp
    /// counter.
    pub fn enable_clock(&self) {
        let addr = self.cfg();
        let mut v = self.bus.read32(addr);
        v = regs::BUF_CLK_EN.set(v, 1);
        v = regs::TS_RESET.set(v, 1);
        v = regs::RDATA_CLR.set(v, 1);
        v = regs::WDATA_CLR.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::TS_RESET.set(v, 0);
        v = regs::RDATA_CLR.set(v, 0);
        v = regs::WDATA_CLR.set(v, 0);
        self.bus.write32(addr, v);
    }

    /// Switches the datapath between buffer mode (software packets) and
    /// mission mode, together with the timestamp comparator.
    pub fn set_mode(&self, enable: bool) {
        let addr = self.cfg();
        let mut v = self.bus.read32(addr);
        v = regs::BUF_MODE.set(v, enable as u32);
        v = regs::TS_ENABLE.set(v, enable as u32);
        self.bus.write32(addr, v);
    }

    pub fn set_wdata_hold(&self, enable: bool) {
        self.bus.set_bit(self.cfg(), regs::WDATA_HOLD, enable);
    }

    fn ig_state(&self) -> u32 {
        self.bus.read_field(self.base + regs::TOP_STA, regs::IG_STATE)
    }

    fn eg_state(&self) -> u32 {
        self.bus.read_field(self.base + regs::TOP_STA, regs::EG_STATE)
    }

    /// Loads one packet into the ingress FIFO.
    fn write_ig(&self, packet: &TxPacket) -> Result<(), PhyError> {
        // Check the fit before touching the data register so a full FIFO
        // has no partial-packet side effects.
        if self.ig_state() == FIFO_STATE_FULL {
            ringbuf_entry!(Trace::FifoFull);
            return Err(PhyError::IgFifoFull);
        }

        let cfg = self.cfg();
        let mut v = self.bus.read32(cfg);
        for ndx in (0..PACKET_WORDS).rev() {
            self.bus
                .write32(self.base + regs::IG_DATA_CFG, packet.raw[ndx]);
            v = regs::WDATA_ENABLE.set(v, regs::WDATA_ENABLE.get(v) ^ 1);
            self.bus.write32(cfg, v);
        }
        v = regs::WDATA_UPDATE.set(v, regs::WDATA_UPDATE.get(v) ^ 1);
        self.bus.write32(cfg, v);
        Ok(())
    }

    /// Fills the ingress FIFO with a packet sequence. The sequence must
    /// already carry its end-of-emission marker.
    pub fn fill(&self, seq: &TxPacketSeq) -> Result<(), PhyError> {
        if seq.is_empty() {
            return Err(PhyError::Fail);
        }
        self.enable_clock();
        ringbuf_entry!(Trace::Fill {
            packets: seq.len() as u8,
        });
        for packet in seq.iter() {
            self.write_ig(packet)?;
        }
        Ok(())
    }

    /// Starts emission. The blocking variant parks on the ingress-empty
    /// interrupt and must not be used from interrupt context; the
    /// non-blocking variant spins on the FIFO state.
    pub fn send(&self, blocking: bool) {
        ringbuf_entry!(Trace::Send { blocking });
        self.set_mode(true);

        if blocking {
            loop {
                sys_irq_control(FastIrq::Ibuf.kernel_line(), true);
                sys_recv_notification(FastIrq::Ibuf.notification_bit());
                if self.ig_state() == FIFO_STATE_EMPTY {
                    break;
                }
            }
            sys_irq_control(FastIrq::Ibuf.kernel_line(), false);
        } else {
            while self.ig_state() != FIFO_STATE_EMPTY {}
        }
        ringbuf_entry!(Trace::Drained);

        // The empty edge also latched the sticky sources; clear them so a
        // later blocking send doesn't wake early.
        let router: IrqRouter<B, ()> = IrqRouter::new(self.bus);
        router.sticky_clear(
            sticky_mask(StickyIrq::Ch0IbufEmpty)
                | sticky_mask(StickyIrq::Ch0IbufFull),
        );

        // Stop the timestamp comparator until the next send.
        self.bus.set_bit(self.cfg(), regs::TS_ENABLE, false);
    }

    pub fn fill_and_send(&self, seq: &TxPacketSeq) -> Result<(), PhyError> {
        self.fill(seq)?;
        self.send(true);
        Ok(())
    }

    /// Drains up to `out.len()` packets from the egress FIFO.
    pub fn read_eg(&self, out: &mut [RxPacket]) -> Result<(), PhyError> {
        if out.len() > FIFO_DEPTH {
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::ReadEg {
            packets: out.len() as u8,
        });

        let cfg = self.cfg();
        for packet in out.iter_mut() {
            if self.eg_state() == FIFO_STATE_EMPTY {
                return Err(PhyError::EgFifoEmpty);
            }

            // Pop a packet, then clock each word out.
            let mut v = self.bus.read32(cfg);
            v = regs::RDATA_UPDATE.set(v, regs::RDATA_UPDATE.get(v) ^ 1);
            self.bus.write32(cfg, v);

            for ndx in 0..PACKET_WORDS {
                packet.raw[ndx] = self.bus.read32(self.base + regs::EG_DATA_STA);
                v = regs::RDATA_ENABLE.set(v, regs::RDATA_ENABLE.get(v) ^ 1);
                self.bus.write32(cfg, v);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod loopback {
    //! A register-level model of the command buffer hardware with the
    //! egress capture looped back to the ingress, for driver tests.

    use super::*;
    use core::cell::RefCell;

    #[derive(Default)]
    struct State {
        regs: std::collections::BTreeMap<u32, u32>,
        last_ig_word: u32,
        assembling: Vec<u32>,
        ig: std::collections::VecDeque<[u32; PACKET_WORDS]>,
        eg: std::collections::VecDeque<[u32; PACKET_WORDS]>,
        eg_word: usize,
        emitted: Vec<[u32; PACKET_WORDS]>,
    }

    #[derive(Default)]
    pub struct LoopbackBus {
        state: RefCell<State>,
    }

    impl LoopbackBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// Packets emitted by the model, in emission order, markers
        /// included.
        pub fn emitted(&self) -> Vec<[u32; PACKET_WORDS]> {
            self.state.borrow().emitted.clone()
        }

        pub fn ig_count(&self) -> usize {
            self.state.borrow().ig.len()
        }
    }

    impl RegisterBus for LoopbackBus {
        fn read32(&self, addr: u32) -> u32 {
            let s = self.state.borrow();
            // Addresses outside the channel block (the MCU sticky-clear
            // registers) fall through to the flat map.
            match addr.wrapping_sub(mem_map::DFICH0) {
                regs::TOP_STA => {
                    let ig = if s.ig.is_empty() {
                        FIFO_STATE_EMPTY
                    } else if s.ig.len() >= FIFO_DEPTH {
                        FIFO_STATE_FULL
                    } else {
                        0
                    };
                    let eg = if s.eg.is_empty() { FIFO_STATE_EMPTY } else { 0 };
                    regs::IG_STATE.set(0, ig) | regs::EG_STATE.set(0, eg)
                }
                regs::EG_DATA_STA => s
                    .eg
                    .front()
                    .map(|p| p[s.eg_word.min(PACKET_WORDS - 1)])
                    .unwrap_or(0),
                _ => s.regs.get(&addr).copied().unwrap_or(0),
            }
        }

        fn write32(&self, addr: u32, value: u32) {
            let mut s = self.state.borrow_mut();
            let offset = addr.wrapping_sub(mem_map::DFICH0);
            if offset == regs::IG_DATA_CFG {
                s.last_ig_word = value;
                s.regs.insert(addr, value);
                return;
            }
            if offset != regs::TOP_1_CFG {
                s.regs.insert(addr, value);
                return;
            }

            let old = s.regs.get(&addr).copied().unwrap_or(0);
            s.regs.insert(addr, value);

            if regs::WDATA_ENABLE.get(old) != regs::WDATA_ENABLE.get(value) {
                let w = s.last_ig_word;
                s.assembling.push(w);
            }
            if regs::WDATA_UPDATE.get(old) != regs::WDATA_UPDATE.get(value)
                && s.assembling.len() >= PACKET_WORDS
            {
                // The driver loads word N-1 first; the FIFO stores the
                // packet in natural order.
                let mut p = [0; PACKET_WORDS];
                for (ndx, w) in s.assembling.drain(..).rev().enumerate() {
                    p[ndx] = w;
                }
                s.ig.push_back(p);
            }
            if regs::RDATA_UPDATE.get(old) != regs::RDATA_UPDATE.get(value) {
                if s.eg_word > 0 {
                    s.eg.pop_front();
                }
                s.eg_word = 0;
            }
            if regs::RDATA_ENABLE.get(old) != regs::RDATA_ENABLE.get(value) {
                s.eg_word += 1;
                if s.eg_word >= PACKET_WORDS {
                    s.eg.pop_front();
                    s.eg_word = 0;
                }
            }

            // Buffer mode plus timestamp compare running: emit everything,
            // looping the pin capture back into the egress FIFO.
            if regs::BUF_MODE.get(value) == 1 && regs::TS_ENABLE.get(value) == 1 {
                while let Some(p) = s.ig.pop_front() {
                    s.emitted.push(p);
                    s.eg.push_back(p);
                }
            }
        }
    }
}
