// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DRAM device model.
//!
//! Tracks what the DRAM's mode registers hold while *software* owns the
//! DFI interface — during boot and training windows. It says nothing
//! about DRAM state while the memory controller is in charge. MR2 and
//! MR13 get shadow copies because later sequences (CBT entry/exit, VRCG,
//! frequency-set-point flips) read-modify-write them.

use crate::buffer::DfiBuffer;
use crate::command::{ChipSelect, Command};
use crate::packet::TxPacketSeq;
use abi::PhyError;
use drv_wddr_config::{DramFreqCal, DramFreqCfg};
use drv_wddr_regbus::RegisterBus;
use userlib::UnwrapLite;

/// MR13 bits this firmware drives.
pub mod mr13 {
    /// Command-bus-training mode enable.
    pub const CBT: u8 = 1 << 0;
    /// VREF current generator enable.
    pub const VRCG: u8 = 1 << 3;
}

/// Cycle gap between successive commands in generated sequences; relaxed
/// enough for every supported frequency.
const CMD_SPACING: u8 = 8;

pub struct DramDev {
    mr2: u8,
    mr13: u8,
}

impl DramDev {
    pub fn new() -> Self {
        Self { mr2: 0, mr13: 0 }
    }

    pub fn mr2(&self) -> u8 {
        self.mr2
    }

    pub fn mr13(&self) -> u8 {
        self.mr13
    }

    /// Builds a command sequence with uniform spacing and the terminating
    /// marker, and pushes it through the buffer. The sequences assembled
    /// here are a handful of packets with rising timestamps, so the
    /// pushes cannot fail.
    fn send<B: RegisterBus + Copy>(
        &self,
        buffer: &DfiBuffer<B>,
        commands: &[Command],
    ) -> Result<(), PhyError> {
        let mut seq = TxPacketSeq::new();
        let mut ts = CMD_SPACING;
        for &c in commands {
            seq.push(c.into_packet(ts)).unwrap_lite();
            ts = ts.saturating_add(CMD_SPACING);
        }
        seq.finish(CMD_SPACING).unwrap_lite();
        buffer.fill_and_send(&seq)
    }

    /// Programs the DRAM for a frequency: the canonical MR1, MR2, MR11
    /// (from config), MR12, MR14 (from calibration) writes, closed by a
    /// clock-enable hold cycle.
    pub fn frequency_init<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
        cfg: &DramFreqCfg,
        cal: &DramFreqCal,
    ) -> Result<(), PhyError> {
        self.send(
            buffer,
            &[
                Command::mrw(cs, 1, cfg.mr1),
                Command::mrw(cs, 2, cfg.mr2),
                Command::mrw(cs, 11, cfg.mr11),
                Command::mrw(cs, 12, cal.mr12),
                Command::mrw(cs, 14, cal.mr14),
                Command::cke_hold(cs),
            ],
        )?;
        self.mr2 = cfg.mr2;
        Ok(())
    }

    pub fn write_mode_register_2<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
        value: u8,
    ) -> Result<(), PhyError> {
        self.send(buffer, &[Command::mrw(cs, 2, value)])?;
        self.mr2 = value;
        Ok(())
    }

    pub fn write_mode_register_13<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
        value: u8,
    ) -> Result<(), PhyError> {
        self.send(buffer, &[Command::mrw(cs, 13, value)])?;
        self.mr13 = value;
        Ok(())
    }

    pub fn vrcg_enable<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.write_mode_register_13(buffer, cs, self.mr13 | mr13::VRCG)
    }

    pub fn vrcg_disable<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.write_mode_register_13(buffer, cs, self.mr13 & !mr13::VRCG)
    }

    /// Enters command-bus training: CBT mode on, then CKE low on the
    /// trained rank.
    pub fn cbt_enter<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        let value = self.mr13 | mr13::CBT;
        self.send(
            buffer,
            &[Command::mrw(cs, 13, value), Command::cke_low(cs)],
        )?;
        self.mr13 = value;
        Ok(())
    }

    /// Exits command-bus training: CKE back high, CBT mode off.
    pub fn cbt_exit<B: RegisterBus + Copy>(
        &mut self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        let value = self.mr13 & !mr13::CBT;
        self.send(
            buffer,
            &[Command::cke_hold(cs), Command::mrw(cs, 13, value)],
        )?;
        self.mr13 = value;
        Ok(())
    }

    pub fn self_refresh_enter<B: RegisterBus + Copy>(
        &self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.send(buffer, &[Command::self_refresh_enter(cs)])
    }

    pub fn self_refresh_exit<B: RegisterBus + Copy>(
        &self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.send(
            buffer,
            &[
                Command::self_refresh_exit(cs),
                Command::refresh_all_banks(cs),
            ],
        )
    }

    /// Parks the DRAM with CKE low.
    pub fn power_down<B: RegisterBus + Copy>(
        &self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.send(buffer, &[Command::cke_low(cs)])
    }

    /// Returns the DRAM to idle with CKE high.
    pub fn idle<B: RegisterBus + Copy>(
        &self,
        buffer: &DfiBuffer<B>,
        cs: ChipSelect,
    ) -> Result<(), PhyError> {
        self.send(buffer, &[Command::cke_hold(cs)])
    }
}

impl Default for DramDev {
    fn default() -> Self {
        Self::new()
    }
}
