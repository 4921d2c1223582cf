// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frequency-switch control block and state machine.
//!
//! The FSW block owns the MSR/VCO switch muxes. During boot, software
//! overrides hold the datapath on a known bank; once the PHY hands control
//! to the memory controller the overrides are released and the hardware
//! flips MSR and VCO together on the DFI `INIT_START` handshake. The block
//! also carries the per-MSR pad clock-stop pulse extensions programmed
//! during prep.

#![cfg_attr(target_os = "none", no_std)]

mod fsm;

pub use fsm::{FreqSwitchFsm, FswState, SwitchOps};

use abi::{mem_map, Msr, VcoId};
use drv_wddr_config::FswFreqCfg;
use drv_wddr_regbus::RegisterBus;

/// FSW register map, relative to the block base.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const CTRL_CFG: u32 = 0x00;
    pub const CTRL_MSR_OVR_VAL: Field = Field::bit(0);
    pub const CTRL_VCO_OVR_VAL: Field = Field::new(4, 2);
    /// While set, the override values drive the datapath and hardware
    /// switching is held off.
    pub const CTRL_OVR_EN: Field = Field::bit(8);

    pub const CTRL_STA: u32 = 0x04;
    pub const STA_CMN_MSR: Field = Field::bit(0);

    /// Pad clock-stop pulse extensions, one register per MSR bank.
    pub const CSP_0_CFG: u32 = 0x10;
    pub const CSP_1_CFG: u32 = 0x14;
    pub const CSP_CKE_PULSE_EXTEND: Field = Field::new(0, 4);
    pub const CSP_CS_PULSE_EXTEND: Field = Field::new(8, 4);
}

pub struct FswDev<B> {
    bus: B,
    base: u32,
}

impl<B: RegisterBus + Copy> FswDev<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            base: mem_map::FSW,
        }
    }

    /// Programs the values the datapath sees while the override is held.
    pub fn set_msr_vco_override_val(&self, msr: Msr, vco: VcoId) {
        let addr = self.base + regs::CTRL_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::CTRL_MSR_OVR_VAL.set(v, msr as u32);
        v = regs::CTRL_VCO_OVR_VAL.set(v, vco as u32);
        self.bus.write32(addr, v);
    }

    /// Holds or releases the MSR/VCO override. Released means hardware
    /// may switch banks on the DFI handshake.
    pub fn set_msr_vco_override(&self, enable: bool) {
        self.bus
            .set_bit(self.base + regs::CTRL_CFG, regs::CTRL_OVR_EN, enable);
    }

    /// The bank the datapath is consuming right now.
    pub fn current_msr(&self) -> Msr {
        if self.bus.read_field(self.base + regs::CTRL_STA, regs::STA_CMN_MSR) == 0
        {
            Msr::Msr0
        } else {
            Msr::Msr1
        }
    }

    pub fn next_msr(&self) -> Msr {
        self.current_msr().other()
    }

    /// Programs the pad clock-stop pulse extensions into one MSR bank.
    pub fn prep_clock_stop(&self, msr: Msr, cfg: &FswFreqCfg) {
        let addr = self.base
            + match msr {
                Msr::Msr0 => regs::CSP_0_CFG,
                Msr::Msr1 => regs::CSP_1_CFG,
            };
        let mut v = self.bus.read32(addr);
        v = regs::CSP_CKE_PULSE_EXTEND.set(v, cfg.cke_pulse_extend.into());
        v = regs::CSP_CS_PULSE_EXTEND.set(v, cfg.cs_pulse_extend.into());
        self.bus.write32(addr, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_wddr_regbus::FakeBus;

    #[test]
    fn override_program_then_release() {
        let bus = FakeBus::new();
        let fsw = FswDev::new(&bus);

        fsw.set_msr_vco_override_val(Msr::Msr0, VcoId::PhyA);
        fsw.set_msr_vco_override(false);

        let v = bus.get(mem_map::FSW + regs::CTRL_CFG);
        assert_eq!(regs::CTRL_MSR_OVR_VAL.get(v), 0);
        assert_eq!(regs::CTRL_VCO_OVR_VAL.get(v), VcoId::PhyA as u32);
        assert_eq!(regs::CTRL_OVR_EN.get(v), 0);
    }

    #[test]
    fn msr_readback_and_complement() {
        let bus = FakeBus::new();
        let fsw = FswDev::new(&bus);

        assert_eq!(fsw.current_msr(), Msr::Msr0);
        assert_eq!(fsw.next_msr(), Msr::Msr1);

        bus.load(mem_map::FSW + regs::CTRL_STA, 1);
        assert_eq!(fsw.current_msr(), Msr::Msr1);
        assert_eq!(fsw.next_msr(), Msr::Msr0);
    }

    #[test]
    fn clock_stop_lands_in_the_requested_bank() {
        let bus = FakeBus::new();
        let fsw = FswDev::new(&bus);
        let cfg = FswFreqCfg {
            cke_pulse_extend: 3,
            cs_pulse_extend: 4,
        };

        fsw.prep_clock_stop(Msr::Msr1, &cfg);
        assert_eq!(bus.get(mem_map::FSW + regs::CSP_0_CFG), 0);
        let v = bus.get(mem_map::FSW + regs::CSP_1_CFG);
        assert_eq!(regs::CSP_CKE_PULSE_EXTEND.get(v), 3);
        assert_eq!(regs::CSP_CS_PULSE_EXTEND.get(v), 4);
    }
}
