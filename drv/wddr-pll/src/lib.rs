// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PLL and VCO drivers for the WDDR PHY.
//!
//! The PLL carries three VCOs. VCO 0 is dedicated to the MCU clock and is
//! configured once at boot with a fixed operating point. VCOs 1 and 2 take
//! turns driving the PHY clock: while one carries traffic, the other is
//! free to be configured for the next frequency. [`PllDev`] tracks that
//! rotation as `current` / `next` / `previous` slots over the VCO array.
//!
//! Each VCO also contains a frequency-locked loop used only during boot
//! calibration: the FLL sweeps the band/fine settings until the VCO output
//! matches a target count, and the sweep result is stored in the config
//! table as that VCO's operating point for the frequency.

#![cfg_attr(target_os = "none", no_std)]

mod fsm;
pub mod vco;

pub use fsm::{PllFsm, PllState};
pub use vco::VcoDev;

use abi::{mem_map, FreqId, PhyError, VcoId, VCO_COUNT};
use bitflags::bitflags;
use drv_wddr_config::{PllFreqCal, PllFreqCfg};
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};

// Fixed operating point for the MCU VCO. The MCU clock never changes, so
// these are not table entries.
const MCU_BAND: u8 = 0x3;
const MCU_FINE: u8 = 0x1f;
const MCU_FLL_REFCLK_COUNT: u8 = 63;
const MCU_FLL_RANGE: u8 = 2;
const MCU_FLL_VCO_COUNT_TARGET: u16 = 320;
const MCU_LOCK_COUNT_THRESHOLD: u8 = 2;

/// PLL core register map, relative to the PLL block base.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const CORE_VCO_SEL: u32 = 0x00;
    pub const VCO_SEL: Field = Field::new(0, 2);

    pub const CORE_SWITCH: u32 = 0x04;
    pub const SWITCH_VCO: Field = Field::bit(0);

    pub const CORE_RESET: u32 = 0x08;
    pub const RESET: Field = Field::bit(0);

    pub const CORE_STATUS_INT: u32 = 0x0c;
    pub const CORE_STATUS_INT_EN: u32 = 0x10;
    pub const LOSS_OF_LOCK_INT_EN: Field = Field::bit(0);
    pub const CORE_LOCKED_INT_EN: Field = Field::bit(1);
    pub const INITIAL_SWITCH_DONE_INT_EN: Field = Field::bit(2);
}

bitflags! {
    /// PLL core interrupt status word. Reading the CSR returns the latched
    /// bits; writing the same value back clears them.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct PllIntStatus: u32 {
        const LOSS_OF_LOCK = 1 << 0;
        const CORE_LOCKED = 1 << 1;
        const INITIAL_SWITCH_DONE = 1 << 2;
    }
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Boot,
    CalibrateVco { vco: u8, band: u8, fine: u8 },
    PrepareSwitch { vco: u8, freq_id: u8 },
    SwitchVco { sw: bool },
    DisablePrevious { vco: u8 },
}

ringbuf!(Trace, 32, Trace::None);

/// The PLL device: core CSRs plus the three VCOs and the rotation state.
pub struct PllDev<B> {
    bus: B,
    base: u32,
    vco: [VcoDev; VCO_COUNT],
    current: Option<usize>,
    next: Option<usize>,
    previous: Option<usize>,
}

impl<B: RegisterBus + Copy> PllDev<B> {
    pub fn new(bus: B) -> Self {
        let base = mem_map::PLL;
        Self {
            bus,
            base,
            vco: [
                VcoDev::new(VcoId::Mcu, base),
                VcoDev::new(VcoId::PhyA, base),
                VcoDev::new(VcoId::PhyB, base),
            ],
            current: None,
            next: None,
            previous: None,
        }
    }

    fn reg(&self, offset: u32) -> u32 {
        self.base + offset
    }

    /// One-shot boot: put the MCU VCO at its fixed operating point, select
    /// it, and release the PLL reset. A second call is a no-op.
    pub fn boot(&mut self) {
        if self.current.is_some() {
            return;
        }
        ringbuf_entry!(Trace::Boot);

        let mcu = &self.vco[VcoId::Mcu as usize];
        mcu.set_band(self.bus, MCU_BAND, MCU_FINE, true);
        mcu.set_fll_control2(
            self.bus,
            MCU_FLL_REFCLK_COUNT,
            MCU_FLL_RANGE,
            MCU_FLL_VCO_COUNT_TARGET,
        );
        mcu.set_fll_control1(
            self.bus,
            MCU_BAND,
            MCU_FINE,
            MCU_LOCK_COUNT_THRESHOLD,
        );
        self.current = Some(VcoId::Mcu as usize);

        self.bus
            .modify(self.reg(regs::CORE_VCO_SEL), regs::VCO_SEL, VcoId::Mcu as u32);
        self.bus.set_bit(self.reg(regs::CORE_RESET), regs::RESET, false);
    }

    /// Runs the FLL sweep on both PHY VCOs for one frequency, writing the
    /// calibrated band/fine back into `cal`. Only legal before the PHY has
    /// moved off the MCU VCO; afterwards the FLL reference is gone.
    ///
    /// The lock wait is a busy spin: during this phase the MCU runs from
    /// the low-power VCO and nothing else is schedulable.
    pub fn calibrate_vco(
        &mut self,
        cfg: &PllFreqCfg,
        cal: &mut PllFreqCal,
    ) -> Result<(), PhyError> {
        match self.current {
            Some(c) if self.vco[c].id() != VcoId::Mcu => {
                return Err(PhyError::Fail)
            }
            _ => (),
        }

        for (slot, vco) in self.vco[1..].iter().enumerate() {
            let vco_cfg = &cfg.vco[slot];
            let vco_cal = &mut cal.vco[slot];

            vco.set_fll_control2(
                self.bus,
                vco_cfg.fll_refclk_count,
                vco_cfg.fll_range,
                vco_cfg.fll_vco_count_target,
            );
            vco.set_fll_control1(
                self.bus,
                vco_cal.band,
                vco_cal.fine,
                vco_cfg.lock_count_threshold,
            );

            vco.set_fll_enable(self.bus, true);
            while !vco.is_fll_locked(self.bus) {}
            vco.set_fll_enable(self.bus, false);

            let (band, fine) = vco.fll_band_status(self.bus);
            vco_cal.band = band;
            vco_cal.fine = fine;
            ringbuf_entry!(Trace::CalibrateVco {
                vco: vco.id() as u8,
                band,
                fine,
            });
        }
        Ok(())
    }

    /// Configures whichever PHY VCO is not currently driving the PLL for
    /// `freq_id` and selects it as next.
    pub fn prepare_vco_switch(
        &mut self,
        freq_id: FreqId,
        cal: &PllFreqCal,
        cfg: &PllFreqCfg,
    ) {
        let current_id = self.current.map(|c| self.vco[c].id());

        for ndx in [VcoId::PhyA as usize, VcoId::PhyB as usize] {
            if Some(self.vco[ndx].id()) == current_id {
                continue;
            }
            let slot = ndx - 1;
            let vco_cal = &cal.vco[slot];
            let vco_cfg = &cfg.vco[slot];

            let vco = &mut self.vco[ndx];
            vco.set_enable(self.bus, true);
            vco.set_post_div(self.bus, vco_cfg.post_div);
            vco.set_int_frac(self.bus, vco_cfg.int_comp, vco_cfg.prop_gain);
            vco.set_band(self.bus, vco_cal.band, vco_cal.fine, true);
            vco.set_freq_id(Some(freq_id));

            self.bus.modify(
                self.reg(regs::CORE_VCO_SEL),
                regs::VCO_SEL,
                ndx as u32,
            );
            self.next = Some(ndx);
            ringbuf_entry!(Trace::PrepareSwitch {
                vco: ndx as u8,
                freq_id,
            });
            break;
        }
    }

    /// Rotates to the prepared VCO. With `is_sw_switch` the switch is
    /// triggered here; otherwise the MC-driven hardware path has already
    /// swapped and only the bookkeeping moves.
    pub fn switch_vco(&mut self, is_sw_switch: bool) -> Result<(), PhyError> {
        let next = self.next.ok_or(PhyError::NotPrepped)?;

        if is_sw_switch {
            self.bus
                .set_bit(self.reg(regs::CORE_SWITCH), regs::SWITCH_VCO, true);
        }

        ringbuf_entry!(Trace::SwitchVco { sw: is_sw_switch });
        self.previous = self.current;
        self.current = Some(next);
        self.next = None;
        Ok(())
    }

    /// Powers down the VCO left running across the switch. The MCU VCO is
    /// never powered down; it goes back to persistent-FLL mode with the
    /// band overrides released so it can track supply drift.
    pub fn disable_previous(&mut self) {
        let Some(prev) = self.previous.take() else {
            return;
        };
        let vco = &self.vco[prev];
        ringbuf_entry!(Trace::DisablePrevious { vco: vco.id() as u8 });

        if vco.id() == VcoId::Mcu {
            vco.set_fll_enable(self.bus, true);
            vco.set_band(self.bus, MCU_BAND, MCU_FINE, false);
        } else {
            vco.set_enable(self.bus, false);
        }
    }

    pub fn set_interrupts_enabled(&self, enable: bool) {
        let addr = self.reg(regs::CORE_STATUS_INT_EN);
        let v = enable as u32;
        self.bus.modify(addr, regs::LOSS_OF_LOCK_INT_EN, v);
        self.bus.modify(addr, regs::CORE_LOCKED_INT_EN, v);
        self.bus.modify(addr, regs::INITIAL_SWITCH_DONE_INT_EN, v);
    }

    /// Reads and clears the latched PLL interrupt status.
    pub fn take_int_status(&self) -> PllIntStatus {
        let addr = self.reg(regs::CORE_STATUS_INT);
        let raw = self.bus.read32(addr);
        self.bus.write32(addr, raw);
        PllIntStatus::from_bits_truncate(raw)
    }

    pub fn current_vco(&self) -> Option<VcoId> {
        self.current.map(|n| self.vco[n].id())
    }

    pub fn next_vco(&self) -> Option<VcoId> {
        self.next.map(|n| self.vco[n].id())
    }

    pub fn previous_vco(&self) -> Option<VcoId> {
        self.previous.map(|n| self.vco[n].id())
    }

    pub fn current_freq(&self) -> Option<FreqId> {
        self.current.and_then(|n| self.vco[n].freq_id())
    }

    pub fn next_freq(&self) -> Option<FreqId> {
        self.next.and_then(|n| self.vco[n].freq_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_wddr_config::BOOT_TABLE;
    use drv_wddr_regbus::FakeBus;

    fn locked_fll_bus() -> FakeBus {
        let bus = FakeBus::new();
        // Report every FLL as locked with band 4 / fine 9 so calibration
        // sweeps terminate.
        for vco in 1..3u32 {
            let base = vco::vco_base(mem_map::PLL, vco as usize);
            bus.load(base + vco::regs::FLL_STATUS, 1);
            bus.load(base + vco::regs::FLL_BAND_STATUS, (9 << 8) | 4);
        }
        bus
    }

    #[test]
    fn boot_selects_mcu_vco_and_is_idempotent() {
        let bus = FakeBus::new();
        let mut pll = PllDev::new(&bus);

        pll.boot();
        assert_eq!(pll.current_vco(), Some(VcoId::Mcu));
        assert_eq!(bus.read_field(mem_map::PLL + regs::CORE_VCO_SEL, regs::VCO_SEL), 0);

        let writes_after_boot = bus.write_count();
        pll.boot();
        assert_eq!(bus.write_count(), writes_after_boot);
    }

    #[test]
    fn switch_before_prepare_is_not_prepped() {
        let bus = FakeBus::new();
        let mut pll = PllDev::new(&bus);
        pll.boot();
        assert_eq!(pll.switch_vco(true), Err(PhyError::NotPrepped));
    }

    #[test]
    fn prepare_switch_rotation_alternates_phy_vcos() {
        let bus = FakeBus::new();
        let mut pll = PllDev::new(&bus);
        pll.boot();

        let cfg = &BOOT_TABLE.cfg[0].pll;
        let cal = &BOOT_TABLE.cal[0].pll;

        pll.prepare_vco_switch(0, cal, cfg);
        assert_eq!(pll.next_vco(), Some(VcoId::PhyA));
        assert_eq!(pll.next_freq(), Some(0));

        pll.switch_vco(true).unwrap();
        assert_eq!(pll.current_vco(), Some(VcoId::PhyA));
        assert_eq!(pll.previous_vco(), Some(VcoId::Mcu));
        assert_eq!(pll.next_vco(), None);

        // Next prepare must land on the other PHY VCO.
        pll.prepare_vco_switch(1, cal, cfg);
        assert_eq!(pll.next_vco(), Some(VcoId::PhyB));
        assert_ne!(pll.current_vco(), pll.next_vco());

        pll.switch_vco(false).unwrap();
        assert_eq!(pll.current_vco(), Some(VcoId::PhyB));
        assert_eq!(pll.current_freq(), Some(1));
        assert_eq!(pll.previous_vco(), Some(VcoId::PhyA));

        pll.disable_previous();
        assert_eq!(pll.previous_vco(), None);
    }

    #[test]
    fn calibrate_writes_swept_band_back() {
        let bus = locked_fll_bus();
        let mut pll = PllDev::new(&bus);
        pll.boot();

        let cfg = BOOT_TABLE.cfg[0].pll;
        let mut cal = BOOT_TABLE.cal[0].pll;
        pll.calibrate_vco(&cfg, &mut cal).unwrap();

        for v in &cal.vco {
            assert_eq!((v.band, v.fine), (4, 9));
        }
    }

    #[test]
    fn calibrate_rejected_once_phy_vco_is_current() {
        let bus = locked_fll_bus();
        let mut pll = PllDev::new(&bus);
        pll.boot();

        let cfg = BOOT_TABLE.cfg[0].pll;
        let mut cal = BOOT_TABLE.cal[0].pll;
        pll.prepare_vco_switch(0, &cal.clone(), &cfg);
        pll.switch_vco(true).unwrap();

        assert_eq!(pll.calibrate_vco(&cfg, &mut cal), Err(PhyError::Fail));
    }

    #[test]
    fn take_int_status_clears_by_writeback() {
        let bus = FakeBus::new();
        let pll = PllDev::new(&bus);
        bus.load(mem_map::PLL + regs::CORE_STATUS_INT, 0b101);

        let st = pll.take_int_status();
        assert!(st.contains(PllIntStatus::LOSS_OF_LOCK));
        assert!(st.contains(PllIntStatus::INITIAL_SWITCH_DONE));
        // Write-to-clear handshake echoed the same bits back.
        assert_eq!(bus.writes(), vec![(mem_map::PLL + regs::CORE_STATUS_INT, 0b101)]);
    }
}
