// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common-analog block: the per-chip (not per-lane) analog machinery.
//!
//! Boot calibration runs through here once: bias current on, VREF to its
//! table code, the ZQCAL impedance sweep, the sense-amp offset trim, and
//! a process-monitor reading for the trace. Results land in the config
//! table's frequency-independent calibration section. The ZQCAL sweep is
//! also re-run later inside CTRLUPD/PHYUPD windows as the IOCAL refresh.

#![cfg_attr(target_os = "none", no_std)]

pub mod sensamp;
pub mod zqcal;

pub use sensamp::SensampDev;
pub use zqcal::ZqcalDev;

use abi::{mem_map, PhyError};
use drv_wddr_config::CommonCal;
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};

/// Common block register map (bias, VREF, process monitor, pad codes),
/// relative to the block base. ZQCAL and sense-amp maps live with their
/// drivers.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const IBIAS_CFG: u32 = 0x00;
    pub const IBIAS_EN: Field = Field::bit(0);

    pub const VREF_CFG: u32 = 0x04;
    pub const VREF_EN: Field = Field::bit(0);
    pub const VREF_CODE: Field = Field::new(4, 10);
    /// 0 = off, 1 = low-power, 2 = mission.
    pub const VREF_PWR: Field = Field::new(16, 2);

    pub const PMON_CFG: u32 = 0x08;
    pub const PMON_EN: Field = Field::bit(0);
    pub const PMON_REFCLK_COUNT: Field = Field::new(4, 16);

    pub const PMON_STA: u32 = 0x0c;
    pub const PMON_DONE: Field = Field::bit(0);
    pub const PMON_COUNT: Field = Field::new(8, 24);

    /// Applied pad impedance codes, refreshed by IOCAL.
    pub const PAD_CODE_CFG: u32 = 0x10;
    pub const PAD_PCAL_CODE: Field = Field::new(0, 6);
    pub const PAD_NCAL_CODE: Field = Field::new(8, 5);
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Init,
    PmonCount(u32),
    CalibrateDone,
    CalibrateFailed(PhyError),
    IocalApplied { p: u8, n: u8 },
}

ringbuf!(Trace, 16, Trace::None);

pub struct CmnDev<B> {
    bus: B,
    base: u32,
    pub zqcal: ZqcalDev<B>,
    pub sensamp: SensampDev<B>,
}

impl<B: RegisterBus + Copy> CmnDev<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            base: mem_map::CMN,
            zqcal: ZqcalDev::new(bus),
            sensamp: SensampDev::new(bus),
        }
    }

    /// Powers the shared analog: bias current, then VREF at the stored
    /// code in mission mode.
    pub fn init(&self, cal: &CommonCal) {
        ringbuf_entry!(Trace::Init);
        self.bus
            .set_bit(self.base + regs::IBIAS_CFG, regs::IBIAS_EN, true);
        self.set_vref(cal.vref_code);
    }

    pub fn set_vref(&self, code: u16) {
        let addr = self.base + regs::VREF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::VREF_EN.set(v, 1);
        v = regs::VREF_CODE.set(v, code.into());
        v = regs::VREF_PWR.set(v, 2);
        self.bus.write32(addr, v);
    }

    /// Runs the process monitor for one count window and returns the
    /// oscillator count. Boot records it for the trace; the value also
    /// feeds manufacturing data.
    pub fn pmon_run(&self, refclk_count: u16) -> u32 {
        let cfg = self.base + regs::PMON_CFG;
        let mut v = self.bus.read32(cfg);
        v = regs::PMON_REFCLK_COUNT.set(v, refclk_count.into());
        v = regs::PMON_EN.set(v, 1);
        self.bus.write32(cfg, v);

        while self
            .bus
            .read_field(self.base + regs::PMON_STA, regs::PMON_DONE)
            == 0
        {}

        self.bus.set_bit(cfg, regs::PMON_EN, false);
        let count = self
            .bus
            .read_field(self.base + regs::PMON_STA, regs::PMON_COUNT);
        ringbuf_entry!(Trace::PmonCount(count));
        count
    }

    /// Boot-time calibration of everything behind this block. Sweep
    /// results are stored into `cal`; a ZQCAL rail error aborts the
    /// remaining steps.
    pub fn calibrate(&self, cal: &mut CommonCal) -> Result<(), PhyError> {
        if let Err(e) = self.zqcal.calibrate(&mut cal.zqcal) {
            ringbuf_entry!(Trace::CalibrateFailed(e));
            return Err(e);
        }
        self.sensamp.calibrate(&mut cal.sensamp);
        ringbuf_entry!(Trace::CalibrateDone);
        Ok(())
    }

    /// IOCAL apply: drives the pads with the stored impedance codes for
    /// the mission VOH setting.
    pub fn iocal_update_phy(&self, cal: &CommonCal) {
        let p = cal.zqcal.p_code[0];
        let n = cal.zqcal.n_code[0];
        let addr = self.base + regs::PAD_CODE_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::PAD_PCAL_CODE.set(v, p.into());
        v = regs::PAD_NCAL_CODE.set(v, n.into());
        self.bus.write32(addr, v);
        ringbuf_entry!(Trace::IocalApplied { p, n });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_wddr_regbus::FakeBus;

    #[test]
    fn init_powers_bias_and_vref() {
        let bus = FakeBus::new();
        let cmn = CmnDev::new(&bus);
        let cal = CommonCal {
            vref_code: 0x155,
            ..CommonCal::default()
        };

        cmn.init(&cal);
        assert_eq!(bus.get(mem_map::CMN + regs::IBIAS_CFG), 1);
        let v = bus.get(mem_map::CMN + regs::VREF_CFG);
        assert_eq!(regs::VREF_EN.get(v), 1);
        assert_eq!(regs::VREF_CODE.get(v), 0x155);
        assert_eq!(regs::VREF_PWR.get(v), 2);
    }

    #[test]
    fn pmon_runs_one_window() {
        let bus = FakeBus::new();
        let cmn = CmnDev::new(&bus);
        bus.load(
            mem_map::CMN + regs::PMON_STA,
            regs::PMON_DONE.set(regs::PMON_COUNT.set(0, 0x1234), 1),
        );

        assert_eq!(cmn.pmon_run(1000), 0x1234);
        // Monitor disabled again afterwards.
        assert_eq!(
            regs::PMON_EN.get(bus.get(mem_map::CMN + regs::PMON_CFG)),
            0
        );
    }

    #[test]
    fn iocal_apply_writes_mission_codes() {
        let bus = FakeBus::new();
        let cmn = CmnDev::new(&bus);
        let mut cal = CommonCal::default();
        cal.zqcal.p_code[0] = 0x21;
        cal.zqcal.n_code[0] = 0x0b;

        cmn.iocal_update_phy(&cal);
        let v = bus.get(mem_map::CMN + regs::PAD_CODE_CFG);
        assert_eq!(regs::PAD_PCAL_CODE.get(v), 0x21);
        assert_eq!(regs::PAD_NCAL_CODE.get(v), 0x0b);
    }
}
