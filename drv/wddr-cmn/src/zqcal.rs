// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Termination-impedance calibration.
//!
//! For each VOH setting, the N (pull-down) and P (pull-up) legs are swept
//! from code zero until the comparator flips. A sweep that ends on either
//! rail means the external reference resistor or the pad is broken, and
//! calibration fails with a leg-specific error.

use abi::{mem_map, PhyError};
use drv_wddr_config::{ZqcalCal, ZQCAL_VOH_COUNT};
use drv_wddr_regbus::RegisterBus;

pub const PCAL_CODE_MIN: u8 = 0;
pub const PCAL_CODE_MAX: u8 = 0x3f;
pub const NCAL_CODE_MIN: u8 = 0;
pub const NCAL_CODE_MAX: u8 = 0x1f;

/// Which leg is under calibration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZqcalMode {
    PullDown = 0,
    PullUp = 1,
}

pub mod regs {
    use drv_wddr_regbus::Field;

    /// ZQCAL registers live at the tail of the common block.
    pub const CFG: u32 = 0x40;
    pub const EN: Field = Field::bit(0);
    pub const MODE: Field = Field::bit(4);
    pub const VOH: Field = Field::new(8, 2);
    pub const PCAL_CODE: Field = Field::new(16, 6);
    pub const NCAL_CODE: Field = Field::new(24, 5);

    pub const STA: u32 = 0x44;
    pub const COMP_OUTPUT: Field = Field::bit(0);
}

pub struct ZqcalDev<B> {
    bus: B,
    base: u32,
}

impl<B: RegisterBus + Copy> ZqcalDev<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            base: mem_map::CMN,
        }
    }

    fn set_enabled(&self, enable: bool) {
        self.bus.set_bit(self.base + regs::CFG, regs::EN, enable);
    }

    fn set_mode(&self, mode: ZqcalMode) {
        self.bus
            .modify(self.base + regs::CFG, regs::MODE, mode as u32);
    }

    fn set_voh(&self, voh: u8) {
        self.bus.modify(self.base + regs::CFG, regs::VOH, voh.into());
    }

    fn set_code(&self, mode: ZqcalMode, code: u8) {
        let field = match mode {
            ZqcalMode::PullUp => regs::PCAL_CODE,
            ZqcalMode::PullDown => regs::NCAL_CODE,
        };
        self.bus.modify(self.base + regs::CFG, field, code.into());
    }

    fn comparator_output(&self) -> bool {
        self.bus
            .read_field(self.base + regs::STA, regs::COMP_OUTPUT)
            != 0
    }

    /// Sweeps one leg upward until the comparator flips or the code
    /// saturates; returns the last code driven.
    fn sweep(&self, mode: ZqcalMode, max_code: u8) -> u8 {
        self.set_mode(mode);
        let mut code = 0;
        loop {
            self.set_code(mode, code);
            if !self.comparator_output() || code >= max_code {
                return code;
            }
            code += 1;
        }
    }

    fn calibrate_voh(&self, voh: u8, cal: &mut ZqcalCal) -> Result<(), PhyError> {
        self.set_voh(voh);

        let n = self.sweep(ZqcalMode::PullDown, NCAL_CODE_MAX);
        if n == NCAL_CODE_MIN {
            return Err(PhyError::ZqcalNAtMin);
        }
        if n == NCAL_CODE_MAX {
            return Err(PhyError::ZqcalNAtMax);
        }

        let p = self.sweep(ZqcalMode::PullUp, PCAL_CODE_MAX);
        if p == PCAL_CODE_MIN {
            return Err(PhyError::ZqcalPAtMin);
        }
        if p == PCAL_CODE_MAX {
            return Err(PhyError::ZqcalPAtMax);
        }

        cal.n_code[voh as usize] = n;
        cal.p_code[voh as usize] = p;
        Ok(())
    }

    /// Calibrates every VOH setting, storing codes into `cal`. The block
    /// is disabled again on the way out, pass or fail.
    pub fn calibrate(&self, cal: &mut ZqcalCal) -> Result<(), PhyError> {
        self.set_enabled(true);
        let mut result = Ok(());
        for voh in 0..ZQCAL_VOH_COUNT as u8 {
            result = self.calibrate_voh(voh, cal);
            if result.is_err() {
                break;
            }
        }
        self.set_enabled(false);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Bus double with a comparator model: the output stays high until
    /// the driven code reaches a per-leg threshold.
    struct ComparatorBus {
        regs: RefCell<BTreeMap<u32, u32>>,
        p_threshold: Cell<u8>,
        n_threshold: Cell<u8>,
    }

    impl ComparatorBus {
        fn new(p_threshold: u8, n_threshold: u8) -> Self {
            Self {
                regs: RefCell::new(BTreeMap::new()),
                p_threshold: Cell::new(p_threshold),
                n_threshold: Cell::new(n_threshold),
            }
        }
    }

    impl RegisterBus for ComparatorBus {
        fn read32(&self, addr: u32) -> u32 {
            if addr == mem_map::CMN + regs::STA {
                let cfg = self
                    .regs
                    .borrow()
                    .get(&(mem_map::CMN + regs::CFG))
                    .copied()
                    .unwrap_or(0);
                let (code, threshold) = if regs::MODE.get(cfg) == 1 {
                    (regs::PCAL_CODE.get(cfg) as u8, self.p_threshold.get())
                } else {
                    (regs::NCAL_CODE.get(cfg) as u8, self.n_threshold.get())
                };
                return (code < threshold) as u32;
            }
            self.regs.borrow().get(&addr).copied().unwrap_or(0)
        }

        fn write32(&self, addr: u32, value: u32) {
            self.regs.borrow_mut().insert(addr, value);
        }
    }

    #[test]
    fn sweep_stores_codes_for_every_voh() {
        let bus = ComparatorBus::new(0x18, 0x09);
        let zqcal = ZqcalDev::new(&bus);
        let mut cal = ZqcalCal::default();

        zqcal.calibrate(&mut cal).unwrap();
        for voh in 0..ZQCAL_VOH_COUNT {
            assert_eq!(cal.p_code[voh], 0x18);
            assert_eq!(cal.n_code[voh], 0x09);
        }
        // Block left disabled.
        assert_eq!(
            regs::EN.get(bus.regs.borrow()[&(mem_map::CMN + regs::CFG)]),
            0
        );
    }

    #[test]
    fn stuck_low_comparator_reports_at_min() {
        let bus = ComparatorBus::new(0x18, 0);
        let zqcal = ZqcalDev::new(&bus);
        let mut cal = ZqcalCal::default();
        assert_eq!(zqcal.calibrate(&mut cal), Err(PhyError::ZqcalNAtMin));
    }

    #[test]
    fn stuck_high_comparator_reports_at_max() {
        let bus = ComparatorBus::new(0xff, 0x09);
        let zqcal = ZqcalDev::new(&bus);
        let mut cal = ZqcalCal::default();
        assert_eq!(zqcal.calibrate(&mut cal), Err(PhyError::ZqcalPAtMax));
    }

    #[test]
    fn failed_sweep_leaves_cal_untouched() {
        let bus = ComparatorBus::new(0xff, 0x09);
        let zqcal = ZqcalDev::new(&bus);
        let mut cal = ZqcalCal::default();
        let before = cal;
        let _ = zqcal.calibrate(&mut cal);
        assert_eq!(cal.p_code, before.p_code);
        assert_eq!(cal.n_code, before.n_code);
    }
}
