// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sense-amp offset trim.
//!
//! With the receivers in calibration mode (inputs shorted), each bit's
//! offset DAC is stepped until the sampled output flips, per rank. The
//! crossing code is the stored trim. A bit whose output never flips gets
//! the mid code, which is also what an unbonded bit reads back.

use abi::{mem_map, RANK_COUNT};
use drv_wddr_config::{SensampCal, SA_BITS_PER_BYTE};
use drv_wddr_regbus::RegisterBus;

pub const SA_CODE_MAX: u8 = 0x1f;
pub const SA_CODE_MID: u8 = 0x10;

pub mod regs {
    use drv_wddr_regbus::Field;

    pub const CFG: u32 = 0x80;
    pub const CAL_EN: Field = Field::bit(0);
    pub const RANK_SEL: Field = Field::bit(4);
    pub const BIT_SEL: Field = Field::new(8, 3);
    pub const OFFSET_CODE: Field = Field::new(16, 5);

    pub const STA: u32 = 0x84;
    pub const SAMPLE: Field = Field::bit(0);
}

pub struct SensampDev<B> {
    bus: B,
    base: u32,
}

impl<B: RegisterBus + Copy> SensampDev<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            base: mem_map::CMN,
        }
    }

    fn select(&self, rank: usize, bit: usize) {
        let addr = self.base + regs::CFG;
        let mut v = self.bus.read32(addr);
        v = regs::RANK_SEL.set(v, rank as u32);
        v = regs::BIT_SEL.set(v, bit as u32);
        self.bus.write32(addr, v);
    }

    fn drive_code(&self, code: u8) {
        self.bus
            .modify(self.base + regs::CFG, regs::OFFSET_CODE, code.into());
    }

    fn sample(&self) -> bool {
        self.bus.read_field(self.base + regs::STA, regs::SAMPLE) != 0
    }

    fn trim_bit(&self) -> u8 {
        for code in 0..=SA_CODE_MAX {
            self.drive_code(code);
            if !self.sample() {
                return code;
            }
        }
        SA_CODE_MID
    }

    /// Trims every bit on every rank, storing codes into `cal`.
    pub fn calibrate(&self, cal: &mut SensampCal) {
        self.bus.set_bit(self.base + regs::CFG, regs::CAL_EN, true);
        for rank in 0..RANK_COUNT {
            for bit in 0..SA_BITS_PER_BYTE {
                self.select(rank, bit);
                cal.offset[rank][bit] = self.trim_bit();
            }
        }
        self.bus.set_bit(self.base + regs::CFG, regs::CAL_EN, false);
    }

    /// Applies stored trim codes without re-sweeping.
    pub fn apply(&self, cal: &SensampCal) {
        for rank in 0..RANK_COUNT {
            for bit in 0..SA_BITS_PER_BYTE {
                self.select(rank, bit);
                self.drive_code(cal.offset[rank][bit]);
            }
        }
    }
}
