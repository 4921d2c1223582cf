// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register driver for one VCO inside the PLL.

use abi::{FreqId, VcoId};
use drv_wddr_regbus::RegisterBus;

/// Per-VCO register stride within the PLL block.
const VCO_STRIDE: u32 = 0x20;
const VCO_REGION: u32 = 0x40;

pub fn vco_base(pll_base: u32, vco_ndx: usize) -> u32 {
    pll_base + VCO_REGION + vco_ndx as u32 * VCO_STRIDE
}

/// VCO register map, relative to each VCO's base.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const BAND: u32 = 0x00;
    pub const BAND_BAND: Field = Field::new(0, 3);
    pub const BAND_FINE: Field = Field::new(8, 6);
    /// Band override mux: 1 selects the programmed band over the FLL's.
    pub const BAND_MUX: Field = Field::bit(16);

    pub const CONTROL: u32 = 0x04;
    pub const CONTROL_ENA: Field = Field::bit(0);
    pub const CONTROL_POST_DIV: Field = Field::new(4, 3);

    pub const INT_FRAC: u32 = 0x08;
    pub const INT_FRAC_INT_COMP: Field = Field::new(0, 6);
    pub const INT_FRAC_PROP_GAIN: Field = Field::new(8, 4);

    pub const FLL_CONTROL1: u32 = 0x0c;
    pub const FLL1_BAND_START: Field = Field::new(0, 3);
    pub const FLL1_FINE_START: Field = Field::new(8, 6);
    pub const FLL1_LOCK_COUNT_THRESHOLD: Field = Field::new(16, 4);

    pub const FLL_CONTROL2: u32 = 0x10;
    pub const FLL2_REFCLK_COUNT: Field = Field::new(0, 8);
    pub const FLL2_RANGE: Field = Field::new(8, 4);
    pub const FLL2_VCO_COUNT_TARGET: Field = Field::new(16, 16);

    pub const FLL_ENABLE: u32 = 0x14;
    pub const FLL_ENA: Field = Field::bit(0);

    pub const FLL_STATUS: u32 = 0x18;
    pub const FLL_LOCKED: Field = Field::bit(0);

    pub const FLL_BAND_STATUS: u32 = 0x1c;
    pub const FLL_BAND_STATUS_BAND: Field = Field::new(0, 3);
    pub const FLL_BAND_STATUS_FINE: Field = Field::new(8, 6);
}

pub struct VcoDev {
    id: VcoId,
    freq_id: Option<FreqId>,
    base: u32,
}

impl VcoDev {
    pub(crate) fn new(id: VcoId, pll_base: u32) -> Self {
        Self {
            id,
            freq_id: None,
            base: vco_base(pll_base, id as usize),
        }
    }

    pub fn id(&self) -> VcoId {
        self.id
    }

    pub fn freq_id(&self) -> Option<FreqId> {
        self.freq_id
    }

    pub(crate) fn set_freq_id(&mut self, freq_id: Option<FreqId>) {
        self.freq_id = freq_id;
    }

    pub fn set_enable<B: RegisterBus>(&self, bus: B, enable: bool) {
        bus.set_bit(self.base + regs::CONTROL, regs::CONTROL_ENA, enable);
    }

    pub fn set_post_div<B: RegisterBus>(&self, bus: B, post_div: u8) {
        bus.modify(
            self.base + regs::CONTROL,
            regs::CONTROL_POST_DIV,
            post_div.into(),
        );
    }

    /// Programs band and fine band; `mux` selects whether the programmed
    /// values override the FLL result.
    pub fn set_band<B: RegisterBus>(&self, bus: B, band: u8, fine: u8, mux: bool) {
        let addr = self.base + regs::BAND;
        let mut v = bus.read32(addr);
        v = regs::BAND_BAND.set(v, band.into());
        v = regs::BAND_FINE.set(v, fine.into());
        v = regs::BAND_MUX.set(v, mux as u32);
        bus.write32(addr, v);
    }

    pub fn set_int_frac<B: RegisterBus>(&self, bus: B, int_comp: u8, prop_gain: u8) {
        let addr = self.base + regs::INT_FRAC;
        let mut v = bus.read32(addr);
        v = regs::INT_FRAC_INT_COMP.set(v, int_comp.into());
        v = regs::INT_FRAC_PROP_GAIN.set(v, prop_gain.into());
        bus.write32(addr, v);
    }

    pub fn set_fll_control1<B: RegisterBus>(
        &self,
        bus: B,
        band_start: u8,
        fine_start: u8,
        lock_count_threshold: u8,
    ) {
        let addr = self.base + regs::FLL_CONTROL1;
        let mut v = bus.read32(addr);
        v = regs::FLL1_BAND_START.set(v, band_start.into());
        v = regs::FLL1_FINE_START.set(v, fine_start.into());
        v = regs::FLL1_LOCK_COUNT_THRESHOLD.set(v, lock_count_threshold.into());
        bus.write32(addr, v);
    }

    pub fn set_fll_control2<B: RegisterBus>(
        &self,
        bus: B,
        refclk_count: u8,
        range: u8,
        vco_count_target: u16,
    ) {
        let addr = self.base + regs::FLL_CONTROL2;
        let mut v = bus.read32(addr);
        v = regs::FLL2_REFCLK_COUNT.set(v, refclk_count.into());
        v = regs::FLL2_RANGE.set(v, range.into());
        v = regs::FLL2_VCO_COUNT_TARGET.set(v, vco_count_target.into());
        bus.write32(addr, v);
    }

    pub fn set_fll_enable<B: RegisterBus>(&self, bus: B, enable: bool) {
        bus.set_bit(self.base + regs::FLL_ENABLE, regs::FLL_ENA, enable);
    }

    pub fn is_fll_locked<B: RegisterBus>(&self, bus: B) -> bool {
        bus.read_field(self.base + regs::FLL_STATUS, regs::FLL_LOCKED) != 0
    }

    /// Reads back the band the FLL sweep settled on.
    pub fn fll_band_status<B: RegisterBus>(&self, bus: B) -> (u8, u8) {
        let v = bus.read32(self.base + regs::FLL_BAND_STATUS);
        (
            regs::FLL_BAND_STATUS_BAND.get(v) as u8,
            regs::FLL_BAND_STATUS_FINE.get(v) as u8,
        )
    }
}
