// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI datapath pipeline programming.
//!
//! The write/read command and data pipelines carry per-frequency delay
//! settings, banked per MSR. Frequency-switch prep writes the target
//! frequency's delays into the bank named by the next MSR; the live bank
//! is never touched.

use abi::{mem_map, Msr};
use drv_wddr_config::DfiFreqCfg;
use drv_wddr_regbus::RegisterBus;

pub mod regs {
    use drv_wddr_regbus::Field;

    /// Pipeline config, one register per MSR bank.
    pub const DP_M0_CFG: u32 = 0x40;
    pub const DP_M1_CFG: u32 = 0x44;

    pub const WRC_PIPE_DELAY: Field = Field::new(0, 4);
    pub const WRD_PIPE_DELAY: Field = Field::new(4, 4);
    pub const WREN_PIPE_DELAY: Field = Field::new(8, 4);
    pub const RDEN_PIPE_DELAY: Field = Field::new(12, 4);
    pub const RDD_PIPE_DELAY: Field = Field::new(16, 4);
    pub const RATIO: Field = Field::new(24, 2);
}

/// Programs one MSR bank of the DFI datapath from a frequency config.
pub fn prep_datapath<B: RegisterBus>(bus: B, msr: Msr, cfg: &DfiFreqCfg) {
    let addr = mem_map::DFICH0
        + match msr {
            Msr::Msr0 => regs::DP_M0_CFG,
            Msr::Msr1 => regs::DP_M1_CFG,
        };
    let mut v = bus.read32(addr);
    v = regs::WRC_PIPE_DELAY.set(v, cfg.wrc_pipe_delay.into());
    v = regs::WRD_PIPE_DELAY.set(v, cfg.wrd_pipe_delay.into());
    v = regs::WREN_PIPE_DELAY.set(v, cfg.wren_pipe_delay.into());
    v = regs::RDEN_PIPE_DELAY.set(v, cfg.rden_pipe_delay.into());
    v = regs::RDD_PIPE_DELAY.set(v, cfg.rdd_pipe_delay.into());
    v = regs::RATIO.set(v, cfg.ratio as u32);
    bus.write32(addr, v);
}
