// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-frequency configuration and calibration tables for the WDDR PHY.
//!
//! The table splits the same way the hardware does:
//!
//! - `cfg` holds frequency-dependent configuration, fixed at build time:
//!   PLL/VCO settings, DFI pipeline delays, DRAM mode-register values, and
//!   the pad clock-stop pulse extensions. A frequency-switch `prep`
//!   programs the next-MSR half of the datapath from one `FreqCfg` entry.
//! - `cal` holds values produced by calibration: VCO band/fine from the
//!   FLL sweep and the DRAM VREF mode registers, per frequency, plus the
//!   frequency-independent section (ZQCAL codes, sense-amp offsets, VREF
//!   code) written once during boot.
//!
//! The firmware task owns the single mutable copy; after boot calibration
//! finishes it is only read.

#![cfg_attr(target_os = "none", no_std)]

use abi::{FreqId, PhyError, RANK_COUNT};

/// Number of table entries. Index 0 is the boot frequency.
pub const FREQ_COUNT: usize = 4;

/// DRAM clock in MHz for each table entry, for trace readability only.
pub const FREQ_MHZ: [u16; FREQ_COUNT] = [422, 1067, 1600, 2133];

/// PHY VCOs participating in the current/next rotation.
pub const PHY_VCO_COUNT: usize = 2;

/// DFI-to-DRAM clock ratio.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FreqRatio {
    R1To1 = 0,
    R1To2 = 1,
    R1To4 = 2,
}

/// Build-time VCO settings for one frequency.
#[derive(Copy, Clone, Debug)]
pub struct VcoCfg {
    pub post_div: u8,
    pub int_comp: u8,
    pub prop_gain: u8,
    pub fll_refclk_count: u8,
    pub fll_range: u8,
    pub fll_vco_count_target: u16,
    pub lock_count_threshold: u8,
}

/// Calibrated VCO operating point, written back by the FLL sweep.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VcoCal {
    pub band: u8,
    pub fine: u8,
}

#[derive(Copy, Clone, Debug)]
pub struct PllFreqCfg {
    pub vco: [VcoCfg; PHY_VCO_COUNT],
}

#[derive(Copy, Clone, Debug, Default)]
pub struct PllFreqCal {
    pub vco: [VcoCal; PHY_VCO_COUNT],
}

/// DFI datapath pipeline delays, programmed into the next MSR bank during
/// prep.
#[derive(Copy, Clone, Debug)]
pub struct DfiFreqCfg {
    pub ratio: FreqRatio,
    pub wrc_pipe_delay: u8,
    pub wrd_pipe_delay: u8,
    pub wren_pipe_delay: u8,
    pub rden_pipe_delay: u8,
    pub rdd_pipe_delay: u8,
}

/// DRAM mode-register values and DFI timing offsets for one frequency.
#[derive(Copy, Clone, Debug)]
pub struct DramFreqCfg {
    pub mr1: u8,
    pub mr2: u8,
    pub mr11: u8,
    pub phy_wr_lat: u8,
    pub phy_wr_en: u8,
    pub phy_rd_en: u8,
    /// Setup/hold cycles used by command-bus training.
    pub t_sh_train: u8,
    /// CA VREF settle time, in DRAM cycles.
    pub t_vref_ca_long: u16,
    /// Self-refresh exit time, in DRAM cycles.
    pub txsr: u16,
}

/// Trained DRAM VREF registers.
#[derive(Copy, Clone, Debug, Default)]
pub struct DramFreqCal {
    /// MR12, CA VREF.
    pub mr12: u8,
    /// MR14, DQ VREF.
    pub mr14: u8,
}

/// Pad clock-stop pulse extensions, per MSR bank.
#[derive(Copy, Clone, Debug)]
pub struct FswFreqCfg {
    pub cke_pulse_extend: u8,
    pub cs_pulse_extend: u8,
}

#[derive(Copy, Clone, Debug)]
pub struct FreqCfg {
    pub pll: PllFreqCfg,
    pub dfi: DfiFreqCfg,
    pub dram: DramFreqCfg,
    pub fsw: FswFreqCfg,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FreqCal {
    pub pll: PllFreqCal,
    pub dram: DramFreqCal,
}

pub const ZQCAL_VOH_COUNT: usize = 2;

/// ZQCAL codes indexed by VOH setting, then P/N leg.
#[derive(Copy, Clone, Debug, Default)]
pub struct ZqcalCal {
    pub p_code: [u8; ZQCAL_VOH_COUNT],
    pub n_code: [u8; ZQCAL_VOH_COUNT],
}

pub const SA_BITS_PER_BYTE: usize = 8;

/// Sense-amp offset trim, per rank and DQ bit.
#[derive(Copy, Clone, Debug, Default)]
pub struct SensampCal {
    pub offset: [[u8; SA_BITS_PER_BYTE]; RANK_COUNT],
}

/// Frequency-independent calibration, produced once during boot.
#[derive(Copy, Clone, Debug, Default)]
pub struct CommonCal {
    pub zqcal: ZqcalCal,
    pub sensamp: SensampCal,
    pub vref_code: u16,
}

/// The whole table.
#[derive(Clone, Debug)]
pub struct PhyTable {
    pub cfg: [FreqCfg; FREQ_COUNT],
    pub cal: [FreqCal; FREQ_COUNT],
    pub common_cal: CommonCal,
    pub valid: [bool; FREQ_COUNT],
}

impl PhyTable {
    pub fn freq_cfg(&self, freq_id: FreqId) -> Result<&FreqCfg, PhyError> {
        let i = usize::from(freq_id);
        if i >= FREQ_COUNT || !self.valid[i] {
            return Err(PhyError::InvalidFreq);
        }
        Ok(&self.cfg[i])
    }

    pub fn freq_cal(&self, freq_id: FreqId) -> Result<&FreqCal, PhyError> {
        let i = usize::from(freq_id);
        if i >= FREQ_COUNT || !self.valid[i] {
            return Err(PhyError::InvalidFreq);
        }
        Ok(&self.cal[i])
    }

    pub fn freq_cal_mut(
        &mut self,
        freq_id: FreqId,
    ) -> Result<&mut FreqCal, PhyError> {
        let i = usize::from(freq_id);
        if i >= FREQ_COUNT || !self.valid[i] {
            return Err(PhyError::InvalidFreq);
        }
        Ok(&mut self.cal[i])
    }

    pub fn is_valid(&self, freq_id: FreqId) -> bool {
        usize::from(freq_id) < FREQ_COUNT && self.valid[usize::from(freq_id)]
    }
}

// Build-time table for the LPDDR4x bring-up part. VCO comparator and FLL
// count targets scale with the DRAM clock off the 38.4 MHz reference; the
// band/fine seeds here are starting points for the FLL sweep, not final
// operating points.

const fn vco_cfg(
    post_div: u8,
    int_comp: u8,
    fll_vco_count_target: u16,
) -> VcoCfg {
    VcoCfg {
        post_div,
        int_comp,
        prop_gain: 0x7,
        fll_refclk_count: 63,
        fll_range: 2,
        fll_vco_count_target,
        lock_count_threshold: 2,
    }
}

const fn freq_cfg(
    vco: VcoCfg,
    dfi: DfiFreqCfg,
    dram: DramFreqCfg,
    fsw: FswFreqCfg,
) -> FreqCfg {
    FreqCfg {
        pll: PllFreqCfg { vco: [vco, vco] },
        dfi,
        dram,
        fsw,
    }
}

/// The boot-image table. The firmware copies this into RAM at start and
/// calibration fills in the `cal` side.
pub static BOOT_TABLE: PhyTable = PhyTable {
    cfg: [
        // 422 MHz: boot frequency, 1:1, relaxed pipeline.
        freq_cfg(
            vco_cfg(4, 11, 176),
            DfiFreqCfg {
                ratio: FreqRatio::R1To1,
                wrc_pipe_delay: 1,
                wrd_pipe_delay: 1,
                wren_pipe_delay: 1,
                rden_pipe_delay: 1,
                rdd_pipe_delay: 1,
            },
            DramFreqCfg {
                mr1: 0x26,
                mr2: 0x00,
                mr11: 0x00,
                phy_wr_lat: 2,
                phy_wr_en: 1,
                phy_rd_en: 2,
                t_sh_train: 2,
                t_vref_ca_long: 250,
                txsr: 60,
            },
            FswFreqCfg {
                cke_pulse_extend: 2,
                cs_pulse_extend: 2,
            },
        ),
        // 1067 MHz, 1:2.
        freq_cfg(
            vco_cfg(2, 14, 222),
            DfiFreqCfg {
                ratio: FreqRatio::R1To2,
                wrc_pipe_delay: 2,
                wrd_pipe_delay: 2,
                wren_pipe_delay: 2,
                rden_pipe_delay: 2,
                rdd_pipe_delay: 2,
            },
            DramFreqCfg {
                mr1: 0x56,
                mr2: 0x12,
                mr11: 0x22,
                phy_wr_lat: 4,
                phy_wr_en: 3,
                phy_rd_en: 6,
                t_sh_train: 2,
                t_vref_ca_long: 250,
                txsr: 150,
            },
            FswFreqCfg {
                cke_pulse_extend: 3,
                cs_pulse_extend: 3,
            },
        ),
        // 1600 MHz, 1:2.
        freq_cfg(
            vco_cfg(2, 21, 333),
            DfiFreqCfg {
                ratio: FreqRatio::R1To2,
                wrc_pipe_delay: 2,
                wrd_pipe_delay: 3,
                wren_pipe_delay: 2,
                rden_pipe_delay: 3,
                rdd_pipe_delay: 3,
            },
            DramFreqCfg {
                mr1: 0x66,
                mr2: 0x24,
                mr11: 0x33,
                phy_wr_lat: 6,
                phy_wr_en: 5,
                phy_rd_en: 10,
                t_sh_train: 3,
                t_vref_ca_long: 250,
                txsr: 224,
            },
            FswFreqCfg {
                cke_pulse_extend: 3,
                cs_pulse_extend: 3,
            },
        ),
        // 2133 MHz, 1:4.
        freq_cfg(
            vco_cfg(1, 14, 222),
            DfiFreqCfg {
                ratio: FreqRatio::R1To4,
                wrc_pipe_delay: 3,
                wrd_pipe_delay: 4,
                wren_pipe_delay: 3,
                rden_pipe_delay: 4,
                rdd_pipe_delay: 4,
            },
            DramFreqCfg {
                mr1: 0x76,
                mr2: 0x36,
                mr11: 0x44,
                phy_wr_lat: 8,
                phy_wr_en: 7,
                phy_rd_en: 14,
                t_sh_train: 4,
                t_vref_ca_long: 250,
                txsr: 298,
            },
            FswFreqCfg {
                cke_pulse_extend: 4,
                cs_pulse_extend: 4,
            },
        ),
    ],
    cal: [
        FreqCal {
            pll: PllFreqCal {
                vco: [VcoCal { band: 3, fine: 12 }; PHY_VCO_COUNT],
            },
            dram: DramFreqCal {
                mr12: 0x4d,
                mr14: 0x4d,
            },
        }; FREQ_COUNT
    ],
    common_cal: CommonCal {
        zqcal: ZqcalCal {
            p_code: [0x10; ZQCAL_VOH_COUNT],
            n_code: [0x08; ZQCAL_VOH_COUNT],
        },
        sensamp: SensampCal {
            offset: [[0x10; SA_BITS_PER_BYTE]; RANK_COUNT],
        },
        vref_code: 0x120,
    },
    valid: [true; FREQ_COUNT],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_table_covers_all_frequencies() {
        for id in 0..FREQ_COUNT as u8 {
            assert!(BOOT_TABLE.is_valid(id));
            assert!(BOOT_TABLE.freq_cfg(id).is_ok());
        }
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        assert_eq!(
            BOOT_TABLE.freq_cfg(FREQ_COUNT as u8).err(),
            Some(PhyError::InvalidFreq)
        );
        assert_eq!(
            BOOT_TABLE.freq_cfg(abi::UNDEFINED_FREQ_ID).err(),
            Some(PhyError::InvalidFreq)
        );
    }

    #[test]
    fn invalidated_entry_is_rejected() {
        let mut table = BOOT_TABLE.clone();
        table.valid[2] = false;
        assert_eq!(table.freq_cfg(2).err(), Some(PhyError::InvalidFreq));
        assert!(table.freq_cal_mut(1).is_ok());
    }
}
