// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared ABI for the WDDR PHY firmware.
//!
//! Everything in here crosses a boundary: task to task, firmware to host
//! tooling, or firmware to the image packager. Keep it dependency-light and
//! keep the layouts stable.

#![cfg_attr(target_os = "none", no_std)]

use num_derive::FromPrimitive;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Frequency identifier: an index into the per-frequency half of the config
/// table. The boot frequency is always index 0.
pub type FreqId = u8;

/// Sentinel reported to the host when no frequency is prepared. Internally
/// the firmware uses `Option<FreqId>`; this value only appears in status
/// registers and trace entries.
pub const UNDEFINED_FREQ_ID: FreqId = 0xff;

/// Designated cold-boot frequency.
pub const BOOT_FREQ_ID: FreqId = 0;

/// VCO identifiers. The PLL carries three VCOs: one reserved for the MCU
/// clock, two that take turns driving the PHY clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum VcoId {
    Mcu = 0,
    PhyA = 1,
    PhyB = 2,
}

pub const VCO_COUNT: usize = 3;

impl VcoId {
    /// The PHY VCO that is not `self`. Meaningless for the MCU VCO.
    pub fn other_phy(self) -> VcoId {
        match self {
            VcoId::PhyA => VcoId::PhyB,
            _ => VcoId::PhyA,
        }
    }

    pub fn is_phy(self) -> bool {
        !matches!(self, VcoId::Mcu)
    }
}

/// Mode-Set-Register bank select. The PHY holds two complete configuration
/// banks; a frequency switch flips which one the datapath consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum Msr {
    Msr0 = 0,
    Msr1 = 1,
}

impl Msr {
    pub fn other(self) -> Msr {
        match self {
            Msr::Msr0 => Msr::Msr1,
            Msr::Msr1 => Msr::Msr0,
        }
    }
}

/// DRAM rank index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rank {
    Rank0 = 0,
    Rank1 = 1,
}

pub const RANK_COUNT: usize = 2;

/// Error taxonomy for the PHY firmware. `Ok` is spelled `Ok(())`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PhyError {
    /// Generic failure, including FSM guard rejections (state unchanged).
    Fail = 1,
    /// Frequency id outside the table, or the table entry is not valid.
    InvalidFreq,
    /// VCO switch requested with no prepared next VCO.
    NotPrepped,
    /// DFI ingress FIFO full; no partial packet was submitted.
    IgFifoFull,
    /// DFI egress FIFO empty before the requested packet count was read.
    EgFifoEmpty,
    /// ZQCAL P-leg sweep terminated at the minimum code.
    ZqcalPAtMin,
    /// ZQCAL P-leg sweep terminated at the maximum code.
    ZqcalPAtMax,
    /// ZQCAL N-leg sweep terminated at the minimum code.
    ZqcalNAtMin,
    /// ZQCAL N-leg sweep terminated at the maximum code.
    ZqcalNAtMax,
}

/// Notifications fanned out by the firmware task on frequency-switch FSM
/// transitions. Clients wait on these with finite deadlines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PhyNotification {
    FswPrepDone = 0,
    FswDone = 1,
    FswFailed = 2,
}

pub const NOTIFICATION_COUNT: usize = 3;

/// PHYUPD request type: a system-defined time budget the MC grants the PHY
/// for the update window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PhyupdType {
    Type0 = 0,
    Type1 = 1,
    Type2 = 2,
    Type3 = 3,
}

/// PHYMSTR request type: same scheme as `PhyupdType`, but for the window in
/// which the PHY masters the DRAM bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PhymstrType {
    Type0 = 0,
    Type1 = 1,
    Type2 = 2,
    Type3 = 3,
}

/// DRAM state the MC should park active ranks in while the PHY is master.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PhymstrStateSel {
    Idle = 0,
    Refresh = 1,
}

/// PHYMSTR request parameters carried on the DFI request CSR.
///
/// `cs_state` is a per-rank mask: bit n set means rank n is inactive for
/// the master window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhymstrReq {
    pub ty: PhymstrType,
    pub state_sel: PhymstrStateSel,
    pub cs_state: u8,
}

/// Base addresses of the CSR blocks owned by this firmware. The register
/// maps inside each block live with the driver that owns the block.
pub mod mem_map {
    pub const MCU: u32 = 0x0000_0000;
    pub const MCU_INTF: u32 = 0x0003_0000;
    pub const PLL: u32 = 0x0004_0000;
    pub const CMN: u32 = 0x0005_0000;
    pub const FSW: u32 = 0x0006_0000;
    pub const CTRL: u32 = 0x0007_0000;
    pub const DFI: u32 = 0x0008_0000;
    pub const DFICH0: u32 = 0x0009_0000;
    pub const CH0: u32 = 0x000a_0000;
}

pub const IMAGE_MAGIC: u32 = 0x7764_6472; // "wddr"
pub const IMAGE_VERSION_CURRENT: u16 = 1;

/// Image types understood by the boot ROM.
pub const IMAGE_TYPE_APP: u16 = 2;

/// Device this image is addressed to.
pub const IMAGE_DEVICE_ID_HOST: u32 = 1;

/// Image header, placed in the dedicated `.image_hdr` link section at a
/// fixed offset from the start of the image.
///
/// `crc` and `data_size` are zero at build time and populated by the
/// post-link packager; everything else is filled in by the application.
#[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ImageHeader {
    pub magic: u32,
    pub header_version: u16,
    pub image_type: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub version_patch: u8,
    pub git_dirty: u8,
    pub git_ahead: u32,
    pub git_sha: u32,
    pub vector_size: u32,
    pub vector_addr: u32,
    pub device_id: u32,
    pub crc: u32,
    pub data_size: u32,
}
