// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI interface drivers for the WDDR PHY.
//!
//! Three concerns share this crate because they share the DFI register
//! space:
//!
//! - the **command buffer** ([`buffer`]): a timestamped packet FIFO the
//!   firmware uses to speak raw LPDDR command sequences whenever software
//!   (not the memory controller) owns the DRAM bus — training, boot-time
//!   mode-register programming, self-refresh entry around switches;
//! - the **handshake interface** ([`intf`]): the INIT_START/INIT_COMPLETE,
//!   PHYMSTR, PHYUPD, and CTRLUPD request/acknowledge pins, driven through
//!   software overrides;
//! - the **state machines** ([`update_fsm`], [`master_fsm`]) that sequence
//!   the PHYUPD/CTRLUPD and PHYMSTR windows over those pins.
//!
//! [`packet`] and [`command`] define the wire format the buffer carries;
//! [`dram`] layers mode-register bookkeeping on top; [`dp`] programs the
//! per-MSR datapath pipeline during frequency-switch prep.

#![cfg_attr(target_os = "none", no_std)]

pub mod buffer;
pub mod command;
pub mod dp;
pub mod dram;
pub mod intf;
pub mod master_fsm;
pub mod packet;
pub mod update_fsm;

pub use buffer::DfiBuffer;
pub use command::Command;
pub use dram::DramDev;
pub use intf::DfiIntf;
pub use master_fsm::DfiMasterFsm;
pub use packet::{RxPacket, TxPacket, TxPacketSeq};
pub use update_fsm::{DfiUpdateFsm, IocalOps};
