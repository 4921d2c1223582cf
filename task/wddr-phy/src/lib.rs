// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The PHY firmware task.
//!
//! One task owns the whole PHY: the four state machines, the PLL, the
//! config table, and every datapath CSR. External stimulus — client
//! requests, DFI handshake interrupts, PLL interrupts, watchdog expiry —
//! is serialized through the task's mailbox and notification word and
//! handled one event at a time by [`server::Server`]. Nothing outside
//! this task writes a datapath register.
//!
//! Clients talk to the task through [`api::Phy`].

#![cfg_attr(target_os = "none", no_std)]

pub mod api;
pub mod boot;
pub mod event;
pub mod phy;
pub mod server;

pub use event::{Completion, FwEvent, FwMsg, FwResp, Mailbox, Notifier};
pub use server::Server;

/// Notification-bit allocation for this task. Bits 2 and up belong to the
/// fast interrupt lines, per `drv_wddr_irq`.
pub mod notifications {
    pub const TIMER_MASK: u32 = 1 << 0;
    pub const MAILBOX_MASK: u32 = 1 << 1;
}

static_assertions::const_assert!(
    notifications::TIMER_MASK & notifications::MAILBOX_MASK == 0
);
static_assertions::const_assert!(
    (notifications::TIMER_MASK | notifications::MAILBOX_MASK)
        & drv_wddr_irq::FAST_IRQ_NOTIFICATION_MASK
        == 0
);
