// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events, the mailbox, and the wait primitives.
//!
//! Everything that can happen to the PHY firmware is an [`FwEvent`].
//! Client-originated events carry a reply [`Completion`]; events
//! synthesized from interrupts do not. The mailbox is a bounded lock-free
//! queue drained only by the firmware task; producers post the mailbox
//! notification bit after enqueueing so a sleeping task wakes.

use abi::{FreqId, PhymstrReq, PhyupdType};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::notifications;

/// Every stimulus the firmware task handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FwEvent {
    /// Run the boot sequence.
    Boot { calibrate: bool, train_dram: bool },
    /// Prepare a frequency switch.
    Prep { freq_id: FreqId },
    /// Request a PHYUPD window.
    PhyupdReq { ty: PhyupdType },
    /// Request a PHYMSTR window.
    PhymstrReq(PhymstrReq),
    /// Give mastership back to the MC.
    PhymstrExit,
    /// MC asserted INIT_START (hardware switch edge).
    InitStart,
    /// MC observed INIT_COMPLETE release.
    InitComplete,
    /// PLL initial switch done (frequency lock).
    PllInitLock,
    /// PLL full phase lock.
    PllLock,
    /// PLL lost lock.
    PllLossLock,
    /// MC acknowledged the PHYMSTR request.
    PhymstrAck,
    /// MC aborted the PHYMSTR request.
    PhymstrAbort,
    /// MC acknowledged the PHYUPD request.
    PhyupdAck,
    /// MC aborted the PHYUPD request.
    PhyupdAbort,
    /// MC raised CTRLUPD_REQ.
    CtrlupdAssert,
    /// MC dropped CTRLUPD_REQ.
    CtrlupdDeassert,
    /// Low-power data-path request (reserved; passed through).
    LpDataReq,
    /// Low-power control request (reserved; passed through).
    LpCtrlReq,
}

/// Reply to a client-originated event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FwResp {
    Success = 0,
    Retry = 1,
    Fail = 2,
}

#[derive(Copy, Clone)]
pub struct FwMsg {
    pub event: FwEvent,
    pub reply: Option<&'static Completion>,
}

impl FwMsg {
    /// An interrupt-synthesized event with nobody waiting on it.
    pub fn internal(event: FwEvent) -> Self {
        Self { event, reply: None }
    }
}

/// One-shot reply slot. A client re-initializes it, sends a message
/// carrying its address, and polls/waits; the firmware task completes it
/// exactly once per message.
pub struct Completion(AtomicU32);

const COMPLETION_EMPTY: u32 = 0;

impl Completion {
    pub const fn new() -> Self {
        Self(AtomicU32::new(COMPLETION_EMPTY))
    }

    pub fn reinit(&self) {
        self.0.store(COMPLETION_EMPTY, Ordering::Release);
    }

    pub fn complete(&self, resp: FwResp) {
        self.0.store(resp as u32 + 1, Ordering::Release);
    }

    /// Takes the response if one has been posted, consuming it.
    pub fn try_take(&self) -> Option<FwResp> {
        match self.0.swap(COMPLETION_EMPTY, Ordering::AcqRel) {
            0 => None,
            1 => Some(FwResp::Success),
            2 => Some(FwResp::Retry),
            _ => Some(FwResp::Fail),
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// The firmware task's mailbox.
pub struct Mailbox {
    queue: heapless::mpmc::MpMcQueue<FwMsg, 16>,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            queue: heapless::mpmc::MpMcQueue::new(),
        }
    }

    /// Enqueues a message and wakes the task. Fails when the queue is
    /// full; callers treat that as a retryable condition.
    pub fn post(&self, msg: FwMsg) -> Result<(), ()> {
        self.queue.enqueue(msg).map_err(|_| ())?;
        userlib::sys_post_notification(notifications::MAILBOX_MASK);
        Ok(())
    }

    pub fn try_recv(&self) -> Option<FwMsg> {
        self.queue.dequeue()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Fan-out endpoint for the frequency-switch notifications. Kinds are
/// sticky until observed, so a client that was between polls still sees
/// the transition.
pub struct Notifier {
    pending: AtomicU32,
}

impl Notifier {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
        }
    }

    pub fn notify(&self, kind: abi::PhyNotification) {
        self.pending.fetch_or(1 << kind as u32, Ordering::AcqRel);
    }

    /// Observes and clears one notification kind.
    pub fn take(&self, kind: abi::PhyNotification) -> bool {
        let bit = 1 << kind as u32;
        self.pending.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }

    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
