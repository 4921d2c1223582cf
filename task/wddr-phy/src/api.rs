// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client interface to the PHY firmware task.
//!
//! A client owns a [`Phy`] handle wrapping the task's mailbox and a reply
//! slot. `start` and `prep_switch` are the blocking entry points; both
//! follow the send / wait-for-reply / maybe-retry discipline. One request
//! may be outstanding per handle at a time.

use crate::event::{Completion, FwEvent, FwMsg, FwResp, Mailbox};
use abi::{FreqId, PhyError};
use userlib::hl;

/// Reply wait for a prep request.
const PREP_TIMEOUT_MS: u64 = 5;
/// Attempts before a prep request is abandoned.
const PREP_TRY_COUNT: u32 = 3;

pub struct Phy {
    mailbox: &'static Mailbox,
    reply: &'static Completion,
}

impl Phy {
    pub fn new(mailbox: &'static Mailbox, reply: &'static Completion) -> Self {
        Self { mailbox, reply }
    }

    /// Fire-and-forget post, for callers that service the reply slot
    /// themselves (the boot application does).
    pub fn post(&self, event: FwEvent) -> Result<(), PhyError> {
        self.reply.reinit();
        self.mailbox
            .post(FwMsg {
                event,
                reply: Some(self.reply),
            })
            .map_err(|()| PhyError::Fail)
    }

    pub fn take_reply(&self) -> Option<FwResp> {
        self.reply.try_take()
    }

    /// Boots the PHY. Blocking and unbounded: boot has no watchdog or
    /// fallback, so this only returns once the task answers.
    pub fn start(&self, calibrate: bool, train_dram: bool) -> Result<(), PhyError> {
        self.post(FwEvent::Boot {
            calibrate,
            train_dram,
        })?;
        loop {
            if let Some(resp) = self.reply.try_take() {
                return match resp {
                    FwResp::Success => Ok(()),
                    _ => Err(PhyError::Fail),
                };
            }
            hl::sleep_for(1);
        }
    }

    /// Asks the firmware to prepare a switch to `freq_id`. Retries while
    /// the task reports it is mid-switch or the reply window lapses.
    pub fn prep_switch(&self, freq_id: FreqId) -> Result<(), PhyError> {
        for _ in 0..PREP_TRY_COUNT {
            if self.post(FwEvent::Prep { freq_id }).is_err() {
                // Mailbox full: same as a busy task.
                hl::sleep_for(1);
                continue;
            }
            match self.wait_reply(PREP_TIMEOUT_MS) {
                Some(FwResp::Success) => return Ok(()),
                Some(FwResp::Fail) => return Err(PhyError::Fail),
                Some(FwResp::Retry) | None => continue,
            }
        }
        Err(PhyError::Fail)
    }

    fn wait_reply(&self, timeout_ms: u64) -> Option<FwResp> {
        let deadline = userlib::sys_get_timer().now + timeout_ms;
        loop {
            if let Some(resp) = self.reply.try_take() {
                return Some(resp);
            }
            if userlib::sys_get_timer().now >= deadline {
                return None;
            }
            hl::sleep_for(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use userlib::test_support;

    fn handle() -> Phy {
        let mailbox: &'static Mailbox = Box::leak(Box::new(Mailbox::new()));
        let reply: &'static Completion = Box::leak(Box::new(Completion::new()));
        Phy::new(mailbox, reply)
    }

    #[test]
    fn prep_returns_ok_on_success_reply() {
        test_support::reset();
        let phy = handle();
        // Reply arrives "before" the wait, as when the task runs between
        // our post and poll.
        phy.post(FwEvent::Prep { freq_id: 1 }).unwrap();
        phy.reply.complete(FwResp::Success);
        // Start the wait with the reply already posted.
        let r = phy.wait_reply(PREP_TIMEOUT_MS);
        assert_eq!(r, Some(FwResp::Success));
    }

    #[test]
    fn prep_gives_up_after_retries() {
        test_support::reset();
        let phy = handle();
        // Nobody serves the mailbox: every attempt times out.
        assert_eq!(phy.prep_switch(1), Err(PhyError::Fail));
        // Three messages were queued, one per attempt.
        let mut n = 0;
        while phy.mailbox.try_recv().is_some() {
            n += 1;
        }
        assert_eq!(n, PREP_TRY_COUNT);
    }

    #[test]
    fn post_clears_stale_replies() {
        test_support::reset();
        let phy = handle();
        phy.reply.complete(FwResp::Success);
        phy.post(FwEvent::InitComplete).unwrap();
        // The stale response from a previous exchange is gone.
        assert_eq!(phy.take_reply(), None);
    }

    #[test]
    fn fail_reply_stops_the_retry_loop() {
        test_support::reset();
        let phy = handle();
        phy.post(FwEvent::Prep { freq_id: 9 }).unwrap();
        phy.reply.complete(FwResp::Fail);
        assert_eq!(phy.wait_reply(PREP_TIMEOUT_MS), Some(FwResp::Fail));
    }
}
