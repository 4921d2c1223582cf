// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The frequency-switch choreographer.
//!
//! One switch runs:
//!
//! ```text
//! idle ──prep──► prep_switch ──► wait_for_switch ──switch──► wait_for_lock
//!                                        │                        │
//!                                    (watchdog)               (watchdog)
//!                                        ▼                        ▼
//!                                       fail                    fail
//!
//! wait_for_lock ──pll locked──► post_switch ──► idle
//! ```
//!
//! `prep` programs the next-MSR half of every frequency-dependent CSR and
//! configures the spare VCO; the PHY keeps serving traffic on the current
//! bank throughout. The switch edge is either software-initiated (boot
//! only) or the MC's `INIT_START` assertion; after boot the FSM is locked
//! into hardware-switch-only mode and software switch requests are
//! rejected.
//!
//! The FSM does not touch devices directly: the owner hands in a
//! [`SwitchOps`] implementation, which keeps the machine testable and the
//! device set in one place. Watchdog deadlines for the two waiting states
//! are armed by the owner around these calls; expiry comes back in as
//! [`FreqSwitchFsm::event_watchdog`].

use abi::{FreqId, Msr, PhyError, PhyNotification};
use ringbuf::{ringbuf, ringbuf_entry};

/// Device operations the FSM sequences. Implemented by the firmware task
/// over its device bundle.
pub trait SwitchOps {
    /// Programs the next-MSR half of the frequency-dependent CSRs from the
    /// config table.
    fn prep_phy(&mut self, freq_id: FreqId, msr: Msr) -> Result<(), PhyError>;
    /// Configures the spare VCO for `freq_id` and selects it as next.
    fn prep_pll(&mut self, freq_id: FreqId) -> Result<(), PhyError>;
    /// Rotates onto the prepared VCO; triggers the swap when
    /// `is_sw_switch`, and resets the PLL lock state either way.
    fn switch_pll(&mut self, is_sw_switch: bool) -> Result<(), PhyError>;
    /// Whether the PLL has reached full phase lock.
    fn pll_locked(&self) -> bool;
    /// Releases the VCO left running across the switch.
    fn disable_previous_vco(&mut self);
    /// Invoked at the end of post-switch, before the owner releases the
    /// DFI `INIT_COMPLETE` acknowledgement to the MC.
    fn init_complete(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FswState {
    Idle,
    Fail,
    PrepSwitch,
    WaitForSwitch,
    Switch,
    PostSwitch,
    WaitForLock,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Prep { freq_id: u8, msr: u8 },
    PrepFailed,
    SwSwitchRejected,
    Switch { sw: bool },
    SwitchFailed,
    Locked,
    PostSwitch,
    WatchdogExpired(FswState),
    HwSwitchOnly,
}

ringbuf!(Trace, 32, Trace::None);

pub struct FreqSwitchFsm {
    state: FswState,
    hw_switch_only: bool,
    /// Frequency being switched to, valid from prep through post-switch.
    target: Option<(FreqId, Msr)>,
}

impl FreqSwitchFsm {
    pub fn new() -> Self {
        Self {
            state: FswState::Idle,
            hw_switch_only: false,
            target: None,
        }
    }

    pub fn state(&self) -> FswState {
        self.state
    }

    pub fn hw_switch_only(&self) -> bool {
        self.hw_switch_only
    }

    pub fn target(&self) -> Option<(FreqId, Msr)> {
        self.target
    }

    /// Locks out software switches. Only sensible from idle, once the
    /// boot switch has landed and the DFI handshake owns all further
    /// switching.
    pub fn event_hw_switch_mode(&mut self) -> Result<(), PhyError> {
        if self.state != FswState::Idle {
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::HwSwitchOnly);
        self.hw_switch_only = true;
        Ok(())
    }

    /// External prep event. Accepted from idle, and from fail as the
    /// recovery path. Runs the whole prep leg; on success the machine sits
    /// in `wait_for_switch` and the caller should arm the switch watchdog.
    pub fn event_prep(
        &mut self,
        ops: &mut impl SwitchOps,
        freq_id: FreqId,
        msr: Msr,
    ) -> Result<PhyNotification, PhyError> {
        match self.state {
            FswState::Idle | FswState::Fail => (),
            _ => return Err(PhyError::Fail),
        }

        ringbuf_entry!(Trace::Prep {
            freq_id,
            msr: msr as u8,
        });
        self.state = FswState::PrepSwitch;
        self.target = Some((freq_id, msr));

        if let Err(e) = ops.prep_phy(freq_id, msr).and_then(|()| ops.prep_pll(freq_id))
        {
            ringbuf_entry!(Trace::PrepFailed);
            self.state = FswState::Fail;
            self.target = None;
            return Err(e);
        }

        self.state = FswState::WaitForSwitch;
        Ok(PhyNotification::FswPrepDone)
    }

    /// Software-initiated switch edge; the boot sequencer's path. Rejected
    /// once `hw_switch_only` is set.
    pub fn event_sw_switch(
        &mut self,
        ops: &mut impl SwitchOps,
    ) -> Result<(), PhyError> {
        if self.hw_switch_only {
            ringbuf_entry!(Trace::SwSwitchRejected);
            return Err(PhyError::Fail);
        }
        self.switch(ops, true)
    }

    /// Hardware switch edge: the MC asserted `INIT_START` and the FSW
    /// block has already flipped MSR and VCO.
    pub fn event_init_start(
        &mut self,
        ops: &mut impl SwitchOps,
    ) -> Result<(), PhyError> {
        self.switch(ops, false)
    }

    fn switch(
        &mut self,
        ops: &mut impl SwitchOps,
        is_sw_switch: bool,
    ) -> Result<(), PhyError> {
        if self.state != FswState::WaitForSwitch {
            return Err(PhyError::Fail);
        }

        ringbuf_entry!(Trace::Switch { sw: is_sw_switch });
        self.state = FswState::Switch;

        match ops.switch_pll(is_sw_switch) {
            Ok(()) => {
                self.state = FswState::WaitForLock;
                Ok(())
            }
            Err(e) => {
                ringbuf_entry!(Trace::SwitchFailed);
                self.state = FswState::Fail;
                self.target = None;
                Err(e)
            }
        }
    }

    /// PLL reached full lock. A no-op outside `wait_for_lock`: lock
    /// interrupts also fire during boot calibration and after loss-of-lock
    /// recovery, when no switch is in flight.
    pub fn event_pll_locked(
        &mut self,
        ops: &mut impl SwitchOps,
    ) -> Option<PhyNotification> {
        if self.state != FswState::WaitForLock {
            return None;
        }
        if !ops.pll_locked() {
            return None;
        }
        ringbuf_entry!(Trace::Locked);

        self.state = FswState::PostSwitch;
        ringbuf_entry!(Trace::PostSwitch);
        ops.disable_previous_vco();
        ops.init_complete();
        self.target = None;
        self.state = FswState::Idle;
        Some(PhyNotification::FswDone)
    }

    /// Watchdog expiry while waiting on an external party.
    pub fn event_watchdog(&mut self) -> Option<PhyNotification> {
        match self.state {
            FswState::WaitForSwitch | FswState::WaitForLock => {
                ringbuf_entry!(Trace::WatchdogExpired(self.state));
                self.state = FswState::Fail;
                self.target = None;
                Some(PhyNotification::FswFailed)
            }
            _ => None,
        }
    }
}

impl Default for FreqSwitchFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted ops double: records calls, fails where told to.
    #[derive(Default)]
    struct MockOps {
        calls: Vec<&'static str>,
        prep_phy_err: Option<PhyError>,
        switch_err: Option<PhyError>,
        locked: bool,
    }

    impl SwitchOps for MockOps {
        fn prep_phy(&mut self, _: FreqId, _: Msr) -> Result<(), PhyError> {
            self.calls.push("prep_phy");
            self.prep_phy_err.map_or(Ok(()), Err)
        }

        fn prep_pll(&mut self, _: FreqId) -> Result<(), PhyError> {
            self.calls.push("prep_pll");
            Ok(())
        }

        fn switch_pll(&mut self, is_sw: bool) -> Result<(), PhyError> {
            self.calls.push(if is_sw { "switch_sw" } else { "switch_hw" });
            self.switch_err.map_or(Ok(()), Err)
        }

        fn pll_locked(&self) -> bool {
            self.locked
        }

        fn disable_previous_vco(&mut self) {
            self.calls.push("disable_previous");
        }

        fn init_complete(&mut self) {
            self.calls.push("init_complete");
        }
    }

    #[test]
    fn full_hardware_switch_sequence() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();

        let n = fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        assert_eq!(n, PhyNotification::FswPrepDone);
        assert_eq!(fsm.state(), FswState::WaitForSwitch);
        assert_eq!(fsm.target(), Some((1, Msr::Msr1)));

        fsm.event_init_start(&mut ops).unwrap();
        assert_eq!(fsm.state(), FswState::WaitForLock);

        // Lock event before the PLL actually reports lock does nothing.
        assert_eq!(fsm.event_pll_locked(&mut ops), None);

        ops.locked = true;
        assert_eq!(
            fsm.event_pll_locked(&mut ops),
            Some(PhyNotification::FswDone)
        );
        assert_eq!(fsm.state(), FswState::Idle);
        assert_eq!(fsm.target(), None);
        assert_eq!(
            ops.calls,
            [
                "prep_phy",
                "prep_pll",
                "switch_hw",
                "disable_previous",
                "init_complete",
            ]
        );
    }

    #[test]
    fn prep_rejected_while_switch_in_flight() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();

        fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        let state = fsm.state();
        assert_eq!(
            fsm.event_prep(&mut ops, 2, Msr::Msr0),
            Err(PhyError::Fail)
        );
        assert_eq!(fsm.state(), state);
    }

    #[test]
    fn sw_switch_rejected_in_hw_only_mode() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();

        fsm.event_hw_switch_mode().unwrap();
        fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        assert_eq!(fsm.event_sw_switch(&mut ops), Err(PhyError::Fail));
        // State unchanged; the MC path still works.
        assert_eq!(fsm.state(), FswState::WaitForSwitch);
        fsm.event_init_start(&mut ops).unwrap();
    }

    #[test]
    fn switch_without_prep_is_rejected() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();
        assert_eq!(fsm.event_sw_switch(&mut ops), Err(PhyError::Fail));
        assert_eq!(fsm.state(), FswState::Idle);
    }

    #[test]
    fn prep_failure_lands_in_fail_and_recovers_on_next_prep() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps {
            prep_phy_err: Some(PhyError::InvalidFreq),
            ..MockOps::default()
        };

        assert_eq!(
            fsm.event_prep(&mut ops, 3, Msr::Msr1),
            Err(PhyError::InvalidFreq)
        );
        assert_eq!(fsm.state(), FswState::Fail);

        ops.prep_phy_err = None;
        fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        assert_eq!(fsm.state(), FswState::WaitForSwitch);
    }

    #[test]
    fn watchdog_in_wait_states_fails_the_switch() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();

        fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        assert_eq!(fsm.event_watchdog(), Some(PhyNotification::FswFailed));
        assert_eq!(fsm.state(), FswState::Fail);

        // Expiry noise in a settled state does nothing.
        assert_eq!(fsm.event_watchdog(), None);
    }

    #[test]
    fn hw_switch_mode_only_from_idle() {
        let mut fsm = FreqSwitchFsm::new();
        let mut ops = MockOps::default();
        fsm.event_prep(&mut ops, 1, Msr::Msr1).unwrap();
        assert_eq!(fsm.event_hw_switch_mode(), Err(PhyError::Fail));
    }
}
