// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI master state machine.
//!
//! Sequences the PHYMSTR window: the PHY asks the MC for master control
//! of the DRAM bus (naming a time budget, the parked DRAM state, and the
//! active ranks), waits for the acknowledge, owns the bus in `master` —
//! training sequences run through the command buffer here — and exits
//! with the event-done pulse.

use crate::intf::DfiIntf;
use abi::{PhyError, PhymstrReq};
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DfiMasterState {
    Idle,
    Req,
    Wait,
    Master,
    Exit,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Req { ty: u8, cs_state: u8 },
    Ack,
    Exit,
    Rejected(DfiMasterState),
    WatchdogExpired,
}

ringbuf!(Trace, 16, Trace::None);

pub struct DfiMasterFsm {
    state: DfiMasterState,
}

impl DfiMasterFsm {
    pub fn new() -> Self {
        Self {
            state: DfiMasterState::Idle,
        }
    }

    pub fn state(&self) -> DfiMasterState {
        self.state
    }

    pub fn is_master(&self) -> bool {
        self.state == DfiMasterState::Master
    }

    /// Raises the PHYMSTR request. Only legal from idle. On success the
    /// machine waits for the acknowledge; the caller enables the ACK
    /// interrupt and arms its watchdog.
    pub fn event_request<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
        req: &PhymstrReq,
    ) -> Result<(), PhyError> {
        if self.state != DfiMasterState::Idle {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::Req {
            ty: req.ty as u8,
            cs_state: req.cs_state,
        });
        self.state = DfiMasterState::Req;
        intf.phymstr_req(req);
        self.state = DfiMasterState::Wait;
        Ok(())
    }

    /// MC acknowledged: the PHY now masters the DRAM bus.
    pub fn event_ack(&mut self) -> Result<(), PhyError> {
        if self.state != DfiMasterState::Wait {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::Ack);
        self.state = DfiMasterState::Master;
        Ok(())
    }

    /// Gives the bus back. Only legal from `master`; deasserts the
    /// request, pulses event-done, and waits for ACK low.
    pub fn event_exit<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
    ) -> Result<(), PhyError> {
        if self.state != DfiMasterState::Master {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::Exit);
        self.state = DfiMasterState::Exit;
        intf.phymstr_exit();
        self.state = DfiMasterState::Idle;
        Ok(())
    }

    /// Watchdog expiry while waiting for the acknowledge: retract the
    /// request.
    pub fn event_watchdog<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
    ) -> bool {
        if self.state != DfiMasterState::Wait {
            return false;
        }
        ringbuf_entry!(Trace::WatchdogExpired);
        self.state = DfiMasterState::Exit;
        intf.phymstr_exit();
        self.state = DfiMasterState::Idle;
        true
    }
}

impl Default for DfiMasterFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intf::regs;
    use abi::{mem_map, PhymstrStateSel, PhymstrType};
    use drv_wddr_regbus::FakeBus;

    fn req() -> PhymstrReq {
        PhymstrReq {
            ty: PhymstrType::Type1,
            state_sel: PhymstrStateSel::Refresh,
            cs_state: 0b01,
        }
    }

    #[test]
    fn request_ack_master_exit_cycle() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut fsm = DfiMasterFsm::new();

        fsm.event_request(&intf, &req()).unwrap();
        assert_eq!(fsm.state(), DfiMasterState::Wait);
        let v = bus.get(mem_map::DFI + regs::PHYMSTR_IF_CFG);
        assert_eq!(regs::PHYMSTR_SW_REQ_VAL.get(v), 1);

        fsm.event_ack().unwrap();
        assert!(fsm.is_master());

        fsm.event_exit(&intf).unwrap();
        assert_eq!(fsm.state(), DfiMasterState::Idle);
        assert_eq!(bus.get(mem_map::DFI + regs::PHYMSTR_IF_CFG), 0);
    }

    #[test]
    fn request_only_from_idle() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut fsm = DfiMasterFsm::new();

        fsm.event_request(&intf, &req()).unwrap();
        assert_eq!(fsm.event_request(&intf, &req()), Err(PhyError::Fail));
        assert_eq!(fsm.state(), DfiMasterState::Wait);
    }

    #[test]
    fn exit_only_from_master() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut fsm = DfiMasterFsm::new();

        assert_eq!(fsm.event_exit(&intf), Err(PhyError::Fail));
        fsm.event_request(&intf, &req()).unwrap();
        assert_eq!(fsm.event_exit(&intf), Err(PhyError::Fail));
    }

    #[test]
    fn stray_ack_is_rejected() {
        let mut fsm = DfiMasterFsm::new();
        assert_eq!(fsm.event_ack(), Err(PhyError::Fail));
    }

    #[test]
    fn watchdog_retracts_unacknowledged_request() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut fsm = DfiMasterFsm::new();

        fsm.event_request(&intf, &req()).unwrap();
        assert!(fsm.event_watchdog(&intf));
        assert_eq!(fsm.state(), DfiMasterState::Idle);
    }
}
