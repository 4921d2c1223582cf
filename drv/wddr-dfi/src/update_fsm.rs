// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI update state machine.
//!
//! Two update paths share one machine because they share the IOCAL
//! recalibration step:
//!
//! - **CTRLUPD** (MC-initiated): on `ctrlupd_req` assertion the PHY
//!   recalibrates IOCAL, applies it, and raises the acknowledge; the
//!   window closes when the MC deasserts the request.
//! - **PHYUPD** (PHY-initiated): firmware raises `phyupd_req` with a time
//!   budget, waits for the MC acknowledge, applies IOCAL inside the
//!   window, then deasserts.
//!
//! The IOCAL work itself is injected through [`IocalOps`]; this machine
//! only sequences the handshake around it.

use crate::intf::DfiIntf;
use abi::{PhyError, PhyupdType};
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};

/// I/O calibration hooks, implemented by the owner over the common-analog
/// device.
pub trait IocalOps {
    /// Runs the calibration sweep, refreshing the stored trim codes.
    fn calibrate(&mut self);
    /// Applies the stored trim codes to the pads.
    fn update_phy(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DfiUpdateState {
    Idle,
    Req,
    CtrlupdWait,
    PhyupdWait,
    Cal,
    Update,
    UpdateExit,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    PhyupdReq(u8),
    PhyupdAck,
    CtrlupdAssert,
    CtrlupdDeassert,
    Rejected(DfiUpdateState),
}

ringbuf!(Trace, 16, Trace::None);

pub struct DfiUpdateFsm {
    state: DfiUpdateState,
}

impl DfiUpdateFsm {
    pub fn new() -> Self {
        Self {
            state: DfiUpdateState::Idle,
        }
    }

    pub fn state(&self) -> DfiUpdateState {
        self.state
    }

    /// PHY-initiated update request. On success the request is on the
    /// pins and the machine waits for the MC acknowledge; the caller
    /// should enable the PHYUPD ACK interrupt and arm its watchdog.
    pub fn event_req_update<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
        ty: PhyupdType,
    ) -> Result<(), PhyError> {
        if self.state != DfiUpdateState::Idle {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::PhyupdReq(ty as u8));
        self.state = DfiUpdateState::Req;
        intf.phyupd_req(ty);
        self.state = DfiUpdateState::PhyupdWait;
        Ok(())
    }

    /// MC acknowledged the PHYUPD request: the window is open. Applies
    /// IOCAL and closes the window before returning to idle.
    pub fn event_phyupd_ack<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
        iocal: &mut impl IocalOps,
    ) -> Result<(), PhyError> {
        if self.state != DfiUpdateState::PhyupdWait {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::PhyupdAck);

        self.state = DfiUpdateState::Update;
        iocal.calibrate();
        iocal.update_phy();

        self.state = DfiUpdateState::UpdateExit;
        intf.phyupd_exit();
        self.state = DfiUpdateState::Idle;
        Ok(())
    }

    /// MC asserted `ctrlupd_req`: recalibrate, apply, acknowledge. The
    /// machine then waits for the deassertion edge.
    pub fn event_ctrlupd_assert<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
        iocal: &mut impl IocalOps,
    ) -> Result<(), PhyError> {
        if self.state != DfiUpdateState::Idle {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::CtrlupdAssert);

        self.state = DfiUpdateState::Cal;
        iocal.calibrate();
        iocal.update_phy();
        intf.ctrlupd_ack(true);
        self.state = DfiUpdateState::CtrlupdWait;
        Ok(())
    }

    /// MC deasserted `ctrlupd_req`: drop the acknowledge and go idle.
    pub fn event_ctrlupd_deassert<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
    ) -> Result<(), PhyError> {
        if self.state != DfiUpdateState::CtrlupdWait {
            ringbuf_entry!(Trace::Rejected(self.state));
            return Err(PhyError::Fail);
        }
        ringbuf_entry!(Trace::CtrlupdDeassert);
        intf.ctrlupd_ack(false);
        intf.ctrlupd_ack_release();
        self.state = DfiUpdateState::Idle;
        Ok(())
    }

    /// Watchdog expiry while waiting for the PHYUPD acknowledge: retract
    /// the request and go idle.
    pub fn event_watchdog<B: RegisterBus + Copy>(
        &mut self,
        intf: &DfiIntf<B>,
    ) -> bool {
        if self.state != DfiUpdateState::PhyupdWait {
            return false;
        }
        intf.phyupd_exit();
        self.state = DfiUpdateState::Idle;
        true
    }
}

impl Default for DfiUpdateFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intf::regs;
    use abi::mem_map;
    use drv_wddr_regbus::FakeBus;

    #[derive(Default)]
    struct CountingIocal {
        calibrates: usize,
        updates: usize,
        order: Vec<&'static str>,
    }

    impl IocalOps for CountingIocal {
        fn calibrate(&mut self) {
            self.calibrates += 1;
            self.order.push("calibrate");
        }

        fn update_phy(&mut self) {
            self.updates += 1;
            self.order.push("update_phy");
        }
    }

    #[test]
    fn phyupd_round_trip() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut iocal = CountingIocal::default();
        let mut fsm = DfiUpdateFsm::new();

        fsm.event_req_update(&intf, PhyupdType::Type0).unwrap();
        assert_eq!(fsm.state(), DfiUpdateState::PhyupdWait);
        let v = bus.get(mem_map::DFI + regs::PHYUPD_IF_CFG);
        assert_eq!(regs::PHYUPD_SW_REQ_VAL.get(v), 1);

        fsm.event_phyupd_ack(&intf, &mut iocal).unwrap();
        assert_eq!(fsm.state(), DfiUpdateState::Idle);
        assert_eq!(iocal.order, ["calibrate", "update_phy"]);

        // Request deasserted and override fields cleared on exit.
        let v = bus.get(mem_map::DFI + regs::PHYUPD_IF_CFG);
        assert_eq!(regs::PHYUPD_SW_REQ_VAL.get(v), 0);
        assert_eq!(regs::PHYUPD_SW_REQ_OVR.get(v), 0);
    }

    #[test]
    fn ctrlupd_window() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut iocal = CountingIocal::default();
        let mut fsm = DfiUpdateFsm::new();

        fsm.event_ctrlupd_assert(&intf, &mut iocal).unwrap();
        assert_eq!(fsm.state(), DfiUpdateState::CtrlupdWait);
        assert_eq!(iocal.calibrates, 1);
        let v = bus.get(mem_map::DFI + regs::CTRLUPD_IF_CFG);
        assert_eq!(regs::CTRLUPD_SW_ACK_VAL.get(v), 1);

        fsm.event_ctrlupd_deassert(&intf).unwrap();
        assert_eq!(fsm.state(), DfiUpdateState::Idle);
        let v = bus.get(mem_map::DFI + regs::CTRLUPD_IF_CFG);
        assert_eq!(regs::CTRLUPD_SW_ACK_VAL.get(v), 0);
        assert_eq!(regs::CTRLUPD_SW_ACK_OVR.get(v), 0);
    }

    #[test]
    fn guards_reject_out_of_order_events() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut iocal = CountingIocal::default();
        let mut fsm = DfiUpdateFsm::new();

        assert_eq!(
            fsm.event_phyupd_ack(&intf, &mut iocal),
            Err(PhyError::Fail)
        );
        assert_eq!(fsm.event_ctrlupd_deassert(&intf), Err(PhyError::Fail));

        fsm.event_req_update(&intf, PhyupdType::Type2).unwrap();
        // A CTRLUPD window cannot open while a PHYUPD is pending.
        assert_eq!(
            fsm.event_ctrlupd_assert(&intf, &mut iocal),
            Err(PhyError::Fail)
        );
        assert_eq!(iocal.calibrates, 0);
    }

    #[test]
    fn watchdog_retracts_pending_request() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);
        let mut fsm = DfiUpdateFsm::new();

        fsm.event_req_update(&intf, PhyupdType::Type3).unwrap();
        assert!(fsm.event_watchdog(&intf));
        assert_eq!(fsm.state(), DfiUpdateState::Idle);
        assert!(!fsm.event_watchdog(&intf));
    }
}
