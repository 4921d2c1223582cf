// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The firmware task's event loop body.
//!
//! [`Server::handle_notification`] is fed every wakeup's notification
//! word. Timer bits drain into watchdog expirations, the mailbox bit
//! drains queued messages, and fast-interrupt bits are routed, acknowledged
//! (mask + sticky clear), and translated into events. All state-machine
//! and CSR work happens in [`Server::handle_event`], in task context.

use crate::boot;
use crate::event::{FwEvent, FwMsg, FwResp, Mailbox, Notifier};
use crate::notifications;
use crate::phy::{Iocal, PhyDev};
use abi::{FreqId, PhyNotification};
use drv_wddr_dfi::{DfiMasterFsm, DfiUpdateFsm};
use drv_wddr_fsw::{FreqSwitchFsm, FswState};
use drv_wddr_irq::{sticky_mask, FastIrq, IrqRouter, StickyIrq};
use drv_wddr_pll::PllIntStatus;
use drv_wddr_regbus::RegisterBus;
use multitimer::Multitimer;
use ringbuf::{ringbuf, ringbuf_entry};

/// How long the FSMs wait on an external party before declaring failure.
const WATCHDOG_SWITCH_MS: u64 = 100;
const WATCHDOG_LOCK_MS: u64 = 10;
const WATCHDOG_PHYMSTR_MS: u64 = 10;
const WATCHDOG_PHYUPD_MS: u64 = 10;

/// What a bound fast line means to this task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    InitStart,
    InitComplete,
    Pll,
    CtrlupdReq,
    PhyupdAck,
    PhymstrAck,
    LpReq,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, enum_map::Enum)]
pub enum Watchdog {
    Switch,
    Lock,
    Phymstr,
    Phyupd,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Event(FwEvent),
    Reply(FwResp),
    WatchdogFired(Watchdog),
    FastIrq(u8),
    StrayEvent(FwEvent),
}

ringbuf!(Trace, 64, Trace::None);

pub struct Server<B> {
    phy: PhyDev<B>,
    fsw_fsm: FreqSwitchFsm,
    update_fsm: DfiUpdateFsm,
    master_fsm: DfiMasterFsm,
    router: IrqRouter<B, Binding>,
    timers: Multitimer<Watchdog>,
    mailbox: &'static Mailbox,
    notifier: Notifier,
    booted: bool,
}

impl<B: RegisterBus + Copy> Server<B> {
    pub fn new(bus: B, mailbox: &'static Mailbox) -> Self {
        let mut router = IrqRouter::new(bus);

        // Bind every line we ever listen to; each stays masked until the
        // flow that needs it enables it.
        router.request_irq(FastIrq::InitStart, Binding::InitStart);
        router.request_irq(FastIrq::InitComplete, Binding::InitComplete);
        router.request_irq(FastIrq::Pll, Binding::Pll);
        router.request_irq(FastIrq::CtrlupdReq, Binding::CtrlupdReq);
        router.request_irq(FastIrq::PhyupdAck, Binding::PhyupdAck);
        router.request_irq(FastIrq::PhymstrAck, Binding::PhymstrAck);
        router.request_irq(FastIrq::LpReq, Binding::LpReq);

        // Latch everything we care about; the INIT pair stays masked
        // until boot hands switching to the DFI interface.
        router.sticky_enable(
            sticky_mask(StickyIrq::InitStart)
                | sticky_mask(StickyIrq::InitComplete)
                | sticky_mask(StickyIrq::Pll)
                | sticky_mask(StickyIrq::CtrlupdReqAssertion)
                | sticky_mask(StickyIrq::CtrlupdReqDeassertion)
                | sticky_mask(StickyIrq::PhyupdAck)
                | sticky_mask(StickyIrq::PhymstrAck)
                | sticky_mask(StickyIrq::Ch0IbufEmpty)
                | sticky_mask(StickyIrq::Ch0IbufFull),
        );
        router.sticky_set_masked(
            sticky_mask(StickyIrq::InitStart)
                | sticky_mask(StickyIrq::InitComplete),
            true,
        );

        Self {
            phy: PhyDev::new(bus),
            fsw_fsm: FreqSwitchFsm::new(),
            update_fsm: DfiUpdateFsm::new(),
            master_fsm: DfiMasterFsm::new(),
            router,
            timers: Multitimer::new(notifications::TIMER_MASK),
            mailbox,
            notifier: Notifier::new(),
            booted: false,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn phy(&self) -> &PhyDev<B> {
        &self.phy
    }

    pub fn fsw_state(&self) -> FswState {
        self.fsw_fsm.state()
    }

    pub fn hw_switch_only(&self) -> bool {
        self.fsw_fsm.hw_switch_only()
    }

    pub fn pll_state(&self) -> drv_wddr_pll::PllState {
        self.phy.pll_fsm.state()
    }

    pub fn booted(&self) -> bool {
        self.booted
    }

    /// One scheduling quantum: everything this wakeup's notification word
    /// says happened.
    pub fn handle_notification(&mut self, bits: u32) {
        self.timers.handle_notification(bits);
        let mut fired = [None; 4];
        for (slot, w) in fired.iter_mut().zip(self.timers.take_fired()) {
            *slot = Some(w);
        }
        for w in fired.into_iter().flatten() {
            self.handle_watchdog(w);
        }

        let mut lines = [None; 8];
        for (slot, hit) in lines.iter_mut().zip(self.router.dispatch(bits)) {
            *slot = Some(hit);
        }
        for (line, binding) in lines.into_iter().flatten() {
            self.handle_fast_irq(line, binding);
        }

        if bits & notifications::MAILBOX_MASK != 0 {
            while let Some(msg) = self.mailbox.try_recv() {
                self.handle_event(msg);
            }
        }
    }

    /// Acknowledge a fast line and translate it into events.
    fn handle_fast_irq(&mut self, line: FastIrq, binding: Binding) {
        ringbuf_entry!(Trace::FastIrq(line as u8));
        match binding {
            Binding::Pll => {
                // The PLL latches its own cause bits; read-and-clear
                // those, then the sticky aggregate.
                let status = self.phy.pll.take_int_status();
                self.router.sticky_clear(sticky_mask(StickyIrq::Pll));
                // Priority order matters when several bits latched behind
                // one interrupt.
                if status.contains(PllIntStatus::LOSS_OF_LOCK) {
                    self.handle_event(FwMsg::internal(FwEvent::PllLossLock));
                } else if status.contains(PllIntStatus::CORE_LOCKED) {
                    self.handle_event(FwMsg::internal(FwEvent::PllLock));
                } else if status.contains(PllIntStatus::INITIAL_SWITCH_DONE) {
                    self.handle_event(FwMsg::internal(FwEvent::PllInitLock));
                }
            }
            Binding::InitStart => {
                self.router.disable_irq(line);
                self.router.sticky_clear(sticky_mask(StickyIrq::InitStart));
                self.handle_event(FwMsg::internal(FwEvent::InitStart));
                self.router.enable_irq(line);
            }
            Binding::InitComplete => {
                self.router.disable_irq(line);
                self.router
                    .sticky_clear(sticky_mask(StickyIrq::InitComplete));
                self.handle_event(FwMsg::internal(FwEvent::InitComplete));
            }
            Binding::CtrlupdReq => {
                // Assertion and deassertion share the line; the sticky
                // word says which edge(s) happened.
                let status = self.router.sticky_status();
                let assert_bit = sticky_mask(StickyIrq::CtrlupdReqAssertion);
                let deassert_bit =
                    sticky_mask(StickyIrq::CtrlupdReqDeassertion);
                self.router.sticky_clear(assert_bit | deassert_bit);
                if status & assert_bit != 0 {
                    self.handle_event(FwMsg::internal(FwEvent::CtrlupdAssert));
                }
                if status & deassert_bit != 0 {
                    self.handle_event(FwMsg::internal(
                        FwEvent::CtrlupdDeassert,
                    ));
                }
            }
            Binding::PhyupdAck => {
                self.router.disable_irq(line);
                self.router.sticky_clear(sticky_mask(StickyIrq::PhyupdAck));
                self.handle_event(FwMsg::internal(FwEvent::PhyupdAck));
            }
            Binding::PhymstrAck => {
                self.router.disable_irq(line);
                self.router.sticky_clear(sticky_mask(StickyIrq::PhymstrAck));
                self.handle_event(FwMsg::internal(FwEvent::PhymstrAck));
            }
            Binding::LpReq => {
                let status = self.router.sticky_status();
                let data_bit = sticky_mask(StickyIrq::LpDataReq);
                let ctrl_bit = sticky_mask(StickyIrq::LpCtrlReq);
                self.router.sticky_clear(data_bit | ctrl_bit);
                if status & data_bit != 0 {
                    self.handle_event(FwMsg::internal(FwEvent::LpDataReq));
                }
                if status & ctrl_bit != 0 {
                    self.handle_event(FwMsg::internal(FwEvent::LpCtrlReq));
                }
            }
        }
    }

    pub fn handle_event(&mut self, msg: FwMsg) {
        ringbuf_entry!(Trace::Event(msg.event));
        let resp = match msg.event {
            FwEvent::Boot {
                calibrate,
                train_dram,
            } => self.do_boot(calibrate, train_dram),
            FwEvent::Prep { freq_id } => self.do_prep(freq_id),
            FwEvent::InitStart => {
                self.timers.disarm(Watchdog::Switch);
                match self.fsw_fsm.event_init_start(&mut self.phy) {
                    Ok(()) => {
                        self.timers
                            .arm_for(Watchdog::Lock, WATCHDOG_LOCK_MS);
                        FwResp::Success
                    }
                    Err(_) => {
                        // INIT_START with nothing prepped: the MC is out
                        // of step; leave the pin handshake to hardware.
                        ringbuf_entry!(Trace::StrayEvent(msg.event));
                        FwResp::Fail
                    }
                }
            }
            FwEvent::InitComplete => FwResp::Success,
            FwEvent::PllLossLock => {
                self.phy.pll_fsm.apply(PllIntStatus::LOSS_OF_LOCK);
                FwResp::Success
            }
            FwEvent::PllInitLock => {
                self.phy.pll_fsm.apply(PllIntStatus::INITIAL_SWITCH_DONE);
                FwResp::Success
            }
            FwEvent::PllLock => {
                self.phy.pll_fsm.apply(PllIntStatus::CORE_LOCKED);
                if let Some(n) = self.fsw_fsm.event_pll_locked(&mut self.phy)
                {
                    self.timers.disarm(Watchdog::Lock);
                    self.notifier.notify(n);
                }
                FwResp::Success
            }
            FwEvent::PhymstrReq(req) => {
                match self.master_fsm.event_request(&self.phy.dfi, &req) {
                    Ok(()) => {
                        self.router.enable_irq(FastIrq::PhymstrAck);
                        self.timers
                            .arm_for(Watchdog::Phymstr, WATCHDOG_PHYMSTR_MS);
                        FwResp::Success
                    }
                    Err(_) => FwResp::Fail,
                }
            }
            FwEvent::PhymstrAck => {
                self.timers.disarm(Watchdog::Phymstr);
                match self.master_fsm.event_ack() {
                    Ok(()) => FwResp::Success,
                    Err(_) => {
                        ringbuf_entry!(Trace::StrayEvent(msg.event));
                        FwResp::Fail
                    }
                }
            }
            FwEvent::PhymstrExit => {
                match self.master_fsm.event_exit(&self.phy.dfi) {
                    Ok(()) => FwResp::Success,
                    Err(_) => FwResp::Fail,
                }
            }
            FwEvent::PhyupdReq { ty } => {
                match self.update_fsm.event_req_update(&self.phy.dfi, ty) {
                    Ok(()) => {
                        self.router.enable_irq(FastIrq::PhyupdAck);
                        self.timers
                            .arm_for(Watchdog::Phyupd, WATCHDOG_PHYUPD_MS);
                        FwResp::Success
                    }
                    Err(_) => FwResp::Fail,
                }
            }
            FwEvent::PhyupdAck => {
                self.timers.disarm(Watchdog::Phyupd);
                let mut iocal = Iocal {
                    cmn: &self.phy.cmn,
                    cal: &mut self.phy.table.common_cal,
                };
                match self
                    .update_fsm
                    .event_phyupd_ack(&self.phy.dfi, &mut iocal)
                {
                    Ok(()) => FwResp::Success,
                    Err(_) => {
                        ringbuf_entry!(Trace::StrayEvent(msg.event));
                        FwResp::Fail
                    }
                }
            }
            FwEvent::CtrlupdAssert => {
                let mut iocal = Iocal {
                    cmn: &self.phy.cmn,
                    cal: &mut self.phy.table.common_cal,
                };
                match self
                    .update_fsm
                    .event_ctrlupd_assert(&self.phy.dfi, &mut iocal)
                {
                    Ok(()) => FwResp::Success,
                    Err(_) => FwResp::Fail,
                }
            }
            FwEvent::CtrlupdDeassert => {
                match self.update_fsm.event_ctrlupd_deassert(&self.phy.dfi) {
                    Ok(()) => FwResp::Success,
                    Err(_) => FwResp::Fail,
                }
            }
            FwEvent::PhymstrAbort
            | FwEvent::PhyupdAbort
            | FwEvent::LpDataReq
            | FwEvent::LpCtrlReq => {
                // Reserved flows: observed, traced, no transition.
                ringbuf_entry!(Trace::StrayEvent(msg.event));
                FwResp::Success
            }
        };

        if let Some(reply) = msg.reply {
            ringbuf_entry!(Trace::Reply(resp));
            reply.complete(resp);
        }
    }

    fn do_boot(&mut self, calibrate: bool, train_dram: bool) -> FwResp {
        if self.booted {
            // Boot is one-shot; a second request is a benign no-op.
            return FwResp::Success;
        }
        match boot::boot(
            &mut self.phy,
            &mut self.fsw_fsm,
            &self.router,
            calibrate,
            train_dram,
        ) {
            Ok(()) => {
                self.router.enable_irq(FastIrq::InitStart);
                self.router.enable_irq(FastIrq::Pll);
                self.router.enable_irq(FastIrq::CtrlupdReq);
                self.booted = true;
                FwResp::Success
            }
            Err(_) => FwResp::Fail,
        }
    }

    fn do_prep(&mut self, freq_id: FreqId) -> FwResp {
        // Not ready yet (mid-switch, or the PLL is still hunting): the
        // client should ask again.
        if !self.booted || !self.phy.pll_fsm.is_locked() {
            return FwResp::Retry;
        }
        match self.fsw_fsm.state() {
            FswState::Idle | FswState::Fail => (),
            _ => return FwResp::Retry,
        }

        let msr = self.phy.fsw.next_msr();
        match self.fsw_fsm.event_prep(&mut self.phy, freq_id, msr) {
            Ok(n) => {
                self.timers
                    .arm_for(Watchdog::Switch, WATCHDOG_SWITCH_MS);
                self.notifier.notify(n);
                FwResp::Success
            }
            Err(_) => {
                self.notifier.notify(PhyNotification::FswFailed);
                FwResp::Fail
            }
        }
    }

    fn handle_watchdog(&mut self, w: Watchdog) {
        ringbuf_entry!(Trace::WatchdogFired(w));
        match w {
            Watchdog::Switch | Watchdog::Lock => {
                if let Some(n) = self.fsw_fsm.event_watchdog() {
                    self.notifier.notify(n);
                }
            }
            Watchdog::Phymstr => {
                self.master_fsm.event_watchdog(&self.phy.dfi);
            }
            Watchdog::Phyupd => {
                self.update_fsm.event_watchdog(&self.phy.dfi);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Completion;
    use abi::{mem_map, PhymstrReq, PhymstrStateSel, PhymstrType, PhyupdType, VcoId};
    use drv_wddr_cmn::{sensamp, zqcal};
    use drv_wddr_dfi::buffer::regs as buf_regs;
    use drv_wddr_dfi::intf::regs as dfi_regs;
    use drv_wddr_pll::{vco, PllState};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use userlib::test_support;

    /// Register-level model of enough of the PHY for the boot and switch
    /// scenarios: FLLs that lock, a ZQCAL comparator and sense-amp
    /// sampler with fixed crossings, an idle DFI command buffer, and a
    /// PLL that reports phase lock whenever asked.
    struct TestBus {
        regs: RefCell<BTreeMap<u32, u32>>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                regs: RefCell::new(BTreeMap::new()),
            }
        }

        fn get(&self, addr: u32) -> u32 {
            self.regs.borrow().get(&addr).copied().unwrap_or(0)
        }
    }

    const ZQ_P_CROSSING: u8 = 0x17;
    const ZQ_N_CROSSING: u8 = 0x0a;
    const SA_CROSSING: u8 = 0x06;

    impl RegisterBus for TestBus {
        fn read32(&self, addr: u32) -> u32 {
            // PLL: every FLL reports locked, with a fixed swept band, and
            // the core interrupt status always shows full lock achieved.
            for ndx in 1..3 {
                let base = vco::vco_base(mem_map::PLL, ndx);
                if addr == base + vco::regs::FLL_STATUS {
                    return 1;
                }
                if addr == base + vco::regs::FLL_BAND_STATUS {
                    return (11 << 8) | 4;
                }
            }
            if addr == mem_map::PLL + drv_wddr_pll::regs::CORE_STATUS_INT {
                return self.get(addr);
            }

            // Common analog comparators.
            if addr == mem_map::CMN + zqcal::regs::STA {
                let cfg = self.get(mem_map::CMN + zqcal::regs::CFG);
                let (code, t) = if zqcal::regs::MODE.get(cfg) == 1 {
                    (zqcal::regs::PCAL_CODE.get(cfg) as u8, ZQ_P_CROSSING)
                } else {
                    (zqcal::regs::NCAL_CODE.get(cfg) as u8, ZQ_N_CROSSING)
                };
                return (code < t) as u32;
            }
            if addr == mem_map::CMN + sensamp::regs::STA {
                let cfg = self.get(mem_map::CMN + sensamp::regs::CFG);
                let code = sensamp::regs::OFFSET_CODE.get(cfg) as u8;
                return (code < SA_CROSSING) as u32;
            }
            if addr == mem_map::CMN + drv_wddr_cmn::regs::PMON_STA {
                return drv_wddr_cmn::regs::PMON_DONE
                    .set(drv_wddr_cmn::regs::PMON_COUNT.set(0, 0x800), 1);
            }

            // Command buffer: both FIFOs idle/empty.
            if addr == mem_map::DFICH0 + buf_regs::TOP_STA {
                return buf_regs::IG_STATE.set(0, 1) | buf_regs::EG_STATE.set(0, 1)
            }

            self.get(addr)
        }

        fn write32(&self, addr: u32, value: u32) {
            self.regs.borrow_mut().insert(addr, value);
        }
    }

    fn lock_achieved_bus() -> TestBus {
        let bus = TestBus::new();
        // Latched PLL cause bits: initial switch done + core locked.
        bus.write32(
            mem_map::PLL + drv_wddr_pll::regs::CORE_STATUS_INT,
            (PllIntStatus::CORE_LOCKED | PllIntStatus::INITIAL_SWITCH_DONE)
                .bits(),
        );
        bus
    }

    fn booted_server(
        bus: &'static TestBus,
        mailbox: &'static Mailbox,
    ) -> Server<&'static TestBus> {
        test_support::reset();
        let mut server = Server::new(bus, mailbox);
        server.handle_event(FwMsg::internal(FwEvent::Boot {
            calibrate: true,
            train_dram: false,
        }));
        assert!(server.booted());
        server
    }

    fn leak(bus: TestBus) -> &'static TestBus {
        Box::leak(Box::new(bus))
    }

    fn leak_mailbox() -> &'static Mailbox {
        Box::leak(Box::new(Mailbox::new()))
    }

    #[test]
    fn cold_boot_reaches_operating_point() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let server = booted_server(bus, mailbox);

        // S1: PHY VCO current, boot frequency selected, FSM idle in
        // hardware-switch-only mode, and nothing failed.
        assert_eq!(server.phy().current_vco(), Some(VcoId::PhyA));
        assert_eq!(server.phy().current_freq(), Some(abi::BOOT_FREQ_ID));
        assert_eq!(server.fsw_state(), FswState::Idle);
        assert!(server.hw_switch_only());
        assert_eq!(server.pll_state(), PllState::Locked);
        assert!(!server
            .notifier()
            .take(PhyNotification::FswFailed));

        // Boot calibration stored the swept values.
        let cal = &server.phy().table;
        assert_eq!(cal.common_cal.zqcal.p_code[0], ZQ_P_CROSSING);
        assert_eq!(cal.common_cal.zqcal.n_code[0], ZQ_N_CROSSING);
        assert_eq!(cal.cal[0].pll.vco[0], drv_wddr_config::VcoCal {
            band: 4,
            fine: 11,
        });

        // Switching belongs to the DFI interface now.
        let v = bus.get(mem_map::DFI + dfi_regs::STATUS_IF_CFG);
        assert_eq!(dfi_regs::INIT_COMPLETE_OVR.get(v), 0);
    }

    #[test]
    fn boot_twice_is_a_no_op() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        static REPLY: Completion = Completion::new();
        let vco = server.phy().current_vco();
        server.handle_event(FwMsg {
            event: FwEvent::Boot {
                calibrate: true,
                train_dram: false,
            },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));
        assert_eq!(server.phy().current_vco(), vco);
    }

    #[test]
    fn prep_and_mc_driven_switch() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        // S2: prep frequency 1.
        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::Prep { freq_id: 1 },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));
        assert!(server.notifier().take(PhyNotification::FswPrepDone));
        assert_eq!(server.fsw_state(), FswState::WaitForSwitch);
        assert_eq!(server.phy().pll.next_vco(), Some(VcoId::PhyB));

        // MC asserts INIT_START; hardware swaps MSR and VCO.
        server.handle_event(FwMsg::internal(FwEvent::InitStart));
        assert_eq!(server.fsw_state(), FswState::WaitForLock);

        // PLL re-locks.
        server.handle_event(FwMsg::internal(FwEvent::PllLock));
        assert_eq!(server.fsw_state(), FswState::Idle);
        assert!(server.notifier().take(PhyNotification::FswDone));
        assert_eq!(server.phy().current_freq(), Some(1));
        assert_eq!(server.phy().pll.previous_vco(), None);
    }

    #[test]
    fn back_to_back_switches_return_to_original_point() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        for target in [1u8, 0u8] {
            server.handle_event(FwMsg::internal(FwEvent::Prep {
                freq_id: target,
            }));
            server.handle_event(FwMsg::internal(FwEvent::InitStart));
            server.handle_event(FwMsg::internal(FwEvent::PllLock));
            assert_eq!(server.phy().current_freq(), Some(target));
        }
        assert_eq!(server.phy().current_vco(), Some(VcoId::PhyA));
        assert_eq!(server.fsw_state(), FswState::Idle);
    }

    #[test]
    fn prep_timeout_fails_and_recovers() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        // S3: prep, then withhold INIT_START past the watchdog.
        server.handle_event(FwMsg::internal(FwEvent::Prep { freq_id: 1 }));
        assert_eq!(server.fsw_state(), FswState::WaitForSwitch);

        test_support::advance_time(WATCHDOG_SWITCH_MS + 1);
        server.handle_notification(notifications::TIMER_MASK);
        assert_eq!(server.fsw_state(), FswState::Fail);
        assert!(server.notifier().take(PhyNotification::FswFailed));

        // The next prep recovers from the fail sink.
        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::Prep { freq_id: 1 },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));
        assert_eq!(server.fsw_state(), FswState::WaitForSwitch);
    }

    #[test]
    fn prep_rejected_while_switch_in_flight() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        server.handle_event(FwMsg::internal(FwEvent::Prep { freq_id: 1 }));

        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::Prep { freq_id: 2 },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Retry));
        assert_eq!(server.fsw_state(), FswState::WaitForSwitch);
    }

    #[test]
    fn prep_before_boot_asks_for_retry() {
        test_support::reset();
        let bus = leak(TestBus::new());
        let mailbox = leak_mailbox();
        let mut server = Server::new(bus, mailbox);

        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::Prep { freq_id: 1 },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Retry));
    }

    #[test]
    fn prep_of_invalid_frequency_fails() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::Prep {
                freq_id: drv_wddr_config::FREQ_COUNT as u8,
            },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Fail));
        assert!(server.notifier().take(PhyNotification::FswFailed));
        assert_eq!(server.fsw_state(), FswState::Fail);
    }

    #[test]
    fn phyupd_round_trip_applies_iocal() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        // S6: request, MC acknowledges, IOCAL runs, request retracted.
        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::PhyupdReq {
                ty: PhyupdType::Type0,
            },
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));

        server.handle_event(FwMsg::internal(FwEvent::PhyupdAck));
        let v = bus.get(mem_map::CMN + drv_wddr_cmn::regs::PAD_CODE_CFG);
        assert_eq!(
            drv_wddr_cmn::regs::PAD_PCAL_CODE.get(v),
            ZQ_P_CROSSING.into()
        );
        let v = bus.get(mem_map::DFI + dfi_regs::PHYUPD_IF_CFG);
        assert_eq!(dfi_regs::PHYUPD_SW_REQ_VAL.get(v), 0);
    }

    #[test]
    fn ctrlupd_window_via_fast_irq_dispatch() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        // Sticky word shows the assertion edge.
        bus.write32(
            drv_wddr_irq::regs::IRQ_FAST_STA,
            sticky_mask(StickyIrq::CtrlupdReqAssertion),
        );
        server.handle_notification(FastIrq::CtrlupdReq.notification_bit());
        let v = bus.get(mem_map::DFI + dfi_regs::CTRLUPD_IF_CFG);
        assert_eq!(dfi_regs::CTRLUPD_SW_ACK_VAL.get(v), 1);

        bus.write32(
            drv_wddr_irq::regs::IRQ_FAST_STA,
            sticky_mask(StickyIrq::CtrlupdReqDeassertion),
        );
        server.handle_notification(FastIrq::CtrlupdReq.notification_bit());
        let v = bus.get(mem_map::DFI + dfi_regs::CTRLUPD_IF_CFG);
        assert_eq!(dfi_regs::CTRLUPD_SW_ACK_VAL.get(v), 0);
    }

    #[test]
    fn phymstr_window_round_trip() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        static REPLY: Completion = Completion::new();
        server.handle_event(FwMsg {
            event: FwEvent::PhymstrReq(PhymstrReq {
                ty: PhymstrType::Type2,
                state_sel: PhymstrStateSel::Refresh,
                cs_state: 0,
            }),
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));

        server.handle_event(FwMsg::internal(FwEvent::PhymstrAck));
        server.handle_event(FwMsg {
            event: FwEvent::PhymstrExit,
            reply: Some(&REPLY),
        });
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));
        assert_eq!(bus.get(mem_map::DFI + dfi_regs::PHYMSTR_IF_CFG), 0);
    }

    #[test]
    fn pll_loss_of_lock_via_fast_irq() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);
        assert_eq!(server.pll_state(), PllState::Locked);

        bus.write32(
            mem_map::PLL + drv_wddr_pll::regs::CORE_STATUS_INT,
            PllIntStatus::LOSS_OF_LOCK.bits(),
        );
        server.handle_notification(FastIrq::Pll.notification_bit());
        assert_eq!(server.pll_state(), PllState::NotLocked);
    }

    #[test]
    fn mailbox_notification_drains_queue() {
        let bus = leak(lock_achieved_bus());
        let mailbox = leak_mailbox();
        let mut server = booted_server(bus, mailbox);

        static REPLY: Completion = Completion::new();
        mailbox
            .post(FwMsg {
                event: FwEvent::Prep { freq_id: 1 },
                reply: Some(&REPLY),
            })
            .unwrap();
        server.handle_notification(notifications::MAILBOX_MASK);
        assert_eq!(REPLY.try_take(), Some(FwResp::Success));
    }
}
