// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot application for the WDDR PHY.
//!
//! Owns the image header, claims the register bus, stands up the firmware
//! task, and requests a calibrated boot. Fatal conditions funnel through
//! [`shutdown`] with a numbered cause: 1 boot failure, 2 allocation
//! failure, 3 stack overflow; assertion failures exit with cause 4 from
//! the panic path.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

use abi::{
    ImageHeader, IMAGE_DEVICE_ID_HOST, IMAGE_MAGIC, IMAGE_TYPE_APP,
    IMAGE_VERSION_CURRENT,
};
#[cfg(target_os = "none")]
use task_wddr_phy::{Completion, Mailbox};

mod git {
    include!(concat!(env!("OUT_DIR"), "/git.rs"));
}

const FW_VERSION_MAJOR: u8 = 1;
const FW_VERSION_MINOR: u8 = 2;
const FW_VERSION_PATCH: u8 = 0;

/// Interrupt vector region reserved at the front of the image.
const VECTOR_SIZE: u32 = 0x100;

#[cfg(target_os = "none")]
const SHUTDOWN_BOOT_FAILED: u32 = 1;
#[cfg(target_os = "none")]
const SHUTDOWN_ALLOC_FAILED: u32 = 2;
#[cfg(target_os = "none")]
const SHUTDOWN_STACK_OVERFLOW: u32 = 3;

// Boot configuration: calibrate, leave training to the host.
#[cfg(target_os = "none")]
const BOOT_CALIBRATION: bool = true;
#[cfg(target_os = "none")]
const BOOT_TRAINING: bool = false;

/// The header the packager and boot ROM read. `vector_addr`, `crc`, and
/// `data_size` are patched post-link.
#[cfg_attr(target_os = "none", link_section = ".image_hdr")]
#[used]
static IMAGE_HDR: ImageHeader = ImageHeader {
    magic: IMAGE_MAGIC,
    header_version: IMAGE_VERSION_CURRENT,
    image_type: IMAGE_TYPE_APP,
    version_major: FW_VERSION_MAJOR,
    version_minor: FW_VERSION_MINOR,
    version_patch: FW_VERSION_PATCH,
    git_dirty: git::GIT_DIRTY,
    git_ahead: git::GIT_AHEAD,
    git_sha: git::GIT_SHA,
    vector_size: VECTOR_SIZE,
    vector_addr: 0,
    device_id: IMAGE_DEVICE_ID_HOST,
    crc: 0,
    data_size: 0,
};

#[cfg(target_os = "none")]
static MAILBOX: Mailbox = Mailbox::new();
#[cfg(target_os = "none")]
static REPLY: Completion = Completion::new();

#[cfg(target_os = "none")]
fn shutdown(cause: u32) -> ! {
    userlib::sys_irq_disable_all();
    userlib::sys_exit(cause)
}

#[cfg(target_os = "none")]
#[export_name = "main"]
fn main() -> ! {
    use task_wddr_phy::{api::Phy, FwEvent, FwResp, Server};

    let bus = drv_wddr_regbus::Mmio::claim();
    let mut server = Server::new(bus, &MAILBOX);
    let phy = Phy::new(&MAILBOX, &REPLY);

    // Queue the boot request; it is served on the first pass through the
    // event loop below.
    if phy
        .post(FwEvent::Boot {
            calibrate: BOOT_CALIBRATION,
            train_dram: BOOT_TRAINING,
        })
        .is_err()
    {
        shutdown(SHUTDOWN_BOOT_FAILED);
    }

    loop {
        let bits = userlib::sys_recv_notification(!0);
        server.handle_notification(bits);
        if let Some(resp) = phy.take_reply() {
            if resp != FwResp::Success {
                shutdown(SHUTDOWN_BOOT_FAILED);
            }
        }
    }
}

/// Called by the kernel when a heap allocation fails.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn firmware_alloc_failed_hook() -> ! {
    shutdown(SHUTDOWN_ALLOC_FAILED)
}

/// Called by the kernel when a task stack is overrun.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn firmware_stack_overflow_hook() -> ! {
    shutdown(SHUTDOWN_STACK_OVERFLOW)
}

// The firmware only runs on the target; a host build (what `cargo test`
// and tooling do) just sanity-checks the header.
#[cfg(not(target_os = "none"))]
fn main() {
    assert_eq!(IMAGE_HDR.magic, IMAGE_MAGIC);
}
