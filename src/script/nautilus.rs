//! The Nautilus boot procedure: firmware → GRUB menu → Nautilus shell.

use crate::keys;
use crate::pattern::{ExpectRule, Pattern, Verdict};
use crate::script::{BootScript, BootState};
use std::time::Duration;

/// Printed by the console helper once the SOL session is attached.
const SESSION_READY_MARKER: &str = "SOL Session operational";
/// Printed by the firmware when it hands off to a boot device.
const FIRMWARE_BOOT_MARKER: &str = "Booting";
/// The GRUB menu entry we are after.
const MENU_ENTRY_MARKER: &str = "Nautilus";
/// Tail of GRUB's "will be executed automatically in Ns" countdown.
const MENU_READY_MARKER: &str = "automatically";
/// Nautilus reached its shell.
const SHELL_MARKER: &str = "root-shell";
/// Nautilus hit a fault it could not handle.
const FAILURE_MARKER: &str = "UNHANDLED EXCEPTION";

/// Deadline for the SOL session to come up.
pub const SESSION_READY_DEADLINE: Duration = Duration::from_secs(15);
/// Deadline for the firmware and GRUB stages.
pub const STAGE_DEADLINE: Duration = Duration::from_secs(120);
/// Deadline for GRUB's countdown line after the entry is listed.
pub const MENU_READY_DEADLINE: Duration = Duration::from_secs(5);

/// Cursor-down presses from GRUB's default entry to Nautilus.
///
/// FRAGILE: encodes where the entry sits in this machine's menu. Any change
/// to the GRUB config moves it. Matches observed firmware behaviour; do not
/// adjust without checking the menu on the target.
pub const MENU_DOWN_PRESSES: usize = 7;
/// Enter presses to select the entry. The console sometimes drops the first
/// keystroke after navigation, so Enter is sent more than once.
pub const CONFIRM_PRESSES: usize = 3;
/// Pause after every keystroke; the SOL link loses input typed faster.
pub const KEY_INTERVAL: Duration = Duration::from_secs(1);

impl BootScript {
    /// The standard Nautilus procedure with [`MENU_DOWN_PRESSES`].
    pub fn nautilus() -> Self {
        Self::nautilus_with_down_presses(MENU_DOWN_PRESSES)
    }

    /// The Nautilus procedure with a different menu position.
    pub fn nautilus_with_down_presses(down_presses: usize) -> Self {
        Self::new()
            .expect(
                BootState::AwaitSessionReady,
                ExpectRule::new()
                    .exact("session ready", SESSION_READY_MARKER)
                    .deadline(SESSION_READY_DEADLINE),
            )
            .expect(
                BootState::AwaitFirmwareBoot,
                ExpectRule::new()
                    .exact("firmware boot", FIRMWARE_BOOT_MARKER)
                    .deadline(STAGE_DEADLINE),
            )
            .expect(
                BootState::AwaitMenuBanner,
                ExpectRule::new()
                    .exact("menu entry", MENU_ENTRY_MARKER)
                    .deadline(STAGE_DEADLINE),
            )
            .expect(
                BootState::AwaitMenuReady,
                ExpectRule::new()
                    .exact("menu ready", MENU_READY_MARKER)
                    .deadline(MENU_READY_DEADLINE),
            )
            .send(BootState::NavigateMenu, keys::CURSOR_DOWN, down_presses, KEY_INTERVAL)
            .send(BootState::ConfirmSelection, keys::ENTER, CONFIRM_PRESSES, KEY_INTERVAL)
            .expect(
                BootState::AwaitOutcome,
                ExpectRule::new()
                    .candidate("shell", Pattern::exact(SHELL_MARKER), Verdict::Succeed)
                    .candidate("unhandled exception", Pattern::exact(FAILURE_MARKER), Verdict::Fail),
            )
    }
}
