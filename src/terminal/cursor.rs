use std::io;
use std::os::fd::RawFd;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::Error;

bitflags! {
    /// Cell text attributes as a compact bitflag set.
    ///
    /// `CLEAN` is the renderer's memoization bit, not logical state:
    /// set after the cell's pixels were drawn, cleared by every
    /// mutator. `HAVE_FG`/`HAVE_BG` gate the per-cell color fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CellAttrs: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const STRIKETHROUGH = 1 << 4;
        const BLINK         = 1 << 5;
        const CONCEAL       = 1 << 6;
        const REVERSE       = 1 << 7;
        const URL           = 1 << 8;
        const CLEAN         = 1 << 9;
        const HAVE_FG       = 1 << 10;
        const HAVE_BG       = 1 << 11;
    }
}

/// Cursor shape for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyle {
    #[default]
    Block,
    Bar,
    Underline,
}

/// Cursor position on the live screen, relative to the grid `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub col: u16,
    pub row: u16,
}

/// Blink phase: `Off` means blinking cells render foreground as
/// background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkState {
    On,
    Off,
}

const BLINK_PERIOD_NS: i64 = 500 * 1_000_000;

/// Blink timer state backed by a kernel timer fd.
///
/// Armed lazily the first time a blinking cell is rendered; disarmed
/// by the frame orchestrator when no visible cell blinks. The fd is
/// surfaced through [`Blink::fd`] for the embedding event loop, which
/// calls [`Blink::on_fire`] and requests a refresh.
#[derive(Debug)]
pub struct Blink {
    fd: RawFd,
    pub active: bool,
    pub state: BlinkState,
}

impl Blink {
    pub fn new() -> Result<Self, Error> {
        let fd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_CLOEXEC | libc::TFD_NONBLOCK,
            )
        };
        if fd < 0 {
            return Err(Error::BlinkTimer(io::Error::last_os_error()));
        }

        Ok(Self {
            fd,
            active: false,
            state: BlinkState::On,
        })
    }

    /// Timer fd for the event loop to poll.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Arm the timer with the fixed 500 ms period.
    pub fn arm(&mut self) {
        tracing::debug!("arming blink timer");

        let alarm = libc::itimerspec {
            it_value: libc::timespec {
                tv_sec: 0,
                tv_nsec: BLINK_PERIOD_NS,
            },
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: BLINK_PERIOD_NS,
            },
        };

        let ret =
            unsafe { libc::timerfd_settime(self.fd, 0, &alarm, std::ptr::null_mut()) };
        if ret < 0 {
            tracing::error!(
                "failed to arm blink timer: {}",
                io::Error::last_os_error()
            );
        } else {
            self.active = true;
        }
    }

    /// Disarm the timer and force the visible phase back on.
    pub fn disarm(&mut self) {
        tracing::debug!("disarming blink timer");

        self.active = false;
        self.state = BlinkState::On;

        let zero = libc::itimerspec {
            it_value: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
        };

        let ret =
            unsafe { libc::timerfd_settime(self.fd, 0, &zero, std::ptr::null_mut()) };
        if ret < 0 {
            tracing::error!(
                "failed to disarm blink timer: {}",
                io::Error::last_os_error()
            );
        }
    }

    /// Handle a timer expiry surfaced by the event loop: drain the
    /// expiry counter and flip the phase. The caller is expected to
    /// request a refresh afterwards.
    pub fn on_fire(&mut self) {
        let mut expirations: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut expirations as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                tracing::error!("failed to read blink timer: {err}");
            }
            return;
        }

        self.state = match self.state {
            BlinkState::On => BlinkState::Off,
            BlinkState::Off => BlinkState::On,
        };
    }
}

impl Drop for Blink {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blink_arm_disarm_lifecycle() {
        let mut blink = Blink::new().expect("timerfd");
        assert!(!blink.active);
        assert_eq!(blink.state, BlinkState::On);

        blink.arm();
        assert!(blink.active);

        blink.state = BlinkState::Off;
        blink.disarm();
        assert!(!blink.active);
        assert_eq!(blink.state, BlinkState::On, "disarm forces the on phase");
    }
}
