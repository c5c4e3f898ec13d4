// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::node::ClockKey;
use crate::register::RegisterController;
use crate::{ClockError, ClockResult};
use clktree_config::GateBank;
use std::sync::atomic::{AtomicU32, Ordering};

/// Enable bits of a clock in one of the shared gate banks, with an enable count.
///
/// The count is only changed while the bank's register lock is held, so
/// `count > 0` holds exactly when the enable bits are set.
#[derive(Debug)]
pub struct Gate {
    bank: GateBank,
    mask: u32,
    count: AtomicU32,
}

impl Gate {
    pub fn new(bank: GateBank, mask: u32) -> Self {
        Self {
            bank,
            mask,
            count: AtomicU32::new(0),
        }
    }

    pub fn bank(&self) -> GateBank {
        self.bank
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn enable_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Takes one enable reference; sets the bits on the 0 -> 1 transition.
    pub fn enable(&self, ctrl: &RegisterController) -> ClockResult<u32> {
        let mut reg = ctrl.lock()?;
        let count = self.count.load(Ordering::SeqCst);
        if count == 0 {
            let val = reg.read()?;
            reg.write(val | self.mask)?;
        }
        self.count.store(count + 1, Ordering::SeqCst);
        Ok(count + 1)
    }

    /// Drops one enable reference; clears the bits on the 1 -> 0 transition.
    pub fn disable(&self, ctrl: &RegisterController, clock: &ClockKey) -> ClockResult<u32> {
        let mut reg = ctrl.lock()?;
        let count = self.count.load(Ordering::SeqCst);
        if count == 0 {
            return Err(ClockError::AlreadyDisabled(clock.clone()));
        }
        if count == 1 {
            let val = reg.read()?;
            reg.write(val & !self.mask)?;
        }
        self.count.store(count - 1, Ordering::SeqCst);
        Ok(count - 1)
    }

    /// Brings the count in line with the hardware at registration.
    ///
    /// With `force_off` the bits are cleared. Otherwise bits left set by the
    /// bootloader count as one outstanding enable, so the first `disable`
    /// turns the clock off.
    pub(crate) fn adopt(&self, ctrl: &RegisterController, force_off: bool) -> ClockResult<bool> {
        let mut reg = ctrl.lock()?;
        let val = reg.read()?;
        let on = !force_off && (val & self.mask) != 0;
        let want = if on { val | self.mask } else { val & !self.mask };
        if want != val {
            reg.write(want)?;
        }
        self.count.store(u32::from(on), Ordering::SeqCst);
        Ok(on)
    }
}
