// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Integer divider stage. The field stores `divisor - 1`, so a `w`-bit field
//! divides by 1 through `2^w`.

use crate::node::ClockKey;
use crate::register::{RegisterField, RegisterMap};
use crate::{ClockError, ClockResult};

#[derive(Debug)]
pub struct Divider {
    field: RegisterField,
}

impl Divider {
    pub fn new(field: RegisterField) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &RegisterField {
        &self.field
    }

    pub fn max_divisor(&self) -> u64 {
        u64::from(self.field.max_value()) + 1
    }

    /// Slowest achievable rate for `parent_rate`.
    pub fn min_rate(&self, parent_rate: u64) -> u64 {
        parent_rate / self.max_divisor()
    }

    pub fn divisor(&self, regs: &RegisterMap) -> ClockResult<u64> {
        Ok(u64::from(regs.read_field(&self.field)?) + 1)
    }

    pub fn recalc(&self, parent_rate: u64, regs: &RegisterMap) -> ClockResult<u64> {
        Ok(parent_rate / self.divisor(regs)?)
    }

    /// Divisor programmed for a request of `rate`: truncating division, clamped
    /// to what the field can encode. A zero request picks the largest divisor.
    pub fn best_divisor(&self, parent_rate: u64, rate: u64) -> u64 {
        if rate == 0 {
            return self.max_divisor();
        }
        (parent_rate / rate).clamp(1, self.max_divisor())
    }

    pub fn round_rate(&self, parent_rate: u64, rate: u64) -> u64 {
        parent_rate / self.best_divisor(parent_rate, rate)
    }

    /// Programs the divisor `round_rate` would pick and returns the resulting rate.
    /// Nothing is written when the request is rejected.
    pub fn set_rate(
        &self,
        clock: &ClockKey,
        parent_rate: u64,
        rate: u64,
        regs: &RegisterMap,
    ) -> ClockResult<u64> {
        let minimum = self.min_rate(parent_rate);
        if rate == 0 || rate < minimum {
            return Err(ClockError::RateTooLow {
                clock: clock.clone(),
                requested: rate,
                minimum,
            });
        }
        let ctrl = regs.for_field(&self.field)?;
        let div = self.best_divisor(parent_rate, rate);
        // best_divisor is clamped to max_divisor, which always fits the field.
        ctrl.write_field(&self.field, (div - 1) as u32)?;
        tracing::debug!("{}: divisor {} -> {} Hz", clock, div, parent_rate / div);
        Ok(parent_rate / div)
    }
}
