// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::custom::RateOps;
use crate::node::ClockKey;
use crate::register::{RegisterField, RegisterMap};
use crate::{ClockError, ClockResult};

/// Processor clock (ARMCLK).
///
/// The divisor sits in the low bits of a register shared with the bus dividers,
/// but only the bits in `mask` are implemented; the usable width differs
/// between SoC variants.
#[derive(Debug)]
pub struct CoreClock {
    field: RegisterField,
    mask: u32,
}

impl CoreClock {
    pub fn new(field: RegisterField, mask: u32) -> Self {
        // The variant mask can never reach outside the field.
        let mask = mask & field.max_value();
        Self { field, mask }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn min_rate(&self, parent_rate: u64) -> u64 {
        parent_rate / (u64::from(self.mask) + 1)
    }

    /// Field value (`divisor - 1`) for a request of `rate`.
    fn divisor_bits(&self, parent_rate: u64, rate: u64) -> u32 {
        if rate == 0 {
            return self.mask;
        }
        if parent_rate < rate {
            return 0;
        }
        let bits = (parent_rate / rate).saturating_sub(1);
        u32::try_from(bits).unwrap_or(u32::MAX).min(self.mask)
    }
}

impl RateOps for CoreClock {
    fn kind(&self) -> &'static str {
        "core"
    }

    fn registers(&self) -> Vec<u64> {
        vec![self.field.reg()]
    }

    fn get_rate(&self, parent_rate: u64, regs: &RegisterMap) -> ClockResult<u64> {
        let bits = regs.read_field(&self.field)? & self.mask;
        Ok(parent_rate / (u64::from(bits) + 1))
    }

    fn round_rate(&self, parent_rate: u64, rate: u64, _regs: &RegisterMap) -> ClockResult<u64> {
        if rate != 0 && parent_rate < rate {
            return Ok(parent_rate);
        }
        Ok(parent_rate / (u64::from(self.divisor_bits(parent_rate, rate)) + 1))
    }

    fn set_rate(
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
        let bits = self.divisor_bits(parent_rate, rate);
        let ctrl = regs.for_field(&self.field)?;
        {
            let mut reg = ctrl.lock()?;
            let val = reg.read()?;
            let val = (val & !(self.mask << self.field.shift())) | (bits << self.field.shift());
            reg.write(val)?;
        }
        let new_rate = parent_rate / (u64::from(bits) + 1);
        tracing::debug!(
            "{}: divisor {} -> {} Hz",
            clock,
            u64::from(bits) + 1,
            new_rate
        );
        Ok(new_rate)
    }

    fn can_set_rate(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegisterBlock;
    use std::sync::Arc;

    const DIV0: u64 = 0x20;

    fn setup(mask: u32, initial: u32) -> (Arc<RegisterBlock>, RegisterMap, CoreClock) {
        let block = Arc::new(RegisterBlock::with_values([(DIV0, initial)]));
        let mut regs = RegisterMap::new(block.clone());
        regs.ensure(DIV0);
        let clk = CoreClock::new(RegisterField::new(DIV0, 0, 4).unwrap(), mask);
        (block, regs, clk)
    }

    #[test]
    fn test_get_rate_ignores_bits_outside_mask() {
        // 6410 implements three divisor bits; bit 3 belongs to nothing here.
        let (_, regs, clk) = setup(0x7, 0x0000_3319);
        assert_eq!(clk.get_rate(532_000_000, &regs).unwrap(), 266_000_000);
    }

    #[test]
    fn test_round_rate_never_exceeds_parent() {
        let (_, regs, clk) = setup(0x7, 0);
        assert_eq!(clk.round_rate(532_000_000, 800_000_000, &regs).unwrap(), 532_000_000);
        assert_eq!(clk.round_rate(532_000_000, 266_000_000, &regs).unwrap(), 266_000_000);
        assert_eq!(clk.round_rate(532_000_000, 200_000_000, &regs).unwrap(), 266_000_000);
        assert_eq!(clk.round_rate(532_000_000, 1, &regs).unwrap(), 66_500_000);
    }

    #[test]
    fn test_two_bit_mask_rejects_100mhz() {
        let (block, regs, clk) = setup(0x3, 0x0000_3310);
        let key = ClockKey::named("armclk");
        let err = clk.set_rate(&key, 532_000_000, 100_000_000, &regs).unwrap_err();
        assert_eq!(
            err,
            ClockError::RateTooLow {
                clock: key,
                requested: 100_000_000,
                minimum: 133_000_000
            }
        );
        assert_eq!(block.write_count(), 0);
        assert_eq!(block.peek(DIV0), 0x0000_3310);
    }

    #[test]
    fn test_set_rate_matches_round_rate() {
        let (block, regs, clk) = setup(0x7, 0x0000_3310);
        let key = ClockKey::named("armclk");
        for rate in [532_000_000u64, 400_000_000, 266_000_000, 177_333_333, 100_000_000, 66_500_000] {
            let predicted = clk.round_rate(532_000_000, rate, &regs).unwrap();
            let set = clk.set_rate(&key, 532_000_000, rate, &regs).unwrap();
            assert_eq!(set, predicted);
            assert_eq!(clk.get_rate(532_000_000, &regs).unwrap(), predicted);
            // Bus divider fields above the core divisor are untouched.
            assert_eq!(block.peek(DIV0) & 0xFFF0, 0x3310);
        }
    }

    #[test]
    fn test_divisor_never_overflows_mask() {
        // 10 / 2 = 5 would need divisor 5; a 2-bit mask caps it at 4.
        let (block, regs, clk) = setup(0x3, 0);
        let key = ClockKey::named("armclk");
        assert_eq!(clk.set_rate(&key, 10, 2, &regs).unwrap(), 2);
        assert_eq!(block.peek(DIV0), 0x3);
    }

    #[test]
    fn test_full_width_mask_programs_largest_divisor() {
        let block = Arc::new(RegisterBlock::new());
        let mut regs = RegisterMap::new(block.clone());
        regs.ensure(DIV0);
        let clk = CoreClock::new(RegisterField::new(DIV0, 0, 32).unwrap(), u32::MAX);
        let key = ClockKey::named("armclk");
        let parent = 1u64 << 40;
        assert_eq!(clk.min_rate(parent), 256);
        assert_eq!(clk.set_rate(&key, parent, 256, &regs).unwrap(), 256);
        assert_eq!(block.peek(DIV0), u32::MAX);
        assert_eq!(clk.get_rate(parent, &regs).unwrap(), 256);
    }
}
