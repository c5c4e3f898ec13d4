// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::node::ClockKey;
use crate::register::RegisterMap;
use crate::{ClockError, ClockResult};

/// Rate contract for clocks whose math does not fit the gate/mux/divider stages.
///
/// The tree supplies the parent rate; implementations own their register fields.
pub trait RateOps: std::fmt::Debug + Send + Sync {
    /// Short label used in summaries.
    fn kind(&self) -> &'static str;

    /// Register offsets this clock reads or writes.
    fn registers(&self) -> Vec<u64>;

    fn get_rate(&self, parent_rate: u64, regs: &RegisterMap) -> ClockResult<u64>;

    /// Rate a `set_rate(rate)` would produce. Clocks without rate control
    /// report their current rate.
    fn round_rate(&self, parent_rate: u64, _rate: u64, regs: &RegisterMap) -> ClockResult<u64> {
        self.get_rate(parent_rate, regs)
    }

    /// Programs the hardware and returns the resulting rate.
    fn set_rate(
        &self,
        clock: &ClockKey,
        _parent_rate: u64,
        _rate: u64,
        _regs: &RegisterMap,
    ) -> ClockResult<u64> {
        Err(ClockError::RateNotSettable(clock.clone()))
    }

    fn can_set_rate(&self) -> bool {
        false
    }
}

/// PLL output from the crystal rate and the PLL control register words.
pub type PllRateFn = fn(xtal_hz: u64, control: &[u32]) -> u64;

/// Resolves PLL formula names used in clock tables.
pub trait PllFormulas {
    fn formula(&self, name: &str) -> Option<PllRateFn>;
}

impl<F> PllFormulas for F
where
    F: Fn(&str) -> Option<PllRateFn>,
{
    fn formula(&self, name: &str) -> Option<PllRateFn> {
        self(name)
    }
}

/// A PLL output. Its rate follows whatever the control registers hold.
pub struct PllClock {
    formula: String,
    calc: PllRateFn,
    control: Vec<u64>,
}

impl PllClock {
    pub fn new(formula: impl Into<String>, calc: PllRateFn, control: Vec<u64>) -> Self {
        Self {
            formula: formula.into(),
            calc,
            control,
        }
    }
}

impl std::fmt::Debug for PllClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PllClock")
            .field("formula", &self.formula)
            .field("control", &self.control)
            .finish()
    }
}

impl RateOps for PllClock {
    fn kind(&self) -> &'static str {
        "pll"
    }

    fn registers(&self) -> Vec<u64> {
        self.control.clone()
    }

    fn get_rate(&self, parent_rate: u64, regs: &RegisterMap) -> ClockResult<u64> {
        let words = self
            .control
            .iter()
            .map(|offset| regs.get(*offset)?.read())
            .collect::<ClockResult<Vec<u32>>>()?;
        Ok((self.calc)(parent_rate, &words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegisterBlock;
    use std::sync::Arc;

    fn times_low_byte(xtal: u64, control: &[u32]) -> u64 {
        xtal * u64::from(control[0] & 0xFF)
    }

    #[test]
    fn test_pll_follows_control_word() {
        let block = Arc::new(RegisterBlock::with_values([(0x0C, 44)]));
        let mut regs = RegisterMap::new(block.clone());
        regs.ensure(0x0C);
        let pll = PllClock::new("times_low_byte", times_low_byte, vec![0x0C]);

        assert_eq!(pll.get_rate(12_000_000, &regs).unwrap(), 528_000_000);
        block.poke(0x0C, 22);
        assert_eq!(pll.get_rate(12_000_000, &regs).unwrap(), 264_000_000);
        assert_eq!(pll.round_rate(12_000_000, 1, &regs).unwrap(), 264_000_000);
        assert!(!pll.can_set_rate());

        let key = ClockKey::named("fout_apll");
        assert_eq!(
            pll.set_rate(&key, 12_000_000, 100, &regs),
            Err(ClockError::RateNotSettable(key))
        );
    }

    #[test]
    fn test_closure_resolves_formulas() {
        let resolver = |name: &str| match name {
            "times_low_byte" => Some(times_low_byte as PllRateFn),
            _ => None,
        };
        assert!(resolver.formula("times_low_byte").is_some());
        assert!(resolver.formula("missing").is_none());
    }
}
