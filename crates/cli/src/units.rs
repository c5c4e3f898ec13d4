// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::num::ParseIntError;
use std::str::FromStr;

type RadixParse<T> = fn(&str, u32) -> Result<T, ParseIntError>;

fn parse_int<T>(s: &str, radix_parse: RadixParse<T>) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        radix_parse(hex, 16).map_err(|e| format!("Invalid hex value '{}': {}", s, e))
    } else {
        T::from_str(trimmed).map_err(|e| format!("Invalid value '{}': {}", s, e))
    }
}

pub fn parse_u32(s: &str) -> Result<u32, String> {
    parse_int(s, u32::from_str_radix)
}

pub fn parse_u64(s: &str) -> Result<u64, String> {
    parse_int(s, u64::from_str_radix)
}

/// Register override as `OFFSET=VALUE`, e.g. `0x1c=0x7`.
pub fn parse_poke(s: &str) -> Result<(u64, u32), String> {
    let (offset, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected OFFSET=VALUE, got '{}'", s))?;
    Ok((parse_u64(offset)?, parse_u32(value)?))
}

/// Frequency in Hz with an optional `k`, `M` or `G` suffix: `12M`, `12.288M`, `32768`.
pub fn parse_hz(s: &str) -> Result<u64, String> {
    let trimmed = s.trim().trim_end_matches("Hz").trim_end_matches("hz");
    let (number, scale) = match trimmed.chars().last() {
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1_000u64),
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1_000_000),
        Some('G') | Some('g') => (&trimmed[..trimmed.len() - 1], 1_000_000_000),
        _ => (trimmed, 1),
    };
    let invalid = || format!("Invalid frequency '{}'", s);
    match number.split_once('.') {
        None => number
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(scale))
            .ok_or_else(invalid),
        Some((whole, frac)) => {
            if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let digits = u32::try_from(frac.len()).map_err(|_| invalid())?;
            let denom = 10u64.checked_pow(digits).ok_or_else(invalid)?;
            let whole: u64 = if whole.is_empty() {
                0
            } else {
                whole.parse().map_err(|_| invalid())?
            };
            let frac: u64 = frac.parse().map_err(|_| invalid())?;
            if scale % denom != 0 {
                return Err(format!("'{}' is finer than 1 Hz", s));
            }
            whole
                .checked_mul(scale)
                .and_then(|w| w.checked_add(frac * (scale / denom)))
                .ok_or_else(invalid)
        }
    }
}

/// `532 MHz`, `66.5 MHz`, `12.288 MHz`, `32.768 kHz`, `0 Hz`.
pub fn format_hz(hz: u64) -> String {
    let (scale, unit) = if hz >= 1_000_000_000 {
        (1_000_000_000, "GHz")
    } else if hz >= 1_000_000 {
        (1_000_000, "MHz")
    } else if hz >= 1_000 {
        (1_000, "kHz")
    } else {
        return format!("{} Hz", hz);
    };
    let whole = hz / scale;
    let frac = hz % scale;
    if frac == 0 {
        return format!("{} {}", whole, unit);
    }
    let width = scale.ilog10() as usize;
    let frac = format!("{:0width$}", frac, width = width);
    format!("{}.{} {}", whole, frac.trim_end_matches('0'), unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hz() {
        assert_eq!(parse_hz("12M"), Ok(12_000_000));
        assert_eq!(parse_hz("12.288M"), Ok(12_288_000));
        assert_eq!(parse_hz("32.768k"), Ok(32_768));
        assert_eq!(parse_hz("100000000"), Ok(100_000_000));
        assert_eq!(parse_hz("66.5MHz"), Ok(66_500_000));
        assert!(parse_hz("fast").is_err());
        assert!(parse_hz("1.5").is_err());
        assert!(parse_hz("1.").is_err());
    }

    #[test]
    fn test_format_hz() {
        assert_eq!(format_hz(532_000_000), "532 MHz");
        assert_eq!(format_hz(66_500_000), "66.5 MHz");
        assert_eq!(format_hz(12_288_000), "12.288 MHz");
        assert_eq!(format_hz(177_333_333), "177.333333 MHz");
        assert_eq!(format_hz(32_768), "32.768 kHz");
        assert_eq!(format_hz(0), "0 Hz");
    }

    #[test]
    fn test_parse_poke() {
        assert_eq!(parse_poke("0x1c=0x7"), Ok((0x1C, 7)));
        assert_eq!(parse_poke("2336=65600"), Ok((0x920, 0x10040)));
        assert!(parse_poke("0x1c").is_err());
        assert!(parse_poke("0x1c=0x1_0000_0000").is_err());
    }
}
