// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Samsung S3C6400/S3C6410 system controller: register map, PLL formulas and
//! variant limits.

use crate::custom::{PllFormulas, PllRateFn};
use std::str::FromStr;

pub const APLL_CON: u64 = 0x0C;
pub const MPLL_CON: u64 = 0x10;
pub const EPLL_CON0: u64 = 0x14;
pub const EPLL_CON1: u64 = 0x18;
pub const CLK_SRC: u64 = 0x1C;
pub const CLK_DIV0: u64 = 0x20;
pub const CLK_DIV1: u64 = 0x24;
pub const CLK_DIV2: u64 = 0x28;
pub const HCLK_GATE: u64 = 0x30;
pub const PCLK_GATE: u64 = 0x34;
pub const SCLK_GATE: u64 = 0x38;
pub const MEM0_GATE: u64 = 0x3C;
pub const CLK_SRC2: u64 = 0x10C;
pub const OTHERS: u64 = 0x900;

/// OTHERS: HCLKX2 follows APLL when set, MPLL otherwise.
pub const OTHERS_SYNCMUXSEL: u32 = 1 << 6;
/// OTHERS: USB PHY 48 MHz clock enable.
pub const OTHERS_USBMASK: u32 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    S3c6400,
    #[default]
    S3c6410,
}

impl Variant {
    /// Implemented bits of the ARMCLK divisor.
    pub fn armclk_mask(&self) -> u32 {
        match self {
            Variant::S3c6400 => 0xF,
            Variant::S3c6410 => 0x7,
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "s3c6400" | "6400" => Ok(Self::S3c6400),
            "s3c6410" | "6410" => Ok(Self::S3c6410),
            _ => Err(format!(
                "unsupported S3C64xx variant '{}'; supported: s3c6400, s3c6410",
                value
            )),
        }
    }
}

/// APLL/MPLL: `fout = fin * mdiv / (pdiv << sdiv)`.
pub fn pll_rate(xtal_hz: u64, control: &[u32]) -> u64 {
    let Some(&con) = control.first() else {
        return 0;
    };
    let mdiv = u64::from((con >> 16) & 0x3FF);
    let pdiv = u64::from((con >> 8) & 0x3F);
    let sdiv = (con & 0x7) as u64;
    if pdiv == 0 {
        return 0;
    }
    xtal_hz * mdiv / (pdiv << sdiv)
}

/// EPLL: fractional PLL, `fout = fin * (mdiv + kdiv / 2^16) / (pdiv << sdiv)`.
/// `control` holds CON0 then CON1.
pub fn epll_rate(xtal_hz: u64, control: &[u32]) -> u64 {
    let (Some(&con0), Some(&con1)) = (control.first(), control.get(1)) else {
        return 0;
    };
    let mdiv = u64::from((con0 >> 16) & 0xFF);
    let pdiv = u64::from((con0 >> 8) & 0x3F);
    let sdiv = (con0 & 0x3) as u64;
    let kdiv = u64::from(con1 & 0xFFFF);
    if pdiv == 0 {
        return 0;
    }
    let fvco = xtal_hz * ((mdiv << 16) + kdiv) / (pdiv << sdiv);
    fvco >> 16
}

/// Formula names accepted in S3C64xx clock tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formulas;

impl PllFormulas for Formulas {
    fn formula(&self, name: &str) -> Option<PllRateFn> {
        match name {
            "s3c6400_pll" => Some(pll_rate),
            "s3c6400_epll" => Some(epll_rate),
            _ => None,
        }
    }
}
