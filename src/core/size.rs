// Size Threshold
// Parses human readable sizes such as "1GiB" or "500" into byte counts

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A unit suffix accepted after the numeric part of a size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    KiB,
    MiB,
    GiB,
    TiB,
    PiB,
    KB,
    MB,
    GB,
    TB,
    PB,
}

impl SizeUnit {
    /// Lookup order for suffix matching: longest suffixes first
    pub const ALL: [SizeUnit; 10] = [
        SizeUnit::KiB,
        SizeUnit::MiB,
        SizeUnit::GiB,
        SizeUnit::TiB,
        SizeUnit::PiB,
        SizeUnit::KB,
        SizeUnit::MB,
        SizeUnit::GB,
        SizeUnit::TB,
        SizeUnit::PB,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            SizeUnit::KiB => "KiB",
            SizeUnit::MiB => "MiB",
            SizeUnit::GiB => "GiB",
            SizeUnit::TiB => "TiB",
            SizeUnit::PiB => "PiB",
            SizeUnit::KB => "KB",
            SizeUnit::MB => "MB",
            SizeUnit::GB => "GB",
            SizeUnit::TB => "TB",
            SizeUnit::PB => "PB",
        }
    }

    pub fn multiplier(self) -> u64 {
        match self {
            SizeUnit::KiB => 1 << 10,
            SizeUnit::MiB => 1 << 20,
            SizeUnit::GiB => 1 << 30,
            SizeUnit::TiB => 1 << 40,
            SizeUnit::PiB => 1 << 50,
            SizeUnit::KB => 1_000,
            SizeUnit::MB => 1_000_000,
            SizeUnit::GB => 1_000_000_000,
            SizeUnit::TB => 1_000_000_000_000,
            SizeUnit::PB => 1_000_000_000_000_000,
        }
    }

    /// Find the unit `input` ends with, if any
    fn strip_from(input: &str) -> Option<(&str, SizeUnit)> {
        let mut units = Self::ALL;
        units.sort_by_key(|u| std::cmp::Reverse(u.suffix().len()));

        units
            .into_iter()
            .find_map(|unit| input.strip_suffix(unit.suffix()).map(|rest| (rest, unit)))
    }
}

/// Files strictly larger than this many bytes are never archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeThreshold(u64);

impl SizeThreshold {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Whether a file of `len` bytes is too large to keep in the bin
    pub fn is_exceeded_by(self, len: u64) -> bool {
        len > self.0
    }

    /// Parse a size like "10MiB", "2 GB" or "500"
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidSizeFormat {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let (number, multiplier) = match SizeUnit::strip_from(trimmed) {
            Some((rest, unit)) => (rest.trim_end(), unit.multiplier()),
            None => (trimmed, 1),
        };

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let count: u64 = number.parse().map_err(|_| invalid())?;
        count
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl FromStr for SizeThreshold {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SizeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Largest binary unit that divides evenly, else raw bytes
        let exact = SizeUnit::ALL[..5]
            .iter()
            .rev()
            .find(|u| self.0 != 0 && self.0 % u.multiplier() == 0);

        match exact {
            Some(unit) => write!(f, "{}{}", self.0 / unit.multiplier(), unit.suffix()),
            None => write!(f, "{}", self.0),
        }
    }
}
