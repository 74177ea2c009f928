//! Client build-date identifier
//!
//! Every client executable is identified by its build date, an integer of
//! the form YYYYMMDD (e.g. `20180620`). Packet layouts changed across 15+
//! years of client revisions, so this single integer decides which binary
//! layout of every packet a peer speaks. The server process targets one
//! configured version; individual connections may negotiate their own
//! during the handshake.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A client build date (YYYYMMDD), the protocol versioning input.
///
/// Ordering is plain integer ordering, which matches chronological
/// ordering for well-formed dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketVer(pub u32);

impl PacketVer {
    /// Sentinel threshold meaning "valid since the earliest supported build".
    pub const BASE: Self = Self(0);

    pub const fn new(ver: u32) -> Self {
        Self(ver)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Check that the value is a plausible YYYYMMDD build date.
    ///
    /// Accepts dates from 2003 (earliest retail client this family of
    /// servers supports) through 2099. Month and day must be in calendar
    /// range; no per-month day-count check is done since build dates are
    /// opaque identifiers, not calendar arithmetic inputs.
    pub fn validate(&self) -> Result<(), String> {
        let v = self.0;
        let year = v / 10_000;
        let month = (v / 100) % 100;
        let day = v % 100;

        if !(2003..=2099).contains(&year) {
            return Err(format!("{} is not a YYYYMMDD build date (bad year)", v));
        }
        if !(1..=12).contains(&month) {
            return Err(format!("{} is not a YYYYMMDD build date (bad month)", v));
        }
        if !(1..=31).contains(&day) {
            return Err(format!("{} is not a YYYYMMDD build date (bad day)", v));
        }
        Ok(())
    }

    /// Parse from the textual form used in config files.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: u32 = text
            .trim()
            .parse()
            .map_err(|_| format!("`{}` is not a numeric build date", text))?;
        let ver = Self(value);
        ver.validate()?;
        Ok(ver)
    }
}

impl fmt::Display for PacketVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PacketVer {
    fn from(ver: u32) -> Self {
        Self(ver)
    }
}
