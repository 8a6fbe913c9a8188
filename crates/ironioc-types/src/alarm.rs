//! Alarm severity ranking and alarm status (cause) codes.
//!
//! Severity is totally ordered: `NoAlarm < Minor < Major < Invalid`. The
//! engine arbitrates by maximum across every condition checked in one
//! processing cycle; `Invalid` cannot be exceeded, so an early `Invalid`
//! short-circuits further checks.

use std::fmt;

/// Ranked alarm severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u16)]
pub enum Severity {
    #[default]
    NoAlarm = 0,
    Minor = 1,
    Major = 2,
    Invalid = 3,
}

impl Severity {
    /// All severities, index-ordered. Backs the severity choice menu.
    pub const ALL: [Severity; 4] = [
        Severity::NoAlarm,
        Severity::Minor,
        Severity::Major,
        Severity::Invalid,
    ];

    /// Severity from its menu index; out-of-range clamps to `Invalid`.
    pub fn from_index(ix: u16) -> Severity {
        *Severity::ALL.get(ix as usize).unwrap_or(&Severity::Invalid)
    }

    pub fn index(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::NoAlarm => "NO_ALARM",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Alarm status: which condition raised the current severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum AlarmStatus {
    #[default]
    NoAlarm = 0,
    Read = 1,
    Write = 2,
    HiHi = 3,
    High = 4,
    LoLo = 5,
    Low = 6,
    State = 7,
    Cos = 8,
    Comm = 9,
    Timeout = 10,
    HwLimit = 11,
    Calc = 12,
    Scan = 13,
    Link = 14,
    Soft = 15,
    BadSub = 16,
    Udf = 17,
    Disable = 18,
    Simm = 19,
    ReadAccess = 20,
    WriteAccess = 21,
}

impl AlarmStatus {
    pub fn index(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            AlarmStatus::NoAlarm => "NO_ALARM",
            AlarmStatus::Read => "READ",
            AlarmStatus::Write => "WRITE",
            AlarmStatus::HiHi => "HIHI",
            AlarmStatus::High => "HIGH",
            AlarmStatus::LoLo => "LOLO",
            AlarmStatus::Low => "LOW",
            AlarmStatus::State => "STATE",
            AlarmStatus::Cos => "COS",
            AlarmStatus::Comm => "COMM",
            AlarmStatus::Timeout => "TIMEOUT",
            AlarmStatus::HwLimit => "HWLIMIT",
            AlarmStatus::Calc => "CALC",
            AlarmStatus::Scan => "SCAN",
            AlarmStatus::Link => "LINK",
            AlarmStatus::Soft => "SOFT",
            AlarmStatus::BadSub => "BAD_SUB",
            AlarmStatus::Udf => "UDF",
            AlarmStatus::Disable => "DISABLE",
            AlarmStatus::Simm => "SIMM",
            AlarmStatus::ReadAccess => "READ_ACCESS",
            AlarmStatus::WriteAccess => "WRITE_ACCESS",
        }
    }

    /// Status from its numeric code; unknown codes map to `Soft`.
    pub fn from_index(ix: u16) -> AlarmStatus {
        const ALL: [AlarmStatus; 22] = [
            AlarmStatus::NoAlarm,
            AlarmStatus::Read,
            AlarmStatus::Write,
            AlarmStatus::HiHi,
            AlarmStatus::High,
            AlarmStatus::LoLo,
            AlarmStatus::Low,
            AlarmStatus::State,
            AlarmStatus::Cos,
            AlarmStatus::Comm,
            AlarmStatus::Timeout,
            AlarmStatus::HwLimit,
            AlarmStatus::Calc,
            AlarmStatus::Scan,
            AlarmStatus::Link,
            AlarmStatus::Soft,
            AlarmStatus::BadSub,
            AlarmStatus::Udf,
            AlarmStatus::Disable,
            AlarmStatus::Simm,
            AlarmStatus::ReadAccess,
            AlarmStatus::WriteAccess,
        ];
        *ALL.get(ix as usize).unwrap_or(&AlarmStatus::Soft)
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_totally_ordered() {
        assert!(Severity::NoAlarm < Severity::Minor);
        assert!(Severity::Minor < Severity::Major);
        assert!(Severity::Major < Severity::Invalid);
        assert_eq!(Severity::Major.max(Severity::Minor), Severity::Major);
    }

    #[test]
    fn severity_index_round_trip() {
        for sevr in Severity::ALL {
            assert_eq!(Severity::from_index(sevr.index()), sevr);
        }
        // Out of range clamps rather than wrapping.
        assert_eq!(Severity::from_index(99), Severity::Invalid);
    }

    #[test]
    fn status_index_round_trip() {
        for ix in 0..22 {
            assert_eq!(AlarmStatus::from_index(ix).index(), ix);
        }
    }
}
