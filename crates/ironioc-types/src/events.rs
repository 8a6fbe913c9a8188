//! Monitor event classes.

use bitflags::bitflags;

bitflags! {
    /// Bitmask of change-notification classes attached to a posted event.
    ///
    /// `VALUE` is gated by the monitor deadband, `ARCHIVE` by the (possibly
    /// different) archive deadband, and `ALARM` by a change of the record's
    /// (status, severity) pair. `PROPERTY` flags metadata changes such as
    /// display limits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u16 {
        const VALUE = 0x01;
        const ARCHIVE = 0x02;
        const ALARM = 0x04;
        const PROPERTY = 0x08;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_compose() {
        let mask = EventMask::VALUE | EventMask::ALARM;
        assert!(mask.contains(EventMask::VALUE));
        assert!(!mask.contains(EventMask::ARCHIVE));
        assert!(!EventMask::empty().intersects(mask));
    }
}
