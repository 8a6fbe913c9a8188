//! Monitor fan-out: the sole integration point for change notification.
//!
//! Subscribers register a channel per record; every posted event carries a
//! snapshot of the field value and the alarm pair, so consumers never need
//! to lock the record afterwards. Dead receivers are pruned on the next
//! post to their record.

use hashbrown::HashMap;
use ironioc_types::{AlarmStatus, EventMask, FieldValue, Severity};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::mpsc::{channel, Receiver, Sender};

/// One change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorEvent {
    pub record: String,
    pub field: String,
    pub mask: EventMask,
    pub value: FieldValue,
    pub stat: AlarmStatus,
    pub sevr: Severity,
    pub amsg: String,
}

#[derive(Default)]
struct HubInner {
    by_record: HashMap<String, SmallVec<[Sender<MonitorEvent>; 2]>>,
}

/// Event dispatcher shared by the whole IOC.
#[derive(Default)]
pub struct MonitorHub {
    inner: Mutex<HubInner>,
}

impl MonitorHub {
    pub fn new() -> MonitorHub {
        MonitorHub::default()
    }

    /// Subscribe to every event posted for one record.
    pub fn subscribe(&self, record: &str) -> Receiver<MonitorEvent> {
        let (tx, rx) = channel();
        self.inner
            .lock()
            .by_record
            .entry(record.to_owned())
            .or_default()
            .push(tx);
        rx
    }

    /// Post an event to all subscribers of its record.
    pub fn post(&self, event: MonitorEvent) {
        if event.mask.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        let Some(senders) = inner.by_record.get_mut(&event.record) else {
            return;
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        if senders.is_empty() {
            inner.by_record.remove(&event.record);
        }
    }

    pub fn subscriber_count(&self, record: &str) -> usize {
        self.inner
            .lock()
            .by_record
            .get(record)
            .map_or(0, SmallVec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(record: &str, mask: EventMask, value: f64) -> MonitorEvent {
        MonitorEvent {
            record: record.to_owned(),
            field: "VAL".to_owned(),
            mask,
            value: FieldValue::Double(value),
            stat: AlarmStatus::NoAlarm,
            sevr: Severity::NoAlarm,
            amsg: String::new(),
        }
    }

    #[test]
    fn events_reach_only_their_record_subscribers() {
        let hub = MonitorHub::new();
        let rx_a = hub.subscribe("a");
        let rx_b = hub.subscribe("b");
        hub.post(event("a", EventMask::VALUE, 1.0));
        assert_eq!(rx_a.try_recv().unwrap().value, FieldValue::Double(1.0));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn empty_mask_posts_nothing() {
        let hub = MonitorHub::new();
        let rx = hub.subscribe("a");
        hub.post(event("a", EventMask::empty(), 1.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let hub = MonitorHub::new();
        let rx = hub.subscribe("a");
        drop(rx);
        assert_eq!(hub.subscriber_count("a"), 1);
        hub.post(event("a", EventMask::VALUE, 1.0));
        assert_eq!(hub.subscriber_count("a"), 0);
    }
}
