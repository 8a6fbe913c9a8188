//! End-to-end processing behavior through the public surface.

use std::sync::Arc;
use std::time::Duration;

use ironioc::{
    AlarmStatus, DeviceSupport, EventMask, FieldValue, Ioc, IoOutcome, IocContext, MonitorEvent,
    RecordRuntime, Result, Severity,
};

fn ioc_with(records: &str) -> Ioc {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut builder = Ioc::builder();
    builder.register_standard().unwrap();
    let report = builder.load_records(records).unwrap();
    assert!(report.is_clean(), "load errors: {:?}", report.errors);
    builder.build().unwrap()
}

fn stat(ioc: &Ioc, record: &str) -> AlarmStatus {
    match ioc.get(&format!("{record}.STAT")).unwrap() {
        FieldValue::Enum(ix) => AlarmStatus::from_index(ix),
        other => panic!("STAT should be an enum, got {other:?}"),
    }
}

fn sevr(ioc: &Ioc, record: &str) -> Severity {
    match ioc.get(&format!("{record}.SEVR")).unwrap() {
        FieldValue::Enum(ix) => Severity::from_index(ix),
        other => panic!("SEVR should be an enum, got {other:?}"),
    }
}

fn val(ioc: &Ioc, record: &str) -> f64 {
    ioc.get(record).unwrap().to_f64_lossy()
}

/// Wait for a VALUE event on the given field, with a timeout.
fn wait_for_value(
    rx: &std::sync::mpsc::Receiver<MonitorEvent>,
    field: &str,
) -> MonitorEvent {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        let remaining = deadline
            .checked_duration_since(std::time::Instant::now())
            .unwrap_or_else(|| panic!("no VALUE event on {field} within the deadline"));
        let ev = rx
            .recv_timeout(remaining)
            .unwrap_or_else(|_| panic!("no VALUE event on {field} within the deadline"));
        if ev.field == field && ev.mask.contains(EventMask::VALUE) {
            return ev;
        }
    }
}

// ----------------------------------------------------------------------
// Alarms
// ----------------------------------------------------------------------

#[test]
fn limit_alarm_with_hysteresis_holds_then_clears() {
    let ioc = ioc_with(
        r#"
        record(ai, "lim:1") {
            field(DTYP, "Soft Channel")
            field(HIGH, "10")
            field(HSV,  "MINOR")
            field(HYST, "2")
        }
        "#,
    );

    ioc.put("lim:1.VAL", FieldValue::Double(11.0)).unwrap();
    assert_eq!(stat(&ioc, "lim:1"), AlarmStatus::High);
    assert_eq!(sevr(&ioc, "lim:1"), Severity::Minor);

    // Within HYST of the threshold the alarm holds.
    ioc.put("lim:1.VAL", FieldValue::Double(9.5)).unwrap();
    assert_eq!(stat(&ioc, "lim:1"), AlarmStatus::High);
    assert_eq!(sevr(&ioc, "lim:1"), Severity::Minor);

    // Past the hysteresis band it clears.
    ioc.put("lim:1.VAL", FieldValue::Double(7.9)).unwrap();
    assert_eq!(stat(&ioc, "lim:1"), AlarmStatus::NoAlarm);
    assert_eq!(sevr(&ioc, "lim:1"), Severity::NoAlarm);
}

#[test]
fn hihi_outranks_high_when_both_trip() {
    let ioc = ioc_with(
        r#"
        record(ai, "lim:2") {
            field(DTYP, "Soft Channel")
            field(HIGH, "80")
            field(HSV,  "MINOR")
            field(HIHI, "90")
            field(HHSV, "MAJOR")
            field(HYST, "5")
        }
        "#,
    );

    let rx = ioc.subscribe("lim:2");
    ioc.put("lim:2.VAL", FieldValue::Double(95.0)).unwrap();
    assert_eq!(stat(&ioc, "lim:2"), AlarmStatus::HiHi);
    assert_eq!(sevr(&ioc, "lim:2"), Severity::Major);
    assert_eq!(ioc.get("lim:2.LALM").unwrap(), FieldValue::Double(95.0));
    assert_eq!(ioc.get("lim:2.UDF").unwrap(), FieldValue::UChar(0));

    // One VAL event for the whole cycle, carrying both the value change
    // and the alarm transition.
    let val_events: Vec<MonitorEvent> =
        rx.try_iter().filter(|ev| ev.field == "VAL").collect();
    assert_eq!(val_events.len(), 1, "events: {val_events:?}");
    assert!(val_events[0].mask.contains(EventMask::VALUE));
    assert!(val_events[0].mask.contains(EventMask::ALARM));

    // Back inside the HIHI band but above HIGH: HIGH takes over.
    ioc.put("lim:2.VAL", FieldValue::Double(83.0)).unwrap();
    assert_eq!(stat(&ioc, "lim:2"), AlarmStatus::High);
    assert_eq!(sevr(&ioc, "lim:2"), Severity::Minor);
}

#[test]
fn unprocessed_record_reports_undefined() {
    let ioc = ioc_with(
        r#"
        record(ai, "udf:1") {
            field(DTYP, "Soft Channel")
        }
        "#,
    );
    ioc.process("udf:1").unwrap();
    assert_eq!(stat(&ioc, "udf:1"), AlarmStatus::Udf);
    assert_eq!(sevr(&ioc, "udf:1"), Severity::Invalid);
}

#[test]
fn disable_link_raises_a_single_disable_alarm() {
    let ioc = ioc_with(
        r#"
        record(ai, "dis:src") {
            field(DTYP, "Soft Channel")
        }
        record(ai, "dis:tgt") {
            field(DTYP, "Soft Channel")
            field(SDIS, "dis:src NPP")
            field(DISS, "MAJOR")
        }
        "#,
    );
    ioc.put("dis:src.VAL", FieldValue::Double(1.0)).unwrap();

    let rx = ioc.subscribe("dis:tgt");
    ioc.process("dis:tgt").unwrap();
    assert_eq!(stat(&ioc, "dis:tgt"), AlarmStatus::Disable);
    assert_eq!(sevr(&ioc, "dis:tgt"), Severity::Major);
    assert!(rx.try_recv().is_ok(), "the transition must post");

    // A second disabled cycle is silent.
    while rx.try_recv().is_ok() {}
    ioc.process("dis:tgt").unwrap();
    assert!(rx.try_recv().is_err());

    // Re-enable and the record processes normally again.
    ioc.put("dis:src.VAL", FieldValue::Double(0.0)).unwrap();
    ioc.process("dis:tgt").unwrap();
    assert_ne!(stat(&ioc, "dis:tgt"), AlarmStatus::Disable);
}

// ----------------------------------------------------------------------
// Monitors
// ----------------------------------------------------------------------

#[test]
fn deadband_accumulates_small_changes() {
    let ioc = ioc_with(
        r#"
        record(ai, "mon:1") {
            field(DTYP, "Soft Channel")
            field(MDEL, "0.5")
        }
        "#,
    );
    let rx = ioc.subscribe("mon:1");

    ioc.put("mon:1.VAL", FieldValue::Double(0.3)).unwrap();
    ioc.put("mon:1.VAL", FieldValue::Double(0.6)).unwrap();
    ioc.put("mon:1.VAL", FieldValue::Double(0.9)).unwrap();

    let value_events: Vec<MonitorEvent> = rx
        .try_iter()
        .filter(|ev| ev.field == "VAL" && ev.mask.contains(EventMask::VALUE))
        .collect();
    assert_eq!(value_events.len(), 1, "events: {value_events:?}");
    assert_eq!(value_events[0].value, FieldValue::Double(0.6));
}

#[test]
fn negative_deadband_posts_every_cycle() {
    let ioc = ioc_with(
        r#"
        record(ai, "mon:2") {
            field(DTYP, "Soft Channel")
            field(MDEL, "-1")
        }
        "#,
    );
    let rx = ioc.subscribe("mon:2");
    ioc.put("mon:2.VAL", FieldValue::Double(5.0)).unwrap();
    ioc.put("mon:2.VAL", FieldValue::Double(5.0)).unwrap();
    let count = rx
        .try_iter()
        .filter(|ev| ev.field == "VAL" && ev.mask.contains(EventMask::VALUE))
        .count();
    assert_eq!(count, 2);
}

#[test]
fn alarm_transition_posts_stat_and_sevr() {
    let ioc = ioc_with(
        r#"
        record(ai, "mon:3") {
            field(DTYP, "Soft Channel")
            field(HIGH, "1")
            field(HSV,  "MINOR")
        }
        "#,
    );
    let rx = ioc.subscribe("mon:3");
    ioc.put("mon:3.VAL", FieldValue::Double(2.0)).unwrap();

    let fields: Vec<String> = rx.try_iter().map(|ev| ev.field).collect();
    assert!(fields.iter().any(|f| f == "SEVR"), "fields: {fields:?}");
    assert!(fields.iter().any(|f| f == "STAT"), "fields: {fields:?}");
    assert!(fields.iter().any(|f| f == "VAL"), "fields: {fields:?}");
}

// ----------------------------------------------------------------------
// Links
// ----------------------------------------------------------------------

#[test]
fn output_link_writes_and_processes_the_target() {
    let ioc = ioc_with(
        r#"
        record(ao, "set:1") {
            field(DTYP, "Soft Channel")
            field(OUT,  "rb:1 NPP")
        }
        record(ai, "rb:1") {
            field(DTYP, "Soft Channel")
        }
        "#,
    );
    ioc.put("set:1.VAL", FieldValue::Double(7.0)).unwrap();
    assert_eq!(val(&ioc, "rb:1"), 7.0);
    assert_eq!(stat(&ioc, "rb:1"), AlarmStatus::NoAlarm);
    assert_eq!(val(&ioc, "set:1.OVAL"), 7.0);
}

#[test]
fn output_and_readback_chain_completes_in_one_cycle() {
    // The output writes into the readback, whose input reaches back into
    // the output record mid-chain. The chain must run to completion with
    // both records seeing this cycle's value.
    let ioc = ioc_with(
        r#"
        record(ao, "loop:out") {
            field(DTYP, "Soft Channel")
            field(OUT,  "loop:rb.VAL NPP")
        }
        record(ai, "loop:rb") {
            field(DTYP, "Soft Channel")
            field(INP,  "loop:out.OVAL NPP")
        }
        "#,
    );
    ioc.put("loop:out.VAL", FieldValue::Double(5.0)).unwrap();
    assert_eq!(val(&ioc, "loop:out.OVAL"), 5.0);
    assert_eq!(val(&ioc, "loop:rb"), 5.0);
    assert_eq!(ioc.get("loop:out.PACT").unwrap(), FieldValue::UChar(0));
    assert_eq!(ioc.get("loop:rb.PACT").unwrap(), FieldValue::UChar(0));
}

#[test]
fn closed_loop_output_fetches_and_clamps() {
    let ioc = ioc_with(
        r#"
        record(ai, "sp:1") {
            field(DTYP, "Soft Channel")
        }
        record(ao, "drv:1") {
            field(DTYP, "Soft Channel")
            field(OMSL, "closed_loop")
            field(DOL,  "sp:1 NPP")
            field(DRVH, "10")
            field(DRVL, "0")
            field(OUT,  "rb:2 NPP")
        }
        record(ai, "rb:2") {
            field(DTYP, "Soft Channel")
        }
        "#,
    );
    ioc.put("sp:1.VAL", FieldValue::Double(25.0)).unwrap();
    ioc.process("drv:1").unwrap();
    assert_eq!(val(&ioc, "drv:1"), 10.0, "drive limit must clamp");
    assert_eq!(val(&ioc, "rb:2"), 10.0);
}

#[test]
fn process_passive_input_link_processes_its_source() {
    let ioc = ioc_with(
        r#"
        record(ai, "counter:1") {
            field(DTYP, "Soft Channel")
            field(INP,  "5")
        }
        record(ai, "reader:1") {
            field(DTYP, "Soft Channel")
            field(INP,  "counter:1 PP")
        }
        "#,
    );
    ioc.process("reader:1").unwrap();
    assert_eq!(val(&ioc, "reader:1"), 5.0);
    // The source ran its own cycle: its alarm state resolved.
    assert_eq!(stat(&ioc, "counter:1"), AlarmStatus::NoAlarm);
}

#[test]
fn maximize_severity_link_carries_the_alarm() {
    let ioc = ioc_with(
        r#"
        record(ai, "alm:src") {
            field(DTYP, "Soft Channel")
            field(HIGH, "5")
            field(HSV,  "MAJOR")
        }
        record(ai, "alm:rdr") {
            field(DTYP, "Soft Channel")
            field(INP,  "alm:src MS")
        }
        "#,
    );
    ioc.put("alm:src.VAL", FieldValue::Double(6.0)).unwrap();
    assert_eq!(sevr(&ioc, "alm:src"), Severity::Major);

    ioc.process("alm:rdr").unwrap();
    assert_eq!(val(&ioc, "alm:rdr"), 6.0);
    assert_eq!(sevr(&ioc, "alm:rdr"), Severity::Major);
    assert_eq!(stat(&ioc, "alm:rdr"), AlarmStatus::Link);
}

// ----------------------------------------------------------------------
// Asynchronous completion
// ----------------------------------------------------------------------

#[test]
fn async_read_defers_outputs_to_the_completion_half() {
    let mut builder = Ioc::builder();
    // A slower async soft channel so the in-flight window is observable.
    builder.register_device_support(Arc::new(ironioc::records::soft::AsyncSoftAi::new(
        Duration::from_millis(100),
    )));
    builder.register_standard().unwrap();
    let report = builder
        .load_records(
            r#"
            record(ai, "src:1") {
                field(DTYP, "Soft Channel")
            }
            record(ai, "slow:1") {
                field(DTYP, "Async Soft Channel")
                field(INP,  "src:1 NPP")
                field(FLNK, "sink:1")
            }
            record(ai, "sink:1") {
                field(DTYP, "Soft Channel")
                field(INP,  "slow:1 NPP")
            }
            "#,
        )
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    let ioc = builder.build().unwrap();

    ioc.put("src:1.VAL", FieldValue::Double(42.0)).unwrap();

    let rx_slow = ioc.subscribe("slow:1");
    let rx_sink = ioc.subscribe("sink:1");
    ioc.process("slow:1").unwrap();

    // Still in flight: no value delivered, record active.
    assert_eq!(val(&ioc, "slow:1"), 0.0);
    assert_eq!(ioc.get("slow:1.PACT").unwrap(), FieldValue::UChar(1));

    let ev = wait_for_value(&rx_slow, "VAL");
    assert_eq!(ev.value, FieldValue::Double(42.0));
    assert_eq!(ioc.get("slow:1.PACT").unwrap(), FieldValue::UChar(0));

    // The forward link ran the sink exactly once, after completion.
    let ev = wait_for_value(&rx_sink, "VAL");
    assert_eq!(ev.value, FieldValue::Double(42.0));
    let extra = rx_sink
        .try_iter()
        .filter(|ev| ev.field == "VAL" && ev.mask.contains(EventMask::VALUE))
        .count();
    assert_eq!(extra, 0);
}

// ----------------------------------------------------------------------
// Reentry and reprocessing
// ----------------------------------------------------------------------

/// A device that starts an operation and never completes it.
struct StuckAi;

impl DeviceSupport for StuckAi {
    fn name(&self) -> &str {
        "devAiStuck"
    }

    fn do_io(&self, _ctx: &Arc<IocContext>, _rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        Ok(IoOutcome::Pending)
    }
}

fn stuck_ioc() -> Ioc {
    let mut builder = Ioc::builder();
    builder.register_standard().unwrap();
    builder.register_device_support(Arc::new(StuckAi));
    builder
        .database_mut()
        .add_device("ai", "Stuck", "devAiStuck")
        .unwrap();
    let report = builder
        .load_records(
            r#"
            record(ai, "stuck:1") {
                field(DTYP, "Stuck")
            }
            "#,
        )
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    builder.build().unwrap()
}

#[test]
fn repeated_reentry_raises_a_scan_alarm_once() {
    let ioc = stuck_ioc();
    ioc.process("stuck:1").unwrap();
    assert_eq!(ioc.get("stuck:1.PACT").unwrap(), FieldValue::UChar(1));

    let rx = ioc.subscribe("stuck:1");
    for _ in 0..12 {
        ioc.process("stuck:1").unwrap();
    }
    assert_eq!(stat(&ioc, "stuck:1"), AlarmStatus::Scan);
    assert_eq!(sevr(&ioc, "stuck:1"), Severity::Invalid);

    // SEVR stays INVALID throughout, so the transition shows on STAT.
    let alarm_posts = rx
        .try_iter()
        .filter(|ev| ev.field == "STAT")
        .count();
    assert_eq!(alarm_posts, 1, "the scan alarm is raised exactly once");
}

#[test]
fn put_into_an_active_record_latches_a_reprocess() {
    let ioc = stuck_ioc();
    ioc.process("stuck:1").unwrap();

    ioc.put("stuck:1.VAL", FieldValue::Double(3.0)).unwrap();
    assert_eq!(ioc.get("stuck:1.RPRO").unwrap(), FieldValue::UChar(1));
    // No synchronous processing happened: the record is still mid-cycle.
    assert_eq!(ioc.get("stuck:1.PACT").unwrap(), FieldValue::UChar(1));
}

#[test]
fn external_put_flag_clears_after_the_cycle() {
    let ioc = ioc_with(
        r#"
        record(ai, "putf:1") {
            field(DTYP, "Soft Channel")
        }
        "#,
    );
    ioc.put("putf:1.VAL", FieldValue::Double(1.0)).unwrap();
    assert_eq!(ioc.get("putf:1.PUTF").unwrap(), FieldValue::UChar(0));
    assert_eq!(stat(&ioc, "putf:1"), AlarmStatus::NoAlarm);
}

// ----------------------------------------------------------------------
// Simulation mode
// ----------------------------------------------------------------------

#[test]
fn simulation_yes_feeds_val_and_flags_the_record() {
    let ioc = ioc_with(
        r#"
        record(ai, "sim:src") {
            field(DTYP, "Soft Channel")
        }
        record(ai, "sim:1") {
            field(DTYP, "Soft Channel")
            field(SIMM, "YES")
            field(SIOL, "sim:src NPP")
            field(SIMS, "MINOR")
        }
        "#,
    );
    ioc.put("sim:src.VAL", FieldValue::Double(3.25)).unwrap();
    ioc.process("sim:1").unwrap();
    assert_eq!(val(&ioc, "sim:1"), 3.25);
    assert_eq!(stat(&ioc, "sim:1"), AlarmStatus::Simm);
    assert_eq!(sevr(&ioc, "sim:1"), Severity::Minor);
}

#[test]
fn simulation_raw_goes_through_conversion() {
    let ioc = ioc_with(
        r#"
        record(ai, "sim:raw") {
            field(DTYP, "Soft Channel")
            field(SIMM, "RAW")
            field(SIOL, "10")
            field(LINR, "LINEAR")
            field(ESLO, "2")
            field(EOFF, "1")
        }
        "#,
    );
    ioc.process("sim:raw").unwrap();
    assert_eq!(val(&ioc, "sim:raw"), 21.0);
    assert_eq!(stat(&ioc, "sim:raw"), AlarmStatus::NoAlarm);
}

#[test]
fn entering_simulation_swaps_scan_with_sscn() {
    let ioc = ioc_with(
        r#"
        record(ai, "sim:swap") {
            field(DTYP, "Soft Channel")
            field(SSCN, "1 second")
        }
        "#,
    );
    ioc.put_string("sim:swap.SIMM", "YES").unwrap();
    ioc.process("sim:swap").unwrap();
    assert_eq!(ioc.get_string("sim:swap.SCAN").unwrap(), "1 second");
    assert_eq!(ioc.get_string("sim:swap.SSCN").unwrap(), "Passive");

    // Leaving simulation swaps back.
    ioc.put_string("sim:swap.SIMM", "NO").unwrap();
    ioc.process("sim:swap").unwrap();
    assert_eq!(ioc.get_string("sim:swap.SCAN").unwrap(), "Passive");
    assert_eq!(ioc.get_string("sim:swap.SSCN").unwrap(), "1 second");
}

#[test]
fn delayed_simulation_completes_asynchronously() {
    let ioc = ioc_with(
        r#"
        record(ai, "sim:dly") {
            field(DTYP, "Soft Channel")
            field(SIMM, "YES")
            field(SIOL, "8.5")
            field(SDLY, "0.05")
        }
        "#,
    );
    let rx = ioc.subscribe("sim:dly");
    ioc.process("sim:dly").unwrap();
    assert_eq!(ioc.get("sim:dly.PACT").unwrap(), FieldValue::UChar(1));

    let ev = wait_for_value(&rx, "VAL");
    assert_eq!(ev.value, FieldValue::Double(8.5));
    assert_eq!(ioc.get("sim:dly.PACT").unwrap(), FieldValue::UChar(0));
}

// ----------------------------------------------------------------------
// Bit-field input
// ----------------------------------------------------------------------

#[test]
fn bit_fields_post_only_changed_bits() {
    let ioc = ioc_with(
        r#"
        record(ai, "word:1") {
            field(DTYP, "Soft Channel")
        }
        record(bitsin, "bits:1") {
            field(DTYP, "Soft Channel")
            field(INP,  "word:1 NPP")
        }
        "#,
    );
    ioc.put("word:1.VAL", FieldValue::Double(165.0)).unwrap(); // 0b1010_0101

    let rx = ioc.subscribe("bits:1");
    ioc.process("bits:1").unwrap();
    assert_eq!(val(&ioc, "bits:1"), 165.0);
    assert_eq!(ioc.get("bits:1.B0").unwrap(), FieldValue::UChar(1));
    assert_eq!(ioc.get("bits:1.B1").unwrap(), FieldValue::UChar(0));
    assert_eq!(ioc.get("bits:1.B7").unwrap(), FieldValue::UChar(1));

    let bit_events: Vec<String> = rx
        .try_iter()
        .filter(|ev| ev.field.starts_with('B') && ev.field.len() == 2)
        .map(|ev| ev.field)
        .collect();
    assert_eq!(bit_events, ["B0", "B2", "B5", "B7"]);

    // Same word again: nothing changes, nothing posts.
    ioc.process("bits:1").unwrap();
    assert!(rx.try_iter().next().is_none());

    // Flip one bit: exactly that bit posts.
    ioc.put("word:1.VAL", FieldValue::Double(164.0)).unwrap(); // clears B0
    ioc.process("bits:1").unwrap();
    let bit_events: Vec<String> = rx
        .try_iter()
        .filter(|ev| ev.field.starts_with('B') && ev.field.len() == 2)
        .map(|ev| ev.field)
        .collect();
    assert_eq!(bit_events, ["B0"]);
}

// ----------------------------------------------------------------------
// Init-time behavior
// ----------------------------------------------------------------------

#[test]
fn pini_records_process_during_init() {
    let ioc = ioc_with(
        r#"
        record(ai, "pini:1") {
            field(DTYP, "Soft Channel")
            field(INP,  "7")
            field(PINI, "YES")
        }
        "#,
    );
    assert_eq!(val(&ioc, "pini:1"), 7.0);
    assert_eq!(stat(&ioc, "pini:1"), AlarmStatus::NoAlarm);
    assert_eq!(sevr(&ioc, "pini:1"), Severity::NoAlarm);
}

#[test]
fn unknown_device_type_leaves_the_record_non_functional() {
    let mut builder = Ioc::builder();
    builder.register_standard().unwrap();
    let report = builder
        .load_records(
            r#"
            record(ai, "broken:1") {
                field(DTYP, "No Such Device")
            }
            record(ai, "fine:1") {
                field(DTYP, "Soft Channel")
            }
            "#,
        )
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    let ioc = builder.build().unwrap();

    // The broken record is permanently active with a standing alarm.
    assert_eq!(ioc.get("broken:1.PACT").unwrap(), FieldValue::UChar(1));
    assert_eq!(sevr(&ioc, "broken:1"), Severity::Invalid);

    // Its neighbor still works.
    ioc.put("fine:1.VAL", FieldValue::Double(1.0)).unwrap();
    assert_eq!(stat(&ioc, "fine:1"), AlarmStatus::NoAlarm);
}
