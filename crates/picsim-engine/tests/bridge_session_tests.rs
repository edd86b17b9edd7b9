//! Integration tests for a full bridge session: host extensions,
//! processor lifecycle, stepping, trace drain, and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use picsim_engine::{SimulationContext, TraceEvent};
use picsim_sdk::{
    offer, ArgValue, BridgeError, ExtensionArgs, InterfaceDescriptor, SinkDescriptor,
};

/// Blink demo firmware for the built-in 14-bit core, words little
/// endian:
///
/// ```text
/// bsf   0x03,5     ; bank 1
/// bcf   0x03,6
/// clrf  0x05       ; TRISA at 0x85
/// bcf   0x03,5     ; bank 0
/// bcf   0x03,6
/// movlw 0xFF
/// movwf 0x05       ; drive PORTA
/// sleep
/// goto  0x000
/// ```
const DEMO: [u8; 18] = [
    0x83, 0x16, 0x03, 0x13, 0x85, 0x01, 0x83, 0x12, 0x03, 0x13, 0xFF, 0x30, 0x85, 0x00, 0x63,
    0x00, 0x00, 0x28,
];

#[derive(Default)]
struct Events {
    stopped: AtomicUsize,
    new_processor: AtomicUsize,
    update: AtomicUsize,
}

fn watcher_descriptor(events: &Arc<Events>) -> Arc<InterfaceDescriptor> {
    let on_stop = Arc::clone(events);
    let on_proc = Arc::clone(events);
    let on_update = Arc::clone(events);
    InterfaceDescriptor::builder("Watcher")
        .on_simulation_has_stopped(move |_| {
            on_stop.stopped.fetch_add(1, Ordering::SeqCst);
        })
        .on_new_processor(move |_, _name| {
            on_proc.new_processor.fetch_add(1, Ordering::SeqCst);
        })
        .on_update(move |_| {
            on_update.update.fetch_add(1, Ordering::SeqCst);
        })
        .build()
}

type SinkLog = Arc<Mutex<Vec<(i64, char)>>>;

/// A sink that records (pin number, state) pairs, pin number taken
/// from its construction argument.
fn recording_sink_descriptor(log: &SinkLog) -> Arc<SinkDescriptor> {
    let seen = Arc::clone(log);
    SinkDescriptor::builder("RecordingSink")
        .construct(|args: &ExtensionArgs| args.int(0).unwrap_or(0))
        .on_set_sink_state(move |state, value| {
            let pin = *state.get::<i64>().unwrap_or(&0);
            seen.lock().push((pin, value));
        })
        .build()
}

#[test]
fn test_session_runs_demo_firmware_and_traces_pc() {
    let events = Arc::new(Events::default());
    let descriptor = watcher_descriptor(&events);

    let mut ctx = SimulationContext::new();
    // Small ring, still larger than anything 20 steps can produce.
    ctx.set_trace_capacity(64);
    let mut handle = descriptor.instantiate(ExtensionArgs::none());
    let id = ctx.add_interface(&mut handle).unwrap();

    let proc = ctx.add_processor_by_type("p16f887", "aproc").unwrap();
    proc.init_program_memory_at_index(0, &DEMO).unwrap();
    assert_eq!(events.new_processor.load(Ordering::SeqCst), 1);

    ctx.step(20u64);

    assert_eq!(events.update.load(Ordering::SeqCst), 1);
    assert_eq!(events.stopped.load(Ordering::SeqCst), 1);

    let mut drained = Vec::new();
    {
        let mut reader = ctx.trace_reader();
        assert_eq!(reader.discarded(), 0);
        while !reader.is_empty() {
            drained.push(reader.front().unwrap().clone());
            reader.pop();
        }
    }
    assert!(matches!(drained[0], TraceEvent::CycleCounter { cycle: 0 }));
    let pc_records = drained
        .iter()
        .filter(|e| matches!(e, TraceEvent::IncrementPc { .. } | TraceEvent::BranchPc { .. }))
        .count();
    assert_eq!(pc_records, 8);

    // Drained is drained.
    assert!(ctx.trace_reader().is_empty());

    // The demo ends in sleep with the port driven high.
    let proc = ctx.processor("aproc").unwrap();
    assert!(proc.is_asleep());
    assert_eq!(proc.pc(), 8);
    assert_eq!(proc.register(0x05), Some(0xFF));

    assert!(ctx.remove_interface(id));
    assert!(!ctx.remove_interface(id));
}

#[test]
fn test_sinks_fire_once_per_level_change() {
    let log: SinkLog = Arc::new(Mutex::new(Vec::new()));
    let descriptor = recording_sink_descriptor(&log);

    let mut ctx = SimulationContext::new();
    let proc = ctx.add_processor_by_type("p16f887", "aproc").unwrap();
    proc.init_program_memory_at_index(0, &DEMO).unwrap();

    let pin_count = proc.pin_count();
    assert_eq!(pin_count, 8);
    for i in 1..=pin_count {
        let mut handle =
            descriptor.instantiate(ExtensionArgs::from(vec![ArgValue::Int(i as i64)]));
        let pin = proc.pin_mut(i).unwrap();
        pin.monitor_mut().add_signal_sink(&mut handle).unwrap();
        assert!(!handle.is_live());
    }
    assert_eq!(proc.pin(1).unwrap().monitor().sink_count(), 1);
    assert_eq!(proc.pin(1).unwrap().bit_char(), '0');

    ctx.step(20u64);

    // Exactly one '1' edge per pin, in pin order, and the levels the
    // sinks saw match what the pins now report.
    let seen = log.lock();
    assert_eq!(seen.len(), pin_count);
    for (i, (pin, value)) in seen.iter().enumerate() {
        assert_eq!(*pin, (i + 1) as i64);
        assert_eq!(*value, '1');
    }
    drop(seen);

    let proc = ctx.processor("aproc").unwrap();
    for i in 1..=pin_count {
        assert_eq!(proc.pin(i).unwrap().bit_char(), '1');
    }
}

#[test]
fn test_clear_releases_sinks_and_permits_rebuild() {
    let released = Arc::new(AtomicUsize::new(0));
    let on_release = Arc::clone(&released);
    let descriptor = SinkDescriptor::builder("ReleaseProbe")
        .on_release(move |_| {
            on_release.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let mut ctx = SimulationContext::new();

    for round in 0..2 {
        let events = Arc::new(Events::default());
        let watcher = watcher_descriptor(&events);
        let mut w1 = watcher.instantiate(ExtensionArgs::none());
        let mut w2 = watcher.instantiate(ExtensionArgs::none());
        ctx.add_interface(&mut w1).unwrap();
        ctx.add_interface(&mut w2).unwrap();

        let proc = ctx.add_processor_by_type("p16f887", "aproc").unwrap();
        proc.init_program_memory_at_index(0, &DEMO).unwrap();
        let mut sink = descriptor.instantiate(ExtensionArgs::none());
        proc.pin_mut(1)
            .unwrap()
            .monitor_mut()
            .add_signal_sink(&mut sink)
            .unwrap();

        ctx.step(20u64);
        assert!(ctx.cycles() > 0);

        ctx.clear();
        assert_eq!(released.load(Ordering::SeqCst), round + 1);
        assert_eq!(ctx.processor_count(), 0);
        assert_eq!(ctx.interface_count(), 0);
        assert_eq!(ctx.cycles(), 0);
        assert!(ctx.trace_reader().is_empty());
        assert_eq!(ctx.trace_reader().discarded(), 0);
    }
}

#[test]
fn test_rejected_adoption_releases_through_offer() {
    let mut ctx = SimulationContext::new();
    ctx.add_processor_by_type("p16f887", "aproc").unwrap();

    // A second processor under the same name is rejected.
    let err = ctx.add_processor_by_type("p16f887", "aproc").unwrap_err();
    assert!(matches!(
        err,
        picsim_engine::EngineError::Bridge(BridgeError::AdoptionFailed(_))
    ));

    // offer() releases a handle whose adoption failed, and a released
    // handle cannot be offered again.
    let descriptor = watcher_descriptor(&Arc::new(Events::default()));
    let handle = descriptor.instantiate(ExtensionArgs::none());
    let id = handle.id();
    let result = offer(handle, |h| {
        h.release().unwrap();
        h.payload_mut().map(|_| ())
    });
    assert_eq!(result, Err(BridgeError::UseAfterRelease(id)));

    let mut released = descriptor.instantiate(ExtensionArgs::none());
    released.release().unwrap();
    let err = ctx.add_interface(&mut released).unwrap_err();
    assert!(matches!(err, BridgeError::UseAfterRelease(_)));
}

#[test]
fn test_unknown_processor_type_is_an_error_registry_miss_is_none() {
    let mut ctx = SimulationContext::new();
    let err = ctx.add_processor_by_type("does-not-exist", "x").unwrap_err();
    assert!(matches!(
        err,
        picsim_engine::EngineError::UnknownProcessorType(_)
    ));
    assert!(picsim_engine::find_by_type("does-not-exist").is_none());
    assert!(ctx.registry().find_by_type("p16f887").is_some());
}
