//! End-to-end demo session: load the blink firmware into a p16f887,
//! watch its pins through signal sinks, run it, and dump the trace.
//!
//! Run with:
//!   cargo run --example blink

use picsim_engine::{EngineResult, SimulationContext};
use picsim_sdk::{ArgValue, ExtensionArgs, InterfaceDescriptor, SinkDescriptor};

/// Blink firmware, instruction words little endian: configure PORTA as
/// outputs, drive it high, then sleep.
const FIRMWARE: [u8; 18] = [
    0x83, 0x16, 0x03, 0x13, 0x85, 0x01, 0x83, 0x12, 0x03, 0x13, 0xFF, 0x30, 0x85, 0x00, 0x63,
    0x00, 0x00, 0x28,
];

fn main() -> EngineResult<()> {
    let watcher = InterfaceDescriptor::builder("ConsoleWatcher")
        .on_new_processor(|_, name| println!("newProcessor {name}"))
        .on_update(|_| println!("update"))
        .on_simulation_has_stopped(|_| println!("simulationHasStopped"))
        .build();

    let console_sink = SinkDescriptor::builder("ConsoleSink")
        .construct(|args: &ExtensionArgs| args.int(0).unwrap_or(0))
        .on_set_sink_state(|state, value| {
            let pin = state.get::<i64>().copied().unwrap_or(0);
            println!("sink {pin} {value}");
        })
        .build();

    let mut ctx = SimulationContext::new();
    let mut watcher_handle = watcher.instantiate(ExtensionArgs::none());
    let watcher_id = ctx.add_interface(&mut watcher_handle)?;

    let proc = ctx.add_processor_by_type("p16f887", "aproc")?;
    proc.init_program_memory_at_index(0, &FIRMWARE)?;

    for i in 1..=proc.pin_count() {
        let pin = proc.pin_mut(i).expect("pin index in range");
        println!("pin {i} {}", pin.name());
        let mut sink = console_sink.instantiate(ExtensionArgs::from(vec![ArgValue::Int(i as i64)]));
        pin.monitor_mut().add_signal_sink(&mut sink)?;
    }

    ctx.step(20u64);

    let mut reader = ctx.trace_reader();
    println!(
        "Trace: empty={} size={} discarded={}",
        reader.is_empty(),
        reader.len(),
        reader.discarded()
    );
    while let Some(event) = reader.front() {
        println!("  {}", serde_json::to_string(event).expect("serializable event"));
        reader.pop();
    }

    ctx.remove_interface(watcher_id);
    ctx.clear();
    Ok(())
}
