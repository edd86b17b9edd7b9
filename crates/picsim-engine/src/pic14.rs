//! Built-in 14-bit mid-range core
//!
//! A deliberately small model: enough of the mid-range PIC instruction
//! set to run firmware that banks registers, drives a port, and loops
//! (`nop`, `movlw`, `movwf`, `clrf`, `bsf`, `bcf`, `goto`, `sleep`).
//! Anything else executes as a traced no-op. Instruction words are
//! little-endian byte pairs in program memory.

use crate::processor::{ExecutionModel, Processor, ProcessorLayout, ProcessorState};
use crate::trace::{ResetType, TraceEvent, TraceWriter};

const STATUS: u16 = 0x03;
const RP0_BIT: u8 = 5;

/// Layout shared by the built-in mid-range types: 8K program words,
/// 256 file registers banked in two banks, one 8-bit port on pins
/// 1 through 8.
pub const PIC14_LAYOUT: ProcessorLayout = ProcessorLayout {
    program_bytes: 0x2000 * 2,
    register_count: 0x100,
    pin_count: 8,
    pin_prefix: "porta",
    port_addr: 0x05,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insn {
    Nop,
    MovLw(u8),
    MovWf(u8),
    ClrF(u8),
    Bsf(u8, u8),
    Bcf(u8, u8),
    Goto(u16),
    Sleep,
    Unknown(u16),
}

fn decode(word: u16) -> Insn {
    if word == 0x0000 {
        Insn::Nop
    } else if word == 0x0063 {
        Insn::Sleep
    } else if word & 0x3F00 == 0x3000 {
        Insn::MovLw((word & 0xFF) as u8)
    } else if word & 0x3F80 == 0x0080 {
        Insn::MovWf((word & 0x7F) as u8)
    } else if word & 0x3F80 == 0x0180 {
        Insn::ClrF((word & 0x7F) as u8)
    } else if word & 0x3C00 == 0x1400 {
        Insn::Bsf((word & 0x7F) as u8, ((word >> 7) & 0x7) as u8)
    } else if word & 0x3C00 == 0x1000 {
        Insn::Bcf((word & 0x7F) as u8, ((word >> 7) & 0x7) as u8)
    } else if word & 0x3800 == 0x2800 {
        Insn::Goto(word & 0x7FF)
    } else {
        Insn::Unknown(word)
    }
}

fn render(insn: Insn) -> String {
    match insn {
        Insn::Nop => "nop".to_string(),
        Insn::MovLw(k) => format!("movlw 0x{k:02X}"),
        Insn::MovWf(f) => format!("movwf 0x{f:02X}"),
        Insn::ClrF(f) => format!("clrf 0x{f:02X}"),
        Insn::Bsf(f, b) => format!("bsf 0x{f:02X},{b}"),
        Insn::Bcf(f, b) => format!("bcf 0x{f:02X},{b}"),
        Insn::Goto(k) => format!("goto 0x{k:03X}"),
        Insn::Sleep => "sleep".to_string(),
        Insn::Unknown(w) => format!("dw 0x{w:04X}"),
    }
}

/// Execution model for the built-in mid-range core.
#[derive(Debug, Default)]
pub struct Pic14;

impl Pic14 {
    /// Bank-select: 7-bit file address plus RP0, except STATUS which is
    /// mirrored across banks.
    fn effective(state: &ProcessorState, f: u8) -> u16 {
        let f = (f & 0x7F) as u16;
        if f == STATUS {
            return STATUS;
        }
        let rp0 = (state.peek_register(STATUS) >> RP0_BIT) & 1;
        f | ((rp0 as u16) << 7)
    }
}

impl ExecutionModel for Pic14 {
    fn reset(&mut self, state: &mut ProcessorState, _cause: ResetType) {
        state.reset_core();
    }

    fn execute_cycle(&mut self, state: &mut ProcessorState, trace: &mut TraceWriter<'_>) {
        let pc = state.pc();
        let insn = decode(state.program_word(pc));

        match insn {
            Insn::Goto(target) => {
                trace.emplace(TraceEvent::BranchPc {
                    address: pc,
                    target: Some(target),
                    insn: Some(render(insn)),
                });
                state.set_pc(target);
                return;
            }
            Insn::MovLw(k) => {
                state.set_w(k);
                trace.emplace(TraceEvent::WriteW {
                    address: pc,
                    value: k,
                });
            }
            Insn::MovWf(f) => {
                let value = state.w();
                trace.emplace(TraceEvent::ReadW { address: pc, value });
                let eff = Self::effective(state, f);
                state.write_register(eff, value, trace);
            }
            Insn::ClrF(f) => {
                let eff = Self::effective(state, f);
                state.write_register(eff, 0, trace);
            }
            Insn::Bsf(f, b) => {
                let eff = Self::effective(state, f);
                let value = state.read_register(eff, trace);
                state.write_register(eff, value | (1 << b), trace);
            }
            Insn::Bcf(f, b) => {
                let eff = Self::effective(state, f);
                let value = state.read_register(eff, trace);
                state.write_register(eff, value & !(1 << b), trace);
            }
            Insn::Sleep => {
                state.sleep();
            }
            Insn::Nop | Insn::Unknown(_) => {}
        }

        trace.emplace(TraceEvent::IncrementPc {
            address: pc,
            target: None,
            insn: Some(render(insn)),
        });
        state.set_pc(pc.wrapping_add(1));
    }

    fn disasm(&self, state: &ProcessorState, word_addr: u16) -> Option<String> {
        Some(render(decode(state.program_word(word_addr))))
    }
}

/// Construct a mid-range processor instance.
pub fn construct(name: &str, type_name: &str) -> Processor {
    Processor::new(name, type_name, &PIC14_LAYOUT, Box::new(Pic14))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuffer;

    // The firmware from the bridge demo: bank-select, clear TRIS,
    // bank-select back, load 0xFF into the port, sleep, loop.
    const DEMO: [u8; 18] = [
        0x83, 0x16, 0x03, 0x13, 0x85, 0x01, 0x83, 0x12, 0x03, 0x13, 0xFF, 0x30, 0x85, 0x00, 0x63,
        0x00, 0x00, 0x28,
    ];

    #[test]
    fn test_decode_demo_program() {
        let words: Vec<u16> = DEMO
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(decode(words[0]), Insn::Bsf(0x03, 5));
        assert_eq!(decode(words[1]), Insn::Bcf(0x03, 6));
        assert_eq!(decode(words[2]), Insn::ClrF(0x05));
        assert_eq!(decode(words[3]), Insn::Bcf(0x03, 5));
        assert_eq!(decode(words[5]), Insn::MovLw(0xFF));
        assert_eq!(decode(words[6]), Insn::MovWf(0x05));
        assert_eq!(decode(words[7]), Insn::Sleep);
        assert_eq!(decode(words[8]), Insn::Goto(0));
    }

    #[test]
    fn test_banked_write_goes_to_high_bank() {
        let mut p = construct("t", "p16f887");
        p.init_program_memory_at_index(0, &DEMO).unwrap();
        let mut buf = TraceBuffer::with_capacity(256);
        // bsf STATUS,5 then clrf 0x05 must hit 0x85, not the port.
        p.step(3u64, &mut buf);
        assert_eq!(p.register(0x03).unwrap() >> RP0_BIT & 1, 1);
        assert_eq!(p.register(0x05).unwrap(), 0);
    }

    #[test]
    fn test_port_write_drives_pins() {
        let mut p = construct("t", "p16f887");
        p.init_program_memory_at_index(0, &DEMO).unwrap();
        let mut buf = TraceBuffer::with_capacity(256);
        assert_eq!(p.pin(1).unwrap().bit_char(), '0');
        // Run through the port write (7 instructions).
        p.step(7u64, &mut buf);
        assert_eq!(p.register(0x05).unwrap(), 0xFF);
        for i in 1..=p.pin_count() {
            assert_eq!(p.pin(i).unwrap().bit_char(), '1');
        }
    }

    #[test]
    fn test_sleep_halts_stepping() {
        let mut p = construct("t", "p16f887");
        p.init_program_memory_at_index(0, &DEMO).unwrap();
        let mut buf = TraceBuffer::with_capacity(1024);
        p.step(20u64, &mut buf);
        assert!(p.is_asleep());
        // PC stops just past the sleep instruction.
        assert_eq!(p.pc(), 8);
    }

    #[test]
    fn test_disasm_round_trip_texts() {
        let mut p = construct("t", "p16f887");
        p.init_program_memory_at_index(0, &DEMO).unwrap();
        assert_eq!(p.disasm(5).unwrap(), "movlw 0xFF");
        assert_eq!(p.disasm(8).unwrap(), "goto 0x000");
    }
}
