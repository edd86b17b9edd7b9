//! Firmware program artifact
//!
//! A `Program` bundles the output of a firmware build: raw code bytes
//! keyed by program-memory byte index, plus optional symbol, source
//! line and directive records. The metadata is never required for
//! execution; lookups that miss return absent values, not errors.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::processor::Processor;

/// Classification of a source symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSymbolKind {
    /// The build tool did not classify the symbol.
    #[default]
    Unknown,
    /// A data-memory symbol.
    Data,
    /// A program-memory symbol.
    Program,
    /// An assembler constant.
    Constant,
}

/// A contiguous run of code bytes at a program-memory byte index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRange {
    /// Program-memory byte index of the first byte.
    pub addr: u64,
    /// The raw bytes, little-endian instruction words.
    pub code: Vec<u8>,
}

impl CodeRange {
    // Saturating: a range butting against the top of the address space
    // is valid input (upload rejects it later), and lookups on it must
    // miss rather than overflow.
    fn end(&self) -> u64 {
        self.addr.saturating_add(self.code.len() as u64)
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.end()
    }
}

/// One entry from the firmware's symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSymbol {
    /// Symbol classification.
    pub kind: SourceSymbolKind,
    /// Symbol name.
    pub name: String,
    /// Address or constant value, as classified by `kind`.
    pub value: i64,
}

/// Mapping from a program-memory byte index to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLineRef {
    /// Program-memory byte index the line assembled to.
    pub addr: u64,
    /// Source file name.
    pub file: String,
    /// One-based line number.
    pub line: u32,
}

/// An assembler directive attached to a program-memory byte index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDirective {
    /// Program-memory byte index the directive applies to.
    pub addr: u64,
    /// Directive kind, e.g. an assembler pseudo-op name.
    pub kind: String,
    /// Directive payload text.
    pub text: String,
}

/// A loadable firmware image with optional source metadata.
///
/// Code ranges, line refs and directives are kept sorted by address so
/// address lookups can bisect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProgramParts", into = "ProgramParts")]
pub struct Program {
    target_processor_type: String,
    code: Vec<CodeRange>,
    symbols: Vec<SourceSymbol>,
    line_refs: Vec<SourceLineRef>,
    directives: Vec<SourceDirective>,
}

/// Serde surface for [`Program`]. Going through a separate struct lets
/// deserialization re-establish the sort invariants.
#[derive(Serialize, Deserialize)]
struct ProgramParts {
    #[serde(default)]
    target_processor_type: String,
    #[serde(default)]
    code: Vec<CodeRange>,
    #[serde(default)]
    symbols: Vec<SourceSymbol>,
    #[serde(default)]
    line_refs: Vec<SourceLineRef>,
    #[serde(default)]
    directives: Vec<SourceDirective>,
}

impl From<ProgramParts> for Program {
    fn from(parts: ProgramParts) -> Self {
        Program::new(
            parts.target_processor_type,
            parts.code,
            parts.symbols,
            parts.line_refs,
            parts.directives,
        )
    }
}

impl From<Program> for ProgramParts {
    fn from(program: Program) -> Self {
        ProgramParts {
            target_processor_type: program.target_processor_type,
            code: program.code,
            symbols: program.symbols,
            line_refs: program.line_refs,
            directives: program.directives,
        }
    }
}

impl Program {
    /// Assemble a program from its parts. Code ranges, line refs and
    /// directives are sorted by address; symbols keep build order.
    pub fn new(
        target_processor_type: impl Into<String>,
        mut code: Vec<CodeRange>,
        symbols: Vec<SourceSymbol>,
        mut line_refs: Vec<SourceLineRef>,
        mut directives: Vec<SourceDirective>,
    ) -> Self {
        code.sort_by_key(|r| r.addr);
        line_refs.sort_by_key(|r| r.addr);
        directives.sort_by(|a, b| a.addr.cmp(&b.addr).then_with(|| a.kind.cmp(&b.kind)));
        Self {
            target_processor_type: target_processor_type.into(),
            code,
            symbols,
            line_refs,
            directives,
        }
    }

    /// A bare code image with no metadata, targeting any processor.
    pub fn from_code(code: Vec<CodeRange>) -> Self {
        Self::new("", code, Vec::new(), Vec::new(), Vec::new())
    }

    /// Processor type name this program was built for. Empty means
    /// any.
    pub fn target_processor_type(&self) -> &str {
        &self.target_processor_type
    }

    /// Code ranges, ordered by address.
    pub fn code(&self) -> &[CodeRange] {
        &self.code
    }

    /// Symbol table, in build order.
    pub fn symbols(&self) -> &[SourceSymbol] {
        &self.symbols
    }

    /// Source line refs, ordered by address.
    pub fn line_refs(&self) -> &[SourceLineRef] {
        &self.line_refs
    }

    /// Assembler directives, ordered by address then kind.
    pub fn directives(&self) -> &[SourceDirective] {
        &self.directives
    }

    /// The code range covering `addr`, if any.
    pub fn find_code_range(&self, addr: u64) -> Option<&CodeRange> {
        let i = self.code.partition_point(|r| r.end() <= addr);
        self.code.get(i).filter(|r| r.contains(addr))
    }

    /// Read `len` bytes starting at `addr`, filling gaps between
    /// ranges with `fill`. Stops short once no further range covers
    /// the remaining span.
    pub fn code_at(&self, addr: u64, len: usize, fill: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut addr = addr;

        while out.len() < len {
            let i = self.code.partition_point(|r| r.end() <= addr);
            let Some(range) = self.code.get(i) else {
                break;
            };

            if range.addr > addr {
                let gap = (range.addr - addr) as usize;
                let n = gap.min(len - out.len());
                out.extend(std::iter::repeat(fill).take(n));
                addr += n as u64;
                if out.len() == len {
                    break;
                }
            }

            let offset = (addr - range.addr) as usize;
            let n = (range.code.len() - offset).min(len - out.len());
            out.extend_from_slice(&range.code[offset..offset + n]);
            addr += n as u64;
        }

        out
    }

    /// All symbols with the given name. Misses are an empty vec.
    pub fn find_symbols(&self, name: &str) -> Vec<&SourceSymbol> {
        self.symbols.iter().filter(|s| s.name == name).collect()
    }

    /// All symbols of the given kind and value.
    pub fn find_symbols_by_value(&self, kind: SourceSymbolKind, value: i64) -> Vec<&SourceSymbol> {
        self.symbols
            .iter()
            .filter(|s| s.kind == kind && s.value == value)
            .collect()
    }

    /// Source line refs for the closest address at or below `addr`.
    /// An `addr` before the first ref yields an empty vec.
    pub fn find_lines(&self, addr: u64) -> Vec<&SourceLineRef> {
        Self::at_or_below(&self.line_refs, addr, |r| r.addr)
    }

    /// Line refs assembled from the given source location.
    pub fn find_lines_by_location(&self, file: &str, line: u32) -> Vec<&SourceLineRef> {
        self.line_refs
            .iter()
            .filter(|r| r.file == file && r.line == line)
            .collect()
    }

    /// Directives for the closest address at or below `addr`.
    pub fn find_directives(&self, addr: u64) -> Vec<&SourceDirective> {
        Self::at_or_below(&self.directives, addr, |d| d.addr)
    }

    /// All directives of the given kind.
    pub fn find_directives_by_kind(&self, kind: &str) -> Vec<&SourceDirective> {
        self.directives.iter().filter(|d| d.kind == kind).collect()
    }

    /// Collect the run of entries sharing the largest address that is
    /// at or below `addr` in an address-sorted slice.
    fn at_or_below<T>(entries: &[T], addr: u64, key: impl Fn(&T) -> u64) -> Vec<&T> {
        let end = entries.partition_point(|e| key(e) <= addr);
        if end == 0 {
            return Vec::new();
        }
        let hit = key(&entries[end - 1]);
        let start = entries.partition_point(|e| key(e) < hit);
        entries[start..end].iter().collect()
    }

    /// Load every code range into the processor's program memory.
    ///
    /// Fails without touching memory when the program names a
    /// different target type; fails mid-load when a range falls
    /// outside program memory.
    pub fn upload(&self, processor: &mut Processor) -> EngineResult<()> {
        let target = self.target_processor_type();
        if !target.is_empty() && target != processor.type_name() {
            return Err(EngineError::ProgramTargetMismatch {
                expected: target.to_string(),
                actual: processor.type_name().to_string(),
            });
        }

        for range in &self.code {
            processor.init_program_memory_at_index(range.addr as usize, &range.code)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pic14;
    use picsim_sdk::BridgeError;

    fn sample() -> Program {
        Program::new(
            "p16f887",
            vec![
                CodeRange {
                    addr: 0x10,
                    code: vec![0xAA, 0xBB],
                },
                CodeRange {
                    addr: 0x00,
                    code: vec![0x01, 0x02, 0x03, 0x04],
                },
            ],
            vec![
                SourceSymbol {
                    kind: SourceSymbolKind::Program,
                    name: "start".into(),
                    value: 0,
                },
                SourceSymbol {
                    kind: SourceSymbolKind::Data,
                    name: "porta".into(),
                    value: 5,
                },
            ],
            vec![
                SourceLineRef {
                    addr: 0x04,
                    file: "blink.asm".into(),
                    line: 12,
                },
                SourceLineRef {
                    addr: 0x00,
                    file: "blink.asm".into(),
                    line: 10,
                },
            ],
            vec![SourceDirective {
                addr: 0x00,
                kind: "list".into(),
                text: "p=16f887".into(),
            }],
        )
    }

    #[test]
    fn test_find_code_range_bisects_sorted_ranges() {
        let prog = sample();
        assert_eq!(prog.find_code_range(0x00).unwrap().addr, 0x00);
        assert_eq!(prog.find_code_range(0x03).unwrap().addr, 0x00);
        assert!(prog.find_code_range(0x04).is_none());
        assert_eq!(prog.find_code_range(0x11).unwrap().addr, 0x10);
        assert!(prog.find_code_range(0x12).is_none());
    }

    #[test]
    fn test_code_at_fills_gaps_and_stops_at_end() {
        let prog = sample();
        // Spans the tail of the first range, the gap, and the second.
        let bytes = prog.code_at(0x02, 0x10, 0xFF);
        assert_eq!(bytes.len(), 0x10);
        assert_eq!(&bytes[..2], &[0x03, 0x04]);
        assert!(bytes[2..0x0E].iter().all(|b| *b == 0xFF));
        assert_eq!(&bytes[0x0E..], &[0xAA, 0xBB]);

        // Nothing past the last range.
        assert!(prog.code_at(0x12, 8, 0xFF).is_empty());
    }

    #[test]
    fn test_symbol_and_line_lookups_miss_as_empty() {
        let prog = sample();
        assert_eq!(prog.find_symbols("start").len(), 1);
        assert!(prog.find_symbols("nope").is_empty());
        assert_eq!(
            prog.find_symbols_by_value(SourceSymbolKind::Data, 5)[0].name,
            "porta"
        );

        // Closest-at-or-below semantics.
        assert_eq!(prog.find_lines(0x02)[0].line, 10);
        assert_eq!(prog.find_lines(0x04)[0].line, 12);
        assert_eq!(prog.find_lines(0x40)[0].line, 12);
        assert!(Program::default().find_lines(0).is_empty());

        assert_eq!(prog.find_directives(0x00)[0].kind, "list");
        assert!(prog.find_directives_by_kind("org").is_empty());
    }

    #[test]
    fn test_upload_checks_target_and_bounds() {
        let prog = sample();
        let mut proc = pic14::construct("u1", "p16f887");
        prog.upload(&mut proc).unwrap();
        assert_eq!(proc.program_word(0), 0x0201);
        assert_eq!(proc.program_word(8), 0xBBAA);

        let mut other = pic14::construct("u2", "p18f452");
        let err = prog.upload(&mut other).unwrap_err();
        assert!(matches!(err, EngineError::ProgramTargetMismatch { .. }));

        let huge = Program::from_code(vec![CodeRange {
            addr: u64::MAX - 1,
            code: vec![0x00, 0x00],
        }]);
        let err = huge.upload(&mut proc).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Bridge(BridgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_lookups_on_max_address_range_do_not_overflow() {
        let prog = Program::from_code(vec![CodeRange {
            addr: u64::MAX - 1,
            code: vec![0xAA, 0xBB],
        }]);
        assert!(prog.find_code_range(0).is_none());
        assert_eq!(prog.find_code_range(u64::MAX - 1).unwrap().addr, u64::MAX - 1);
        // Everything below the range is gap fill.
        assert_eq!(prog.code_at(0, 4, 0xFF), vec![0xFF; 4]);
        assert_eq!(prog.code_at(u64::MAX - 1, 1, 0xFF), vec![0xAA]);
    }

    #[test]
    fn test_serde_round_trip_restores_sort_order() {
        let prog = sample();
        let json = serde_json::to_string(&prog).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prog);
        assert!(back.code().windows(2).all(|w| w[0].addr <= w[1].addr));
    }
}
