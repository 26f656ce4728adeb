//! The pickle frontend: a byte-level opcode [Scanner] and the [Disassembler]
//! that lifts the scanned stream into an IL [Program](peekle_il::Program).
//!
//! The format is a linear stack-machine bytecode; lifting replays it over a
//! stack of symbolic [Value](peekle_il::Value)s, emitting an instruction
//! whenever an opcode constructs or mutates an object. Failures follow the
//! poison-and-continue policy: the partial program is kept, a trailing
//! `poison` instruction records the message, and the pass pipeline still
//! runs.

mod lift;
mod opcodes;

pub use self::lift::{Disassembler, LiftError};
pub use self::opcodes::{op, opcode_info, ArgKind, ScanError, ScannedOp, Scanner};

/// Lift `input` with poison-and-continue semantics.
pub fn disassemble(input: &[u8]) -> peekle_il::Program {
    Disassembler::new(input).disassemble()
}
