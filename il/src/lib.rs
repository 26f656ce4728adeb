//! The peekle intermediate language.
//!
//! A lifted pickle stream is represented as a [Program]: a doubly linked list
//! of instructions in execution order. Instructions that define a value are in
//! static single assignment form; the defined value is referenced from other
//! instructions' argument lists as [Value::Var]. The program maintains the
//! use/def graph across every structural mutation, and the [InsnCursor] allows
//! passes to edit the list while iterating over it.

mod cursor;
mod display;
mod insn;
mod layout;
mod program;
mod value;

pub use self::cursor::InsnCursor;
pub use self::display::DisplayValues;
pub use self::insn::{Inst, InsnData, Opcode};
pub use self::layout::InsnNode;
pub use self::program::{Program, ProgramError};
pub use self::value::{Scalar, Value, Var};
