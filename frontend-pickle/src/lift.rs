use num_traits::ToPrimitive;
use rustc_hash::FxHashMap;

use peekle_il::{Inst, Opcode, Program, Scalar, Value};

use super::opcodes::{op, ScanError, ScannedOp, Scanner};

#[derive(Debug, thiserror::Error)]
pub enum LiftError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("unknown or unimplemented opcode {code:#04x} ({name}) at position {pos}")]
    Unimplemented {
        code: u8,
        name: &'static str,
        pos: u64,
    },
    #[error("stack underflow while lifting {name} at position {pos}")]
    StackUnderflow { name: &'static str, pos: u64 },
    #[error("no mark to pop for {name} at position {pos}")]
    MarkUnderflow { name: &'static str, pos: u64 },
    #[error("memo key {key} is unbound at position {pos}")]
    UnboundMemo { key: u64, pos: u64 },
    #[error("malformed {name} argument at position {pos}")]
    BadArgument { name: &'static str, pos: u64 },
}

/// Lifts a pickle byte stream into an IL [Program].
///
/// The serialized program is replayed over symbolic state: an evaluation
/// stack of [Value]s, a metastack of stacks saved at `MARK` boundaries, and
/// the integer-keyed memo. Constructor opcodes append instructions; every
/// other opcode only rearranges the symbolic state.
pub struct Disassembler<'a> {
    scanner: Scanner<'a>,
    program: Program,
    stack: Vec<Value>,
    metastack: Vec<Vec<Value>>,
    memo: FxHashMap<u64, Value>,
}

impl<'a> Disassembler<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            scanner: Scanner::new(input),
            program: Program::new(),
            stack: vec![],
            metastack: vec![],
            memo: FxHashMap::default(),
        }
    }

    /// Run the stream to completion.
    ///
    /// Lifting failures never fail the call: the partial program is kept, a
    /// trailing `poison` instruction records the message, and the poison flag
    /// is set.
    pub fn disassemble(mut self) -> Program {
        match self.run() {
            Ok(()) => self.program,
            Err(err) => {
                log::warn!("lifting failed: {}", err);
                let mut program = self.program;
                program.append(Opcode::Poison, vec![Value::scalar(err.to_string())]);
                program.poison = true;
                program
            }
        }
    }

    fn run(&mut self) -> Result<(), LiftError> {
        while let Some(scanned) = self.scanner.next() {
            if self.step(scanned?)? {
                break;
            }
        }
        Ok(())
    }

    /// Dispatch one opcode. Returns true when the stream's `STOP` was lifted.
    fn step(&mut self, scanned: ScannedOp) -> Result<bool, LiftError> {
        let ScannedOp {
            code,
            name,
            arg,
            pos,
        } = scanned;
        match code {
            op::MARK => {
                self.metastack.push(std::mem::take(&mut self.stack));
            }
            op::STOP => {
                let value = self.pop(name, pos)?;
                self.program.append(Opcode::Stop, vec![value]);
                return Ok(true);
            }
            op::POP => {
                self.pop(name, pos)?;
            }
            op::POP_MARK => {
                self.pop_mark(name, pos)?;
            }
            op::DUP => {
                let top = self.top(name, pos)?.clone();
                self.stack.push(top);
            }
            // scalar literals land on the stack as constants
            op::FLOAT | op::INT | op::BININT | op::BININT1 | op::LONG | op::BININT2
            | op::STRING | op::BINSTRING | op::SHORT_BINSTRING | op::UNICODE | op::BINUNICODE
            | op::LONG1 | op::LONG4 | op::BINBYTES | op::SHORT_BINBYTES
            | op::SHORT_BINUNICODE | op::BINUNICODE8 | op::BINBYTES8 | op::BYTEARRAY8
            | op::BINFLOAT => {
                let arg = arg.ok_or(LiftError::BadArgument { name, pos })?;
                self.stack.push(Value::Scalar(arg));
            }
            op::NONE => self.stack.push(Value::none()),
            op::NEWTRUE => self.stack.push(Value::scalar(true)),
            op::NEWFALSE => self.stack.push(Value::scalar(false)),
            op::REDUCE | op::NEWOBJ => {
                let args = self.pop(name, pos)?;
                let callee = self.pop(name, pos)?;
                let call = self.program.append_var(Opcode::Call, vec![callee, args]);
                self.push_result(call);
            }
            op::BUILD => {
                let state = self.pop(name, pos)?;
                let target = self.top(name, pos)?.clone();
                self.program.append(Opcode::Build, vec![target, state]);
            }
            op::GLOBAL => {
                let text = self.str_arg(arg, name, pos)?;
                let mut parts = text.split(' ');
                let (module, global) = match (parts.next(), parts.next(), parts.next()) {
                    (Some(module), Some(global), None) => (module, global),
                    _ => return Err(LiftError::BadArgument { name, pos }),
                };
                self.stack.push(Value::global(module, Some(global)));
            }
            op::STACK_GLOBAL => {
                let global = self.pop(name, pos)?;
                let module = self.pop(name, pos)?;
                let insn = self.program.append_var(Opcode::Global, vec![module, global]);
                self.push_result(insn);
            }
            op::DICT => {
                let items = self.pop_mark(name, pos)?;
                let pairs = pair_up(items, name, pos)?;
                self.push_mutable(Value::Dict(pairs));
            }
            op::EMPTY_DICT => self.push_mutable(Value::Dict(vec![])),
            op::LIST => {
                let items = self.pop_mark(name, pos)?;
                self.push_mutable(Value::List(items));
            }
            op::EMPTY_LIST => self.push_mutable(Value::List(vec![])),
            op::EMPTY_SET => self.push_mutable(Value::Set(vec![])),
            op::FROZENSET => {
                let items = self.pop_mark(name, pos)?;
                self.push_mutable(Value::FrozenSet(items));
            }
            op::APPENDS => {
                let items = self.pop_mark(name, pos)?;
                let target = self.top(name, pos)?.clone();
                self.program
                    .append(Opcode::Extend, vec![target, Value::List(items)]);
            }
            op::GET | op::BINGET | op::LONG_BINGET => {
                let key = self.memo_key(arg, name, pos)?;
                let value = self
                    .memo
                    .get(&key)
                    .cloned()
                    .ok_or(LiftError::UnboundMemo { key, pos })?;
                self.stack.push(value);
            }
            op::PUT | op::BINPUT | op::LONG_BINPUT => {
                let key = self.memo_key(arg, name, pos)?;
                let top = self.top(name, pos)?.clone();
                self.memo.insert(key, top);
            }
            op::MEMOIZE => {
                let key = self.memo.len() as u64;
                let top = self.top(name, pos)?.clone();
                self.memo.insert(key, top);
            }
            op::SETITEM => {
                let value = self.pop(name, pos)?;
                let key = self.pop(name, pos)?;
                let target = self.top(name, pos)?.clone();
                self.program
                    .append(Opcode::SetItem, vec![target, key, value]);
            }
            op::SETITEMS => {
                let items = self.pop_mark(name, pos)?;
                let pairs = pair_up(items, name, pos)?;
                let target = self.top(name, pos)?.clone();
                for (key, value) in pairs {
                    self.program
                        .append(Opcode::SetItem, vec![target.clone(), key, value]);
                }
            }
            op::TUPLE => {
                let items = self.pop_mark(name, pos)?;
                self.stack.push(Value::Tuple(items));
            }
            op::EMPTY_TUPLE => self.stack.push(Value::Tuple(vec![])),
            op::TUPLE1 => {
                let a = self.pop(name, pos)?;
                self.stack.push(Value::Tuple(vec![a]));
            }
            op::TUPLE2 => {
                let b = self.pop(name, pos)?;
                let a = self.pop(name, pos)?;
                self.stack.push(Value::Tuple(vec![a, b]));
            }
            op::TUPLE3 => {
                let c = self.pop(name, pos)?;
                let b = self.pop(name, pos)?;
                let a = self.pop(name, pos)?;
                self.stack.push(Value::Tuple(vec![a, b, c]));
            }
            op::PROTO | op::FRAME => (),
            _ => {
                return Err(LiftError::Unimplemented { code, name, pos });
            }
        }
        Ok(false)
    }

    fn pop(&mut self, name: &'static str, pos: u64) -> Result<Value, LiftError> {
        self.stack
            .pop()
            .ok_or(LiftError::StackUnderflow { name, pos })
    }

    fn top(&mut self, name: &'static str, pos: u64) -> Result<&Value, LiftError> {
        self.stack
            .last()
            .ok_or(LiftError::StackUnderflow { name, pos })
    }

    /// Restore the stack saved by the matching `MARK`, returning the items
    /// accumulated since.
    fn pop_mark(&mut self, name: &'static str, pos: u64) -> Result<Vec<Value>, LiftError> {
        let saved = self
            .metastack
            .pop()
            .ok_or(LiftError::MarkUnderflow { name, pos })?;
        Ok(std::mem::replace(&mut self.stack, saved))
    }

    fn push_result(&mut self, inst: Inst) {
        let var = self
            .program
            .result(inst)
            .expect("a lifted definition has a result");
        self.stack.push(Value::Var(var));
    }

    fn push_mutable(&mut self, seed: Value) {
        let insn = self
            .program
            .append_var(Opcode::MutableConstant, vec![seed]);
        self.push_result(insn);
    }

    fn memo_key(
        &self,
        arg: Option<Scalar>,
        name: &'static str,
        pos: u64,
    ) -> Result<u64, LiftError> {
        match arg {
            Some(Scalar::Int(key)) => key
                .to_u64()
                .ok_or(LiftError::BadArgument { name, pos }),
            Some(Scalar::Bool(key)) => Ok(key as u64),
            _ => Err(LiftError::BadArgument { name, pos }),
        }
    }

    fn str_arg(
        &self,
        arg: Option<Scalar>,
        name: &'static str,
        pos: u64,
    ) -> Result<String, LiftError> {
        match arg {
            Some(Scalar::Str(text)) => Ok(text),
            _ => Err(LiftError::BadArgument { name, pos }),
        }
    }
}

fn pair_up(
    items: Vec<Value>,
    name: &'static str,
    pos: u64,
) -> Result<Vec<(Value, Value)>, LiftError> {
    if items.len() % 2 != 0 {
        return Err(LiftError::BadArgument { name, pos });
    }
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        pairs.push((key, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lift(input: &[u8]) -> Program {
        Disassembler::new(input).disassemble()
    }

    #[test]
    fn lifts_a_reduce_call() {
        // GLOBAL os.path join, EMPTY_TUPLE, REDUCE, STOP
        let program = lift(b"cos.path\njoin\n)R.");
        assert_eq!(
            program.to_string(),
            "v0 = call os.path.join, ()\nstop v0"
        );
        assert!(!program.poison);
    }

    #[test]
    fn lifts_memo_round_trips() {
        // EMPTY_LIST, PUT 0, POP, GET 0, STOP
        let program = lift(b"]p0\n0g0\n.");
        assert_eq!(program.to_string(), "v0 = mutable_constant []\nstop v0");
        assert!(!program.poison);
    }

    #[test]
    fn lifts_marked_collections() {
        // MARK, 1, 2, LIST, STOP
        let program = lift(b"(K\x01K\x02l.");
        assert_eq!(
            program.to_string(),
            "v0 = mutable_constant [1, 2]\nstop v0"
        );

        // MARK, 'a', 1, DICT, STOP
        let program = lift(b"(\x8c\x01aK\x01d.");
        assert_eq!(
            program.to_string(),
            "v0 = mutable_constant {'a': 1}\nstop v0"
        );
    }

    #[test]
    fn lifts_setitems_per_pair() {
        // EMPTY_DICT, MARK, 'a', 1, 'b', 2, SETITEMS, STOP
        let program = lift(b"}(\x8c\x01aK\x01\x8c\x01bK\x02u.");
        assert_eq!(
            program.to_string(),
            "v0 = mutable_constant {}\nset_item v0, 'a', 1\nset_item v0, 'b', 2\nstop v0"
        );
    }

    #[test]
    fn lifts_stack_global_and_build() {
        // 'os', 'getcwd', STACK_GLOBAL, NONE, BUILD, STOP
        let program = lift(b"\x8c\x02os\x8c\x06getcwd\x93Nb.");
        assert_eq!(
            program.to_string(),
            "v0 = global 'os', 'getcwd'\nbuild v0, None\nstop v0"
        );
    }

    #[test]
    fn proto_and_frame_are_ignored() {
        let program = lift(b"\x80\x04\x95\x02\x00\x00\x00\x00\x00\x00\x00N.");
        assert_eq!(program.to_string(), "stop None");
        assert!(!program.poison);
    }

    #[test]
    fn stack_underflow_poisons() {
        let program = lift(b".");
        assert!(program.poison);
        assert_eq!(
            program.to_string(),
            "poison 'stack underflow while lifting STOP at position 0'"
        );
    }

    #[test]
    fn unbound_memo_poisons() {
        let program = lift(b"g5\n.");
        assert!(program.poison);
        assert_eq!(
            program.to_string(),
            "poison 'memo key 5 is unbound at position 0'"
        );
    }

    #[test]
    fn unimplemented_opcodes_poison() {
        // PERSID is scanned but has no lifting rule
        let program = lift(b"Pid\n.");
        assert!(program.poison);
        assert!(program
            .to_string()
            .contains("unknown or unimplemented opcode 0x50 (PERSID) at position 0"));
    }

    #[test]
    fn missing_stop_leaves_a_clean_partial_program() {
        let program = lift(b"]");
        assert!(!program.poison);
        assert_eq!(program.to_string(), "v0 = mutable_constant []");
    }
}
