use super::{Inst, Program, ProgramError, Value};

/// A mutation-tolerant iterator over a program's instructions.
///
/// The cursor holds no borrow of the program; every operation takes it
/// explicitly, so passes can rewrite the list mid-walk:
///
/// - [remove](Self::remove) and [replace_with_value](Self::replace_with_value)
///   step back to the predecessor, so the next [advance](Self::advance) lands
///   on the removed instruction's successor;
/// - [replace](Self::replace) adopts the replacement as the current position;
/// - the cursor never yields a detached instruction.
#[derive(Default)]
pub struct InsnCursor {
    current: Option<Inst>,
}

impl InsnCursor {
    /// Step to the next instruction, or `None` at the end of the list.
    pub fn advance(&mut self, program: &Program) -> Option<Inst> {
        let next = match self.current {
            None => program.first(),
            Some(inst) => program.next(inst),
        };
        if let Some(inst) = next {
            self.current = Some(inst);
        }
        next
    }

    /// Remove the current instruction.
    pub fn remove(&mut self, program: &mut Program) -> Result<(), ProgramError> {
        let target = self.position();
        let prev = program.prev(target);
        program.remove(target)?;
        self.current = prev;
        Ok(())
    }

    /// Replace the current instruction with the detached instruction `new`,
    /// which becomes the cursor position.
    pub fn replace(&mut self, program: &mut Program, new: Inst) -> Result<(), ProgramError> {
        let target = self.position();
        program.replace(target, new)?;
        self.current = Some(new);
        Ok(())
    }

    /// Replace the current instruction with a plain value.
    pub fn replace_with_value(
        &mut self,
        program: &mut Program,
        value: Value,
    ) -> Result<(), ProgramError> {
        let target = self.position();
        let prev = program.prev(target);
        program.replace_with_value(target, value)?;
        self.current = prev;
        Ok(())
    }

    /// Detach the current instruction and reattach it after `after` (or at
    /// the head of the list). `after` must not be the current instruction.
    pub fn move_after(
        &mut self,
        program: &mut Program,
        after: Option<Inst>,
    ) -> Result<(), ProgramError> {
        let target = self.position();
        debug_assert_ne!(after, Some(target));
        let prev = program.prev(target);
        program.force_remove(target)?;
        program.insert(target, after)?;
        self.current = prev;
        Ok(())
    }

    fn position(&self) -> Inst {
        self.current
            .expect("the cursor is not positioned on an instruction")
    }
}
