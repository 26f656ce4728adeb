use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::layout::InsnLayout;
use super::{Inst, InsnCursor, InsnData, Opcode, Value, Var};

/// Errors produced by structural mutations of a [Program].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("{0} is already attached to the program")]
    AlreadyAttached(Inst),
    #[error("{0} is not attached to the program")]
    NotAttached(Inst),
    #[error("{0} defines a value that still has uses")]
    HasUses(Inst),
    #[error("cannot replace used {0} with {1}, which does not define a value")]
    ReplacementNotVariable(Inst, Inst),
}

/// A lifted program: a doubly linked list of instructions in execution order.
///
/// The program owns every instruction it ever allocated, attached or not, and
/// maintains the use/def graph across mutations: for every variable, the set
/// of attached instructions whose arguments (transitively) reference it.
/// Definitions always precede their uses in list order; this holds by
/// construction and is preserved by every operation below.
pub struct Program {
    insns: InsnLayout,
    uses: FxHashMap<Var, FxHashSet<Inst>>,
    variable_count: u32,
    /// Set when lifting failed and the program ends in a `poison` instruction.
    pub poison: bool,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Self {
            insns: InsnLayout::new(),
            uses: FxHashMap::default(),
            variable_count: 0,
            poison: false,
        }
    }

    /// Allocate a detached instruction with no result value.
    pub fn create_insn(
        &mut self,
        op: Opcode,
        args: impl IntoIterator<Item = Value>,
    ) -> Inst {
        let args = SmallVec::from_iter(args);
        self.insns.alloc(InsnData::new(op, args, None))
    }

    /// Allocate a detached variable-defining instruction with a fresh name.
    pub fn create_var_insn(
        &mut self,
        op: Opcode,
        args: impl IntoIterator<Item = Value>,
    ) -> Inst {
        let var = Var::from_u32(self.variable_count);
        self.variable_count += 1;
        self.uses.insert(var, FxHashSet::default());
        let args = SmallVec::from_iter(args);
        self.insns.alloc(InsnData::new(op, args, Some(var)))
    }

    /// Create a plain instruction and attach it at the end of the list.
    pub fn append(&mut self, op: Opcode, args: impl IntoIterator<Item = Value>) -> Inst {
        let inst = self.create_insn(op, args);
        let last = self.last();
        self.insert(inst, last)
            .expect("a freshly created instruction is detached");
        inst
    }

    /// Create a variable-defining instruction and attach it at the end of the
    /// list.
    pub fn append_var(&mut self, op: Opcode, args: impl IntoIterator<Item = Value>) -> Inst {
        let inst = self.create_var_insn(op, args);
        let last = self.last();
        self.insert(inst, last)
            .expect("a freshly created instruction is detached");
        inst
    }

    /// Splice a detached instruction into the list immediately after `after`,
    /// or at the head when `after` is `None`, and record it as a user of
    /// every variable its arguments read.
    pub fn insert(&mut self, inst: Inst, after: Option<Inst>) -> Result<(), ProgramError> {
        if self.insns.is_linked(inst) {
            return Err(ProgramError::AlreadyAttached(inst));
        }
        if let Some(after) = after {
            if !self.insns.is_linked(after) {
                return Err(ProgramError::NotAttached(after));
            }
        }
        self.insns.link_after(inst, after);
        let defs: SmallVec<[Var; 4]> = self.insn(inst).defs().iter().copied().collect();
        for var in defs {
            self.uses.entry(var).or_default().insert(inst);
        }
        Ok(())
    }

    /// Unlink `inst` and unregister it from the use sets of the variables it
    /// reads. Fails if `inst` defines a value that still has uses.
    pub fn remove(&mut self, inst: Inst) -> Result<(), ProgramError> {
        self.remove_impl(inst, false)
    }

    /// Unlink `inst` even if its value is still used, e.g. to reattach it
    /// elsewhere.
    pub fn force_remove(&mut self, inst: Inst) -> Result<(), ProgramError> {
        self.remove_impl(inst, true)
    }

    fn remove_impl(&mut self, inst: Inst, skip_use_check: bool) -> Result<(), ProgramError> {
        if !self.insns.is_linked(inst) {
            return Err(ProgramError::NotAttached(inst));
        }
        if !skip_use_check && self.has_uses(inst) {
            return Err(ProgramError::HasUses(inst));
        }
        self.insns.unlink(inst);
        let defs: SmallVec<[Var; 4]> = self.insn(inst).defs().iter().copied().collect();
        for var in defs {
            if let Some(users) = self.uses.get_mut(&var) {
                users.remove(&inst);
            }
        }
        Ok(())
    }

    /// Replace `old` with the detached instruction `new`, splicing `new` into
    /// `old`'s list position.
    ///
    /// When `old`'s value is used, `new` must also define a value; every user
    /// has its arguments rewritten to reference `new`'s variable, and `new`
    /// inherits `old`'s use set.
    pub fn replace(&mut self, old: Inst, new: Inst) -> Result<(), ProgramError> {
        if !self.insns.is_linked(old) {
            return Err(ProgramError::NotAttached(old));
        }
        if self.insns.is_linked(new) {
            return Err(ProgramError::AlreadyAttached(new));
        }
        if self.has_uses(old) {
            let old_var = self
                .insn(old)
                .result()
                .expect("an instruction with uses defines a value");
            let new_var = match self.insn(new).result() {
                Some(var) => var,
                None => return Err(ProgramError::ReplacementNotVariable(old, new)),
            };
            let users: SmallVec<[Inst; 4]> =
                self.uses[&old_var].iter().copied().collect();
            for &user in users.iter() {
                self.insns
                    .node_mut(user)
                    .data
                    .substitute(old_var, &Value::Var(new_var));
            }
            let inherited = self.uses.entry(new_var).or_default();
            inherited.extend(users);
            if let Some(users) = self.uses.get_mut(&old_var) {
                users.clear();
            }
        }
        let after = self.insns.prev(old);
        self.remove_impl(old, false)
            .expect("old is attached and its uses were just rewritten");
        self.insert(new, after)
            .expect("new was checked to be detached");
        Ok(())
    }

    /// Replace `old` with a plain value.
    ///
    /// Every user has its arguments rewritten to contain `value` where they
    /// referenced `old`'s variable, its def cache is refreshed, and it is
    /// registered as a user of the variables `value` reads. `old` is then
    /// removed; the value itself is not attached anywhere.
    pub fn replace_with_value(&mut self, old: Inst, value: Value) -> Result<(), ProgramError> {
        if !self.insns.is_linked(old) {
            return Err(ProgramError::NotAttached(old));
        }
        if let Some(old_var) = self.insn(old).result() {
            let users: SmallVec<[Inst; 4]> = self
                .uses
                .get(&old_var)
                .map(|users| users.iter().copied().collect())
                .unwrap_or_default();
            let mut introduced = FxHashSet::default();
            value.value_defs(&mut introduced);
            debug_assert!(!introduced.contains(&old_var));
            for &user in users.iter() {
                self.insns.node_mut(user).data.substitute(old_var, &value);
                for &var in introduced.iter() {
                    self.uses.entry(var).or_default().insert(user);
                }
            }
            if let Some(users) = self.uses.get_mut(&old_var) {
                users.clear();
            }
        }
        self.remove_impl(old, false)
    }

    pub fn insn(&self, inst: Inst) -> &InsnData {
        self.insns.node(inst).data()
    }

    pub fn result(&self, inst: Inst) -> Option<Var> {
        self.insn(inst).result()
    }

    /// Returns true if `inst` defines a value referenced by at least one
    /// attached instruction.
    pub fn has_uses(&self, inst: Inst) -> bool {
        match self.insn(inst).result() {
            Some(var) => self.use_count(var) != 0,
            None => false,
        }
    }

    pub fn uses(&self, var: Var) -> impl Iterator<Item = Inst> + '_ {
        self.uses
            .get(&var)
            .into_iter()
            .flat_map(|users| users.iter().copied())
    }

    pub fn use_count(&self, var: Var) -> usize {
        self.uses.get(&var).map_or(0, |users| users.len())
    }

    pub fn is_attached(&self, inst: Inst) -> bool {
        self.insns.is_linked(inst)
    }

    pub fn first(&self) -> Option<Inst> {
        self.insns.first()
    }

    pub fn last(&self) -> Option<Inst> {
        self.insns.last()
    }

    pub fn next(&self, inst: Inst) -> Option<Inst> {
        if !self.insns.is_linked(inst) {
            return None;
        }
        self.insns.next(inst)
    }

    pub fn prev(&self, inst: Inst) -> Option<Inst> {
        if !self.insns.is_linked(inst) {
            return None;
        }
        self.insns.prev(inst)
    }

    /// Iterate the attached instructions in list order.
    ///
    /// The borrow is held for the whole iteration; passes that mutate while
    /// walking use a [cursor](Self::cursor) instead.
    pub fn iter(&self) -> impl Iterator<Item = Inst> + '_ {
        self.insns.iter()
    }

    pub fn len(&self) -> usize {
        self.insns.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The next fresh variable index.
    pub fn variable_count(&self) -> u32 {
        self.variable_count
    }

    pub fn cursor(&self) -> InsnCursor {
        InsnCursor::default()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, inst) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", self.insn(inst))?;
        }
        Ok(())
    }
}
