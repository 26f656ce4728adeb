use std::ptr::NonNull;

use cranelift_entity::EntityRef;
use intrusive_collections::{intrusive_adapter, LinkedList, LinkedListLink, UnsafeRef};
use typed_arena::Arena;

use super::{Inst, InsnData};

/// One node in a program's instruction list.
pub struct InsnNode {
    pub(super) link: LinkedListLink,
    pub(super) key: Inst,
    pub(super) data: InsnData,
}

impl InsnNode {
    pub fn key(&self) -> Inst {
        self.key
    }

    pub fn data(&self) -> &InsnData {
        &self.data
    }
}

intrusive_adapter!(pub InsnAdapter = UnsafeRef<InsnNode>: InsnNode { link: LinkedListLink });

/// Arena-backed storage for instructions, threaded onto an intrusive doubly
/// linked list.
///
/// Nodes have stable addresses for the lifetime of the arena, so a detached
/// instruction keeps its identity and can be spliced back in later. The link
/// state of a node is the single source of truth for whether the instruction
/// is attached. Unlinking never deallocates; memory is reclaimed when the
/// layout is dropped.
pub(super) struct InsnLayout {
    list: LinkedList<InsnAdapter>,
    keys: Vec<NonNull<InsnNode>>,
    arena: Arena<InsnNode>,
}

impl Drop for InsnLayout {
    fn drop(&mut self) {
        // The list holds UnsafeRefs into the arena; unlink them without
        // touching node memory before the arena goes away.
        self.list.fast_clear();
    }
}

impl Default for InsnLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl InsnLayout {
    pub fn new() -> Self {
        Self {
            list: LinkedList::new(InsnAdapter::new()),
            keys: vec![],
            arena: Arena::new(),
        }
    }

    /// Allocate a detached node for `data`, returning its key.
    pub fn alloc(&mut self, data: InsnData) -> Inst {
        let key = Inst::new(self.keys.len());
        let node = self.arena.alloc(InsnNode {
            link: LinkedListLink::new(),
            key,
            data,
        });
        self.keys.push(NonNull::from(node));
        key
    }

    pub fn node(&self, inst: Inst) -> &InsnNode {
        // SAFETY: keys only holds pointers produced by the arena, which are
        // valid and unaliased for as long as the layout is borrowed.
        unsafe { self.keys[inst.index()].as_ref() }
    }

    pub fn node_mut(&mut self, inst: Inst) -> &mut InsnNode {
        let mut ptr = self.keys[inst.index()];
        // SAFETY: exclusive access through &mut self.
        unsafe { ptr.as_mut() }
    }

    pub fn is_linked(&self, inst: Inst) -> bool {
        self.node(inst).link.is_linked()
    }

    /// Link a detached node after `after`, or at the head of the list.
    ///
    /// Callers must ensure `inst` is detached and `after` is linked.
    pub fn link_after(&mut self, inst: Inst, after: Option<Inst>) {
        debug_assert!(!self.is_linked(inst));
        // SAFETY: the pointer comes from the arena and the node is not on the
        // list yet.
        let node = unsafe { UnsafeRef::from_raw(self.keys[inst.index()].as_ptr()) };
        match after {
            None => self.list.push_front(node),
            Some(after) => {
                debug_assert!(self.is_linked(after));
                // SAFETY: `after` is linked, so its pointer designates a
                // current element of this list.
                let mut cursor = unsafe {
                    self.list
                        .cursor_mut_from_ptr(self.keys[after.index()].as_ptr())
                };
                cursor.insert_after(node);
            }
        }
    }

    /// Unlink a node from the list. Callers must ensure it is linked.
    pub fn unlink(&mut self, inst: Inst) {
        debug_assert!(self.is_linked(inst));
        // SAFETY: the node is linked, so its pointer designates a current
        // element of this list.
        let mut cursor = unsafe {
            self.list
                .cursor_mut_from_ptr(self.keys[inst.index()].as_ptr())
        };
        cursor.remove();
    }

    pub fn first(&self) -> Option<Inst> {
        self.list.front().get().map(InsnNode::key)
    }

    pub fn last(&self) -> Option<Inst> {
        self.list.back().get().map(InsnNode::key)
    }

    /// The linked successor of a linked node.
    pub fn next(&self, inst: Inst) -> Option<Inst> {
        debug_assert!(self.is_linked(inst));
        // SAFETY: the node is linked, so its pointer designates a current
        // element of this list.
        let mut cursor = unsafe { self.list.cursor_from_ptr(self.keys[inst.index()].as_ptr()) };
        cursor.move_next();
        cursor.get().map(InsnNode::key)
    }

    /// The linked predecessor of a linked node.
    pub fn prev(&self, inst: Inst) -> Option<Inst> {
        debug_assert!(self.is_linked(inst));
        // SAFETY: as in `next`.
        let mut cursor = unsafe { self.list.cursor_from_ptr(self.keys[inst.index()].as_ptr()) };
        cursor.move_prev();
        cursor.get().map(InsnNode::key)
    }

    /// Iterate the linked instructions in list order.
    pub fn iter(&self) -> impl Iterator<Item = Inst> + '_ {
        self.list.iter().map(InsnNode::key)
    }
}
