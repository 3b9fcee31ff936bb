use std::collections::VecDeque;

use glam::Vec2;

/// Where a pointer event came from. Touch never starts a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

/// The primitive signals the companion understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PetInput {
    /// Click or tap on empty ground.
    Plant { pos: Vec2 },
    PointerMove { pos: Vec2 },
    /// Pointer went down on the pet.
    DragStart {
        pointer_id: u64,
        pos: Vec2,
        kind: PointerKind,
    },
    DragMove { pos: Vec2 },
    /// Pointer up or cancel.
    DragEnd { pointer_id: u64 },
}

/// Inputs collected between frames, stamped with clock time on arrival.
/// Drained once per frame in arrival order.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<(u64, PetInput)>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at_ms: u64, input: PetInput) {
        self.events.push_back((at_ms, input));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (u64, PetInput)> + '_ {
        self.events.drain(..)
    }
}
