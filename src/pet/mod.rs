pub mod cosmetics;
pub mod machine;
pub mod motion;

use glam::Vec2;

use crate::grass::{Patch, PatchId};

pub use machine::Companion;

/// Exactly one of these is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PetState {
    Idle,
    HoverWatch,
    WalkingToGrass,
    Eating,
    Happy,
    Sleeping,
    Waking,
    Dragging,
    ReturningHome,
}

impl PetState {
    pub const ALL: [PetState; 9] = [
        Self::Idle,
        Self::HoverWatch,
        Self::WalkingToGrass,
        Self::Eating,
        Self::Happy,
        Self::Sleeping,
        Self::Waking,
        Self::Dragging,
        Self::ReturningHome,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::HoverWatch => "hover_watch",
            Self::WalkingToGrass => "walking_to_grass",
            Self::Eating => "eating",
            Self::Happy => "happy",
            Self::Sleeping => "sleeping",
            Self::Waking => "waking",
            Self::Dragging => "dragging",
            Self::ReturningHome => "returning_home",
        }
    }

    pub fn mood(self) -> Mood {
        match self {
            Self::WalkingToGrass | Self::Eating => Mood::Hungry,
            Self::Happy | Self::Dragging => Mood::Excited,
            Self::Sleeping | Self::Waking => Mood::Sleepy,
            Self::Idle | Self::HoverWatch | Self::ReturningHome => Mood::Neutral,
        }
    }

    /// Idle-ish states that watch the cursor and run the idle watchdog.
    pub fn is_resting(self) -> bool {
        matches!(self, Self::Idle | Self::HoverWatch)
    }

    /// States a pointer-down on the pet may turn into a drag.
    pub fn is_grabbable(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::HoverWatch | Self::Sleeping | Self::ReturningHome
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    Neutral,
    Hungry,
    Excited,
    Sleepy,
}

impl Mood {
    pub fn label(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Hungry => "hungry",
            Self::Excited => "excited",
            Self::Sleepy => "sleepy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Left,
    Right,
}

/// The authoritative agent record. Only the controller writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    pub state: PetState,
    pub facing: Facing,
    pub position: Vec2,
    pub target_patch: Option<PatchId>,
    pub eating_patch: Option<PatchId>,
    pub look_angle_deg: f32,
}

impl AgentState {
    pub fn at_home(home: Vec2) -> Self {
        Self {
            state: PetState::Idle,
            facing: Facing::Left,
            position: home,
            target_patch: None,
            eating_patch: None,
            look_angle_deg: 0.0,
        }
    }

    /// Derived, never stored.
    pub fn mood(&self) -> Mood {
        self.state.mood()
    }
}

/// Read-only view handed to presentation once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PetSnapshot {
    pub state: PetState,
    pub mood: Mood,
    pub facing: Facing,
    pub position: Vec2,
    pub patches: Vec<Patch>,
    pub target_patch: Option<PatchId>,
    pub eating_patch: Option<PatchId>,
    pub chat_index: usize,
    pub eat_line_index: usize,
    pub show_home_bubble: bool,
    pub show_guide_tip: bool,
    pub blink_closed: bool,
    pub mouth_open: bool,
    pub look_angle_deg: f32,
}
