use crate::config::TimingConfig;
use crate::pet::PetState;

/// Short-lived presentation flags driven by the controller's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cosmetics {
    pub blink_closed: bool,
    pub mouth_open: bool,
    pub chat_index: usize,
    pub eat_line_index: usize,
    pub show_guide_tip: bool,
}

impl Cosmetics {
    pub fn new(show_guide_tip: bool) -> Self {
        Self {
            blink_closed: false,
            mouth_open: false,
            chat_index: 0,
            eat_line_index: 0,
            show_guide_tip,
        }
    }

    /// Eyes and mouth back to neutral. Line indices and the tip survive.
    pub fn relax(&mut self) {
        self.blink_closed = false;
        self.mouth_open = false;
    }

    pub fn toggle_mouth(&mut self) {
        self.mouth_open = !self.mouth_open;
    }

    pub fn next_chat_line(&mut self, line_count: usize) {
        self.chat_index = (self.chat_index + 1) % line_count.max(1);
    }

    pub fn next_eat_line(&mut self, line_count: usize) {
        self.eat_line_index = (self.eat_line_index + 1) % line_count.max(1);
    }
}

/// Random gap until the next blink.
pub fn blink_delay(rng: &mut fastrand::Rng, timing: &TimingConfig) -> u64 {
    rng.u64(timing.blink_min_ms..=timing.blink_max_ms)
}

/// The home chat bubble shows only while idling at home with nothing to eat.
pub fn home_bubble_visible(state: PetState, has_grass: bool, near_home: bool) -> bool {
    state == PetState::Idle && !has_grass && near_home
}
