use glam::Vec2;

use crate::config::PetConfig;
use crate::grass::{Claimant, GrassPool, PatchId, PatchStage};
use crate::guide::{GuideStore, MemoryGuideStore};
use crate::input::{InputQueue, PetInput, PointerKind};
use crate::pet::cosmetics::{self, Cosmetics};
use crate::pet::motion::{self, DRAG_FACING_DEADZONE, WALK_FACING_DEADZONE};
use crate::pet::{AgentState, Facing, PetSnapshot, PetState};
use crate::schedule::{Due, Scheduler, TimerHandle};

/// Extra slack on the home threshold for the idle watchdog.
const WATCHDOG_HOME_SLACK: f32 = 4.0;
/// Extra slack on the home threshold for the chat bubble.
const BUBBLE_HOME_SLACK: f32 = 2.0;
/// Extra slack when the home anchor moves under an idle pet.
const REFLOW_HOME_SLACK: f32 = 6.0;
/// Look angle only updates when it changes by more than this (degrees).
const LOOK_ANGLE_HYSTERESIS: f32 = 0.4;

/// Every delayed action the companion schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PetTimer {
    Grow(PatchId),
    FinishEating(PatchId),
    Vanished(PatchId),
    HopDone,
    WakeDone,
    Blink,
    BlinkRelease,
    MouthToggle,
    EatLine,
    ChatRotate,
    DismissGuide,
    Watchdog,
}

#[derive(Debug, Clone, Copy)]
struct DragGrip {
    pointer_id: u64,
    /// Pet position minus pointer position, fixed at grab time.
    offset: Vec2,
}

/// The companion: behavior state machine, grass pool and clock in one place.
///
/// Input handlers apply immediately at the current clock time. Time only
/// moves through [`Companion::advance_to`] (or `advance` / `run_frame`),
/// which fires due timers and motion ticks in order.
pub struct Companion {
    config: PetConfig,
    pool: GrassPool,
    agent: AgentState,
    scheduler: Scheduler<PetTimer>,
    home: Vec2,
    speed: f32,
    /// Patch planted while asleep, walked to once awake.
    pending_target: Option<PatchId>,
    drag: Option<DragGrip>,
    drag_block_until: u64,
    last_interaction: u64,
    away_since: Option<u64>,
    cosmetics: Cosmetics,
    /// Timers owned by the current state; cancelled on every transition.
    phase_timers: Vec<TimerHandle>,
    chat_timer: Option<TimerHandle>,
    guide: Box<dyn GuideStore>,
    rng: fastrand::Rng,
    enabled: bool,
}

impl Companion {
    pub fn new(
        config: PetConfig,
        home: Vec2,
        guide: Box<dyn GuideStore>,
        rng: fastrand::Rng,
    ) -> Self {
        let show_guide_tip = !guide.was_shown();
        let mut companion = Self {
            pool: GrassPool::new(config.pool.max_patches, config.pool.throttle_ms),
            agent: AgentState::at_home(home),
            scheduler: Scheduler::new(config.timing.tick_ms),
            home,
            speed: 0.0,
            pending_target: None,
            drag: None,
            drag_block_until: 0,
            last_interaction: 0,
            away_since: None,
            cosmetics: Cosmetics::new(show_guide_tip),
            phase_timers: Vec::new(),
            chat_timer: None,
            guide,
            rng,
            enabled: false,
            config,
        };
        companion.start_session();
        companion
    }

    /// Default tuning, in-memory guide flag already set.
    pub fn with_defaults(home: Vec2) -> Self {
        Self::new(
            PetConfig::default(),
            home,
            Box::new(MemoryGuideStore::new(true)),
            fastrand::Rng::new(),
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    pub fn state(&self) -> PetState {
        self.agent.state
    }

    pub fn pool(&self) -> &GrassPool {
        &self.pool
    }

    pub fn config(&self) -> &PetConfig {
        &self.config
    }

    pub fn cosmetics(&self) -> &Cosmetics {
        &self.cosmetics
    }

    pub fn home(&self) -> Vec2 {
        self.home
    }

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn tick_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Whether `pos` lands on the pet's body.
    pub fn hit_test(&self, pos: Vec2) -> bool {
        pos.distance(self.agent.position) <= self.config.interaction.body_radius
    }

    fn near_home(&self, slack: f32) -> bool {
        self.agent.position.distance(self.home) <= self.config.motion.home_arrival_threshold + slack
    }

    pub fn show_home_bubble(&self) -> bool {
        self.enabled
            && cosmetics::home_bubble_visible(
                self.agent.state,
                !self.pool.is_empty(),
                self.near_home(BUBBLE_HOME_SLACK),
            )
    }

    pub fn snapshot(&self) -> PetSnapshot {
        PetSnapshot {
            state: self.agent.state,
            mood: self.agent.mood(),
            facing: self.agent.facing,
            position: self.agent.position,
            patches: self.pool.patches().copied().collect(),
            target_patch: self.agent.target_patch,
            eating_patch: self.agent.eating_patch,
            chat_index: self.cosmetics.chat_index,
            eat_line_index: self.cosmetics.eat_line_index,
            show_home_bubble: self.show_home_bubble(),
            show_guide_tip: self.cosmetics.show_guide_tip,
            blink_closed: self.cosmetics.blink_closed,
            mouth_open: self.cosmetics.mouth_open,
            look_angle_deg: self.agent.look_angle_deg,
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Turn the companion on or off. Off cancels every timer, clears the
    /// grass and parks the pet at home; on starts a fresh timer session.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        if enabled {
            self.start_session();
        } else {
            self.stop_session();
        }
    }

    fn start_session(&mut self) {
        self.enabled = true;
        self.last_interaction = self.now();
        self.away_since = None;
        self.scheduler.start_ticking();
        self.scheduler
            .every(self.config.timing.watchdog_ms, PetTimer::Watchdog);

        if self.cosmetics.show_guide_tip {
            if let Err(e) = self.guide.mark_shown() {
                log::warn!("could not persist guide flag: {e}");
            }
            self.scheduler
                .after(self.config.timing.guide_tip_ms, PetTimer::DismissGuide);
        }

        self.enter_phase(self.agent.state);
        self.refresh_bubble();
        log::info!("companion enabled at {:?}", self.home);
    }

    fn stop_session(&mut self) {
        self.scheduler.cancel_all();
        self.phase_timers.clear();
        self.chat_timer = None;
        self.pool.clear();
        self.drag = None;
        self.reset_to_home();
        self.enabled = false;
        log::info!("companion disabled, pet parked at home");
    }

    fn reset_to_home(&mut self) {
        self.agent = AgentState::at_home(self.home);
        self.speed = 0.0;
        self.pending_target = None;
        self.cosmetics.relax();
    }

    /// Move the home anchor (layout reflow). An idle pet already sitting
    /// next to the new anchor snaps onto it; nothing else changes.
    /// A disabled pet stays parked on the anchor.
    pub fn set_home(&mut self, anchor: Vec2) {
        self.home = anchor;
        if !self.enabled {
            self.reset_to_home();
            return;
        }
        if self.agent.state == PetState::Idle
            && self.near_home(REFLOW_HOME_SLACK)
        {
            self.agent.position = anchor;
        }
        self.refresh_bubble();
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Fire every timer and tick due up to `now`, in time order.
    pub fn advance_to(&mut self, now: u64) {
        while let Some(due) = self.scheduler.next_due(now) {
            match due {
                Due::Tick => self.tick(),
                Due::Timer(timer) => self.fire(timer),
            }
            self.refresh_bubble();
        }
    }

    pub fn advance(&mut self, dt_ms: u64) {
        self.advance_to(self.now() + dt_ms);
    }

    /// Apply queued inputs at their arrival times, then catch up to `now`.
    pub fn run_frame(&mut self, now: u64, inputs: &mut InputQueue) {
        for (at, input) in inputs.drain() {
            self.advance_to(at.min(now));
            self.dispatch(input);
        }
        self.advance_to(now);
    }

    pub fn dispatch(&mut self, input: PetInput) {
        match input {
            PetInput::Plant { pos } => {
                self.plant(pos);
            }
            PetInput::PointerMove { pos } => self.pointer_move(pos),
            PetInput::DragStart {
                pointer_id,
                pos,
                kind,
            } => {
                self.drag_start(pointer_id, pos, kind);
            }
            PetInput::DragMove { pos } => self.drag_move(pos),
            PetInput::DragEnd { pointer_id } => {
                self.drag_end(pointer_id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Input handlers
    // -----------------------------------------------------------------------

    fn note_interaction(&mut self) {
        self.last_interaction = self.now();
        self.away_since = None;
        self.cosmetics.show_guide_tip = false;
    }

    /// Plant grass at `pos`. Returns the new patch id, or `None` when
    /// disabled, throttled, or inside the post-drag click block.
    pub fn plant(&mut self, pos: Vec2) -> Option<PatchId> {
        if !self.enabled {
            return None;
        }
        let now = self.now();
        if now < self.drag_block_until {
            return None;
        }
        self.note_interaction();

        let planted = self.pool.plant(pos, now)?;
        let id = planted.patch.id;
        if let Some(evicted) = planted.evicted {
            if Some(evicted.id) == self.agent.target_patch
                || Some(evicted.id) == self.agent.eating_patch
            {
                log::debug!("evicted {} while the pet was after it", evicted.id);
            }
        }
        self.scheduler
            .after(self.config.timing.grow_delay_ms, PetTimer::Grow(id));

        match self.agent.state {
            PetState::Sleeping => {
                self.pending_target = Some(id);
                self.set_state(PetState::Waking);
            }
            PetState::Waking => self.pending_target = Some(id),
            PetState::Eating | PetState::Dragging | PetState::WalkingToGrass => {}
            PetState::Idle | PetState::HoverWatch | PetState::Happy | PetState::ReturningHome => {
                self.start_walking(Some(id));
            }
        }
        self.refresh_bubble();
        Some(id)
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        if !self.enabled {
            return;
        }
        if self.drag.is_some() {
            self.drag_move(pos);
            return;
        }

        match self.agent.state {
            PetState::Sleeping => {
                self.note_interaction();
                self.set_state(PetState::Waking);
            }
            PetState::Idle | PetState::HoverWatch => {
                let here = self.agent.position;
                if pos.distance(here) <= self.config.interaction.hover_radius {
                    self.set_state(PetState::HoverWatch);
                    let desired = motion::look_angle(here.x, pos.x);
                    if (self.agent.look_angle_deg - desired).abs() > LOOK_ANGLE_HYSTERESIS {
                        self.agent.look_angle_deg = desired;
                    }
                } else if self.agent.state == PetState::HoverWatch {
                    self.set_state(PetState::Idle);
                    self.agent.look_angle_deg = 0.0;
                }
            }
            _ => {}
        }
        self.refresh_bubble();
    }

    /// Whether a pointer of `kind` pressing on the pet right now would pick
    /// it up. Otherwise the press belongs to the ground.
    pub fn can_grab(&self, kind: PointerKind) -> bool {
        self.enabled
            && self.config.interaction.allow_drag
            && kind != PointerKind::Touch
            && self.drag.is_none()
            && self.agent.state.is_grabbable()
    }

    /// Pointer down on the pet. Returns whether a drag started.
    pub fn drag_start(&mut self, pointer_id: u64, pos: Vec2, kind: PointerKind) -> bool {
        if !self.can_grab(kind) {
            return false;
        }
        self.note_interaction();

        self.drag = Some(DragGrip {
            pointer_id,
            offset: self.agent.position - pos,
        });
        self.speed = 0.0;
        self.pending_target = None;
        self.agent.target_patch = None;
        self.agent.look_angle_deg = 0.0;
        self.set_state(PetState::Dragging);
        self.refresh_bubble();
        true
    }

    pub fn drag_move(&mut self, pos: Vec2) {
        let Some(grip) = self.drag else {
            return;
        };
        self.note_interaction();
        let next = pos + grip.offset;
        let dx = next.x - self.agent.position.x;
        self.agent.facing = motion::facing_for(dx, self.agent.facing, DRAG_FACING_DEADZONE);
        self.agent.position = next;
    }

    /// Pointer up or cancel. Ignored unless it matches the grabbing pointer.
    pub fn drag_end(&mut self, pointer_id: u64) -> bool {
        let Some(grip) = self.drag else {
            return false;
        };
        if grip.pointer_id != pointer_id {
            return false;
        }
        self.drag = None;
        self.speed = 0.0;
        self.drag_block_until = self.now() + self.config.timing.drag_click_block_ms;

        if !self.pool.is_empty() && self.start_walking(None) {
            self.refresh_bubble();
            return true;
        }
        self.set_state(PetState::ReturningHome);
        self.agent.target_patch = None;
        self.agent.look_angle_deg = 0.0;
        self.refresh_bubble();
        true
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn set_state(&mut self, next: PetState) {
        if self.agent.state == next {
            return;
        }
        log::debug!(
            "pet {} -> {} at {}ms",
            self.agent.state.label(),
            next.label(),
            self.now()
        );
        self.agent.state = next;
        self.enter_phase(next);
    }

    /// Cancel the previous state's timers and arm the ones `state` owns.
    fn enter_phase(&mut self, state: PetState) {
        for handle in self.phase_timers.drain(..) {
            self.scheduler.cancel(handle);
        }
        let timing = &self.config.timing;
        let (dwell, hop, wake, mouth, eat_line) = (
            timing.eat_dwell_ms,
            timing.happy_hop_ms,
            timing.wake_delay_ms,
            timing.mouth_toggle_ms,
            timing.eat_line_ms,
        );

        match state {
            PetState::Eating => {
                if let Some(id) = self.agent.eating_patch {
                    self.arm_phase(dwell, PetTimer::FinishEating(id));
                }
                let h = self.scheduler.every(mouth, PetTimer::MouthToggle);
                self.phase_timers.push(h);
                let h = self.scheduler.every(eat_line, PetTimer::EatLine);
                self.phase_timers.push(h);
            }
            PetState::Happy => self.arm_phase(hop, PetTimer::HopDone),
            PetState::Waking => self.arm_phase(wake, PetTimer::WakeDone),
            _ => {}
        }

        if state != PetState::Eating {
            self.cosmetics.mouth_open = false;
        }
        if state == PetState::Sleeping {
            self.cosmetics.blink_closed = true;
        } else {
            self.cosmetics.blink_closed = false;
            let delay = cosmetics::blink_delay(&mut self.rng, &self.config.timing);
            self.arm_phase(delay, PetTimer::Blink);
        }
    }

    fn arm_phase(&mut self, delay_ms: u64, timer: PetTimer) {
        let scheduler = &self.scheduler;
        self.phase_timers.retain(|h| scheduler.is_pending(*h));
        let handle = self.scheduler.after(delay_ms, timer);
        self.phase_timers.push(handle);
    }

    /// Head for `preferred` if it is still up for grabs, else the nearest
    /// available patch. Returns false when there is nothing to walk to.
    fn start_walking(&mut self, preferred: Option<PatchId>) -> bool {
        let here = self.agent.position;
        let target = preferred
            .and_then(|id| self.pool.find_by_id(id))
            .filter(|p| p.is_available())
            .or_else(|| {
                self.pool
                    .find_nearest_available(here, self.agent.eating_patch)
            })
            .copied();

        let Some(target) = target else {
            return false;
        };

        self.agent.facing = motion::facing_toward(here, target.pos);
        self.agent.target_patch = Some(target.id);
        self.agent.look_angle_deg = 0.0;
        self.speed = 0.0;
        self.set_state(PetState::WalkingToGrass);
        true
    }

    fn refresh_bubble(&mut self) {
        let visible = self.show_home_bubble();
        match (visible, self.chat_timer) {
            (true, None) => {
                let h = self
                    .scheduler
                    .every(self.config.timing.chat_rotate_ms, PetTimer::ChatRotate);
                self.chat_timer = Some(h);
            }
            (false, Some(h)) => {
                self.scheduler.cancel(h);
                self.chat_timer = None;
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Tick + timers
    // -----------------------------------------------------------------------

    fn tick(&mut self) {
        match self.agent.state {
            PetState::WalkingToGrass => self.walk_tick(),
            PetState::ReturningHome => self.home_tick(),
            _ => {}
        }
    }

    fn walk_tick(&mut self) {
        let here = self.agent.position;
        let current = self
            .agent
            .target_patch
            .and_then(|id| self.pool.find_by_id(id))
            .filter(|p| p.stage != PatchStage::Vanishing)
            .copied();

        let target = match current {
            Some(patch) => patch,
            None => match self
                .pool
                .find_nearest_available(here, self.agent.eating_patch)
                .copied()
            {
                Some(patch) => {
                    self.agent.target_patch = Some(patch.id);
                    patch
                }
                None => {
                    self.agent.target_patch = None;
                    self.speed = 0.0;
                    self.set_state(PetState::Idle);
                    self.agent.facing = Facing::Left;
                    return;
                }
            },
        };

        let dx = target.pos.x - here.x;
        self.agent.facing = motion::facing_for(dx, self.agent.facing, WALK_FACING_DEADZONE);

        let tuning = &self.config.motion;
        let stride =
            motion::step_toward(here, target.pos, tuning.arrival_threshold, &mut self.speed, tuning);
        self.agent.position = stride.position;
        if stride.arrived {
            self.pool.mark_stage(target.id, PatchStage::BeingEaten);
            self.pool.claim(target.id, Claimant::Agent);
            self.agent.eating_patch = Some(target.id);
            self.agent.look_angle_deg = 0.0;
            self.set_state(PetState::Eating);
        }
    }

    fn home_tick(&mut self) {
        self.agent.target_patch = None;
        let here = self.agent.position;
        let dx = self.home.x - here.x;
        self.agent.facing = motion::facing_for(dx, self.agent.facing, WALK_FACING_DEADZONE);

        let tuning = &self.config.motion;
        let stride = motion::step_toward(
            here,
            self.home,
            tuning.arrival_threshold,
            &mut self.speed,
            tuning,
        );
        self.agent.position = stride.position;
        if stride.arrived {
            self.set_state(PetState::Idle);
            self.agent.facing = Facing::Left;
            self.agent.look_angle_deg = 0.0;
        }
    }

    fn fire(&mut self, timer: PetTimer) {
        match timer {
            PetTimer::Grow(id) => {
                let sprout = self
                    .pool
                    .find_by_id(id)
                    .is_some_and(|p| p.stage == PatchStage::Sprout);
                if sprout {
                    self.pool.mark_stage(id, PatchStage::Grown);
                }
            }
            PetTimer::FinishEating(id) => {
                self.pool.mark_stage(id, PatchStage::Vanishing);
                self.arm_phase(self.config.timing.vanish_delay_ms, PetTimer::Vanished(id));
            }
            PetTimer::Vanished(id) => {
                self.pool.remove_by_id(id);
                self.agent.eating_patch = None;
                self.agent.target_patch = None;
                if !self.pool.is_empty() && self.start_walking(None) {
                    return;
                }
                self.set_state(PetState::Happy);
            }
            PetTimer::HopDone => {
                if !self.pool.is_empty() && self.start_walking(None) {
                    return;
                }
                self.set_state(PetState::Idle);
                self.agent.look_angle_deg = 0.0;
            }
            PetTimer::WakeDone => {
                let pending = self.pending_target.take();
                if pending.is_some() && self.start_walking(pending) {
                    return;
                }
                if !self.pool.is_empty() && self.start_walking(None) {
                    return;
                }
                self.set_state(PetState::Idle);
                self.agent.look_angle_deg = 0.0;
            }
            PetTimer::Blink => {
                self.cosmetics.blink_closed = true;
                if self.agent.state == PetState::Sleeping {
                    return;
                }
                self.arm_phase(self.config.timing.blink_hold_ms, PetTimer::BlinkRelease);
                let delay = cosmetics::blink_delay(&mut self.rng, &self.config.timing);
                self.arm_phase(delay, PetTimer::Blink);
            }
            PetTimer::BlinkRelease => {
                if self.agent.state != PetState::Sleeping {
                    self.cosmetics.blink_closed = false;
                }
            }
            PetTimer::MouthToggle => self.cosmetics.toggle_mouth(),
            PetTimer::EatLine => self.cosmetics.next_eat_line(self.config.lines.eat.len()),
            PetTimer::ChatRotate => self.cosmetics.next_chat_line(self.config.lines.chat.len()),
            PetTimer::DismissGuide => self.cosmetics.show_guide_tip = false,
            PetTimer::Watchdog => self.watchdog(),
        }
    }

    /// Periodic idle check: wander home when stranded, nap when ignored.
    fn watchdog(&mut self) {
        let now = self.now();
        let state = self.agent.state;
        let has_grass = !self.pool.is_empty();
        let near_home = self.near_home(WATCHDOG_HOME_SLACK);

        if !has_grass && state.is_resting() && !near_home {
            let away_since = self.away_since;
            match away_since {
                None => self.away_since = Some(now),
                Some(since) if now - since >= self.config.timing.return_home_delay_ms => {
                    self.agent.facing = motion::facing_toward(self.agent.position, self.home);
                    self.set_state(PetState::ReturningHome);
                    self.away_since = None;
                }
                Some(_) => {}
            }
        } else {
            self.away_since = None;
        }

        let idle_for = now.saturating_sub(self.last_interaction);
        if !has_grass
            && state.is_resting()
            && near_home
            && idle_for >= self.config.timing.sleep_idle_delay_ms
        {
            self.set_state(PetState::Sleeping);
            self.agent.look_angle_deg = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::FileGuideStore;
    use crate::pet::Mood;

    fn companion_with(config: PetConfig) -> Companion {
        Companion::new(
            config,
            Vec2::ZERO,
            Box::new(MemoryGuideStore::new(true)),
            fastrand::Rng::with_seed(11),
        )
    }

    fn companion() -> Companion {
        companion_with(PetConfig::default())
    }

    /// Step the clock 1ms at a time until `done` holds or `max_ms` passes.
    fn advance_until(c: &mut Companion, max_ms: u64, mut done: impl FnMut(&Companion) -> bool) -> bool {
        for _ in 0..max_ms {
            if done(c) {
                return true;
            }
            c.advance(1);
        }
        done(c)
    }

    fn put_to_sleep(c: &mut Companion) {
        let delay = c.config().timing.sleep_idle_delay_ms;
        assert!(advance_until(c, delay + 2_000, |c| c.state() == PetState::Sleeping));
    }

    #[test]
    fn starts_idle_at_home_facing_left() {
        let c = Companion::with_defaults(Vec2::ZERO);
        assert_eq!(c.home(), Vec2::ZERO);
        let snap = c.snapshot();
        assert_eq!(snap.state, PetState::Idle);
        assert_eq!(snap.mood, Mood::Neutral);
        assert_eq!(snap.facing, Facing::Left);
        assert_eq!(snap.position, Vec2::ZERO);
        assert!(snap.patches.is_empty());
        assert!(snap.show_home_bubble);
    }

    #[test]
    fn hit_test_uses_body_radius() {
        let c = companion();
        assert!(c.hit_test(Vec2::new(20.0, 19.0)));
        assert!(!c.hit_test(Vec2::new(29.0, 0.0)));
    }

    #[test]
    fn plant_walk_eat_hop_then_idle_on_the_spot() {
        let mut c = companion();
        let id = c.plant(Vec2::new(100.0, 0.0)).expect("planted");
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(id));
        assert_eq!(c.agent().facing, Facing::Right);

        assert!(advance_until(&mut c, 2_000, |c| c.state() == PetState::Eating));
        assert_eq!(c.agent().position, Vec2::new(100.0, 0.0));
        assert_eq!(c.agent().eating_patch, Some(id));
        let patch = *c.pool().find_by_id(id).unwrap();
        assert_eq!(patch.stage, PatchStage::BeingEaten);
        assert_eq!(patch.claimed_by, Some(Claimant::Agent));

        assert!(advance_until(&mut c, 2_300, |c| {
            c.pool().find_by_id(id).is_some_and(|p| p.stage == PatchStage::Vanishing)
        }));
        assert_eq!(c.state(), PetState::Eating);

        assert!(advance_until(&mut c, 500, |c| c.state() == PetState::Happy));
        assert!(c.pool().is_empty());
        assert_eq!(c.agent().eating_patch, None);

        assert!(advance_until(&mut c, 1_000, |c| c.state() == PetState::Idle));
        assert_eq!(c.agent().position, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn mood_never_lags_state() {
        let mut c = companion();
        c.plant(Vec2::new(60.0, 20.0));
        for _ in 0..5_000 {
            c.advance(1);
            let snap = c.snapshot();
            assert_eq!(snap.mood, snap.state.mood());
        }
    }

    #[test]
    fn eating_keeps_going_then_retargets_remaining_grass() {
        let mut c = companion();
        let first = c.plant(Vec2::new(3.0, 0.0)).unwrap();
        assert!(advance_until(&mut c, 100, |c| c.state() == PetState::Eating));

        c.advance(300);
        let second = c.plant(Vec2::new(-80.0, 0.0)).expect("patch still created");
        assert_eq!(c.state(), PetState::Eating);
        assert_eq!(c.agent().eating_patch, Some(first));
        assert_eq!(c.pool().len(), 2);

        assert!(advance_until(&mut c, 3_000, |c| c.agent().eating_patch.is_none()));
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(second));
        assert_eq!(c.agent().facing, Facing::Left);
    }

    #[test]
    fn planting_during_happy_hop_walks_again() {
        let mut c = companion();
        c.plant(Vec2::new(2.0, 0.0));
        assert!(advance_until(&mut c, 4_000, |c| c.state() == PetState::Happy));
        let next = c.plant(Vec2::new(50.0, 0.0)).unwrap();
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(next));
    }

    #[test]
    fn plants_while_walking_keep_the_current_target() {
        let mut c = companion();
        let first = c.plant(Vec2::new(300.0, 0.0)).unwrap();
        c.advance(250);
        c.plant(Vec2::new(-10.0, 0.0)).unwrap();
        assert_eq!(c.agent().target_patch, Some(first));
    }

    #[test]
    fn pointer_wakes_sleeper_and_latest_plant_wins() {
        let mut c = companion();
        put_to_sleep(&mut c);
        assert_eq!(c.snapshot().mood, Mood::Sleepy);

        c.pointer_move(Vec2::new(900.0, 900.0));
        assert_eq!(c.state(), PetState::Waking);

        let stale = c.plant(Vec2::new(40.0, 0.0)).unwrap();
        c.advance(250);
        let fresh = c.plant(Vec2::new(-120.0, 30.0)).unwrap();
        assert_eq!(c.state(), PetState::Waking);

        assert!(advance_until(&mut c, 1_000, |c| c.state() != PetState::Waking));
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(fresh));
        assert_ne!(c.agent().target_patch, Some(stale));
    }

    #[test]
    fn plant_wakes_sleeper() {
        let mut c = companion();
        put_to_sleep(&mut c);
        let id = c.plant(Vec2::new(30.0, 0.0)).unwrap();
        assert_eq!(c.state(), PetState::Waking);
        assert!(advance_until(&mut c, 1_000, |c| c.state() == PetState::WalkingToGrass));
        assert_eq!(c.agent().target_patch, Some(id));
    }

    #[test]
    fn waking_with_nothing_to_eat_goes_idle() {
        let mut c = companion();
        put_to_sleep(&mut c);
        c.pointer_move(Vec2::new(5.0, 5.0));
        assert!(advance_until(&mut c, 1_000, |c| c.state() != PetState::Waking));
        assert_eq!(c.state(), PetState::Idle);
    }

    #[test]
    fn drag_is_ignored_while_eating() {
        let mut c = companion();
        c.plant(Vec2::new(2.0, 0.0));
        assert!(advance_until(&mut c, 100, |c| c.state() == PetState::Eating));
        let pos = c.agent().position;
        assert!(!c.drag_start(1, pos, PointerKind::Mouse));
        assert_eq!(c.state(), PetState::Eating);
        assert!(!c.is_dragging());
    }

    #[test]
    fn drag_follows_pointer_with_fixed_offset_then_returns_home() {
        let mut c = companion();
        assert!(c.drag_start(7, Vec2::new(5.0, 5.0), PointerKind::Mouse));
        assert_eq!(c.state(), PetState::Dragging);
        assert_eq!(c.snapshot().mood, Mood::Excited);

        c.drag_move(Vec2::new(105.0, 5.0));
        assert_eq!(c.agent().position, Vec2::new(100.0, 0.0));
        assert_eq!(c.agent().facing, Facing::Right);

        c.pointer_move(Vec2::new(205.0, 45.0));
        assert_eq!(c.agent().position, Vec2::new(200.0, 40.0));

        assert!(!c.drag_end(8));
        assert!(c.is_dragging());
        assert!(c.drag_end(7));
        assert_eq!(c.state(), PetState::ReturningHome);

        assert!(advance_until(&mut c, 3_000, |c| c.state() == PetState::Idle));
        assert_eq!(c.agent().position, Vec2::ZERO);
        assert_eq!(c.agent().facing, Facing::Left);
    }

    #[test]
    fn drag_end_with_grass_heads_for_it() {
        let mut c = companion();
        assert!(c.drag_start(1, Vec2::ZERO, PointerKind::Mouse));
        let id = c.plant(Vec2::new(300.0, 0.0)).expect("patch created while dragging");
        assert_eq!(c.state(), PetState::Dragging);
        assert!(c.drag_end(1));
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(id));
    }

    #[test]
    fn sleeping_pet_can_be_picked_up() {
        let mut c = companion();
        put_to_sleep(&mut c);
        assert!(c.drag_start(3, Vec2::ZERO, PointerKind::Pen));
        assert_eq!(c.state(), PetState::Dragging);
        assert!(!c.snapshot().blink_closed);
    }

    #[test]
    fn touch_and_disallowed_drags_are_ignored() {
        let mut c = companion();
        assert!(!c.drag_start(1, Vec2::ZERO, PointerKind::Touch));
        assert_eq!(c.state(), PetState::Idle);

        let mut config = PetConfig::default();
        config.interaction.allow_drag = false;
        let mut c = companion_with(config);
        assert!(!c.drag_start(1, Vec2::ZERO, PointerKind::Mouse));
        assert_eq!(c.state(), PetState::Idle);
    }

    #[test]
    fn clicks_are_swallowed_right_after_a_drag() {
        let mut c = companion();
        c.drag_start(1, Vec2::ZERO, PointerKind::Mouse);
        c.drag_move(Vec2::new(50.0, 0.0));
        c.drag_end(1);

        c.advance(100);
        assert!(c.plant(Vec2::new(10.0, 10.0)).is_none());
        assert!(c.pool().is_empty());

        c.advance(300);
        assert!(c.plant(Vec2::new(10.0, 10.0)).is_some());
    }

    #[test]
    fn hover_watch_tracks_pointer_and_lets_go() {
        let mut c = companion();
        c.pointer_move(Vec2::new(45.0, 10.0));
        assert_eq!(c.state(), PetState::HoverWatch);
        assert_eq!(c.agent().look_angle_deg, 5.0);

        c.pointer_move(Vec2::new(46.0, 10.0));
        assert_eq!(c.agent().look_angle_deg, 5.0, "sub-threshold change ignored");

        c.pointer_move(Vec2::new(-130.0, 0.0));
        assert_eq!(c.agent().look_angle_deg, -14.0);

        c.pointer_move(Vec2::new(400.0, 400.0));
        assert_eq!(c.state(), PetState::Idle);
        assert_eq!(c.agent().look_angle_deg, 0.0);
    }

    #[test]
    fn stranded_idle_pet_walks_home_after_delay() {
        let mut c = companion();
        c.plant(Vec2::new(100.0, 0.0));
        assert!(advance_until(&mut c, 6_000, |c| c.state() == PetState::Idle));
        let idle_at = c.now();

        assert!(advance_until(&mut c, 12_000, |c| c.state() == PetState::ReturningHome));
        assert!(c.now() - idle_at >= 10_000);
        assert_eq!(c.agent().facing, Facing::Left);

        assert!(advance_until(&mut c, 3_000, |c| c.state() == PetState::Idle));
        assert_eq!(c.agent().position, Vec2::ZERO);
        assert!(c.snapshot().show_home_bubble);
    }

    #[test]
    fn ignored_pet_naps_with_eyes_shut() {
        let mut c = companion();
        c.advance(44_000);
        assert_eq!(c.state(), PetState::Idle);
        put_to_sleep(&mut c);
        assert!(c.now() >= 45_000);
        assert!(c.snapshot().blink_closed);

        c.advance(20_000);
        assert_eq!(c.state(), PetState::Sleeping);
        assert!(c.snapshot().blink_closed);
    }

    #[test]
    fn awake_pet_blinks_briefly() {
        let mut c = companion();
        assert!(advance_until(&mut c, 4_500, |c| c.snapshot().blink_closed));
        let closed_at = c.now();
        assert!(advance_until(&mut c, 200, |c| !c.snapshot().blink_closed));
        assert!(c.now() - closed_at <= 120);
    }

    #[test]
    fn mouth_and_eat_lines_only_move_while_eating() {
        let mut c = companion();
        c.advance(1_000);
        assert!(!c.snapshot().mouth_open);
        assert_eq!(c.snapshot().eat_line_index, 0);

        c.plant(Vec2::new(2.0, 0.0));
        assert!(advance_until(&mut c, 100, |c| c.state() == PetState::Eating));
        assert!(advance_until(&mut c, 250, |c| c.snapshot().mouth_open));
        c.advance(1_000);
        assert!(c.snapshot().eat_line_index >= 1);

        assert!(advance_until(&mut c, 3_000, |c| c.state() == PetState::Happy));
        assert!(!c.snapshot().mouth_open);
        let line = c.snapshot().eat_line_index;
        c.advance(2_000);
        assert_eq!(c.snapshot().eat_line_index, line);
    }

    #[test]
    fn chat_rotates_only_while_bubble_is_up() {
        let mut c = companion();
        c.advance(6_000);
        assert_eq!(c.snapshot().chat_index, 1);

        c.plant(Vec2::new(200.0, 0.0));
        assert!(!c.snapshot().show_home_bubble);
        c.advance(7_000);
        assert_eq!(c.snapshot().chat_index, 1);
    }

    #[test]
    fn early_bite_is_not_regrown() {
        let mut c = companion();
        let id = c.plant(Vec2::new(1.0, 1.0)).unwrap();
        assert!(advance_until(&mut c, 50, |c| c.state() == PetState::Eating));
        c.advance(400);
        assert_eq!(c.pool().find_by_id(id).unwrap().stage, PatchStage::BeingEaten);
    }

    #[test]
    fn untouched_sprout_grows() {
        let mut c = companion();
        let id = c.plant(Vec2::new(600.0, 0.0)).unwrap();
        c.advance(259);
        assert_eq!(c.pool().find_by_id(id).unwrap().stage, PatchStage::Sprout);
        c.advance(1);
        assert_eq!(c.pool().find_by_id(id).unwrap().stage, PatchStage::Grown);
    }

    #[test]
    fn evicted_walk_target_is_replaced_on_next_tick() {
        let mut config = PetConfig::default();
        config.pool.max_patches = 2;
        config.pool.throttle_ms = 0;
        let mut c = companion_with(config);

        let a = c.plant(Vec2::new(500.0, 0.0)).unwrap();
        c.plant(Vec2::new(-500.0, 0.0)).unwrap();
        let near = c.plant(Vec2::new(0.0, 300.0)).unwrap();
        assert!(c.pool().find_by_id(a).is_none());
        assert_eq!(c.agent().target_patch, Some(a));

        c.advance(16);
        assert_eq!(c.agent().target_patch, Some(near));
        assert_eq!(c.state(), PetState::WalkingToGrass);
    }

    #[test]
    fn evicted_meal_still_finishes_and_moves_on() {
        let mut config = PetConfig::default();
        config.pool.max_patches = 1;
        let mut c = companion_with(config);

        c.plant(Vec2::new(2.0, 0.0)).unwrap();
        assert!(advance_until(&mut c, 100, |c| c.state() == PetState::Eating));
        c.advance(300);
        let next = c.plant(Vec2::new(90.0, 0.0)).unwrap();
        assert_eq!(c.pool().len(), 1);
        assert_eq!(c.state(), PetState::Eating);

        assert!(advance_until(&mut c, 3_000, |c| c.state() != PetState::Eating));
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(next));
        assert_eq!(c.agent().eating_patch, None);
    }

    #[test]
    fn disable_resets_and_reenable_has_no_stale_timers() {
        let mut c = companion();
        c.plant(Vec2::new(200.0, 0.0));
        c.advance(300);
        c.plant(Vec2::new(-200.0, 0.0));

        c.set_enabled(false);
        assert!(!c.is_enabled());
        assert!(c.pool().is_empty());
        assert_eq!(c.pending_timers(), 0);
        assert_eq!(c.agent(), &AgentState::at_home(Vec2::ZERO));
        assert!(c.plant(Vec2::new(10.0, 0.0)).is_none());

        let ticks = c.tick_count();
        c.advance(5_000);
        assert_eq!(c.tick_count(), ticks);
        assert_eq!(c.state(), PetState::Idle);

        c.set_enabled(true);
        c.advance(5_000);
        assert_eq!(c.state(), PetState::Idle);
        assert_eq!(c.agent().position, Vec2::ZERO);
        assert!(c.pool().is_empty());
        assert!(c.tick_count() > ticks);
    }

    #[test]
    fn disabled_pet_follows_moved_home() {
        let mut c = companion();
        c.set_enabled(false);
        let anchor = Vec2::new(500.0, 500.0);
        c.set_home(anchor);
        assert_eq!(c.agent().position, anchor);

        c.set_enabled(true);
        assert_eq!(c.agent().position, anchor);
        assert!(c.snapshot().show_home_bubble);

        c.advance(11_000);
        assert_eq!(c.state(), PetState::Idle);
        assert_eq!(c.agent().position, anchor);
    }

    #[test]
    fn grab_check_matches_drag_start() {
        let mut c = companion();
        assert!(c.can_grab(PointerKind::Mouse));
        assert!(!c.can_grab(PointerKind::Touch));

        c.plant(Vec2::new(2.0, 0.0));
        assert!(advance_until(&mut c, 100, |c| c.state() == PetState::Eating));
        assert!(!c.can_grab(PointerKind::Mouse));
        assert!(!c.drag_start(1, Vec2::ZERO, PointerKind::Mouse));

        let mut config = PetConfig::default();
        config.interaction.allow_drag = false;
        let c = companion_with(config);
        assert!(!c.can_grab(PointerKind::Mouse));

        let mut c = companion();
        c.set_enabled(false);
        assert!(!c.can_grab(PointerKind::Mouse));
    }

    #[test]
    fn returning_home_arrives_on_the_tight_threshold() {
        let mut c = companion();
        c.drag_start(1, Vec2::ZERO, PointerKind::Mouse);
        c.drag_move(Vec2::new(6.0, 0.0));
        c.drag_end(1);
        assert_eq!(c.state(), PetState::ReturningHome);

        c.advance(16);
        assert_eq!(c.state(), PetState::ReturningHome);
        assert!(c.agent().position.x < 6.0);
        assert!(advance_until(&mut c, 500, |c| c.state() == PetState::Idle));
        assert_eq!(c.agent().position, Vec2::ZERO);
    }

    #[test]
    fn plant_redirects_pet_heading_home() {
        let mut c = companion();
        c.drag_start(1, Vec2::ZERO, PointerKind::Mouse);
        c.drag_move(Vec2::new(300.0, 0.0));
        c.drag_end(1);
        assert_eq!(c.state(), PetState::ReturningHome);

        c.advance(400);
        let id = c.plant(Vec2::new(400.0, 0.0)).unwrap();
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert_eq!(c.agent().target_patch, Some(id));
        assert_eq!(c.agent().facing, Facing::Right);
    }

    #[test]
    fn hovered_pet_can_be_picked_up() {
        let mut c = companion();
        c.pointer_move(Vec2::new(60.0, 0.0));
        assert_eq!(c.state(), PetState::HoverWatch);
        assert!(c.drag_start(1, Vec2::new(10.0, 0.0), PointerKind::Mouse));
        assert_eq!(c.state(), PetState::Dragging);
        assert_eq!(c.agent().look_angle_deg, 0.0);
    }

    #[test]
    fn pet_heading_home_can_be_picked_up() {
        let mut c = companion();
        c.drag_start(1, Vec2::ZERO, PointerKind::Mouse);
        c.drag_move(Vec2::new(300.0, 0.0));
        c.drag_end(1);
        c.advance(100);
        assert_eq!(c.state(), PetState::ReturningHome);

        let here = c.agent().position;
        assert!(c.drag_start(2, here, PointerKind::Pen));
        assert_eq!(c.state(), PetState::Dragging);
        c.advance(500);
        assert_eq!(c.agent().position, here);
    }

    #[test]
    fn guide_tip_shows_once_and_dismisses_itself() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGuideStore::new(dir.path(), "guide");
        let mut c = Companion::new(
            PetConfig::default(),
            Vec2::ZERO,
            Box::new(store),
            fastrand::Rng::with_seed(3),
        );
        assert!(c.snapshot().show_guide_tip);
        assert!(FileGuideStore::new(dir.path(), "guide").was_shown());

        c.advance(8_999);
        assert!(c.snapshot().show_guide_tip);
        c.advance(1);
        assert!(!c.snapshot().show_guide_tip);

        let again = Companion::new(
            PetConfig::default(),
            Vec2::ZERO,
            Box::new(FileGuideStore::new(dir.path(), "guide")),
            fastrand::Rng::with_seed(3),
        );
        assert!(!again.snapshot().show_guide_tip);
    }

    #[test]
    fn interaction_dismisses_guide_tip() {
        let mut c = Companion::new(
            PetConfig::default(),
            Vec2::ZERO,
            Box::new(MemoryGuideStore::default()),
            fastrand::Rng::with_seed(5),
        );
        assert!(c.snapshot().show_guide_tip);
        c.plant(Vec2::new(50.0, 50.0));
        assert!(!c.snapshot().show_guide_tip);
    }

    #[test]
    fn home_reflow_snaps_only_a_nearby_idle_pet() {
        let mut c = companion();
        c.set_home(Vec2::new(3.0, 4.0));
        assert_eq!(c.agent().position, Vec2::new(3.0, 4.0));

        c.set_home(Vec2::new(500.0, 500.0));
        assert_eq!(c.agent().position, Vec2::new(3.0, 4.0));
        assert_eq!(c.state(), PetState::Idle);
        assert!(!c.snapshot().show_home_bubble);
    }

    #[test]
    fn queued_inputs_apply_in_arrival_order() {
        let mut c = companion();
        let mut queue = InputQueue::new();
        queue.push(10, PetInput::Plant { pos: Vec2::new(300.0, 0.0) });
        queue.push(50, PetInput::Plant { pos: Vec2::new(-80.0, 0.0) });
        queue.push(400, PetInput::Plant { pos: Vec2::new(0.0, 80.0) });

        c.run_frame(500, &mut queue);
        assert!(queue.is_empty());
        assert_eq!(c.now(), 500);
        // Second plant fell inside the 200ms throttle window.
        assert_eq!(c.pool().len(), 2);
        assert_eq!(c.state(), PetState::WalkingToGrass);
        assert!(c.agent().position.x > 0.0);
    }

    #[test]
    fn every_transient_state_exits() {
        let mut c = companion();
        c.plant(Vec2::new(30.0, 0.0));
        let mut seen = Vec::new();
        for _ in 0..20_000 {
            let s = c.state();
            if seen.last() != Some(&s) {
                seen.push(s);
            }
            c.advance(1);
        }
        assert_eq!(
            &seen[..4],
            &[
                PetState::WalkingToGrass,
                PetState::Eating,
                PetState::Happy,
                PetState::Idle
            ]
        );
        assert!(!matches!(
            c.state(),
            PetState::Eating | PetState::Happy | PetState::Waking | PetState::Dragging
        ));
    }
}
