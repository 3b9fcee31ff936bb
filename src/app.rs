use std::sync::Arc;

use glam::Vec2;
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use pasture::config::PetConfig;
use pasture::guide::{FileGuideStore, GuideStore, MemoryGuideStore};
use pasture::input::{InputQueue, PetInput, PointerKind};
use pasture::pet::Companion;

/// Max accumulated time before we clamp (prevents spiral of death).
const MAX_ACCUMULATOR: f64 = 0.25;
/// How often to log frame stats (seconds).
const STATS_LOG_INTERVAL: f64 = 5.0;
/// The mouse is the only pointer winit reports without an id.
const MOUSE_POINTER_ID: u64 = 0;
/// Touch ids are offset so they never collide with the mouse.
const TOUCH_POINTER_BASE: u64 = 1;
const INITIAL_SIZE: (u32, u32) = (960, 600);
/// Home sits this far in from the bottom-right corner.
const HOME_INSET: Vec2 = Vec2::new(140.0, 96.0);

fn home_anchor(width: u32, height: u32) -> Vec2 {
    (Vec2::new(width as f32, height as f32) - HOME_INSET).max(Vec2::ZERO)
}

/// A mouse press is a grab only when it lands on a pet that will accept it.
/// Anything else is a press on the ground and plants on release.
fn grabs_pet(pet: &Companion, pos: Vec2) -> bool {
    pet.hit_test(pos) && pet.can_grab(PointerKind::Mouse)
}

// ---------------------------------------------------------------------------
// Frame timing
// ---------------------------------------------------------------------------

struct FrameStats {
    frame_count: u64,
    last_log_time: Instant,
    frame_time_sum: f64,
    frame_time_max: f64,
    frames_since_log: u32,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            frame_count: 0,
            last_log_time: Instant::now(),
            frame_time_sum: 0.0,
            frame_time_max: 0.0,
            frames_since_log: 0,
        }
    }

    fn record_frame(&mut self, dt: f64, pet: &Companion) {
        self.frame_count += 1;
        self.frames_since_log += 1;
        self.frame_time_sum += dt;
        self.frame_time_max = self.frame_time_max.max(dt);

        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed >= STATS_LOG_INTERVAL {
            let avg_ms = (self.frame_time_sum / self.frames_since_log as f64) * 1000.0;
            log::info!(
                "FPS: {:.0} | avg: {:.2}ms | max: {:.2}ms | ticks: {} | timers: {} | {} with {} patches",
                self.frames_since_log as f64 / elapsed,
                avg_ms,
                self.frame_time_max * 1000.0,
                pet.tick_count(),
                pet.pending_timers(),
                pet.state().label(),
                pet.pool().len(),
            );
            self.last_log_time = Instant::now();
            self.frame_time_sum = 0.0;
            self.frame_time_max = 0.0;
            self.frames_since_log = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

struct App {
    window: Option<Arc<Window>>,
    pet: Companion,
    inputs: InputQueue,

    // Clock
    last_frame_time: Option<Instant>,
    accumulator: f64,
    clock_ms: u64,

    frame_stats: FrameStats,

    // Pointer
    cursor: Vec2,
    press_on_ground: bool,
    reduced_motion: bool,
    title: String,
}

impl App {
    fn new(config: PetConfig) -> Self {
        let guide: Box<dyn GuideStore> =
            match FileGuideStore::in_data_dir(&config.interaction.guide_key) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    log::warn!("guide flag will not persist: {e}");
                    Box::new(MemoryGuideStore::default())
                }
            };
        let home = home_anchor(INITIAL_SIZE.0, INITIAL_SIZE.1);
        Self {
            window: None,
            pet: Companion::new(config, home, guide, fastrand::Rng::new()),
            inputs: InputQueue::new(),
            last_frame_time: None,
            accumulator: 0.0,
            clock_ms: 0,
            frame_stats: FrameStats::new(),
            cursor: Vec2::ZERO,
            press_on_ground: false,
            reduced_motion: false,
            title: String::new(),
        }
    }

    fn push(&mut self, input: PetInput) {
        self.inputs.push(self.clock_ms, input);
    }

    /// Turn real frame time into whole virtual milliseconds and run them.
    fn run_clock(&mut self, dt: f64) {
        self.accumulator = (self.accumulator + dt).min(MAX_ACCUMULATOR);

        let whole_ms = (self.accumulator * 1000.0).floor();
        self.accumulator -= whole_ms / 1000.0;
        self.clock_ms += whole_ms as u64;

        self.pet.run_frame(self.clock_ms, &mut self.inputs);
    }

    fn toggle_reduced_motion(&mut self) {
        self.reduced_motion = !self.reduced_motion;
        log::info!("reduced motion {}", if self.reduced_motion { "on" } else { "off" });
        self.pet.set_enabled(!self.reduced_motion);
    }

    fn present(&mut self) {
        let snap = self.pet.snapshot();
        let mut title = format!(
            "pasture | {} ({}) | grass {}/{}",
            snap.state.label(),
            snap.mood.label(),
            snap.patches.len(),
            self.pet.pool().max_patches(),
        );
        if snap.show_guide_tip {
            title.push_str(" | ");
            title.push_str(&self.pet.config().lines.guide);
        } else if snap.show_home_bubble {
            if let Some(line) = self.pet.config().lines.chat.get(snap.chat_index) {
                title.push_str(" | ");
                title.push_str(line);
            }
        }
        if title != self.title {
            if let Some(w) = &self.window {
                w.set_title(&title);
            }
            self.title = title;
        }
    }

    fn mouse_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if grabs_pet(&self.pet, self.cursor) {
                    self.push(PetInput::DragStart {
                        pointer_id: MOUSE_POINTER_ID,
                        pos: self.cursor,
                        kind: PointerKind::Mouse,
                    });
                } else {
                    self.press_on_ground = true;
                }
            }
            ElementState::Released => {
                if std::mem::take(&mut self.press_on_ground) {
                    self.push(PetInput::Plant { pos: self.cursor });
                } else {
                    self.push(PetInput::DragEnd {
                        pointer_id: MOUSE_POINTER_ID,
                    });
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("pasture")
            .with_inner_size(winit::dpi::PhysicalSize::new(INITIAL_SIZE.0, INITIAL_SIZE.1));

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.pet.set_home(home_anchor(size.width, size.height));
        log::info!("Window created: {}x{}", size.width, size.height);

        event_loop.set_control_flow(ControlFlow::Poll);
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.pet.set_home(home_anchor(new_size.width, new_size.height));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                self.push(PetInput::PointerMove { pos: self.cursor });
            }
            WindowEvent::CursorLeft { .. } => {
                self.press_on_ground = false;
                self.push(PetInput::DragEnd {
                    pointer_id: MOUSE_POINTER_ID,
                });
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.mouse_button(state),
            WindowEvent::Touch(touch) => {
                let pos = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => self.push(PetInput::DragStart {
                        pointer_id: TOUCH_POINTER_BASE + touch.id,
                        pos,
                        kind: PointerKind::Touch,
                    }),
                    TouchPhase::Moved => self.push(PetInput::PointerMove { pos }),
                    TouchPhase::Ended => self.push(PetInput::Plant { pos }),
                    TouchPhase::Cancelled => {}
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key.as_ref() {
                    Key::Named(NamedKey::Escape) => {
                        log::info!("ESC pressed, exiting");
                        event_loop.exit();
                    }
                    Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                        self.toggle_reduced_motion();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if let Some(last) = self.last_frame_time {
                    let dt = now.duration_since(last).as_secs_f64();
                    self.frame_stats.record_frame(dt, &self.pet);
                    self.run_clock(dt);
                }
                self.last_frame_time = Some(now);
                self.present();
            }
            _ => {}
        }
    }
}

/// Entry point: create event loop and run.
pub fn run(config: PetConfig) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
