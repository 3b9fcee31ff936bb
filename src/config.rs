//! Tunables for the companion. Every constant the behavior depends on lives
//! here so it can be overridden from a TOML file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetConfig {
    pub pool: PoolConfig,
    pub motion: MotionConfig,
    pub timing: TimingConfig,
    pub interaction: InteractionConfig,
    pub lines: LineConfig,
}

/// Grass pool bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Max patches alive at once; the oldest is evicted on overflow.
    pub max_patches: usize,
    /// Global cooldown between plants (ms).
    pub throttle_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_patches: crate::grass::DEFAULT_MAX_PATCHES,
            throttle_ms: crate::grass::DEFAULT_THROTTLE_MS,
        }
    }
}

/// Distances in pixels, speeds in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub arrival_threshold: f32,
    pub home_arrival_threshold: f32,
    pub start_speed: f32,
    pub max_speed: f32,
    pub accel_per_tick: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            arrival_threshold: 4.0,
            home_arrival_threshold: 8.0,
            start_speed: 0.8,
            max_speed: 6.2,
            accel_per_tick: 0.24,
        }
    }
}

/// All durations in milliseconds of virtual clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub grow_delay_ms: u64,
    pub eat_dwell_ms: u64,
    pub vanish_delay_ms: u64,
    pub happy_hop_ms: u64,
    pub wake_delay_ms: u64,
    pub return_home_delay_ms: u64,
    pub sleep_idle_delay_ms: u64,
    pub watchdog_ms: u64,
    pub blink_min_ms: u64,
    pub blink_max_ms: u64,
    pub blink_hold_ms: u64,
    pub mouth_toggle_ms: u64,
    pub eat_line_ms: u64,
    pub chat_rotate_ms: u64,
    pub guide_tip_ms: u64,
    pub drag_click_block_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            grow_delay_ms: 260,
            eat_dwell_ms: 2_250,
            vanish_delay_ms: 420,
            happy_hop_ms: 900,
            wake_delay_ms: 600,
            return_home_delay_ms: 10_000,
            sleep_idle_delay_ms: 45_000,
            watchdog_ms: 800,
            blink_min_ms: 1_800,
            blink_max_ms: 4_400,
            blink_hold_ms: 120,
            mouth_toggle_ms: 210,
            eat_line_ms: 920,
            chat_rotate_ms: 6_000,
            guide_tip_ms: 9_000,
            drag_click_block_ms: 360,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Pointer distance within which the pet watches the cursor.
    pub hover_radius: f32,
    /// Radius around the pet that counts as grabbing it.
    pub body_radius: f32,
    pub allow_drag: bool,
    /// Name of the persisted "guide tip already shown" flag.
    pub guide_key: String,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hover_radius: 132.0,
            body_radius: 28.0,
            allow_drag: true,
            guide_key: "pasture-guide-v2".to_string(),
        }
    }
}

/// Speech bubble line sets. The snapshot only carries indices into these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub chat: Vec<String>,
    pub eat: Vec<String>,
    pub guide: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        let owned = |lines: &[&str]| lines.iter().map(|s| s.to_string()).collect();
        Self {
            chat: owned(&[
                "Baa, I'm up on my cloud waiting for grass~",
                "Shall we fatten up the blog a little today?",
                "Tap the ground and I'll start munching!",
                "On cloud patrol, waiting for a grass signal.",
                "Baa~ don't leave me hungry too long.",
            ]),
            eat: owned(&["Yum~", "Delicious!", "Thanks for the meal~", "One more!"]),
            guide: "Click any empty spot to plant grass~".to_string(),
        }
    }
}

impl PetConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("loaded pet config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would stall or break the state machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.pool.max_patches == 0 {
            return Err(invalid("pool.max_patches", "must be at least 1"));
        }
        if self.timing.tick_ms == 0 {
            return Err(invalid("timing.tick_ms", "must be positive"));
        }
        if self.timing.watchdog_ms == 0 {
            return Err(invalid("timing.watchdog_ms", "must be positive"));
        }
        if self.timing.blink_min_ms > self.timing.blink_max_ms {
            return Err(invalid("timing.blink_min_ms", "exceeds blink_max_ms"));
        }
        let m = &self.motion;
        if !(m.start_speed > 0.0) {
            return Err(invalid("motion.start_speed", "must be positive"));
        }
        if m.max_speed < m.start_speed {
            return Err(invalid("motion.max_speed", "below start_speed"));
        }
        if m.accel_per_tick < 0.0 {
            return Err(invalid("motion.accel_per_tick", "must not be negative"));
        }
        if m.arrival_threshold < 0.0 || m.home_arrival_threshold < 0.0 {
            return Err(invalid("motion.arrival_threshold", "must not be negative"));
        }
        if self.lines.chat.is_empty() {
            return Err(invalid("lines.chat", "needs at least one line"));
        }
        if self.lines.eat.is_empty() {
            return Err(invalid("lines.eat", "needs at least one line"));
        }
        Ok(())
    }
}
