use std::collections::VecDeque;
use std::fmt;

use glam::Vec2;

/// Stable handle for a planted patch. Ids grow with insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(pub u64);

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch#{}", self.0)
    }
}

/// Lifecycle phase of a patch. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PatchStage {
    Sprout,
    Grown,
    BeingEaten,
    Vanishing,
}

impl PatchStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sprout => "sprout",
            Self::Grown => "grown",
            Self::BeingEaten => "being_eaten",
            Self::Vanishing => "vanishing",
        }
    }
}

/// Who holds the reservation on a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claimant {
    Agent,
}

/// A plantable resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Patch {
    pub id: PatchId,
    pub pos: Vec2,
    /// Virtual clock time (ms) of planting.
    pub created_at: u64,
    pub stage: PatchStage,
    pub claimed_by: Option<Claimant>,
}

impl Patch {
    /// Eligible as a new walk target.
    pub fn is_available(&self) -> bool {
        self.stage != PatchStage::Vanishing && self.claimed_by.is_none()
    }
}

/// Result of a successful plant.
#[derive(Debug, Clone, Copy)]
pub struct Planted {
    pub patch: Patch,
    /// Oldest patch pushed out because the pool overflowed.
    pub evicted: Option<Patch>,
}

/// Max patches alive at once.
pub const DEFAULT_MAX_PATCHES: usize = 10;
/// Global cooldown between plants in milliseconds.
pub const DEFAULT_THROTTLE_MS: u64 = 200;

/// Bounded FIFO of grass patches.
///
/// Patches live in insertion order; when the pool overflows the front entry
/// is evicted regardless of stage or claim. Because ids are handed out in
/// insertion order the ring stays sorted by id, so lookups are binary searches.
pub struct GrassPool {
    patches: VecDeque<Patch>,
    max_patches: usize,
    throttle_ms: u64,
    last_planted_at: Option<u64>,
    next_id: u64,
}

impl GrassPool {
    pub fn new(max_patches: usize, throttle_ms: u64) -> Self {
        let max_patches = max_patches.max(1);
        Self {
            patches: VecDeque::with_capacity(max_patches + 1),
            max_patches,
            throttle_ms,
            last_planted_at: None,
            next_id: 1,
        }
    }

    pub fn max_patches(&self) -> usize {
        self.max_patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Iterate from oldest to newest.
    pub fn patches(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }

    /// Whether the global cooldown has elapsed at `now`.
    pub fn can_plant(&self, now: u64) -> bool {
        match self.last_planted_at {
            Some(last) => now.saturating_sub(last) >= self.throttle_ms,
            None => true,
        }
    }

    /// Plant a sprout at `pos`. Returns `None` while throttled.
    pub fn plant(&mut self, pos: Vec2, now: u64) -> Option<Planted> {
        if !self.can_plant(now) {
            return None;
        }
        self.last_planted_at = Some(now);

        let patch = Patch {
            id: PatchId(self.next_id),
            pos,
            created_at: now,
            stage: PatchStage::Sprout,
            claimed_by: None,
        };
        self.next_id += 1;
        self.patches.push_back(patch);

        let evicted = if self.patches.len() > self.max_patches {
            self.patches.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            log::debug!("pool full, evicted {} ({})", old.id, old.stage.label());
        }

        Some(Planted { patch, evicted })
    }

    fn index_of(&self, id: PatchId) -> Option<usize> {
        self.patches.binary_search_by_key(&id, |p| p.id).ok()
    }

    pub fn find_by_id(&self, id: PatchId) -> Option<&Patch> {
        self.index_of(id).map(|i| &self.patches[i])
    }

    /// Nearest unclaimed, non-vanishing patch. Ties go to the oldest patch.
    pub fn find_nearest_available(&self, from: Vec2, exclude: Option<PatchId>) -> Option<&Patch> {
        let mut best: Option<&Patch> = None;
        let mut best_dist_sq = f32::INFINITY;
        for patch in &self.patches {
            if Some(patch.id) == exclude || !patch.is_available() {
                continue;
            }
            let dist_sq = patch.pos.distance_squared(from);
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best = Some(patch);
            }
        }
        best
    }

    /// Reserve a patch. No-op returning `None` if missing or already claimed.
    pub fn claim(&mut self, id: PatchId, claimant: Claimant) -> Option<&Patch> {
        let idx = self.index_of(id)?;
        let patch = &mut self.patches[idx];
        if patch.claimed_by.is_some() {
            return None;
        }
        patch.claimed_by = Some(claimant);
        Some(patch)
    }

    /// Drop a reservation. No-op returning `None` if missing or unclaimed.
    pub fn release(&mut self, id: PatchId) -> Option<&Patch> {
        let idx = self.index_of(id)?;
        let patch = &mut self.patches[idx];
        patch.claimed_by.take()?;
        Some(patch)
    }

    /// Overwrite the stage. The pool does not police transitions.
    pub fn mark_stage(&mut self, id: PatchId, stage: PatchStage) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.patches[idx].stage = stage;
                true
            }
            None => false,
        }
    }

    pub fn remove_by_id(&mut self, id: PatchId) -> Option<Patch> {
        let idx = self.index_of(id)?;
        self.patches.remove(idx)
    }

    /// Drop every patch. The throttle clock is left alone.
    pub fn clear(&mut self) {
        self.patches.clear();
    }
}

impl Default for GrassPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATCHES, DEFAULT_THROTTLE_MS)
    }
}
