//! Simulation settings and rule presets
//!
//! Everything the core is parameterized by lives here, so tests and hosts can
//! build arenas without touching hard-coded constants.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::{Kind, SimError};

/// What happens when a germ drifts past the arena edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BoundaryPolicy {
    /// No correction; germs may leave the arena for good
    Unbounded,
    /// Turn the heading by -π/2 whenever the germ leaves the arena
    #[default]
    Reflective,
}

/// Distance comparison used by hit-testing at exactly `distance == radius`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HitBoundary {
    /// `distance <= radius`
    #[default]
    Inclusive,
    /// `distance < radius`
    Strict,
}

impl HitBoundary {
    #[inline]
    pub fn accepts(self, distance: f32, radius: f32) -> bool {
        match self {
            HitBoundary::Inclusive => distance <= radius,
            HitBoundary::Strict => distance < radius,
        }
    }
}

/// What a click does to the germs it eliminates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum HitPolicy {
    /// Drop eliminated germs from the collection
    #[default]
    RemoveOnHit,
    /// Keep eliminated germs but hide them; survivors speed up after any hit
    MarkHidden { speed_increment: f32 },
}

/// Inclusive speed range (pixels/s)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: f32,
    pub max: f32,
}

impl SpeedRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self::new(MIN_SPEED, MAX_SPEED)
    }
}

/// Per-kind behavioral constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindProfile {
    pub kind: Kind,
    /// Relative spawn weight
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Clicks needed to eliminate (with the default damage of 1)
    #[serde(default = "default_health")]
    pub health: u32,
    /// Score awarded on elimination
    #[serde(default)]
    pub points: u64,
    /// Age at which a germ splits in two (`None` = never)
    #[serde(default)]
    pub doubling_time_secs: Option<f32>,
    #[serde(default)]
    pub speed_range: SpeedRange,
}

fn default_weight() -> f32 {
    1.0
}

fn default_health() -> u32 {
    1
}

impl KindProfile {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            weight: default_weight(),
            health: default_health(),
            points: 0,
            doubling_time_secs: None,
            speed_range: SpeedRange::default(),
        }
    }

    pub fn with_points(mut self, points: u64) -> Self {
        self.points = points;
        self
    }

    pub fn with_health(mut self, health: u32) -> Self {
        self.health = health;
        self
    }

    pub fn with_doubling_time(mut self, secs: f32) -> Self {
        self.doubling_time_secs = Some(secs);
        self
    }
}

/// Named rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RulePreset {
    /// Germs drift freely and vanish on click
    Drift,
    /// Germs bounce around the arena; covid takes two clicks
    #[default]
    Swat,
    /// Germs multiply; swatted germs are hidden and the rest speed up
    Outbreak,
}

impl RulePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            RulePreset::Drift => "Drift",
            RulePreset::Swat => "Swat",
            RulePreset::Outbreak => "Outbreak",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "drift" => Some(RulePreset::Drift),
            "swat" => Some(RulePreset::Swat),
            "outbreak" => Some(RulePreset::Outbreak),
            _ => None,
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// RNG seed for spawning and splitting
    pub seed: u64,

    // === Arena ===
    pub width: f32,
    pub height: f32,
    pub boundary: BoundaryPolicy,

    // === Germs ===
    pub entity_count: usize,
    pub entity_diameter: f32,
    pub kinds: Vec<KindProfile>,
    /// Spawn on whole pixels in `[1, max]` with whole-number speeds
    pub whole_pixel_spawn: bool,

    // === Interaction ===
    pub hit_radius: f32,
    pub hit_boundary: HitBoundary,
    pub hit_damage: u32,
    pub hit_policy: HitPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_preset(RulePreset::default())
    }
}

impl Settings {
    /// Create settings from a rule preset
    pub fn from_preset(preset: RulePreset) -> Self {
        let mut settings = Self {
            seed: 0,
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            boundary: BoundaryPolicy::Reflective,
            entity_count: INITIAL_ENTITY_COUNT,
            entity_diameter: ENTITY_DIAMETER,
            kinds: Vec::new(),
            whole_pixel_spawn: false,
            hit_radius: HIT_RADIUS,
            hit_boundary: HitBoundary::Inclusive,
            hit_damage: HIT_DAMAGE,
            hit_policy: HitPolicy::RemoveOnHit,
        };
        settings.apply_preset(preset);
        settings
    }

    /// Apply a rule preset (arena size, seed and counts are left alone)
    pub fn apply_preset(&mut self, preset: RulePreset) {
        match preset {
            RulePreset::Drift => {
                self.boundary = BoundaryPolicy::Unbounded;
                self.whole_pixel_spawn = true;
                self.hit_boundary = HitBoundary::Inclusive;
                self.hit_policy = HitPolicy::RemoveOnHit;
                self.kinds = vec![
                    KindProfile::new(Kind::Flu).with_points(10),
                    KindProfile::new(Kind::Covid).with_points(10),
                ];
            }
            RulePreset::Swat => {
                self.boundary = BoundaryPolicy::Reflective;
                self.whole_pixel_spawn = false;
                self.hit_boundary = HitBoundary::Inclusive;
                self.hit_policy = HitPolicy::RemoveOnHit;
                self.kinds = vec![
                    KindProfile::new(Kind::Flu).with_points(10),
                    KindProfile::new(Kind::Covid).with_points(20).with_health(2),
                ];
            }
            RulePreset::Outbreak => {
                self.boundary = BoundaryPolicy::Reflective;
                self.whole_pixel_spawn = false;
                self.hit_boundary = HitBoundary::Strict;
                self.hit_policy = HitPolicy::MarkHidden {
                    speed_increment: SPEED_RAMP,
                };
                self.kinds = vec![
                    KindProfile::new(Kind::Flu)
                        .with_points(10)
                        .with_doubling_time(8.0),
                    KindProfile::new(Kind::Covid)
                        .with_points(20)
                        .with_doubling_time(5.0),
                ];
            }
        }
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like `from_json`, but a document without a `seed` takes `fallback_seed`
    pub fn from_json_seeded(json: &str, fallback_seed: u64) -> Result<Self, SimError> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(fields) = value.as_object_mut() {
            fields.entry("seed").or_insert_with(|| fallback_seed.into());
        }
        let settings: Self = serde_json::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Profile for a kind, if the table has one
    pub fn profile(&self, kind: Kind) -> Option<&KindProfile> {
        self.kinds.iter().find(|p| p.kind == kind)
    }

    /// Largest top-left coordinate a germ may occupy without leaving the arena
    pub fn max_position(&self) -> (f32, f32) {
        match self.boundary {
            BoundaryPolicy::Reflective => (
                self.width - self.entity_diameter,
                self.height - self.entity_diameter,
            ),
            BoundaryPolicy::Unbounded => (self.width, self.height),
        }
    }

    /// Reject authoring errors before a simulation is built
    pub fn validate(&self) -> Result<(), SimError> {
        fn invalid(msg: impl Into<String>) -> Result<(), SimError> {
            Err(SimError::InvalidConfig(msg.into()))
        }

        if !(self.width.is_finite() && self.width > 0.0) {
            return invalid(format!("arena width must be positive, got {}", self.width));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return invalid(format!("arena height must be positive, got {}", self.height));
        }
        if !(self.entity_diameter.is_finite() && self.entity_diameter >= 0.0) {
            return invalid("entity diameter must be non-negative");
        }
        if self.boundary == BoundaryPolicy::Reflective
            && (self.width <= self.entity_diameter || self.height <= self.entity_diameter)
        {
            return invalid("arena must be larger than one germ under the reflective policy");
        }
        if !(self.hit_radius.is_finite() && self.hit_radius >= 0.0) {
            return invalid("hit radius must be non-negative");
        }
        if self.hit_damage == 0 {
            return invalid("hit damage must be at least 1");
        }
        if let HitPolicy::MarkHidden { speed_increment } = self.hit_policy {
            if !(speed_increment.is_finite() && speed_increment >= 0.0) {
                return invalid("speed increment must be non-negative");
            }
        }
        if self.kinds.is_empty() {
            return invalid("kind table is empty");
        }

        let mut total_weight = 0.0;
        for (i, profile) in self.kinds.iter().enumerate() {
            let name = profile.kind.as_str();
            if self.kinds[..i].iter().any(|p| p.kind == profile.kind) {
                return invalid(format!("kind {name} listed twice"));
            }
            if !(profile.weight.is_finite() && profile.weight >= 0.0) {
                return invalid(format!("kind {name} has a negative weight"));
            }
            if profile.health == 0 {
                return invalid(format!("kind {name} has zero health"));
            }
            let range = profile.speed_range;
            if !(range.min.is_finite() && range.max.is_finite()) || range.min < 0.0 {
                return invalid(format!("kind {name} has a negative speed"));
            }
            if range.min > range.max {
                return invalid(format!("kind {name} speed range is inverted"));
            }
            if let Some(t) = profile.doubling_time_secs {
                if !(t.is_finite() && t > 0.0) {
                    return invalid(format!("kind {name} doubling time must be positive"));
                }
            }
            total_weight += profile.weight;
        }
        if total_weight <= 0.0 {
            return invalid("kind weights sum to zero");
        }

        Ok(())
    }
}
