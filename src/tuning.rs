//! Level balance constants
//!
//! Defaults reproduce the shipped game. Any subset can be overridden from
//! JSON; missing fields keep their defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("tuning JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning value: {0}")]
    Invalid(String),
}

/// Balance for every level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub conformity: ConformityTuning,
    pub factory: FactoryTuning,
    pub capital: CapitalTuning,
    pub consumerism: ConsumerismTuning,
    pub epiphany: EpiphanyTuning,
}

impl Tuning {
    /// Parse overrides and validate them
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Parse overrides, falling back to defaults on any error
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Ignoring tuning overrides: {}", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        let positive = [
            ("conformity.duration_ms", self.conformity.duration_ms),
            ("conformity.teacher_switch_ms", self.conformity.teacher_switch_ms),
            ("factory.spawn_interval_ms", self.factory.spawn_interval_ms),
            ("factory.decay_interval_ms", self.factory.decay_interval_ms),
            ("factory.belt_max", self.factory.belt_max),
            ("capital.wage_ceiling", self.capital.wage_ceiling),
            ("consumerism.rotate_ms", self.consumerism.rotate_ms),
            ("epiphany.time_dilation", self.epiphany.time_dilation),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(TuningError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.conformity.student_count < 2 {
            return Err(TuningError::Invalid("conformity.student_count must be at least 2".into()));
        }
        if self.factory.belt_max <= self.factory.belt_start {
            return Err(TuningError::Invalid(
                "factory.belt_max must exceed belt_start".into(),
            ));
        }
        if self.capital.alienation_end <= self.capital.alienation_start {
            return Err(TuningError::Invalid(
                "capital.alienation_end must exceed alienation_start".into(),
            ));
        }
        if !(1..=16).contains(&self.epiphany.max_stage) {
            return Err(TuningError::Invalid("epiphany.max_stage must be in 1..=16".into()));
        }
        Ok(())
    }
}

/// Level 1: the classroom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformityTuning {
    pub duration_ms: f32,
    /// HOLD phase ends and TAP phase begins
    pub phase_switch_ms: f32,
    pub teacher_switch_ms: f32,
    /// Teacher is "switching" for this long after each change
    pub switching_ms: f32,
    pub base_difficulty: f32,
    pub tap_power: f32,
    /// Conformity shed per ms while holding primary in the HOLD phase
    pub hold_relief_per_ms: f32,
    /// Final stretch where nothing helps
    pub despair_window_ms: f32,
    pub despair_rate_per_ms: f32,
    pub rebellion_rise_per_ms: f32,
    pub rebellion_decay_per_ms: f32,
    /// Conformity shed per ms, scaled by rebellion
    pub rebellion_relief_per_ms: f32,
    /// Revolution wave growth in grid units per second
    pub wave_speed: f32,
    pub wave_full_radius: f32,
    pub all_red_hold_ms: f32,
    pub student_count: usize,
    pub npc_speed_min: f32,
    pub npc_speed_range: f32,
    /// Focus easing rate toward the primary key state, per second
    pub focus_rate: f32,
    /// Routine volume lost at full focus
    pub focus_duck: f32,
    pub epilogue_ms: f32,
}

impl Default for ConformityTuning {
    fn default() -> Self {
        Self {
            duration_ms: 60_000.0,
            phase_switch_ms: 15_000.0,
            teacher_switch_ms: 15_000.0,
            switching_ms: 3000.0,
            base_difficulty: 0.00006,
            tap_power: 0.05,
            hold_relief_per_ms: 0.0008,
            despair_window_ms: 12_000.0,
            despair_rate_per_ms: 0.0005,
            rebellion_rise_per_ms: 0.0004,
            rebellion_decay_per_ms: 0.0006,
            rebellion_relief_per_ms: 0.001,
            wave_speed: 5.0,
            wave_full_radius: 8.0,
            all_red_hold_ms: 1000.0,
            student_count: 10,
            npc_speed_min: 0.00005,
            npc_speed_range: 0.00015,
            focus_rate: 8.0,
            focus_duck: 0.8,
            epilogue_ms: 3000.0,
        }
    }
}

/// Level 2: the factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryTuning {
    pub belt_start: f32,
    /// Belt speed gains 1 px/s every this many ms
    pub belt_ramp_ms: f32,
    pub belt_max: f32,
    /// Survival win once the belt is within this of `belt_max`
    pub survival_margin: f32,
    pub tap_impulse: f32,
    pub stack_decay: f32,
    pub max_tap_resistance: f32,
    pub push_bonus: f32,
    pub push_per_liberated: f32,
    pub death_x: f32,
    pub warning_x: f32,
    pub liberation_goal: usize,
    pub camera_deadzone: f32,
    pub camera_follow: f32,
    pub zoom_follow: f32,
    pub zoom_range: f32,
    pub spawn_interval_ms: f32,
    pub spawn_distance: f32,
    pub despawn_distance: f32,
    pub capture_dx: f32,
    pub capture_dy: f32,
    pub decay_interval_ms: f32,
    pub mirror_show: f32,
    pub mirror_peak: f32,
    pub mirror_fade: f32,
    pub mirror_solo: f32,
    pub tap_volume: f32,
    pub epilogue_ms: f32,
}

impl Default for FactoryTuning {
    fn default() -> Self {
        Self {
            belt_start: 150.0,
            belt_ramp_ms: 60.0,
            belt_max: 950.0,
            survival_margin: 10.0,
            tap_impulse: 30.0,
            stack_decay: 80.0,
            max_tap_resistance: 350.0,
            push_bonus: 500.0,
            push_per_liberated: 50.0,
            death_x: 900.0,
            warning_x: 200.0,
            liberation_goal: 10,
            camera_deadzone: 400.0,
            camera_follow: 4.0,
            zoom_follow: 0.5,
            zoom_range: 0.95,
            spawn_interval_ms: 3000.0,
            spawn_distance: 1500.0,
            despawn_distance: 3000.0,
            capture_dx: 100.0,
            capture_dy: 50.0,
            decay_interval_ms: 1000.0,
            mirror_show: 200.0,
            mirror_peak: 400.0,
            mirror_fade: 700.0,
            mirror_solo: 850.0,
            tap_volume: 0.6,
            epilogue_ms: 4000.0,
        }
    }
}

/// Level 3: capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalTuning {
    pub wage_ceiling: f32,
    pub capital_base_gain: f32,
    pub capital_exponent: f32,
    pub alienation_start: f32,
    pub alienation_end: f32,
    pub capital_limit: f32,
    pub unified_limit: f32,
    /// Attraction at or above this shields a capital overflow
    pub attraction_guard: f32,
    pub attraction_rise: f32,
    pub attraction_fall: f32,
    pub fuse_at: f32,
    pub transfer_floor: f32,
    pub transfer_ratio: f32,
    pub wage_share: f32,
    pub wage_cap: f32,
    pub fused_tap_gain: f32,
    pub fused_hold_gain: f32,
    /// Capital above this turns gold sparks white
    pub high_heat: f32,
    pub gravity: f32,
    pub drag_per_frame: f32,
    /// Sparks keep flying this long after ascension before the ending
    pub ascension_ms: f32,
    pub epilogue_ms: f32,
}

impl Default for CapitalTuning {
    fn default() -> Self {
        Self {
            wage_ceiling: 15.0,
            capital_base_gain: 5.0,
            capital_exponent: 1.15,
            alienation_start: 20.0,
            alienation_end: 80.0,
            capital_limit: 500.0,
            unified_limit: 1000.0,
            attraction_guard: 0.8,
            attraction_rise: 1.0,
            attraction_fall: 2.0,
            fuse_at: 0.95,
            transfer_floor: 10.0,
            transfer_ratio: 0.8,
            wage_share: 0.3,
            wage_cap: 100.0,
            fused_tap_gain: 50.0,
            fused_hold_gain: 100.0,
            high_heat: 150.0,
            gravity: 3000.0,
            drag_per_frame: 0.95,
            ascension_ms: 4000.0,
            epilogue_ms: 4000.0,
        }
    }
}

/// Level 4: the mall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerismTuning {
    pub market_start: f32,
    pub market_max: f32,
    pub need_start: f32,
    pub need_capacity: f32,
    pub rotate_ms: f32,
    pub buy_growth: f32,
    pub gap_ratio: f32,
    pub min_gap: f32,
    pub buy_impact: f32,
    pub resistance_power: f32,
    pub drain_current: f32,
    pub degrade_max: f32,
    pub resistance_rise: f32,
    pub resistance_fall: f32,
    pub ripple_slowest_ms: f32,
    pub ripple_fastest_ms: f32,
    pub growth_base: f32,
    pub need_pressure: f32,
    pub lose_market: f32,
    pub win_need_total: f32,
    pub win_market: f32,
    pub collapse_speed: f32,
    pub buy_volume: f32,
    pub epilogue_ms: f32,
}

impl Default for ConsumerismTuning {
    fn default() -> Self {
        Self {
            market_start: 33.3,
            market_max: 100.0,
            need_start: 10.0,
            need_capacity: 30.0,
            rotate_ms: 1000.0,
            buy_growth: 8.0,
            gap_ratio: 0.5,
            min_gap: 1.0,
            buy_impact: 2.5,
            resistance_power: 12.0,
            drain_current: 15.0,
            degrade_max: 2.0,
            resistance_rise: 1.5,
            resistance_fall: 3.0,
            ripple_slowest_ms: 800.0,
            ripple_fastest_ms: 100.0,
            growth_base: 0.5,
            need_pressure: 0.02,
            lose_market: 99.0,
            win_need_total: 1.0,
            win_market: 5.0,
            collapse_speed: 50.0,
            buy_volume: 0.6,
            epilogue_ms: 4000.0,
        }
    }
}

/// Level 5: the epiphany
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpiphanyTuning {
    pub max_stage: u32,
    pub jump_cooldown_ms: f32,
    pub lurch_force: f32,
    pub lurch_jitter: f32,
    pub friction: f32,
    pub red_speed: f32,
    pub resistance_speed: f32,
    pub return_speed: f32,
    pub liberation_threshold: f32,
    pub final_threshold: f32,
    pub time_dilation: f32,
    pub freedom_speed: f32,
    /// Impulse multiplier per 60 Hz frame during the final choice
    pub final_impulse_decay: f32,
    pub stage_delay_short_ms: f32,
    pub stage_delay_long_ms: f32,
    pub final_delay_ms: f32,
    pub epilogue_ms: f32,
}

impl Default for EpiphanyTuning {
    fn default() -> Self {
        Self {
            max_stage: 10,
            jump_cooldown_ms: 600.0,
            lurch_force: 900.0,
            lurch_jitter: 100.0,
            friction: 4.0,
            red_speed: 400.0,
            resistance_speed: 250.0,
            return_speed: 600.0,
            liberation_threshold: -600.0,
            final_threshold: -1200.0,
            time_dilation: 0.2,
            freedom_speed: 600.0,
            final_impulse_decay: 0.95,
            stage_delay_short_ms: 300.0,
            stage_delay_long_ms: 1200.0,
            final_delay_ms: 600.0,
            epilogue_ms: 3500.0,
        }
    }
}
