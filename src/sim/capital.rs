//! Level 3: capital
//!
//! Every tap is labour. Wage creeps toward a low ceiling while capital grows
//! exponentially with the click count; past a threshold capital alone ends
//! the level. Holding the directional key pulls the two bars together,
//! draining capital into wage until they fuse into one value that can only
//! grow.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{AudioKey, CueQueue};
use super::input::TickInput;
use super::level::{Level, LevelId};
use super::lifecycle::{Lifecycle, Outcome};
use super::morph::Rgb;
use super::particles::{BurstSpec, ParticleField};
use crate::clamp01;
use crate::tuning::CapitalTuning;

const GOLD: Rgb = Rgb::hex(0xfbbf24);
const RED: Rgb = Rgb::hex(0xef4444);
const ASH: Rgb = Rgb::hex(0x71717a);

/// Spark families, by what caused them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparkKind {
    /// Ordinary labour
    Gold,
    /// Labour once capital runs hot
    White,
    /// Capital being drained
    Red,
    /// Alienated labour
    Ash,
    /// After fusion
    Unified,
}

impl SparkKind {
    fn base_speed(self) -> f32 {
        match self {
            SparkKind::Ash => 200.0,
            SparkKind::White => 400.0,
            _ => 800.0,
        }
    }

    fn upward(self) -> f32 {
        match self {
            SparkKind::Ash => 0.0,
            SparkKind::White => 50.0,
            _ => 400.0,
        }
    }

    fn colors(self) -> &'static [Rgb] {
        match self {
            SparkKind::Gold => &[GOLD],
            SparkKind::White => &[Rgb::WHITE],
            SparkKind::Red => &[RED],
            SparkKind::Ash => &[ASH],
            SparkKind::Unified => &[RED, GOLD],
        }
    }

    pub fn burst(self, speed_mod: f32) -> BurstSpec {
        let base = self.base_speed() * speed_mod;
        let ash = self == SparkKind::Ash;
        BurstSpec {
            speed_min: base * 0.4,
            speed_range: base,
            upward: self.upward(),
            jitter: 10.0,
            decay: if ash { 0.4 } else { 1.2 },
            size_min: 1.0,
            size_range: if ash { 2.0 } else { 3.0 },
            colors: self.colors(),
        }
    }
}

/// Capital earned by the `click`-th tap
pub fn capital_gain(tuning: &CapitalTuning, click: u32) -> f32 {
    tuning.capital_base_gain * tuning.capital_exponent.powf(click as f32 / 10.0)
}

/// How detached the worker has become after `click` taps, in [0, 1]
pub fn alienation(tuning: &CapitalTuning, click: u32) -> f32 {
    clamp01((click as f32 - tuning.alienation_start) / (tuning.alienation_end - tuning.alienation_start))
}

#[derive(Debug, Clone)]
pub struct Capital {
    tuning: CapitalTuning,
    lifecycle: Lifecycle,
    cues: CueQueue,
    rng: Pcg32,
    pub sparks: ParticleField,

    pub wage: f32,
    pub capital: f32,
    pub unified: f32,
    pub clicks: u32,
    /// 0 = apart, 1 = touching
    pub attraction: f32,
    pub fused: bool,
    pub ascended: bool,
    /// Counts up with every tap, for screen shake
    pub impact: u32,
    last_directional: Option<bool>,
    fade_in_ms: Option<f32>,
}

impl Capital {
    pub fn new(seed: u64, tuning: CapitalTuning, max_particles: usize) -> Self {
        let sparks = ParticleField::new(tuning.gravity, tuning.drag_per_frame, max_particles);
        let mut cues = CueQueue::default();
        cues.play_track(AudioKey::Level3Capital, 0.8, 2000.0);
        cues.play_track(AudioKey::Level3Resistance, 0.0, 0.0);
        Self {
            tuning,
            lifecycle: Lifecycle::new(LevelId::Capital.reports_outcome()),
            cues,
            rng: Pcg32::seed_from_u64(seed),
            sparks,
            wage: 0.0,
            capital: 0.0,
            unified: 0.0,
            clicks: 0,
            attraction: 0.0,
            fused: false,
            ascended: false,
            impact: 0,
            last_directional: None,
            fade_in_ms: None,
        }
    }

    pub fn tuning(&self) -> &CapitalTuning {
        &self.tuning
    }

    pub fn alienation(&self) -> f32 {
        alienation(&self.tuning, self.clicks)
    }

    /// Sparks the next ordinary tap would throw
    pub fn feedback_tier(&self) -> SparkKind {
        if self.fused {
            SparkKind::Unified
        } else if alienation(&self.tuning, self.clicks + 1) >= 0.9 {
            SparkKind::Ash
        } else if self.capital > self.tuning.high_heat {
            SparkKind::White
        } else {
            SparkKind::Gold
        }
    }

    fn spark(&mut self, kind: SparkKind, count: usize, speed_mod: f32) {
        self.sparks
            .burst(&mut self.rng, Vec2::ZERO, count, &kind.burst(speed_mod));
    }

    fn fade_out(&mut self) {
        self.cues.set_volume(AudioKey::Level3Capital, 0.0, 3000.0);
        self.cues.set_volume(AudioKey::Level3Resistance, 0.0, 3000.0);
        self.cues.stop_track(AudioKey::Level3Drain, 1000.0);
    }

    fn lose(&mut self) {
        if self.lifecycle.finish(Outcome::Lose, self.tuning.epilogue_ms) {
            self.fade_out();
        }
    }

    fn fuse(&mut self) {
        self.fused = true;
        self.unified = self.wage * 10.0 + self.capital;
        self.impact += 20;
        log::debug!("Wage and capital fused at {:.1}", self.unified);
        self.spark(SparkKind::Unified, 70, 3.0);
        self.cues.play_sound(AudioKey::Level3Burn, 1.0);
    }

    fn ascend(&mut self) {
        let epilogue = self.tuning.ascension_ms + self.tuning.epilogue_ms;
        if self.lifecycle.finish(Outcome::Win, epilogue) {
            self.ascended = true;
            self.impact += 50;
            self.spark(SparkKind::Unified, 30, 4.0);
            self.fade_in_ms = Some(self.tuning.ascension_ms);
        }
    }

    fn work(&mut self) {
        self.impact += 1;
        let t = &self.tuning;

        if self.fused {
            self.unified += t.fused_tap_gain;
            if self.unified > t.unified_limit {
                self.ascend();
            }
            self.spark(SparkKind::Unified, 30, 2.0);
            self.cues.play_sound(AudioKey::Level3Burn, 0.6);
            return;
        }

        self.clicks += 1;
        let click = self.clicks;
        let alien = alienation(t, click);
        let wage_gain = (2.0 - (self.wage / t.wage_ceiling) * 2.0).max(0.0) * (1.0 - alien);
        self.wage = (self.wage + wage_gain).min(t.wage_ceiling);

        let hot = self.capital > t.high_heat;
        self.capital += capital_gain(t, click);
        if self.capital > t.capital_limit && self.attraction < t.attraction_guard {
            self.lose();
        }

        if alien < 0.9 {
            if hot {
                self.spark(SparkKind::White, 25, 1.0);
                self.cues.play_sound(AudioKey::Level3Burn, 0.5);
            } else {
                self.spark(SparkKind::Gold, 15, 1.0);
                self.cues.play_sound(AudioKey::Level3Coin, 0.4);
            }
        } else {
            self.spark(SparkKind::Ash, 10, 0.5);
            if self.rng.random::<f32>() > 0.5 {
                self.cues.play_sound(AudioKey::Level3Coin, 0.1);
            }
        }
    }

    fn crossfade(&mut self, directional: bool) {
        if self.last_directional == Some(directional) {
            return;
        }
        self.last_directional = Some(directional);
        if directional {
            self.cues.set_volume(AudioKey::Level3Capital, 0.0, 500.0);
            self.cues.set_volume(AudioKey::Level3Resistance, 1.0, 500.0);
            self.cues.play_track(AudioKey::Level3Drain, 1.0, 200.0);
        } else {
            self.cues.set_volume(AudioKey::Level3Capital, 0.8, 500.0);
            self.cues.set_volume(AudioKey::Level3Resistance, 0.0, 500.0);
            self.cues.stop_track(AudioKey::Level3Drain, 200.0);
        }
    }

    fn step_attraction(&mut self, directional: bool, dt_s: f32) {
        let t = &self.tuning;
        if self.fused {
            if directional {
                self.unified += t.fused_hold_gain * dt_s;
                if self.unified > t.unified_limit {
                    self.ascend();
                }
                if self.rng.random::<f32>() > 0.05 {
                    self.spark(SparkKind::Unified, 2, 1.5);
                }
            }
            return;
        }

        if !directional {
            self.attraction = (self.attraction - t.attraction_fall * dt_s).max(0.0);
            return;
        }

        // Fusion looks at the pull as it stood before this tick
        let touching = self.attraction >= t.fuse_at;
        self.attraction = (self.attraction + t.attraction_rise * dt_s).min(1.0);
        if self.capital > 0.0 {
            let transfer = (self.capital * t.transfer_ratio).max(t.transfer_floor) * dt_s;
            self.capital = (self.capital - transfer).max(0.0);
            self.wage = (self.wage + transfer * t.wage_share).min(t.wage_cap);
        }
        if touching {
            self.fuse();
        } else if self.rng.random::<f32>() > 0.1 {
            self.spark(SparkKind::Red, 1, 0.5);
        }
    }
}

impl Level for Capital {
    fn id(&self) -> LevelId {
        LevelId::Capital
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn cues_mut(&mut self) -> &mut CueQueue {
        &mut self.cues
    }

    fn particles(&self) -> Option<&ParticleField> {
        Some(&self.sparks)
    }

    fn step(&mut self, input: &TickInput, dt_ms: f32) {
        let dt_s = dt_ms / 1000.0;

        if self.lifecycle.is_running() {
            self.crossfade(input.directional);
            for _ in 0..input.taps {
                // Taps while pulling the bars together do no work
                if !self.fused && input.directional {
                    break;
                }
                self.work();
                if !self.lifecycle.is_running() {
                    break;
                }
            }
            if self.lifecycle.is_running() {
                self.step_attraction(input.directional, dt_s);
            }
        } else if !self.ascended {
            // A plain loss freezes everything
            return;
        }

        if let Some(remaining) = self.fade_in_ms.as_mut() {
            *remaining -= dt_ms;
            if *remaining <= 0.0 {
                self.fade_in_ms = None;
                self.fade_out();
            }
        }

        self.sparks.step(dt_s);
    }

    fn teardown(&mut self) {
        self.cues.stop_track(AudioKey::Level3Capital, 1000.0);
        self.cues.stop_track(AudioKey::Level3Resistance, 1000.0);
        self.cues.stop_track(AudioKey::Level3Drain, 500.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{ProptestConfig, any, prop_assert, proptest};
    use crate::sim::input::arb;
    use crate::sim::lifecycle::{Completion, LevelStatus};

    fn level() -> Capital {
        Capital::new(11, CapitalTuning::default(), 500)
    }

    fn tap() -> TickInput {
        TickInput::tap()
    }

    #[test]
    fn test_capital_gain_curve() {
        let t = CapitalTuning::default();
        assert!((capital_gain(&t, 0) - 5.0).abs() < 1e-6);
        assert!((capital_gain(&t, 10) - 5.75).abs() < 1e-4);
        assert_eq!(alienation(&t, 20), 0.0);
        assert!((alienation(&t, 50) - 0.5).abs() < 1e-6);
        assert_eq!(alienation(&t, 200), 1.0);
    }

    #[test]
    fn test_exact_crossing_tap_loses() {
        let t = CapitalTuning::default();
        let mut total = 0.0;
        let crossing = (1u32..)
            .find(|&click| {
                total += capital_gain(&t, click);
                total > t.capital_limit
            })
            .expect("capital eventually overflows");
        let mut l = level();
        for i in 1..crossing {
            l.tick(&tap(), 16.0);
            assert!(l.lifecycle().is_running(), "lost early at tap {i}");
        }
        l.tick(&tap(), 16.0);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
        assert_eq!(l.clicks, crossing);
    }

    #[test]
    fn test_wage_hits_ceiling() {
        let mut l = level();
        for _ in 0..15 {
            l.tick(&tap(), 16.0);
        }
        assert!(l.wage <= 15.0);
        assert!(l.wage > 10.0);
    }

    #[test]
    fn test_taps_ignored_while_pulling() {
        let mut l = level();
        l.tick(&TickInput { primary: true, directional: true, taps: 3 }, 16.0);
        assert_eq!(l.clicks, 0);
    }

    #[test]
    fn test_pulling_drains_capital_and_fuses() {
        let mut l = level();
        for _ in 0..10 {
            l.tick(&tap(), 16.0);
        }
        let capital = l.capital;
        let wage = l.wage;
        l.tick(&TickInput::held(false, true), 100.0);
        assert!(l.capital < capital);
        assert!(l.wage > wage);
        assert!(!l.fused);
        for _ in 0..10 {
            l.tick(&TickInput::held(false, true), 100.0);
        }
        assert!(l.fused);
        assert!(l.unified >= l.wage * 10.0);
    }

    #[test]
    fn test_fusion_waits_for_the_tick_after_touching() {
        let mut l = level();
        l.attraction = 0.9;
        l.tick(&TickInput::held(false, true), 100.0);
        assert!((l.attraction - 1.0).abs() < 1e-6);
        assert!(!l.fused);
        l.tick(&TickInput::held(false, true), 16.0);
        assert!(l.fused);
    }

    #[test]
    fn test_attraction_falls_back() {
        let mut l = level();
        l.tick(&TickInput::held(false, true), 500.0);
        assert!((l.attraction - 0.5).abs() < 1e-5);
        l.tick(&TickInput::default(), 100.0);
        assert!((l.attraction - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_fused_taps_ascend_with_long_epilogue() {
        let mut l = level();
        l.fused = true;
        l.unified = 980.0;
        l.tick(&tap(), 16.0);
        assert!(l.ascended);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
        // Sparks keep flying during the ending
        let live = l.sparks.len();
        assert!(live > 0);
        let mut done = None;
        let mut elapsed = 0.0;
        while done.is_none() && elapsed < 20_000.0 {
            done = l.tick(&TickInput::default(), 100.0);
            elapsed += 100.0;
        }
        assert_eq!(done, Some(Completion { success: true }));
        assert!((7900.0..=8100.0).contains(&elapsed));
    }

    #[test]
    fn test_loss_freezes_particles() {
        let mut l = level();
        l.capital = 499.0;
        l.tick(&tap(), 16.0);
        assert!(matches!(l.lifecycle().status(), LevelStatus::Epilogue { outcome: Outcome::Lose, .. }));
        let before: Vec<_> = l.sparks.particles.iter().map(|p| p.pos).collect();
        l.tick(&TickInput::default(), 100.0);
        let after: Vec<_> = l.sparks.particles.iter().map(|p| p.pos).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_attraction_shields_overflow() {
        let mut l = level();
        l.capital = 499.0;
        l.attraction = 0.85;
        l.tick(&tap(), 0.0);
        assert!(l.lifecycle().is_running());
    }

    #[test]
    fn test_feedback_tiers() {
        let mut l = level();
        assert_eq!(l.feedback_tier(), SparkKind::Gold);
        l.capital = 200.0;
        assert_eq!(l.feedback_tier(), SparkKind::White);
        l.clicks = 100;
        assert_eq!(l.feedback_tier(), SparkKind::Ash);
        l.fused = true;
        assert_eq!(l.feedback_tier(), SparkKind::Unified);
    }

    #[test]
    fn test_particle_cap_from_settings() {
        let mut l = Capital::new(1, CapitalTuning::default(), 0);
        l.tick(&tap(), 16.0);
        assert!(l.sparks.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_bars_stay_bounded(
            seed in any::<u64>(),
            fused in any::<bool>(),
            run in arb::ticks(400),
        ) {
            let mut l = Capital::new(seed, CapitalTuning::default(), 500);
            l.fused = fused;
            for (input, dt) in run {
                l.tick(&input, dt);
                prop_assert!((0.0..=1.0).contains(&l.attraction));
                prop_assert!((0.0..=1.0).contains(&l.alienation()));
                prop_assert!(l.capital >= 0.0);
                prop_assert!((0.0..=l.tuning().wage_cap).contains(&l.wage));
                prop_assert!(l.sparks.len() <= 500);
            }
        }
    }
}
