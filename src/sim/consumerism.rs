//! Level 4: the mall
//!
//! A wall of market presses in from the left. Buying fills a need, but each
//! purchase also makes that need bigger and pushes the wall further. Holding
//! the directional key pushes the wall back and wears the needs themselves
//! away.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{AudioKey, CueQueue};
use super::input::{EdgeDetector, TickInput};
use super::level::{Level, LevelId};
use super::lifecycle::{Lifecycle, Outcome};
use super::morph::{Rgb, ShapeKind};
use super::particles::{BurstSpec, ParticleField};
use crate::tuning::ConsumerismTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub shape: ShapeKind,
    pub color: Rgb,
}

pub const PRODUCTS: [Product; 3] = [
    Product {
        shape: ShapeKind::Circle,
        color: Rgb::hex(0x06b6d4),
    },
    Product {
        shape: ShapeKind::Hexagon,
        color: Rgb::hex(0xf59e0b),
    },
    Product {
        shape: ShapeKind::Diamond,
        color: Rgb::hex(0x8b5cf6),
    },
];

const DUST: BurstSpec = BurstSpec {
    speed_min: 50.0,
    speed_range: 200.0,
    upward: 0.0,
    jitter: 0.0,
    decay: 1.0,
    size_min: 2.0,
    size_range: 4.0,
    colors: &[Rgb::WHITE],
};

/// One need bar: how full it is and how long it has grown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Need {
    pub current: f32,
    pub max: f32,
}

impl Need {
    pub fn fill(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Consumerism {
    tuning: ConsumerismTuning,
    lifecycle: Lifecycle,
    cues: CueQueue,
    rng: Pcg32,
    edge: EdgeDetector,
    pub dust: ParticleField,

    /// Share of the screen the market occupies, 0..=100
    pub market: f32,
    pub needs: [Need; 3],
    pub product: usize,
    product_timer_ms: f32,
    /// 0..=1 intensity of the push-back effect
    pub resistance: f32,
    ripple_timer_ms: f32,
    pub ripples: u32,
    pub purchases: u32,
    last_directional: Option<bool>,
}

impl Consumerism {
    pub fn new(seed: u64, tuning: ConsumerismTuning, max_particles: usize) -> Self {
        let need = Need {
            current: tuning.need_start,
            max: tuning.need_capacity,
        };
        let mut cues = CueQueue::default();
        cues.play_track(AudioKey::Level4Mall, 0.8, 2000.0);
        cues.play_track(AudioKey::Level4Resistance, 0.0, 0.0);
        Self {
            market: tuning.market_start,
            tuning,
            lifecycle: Lifecycle::new(LevelId::Consumerism.reports_outcome()),
            cues,
            rng: Pcg32::seed_from_u64(seed),
            edge: EdgeDetector::default(),
            dust: ParticleField::floating(max_particles),
            needs: [need; 3],
            product: 0,
            product_timer_ms: 0.0,
            resistance: 0.0,
            ripple_timer_ms: 0.0,
            ripples: 0,
            purchases: 0,
            last_directional: None,
        }
    }

    pub fn current_product(&self) -> &Product {
        &PRODUCTS[self.product % PRODUCTS.len()]
    }

    pub fn total_need(&self) -> f32 {
        self.needs.iter().map(|n| n.max).sum()
    }

    fn rotate_product(&mut self) {
        self.product = (self.product + 1) % PRODUCTS.len();
        self.product_timer_ms = 0.0;
    }

    /// Buy whatever is on offer
    pub fn buy(&mut self) {
        let t = &self.tuning;
        let need = &mut self.needs[self.product % PRODUCTS.len()];
        let new_max = need.max + t.buy_growth;
        // Satisfaction halves the old gap but never closes it
        let gap = ((need.max - need.current) * t.gap_ratio).max(t.min_gap);
        need.current = new_max - gap;
        need.max = new_max;

        self.market = (self.market + t.buy_impact).min(t.market_max);
        self.purchases += 1;
        self.cues.play_sound(AudioKey::Level4Buy, t.buy_volume);
        self.dust
            .burst(&mut self.rng, Vec2::new(0.0, -50.0), 5, &DUST);
        self.rotate_product();
    }

    fn end(&mut self, outcome: Outcome) {
        if self.lifecycle.finish(outcome, self.tuning.epilogue_ms) {
            self.cues.set_volume(AudioKey::Level4Mall, 0.0, 2000.0);
            self.cues.set_volume(AudioKey::Level4Resistance, 0.0, 2000.0);
        }
    }

    fn crossfade(&mut self, directional: bool) {
        if self.last_directional == Some(directional) {
            return;
        }
        self.last_directional = Some(directional);
        let (mall, resistance) = if directional { (0.0, 1.0) } else { (0.8, 0.0) };
        self.cues.set_volume(AudioKey::Level4Mall, mall, 500.0);
        self.cues.set_volume(AudioKey::Level4Resistance, resistance, 500.0);
    }

    fn push_back(&mut self, dt_ms: f32) {
        let dt_s = dt_ms / 1000.0;
        let t = &self.tuning;
        self.resistance = (self.resistance + t.resistance_rise * dt_s).min(1.0);

        self.ripple_timer_ms += dt_ms;
        let threshold = t.ripple_slowest_ms - self.resistance * (t.ripple_slowest_ms - t.ripple_fastest_ms);
        if self.ripple_timer_ms > threshold && self.resistance > 0.1 {
            self.ripples += 1;
            self.ripple_timer_ms = 0.0;
        }

        self.market = (self.market - t.resistance_power * dt_s).max(0.0);
        for need in self.needs.iter_mut() {
            need.current = (need.current - t.drain_current * dt_s).max(0.0);
            need.max = (need.max - t.degrade_max * dt_s).max(0.0);
        }

        if self.rng.random::<f32>() > 0.8 {
            let at = Vec2::new(self.market, 0.0);
            self.dust.burst(&mut self.rng, at, 1, &DUST);
        }
    }

    fn grow_market(&mut self, dt_ms: f32) {
        let dt_s = dt_ms / 1000.0;
        let t = &self.tuning;
        self.resistance = (self.resistance - t.resistance_fall * dt_s).max(0.0);
        let growth = t.growth_base + self.total_need() * t.need_pressure;
        self.market = (self.market + growth * dt_s).min(t.market_max);
    }
}

impl Level for Consumerism {
    fn id(&self) -> LevelId {
        LevelId::Consumerism
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
        Some(&self.dust)
    }

    fn step(&mut self, input: &TickInput, dt_ms: f32) {
        match self.lifecycle.outcome() {
            Some(Outcome::Lose) => return,
            Some(Outcome::Win) => {
                // The market collapses once nothing is wanted
                self.market = (self.market - self.tuning.collapse_speed * dt_ms / 1000.0).max(0.0);
                self.dust.step(dt_ms / 1000.0);
                return;
            }
            None => {}
        }

        self.crossfade(input.directional);

        self.product_timer_ms += dt_ms;
        if self.product_timer_ms > self.tuning.rotate_ms {
            self.rotate_product();
        }

        // Loss is checked before the win
        if self.market >= self.tuning.lose_market {
            self.end(Outcome::Lose);
            return;
        }
        if self.total_need() <= self.tuning.win_need_total && self.market < self.tuning.win_market {
            log::info!("Needs worn away after {} purchases", self.purchases);
            self.end(Outcome::Win);
            self.dust.burst(&mut self.rng, Vec2::ZERO, 100, &DUST);
            return;
        }

        if self.edge.pressed(input) {
            self.buy();
        }

        if input.directional {
            self.push_back(dt_ms);
        } else {
            self.grow_market(dt_ms);
        }

        self.dust.step(dt_ms / 1000.0);
    }

    fn teardown(&mut self) {
        self.cues.stop_track(AudioKey::Level4Mall, 1000.0);
        self.cues.stop_track(AudioKey::Level4Resistance, 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{ProptestConfig, any, prop_assert, proptest};
    use crate::sim::input::arb;
    use crate::sim::lifecycle::Completion;

    fn level() -> Consumerism {
        Consumerism::new(21, ConsumerismTuning::default(), 500)
    }

    #[test]
    fn test_buy_arithmetic() {
        let mut l = level();
        l.tick(&TickInput::tap(), 0.0);
        assert_eq!(l.needs[0], Need { current: 28.0, max: 38.0 });
        assert!((l.market - 35.8).abs() < 1e-4);
        assert_eq!(l.product, 1);
        assert_eq!(l.purchases, 1);
    }

    #[test]
    fn test_gap_never_closes() {
        let mut l = level();
        for _ in 0..30 {
            l.product = 0;
            l.buy();
        }
        let need = l.needs[0];
        assert!(need.max - need.current >= 1.0 - 1e-4);
        assert!(need.fill() < 1.0);
    }

    #[test]
    fn test_holding_primary_buys_once() {
        let mut l = level();
        for _ in 0..10 {
            l.tick(&TickInput::held(true, false), 16.0);
        }
        assert_eq!(l.purchases, 1);
    }

    #[test]
    fn test_product_rotates_every_second() {
        let mut l = level();
        for _ in 0..10 {
            l.tick(&TickInput::default(), 100.0);
        }
        assert_eq!(l.product, 0);
        l.tick(&TickInput::default(), 100.0);
        assert_eq!(l.product, 1);
    }

    #[test]
    fn test_idle_market_swallows_everything() {
        let mut l = level();
        let mut completion = None;
        for _ in 0..10_000 {
            if let Some(c) = l.tick(&TickInput::default(), 100.0) {
                completion = Some(c);
                break;
            }
        }
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
        assert_eq!(completion, Some(Completion { success: true }));
    }

    #[test]
    fn test_resisting_wears_needs_away_and_wins() {
        let mut l = level();
        let mut ticks = 0;
        while l.lifecycle().is_running() && ticks < 1000 {
            l.tick(&TickInput::held(false, true), 100.0);
            ticks += 1;
        }
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
        assert!(l.total_need() <= 1.0);
        assert!(l.ripples > 0);
        // Market keeps collapsing during the ending
        l.market = 4.0;
        l.tick(&TickInput::default(), 50.0);
        assert!((l.market - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_lose_checked_before_win() {
        let mut l = level();
        l.market = 99.5;
        l.needs = [Need { current: 0.0, max: 0.0 }; 3];
        l.tick(&TickInput::default(), 16.0);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
    }

    #[test]
    fn test_market_growth_depends_on_needs() {
        let mut l = level();
        l.tick(&TickInput::default(), 1000.0);
        // 0.5 + 0.02 * 90
        assert!((l.market - (33.3 + 2.3)).abs() < 1e-3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_market_and_needs_stay_bounded(
            seed in any::<u64>(),
            run in arb::ticks(400),
        ) {
            let mut l = Consumerism::new(seed, ConsumerismTuning::default(), 500);
            let market_max = l.tuning.market_max;
            for (input, dt) in run {
                l.tick(&input, dt);
                prop_assert!((0.0..=market_max).contains(&l.market));
                prop_assert!((0.0..=1.0).contains(&l.resistance));
                for need in &l.needs {
                    prop_assert!(need.current >= 0.0);
                    prop_assert!(need.current <= need.max);
                    prop_assert!((0.0..=1.0).contains(&need.fill()));
                }
            }
        }
    }
}
