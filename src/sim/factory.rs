//! Level 2: the factory
//!
//! A conveyor belt carries the player right toward the end of the line at an
//! ever increasing speed. Taps buy a little resistance; holding the
//! directional key walks against the flow and pulls drifting workpieces into
//! orbit around the player.
//!
//! Terminal checks run in a fixed order each tick: reaching the end of the
//! line, then surviving until the belt tops out, then liberating enough
//! workpieces. The first that holds wins the tick.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{AudioKey, CueQueue};
use super::input::TickInput;
use super::level::{Level, LevelId};
use super::lifecycle::{Lifecycle, Outcome};
use super::morph::{Outline, Rgb, ShapeKind, interpolate_outline};
use crate::tuning::FactoryTuning;
use crate::{clamp01, lerp};

pub const PLAYER_COLOR: Rgb = Rgb::hex(0x10b981);
pub const ACCENT_COLOR: Rgb = Rgb::hex(0xef4444);
pub const MAIN_LANE_ITEM_COLOR: Rgb = Rgb::hex(0x71717a);
pub const MIRROR_LANE_ITEM_COLOR: Rgb = Rgb::hex(0x27272a);

/// Mirror lanes above and below the main belt
pub const MIRROR_LANES: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub radius: f32,
    pub angle: f32,
    /// Radians per second, either direction
    pub speed: f32,
    /// 1 is a circle, 0.5 a flat oval
    pub eccentricity: f32,
    pub wobble: f32,
}

#[derive(Debug, Clone)]
pub struct Workpiece {
    pub id: u32,
    pub shape: ShapeKind,
    pub x: f32,
    pub y: f32,
    pub speed_mult: f32,
    pub rotation: f32,
    pub liberated: bool,
    pub orbit: Option<Orbit>,
    /// 0 = own shape, 1 = circle
    pub morph: f32,
    pub opacity: f32,
    /// 0 = grey, 1 = red
    pub color_progress: f32,
}

impl Workpiece {
    pub fn outline(&self) -> Outline {
        interpolate_outline(self.shape, ShapeKind::Circle, self.morph)
    }

    pub fn color(&self, main_lane: bool) -> Rgb {
        let base = if main_lane {
            MAIN_LANE_ITEM_COLOR
        } else {
            MIRROR_LANE_ITEM_COLOR
        };
        base.lerp(ACCENT_COLOR, self.color_progress)
    }
}

#[derive(Debug, Clone)]
pub struct Factory {
    tuning: FactoryTuning,
    lifecycle: Lifecycle,
    cues: CueQueue,
    rng: Pcg32,

    pub time_ms: f32,
    pub belt_speed: f32,
    pub player_x: f32,
    pub camera_x: f32,
    pub zoom: f32,
    pub background_offset: f32,

    /// Pending tap resistance, decays over time
    pub stack: f32,
    pub liberated: usize,
    pub items: Vec<Workpiece>,
    next_id: u32,
    last_spawn_ms: f32,
    last_decay_ms: f32,
    next_tap_alt: bool,
    last_directional: Option<bool>,
    /// Directional key as of the last tick, for presentation
    pub revolution_active: bool,
}

impl Factory {
    pub fn new(seed: u64, tuning: FactoryTuning) -> Self {
        let mut cues = CueQueue::default();
        cues.play_track(AudioKey::Level2Factory, 1.0, 1500.0);
        cues.play_track(AudioKey::Level2Revolution, 0.0, 0.0);
        Self {
            belt_speed: tuning.belt_start,
            tuning,
            lifecycle: Lifecycle::new(LevelId::Factory.reports_outcome()),
            cues,
            rng: Pcg32::seed_from_u64(seed),
            time_ms: 0.0,
            player_x: 0.0,
            camera_x: 0.0,
            zoom: 1.0,
            background_offset: 0.0,
            stack: 0.0,
            liberated: 0,
            items: Vec::new(),
            next_id: 0,
            last_spawn_ms: 0.0,
            last_decay_ms: 0.0,
            next_tap_alt: false,
            last_directional: None,
            revolution_active: false,
        }
    }

    pub fn tuning(&self) -> &FactoryTuning {
        &self.tuning
    }

    /// 0 at the start of the belt ramp, 1 at full speed
    pub fn progress(&self) -> f32 {
        let t = &self.tuning;
        ((self.belt_speed - t.belt_start) / (t.belt_max - t.belt_start)).max(0.0)
    }

    /// The end of the line is close
    pub fn show_warning(&self) -> bool {
        self.player_x > self.tuning.warning_x
    }

    /// Opacity of the mirror lanes before distance fade
    pub fn mirror_opacity(&self, directional: bool) -> f32 {
        let t = &self.tuning;
        let v = self.belt_speed;
        if directional {
            // Mirrors become real, only the initial fade-in applies
            return clamp01((v - t.belt_start) / 100.0);
        }
        let o = if v < t.mirror_show {
            0.0
        } else if v < t.mirror_peak {
            (v - t.mirror_show) / (t.mirror_peak - t.mirror_show)
        } else if v < t.mirror_fade {
            1.0
        } else if v < t.mirror_solo {
            1.0 - (v - t.mirror_fade) / (t.mirror_solo - t.mirror_fade)
        } else {
            0.0
        };
        clamp01(o)
    }

    /// Lane opacity for `offset` lanes away from the main belt
    pub fn lane_opacity(&self, offset: i32, directional: bool) -> f32 {
        if offset == 0 {
            return 1.0;
        }
        let fade = if directional {
            1.0
        } else {
            (1.0 - offset.abs() as f32 * 0.1).max(0.0)
        };
        self.mirror_opacity(directional) * fade
    }

    pub fn player_color(&self) -> Rgb {
        if self.revolution_active {
            ACCENT_COLOR
        } else {
            PLAYER_COLOR
        }
    }

    fn end(&mut self, outcome: Outcome) {
        if self.lifecycle.finish(outcome, self.tuning.epilogue_ms) {
            self.cues.set_volume(AudioKey::Level2Factory, 0.0, 2000.0);
            self.cues.set_volume(AudioKey::Level2Revolution, 0.0, 2000.0);
        }
    }

    fn handle_taps(&mut self, taps: u32) {
        for _ in 0..taps {
            self.stack += self.tuning.tap_impulse;
            let key = if self.next_tap_alt {
                AudioKey::Level2Tap2
            } else {
                AudioKey::Level2Tap1
            };
            self.cues.play_sound(key, self.tuning.tap_volume);
            self.next_tap_alt = !self.next_tap_alt;
        }
    }

    fn crossfade(&mut self, directional: bool) {
        if self.last_directional == Some(directional) {
            return;
        }
        self.last_directional = Some(directional);
        let (factory, revolution) = if directional { (0.0, 1.0) } else { (1.0, 0.0) };
        self.cues.set_volume(AudioKey::Level2Factory, factory, 500.0);
        self.cues.set_volume(AudioKey::Level2Revolution, revolution, 500.0);
    }

    fn release_one(&mut self) {
        // Latest first
        if let Some(item) = self.items.iter_mut().rev().find(|i| i.liberated) {
            item.liberated = false;
            item.y += (self.rng.random::<f32>() - 0.5) * 50.0;
        }
    }

    fn spawn_item(&mut self) {
        let shape = ShapeKind::ALL[self.rng.random_range(0..ShapeKind::ALL.len())];
        let x = self.camera_x - self.tuning.spawn_distance / self.zoom.max(0.1);
        let item = Workpiece {
            id: self.next_id,
            shape,
            x,
            y: self.rng.random::<f32>() * 60.0 - 30.0,
            speed_mult: 1.0 + self.rng.random::<f32>() * 0.3,
            rotation: self.rng.random::<f32>() * 360.0,
            liberated: false,
            orbit: None,
            morph: 0.0,
            opacity: 0.0,
            color_progress: 0.0,
        };
        self.next_id += 1;
        self.items.push(item);
    }

    fn new_orbit(rng: &mut Pcg32) -> Orbit {
        let dir = if rng.random::<f32>() > 0.5 { 1.0 } else { -1.0 };
        Orbit {
            radius: 60.0 + rng.random::<f32>() * 80.0,
            angle: rng.random::<f32>() * std::f32::consts::TAU,
            speed: dir * (1.0 + rng.random::<f32>() * 2.0),
            eccentricity: 0.5 + rng.random::<f32>() * 0.5,
            wobble: rng.random::<f32>() * 10.0,
        }
    }

    fn step_items(&mut self, directional: bool, dt_s: f32) {
        let now = self.time_ms;
        let belt = self.belt_speed;
        let player_x = self.player_x;
        let (capture_dx, capture_dy) = (self.tuning.capture_dx, self.tuning.capture_dy);

        for item in self.items.iter_mut() {
            if item.opacity < 1.0 && !item.liberated {
                item.opacity = (item.opacity + dt_s * 2.0).min(1.0);
            }
            if item.liberated {
                item.color_progress = (item.color_progress + 3.0 * dt_s).min(1.0);
                item.morph = (item.morph + 2.0 * dt_s).min(1.0);
                let orbit = item.orbit.get_or_insert_with(|| Self::new_orbit(&mut self.rng));
                orbit.angle += dt_s * orbit.speed;
                let cx = orbit.angle.cos() * orbit.radius * orbit.eccentricity;
                let cy = orbit.angle.sin() * orbit.radius;
                item.x = player_x + cx;
                item.y = cy + (now * 0.005 + orbit.wobble).sin() * 10.0;
                item.rotation += orbit.speed * 50.0 * dt_s;
                item.opacity = 1.0;
            } else {
                item.color_progress = (item.color_progress - 3.0 * dt_s).max(0.0);
                item.x += belt * item.speed_mult * dt_s;
                if directional
                    && (item.x - player_x).abs() < capture_dx
                    && item.y.abs() < capture_dy
                {
                    item.liberated = true;
                    item.orbit = None;
                }
            }
        }

        let horizon = self.camera_x + self.tuning.despawn_distance / self.zoom.max(0.01);
        self.items.retain(|i| i.x <= horizon);
        self.liberated = self.items.iter().filter(|i| i.liberated).count();
    }
}

impl Level for Factory {
    fn id(&self) -> LevelId {
        LevelId::Factory
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

    fn step(&mut self, input: &TickInput, dt_ms: f32) {
        // The line stops the moment an ending is reached
        if !self.lifecycle.is_running() {
            return;
        }
        let directional = input.directional;
        self.revolution_active = directional;
        self.handle_taps(input.taps);
        self.crossfade(directional);

        let dt_s = dt_ms / 1000.0;
        let new_time = self.time_ms + dt_ms;
        self.time_ms = new_time;

        let t = &self.tuning;
        let belt = (t.belt_start + new_time / t.belt_ramp_ms).min(t.belt_max);
        self.belt_speed = belt;

        let resistance = self.stack.clamp(0.0, t.max_tap_resistance);
        self.stack = (self.stack - t.stack_decay * dt_s).max(0.0);
        let push = if directional {
            belt + t.push_bonus + t.push_per_liberated * self.liberated as f32
        } else {
            0.0
        };
        self.player_x += (belt - resistance - push) * dt_s;

        // Followers drift away one at a time once the key is released
        if !directional && self.liberated > 0 {
            if new_time - self.last_decay_ms > self.tuning.decay_interval_ms {
                self.release_one();
                self.last_decay_ms = new_time;
            }
        } else {
            self.last_decay_ms = new_time;
        }

        let t = &self.tuning;
        let offset = self.player_x - self.camera_x;
        let target = if offset > t.camera_deadzone {
            self.player_x - t.camera_deadzone
        } else if offset < -t.camera_deadzone {
            self.player_x + t.camera_deadzone
        } else {
            self.camera_x
        };
        self.camera_x = lerp(self.camera_x, target, (t.camera_follow * dt_s).min(1.0));
        self.background_offset += belt * dt_s;

        let target_zoom = 1.0 - self.progress() * self.tuning.zoom_range;
        self.zoom += (target_zoom - self.zoom) * self.tuning.zoom_follow * dt_s;

        if new_time - self.last_spawn_ms > self.tuning.spawn_interval_ms {
            self.spawn_item();
            self.last_spawn_ms = new_time;
        }

        self.step_items(directional, dt_s);

        // Followers captured this tick already count
        let t = &self.tuning;
        let lost = self.player_x >= t.death_x;
        let survived = belt >= t.belt_max - t.survival_margin;
        let freed = self.liberated >= t.liberation_goal && directional;
        if lost {
            self.end(Outcome::Lose);
        } else if survived || freed {
            log::debug!("Factory won (survived={}, freed={})", survived, freed);
            self.end(Outcome::Win);
        }
    }

    fn teardown(&mut self) {
        self.cues.stop_track(AudioKey::Level2Factory, 1000.0);
        self.cues.stop_track(AudioKey::Level2Revolution, 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{ProptestConfig, any, prop_assert, proptest};
    use crate::sim::input::arb;
    use crate::sim::events::AudioCue;
    use crate::sim::lifecycle::Completion;

    fn run_until_terminal(level: &mut Factory, input: TickInput, max_ticks: usize) -> usize {
        for i in 0..max_ticks {
            level.tick(&input, 50.0);
            if !level.lifecycle().is_running() {
                return i;
            }
        }
        max_ticks
    }

    #[test]
    fn test_belt_ramp_caps() {
        let mut l = Factory::new(1, FactoryTuning::default());
        l.tick(&TickInput::held(false, false), 6000.0);
        assert!((l.belt_speed - 250.0).abs() < 1e-3);
        let mut l = Factory::new(1, FactoryTuning::default());
        l.player_x = -1.0e9;
        l.tick(&TickInput::held(false, false), 100_000.0);
        assert_eq!(l.belt_speed, 950.0);
    }

    #[test]
    fn test_idle_player_reaches_end_of_line() {
        let mut l = Factory::new(1, FactoryTuning::default());
        let ticks = run_until_terminal(&mut l, TickInput::default(), 2000);
        assert!(ticks < 2000);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
        assert!(l.player_x >= 900.0);
    }

    #[test]
    fn test_lose_beats_win_on_same_tick() {
        // Push bonus strong enough the other way that holding left still dies
        let tuning = FactoryTuning {
            push_bonus: -2000.0,
            liberation_goal: 0,
            ..FactoryTuning::default()
        };
        let mut l = Factory::new(2, tuning);
        l.player_x = 899.0;
        l.tick(&TickInput::held(false, true), 50.0);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
    }

    #[test]
    fn test_survival_win() {
        let tuning = FactoryTuning {
            death_x: f32::INFINITY,
            ..FactoryTuning::default()
        };
        let mut l = Factory::new(3, tuning);
        run_until_terminal(&mut l, TickInput::default(), 2000);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
        assert!(l.belt_speed >= 940.0);
    }

    #[test]
    fn test_liberation_win_needs_key_held() {
        let tuning = FactoryTuning {
            liberation_goal: 0,
            ..FactoryTuning::default()
        };
        let mut l = Factory::new(4, tuning.clone());
        l.tick(&TickInput::default(), 16.0);
        assert!(l.lifecycle().is_running());
        l.tick(&TickInput::held(false, true), 16.0);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
    }

    #[test]
    fn test_taps_stack_resistance_and_alternate_sounds() {
        let mut l = Factory::new(5, FactoryTuning::default());
        l.drain_cues();
        l.tick(&TickInput { primary: true, directional: false, taps: 3 }, 0.0);
        assert!((l.stack - 90.0).abs() < 1e-4);
        let sounds: Vec<AudioKey> = l
            .drain_cues()
            .into_iter()
            .filter_map(|c| match c {
                AudioCue::PlaySound { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(sounds, vec![AudioKey::Level2Tap1, AudioKey::Level2Tap2, AudioKey::Level2Tap1]);
    }

    #[test]
    fn test_holding_left_walks_against_the_flow() {
        let mut l = Factory::new(6, FactoryTuning::default());
        for _ in 0..20 {
            l.tick(&TickInput::held(false, true), 50.0);
        }
        assert!(l.player_x < -400.0);
        assert!(l.player_color() == ACCENT_COLOR);
    }

    #[test]
    fn test_items_spawn_and_get_captured() {
        let mut l = Factory::new(7, FactoryTuning::default());
        // First spawn comes after the interval
        for _ in 0..70 {
            l.tick(&TickInput::held(false, true), 50.0);
        }
        assert!(!l.items.is_empty());
        let mut captured = false;
        for _ in 0..400 {
            l.tick(&TickInput::held(false, true), 50.0);
            if l.liberated > 0 {
                captured = true;
                break;
            }
        }
        assert!(captured);
        let follower = l.items.iter().find(|i| i.liberated).expect("captured item");
        assert!((follower.x - l.player_x).abs() <= 140.0 + 1e-3);
    }

    fn loose_item(id: u32, x: f32) -> Workpiece {
        Workpiece {
            id,
            shape: ShapeKind::Triangle,
            x,
            y: 0.0,
            speed_mult: 1.0,
            rotation: 0.0,
            liberated: false,
            orbit: None,
            morph: 0.0,
            opacity: 1.0,
            color_progress: 0.0,
        }
    }

    #[test]
    fn test_capture_wins_on_the_same_tick() {
        let tuning = FactoryTuning {
            liberation_goal: 1,
            ..FactoryTuning::default()
        };
        let mut l = Factory::new(12, tuning);
        l.items.push(loose_item(0, 0.0));
        l.tick(&TickInput::held(false, true), 16.0);
        assert_eq!(l.liberated, 1);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
    }

    #[test]
    fn test_followers_decay_one_per_interval() {
        let mut l = Factory::new(8, FactoryTuning::default());
        for i in 0..3 {
            l.items.push(Workpiece {
                id: i,
                shape: ShapeKind::Star,
                x: 0.0,
                y: 0.0,
                speed_mult: 1.0,
                rotation: 0.0,
                liberated: true,
                orbit: None,
                morph: 0.0,
                opacity: 1.0,
                color_progress: 0.0,
            });
        }
        l.tick(&TickInput::held(false, true), 16.0);
        assert_eq!(l.liberated, 3);
        // 1.1 s released: exactly one drops, the latest
        l.tick(&TickInput::default(), 1100.0);
        assert!(!l.items[2].liberated);
        assert!(l.items[0].liberated && l.items[1].liberated);
        assert_eq!(l.liberated, 2);
    }

    #[test]
    fn test_mirror_opacity_thresholds() {
        let mut l = Factory::new(9, FactoryTuning::default());
        let mut at = |speed: f32, dir: bool| {
            l.belt_speed = speed;
            l.mirror_opacity(dir)
        };
        assert_eq!(at(150.0, false), 0.0);
        assert!((at(300.0, false) - 0.5).abs() < 1e-6);
        assert_eq!(at(500.0, false), 1.0);
        assert!((at(775.0, false) - 0.5).abs() < 1e-6);
        assert_eq!(at(900.0, false), 0.0);
        assert!((at(200.0, true) - 0.5).abs() < 1e-6);
        assert_eq!(at(900.0, true), 1.0);
    }

    #[test]
    fn test_epilogue_then_completion() {
        let mut l = Factory::new(10, FactoryTuning::default());
        l.player_x = 10_000.0;
        assert_eq!(l.tick(&TickInput::default(), 16.0), None);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
        assert_eq!(l.tick(&TickInput::default(), 3000.0), None);
        assert_eq!(l.tick(&TickInput::default(), 1000.0), Some(Completion { success: true }));
        assert_eq!(l.tick(&TickInput::default(), 1000.0), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_belt_and_camera_stay_bounded(
            seed in any::<u64>(),
            start_ms in 0.0f32..47_000.0,
            run in arb::ticks(400),
        ) {
            let mut l = Factory::new(seed, FactoryTuning::default());
            l.time_ms = start_ms;
            for (input, dt) in run {
                l.tick(&input, dt);
                prop_assert!((0.05..=1.0).contains(&l.zoom));
                prop_assert!((0.0..=1.0).contains(&l.progress()));
                prop_assert!(l.belt_speed <= l.tuning().belt_max);
                prop_assert!(l.stack >= 0.0);
                prop_assert!((0.0..=1.0).contains(&l.mirror_opacity(input.directional)));
                prop_assert!(l.liberated <= l.items.len());
            }
        }
    }
}
