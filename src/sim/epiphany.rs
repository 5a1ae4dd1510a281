//! Level 5: the epiphany
//!
//! A square crowd grows by one row and column per stage with the player at
//! its center. Every jump throws the crowd to the right; more and more of it
//! peels off and flows away to the left. At the last stage time slows down
//! and the player chooses: jump again, or step out.

use glam::Vec2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{AudioKey, CueQueue};
use super::input::{EdgeDetector, TickInput};
use super::level::{Level, LevelId};
use super::lifecycle::{Lifecycle, Outcome};
use crate::frame_decay;
use crate::tuning::EpiphanyTuning;

/// Distance between grid cells in world units
pub const GRID_GAP: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub grid_index: usize,
    pub is_player: bool,
    pub is_red: bool,
    /// Marked balls drift left for good
    pub moving_left: bool,
    pub x_offset: f32,
    pub vx: f32,
}

impl Ball {
    fn new(grid_index: usize, is_player: bool) -> Self {
        Self {
            grid_index,
            is_player,
            is_red: false,
            moving_left: false,
            x_offset: 0.0,
            vx: 0.0,
        }
    }

    fn marked(&self) -> bool {
        self.is_red || self.moving_left
    }
}

#[derive(Debug, Clone)]
pub struct Epiphany {
    tuning: EpiphanyTuning,
    lifecycle: Lifecycle,
    cues: CueQueue,
    rng: Pcg32,
    edge: EdgeDetector,

    pub stage: u32,
    pub balls: Vec<Ball>,
    /// Jumps made in the current stage
    pub jumps: u32,
    /// Camera snaps to the player
    pub final_hint: bool,
    /// Slow-motion choice at the end of the last stage
    pub final_choice: bool,
    pub chosen_freedom: bool,
    /// Primary must be seen released before it counts as a choice
    release_seen: bool,
    clock_ms: f32,
    last_jump_ms: Option<f32>,
    pending_stage: Option<(u32, f32)>,
    pending_final_ms: Option<f32>,
}

pub fn grid_side(stage: u32, max_stage: u32) -> u32 {
    stage.min(max_stage).max(1)
}

pub fn player_index(side: u32) -> usize {
    (side * side / 2) as usize
}

impl Epiphany {
    pub fn new(seed: u64, tuning: EpiphanyTuning) -> Self {
        let mut cues = CueQueue::default();
        cues.play_track(AudioKey::Level5Epiphany, 0.8, 2000.0);
        let mut level = Self {
            tuning,
            lifecycle: Lifecycle::new(LevelId::Epiphany.reports_outcome()),
            cues,
            rng: Pcg32::seed_from_u64(seed),
            edge: EdgeDetector::default(),
            stage: 1,
            balls: Vec::new(),
            jumps: 0,
            final_hint: false,
            final_choice: false,
            chosen_freedom: false,
            release_seen: false,
            clock_ms: 0.0,
            last_jump_ms: None,
            pending_stage: None,
            pending_final_ms: None,
        };
        level.enter_stage(1);
        level
    }

    fn enter_stage(&mut self, stage: u32) {
        self.stage = stage;
        let side = grid_side(stage, self.tuning.max_stage);
        let player = player_index(side);
        self.balls = (0..(side * side) as usize)
            .map(|i| Ball::new(i, i == player))
            .collect();
        self.jumps = 0;
        log::info!("Epiphany stage {} ({}x{})", stage, side, side);
    }

    pub fn side(&self) -> u32 {
        grid_side(self.stage, self.tuning.max_stage)
    }

    pub fn player(&self) -> Option<&Ball> {
        self.balls.iter().find(|b| b.is_player)
    }

    /// World position of a ball, grid centered on the origin
    pub fn ball_position(&self, ball: &Ball) -> Vec2 {
        let side = self.side() as usize;
        let start = -((side - 1) as f32) * GRID_GAP / 2.0;
        let row = ball.grid_index / side;
        let col = ball.grid_index % side;
        Vec2::new(
            start + col as f32 * GRID_GAP + ball.x_offset,
            start + row as f32 * GRID_GAP,
        )
    }

    /// Camera zoom: pulls out as the crowd grows, snaps in for the finale
    pub fn zoom(&self) -> f32 {
        if self.final_hint {
            1.4
        } else {
            (1.0 - (self.stage as f32 - 2.0) * 0.08).max(0.4)
        }
    }

    /// Point the camera centers on
    pub fn camera_focus(&self) -> Vec2 {
        match (self.final_hint, self.player()) {
            (true, Some(p)) => self.ball_position(p),
            _ => Vec2::ZERO,
        }
    }

    pub fn unmarked_crowd(&self) -> usize {
        self.balls.iter().filter(|b| !b.is_player && !b.marked()).count()
    }

    fn mark_random(&mut self, count: usize) {
        let mut candidates: Vec<usize> = self
            .balls
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_player && !b.marked())
            .map(|(i, _)| i)
            .collect();
        candidates.shuffle(&mut self.rng);
        for &i in candidates.iter().take(count) {
            self.balls[i].is_red = true;
            self.balls[i].moving_left = true;
        }
    }

    fn schedule_final(&mut self) {
        self.final_hint = true;
        if self.pending_final_ms.is_none() && !self.final_choice {
            self.pending_final_ms = Some(self.tuning.final_delay_ms);
        }
    }

    fn jump(&mut self) {
        self.last_jump_ms = Some(self.clock_ms);

        let force = self.tuning.lurch_force;
        let jitter = self.tuning.lurch_jitter;
        for ball in self.balls.iter_mut().filter(|b| !b.moving_left) {
            ball.vx = force + self.rng.random::<f32>() * jitter;
        }

        // Waiting for the next stage: the crowd still lurches
        if self.pending_stage.is_some() {
            return;
        }

        self.jumps += 1;
        let max = self.tuning.max_stage;
        if self.stage < max {
            if self.jumps >= self.stage {
                let delay = if self.stage >= 3 {
                    self.mark_random(self.stage.div_ceil(2) as usize);
                    self.tuning.stage_delay_long_ms
                } else {
                    self.tuning.stage_delay_short_ms
                };
                self.pending_stage = Some((self.stage + 1, delay));
                return;
            }
            if self.stage >= 4 {
                self.mark_random(1);
            }
        } else {
            self.mark_random((self.jumps * 2) as usize);
            if self.jumps >= max || self.unmarked_crowd() == 0 {
                self.schedule_final();
            }
        }
    }

    fn run_timers(&mut self, dt_ms: f32) {
        if let Some((stage, remaining)) = self.pending_stage {
            let remaining = remaining - dt_ms;
            if remaining <= 0.0 {
                self.pending_stage = None;
                self.enter_stage(stage);
            } else {
                self.pending_stage = Some((stage, remaining));
            }
        }
        if let Some(remaining) = self.pending_final_ms {
            let remaining = remaining - dt_ms;
            if remaining <= 0.0 {
                self.pending_final_ms = None;
                self.final_choice = true;
                self.release_seen = false;
                log::info!("Final choice");
            } else {
                self.pending_final_ms = Some(remaining);
            }
        }
    }

    fn end(&mut self, outcome: Outcome) {
        if self.lifecycle.finish(outcome, self.tuning.epilogue_ms) {
            self.cues.set_volume(AudioKey::Level5Epiphany, 0.0, 3000.0);
        }
    }

    fn step_crowd(&mut self, directional: bool, dt_s: f32) {
        let t = &self.tuning;
        let mut player_x = None;
        for ball in self.balls.iter_mut() {
            if ball.vx.abs() > 1.0 {
                ball.x_offset += ball.vx * dt_s;
                ball.vx -= ball.vx * t.friction * dt_s;
            } else {
                ball.vx = 0.0;
            }

            if ball.is_player {
                if directional {
                    ball.x_offset -= t.resistance_speed * dt_s;
                    ball.is_red = true;
                } else {
                    let x = ball.x_offset;
                    if x > 1.0 {
                        ball.x_offset = (x - t.return_speed * dt_s).max(0.0);
                    } else if x < -1.0 {
                        // The pull back from the left is weaker
                        ball.x_offset = (x + t.return_speed * 0.5 * dt_s).min(0.0);
                    }
                    ball.is_red = false;
                }
                player_x = Some(ball.x_offset);
            } else if ball.moving_left {
                ball.x_offset -= t.red_speed * dt_s;
            } else if ball.x_offset > 0.0 {
                ball.x_offset = (ball.x_offset - t.return_speed * dt_s).max(0.0);
            }
        }

        if player_x.is_some_and(|x| x < self.tuning.liberation_threshold) {
            log::info!("Broke away before the final stage");
            self.end(Outcome::Win);
        }
    }

    fn step_final(&mut self, input: &TickInput, dt_s: f32) {
        if !input.primary {
            self.release_seen = true;
        }
        if self.release_seen && !self.chosen_freedom {
            if input.primary {
                self.end(Outcome::Lose);
                return;
            }
            if input.directional {
                log::info!("Freedom chosen");
                self.chosen_freedom = true;
            }
        }

        let t = &self.tuning;
        let dilation = t.time_dilation;
        let decay = frame_decay(t.final_impulse_decay, dt_s);
        let mut player_x = None;
        for ball in self.balls.iter_mut() {
            if ball.is_player {
                if self.chosen_freedom {
                    // The player alone moves at full speed
                    ball.x_offset -= t.freedom_speed * dt_s;
                    ball.is_red = true;
                } else {
                    ball.x_offset += ball.vx * dt_s * dilation;
                }
                player_x = Some(ball.x_offset);
            } else if ball.marked() {
                ball.x_offset -= t.red_speed * dt_s * dilation;
            }
            ball.vx *= decay;
        }

        if self.chosen_freedom && player_x.is_some_and(|x| x < self.tuning.final_threshold) {
            self.end(Outcome::Win);
        }
    }
}

impl Level for Epiphany {
    fn id(&self) -> LevelId {
        LevelId::Epiphany
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
        if !self.lifecycle.is_running() {
            return;
        }
        let dt_s = dt_ms / 1000.0;
        self.clock_ms += dt_ms;
        self.run_timers(dt_ms);

        if self.final_choice {
            self.step_final(input, dt_s);
            return;
        }

        if self.edge.pressed(input) {
            let ready = self
                .last_jump_ms
                .is_none_or(|last| self.clock_ms - last > self.tuning.jump_cooldown_ms);
            if ready {
                self.jump();
            }
        }

        self.step_crowd(input.directional, dt_s);
    }

    fn teardown(&mut self) {
        self.cues.stop_track(AudioKey::Level5Epiphany, 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{ProptestConfig, any, prop_assert, proptest};
    use crate::sim::input::arb;
    use crate::sim::events::AudioCue;
    use crate::sim::lifecycle::Completion;

    fn level() -> Epiphany {
        Epiphany::new(5, EpiphanyTuning::default())
    }

    fn run_until_complete(l: &mut Epiphany, input: TickInput) -> Option<Completion> {
        for _ in 0..1000 {
            if let Some(c) = l.tick(&input, 100.0) {
                return Some(c);
            }
        }
        None
    }

    /// Mark every crowd member so the next jump opens the finale
    fn ready_finale(l: &mut Epiphany) {
        l.enter_stage(l.tuning.max_stage);
        for ball in l.balls.iter_mut().filter(|b| !b.is_player) {
            ball.is_red = true;
            ball.moving_left = true;
        }
        l.tick(&TickInput::tap(), 16.0);
        assert!(l.final_hint);
        assert!(!l.final_choice);
    }

    #[test]
    fn test_grid_layout() {
        assert_eq!(grid_side(1, 10), 1);
        assert_eq!(grid_side(12, 10), 10);
        assert_eq!(player_index(1), 0);
        assert_eq!(player_index(2), 2);
        assert_eq!(player_index(3), 4);
        assert_eq!(player_index(10), 50);

        let mut l = level();
        l.enter_stage(3);
        assert_eq!(l.balls.len(), 9);
        let p = *l.player().expect("player");
        assert_eq!(p.grid_index, 4);
        assert_eq!(l.ball_position(&p), Vec2::ZERO);
    }

    #[test]
    fn test_first_jump_advances_stage() {
        let mut l = level();
        l.tick(&TickInput::tap(), 16.0);
        assert_eq!(l.jumps, 1);
        assert_eq!(l.stage, 1);
        for _ in 0..3 {
            l.tick(&TickInput::default(), 100.0);
        }
        assert_eq!(l.stage, 2);
        assert_eq!(l.balls.len(), 4);
        assert_eq!(l.jumps, 0);
    }

    #[test]
    fn test_jump_cooldown() {
        let mut l = level();
        l.enter_stage(5);
        l.tick(&TickInput::tap(), 16.0);
        l.tick(&TickInput::tap(), 100.0);
        assert_eq!(l.jumps, 1);
        l.tick(&TickInput::default(), 600.0);
        l.tick(&TickInput::tap(), 16.0);
        assert_eq!(l.jumps, 2);
        // Stage 4 and above mark one ball per jump
        assert_eq!(l.balls.iter().filter(|b| b.moving_left).count(), 2);
    }

    #[test]
    fn test_lurch_skips_marked_balls() {
        let mut l = level();
        l.enter_stage(4);
        l.balls[0].moving_left = true;
        l.balls[0].is_red = true;
        l.jump();
        assert_eq!(l.balls[0].vx, 0.0);
        for b in l.balls.iter().filter(|b| !b.moving_left) {
            assert!((900.0..=1000.0).contains(&b.vx));
        }
    }

    #[test]
    fn test_stage_three_marks_and_waits() {
        let mut l = level();
        l.enter_stage(3);
        for _ in 0..3 {
            l.jump();
            l.last_jump_ms = None;
        }
        assert_eq!(l.balls.iter().filter(|b| b.moving_left).count(), 2);
        assert_eq!(l.pending_stage, Some((4, 1200.0)));
        // Jumps while waiting do not count
        l.jump();
        assert_eq!(l.jumps, 3);
    }

    #[test]
    fn test_player_returns_to_formation() {
        let mut l = level();
        let idx = player_index(1);
        l.balls[idx].x_offset = 100.0;
        l.tick(&TickInput::default(), 100.0);
        assert!((l.balls[idx].x_offset - 40.0).abs() < 1e-4);
        l.balls[idx].x_offset = -100.0;
        l.tick(&TickInput::default(), 100.0);
        assert!((l.balls[idx].x_offset + 70.0).abs() < 1e-4);
        l.balls[idx].x_offset = 30.0;
        l.tick(&TickInput::default(), 100.0);
        assert_eq!(l.balls[idx].x_offset, 0.0);
    }

    #[test]
    fn test_resisting_early_wins() {
        let mut l = level();
        let completion = run_until_complete(&mut l, TickInput::held(false, true));
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Win));
        assert_eq!(completion, Some(Completion { success: true }));
        assert!(!l.final_choice);
    }

    #[test]
    fn test_finale_waits_for_release_then_primary_loses() {
        let mut l = level();
        ready_finale(&mut l);
        for _ in 0..10 {
            l.tick(&TickInput::held(true, false), 100.0);
        }
        assert!(l.final_choice);
        assert!(l.lifecycle().is_running());
        l.tick(&TickInput::default(), 16.0);
        l.tick(&TickInput::held(true, false), 16.0);
        assert_eq!(l.lifecycle().outcome(), Some(Outcome::Lose));
        let completion = run_until_complete(&mut l, TickInput::default());
        assert_eq!(completion, Some(Completion { success: false }));
    }

    #[test]
    fn test_chosen_freedom_is_permanent_and_wins() {
        let mut l = level();
        ready_finale(&mut l);
        for _ in 0..7 {
            l.tick(&TickInput::default(), 100.0);
        }
        assert!(l.final_choice);
        l.tick(&TickInput::held(false, true), 16.0);
        assert!(l.chosen_freedom);
        // Primary no longer loses once freedom is chosen
        for _ in 0..5 {
            l.tick(&TickInput::held(true, false), 16.0);
            assert!(l.chosen_freedom);
            assert!(l.lifecycle().outcome() != Some(Outcome::Lose));
        }
        let completion = run_until_complete(&mut l, TickInput::default());
        assert_eq!(completion, Some(Completion { success: true }));
        assert!(l.player().expect("player").x_offset < -1200.0);
    }

    #[test]
    fn test_finale_time_is_dilated() {
        let mut l = level();
        ready_finale(&mut l);
        for _ in 0..7 {
            l.tick(&TickInput::default(), 100.0);
        }
        let idx = l.balls.iter().position(|b| !b.is_player).expect("crowd");
        let before = l.balls[idx].x_offset;
        l.tick(&TickInput::default(), 100.0);
        // 400 * 0.1 * 0.2
        assert!((before - l.balls[idx].x_offset - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_audio_fades_on_end() {
        let mut l = level();
        l.drain_cues();
        l.end(Outcome::Win);
        assert_eq!(
            l.drain_cues(),
            vec![AudioCue::SetTrackVolume {
                key: AudioKey::Level5Epiphany,
                volume: 0.0,
                fade_ms: 3000.0,
            }]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_stage_never_passes_the_last(
            seed in any::<u64>(),
            run in arb::ticks(600),
        ) {
            let mut l = Epiphany::new(seed, EpiphanyTuning::default());
            let max_stage = l.tuning.max_stage;
            let mut freed = false;
            for (input, dt) in run {
                l.tick(&input, dt);
                prop_assert!((1..=max_stage).contains(&l.stage));
                prop_assert!(l.zoom() >= 0.4);
                prop_assert!(!l.final_choice || l.stage == max_stage);
                prop_assert!(!freed || l.chosen_freedom);
                freed = l.chosen_freedom;
            }
        }
    }
}
