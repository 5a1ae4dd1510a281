//! Level 1: the classroom
//!
//! Ten students drift toward whatever shape the teacher currently is. The
//! player fights the drift with the primary key (hold, later tap) until a
//! despair window where nothing helps. Holding the directional key builds a
//! rebellion that, once full, sends a red wave through the room.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{AudioKey, CueQueue};
use super::input::TickInput;
use super::level::{Level, LevelId};
use super::lifecycle::{Lifecycle, Outcome};
use super::morph::{Outline, Rgb, ShapeKind, interpolate_outline};
use crate::clamp01;
use crate::tuning::ConformityTuning;

pub const PLAYER_COLOR: Rgb = Rgb::hex(0x10b981);
pub const STUDENT_COLOR: Rgb = Rgb::hex(0x525252);
pub const REVOLUTION_COLOR: Rgb = Rgb::hex(0xef4444);

/// Students per row in the classroom grid
pub const ROW_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teacher {
    pub shape: ShapeKind,
    pub color: Rgb,
}

pub const TEACHERS: [Teacher; 4] = [
    Teacher {
        shape: ShapeKind::Square,
        color: Rgb::hex(0x8b5cf6),
    },
    Teacher {
        shape: ShapeKind::Triangle,
        color: Rgb::hex(0x3b82f6),
    },
    Teacher {
        shape: ShapeKind::Circle,
        color: Rgb::hex(0xd946ef),
    },
    Teacher {
        shape: ShapeKind::Hexagon,
        color: Rgb::hex(0xf59e0b),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Holding primary pushes conformity back
    Hold,
    /// Each tap knocks a fixed amount off
    Tap,
}

#[derive(Debug, Clone)]
pub struct Student {
    /// The shape this student really is
    pub original: ShapeKind,
    /// Shape at the start of the current teacher cycle
    pub visual_start: ShapeKind,
    pub color: Rgb,
    /// 0 = own shape, 1 = teacher's shape
    pub conformity: f32,
    pub base_speed: f32,
    pub rotation_offset: f32,
    pub is_player: bool,
}

impl Student {
    /// Current outline and fill against the given teacher
    pub fn appearance(&self, teacher: &Teacher, revolution: bool) -> (Outline, Rgb) {
        let t = if revolution { 0.0 } else { self.conformity };
        (
            interpolate_outline(self.visual_start, teacher.shape, t),
            self.color.lerp(teacher.color, t),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Conformity {
    tuning: ConformityTuning,
    lifecycle: Lifecycle,
    cues: CueQueue,

    pub time_ms: f32,
    pub phase: Phase,
    pub students: Vec<Student>,
    pub teacher_index: usize,
    /// Remaining time of the current teacher change
    pub switching_ms: f32,

    pub rebellion: f32,
    pub revolution_complete: bool,
    /// Revolution wave radius in grid units
    pub wave_radius: f32,
    all_red_since: Option<f32>,

    /// Eased primary-key state used to duck the routine track
    pub focus: f32,
    pub taps_seen: u32,
}

impl Conformity {
    pub fn new(seed: u64, tuning: ConformityTuning) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let count = tuning.student_count;
        let player = count - 1;
        let students = (0..count)
            .map(|i| {
                let is_player = i == player;
                let original = if is_player {
                    ShapeKind::Circle
                } else {
                    match ShapeKind::ALL[i % ShapeKind::ALL.len()] {
                        ShapeKind::Square => ShapeKind::Diamond,
                        s => s,
                    }
                };
                Student {
                    original,
                    visual_start: original,
                    color: if is_player { PLAYER_COLOR } else { STUDENT_COLOR },
                    conformity: 0.0,
                    base_speed: tuning.npc_speed_min + rng.random::<f32>() * tuning.npc_speed_range,
                    rotation_offset: rng.random::<f32>() * 360.0,
                    is_player,
                }
            })
            .collect();

        let mut cues = CueQueue::default();
        cues.play_track(AudioKey::Level1Routine, 1.0, 2000.0);
        cues.play_track(AudioKey::Level1Resistance, 0.0, 0.0);

        Self {
            tuning,
            lifecycle: Lifecycle::new(LevelId::Conformity.reports_outcome()),
            cues,
            time_ms: 0.0,
            phase: Phase::Hold,
            students,
            teacher_index: 0,
            switching_ms: 0.0,
            rebellion: 0.0,
            revolution_complete: false,
            wave_radius: 0.0,
            all_red_since: None,
            focus: 0.0,
            taps_seen: 0,
        }
    }

    pub fn teacher(&self) -> &Teacher {
        &TEACHERS[self.teacher_index % TEACHERS.len()]
    }

    pub fn is_switching(&self) -> bool {
        self.switching_ms > 0.0
    }

    pub fn player(&self) -> &Student {
        &self.students[self.player_index()]
    }

    pub fn player_index(&self) -> usize {
        self.students.len() - 1
    }

    /// Player tint drifts to red as rebellion builds
    pub fn player_display_color(&self) -> Rgb {
        PLAYER_COLOR.lerp(REVOLUTION_COLOR, self.rebellion)
    }

    /// Teacher fades into the background while the class rebels
    pub fn teacher_opacity(&self) -> f32 {
        1.0 - self.rebellion
    }

    /// Grid distance from the front of the room to a seat
    pub fn wave_distance(index: usize) -> f32 {
        let row = (index / ROW_LEN) as f32;
        let col = (index % ROW_LEN) as f32;
        ((row + 1.0).powi(2) + (col - 2.0).powi(2)).sqrt()
    }

    pub fn is_despair(&self) -> bool {
        self.time_ms > self.tuning.duration_ms - self.tuning.despair_window_ms
    }

    fn end(&mut self, outcome: Outcome) {
        if self.lifecycle.finish(outcome, self.tuning.epilogue_ms) {
            self.cues.set_volume(AudioKey::Level1Routine, 0.0, 2000.0);
            self.cues.set_volume(AudioKey::Level1Resistance, 0.0, 2000.0);
        }
    }

    fn switch_teacher(&mut self, next: usize) {
        let outgoing = self.teacher().shape;
        self.teacher_index = next % TEACHERS.len();
        self.switching_ms = self.tuning.switching_ms;
        log::debug!(
            "Teacher switch at {:.0} ms: {:?} -> {:?}",
            self.time_ms,
            outgoing,
            self.teacher().shape
        );
        for s in self.students.iter_mut() {
            // The player snaps back to itself; everyone else keeps the residue
            s.visual_start = if s.is_player { s.original } else { outgoing };
            s.conformity = 0.0;
        }
    }

    fn step_rebellion(&mut self, input: &TickInput, dt_ms: f32, new_time: f32) {
        let t = &self.tuning;
        if !self.revolution_complete {
            if input.directional {
                self.rebellion += t.rebellion_rise_per_ms * dt_ms;
            } else {
                self.rebellion -= t.rebellion_decay_per_ms * dt_ms;
            }
            self.rebellion = clamp01(self.rebellion);
            if self.rebellion >= 1.0 {
                self.revolution_complete = true;
                log::info!("Revolution at {:.0} ms", new_time);
            }
            return;
        }

        let hold_ms = t.all_red_hold_ms;
        self.wave_radius += t.wave_speed * dt_ms / 1000.0;
        if self.wave_radius > t.wave_full_radius {
            match self.all_red_since {
                None => self.all_red_since = Some(new_time),
                Some(since) if new_time > since + hold_ms => self.end(Outcome::Win),
                Some(_) => {}
            }
        }
    }

    fn step_students(&mut self, input: &TickInput, dt_ms: f32) -> f32 {
        let now = self.time_ms;

        if self.revolution_complete {
            let radius = self.wave_radius;
            for (i, s) in self.students.iter_mut().enumerate() {
                if radius > Self::wave_distance(i) {
                    s.color = REVOLUTION_COLOR;
                    s.visual_start = ShapeKind::Circle;
                    s.conformity = 0.0;
                }
            }
            return 0.0;
        }

        let despair = self.is_despair();
        let t = &self.tuning;
        let phase = self.phase;
        let rebellion = self.rebellion;
        let time_mult = 1.0 + now / t.duration_ms;
        let mut player_conformity = 0.0;

        for s in self.students.iter_mut() {
            let mut c = s.conformity;
            if s.is_player {
                if despair {
                    c += t.despair_rate_per_ms * dt_ms;
                } else {
                    match phase {
                        Phase::Hold if input.primary => c -= t.hold_relief_per_ms * dt_ms,
                        Phase::Hold => c += (s.base_speed + t.base_difficulty) * time_mult * dt_ms,
                        Phase::Tap => {
                            let p = (now - t.phase_switch_ms) / (t.duration_ms - t.phase_switch_ms);
                            c += (s.base_speed + t.base_difficulty) * (1.0 + p * 0.5) * dt_ms;
                            c -= t.tap_power * input.taps as f32;
                        }
                    }
                    if rebellion > 0.0 {
                        c -= t.rebellion_relief_per_ms * dt_ms * rebellion;
                    }
                }
            } else {
                c += s.base_speed * time_mult * dt_ms;
            }
            s.conformity = clamp01(c);
            if s.is_player {
                player_conformity = s.conformity;
            }
        }

        if player_conformity >= 1.0 {
            self.end(Outcome::Lose);
        }
        player_conformity
    }

    fn step_audio(&mut self, input: &TickInput, dt_ms: f32, player_conformity: f32) {
        let target = if input.primary { 1.0 } else { 0.0 };
        self.focus = clamp01(self.focus + (target - self.focus) * self.tuning.focus_rate * dt_ms / 1000.0);
        let routine = (1.0 - player_conformity.sqrt())
            * (1.0 - self.focus * self.tuning.focus_duck)
            * (1.0 - self.rebellion);
        self.cues.set_volume(AudioKey::Level1Routine, routine, 0.0);
        self.cues.set_volume(AudioKey::Level1Resistance, self.rebellion, 0.0);
    }
}

impl Level for Conformity {
    fn id(&self) -> LevelId {
        LevelId::Conformity
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
        // A loss freezes the room; a revolution keeps its wave rolling
        if self.lifecycle.outcome() == Some(Outcome::Lose) {
            return;
        }
        let previous = self.time_ms;
        let new_time = previous + dt_ms;
        self.time_ms = new_time;
        self.taps_seen += input.taps;
        self.switching_ms = (self.switching_ms - dt_ms).max(0.0);

        self.step_rebellion(input, dt_ms, new_time);

        if new_time >= self.tuning.duration_ms && !self.revolution_complete {
            self.end(Outcome::Lose);
            return;
        }

        if !self.revolution_complete {
            if new_time >= self.tuning.phase_switch_ms && self.phase == Phase::Hold {
                self.phase = Phase::Tap;
                log::debug!("Tap phase begins");
            }
            let interval = self.tuning.teacher_switch_ms;
            let before = (previous / interval).floor() as usize;
            let after = (new_time / interval).floor() as usize;
            if after > before && !self.is_switching() {
                self.switch_teacher(after);
            }
        }

        let player_conformity = self.step_students(input, dt_ms);

        if self.lifecycle.is_running() {
            self.step_audio(input, dt_ms, player_conformity);
        }
    }

    fn teardown(&mut self) {
        self.cues.stop_track(AudioKey::Level1Routine, 1000.0);
        self.cues.stop_track(AudioKey::Level1Resistance, 1000.0);
    }
}
