//! Screen sequencing
//!
//! Home → Transition → Level 1 → Transition → … → Level 5 → Home.
//! Level select jumps straight to any level. Only a won level 5 writes the
//! awakened flag, which changes the home screen's reflection.

use crate::consts::{HOME_FADE_MS, TRANSITION_MS};
use crate::persistence::{FlagStore, load_awakened, save_awakened};
use crate::settings::Settings;
use crate::sim::{
    AudioCue, Completion, EdgeDetector, LevelId, LevelSim, TickInput, validate_shape_table,
};
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    /// Title screen; `fading_ms` counts down once the player has started
    Home { fading_ms: Option<f32> },
    LevelSelect,
    /// Tunnel between levels
    Transition { remaining_ms: f32 },
    Gameplay,
}

pub struct ScreenRouter {
    screen: Screen,
    level: LevelId,
    sim: Option<LevelSim>,
    awakened: bool,
    store: Box<dyn FlagStore>,
    tuning: Tuning,
    settings: Settings,
    next_seed: u64,
    start_edge: EdgeDetector,
}

impl ScreenRouter {
    pub fn new(store: Box<dyn FlagStore>, tuning: Tuning, settings: Settings, seed: u64) -> Self {
        if let Err(e) = validate_shape_table() {
            log::error!("Shape table is broken: {}", e);
        }
        let awakened = load_awakened(store.as_ref());
        log::info!("Router ready (awakened={})", awakened);
        Self {
            screen: Screen::Home { fading_ms: None },
            level: LevelId::Conformity,
            sim: None,
            awakened,
            store,
            tuning,
            settings,
            next_seed: seed,
            start_edge: EdgeDetector::default(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Level that is playing, or will play after the next transition
    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn sim(&self) -> Option<&LevelSim> {
        self.sim.as_ref()
    }

    pub fn awakened(&self) -> bool {
        self.awakened
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mirrored title on the home screen
    pub fn reflection_text(&self) -> &'static str {
        if self.awakened { "MAKS" } else { "MASK" }
    }

    /// Home screen opacity during the fade out, 1 when idle
    pub fn home_opacity(&self) -> f32 {
        match self.screen {
            Screen::Home {
                fading_ms: Some(remaining),
            } => (remaining / HOME_FADE_MS).clamp(0.0, 1.0),
            _ => 1.0,
        }
    }

    pub fn open_level_select(&mut self) {
        if matches!(self.screen, Screen::Home { .. }) {
            self.screen = Screen::LevelSelect;
        }
    }

    /// Pick a level from the select screen
    pub fn select_level(&mut self, id: LevelId) {
        if self.screen != Screen::LevelSelect {
            log::warn!("Level select outside the select screen ignored");
            return;
        }
        log::info!("Selected level {}", id.number());
        self.level = id;
        self.begin_transition();
    }

    fn begin_transition(&mut self) {
        self.screen = Screen::Transition {
            remaining_ms: TRANSITION_MS,
        };
    }

    fn mount(&mut self) {
        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);
        self.sim = Some(LevelSim::new(self.level, seed, &self.tuning, &self.settings));
        self.screen = Screen::Gameplay;
    }

    fn complete(&mut self, completion: Completion, cues: &mut Vec<AudioCue>) {
        if let Some(mut sim) = self.sim.take() {
            cues.extend(sim.teardown_cues());
        }
        log::info!(
            "Level {} complete (success={})",
            self.level.number(),
            completion.success
        );

        match self.level.next() {
            Some(next) => {
                self.level = next;
                self.begin_transition();
            }
            None => {
                if completion.success && !self.awakened {
                    self.awakened = true;
                    save_awakened(self.store.as_mut());
                }
                self.level = LevelId::Conformity;
                self.screen = Screen::Home { fading_ms: None };
            }
        }
    }

    /// Advance one frame. Returns audio cues to hand to the bridge.
    pub fn tick(&mut self, input: &TickInput, dt_ms: f32) -> Vec<AudioCue> {
        let dt_ms = dt_ms.max(0.0);
        let pressed = self.start_edge.pressed(input);
        let mut cues = Vec::new();

        match self.screen {
            Screen::Home { fading_ms: None } => {
                if pressed {
                    self.screen = Screen::Home {
                        fading_ms: Some(HOME_FADE_MS),
                    };
                }
            }
            Screen::Home {
                fading_ms: Some(remaining),
            } => {
                let remaining = remaining - dt_ms;
                if remaining <= 0.0 {
                    self.begin_transition();
                } else {
                    self.screen = Screen::Home {
                        fading_ms: Some(remaining),
                    };
                }
            }
            Screen::LevelSelect => {}
            Screen::Transition { remaining_ms } => {
                let remaining_ms = remaining_ms - dt_ms;
                if remaining_ms <= 0.0 {
                    self.mount();
                } else {
                    self.screen = Screen::Transition { remaining_ms };
                }
            }
            Screen::Gameplay => {
                let Some(sim) = self.sim.as_mut() else {
                    log::warn!("Gameplay without a level; returning home");
                    self.screen = Screen::Home { fading_ms: None };
                    return cues;
                };
                let completion = sim.tick(input, dt_ms);
                cues.extend(sim.drain_cues());
                if let Some(completion) = completion {
                    self.complete(completion, &mut cues);
                }
            }
        }

        // Starting cues of a freshly mounted level
        if let (Screen::Gameplay, Some(sim)) = (self.screen, self.sim.as_mut()) {
            cues.extend(sim.drain_cues());
        }
        cues
    }
}
