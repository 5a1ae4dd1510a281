//! Common level interface and dispatch

use serde::{Deserialize, Serialize};

use super::capital::Capital;
use super::conformity::Conformity;
use super::consumerism::Consumerism;
use super::epiphany::Epiphany;
use super::events::{AudioCue, CueQueue};
use super::factory::Factory;
use super::input::TickInput;
use super::lifecycle::{Completion, Lifecycle, LevelStatus};
use super::particles::ParticleField;
use crate::settings::Settings;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelId {
    Conformity,
    Factory,
    Capital,
    Consumerism,
    Epiphany,
}

impl LevelId {
    pub const ALL: [LevelId; 5] = [
        LevelId::Conformity,
        LevelId::Factory,
        LevelId::Capital,
        LevelId::Consumerism,
        LevelId::Epiphany,
    ];

    /// 1-based position in the run
    pub fn number(&self) -> u8 {
        match self {
            LevelId::Conformity => 1,
            LevelId::Factory => 2,
            LevelId::Capital => 3,
            LevelId::Consumerism => 4,
            LevelId::Epiphany => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<LevelId> {
        Self::ALL.into_iter().find(|l| l.number() == n)
    }

    /// Following level, `None` after the last
    pub fn next(&self) -> Option<LevelId> {
        Self::from_number(self.number() + 1)
    }

    pub fn title(&self) -> &'static str {
        match self {
            LevelId::Conformity => "The Classroom",
            LevelId::Factory => "The Factory",
            LevelId::Capital => "The Capital",
            LevelId::Consumerism => "The Mall",
            LevelId::Epiphany => "The Epiphany",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LevelId::Conformity => "Discipline and resistance. Do not stop expressing yourself.",
            LevelId::Factory => "Standardized on the line. Go against the flow.",
            LevelId::Capital => "Accumulation and alienation. Value flows one way.",
            LevelId::Consumerism => "The consumer trap. Buying is not freedom.",
            LevelId::Epiphany => "Go left. Do not look back.",
        }
    }

    /// Only the last level reports whether it was won
    pub fn reports_outcome(&self) -> bool {
        matches!(self, LevelId::Epiphany)
    }
}

/// A running level simulation
///
/// Implementors provide `step`; `tick` wraps it with the shared
/// terminal/epilogue bookkeeping.
pub trait Level {
    fn id(&self) -> LevelId;
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;
    fn cues_mut(&mut self) -> &mut CueQueue;

    /// Advance level state by `dt_ms`. Called every tick until completion,
    /// including during the epilogue.
    fn step(&mut self, input: &TickInput, dt_ms: f32);

    /// Queue the cues that stop this level's tracks
    fn teardown(&mut self);

    fn particles(&self) -> Option<&ParticleField> {
        None
    }

    fn status(&self) -> LevelStatus {
        self.lifecycle().status()
    }

    /// One simulation tick. Yields the completion exactly once.
    fn tick(&mut self, input: &TickInput, dt_ms: f32) -> Option<Completion> {
        if self.lifecycle().is_complete() {
            return None;
        }
        let dt_ms = dt_ms.max(0.0);
        // The epilogue starts counting on the tick after the terminal one
        let settled = !self.lifecycle().is_running();
        self.step(input, dt_ms);
        if settled {
            self.lifecycle_mut().advance(dt_ms)
        } else {
            None
        }
    }

    fn drain_cues(&mut self) -> Vec<AudioCue> {
        self.cues_mut().drain()
    }
}

/// Closed set of levels, dispatched by enum
#[derive(Debug, Clone)]
pub enum LevelSim {
    Conformity(Conformity),
    Factory(Factory),
    Capital(Capital),
    Consumerism(Consumerism),
    Epiphany(Epiphany),
}

impl LevelSim {
    /// Mount a level. Starting cues are queued immediately.
    pub fn new(id: LevelId, seed: u64, tuning: &Tuning, settings: &Settings) -> Self {
        log::info!("Starting level {} ({}) seed={}", id.number(), id.title(), seed);
        let cap = settings.max_particles();
        match id {
            LevelId::Conformity => LevelSim::Conformity(Conformity::new(seed, tuning.conformity.clone())),
            LevelId::Factory => LevelSim::Factory(Factory::new(seed, tuning.factory.clone())),
            LevelId::Capital => LevelSim::Capital(Capital::new(seed, tuning.capital.clone(), cap)),
            LevelId::Consumerism => {
                LevelSim::Consumerism(Consumerism::new(seed, tuning.consumerism.clone(), cap))
            }
            LevelId::Epiphany => LevelSim::Epiphany(Epiphany::new(seed, tuning.epiphany.clone())),
        }
    }

    pub fn as_level(&self) -> &dyn Level {
        match self {
            LevelSim::Conformity(l) => l,
            LevelSim::Factory(l) => l,
            LevelSim::Capital(l) => l,
            LevelSim::Consumerism(l) => l,
            LevelSim::Epiphany(l) => l,
        }
    }

    pub fn as_level_mut(&mut self) -> &mut dyn Level {
        match self {
            LevelSim::Conformity(l) => l,
            LevelSim::Factory(l) => l,
            LevelSim::Capital(l) => l,
            LevelSim::Consumerism(l) => l,
            LevelSim::Epiphany(l) => l,
        }
    }

    pub fn id(&self) -> LevelId {
        self.as_level().id()
    }

    pub fn status(&self) -> LevelStatus {
        self.as_level().status()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        self.as_level().lifecycle()
    }

    pub fn particles(&self) -> Option<&ParticleField> {
        self.as_level().particles()
    }

    pub fn tick(&mut self, input: &TickInput, dt_ms: f32) -> Option<Completion> {
        self.as_level_mut().tick(input, dt_ms)
    }

    pub fn drain_cues(&mut self) -> Vec<AudioCue> {
        self.as_level_mut().drain_cues()
    }

    /// Unmount: queue stop cues and hand back everything pending
    pub fn teardown_cues(&mut self) -> Vec<AudioCue> {
        let level = self.as_level_mut();
        level.teardown();
        level.drain_cues()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_numbering() {
        for (i, id) in LevelId::ALL.iter().enumerate() {
            assert_eq!(id.number() as usize, i + 1);
            assert_eq!(LevelId::from_number(id.number()), Some(*id));
        }
        assert_eq!(LevelId::Consumerism.next(), Some(LevelId::Epiphany));
        assert_eq!(LevelId::Epiphany.next(), None);
        assert_eq!(LevelId::from_number(0), None);
    }

    #[test]
    fn test_every_level_starts_music_and_stops_it() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        for id in LevelId::ALL {
            let mut level = LevelSim::new(id, 42, &tuning, &settings);
            assert_eq!(level.id(), id);
            assert!(level.lifecycle().is_running());
            let start = level.drain_cues();
            assert!(start.iter().any(|c| matches!(c, AudioCue::PlayTrack { .. })), "{id:?}");
            let stop = level.teardown_cues();
            assert!(stop.iter().any(|c| matches!(c, AudioCue::StopTrack { .. })), "{id:?}");
        }
    }

    #[test]
    fn test_idle_ticks_do_not_panic() {
        let tuning = Tuning::default();
        let settings = Settings::default();
        for id in LevelId::ALL {
            let mut level = LevelSim::new(id, 9, &tuning, &settings);
            for _ in 0..200 {
                level.tick(&TickInput::default(), 16.0);
            }
        }
    }
}
