//! Audio cues emitted by simulations
//!
//! Levels never touch an audio device. They push semantic cues into a queue
//! that the frontend drains after each tick.

use serde::{Deserialize, Serialize};

use crate::clamp01;

/// Every track and sound the levels refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioKey {
    Level1Routine,
    Level1Resistance,
    Level2Factory,
    Level2Revolution,
    Level2Tap1,
    Level2Tap2,
    Level3Capital,
    Level3Resistance,
    Level3Coin,
    Level3Burn,
    Level3Drain,
    Level4Mall,
    Level4Resistance,
    Level4Buy,
    Level5Epiphany,
}

impl AudioKey {
    pub const ALL: [AudioKey; 15] = [
        AudioKey::Level1Routine,
        AudioKey::Level1Resistance,
        AudioKey::Level2Factory,
        AudioKey::Level2Revolution,
        AudioKey::Level2Tap1,
        AudioKey::Level2Tap2,
        AudioKey::Level3Capital,
        AudioKey::Level3Resistance,
        AudioKey::Level3Coin,
        AudioKey::Level3Burn,
        AudioKey::Level3Drain,
        AudioKey::Level4Mall,
        AudioKey::Level4Resistance,
        AudioKey::Level4Buy,
        AudioKey::Level5Epiphany,
    ];

    /// Asset id, also the file stem
    pub fn id(&self) -> &'static str {
        match self {
            AudioKey::Level1Routine => "bgm_level1_routine",
            AudioKey::Level1Resistance => "bgm_level1_resistance",
            AudioKey::Level2Factory => "bgm_level2_factory",
            AudioKey::Level2Revolution => "bgm_level2_revolution",
            AudioKey::Level2Tap1 => "sfx_level2_tap_1",
            AudioKey::Level2Tap2 => "sfx_level2_tap_2",
            AudioKey::Level3Capital => "bgm_level3_capital",
            AudioKey::Level3Resistance => "bgm_level3_resistance",
            AudioKey::Level3Coin => "sfx_level3_coin",
            AudioKey::Level3Burn => "sfx_level3_burn",
            AudioKey::Level3Drain => "sfx_level3_drain",
            AudioKey::Level4Mall => "bgm_level4_mall",
            AudioKey::Level4Resistance => "bgm_level4_resistance",
            AudioKey::Level4Buy => "sfx_level4_buy",
            AudioKey::Level5Epiphany => "bgm_level5_epiphany",
        }
    }

    /// URL path of the asset
    pub fn path(&self) -> String {
        format!("/audio/{}.mp3", self.id())
    }

    pub fn from_id(id: &str) -> Option<AudioKey> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

/// One request to the audio backend. Volumes are in [0, 1], fades in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AudioCue {
    PlayTrack {
        key: AudioKey,
        volume: f32,
        looped: bool,
        fade_ms: f32,
    },
    StopTrack {
        key: AudioKey,
        fade_ms: f32,
    },
    SetTrackVolume {
        key: AudioKey,
        volume: f32,
        fade_ms: f32,
    },
    PlaySound {
        key: AudioKey,
        volume: f32,
    },
}

impl AudioCue {
    pub fn key(&self) -> AudioKey {
        match *self {
            AudioCue::PlayTrack { key, .. }
            | AudioCue::StopTrack { key, .. }
            | AudioCue::SetTrackVolume { key, .. }
            | AudioCue::PlaySound { key, .. } => key,
        }
    }
}

/// Per-level outbox of cues
#[derive(Debug, Clone, Default)]
pub struct CueQueue {
    cues: Vec<AudioCue>,
}

impl CueQueue {
    pub fn play_track(&mut self, key: AudioKey, volume: f32, fade_ms: f32) {
        self.cues.push(AudioCue::PlayTrack {
            key,
            volume: clamp01(volume),
            looped: true,
            fade_ms: fade_ms.max(0.0),
        });
    }

    pub fn stop_track(&mut self, key: AudioKey, fade_ms: f32) {
        self.cues.push(AudioCue::StopTrack {
            key,
            fade_ms: fade_ms.max(0.0),
        });
    }

    pub fn set_volume(&mut self, key: AudioKey, volume: f32, fade_ms: f32) {
        self.cues.push(AudioCue::SetTrackVolume {
            key,
            volume: clamp01(volume),
            fade_ms: fade_ms.max(0.0),
        });
    }

    pub fn play_sound(&mut self, key: AudioKey, volume: f32) {
        self.cues.push(AudioCue::PlaySound {
            key,
            volume: clamp01(volume),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn drain(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip() {
        for key in AudioKey::ALL {
            assert_eq!(AudioKey::from_id(key.id()), Some(key));
        }
        assert_eq!(AudioKey::Level2Tap1.path(), "/audio/sfx_level2_tap_1.mp3");
    }

    #[test]
    fn test_queue_clamps_and_drains() {
        let mut q = CueQueue::default();
        q.set_volume(AudioKey::Level1Routine, 1.7, -5.0);
        q.play_sound(AudioKey::Level4Buy, -0.2);
        let cues = q.drain();
        assert_eq!(
            cues[0],
            AudioCue::SetTrackVolume {
                key: AudioKey::Level1Routine,
                volume: 1.0,
                fade_ms: 0.0
            }
        );
        assert_eq!(
            cues[1],
            AudioCue::PlaySound {
                key: AudioKey::Level4Buy,
                volume: 0.0
            }
        );
        assert!(q.is_empty());
    }
}
