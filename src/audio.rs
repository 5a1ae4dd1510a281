//! Audio playback
//!
//! Levels emit `AudioCue`s; the `AudioBridge` turns them into backend calls.
//! The bridge owns fades (linear, advanced once per frame) so a backend only
//! needs to start, stop and set volumes. Backend failures are logged and
//! never reach gameplay.

use std::collections::HashMap;

use thiserror::Error;

use crate::lerp;
use crate::settings::Settings;
use crate::sim::{AudioCue, AudioKey};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio unavailable: {0}")]
    Unavailable(String),
    #[error("playback of {key} failed: {reason}")]
    Playback { key: &'static str, reason: String },
}

/// What the bridge needs from a sound device. Volumes are final gains.
pub trait AudioBackend {
    fn play_track(&mut self, key: AudioKey, volume: f32, looped: bool) -> Result<(), AudioError>;
    fn stop_track(&mut self, key: AudioKey) -> Result<(), AudioError>;
    fn set_track_volume(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError>;
    fn play_sound(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed_ms: f32,
    duration_ms: f32,
    /// Pause the track once it reaches silence
    stop_at_end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Track {
    playing: bool,
    /// Requested volume before settings gain
    volume: f32,
    fade: Option<Fade>,
}

fn report(result: Result<(), AudioError>) {
    if let Err(e) = result {
        log::warn!("Audio: {}", e);
    }
}

pub struct AudioBridge<B: AudioBackend> {
    backend: B,
    settings: Settings,
    tracks: HashMap<AudioKey, Track>,
}

impl<B: AudioBackend> AudioBridge<B> {
    pub fn new(backend: B, settings: Settings) -> Self {
        Self {
            backend,
            settings,
            tracks: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply new preferences and re-gain every playing track
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
        for key in AudioKey::ALL {
            if let Some(track) = self.tracks.get(&key).filter(|t| t.playing) {
                let gain = self.settings.gain_for(key, track.volume);
                report(self.backend.set_track_volume(key, gain));
            }
        }
    }

    pub fn is_playing(&self, key: AudioKey) -> bool {
        self.tracks.get(&key).is_some_and(|t| t.playing)
    }

    /// Requested volume of a track, before settings gain
    pub fn track_volume(&self, key: AudioKey) -> Option<f32> {
        self.tracks.get(&key).map(|t| t.volume)
    }

    pub fn dispatch(&mut self, cues: impl IntoIterator<Item = AudioCue>) {
        for cue in cues {
            self.apply(cue);
        }
    }

    fn apply(&mut self, cue: AudioCue) {
        match cue {
            AudioCue::PlayTrack {
                key,
                volume,
                looped,
                fade_ms,
            } => {
                let track = self.tracks.entry(key).or_default();
                if !track.playing {
                    // A fade in starts from silence
                    track.volume = if fade_ms > 0.0 { 0.0 } else { volume };
                    let gain = self.settings.gain_for(key, track.volume);
                    report(self.backend.play_track(key, gain, looped));
                    track.playing = true;
                }
                self.fade_to(key, volume, fade_ms, false);
            }
            AudioCue::StopTrack { key, fade_ms } => {
                if !self.is_playing(key) {
                    return;
                }
                if fade_ms > 0.0 {
                    self.fade_to(key, 0.0, fade_ms, true);
                } else {
                    self.stop_now(key);
                }
            }
            AudioCue::SetTrackVolume {
                key,
                volume,
                fade_ms,
            } => self.fade_to(key, volume, fade_ms, false),
            AudioCue::PlaySound { key, volume } => {
                let gain = self.settings.gain_for(key, volume);
                if gain > 0.0 {
                    report(self.backend.play_sound(key, gain));
                }
            }
        }
    }

    fn fade_to(&mut self, key: AudioKey, volume: f32, fade_ms: f32, stop_at_end: bool) {
        let track = self.tracks.entry(key).or_default();
        if fade_ms <= 0.0 {
            track.fade = None;
            track.volume = volume;
            if track.playing {
                let gain = self.settings.gain_for(key, volume);
                report(self.backend.set_track_volume(key, gain));
            }
            return;
        }
        track.fade = Some(Fade {
            from: track.volume,
            to: volume,
            elapsed_ms: 0.0,
            duration_ms: fade_ms,
            stop_at_end,
        });
    }

    fn stop_now(&mut self, key: AudioKey) {
        if let Some(track) = self.tracks.get_mut(&key) {
            track.fade = None;
            track.playing = false;
            report(self.backend.stop_track(key));
        }
    }

    /// Advance running fades
    pub fn update(&mut self, dt_ms: f32) {
        let dt_ms = dt_ms.max(0.0);
        for key in AudioKey::ALL {
            let Some(track) = self.tracks.get_mut(&key) else {
                continue;
            };
            let Some(mut fade) = track.fade else {
                continue;
            };
            fade.elapsed_ms += dt_ms;
            let t = (fade.elapsed_ms / fade.duration_ms).min(1.0);
            track.volume = lerp(fade.from, fade.to, t);
            if track.playing {
                let gain = self.settings.gain_for(key, track.volume);
                report(self.backend.set_track_volume(key, gain));
            }
            if t < 1.0 {
                track.fade = Some(fade);
                continue;
            }
            track.fade = None;
            if fade.stop_at_end && track.playing && track.volume <= 0.0 {
                track.playing = false;
                report(self.backend.stop_track(key));
            }
        }
    }

    pub fn stop_all(&mut self) {
        for key in AudioKey::ALL {
            if self.is_playing(key) {
                self.stop_now(key);
            }
        }
    }
}

/// Backend that plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn play_track(&mut self, _key: AudioKey, _volume: f32, _looped: bool) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop_track(&mut self, _key: AudioKey) -> Result<(), AudioError> {
        Ok(())
    }

    fn set_track_volume(&mut self, _key: AudioKey, _volume: f32) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_sound(&mut self, _key: AudioKey, _volume: f32) -> Result<(), AudioError> {
        Ok(())
    }
}

/// A call received by `RecordingAudio`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendCall {
    Play { key: AudioKey, volume: f32, looped: bool },
    Stop { key: AudioKey },
    Volume { key: AudioKey, volume: f32 },
    Sound { key: AudioKey, volume: f32 },
}

/// Backend that records every call, optionally failing all of them
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    pub calls: Vec<BackendCall>,
    pub fail: bool,
}

impl RecordingAudio {
    fn record(&mut self, call: BackendCall) -> Result<(), AudioError> {
        self.calls.push(call);
        if self.fail {
            Err(AudioError::Unavailable("recording backend set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl AudioBackend for RecordingAudio {
    fn play_track(&mut self, key: AudioKey, volume: f32, looped: bool) -> Result<(), AudioError> {
        self.record(BackendCall::Play { key, volume, looped })
    }

    fn stop_track(&mut self, key: AudioKey) -> Result<(), AudioError> {
        self.record(BackendCall::Stop { key })
    }

    fn set_track_volume(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError> {
        self.record(BackendCall::Volume { key, volume })
    }

    fn play_sound(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError> {
        self.record(BackendCall::Sound { key, volume })
    }
}

#[cfg(target_arch = "wasm32")]
pub use html::HtmlAudio;

#[cfg(target_arch = "wasm32")]
mod html {
    use std::collections::HashMap;

    use wasm_bindgen::prelude::*;
    use web_sys::HtmlAudioElement;

    use super::{AudioBackend, AudioError};
    use crate::sim::AudioKey;

    fn playback(key: AudioKey, e: wasm_bindgen::JsValue) -> AudioError {
        AudioError::Playback {
            key: key.id(),
            reason: format!("{:?}", e),
        }
    }

    /// Log a rejected `play()` promise, usually the autoplay policy
    fn watch_play(key: AudioKey, promise: js_sys::Promise) {
        let id = key.id();
        let on_reject: Closure<dyn FnMut(JsValue)> = Closure::once(move |e: JsValue| {
            log::warn!("Audio {} rejected playback: {:?}", id, e);
        });
        let _ = promise.catch(&on_reject);
        on_reject.forget();
    }

    /// One `<audio>` element per track; sounds get a fresh element each
    /// time so rapid taps overlap
    #[derive(Default)]
    pub struct HtmlAudio {
        elements: HashMap<AudioKey, HtmlAudioElement>,
    }

    impl HtmlAudio {
        pub fn new() -> Self {
            Self::default()
        }

        fn element(&mut self, key: AudioKey) -> Result<&HtmlAudioElement, AudioError> {
            if !self.elements.contains_key(&key) {
                let el = HtmlAudioElement::new_with_src(&key.path()).map_err(|e| playback(key, e))?;
                el.set_preload("auto");
                self.elements.insert(key, el);
            }
            self.elements
                .get(&key)
                .ok_or_else(|| AudioError::Unavailable(key.id().to_string()))
        }
    }

    impl AudioBackend for HtmlAudio {
        fn play_track(&mut self, key: AudioKey, volume: f32, looped: bool) -> Result<(), AudioError> {
            let el = self.element(key)?;
            el.set_loop(looped);
            el.set_volume(volume as f64);
            watch_play(key, el.play().map_err(|e| playback(key, e))?);
            Ok(())
        }

        fn stop_track(&mut self, key: AudioKey) -> Result<(), AudioError> {
            if let Some(el) = self.elements.get(&key) {
                el.pause().map_err(|e| playback(key, e))?;
                el.set_current_time(0.0);
            }
            Ok(())
        }

        fn set_track_volume(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError> {
            self.element(key)?.set_volume(volume as f64);
            Ok(())
        }

        fn play_sound(&mut self, key: AudioKey, volume: f32) -> Result<(), AudioError> {
            let el = HtmlAudioElement::new_with_src(&key.path()).map_err(|e| playback(key, e))?;
            el.set_volume(volume as f64);
            watch_play(key, el.play().map_err(|e| playback(key, e))?);
            Ok(())
        }
    }
}
