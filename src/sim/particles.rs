//! Visual particles shared by the levels that burst sparks
//!
//! Particles never feed back into gameplay; they only need to be
//! reproducible for a given seed.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::morph::Rgb;
use crate::frame_decay;

/// Length of the streak drawn behind a particle, in seconds of velocity
pub const TRAIL_SECONDS: f32 = 0.035;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// 1.0 at spawn, removed at or below 0
    pub life: f32,
    /// Life lost per second
    pub decay: f32,
    pub color: Rgb,
    pub size: f32,
}

impl Particle {
    /// Tail end of the streak behind the particle
    pub fn trail_end(&self) -> Vec2 {
        self.pos - self.vel * TRAIL_SECONDS
    }
}

/// How one burst of particles is shaped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstSpec {
    /// Speed is `speed_min + U * speed_range`
    pub speed_min: f32,
    pub speed_range: f32,
    /// Subtracted from the initial vertical velocity (screen y points down)
    pub upward: f32,
    /// Spawn position jitter on each axis, total width
    pub jitter: f32,
    pub decay: f32,
    pub size_min: f32,
    pub size_range: f32,
    /// Each particle picks one of these colours uniformly
    pub colors: &'static [Rgb],
}

#[derive(Debug, Clone)]
pub struct ParticleField {
    pub particles: Vec<Particle>,
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Horizontal velocity multiplier applied per 60 Hz frame
    pub drag_x_per_frame: f32,
    /// Maximum live particles; oldest are dropped first
    pub cap: usize,
}

impl ParticleField {
    pub fn new(gravity: f32, drag_x_per_frame: f32, cap: usize) -> Self {
        Self {
            particles: Vec::new(),
            gravity,
            drag_x_per_frame,
            cap,
        }
    }

    /// Field without gravity or drag
    pub fn floating(cap: usize) -> Self {
        Self::new(0.0, 1.0, cap)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn push(&mut self, particle: Particle) {
        if self.cap == 0 {
            return;
        }
        if self.particles.len() >= self.cap {
            // Make room by dropping the oldest
            self.particles.remove(0);
        }
        self.particles.push(particle);
    }

    /// Spawn `count` particles around `origin`
    pub fn burst<R: Rng>(&mut self, rng: &mut R, origin: Vec2, count: usize, spec: &BurstSpec) {
        for _ in 0..count {
            let angle = rng.random::<f32>() * std::f32::consts::TAU;
            let speed = spec.speed_min + rng.random::<f32>() * spec.speed_range;
            let jitter = Vec2::new(rng.random::<f32>() - 0.5, rng.random::<f32>() - 0.5) * spec.jitter;
            let size = spec.size_min + rng.random::<f32>() * spec.size_range;
            let color = match spec.colors {
                [] => Rgb::WHITE,
                [only] => *only,
                many => many[rng.random_range(0..many.len())],
            };
            self.push(Particle {
                pos: origin + jitter,
                vel: Vec2::from_angle(angle) * speed - Vec2::new(0.0, spec.upward),
                life: 1.0,
                decay: spec.decay,
                color,
                size,
            });
        }
    }

    /// Integrate and cull. Drag is applied before gravity, both before the
    /// position update.
    pub fn step(&mut self, dt_secs: f32) {
        if dt_secs <= 0.0 {
            return;
        }
        let drag = frame_decay(self.drag_x_per_frame, dt_secs);
        for p in self.particles.iter_mut() {
            p.vel.x *= drag;
            p.vel.y += self.gravity * dt_secs;
            p.pos += p.vel * dt_secs;
            p.life -= p.decay * dt_secs;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const SPEC: BurstSpec = BurstSpec {
        speed_min: 50.0,
        speed_range: 200.0,
        upward: 0.0,
        jitter: 0.0,
        decay: 1.0,
        size_min: 2.0,
        size_range: 4.0,
        colors: &[Rgb::WHITE],
    };

    #[test]
    fn test_burst_respects_cap() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut field = ParticleField::floating(16);
        field.burst(&mut rng, Vec2::ZERO, 40, &SPEC);
        assert_eq!(field.len(), 16);
    }

    #[test]
    fn test_zero_cap_spawns_nothing() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut field = ParticleField::floating(0);
        field.burst(&mut rng, Vec2::ZERO, 5, &SPEC);
        assert!(field.is_empty());
    }

    #[test]
    fn test_burst_speed_in_range() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut field = ParticleField::floating(256);
        field.burst(&mut rng, Vec2::ZERO, 100, &SPEC);
        for p in &field.particles {
            let s = p.vel.length();
            assert!((49.9..=250.1).contains(&s), "speed {s}");
        }
    }

    #[test]
    fn test_particles_expire_and_never_return() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut field = ParticleField::floating(64);
        field.burst(&mut rng, Vec2::ZERO, 10, &SPEC);
        for _ in 0..9 {
            field.step(0.1);
        }
        assert_eq!(field.len(), 10);
        field.step(0.2);
        assert!(field.is_empty());
        field.step(0.1);
        assert!(field.is_empty());
    }

    #[test]
    fn test_gravity_and_drag() {
        let mut field = ParticleField::new(3000.0, 0.95, 8);
        field.push(Particle {
            pos: Vec2::ZERO,
            vel: Vec2::new(100.0, 0.0),
            life: 1.0,
            decay: 1.2,
            color: Rgb::WHITE,
            size: 1.0,
        });
        field.step(1.0 / 60.0);
        let p = field.particles[0];
        assert!((p.vel.x - 95.0).abs() < 1e-3);
        assert!((p.vel.y - 50.0).abs() < 1e-3);
        assert!((p.life - (1.0 - 1.2 / 60.0)).abs() < 1e-5);
    }
}
