//! Shape outlines and colour interpolation
//!
//! Every shape is a closed curve made of four cubic Bézier segments that share
//! a start point, stored as 26 numbers in a 100x100 box:
//! `[M.x, M.y, (cp1.x, cp1.y, cp2.x, cp2.y, end.x, end.y) x 4]`.
//! Morphing is plain componentwise lerp between two tables, so mid-blend frames
//! can look slightly soft or non-convex.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::OUTLINE_VIEWPORT;
use crate::lerp;

/// Numbers in one outline table
pub const OUTLINE_LEN: usize = 2 + SEGMENT_COUNT * 6;
/// Cubic segments per outline
pub const SEGMENT_COUNT: usize = 4;

/// Shape identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Square,
    Circle,
    Triangle,
    Hexagon,
    Diamond,
    Star,
}

impl ShapeKind {
    /// All shapes in declaration order
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Square,
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::Hexagon,
        ShapeKind::Diamond,
        ShapeKind::Star,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Square => "square",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Hexagon => "hexagon",
            ShapeKind::Diamond => "diamond",
            ShapeKind::Star => "star",
        }
    }

    /// Control-point table for this shape
    pub fn outline(&self) -> Outline {
        Outline(*shape_table(*self))
    }
}

#[rustfmt::skip]
const CIRCLE: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    77.6, 0.0, 100.0, 22.4, 100.0, 50.0,
    100.0, 77.6, 77.6, 100.0, 50.0, 100.0,
    22.4, 100.0, 0.0, 77.6, 0.0, 50.0,
    0.0, 22.4, 22.4, 0.0, 50.0, 0.0,
];

// Corners are made by doubling the control points on the vertex
#[rustfmt::skip]
const SQUARE: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    100.0, 0.0, 100.0, 0.0, 100.0, 50.0,
    100.0, 100.0, 100.0, 100.0, 50.0, 100.0,
    0.0, 100.0, 0.0, 100.0, 0.0, 50.0,
    0.0, 0.0, 0.0, 0.0, 50.0, 0.0,
];

// Bottom edge is split so the triangle still has four segments
#[rustfmt::skip]
const TRIANGLE: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    62.5, 25.0, 75.0, 50.0, 75.0, 50.0,
    100.0, 100.0, 100.0, 100.0, 50.0, 100.0,
    0.0, 100.0, 0.0, 100.0, 25.0, 50.0,
    25.0, 50.0, 37.5, 25.0, 50.0, 0.0,
];

#[rustfmt::skip]
const HEXAGON: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    95.0, 5.0, 100.0, 25.0, 100.0, 50.0,
    100.0, 75.0, 95.0, 95.0, 50.0, 100.0,
    5.0, 95.0, 0.0, 75.0, 0.0, 50.0,
    0.0, 25.0, 5.0, 5.0, 50.0, 0.0,
];

#[rustfmt::skip]
const DIAMOND: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    66.0, 16.0, 84.0, 34.0, 100.0, 50.0,
    84.0, 66.0, 66.0, 84.0, 50.0, 100.0,
    34.0, 84.0, 16.0, 66.0, 0.0, 50.0,
    16.0, 34.0, 34.0, 16.0, 50.0, 0.0,
];

#[rustfmt::skip]
const STAR: [f32; OUTLINE_LEN] = [
    50.0, 0.0,
    60.0, 40.0, 95.0, 40.0, 70.0, 60.0,
    80.0, 90.0, 50.0, 75.0, 50.0, 75.0,
    20.0, 90.0, 30.0, 60.0, 30.0, 60.0,
    5.0, 40.0, 40.0, 40.0, 50.0, 0.0,
];

fn shape_table(shape: ShapeKind) -> &'static [f32; OUTLINE_LEN] {
    match shape {
        ShapeKind::Square => &SQUARE,
        ShapeKind::Circle => &CIRCLE,
        ShapeKind::Triangle => &TRIANGLE,
        ShapeKind::Hexagon => &HEXAGON,
        ShapeKind::Diamond => &DIAMOND,
        ShapeKind::Star => &STAR,
    }
}

/// Shape-table validation failures
#[derive(Debug, Error, PartialEq)]
pub enum MorphError {
    #[error("{shape} outline is not closed: starts at ({sx}, {sy}), ends at ({ex}, {ey})")]
    NotClosed {
        shape: &'static str,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
    },
    #[error("{shape} outline value {value} at index {index} is outside the viewport")]
    OutOfBounds {
        shape: &'static str,
        index: usize,
        value: f32,
    },
}

/// Check every shape table once at startup
pub fn validate_shape_table() -> Result<(), MorphError> {
    for shape in ShapeKind::ALL {
        let table = shape_table(shape);
        let (sx, sy) = (table[0], table[1]);
        let (ex, ey) = (table[OUTLINE_LEN - 2], table[OUTLINE_LEN - 1]);
        if sx != ex || sy != ey {
            return Err(MorphError::NotClosed {
                shape: shape.as_str(),
                sx,
                sy,
                ex,
                ey,
            });
        }
        if let Some((index, &value)) = table
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=OUTLINE_VIEWPORT).contains(*v))
        {
            return Err(MorphError::OutOfBounds {
                shape: shape.as_str(),
                index,
                value,
            });
        }
    }
    Ok(())
}

/// A concrete set of control points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline(pub [f32; OUTLINE_LEN]);

impl Outline {
    /// Start point of the curve
    pub fn start(&self) -> (f32, f32) {
        (self.0[0], self.0[1])
    }

    /// SVG path data: `M x y C ... C ... C ... C ... Z`
    pub fn to_svg_path(&self) -> String {
        let p = &self.0;
        let mut d = format!("M {} {}", p[0], p[1]);
        for segment in p[2..].chunks_exact(6) {
            d.push_str(&format!(
                " C {} {} {} {} {} {}",
                segment[0], segment[1], segment[2], segment[3], segment[4], segment[5]
            ));
        }
        d.push_str(" Z");
        d
    }
}

/// Componentwise interpolation between two shapes' control points
///
/// `t` is not clamped; callers pass progress that is already in [0, 1].
pub fn interpolate_outline(a: ShapeKind, b: ShapeKind, t: f32) -> Outline {
    let from = shape_table(a);
    let to = shape_table(b);
    let mut out = [0.0; OUTLINE_LEN];
    for (i, v) in out.iter_mut().enumerate() {
        *v = lerp(from[i], to[i], t);
    }
    Outline(out)
}

/// An 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from a `0xRRGGBB` literal
    pub const fn hex(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Parse `#rrggbb`, `rrggbb` or `rgb(r, g, b)`; anything else is black
    pub fn parse(s: &str) -> Self {
        let [r, g, b] = parse_channels(s);
        Self::new(to_channel(r), to_channel(g), to_channel(b))
    }

    /// Channel-wise lerp, rounded and clamped
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let a = [self.r as f32, self.g as f32, self.b as f32];
        let b = [other.r as f32, other.g as f32, other.b as f32];
        lerp_channels(a, b, t)
    }

    /// CSS `rgb(r, g, b)` form
    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// `#rrggbb` form
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Interpolate two colour strings
///
/// Unparseable input falls back to black rather than failing.
pub fn interpolate_color(a: &str, b: &str, t: f32) -> Rgb {
    lerp_channels(parse_channels(a), parse_channels(b), t)
}

fn lerp_channels(a: [f32; 3], b: [f32; 3], t: f32) -> Rgb {
    Rgb::new(
        to_channel(lerp(a[0], b[0], t)),
        to_channel(lerp(a[1], b[1], t)),
        to_channel(lerp(a[2], b[2], t)),
    )
}

fn to_channel(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

// Raw channels are kept unclamped until after interpolation so that
// `rgb(300, 0, 0)` blends the way it was written.
fn parse_channels(s: &str) -> [f32; 3] {
    parse_hex(s).or_else(|| parse_rgb_fn(s)).unwrap_or([0.0; 3])
}

fn parse_hex(s: &str) -> Option<[f32; 3]> {
    let digits = s.strip_prefix('#').unwrap_or(s);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok().map(f32::from);
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn parse_rgb_fn(s: &str) -> Option<[f32; 3]> {
    let lower = s.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| {
        let p = p.trim();
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        p.parse::<u32>().ok().map(|v| v as f32)
    });
    let r = parts.next()??;
    let g = parts.next()??;
    let b = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    Some([r, g, b])
}
