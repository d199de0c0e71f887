//! Color schemes and multi-stop interpolation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Light yellow -> Orange -> Dark red (LS and other erosion factors)
    #[default]
    YlOrRd,
    /// Green -> Yellow -> Brown -> White (elevation)
    Terrain,
    /// Black -> White (slope)
    Grayscale,
    /// Yellow -> Orange -> Brown (flow accumulation)
    Accumulation,
}

impl ColorScheme {
    /// All available schemes.
    pub const ALL: &[ColorScheme] = &[
        Self::YlOrRd,
        Self::Terrain,
        Self::Grayscale,
        Self::Accumulation,
    ];

    /// Name accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::YlOrRd => "ylorrd",
            Self::Terrain => "terrain",
            Self::Grayscale => "grayscale",
            Self::Accumulation => "accumulation",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.name() == lower)
            .ok_or_else(|| format!("unknown color scheme '{s}'"))
    }
}

// ─── Color stop definitions ────────────────────────────────────────────

/// ColorBrewer YlOrRd, 9 classes
const YLORRD_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 255, 255, 204),
    ColorStop::new(0.125, 255, 237, 160),
    ColorStop::new(0.250, 254, 217, 118),
    ColorStop::new(0.375, 254, 178, 76),
    ColorStop::new(0.500, 253, 141, 60),
    ColorStop::new(0.625, 252, 78, 42),
    ColorStop::new(0.750, 227, 26, 28),
    ColorStop::new(0.875, 189, 0, 38),
    ColorStop::new(1.000, 128, 0, 38),
];

const TERRAIN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 34, 139, 34),
    ColorStop::new(0.25, 144, 190, 60),
    ColorStop::new(0.50, 220, 200, 80),
    ColorStop::new(0.75, 180, 120, 60),
    ColorStop::new(1.00, 255, 255, 255),
];

const ACCUMULATION_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 255, 255, 212),
    ColorStop::new(0.25, 254, 217, 142),
    ColorStop::new(0.50, 254, 153, 41),
    ColorStop::new(0.75, 204, 76, 2),
    ColorStop::new(1.00, 102, 37, 6),
];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    let last = stops[stops.len() - 1].color;
    if t <= 0.0 {
        return stops[0].color;
    }
    if t >= 1.0 {
        return last;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.t {
            let ratio = (t - lo.t) / (hi.t - lo.t);
            return lerp_color(lo.color, hi.color, ratio);
        }
    }
    last
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// Positions outside the unit interval take the nearest end color.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    match scheme {
        ColorScheme::YlOrRd => multi_stop(YLORRD_STOPS, t),
        ColorScheme::Terrain => multi_stop(TERRAIN_STOPS, t),
        ColorScheme::Grayscale => {
            let v = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgb::new(v, v, v)
        }
        ColorScheme::Accumulation => multi_stop(ACCUMULATION_STOPS, t),
    }
}
