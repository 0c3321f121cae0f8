//! Per-pixel blend functions for layer compositing.
//!
//! Formulas work at 16 bit per channel precision and scale the result back
//! to bytes. None of them touch alpha; the compositor masks opacity
//! separately.

const MAX: f64 = 65535.0;
const MID: f64 = MAX / 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
    Addition,
    Subtract,
    Divide,
}

impl BlendMode {
    pub(crate) fn from_raw(raw: u16) -> Option<BlendMode> {
        let mode = match raw {
            0 => BlendMode::Normal,
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Overlay,
            4 => BlendMode::Darken,
            5 => BlendMode::Lighten,
            6 => BlendMode::ColorDodge,
            7 => BlendMode::ColorBurn,
            8 => BlendMode::HardLight,
            9 => BlendMode::SoftLight,
            10 => BlendMode::Difference,
            11 => BlendMode::Exclusion,
            12 => BlendMode::Hue,
            13 => BlendMode::Saturation,
            14 => BlendMode::Color,
            15 => BlendMode::Luminosity,
            16 => BlendMode::Addition,
            17 => BlendMode::Subtract,
            18 => BlendMode::Divide,
            _ => return None,
        };

        Some(mode)
    }

    pub(crate) fn blend(self, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
        match self {
            BlendMode::Normal => src,
            BlendMode::Multiply => per_channel(dst, src, |d, s| s * d / MAX),
            BlendMode::Screen => per_channel(dst, src, |d, s| s + d - s * d / MAX),
            BlendMode::Overlay => per_channel(dst, src, |d, s| {
                if d < MID {
                    2.0 * s * d / MAX
                } else {
                    MAX - 2.0 * (MAX - s) * (MAX - d) / MAX
                }
            }),
            BlendMode::Darken => per_channel(dst, src, f64::min),
            BlendMode::Lighten => per_channel(dst, src, f64::max),
            BlendMode::ColorDodge => per_channel(dst, src, |d, s| {
                if s == MAX {
                    s
                } else {
                    MAX.min(d * MAX / (MAX - s))
                }
            }),
            BlendMode::ColorBurn => per_channel(dst, src, |d, s| {
                if s == 0.0 {
                    s
                } else {
                    0.0f64.max(MAX - (MAX - d) * MAX / s)
                }
            }),
            BlendMode::HardLight => per_channel(dst, src, |d, s| {
                if s > MID {
                    d + (MAX - d) * ((s - MID) / MID)
                } else {
                    d * s / MID
                }
            }),
            BlendMode::SoftLight => {
                per_channel(dst, src, |d, s| (d / MAX) * (d + (2.0 * s / MAX) * (MAX - d)))
            }
            BlendMode::Difference => per_channel(dst, src, |d, s| (s - d).abs()),
            BlendMode::Exclusion => per_channel(dst, src, |d, s| s + d - s * d / MID),
            BlendMode::Addition => per_channel(dst, src, |d, s| MAX.min(s + d)),
            BlendMode::Subtract => per_channel(dst, src, |d, s| 0.0f64.max(d - s)),
            BlendMode::Divide => per_channel(dst, src, |d, s| d * MAX / s + 1.0),
            BlendMode::Hue => {
                let s = rgb_to_hsl(src);

                // a gray source carries no hue to transfer
                if s.saturation == 0.0 {
                    return dst;
                }

                let d = rgb_to_hsl(dst);

                hsl_to_rgb(s.hue, d.saturation, d.lightness, dst[3])
            }
            BlendMode::Saturation => {
                let s = rgb_to_hsl(src);
                let d = rgb_to_hsl(dst);

                hsl_to_rgb(d.hue, s.saturation, d.lightness, dst[3])
            }
            BlendMode::Color => {
                let s = rgb_to_hsl(src);
                let d = rgb_to_hsl(dst);

                hsl_to_rgb(s.hue, s.saturation, d.lightness, dst[3])
            }
            BlendMode::Luminosity => {
                let s = rgb_to_hsl(src);
                let d = rgb_to_hsl(dst);

                hsl_to_rgb(d.hue, d.saturation, s.lightness, dst[3])
            }
        }
    }
}

fn per_channel(dst: [u8; 4], src: [u8; 4], f: impl Fn(f64, f64) -> f64) -> [u8; 4] {
    let mut out = [0u8; 4];

    for c in 0..3 {
        let d = dst[c] as f64 * 257.0;
        let s = src[c] as f64 * 257.0;

        out[c] = clamp_to_byte(f(d, s) / 256.0 + 0.5);
    }

    out[3] = dst[3];
    out
}

fn clamp_to_byte(v: f64) -> u8 {
    if v < 0.0 {
        0
    } else if v > 255.0 {
        255
    } else {
        v as u8
    }
}

struct Hsl {
    hue: f64,
    saturation: f64,
    lightness: f64,
}

fn rgb_to_hsl(c: [u8; 4]) -> Hsl {
    let r = c[0] as f64 / 255.0;
    let g = c[1] as f64 / 255.0;
    let b = c[2] as f64 / 255.0;

    let cmax = r.max(g).max(b);
    let cmin = r.min(g).min(b);
    let lightness = (cmax + cmin) / 2.0;

    let mut hue = 0.0;
    let mut saturation = 0.0;

    // max == min is achromatic and keeps hue and saturation at zero
    if cmax != cmin {
        let delta = cmax - cmin;

        saturation = if lightness > 0.5 {
            delta / (2.0 - cmax - cmin)
        } else {
            delta / (cmax + cmin)
        };

        // ties resolve in channel order
        let h = if cmax == r {
            let h = (g - b) / delta;

            if g < b {
                h + 6.0
            } else {
                h
            }
        } else if cmax == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        hue = h / 6.0;
    }

    Hsl {
        hue,
        saturation,
        lightness,
    }
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64, alpha: u8) -> [u8; 4] {
    let (r, g, b) = if saturation == 0.0 {
        (lightness, lightness, lightness)
    } else {
        let q = if lightness < 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - saturation * lightness
        };
        let p = 2.0 * lightness - q;

        (
            hue_to_rgb(p, q, hue + 1.0 / 3.0),
            hue_to_rgb(p, q, hue),
            hue_to_rgb(p, q, hue - 1.0 / 3.0),
        )
    };

    [
        clamp_to_byte(r * 255.0 + 0.5),
        clamp_to_byte(g * 255.0 + 0.5),
        clamp_to_byte(b * 255.0 + 0.5),
        alpha,
    ]
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
