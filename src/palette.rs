//! Member colors shared by the server (random pick on join) and the client
//! (deterministic fallback and flash color).

use std::fmt;

use rand::seq::SliceRandom;

pub const MEMBER_COLORS: [&str; 16] = [
    "#EF4444", // red
    "#10B981", // green
    "#3B82F6", // blue
    "#8B5CF6", // purple
    "#F59E0B", // amber
    "#06B6D4", // cyan
    "#EC4899", // pink
    "#14B8A6", // teal
    "#6366F1", // indigo
    "#84CC16", // lime
    "#F97316", // orange
    "#A855F7", // violet
    "#22C55E", // emerald
    "#0EA5E9", // sky
    "#D946EF", // fuchsia
    "#64748B", // slate
];

/// Pick a palette color at random for a member joining without one.
pub fn random_color() -> &'static str {
    MEMBER_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(MEMBER_COLORS[0])
}

/// Deterministic color for a member that has none stored.
///
/// Sums the code points of the id's textual form, so every client derives the
/// same color for the same member.
pub fn color_for_member(member_id: &str) -> &'static str {
    let hash: u64 = member_id.chars().map(|c| c as u64).sum();
    MEMBER_COLORS[(hash % MEMBER_COLORS.len() as u64) as usize]
}

/// Accepts `#RRGGBB` (case-insensitive).
pub fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Hue/saturation/lightness triple, rendered as `"h s% l%"` for CSS variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsl {
    pub hue: u16,
    pub saturation: u8,
    pub lightness: u8,
}

impl Hsl {
    /// Flash color when nothing is flashing.
    pub const NEUTRAL: Hsl = Hsl {
        hue: 0,
        saturation: 0,
        lightness: 50,
    };

    /// Convert a `#RRGGBB` color. Returns `None` for anything else.
    pub fn from_hex(hex: &str) -> Option<Hsl> {
        if !is_hex_color(hex) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(|v| v as f64 / 255.0);
        let (r, g, b) = (channel(1)?, channel(3)?, channel(5)?);

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let (mut h, mut s) = (0.0, 0.0);

        if max != min {
            let d = max - min;
            s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
            let sector = if max == r {
                let wrap = if g < b { 6.0 } else { 0.0 };
                (g - b) / d + wrap
            } else if max == g {
                (b - r) / d + 2.0
            } else {
                (r - g) / d + 4.0
            };
            h = sector / 6.0;
        }

        Some(Hsl {
            hue: (h * 360.0).round() as u16,
            saturation: (s * 100.0).round() as u8,
            lightness: (l * 100.0).round() as u8,
        })
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}% {}%", self.hue, self.saturation, self.lightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_color_is_deterministic() {
        let id = "6f1c2a4e-8d0b-4c1e-9a57-0b3f2d9e1a11";
        assert_eq!(color_for_member(id), color_for_member(id));
        assert!(MEMBER_COLORS.contains(&color_for_member(id)));
    }

    #[test]
    fn fallback_color_uses_code_point_sum() {
        // 'a' = 97, 97 % 16 = 1 -> green
        assert_eq!(color_for_member("a"), "#10B981");
        // empty id hashes to 0 -> first entry
        assert_eq!(color_for_member(""), "#EF4444");
    }

    #[test]
    fn hex_to_hsl_matches_css_notation() {
        assert_eq!(Hsl::from_hex("#EF4444").unwrap().to_string(), "0 84% 60%");
        assert_eq!(Hsl::from_hex("#3B82F6").unwrap().to_string(), "217 91% 60%");
        assert_eq!(Hsl::from_hex("#ffffff").unwrap().to_string(), "0 0% 100%");
        assert_eq!(Hsl::from_hex("#000000").unwrap().to_string(), "0 0% 0%");
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Hsl::from_hex("EF4444").is_none());
        assert!(Hsl::from_hex("#EF44").is_none());
        assert!(Hsl::from_hex("#GG4444").is_none());
        assert!(!is_hex_color("#12345"));
    }

    #[test]
    fn neutral_renders_grey() {
        assert_eq!(Hsl::NEUTRAL.to_string(), "0 0% 50%");
    }

    #[test]
    fn random_color_comes_from_palette() {
        for _ in 0..32 {
            assert!(MEMBER_COLORS.contains(&random_color()));
        }
    }
}
