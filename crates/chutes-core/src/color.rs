//! Player color assignment.
//!
//! Colors are derived from the player's join index using golden-ratio
//! hue rotation, which keeps consecutive joiners maximally separated on
//! the hue wheel no matter how many players a session holds. Saturation
//! and lightness cycle through small offsets so near-collisions after
//! many joins still read differently.
//!
//! The exact formula is a presentation detail; callers only rely on
//! "index in, stable distinct `#RRGGBB` out".

const GOLDEN_RATIO: f64 = 0.618_033_988_749_895;

/// The color for the `index`-th player to join (0-based).
pub fn color_for_index(index: usize) -> String {
    #[allow(clippy::cast_precision_loss)]
    let hue = (index as f64 * GOLDEN_RATIO * 360.0) % 360.0;
    let saturation = 70.0 + ((index % 3) as f64) * 10.0;
    let lightness = 50.0 + ((index % 4) as f64) * 8.0;
    hsl_to_hex(hue, saturation, lightness)
}

/// Convert HSL (`h` in degrees, `s`/`l` in percent) to `#RRGGBB`.
fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let s_norm = s / 100.0;
    let l_norm = l / 100.0;

    let c = (1.0 - (2.0 * l_norm - 1.0).abs()) * s_norm;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l_norm - c / 2.0;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let channel = |v: f64| -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let byte = ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        byte
    };

    format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b))
}
