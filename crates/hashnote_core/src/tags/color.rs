//! Pastel tag colors with a minimum visual separation.
//!
//! Generation is rejection sampling: random pastel candidates are drawn until
//! one is at least [`COLOR_SIMILARITY_THRESHOLD`] away (Euclidean RGB) from
//! every color already in use, or [`MAX_COLOR_ATTEMPTS`] is exhausted.

use rand::Rng;

/// Lowest value of each RGB channel in a generated color.
pub const PASTEL_CHANNEL_MIN: u8 = 200;
/// Width of the channel range; channels fall in `[MIN, MIN + SPAN)`.
pub const PASTEL_CHANNEL_SPAN: u8 = 55;
/// Minimum Euclidean RGB distance to every existing color.
pub const COLOR_SIMILARITY_THRESHOLD: f64 = 60.0;
/// Candidates tried before giving up on separation.
pub const MAX_COLOR_ATTEMPTS: usize = 30;

/// Draws one pastel `#rrggbb` color.
pub fn random_pastel_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut channel =
        || rng.gen_range(PASTEL_CHANNEL_MIN..PASTEL_CHANNEL_MIN + PASTEL_CHANNEL_SPAN);
    let (r, g, b) = (channel(), channel(), channel());
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Picks a pastel color distinct from `existing`.
///
/// Falls back to an unconstrained pastel color when no candidate clears the
/// threshold within the attempt budget (the palette is small).
pub fn unique_color<R, S>(existing: &[S], rng: &mut R) -> String
where
    R: Rng + ?Sized,
    S: AsRef<str>,
{
    let parsed: Vec<(u8, u8, u8)> = existing
        .iter()
        .filter_map(|color| parse_hex_color(color.as_ref()))
        .collect();

    for _ in 0..MAX_COLOR_ATTEMPTS {
        let candidate = random_pastel_color(rng);
        let Some(rgb) = parse_hex_color(&candidate) else {
            continue;
        };
        if parsed
            .iter()
            .all(|other| rgb_distance(rgb, *other) >= COLOR_SIMILARITY_THRESHOLD)
        {
            return candidate;
        }
    }

    random_pastel_color(rng)
}

/// Euclidean RGB distance between two hex colors, `None` if either is invalid.
pub fn color_distance(a: &str, b: &str) -> Option<f64> {
    Some(rgb_distance(parse_hex_color(a)?, parse_hex_color(b)?))
}

/// Parses `#rgb` or `#rrggbb` (leading `#` optional, case-insensitive).
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |range: std::ops::Range<usize>| {
        expanded
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn rgb_distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> f64 {
    let dr = f64::from(a.0) - f64::from(b.0);
    let dg = f64::from(a.1) - f64::from(b.1);
    let db = f64::from(a.2) - f64::from(b.2);
    (dr * dr + dg * dg + db * db).sqrt()
}
