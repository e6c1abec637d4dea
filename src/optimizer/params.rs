use crate::library::HillParameters;

const WINDOW_LEN: usize = 50;
const MINUS_35: std::ops::Range<usize> = 15..20;
const MINUS_10: std::ops::Range<usize> = 30..35;

/// Strength ratio used when the original strength is unknown or zero.
pub const FALLBACK_STRENGTH_RATIO: f64 = 1.5;

/// Hill parameter values assumed when a gate does not provide them.
pub const DEFAULT_HILL: [(&str, f64); 4] = [("ymax", 40.0), ("ymin", 0.1), ("K", 1.0), ("n", 2.0)];

fn fraction(window: &[u8], bases: &[u8]) -> f64 {
    let hits = window
        .iter()
        .filter(|b| bases.contains(&b.to_ascii_uppercase()))
        .count();
    hits as f64 / window.len() as f64
}

/// Sequence-only estimate of promoter strength in [0.1, 1.0].
///
/// Looks at a 50 bp window (padded with `A`): GC content around -35, AT
/// content around -10, and the consensus boxes `TTGACA` and `TATAAT`.
pub fn predict_strength(sequence: &str) -> f64 {
    let mut window: Vec<u8> = sequence
        .bytes()
        .take(WINDOW_LEN)
        .map(|b| b.to_ascii_uppercase())
        .collect();
    window.resize(WINDOW_LEN, b'A');
    let text = String::from_utf8_lossy(&window);

    let gc_35 = fraction(&window[MINUS_35], b"GC");
    let at_10 = fraction(&window[MINUS_10], b"AT");
    let box_10 = text.contains("TATAA");
    let box_35 = text.contains("TTGAC");

    let motif = 0.2 * (box_10 as u8 + box_35 as u8) as f64;
    let region = 0.5 * gc_35 + 0.5 * at_10;
    let raw = 0.5 * motif + 0.5 * region;
    0.1 + 0.9 * raw
}

pub fn strength_ratio(original: Option<f64>, predicted: f64) -> f64 {
    match original {
        Some(o) if o > 0.0 => predicted / o,
        _ => FALLBACK_STRENGTH_RATIO,
    }
}

/// Rescales Hill parameters for a promoter whose strength changed by `ratio`:
/// `ymax` linearly, `ymin` by `ratio^0.3`, `K` by `ratio^-0.5`, `n` unchanged.
/// Other parameters are carried over untouched.
pub fn scale_parameters(original: &HillParameters, ratio: f64) -> HillParameters {
    let mut scaled = original.clone();
    let get = |name: &str| {
        original.get(name).copied().unwrap_or_else(|| {
            DEFAULT_HILL
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        })
    };

    scaled.insert("ymax".to_string(), get("ymax") * ratio);
    scaled.insert("ymin".to_string(), get("ymin") * ratio.powf(0.3));
    scaled.insert("K".to_string(), get("K") / ratio.powf(0.5));
    scaled.insert("n".to_string(), get("n"));
    scaled
}
