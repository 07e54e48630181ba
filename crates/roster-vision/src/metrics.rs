//! Pixel-level comparison and colour-space helpers.

/// Root-mean-square difference of the R, G and B channels of two RGBA buffers.
///
/// Alpha is ignored. Buffers of different length cannot be compared and
/// yield `f64::INFINITY`.
pub fn rmse(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (pa, pb) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        for c in 0..3 {
            let d = pa[c] as f64 - pb[c] as f64;
            sum += d * d;
        }
        count += 3;
    }

    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

/// Convert 0-255 RGB to HSL: hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let r = r / 255.0;
    let g = g / 255.0;
    let b = b / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}
