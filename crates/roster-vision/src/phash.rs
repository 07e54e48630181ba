//! Block-mean perceptual hash.

use image::RgbaImage;

/// Blocks per side; the hash has `HASH_BITS * HASH_BITS` bits.
const HASH_BITS: u32 = 8;

/// Compute a 64-bit block-mean hash, returned as 16 lowercase hex chars.
///
/// The image is split into an 8x8 grid. Each block's summed RGB value is
/// compared against the median of its quarter of the grid, so a hash stays
/// stable under global brightness shifts. Transparent pixels count as white.
pub fn block_hash(img: &RgbaImage) -> String {
    let (w, h) = img.dimensions();
    let n = HASH_BITS as usize;
    let mut blocks = vec![0.0f64; n * n];

    if w == 0 || h == 0 {
        return bits_to_hex(&vec![false; n * n]);
    }

    for (x, y, px) in img.enumerate_pixels() {
        let value = if px[3] == 0 {
            765.0
        } else {
            px[0] as f64 + px[1] as f64 + px[2] as f64
        };
        let bx = (x as u64 * HASH_BITS as u64 / w as u64) as usize;
        let by = (y as u64 * HASH_BITS as u64 / h as u64) as usize;
        blocks[by * n + bx] += value;
    }

    let block_area = (w as f64 / HASH_BITS as f64) * (h as f64 / HASH_BITS as f64);
    let half_value = 765.0 * block_area / 2.0;

    let band = blocks.len() / 4;
    let mut bits = Vec::with_capacity(blocks.len());
    for chunk in blocks.chunks(band) {
        let m = median(chunk);
        for &v in chunk {
            // Blocks sitting on the median break towards the brighter side.
            let bit = v > m || ((v - m).abs() < 1.0 && m > half_value);
            bits.push(bit);
        }
    }

    bits_to_hex(&bits)
}

/// Number of differing bits between two hex hashes.
/// Hashes of different length or with non-hex chars are maximally distant.
pub fn hash_distance(a: &str, b: &str) -> u32 {
    if a.len() != b.len() {
        return u32::MAX;
    }
    let mut distance = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        match (ca.to_digit(16), cb.to_digit(16)) {
            (Some(da), Some(db)) => distance += (da ^ db).count_ones(),
            _ => return u32::MAX,
        }
    }
    distance
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn bits_to_hex(bits: &[bool]) -> String {
    bits.chunks(4)
        .map(|nibble| {
            let v = nibble
                .iter()
                .fold(0u32, |acc, &bit| (acc << 1) | bit as u32);
            std::char::from_digit(v, 16).unwrap_or('0')
        })
        .collect()
}
