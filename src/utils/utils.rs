/// u8_to_f32_vec reinterprets a little-endian raw tensor buffer as f32 values.
pub fn u8_to_f32_vec(v: &[u8]) -> Vec<f32> {
    v.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// round_to rounds to a fixed number of decimals, exact ties go to the even digit.
///
/// Only the output boundary rounds; intermediate values keep full precision.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
