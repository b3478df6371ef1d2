//! Element-wise float kernels over 4-lane SIMD registers.
//!
//! Every binary kernel requires equal lengths; the tail that does not fill a
//! register falls back to scalar code.
use super::ArrayError;
use wide::f64x4;

const LANES: usize = 4;

#[inline(always)]
fn load(chunk: &[f64]) -> f64x4 {
    f64x4::new([chunk[0], chunk[1], chunk[2], chunk[3]])
}

fn zip_lanes(
    function: &'static str,
    lhs: &[f64],
    rhs: &[f64],
    simd: impl Fn(f64x4, f64x4) -> f64x4,
    scalar: impl Fn(f64, f64) -> f64,
) -> Result<Vec<f64>, ArrayError> {
    if lhs.len() != rhs.len() {
        return Err(ArrayError::LengthMismatch { function, expected: lhs.len(), actual: rhs.len() });
    }
    let mut out = Vec::with_capacity(lhs.len());
    let l_chunks = lhs.chunks_exact(LANES);
    let r_chunks = rhs.chunks_exact(LANES);
    let (l_tail, r_tail) = (l_chunks.remainder(), r_chunks.remainder());
    for (l, r) in l_chunks.zip(r_chunks) {
        out.extend_from_slice(&simd(load(l), load(r)).to_array());
    }
    out.extend(l_tail.iter().zip(r_tail).map(|(l, r)| scalar(*l, *r)));
    Ok(out)
}

pub fn add(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("add", lhs, rhs, |l, r| l + r, |l, r| l + r)
}

pub fn sub(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("sub", lhs, rhs, |l, r| l - r, |l, r| l - r)
}

pub fn mul(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("mul", lhs, rhs, |l, r| l * r, |l, r| l * r)
}

/// IEEE division: dividing by zero yields an infinity or NaN, which the
/// debug NaN check reports.
pub fn div(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("div", lhs, rhs, |l, r| l / r, |l, r| l / r)
}

pub fn maximum(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("maximum", lhs, rhs, |l, r| l.max(r), f64::max)
}

pub fn minimum(lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, ArrayError> {
    zip_lanes("minimum", lhs, rhs, |l, r| l.min(r), f64::min)
}

/// Multiplies every element by `factor`.
pub fn scale(values: &[f64], factor: f64) -> Vec<f64> {
    let chunks = values.chunks_exact(LANES);
    let tail = chunks.remainder();
    let factor_lanes = f64x4::splat(factor);
    let mut out = Vec::with_capacity(values.len());
    for chunk in chunks {
        out.extend_from_slice(&(load(chunk) * factor_lanes).to_array());
    }
    out.extend(tail.iter().map(|v| v * factor));
    out
}

pub fn sum(values: &[f64]) -> f64 {
    let chunks = values.chunks_exact(LANES);
    let tail: f64 = chunks.remainder().iter().sum();
    let lanes = chunks.fold(f64x4::splat(0.0), |acc, chunk| acc + load(chunk));
    lanes.to_array().iter().sum::<f64>() + tail
}

pub fn count_nan(values: &[f64]) -> usize {
    let chunks = values.chunks_exact(LANES);
    let tail = chunks.remainder().iter().filter(|v| v.is_nan()).count();
    let lanes: u32 = chunks.map(|chunk| load(chunk).is_nan().move_mask().count_ones()).sum();
    lanes as usize + tail
}
