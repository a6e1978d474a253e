//! Separable Gaussian convolution with mirror boundary handling.
//!
//! A block is just a flat `Vec<f64>` plus its `(w, h, d)` dims, with explicit
//! owned storage rather than a pipeline of lazy view transformations, and
//! convolution is three independent 1D passes along x, y, z.

/// Samples `data` at `(x, y, z)` (dims `(w, h, d)`), reflecting any
/// out-of-range index back into bounds (`-1 -> 1`, `w -> w-2`, ...).
fn mirror(index: i64, extent: i64) -> i64 {
    if extent <= 1 {
        return 0;
    }
    let period = 2 * (extent - 1);
    let mut i = index % period;
    if i < 0 {
        i += period;
    }
    if i >= extent {
        i = period - i;
    }
    i
}

#[inline]
fn at(data: &[f64], dims: (i64, i64, i64), x: i64, y: i64, z: i64) -> f64 {
    let (w, h, d) = dims;
    let xi = mirror(x, w);
    let yi = mirror(y, h);
    let zi = mirror(z, d);
    data[(xi + yi * w + zi * w * h) as usize]
}

/// A truncated-Gaussian kernel of half-width `ceil(3*sigma)` (at least
/// radius 1), normalised to sum to 1. `sigma <= 0` yields the identity
/// kernel `[1.0]`.
pub fn kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let mut k: Vec<f64> = (-radius..=radius)
        .map(|i| {
            let x = i as f64;
            (-0.5 * (x / sigma) * (x / sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Convolves `data` (dims `w*h*d`) separably along x, y, z with per-axis
/// sigmas given in pixels, mirror-padding at the true data edges so the
/// output has the same dimensions as the input.
pub fn convolve_separable_3d(data: &[f64], dims: (i64, i64, i64), sigma: (f64, f64, f64)) -> Vec<f64> {
    let (w, h, d) = dims;
    let len = (w * h * d) as usize;

    let pass = |src: &[f64], axis: usize, s: f64| -> Vec<f64> {
        let k = kernel(s);
        let radius = (k.len() / 2) as i64;
        let mut out = vec![0.0; len];
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let mut acc = 0.0;
                    for (ki, &weight) in k.iter().enumerate() {
                        let offset = ki as i64 - radius;
                        let v = match axis {
                            0 => at(src, dims, x + offset, y, z),
                            1 => at(src, dims, x, y + offset, z),
                            _ => at(src, dims, x, y, z + offset),
                        };
                        acc += weight * v;
                    }
                    out[(x + y * w + z * w * h) as usize] = acc;
                }
            }
        }
        out
    };

    let after_x = pass(data, 0, sigma.0);
    let after_y = pass(&after_x, 1, sigma.1);
    pass(&after_y, 2, sigma.2)
}
