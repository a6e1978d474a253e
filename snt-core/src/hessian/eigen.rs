//! Closed-form eigenvalues of small real symmetric matrices, sorted by
//! ascending absolute value as the Hessian response functions require.

/// Eigenvalues of the symmetric 2x2 matrix `[[a, b], [b, c]]`, as
/// `(e0, e1)` with `|e0| <= |e1|`.
pub fn eigen_sym2(a: f64, b: f64, c: f64) -> (f64, f64) {
    let trace_half = (a + c) / 2.0;
    let disc = (((a - c) / 2.0).powi(2) + b * b).max(0.0).sqrt();
    let (mut e0, mut e1) = (trace_half - disc, trace_half + disc);
    if e0.abs() > e1.abs() {
        std::mem::swap(&mut e0, &mut e1);
    }
    (e0, e1)
}

/// Eigenvalues of the symmetric 3x3 matrix
/// `[[a, d, e], [d, b, f], [e, f, c]]`, as `(e0, e1, e2)` with
/// `|e0| <= |e1| <= |e2|`.
///
/// Closed-form trigonometric solution (Eberly's "robust eigensolver"
/// derivation of the Cardano method), avoiding an iterative Jacobi solve
/// since the 3x3 case never needs more than this one shot.
pub fn eigen_sym3(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> (f64, f64, f64) {
    let p1 = d * d + e * e + f * f;
    if p1 == 0.0 {
        let mut v = [a, b, c];
        v.sort_by(|x, y| x.abs().partial_cmp(&y.abs()).unwrap());
        return (v[0], v[1], v[2]);
    }

    let q = (a + b + c) / 3.0;
    let p2 = (a - q).powi(2) + (b - q).powi(2) + (c - q).powi(2) + 2.0 * p1;
    let p = (p2 / 6.0).max(1e-300).sqrt();

    // B = (1/p) * (M - q*I)
    let (ba, bb, bc) = ((a - q) / p, (b - q) / p, (c - q) / p);
    let (bd, be, bf) = (d / p, e / p, f / p);

    let det_b = ba * (bb * bc - bf * bf) - bd * (bd * bc - bf * be) + be * (bd * bf - bb * be);
    let r = (det_b / 2.0).clamp(-1.0, 1.0);
    let phi = r.acos() / 3.0;

    let eig_max = q + 2.0 * p * phi.cos();
    let eig_min = q + 2.0 * p * (phi + 2.0 * std::f64::consts::PI / 3.0).cos();
    let eig_mid = 3.0 * q - eig_max - eig_min;

    let mut v = [eig_min, eig_mid, eig_max];
    v.sort_by(|x, y| x.abs().partial_cmp(&y.abs()).unwrap());
    (v[0], v[1], v[2])
}
