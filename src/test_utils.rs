use approx::abs_diff_eq;

/// Check whether two curves are approximately equal, sample by sample.
/// Infinite samples only match an infinite sample of the same sign.
pub fn curve_abs_diff_eq(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(&a, &b)| {
            if a.is_infinite() || b.is_infinite() {
                a == b
            } else {
                abs_diff_eq!(a, b, epsilon = 0.000001)
            }
        })
}

/// Assert that two curves are approximately equal, sample by sample.
pub fn assert_curve_abs_diff_eq(a: &[f64], b: &[f64]) {
    assert!(
        curve_abs_diff_eq(a, b),
        "assertion `left == right` failed. left: {a:?}, right: {b:?}"
    );
}
