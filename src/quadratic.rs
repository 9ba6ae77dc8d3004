/// Solves `a t^2 + b t + c = 0` for real roots, returned as `(t0, t1)` with
/// `t0 <= t1`.
///
/// Returns `None` when the discriminant is negative. The larger-magnitude
/// root comes from the usual formula with the sign of `b` chosen so no
/// subtraction of nearly equal terms happens; the other root follows from
/// `t0 * t1 = c / a`. This keeps grazing hits (tiny discriminant, large `b`)
/// accurate where the textbook pair of formulas would cancel.
///
/// A vanishing `a` degrades to the linear equation `b t + c = 0`, reported as
/// a double root; with `b` also zero there is no solution.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }

        let t = -c / b;
        return Some((t, t));
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || discriminant.is_nan() {
        return None;
    }

    let root = discriminant.sqrt();
    let q = if b < 0.0 { -0.5 * (b - root) } else { -0.5 * (b + root) };

    // q vanishes only for b == 0 and c == 0, i.e. a double root at zero.
    if q == 0.0 {
        return Some((0.0, 0.0));
    }

    let mut t0 = q / a;
    let mut t1 = c / q;
    if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
    }

    Some((t0, t1))
}

/* Tests */

#[test]
fn two_real_roots_are_ordered() {
    // (t - 4)(t - 6)
    assert_eq!(solve_quadratic(1.0, -10.0, 24.0), Some((4.0, 6.0)));
    // -(t - 4)(t - 6): negative leading coefficient
    assert_eq!(solve_quadratic(-1.0, 10.0, -24.0), Some((4.0, 6.0)));
}

#[test]
fn tangent_gives_double_root() {
    assert_eq!(solve_quadratic(1.0, -10.0, 25.0), Some((5.0, 5.0)));
}

#[test]
fn negative_discriminant_has_no_roots() {
    assert_eq!(solve_quadratic(1.0, 0.0, 1.0), None);
}

#[test]
fn zero_roots() {
    assert_eq!(solve_quadratic(3.0, 0.0, 0.0), Some((0.0, 0.0)));
    assert_eq!(solve_quadratic(1.0, -2.0, 0.0), Some((0.0, 2.0)));
}

#[test]
fn linear_fallback() {
    assert_eq!(solve_quadratic(0.0, 2.0, -4.0), Some((2.0, 2.0)));
    assert_eq!(solve_quadratic(0.0, 0.0, 1.0), None);
}

#[test]
fn small_root_survives_cancellation() {
    // Roots 1e8 and 1e-8. The naive (-b + sqrt(d)) / 2a loses the small
    // root to cancellation entirely.
    let (t0, t1) = solve_quadratic(1.0, -(1.0e8 + 1.0e-8), 1.0).unwrap();

    approx::assert_relative_eq!(t0, 1.0e-8, max_relative = 1e-12);
    approx::assert_relative_eq!(t1, 1.0e8, max_relative = 1e-12);
}
