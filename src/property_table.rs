use std::f64::consts::FRAC_PI_2;

use crate::error::{ KernelError, Result };

/// An angle-dependent surface property (reflectivity) as a list of
/// `(incidence angle, value)` knots, interpolated linearly.
///
/// Knots are kept sorted by angle. Every edit replaces the whole table and is
/// validated first; a rejected edit leaves the table unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyTable {
    angles: Vec<f64>,
    values: Vec<f64>,
}

impl PropertyTable {
    /// Builds a table from knots in any order.
    ///
    /// Fails with `InvalidConfiguration` for fewer than two knots, angles that
    /// are negative or not finite, repeated angles, or values outside `[0, 1]`.
    pub fn new(points: &[(f64, f64)]) -> Result<PropertyTable> {
        if points.len() < 2 {
            return Err(KernelError::InvalidConfiguration(format!(
                "property table needs at least 2 points, got {}", points.len()
            )));
        }

        for &(angle, value) in points {
            if !angle.is_finite() || angle < 0.0 {
                return Err(KernelError::InvalidConfiguration(format!(
                    "property table angle {} is not a non-negative number", angle
                )));
            }

            if !(0.0..=1.0).contains(&value) {
                return Err(KernelError::InvalidConfiguration(format!(
                    "property table value {} is outside [0, 1]", value
                )));
            }
        }

        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(KernelError::InvalidConfiguration(format!(
                "property table repeats angle {}", pair[0].0
            )));
        }

        Ok(PropertyTable {
            angles: sorted.iter().map(|p| p.0).collect(),
            values: sorted.iter().map(|p| p.1).collect(),
        })
    }

    /// Replaces every knot.
    pub fn set_points(&mut self, points: &[(f64, f64)]) -> Result<()> {
        *self = PropertyTable::new(points)?;
        Ok(())
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.angles.iter().copied().zip(self.values.iter().copied()).collect()
    }

    /// Value at `angle` (radians).
    ///
    /// The angle is clamped to `[0, pi/2]`. Below the first knot the first
    /// value is returned; above the last knot the property is `0.0`.
    pub fn lookup(&self, angle: f64) -> f64 {
        let angle = if angle.is_nan() { 0.0 } else { angle.clamp(0.0, FRAC_PI_2) };

        match self.angles.iter().position(|&a| a >= angle) {
            None => 0.0,
            Some(0) => self.values[0],
            Some(i) => {
                let (a0, a1) = (self.angles[i - 1], self.angles[i]);
                let (v0, v1) = (self.values[i - 1], self.values[i]);

                v0 + (angle - a0) / (a1 - a0) * (v1 - v0)
            }
        }
    }
}

/* Tests */

#[test]
fn midpoint_of_linear_table() {
    let table = PropertyTable::new(&[(0.0, 1.0), (1.5708, 0.0)]).unwrap();
    approx::assert_abs_diff_eq!(table.lookup(0.7854), 0.5, epsilon = 1e-9);
}

#[test]
fn unsorted_input_is_sorted() {
    let table = PropertyTable::new(&[(1.2, 0.3), (0.0, 0.9), (0.6, 0.8)]).unwrap();

    assert_eq!(table.angles(), &[0.0, 0.6, 1.2]);
    assert_eq!(table.values(), &[0.9, 0.8, 0.3]);
}

#[test]
fn edits_keep_table_sorted() {
    let mut table = PropertyTable::new(&[(0.0, 0.5), (1.0, 0.5)]).unwrap();
    let edits: [&[(f64, f64)]; 3] = [
        &[(1.5, 0.1), (0.2, 0.9)],
        &[(0.9, 0.4), (0.1, 0.8), (0.5, 0.6), (1.4, 0.2)],
        &[(0.3, 0.3), (0.3, 0.4)],
    ];

    for points in edits.iter() {
        let _ = table.set_points(points);
        assert!(table.angles().windows(2).all(|w| w[0] < w[1]));
    }

    // The last edit repeated an angle and was rejected.
    assert_eq!(table.angles(), &[0.1, 0.5, 0.9, 1.4]);
}

#[test]
fn knots_are_exact() {
    let table = PropertyTable::new(&[(0.0, 0.95), (0.5, 0.9), (1.0, 0.6), (1.5, 0.1)]).unwrap();

    for (a, v) in table.points() {
        approx::assert_abs_diff_eq!(table.lookup(a), v, epsilon = 1e-12);
    }
}

#[test]
fn interpolation_stays_between_knots() {
    let table = PropertyTable::new(&[(0.0, 0.95), (0.5, 0.2), (1.0, 0.6), (1.5, 0.1)]).unwrap();
    let points = table.points();

    for w in points.windows(2) {
        let ((a0, v0), (a1, v1)) = (w[0], w[1]);
        for k in 0..=10 {
            let x = a0 + (a1 - a0) * k as f64 / 10.0;
            let y = table.lookup(x);
            assert!(y >= v0.min(v1) - 1e-12 && y <= v0.max(v1) + 1e-12);
        }
    }
}

#[test]
fn output_is_a_fraction() {
    let table = PropertyTable::new(&[(0.1, 1.0), (0.7, 0.0), (1.2, 1.0)]).unwrap();

    for k in -10..40 {
        let y = table.lookup(k as f64 * 0.05);
        assert!((0.0..=1.0).contains(&y));
    }
}

#[test]
fn queries_outside_table_range() {
    let table = PropertyTable::new(&[(0.2, 0.8), (1.0, 0.4)]).unwrap();

    // Below the first knot: first value.
    assert_eq!(table.lookup(0.1), 0.8);
    assert_eq!(table.lookup(-3.0), 0.8);
    // Above the last knot: nothing reflected.
    assert_eq!(table.lookup(1.2), 0.0);

    // Angles past a right angle count as a right angle.
    let full = PropertyTable::new(&[(0.0, 0.8), (FRAC_PI_2, 0.4)]).unwrap();
    assert_eq!(full.lookup(2.0), 0.4);
}

#[test]
fn malformed_tables_are_rejected() {
    assert!(PropertyTable::new(&[]).is_err());
    assert!(PropertyTable::new(&[(0.0, 1.0)]).is_err());
    assert!(PropertyTable::new(&[(0.0, 1.0), (f64::NAN, 0.5)]).is_err());
    assert!(PropertyTable::new(&[(0.0, 1.0), (-0.1, 0.5)]).is_err());
    assert!(PropertyTable::new(&[(0.0, 1.0), (0.5, 1.5)]).is_err());
    assert!(matches!(
        PropertyTable::new(&[(0.5, 1.0), (0.5, 0.5)]),
        Err(KernelError::InvalidConfiguration(_))
    ));
}
