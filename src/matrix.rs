use std::fmt;
use std::ops::{ Index, IndexMut, Mul };
use std::str::FromStr;

use crate::feq;
use crate::error::KernelError;
use crate::tuple::Tuple4D;

/// A 4x4 matrix, stored row-major.
///
/// These matrices encode affine transformations between the frames of the
/// simulation: a tracker's object-to-world orientation, a parent node's
/// placement, or the local shading basis used to perturb a normal. Points and
/// vectors are transformed with `matrix * tuple`; `w` decides whether the
/// translation column applies.
///
/// The persisted text form (see the `Display` and `FromStr` implementations)
/// is four bracketed rows of four comma-separated numbers:
///
/// ```text
/// [ 1.0, 0.0, 0.0, 0.0 ] [ 0.0, 1.0, 0.0, 0.0 ] [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]
/// ```
///
/// # Examples
///
/// ```
/// # use heliotrace::matrix::Matrix4D;
/// let text = Matrix4D::identity().to_string();
/// let parsed: Matrix4D = text.parse().unwrap();
/// assert_eq!(parsed, Matrix4D::identity());
/// ```
#[derive(Copy, Clone, Debug, Default, PartialOrd)]
pub struct Matrix4D {
    data: [f64; 16],
}

/// Matrices compare element-wise with the crate's float tolerance.
impl PartialEq for Matrix4D {
    fn eq(&self, other: &Matrix4D) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(x, y)| feq(*x, *y))
    }
}

impl Matrix4D {
    /// Creates a new `Matrix4D`. All elements are initialized to `0.0`.
    pub fn new() -> Matrix4D {
        Matrix4D { data: [0.0; 16] }
    }

    pub fn identity() -> Matrix4D {
        let mut buf = [0.0; 16];
        buf[0] = 1.0; buf[5] = 1.0; buf[10] = 1.0; buf[15] = 1.0;

        Matrix4D { data: buf }
    }

    /// Creates a matrix from 16 values in row-major order.
    pub fn from_row_major(data: [f64; 16]) -> Matrix4D {
        Matrix4D { data }
    }

    pub fn translation(x: f64, y: f64, z: f64) -> Matrix4D {
        let mut trans = Self::identity();
        trans[(0, 3)] = x;
        trans[(1, 3)] = y;
        trans[(2, 3)] = z;

        trans
    }

    pub fn scaling(x: f64, y: f64, z: f64) -> Matrix4D {
        let mut scale = Self::identity();
        scale[(0, 0)] = x;
        scale[(1, 1)] = y;
        scale[(2, 2)] = z;

        scale
    }

    /// Rotation about the X axis by `r` radians (right-handed).
    pub fn rotation_x(r: f64) -> Matrix4D {
        let mut rotate = Self::identity();
        rotate[(1, 1)] =  r.cos();
        rotate[(1, 2)] = -r.sin();
        rotate[(2, 1)] =  r.sin();
        rotate[(2, 2)] =  r.cos();

        rotate
    }

    /// Rotation about the Z axis by `r` radians (right-handed).
    pub fn rotation_z(r: f64) -> Matrix4D {
        let mut rotate = Self::identity();
        rotate[(0, 0)] =  r.cos();
        rotate[(0, 1)] = -r.sin();
        rotate[(1, 0)] =  r.sin();
        rotate[(1, 1)] =  r.cos();

        rotate
    }

    /// Builds a linear map whose columns are the three given vectors.
    ///
    /// The local X, Y and Z axes are sent to `c0`, `c1` and `c2`
    /// respectively; translation is zero.
    pub fn from_columns(c0: Tuple4D, c1: Tuple4D, c2: Tuple4D) -> Matrix4D {
        Matrix4D {
            data: [
                c0.x, c1.x, c2.x, 0.0,
                c0.y, c1.y, c2.y, 0.0,
                c0.z, c1.z, c2.z, 0.0,
                0.0,  0.0,  0.0,  1.0,
            ]
        }
    }

    pub fn transposition(&self) -> Matrix4D {
        let mut buf = Matrix4D::new();
        for r in 0..4 {
            for c in 0..4 {
                buf[(c, r)] = self[(r, c)];
            }
        }

        buf
    }

    /// Determinant of the 3x3 matrix left after removing `row` and `col`.
    pub fn minor(&self, row: usize, col: usize) -> f64 {
        let rows: Vec<usize> = (0..4).filter(|&r| r != row).collect();
        let cols: Vec<usize> = (0..4).filter(|&c| c != col).collect();
        let m = |r: usize, c: usize| self[(rows[r], cols[c])];

        m(0, 0) * (m(1, 1) * m(2, 2) - m(1, 2) * m(2, 1))
            - m(0, 1) * (m(1, 0) * m(2, 2) - m(1, 2) * m(2, 0))
            + m(0, 2) * (m(1, 0) * m(2, 1) - m(1, 1) * m(2, 0))
    }

    /// The minor at `row`, `col`, negated when `row + col` is odd.
    pub fn cofactor(&self, row: usize, col: usize) -> f64 {
        let m = self.minor(row, col);
        if (row + col) % 2 == 0 { m } else { -m }
    }

    pub fn determinant(&self) -> f64 {
        (0..4).map(|c| self[(0, c)] * self.cofactor(0, c)).sum()
    }

    /// Calculates the inverse through the adjugate, if it exists.
    ///
    /// Returns `None` for singular matrices.
    pub fn inverse(&self) -> Option<Matrix4D> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let mut inv = Matrix4D::new();
        for r in 0..4 {
            for c in 0..4 {
                inv[(c, r)] = self.cofactor(r, c) / det;
            }
        }

        Some(inv)
    }

    /// Replaces every entry smaller than `epsilon` in magnitude with `0.0`.
    pub fn snap_to_zero(&self, epsilon: f64) -> Matrix4D {
        let mut snapped = *self;
        for value in snapped.data.iter_mut() {
            if value.abs() < epsilon {
                *value = 0.0;
            }
        }

        snapped
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Exact element-wise comparison, unlike `==`.
    pub fn is_identity(&self) -> bool {
        self.data == Matrix4D::identity().data
    }
}

impl Index<(usize, usize)> for Matrix4D {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[(index.0 * 4) + index.1]
    }
}

impl IndexMut<(usize, usize)> for Matrix4D {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[(index.0 * 4) + index.1]
    }
}

/// Matrix product. Not commutative: `(a * b) * p` applies `b` first.
impl Mul<Matrix4D> for Matrix4D {
    type Output = Matrix4D;

    fn mul(self, other: Matrix4D) -> Matrix4D {
        let mut res = Matrix4D::new();

        for r in 0..4 {
            for c in 0..4 {
                res[(r, c)] = (0..4).map(|k| self[(r, k)] * other[(k, c)]).sum();
            }
        }

        res
    }
}

impl Mul<Tuple4D> for Matrix4D {
    type Output = Tuple4D;

    fn mul(self, t: Tuple4D) -> Tuple4D {
        let row = |r: usize| {
            self[(r, 0)] * t.x
                + self[(r, 1)] * t.y
                + self[(r, 2)] * t.z
                + self[(r, 3)] * t.w
        };

        Tuple4D { x: row(0), y: row(1), z: row(2), w: row(3) }
    }
}

/// Writes the persisted text form, one bracketed row after another.
///
/// Values use Rust's shortest round-trip formatting, so parsing the text
/// back yields the same bits.
impl fmt::Display for Matrix4D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            if r > 0 {
                write!(f, " ")?;
            }

            write!(f, "[ {:?}, {:?}, {:?}, {:?} ]",
                self[(r, 0)], self[(r, 1)], self[(r, 2)], self[(r, 3)])?;
        }

        Ok(())
    }
}

/// Parses the persisted text form.
///
/// Brackets, commas and any whitespace (including newlines) separate values.
/// Exactly 16 finite numbers are required, read in row-major order.
impl FromStr for Matrix4D {
    type Err = KernelError;

    fn from_str(text: &str) -> Result<Matrix4D, KernelError> {
        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',' || c == '[' || c == ']')
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.len() != 16 {
            return Err(KernelError::ParseError(format!(
                "expected 16 matrix entries, found {}", tokens.len()
            )));
        }

        let mut data = [0.0; 16];
        for (slot, token) in data.iter_mut().zip(tokens.iter()) {
            let value: f64 = token.parse().map_err(|_| KernelError::ParseError(
                format!("matrix entry '{}' is not a number", token)
            ))?;

            if !value.is_finite() {
                return Err(KernelError::ParseError(
                    format!("matrix entry '{}' is not finite", token)
                ));
            }

            *slot = value;
        }

        Ok(Matrix4D { data })
    }
}

/* Tests */

#[test]
fn multiply_by_identity() {
    let m = Matrix4D::from_row_major([
        0.0, 1.0, 2.0, 4.0,
        1.0, 2.0, 4.0, 8.0,
        2.0, 4.0, 8.0, 16.0,
        4.0, 8.0, 16.0, 32.0,
    ]);

    assert_eq!(m * Matrix4D::identity(), m);
    assert_eq!(Matrix4D::identity() * m, m);
}

#[test]
fn translation_moves_points_not_vectors() {
    let m = Matrix4D::translation(5.0, -3.0, 2.0);

    assert_eq!(m * Tuple4D::point(-3.0, 4.0, 5.0), Tuple4D::point(2.0, 1.0, 7.0));
    assert_eq!(m * Tuple4D::vector(-3.0, 4.0, 5.0), Tuple4D::vector(-3.0, 4.0, 5.0));
}

#[test]
fn rotation_x_quarter_turn() {
    let m = Matrix4D::rotation_x(std::f64::consts::FRAC_PI_2);
    assert_eq!(m * Tuple4D::point(0.0, 1.0, 0.0), Tuple4D::point(0.0, 0.0, 1.0));
}

#[test]
fn determinant_of_4x4() {
    let m = Matrix4D::from_row_major([
        -2.0, -8.0,  3.0,  5.0,
        -3.0,  1.0,  7.0,  3.0,
         1.0,  2.0, -9.0,  6.0,
        -6.0,  7.0,  7.0, -9.0,
    ]);

    assert_eq!(m.cofactor(0, 0), 690.0);
    assert_eq!(m.cofactor(0, 1), 447.0);
    assert_eq!(m.cofactor(0, 2), 210.0);
    assert_eq!(m.cofactor(0, 3), 51.0);
    assert_eq!(m.determinant(), -4071.0);
}

#[test]
fn inverse_undoes_product() {
    let a = Matrix4D::translation(1.0, 2.0, 3.0)
        * Matrix4D::rotation_z(0.3)
        * Matrix4D::scaling(2.0, 0.5, 1.5);
    let b = Matrix4D::rotation_x(-1.1);
    let c = a * b;

    assert_eq!(c * b.inverse().unwrap(), a);
    assert_eq!(a.inverse().unwrap() * a, Matrix4D::identity());
}

#[test]
fn singular_matrix_has_no_inverse() {
    let m = Matrix4D::scaling(1.0, 0.0, 1.0);
    assert!(m.inverse().is_none());
}

#[test]
fn columns_map_axes() {
    let t = Tuple4D::vector(0.0, 0.0, 1.0);
    let i = Tuple4D::vector(1.0, 0.0, 0.0);
    let p = Tuple4D::vector(0.0, 1.0, 0.0);
    let m = Matrix4D::from_columns(t, i, p);

    assert_eq!(m * Tuple4D::vector(0.0, 1.0, 0.0), i);
}

#[test]
fn snap_clears_tiny_entries() {
    let mut m = Matrix4D::identity();
    m[(0, 1)] = 3.0e-17;
    m[(2, 1)] = -4.0e-9;
    m[(1, 2)] = 0.25;

    let snapped = m.snap_to_zero(1.0e-6);
    assert_eq!(snapped[(0, 1)], 0.0);
    assert_eq!(snapped[(2, 1)], 0.0);
    assert_eq!(snapped[(1, 2)], 0.25);
}

#[test]
fn identity_text_form() {
    assert_eq!(
        Matrix4D::identity().to_string(),
        "[ 1.0, 0.0, 0.0, 0.0 ] [ 0.0, 1.0, 0.0, 0.0 ] \
         [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]"
    );
}

#[test]
fn parse_accepts_newline_separated_rows() {
    let text = "[ 1, 0, 0, 0 ]\n[ 0, 0.5, -0.866025, 0 ]\n\
                [ 0, 0.866025, 0.5, 0 ]\n[ 0, 0, 0, 1 ]\n";
    let m: Matrix4D = text.parse().unwrap();

    assert_eq!(m[(1, 2)], -0.866025);
    assert_eq!(m[(2, 1)], 0.866025);
    assert_eq!(m[(3, 3)], 1.0);
}

#[test]
fn text_round_trip_is_exact() {
    let m = Matrix4D::rotation_x(0.7) * Matrix4D::translation(0.1, -2.5, 1e-3);
    let parsed: Matrix4D = m.to_string().parse().unwrap();

    for r in 0..4 {
        for c in 0..4 {
            assert_eq!(parsed[(r, c)].to_bits(), m[(r, c)].to_bits());
        }
    }
}

#[test]
fn parse_rejects_wrong_token_count() {
    let err = "[ 1.0, 0.0, 0.0 ] [ 0.0, 1.0, 0.0 ]".parse::<Matrix4D>();
    assert!(matches!(err, Err(KernelError::ParseError(_))));
}

#[test]
fn parse_rejects_non_numeric_entries() {
    let text = "[ 1.0, 0.0, 0.0, 0.0 ] [ 0.0, one, 0.0, 0.0 ] \
                [ 0.0, 0.0, 1.0, 0.0 ] [ 0.0, 0.0, 0.0, 1.0 ]";
    assert!(matches!(text.parse::<Matrix4D>(), Err(KernelError::ParseError(_))));

    let text = text.replace("one", "NaN");
    assert!(matches!(text.parse::<Matrix4D>(), Err(KernelError::ParseError(_))));
}
