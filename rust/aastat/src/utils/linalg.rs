//! Small dense linear algebra for the least squares problems in this crate
//! (Savitzky-Golay coefficients and the 3 parameter gaussian fit).
//!
//! Matrices are row major `Vec<Vec<f64>>`, all of them are tiny.

const PIVOT_EPSILON: f64 = 1e-300;

/// Solves `a x = b` by gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is singular (or numerically so).
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    debug_assert_eq!(a.len(), n);
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b.iter())
        .map(|(row, &bi)| {
            let mut r = row.clone();
            r.push(bi);
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if !(m[pivot_row][col].abs() > PIVOT_EPSILON) {
            return None;
        }
        m.swap(col, pivot_row);
        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = m[row][n];
        for k in (row + 1)..n {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Inverse of a square matrix, column by column.
pub fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv = vec![vec![0.0; n]; n];
    let mut unit = vec![0.0; n];
    for col in 0..n {
        unit.iter_mut().for_each(|u| *u = 0.0);
        unit[col] = 1.0;
        let x = solve(a, &unit)?;
        for row in 0..n {
            inv[row][col] = x[row];
        }
    }
    Some(inv)
}
