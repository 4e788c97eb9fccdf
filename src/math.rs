// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

/// Fit a least-squares polynomial of the given degree to the supplied points.
/// Coefficients are returned lowest order first, i.e. the result `c` satisfies
/// y ≈ c[0] + c[1] x + c[2] x² + ...
///
/// The normal equations are solved directly with Gaussian elimination; the
/// degrees used by this crate are 1 and 2, and the abscissae are distinct
/// reference frequencies, so the system is always well conditioned enough for
/// this to be fine.
pub(crate) fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Vec<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert!(xs.len() > degree);

    let n = degree + 1;

    // Power sums Σ x^k for k = 0..2*degree fill the normal matrix.
    let mut power_sums = vec![0.0; 2 * degree + 1];
    for &x in xs {
        let mut xp = 1.0;
        for sum in power_sums.iter_mut() {
            *sum += xp;
            xp *= x;
        }
    }

    // Augmented matrix [AᵀA | Aᵀy].
    let mut m = vec![vec![0.0; n + 1]; n];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, elem) in row.iter_mut().take(n).enumerate() {
            *elem = power_sums[i + j];
        }
    }
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let mut xp = 1.0;
        for row in m.iter_mut() {
            row[n] += xp * y;
            xp *= x;
        }
    }

    // Gaussian elimination with partial pivoting.
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }
    let mut coeffs = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = m[row][n];
        for k in row + 1..n {
            acc -= m[row][k] * coeffs[k];
        }
        coeffs[row] = acc / m[row][row];
    }
    coeffs
}

/// Evaluate a polynomial with coefficients ordered lowest first (as returned
/// by [`polyfit`]) at `x`.
pub(crate) fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn linear_fit_recovers_a_line() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [3.0, 5.0, 7.0, 9.0];
        let c = polyfit(&xs, &ys, 1);
        assert_abs_diff_eq!(c[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn quadratic_fit_is_exact_on_three_points() {
        // y = 2 - x + 0.5 x²
        let xs = [0.0, 1.0, 2.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 - x + 0.5 * x * x).collect();
        let c = polyfit(&xs, &ys, 2);
        assert_abs_diff_eq!(c[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn overdetermined_linear_fit_minimises_residuals() {
        // Points on y = x with one outlier pulled symmetrically; the fit
        // should still pass through the mean.
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.1, 0.9, 2.1, 2.9];
        let c = polyfit(&xs, &ys, 1);
        assert_abs_diff_eq!(polyval(&c, 1.5), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn polyval_matches_horner_expansion() {
        let c = [1.0, -2.0, 3.0];
        assert_abs_diff_eq!(polyval(&c, 2.0), 1.0 - 4.0 + 12.0, epsilon = 1e-12);
    }
}
