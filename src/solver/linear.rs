//! Matrix-free preconditioned BiCGStab
//!
//! The implicit stepper solves its Newton systems with a Krylov method that
//! only needs the operator as a matrix-vector product, supplied here as a
//! closure. The preconditioner is the diagonal (Jacobi) estimate handed in
//! by the caller.
//!
//! BiCGStab handles the non-symmetric Jacobians produced by upwind
//! transport; breakdown of any of its inner products is reported as a
//! stagnated, non-converged solve rather than an error — the Newton layer
//! decides what that means.

// ====== small dense-vector kernels ======

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm2(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

// =================================================================================================
// Settings and outcome
// =================================================================================================

/// Convergence control for the iterative linear solve
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSettings {
    /// Relative residual tolerance
    pub rtol: f64,
    /// Absolute residual floor
    pub atol: f64,
    /// Iteration cap
    pub max_iterations: usize,
}

impl Default for LinearSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iterations: 400,
        }
    }
}

/// Outcome of one linear solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSolution {
    pub converged: bool,
    pub iterations: usize,
    pub residual: f64,
}

// =================================================================================================
// BiCGStab
// =================================================================================================

/// Solve `A·x = b` with preconditioned BiCGStab
///
/// - `apply`: the matrix-vector product `out = A·v`
/// - `precond_diag`: diagonal of the preconditioner `M ≈ A`; applying
///   `M⁻¹` divides elementwise
/// - `x`: initial guess in, solution out
///
/// Returns a [`LinearSolution`]; breakdowns surface as `converged = false`.
pub fn bicgstab<F>(
    mut apply: F,
    b: &[f64],
    x: &mut [f64],
    precond_diag: &[f64],
    settings: &LinearSettings,
) -> LinearSolution
where
    F: FnMut(&[f64], &mut [f64]),
{
    let n = b.len();
    let breakdown = 1e-30;

    let precond = |src: &[f64], dst: &mut [f64]| {
        for i in 0..n {
            dst[i] = src[i] / precond_diag[i];
        }
    };

    // r = b − A·x, shadow residual fixed at the initial residual
    let mut r = vec![0.0; n];
    apply(x, &mut r);
    for i in 0..n {
        r[i] = b[i] - r[i];
    }
    let r0 = r.clone();

    let initial_norm = norm2(&r);
    let tolerance = settings.atol.max(settings.rtol * norm2(b).max(initial_norm));
    if initial_norm <= tolerance {
        return LinearSolution { converged: true, iterations: 0, residual: initial_norm };
    }

    let mut p = vec![0.0; n];
    let mut v = vec![0.0; n];
    let mut s = vec![0.0; n];
    let mut t = vec![0.0; n];
    let mut p_hat = vec![0.0; n];
    let mut s_hat = vec![0.0; n];

    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;

    for iteration in 1..=settings.max_iterations {
        let rho_new = dot(&r0, &r);
        if rho_new.abs() < breakdown {
            return LinearSolution {
                converged: false,
                iterations: iteration - 1,
                residual: norm2(&r),
            };
        }

        if iteration == 1 {
            p.copy_from_slice(&r);
        } else {
            let beta = (rho_new / rho) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }
        }
        rho = rho_new;

        precond(&p, &mut p_hat);
        apply(&p_hat, &mut v);

        let r0v = dot(&r0, &v);
        if r0v.abs() < breakdown {
            return LinearSolution { converged: false, iterations: iteration, residual: norm2(&r) };
        }
        alpha = rho / r0v;

        for i in 0..n {
            s[i] = r[i] - alpha * v[i];
        }
        let s_norm = norm2(&s);
        if s_norm <= tolerance {
            axpy(alpha, &p_hat, x);
            return LinearSolution { converged: true, iterations: iteration, residual: s_norm };
        }

        precond(&s, &mut s_hat);
        apply(&s_hat, &mut t);

        let tt = dot(&t, &t);
        if tt.abs() < breakdown {
            return LinearSolution { converged: false, iterations: iteration, residual: s_norm };
        }
        omega = dot(&t, &s) / tt;
        if omega.abs() < breakdown {
            return LinearSolution { converged: false, iterations: iteration, residual: s_norm };
        }

        axpy(alpha, &p_hat, x);
        axpy(omega, &s_hat, x);
        for i in 0..n {
            r[i] = s[i] - omega * t[i];
        }

        let residual = norm2(&r);
        log::trace!("BiCGStab iteration {iteration}: residual = {residual:.6e}");
        if residual <= tolerance {
            return LinearSolution { converged: true, iterations: iteration, residual };
        }
    }

    LinearSolution {
        converged: false,
        iterations: settings.max_iterations,
        residual: norm2(&r),
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Dense row-major matrix-vector product for the tests
    fn dense_apply(matrix: &[Vec<f64>]) -> impl FnMut(&[f64], &mut [f64]) + '_ {
        move |v: &[f64], out: &mut [f64]| {
            for (i, row) in matrix.iter().enumerate() {
                out[i] = dot(row, v);
            }
        }
    }

    fn tridiagonal(n: usize, lower: f64, diag: f64, upper: f64) -> Vec<Vec<f64>> {
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            matrix[i][i] = diag;
            if i > 0 {
                matrix[i][i - 1] = lower;
            }
            if i < n - 1 {
                matrix[i][i + 1] = upper;
            }
        }
        matrix
    }

    #[test]
    fn test_identity_system() {
        let matrix = tridiagonal(5, 0.0, 1.0, 0.0);
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut x = vec![0.0; 5];
        let diag = vec![1.0; 5];

        let outcome = bicgstab(dense_apply(&matrix), &b, &mut x, &diag, &LinearSettings::default());

        assert!(outcome.converged);
        for i in 0..5 {
            assert!((x[i] - b[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn test_nonsymmetric_tridiagonal() {
        // upwind-like operator: diagonally dominant, not symmetric
        let n = 40;
        let matrix = tridiagonal(n, -1.0, 4.0, -0.5);
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let diag = vec![4.0; n];

        let outcome = bicgstab(dense_apply(&matrix), &b, &mut x, &diag, &LinearSettings::default());
        assert!(outcome.converged, "residual {}", outcome.residual);

        // check the residual directly
        let mut ax = vec![0.0; n];
        dense_apply(&matrix)(&x, &mut ax);
        for i in 0..n {
            assert!((ax[i] - b[i]).abs() < 1e-6, "row {i}: {} vs {}", ax[i], b[i]);
        }
    }

    #[test]
    fn test_exact_initial_guess_converges_immediately() {
        let matrix = tridiagonal(6, -1.0, 3.0, -1.0);
        let x_exact = vec![0.5; 6];
        let mut b = vec![0.0; 6];
        dense_apply(&matrix)(&x_exact, &mut b);

        let mut x = x_exact.clone();
        let diag = vec![3.0; 6];
        let outcome = bicgstab(dense_apply(&matrix), &b, &mut x, &diag, &LinearSettings::default());

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_jacobi_preconditioner_speeds_convergence() {
        // badly scaled diagonal: Jacobi fixes the scaling
        let n = 30;
        let mut matrix = tridiagonal(n, -1.0, 0.0, -1.0);
        let mut diag = vec![0.0; n];
        for i in 0..n {
            let d = 4.0 * (1.0 + i as f64);
            matrix[i][i] = d;
            diag[i] = d;
        }
        let b = vec![1.0; n];

        let mut x_plain = vec![0.0; n];
        let plain = bicgstab(
            dense_apply(&matrix),
            &b,
            &mut x_plain,
            &vec![1.0; n],
            &LinearSettings::default(),
        );

        let mut x_precond = vec![0.0; n];
        let preconditioned =
            bicgstab(dense_apply(&matrix), &b, &mut x_precond, &diag, &LinearSettings::default());

        assert!(plain.converged && preconditioned.converged);
        assert!(preconditioned.iterations <= plain.iterations);
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let matrix = tridiagonal(20, -1.0, 2.1, -1.0);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let settings = LinearSettings { max_iterations: 1, rtol: 1e-14, atol: 1e-16 };

        let outcome = bicgstab(dense_apply(&matrix), &b, &mut x, &vec![2.1; 20], &settings);
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 1);
    }
}
