use log::{debug, info, trace, warn};

use super::linalg;
use super::problem::{CostKind, Costs, FitProblem, Jacobian, ResidualSet, norm};
use crate::error::Result;
use crate::model::VariationalModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The iteration limit was reached.
    MaxSteps,
    /// The unregularized validation residual hit 0 or NaN.
    ValidationExhausted,
    /// Too many iterations without a new validation minimum.
    NoImprovement,
}

/// Decides after each iteration whether the fit should end.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    max_steps: usize,
    max_no_improve: usize,
    best: Option<f64>,
    count: usize,
}

impl EarlyStopping {
    pub fn new(max_steps: usize, max_no_improve: usize) -> Self {
        Self {
            max_steps,
            max_no_improve,
            best: None,
            count: 0,
        }
    }

    /// Lowest validation residual seen so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Feeds the outcome of iteration `n_iter`. `validation` is the norm of
    /// the unregularized validation residual, if there is a validation set.
    pub fn update(&mut self, n_iter: usize, validation: Option<f64>) -> Option<StopReason> {
        if n_iter >= self.max_steps {
            return Some(StopReason::MaxSteps);
        }
        let resi = validation?;
        if resi == 0.0 || resi.is_nan() {
            return Some(StopReason::ValidationExhausted);
        }
        match self.best {
            Some(best) if resi >= best => {
                self.count += 1;
                debug!("validation residual {resi} above minimum {best} for {} iteration(s)", self.count);
                if self.count >= self.max_no_improve {
                    return Some(StopReason::NoImprovement);
                }
            }
            _ => {
                self.count = 0;
                self.best = Some(resi);
            }
        }
        None
    }
}

/// Cost `|r|^2` of the training residual at some betas.
pub type CostFn<'a> = dyn FnMut(&[f64]) -> Result<f64> + 'a;

/// One iteration of a nonlinear least-squares method.
pub trait LeastSquaresSolver {
    /// Proposes new betas from the current ones, the residuals and their
    /// Jacobian. `cost` evaluates trial betas for methods that accept or
    /// reject steps; it leaves the model at the last betas it was given.
    ///
    /// # Errors
    ///
    /// Propagates failures of `cost`.
    fn step(
        &mut self,
        betas: &[f64],
        residuals: &[f64],
        jacobian: &Jacobian,
        cost: &mut CostFn<'_>,
    ) -> Result<Vec<f64>>;
}

/// Steepest descent on `|r|^2 / 2` with a fixed step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDescent {
    pub learning_rate: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self { learning_rate: 0.01 }
    }
}

impl LeastSquaresSolver for GradientDescent {
    fn step(
        &mut self,
        betas: &[f64],
        residuals: &[f64],
        jacobian: &Jacobian,
        _cost: &mut CostFn<'_>,
    ) -> Result<Vec<f64>> {
        let grad = jacobian.transpose_mul(residuals);
        Ok(betas
            .iter()
            .zip(grad)
            .map(|(b, g)| b - self.learning_rate * g)
            .collect())
    }
}

const MAX_DAMPING: f64 = 1e16;

/// Levenberg-Marquardt with Marquardt's diagonal scaling.
///
/// Each step solves `(J^T J + mu * diag(J^T J)) d = -J^T r` and retries with
/// a larger `mu` until the cost drops. An accepted step shrinks `mu` again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    pub damping: f64,
    pub increase: f64,
    pub decrease: f64,
    /// Rejected trials per iteration before giving up on the iteration.
    pub max_tries: usize,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            damping: 1e-3,
            increase: 10.0,
            decrease: 0.1,
            max_tries: 12,
        }
    }
}

impl LevenbergMarquardt {
    fn raise(&mut self) {
        self.damping = (self.damping * self.increase).min(MAX_DAMPING);
    }
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn step(
        &mut self,
        betas: &[f64],
        residuals: &[f64],
        jacobian: &Jacobian,
        cost: &mut CostFn<'_>,
    ) -> Result<Vec<f64>> {
        let n = betas.len();
        let c0: f64 = residuals.iter().map(|r| r * r).sum();
        let grad = jacobian.transpose_mul(residuals);
        let jtj = jacobian.normal_matrix();
        let scale: Vec<f64> = (0..n).map(|i| jtj[i * n + i].max(f64::EPSILON)).collect();

        for _ in 0..self.max_tries {
            let mut a = jtj.clone();
            for (i, s) in scale.iter().enumerate() {
                a[i * n + i] += self.damping * s;
            }
            let Some(l) = linalg::cholesky(&a, n) else {
                self.raise();
                continue;
            };
            let delta = linalg::cholesky_solve(&l, n, &grad);
            let trial: Vec<f64> = betas.iter().zip(&delta).map(|(b, d)| b - d).collect();
            let c = cost(&trial)?;
            if c < c0 {
                trace!("accepted step at damping {}: {c0} -> {c}", self.damping);
                self.damping = (self.damping * self.decrease).max(f64::MIN_POSITIVE);
                return Ok(trial);
            }
            self.raise();
        }
        debug!("no descent step found, damping now {}", self.damping);
        cost(betas)?;
        Ok(betas.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub n_iter: usize,
    pub reason: StopReason,
    pub training: Costs,
    pub validation: Option<Costs>,
    /// One standard error per beta, `sqrt(diag((J^T J)^-1) * chisq / dof)`
    /// on the full training residual. NaN when `J^T J` is singular.
    pub errors: Vec<f64>,
}

/// Iterates `solver` on the full cost until the early stopping rule fires.
///
/// # Errors
///
/// Propagates model input errors.
pub fn fit<M, S>(model: &mut M, problem: &FitProblem, solver: &mut S) -> Result<FitReport>
where
    M: VariationalModel + ?Sized,
    S: LeastSquaresSolver + ?Sized,
{
    let config = problem.config();
    let mut stopper = EarlyStopping::new(config.max_steps, config.max_no_improve);
    let mut n_iter = 0;

    let reason = loop {
        let (r, jac) = problem.residuals_and_jacobian(model, CostKind::Full)?;
        let betas = model.betas();
        let next = {
            let mut cost = |b: &[f64]| -> Result<f64> {
                model.set_betas(b)?;
                let r = problem.residuals(model, ResidualSet::Training, CostKind::Full)?;
                Ok(r.iter().map(|v| v * v).sum())
            };
            solver.step(&betas, &r, &jac, &mut cost)?
        };
        model.set_betas(&next)?;
        n_iter += 1;

        let validation = if problem.has_validation() {
            let rv = problem.residuals(model, ResidualSet::Validation, CostKind::NoReg)?;
            Some(norm(&rv))
        } else {
            None
        };
        debug!("iteration {n_iter}: |f| = {} (train), {validation:?} (vali)", norm(&r));

        if let Some(reason) = stopper.update(n_iter, validation) {
            break reason;
        }
    };

    let training = problem.costs(model, ResidualSet::Training)?;
    let validation = if problem.has_validation() {
        Some(problem.costs(model, ResidualSet::Validation)?)
    } else {
        None
    };
    let errors = fit_errors(model, problem)?;
    info!("fit stopped after {n_iter} iteration(s): {reason:?}, training cost {}", training.full);

    Ok(FitReport {
        n_iter,
        reason,
        training,
        validation,
        errors,
    })
}

/// Standard errors of the betas at the model's current point.
///
/// # Errors
///
/// Propagates model input errors.
pub fn fit_errors<M>(model: &mut M, problem: &FitProblem) -> Result<Vec<f64>>
where
    M: VariationalModel + ?Sized,
{
    let (r, jac) = problem.residuals_and_jacobian(model, CostKind::Full)?;
    let n = jac.n_cols();
    let chisq: f64 = r.iter().map(|v| v * v).sum();
    let dof = jac.n_rows().saturating_sub(n).max(1) as f64;
    match linalg::inverse_diagonal(&jac.normal_matrix(), n) {
        Some(diag) => Ok(diag.iter().map(|d| (d * chisq / dof).sqrt()).collect()),
        None => {
            warn!("singular normal matrix, fit errors unavailable");
            Ok(vec![f64::NAN; n])
        }
    }
}
