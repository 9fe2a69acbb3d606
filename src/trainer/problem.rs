use log::trace;

use super::data::TrainingData;
use crate::error::{NetError, Result};
use crate::model::VariationalModel;

/// Weights of the cost terms and the stopping limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    /// Weight decay strength, spread evenly over all betas.
    pub lambda_r: f64,
    /// Strength of the first derivative matching term.
    pub lambda_d1: f64,
    /// Strength of the second derivative matching term.
    pub lambda_d2: f64,
    pub max_steps: usize,
    /// Iterations without a new validation minimum before giving up.
    pub max_no_improve: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lambda_r: 0.0,
            lambda_d1: 0.0,
            lambda_d2: 0.0,
            max_steps: 100,
            max_no_improve: 5,
        }
    }
}

/// Which blocks of the residual vector to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    /// Value residuals only.
    Pure,
    /// Values and, if configured, derivatives.
    NoReg,
    /// Everything, weight decay included.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualSet {
    Training,
    Validation,
}

/// Euclidean norms of the three cost kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Costs {
    pub pure: f64,
    pub noreg: f64,
    pub full: f64,
}

/// Row-major residual Jacobian: one row per residual, one column per beta.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl Jacobian {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            data: vec![0.0; n_rows * n_cols],
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.n_cols + c]
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.n_cols..(r + 1) * self.n_cols]
    }

    fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.n_cols..(r + 1) * self.n_cols]
    }

    /// `J^T v`
    pub fn transpose_mul(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.n_rows);
        let mut out = vec![0.0; self.n_cols];
        for (r, &vr) in v.iter().enumerate() {
            for (o, &j) in out.iter_mut().zip(self.row(r)) {
                *o += j * vr;
            }
        }
        out
    }

    /// `J^T J`, row-major and `n_cols` square.
    pub fn normal_matrix(&self) -> Vec<f64> {
        let n = self.n_cols;
        let mut out = vec![0.0; n * n];
        for r in 0..self.n_rows {
            let row = self.row(r);
            for (a, &ja) in row.iter().enumerate() {
                if ja == 0.0 {
                    continue;
                }
                for (b, &jb) in row.iter().enumerate().skip(a) {
                    out[a * n + b] += ja * jb;
                }
            }
        }
        for a in 0..n {
            for b in 0..a {
                out[a * n + b] = out[b * n + a];
            }
        }
        out
    }
}

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Residuals and Jacobians of a least-squares fit of a model to data.
///
/// For `n` points the residual vector is laid out as
///
/// - `[0, n*yndim)`: `w * (y_net - y)` at `i*yndim + j`
/// - then, if any derivative term is configured, two blocks of
///   `n*xndim*yndim` each for first and second derivatives, entry
///   `(i, j, k)` at `block + i*yndim + k*n*yndim + j`; an unconfigured
///   order leaves its block at zero
/// - then, if `lambda_r > 0`, one entry `sqrt(lambda_r / n_vp) * beta` per
///   beta
#[derive(Debug, Clone)]
pub struct FitProblem {
    data: TrainingData,
    config: TrainingConfig,
    n_vp: usize,
}

impl FitProblem {
    /// # Errors
    ///
    /// Fails on invalid data, negative lambdas, data that does not match the
    /// model's widths, or a model lacking a derivative order the cost needs.
    pub fn new<M: VariationalModel + ?Sized>(
        model: &M,
        data: TrainingData,
        config: TrainingConfig,
    ) -> Result<Self> {
        let data = data.validated()?;
        for (name, v) in [
            ("lambda_r", config.lambda_r),
            ("lambda_d1", config.lambda_d1),
            ("lambda_d2", config.lambda_d2),
        ] {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(NetError::InvalidParam {
                    name: name.into(),
                    value: v.to_string(),
                });
            }
        }
        if data.xndim() != model.n_input() {
            return Err(NetError::DimensionMismatch {
                expected: model.n_input(),
                actual: data.xndim(),
            });
        }
        if data.yndim() != model.n_output() {
            return Err(NetError::DimensionMismatch {
                expected: model.n_output(),
                actual: data.yndim(),
            });
        }

        let d = model.derivatives();
        if !d.vd1 {
            return Err(NetError::MissingDerivatives("vd1"));
        }
        if config.lambda_d1 > 0.0 && !(d.d1 && d.c1) {
            return Err(NetError::MissingDerivatives("c1"));
        }
        if config.lambda_d2 > 0.0 && !(d.d2 && d.c2) {
            return Err(NetError::MissingDerivatives("c2"));
        }

        Ok(Self {
            data,
            config,
            n_vp: model.n_vp(),
        })
    }

    pub fn data(&self) -> &TrainingData {
        &self.data
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn has_derivative_terms(&self) -> bool {
        self.config.lambda_d1 > 0.0 || self.config.lambda_d2 > 0.0
    }

    pub fn has_regularization(&self) -> bool {
        self.config.lambda_r > 0.0
    }

    pub fn has_validation(&self) -> bool {
        self.data.n_validation() > 0
    }

    fn points(&self, set: ResidualSet) -> std::ops::Range<usize> {
        match set {
            ResidualSet::Training => 0..self.data.n_training(),
            ResidualSet::Validation => self.data.n_training()..self.data.n_data(),
        }
    }

    pub fn n_residuals(&self, set: ResidualSet, kind: CostKind) -> usize {
        let n = self.points(set).len();
        let base = n * self.data.yndim();
        let deriv = if kind != CostKind::Pure && self.has_derivative_terms() {
            2 * base * self.data.xndim()
        } else {
            0
        };
        let reg = if kind == CostKind::Full && self.has_regularization() {
            self.n_vp
        } else {
            0
        };
        base + deriv + reg
    }

    /// # Errors
    ///
    /// Propagates input errors from the model.
    pub fn residuals<M: VariationalModel + ?Sized>(
        &self,
        model: &mut M,
        set: ResidualSet,
        kind: CostKind,
    ) -> Result<Vec<f64>> {
        self.assemble(model, set, kind, None)
    }

    /// Residuals and Jacobian of the training set, one propagation per point.
    ///
    /// # Errors
    ///
    /// Propagates input errors from the model.
    pub fn residuals_and_jacobian<M: VariationalModel + ?Sized>(
        &self,
        model: &mut M,
        kind: CostKind,
    ) -> Result<(Vec<f64>, Jacobian)> {
        let mut jac = Jacobian::zeros(self.n_residuals(ResidualSet::Training, kind), self.n_vp);
        let r = self.assemble(model, ResidualSet::Training, kind, Some(&mut jac))?;
        Ok((r, jac))
    }

    /// Norms of all three cost kinds on `set`.
    ///
    /// # Errors
    ///
    /// Propagates input errors from the model.
    pub fn costs<M: VariationalModel + ?Sized>(&self, model: &mut M, set: ResidualSet) -> Result<Costs> {
        let r = self.residuals(model, set, CostKind::Full)?;
        let n_pure = self.n_residuals(set, CostKind::Pure);
        let n_noreg = self.n_residuals(set, CostKind::NoReg);
        Ok(Costs {
            pure: norm(&r[..n_pure]),
            noreg: norm(&r[..n_noreg]),
            full: norm(&r),
        })
    }

    fn assemble<M: VariationalModel + ?Sized>(
        &self,
        model: &mut M,
        set: ResidualSet,
        kind: CostKind,
        mut jac: Option<&mut Jacobian>,
    ) -> Result<Vec<f64>> {
        let data = &self.data;
        let (xndim, yndim) = (data.xndim(), data.yndim());
        let points = self.points(set);
        let nshift = points.len() * yndim;
        let nshift2 = nshift + nshift * xndim;
        let with_deriv = kind != CostKind::Pure && self.has_derivative_terms();
        let (flag_d1, flag_d2) = (self.config.lambda_d1 > 0.0, self.config.lambda_d2 > 0.0);
        let l1 = self.config.lambda_d1.sqrt();
        let l2 = self.config.lambda_d2.sqrt();

        let mut r = vec![0.0; self.n_residuals(set, kind)];

        for (local, i) in points.enumerate() {
            model.set_input(data.x(i))?;
            model.ff_propagate();
            let ishift = local * yndim;

            for j in 0..yndim {
                let w = data.w(i, j);
                r[ishift + j] = w * (model.output(j) - data.y(i, j));
                if let Some(jac) = jac.as_deref_mut() {
                    for (b, slot) in jac.row_mut(ishift + j).iter_mut().enumerate() {
                        *slot = w * model.variational_first_derivative(j, b);
                    }
                }
                if !with_deriv {
                    continue;
                }

                for k in 0..xndim {
                    let row1 = nshift + ishift + k * nshift + j;
                    let row2 = nshift2 + ishift + k * nshift + j;
                    if flag_d1 {
                        r[row1] = w * l1 * (model.first_derivative(j, k) - data.yd1(i, j, k));
                    }
                    if flag_d2 {
                        r[row2] = w * l2 * (model.second_derivative(j, k) - data.yd2(i, j, k));
                    }
                    if let Some(jac) = jac.as_deref_mut() {
                        if flag_d1 {
                            for (b, slot) in jac.row_mut(row1).iter_mut().enumerate() {
                                *slot = w * l1 * model.cross_first_derivative(j, k, b);
                            }
                        }
                        if flag_d2 {
                            for (b, slot) in jac.row_mut(row2).iter_mut().enumerate() {
                                *slot = w * l2 * model.cross_second_derivative(j, k, b);
                            }
                        }
                    }
                }
            }
        }

        if kind == CostKind::Full && self.has_regularization() {
            let lambda_r_red = (self.config.lambda_r / self.n_vp as f64).sqrt();
            let offset = self.n_residuals(set, CostKind::NoReg);
            for (b, beta) in model.betas().into_iter().enumerate() {
                r[offset + b] = lambda_r_red * beta;
                if let Some(jac) = jac.as_deref_mut() {
                    jac.row_mut(offset + b)[b] = lambda_r_red;
                }
            }
        }

        trace!("assembled {} residuals for {:?} ({:?})", r.len(), set, kind);
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DerivFlags, FeedForwardNetwork};

    fn line_net() -> FeedForwardNetwork {
        let mut net = FeedForwardNetwork::new(1).unwrap();
        net.push_layer_with_code(1, "id_").unwrap();
        net.connect(Some(0)).unwrap();
        net.enable_derivatives(DerivFlags::ALL);
        net.set_betas(&[1.0, 2.0]).unwrap();
        net
    }

    fn data() -> TrainingData {
        TrainingData::new(1, 1, vec![0.0, 1.0, 2.0], vec![1.0, 3.0, 4.0])
            .with_first_derivatives(vec![2.0, 2.0, 0.0])
            .with_validation_split(2)
    }

    #[test]
    fn layout_sizes() {
        let net = line_net();
        let config = TrainingConfig {
            lambda_r: 0.5,
            lambda_d1: 1.0,
            ..TrainingConfig::default()
        };
        let p = FitProblem::new(&net, data(), config).unwrap();
        assert_eq!(p.n_residuals(ResidualSet::Training, CostKind::Pure), 2);
        assert_eq!(p.n_residuals(ResidualSet::Training, CostKind::NoReg), 6);
        assert_eq!(p.n_residuals(ResidualSet::Training, CostKind::Full), 8);
        assert_eq!(p.n_residuals(ResidualSet::Validation, CostKind::Full), 1 + 2 + 2);
    }

    #[test]
    fn residual_values_and_jacobian() {
        let mut net = line_net();
        let config = TrainingConfig {
            lambda_r: 2.0,
            lambda_d1: 4.0,
            ..TrainingConfig::default()
        };
        let p = FitProblem::new(&net, data(), config).unwrap();
        let (r, jac) = p.residuals_and_jacobian(&mut net, CostKind::Full).unwrap();
        // y = 1 + 2x fits both training points exactly
        assert_eq!(&r[..2], &[0.0, 0.0]);
        // d1 block: 2 * (2 - 2), second derivative block stays zero
        assert_eq!(&r[2..6], &[0.0, 0.0, 0.0, 0.0]);
        // weight decay: sqrt(2 / 2) * beta
        assert_eq!(&r[6..], &[1.0, 2.0]);

        assert_eq!(jac.row(0), &[1.0, 0.0]);
        assert_eq!(jac.row(1), &[1.0, 1.0]);
        assert_eq!(jac.row(2), &[0.0, 2.0]);
        assert_eq!(jac.row(6), &[1.0, 0.0]);
        assert_eq!(jac.row(7), &[0.0, 1.0]);

        let vali = p.residuals(&mut net, ResidualSet::Validation, CostKind::Pure).unwrap();
        assert_eq!(vali, vec![1.0]);
        let costs = p.costs(&mut net, ResidualSet::Validation).unwrap();
        assert_eq!(costs.pure, 1.0);
        assert_eq!(costs.noreg, (1.0f64 + 16.0).sqrt());
    }

    #[test]
    fn missing_orders_rejected() {
        let mut net = line_net();
        net.enable_derivatives(DerivFlags::VD1);
        let config = TrainingConfig {
            lambda_d1: 1.0,
            ..TrainingConfig::default()
        };
        assert_eq!(
            FitProblem::new(&net, data(), config).unwrap_err(),
            NetError::MissingDerivatives("c1")
        );
        let config = TrainingConfig {
            lambda_r: -1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            FitProblem::new(&net, data(), config),
            Err(NetError::InvalidParam { .. })
        ));
    }

    #[test]
    fn transpose_product() {
        let mut j = Jacobian::zeros(2, 2);
        j.row_mut(0).copy_from_slice(&[1.0, 2.0]);
        j.row_mut(1).copy_from_slice(&[3.0, 4.0]);
        assert_eq!(j.transpose_mul(&[1.0, 1.0]), vec![4.0, 6.0]);
        assert_eq!(j.get(1, 0), 3.0);
        assert_eq!(j.normal_matrix(), vec![10.0, 14.0, 14.0, 20.0]);
    }
}
