use briny::prelude::*;

use crate::error::{NetError, Result};

/// Sample points for a fit, optionally with target derivatives and
/// per-output weights.
///
/// The first `n_training` points drive the fit, the rest are the
/// validation set used for early stopping. Storage is flat and row-major:
///
/// - `x[i * xndim + k]`
/// - `y[i * yndim + j]`, `w[i * yndim + j]`
/// - `yd1[(i * yndim + j) * xndim + k]`, same for `yd2`
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    xndim: usize,
    yndim: usize,
    n_training: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    yd1: Option<Vec<f64>>,
    yd2: Option<Vec<f64>>,
    w: Option<Vec<f64>>,
}

impl TrainingData {
    /// Every point is a training point until
    /// [`with_validation_split`](Self::with_validation_split) says otherwise.
    pub fn new(xndim: usize, yndim: usize, x: Vec<f64>, y: Vec<f64>) -> Self {
        let n = if xndim == 0 { 0 } else { x.len() / xndim };
        Self {
            xndim,
            yndim,
            n_training: n,
            x,
            y,
            yd1: None,
            yd2: None,
            w: None,
        }
    }

    #[must_use]
    pub fn with_validation_split(mut self, n_training: usize) -> Self {
        self.n_training = n_training;
        self
    }

    #[must_use]
    pub fn with_first_derivatives(mut self, yd1: Vec<f64>) -> Self {
        self.yd1 = Some(yd1);
        self
    }

    #[must_use]
    pub fn with_second_derivatives(mut self, yd2: Vec<f64>) -> Self {
        self.yd2 = Some(yd2);
        self
    }

    #[must_use]
    pub fn with_weights(mut self, w: Vec<f64>) -> Self {
        self.w = Some(w);
        self
    }

    pub fn xndim(&self) -> usize {
        self.xndim
    }

    pub fn yndim(&self) -> usize {
        self.yndim
    }

    pub fn n_data(&self) -> usize {
        if self.xndim == 0 { 0 } else { self.x.len() / self.xndim }
    }

    pub fn n_training(&self) -> usize {
        self.n_training
    }

    pub fn n_validation(&self) -> usize {
        self.n_data().saturating_sub(self.n_training)
    }

    pub fn x(&self, i: usize) -> &[f64] {
        &self.x[i * self.xndim..(i + 1) * self.xndim]
    }

    pub fn y(&self, i: usize, j: usize) -> f64 {
        self.y[i * self.yndim + j]
    }

    /// Point weight, 1 when none were given.
    pub fn w(&self, i: usize, j: usize) -> f64 {
        self.w.as_ref().map_or(1.0, |w| w[i * self.yndim + j])
    }

    /// Target `dy_j/dx_k`, 0 when none were given.
    pub fn yd1(&self, i: usize, j: usize, k: usize) -> f64 {
        self.yd1
            .as_ref()
            .map_or(0.0, |d| d[(i * self.yndim + j) * self.xndim + k])
    }

    pub fn yd2(&self, i: usize, j: usize, k: usize) -> f64 {
        self.yd2
            .as_ref()
            .map_or(0.0, |d| d[(i * self.yndim + j) * self.xndim + k])
    }

    /// Describes the first inconsistency found, if any.
    pub fn problem(&self) -> Option<String> {
        if self.xndim == 0 || self.yndim == 0 {
            return Some("xndim and yndim must be positive".into());
        }
        if self.x.len() % self.xndim != 0 {
            return Some(format!("{} x values do not split into rows of {}", self.x.len(), self.xndim));
        }
        let n = self.n_data();
        if self.y.len() != n * self.yndim {
            return Some(format!("expected {} y values, got {}", n * self.yndim, self.y.len()));
        }
        if self.n_training == 0 || self.n_training > n {
            return Some(format!("{} training points out of {n}", self.n_training));
        }
        let nd = n * self.yndim * self.xndim;
        for (name, d) in [("yd1", &self.yd1), ("yd2", &self.yd2)] {
            if let Some(d) = d
                && d.len() != nd
            {
                return Some(format!("expected {nd} {name} values, got {}", d.len()));
            }
        }
        if let Some(w) = &self.w
            && w.len() != n * self.yndim
        {
            return Some(format!("expected {} weights, got {}", n * self.yndim, w.len()));
        }
        let finite = |v: &[f64]| v.iter().all(|f| f.is_finite());
        let all = [Some(&self.x), Some(&self.y), self.yd1.as_ref(), self.yd2.as_ref(), self.w.as_ref()];
        if !all.into_iter().flatten().all(|v| finite(v.as_slice())) {
            return Some("non-finite values".into());
        }
        None
    }

    /// Runs the data through validation and hands it back when it holds.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidTrainingData`] naming the first problem found.
    pub fn validated(self) -> Result<Self> {
        let problem = self.problem();
        let trusted = TrustedData::new(self)
            .map_err(|_| NetError::InvalidTrainingData(problem.unwrap_or_default()))?;
        Ok(trusted.into_inner())
    }
}

impl Validate for TrainingData {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        match self.problem() {
            None => Ok(()),
            Some(p) => {
                log::warn!("rejecting training data: {p}");
                Err(ValidationError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_columns() {
        let d = TrainingData::new(1, 1, vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0])
            .with_validation_split(2)
            .validated()
            .unwrap();
        assert_eq!(d.n_data(), 3);
        assert_eq!(d.n_validation(), 1);
        assert_eq!(d.w(2, 0), 1.0);
        assert_eq!(d.yd1(0, 0, 0), 0.0);
        assert_eq!(d.x(1), &[1.0]);
    }

    #[test]
    fn inconsistent_shapes_rejected() {
        let bad = TrainingData::new(2, 1, vec![0.0; 4], vec![0.0; 3]);
        assert!(matches!(bad.validated(), Err(NetError::InvalidTrainingData(_))));

        let bad = TrainingData::new(1, 1, vec![0.0; 2], vec![0.0; 2]).with_first_derivatives(vec![0.0]);
        assert!(bad.validated().is_err());

        let bad = TrainingData::new(1, 1, vec![0.0; 2], vec![0.0; 2]).with_validation_split(3);
        assert!(bad.validated().is_err());

        let bad = TrainingData::new(1, 1, vec![f64::NAN, 0.0], vec![0.0; 2]);
        assert!(bad.validated().is_err());
    }
}
