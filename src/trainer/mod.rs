//! Least-squares fitting against the [`VariationalModel`](crate::model::VariationalModel)
//! surface.
//!
//! A [`FitProblem`] turns validated [`TrainingData`] and a [`TrainingConfig`]
//! into residual vectors and Jacobians built from the model's analytic
//! weight and cross derivatives. [`fit`] iterates any [`LeastSquaresSolver`]
//! on them and stops on the iteration limit or when the validation residual
//! stops improving. [`LevenbergMarquardt`] is the default choice;
//! [`GradientDescent`] is a plain reference step.

mod data;
mod driver;
mod linalg;
mod problem;

pub use self::data::TrainingData;
pub use self::driver::{
    CostFn, EarlyStopping, FitReport, GradientDescent, LeastSquaresSolver, LevenbergMarquardt, StopReason, fit,
    fit_errors,
};
pub use self::problem::{CostKind, Costs, FitProblem, Jacobian, ResidualSet, TrainingConfig, norm};
