//! Pointwise activation functions.
//!
//! Every function exposes its value and its first three derivatives. The
//! third derivative is only needed for the cross second derivative, but
//! providing it everywhere keeps the contract uniform.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{NetError, Result};

/// A scalar map `f: R -> R` with up to three derivatives.
///
/// Implementations are stateless, so a single instance can be shared by any
/// number of units (and threads).
pub trait ActivationFunction: Send + Sync + Debug {
    /// Short code identifying the function inside string codes.
    fn id_code(&self) -> &'static str;

    /// `f(x)`
    fn f(&self, x: f64) -> f64;

    /// `f'(x)`
    fn f1d(&self, x: f64) -> f64;

    /// `f''(x)`
    fn f2d(&self, x: f64) -> f64;

    /// `f'''(x)`
    fn f3d(&self, x: f64) -> f64;

    /// Mean of the input distribution the function is most expressive on.
    fn ideal_input_mu(&self) -> f64 {
        0.0
    }

    /// Standard deviation of that input distribution.
    fn ideal_input_sigma(&self) -> f64 {
        1.0
    }

    /// Mean and standard deviation of `f(X)` for `X ~ N(mu, sigma^2)`.
    ///
    /// Uses three-point Gauss-Hermite quadrature, which is exact for
    /// polynomials up to degree five.
    fn output_moments(&self, mu: f64, sigma: f64) -> (f64, f64) {
        let h = 3.0_f64.sqrt() * sigma;
        let (lo, mid, hi) = (self.f(mu - h), self.f(mu), self.f(mu + h));
        let mean = (lo + 4.0 * mid + hi) / 6.0;
        let second = (lo * lo + 4.0 * mid * mid + hi * hi) / 6.0;
        (mean, (second - mean * mean).max(0.0).sqrt())
    }
}

/// `f(x) = x`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl ActivationFunction for Identity {
    fn id_code(&self) -> &'static str {
        "id_"
    }

    fn f(&self, x: f64) -> f64 {
        x
    }

    fn f1d(&self, _x: f64) -> f64 {
        1.0
    }

    fn f2d(&self, _x: f64) -> f64 {
        0.0
    }

    fn f3d(&self, _x: f64) -> f64 {
        0.0
    }
}

/// Logistic sigmoid `1 / (1 + e^-x)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Logistic;

impl Logistic {
    #[inline]
    fn s(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
}

impl ActivationFunction for Logistic {
    fn id_code(&self) -> &'static str {
        "lgs"
    }

    /// Standard deviation of the logistic distribution, `pi / sqrt(3)`.
    fn ideal_input_sigma(&self) -> f64 {
        std::f64::consts::PI / 3.0_f64.sqrt()
    }

    fn f(&self, x: f64) -> f64 {
        Self::s(x)
    }

    fn f1d(&self, x: f64) -> f64 {
        let s = Self::s(x);
        s * (1.0 - s)
    }

    fn f2d(&self, x: f64) -> f64 {
        let s = Self::s(x);
        s * (1.0 - s) * (1.0 - 2.0 * s)
    }

    fn f3d(&self, x: f64) -> f64 {
        let s = Self::s(x);
        s * (1.0 - s) * (1.0 - 6.0 * s + 6.0 * s * s)
    }
}

/// Gaussian bump `e^(-x^2)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gaussian;

impl ActivationFunction for Gaussian {
    fn id_code(&self) -> &'static str {
        "gss"
    }

    fn f(&self, x: f64) -> f64 {
        (-x * x).exp()
    }

    fn f1d(&self, x: f64) -> f64 {
        -2.0 * x * (-x * x).exp()
    }

    fn f2d(&self, x: f64) -> f64 {
        (4.0 * x * x - 2.0) * (-x * x).exp()
    }

    fn f3d(&self, x: f64) -> f64 {
        (-8.0 * x * x * x + 12.0 * x) * (-x * x).exp()
    }
}

/// Rectified linear unit. The derivative at exactly zero is taken as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReLU;

impl ActivationFunction for ReLU {
    fn id_code(&self) -> &'static str {
        "relu"
    }

    fn f(&self, x: f64) -> f64 {
        if x > 0.0 { x } else { 0.0 }
    }

    fn f1d(&self, x: f64) -> f64 {
        if x > 0.0 { 1.0 } else { 0.0 }
    }

    fn f2d(&self, _x: f64) -> f64 {
        0.0
    }

    fn f3d(&self, _x: f64) -> f64 {
        0.0
    }
}

/// Scaled exponential linear unit with the self-normalizing constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selu;

impl Selu {
    pub const LAMBDA: f64 = 1.050_700_987_355_480_5;
    pub const ALPHA: f64 = 1.673_263_242_354_377_3;
}

impl ActivationFunction for Selu {
    fn id_code(&self) -> &'static str {
        "selu"
    }

    fn f(&self, x: f64) -> f64 {
        if x > 0.0 {
            Self::LAMBDA * x
        } else {
            Self::LAMBDA * Self::ALPHA * (x.exp() - 1.0)
        }
    }

    fn f1d(&self, x: f64) -> f64 {
        if x > 0.0 {
            Self::LAMBDA
        } else {
            Self::LAMBDA * Self::ALPHA * x.exp()
        }
    }

    fn f2d(&self, x: f64) -> f64 {
        if x > 0.0 {
            0.0
        } else {
            Self::LAMBDA * Self::ALPHA * x.exp()
        }
    }

    fn f3d(&self, x: f64) -> f64 {
        self.f2d(x)
    }
}

/// Hyperbolic tangent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TanSigmoid;

impl ActivationFunction for TanSigmoid {
    fn id_code(&self) -> &'static str {
        "tans"
    }

    fn f(&self, x: f64) -> f64 {
        x.tanh()
    }

    fn f1d(&self, x: f64) -> f64 {
        let t = x.tanh();
        1.0 - t * t
    }

    fn f2d(&self, x: f64) -> f64 {
        let t = x.tanh();
        -2.0 * t * (1.0 - t * t)
    }

    fn f3d(&self, x: f64) -> f64 {
        let t = x.tanh();
        -2.0 * (1.0 - t * t) * (1.0 - 3.0 * t * t)
    }
}

/// `sin(x)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sine;

impl ActivationFunction for Sine {
    fn id_code(&self) -> &'static str {
        "sin"
    }

    fn f(&self, x: f64) -> f64 {
        x.sin()
    }

    fn f1d(&self, x: f64) -> f64 {
        x.cos()
    }

    fn f2d(&self, x: f64) -> f64 {
        -x.sin()
    }

    fn f3d(&self, x: f64) -> f64 {
        -x.cos()
    }
}

/// Codes of every activation function [`provide_activation`] knows about.
pub const ACTIVATION_CODES: [&str; 7] = ["id_", "lgs", "gss", "relu", "selu", "tans", "sin"];

/// Looks an activation function up by its code.
///
/// # Errors
///
/// Returns [`NetError::UnknownActivation`] when no function has that code.
pub fn provide_activation(code: &str) -> Result<Arc<dyn ActivationFunction>> {
    let actf: Arc<dyn ActivationFunction> = match code {
        "id_" => Arc::new(Identity),
        "lgs" => Arc::new(Logistic),
        "gss" => Arc::new(Gaussian),
        "relu" => Arc::new(ReLU),
        "selu" => Arc::new(Selu),
        "tans" => Arc::new(TanSigmoid),
        "sin" => Arc::new(Sine),
        _ => return Err(NetError::UnknownActivation(code.to_owned())),
    };
    Ok(actf)
}
