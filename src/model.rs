//! The surface a fitting routine needs from a network.
//!
//! Both the dynamic [`FeedForwardNetwork`] and the networks generated by
//! [`static_network!`](crate::static_network) implement it.

use crate::deriv::DerivFlags;
use crate::error::{NetError, Result};
use crate::network::FeedForwardNetwork;

pub trait VariationalModel {
    fn n_input(&self) -> usize;

    fn n_output(&self) -> usize;

    /// Number of variational parameters (weight ids).
    fn n_vp(&self) -> usize;

    /// Derivative orders computed by [`ff_propagate`](Self::ff_propagate).
    fn derivatives(&self) -> DerivFlags;

    fn get_beta(&self, id: usize) -> Option<f64>;

    fn set_beta(&mut self, id: usize, v: f64) -> bool;

    /// Ids `[0, n_vp)` in order.
    fn betas(&self) -> Vec<f64> {
        (0..self.n_vp()).map(|i| self.get_beta(i).unwrap_or(0.0)).collect()
    }

    /// Sets ids `[0, values.len())`.
    ///
    /// # Errors
    ///
    /// Fails when `values` is longer than the id space.
    fn set_betas(&mut self, values: &[f64]) -> Result<()> {
        if values.len() > self.n_vp() {
            return Err(NetError::DimensionMismatch {
                expected: self.n_vp(),
                actual: values.len(),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.set_beta(i, v);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when `x` does not have one entry per input.
    fn set_input(&mut self, x: &[f64]) -> Result<()>;

    fn ff_propagate(&mut self);

    fn output(&self, j: usize) -> f64;

    fn first_derivative(&self, j: usize, k: usize) -> f64;

    fn second_derivative(&self, j: usize, k: usize) -> f64;

    fn variational_first_derivative(&self, j: usize, i: usize) -> f64;

    fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64;

    fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64;
}

impl VariationalModel for FeedForwardNetwork {
    fn n_input(&self) -> usize {
        FeedForwardNetwork::n_input(self)
    }

    fn n_output(&self) -> usize {
        FeedForwardNetwork::n_output(self)
    }

    fn n_vp(&self) -> usize {
        FeedForwardNetwork::n_vp(self)
    }

    fn derivatives(&self) -> DerivFlags {
        FeedForwardNetwork::derivatives(self)
    }

    fn get_beta(&self, id: usize) -> Option<f64> {
        FeedForwardNetwork::get_beta(self, id)
    }

    fn set_beta(&mut self, id: usize, v: f64) -> bool {
        FeedForwardNetwork::set_beta(self, id, v)
    }

    fn betas(&self) -> Vec<f64> {
        FeedForwardNetwork::betas(self)
    }

    fn set_betas(&mut self, values: &[f64]) -> Result<()> {
        FeedForwardNetwork::set_betas(self, values)
    }

    fn set_input(&mut self, x: &[f64]) -> Result<()> {
        FeedForwardNetwork::set_input(self, x)
    }

    fn ff_propagate(&mut self) {
        FeedForwardNetwork::ff_propagate(self);
    }

    fn output(&self, j: usize) -> f64 {
        FeedForwardNetwork::output(self, j)
    }

    fn first_derivative(&self, j: usize, k: usize) -> f64 {
        FeedForwardNetwork::first_derivative(self, j, k)
    }

    fn second_derivative(&self, j: usize, k: usize) -> f64 {
        FeedForwardNetwork::second_derivative(self, j, k)
    }

    fn variational_first_derivative(&self, j: usize, i: usize) -> f64 {
        FeedForwardNetwork::variational_first_derivative(self, j, i)
    }

    fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        FeedForwardNetwork::cross_first_derivative(self, j, k, i)
    }

    fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        FeedForwardNetwork::cross_second_derivative(self, j, k, i)
    }
}
