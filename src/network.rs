//! The dynamic feed-forward network.
//!
//! Layers are pushed in order, then wired with [`FeedForwardNetwork::connect`].
//! Connecting draws the initial betas, assigns the global weight ids and
//! sizes every unit's derivative buffers.
//!
//! # Example
//!
//! ```
//! use varnet::{DerivFlags, FeedForwardNetwork};
//!
//! let mut net = FeedForwardNetwork::new(2).unwrap();
//! net.push_layer_with_code(4, "tans").unwrap();
//! net.push_layer_with_code(1, "id_").unwrap();
//! net.connect(Some(42)).unwrap();
//! net.enable_derivatives(DerivFlags::D1_VD1);
//!
//! net.set_input(&[0.3, -0.7]).unwrap();
//! net.ff_propagate();
//! let y = net.output(0);
//! let dy_dx0 = net.first_derivative(0, 0);
//! let dy_db0 = net.variational_first_derivative(0, 0);
//! # let _ = (y, dy_dx0, dy_db0);
//! ```

use std::sync::Arc;

use log::{debug, trace, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use crate::actf::{ActivationFunction, provide_activation};
use crate::deriv::DerivFlags;
use crate::error::{NetError, Result};
use crate::feeder::Ray;
use crate::layer::Layer;
use crate::unit::Unit;

#[derive(Debug, Clone)]
pub struct FeedForwardNetwork {
    layers: Vec<Layer>,
    flags: DerivFlags,
    n_vp: usize,
    connected: bool,
}

impl FeedForwardNetwork {
    /// A network holding only its input layer.
    ///
    /// # Errors
    ///
    /// Fails when `n_input` is zero.
    pub fn new(n_input: usize) -> Result<Self> {
        if n_input == 0 {
            return Err(NetError::InvalidParam {
                name: "n_input".into(),
                value: "0".into(),
            });
        }
        Ok(Self {
            layers: vec![Layer::input(n_input)],
            flags: DerivFlags::NONE,
            n_vp: 0,
            connected: false,
        })
    }

    /// Appends a layer of `n` neurons. The network must be (re)connected
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Fails when `n` is zero.
    pub fn push_layer(&mut self, n: usize, actf: Arc<dyn ActivationFunction>) -> Result<()> {
        if n == 0 {
            return Err(NetError::InvalidParam {
                name: "n_units".into(),
                value: "0".into(),
            });
        }
        self.layers.push(Layer::neurons(n, actf));
        self.connected = false;
        Ok(())
    }

    /// Like [`push_layer`](Self::push_layer), looking the activation up by code.
    ///
    /// # Errors
    ///
    /// Fails on an unknown activation code or when `n` is zero.
    pub fn push_layer_with_code(&mut self, n: usize, actf_code: &str) -> Result<()> {
        let actf = provide_activation(actf_code)?;
        self.push_layer(n, actf)
    }

    /// Fully connects each layer to the previous one and indexes the betas.
    /// `None` seeds the generator from the OS.
    ///
    /// # Errors
    ///
    /// Fails when there is no layer besides the input layer.
    pub fn connect(&mut self, seed: Option<u64>) -> Result<()> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        self.connect_with_rng(&mut rng)
    }

    /// # Errors
    ///
    /// Fails when there is no layer besides the input layer.
    pub fn connect_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.layers.len() < 2 {
            return Err(NetError::NoSuchLayer(1));
        }
        for l in 1..self.layers.len() {
            let n_src = self.layers[l - 1].n_units();
            for unit in self.layers[l].units_mut().iter_mut().skip(1) {
                unit.set_feeder(Ray::fully_connected(l - 1, n_src, rng));
            }
        }
        self.connected = true;
        self.assign_variational_parameters();
        debug!(
            "connected network: {} layers, {} betas, {} variational parameters",
            self.layers.len(),
            self.n_beta(),
            self.n_vp
        );
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Freezes or unfreezes the betas of layer `l`. Frozen betas keep their
    /// values but get no id, so derivatives are no longer taken w.r.t. them.
    ///
    /// # Errors
    ///
    /// Fails for the input layer or a layer that does not exist.
    pub fn set_layer_trainable(&mut self, l: usize, trainable: bool) -> Result<()> {
        if l == 0 || l >= self.layers.len() {
            return Err(NetError::NoSuchLayer(l));
        }
        self.layers[l].set_trainable(trainable);
        debug!("layer {l} trainable = {trainable}");
        if self.connected {
            self.assign_variational_parameters();
        }
        Ok(())
    }

    /// Hands out the ids `[0, n_vp)` layer by layer and resizes the unit
    /// buffers. Returns `n_vp`.
    pub fn assign_variational_parameters(&mut self) -> usize {
        let mut next = 0;
        for l in 1..self.layers.len() {
            let (upstream, rest) = self.layers.split_at_mut(l);
            let layer = &mut rest[0];
            let add_own = layer.is_trainable();
            for unit in layer.units_mut() {
                if let Some(feeder) = unit.feeder_mut() {
                    next = feeder.set_vp_indexes(next, add_own, upstream);
                }
            }
        }
        self.n_vp = next;
        debug!("assigned {next} variational parameter ids");
        self.apply_substrate();
        next
    }

    /// Selects the derivative orders to compute. Orders the request depends
    /// on are switched on as well.
    pub fn enable_derivatives(&mut self, flags: DerivFlags) {
        let normalized = flags.normalized();
        if normalized != flags {
            warn!("derivative request {flags:?} widened to {normalized:?}");
        }
        self.flags = normalized;
        self.apply_substrate();
    }

    pub fn derivatives(&self) -> DerivFlags {
        self.flags
    }

    fn apply_substrate(&mut self) {
        let (n_input, n_vp, flags) = (self.n_input(), self.n_vp, self.flags);
        for layer in &mut self.layers {
            layer.set_substrate(n_input, n_vp, flags);
        }
        trace!("substrate: {n_input} inputs, {n_vp} weights, {flags:?}");
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, l: usize) -> Option<&Layer> {
        self.layers.get(l)
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn n_input(&self) -> usize {
        self.layers[0].n_units() - 1
    }

    pub fn n_output(&self) -> usize {
        self.output_layer().n_units() - 1
    }

    /// Neurons of all layers, offset and input units excluded.
    pub fn n_unit(&self) -> usize {
        self.layers[1..].iter().map(|l| l.n_units() - 1).sum()
    }

    /// All betas, frozen ones included.
    pub fn n_beta(&self) -> usize {
        self.layers.iter().map(Layer::n_beta).sum()
    }

    /// Size of the weight id space.
    pub fn n_vp(&self) -> usize {
        self.n_vp
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    fn output_unit(&self, j: usize) -> &Unit {
        &self.output_layer().units()[j + 1]
    }

    fn feeders(&self) -> impl Iterator<Item = &Ray> {
        self.layers.iter().flat_map(|l| l.units().iter().filter_map(Unit::feeder))
    }

    /// Beta with global id `id`.
    pub fn get_beta(&self, id: usize) -> Option<f64> {
        self.feeders().find_map(|f| f.get_vp(id))
    }

    /// Returns whether some feeder owns `id`.
    pub fn set_beta(&mut self, id: usize, v: f64) -> bool {
        self.layers
            .iter_mut()
            .flat_map(|l| l.units_mut().iter_mut().filter_map(Unit::feeder_mut))
            .any(|f| f.set_vp(id, v))
    }

    /// Writes the betas with ids `[0, out.len())` into `out`.
    ///
    /// # Errors
    ///
    /// Fails when `out` is longer than the id space.
    pub fn get_betas(&self, out: &mut [f64]) -> Result<()> {
        if out.len() > self.n_vp {
            return Err(NetError::DimensionMismatch {
                expected: self.n_vp,
                actual: out.len(),
            });
        }
        for f in self.feeders() {
            let Some(range) = f.vp_range() else { continue };
            for (id, &b) in range.zip(f.betas()) {
                if let Some(slot) = out.get_mut(id) {
                    *slot = b;
                }
            }
        }
        Ok(())
    }

    pub fn betas(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.n_vp];
        for f in self.feeders() {
            let Some(range) = f.vp_range() else { continue };
            out[range].copy_from_slice(f.betas());
        }
        out
    }

    /// Sets the betas with ids `[0, values.len())`.
    ///
    /// # Errors
    ///
    /// Fails when `values` is longer than the id space.
    pub fn set_betas(&mut self, values: &[f64]) -> Result<()> {
        if values.len() > self.n_vp {
            return Err(NetError::DimensionMismatch {
                expected: self.n_vp,
                actual: values.len(),
            });
        }
        for layer in &mut self.layers {
            for f in layer.units_mut().iter_mut().filter_map(Unit::feeder_mut) {
                let Some(range) = f.vp_range() else { continue };
                for id in range.take_while(|&id| id < values.len()) {
                    f.set_vp(id, values[id]);
                }
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when `x` does not have one entry per input, or before the
    /// network is connected.
    pub fn set_input(&mut self, x: &[f64]) -> Result<()> {
        if !self.connected {
            return Err(NetError::NotConnected);
        }
        let n = self.n_input();
        if x.len() != n {
            return Err(NetError::DimensionMismatch {
                expected: n,
                actual: x.len(),
            });
        }
        for (i, &v) in x.iter().enumerate() {
            self.layers[0].set_input_value(i, v);
        }
        Ok(())
    }

    /// Declares the expected mean and spread of each input over the data.
    /// Without this, inputs are taken as standardized.
    ///
    /// # Errors
    ///
    /// Fails when either slice does not have one entry per input.
    pub fn set_input_moments(&mut self, mu: &[f64], sigma: &[f64]) -> Result<()> {
        let n = self.n_input();
        for len in [mu.len(), sigma.len()] {
            if len != n {
                return Err(NetError::DimensionMismatch { expected: n, actual: len });
            }
        }
        for (i, (&m, &s)) in mu.iter().zip(sigma).enumerate() {
            self.layers[0].units_mut()[i + 1].set_input_moments(m, s);
        }
        self.compute_moments();
        Ok(())
    }

    /// Propagates the input moments through the current betas.
    pub fn compute_moments(&mut self) {
        for l in 1..self.layers.len() {
            let (upstream, rest) = self.layers.split_at_mut(l);
            rest[0].compute_moments(upstream);
        }
    }

    /// Computes every layer in order; layer `l` only reads layers `< l`.
    pub fn ff_propagate(&mut self) {
        debug_assert!(self.connected, "propagating an unconnected network");
        for l in 0..self.layers.len() {
            let (upstream, rest) = self.layers.split_at_mut(l);
            rest[0].compute_values(upstream);
        }
    }

    pub fn output(&self, j: usize) -> f64 {
        self.output_unit(j).value()
    }

    pub fn outputs(&self) -> Vec<f64> {
        self.output_layer().units()[1..].iter().map(Unit::value).collect()
    }

    /// `d y_j / d x_k`
    pub fn first_derivative(&self, j: usize, k: usize) -> f64 {
        self.output_unit(j).first_derivative(k)
    }

    /// `d^2 y_j / d x_k^2`
    pub fn second_derivative(&self, j: usize, k: usize) -> f64 {
        self.output_unit(j).second_derivative(k)
    }

    /// `d y_j / d beta_i`
    pub fn variational_first_derivative(&self, j: usize, i: usize) -> f64 {
        self.output_unit(j).variational_first_derivative(i)
    }

    /// `d^2 y_j / d x_k d beta_i`
    pub fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        self.output_unit(j).cross_first_derivative(k, i)
    }

    /// `d^3 y_j / d x_k^2 d beta_i`
    pub fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        self.output_unit(j).cross_second_derivative(k, i)
    }
}
