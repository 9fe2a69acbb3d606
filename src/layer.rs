//! Layers: ordered units with the offset unit at index 0.

use std::sync::Arc;

use rayon::prelude::*;

use crate::actf::ActivationFunction;
use crate::backend::{Backend, get_backend};
use crate::deriv::DerivFlags;
use crate::unit::Unit;

#[derive(Debug, Clone)]
pub struct Layer {
    units: Vec<Unit>,
    trainable: bool,
}

impl Layer {
    /// Offset unit plus `n` input units.
    pub fn input(n: usize) -> Self {
        let units = std::iter::once(Unit::offset()).chain((0..n).map(Unit::input)).collect();
        Self {
            units,
            trainable: false,
        }
    }

    /// Offset unit plus `n` unconnected neurons sharing `actf`.
    pub fn neurons(n: usize, actf: Arc<dyn ActivationFunction>) -> Self {
        let units = std::iter::once(Unit::offset())
            .chain((0..n).map(|_| Unit::neuron(Arc::clone(&actf))))
            .collect();
        Self {
            units,
            trainable: true,
        }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub(crate) fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    pub fn unit(&self, i: usize) -> Option<&Unit> {
        self.units.get(i)
    }

    /// Number of units, the offset unit included.
    pub fn n_units(&self) -> usize {
        self.units.len()
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    pub(crate) fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    /// Betas of every feeder in this layer, trainable or not.
    pub fn n_beta(&self) -> usize {
        self.units.iter().filter_map(Unit::feeder).map(|f| f.n_beta()).sum()
    }

    pub(crate) fn set_input_value(&mut self, i: usize, x: f64) {
        self.units[i + 1].set_protovalue(x);
    }

    pub fn set_substrate(&mut self, n_input: usize, n_vp: usize, flags: DerivFlags) {
        for u in &mut self.units {
            u.set_substrate(n_input, n_vp, flags);
        }
    }

    pub fn compute_moments(&mut self, upstream: &[Layer]) {
        for u in &mut self.units {
            u.compute_moments(upstream);
        }
    }

    /// Computes every unit. Units only read `upstream`, so they may run in
    /// parallel when the rayon backend is selected.
    pub fn compute_values(&mut self, upstream: &[Layer]) {
        match get_backend() {
            Backend::Serial => self.units.iter_mut().for_each(|u| u.compute_values(upstream)),
            Backend::Rayon => self.units.par_iter_mut().for_each(|u| u.compute_values(upstream)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actf::Identity;

    #[test]
    fn offset_unit_comes_first() {
        let l = Layer::neurons(3, Arc::new(Identity));
        assert_eq!(l.n_units(), 4);
        assert!(l.units()[0].is_offset());
        assert!(l.units()[1..].iter().all(|u| u.activation().is_some()));
        assert!(l.is_trainable());
        assert!(!Layer::input(2).is_trainable());
    }

    #[test]
    fn substrate_reaches_every_unit() {
        let mut l = Layer::input(2);
        l.set_substrate(2, 4, DerivFlags::ALL);
        assert!(l.units().iter().all(|u| u.cross_second_derivatives().len() == 8));
    }
}
