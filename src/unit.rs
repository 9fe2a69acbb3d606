//! Units: the nodes of a network and their derivative buffers.

use std::sync::Arc;

use crate::actf::ActivationFunction;
use crate::deriv::DerivFlags;
use crate::feeder::Ray;
use crate::layer::Layer;

/// Handle of a unit inside a network: `(layer, index)`.
///
/// Index 0 of every layer is the offset unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitRef {
    pub layer: usize,
    pub index: usize,
}

impl UnitRef {
    pub const fn new(layer: usize, index: usize) -> Self {
        Self { layer, index }
    }
}

/// The closed set of unit flavours.
#[derive(Debug, Clone)]
pub enum UnitKind {
    /// Constant 1, the bias source of the next layer.
    Offset,
    /// Carries input dimension `index` unchanged.
    Input { index: usize },
    /// `f(feed)` of a weighted sum over upstream units.
    Neuron {
        actf: Arc<dyn ActivationFunction>,
        feeder: Ray,
    },
}

/// A single node with its value and every enabled derivative order.
///
/// Cross buffers are laid out input-major: entry `(k, j)` lives at
/// `k * n_vp + j`.
#[derive(Debug, Clone)]
pub struct Unit {
    kind: UnitKind,
    protovalue: f64,
    value: f64,
    d1: Vec<f64>,
    d2: Vec<f64>,
    vd1: Vec<f64>,
    c1: Vec<f64>,
    c2: Vec<f64>,
    n_input: usize,
    n_vp: usize,
    flags: DerivFlags,
    // expected mean and spread of the value over the data
    moments: (f64, f64),
    // feed derivatives of the last pass, reused by the cross terms
    pk: Vec<f64>,
    pkk: Vec<f64>,
    pw: Vec<f64>,
}

fn grow(buf: &mut Vec<f64>, len: usize) {
    if buf.len() < len {
        buf.resize(len, 0.0);
    }
}

impl Unit {
    fn with_kind(kind: UnitKind) -> Self {
        let value = if matches!(kind, UnitKind::Offset) { 1.0 } else { 0.0 };
        let moments = match kind {
            UnitKind::Offset => (1.0, 0.0),
            UnitKind::Input { .. } => (0.0, 1.0),
            UnitKind::Neuron { .. } => (0.0, 0.0),
        };
        Self {
            kind,
            protovalue: value,
            value,
            d1: Vec::new(),
            d2: Vec::new(),
            vd1: Vec::new(),
            c1: Vec::new(),
            c2: Vec::new(),
            n_input: 0,
            n_vp: 0,
            flags: DerivFlags::NONE,
            moments,
            pk: Vec::new(),
            pkk: Vec::new(),
            pw: Vec::new(),
        }
    }

    pub fn offset() -> Self {
        Self::with_kind(UnitKind::Offset)
    }

    pub fn input(index: usize) -> Self {
        Self::with_kind(UnitKind::Input { index })
    }

    /// A neuron without sources. It feeds 0 until a feeder is attached.
    pub fn neuron(actf: Arc<dyn ActivationFunction>) -> Self {
        Self::with_kind(UnitKind::Neuron {
            actf,
            feeder: Ray::default(),
        })
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn is_offset(&self) -> bool {
        matches!(self.kind, UnitKind::Offset)
    }

    pub fn feeder(&self) -> Option<&Ray> {
        match &self.kind {
            UnitKind::Neuron { feeder, .. } => Some(feeder),
            _ => None,
        }
    }

    pub fn feeder_mut(&mut self) -> Option<&mut Ray> {
        match &mut self.kind {
            UnitKind::Neuron { feeder, .. } => Some(feeder),
            _ => None,
        }
    }

    pub(crate) fn set_feeder(&mut self, ray: Ray) {
        if let UnitKind::Neuron { feeder, .. } = &mut self.kind {
            *feeder = ray;
        }
    }

    pub fn activation(&self) -> Option<&Arc<dyn ActivationFunction>> {
        match &self.kind {
            UnitKind::Neuron { actf, .. } => Some(actf),
            _ => None,
        }
    }

    pub(crate) fn set_activation(&mut self, new: Arc<dyn ActivationFunction>) {
        if let UnitKind::Neuron { actf, .. } = &mut self.kind {
            *actf = new;
        }
    }

    pub fn protovalue(&self) -> f64 {
        self.protovalue
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn set_protovalue(&mut self, x: f64) {
        self.protovalue = x;
    }

    /// Expected mean of the value. Inputs are assumed standardized unless
    /// told otherwise.
    pub fn output_mu(&self) -> f64 {
        self.moments.0
    }

    pub fn output_sigma(&self) -> f64 {
        self.moments.1
    }

    pub(crate) fn set_input_moments(&mut self, mu: f64, sigma: f64) {
        if matches!(self.kind, UnitKind::Input { .. }) {
            self.moments = (mu, sigma);
        }
    }

    /// Refreshes the moments of a neuron from its feed, treating the feed as
    /// Gaussian.
    pub fn compute_moments(&mut self, upstream: &[Layer]) {
        if let UnitKind::Neuron { actf, feeder } = &self.kind {
            self.moments = actf.output_moments(feeder.feed_mu(upstream), feeder.feed_sigma(upstream));
        }
    }

    pub fn flags(&self) -> DerivFlags {
        self.flags
    }

    /// First derivatives w.r.t. every input, empty when disabled.
    pub fn first_derivatives(&self) -> &[f64] {
        if self.flags.d1 { &self.d1[..self.n_input] } else { &[] }
    }

    pub fn second_derivatives(&self) -> &[f64] {
        if self.flags.d2 { &self.d2[..self.n_input] } else { &[] }
    }

    pub fn variational_first_derivatives(&self) -> &[f64] {
        if self.flags.vd1 { &self.vd1[..self.n_vp] } else { &[] }
    }

    pub fn cross_first_derivatives(&self) -> &[f64] {
        if self.flags.c1 { &self.c1[..self.n_input * self.n_vp] } else { &[] }
    }

    pub fn cross_second_derivatives(&self) -> &[f64] {
        if self.flags.c2 { &self.c2[..self.n_input * self.n_vp] } else { &[] }
    }

    #[inline]
    pub fn first_derivative(&self, k: usize) -> f64 {
        debug_assert!(self.flags.d1 && k < self.n_input);
        self.d1[k]
    }

    #[inline]
    pub fn second_derivative(&self, k: usize) -> f64 {
        debug_assert!(self.flags.d2 && k < self.n_input);
        self.d2[k]
    }

    #[inline]
    pub fn variational_first_derivative(&self, j: usize) -> f64 {
        debug_assert!(self.flags.vd1 && j < self.n_vp);
        self.vd1[j]
    }

    #[inline]
    pub fn cross_first_derivative(&self, k: usize, j: usize) -> f64 {
        debug_assert!(self.flags.c1 && k < self.n_input && j < self.n_vp);
        self.c1[k * self.n_vp + j]
    }

    #[inline]
    pub fn cross_second_derivative(&self, k: usize, j: usize) -> f64 {
        debug_assert!(self.flags.c2 && k < self.n_input && j < self.n_vp);
        self.c2[k * self.n_vp + j]
    }

    /// Sizes the buffers for `n_input` inputs and `n_vp` variational
    /// parameters. Buffers only ever grow, and only enabled orders get one.
    pub fn set_substrate(&mut self, n_input: usize, n_vp: usize, flags: DerivFlags) {
        self.n_input = n_input;
        self.n_vp = n_vp;
        self.flags = flags;

        if flags.d1 {
            grow(&mut self.d1, n_input);
            grow(&mut self.pk, n_input);
        }
        if flags.d2 {
            grow(&mut self.d2, n_input);
            grow(&mut self.pkk, n_input);
        }
        if flags.vd1 {
            grow(&mut self.vd1, n_vp);
            grow(&mut self.pw, n_vp);
        }
        if flags.c1 {
            grow(&mut self.c1, n_input * n_vp);
        }
        if flags.c2 {
            grow(&mut self.c2, n_input * n_vp);
        }

        match self.kind {
            UnitKind::Offset => {
                self.protovalue = 1.0;
                self.value = 1.0;
                self.zero_buffers();
            }
            UnitKind::Input { index } => {
                self.zero_buffers();
                if flags.d1 && index < n_input {
                    self.d1[index] = 1.0;
                }
            }
            UnitKind::Neuron { .. } => {}
        }
    }

    fn zero_buffers(&mut self) {
        for buf in [&mut self.d1, &mut self.d2, &mut self.vd1, &mut self.c1, &mut self.c2] {
            buf.fill(0.0);
        }
    }

    /// Pulls the feed and its derivatives from the feeder and applies the
    /// chain rule. `upstream` are all layers before the one holding `self`.
    pub fn compute_values(&mut self, upstream: &[Layer]) {
        let Self {
            kind,
            protovalue,
            value,
            d1,
            d2,
            vd1,
            c1,
            c2,
            n_input,
            n_vp,
            flags,
            moments: _,
            pk,
            pkk,
            pw,
        } = self;
        let (n_input, n_vp, flags) = (*n_input, *n_vp, *flags);

        let (actf, feeder) = match kind {
            UnitKind::Offset => return,
            UnitKind::Input { .. } => {
                *value = *protovalue;
                return;
            }
            UnitKind::Neuron { actf, feeder } => (&**actf, &*feeder),
        };

        let p = feeder.feed(upstream);
        *protovalue = p;
        *value = actf.f(p);
        if !flags.any() {
            return;
        }

        let f1 = actf.f1d(p);
        let f2 = if flags.d2 || flags.c1 { actf.f2d(p) } else { 0.0 };
        let f3 = if flags.c2 { actf.f3d(p) } else { 0.0 };

        if flags.d1 {
            for k in 0..n_input {
                pk[k] = feeder.first_derivative_feed(upstream, k);
                d1[k] = f1 * pk[k];
            }
        }

        if flags.d2 {
            for k in 0..n_input {
                pkk[k] = feeder.second_derivative_feed(upstream, k);
                d2[k] = f2 * pk[k] * pk[k] + f1 * pkk[k];
            }
        }

        if flags.vd1 {
            vd1[..n_vp].fill(0.0);
            for &j in feeder.used_for() {
                debug_assert!(j < n_vp, "weight id {j} outside substrate of {n_vp}");
                pw[j] = feeder.variational_first_derivative_feed(upstream, j);
                vd1[j] = f1 * pw[j];
            }
        }

        if flags.c1 {
            c1[..n_input * n_vp].fill(0.0);
            if flags.c2 {
                c2[..n_input * n_vp].fill(0.0);
            }
            for k in 0..n_input {
                let row = k * n_vp;
                for &j in feeder.used_for() {
                    let pkw = feeder.cross_first_derivative_feed(upstream, k, j);
                    c1[row + j] = f2 * pk[k] * pw[j] + f1 * pkw;

                    if flags.c2 {
                        let pkkw = feeder.cross_second_derivative_feed(upstream, k, j);
                        c2[row + j] = f3 * pw[j] * pk[k] * pk[k]
                            + 2.0 * f2 * pk[k] * pkw
                            + f2 * pw[j] * pkk[k]
                            + f1 * pkkw;
                    }
                }
            }
        }
    }
}
