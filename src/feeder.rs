//! The weighted-sum feeder ("ray") and its derivative feeds.
//!
//! A ray owns one beta per source unit. Source 0 is always the offset unit
//! of the source layer, so `beta[0]` is the bias.
//!
//! Every beta of a trainable ray is a variational parameter with a global
//! id. The ids of one ray form the contiguous range `[shift, shift + n)`.
//! Besides its own ids, a ray tracks the ids its sources depend on
//! (`used_for`), together with which sources depend on each of them, so the
//! weight derivative feeds only visit sources that can contribute.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use rand::Rng;

use crate::layer::Layer;
use crate::unit::{Unit, UnitRef};

/// Scale of the uniform initialization: `4 / sqrt(m)` for `m` sources.
pub fn init_bound(n_sources: usize) -> f64 {
    4.0 / (n_sources.max(1) as f64).sqrt()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ray {
    sources: Vec<UnitRef>,
    betas: Vec<f64>,
    vp_shift: Option<usize>,
    used_in: BTreeSet<usize>,
    used_for: BTreeSet<usize>,
    sources_by_vp: BTreeMap<usize, Vec<usize>>,
}

impl Ray {
    /// Connects to `sources` with betas drawn from
    /// `U[-4/sqrt(m), 4/sqrt(m)]`.
    pub fn new<R: Rng + ?Sized>(sources: Vec<UnitRef>, rng: &mut R) -> Self {
        let bound = init_bound(sources.len());
        let betas = sources.iter().map(|_| rng.random_range(-bound..=bound)).collect();
        Self::with_betas(sources, betas)
    }

    /// Connects to every unit of `layer`, offset unit first.
    pub fn fully_connected<R: Rng + ?Sized>(layer: usize, n_units: usize, rng: &mut R) -> Self {
        let sources = (0..n_units).map(|index| UnitRef::new(layer, index)).collect();
        Self::new(sources, rng)
    }

    /// # Panics
    ///
    /// Panics if `betas` and `sources` differ in length.
    pub fn with_betas(sources: Vec<UnitRef>, betas: Vec<f64>) -> Self {
        assert_eq!(sources.len(), betas.len(), "one beta per source");
        Self {
            sources,
            betas,
            ..Self::default()
        }
    }

    pub fn sources(&self) -> &[UnitRef] {
        &self.sources
    }

    pub fn n_beta(&self) -> usize {
        self.betas.len()
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    pub fn get_beta(&self, i: usize) -> Option<f64> {
        self.betas.get(i).copied()
    }

    pub fn set_beta(&mut self, i: usize, v: f64) -> bool {
        match self.betas.get_mut(i) {
            Some(b) => {
                *b = v;
                true
            }
            None => false,
        }
    }

    /// Global ids owned by this ray, if it is trainable.
    pub fn vp_range(&self) -> Option<Range<usize>> {
        self.vp_shift.map(|s| s..s + self.betas.len())
    }

    /// Overrides the id shift without rebuilding the used-in/used-for sets.
    pub(crate) fn set_vp_shift(&mut self, shift: Option<usize>) {
        self.vp_shift = shift;
    }

    fn local_index(&self, id: usize) -> Option<usize> {
        self.vp_range().filter(|r| r.contains(&id)).map(|r| id - r.start)
    }

    /// Beta with global id `id`, if this ray owns it.
    pub fn get_vp(&self, id: usize) -> Option<f64> {
        self.local_index(id).map(|i| self.betas[i])
    }

    pub fn set_vp(&mut self, id: usize, v: f64) -> bool {
        match self.local_index(id) {
            Some(i) => {
                self.betas[i] = v;
                true
            }
            None => false,
        }
    }

    pub fn used_in(&self) -> &BTreeSet<usize> {
        &self.used_in
    }

    pub fn used_for(&self) -> &BTreeSet<usize> {
        &self.used_for
    }

    pub fn is_vp_used_in(&self, id: usize) -> bool {
        self.used_in.contains(&id)
    }

    pub fn is_vp_used_for(&self, id: usize) -> bool {
        self.used_for.contains(&id)
    }

    /// Rebuilds the id bookkeeping.
    ///
    /// First collects every id below `start` that a source depends on. Then,
    /// if `add_own`, claims `[start, start + n_beta)` and returns the next
    /// free id. Without `add_own` the ray owns nothing and `start` is
    /// returned unchanged.
    pub fn set_vp_indexes(&mut self, start: usize, add_own: bool, upstream: &[Layer]) -> usize {
        self.vp_shift = None;
        self.used_in.clear();
        self.used_for.clear();
        self.sources_by_vp.clear();

        for (i, src) in self.sources.iter().enumerate() {
            let Some(feeder) = upstream[src.layer].units()[src.index].feeder() else {
                continue;
            };
            for &id in feeder.used_for().range(..start) {
                self.used_for.insert(id);
                self.sources_by_vp.entry(id).or_default().push(i);
            }
        }

        if !add_own {
            return start;
        }

        let end = start + self.betas.len();
        self.vp_shift = Some(start);
        self.used_in.extend(start..end);
        self.used_for.extend(start..end);
        end
    }

    #[inline]
    fn source<'a>(&self, upstream: &'a [Layer], i: usize) -> &'a Unit {
        let r = self.sources[i];
        &upstream[r.layer].units()[r.index]
    }

    /// Expected feed, `sum_i beta_i * mu_i`.
    pub fn feed_mu(&self, upstream: &[Layer]) -> f64 {
        let mut acc = 0.0;
        for (i, b) in self.betas.iter().enumerate() {
            acc += b * self.source(upstream, i).output_mu();
        }
        acc
    }

    /// Spread of the feed for independent sources,
    /// `sqrt(sum_i (beta_i * sigma_i)^2)`.
    pub fn feed_sigma(&self, upstream: &[Layer]) -> f64 {
        let mut var = 0.0;
        for (i, b) in self.betas.iter().enumerate() {
            let s = b * self.source(upstream, i).output_sigma();
            var += s * s;
        }
        var.sqrt()
    }

    /// `sum_i beta_i * s_i`
    pub fn feed(&self, upstream: &[Layer]) -> f64 {
        let mut acc = 0.0;
        for (i, b) in self.betas.iter().enumerate() {
            acc += b * self.source(upstream, i).value();
        }
        acc
    }

    /// `sum_{i>=1} beta_i * ds_i/dx_k`; the offset source is skipped.
    pub fn first_derivative_feed(&self, upstream: &[Layer], k: usize) -> f64 {
        let mut acc = 0.0;
        for (i, b) in self.betas.iter().enumerate().skip(1) {
            acc += b * self.source(upstream, i).first_derivative(k);
        }
        acc
    }

    pub fn second_derivative_feed(&self, upstream: &[Layer], k: usize) -> f64 {
        let mut acc = 0.0;
        for (i, b) in self.betas.iter().enumerate().skip(1) {
            acc += b * self.source(upstream, i).second_derivative(k);
        }
        acc
    }

    /// Derivative of the feed w.r.t. weight `j`.
    ///
    /// For an own weight this is the value of the source it multiplies.
    pub fn variational_first_derivative_feed(&self, upstream: &[Layer], j: usize) -> f64 {
        if let Some(i) = self.local_index(j) {
            return self.source(upstream, i).value();
        }
        let Some(deps) = self.sources_by_vp.get(&j) else {
            return 0.0;
        };
        let mut acc = 0.0;
        for &i in deps {
            acc += self.betas[i] * self.source(upstream, i).variational_first_derivative(j);
        }
        acc
    }

    pub fn cross_first_derivative_feed(&self, upstream: &[Layer], k: usize, j: usize) -> f64 {
        if let Some(i) = self.local_index(j) {
            return self.source(upstream, i).first_derivative(k);
        }
        let Some(deps) = self.sources_by_vp.get(&j) else {
            return 0.0;
        };
        let mut acc = 0.0;
        for &i in deps {
            acc += self.betas[i] * self.source(upstream, i).cross_first_derivative(k, j);
        }
        acc
    }

    pub fn cross_second_derivative_feed(&self, upstream: &[Layer], k: usize, j: usize) -> f64 {
        if let Some(i) = self.local_index(j) {
            return self.source(upstream, i).second_derivative(k);
        }
        let Some(deps) = self.sources_by_vp.get(&j) else {
            return 0.0;
        };
        let mut acc = 0.0;
        for &i in deps {
            acc += self.betas[i] * self.source(upstream, i).cross_second_derivative(k, j);
        }
        acc
    }
}
