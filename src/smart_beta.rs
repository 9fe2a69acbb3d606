//! Data-aware initial betas.
//!
//! Every neuron gets Gaussian betas scaled so that its feed lands on the
//! input range its activation function is most expressive on, given the
//! expected mean and spread of the units feeding it. Within a layer the beta
//! vectors are made as orthogonal as possible, so that the neurons start out
//! looking at different directions of their input.
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use varnet::FeedForwardNetwork;
//! use varnet::smart_beta::generate_smart_beta;
//!
//! let mut net = FeedForwardNetwork::new(3).unwrap();
//! net.push_layer_with_code(5, "tans").unwrap();
//! net.push_layer_with_code(1, "id_").unwrap();
//! net.connect(Some(1)).unwrap();
//! generate_smart_beta(&mut net, &mut StdRng::seed_from_u64(7)).unwrap();
//! ```

use std::f64::consts::PI;

use log::debug;
use rand::Rng;

use crate::error::{NetError, Result};
use crate::feeder::Ray;
use crate::layer::Layer;
use crate::network::FeedForwardNetwork;

/// Smallest norm a generated beta vector may have.
pub const MIN_BETA_NORM: f64 = 0.001;

/// Candidates drawn for a ray that cannot be orthogonal to all of its
/// siblings; the least aligned one wins.
pub const N_TRY_BEST_LD_BETA: usize = 20;

/// Regenerates the betas of every layer, first to last, refreshing the unit
/// moments as it goes.
///
/// # Errors
///
/// Fails when the network is not connected.
pub fn generate_smart_beta<R: Rng + ?Sized>(net: &mut FeedForwardNetwork, rng: &mut R) -> Result<()> {
    if !net.is_connected() {
        return Err(NetError::NotConnected);
    }
    let layers = net.layers_mut();
    for l in 1..layers.len() {
        let (upstream, rest) = layers.split_at_mut(l);
        generate_layer_smart_beta(upstream, &mut rest[0], rng);
        rest[0].compute_moments(upstream);
    }
    debug!("generated smart betas for {} layer(s)", layers.len() - 1);
    Ok(())
}

/// Regenerates the betas of one layer from the moments of `upstream`.
pub fn generate_layer_smart_beta<R: Rng + ?Sized>(upstream: &[Layer], layer: &mut Layer, rng: &mut R) {
    let mut placed: Vec<Vec<f64>> = Vec::new();
    for unit in layer.units_mut() {
        let Some(target) = unit
            .activation()
            .map(|a| (a.ideal_input_mu(), a.ideal_input_sigma()))
        else {
            continue;
        };
        let Some(feeder) = unit.feeder_mut() else {
            continue;
        };
        let n = feeder.n_beta();
        if n == 0 {
            continue;
        }

        let (mu, sigma) = beta_mu_and_sigma(feeder, upstream, target);
        let siblings: Vec<&[f64]> = placed
            .iter()
            .filter(|p| p.len() == n)
            .map(Vec::as_slice)
            .collect();
        let beta = if siblings.len() < n {
            let mut b = random_beta(n, mu, sigma, rng);
            make_orthogonal(&mut b, &siblings);
            b
        } else {
            least_aligned_beta(n, mu, sigma, &siblings, rng)
        };

        for (i, &b) in beta.iter().enumerate() {
            feeder.set_beta(i, b);
        }
        placed.push(beta);
    }
}

/// Mean and spread of the beta distribution that puts the feed of `feeder`
/// at `(target_mu, target_sigma)`.
fn beta_mu_and_sigma(feeder: &Ray, upstream: &[Layer], (target_mu, target_sigma): (f64, f64)) -> (f64, f64) {
    let mut sum_mu = 0.0;
    let mut sum_sq = 0.0;
    for src in feeder.sources() {
        let u = &upstream[src.layer].units()[src.index];
        sum_mu += u.output_mu();
        sum_sq += u.output_mu() * u.output_mu() + u.output_sigma() * u.output_sigma();
    }
    let mu = if sum_mu.abs() > f64::EPSILON {
        target_mu / sum_mu
    } else {
        0.0
    };
    let sigma = if sum_sq > 0.0 {
        target_sigma / sum_sq.sqrt()
    } else {
        target_sigma
    };
    (mu, sigma)
}

/// Standard normal sample by the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1], so the log stays finite
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn vec_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// `n` betas drawn from `N(mu, sigma^2)`, with norm at least
/// [`MIN_BETA_NORM`].
pub fn random_beta<R: Rng + ?Sized>(n: usize, mu: f64, sigma: f64, rng: &mut R) -> Vec<f64> {
    let mut b: Vec<f64> = (0..n).map(|_| mu + sigma * standard_normal(rng)).collect();
    enforce_min_norm(&mut b);
    b
}

fn enforce_min_norm(b: &mut [f64]) {
    let norm = vec_norm(b);
    if norm >= MIN_BETA_NORM {
        return;
    }
    if norm > 0.0 {
        let scale = MIN_BETA_NORM / norm;
        b.iter_mut().for_each(|x| *x *= scale);
    } else if !b.is_empty() {
        let fill = MIN_BETA_NORM / (b.len() as f64).sqrt();
        b.fill(fill);
    }
}

/// Projects out every sibling direction from `b`, then restores the norm
/// `b` had before.
pub fn make_orthogonal(b: &mut [f64], siblings: &[&[f64]]) {
    let norm = vec_norm(b);
    for s in siblings {
        let ss = dot(s, s);
        if ss == 0.0 {
            continue;
        }
        let c = dot(b, s) / ss;
        for (x, y) in b.iter_mut().zip(s.iter()) {
            *x -= c * y;
        }
    }
    let after = vec_norm(b);
    if after > f64::EPSILON * norm {
        let scale = norm / after;
        b.iter_mut().for_each(|x| *x *= scale);
    }
    enforce_min_norm(b);
}

/// Largest `|cos|` between `b` and any sibling.
fn max_alignment(b: &[f64], siblings: &[&[f64]]) -> f64 {
    let nb = vec_norm(b);
    siblings
        .iter()
        .map(|s| {
            let d = nb * vec_norm(s);
            if d > 0.0 { dot(b, s).abs() / d } else { 0.0 }
        })
        .fold(0.0, f64::max)
}

fn least_aligned_beta<R: Rng + ?Sized>(
    n: usize,
    mu: f64,
    sigma: f64,
    siblings: &[&[f64]],
    rng: &mut R,
) -> Vec<f64> {
    let mut best = random_beta(n, mu, sigma, rng);
    let mut best_score = max_alignment(&best, siblings);
    for _ in 1..N_TRY_BEST_LD_BETA {
        let candidate = random_beta(n, mu, sigma, rng);
        let score = max_alignment(&candidate, siblings);
        if score < best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}
