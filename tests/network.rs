use std::panic::{self, AssertUnwindSafe};

use rand::SeedableRng;
use rand::rngs::StdRng;
use varnet::approx::{ApproxEquality, approx_within};
use varnet::backend::{Backend, get_backend, set_backend};
use varnet::{DerivFlags, FeedForwardNetwork};

const H: f64 = 1e-5;

fn net_2_4_2(actf: &str, seed: u64) -> FeedForwardNetwork {
    let mut net = FeedForwardNetwork::new(2).unwrap();
    net.push_layer_with_code(4, actf).unwrap();
    net.push_layer_with_code(2, actf).unwrap();
    net.connect(Some(seed)).unwrap();
    net.enable_derivatives(DerivFlags::ALL);
    net
}

fn deep_net() -> FeedForwardNetwork {
    let mut net = FeedForwardNetwork::new(3).unwrap();
    net.push_layer_with_code(4, "tans").unwrap();
    net.push_layer_with_code(3, "lgs").unwrap();
    net.push_layer_with_code(2, "sin").unwrap();
    net.connect(Some(11)).unwrap();
    net.enable_derivatives(DerivFlags::ALL);
    net
}

fn close(a: f64, b: f64) -> bool {
    approx_within(&a, &b, ApproxEquality::Relative)
}

fn eval(net: &mut FeedForwardNetwork, x: &[f64]) {
    net.set_input(x).unwrap();
    net.ff_propagate();
}

#[test]
fn zero_weights_give_zero_outputs() {
    let mut net = net_2_4_2("tans", 5);
    assert_eq!(net.n_beta(), 22);
    net.set_betas(&[0.0; 22]).unwrap();
    eval(&mut net, &[0.7, -1.3]);

    for j in 0..2 {
        assert_eq!(net.output(j), 0.0);
        for k in 0..2 {
            assert_eq!(net.first_derivative(j, k), 0.0);
            assert_eq!(net.second_derivative(j, k), 0.0);
            for i in 0..22 {
                assert_eq!(net.cross_first_derivative(j, k, i), 0.0);
                assert_eq!(net.cross_second_derivative(j, k, i), 0.0);
            }
        }
    }
    // only the output biases (ids 12 and 17) move the outputs
    for i in 0..22 {
        let expected = if i == 12 { 1.0 } else { 0.0 };
        assert_eq!(net.variational_first_derivative(0, i), expected);
        let expected = if i == 17 { 1.0 } else { 0.0 };
        assert_eq!(net.variational_first_derivative(1, i), expected);
    }
}

#[test]
fn partial_betas_round_trip() {
    let mut net = net_2_4_2("tans", 5);
    let first: Vec<f64> = (0..15).map(|i| 0.1 * (i as f64 + 1.0)).collect();
    net.set_betas(&[0.0; 22]).unwrap();
    net.set_betas(&first).unwrap();

    let all = net.betas();
    assert_eq!(&all[..15], &first[..]);
    assert!(all[15..].iter().all(|&b| b == 0.0));

    let mut out = [f64::NAN; 22];
    net.get_betas(&mut out).unwrap();
    assert_eq!(out.to_vec(), all);

    // the second output unit owns ids 17..22, all still zero
    eval(&mut net, &[0.3, 0.4]);
    assert_eq!(net.output(1), 0.0);
    assert_ne!(net.output(0), 0.0);

    net.set_betas(&all).unwrap();
    assert_eq!(net.betas(), all);
}

#[test]
fn weight_ids_partition_the_id_space() {
    let net = deep_net();
    let mut ranges: Vec<_> = net
        .layers()
        .iter()
        .flat_map(|l| l.units().iter().filter_map(|u| u.feeder()))
        .map(|f| {
            assert!(f.used_in().is_subset(f.used_for()));
            f.vp_range().unwrap()
        })
        .collect();
    ranges.sort_by_key(|r| r.start);

    let mut next = 0;
    for r in &ranges {
        assert_eq!(r.start, next);
        next = r.end;
    }
    assert_eq!(next, net.n_vp());
    assert_eq!(net.n_vp(), net.n_beta());
}

#[test]
fn used_for_collects_upstream_ids() {
    let net = deep_net();
    let out = net.layers()[3].units()[1].feeder().unwrap();
    // fully connected: an output unit depends on every id below its own
    let own = out.vp_range().unwrap();
    assert_eq!(out.used_for().len(), own.end);
    assert!((0..own.start).all(|id| !out.is_vp_used_in(id) && out.is_vp_used_for(id)));

    let hidden = net.layers()[1].units()[1].feeder().unwrap();
    assert_eq!(hidden.used_for(), hidden.used_in());
}

#[test]
fn offset_units_stay_constant() {
    let mut net = deep_net();
    for x in [[0.0, 0.0, 0.0], [1.0, -2.0, 0.5]] {
        eval(&mut net, &x);
        for layer in net.layers() {
            let offset = &layer.units()[0];
            assert!(offset.is_offset());
            assert_eq!(offset.value(), 1.0);
            assert!(offset.first_derivatives().iter().all(|&d| d == 0.0));
            assert!(offset.second_derivatives().iter().all(|&d| d == 0.0));
            assert!(offset.variational_first_derivatives().iter().all(|&d| d == 0.0));
            assert!(offset.cross_first_derivatives().iter().all(|&d| d == 0.0));
            assert!(offset.cross_second_derivatives().iter().all(|&d| d == 0.0));
        }
    }
}

#[test]
fn own_weight_derivative_is_source_value() {
    let mut net = deep_net();
    eval(&mut net, &[0.2, -0.4, 0.9]);
    let layers = net.layers();
    for l in 1..layers.len() {
        let upstream = &layers[..l];
        for unit in &layers[l].units()[1..] {
            let ray = unit.feeder().unwrap();
            for (id, src) in ray.vp_range().unwrap().zip(ray.sources()) {
                let value = upstream[src.layer].units()[src.index].value();
                assert_eq!(ray.variational_first_derivative_feed(upstream, id), value);
            }
        }
    }
}

#[test]
fn propagation_is_deterministic() {
    let mut a = deep_net();
    let mut b = deep_net();
    assert_eq!(a.betas(), b.betas());
    eval(&mut a, &[0.1, 0.2, 0.3]);
    eval(&mut b, &[0.1, 0.2, 0.3]);
    eval(&mut a, &[0.1, 0.2, 0.3]);
    assert_eq!(a.outputs(), b.outputs());
    for i in 0..a.n_vp() {
        assert_eq!(a.cross_second_derivative(1, 2, i), b.cross_second_derivative(1, 2, i));
    }
}

#[test]
fn input_derivatives_match_finite_differences() {
    let mut net = deep_net();
    let x = [0.3, -0.5, 0.8];
    eval(&mut net, &x);
    let y0 = net.outputs();
    let mut d1 = Vec::new();
    let mut d2 = Vec::new();
    for j in 0..2 {
        for k in 0..3 {
            d1.push(net.first_derivative(j, k));
            d2.push(net.second_derivative(j, k));
        }
    }

    let h = 1e-4;
    for k in 0..3 {
        let mut xp = x;
        xp[k] += h;
        eval(&mut net, &xp);
        let yp = net.outputs();
        let mut xm = x;
        xm[k] -= h;
        eval(&mut net, &xm);
        let ym = net.outputs();
        for j in 0..2 {
            let fd1 = (yp[j] - ym[j]) / (2.0 * h);
            let fd2 = (yp[j] - 2.0 * y0[j] + ym[j]) / (h * h);
            assert!(close(d1[j * 3 + k], fd1), "d1[{j}][{k}]: {} vs {fd1}", d1[j * 3 + k]);
            assert!(close(d2[j * 3 + k], fd2), "d2[{j}][{k}]: {} vs {fd2}", d2[j * 3 + k]);
        }
    }
}

#[test]
fn weight_derivatives_match_finite_differences() {
    let mut net = deep_net();
    let x = [-0.6, 0.1, 0.4];
    let betas = net.betas();
    eval(&mut net, &x);

    let analytic = |net: &FeedForwardNetwork, j: usize, k: usize, i: usize| {
        (
            net.variational_first_derivative(j, i),
            net.cross_first_derivative(j, k, i),
            net.cross_second_derivative(j, k, i),
        )
    };
    let reading = |net: &FeedForwardNetwork, j: usize, k: usize| {
        (net.output(j), net.first_derivative(j, k), net.second_derivative(j, k))
    };

    for i in 0..net.n_vp() {
        let mut plus = betas.clone();
        plus[i] += H;
        let mut minus = betas.clone();
        minus[i] -= H;

        for j in 0..2 {
            for k in 0..3 {
                net.set_betas(&betas).unwrap();
                eval(&mut net, &x);
                let (vd1, c1, c2) = analytic(&net, j, k, i);

                net.set_betas(&plus).unwrap();
                eval(&mut net, &x);
                let p = reading(&net, j, k);
                net.set_betas(&minus).unwrap();
                eval(&mut net, &x);
                let m = reading(&net, j, k);

                let fd = |a: f64, b: f64| (a - b) / (2.0 * H);
                assert!(close(vd1, fd(p.0, m.0)), "vd1 y{j} b{i}");
                assert!(close(c1, fd(p.1, m.1)), "c1 y{j} x{k} b{i}");
                assert!(close(c2, fd(p.2, m.2)), "c2 y{j} x{k} b{i}");
            }
        }
    }
}

#[test]
fn frozen_layer_still_passes_earlier_derivatives() {
    let mut net = deep_net();
    let x = [0.5, 0.5, -0.5];
    eval(&mut net, &x);
    // hidden layer 1 owns ids 0..16
    let before: Vec<f64> = (0..16).map(|i| net.variational_first_derivative(0, i)).collect();

    net.set_layer_trainable(2, false).unwrap();
    assert_eq!(net.n_vp(), net.n_beta() - 15);
    eval(&mut net, &x);
    let after: Vec<f64> = (0..16).map(|i| net.variational_first_derivative(0, i)).collect();
    assert_eq!(before, after);
}

#[test]
fn narrower_flags_leave_empty_buffers() {
    let mut net = deep_net();
    net.enable_derivatives(DerivFlags::D1);
    assert_eq!(net.derivatives(), DerivFlags::D1);
    eval(&mut net, &[0.0, 0.0, 0.0]);
    let out = &net.layers()[3].units()[1];
    assert_eq!(out.first_derivatives().len(), 3);
    assert!(out.variational_first_derivatives().is_empty());
    assert!(out.cross_second_derivatives().is_empty());

    net.enable_derivatives(DerivFlags::new(false, false, false, false, true));
    assert_eq!(net.derivatives(), DerivFlags::ALL);
}

#[test]
fn rayon_backend_matches_serial() {
    let mut net = deep_net();
    let x = [0.9, -0.1, 0.3];
    let prev = get_backend();

    set_backend(Backend::Serial);
    eval(&mut net, &x);
    let serial: Vec<f64> = (0..net.n_vp()).map(|i| net.cross_first_derivative(1, 0, i)).collect();
    let serial_y = net.outputs();

    set_backend(Backend::Rayon);
    eval(&mut net, &x);
    let parallel: Vec<f64> = (0..net.n_vp()).map(|i| net.cross_first_derivative(1, 0, i)).collect();
    set_backend(prev);

    assert_eq!(serial, parallel);
    assert_eq!(serial_y, net.outputs());
}

#[test]
fn custom_rng_connects_reproducibly() {
    let build = || {
        let mut net = FeedForwardNetwork::new(1).unwrap();
        net.push_layer_with_code(3, "gss").unwrap();
        net.push_layer_with_code(1, "id_").unwrap();
        net.connect_with_rng(&mut StdRng::seed_from_u64(99)).unwrap();
        net
    };
    assert_eq!(build().betas(), build().betas());
    // first ray: 2 sources, bound 4 / sqrt(2)
    let bound = 4.0 / 2f64.sqrt();
    assert!(build().betas()[..6].iter().all(|b| b.abs() <= bound));
}

#[test]
fn reading_a_disabled_order_panics() {
    let mut net = FeedForwardNetwork::new(1).unwrap();
    net.push_layer_with_code(1, "lgs").unwrap();
    net.connect(Some(1)).unwrap();
    net.enable_derivatives(DerivFlags::D1);
    eval(&mut net, &[0.5]);

    let read = panic::catch_unwind(AssertUnwindSafe(|| net.variational_first_derivative(0, 0)));
    assert!(read.is_err());
}
