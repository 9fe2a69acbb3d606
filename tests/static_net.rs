use rand::SeedableRng;
use rand::rngs::StdRng;
use varnet::{DerivFlags, NetError, VariationalModel, static_network};

static_network!(
    @derivs { d1: true, d2: true, vd1: true, c1: true, c2: true }
    @network SmallFull(small_full)
    {
        InputLayer(2),
        {
            hidden: Layer(2 => 4, TanSigmoid),
            out: Layer(4 => 2, TanSigmoid),
        },
        OutputLayer(2),
    }
);

static_network!(
    @derivs { d1: false, d2: false, vd1: false, c1: false, c2: false }
    @network SmallPlain(small_plain)
    {
        InputLayer(2),
        {
            hidden: Layer(2 => 4, TanSigmoid),
            out: Layer(4 => 2, TanSigmoid),
        },
        OutputLayer(2),
    }
);

static_network!(
    @derivs { d1: true, d2: false, vd1: true, c1: false, c2: false }
    @network Line(line)
    {
        InputLayer(1),
        {
            only: Layer(1 => 1, Identity),
        },
        OutputLayer(1),
    }
);

#[test]
fn generated_constants() {
    assert_eq!(SmallFull::N_LAYER, 2);
    assert_eq!(SmallFull::N_INPUT, 2);
    assert_eq!(SmallFull::N_OUTPUT, 2);
    assert_eq!(SmallFull::N_BETA, 22);
    assert_eq!(SmallFull::N_LINK, 16);
    assert_eq!(SmallFull::N_UNIT, 6);
    assert_eq!(SmallFull::DERIVS, DerivFlags::ALL);
    assert_eq!(SmallPlain::DERIVS, DerivFlags::NONE);
    assert_eq!(Line::N_BETA, 2);
}

#[test]
fn per_layer_shapes() {
    assert_eq!(SmallFull::SHAPE, [2, 4, 2]);
    assert_eq!(SmallFull::BETA_SHAPE, [12, 10]);
    assert_eq!(SmallFull::LINK_SHAPE, [8, 8]);
    assert_eq!(SmallFull::BETA_SHAPE.iter().sum::<usize>(), SmallFull::N_BETA);
    assert_eq!(SmallFull::LINK_SHAPE.iter().sum::<usize>(), SmallFull::N_LINK);
    assert_eq!(SmallFull::SHAPE[1..].iter().sum::<usize>(), SmallFull::N_UNIT);
    assert_eq!(Line::SHAPE, [1, 1]);
    assert_eq!(Line::BETA_SHAPE, [2]);
}

#[test]
fn disabled_orders_take_no_space() {
    let plain = core::mem::size_of::<SmallPlain>();
    // input, betas and outputs, plus the mask
    assert!(plain <= (2 + 22 + 4 + 2) * 8 + 8, "{plain} bytes");
    assert!(core::mem::size_of::<SmallFull>() > 2 * 22 * 2 * 8 * 2);
}

#[test]
fn zero_weights_give_zero_outputs() {
    let mut net = SmallFull::new();
    net.set_input_array([0.4, -0.9]);
    net.ff_propagate();
    for j in 0..2 {
        assert_eq!(net.output(j), 0.0);
        assert_eq!(net.first_derivative(j, 0), 0.0);
        assert_eq!(net.cross_second_derivative(j, 1, 5), 0.0);
    }
    assert_eq!(net.variational_first_derivative(0, 12), 1.0);
    assert_eq!(net.variational_first_derivative(1, 17), 1.0);
    assert_eq!(net.variational_first_derivative(1, 12), 0.0);
}

#[test]
fn line_derivatives() {
    let mut net = Line::new();
    net.set_betas(&[1.0, 2.0]).unwrap();
    net.set_input(&[3.0]).unwrap();
    net.ff_propagate();
    assert_eq!(net.output(0), 7.0);
    assert_eq!(net.first_derivative(0, 0), 2.0);
    assert_eq!(net.variational_first_derivative(0, 0), 1.0);
    assert_eq!(net.variational_first_derivative(0, 1), 3.0);
}

#[test]
fn beta_access_by_id() {
    let mut net = SmallFull::new();
    assert!(net.set_beta(21, 0.5));
    assert!(!net.set_beta(22, 0.5));
    assert_eq!(net.get_beta(21), Some(0.5));
    assert_eq!(net.get_beta(22), None);

    let values: Vec<f64> = (0..15).map(|i| i as f64).collect();
    net.set_betas(&values).unwrap();
    let mut out = [0.0; 22];
    net.get_betas(&mut out).unwrap();
    assert_eq!(&out[..15], &values[..]);
    assert_eq!(out[21], 0.5);

    assert_eq!(
        net.set_betas(&[0.0; 23]),
        Err(NetError::DimensionMismatch { expected: 22, actual: 23 })
    );
    assert!(net.get_betas(&mut [0.0; 30]).is_err());
}

#[test]
fn input_width_checked() {
    let mut net = SmallFull::new();
    assert_eq!(
        net.set_input(&[1.0, 2.0, 3.0]),
        Err(NetError::DimensionMismatch { expected: 2, actual: 3 })
    );
}

#[test]
fn mask_restricts_orders_at_runtime() {
    let mut net = SmallFull::new();
    net.set_derivative_mask(DerivFlags::new(true, false, false, true, false));
    // c1 without vd1 is not a usable set
    assert_eq!(net.derivatives(), DerivFlags::D1);
    net.set_derivative_mask(DerivFlags::ALL);
    assert_eq!(net.derivatives(), DerivFlags::ALL);
    assert_eq!(SmallPlain::new().derivatives(), DerivFlags::NONE);
}

#[test]
fn randomized_betas_stay_in_bounds() {
    let mut net = SmallFull::new();
    net.randomize_betas(&mut StdRng::seed_from_u64(3));
    let betas = net.betas();
    let hidden = 4.0 / 3f64.sqrt();
    let out = 4.0 / 5f64.sqrt();
    assert!(betas[..12].iter().all(|b| b.abs() <= hidden));
    assert!(betas[12..].iter().all(|b| b.abs() <= out));
    assert!(betas.iter().any(|&b| b != 0.0));
}

#[test]
fn usable_through_the_model_trait() {
    fn first_output<M: VariationalModel>(m: &mut M, x: &[f64]) -> f64 {
        m.set_input(x).unwrap();
        m.ff_propagate();
        m.output(0)
    }
    let mut net = Line::default();
    VariationalModel::set_betas(&mut net, &[0.5, -1.0]).unwrap();
    assert_eq!(first_output(&mut net, &[2.0]), -1.5);
    assert_eq!(VariationalModel::n_vp(&net), 2);
}
