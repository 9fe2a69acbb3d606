use varnet::trainer::{
    CostKind, FitProblem, GradientDescent, LevenbergMarquardt, ResidualSet, StopReason, TrainingConfig,
    TrainingData, fit,
};
use varnet::{DerivFlags, FeedForwardNetwork, NetError, VariationalModel, static_network};

static_network!(
    @derivs { d1: false, d2: false, vd1: true, c1: false, c2: false }
    @network StaticLine(static_line)
    {
        InputLayer(1),
        {
            only: Layer(1 => 1, Identity),
        },
        OutputLayer(1),
    }
);

fn line_net(flags: DerivFlags) -> FeedForwardNetwork {
    let mut net = FeedForwardNetwork::new(1).unwrap();
    net.push_layer_with_code(1, "id_").unwrap();
    net.connect(Some(0)).unwrap();
    net.enable_derivatives(flags);
    net.set_betas(&[0.0, 0.0]).unwrap();
    net
}

/// Samples of `y = 1 + 2x`.
fn line_data(xs: &[f64]) -> TrainingData {
    let ys = xs.iter().map(|x| 1.0 + 2.0 * x).collect();
    TrainingData::new(1, 1, xs.to_vec(), ys)
}

fn config(max_steps: usize) -> TrainingConfig {
    TrainingConfig {
        max_steps,
        ..TrainingConfig::default()
    }
}

#[test]
fn fits_a_line() {
    let mut net = line_net(DerivFlags::VD1);
    let problem = FitProblem::new(&net, line_data(&[0.0, 0.5, 1.0]), config(500)).unwrap();
    let report = fit(&mut net, &problem, &mut GradientDescent { learning_rate: 0.1 }).unwrap();

    assert_eq!(report.reason, StopReason::MaxSteps);
    assert_eq!(report.n_iter, 500);
    assert!(report.validation.is_none());
    assert!(report.training.full < 1e-6);
    let b = net.betas();
    assert!((b[0] - 1.0).abs() < 1e-4 && (b[1] - 2.0).abs() < 1e-4, "{b:?}");
}

#[test]
fn fits_a_static_line() {
    let mut net = StaticLine::new();
    let problem = FitProblem::new(&net, line_data(&[0.0, 0.5, 1.0]), config(500)).unwrap();
    fit(&mut net, &problem, &mut GradientDescent { learning_rate: 0.1 }).unwrap();
    let b = VariationalModel::betas(&net);
    assert!((b[0] - 1.0).abs() < 1e-4 && (b[1] - 2.0).abs() < 1e-4, "{b:?}");
}

#[test]
fn stalled_validation_stops_early() {
    let mut net = line_net(DerivFlags::VD1);
    let data = line_data(&[0.0, 0.5, 1.0, 2.0]).with_validation_split(3);
    let cfg = TrainingConfig {
        max_steps: 100,
        max_no_improve: 3,
        ..TrainingConfig::default()
    };
    let problem = FitProblem::new(&net, data, cfg).unwrap();
    // a zero step never improves on the first validation residual
    let report = fit(&mut net, &problem, &mut GradientDescent { learning_rate: 0.0 }).unwrap();

    assert_eq!(report.reason, StopReason::NoImprovement);
    assert_eq!(report.n_iter, 4);
    let vali = report.validation.unwrap();
    assert_eq!(vali.pure, 5.0);
    assert_eq!(vali.noreg, vali.full);
}

#[test]
fn exact_validation_fit_stops() {
    let mut net = line_net(DerivFlags::VD1);
    net.set_betas(&[1.0, 2.0]).unwrap();
    let data = line_data(&[0.0, 1.0, 3.0]).with_validation_split(2);
    let problem = FitProblem::new(&net, data, config(100)).unwrap();
    let report = fit(&mut net, &problem, &mut GradientDescent::default()).unwrap();
    assert_eq!(report.reason, StopReason::ValidationExhausted);
    assert_eq!(report.n_iter, 1);
}

#[test]
fn derivative_targets_need_cross_derivatives() {
    let net = line_net(DerivFlags::D1_VD1);
    let data = line_data(&[0.0, 1.0]).with_first_derivatives(vec![2.0, 2.0]);
    let cfg = TrainingConfig {
        lambda_d1: 1.0,
        ..TrainingConfig::default()
    };
    assert_eq!(
        FitProblem::new(&net, data.clone(), cfg).err(),
        Some(NetError::MissingDerivatives("c1"))
    );

    let net = line_net(DerivFlags::NONE);
    assert_eq!(
        FitProblem::new(&net, data, TrainingConfig::default()).err(),
        Some(NetError::MissingDerivatives("vd1"))
    );
}

#[test]
fn fits_with_derivative_targets_and_decay() {
    let mut net = line_net(DerivFlags::ALL);
    let data = line_data(&[0.0, 0.5, 1.0]).with_first_derivatives(vec![2.0; 3]);
    let cfg = TrainingConfig {
        lambda_d1: 0.5,
        lambda_r: 1e-8,
        max_steps: 800,
        ..TrainingConfig::default()
    };
    let problem = FitProblem::new(&net, data, cfg).unwrap();
    // values, two derivative blocks, decay
    assert_eq!(problem.n_residuals(ResidualSet::Training, CostKind::Full), 3 + 3 + 3 + 2);

    let report = fit(&mut net, &problem, &mut GradientDescent { learning_rate: 0.1 }).unwrap();
    assert!(report.training.noreg < 1e-3, "{report:?}");
    assert!(report.training.full >= report.training.noreg);
    assert!((net.betas()[1] - 2.0).abs() < 1e-3);
}

#[test]
fn rejects_mismatched_data() {
    let net = line_net(DerivFlags::VD1);
    let data = TrainingData::new(2, 1, vec![0.0, 1.0], vec![1.0]);
    assert_eq!(
        FitProblem::new(&net, data, TrainingConfig::default()).err(),
        Some(NetError::DimensionMismatch { expected: 1, actual: 2 })
    );

    let cfg = TrainingConfig {
        lambda_r: -1.0,
        ..TrainingConfig::default()
    };
    assert!(matches!(
        FitProblem::new(&net, line_data(&[0.0]), cfg),
        Err(NetError::InvalidParam { .. })
    ));
}

/// Samples of a sum of two tanh bumps, exactly representable by `1-3-1`.
fn bumps_data() -> TrainingData {
    let xs: Vec<f64> = (0..21).map(|i| -2.0 + 0.2 * f64::from(i)).collect();
    let ys = xs
        .iter()
        .map(|&x| 0.5 * (1.5 * x - 0.5).tanh() + 0.3 * (1.0 - x).tanh())
        .collect();
    TrainingData::new(1, 1, xs, ys)
}

fn bumps_net() -> FeedForwardNetwork {
    let mut net = FeedForwardNetwork::new(1).unwrap();
    net.push_layer_with_code(3, "tans").unwrap();
    net.push_layer_with_code(1, "id_").unwrap();
    net.connect(Some(3)).unwrap();
    net.enable_derivatives(DerivFlags::VD1);
    net
}

#[test]
fn levenberg_marquardt_outpaces_gradient_descent() {
    let mut lm_net = bumps_net();
    let mut gd_net = bumps_net();
    let start = FitProblem::new(&lm_net, bumps_data(), config(1))
        .unwrap()
        .costs(&mut lm_net, ResidualSet::Training)
        .unwrap();

    let problem = FitProblem::new(&lm_net, bumps_data(), config(30)).unwrap();
    let lm = fit(&mut lm_net, &problem, &mut LevenbergMarquardt::default()).unwrap();
    let problem = FitProblem::new(&gd_net, bumps_data(), config(300)).unwrap();
    let gd = fit(&mut gd_net, &problem, &mut GradientDescent { learning_rate: 0.01 }).unwrap();

    assert_eq!(lm.n_iter, 30);
    assert!(lm.training.full < 0.1 * start.full, "{lm:?} from {start:?}");
    assert!(lm.training.full < gd.training.full, "{lm:?} vs {gd:?}");
    assert_eq!(lm.errors.len(), lm_net.n_vp());
}

#[test]
fn levenberg_marquardt_never_raises_the_cost() {
    let mut net = bumps_net();
    let problem = FitProblem::new(&net, bumps_data(), config(1)).unwrap();
    let mut solver = LevenbergMarquardt::default();
    let mut last = problem.costs(&mut net, ResidualSet::Training).unwrap().full;
    for _ in 0..10 {
        let report = fit(&mut net, &problem, &mut solver).unwrap();
        assert!(report.training.full <= last);
        last = report.training.full;
    }
}

#[test]
fn fit_errors_of_a_noisy_line() {
    let mut net = line_net(DerivFlags::VD1);
    // noise orthogonal to both columns, so the best fit stays 1 + 2x
    let noise = [0.1, -0.1, -0.1, 0.1];
    let ys = (0..4).map(|i| 1.0 + 2.0 * f64::from(i) + noise[i as usize]).collect();
    let data = TrainingData::new(1, 1, vec![0.0, 1.0, 2.0, 3.0], ys);
    let problem = FitProblem::new(&net, data, config(20)).unwrap();
    let report = fit(&mut net, &problem, &mut LevenbergMarquardt::default()).unwrap();

    let b = net.betas();
    assert!((b[0] - 1.0).abs() < 1e-8 && (b[1] - 2.0).abs() < 1e-8, "{b:?}");
    // chisq = 0.04 over 2 degrees of freedom, diag((X^T X)^-1) = (0.7, 0.2)
    assert!((report.errors[0] - 0.014_f64.sqrt()).abs() < 1e-8, "{:?}", report.errors);
    assert!((report.errors[1] - 0.004_f64.sqrt()).abs() < 1e-8, "{:?}", report.errors);
}

#[test]
fn exact_fit_has_zero_errors() {
    let mut net = line_net(DerivFlags::VD1);
    net.set_betas(&[1.0, 2.0]).unwrap();
    let problem = FitProblem::new(&net, line_data(&[0.0, 0.5, 1.0]), config(3)).unwrap();
    let report = fit(&mut net, &problem, &mut LevenbergMarquardt::default()).unwrap();
    assert_eq!(report.errors, vec![0.0, 0.0]);
    assert_eq!(net.betas(), vec![1.0, 2.0]);
}
