//! # `varnet`
//!
//! Feed-forward neural networks that, next to their outputs, carry analytic
//! derivatives through every layer:
//!
//! - first and second derivatives of each output with respect to each input
//! - first derivatives with respect to every weight ("variational parameter")
//! - the cross derivatives `d2/dx_k dw_i` and `d3/dx_k^2 dw_i`
//!
//! Which orders are computed is chosen at runtime with [`DerivFlags`]. Weights
//! carry global ids, and every feeder knows which ids it owns directly and
//! which ids influence it anywhere upstream.
//!
//! Two engines are provided:
//!
//! - [`FeedForwardNetwork`]: built at runtime from layers and activation codes
//! - [`static_network!`]: a network whose shape, activations and derivative
//!   orders are fixed at compile time and stored in fixed-size arrays
//!
//! Both implement [`VariationalModel`], and the [`trainer`] fits either of
//! them to data by nonlinear least squares. [`smart_beta`] replaces the
//! uniform starting betas of a dynamic network with data-aware ones.
//!
//! ## Example
//!
//! ```rust
//! use varnet::{DerivFlags, FeedForwardNetwork};
//!
//! let mut net = FeedForwardNetwork::new(2).unwrap();
//! net.push_layer_with_code(3, "tans").unwrap();
//! net.push_layer_with_code(1, "id_").unwrap();
//! net.connect(Some(42)).unwrap();
//! net.enable_derivatives(DerivFlags::ALL);
//!
//! net.set_input(&[0.3, -0.2]).unwrap();
//! net.ff_propagate();
//! let dy_dx0 = net.first_derivative(0, 0);
//! let dy_dw0 = net.variational_first_derivative(0, 0);
//! assert!(dy_dx0.is_finite() && dy_dw0.is_finite());
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::many_single_char_names,
    clippy::cast_precision_loss,
    clippy::similar_names,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]
#![deny(unsafe_code)]
#![forbid(unused_must_use)]

pub mod actf;
pub mod approx;
pub mod backend;
pub mod codes;
pub mod deriv;
pub mod error;
pub mod feeder;
pub mod layer;
pub mod model;
pub mod network;
pub mod smart_beta;
pub mod static_net;
pub mod trainer;
pub mod unit;

pub use self::actf::{ActivationFunction, provide_activation};
pub use self::codes::Component;
pub use self::deriv::DerivFlags;
pub use self::error::{NetError, Result};
pub use self::feeder::Ray;
pub use self::layer::Layer;
pub use self::model::VariationalModel;
pub use self::network::FeedForwardNetwork;
pub use self::unit::{Unit, UnitKind, UnitRef};
