//! Fixed-topology networks specialized at compile time.
//!
//! Widths, weight counts and the enabled derivative orders are const
//! generics of [`StaticLayer`], so every buffer is a plain array and
//! disabled orders have zero length. Whole networks are generated by
//! [`static_network!`](crate::static_network), which also computes the
//! per-layer weight offsets.
//!
//! For the same topology, betas and input, a static network produces the
//! same outputs and derivatives as a [`FeedForwardNetwork`](crate::FeedForwardNetwork)
//! built from identical layers.

mod layer;
mod macros;

pub use self::layer::{Source, StaticLayer};

#[doc(hidden)]
pub use rand::Rng;
