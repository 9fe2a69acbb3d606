#[macro_export]
/// Defines a fixed-topology network from a layer description.
///
/// # Descriptors
///
/// The macro takes the derivative orders to compile in, the name of the
/// network (plus the name of a helper module holding its constants), and
/// the layer description:
///
/// ```text
/// @derivs { d1: [bool], d2: [bool], vd1: [bool], c1: [bool], c2: [bool] }
/// @network [vis] [Name]([helper_module])
/// {
///   InputLayer([n]) - width of the network input
///   {
///     [name] : Layer([in] => [out], [activation]),
///     ...
///   },
///   OutputLayer([n]) - width of the network output
/// }
/// ```
///
/// Each hidden layer is fully connected to the previous one with a bias.
/// The activation is any unit type from [`crate::actf`]. Orders switched off
/// in `@derivs` get zero-length buffers. Widths must chain from the input
/// layer to the output layer, which is checked at compile time.
///
/// Weight ids follow the dynamic network: layer by layer, unit by unit,
/// bias first.
///
/// # Example
///
/// ```rust
/// varnet::static_network!(
///     @derivs { d1: true, d2: false, vd1: true, c1: false, c2: false }
///     @network pub SmallNet(small_net)
///     {
///         InputLayer(2),
///         {
///             hidden: Layer(2 => 4, Logistic),
///             out: Layer(4 => 2, Logistic),
///         },
///         OutputLayer(2),
///     }
/// );
///
/// assert_eq!(SmallNet::N_BETA, 22);
/// assert_eq!(SmallNet::SHAPE, [2, 4, 2]);
/// assert_eq!(SmallNet::BETA_SHAPE, [12, 10]);
///
/// let mut net = SmallNet::new();
/// net.set_input_array([0.5, -1.0]);
/// net.ff_propagate();
/// assert_eq!(net.output(0), 0.5); // all betas start at zero
/// ```
///
/// # Generated API
///
/// - constants `N_LAYER`, `N_INPUT`, `N_OUTPUT`, `N_UNIT`, `N_LINK`,
///   `N_BETA` and `DERIVS`
/// - per-layer shapes `SHAPE` (input layer first), `BETA_SHAPE` and
///   `LINK_SHAPE`
/// - `new`, `randomize_betas`, `set_derivative_mask`, `derivatives`
/// - `get_beta`, `set_beta`, `get_betas`, `set_betas`
/// - `set_input`, `set_input_array`, `ff_propagate`, `output_source` and
///   the derivative readers
/// - an implementation of [`VariationalModel`](crate::model::VariationalModel)
macro_rules! static_network {
    (
        @derivs { d1: $d1:literal, d2: $d2:literal, vd1: $vd1:literal, c1: $c1:literal, c2: $c2:literal $(,)? }
        @network $vis:vis $name:ident($mod:ident)
        {
            InputLayer($in:literal),
            {
                $( $field:ident : Layer($lin:literal => $lout:literal, $act:ident) ),+ $(,)?
            },
            OutputLayer($out:literal) $(,)?
        }
    ) => {
        #[allow(non_camel_case_types, non_upper_case_globals, dead_code)]
        mod $mod {
            pub(super) const N_INPUT: usize = $in;
            pub(super) const N_OUTPUT: usize = $out;
            pub(super) const N_LAYER: usize = [$($lout),+].len();

            const LAYER_IN: [usize; N_LAYER] = [$($lin),+];
            const LAYER_OUT: [usize; N_LAYER] = [$($lout),+];

            enum LayerIndex {
                $($field),+
            }

            const fn sum_through(upto: usize, with_bias: bool, per_input: bool) -> usize {
                let mut sum = 0;
                let mut i = 0;
                while i <= upto {
                    let fan_in = if per_input { LAYER_IN[i] + with_bias as usize } else { 1 };
                    sum += LAYER_OUT[i] * fan_in;
                    i += 1;
                }
                sum
            }

            pub(super) struct Nvp;

            impl Nvp {
                $(
                    pub(super) const $field: usize = sum_through(LayerIndex::$field as usize, true, true);
                )+
            }

            pub(super) const N_BETA: usize = sum_through(N_LAYER - 1, true, true);
            pub(super) const N_LINK: usize = sum_through(N_LAYER - 1, false, true);
            pub(super) const N_UNIT: usize = sum_through(N_LAYER - 1, false, false);

            /// Unit counts, input layer first, offset units excluded.
            pub(super) const SHAPE: [usize; N_LAYER + 1] = {
                let mut shape = [N_INPUT; N_LAYER + 1];
                let mut i = 0;
                while i < N_LAYER {
                    shape[i + 1] = LAYER_OUT[i];
                    i += 1;
                }
                shape
            };

            pub(super) const BETA_SHAPE: [usize; N_LAYER] = {
                let mut shape = [0; N_LAYER];
                let mut i = 0;
                while i < N_LAYER {
                    shape[i] = LAYER_OUT[i] * (LAYER_IN[i] + 1);
                    i += 1;
                }
                shape
            };

            pub(super) const LINK_SHAPE: [usize; N_LAYER] = {
                let mut shape = [0; N_LAYER];
                let mut i = 0;
                while i < N_LAYER {
                    shape[i] = LAYER_OUT[i] * LAYER_IN[i];
                    i += 1;
                }
                shape
            };

            pub(super) const CHAINED: bool = {
                let mut ok = LAYER_IN[0] == N_INPUT && LAYER_OUT[N_LAYER - 1] == N_OUTPUT;
                let mut i = 1;
                while i < N_LAYER {
                    ok = ok && LAYER_IN[i] == LAYER_OUT[i - 1];
                    i += 1;
                }
                ok
            };
        }

        #[derive(Debug, Clone)]
        $vis struct $name {
            input: [f64; $in],
            mask: $crate::deriv::DerivFlags,
            $(
                $field: $crate::static_net::StaticLayer<
                    $crate::actf::$act,
                    { $mod::N_INPUT },
                    $lin,
                    $lout,
                    { $lout * ($lin + 1) },
                    { $mod::Nvp::$field },
                    { if $d1 { $lout * $mod::N_INPUT } else { 0 } },
                    { if $d2 { $lout * $mod::N_INPUT } else { 0 } },
                    { if $vd1 { $lout * $mod::Nvp::$field } else { 0 } },
                    { if $c1 { $lout * $mod::N_INPUT * $mod::Nvp::$field } else { 0 } },
                    { if $c2 { $lout * $mod::N_INPUT * $mod::Nvp::$field } else { 0 } },
                >,
            )+
        }

        #[allow(dead_code)]
        impl $name {
            pub const N_LAYER: usize = $mod::N_LAYER;
            pub const N_INPUT: usize = $mod::N_INPUT;
            pub const N_OUTPUT: usize = $mod::N_OUTPUT;
            pub const N_UNIT: usize = $mod::N_UNIT;
            pub const N_LINK: usize = $mod::N_LINK;
            pub const N_BETA: usize = $mod::N_BETA;
            pub const SHAPE: [usize; $mod::N_LAYER + 1] = $mod::SHAPE;
            /// Betas per layer, biases included.
            pub const BETA_SHAPE: [usize; $mod::N_LAYER] = $mod::BETA_SHAPE;
            pub const LINK_SHAPE: [usize; $mod::N_LAYER] = $mod::LINK_SHAPE;
            pub const DERIVS: $crate::deriv::DerivFlags =
                $crate::deriv::DerivFlags::new($d1, $d2, $vd1, $c1, $c2);

            /// All betas zero, every compiled-in order enabled.
            pub fn new() -> Self {
                const {
                    ::core::assert!($mod::CHAINED, "layer widths must chain from InputLayer to OutputLayer");
                }
                Self {
                    input: [0.0; $in],
                    mask: Self::DERIVS,
                    $(
                        $field: $crate::static_net::StaticLayer::new(),
                    )+
                }
            }

            pub fn randomize_betas<R: $crate::static_net::Rng + ?Sized>(&mut self, rng: &mut R) {
                $(
                    self.$field.randomize_betas(rng);
                )+
            }

            /// Switches compiled-in orders off (or back on) at runtime.
            pub fn set_derivative_mask(&mut self, mask: $crate::deriv::DerivFlags) {
                self.mask = mask;
            }

            pub fn derivatives(&self) -> $crate::deriv::DerivFlags {
                Self::DERIVS.intersect(self.mask).restricted()
            }

            #[allow(unused_assignments)]
            pub fn get_beta(&self, id: usize) -> ::core::option::Option<f64> {
                let mut offset = 0;
                $(
                    if id < offset + self.$field.n_beta() {
                        return ::core::option::Option::Some(self.$field.betas()[id - offset]);
                    }
                    offset += self.$field.n_beta();
                )+
                ::core::option::Option::None
            }

            #[allow(unused_assignments)]
            pub fn set_beta(&mut self, id: usize, v: f64) -> bool {
                let mut offset = 0;
                $(
                    if id < offset + self.$field.n_beta() {
                        self.$field.betas_mut()[id - offset] = v;
                        return true;
                    }
                    offset += self.$field.n_beta();
                )+
                false
            }

            /// Fills `out` with the betas of ids `[0, out.len())`.
            pub fn get_betas(&self, out: &mut [f64]) -> $crate::error::Result<()> {
                if out.len() > Self::N_BETA {
                    return ::core::result::Result::Err($crate::error::NetError::DimensionMismatch {
                        expected: Self::N_BETA,
                        actual: out.len(),
                    });
                }
                for (id, slot) in out.iter_mut().enumerate() {
                    *slot = self.get_beta(id).unwrap_or_default();
                }
                ::core::result::Result::Ok(())
            }

            pub fn set_betas(&mut self, values: &[f64]) -> $crate::error::Result<()> {
                if values.len() > Self::N_BETA {
                    return ::core::result::Result::Err($crate::error::NetError::DimensionMismatch {
                        expected: Self::N_BETA,
                        actual: values.len(),
                    });
                }
                for (id, &v) in values.iter().enumerate() {
                    self.set_beta(id, v);
                }
                ::core::result::Result::Ok(())
            }

            pub fn set_input_array(&mut self, x: [f64; $in]) {
                self.input = x;
            }

            pub fn set_input(&mut self, x: &[f64]) -> $crate::error::Result<()> {
                if x.len() != $in {
                    return ::core::result::Result::Err($crate::error::NetError::DimensionMismatch {
                        expected: $in,
                        actual: x.len(),
                    });
                }
                self.input.copy_from_slice(x);
                ::core::result::Result::Ok(())
            }

            pub fn ff_propagate(&mut self) {
                let mask = self.mask;
                let src = $crate::static_net::Source::input(&self.input);
                // each layer reads the one before it
                $(
                    self.$field.compute(&src, mask);
                    let src = self.$field.source();
                )+
                let _ = src;
            }

            #[allow(unused_variables)]
            pub fn output_source(&self) -> $crate::static_net::Source<'_, $out> {
                let src = $crate::static_net::Source::input(&self.input);
                $(
                    let src = self.$field.source();
                )+
                src
            }

            pub fn output(&self, j: usize) -> f64 {
                self.output_source().output(j)
            }

            pub fn first_derivative(&self, j: usize, k: usize) -> f64 {
                self.output_source().first_derivative(j, k)
            }

            pub fn second_derivative(&self, j: usize, k: usize) -> f64 {
                self.output_source().second_derivative(j, k)
            }

            pub fn variational_first_derivative(&self, j: usize, i: usize) -> f64 {
                self.output_source().variational_first_derivative(j, i)
            }

            pub fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
                self.output_source().cross_first_derivative(j, k, i)
            }

            pub fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
                self.output_source().cross_second_derivative(j, k, i)
            }
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::model::VariationalModel for $name {
            fn n_input(&self) -> usize {
                $in
            }

            fn n_output(&self) -> usize {
                $out
            }

            fn n_vp(&self) -> usize {
                Self::N_BETA
            }

            fn derivatives(&self) -> $crate::deriv::DerivFlags {
                $name::derivatives(self)
            }

            fn get_beta(&self, id: usize) -> ::core::option::Option<f64> {
                $name::get_beta(self, id)
            }

            fn set_beta(&mut self, id: usize, v: f64) -> bool {
                $name::set_beta(self, id, v)
            }

            fn set_betas(&mut self, values: &[f64]) -> $crate::error::Result<()> {
                $name::set_betas(self, values)
            }

            fn set_input(&mut self, x: &[f64]) -> $crate::error::Result<()> {
                $name::set_input(self, x)
            }

            fn ff_propagate(&mut self) {
                $name::ff_propagate(self);
            }

            fn output(&self, j: usize) -> f64 {
                $name::output(self, j)
            }

            fn first_derivative(&self, j: usize, k: usize) -> f64 {
                $name::first_derivative(self, j, k)
            }

            fn second_derivative(&self, j: usize, k: usize) -> f64 {
                $name::second_derivative(self, j, k)
            }

            fn variational_first_derivative(&self, j: usize, i: usize) -> f64 {
                $name::variational_first_derivative(self, j, i)
            }

            fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
                $name::cross_first_derivative(self, j, k, i)
            }

            fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
                $name::cross_second_derivative(self, j, k, i)
            }
        }
    };
}
