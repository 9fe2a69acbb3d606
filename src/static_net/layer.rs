use rand::Rng;

use crate::actf::ActivationFunction;
use crate::deriv::DerivFlags;
use crate::feeder::init_bound;

/// Read-only view of a layer's outputs, handed to the next layer.
///
/// The length of `out` is part of the type, so chaining a layer onto a
/// source of the wrong width does not compile.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a, const N: usize> {
    out: &'a [f64; N],
    d1: &'a [f64],
    d2: &'a [f64],
    vd1: &'a [f64],
    c1: &'a [f64],
    c2: &'a [f64],
    n_input: usize,
    nvp: usize,
    is_input: bool,
}

impl<'a, const N: usize> Source<'a, N> {
    /// The network input: derivatives w.r.t. itself are the identity and it
    /// depends on no weight.
    pub fn input(x: &'a [f64; N]) -> Self {
        Self {
            out: x,
            d1: &[],
            d2: &[],
            vd1: &[],
            c1: &[],
            c2: &[],
            n_input: N,
            nvp: 0,
            is_input: true,
        }
    }

    pub fn values(&self) -> &'a [f64; N] {
        self.out
    }

    pub fn output(&self, j: usize) -> f64 {
        self.out[j]
    }

    pub fn first_derivative(&self, j: usize, k: usize) -> f64 {
        if self.is_input {
            return if j == k { 1.0 } else { 0.0 };
        }
        self.d1[j * self.n_input + k]
    }

    pub fn second_derivative(&self, j: usize, k: usize) -> f64 {
        if self.is_input {
            return 0.0;
        }
        self.d2[j * self.n_input + k]
    }

    pub fn variational_first_derivative(&self, j: usize, i: usize) -> f64 {
        if self.is_input {
            return 0.0;
        }
        self.vd1[j * self.nvp + i]
    }

    pub fn cross_first_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        if self.is_input {
            return 0.0;
        }
        self.c1[(j * self.n_input + k) * self.nvp + i]
    }

    pub fn cross_second_derivative(&self, j: usize, k: usize, i: usize) -> f64 {
        if self.is_input {
            return 0.0;
        }
        self.c2[(j * self.n_input + k) * self.nvp + i]
    }
}

/// A fully connected layer with every size fixed at compile time.
///
/// - `NET_IN`: inputs of the whole network
/// - `IN`, `OUT`: width of the source and of this layer
/// - `NBETA`: `OUT * (IN + 1)`, bias first for each unit
/// - `NVP`: weight ids up to and including this layer
/// - `ND1`, `ND2`: `OUT * NET_IN` when enabled, else 0
/// - `NVD1`: `OUT * NVP` when enabled, else 0
/// - `NC1`, `NC2`: `OUT * NET_IN * NVP` when enabled, else 0
///
/// A disabled order has a zero-length buffer and its loops are skipped on
/// a constant, so it costs neither memory nor time.
#[derive(Debug, Clone)]
pub struct StaticLayer<
    A,
    const NET_IN: usize,
    const IN: usize,
    const OUT: usize,
    const NBETA: usize,
    const NVP: usize,
    const ND1: usize,
    const ND2: usize,
    const NVD1: usize,
    const NC1: usize,
    const NC2: usize,
> {
    actf: A,
    betas: [f64; NBETA],
    out: [f64; OUT],
    d1: [f64; ND1],
    d2: [f64; ND2],
    vd1: [f64; NVD1],
    c1: [f64; NC1],
    c2: [f64; NC2],
}

impl<
    A: ActivationFunction + Copy + Default,
    const NET_IN: usize,
    const IN: usize,
    const OUT: usize,
    const NBETA: usize,
    const NVP: usize,
    const ND1: usize,
    const ND2: usize,
    const NVD1: usize,
    const NC1: usize,
    const NC2: usize,
> StaticLayer<A, NET_IN, IN, OUT, NBETA, NVP, ND1, ND2, NVD1, NC1, NC2>
{
    /// Derivative orders this layer has storage for.
    pub const FLAGS: DerivFlags = DerivFlags::new(ND1 > 0, ND2 > 0, NVD1 > 0, NC1 > 0, NC2 > 0);

    /// Weight ids of all layers before this one.
    pub const NVP_IN: usize = NVP - NBETA;

    /// A layer with all betas at zero.
    pub fn new() -> Self {
        const {
            assert!(IN > 0 && OUT > 0 && NET_IN > 0, "layers must not be empty");
            assert!(NBETA == OUT * (IN + 1), "NBETA must be OUT * (IN + 1)");
            assert!(NVP >= NBETA, "NVP counts this layer's betas");
            assert!(ND1 == 0 || ND1 == OUT * NET_IN, "ND1 must be 0 or OUT * NET_IN");
            assert!(ND2 == 0 || (ND2 == OUT * NET_IN && ND1 > 0), "ND2 needs ND1");
            assert!(NVD1 == 0 || NVD1 == OUT * NVP, "NVD1 must be 0 or OUT * NVP");
            assert!(
                NC1 == 0 || (NC1 == OUT * NET_IN * NVP && ND1 > 0 && NVD1 > 0),
                "NC1 needs ND1 and NVD1"
            );
            assert!(
                NC2 == 0 || (NC2 == OUT * NET_IN * NVP && NC1 > 0 && ND2 > 0),
                "NC2 needs NC1 and ND2"
            );
        }
        Self {
            actf: A::default(),
            betas: [0.0; NBETA],
            out: [0.0; OUT],
            d1: [0.0; ND1],
            d2: [0.0; ND2],
            vd1: [0.0; NVD1],
            c1: [0.0; NC1],
            c2: [0.0; NC2],
        }
    }

    pub const fn n_beta(&self) -> usize {
        NBETA
    }

    pub fn betas(&self) -> &[f64; NBETA] {
        &self.betas
    }

    pub fn betas_mut(&mut self) -> &mut [f64; NBETA] {
        &mut self.betas
    }

    /// Draws every beta from `U[-4/sqrt(IN+1), 4/sqrt(IN+1)]`, unit by unit.
    pub fn randomize_betas<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let bound = init_bound(IN + 1);
        for b in &mut self.betas {
            *b = rng.random_range(-bound..=bound);
        }
    }

    pub fn source(&self) -> Source<'_, OUT> {
        Source {
            out: &self.out,
            d1: &self.d1,
            d2: &self.d2,
            vd1: &self.vd1,
            c1: &self.c1,
            c2: &self.c2,
            n_input: NET_IN,
            nvp: NVP,
            is_input: false,
        }
    }

    /// Computes values and every order in `FLAGS` that `mask` leaves on.
    pub fn compute(&mut self, src: &Source<'_, IN>, mask: DerivFlags) {
        let flags = Self::FLAGS.intersect(mask).restricted();
        let nvp_in = Self::NVP_IN;
        debug_assert_eq!(src.nvp, nvp_in, "source carries a different weight count");
        debug_assert!(!src.is_input || IN == NET_IN);

        let mut pk = [0.0; NET_IN];
        let mut pkk = [0.0; NET_IN];
        let mut pw = [0.0; NVP];

        for u in 0..OUT {
            let b = &self.betas[u * (IN + 1)..(u + 1) * (IN + 1)];
            let own = nvp_in + u * (IN + 1);

            let mut p = 0.0;
            p += b[0] * 1.0;
            for i in 0..IN {
                p += b[1 + i] * src.out[i];
            }
            self.out[u] = self.actf.f(p);
            if !flags.any() {
                continue;
            }

            let f1 = self.actf.f1d(p);
            let f2 = if flags.d2 || flags.c1 { self.actf.f2d(p) } else { 0.0 };
            let f3 = if flags.c2 { self.actf.f3d(p) } else { 0.0 };

            if flags.d1 {
                for k in 0..NET_IN {
                    let mut acc = 0.0;
                    for i in 0..IN {
                        acc += b[1 + i] * src.first_derivative(i, k);
                    }
                    pk[k] = acc;
                    self.d1[u * NET_IN + k] = f1 * pk[k];
                }
            }

            if flags.d2 {
                for k in 0..NET_IN {
                    let mut acc = 0.0;
                    for i in 0..IN {
                        acc += b[1 + i] * src.second_derivative(i, k);
                    }
                    pkk[k] = acc;
                    self.d2[u * NET_IN + k] = f2 * pk[k] * pk[k] + f1 * pkk[k];
                }
            }

            if flags.vd1 {
                let row = &mut self.vd1[u * NVP..(u + 1) * NVP];
                row.fill(0.0);
                for j in 0..nvp_in {
                    let mut acc = 0.0;
                    for i in 0..IN {
                        acc += b[1 + i] * src.variational_first_derivative(i, j);
                    }
                    pw[j] = acc;
                    row[j] = f1 * pw[j];
                }
                pw[own] = 1.0;
                row[own] = f1 * pw[own];
                for m in 1..=IN {
                    pw[own + m] = src.out[m - 1];
                    row[own + m] = f1 * pw[own + m];
                }
            }

            if flags.c1 {
                for k in 0..NET_IN {
                    let base = (u * NET_IN + k) * NVP;
                    self.c1[base..base + NVP].fill(0.0);
                    if flags.c2 {
                        self.c2[base..base + NVP].fill(0.0);
                    }

                    let upstream = (0..nvp_in).map(|j| (j, None));
                    let owned = (0..=IN).map(|m| (own + m, Some(m)));
                    for (j, m) in upstream.chain(owned) {
                        let (pkw, pkkw) = match m {
                            Some(0) => (0.0, 0.0),
                            Some(m) => (
                                src.first_derivative(m - 1, k),
                                src.second_derivative(m - 1, k),
                            ),
                            None => {
                                let mut a1 = 0.0;
                                let mut a2 = 0.0;
                                for i in 0..IN {
                                    a1 += b[1 + i] * src.cross_first_derivative(i, k, j);
                                    if flags.c2 {
                                        a2 += b[1 + i] * src.cross_second_derivative(i, k, j);
                                    }
                                }
                                (a1, a2)
                            }
                        };

                        self.c1[base + j] = f2 * pk[k] * pw[j] + f1 * pkw;
                        if flags.c2 {
                            self.c2[base + j] = f3 * pw[j] * pk[k] * pk[k]
                                + 2.0 * f2 * pk[k] * pkw
                                + f2 * pw[j] * pkk[k]
                                + f1 * pkkw;
                        }
                    }
                }
            }
        }
    }
}

impl<
    A: ActivationFunction + Copy + Default,
    const NET_IN: usize,
    const IN: usize,
    const OUT: usize,
    const NBETA: usize,
    const NVP: usize,
    const ND1: usize,
    const ND2: usize,
    const NVD1: usize,
    const NC1: usize,
    const NC2: usize,
> Default for StaticLayer<A, NET_IN, IN, OUT, NBETA, NVP, ND1, ND2, NVD1, NC1, NC2>
{
    fn default() -> Self {
        Self::new()
    }
}
