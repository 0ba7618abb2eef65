//! Kaiser-windowed sinc interpolation kernel
//!
//! The kernel is precomputed into a lookup table over its finite support and
//! read back with linear interpolation; this is the inner loop of the
//! fractional-delay pulse renderer, so evaluation has to be cheap.

use super::filters::sinc;

const TABLE_SIZE: usize = 30000;
const KAISER_BETA: f64 = 16.0;

/// Zeroth-order modified Bessel function of the first kind.
/// Polynomial approximation from Abramowitz and Stegun section 9.8,
/// error bounded below 2e-7.
fn bessel_i0(x: f64) -> f64 {
    let t = x / 3.75;
    if t <= 1.0 {
        let t2 = t * t;
        1.0 + t2
            * (3.5156229
                + t2 * (3.0899424 + t2 * (1.2067492 + t2 * (0.2659732 + t2 * (0.0360768 + t2 * 0.0045813)))))
    } else {
        let i0 = 0.39894228
            + t.recip()
                * (0.01328592
                    + t.recip()
                        * (0.00225319
                            + t.recip()
                                * (-0.00157565
                                    + t.recip()
                                        * (0.00916281
                                            + t.recip()
                                                * (-0.02057706
                                                    + t.recip()
                                                        * (0.02635537
                                                            + t.recip()
                                                                * (-0.01647633
                                                                    + t.recip() * 0.00392377)))))));
        i0 * x.exp() / x.sqrt()
    }
}

/// Precomputed Kaiser-windowed sinc kernel with support [-alpha, alpha]
/// where alpha is half the render filter length
#[derive(Debug, Clone)]
pub struct InterpFilter {
    alpha: f64,
    filter_length: usize,
    table: Vec<f64>,
    index_scale: f64,
}

impl InterpFilter {
    pub fn new(filter_length: usize) -> Self {
        let alpha = (filter_length as f64 / 2.0).floor();
        let bessel_beta = bessel_i0(KAISER_BETA);
        let mut table = Vec::with_capacity(TABLE_SIZE + 1);
        for i in 0..TABLE_SIZE {
            let x = (i as f64 / TABLE_SIZE as f64) * alpha * 2.0 - alpha;
            table.push(Self::compute(x, alpha, bessel_beta));
        }
        // Final entry simplifies the offset arithmetic in value().
        table.push(0.0);
        Self {
            alpha,
            filter_length,
            table,
            index_scale: TABLE_SIZE as f64 / (2.0 * alpha),
        }
    }

    /// Half the filter length
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Tap count of the render kernel
    pub fn filter_length(&self) -> usize {
        self.filter_length
    }

    fn compute(x: f64, alpha: f64, bessel_beta: f64) -> f64 {
        let w = x + alpha;
        let window = if !(0.0..=alpha * 2.0).contains(&w) {
            0.0
        } else {
            bessel_i0(KAISER_BETA * (1.0 - ((w - alpha) / alpha).powi(2)).max(0.0).sqrt()) / bessel_beta
        };
        window * sinc(x)
    }

    /// Kernel value at offset x, looked up with linear interpolation
    pub fn value(&self, x: f64) -> f64 {
        if x.abs() > self.alpha {
            return 0.0;
        }
        let wx = (x + self.alpha) * self.index_scale;
        let offset = (wx as usize).min(TABLE_SIZE - 1);
        let weight = wx - offset as f64;
        self.table[offset] * (1.0 - weight) + self.table[offset + 1] * weight
    }
}
