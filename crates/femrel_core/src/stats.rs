//! Standard normal kernels
//!
//! `normal_cdf` follows West's double precision rendition of Hart's algorithm
//! (absolute error around 1e-14), which keeps failure probabilities of order
//! 1e-10 meaningful. `normal_ppf` is Acklam's rational approximation polished
//! with a single Halley step against `normal_cdf`.

use std::f64::consts::PI;

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Standard normal density φ(z)
#[inline]
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / SQRT_2PI
}

/// Normal density with the given mean and standard deviation
#[inline]
pub fn normal_pdf_with(x: f64, mean: f64, std: f64) -> f64 {
    normal_pdf((x - mean) / std) / std
}

/// Standard normal cumulative distribution Φ(z)
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    let x = z.abs();
    let tail = if x > 37.0 {
        0.0
    } else {
        let e = (-0.5 * x * x).exp();
        if x < 7.071_067_811_865_47 {
            let mut n = 3.526_249_659_989_11e-2 * x + 0.700_383_064_443_688;
            n = n * x + 6.373_962_203_531_65;
            n = n * x + 33.912_866_078_383;
            n = n * x + 112.079_291_497_871;
            n = n * x + 221.213_596_169_931;
            n = n * x + 220.206_867_912_376;

            let mut d = 8.838_834_764_831_84e-2 * x + 1.755_667_163_182_64;
            d = d * x + 16.064_177_579_207;
            d = d * x + 86.780_732_202_946_1;
            d = d * x + 296.564_248_779_674;
            d = d * x + 637.333_633_378_831;
            d = d * x + 793.826_512_519_948;
            d = d * x + 440.413_735_824_752;

            e * n / d
        } else {
            let mut d = x + 0.65;
            d = x + 4.0 / d;
            d = x + 3.0 / d;
            d = x + 2.0 / d;
            d = x + 1.0 / d;
            e / d / SQRT_2PI
        }
    };

    if z > 0.0 { 1.0 - tail } else { tail }
}

// Acklam coefficients
const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const P_LOW: f64 = 0.02425;

fn tail_ratio(q: f64) -> f64 {
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

/// Inverse of the standard normal cumulative distribution Φ⁻¹(p)
///
/// Returns `-inf` for `p <= 0`, `+inf` for `p >= 1` and NaN for NaN input.
pub fn normal_ppf(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let x = if p < P_LOW {
        tail_ratio((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail_ratio((-2.0 * (1.0 - p).ln()).sqrt())
    };

    // Halley refinement
    let e = normal_cdf(x) - p;
    let u = e * (2.0 * PI).sqrt() * (0.5 * x * x).exp();
    x - u / (1.0 + 0.5 * x * u)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-15);
        assert!((normal_cdf(1.0) - 0.841_344_746_068_542_9).abs() < 1e-13);
        assert!((normal_cdf(-3.0) - 1.349_898_031_630_094_6e-3).abs() < 1e-15);
        assert_eq!(normal_cdf(-40.0), 0.0);
        assert_eq!(normal_cdf(40.0), 1.0);
    }

    #[test]
    fn test_cdf_far_tail() {
        let tails = [
            (-5.0, 2.866_515_718_791_946e-7),
            (-6.0, 9.865_876_450_377_012e-10),
            (-7.0, 1.279_812_543_885_835e-12),
            (-8.0, 6.220_960_574_271_819e-16),
        ];
        for (z, expected) in tails {
            let got = normal_cdf(z);
            assert!((got - expected).abs() < 1e-14, "z={z}, got {got}");
            assert!((got - expected).abs() / expected < 1e-8, "z={z}, got {got}");
        }
        assert!((normal_ppf(1e-9) + 5.997_807_015_007_686).abs() < 1e-6);
    }

    #[test]
    fn test_ppf_reference_values() {
        assert!((normal_ppf(0.975) - 1.959_963_984_540_054).abs() < 1e-12);
        assert!((normal_ppf(0.5)).abs() < 1e-14);
        assert!((normal_ppf(1e-5) + 4.264_890_793_922_825).abs() < 1e-9);
        assert_eq!(normal_ppf(0.0), f64::NEG_INFINITY);
        assert_eq!(normal_ppf(1.0), f64::INFINITY);
    }

    #[test]
    fn test_ppf_inverts_cdf() {
        for z in [-7.5, -4.0, -2.2, -0.3, 0.0, 0.8, 2.5, 5.0] {
            let back = normal_ppf(normal_cdf(z));
            assert!((back - z).abs() < 1e-7, "z={z}, got {back}");
        }
    }

    #[test]
    fn test_pdf_with_scales() {
        let direct = normal_pdf_with(12.0, 10.0, 2.0);
        assert!((direct - normal_pdf(1.0) / 2.0).abs() < 1e-15);
    }
}
