//! Probability distributions for random variables
//!
//! Every distribution is described by its mean and standard deviation, the
//! native parameters being derived from them. Lognormal parameters come from
//! the coefficient of variation, normal and Gumbel parameters from the
//! standard deviation, which matters when only the mean is moved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VariableError;
use crate::stats::{normal_cdf, normal_pdf, normal_ppf};

/// Euler-Mascheroni constant truncated the way Gumbel moments are usually tabulated
const EULER_GAMMA: f64 = 0.57721;

/// Supported distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Normal,
    LogNormal,
    Gumbel,
}

impl DistributionKind {
    /// Short name used in reports and CSV exports
    pub fn label(self) -> &'static str {
        match self {
            DistributionKind::Normal => "gauss",
            DistributionKind::LogNormal => "logn",
            DistributionKind::Gumbel => "gumbel",
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributionKind::Normal => "Gaussian",
            DistributionKind::LogNormal => "LogNormal",
            DistributionKind::Gumbel => "Gumbel",
        };
        write!(f, "{name}")
    }
}

/// Result of parsing a user supplied distribution name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Random(DistributionKind),
    Constant,
}

impl VariableKind {
    /// Parse a distribution name, accepting the usual aliases.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "gauss" | "gaus" | "gaussian" | "normal" | "norm" => {
                Some(Self::Random(DistributionKind::Normal))
            }
            "lognormal" | "logn" | "ln" | "log" | "lognorm" => {
                Some(Self::Random(DistributionKind::LogNormal))
            }
            "gumbel" | "gumb" | "type1" => Some(Self::Random(DistributionKind::Gumbel)),
            "constant" | "const" | "cons" | "c" => Some(Self::Constant),
            _ => None,
        }
    }
}

/// A distribution described by its first two moments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub kind: DistributionKind,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
}

impl Distribution {
    /// Build a distribution from a mean and either a standard deviation or a
    /// coefficient of variation. When `cv` is given it wins over `std`.
    pub fn new(
        name: &str,
        kind: DistributionKind,
        mean: f64,
        std: f64,
        cv: Option<f64>,
    ) -> Result<Self, VariableError> {
        let (std, cv) = match cv {
            Some(cv) => (cv * mean, cv),
            None if mean == 0.0 => (std, f64::INFINITY),
            None => (std, std / mean),
        };

        let invalid = |reason| VariableError::InvalidParameters {
            name: name.to_string(),
            kind,
            mean,
            std,
            reason,
        };

        if !mean.is_finite() {
            return Err(invalid("mean must be finite"));
        }
        if !(std.is_finite() && std > 0.0) {
            return Err(invalid("standard deviation must be positive"));
        }
        if kind == DistributionKind::LogNormal && mean <= 0.0 {
            return Err(invalid("lognormal mean must be positive"));
        }

        Ok(Self {
            kind,
            mean,
            std,
            cv,
        })
    }

    /// Shorthand for a normal distribution, mostly used in tests and examples
    pub fn normal(mean: f64, std: f64) -> Result<Self, VariableError> {
        Self::new("", DistributionKind::Normal, mean, std, None)
    }

    /// Same family and dispersion, centred on a new mean.
    #[must_use]
    pub fn with_mean(&self, mean: f64) -> Self {
        let mut moved = *self;
        moved.mean = mean;
        match self.kind {
            DistributionKind::LogNormal => moved.std = self.cv * mean,
            DistributionKind::Normal | DistributionKind::Gumbel => {
                moved.cv = if mean == 0.0 {
                    f64::INFINITY
                } else {
                    self.std / mean
                }
            }
        }
        moved
    }

    /// Lognormal (λ, ξ): mean and standard deviation of ln(X)
    fn lognormal_params(&self) -> (f64, f64) {
        let xi = (1.0 + self.cv * self.cv).ln().sqrt();
        let lambda = self.mean.ln() - 0.5 * xi * xi;
        (lambda, xi)
    }

    /// Gumbel (location, scale)
    fn gumbel_params(&self) -> (f64, f64) {
        let scale = 6.0_f64.sqrt() * self.std / std::f64::consts::PI;
        let loc = self.mean - EULER_GAMMA * scale;
        (loc, scale)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        match self.kind {
            DistributionKind::Normal => normal_pdf((x - self.mean) / self.std) / self.std,
            DistributionKind::LogNormal => {
                if x <= 0.0 {
                    return 0.0;
                }
                let (lambda, xi) = self.lognormal_params();
                normal_pdf((x.ln() - lambda) / xi) / (xi * x)
            }
            DistributionKind::Gumbel => {
                let (loc, scale) = self.gumbel_params();
                let t = (x - loc) / scale;
                (-(t + (-t).exp())).exp() / scale
            }
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match self.kind {
            DistributionKind::Normal => normal_cdf((x - self.mean) / self.std),
            DistributionKind::LogNormal => {
                if x <= 0.0 {
                    return 0.0;
                }
                let (lambda, xi) = self.lognormal_params();
                normal_cdf((x.ln() - lambda) / xi)
            }
            DistributionKind::Gumbel => {
                let (loc, scale) = self.gumbel_params();
                (-(-(x - loc) / scale).exp()).exp()
            }
        }
    }

    /// Map a standard normal value to this distribution, x = F⁻¹(Φ(z))
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        match self.kind {
            DistributionKind::Normal => self.mean + self.std * z,
            DistributionKind::LogNormal => {
                let (lambda, xi) = self.lognormal_params();
                (lambda + xi * z).exp()
            }
            DistributionKind::Gumbel => {
                let (loc, scale) = self.gumbel_params();
                loc - scale * (-normal_cdf(z).ln()).ln()
            }
        }
    }

    /// Map a value of this distribution to standard normal space, z = Φ⁻¹(F(x))
    pub fn to_standard_normal(&self, x: f64) -> f64 {
        match self.kind {
            DistributionKind::Normal => (x - self.mean) / self.std,
            DistributionKind::LogNormal => {
                let (lambda, xi) = self.lognormal_params();
                (x.ln() - lambda) / xi
            }
            DistributionKind::Gumbel => normal_ppf(self.cdf(x)),
        }
    }

    /// Equivalent normal (mean, std) at point `x` (Rackwitz-Fiessler).
    ///
    /// The equivalent normal matches this distribution's CDF and PDF at `x`.
    pub fn equivalent_normal(&self, x: f64) -> Result<(f64, f64), VariableError> {
        let outside = || VariableError::OutsideSupport {
            kind: self.kind,
            value: x,
        };

        match self.kind {
            DistributionKind::Normal => Ok((self.mean, self.std)),
            DistributionKind::LogNormal => {
                if x.is_nan() || x <= 0.0 {
                    return Err(outside());
                }
                let (lambda, xi) = self.lognormal_params();
                let std = x * xi;
                let mean = x * (1.0 - x.ln() + lambda);
                Ok((mean, std))
            }
            DistributionKind::Gumbel => {
                let z = normal_ppf(self.cdf(x));
                let density = self.pdf(x);
                if !z.is_finite() || density <= 0.0 {
                    return Err(outside());
                }
                let std = normal_pdf(z) / density;
                Ok((x - z * std, std))
            }
        }
    }
}
