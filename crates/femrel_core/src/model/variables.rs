//! Named variable registry shared by FORM and Monte Carlo

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::distribution::{Distribution, VariableKind};
use super::nataf::adjusted_correlation;
use crate::error::VariableError;
use crate::linalg::Matrix;

/// A random variable and its distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomVariable {
    pub name: String,
    pub distribution: Distribution,
}

/// A deterministic variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: f64,
}

/// Normalise a user supplied name: trimmed and lowercase.
pub fn normalize_name(name: &str) -> Result<String, VariableError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(VariableError::EmptyName);
    }
    Ok(name)
}

/// Ordered set of random variables, constants and their correlations.
///
/// Random variables come first in declaration order, then constants. That
/// order fixes the rows of every matrix built from the set.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    random: Vec<RandomVariable>,
    constants: Vec<Constant>,
    correlations: FxHashMap<(String, String), f64>,
}

impl VariableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable from a distribution name. `mean` is the value of a
    /// constant. When both `std` and `cv` are given, `cv` wins.
    pub fn create(
        &mut self,
        name: &str,
        distribution: &str,
        mean: f64,
        std: f64,
        cv: Option<f64>,
    ) -> Result<(), VariableError> {
        let name = normalize_name(name)?;
        match VariableKind::parse(distribution) {
            Some(VariableKind::Random(kind)) => {
                let dist = Distribution::new(&name, kind, mean, std, cv)?;
                self.insert_random(name, dist);
                Ok(())
            }
            Some(VariableKind::Constant) => {
                self.insert_constant(name, mean);
                Ok(())
            }
            None => Err(VariableError::UnknownDistribution {
                name,
                distribution: distribution.to_string(),
            }),
        }
    }

    pub fn add_random(&mut self, name: &str, distribution: Distribution) -> Result<(), VariableError> {
        let name = normalize_name(name)?;
        self.insert_random(name, distribution);
        Ok(())
    }

    pub fn add_constant(&mut self, name: &str, value: f64) -> Result<(), VariableError> {
        let name = normalize_name(name)?;
        self.insert_constant(name, value);
        Ok(())
    }

    fn insert_random(&mut self, name: String, distribution: Distribution) {
        self.constants.retain(|c| c.name != name);
        tracing::info!(
            "Variable \"{name}\" defined as {} with mean={}, std={}, cv={}",
            distribution.kind,
            distribution.mean,
            distribution.std,
            distribution.cv
        );
        match self.random.iter_mut().find(|v| v.name == name) {
            Some(existing) => existing.distribution = distribution,
            None => self.random.push(RandomVariable { name, distribution }),
        }
    }

    fn insert_constant(&mut self, name: String, value: f64) {
        if self.random.iter().any(|v| v.name == name) {
            self.random.retain(|v| v.name != name);
            self.correlations
                .retain(|(a, b), _| *a != name && *b != name);
        }
        tracing::info!("Variable \"{name}\" defined as constant with value={value}");
        match self.constants.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value,
            None => self.constants.push(Constant { name, value }),
        }
    }

    /// Set the correlation between two random variables, stored symmetrically.
    pub fn set_correlation(&mut self, a: &str, b: &str, rho: f64) -> Result<(), VariableError> {
        let a = normalize_name(a)?;
        let b = normalize_name(b)?;
        for name in [&a, &b] {
            if self.random_index(name).is_none() {
                return Err(if self.constant_value(name).is_some() {
                    VariableError::NotRandom(name.clone())
                } else {
                    VariableError::NotDeclared(name.clone())
                });
            }
        }
        if a == b {
            return Err(VariableError::SelfCorrelation(a));
        }
        if !(-1.0..=1.0).contains(&rho) {
            return Err(VariableError::CorrelationOutOfRange {
                first: a,
                second: b,
                value: rho,
            });
        }

        tracing::info!("Correlation between \"{a}\" and \"{b}\" set as {rho}");
        self.correlations.insert(Self::pair_key(&a, &b), rho);
        Ok(())
    }

    fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Declared correlation between two variables (1 for a variable with itself)
    pub fn correlation(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        self.correlations
            .get(&Self::pair_key(a, b))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn has_correlations(&self) -> bool {
        self.correlations.values().any(|rho| *rho != 0.0)
    }

    pub fn random(&self) -> &[RandomVariable] {
        &self.random
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn random_index(&self, name: &str) -> Option<usize> {
        self.random.iter().position(|v| v.name == name)
    }

    pub fn constant_value(&self, name: &str) -> Option<f64> {
        self.constants
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.random_index(name).is_some() || self.constant_value(name).is_some()
    }

    /// All names: random variables first, then constants
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.random
            .iter()
            .map(|v| v.name.as_str())
            .chain(self.constants.iter().map(|c| c.name.as_str()))
    }

    /// Nataf-adjusted correlation matrix over the random variables
    pub fn correlation_matrix(&self) -> Matrix {
        let n = self.random.len();
        let mut matrix = Matrix::identity(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.random[i], &self.random[j]);
                let rho = self.correlation(&a.name, &b.name);
                if rho != 0.0 {
                    let adjusted = adjusted_correlation(&a.distribution, &b.distribution, rho);
                    matrix[(i, j)] = adjusted;
                    matrix[(j, i)] = adjusted;
                }
            }
        }
        matrix
    }
}
