//! The seam to the external symbolic algebra provider.
//!
//! Solving f(x) = 0 symbolically and differentiating f are delegated; the
//! engine only evaluates and reconciles what the provider returns.

use anyhow::Result;
use tracing::warn;

pub trait SymbolicProvider {
    /// Closed-form solutions of `expression = 0` for x, each an expression in r.
    fn solve_for_x(&self, expression: &str) -> Result<Vec<String>>;

    /// The derivative of `expression` with respect to `variable`.
    fn derivative(&self, expression: &str, variable: &str) -> Result<String>;

    /// Real solutions of `expression = 0` for x with r substituted by `r`.
    fn resolve_at(&self, expression: &str, r: f64) -> Result<Vec<f64>>;

    /// Re-solves at several parameter values in one call. The result holds one
    /// entry per requested value; a value that fails to resolve yields an
    /// empty solution list. Providers with a cheaper batched path override this.
    fn resolve_batch(&self, expression: &str, r_values: &[f64]) -> Result<Vec<Vec<f64>>> {
        Ok(r_values
            .iter()
            .map(|&r| {
                self.resolve_at(expression, r).unwrap_or_else(|err| {
                    warn!(r, error = %err, "Symbolic re-solve failed");
                    Vec::new()
                })
            })
            .collect())
    }
}

impl<P: SymbolicProvider + ?Sized> SymbolicProvider for &P {
    fn solve_for_x(&self, expression: &str) -> Result<Vec<String>> {
        (**self).solve_for_x(expression)
    }

    fn derivative(&self, expression: &str, variable: &str) -> Result<String> {
        (**self).derivative(expression, variable)
    }

    fn resolve_at(&self, expression: &str, r: f64) -> Result<Vec<f64>> {
        (**self).resolve_at(expression, r)
    }

    fn resolve_batch(&self, expression: &str, r_values: &[f64]) -> Result<Vec<Vec<f64>>> {
        (**self).resolve_batch(expression, r_values)
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolicProvider;
    use anyhow::{bail, Result};

    struct HalfBroken;

    impl SymbolicProvider for HalfBroken {
        fn solve_for_x(&self, _expression: &str) -> Result<Vec<String>> {
            Ok(vec!["r".to_string()])
        }

        fn derivative(&self, _expression: &str, _variable: &str) -> Result<String> {
            Ok("1".to_string())
        }

        fn resolve_at(&self, _expression: &str, r: f64) -> Result<Vec<f64>> {
            if r < 0.0 {
                bail!("no closed form below zero");
            }
            Ok(vec![r])
        }
    }

    #[test]
    fn default_batch_keeps_one_entry_per_value() {
        let solutions = HalfBroken
            .resolve_batch("x - r", &[1.0, -1.0, 2.0])
            .expect("batch never fails as a whole");
        assert_eq!(solutions, vec![vec![1.0], Vec::new(), vec![2.0]]);
    }

    #[test]
    fn references_forward_to_the_provider() {
        let provider = &HalfBroken;
        assert_eq!(provider.solve_for_x("x - r").expect("solves"), vec!["r"]);
        assert_eq!(provider.resolve_at("x - r", 3.0).expect("resolves"), vec![3.0]);
    }
}
