use crate::autodiff::derivative_wrt_x;
use crate::evaluator::{Bindings, CompiledExpression, NonReal};
use crate::provider::SymbolicProvider;
use anyhow::{bail, Context, Result};
use tracing::warn;

/// Where ∂f/∂x comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivativeSource {
    /// The provider's symbolic derivative, compiled.
    Symbolic(CompiledExpression),
    /// Forward-mode differentiation of f itself.
    Automatic,
}

/// A parsed flow ẋ = f(x, t, r) with its root branches and derivative.
/// The branch count N is fixed once the model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationModel {
    flow: CompiledExpression,
    roots: Vec<CompiledExpression>,
    derivative: DerivativeSource,
}

impl EquationModel {
    pub fn new(
        flow: CompiledExpression,
        roots: Vec<CompiledExpression>,
        derivative: DerivativeSource,
    ) -> Result<Self> {
        for (k, root) in roots.iter().enumerate() {
            if root.depends_on("x") || root.depends_on("t") {
                bail!(
                    "Root branch {k} (\"{}\") must depend on r only.",
                    root.source()
                );
            }
        }
        Ok(Self {
            flow,
            roots,
            derivative,
        })
    }

    /// Builds the model from an expression string, asking the provider for
    /// the root branches and the derivative. If the provider cannot
    /// differentiate, the derivative falls back to automatic differentiation.
    pub fn from_provider<P: SymbolicProvider + ?Sized>(expression: &str, provider: &P) -> Result<Self> {
        let flow = CompiledExpression::compile(expression)?;

        let roots = provider
            .solve_for_x(expression)
            .with_context(|| format!("Failed to solve \"{expression}\" for x"))?
            .iter()
            .map(|root| CompiledExpression::compile(root))
            .collect::<Result<Vec<_>>>()
            .context("Failed to compile root expression")?;

        let derivative = match provider.derivative(expression, "x") {
            Ok(source) => DerivativeSource::Symbolic(
                CompiledExpression::compile(&source).context("Failed to compile derivative")?,
            ),
            Err(err) => {
                warn!(error = %err, "Symbolic derivative unavailable, using automatic differentiation");
                DerivativeSource::Automatic
            }
        };

        Self::new(flow, roots, derivative)
    }

    pub fn source(&self) -> &str {
        self.flow.source()
    }

    pub fn flow(&self) -> &CompiledExpression {
        &self.flow
    }

    pub fn roots(&self) -> &[CompiledExpression] {
        &self.roots
    }

    pub fn derivative(&self) -> &DerivativeSource {
        &self.derivative
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// f(x, r) at t = 0.
    pub fn velocity(&self, x: f64, r: f64) -> Result<f64, NonReal> {
        self.flow.evaluate(&Bindings::at(x, r))
    }

    /// ∂f/∂x at the given bindings.
    pub fn derivative_at(&self, bindings: &Bindings) -> Result<f64, NonReal> {
        match &self.derivative {
            DerivativeSource::Symbolic(expression) => expression.evaluate(bindings),
            DerivativeSource::Automatic => derivative_wrt_x(&self.flow, bindings),
        }
    }
}
