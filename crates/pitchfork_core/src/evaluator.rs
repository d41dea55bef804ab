//! Numeric evaluator adapter.
//!
//! Wraps a compiled expression and evaluates it at explicit `{x, t, r}`
//! bindings, returning a real number or a [`NonReal`] outcome. Evaluation runs
//! in complex arithmetic so square roots, logarithms and fractional powers of
//! negative numbers behave like they do in a symbolic algebra system: they
//! produce complex values instead of silently turning into NaN.

use crate::equation_engine::{parse, Bytecode, Compiler, VM};
use anyhow::{Context, Result};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Magnitudes below this snap to exactly zero before stability evaluation.
pub const ZERO_EPSILON: f64 = 1e-10;

/// Imaginary parts at or below this (relative to max(1, |re|)) are treated as
/// floating-point noise on a real result.
pub const IMAGINARY_TOLERANCE: f64 = 1e-10;

/// Why an evaluation produced no real number.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NonReal {
    /// A genuine complex value: the expression has a real part, but it is
    /// not real at this point.
    #[error("value is complex ({re} + {im}i)")]
    Complex { re: f64, im: f64 },
    /// Not-a-number with no recoverable real part.
    #[error("value is undefined")]
    Undefined,
}

/// Explicit values for the variables an expression may reference.
/// Variables an expression does not use are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub x: f64,
    pub t: f64,
    pub r: f64,
}

impl Bindings {
    pub fn new(x: f64, t: f64, r: f64) -> Self {
        Self { x, t, r }
    }

    /// Bindings for a root branch x = g(r).
    pub fn at_r(r: f64) -> Self {
        Self::new(0.0, 0.0, r)
    }

    /// Bindings for f(x, r) or ∂f/∂x(x, r) at t = 0.
    pub fn at(x: f64, r: f64) -> Self {
        Self::new(x, 0.0, r)
    }
}

/// An expression parsed and compiled once, evaluated many times.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    bytecode: Bytecode,
    free_variables: BTreeSet<String>,
}

impl CompiledExpression {
    /// Parses and compiles `source` over the variables `x`, `t` and the
    /// parameter `r`.
    pub fn compile(source: &str) -> Result<Self> {
        let parsed = parse(source).with_context(|| format!("Failed to parse \"{source}\""))?;
        let bytecode = Compiler::scalar_flow()
            .compile(&parsed)
            .with_context(|| format!("Failed to compile \"{source}\""))?;
        Ok(Self {
            source: source.to_string(),
            bytecode,
            free_variables: parsed.free_variables(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub fn depends_on(&self, variable: &str) -> bool {
        self.free_variables.contains(variable)
    }

    pub fn free_variables(&self) -> impl Iterator<Item = &str> {
        self.free_variables.iter().map(String::as_str)
    }

    /// Evaluates the expression; pure function of its inputs.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64, NonReal> {
        let mut stack = Vec::with_capacity(32);
        self.evaluate_with(bindings, &mut stack)
    }

    /// As [`evaluate`](Self::evaluate), reusing a caller-owned VM stack.
    pub fn evaluate_with(
        &self,
        bindings: &Bindings,
        stack: &mut Vec<Complex<f64>>,
    ) -> Result<f64, NonReal> {
        let vars = [Complex::new(bindings.x, 0.0), Complex::new(bindings.t, 0.0)];
        let params = [Complex::new(bindings.r, 0.0)];
        real_part(VM::execute(&self.bytecode, &vars, &params, stack))
    }
}

/// Reduces a complex evaluation result to a real number when its imaginary
/// part is negligible.
pub fn real_part(value: Complex<f64>) -> Result<f64, NonReal> {
    if value.re.is_nan() || value.im.is_nan() {
        return Err(NonReal::Undefined);
    }
    if value.im.abs() <= IMAGINARY_TOLERANCE * value.re.abs().max(1.0) {
        return Ok(value.re);
    }
    if value.re.is_finite() {
        Err(NonReal::Complex {
            re: value.re,
            im: value.im,
        })
    } else {
        Err(NonReal::Undefined)
    }
}

/// Snaps magnitudes below [`ZERO_EPSILON`] to exactly zero.
pub fn snap_to_zero(value: f64) -> f64 {
    if value.abs() < ZERO_EPSILON {
        0.0
    } else {
        value
    }
}
