use crate::equation_engine::VM;
use crate::evaluator::{Bindings, CompiledExpression, NonReal};
use crate::traits::Scalar;
use num_traits::{One, Zero};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Simple Dual Number for Forward Mode AD
/// val: real part
/// eps: infinitesimal part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    /// A dual number seeded as the differentiation variable.
    pub fn variable(val: f64) -> Self {
        Self::new(val, 1.0)
    }

    /// A dual number held constant with respect to the differentiation variable.
    pub fn constant(val: f64) -> Self {
        Self::new(val, 0.0)
    }

    // Applies f with derivative df at val via the chain rule.
    fn chain(self, f: f64, df: f64) -> Self {
        Self::new(f, df * self.eps)
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Rem for Dual {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // d/dx (a mod b) is da almost everywhere.
        Self::new(self.val % rhs.val, self.eps)
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }
    fn imaginary_unit() -> Self {
        Self::constant(f64::NAN)
    }

    fn powf(self, exponent: Self) -> Self {
        let value = self.val.powf(exponent.val);
        // d(a^b) = b a^(b-1) da + a^b ln(a) db; the second term only matters
        // when the exponent itself varies.
        let base_term = if exponent.val == 0.0 {
            0.0
        } else {
            exponent.val * self.val.powf(exponent.val - 1.0) * self.eps
        };
        let exponent_term = if exponent.eps == 0.0 {
            0.0
        } else {
            value * self.val.ln() * exponent.eps
        };
        Self::new(value, base_term + exponent_term)
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let cos = self.val.cos();
        self.chain(self.val.tan(), 1.0 / (cos * cos))
    }
    fn exp(self) -> Self {
        let value = self.val.exp();
        self.chain(value, value)
    }
    fn ln(self) -> Self {
        self.chain(self.val.ln(), 1.0 / self.val)
    }
    fn sqrt(self) -> Self {
        let value = self.val.sqrt();
        self.chain(value, 0.5 / value)
    }
    fn cbrt(self) -> Self {
        let value = self.val.cbrt();
        self.chain(value, 1.0 / (3.0 * value * value))
    }
    fn abs(self) -> Self {
        let sign = if self.val > 0.0 {
            1.0
        } else if self.val < 0.0 {
            -1.0
        } else {
            0.0
        };
        self.chain(self.val.abs(), sign)
    }
    fn sinh(self) -> Self {
        self.chain(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.chain(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let value = self.val.tanh();
        self.chain(value, 1.0 - value * value)
    }
}

/// Evaluates ∂f/∂x at the given bindings by forward-mode differentiation of
/// the compiled expression. Only the real domain is supported; a non-finite
/// value or derivative is reported as undefined.
pub fn derivative_wrt_x(
    expression: &CompiledExpression,
    bindings: &Bindings,
) -> Result<f64, NonReal> {
    let vars = [Dual::variable(bindings.x), Dual::constant(bindings.t)];
    let params = [Dual::constant(bindings.r)];
    let mut stack = Vec::with_capacity(32);
    let result = VM::execute(expression.bytecode(), &vars, &params, &mut stack);
    if result.val.is_finite() && result.eps.is_finite() {
        Ok(result.eps)
    } else {
        Err(NonReal::Undefined)
    }
}
