use num_complex::Complex;
use num_traits::{NumOps, One, Zero};
use std::fmt::Debug;
use std::ops::Neg;

/// A trait for types the equation VM can evaluate over.
/// Implemented for `f64` (fast real path), `Complex<f64>` (complex-aware
/// evaluation) and `Dual` (forward-mode derivatives).
pub trait Scalar: NumOps + Neg<Output = Self> + Zero + One + Copy + Debug + 'static {
    fn from_f64(value: f64) -> Self;
    /// The imaginary unit, or NaN where the type has no imaginary axis.
    fn imaginary_unit() -> Self;

    fn product(self, rhs: Self) -> Self {
        self * rhs
    }
    fn quotient(self, rhs: Self) -> Self {
        self / rhs
    }

    fn powf(self, exponent: Self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn cbrt(self) -> Self;
    fn abs(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
    fn imaginary_unit() -> Self {
        f64::NAN
    }
    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn tan(self) -> Self {
        f64::tan(self)
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn ln(self) -> Self {
        f64::ln(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    fn cbrt(self) -> Self {
        f64::cbrt(self)
    }
    fn abs(self) -> Self {
        f64::abs(self)
    }
    fn sinh(self) -> Self {
        f64::sinh(self)
    }
    fn cosh(self) -> Self {
        f64::cosh(self)
    }
    fn tanh(self) -> Self {
        f64::tanh(self)
    }
}

/// The real value of `z` when it lies exactly on the real axis.
fn on_real_axis(z: Complex<f64>) -> Option<f64> {
    (z.im == 0.0).then_some(z.re)
}

fn real(value: f64) -> Complex<f64> {
    Complex::new(value, 0.0)
}

/// Real operands take the real path, so overflow gives ±inf and division by
/// zero gives ±inf instead of the NaN that complex formulas produce.
impl Scalar for Complex<f64> {
    fn from_f64(value: f64) -> Self {
        real(value)
    }
    fn imaginary_unit() -> Self {
        Complex::i()
    }

    fn product(self, rhs: Self) -> Self {
        match (on_real_axis(self), on_real_axis(rhs)) {
            (Some(a), Some(b)) => real(a * b),
            _ => self * rhs,
        }
    }

    fn quotient(self, rhs: Self) -> Self {
        match (on_real_axis(self), on_real_axis(rhs)) {
            (Some(a), Some(b)) => real(a / b),
            _ => self / rhs,
        }
    }

    fn powf(self, exponent: Self) -> Self {
        let integral = on_real_axis(exponent)
            .filter(|n| n.fract() == 0.0 && n.abs() <= i32::MAX as f64);
        match (on_real_axis(self), on_real_axis(exponent)) {
            // Negative bases stay exact for integer powers; powc would leave a
            // rounding-level imaginary part.
            (Some(a), Some(b)) if a >= 0.0 || integral.is_some() => real(a.powf(b)),
            _ => match integral {
                Some(n) => self.powi(n as i32),
                None => self.powc(exponent),
            },
        }
    }

    fn sin(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::sin(self), |a| real(a.sin()))
    }
    fn cos(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::cos(self), |a| real(a.cos()))
    }
    fn tan(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::tan(self), |a| real(a.tan()))
    }
    fn exp(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::exp(self), |a| real(a.exp()))
    }
    fn ln(self) -> Self {
        match on_real_axis(self) {
            Some(a) if a >= 0.0 => real(a.ln()),
            _ => Complex::ln(self),
        }
    }
    fn sqrt(self) -> Self {
        match on_real_axis(self) {
            Some(a) if a >= 0.0 => real(a.sqrt()),
            _ => Complex::sqrt(self),
        }
    }
    /// The real cube root on the real axis, the principal root elsewhere.
    fn cbrt(self) -> Self {
        on_real_axis(self).map_or_else(|| self.powc(real(1.0 / 3.0)), |a| real(a.cbrt()))
    }
    fn abs(self) -> Self {
        real(self.norm())
    }
    fn sinh(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::sinh(self), |a| real(a.sinh()))
    }
    fn cosh(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::cosh(self), |a| real(a.cosh()))
    }
    fn tanh(self) -> Self {
        on_real_axis(self).map_or_else(|| Complex::tanh(self), |a| real(a.tanh()))
    }
}

/// Represents a dynamical system (flow).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

#[cfg(test)]
mod tests {
    use super::Scalar;
    use num_complex::Complex;

    #[test]
    fn complex_integer_power_of_negative_base_is_real() {
        let value = Scalar::powf(Complex::new(-2.0, 0.0), Complex::new(3.0, 0.0));
        assert_eq!(value, Complex::new(-8.0, 0.0));
    }

    #[test]
    fn complex_sqrt_of_negative_is_imaginary() {
        let value = Scalar::sqrt(Complex::new(-4.0, 0.0));
        assert!(value.re.abs() < 1e-12);
        assert!((value.im.abs() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn complex_zero_to_fractional_power_is_zero() {
        let value = Scalar::powf(Complex::new(0.0, 0.0), Complex::new(0.5, 0.0));
        assert_eq!(value, Complex::new(0.0, 0.0));
    }

    #[test]
    fn real_operands_overflow_to_infinity() {
        let big = Complex::new(1e200, 0.0);
        assert_eq!(Scalar::quotient(Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)).re, f64::INFINITY);
        let tiny = Scalar::quotient(Complex::new(1.0, 0.0), big);
        assert!(tiny.re > 0.0 && (tiny.re * 1e200 - 1.0).abs() < 1e-12);
        let grown = Scalar::product(Complex::new(2.0, 0.0), Scalar::exp(Complex::new(800.0, 0.0)));
        assert_eq!(grown, Complex::new(f64::INFINITY, 0.0));
        assert_eq!(Scalar::powf(big, Complex::new(4.0, 0.0)).re, f64::INFINITY);
    }

    #[test]
    fn imaginary_unit_squares_to_minus_one() {
        let i = <Complex<f64> as Scalar>::imaginary_unit();
        assert_eq!(Scalar::product(i, i), Complex::new(-1.0, 0.0));
        assert!(<f64 as Scalar>::imaginary_unit().is_nan());
    }

    #[test]
    fn cube_root_is_real_on_the_real_axis() {
        assert_eq!(Scalar::cbrt(Complex::new(-8.0, 0.0)), Complex::new(-2.0, 0.0));
        let principal = Scalar::cbrt(Complex::new(0.0, 8.0));
        assert!((principal.re - 3.0_f64.sqrt()).abs() < 1e-12);
        assert!((principal.im - 1.0).abs() < 1e-12);
    }

    #[test]
    fn real_fractional_power_of_negative_is_nan() {
        assert!(Scalar::powf(-8.0_f64, 1.0 / 3.0).is_nan());
    }
}
