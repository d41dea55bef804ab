use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Classical fourth-order Runge-Kutta with fixed step and preallocated
/// stage buffers.
pub struct RK4<T: Scalar> {
    stages: [Vec<T>; 4],
    probe: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            stages: std::array::from_fn(|_| vec![T::zero(); dim]),
            probe: vec![T::zero(); dim],
        }
    }
}

/// probe = state + scale * slope
fn offset<T: Scalar>(probe: &mut [T], state: &[T], slope: &[T], scale: T) {
    for ((p, &y), &k) in probe.iter_mut().zip(state).zip(slope) {
        *p = y + scale * k;
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half_dt = dt * T::from_f64(0.5);
        let two = T::from_f64(2.0);
        let t0 = *t;
        let [k1, k2, k3, k4] = &mut self.stages;

        system.apply(t0, state, k1);
        offset(&mut self.probe, state, k1, half_dt);
        system.apply(t0 + half_dt, &self.probe, k2);
        offset(&mut self.probe, state, k2, half_dt);
        system.apply(t0 + half_dt, &self.probe, k3);
        offset(&mut self.probe, state, k3, dt);
        system.apply(t0 + dt, &self.probe, k4);

        let weight = dt * T::from_f64(1.0 / 6.0);
        for (i, y) in state.iter_mut().enumerate() {
            *y = *y + weight * (k1[i] + two * k2[i] + two * k3[i] + k4[i]);
        }
        *t = t0 + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::RK4;
    use crate::traits::{DynamicalSystem, Steppable};

    struct Polynomial;

    // dx/dt = t^3 is integrated exactly by a fourth-order method.
    impl DynamicalSystem<f64> for Polynomial {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = t * t * t;
        }
    }

    #[test]
    fn integrates_cubic_in_time_exactly() {
        let mut solver = RK4::new(1);
        let mut t = 0.0;
        let mut state = [0.0];
        for _ in 0..4 {
            solver.step(&Polynomial, &mut t, &mut state, 0.5);
        }
        assert!((t - 2.0).abs() < 1e-15);
        assert!((state[0] - 4.0).abs() < 1e-12);
    }
}
