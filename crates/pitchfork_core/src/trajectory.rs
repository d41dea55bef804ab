use crate::config::IntegrationSettings;
use crate::solvers::RK4;
use crate::traits::{DynamicalSystem, Steppable};
use serde::{Deserialize, Serialize};

/// Samples (t_i, x_i) of one fixed-step integration, as parallel vectors.
/// Non-finite x values are kept as-is; an unbounded solution is data, not an
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub x: Vec<f64>,
}

impl Trajectory {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, t: f64, x: f64) {
        self.t.push(t);
        self.x.push(x);
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.t.last()?, *self.x.last()?))
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.t.iter().copied().zip(self.x.iter().copied())
    }
}

/// Integrates a one-dimensional system from t = 0, x = x0 with classical RK4
/// at a fixed step, for `settings.step_count()` steps.
pub fn integrate(
    system: &impl DynamicalSystem<f64>,
    x0: f64,
    settings: &IntegrationSettings,
) -> Trajectory {
    let steps = settings.step_count();
    let dt = settings.step_size;
    let mut solver = RK4::new(1);
    let mut trajectory = Trajectory::with_capacity(steps + 1);
    let mut t = 0.0;
    let mut state = [x0];

    trajectory.push(t, x0);
    for _ in 0..steps {
        solver.step(system, &mut t, &mut state, dt);
        trajectory.push(t, state[0]);
    }
    trajectory
}
