//! An analysis session: one expression, one sweep, and the current slider state.
//!
//! The bifurcation diagram is computed once when the session is built. Each
//! parameter change afterwards recomputes the velocity field, looks the current
//! equilibria up by grid index and re-integrates the trajectory.

use crate::config::SessionConfig;
use crate::diagram::{BifurcationDiagram, Equilibrium};
use crate::equation_engine::FlowSystem;
use crate::field::{velocity_field, VelocityField};
use crate::grid::{phase_grid, SweepGrid};
use crate::model::EquationModel;
use crate::provider::SymbolicProvider;
use crate::stability::Stability;
use crate::trajectory::{integrate, Trajectory};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// The current-state outputs handed to a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub r: f64,
    pub x0: f64,
    pub grid_index: usize,
    pub roots: Vec<Option<f64>>,
    pub stability: Vec<Stability>,
    pub equilibria: Vec<Equilibrium>,
    /// f(x0, r), the velocity at the initial point.
    pub initial_velocity: Option<f64>,
    pub velocity_field: VelocityField,
    pub trajectory: Trajectory,
}

pub struct BifurcationSession {
    config: SessionConfig,
    model: EquationModel,
    system: FlowSystem<f64>,
    grid: SweepGrid,
    x_grid: Vec<f64>,
    diagram: BifurcationDiagram,
    r: f64,
    x0: f64,
    grid_index: usize,
    roots: Vec<Option<f64>>,
    stability: Vec<Stability>,
    field: VelocityField,
    trajectory: Trajectory,
}

impl BifurcationSession {
    /// Parses `expression` through the provider and runs the full analysis.
    pub fn new<P: SymbolicProvider + ?Sized>(
        config: SessionConfig,
        expression: &str,
        provider: &P,
    ) -> Result<Self> {
        config.validate()?;
        let model = EquationModel::from_provider(expression, provider)?;
        Self::with_model(config, model, provider)
    }

    /// Runs the full analysis for an already-built model.
    pub fn with_model<P: SymbolicProvider + ?Sized>(
        config: SessionConfig,
        model: EquationModel,
        provider: &P,
    ) -> Result<Self> {
        config.validate()?;
        let grid = SweepGrid::from_range(&config.r)?;
        let x_grid = phase_grid(&config.x0)?;
        let diagram = BifurcationDiagram::compute(&model, &grid, provider);
        let system = FlowSystem::new(model.flow().bytecode().clone(), config.r.value);

        let mut session = Self {
            config,
            model,
            system,
            grid,
            x_grid,
            diagram,
            r: config.r.value,
            x0: config.x0.value,
            grid_index: 0,
            roots: Vec::new(),
            stability: Vec::new(),
            field: VelocityField::default(),
            trajectory: Trajectory::default(),
        };
        session.evaluate();
        Ok(session)
    }

    /// Sets r, clamped into its configured bounds, and re-evaluates.
    pub fn set_r(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            bail!("r must be finite.");
        }
        self.r = self.config.r.clamp(value);
        self.evaluate();
        Ok(())
    }

    /// Sets x0, clamped into its configured bounds, and re-evaluates.
    pub fn set_x0(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            bail!("x0 must be finite.");
        }
        self.x0 = self.config.x0.clamp(value);
        self.evaluate();
        Ok(())
    }

    /// Recomputes everything that depends on the current r and x0.
    pub fn evaluate(&mut self) {
        self.field = velocity_field(self.model.flow(), &self.x_grid, self.r);

        self.grid_index = self.grid.index_of(self.r);
        self.roots = self.diagram.roots_at(self.grid_index);
        self.stability = self.diagram.stability_at(self.grid_index);

        self.system.set_r(self.r);
        self.trajectory = integrate(&self.system, self.x0, &self.config.integration);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &EquationModel {
        &self.model
    }

    pub fn grid(&self) -> &SweepGrid {
        &self.grid
    }

    pub fn diagram(&self) -> &BifurcationDiagram {
        &self.diagram
    }

    pub fn num_roots(&self) -> usize {
        self.model.num_roots()
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn grid_index(&self) -> usize {
        self.grid_index
    }

    pub fn roots(&self) -> &[Option<f64>] {
        &self.roots
    }

    pub fn stability(&self) -> &[Stability] {
        &self.stability
    }

    pub fn equilibria(&self) -> Vec<Equilibrium> {
        self.diagram.equilibria_at(self.grid_index)
    }

    pub fn velocity_field(&self) -> &VelocityField {
        &self.field
    }

    pub fn initial_velocity(&self) -> Option<f64> {
        self.model.velocity(self.x0, self.r).ok()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            r: self.r,
            x0: self.x0,
            grid_index: self.grid_index,
            roots: self.roots.clone(),
            stability: self.stability.clone(),
            equilibria: self.equilibria(),
            initial_velocity: self.initial_velocity(),
            velocity_field: self.field.clone(),
            trajectory: self.trajectory.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BifurcationSession;
    use crate::config::{IntegrationSettings, ParameterRange, SessionConfig};
    use crate::provider::SymbolicProvider;
    use crate::stability::Stability;
    use anyhow::Result;

    struct Transcritical;

    impl SymbolicProvider for Transcritical {
        fn solve_for_x(&self, _expression: &str) -> Result<Vec<String>> {
            Ok(vec!["0".to_string(), "r".to_string()])
        }

        fn derivative(&self, _expression: &str, _variable: &str) -> Result<String> {
            Ok("r - 2*x".to_string())
        }

        fn resolve_at(&self, _expression: &str, r: f64) -> Result<Vec<f64>> {
            Ok(vec![0.0, r])
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            r: ParameterRange::new(-2.0, 2.0, 0.5, 1.0),
            x0: ParameterRange::new(-2.0, 2.0, 0.5, 0.5),
            integration: IntegrationSettings {
                time_span: 1.0,
                step_size: 0.125,
            },
        }
    }

    #[test]
    fn evaluates_initial_state_on_construction() {
        let session = BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        assert_eq!(session.grid_index(), 6);
        assert_eq!(session.roots(), &[Some(0.0), Some(1.0)]);
        assert_eq!(session.stability(), &[Stability::Unstable, Stability::Stable]);
        assert_eq!(session.velocity_field().samples.len(), 8);
        assert_eq!(session.trajectory().len(), 9);
        assert_eq!(session.initial_velocity(), Some(0.25));
    }

    #[test]
    fn set_r_clamps_and_refreshes_lookup() {
        let mut session =
            BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        session.set_r(-7.0).expect("finite");
        assert_eq!(session.r(), -2.0);
        assert_eq!(session.grid_index(), 0);
        assert_eq!(session.roots(), &[Some(0.0), Some(-2.0)]);
        assert_eq!(session.stability(), &[Stability::Stable, Stability::Unstable]);
        assert_eq!(session.velocity_field().r, -2.0);
        assert!(session.set_r(f64::NAN).is_err());
    }

    #[test]
    fn set_x0_restarts_trajectory() {
        let mut session =
            BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        session.set_x0(1.5).expect("finite");
        assert_eq!(session.trajectory().x[0], 1.5);
        assert_eq!(session.trajectory().t[0], 0.0);
        // Relaxes toward the stable node at x = r = 1.
        let (_, last) = session.trajectory().last().expect("non-empty");
        assert!(last < 1.5 && last > 1.0);
    }

    #[test]
    fn trajectory_follows_the_current_r() {
        let mut session =
            BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        let (_, before) = session.trajectory().last().expect("non-empty");
        assert!(before < 1.0);
        session.set_r(2.0).expect("finite");
        let (_, after) = session.trajectory().last().expect("non-empty");
        // dx/dt = x(2 - x) from 0.5 climbs past the old node at 1.
        assert!(after > 1.0 && after < 2.0, "{after}");
    }

    #[test]
    fn transcritical_point_is_undefined() {
        let mut session =
            BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        session.set_r(0.0).expect("finite");
        assert_eq!(session.stability(), &[Stability::Undefined, Stability::Undefined]);
    }

    #[test]
    fn snapshot_serializes_labels_as_strings() {
        let session = BifurcationSession::new(config(), "r*x - x^2", &Transcritical).expect("builds");
        let json = serde_json::to_value(session.snapshot()).expect("serializes");
        assert_eq!(json["stability"][0], "unstable");
        assert_eq!(json["equilibria"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut bad = config();
        bad.integration.step_size = 0.0;
        assert!(BifurcationSession::new(bad, "r*x - x^2", &Transcritical).is_err());
    }
}
