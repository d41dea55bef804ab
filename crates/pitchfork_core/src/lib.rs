pub mod autodiff;
pub mod config;
pub mod continuation;
pub mod diagram;
pub mod equation_engine;
pub mod evaluator;
pub mod field;
pub mod grid;
pub mod model;
pub mod provider;
pub mod session;
pub mod solvers;
pub mod stability;
pub mod trajectory;
/// The `pitchfork_core` crate is the numerical engine behind the Pitchfork
/// explorer for one-dimensional flows ẋ = f(x, r).
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem`, `Steppable` (Solvers).
/// - **Equation Engine**: A bytecode VM for evaluating user-defined equations over
///   real, complex or dual numbers.
/// - **Continuation**: root branches tracked across the r sweep, with symbolic repair.
/// - **Stability**: labels from the sign of ∂f/∂x at each equilibrium.
/// - **Session**: the explicit analysis context tying the pieces to slider state.
pub mod traits;

pub use config::{IntegrationSettings, ParameterRange, SessionConfig};
pub use diagram::{BifurcationDiagram, Equilibrium};
pub use evaluator::{Bindings, CompiledExpression, NonReal};
pub use provider::SymbolicProvider;
pub use session::{BifurcationSession, SessionSnapshot};
pub use stability::Stability;
