//! Stochastic grid epidemic engine with buffered playback.

pub mod grid;
pub mod individual;
pub mod lockdown;
pub mod playback;
pub mod player;
pub mod recovery;
pub mod session;
pub mod sim_state;
pub mod simulation;

pub use grid::{Cell, Grid};
pub use individual::{Bin, Individual};
pub use lockdown::{LockdownController, LockdownTransition};
pub use playback::{PlaybackBuffer, TimestepSummary};
pub use player::Player;
pub use recovery::RecoveryModel;
pub use session::{axis_limit, Progress, Session};
pub use sim_state::{GridLayout, SimulationState};
pub use simulation::{EngineOptions, SimulationEngine};
