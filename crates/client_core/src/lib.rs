//! Client side of the seat tracker: state reducer, controller runtime,
//! render model and the remote seat store.

pub mod config;
pub mod controller;
mod remote;
mod scheduler;
pub mod state;
pub mod view;

pub use controller::{Clock, ControllerHandle, SeatController, SyncMode, SyncSettings, SystemClock};
pub use remote::RemoteSeatStore;
pub use scheduler::Scheduler;
pub use state::{AppState, Command, Effect, LoadPhase};
pub use view::{SeatRenderer, SeatTile, SeatView, ZoneTab};
