//! Recording lifecycle
//!
//! This module implements the candidate recording session:
//! - SessionMachine, the single transition function for the lifecycle
//! - Scheduler, the injected 1-second timer source
//! - RecordingController to drive capture, timer and upload hand-off

pub mod coordinator;
pub mod machine;
pub mod scheduler;
pub mod state;

pub use coordinator::{RecorderError, RecorderResult, RecordingController, RecordingEvent};
pub use machine::{Effect, Input, SessionMachine, Transition, TransitionError};
pub use scheduler::{ManualScheduler, Scheduler, TimerGuard, TimerTick, TokioScheduler};
pub use state::{RecorderConfig, RecordingSnapshot, RecordingState};
