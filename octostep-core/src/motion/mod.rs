//! Motion planning and sequencing
//!
//! The manager owns one state machine per channel and hands finished plans
//! to the step generator through double-buffered command slots.

pub mod command;
pub mod manager;
pub mod timing;

pub use command::{CommandBuffer, StepperCommand};
pub use manager::{
    FaultCode, HomingRequest, MotionPhase, MotorManager, MotorState, MoveResult,
    DEFAULT_ACCELERATION, DEFAULT_BACKOFF, DEFAULT_SOFT_LIMIT, DEFAULT_SPEED_HZ,
    DEFAULT_TRAVEL_RANGE,
};
pub use timing::{compute_timing, step_half_period_us, TimingEstimate};
