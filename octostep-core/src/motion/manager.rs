//! Per-channel motion state machines and the manager façade
//!
//! The manager owns eight channels as parallel arrays (state, active plan,
//! command slots, writer index) so `reset` and the service sweep stay simple.
//! Motion is modeled kinematically: while a plan is live, the position is
//! interpolated linearly against the trapezoid's total duration, and snapped
//! to the target on completion. Homing reuses the same executor for its three
//! stages, re-entered by stage index.

use crate::sleep::{SleepRegister, SleepWire};
use crate::CHANNEL_COUNT;

use super::command::{CommandBuffer, StepperCommand};
use super::timing::{compute_timing, step_half_period_us, TimingEstimate};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default soft travel limit in steps, applied symmetrically around zero
pub const DEFAULT_SOFT_LIMIT: i64 = 1200;

/// Default homing travel range in steps
pub const DEFAULT_TRAVEL_RANGE: i64 = DEFAULT_SOFT_LIMIT * 2;

/// Default homing backoff distance in steps
pub const DEFAULT_BACKOFF: i64 = 50;

/// Default step rate in Hz
pub const DEFAULT_SPEED_HZ: i32 = 4000;

/// Default acceleration in steps/s^2
pub const DEFAULT_ACCELERATION: i32 = 16_000;

/// Motion state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotionPhase {
    /// No plan in flight
    #[default]
    Idle,
    /// Absolute move in progress
    Moving,
    /// Homing sequence in progress
    Homing,
}

/// Standing fault on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FaultCode {
    /// No fault
    #[default]
    None,
    /// Last accepted move was clamped to a soft limit
    LimitClipped,
    /// Driver fault; blocks new moves until cleared
    DriverFault,
    /// Reserved: homing never signals completion.
    /// Kept in the taxonomy, never raised by the engine.
    HomingTimeout,
}

/// Outcome of a move or homing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MoveResult {
    /// Plan accepted and scheduled
    Scheduled,
    /// Plan accepted with the target clamped to a soft limit
    ClippedToLimit,
    /// Channel cannot take the request right now; retry later
    Busy,
    /// Request rejected (bad channel, bad range, or standing driver fault)
    Fault,
}

/// Parameters for a homing request; zero fields select the defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HomingRequest {
    /// Full travel range to sweep while approaching the limit
    pub travel_range: i64,
    /// Distance to pull away from the recorded limit
    pub backoff: i64,
}

impl HomingRequest {
    /// Homing request with explicit travel range and backoff
    pub const fn new(travel_range: i64, backoff: i64) -> Self {
        Self {
            travel_range,
            backoff,
        }
    }
}

/// Read-only snapshot of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorState {
    /// Current commanded position in steps
    pub position: i64,
    /// Last accepted target position
    pub target_position: i64,
    /// Active step rate in Hz
    pub speed_hz: i32,
    /// Active acceleration in steps/s^2
    pub acceleration: i32,
    /// Motion state machine phase
    pub phase: MotionPhase,
    /// Sleep-register state for this channel
    pub asleep: bool,
    /// Standing fault
    pub fault: FaultCode,
    /// Sticky marker for the last move that hit a soft limit
    pub limit_clipped: bool,
    /// Estimated duration of the in-flight plan; 0 when idle
    pub planned_duration_us: u32,
}

impl Default for MotorState {
    fn default() -> Self {
        Self {
            position: 0,
            target_position: 0,
            speed_hz: DEFAULT_SPEED_HZ,
            acceleration: DEFAULT_ACCELERATION,
            phase: MotionPhase::Idle,
            asleep: true,
            fault: FaultCode::None,
            limit_clipped: false,
            planned_duration_us: 0,
        }
    }
}

/// One double-buffered command slot toward the step generator
#[derive(Debug, Clone, Copy, Default)]
struct CommandSlot {
    occupied: bool,
    timing: TimingEstimate,
    step_count: u32,
    half_period_micros: u32,
    direction_high: bool,
}

/// In-flight plan for one channel
#[derive(Debug, Clone, Copy, Default)]
struct ActivePlan {
    active: bool,
    homing_phase: bool,
    homing_step: u8,
    limit_recorded: bool,
    backoff_recorded: bool,
    elapsed_us: u32,
    start_position: i64,
    target_position: i64,
    homing_range: i64,
    homing_backoff: i64,
    homing_limit_position: i64,
    homing_backoff_position: i64,
    timing: TimingEstimate,
}

/// Eight-channel motion manager
///
/// Single long-lived instance owned by the host loop. All operations are
/// strictly bounded; the periodic [`service`](MotorManager::service) call
/// advances every live plan by the elapsed wall-clock microseconds.
pub struct MotorManager<W> {
    motors: [MotorState; CHANNEL_COUNT],
    plans: [ActivePlan; CHANNEL_COUNT],
    command_slots: [[CommandSlot; 2]; CHANNEL_COUNT],
    active_slot: [usize; CHANNEL_COUNT],
    sleep: SleepRegister<W>,
    positive_limit: i64,
    negative_limit: i64,
}

impl<W: SleepWire> MotorManager<W> {
    /// Create a manager with every channel idle, asleep, and at position 0
    ///
    /// The sleep register starts unconfigured; attach hardware with
    /// [`configure_shift_register`](MotorManager::configure_shift_register).
    pub fn new() -> Self {
        let mut manager = Self {
            motors: [MotorState::default(); CHANNEL_COUNT],
            plans: [ActivePlan::default(); CHANNEL_COUNT],
            command_slots: [[CommandSlot::default(); 2]; CHANNEL_COUNT],
            active_slot: [0; CHANNEL_COUNT],
            sleep: SleepRegister::new(),
            positive_limit: DEFAULT_SOFT_LIMIT,
            negative_limit: -DEFAULT_SOFT_LIMIT,
        };
        manager.reset();
        manager
    }

    /// Return every channel to the startup state and republish sleep
    pub fn reset(&mut self) {
        for channel in 0..CHANNEL_COUNT {
            self.motors[channel] = MotorState::default();
            self.plans[channel] = ActivePlan::default();
            self.command_slots[channel] = [CommandSlot::default(); 2];
            self.active_slot[channel] = 0;
            self.sleep.set_channel(channel, true);
        }
        self.sleep.apply();
    }

    /// Attach the shift-register wire and publish the current sleep states
    pub fn configure_shift_register(&mut self, wire: W, active_high: bool) {
        self.sleep.configure(wire, active_high);
        for channel in 0..CHANNEL_COUNT {
            self.sleep.set_channel(channel, self.motors[channel].asleep);
        }
        self.sleep.apply();
    }

    /// Queue an absolute move on `channel`
    ///
    /// The target is clamped to the soft limits; a clamped move is still
    /// accepted and reported as [`MoveResult::ClippedToLimit`] with a sticky
    /// [`FaultCode::LimitClipped`] until the next accepted move. Returns the
    /// timing estimate alongside the result.
    pub fn queue_move(
        &mut self,
        channel: usize,
        target_position: i64,
        speed_hz: i32,
        acceleration: i32,
    ) -> (MoveResult, TimingEstimate) {
        if channel >= CHANNEL_COUNT {
            return (MoveResult::Fault, TimingEstimate::default());
        }
        if self.motors[channel].phase == MotionPhase::Homing {
            return (MoveResult::Busy, TimingEstimate::default());
        }
        if self.motors[channel].fault == FaultCode::DriverFault {
            return (MoveResult::Fault, TimingEstimate::default());
        }
        if self.reserve_slot(channel).is_none() {
            return (MoveResult::Busy, TimingEstimate::default());
        }

        let clamped = target_position.clamp(self.negative_limit, self.positive_limit);
        let clipped = clamped != target_position;
        let steps = clamped.abs_diff(self.motors[channel].position) as u32;
        let timing = compute_timing(steps, speed_hz, acceleration);

        let result = self.commit_move(channel, clamped, speed_hz, acceleration, steps, timing, clipped);
        (result, timing)
    }

    /// Start the three-phase homing routine on `channel`
    ///
    /// Zero request fields select the default travel range and backoff.
    /// A range below 2 steps is rejected; the backoff is clamped into
    /// `[0, range - 1]`.
    pub fn begin_homing(&mut self, channel: usize, request: HomingRequest) -> MoveResult {
        if channel >= CHANNEL_COUNT {
            return MoveResult::Fault;
        }
        if self.motors[channel].phase == MotionPhase::Moving {
            return MoveResult::Busy;
        }

        let range = if request.travel_range == 0 {
            DEFAULT_TRAVEL_RANGE
        } else {
            request.travel_range
        };
        if range < 2 {
            return MoveResult::Fault;
        }
        let backoff = if request.backoff == 0 {
            DEFAULT_BACKOFF
        } else {
            request.backoff.clamp(0, range - 1)
        };

        if self.reserve_slot(channel).is_none() {
            return MoveResult::Busy;
        }

        self.plans[channel] = ActivePlan {
            homing_phase: true,
            homing_range: range,
            homing_backoff: backoff,
            ..ActivePlan::default()
        };

        let motor = &mut self.motors[channel];
        motor.phase = MotionPhase::Homing;
        motor.asleep = false;
        motor.limit_clipped = false;
        motor.fault = FaultCode::None;

        self.configure_homing_stage(channel);
        if !self.plans[channel].active {
            // Every stage collapsed to zero steps; park at the origin
            let motor = &mut self.motors[channel];
            motor.position = 0;
            motor.target_position = 0;
            motor.phase = MotionPhase::Idle;
            motor.asleep = true;
            motor.planned_duration_us = 0;
            self.update_autosleep(channel);
            return MoveResult::Scheduled;
        }

        self.motors[channel].planned_duration_us = self.plans[channel].timing.total_duration_us;
        self.update_autosleep(channel);
        MoveResult::Scheduled
    }

    /// Advance every live plan by `elapsed_us` wall-clock microseconds
    ///
    /// Channels are serviced in ascending index order. A zero delta is a
    /// no-op.
    pub fn service(&mut self, elapsed_us: u32) {
        if elapsed_us == 0 {
            return;
        }
        for channel in 0..CHANNEL_COUNT {
            self.advance_channel(channel, elapsed_us);
        }
    }

    /// Park `channel` immediately, discarding any active plan and both slots
    pub fn force_sleep(&mut self, channel: usize) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        let motor = &mut self.motors[channel];
        motor.phase = MotionPhase::Idle;
        motor.asleep = true;
        motor.planned_duration_us = 0;
        self.plans[channel] = ActivePlan::default();
        self.command_slots[channel] = [CommandSlot::default(); 2];
        self.active_slot[channel] = 0;
        self.update_autosleep(channel);
    }

    /// Wake `channel` without touching faults or plans
    pub fn force_wake(&mut self, channel: usize) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        self.motors[channel].asleep = false;
        self.update_autosleep(channel);
    }

    /// Record `fault` on `channel` and park it idle and asleep
    pub fn inject_fault(&mut self, channel: usize, fault: FaultCode) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        let motor = &mut self.motors[channel];
        motor.fault = fault;
        motor.phase = MotionPhase::Idle;
        motor.planned_duration_us = 0;
        motor.asleep = true;
        self.plans[channel] = ActivePlan::default();
        self.command_slots[channel] = [CommandSlot::default(); 2];
        self.active_slot[channel] = 0;
        self.update_autosleep(channel);
    }

    /// Clear the standing fault on `channel`; nothing else changes
    pub fn clear_fault(&mut self, channel: usize) {
        if channel < CHANNEL_COUNT {
            self.motors[channel].fault = FaultCode::None;
        }
    }

    /// Read-only snapshot of `channel`
    pub fn state(&self, channel: usize) -> Option<&MotorState> {
        self.motors.get(channel)
    }

    /// Acknowledge that the generator consumed the active slot
    pub fn mark_command_executed(&mut self, channel: usize) {
        if channel < CHANNEL_COUNT {
            self.command_slots[channel][self.active_slot[channel]] = CommandSlot::default();
        }
    }

    /// Export the raw two-slot snapshot for the step generator
    ///
    /// An out-of-range channel exports an empty buffer.
    pub fn export_command_buffer(&self, channel: usize) -> CommandBuffer {
        let mut out = CommandBuffer::default();
        if channel >= CHANNEL_COUNT {
            return out;
        }
        for (index, slot) in self.command_slots[channel].iter().enumerate() {
            out.slots[index] = StepperCommand {
                step_count: slot.step_count,
                delay_ticks: slot.half_period_micros,
                direction_high: slot.direction_high,
            };
            out.occupied[index] = slot.occupied;
        }
        out
    }

    /// Pick the slot a new plan may write to, flipping the writer if needed
    fn reserve_slot(&mut self, channel: usize) -> Option<usize> {
        let mut slot = self.active_slot[channel];
        if self.command_slots[channel][slot].occupied {
            let alternate = (slot + 1) % 2;
            if self.command_slots[channel][alternate].occupied {
                return None;
            }
            slot = alternate;
        }
        self.active_slot[channel] = slot;
        Some(slot)
    }

    fn commit_move(
        &mut self,
        channel: usize,
        clamped_target: i64,
        speed_hz: i32,
        acceleration: i32,
        steps: u32,
        timing: TimingEstimate,
        clipped: bool,
    ) -> MoveResult {
        let accepted = if clipped {
            MoveResult::ClippedToLimit
        } else {
            MoveResult::Scheduled
        };
        let fault = if clipped {
            FaultCode::LimitClipped
        } else {
            FaultCode::None
        };

        let motor = &mut self.motors[channel];
        motor.target_position = clamped_target;
        motor.speed_hz = speed_hz;
        motor.acceleration = acceleration;
        motor.limit_clipped = clipped;
        motor.planned_duration_us = timing.total_duration_us;

        if timing.total_steps == 0 || timing.total_duration_us == 0 {
            // Nothing to drive; snap and stay parked
            motor.position = clamped_target;
            motor.phase = MotionPhase::Idle;
            motor.asleep = true;
            motor.fault = fault;
            self.plans[channel] = ActivePlan::default();
            self.command_slots[channel][self.active_slot[channel]].occupied = false;
            self.update_autosleep(channel);
            return accepted;
        }

        let start_position = motor.position;
        motor.phase = MotionPhase::Moving;
        motor.asleep = false;
        motor.fault = fault;

        self.plans[channel] = ActivePlan {
            active: true,
            start_position,
            target_position: clamped_target,
            timing,
            ..ActivePlan::default()
        };

        self.command_slots[channel][self.active_slot[channel]] = CommandSlot {
            occupied: true,
            timing,
            step_count: steps,
            half_period_micros: step_half_period_us(speed_hz),
            direction_high: clamped_target >= start_position,
        };

        self.update_autosleep(channel);
        accepted
    }

    fn advance_channel(&mut self, channel: usize, elapsed_us: u32) {
        if !self.plans[channel].active {
            return;
        }

        {
            let plan = &mut self.plans[channel];
            let elapsed = (u64::from(plan.elapsed_us) + u64::from(elapsed_us))
                .min(u64::from(plan.timing.total_duration_us));
            plan.elapsed_us = elapsed as u32;

            if plan.timing.total_duration_us > 0 {
                let progress =
                    f64::from(plan.elapsed_us) / f64::from(plan.timing.total_duration_us);
                let delta = (plan.target_position - plan.start_position) as f64;
                self.motors[channel].position =
                    plan.start_position + libm::round(progress * delta) as i64;
            }
        }

        if self.plans[channel].elapsed_us < self.plans[channel].timing.total_duration_us {
            return;
        }

        // Plan complete: snap to target and release the active slot
        self.motors[channel].position = self.plans[channel].target_position;
        self.command_slots[channel][self.active_slot[channel]].occupied = false;

        if self.plans[channel].homing_phase {
            self.finish_homing_stage(channel);
        } else {
            self.plans[channel] = ActivePlan::default();
            let motor = &mut self.motors[channel];
            motor.phase = MotionPhase::Idle;
            motor.position = motor.target_position;
            motor.asleep = true;
            motor.planned_duration_us = 0;
            self.update_autosleep(channel);
        }
    }

    /// Record the finished homing stage and install the next one
    fn finish_homing_stage(&mut self, channel: usize) {
        {
            let plan = &mut self.plans[channel];
            match plan.homing_step {
                0 => {
                    plan.limit_recorded = true;
                    plan.homing_limit_position = self.motors[channel].position;
                }
                1 => {
                    plan.backoff_recorded = true;
                    plan.homing_backoff_position = self.motors[channel].position;
                }
                _ => {}
            }
            plan.homing_step += 1;
        }

        if self.plans[channel].homing_step <= 2 {
            self.active_slot[channel] = (self.active_slot[channel] + 1) % 2;
            self.configure_homing_stage(channel);
            if self.plans[channel].active {
                let motor = &mut self.motors[channel];
                motor.phase = MotionPhase::Homing;
                motor.asleep = false;
                motor.planned_duration_us = self.plans[channel].timing.total_duration_us;
                self.update_autosleep(channel);
                return;
            }
        }

        // Sequence complete: the mid-travel park becomes the new origin
        self.plans[channel] = ActivePlan::default();
        let motor = &mut self.motors[channel];
        motor.position = 0;
        motor.target_position = 0;
        motor.phase = MotionPhase::Idle;
        motor.asleep = true;
        motor.limit_clipped = false;
        motor.fault = FaultCode::None;
        motor.planned_duration_us = 0;
        self.update_autosleep(channel);
    }

    /// Install the plan and slot for the current homing stage
    ///
    /// Stage 0 drives into the negative limit, stage 1 backs off, stage 2
    /// parks at mid-travel. A zero-length stage snaps the position and
    /// recurses into the next stage; if the last stage collapses the plan is
    /// left inactive for the caller to terminate the sequence.
    fn configure_homing_stage(&mut self, channel: usize) {
        let start = self.motors[channel].position;
        let speed_hz = self.motors[channel].speed_hz;
        let acceleration = self.motors[channel].acceleration;

        let plan = &mut self.plans[channel];
        if plan.homing_step > 2 {
            plan.active = false;
            return;
        }

        plan.start_position = start;
        plan.target_position = match plan.homing_step {
            0 => start - plan.homing_range,
            1 => start + plan.homing_backoff,
            _ => {
                let limit_base = if plan.limit_recorded {
                    plan.homing_limit_position
                } else {
                    start - plan.homing_backoff
                };
                limit_base + plan.homing_range / 2
            }
        };

        let steps = plan.target_position.abs_diff(start) as u32;
        plan.timing = compute_timing(steps, speed_hz, acceleration);
        plan.elapsed_us = 0;

        let slot = self.active_slot[channel];
        self.command_slots[channel][slot] = CommandSlot::default();

        if steps == 0 || plan.timing.total_duration_us == 0 {
            let target = plan.target_position;
            plan.active = false;
            let more_stages = plan.homing_step < 2;
            if more_stages {
                plan.homing_step += 1;
            }
            self.motors[channel].position = target;
            self.motors[channel].target_position = target;
            if more_stages {
                self.configure_homing_stage(channel);
            }
            return;
        }

        self.command_slots[channel][slot] = CommandSlot {
            occupied: true,
            timing: plan.timing,
            step_count: steps,
            half_period_micros: step_half_period_us(speed_hz),
            direction_high: plan.target_position >= plan.start_position,
        };

        plan.active = true;
        self.motors[channel].target_position = self.plans[channel].target_position;
        self.motors[channel].planned_duration_us = self.plans[channel].timing.total_duration_us;
    }

    /// Mirror the channel's sleep state into the register and republish
    fn update_autosleep(&mut self, channel: usize) {
        self.sleep.set_channel(channel, self.motors[channel].asleep);
        self.sleep.apply();
    }
}

impl<W: SleepWire> Default for MotorManager<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleep::NullWire;

    type TestManager = MotorManager<NullWire>;

    fn fast_forward<W: SleepWire>(manager: &mut MotorManager<W>, channel: usize) {
        let duration = manager.state(channel).unwrap().planned_duration_us;
        if duration > 0 {
            manager.service(duration + 10);
        }
    }

    fn occupied_step_count<W: SleepWire>(manager: &MotorManager<W>, channel: usize) -> u32 {
        let buffer = manager.export_command_buffer(channel);
        buffer.pending().expect("expected an occupied slot").step_count
    }

    #[test]
    fn test_startup_state() {
        let manager = TestManager::new();
        for channel in 0..CHANNEL_COUNT {
            let state = manager.state(channel).unwrap();
            assert_eq!(state.position, 0);
            assert_eq!(state.phase, MotionPhase::Idle);
            assert!(state.asleep);
            assert_eq!(state.fault, FaultCode::None);
            assert_eq!(state.speed_hz, DEFAULT_SPEED_HZ);
            assert_eq!(state.acceleration, DEFAULT_ACCELERATION);
            assert!(!manager.export_command_buffer(channel).any_occupied());
        }
    }

    #[test]
    fn test_invalid_channel_is_rejected() {
        let mut manager = TestManager::new();
        let (result, timing) = manager.queue_move(CHANNEL_COUNT, 100, 4000, 16_000);
        assert_eq!(result, MoveResult::Fault);
        assert_eq!(timing, TimingEstimate::default());
        assert_eq!(
            manager.begin_homing(CHANNEL_COUNT, HomingRequest::default()),
            MoveResult::Fault
        );
        assert!(manager.state(CHANNEL_COUNT).is_none());
    }

    #[test]
    fn test_move_clamps_to_limits() {
        let mut manager = TestManager::new();
        let (result, timing) = manager.queue_move(0, DEFAULT_SOFT_LIMIT + 500, 4000, 16_000);
        assert_eq!(result, MoveResult::ClippedToLimit);
        assert!(timing.total_steps > 0);

        let state = manager.state(0).unwrap();
        assert_eq!(state.target_position, DEFAULT_SOFT_LIMIT);
        assert_eq!(state.fault, FaultCode::LimitClipped);
        assert!(state.limit_clipped);
    }

    #[test]
    fn test_clipped_move_reaches_limit_after_service() {
        let mut manager = TestManager::new();
        let (result, _) = manager.queue_move(4, 2000, 4000, 16_000);
        assert_eq!(result, MoveResult::ClippedToLimit);

        fast_forward(&mut manager, 4);
        let state = manager.state(4).unwrap();
        assert_eq!(state.position, DEFAULT_SOFT_LIMIT);
        assert!(state.limit_clipped);
        assert_eq!(state.phase, MotionPhase::Idle);
    }

    #[test]
    fn test_move_completes_and_autosleeps() {
        let mut manager = TestManager::new();
        let (result, timing) = manager.queue_move(2, 600, 3000, 12_000);
        assert_eq!(result, MoveResult::Scheduled);
        assert!(timing.total_duration_us > 0);
        assert!(!manager.state(2).unwrap().asleep);
        assert_eq!(manager.state(2).unwrap().phase, MotionPhase::Moving);

        fast_forward(&mut manager, 2);

        let state = manager.state(2).unwrap();
        assert_eq!(state.position, 600);
        assert_eq!(state.phase, MotionPhase::Idle);
        assert!(state.asleep);
        assert_eq!(state.planned_duration_us, 0);
        assert!(!manager.export_command_buffer(2).any_occupied());
    }

    #[test]
    fn test_position_interpolates_against_elapsed_time() {
        let mut manager = TestManager::new();
        let (_, timing) = manager.queue_move(0, 300, 4000, 16_000);

        manager.service(timing.total_duration_us / 2);
        let state = manager.state(0).unwrap();
        assert_eq!(state.position, 150);
        assert_eq!(state.phase, MotionPhase::Moving);
        assert!(state.planned_duration_us > 0);
    }

    #[test]
    fn test_service_zero_is_noop() {
        let mut manager = TestManager::new();
        manager.queue_move(0, 300, 4000, 16_000);
        manager.service(0);

        let state = manager.state(0).unwrap();
        assert_eq!(state.position, 0);
        assert_eq!(state.phase, MotionPhase::Moving);
    }

    #[test]
    fn test_zero_step_move_snaps_in_place() {
        let mut manager = TestManager::new();
        let (result, timing) = manager.queue_move(1, 0, 4000, 16_000);
        assert_eq!(result, MoveResult::Scheduled);
        assert_eq!(timing.total_steps, 0);

        let state = manager.state(1).unwrap();
        assert_eq!(state.phase, MotionPhase::Idle);
        assert!(state.asleep);
        assert_eq!(state.planned_duration_us, 0);
        assert!(!manager.export_command_buffer(1).any_occupied());
    }

    #[test]
    fn test_clipped_zero_step_move_still_reports_clip() {
        let mut manager = TestManager::new();
        manager.queue_move(3, 2000, 4000, 16_000);
        fast_forward(&mut manager, 3);
        assert_eq!(manager.state(3).unwrap().position, DEFAULT_SOFT_LIMIT);

        // Already parked at the limit; a further out-of-range move is a
        // zero-step clip.
        let (result, timing) = manager.queue_move(3, 5000, 4000, 16_000);
        assert_eq!(result, MoveResult::ClippedToLimit);
        assert_eq!(timing.total_steps, 0);

        let state = manager.state(3).unwrap();
        assert_eq!(state.position, DEFAULT_SOFT_LIMIT);
        assert_eq!(state.fault, FaultCode::LimitClipped);
        assert_eq!(state.phase, MotionPhase::Idle);
        assert!(state.asleep);
    }

    #[test]
    fn test_successful_move_clears_clip_fault() {
        let mut manager = TestManager::new();
        manager.queue_move(0, 2000, 4000, 16_000);
        assert_eq!(manager.state(0).unwrap().fault, FaultCode::LimitClipped);
        fast_forward(&mut manager, 0);

        let (result, _) = manager.queue_move(0, 100, 4000, 16_000);
        assert_eq!(result, MoveResult::Scheduled);
        assert_eq!(manager.state(0).unwrap().fault, FaultCode::None);
        assert!(!manager.state(0).unwrap().limit_clipped);
    }

    #[test]
    fn test_slot_carries_direction_and_half_period() {
        let mut manager = TestManager::new();
        manager.queue_move(0, -300, 4000, 16_000);

        let buffer = manager.export_command_buffer(0);
        let command = buffer.pending().unwrap();
        assert_eq!(command.step_count, 300);
        assert_eq!(command.delay_ticks, 125);
        assert!(!command.direction_high);
    }

    #[test]
    fn test_third_queued_move_is_busy() {
        let mut manager = TestManager::new();
        let (first, _) = manager.queue_move(0, 300, 4000, 16_000);
        assert_eq!(first, MoveResult::Scheduled);

        // Replacing the in-flight plan writes the alternate slot
        let (second, _) = manager.queue_move(0, 400, 4000, 16_000);
        assert_eq!(second, MoveResult::Scheduled);

        let buffer = manager.export_command_buffer(0);
        assert!(buffer.occupied[0] && buffer.occupied[1]);

        let (third, _) = manager.queue_move(0, 500, 4000, 16_000);
        assert_eq!(third, MoveResult::Busy);
    }

    #[test]
    fn test_mark_command_executed_releases_active_slot() {
        let mut manager = TestManager::new();
        manager.queue_move(0, 300, 4000, 16_000);
        assert!(manager.export_command_buffer(0).any_occupied());

        manager.mark_command_executed(0);
        assert!(!manager.export_command_buffer(0).any_occupied());
    }

    #[test]
    fn test_homing_establishes_origin() {
        let mut manager = TestManager::new();
        let result = manager.begin_homing(1, HomingRequest::default());
        assert_eq!(result, MoveResult::Scheduled);
        assert_eq!(manager.state(1).unwrap().phase, MotionPhase::Homing);
        assert!(!manager.state(1).unwrap().asleep);

        // Approach, backoff, center
        fast_forward(&mut manager, 1);
        fast_forward(&mut manager, 1);
        fast_forward(&mut manager, 1);

        let state = manager.state(1).unwrap();
        assert_eq!(state.phase, MotionPhase::Idle);
        assert_eq!(state.position, 0);
        assert_eq!(state.target_position, 0);
        assert!(state.asleep);
        assert_eq!(state.planned_duration_us, 0);
        assert!(!state.limit_clipped);
        assert_eq!(state.fault, FaultCode::None);
    }

    #[test]
    fn test_homing_stage_step_counts() {
        let mut manager = TestManager::new();
        let request = HomingRequest::new(2400, 100);
        assert_eq!(manager.begin_homing(4, request), MoveResult::Scheduled);

        // Stage 0 sweeps the whole travel range toward the limit
        assert_eq!(occupied_step_count(&manager, 4), 2400);

        fast_forward(&mut manager, 4);
        // Stage 1 backs off the configured distance
        assert_eq!(occupied_step_count(&manager, 4), 100);

        fast_forward(&mut manager, 4);
        // Stage 2 runs from the recorded limit to mid-travel
        assert_eq!(occupied_step_count(&manager, 4), 2400 / 2 - 100);

        fast_forward(&mut manager, 4);
        let state = manager.state(4).unwrap();
        assert_eq!(state.position, 0);
        assert_eq!(state.target_position, 0);
        assert_eq!(state.phase, MotionPhase::Idle);
    }

    #[test]
    fn test_homing_skips_degenerate_backoff_stage() {
        let mut manager = TestManager::new();
        // Negative backoff clamps to zero, so stage 1 collapses
        let result = manager.begin_homing(0, HomingRequest::new(2400, -1));
        assert_eq!(result, MoveResult::Scheduled);
        assert_eq!(occupied_step_count(&manager, 0), 2400);

        fast_forward(&mut manager, 0);
        // Stage 1 was skipped; the center stage is live immediately
        assert_eq!(occupied_step_count(&manager, 0), 1200);

        fast_forward(&mut manager, 0);
        assert_eq!(manager.state(0).unwrap().position, 0);
        assert_eq!(manager.state(0).unwrap().phase, MotionPhase::Idle);
    }

    #[test]
    fn test_homing_rejects_tiny_range() {
        let mut manager = TestManager::new();
        assert_eq!(
            manager.begin_homing(0, HomingRequest::new(1, 0)),
            MoveResult::Fault
        );
        assert_eq!(manager.state(0).unwrap().phase, MotionPhase::Idle);
    }

    #[test]
    fn test_move_during_homing_is_busy() {
        let mut manager = TestManager::new();
        manager.begin_homing(2, HomingRequest::default());

        let (result, _) = manager.queue_move(2, 10, 4000, 16_000);
        assert_eq!(result, MoveResult::Busy);

        // Drain all three stages, then the channel accepts moves again
        fast_forward(&mut manager, 2);
        fast_forward(&mut manager, 2);
        fast_forward(&mut manager, 2);
        let (result, _) = manager.queue_move(2, 10, 4000, 16_000);
        assert_eq!(result, MoveResult::Scheduled);
    }

    #[test]
    fn test_homing_during_move_is_busy() {
        let mut manager = TestManager::new();
        manager.queue_move(5, 300, 4000, 16_000);
        assert_eq!(
            manager.begin_homing(5, HomingRequest::default()),
            MoveResult::Busy
        );
    }

    #[test]
    fn test_fault_blocks_moves_until_cleared() {
        let mut manager = TestManager::new();
        manager.inject_fault(3, FaultCode::DriverFault);
        assert_eq!(manager.state(3).unwrap().fault, FaultCode::DriverFault);

        let (result, _) = manager.queue_move(3, 200, 4000, 16_000);
        assert_eq!(result, MoveResult::Fault);

        manager.clear_fault(3);
        let (result, _) = manager.queue_move(3, 200, 4000, 16_000);
        assert_eq!(result, MoveResult::Scheduled);
    }

    #[test]
    fn test_inject_fault_parks_channel() {
        let mut manager = TestManager::new();
        manager.queue_move(6, 300, 4000, 16_000);

        manager.inject_fault(6, FaultCode::DriverFault);
        let state = manager.state(6).unwrap();
        assert_eq!(state.phase, MotionPhase::Idle);
        assert!(state.asleep);
        assert_eq!(state.planned_duration_us, 0);
        assert!(!manager.export_command_buffer(6).any_occupied());

        // The discarded plan no longer advances
        manager.service(1_000_000);
        assert_eq!(manager.state(6).unwrap().position, 0);
    }

    #[test]
    fn test_force_sleep_discards_plan_and_slots() {
        let mut manager = TestManager::new();
        manager.queue_move(3, 300, 4000, 16_000);
        assert!(!manager.state(3).unwrap().asleep);

        manager.force_sleep(3);
        let state = manager.state(3).unwrap();
        assert!(state.asleep);
        assert_eq!(state.phase, MotionPhase::Idle);
        assert_eq!(state.planned_duration_us, 0);
        assert!(!manager.export_command_buffer(3).any_occupied());
    }

    #[test]
    fn test_force_wake_preserves_fault() {
        let mut manager = TestManager::new();
        manager.inject_fault(3, FaultCode::DriverFault);

        manager.force_wake(3);
        let state = manager.state(3).unwrap();
        assert!(!state.asleep);
        assert_eq!(state.fault, FaultCode::DriverFault);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut manager = TestManager::new();
        manager.queue_move(0, 300, 5000, 20_000);
        manager.inject_fault(7, FaultCode::DriverFault);

        manager.reset();
        for channel in 0..CHANNEL_COUNT {
            let state = manager.state(channel).unwrap();
            assert_eq!(*state, MotorState::default());
            assert!(!manager.export_command_buffer(channel).any_occupied());
        }
    }

    #[test]
    fn test_homing_from_offset_position() {
        let mut manager = TestManager::new();
        manager.queue_move(0, 300, 4000, 16_000);
        fast_forward(&mut manager, 0);
        assert_eq!(manager.state(0).unwrap().position, 300);

        manager.begin_homing(0, HomingRequest::new(1000, 50));
        // Approach covers the full range regardless of the start offset
        assert_eq!(occupied_step_count(&manager, 0), 1000);

        fast_forward(&mut manager, 0);
        fast_forward(&mut manager, 0);
        fast_forward(&mut manager, 0);
        assert_eq!(manager.state(0).unwrap().position, 0);
    }

    #[test]
    fn test_sleep_register_tracks_motion() {
        use core::cell::Cell;

        struct CellWire<'a> {
            last: &'a Cell<u8>,
        }

        impl SleepWire for CellWire<'_> {
            fn shift_out(&mut self, pattern: u8) {
                self.last.set(pattern);
            }
        }

        let last = Cell::new(0xAA);
        let mut manager: MotorManager<CellWire<'_>> = MotorManager::new();
        manager.configure_shift_register(CellWire { last: &last }, false);

        // Active-low polarity: all channels asleep publishes an empty pattern
        assert_eq!(last.get(), 0x00);

        manager.queue_move(0, 300, 4000, 16_000);
        assert_eq!(last.get(), 0b0000_0001);

        manager.force_wake(5);
        assert_eq!(last.get(), 0b0010_0001);

        fast_forward(&mut manager, 0);
        assert_eq!(last.get(), 0b0010_0000);

        manager.force_sleep(5);
        assert_eq!(last.get(), 0x00);
    }

    #[test]
    fn test_channels_service_independently() {
        let mut manager = TestManager::new();
        let (_, slow) = manager.queue_move(0, 1200, 1000, 4000);
        let (_, fast) = manager.queue_move(1, 50, 4000, 16_000);
        assert!(slow.total_duration_us > fast.total_duration_us);

        manager.service(fast.total_duration_us + 10);
        assert_eq!(manager.state(1).unwrap().phase, MotionPhase::Idle);
        assert_eq!(manager.state(1).unwrap().position, 50);
        assert_eq!(manager.state(0).unwrap().phase, MotionPhase::Moving);
    }
}
