//! Command processor
//!
//! Owns the motion manager and translates command lines into manager calls
//! and structured reply lines. The host loop feeds it complete lines plus a
//! periodic service tick.

use heapless::String;

use octostep_core::motion::{
    FaultCode, HomingRequest, MotionPhase, MotorManager, MotorState, MoveResult,
    DEFAULT_ACCELERATION, DEFAULT_BACKOFF, DEFAULT_SPEED_HZ, DEFAULT_TRAVEL_RANGE,
};
use octostep_core::sleep::SleepWire;
use octostep_core::CHANNEL_COUNT;

use crate::parse::{parse_channel, parse_i32, parse_i64, tokenize};
use crate::response::{Response, ResponseCode};

/// Maximum accepted command line length in bytes
pub const MAX_COMMAND_LEN: usize = 80;

/// Maximum verb length in bytes
pub const MAX_VERB_LEN: usize = 8;

/// One row of the HELP table
struct CommandHelp {
    verb: &'static str,
    usage: &'static str,
    description: &'static str,
}

const COMMAND_HELP: &[CommandHelp] = &[
    CommandHelp {
        verb: "HELP",
        usage: "HELP",
        description: "List supported verbs and payload formats.",
    },
    CommandHelp {
        verb: "MOVE",
        usage: "MOVE:<channel>,<position>[,<speed>[,<accel>]]",
        description: "Queue an absolute move with optional speed/accel overrides.",
    },
    CommandHelp {
        verb: "HOME",
        usage: "HOME:<channel>[,<travel>[,<backoff>]]",
        description: "Initiate the homing routine with optional travel/backoff overrides.",
    },
    CommandHelp {
        verb: "STATUS",
        usage: "STATUS[:<channel>]",
        description: "Report state, position, and last error for one or all motors.",
    },
    CommandHelp {
        verb: "SLEEP",
        usage: "SLEEP:<channel>",
        description: "Force a motor channel into low-power sleep.",
    },
    CommandHelp {
        verb: "WAKE",
        usage: "WAKE:<channel>",
        description: "Wake a motor channel before additional commands.",
    },
];

fn phase_label(phase: MotionPhase) -> &'static str {
    match phase {
        MotionPhase::Idle => "IDLE",
        MotionPhase::Moving => "MOVING",
        MotionPhase::Homing => "HOMING",
    }
}

/// Line-oriented command front end over the motion manager
pub struct CommandProcessor<W> {
    manager: MotorManager<W>,
    last_response: [ResponseCode; CHANNEL_COUNT],
}

impl<W: SleepWire> CommandProcessor<W> {
    /// Create a processor with a freshly reset manager
    pub fn new() -> Self {
        Self {
            manager: MotorManager::new(),
            last_response: [ResponseCode::Ok; CHANNEL_COUNT],
        }
    }

    /// Reset the manager and the per-channel response history
    pub fn reset(&mut self) {
        self.manager.reset();
        self.last_response = [ResponseCode::Ok; CHANNEL_COUNT];
    }

    /// Advance the motion engine by `elapsed_us` microseconds
    pub fn service(&mut self, elapsed_us: u32) {
        self.manager.service(elapsed_us);
    }

    /// Borrow the underlying manager
    pub fn manager(&self) -> &MotorManager<W> {
        &self.manager
    }

    /// Mutably borrow the underlying manager (hardware hookup, fault injection)
    pub fn manager_mut(&mut self) -> &mut MotorManager<W> {
        &mut self.manager
    }

    /// Snapshot one channel's motor state
    pub fn motor_state(&self, channel: usize) -> Option<&MotorState> {
        self.manager.state(channel)
    }

    /// The last response code recorded for a channel
    pub fn last_response(&self, channel: usize) -> Option<ResponseCode> {
        self.last_response.get(channel).copied()
    }

    /// Process one complete command line into `out`
    ///
    /// `out` is cleared first; it always ends up holding the full reply,
    /// starting with the `CTRL:<code>` line. An over-long verb without the
    /// `VERB:payload` framing is treated as line noise and produces no reply.
    pub fn process_line(&mut self, raw_line: &str, out: &mut Response) {
        out.clear();

        let line = raw_line.trim();
        if line.is_empty() {
            out.push_code(ResponseCode::EmptyCommand);
            return;
        }
        if line.len() > MAX_COMMAND_LEN {
            out.push_code(ResponseCode::PayloadTooLong);
            return;
        }

        let (verb_raw, payload, framed) = match line.split_once(':') {
            Some((verb, payload)) => (verb.trim(), payload.trim(), true),
            None => (line, "", false),
        };

        if verb_raw.is_empty() {
            out.push_code(ResponseCode::UnknownVerb);
            return;
        }
        if verb_raw.len() > MAX_VERB_LEN {
            if !framed {
                // Chatter that doesn't follow <VERB>[:payload] framing
                return;
            }
            out.push_code(ResponseCode::VerbTooLong);
            return;
        }

        let mut verb: String<MAX_VERB_LEN> = String::new();
        let _ = verb.push_str(verb_raw);
        verb.make_ascii_uppercase();

        match verb.as_str() {
            "HELP" => self.handle_help(out),
            "MOVE" => self.handle_move(payload, out),
            "HOME" => self.handle_home(payload, out),
            "STATUS" => self.handle_status(payload, out),
            "SLEEP" => self.handle_sleep(payload, out),
            "WAKE" => self.handle_wake(payload, out),
            _ => out.push_code(ResponseCode::UnknownVerb),
        }
    }

    fn handle_help(&mut self, out: &mut Response) {
        out.push_code(ResponseCode::Ok);
        for entry in COMMAND_HELP {
            out.push_fmt(format_args!(
                "HELP:{}|{}|{}",
                entry.verb, entry.usage, entry.description
            ));
        }
    }

    fn handle_move(&mut self, payload: &str, out: &mut Response) {
        if payload.is_empty() {
            out.push_code(ResponseCode::MissingPayload);
            return;
        }

        let tokens = match tokenize(payload) {
            Some(tokens) if tokens.len() >= 2 => tokens,
            _ => {
                out.push_code(ResponseCode::ParseError);
                return;
            }
        };

        let Some(channel) = parse_channel(tokens[0]) else {
            out.push_code(ResponseCode::InvalidChannel);
            return;
        };
        let Some(position) = parse_i64(tokens[1]) else {
            out.push_code(ResponseCode::InvalidArgument);
            return;
        };

        let mut speed_hz = DEFAULT_SPEED_HZ;
        if tokens.len() >= 3 && !tokens[2].is_empty() {
            match parse_i32(tokens[2]) {
                Some(value) if value > 0 => speed_hz = value,
                _ => {
                    out.push_code(ResponseCode::InvalidArgument);
                    return;
                }
            }
        }

        let mut acceleration = DEFAULT_ACCELERATION;
        if tokens.len() >= 4 && !tokens[3].is_empty() {
            match parse_i32(tokens[3]) {
                Some(value) if value > 0 => acceleration = value,
                _ => {
                    out.push_code(ResponseCode::InvalidArgument);
                    return;
                }
            }
        }

        let (result, timing) = self
            .manager
            .queue_move(channel, position, speed_hz, acceleration);

        match result {
            MoveResult::Busy => {
                out.push_code(ResponseCode::Busy);
                out.push_line("MOVE:ERR=BUSY");
                self.record_response(channel, ResponseCode::Busy);
            }
            MoveResult::Fault => {
                out.push_code(ResponseCode::DriverFault);
                out.push_line("MOVE:ERR=DRIVER_FAULT");
                self.record_response(channel, ResponseCode::DriverFault);
            }
            MoveResult::Scheduled | MoveResult::ClippedToLimit => {
                let Some(state) = self.manager.state(channel).copied() else {
                    out.push_code(ResponseCode::InvalidChannel);
                    return;
                };
                let clipped = result == MoveResult::ClippedToLimit;

                out.push_code(ResponseCode::Ok);
                self.record_response(
                    channel,
                    if clipped {
                        ResponseCode::LimitViolation
                    } else {
                        ResponseCode::Ok
                    },
                );

                out.push_fmt(format_args!(
                    "MOVE:CH={} POS={} TARGET={} STATE={}",
                    channel,
                    state.position,
                    state.target_position,
                    phase_label(state.phase)
                ));
                out.push_fmt(format_args!(
                    "MOVE:SPEED={} ACC={} PLAN_US={} STEPS={}",
                    state.speed_hz, state.acceleration, timing.total_duration_us, timing.total_steps
                ));
                if clipped {
                    out.push_line("MOVE:LIMIT_CLIPPED=1");
                }
            }
        }
    }

    fn handle_home(&mut self, payload: &str, out: &mut Response) {
        if payload.is_empty() {
            out.push_code(ResponseCode::MissingPayload);
            return;
        }

        let tokens = match tokenize(payload) {
            Some(tokens) if (1..=3).contains(&tokens.len()) => tokens,
            _ => {
                out.push_code(ResponseCode::ParseError);
                return;
            }
        };

        let Some(channel) = parse_channel(tokens[0]) else {
            out.push_code(ResponseCode::InvalidChannel);
            return;
        };

        let mut request = HomingRequest::new(DEFAULT_TRAVEL_RANGE, DEFAULT_BACKOFF);

        if tokens.len() >= 2 && !tokens[1].is_empty() {
            match parse_i64(tokens[1]) {
                Some(travel) if travel > 0 => request.travel_range = travel,
                _ => {
                    out.push_code(ResponseCode::InvalidArgument);
                    return;
                }
            }
        }
        if tokens.len() == 3 && !tokens[2].is_empty() {
            match parse_i64(tokens[2]) {
                Some(backoff) if backoff >= 0 => request.backoff = backoff,
                _ => {
                    out.push_code(ResponseCode::InvalidArgument);
                    return;
                }
            }
        }

        match self.manager.begin_homing(channel, request) {
            MoveResult::Busy => {
                out.push_code(ResponseCode::Busy);
                out.push_line("HOME:ERR=BUSY");
                self.record_response(channel, ResponseCode::Busy);
            }
            MoveResult::Fault => {
                out.push_code(ResponseCode::DriverFault);
                out.push_line("HOME:ERR=DRIVER_FAULT");
                self.record_response(channel, ResponseCode::DriverFault);
            }
            MoveResult::Scheduled | MoveResult::ClippedToLimit => {
                self.record_response(channel, ResponseCode::Ok);
                out.push_code(ResponseCode::Ok);
                out.push_fmt(format_args!(
                    "HOME:CH={} RANGE={} BACKOFF={}",
                    channel, request.travel_range, request.backoff
                ));
            }
        }
    }

    fn handle_status(&mut self, payload: &str, out: &mut Response) {
        if payload.is_empty() {
            out.push_code(ResponseCode::Ok);
            for channel in 0..CHANNEL_COUNT {
                self.write_motor_status(channel, out);
            }
            return;
        }

        let tokens = match tokenize(payload) {
            Some(tokens) if tokens.len() == 1 => tokens,
            _ => {
                out.push_code(ResponseCode::ParseError);
                return;
            }
        };

        let Some(channel) = parse_channel(tokens[0]) else {
            out.push_code(ResponseCode::InvalidChannel);
            return;
        };

        out.push_code(ResponseCode::Ok);
        self.write_motor_status(channel, out);
    }

    fn handle_sleep(&mut self, payload: &str, out: &mut Response) {
        if payload.is_empty() {
            out.push_code(ResponseCode::MissingPayload);
            return;
        }
        let Some(channel) = parse_channel(payload) else {
            out.push_code(ResponseCode::InvalidChannel);
            return;
        };

        self.manager.force_sleep(channel);
        self.record_response(channel, ResponseCode::Ok);

        out.push_code(ResponseCode::Ok);
        out.push_fmt(format_args!("SLEEP:CH={} STATE=SLEEP", channel));
    }

    fn handle_wake(&mut self, payload: &str, out: &mut Response) {
        if payload.is_empty() {
            out.push_code(ResponseCode::MissingPayload);
            return;
        }
        let Some(channel) = parse_channel(payload) else {
            out.push_code(ResponseCode::InvalidChannel);
            return;
        };

        // Waking a channel is also the operator's fault-recovery path
        self.manager.force_wake(channel);
        self.manager.clear_fault(channel);
        self.record_response(channel, ResponseCode::Ok);

        out.push_code(ResponseCode::Ok);
        out.push_fmt(format_args!("WAKE:CH={} STATE=AWAKE", channel));
    }

    fn record_response(&mut self, channel: usize, code: ResponseCode) {
        if channel < CHANNEL_COUNT {
            self.last_response[channel] = code;
        }
    }

    fn write_motor_status(&self, channel: usize, out: &mut Response) {
        let Some(state) = self.manager.state(channel) else {
            return;
        };
        // A standing fault overrides the recorded response history
        let code = if state.fault != FaultCode::None {
            ResponseCode::from_fault(state.fault)
        } else {
            self.last_response[channel]
        };

        out.push_fmt(format_args!(
            "STATUS:CH={} POS={} TARGET={} STATE={} SLEEP={} ERR={}",
            channel,
            state.position,
            state.target_position,
            phase_label(state.phase),
            u8::from(state.asleep),
            code.label()
        ));
        out.push_fmt(format_args!(
            "STATUS:PROFILE CH={} SPEED={} ACC={} PLAN_US={}",
            channel, state.speed_hz, state.acceleration, state.planned_duration_us
        ));
    }
}

impl<W: SleepWire> Default for CommandProcessor<W> {
    fn default() -> Self {
        Self::new()
    }
}
