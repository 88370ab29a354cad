//! Positioning control for the carriage.
//!
//! The axis is open loop: its position is the running sum of issued steps relative to
//! the homed origin. A step the motor misses is never noticed.

use tracing::{debug, info};

use crate::config::MotionConfig;
use crate::hal::{Clock, LimitSwitch, Rotation, Stepper};
use crate::machine::clamp_cell;
use crate::types::RigError;

/// The carriage axis: stepper, limit switch and the tracked offset from the origin.
pub struct Axis {
    motor: Box<dyn Stepper>,
    limit: Box<dyn LimitSwitch>,
    config: MotionConfig,
    position: i64,
    homed: bool,
}

impl Axis {
    pub fn new(motor: Box<dyn Stepper>, limit: Box<dyn LimitSwitch>, config: MotionConfig) -> Self {
        Self {
            motor,
            limit,
            config,
            position: 0,
            homed: false,
        }
    }

    /// Powers the stepper driver.
    pub fn enable(&mut self) {
        self.motor.enable(true);
    }

    /// The tracked carriage offset in steps from the origin.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    /// The offset of `cell` after clamping it to the tape.
    pub fn target_offset(&self, cell: i64) -> i64 {
        let cell = clamp_cell(cell) as f64;
        ((self.config.offset_mm + cell * self.config.cell_pitch_mm) * self.config.steps_per_mm)
            .round() as i64
    }

    /// Drives toward the limit switch until it triggers, backs off, declares the origin
    /// and parks over cell 0.
    ///
    /// Blocks for as long as the switch stays open.
    pub fn home(&mut self, clock: &mut dyn Clock, service: &mut dyn FnMut()) {
        info!("homing carriage");

        let half_period = self.config.homing_half_period_us;
        let every = self.config.homing_yield_every_steps.max(1);
        let mut approach = 0u64;

        self.motor.set_direction(Rotation::TowardHome);
        while !self.limit.is_pressed() {
            self.pulse(half_period, clock);
            approach += 1;
            if approach % every == 0 {
                service();
            }
        }

        self.motor.set_direction(Rotation::AwayFromHome);
        for _ in 0..self.config.backoff_steps() {
            self.pulse(half_period, clock);
        }

        self.position = 0;
        self.homed = true;
        debug!(approach_steps = approach, "limit switch reached, origin set");

        let parked = self.target_offset(0);
        self.move_relative(parked, clock, service);
        self.position = parked;
    }

    /// Moves the carriage over `cell`, clamped to the tape, and returns the clamped cell.
    ///
    /// The tracked position becomes the target whether or not the motor kept up.
    pub fn go_to(
        &mut self,
        cell: i64,
        clock: &mut dyn Clock,
        service: &mut dyn FnMut(),
    ) -> Result<usize, RigError> {
        if !self.homed {
            return Err(RigError::NotHomed);
        }

        let clamped = clamp_cell(cell);
        let target = self.target_offset(cell);
        self.move_relative(target - self.position, clock, service);
        self.position = target;

        Ok(clamped)
    }

    /// Issues `steps` step pulses, negative toward the switch. The collaborator is
    /// serviced on the first step and then every `yield_every_steps` steps.
    pub fn move_relative(&mut self, steps: i64, clock: &mut dyn Clock, service: &mut dyn FnMut()) {
        if steps == 0 {
            return;
        }

        let rotation = if steps < 0 {
            Rotation::TowardHome
        } else {
            Rotation::AwayFromHome
        };
        self.motor.set_direction(rotation);

        let half_period = self.config.travel_half_period_us;
        let every = self.config.yield_every_steps.max(1);
        for i in 0..steps.unsigned_abs() {
            self.pulse(half_period, clock);
            if i % every == 0 {
                service();
            }
        }

        self.position += steps;
    }

    fn pulse(&mut self, half_period_us: u64, clock: &mut dyn Clock) {
        self.motor.set_step(true);
        clock.delay_us(half_period_us);
        self.motor.set_step(false);
        clock.delay_us(half_period_us);
    }
}
