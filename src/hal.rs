//! Capability interfaces for the hardware the rig drives.
//!
//! The rig never talks to pins or buses directly. Each device is a small trait so a
//! board support layer (or the simulated board in [`crate::sim`]) can plug in.

use std::collections::VecDeque;
use thiserror::Error;

use crate::display::Screen;
use crate::types::{Request, Status};

/// A color in 8-bit RGB, as sent to the LED strip.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Rgb8 = Rgb8::new(0, 0, 0);
    pub const RED: Rgb8 = Rgb8::new(255, 0, 0);
    pub const GREEN: Rgb8 = Rgb8::new(0, 255, 0);
    pub const BLUE: Rgb8 = Rgb8::new(0, 0, 255);
    pub const DARK_BLUE: Rgb8 = Rgb8::new(0, 0, 139);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `scale / 256`, keeping full scale at 255.
    pub fn scaled(self, scale: u8) -> Self {
        let s = |c: u8| ((c as u16 * (1 + scale as u16)) >> 8) as u8;
        Self::new(s(self.r), s(self.g), s(self.b))
    }

    pub fn saturating_add(self, other: Rgb8) -> Self {
        Self::new(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }

    /// Converts a hue/saturation/value triple on the 0-255 wheel.
    pub fn from_hsv(hue: u8, sat: u8, val: u8) -> Self {
        let region = hue / 43;
        let remainder = (hue - region * 43) as u16 * 6;
        let (sat, val) = (sat as u16, val as u16);

        let p = ((val * (255 - sat)) >> 8) as u8;
        let q = ((val * (255 - ((sat * remainder) >> 8))) >> 8) as u8;
        let t = ((val * (255 - ((sat * (255 - remainder)) >> 8))) >> 8) as u8;
        let v = val as u8;

        match region {
            0 => Self::new(v, t, p),
            1 => Self::new(q, v, p),
            2 => Self::new(p, v, t),
            3 => Self::new(p, q, v),
            4 => Self::new(t, p, v),
            _ => Self::new(v, p, q),
        }
    }
}

/// A color sample as reported by the color sensor, each channel on a 0-255 scale.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Which way the carriage travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Toward the limit switch, decreasing offsets.
    TowardHome,
    /// Away from the limit switch, increasing offsets.
    AwayFromHome,
}

/// Errors reported by device initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("{0} did not respond")]
    NotResponding(&'static str),
}

/// A step/direction stepper driver.
pub trait Stepper {
    fn enable(&mut self, on: bool);
    fn set_direction(&mut self, rotation: Rotation);
    /// Drives the step line. The motor advances on the rising edge.
    fn set_step(&mut self, high: bool);
}

/// The end-of-travel switch used for homing.
pub trait LimitSwitch {
    fn is_pressed(&mut self) -> bool;
}

/// The reflective color sensor mounted on the carriage.
pub trait ColorSensor {
    fn begin(&mut self) -> Result<(), HardwareError>;
    fn sample(&mut self) -> Rgb;
}

/// The addressable LED strip that doubles as the visible tape.
pub trait LedStrip {
    fn len(&self) -> usize;
    fn set(&mut self, index: usize, color: Rgb8);
    fn get(&self, index: usize) -> Rgb8;
    /// Pushes the buffered colors out to the LEDs.
    fn show(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fill(&mut self, color: Rgb8) {
        for index in 0..self.len() {
            self.set(index, color);
        }
    }

    fn clear(&mut self) {
        self.fill(Rgb8::BLACK);
    }
}

/// The onboard status screen.
pub trait StatusDisplay {
    fn begin(&mut self) -> Result<(), HardwareError>;
    fn draw(&mut self, screen: &Screen);
}

/// Blocking delays and a monotonic millisecond counter.
pub trait Clock {
    fn delay_us(&mut self, us: u64);
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u64) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// The external request-serving collaborator.
///
/// `poll` must return quickly. Status queries are answered from `status`; control
/// requests are pushed into `inbox` and applied by the rig at the next cycle boundary.
pub trait Service {
    fn poll(&mut self, status: &Status, inbox: &mut VecDeque<Request>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_matches_led_dimming() {
        assert_eq!(Rgb8::BLUE.scaled(40), Rgb8::new(0, 0, 40));
        assert_eq!(Rgb8::DARK_BLUE.scaled(50), Rgb8::new(0, 0, 27));
        assert_eq!(Rgb8::GREEN.scaled(255), Rgb8::GREEN);
    }

    #[test]
    fn test_from_hsv_primary_hues() {
        assert_eq!(Rgb8::from_hsv(0, 255, 255), Rgb8::new(255, 0, 0));
        let grey = Rgb8::from_hsv(0, 0, 200);
        assert!(grey.r.abs_diff(grey.g) <= 1 && grey.g == grey.b);
        let green = Rgb8::from_hsv(86, 255, 255);
        assert!(green.g > green.r && green.g > green.b);
    }

    #[derive(Default)]
    struct CountingClock {
        us: u64,
    }

    impl Clock for CountingClock {
        fn delay_us(&mut self, us: u64) {
            self.us = self.us.saturating_add(us);
        }

        fn now_ms(&self) -> u64 {
            self.us / 1000
        }
    }

    #[test]
    fn test_delay_ms_saturates() {
        let mut clock = CountingClock::default();
        clock.delay_ms(3);
        assert_eq!(clock.us, 3000);

        clock.delay_ms(u64::MAX);
        assert_eq!(clock.us, u64::MAX);
    }
}
