//! A simulated board.
//!
//! All devices share one world: the carriage moves with step pulses, the limit switch
//! closes at the end of travel, and the color sensor looks at whatever the LED under
//! the carriage currently shows. The clock is virtual unless real-time pacing is on.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::config::{MotionConfig, RigConfig, StripConfig};
use crate::display::Screen;
use crate::hal::{
    Clock, ColorSensor, HardwareError, LedStrip, LimitSwitch, Rgb, Rgb8, Rotation, Service,
    StatusDisplay, Stepper,
};
use crate::scheduler::Board;
use crate::types::{Request, Status, CELL_COUNT};
use crate::visualizer::led_pair;

/// Where the carriage sits at power-on, in steps from the switch.
const POWER_ON_CARRIAGE: i64 = 3000;
/// What the sensor sees when no lit cell is under it.
const DARK_READING: Rgb = Rgb {
    r: 85.0,
    g: 85.0,
    b: 85.0,
};

struct World {
    motion: MotionConfig,
    strip: StripConfig,
    carriage: i64,
    rotation: Rotation,
    step_high: bool,
    enabled: bool,
    pulses: u64,
    buffer: Vec<Rgb8>,
    leds: Vec<Rgb8>,
    shows: usize,
    sensor_fails: bool,
    display_fails: bool,
    queued_samples: VecDeque<Rgb>,
    samples_taken: usize,
    screens: Vec<Screen>,
    elapsed_us: u64,
    realtime: bool,
}

impl World {
    fn origin(&self) -> i64 {
        self.motion.backoff_steps()
    }

    /// The cell whose center is under the carriage, within a quarter pitch.
    fn cell_under_carriage(&self) -> Option<usize> {
        let offset_steps = self.motion.offset_mm * self.motion.steps_per_mm;
        let relative = (self.carriage - self.origin()) as f64 - offset_steps;
        let cell = relative / self.motion.pitch_steps();
        let nearest = cell.round();

        ((cell - nearest).abs() <= 0.25 && nearest >= 0.0 && (nearest as usize) < CELL_COUNT)
            .then_some(nearest as usize)
    }

    /// Reads the lit LED under the carriage, normalized like a clear-channel sensor.
    fn reading(&self) -> Rgb {
        let Some(cell) = self.cell_under_carriage() else {
            return DARK_READING;
        };

        let (upper, _) = led_pair(cell, &self.strip);
        let color = usize::try_from(upper)
            .ok()
            .and_then(|index| self.leds.get(index).copied())
            .unwrap_or_default();

        let sum = color.r as f32 + color.g as f32 + color.b as f32;
        if sum == 0.0 {
            return DARK_READING;
        }

        Rgb::new(
            color.r as f32 / sum * 255.0,
            color.g as f32 / sum * 255.0,
            color.b as f32 / sum * 255.0,
        )
    }
}

/// Handle to the simulated world. Clones share the same world.
#[derive(Clone)]
pub struct SimBoard {
    world: Rc<RefCell<World>>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::from_config(&RigConfig::default())
    }
}

impl SimBoard {
    pub fn new(motion: MotionConfig, strip: StripConfig) -> Self {
        let leds = vec![Rgb8::BLACK; strip.led_count];
        Self {
            world: Rc::new(RefCell::new(World {
                motion,
                strip,
                carriage: POWER_ON_CARRIAGE,
                rotation: Rotation::AwayFromHome,
                step_high: false,
                enabled: false,
                pulses: 0,
                buffer: leds.clone(),
                leds,
                shows: 0,
                sensor_fails: false,
                display_fails: false,
                queued_samples: VecDeque::new(),
                samples_taken: 0,
                screens: Vec::new(),
                elapsed_us: 0,
                realtime: false,
            })),
        }
    }

    pub fn from_config(config: &RigConfig) -> Self {
        Self::new(config.motion.clone(), config.strip.clone())
    }

    /// All devices of the board, ready for [`crate::scheduler::Rig::boot`].
    pub fn board(&self) -> Board {
        Board {
            stepper: self.stepper(),
            limit_switch: self.limit_switch(),
            color_sensor: self.color_sensor(),
            led_strip: self.led_strip(),
            display: self.status_display(),
            clock: Box::new(self.clock()),
        }
    }

    pub fn stepper(&self) -> Box<dyn Stepper> {
        Box::new(SimStepper(self.clone()))
    }

    pub fn limit_switch(&self) -> Box<dyn LimitSwitch> {
        Box::new(SimLimitSwitch(self.clone()))
    }

    pub fn color_sensor(&self) -> Box<dyn ColorSensor> {
        Box::new(SimColorSensor(self.clone()))
    }

    pub fn led_strip(&self) -> Box<dyn LedStrip> {
        Box::new(SimStrip(self.clone()))
    }

    pub fn status_display(&self) -> Box<dyn StatusDisplay> {
        Box::new(SimDisplay(self.clone()))
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    /// Paces delays with real sleeps instead of only advancing virtual time.
    pub fn set_realtime(&self, realtime: bool) {
        self.world.borrow_mut().realtime = realtime;
    }

    /// Makes the color sensor fail to start.
    pub fn fail_sensor(&self) {
        self.world.borrow_mut().sensor_fails = true;
    }

    /// Makes the status display fail to start.
    pub fn fail_display(&self) {
        self.world.borrow_mut().display_fails = true;
    }

    /// Samples returned before the sensor looks at the strip again.
    pub fn queue_samples(&self, samples: &[Rgb]) {
        self.world
            .borrow_mut()
            .queued_samples
            .extend(samples.iter().copied());
    }

    /// Carriage position in steps from the limit switch.
    pub fn carriage(&self) -> i64 {
        self.world.borrow().carriage
    }

    pub fn set_carriage(&self, steps: i64) {
        self.world.borrow_mut().carriage = steps;
    }

    /// Carriage position of the homed origin.
    pub fn origin(&self) -> i64 {
        self.world.borrow().origin()
    }

    pub fn cell_under_carriage(&self) -> Option<usize> {
        self.world.borrow().cell_under_carriage()
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.world.borrow().enabled
    }

    pub fn pulses(&self) -> u64 {
        self.world.borrow().pulses
    }

    /// The color an LED currently shows.
    pub fn led(&self, index: usize) -> Rgb8 {
        self.world.borrow().leds.get(index).copied().unwrap_or_default()
    }

    pub fn strip_shows(&self) -> usize {
        self.world.borrow().shows
    }

    pub fn samples_taken(&self) -> usize {
        self.world.borrow().samples_taken
    }

    pub fn screens(&self) -> Vec<Screen> {
        self.world.borrow().screens.clone()
    }

    pub fn last_screen(&self) -> Option<Screen> {
        self.world.borrow().screens.last().cloned()
    }
}

struct SimStepper(SimBoard);

impl Stepper for SimStepper {
    fn enable(&mut self, on: bool) {
        self.0.world.borrow_mut().enabled = on;
    }

    fn set_direction(&mut self, rotation: Rotation) {
        self.0.world.borrow_mut().rotation = rotation;
    }

    fn set_step(&mut self, high: bool) {
        let mut world = self.0.world.borrow_mut();
        if high && !world.step_high {
            world.carriage += match world.rotation {
                Rotation::TowardHome => -1,
                Rotation::AwayFromHome => 1,
            };
            world.pulses += 1;
        }
        world.step_high = high;
    }
}

struct SimLimitSwitch(SimBoard);

impl LimitSwitch for SimLimitSwitch {
    fn is_pressed(&mut self) -> bool {
        self.0.world.borrow().carriage <= 0
    }
}

struct SimColorSensor(SimBoard);

impl ColorSensor for SimColorSensor {
    fn begin(&mut self) -> Result<(), HardwareError> {
        if self.0.world.borrow().sensor_fails {
            return Err(HardwareError::NotResponding("color sensor"));
        }
        Ok(())
    }

    fn sample(&mut self) -> Rgb {
        let mut world = self.0.world.borrow_mut();
        world.samples_taken += 1;
        match world.queued_samples.pop_front() {
            Some(sample) => sample,
            None => world.reading(),
        }
    }
}

struct SimStrip(SimBoard);

impl LedStrip for SimStrip {
    fn len(&self) -> usize {
        self.0.world.borrow().buffer.len()
    }

    fn set(&mut self, index: usize, color: Rgb8) {
        if let Some(slot) = self.0.world.borrow_mut().buffer.get_mut(index) {
            *slot = color;
        }
    }

    fn get(&self, index: usize) -> Rgb8 {
        self.0
            .world
            .borrow()
            .buffer
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    fn show(&mut self) {
        let mut world = self.0.world.borrow_mut();
        world.leds = world.buffer.clone();
        world.shows += 1;
    }
}

struct SimDisplay(SimBoard);

impl StatusDisplay for SimDisplay {
    fn begin(&mut self) -> Result<(), HardwareError> {
        if self.0.world.borrow().display_fails {
            return Err(HardwareError::NotResponding("status display"));
        }
        Ok(())
    }

    fn draw(&mut self, screen: &Screen) {
        self.0.world.borrow_mut().screens.push(screen.clone());
    }
}

/// Virtual clock shared with the board.
pub struct SimClock(SimBoard);

impl SimClock {
    pub fn elapsed_us(&self) -> u64 {
        self.0.world.borrow().elapsed_us
    }
}

impl Clock for SimClock {
    fn delay_us(&mut self, us: u64) {
        let realtime = {
            let mut world = self.0.world.borrow_mut();
            world.elapsed_us += us;
            world.realtime
        };
        if realtime {
            std::thread::sleep(Duration::from_micros(us));
        }
    }

    fn now_ms(&self) -> u64 {
        self.elapsed_us() / 1000
    }
}

#[derive(Default)]
struct Script {
    polls: u64,
    pending: VecDeque<(u64, Request)>,
    last_status: Option<Status>,
}

/// A collaborator that issues requests on chosen polls and records what it saw.
/// Clones share the same script, so a test can keep one to inspect.
#[derive(Clone, Default)]
pub struct ScriptedService {
    script: Rc<RefCell<Script>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues `request` during poll number `poll` (the first poll is 1), or on the next
    /// poll if that one has passed.
    pub fn at(&self, poll: u64, request: Request) -> &Self {
        self.script.borrow_mut().pending.push_back((poll, request));
        self
    }

    pub fn polls(&self) -> u64 {
        self.script.borrow().polls
    }

    pub fn last_status(&self) -> Option<Status> {
        self.script.borrow().last_status.clone()
    }
}

impl Service for ScriptedService {
    fn poll(&mut self, status: &Status, inbox: &mut VecDeque<Request>) {
        let mut script = self.script.borrow_mut();
        script.polls += 1;
        let now = script.polls;
        script.last_status = Some(status.clone());

        while let Some(&(due, request)) = script.pending.front() {
            if due > now {
                break;
            }
            inbox.push_back(request);
            script.pending.pop_front();
        }
    }
}
