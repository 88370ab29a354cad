//! The main loop of the rig.
//!
//! `Rig` owns every component. One [`Rig::tick`] polls the request collaborator, applies
//! the queued requests and then either runs one machine cycle or draws one ambient
//! frame. Long operations service the collaborator through a callback; whatever it asks
//! for during motion waits in the inbox until the next tick.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::ambient::Ambient;
use crate::axis::Axis;
use crate::config::{RigConfig, ScheduleConfig};
use crate::display::{Screen, StatusFrame, StatusPanel};
use crate::hal::{Clock, ColorSensor, LedStrip, LimitSwitch, Rgb8, Service, StatusDisplay, Stepper};
use crate::loader::ProgramLoader;
use crate::machine::Machine;
use crate::sensor::SymbolSensor;
use crate::types::{LoadRequest, Mode, Request, RigError, Status, Step};
use crate::visualizer::TapeVisualizer;

/// The devices a rig is built from.
pub struct Board {
    pub stepper: Box<dyn Stepper>,
    pub limit_switch: Box<dyn LimitSwitch>,
    pub color_sensor: Box<dyn ColorSensor>,
    pub led_strip: Box<dyn LedStrip>,
    pub display: Box<dyn StatusDisplay>,
    pub clock: Box<dyn Clock>,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Machine mode, but the machine is not running.
    Idle,
    /// One machine cycle ran.
    Cycle(Step),
    /// One ambient frame was drawn.
    Ambient,
}

/// The whole rig: the machine context and every device it drives.
pub struct Rig {
    machine: Machine,
    axis: Axis,
    sensor: SymbolSensor,
    visualizer: TapeVisualizer,
    panel: StatusPanel,
    ambient: Ambient,
    clock: Box<dyn Clock>,
    service: Box<dyn Service>,
    inbox: VecDeque<Request>,
    mode: Mode,
    schedule: ScheduleConfig,
    operation: String,
    halt_acknowledged: bool,
}

impl Rig {
    /// Brings the rig up: motor on, devices initialized, blank tape shown, carriage
    /// homed. Devices that fail to start are logged and left out.
    pub fn boot(board: Board, service: Box<dyn Service>, config: &RigConfig) -> Self {
        let mut axis = Axis::new(board.stepper, board.limit_switch, config.motion.clone());
        axis.enable();

        let sensor = SymbolSensor::begin(board.color_sensor, config.sensing.clone());
        let mut panel = StatusPanel::begin(board.display);
        panel.show(&Screen::Booting);

        let mut rig = Self {
            machine: Machine::new(),
            axis,
            sensor,
            visualizer: TapeVisualizer::new(board.led_strip, config.strip.clone()),
            panel,
            ambient: Ambient::default(),
            clock: board.clock,
            service,
            inbox: VecDeque::new(),
            mode: Mode::Turing,
            schedule: config.schedule.clone(),
            operation: "No program".to_string(),
            halt_acknowledged: false,
        };

        rig.render_tape();
        rig.home();
        rig.refresh_display();
        info!(
            sensor = !rig.sensor.is_blind(),
            display = rig.panel.is_available(),
            "rig ready"
        );

        rig
    }

    /// Runs one iteration of the main loop.
    pub fn tick(&mut self) -> Result<Tick, RigError> {
        let status = self.status();
        self.service.poll(&status, &mut self.inbox);

        while let Some(request) = self.inbox.pop_front() {
            self.apply(request)?;
        }

        if !self.mode.is_machine() {
            self.ambient_frame();
            return Ok(Tick::Ambient);
        }

        if !self.machine.is_running() {
            return Ok(Tick::Idle);
        }

        let step = self.cycle()?;
        self.clock.delay_ms(self.schedule.cycle_delay_ms);

        Ok(Tick::Cycle(step))
    }

    /// Ticks until the machine stops running and no requests are waiting, or until
    /// `max_ticks`. Returns the number of ticks taken.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> Result<usize, RigError> {
        for ticks in 1..=max_ticks {
            self.tick()?;
            if !self.machine.is_running() && self.inbox.is_empty() {
                return Ok(ticks);
            }
        }

        Ok(max_ticks)
    }

    /// Queues a request as if the collaborator had sent it.
    pub fn submit(&mut self, request: Request) {
        self.inbox.push_back(request);
    }

    pub fn status(&self) -> Status {
        self.machine.status(self.mode)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The loaded operation, e.g. `SUB 2 - 5`.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    fn apply(&mut self, request: Request) -> Result<(), RigError> {
        debug!(?request, "applying request");

        match request {
            Request::Load(load) => self.load(load)?,
            Request::Run(running) => {
                if running && self.mode != Mode::Turing {
                    self.mode = Mode::Turing;
                    self.render_tape();
                }
                self.machine.set_running(running);
                self.refresh_display();
            }
            Request::Mode(mode) => {
                self.machine.set_running(false);
                self.mode = mode;
                if mode.is_machine() {
                    self.render_tape();
                }
                self.refresh_display();
            }
        }

        Ok(())
    }

    fn load(&mut self, request: LoadRequest) -> Result<(), RigError> {
        ProgramLoader::load(&mut self.machine, request)?;
        self.mode = Mode::Turing;
        self.operation = ProgramLoader::describe(&request);
        self.halt_acknowledged = false;

        self.home();

        let Rig {
            machine,
            axis,
            clock,
            service,
            inbox,
            mode,
            ..
        } = self;
        let status = machine.status(*mode);
        axis.go_to(
            machine.head() as i64,
            clock.as_mut(),
            &mut || service.poll(&status, inbox),
        )?;

        self.render_tape();
        self.refresh_display();

        Ok(())
    }

    /// Moves over the head cell, senses it, steps the machine and shows the result.
    fn cycle(&mut self) -> Result<Step, RigError> {
        let Rig {
            machine,
            axis,
            sensor,
            visualizer,
            clock,
            service,
            inbox,
            mode,
            ..
        } = self;
        let status = machine.status(*mode);
        let mut serve = || service.poll(&status, inbox);

        let cell = axis.go_to(machine.head() as i64, clock.as_mut(), &mut serve)?;
        let sensed = sensor.sense(cell, machine, visualizer, clock.as_mut(), &mut serve);

        let from = machine.state();
        let step = machine.step(sensed);
        debug!(
            cell,
            symbol = ?sensed,
            from = %from,
            to = %machine.state(),
            ?step,
            "cycle"
        );

        visualizer.render(machine.tape(), machine.head(), true);

        if step == Step::Halt {
            self.machine.set_running(false);
            self.acknowledge_halt();
        }
        self.refresh_display();

        Ok(step)
    }

    /// Flashes the strip once per load when the machine reaches a terminal state.
    fn acknowledge_halt(&mut self) {
        if self.halt_acknowledged {
            return;
        }
        self.halt_acknowledged = true;

        info!(
            operation = %self.operation,
            state = %self.machine.state(),
            tape = %self.machine.tape(),
            steps = self.machine.step_count(),
            "machine halted"
        );

        self.visualizer
            .flash(Rgb8::GREEN, self.schedule.halt_flash_ms, self.clock.as_mut());
        self.render_tape();
    }

    fn home(&mut self) {
        self.panel.show(&Screen::Homing);

        let Rig {
            machine,
            axis,
            clock,
            service,
            inbox,
            mode,
            ..
        } = self;
        let status = machine.status(*mode);
        axis.home(clock.as_mut(), &mut || service.poll(&status, inbox));
    }

    fn ambient_frame(&mut self) {
        let now = self.clock.now_ms();
        self.ambient
            .frame(self.mode, self.visualizer.strip_mut(), now);

        let frame_ms = if self.mode == Mode::Off {
            self.schedule.off_frame_ms
        } else {
            self.schedule.ambient_frame_ms
        };
        self.clock.delay_ms(frame_ms);
    }

    fn render_tape(&mut self) {
        self.visualizer
            .render(self.machine.tape(), self.machine.head(), true);
    }

    fn refresh_display(&mut self) {
        let screen = if self.mode.is_machine() {
            Screen::Status(StatusFrame {
                operation: self.operation.clone(),
                state: self.machine.state(),
                running: self.machine.is_running(),
                head: self.machine.head(),
            })
        } else {
            Screen::Ambient {
                off: self.mode == Mode::Off,
            }
        };

        self.panel.show(&screen);
    }
}
