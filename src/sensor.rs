//! Tri-state symbol sensing.
//!
//! A cell is sampled through the carriage's color sensor and reduced to ONE, ZERO or
//! ambiguous by channel dominance. ZERO is how a blank cell looks. Ambiguous readings
//! never fail: they resolve to whatever the tape already records.

use tracing::{trace, warn};

use crate::config::SensingConfig;
use crate::hal::{Clock, ColorSensor, Rgb};
use crate::machine::Machine;
use crate::types::Symbol;
use crate::visualizer::TapeVisualizer;

/// The raw classification of an averaged color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    One,
    Zero,
    Ambiguous,
}

/// Classifies a sample: green dominant by `one_margin` is ONE, blue dominant by
/// `zero_margin` is ZERO, anything else is ambiguous.
pub fn classify(rgb: Rgb, config: &SensingConfig) -> Reading {
    let Rgb { r, g, b } = rgb;

    if g > r + config.one_margin && g > b + config.one_margin {
        Reading::One
    } else if b > r + config.zero_margin && b > g + config.zero_margin {
        Reading::Zero
    } else {
        Reading::Ambiguous
    }
}

/// Turns a reading into a symbol given what the tape recorded for the cell.
///
/// Ambiguous readings keep the recorded symbol, and a recorded ONE is never downgraded
/// to blank by a ZERO reading.
pub fn resolve(reading: Reading, recorded: Symbol) -> Symbol {
    let detected = match reading {
        Reading::One => Symbol::One,
        Reading::Zero => Symbol::Blank,
        Reading::Ambiguous => recorded,
    };

    if detected == Symbol::Blank && recorded == Symbol::One {
        Symbol::One
    } else {
        detected
    }
}

/// Reads tape symbols through the carriage's color sensor, or blind when it is missing.
pub struct SymbolSensor {
    device: Option<Box<dyn ColorSensor>>,
    config: SensingConfig,
}

impl SymbolSensor {
    /// Initializes `device`. A device that does not respond is dropped and the sensor
    /// runs blind, returning the recorded symbols.
    pub fn begin(mut device: Box<dyn ColorSensor>, config: SensingConfig) -> Self {
        let device = match device.begin() {
            Ok(()) => Some(device),
            Err(e) => {
                warn!(error = %e, "color sensor unavailable, sensing falls back to the recorded tape");
                None
            }
        };

        Self { device, config }
    }

    pub fn is_blind(&self) -> bool {
        self.device.is_none()
    }

    /// Reads `cell`. The carriage must already be over it.
    ///
    /// The head marker is switched off while sampling so the sensor sees the cell's own
    /// color, which also gives a visible read pulse.
    pub fn sense(
        &mut self,
        cell: usize,
        machine: &Machine,
        visualizer: &mut TapeVisualizer,
        clock: &mut dyn Clock,
        service: &mut dyn FnMut(),
    ) -> Symbol {
        let recorded = machine.tape().get(cell);
        if recorded == Symbol::Separator {
            return Symbol::Separator;
        }

        visualizer.render(machine.tape(), machine.head(), false);
        settle(&self.config, clock, service);

        let reading = match self.device.as_mut() {
            Some(device) => {
                let rgb = average(device.as_mut(), &self.config, clock, service);
                let reading = classify(rgb, &self.config);
                trace!(cell, r = rgb.r, g = rgb.g, b = rgb.b, ?reading, "sampled cell");
                reading
            }
            None => Reading::Ambiguous,
        };

        visualizer.render(machine.tape(), machine.head(), true);

        resolve(reading, recorded)
    }
}

/// Waits `settle_ms` in `sample_interval_ms` slices, servicing after each slice.
fn settle(config: &SensingConfig, clock: &mut dyn Clock, service: &mut dyn FnMut()) {
    let slice = config.sample_interval_ms.max(1);
    let mut waited = 0;

    while waited < config.settle_ms {
        let wait = slice.min(config.settle_ms - waited);
        clock.delay_ms(wait);
        service();
        waited += wait;
    }
}

fn average(
    device: &mut dyn ColorSensor,
    config: &SensingConfig,
    clock: &mut dyn Clock,
    service: &mut dyn FnMut(),
) -> Rgb {
    let samples = config.samples.max(1);
    let mut total = Rgb::default();

    for _ in 0..samples {
        let sample = device.sample();
        total.r += sample.r;
        total.g += sample.g;
        total.b += sample.b;
        clock.delay_ms(config.sample_interval_ms);
        service();
    }

    let n = samples as f32;
    Rgb::new(total.r / n, total.g / n, total.b / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;
    use crate::loader::ProgramLoader;
    use crate::sim::SimBoard;
    use crate::types::{LoadRequest, Operation};

    fn config() -> SensingConfig {
        SensingConfig::default()
    }

    #[test]
    fn test_classify_dominant_channels() {
        assert_eq!(classify(Rgb::new(60.0, 120.0, 70.0), &config()), Reading::One);
        assert_eq!(classify(Rgb::new(50.0, 60.0, 140.0), &config()), Reading::Zero);
        assert_eq!(classify(Rgb::new(90.0, 95.0, 92.0), &config()), Reading::Ambiguous);
    }

    #[test]
    fn test_classify_margins_are_strict() {
        // Green must beat both other channels by more than 8.
        assert_eq!(classify(Rgb::new(80.0, 88.0, 70.0), &config()), Reading::Ambiguous);
        assert_eq!(classify(Rgb::new(80.0, 88.1, 70.0), &config()), Reading::One);
        // Blue must beat both other channels by more than 10.
        assert_eq!(classify(Rgb::new(80.0, 70.0, 90.0), &config()), Reading::Ambiguous);
        assert_eq!(classify(Rgb::new(80.0, 70.0, 90.5), &config()), Reading::Zero);
    }

    #[test]
    fn test_resolve_fallback_and_lock() {
        assert_eq!(resolve(Reading::One, Symbol::Blank), Symbol::One);
        assert_eq!(resolve(Reading::Zero, Symbol::Blank), Symbol::Blank);
        assert_eq!(resolve(Reading::Ambiguous, Symbol::One), Symbol::One);
        assert_eq!(resolve(Reading::Ambiguous, Symbol::Blank), Symbol::Blank);
        // A recorded one does not flicker back to blank.
        assert_eq!(resolve(Reading::Zero, Symbol::One), Symbol::One);
    }

    fn rig_parts(board: &SimBoard) -> (Machine, TapeVisualizer) {
        let config = RigConfig::default();
        let mut machine = Machine::new();
        ProgramLoader::load(
            &mut machine,
            LoadRequest {
                a: 1,
                b: 1,
                op: Operation::Add,
            },
        )
        .unwrap();
        let visualizer = TapeVisualizer::new(board.led_strip(), config.strip);
        (machine, visualizer)
    }

    #[test]
    fn test_separator_short_circuits() {
        let board = SimBoard::default();
        let (machine, mut visualizer) = rig_parts(&board);
        let mut sensor = SymbolSensor::begin(board.color_sensor(), config());
        let mut clock = board.clock();

        let symbol = sensor.sense(1, &machine, &mut visualizer, &mut clock, &mut || {});
        assert_eq!(symbol, Symbol::Separator);
        assert_eq!(board.samples_taken(), 0);
        assert_eq!(clock.elapsed_us(), 0);
    }

    #[test]
    fn test_sense_averages_samples_and_services() {
        let board = SimBoard::default();
        let (machine, mut visualizer) = rig_parts(&board);
        let mut sensor = SymbolSensor::begin(board.color_sensor(), config());
        let mut clock = board.clock();
        let mut calls = 0;

        // Noisy but clearly green.
        board.queue_samples(&[
            Rgb::new(40.0, 200.0, 30.0),
            Rgb::new(90.0, 100.0, 80.0),
            Rgb::new(50.0, 150.0, 40.0),
        ]);
        let symbol = sensor.sense(5, &machine, &mut visualizer, &mut clock, &mut || calls += 1);

        assert_eq!(symbol, Symbol::One);
        assert_eq!(board.samples_taken(), 3);
        // 25 settle slices, then one call per sample.
        assert_eq!(calls, 25 + 3);
        assert_eq!(clock.elapsed_us(), (250 + 3 * 10) * 1000);
    }

    #[test]
    fn test_blind_sensor_uses_recorded_tape() {
        let board = SimBoard::default();
        board.fail_sensor();
        let (machine, mut visualizer) = rig_parts(&board);
        let mut sensor = SymbolSensor::begin(board.color_sensor(), config());
        let mut clock = board.clock();

        assert!(sensor.is_blind());
        let symbol = sensor.sense(0, &machine, &mut visualizer, &mut clock, &mut || {});
        assert_eq!(symbol, Symbol::One);
        assert_eq!(board.samples_taken(), 0);
    }

    #[test]
    fn test_read_indicator_restores_head_marker() {
        let board = SimBoard::default();
        let (machine, mut visualizer) = rig_parts(&board);
        let mut sensor = SymbolSensor::begin(board.color_sensor(), config());
        let mut clock = board.clock();

        board.queue_samples(&[Rgb::new(0.0, 0.0, 255.0); 3]);
        sensor.sense(0, &machine, &mut visualizer, &mut clock, &mut || {});

        // Two renders: marker off while sampling, marker back on afterwards.
        assert_eq!(board.strip_shows(), 2);
        assert_eq!(board.led(35), crate::hal::Rgb8::RED);
    }
}
