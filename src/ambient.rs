//! Light effects for the non-machine modes.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::{E, PI};

use crate::hal::{LedStrip, Rgb8};
use crate::types::Mode;

/// Hue spacing between neighbouring LEDs in the rainbow.
const RAINBOW_DELTA: u8 = 7;
const RAINBOW_STEP_MS: u64 = 20;
const FADE_HUE: u8 = 140;
const CONFETTI_FADE: u8 = 10;

pub struct Ambient {
    hue: u8,
    last_hue_step: u64,
    rng: StdRng,
}

impl Default for Ambient {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Ambient {
    pub fn new(seed: u64) -> Self {
        Self {
            hue: 0,
            last_hue_step: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws one frame of `mode` at time `now_ms`. `Mode::Turing` draws nothing.
    pub fn frame(&mut self, mode: Mode, strip: &mut dyn LedStrip, now_ms: u64) {
        match mode {
            Mode::Turing => return,
            Mode::Rainbow => self.rainbow(strip, now_ms),
            Mode::Fade => fade(strip, now_ms),
            Mode::Confetti => self.confetti(strip),
            Mode::Off => strip.clear(),
        }
        strip.show();
    }

    fn rainbow(&mut self, strip: &mut dyn LedStrip, now_ms: u64) {
        let mut hue = self.hue;
        for index in 0..strip.len() {
            strip.set(index, Rgb8::from_hsv(hue, 240, 255));
            hue = hue.wrapping_add(RAINBOW_DELTA);
        }

        if now_ms.saturating_sub(self.last_hue_step) >= RAINBOW_STEP_MS {
            self.hue = self.hue.wrapping_add(1);
            self.last_hue_step = now_ms;
        }
    }

    fn confetti(&mut self, strip: &mut dyn LedStrip) {
        for index in 0..strip.len() {
            let color = strip.get(index);
            strip.set(index, color.scaled(255 - CONFETTI_FADE));
        }

        if !strip.is_empty() {
            let index = self.rng.gen_range(0..strip.len());
            let hue = self.hue.wrapping_add(self.rng.gen_range(0..64));
            let color = strip.get(index).saturating_add(Rgb8::from_hsv(hue, 200, 255));
            strip.set(index, color);
        }
        self.hue = self.hue.wrapping_add(1);
    }
}

/// Breathing brightness over a four second period.
pub fn breath(now_ms: u64) -> u8 {
    let phase = (now_ms as f64 / 2000.0 * PI).sin();
    ((phase.exp() - 1.0 / E) * 108.0).clamp(0.0, 255.0) as u8
}

fn fade(strip: &mut dyn LedStrip, now_ms: u64) {
    strip.fill(Rgb8::from_hsv(FADE_HUE, 255, breath(now_ms)));
}
