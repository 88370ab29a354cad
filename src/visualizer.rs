//! Renders the tape onto the LED strip.
//!
//! Each cell lights a pair of adjacent LEDs. Cell 0 owns `first_led` and the LED below
//! it, and cells walk toward the start of the strip.

use crate::config::StripConfig;
use crate::hal::{Clock, LedStrip, Rgb8};
use crate::types::{Symbol, Tape, CELL_COUNT};

/// Colors used for the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub one: Rgb8,
    pub blank: Rgb8,
    pub separator: Rgb8,
    pub head: Rgb8,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            one: Rgb8::GREEN,
            blank: Rgb8::BLUE.scaled(40),
            separator: Rgb8::DARK_BLUE.scaled(50),
            head: Rgb8::RED,
        }
    }
}

impl Palette {
    pub fn color(&self, symbol: Symbol) -> Rgb8 {
        match symbol {
            Symbol::One => self.one,
            Symbol::Blank => self.blank,
            Symbol::Separator => self.separator,
        }
    }
}

/// The two LED indices lit by `cell`, upper first. Either may be off the strip.
pub fn led_pair(cell: usize, layout: &StripConfig) -> (i64, i64) {
    let upper = layout.first_led - 2 * cell as i64;
    (upper, upper - 1)
}

/// Computes the pixel assignment for the tape. Pairs that do not fit on the strip are
/// left out.
pub fn frame(
    tape: &Tape,
    head: usize,
    show_head: bool,
    layout: &StripConfig,
    palette: &Palette,
) -> Vec<(usize, Rgb8)> {
    let mut pixels = Vec::with_capacity(2 * CELL_COUNT);

    for (cell, &symbol) in tape.symbols().iter().enumerate() {
        let (upper, lower) = led_pair(cell, layout);
        if lower < 0 || upper >= layout.led_count as i64 {
            continue;
        }

        let color = if show_head && cell == head {
            palette.head
        } else {
            palette.color(symbol)
        };

        pixels.push((upper as usize, color));
        pixels.push((lower as usize, color));
    }

    pixels
}

/// Draws the tape on the LED strip.
pub struct TapeVisualizer {
    strip: Box<dyn LedStrip>,
    layout: StripConfig,
    palette: Palette,
}

impl TapeVisualizer {
    pub fn new(strip: Box<dyn LedStrip>, layout: StripConfig) -> Self {
        Self {
            strip,
            layout,
            palette: Palette::default(),
        }
    }

    /// Clears the strip and shows the tape.
    pub fn render(&mut self, tape: &Tape, head: usize, show_head: bool) {
        self.strip.clear();
        for (index, color) in frame(tape, head, show_head, &self.layout, &self.palette) {
            self.strip.set(index, color);
        }
        self.strip.show();
    }

    /// Fills the whole strip with `color`, holds, goes dark and holds again.
    pub fn flash(&mut self, color: Rgb8, hold_ms: u64, clock: &mut dyn Clock) {
        self.strip.fill(color);
        self.strip.show();
        clock.delay_ms(hold_ms);
        self.strip.clear();
        self.strip.show();
        clock.delay_ms(hold_ms);
    }

    /// Raw access for the ambient effects.
    pub fn strip_mut(&mut self) -> &mut dyn LedStrip {
        self.strip.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ProgramLoader;

    fn layout() -> StripConfig {
        StripConfig::default()
    }

    #[test]
    fn test_led_pair_mapping() {
        assert_eq!(led_pair(0, &layout()), (35, 34));
        assert_eq!(led_pair(12, &layout()), (11, 10));
    }

    #[test]
    fn test_frame_colors() {
        let tape = ProgramLoader::encode(1, 1);
        let palette = Palette::default();
        let pixels = frame(&tape, 1, false, &layout(), &palette);

        assert_eq!(pixels.len(), 2 * CELL_COUNT);
        assert_eq!(pixels[0], (35, palette.one));
        assert_eq!(pixels[1], (34, palette.one));
        assert_eq!(pixels[2], (33, palette.separator));
        assert_eq!(pixels[6], (29, palette.blank));
    }

    #[test]
    fn test_frame_head_marker() {
        let tape = ProgramLoader::encode(1, 1);
        let palette = Palette::default();
        let pixels = frame(&tape, 1, true, &layout(), &palette);

        assert_eq!(pixels[2], (33, palette.head));
        assert_eq!(pixels[3], (32, palette.head));
        assert_eq!(pixels[0], (35, palette.one));
    }

    #[test]
    fn test_frame_skips_cells_off_the_strip() {
        let tape = Tape::blank();
        let short = StripConfig {
            led_count: 142,
            first_led: 7,
        };
        // Cells 0..=3 fit (LEDs 7..=0); cell 4 would need LED -1.
        assert_eq!(frame(&tape, 0, true, &short, &Palette::default()).len(), 8);

        let tail = StripConfig {
            led_count: 30,
            first_led: 35,
        };
        // Cells 0..=2 need LEDs 35..=30, past the end of a 30 LED strip.
        let pixels = frame(&tape, 0, true, &tail, &Palette::default());
        assert_eq!(pixels.len(), 2 * (CELL_COUNT - 3));
        assert!(pixels.iter().all(|&(index, _)| index < 30));
    }

    #[test]
    fn test_palette_dims_blank_and_separator() {
        let palette = Palette::default();
        assert_eq!(palette.blank, Rgb8::new(0, 0, 40));
        assert_eq!(palette.separator, Rgb8::new(0, 0, 27));
    }
}
