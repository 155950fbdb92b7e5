//! Display reader task
//!
//! Peeks both channels once per period and redraws the two values. While
//! suspended it draws nothing, so the last frame stays on screen.

use crate::channel::LatestValue;
use crate::config::DisplayConfig;
use crate::format::{format_count, format_temperature};
use crate::scheduler::{Context, Task};
use crate::traits::TextRenderer;

/// Label drawn in front of the counter value
pub const COUNT_LABEL: &str = "Time:";

/// Label drawn in front of the temperature value
pub const TEMPERATURE_LABEL: &str = "Temperature:";

/// Draw the boot screen: frame title and the static labels
///
/// Labels use a transparent background; the values drawn later use an
/// opaque one.
pub fn draw_static_labels<R: TextRenderer>(renderer: &mut R, layout: &DisplayConfig) {
    renderer.draw_title(&layout.title);
    renderer.draw_text(COUNT_LABEL, layout.label_x, layout.count_y, false);
    renderer.draw_text(
        TEMPERATURE_LABEL,
        layout.label_x,
        layout.temperature_y,
        false,
    );
}

/// Display reader task
pub struct DisplayTask<'c, R> {
    renderer: R,
    counter: &'c LatestValue<u32>,
    temperature: &'c LatestValue<f32>,
    layout: DisplayConfig,
    frames: u32,
}

impl<'c, R: TextRenderer> DisplayTask<'c, R> {
    /// Create a display task reading both channels
    pub fn new(
        renderer: R,
        counter: &'c LatestValue<u32>,
        temperature: &'c LatestValue<f32>,
        layout: DisplayConfig,
    ) -> Self {
        Self {
            renderer,
            counter,
            temperature,
            layout,
            frames: 0,
        }
    }

    /// Number of frames drawn
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Draw the current values once
    pub fn render(&mut self) {
        // Nothing published yet reads as zero
        let count = self.counter.try_peek().unwrap_or(0);
        let celsius = self.temperature.try_peek().unwrap_or(0.0);

        let count = format_count(count);
        let celsius = format_temperature(celsius);

        self.renderer
            .draw_text(&count, self.layout.count_x, self.layout.count_y, true);
        self.renderer.draw_text(
            &celsius,
            self.layout.temperature_x,
            self.layout.temperature_y,
            true,
        );
        self.frames = self.frames.wrapping_add(1);
    }
}

impl<R: TextRenderer> Task for DisplayTask<'_, R> {
    fn run(&mut self, cx: &mut Context<'_>) {
        self.render();
        cx.delay_period();
    }
}
