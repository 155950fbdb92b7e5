//! Display link renderer
//!
//! Turns draw calls into display link frames and queues them for the
//! display TX task. Queueing never blocks: when the link is backed up the
//! command is dropped and the next periodic redraw replaces it.

use defmt::*;
use portable_atomic::{AtomicU32, Ordering};

use vigil_core::traits::TextRenderer;
use vigil_protocol::LinkMessage;

use crate::channels::DRAW_QUEUE;

/// Draw commands dropped because the queue was full
static DROPPED: AtomicU32 = AtomicU32::new(0);

/// Renderer handle for the remote display terminal
///
/// Stateless, so every task that draws holds its own copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkRenderer;

impl LinkRenderer {
    /// Clear the whole screen
    pub fn clear(&mut self) {
        self.send(LinkMessage::Clear);
    }

    /// Draw commands dropped so far
    pub fn dropped() -> u32 {
        DROPPED.load(Ordering::Relaxed)
    }

    fn send(&mut self, message: LinkMessage<'_>) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode draw command: {:?}", e);
                return;
            }
        };

        if DRAW_QUEUE.try_send(frame.encode()).is_err() {
            let dropped = DROPPED.fetch_add(1, Ordering::Relaxed) + 1;
            trace!("Draw queue full, dropped command ({} total)", dropped);
        }
    }
}

impl TextRenderer for LinkRenderer {
    fn draw_text(&mut self, text: &str, x: u16, y: u16, opaque: bool) {
        self.send(LinkMessage::Text { x, y, opaque, text });
    }

    fn draw_title(&mut self, title: &str) {
        self.send(LinkMessage::Title { text: title });
    }

    fn draw_banner(&mut self, text: &str, alert: bool) {
        self.send(LinkMessage::Banner { text, alert });
    }
}
