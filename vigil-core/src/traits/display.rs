//! Rendering collaborator

/// Text drawing on the node's display
///
/// Calls are assumed non-blocking and non-failing from the caller's point
/// of view. Implementations that talk to a remote terminal queue the
/// command and drop it if the link is backed up.
pub trait TextRenderer {
    /// Draw `text` with its left edge at `x`, vertically centred on `y`
    ///
    /// With `opaque` set the glyph background is filled, so a shorter
    /// string fully replaces a longer one drawn at the same spot.
    fn draw_text(&mut self, text: &str, x: u16, y: u16, opaque: bool);

    /// Draw the application frame with a title bar
    fn draw_title(&mut self, title: &str);

    /// Draw a message centred on screen
    ///
    /// `alert` selects the alert colour (used for fatal conditions).
    fn draw_banner(&mut self, text: &str, alert: bool);
}

impl<R: TextRenderer + ?Sized> TextRenderer for &mut R {
    fn draw_text(&mut self, text: &str, x: u16, y: u16, opaque: bool) {
        (**self).draw_text(text, x, y, opaque)
    }

    fn draw_title(&mut self, title: &str) {
        (**self).draw_title(title)
    }

    fn draw_banner(&mut self, text: &str, alert: bool) {
        (**self).draw_banner(text, alert)
    }
}
