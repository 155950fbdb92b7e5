//! Fatal halt
//!
//! Every unrecoverable condition ends here: the reason is logged, an alert
//! banner goes to the display, and the main task parks forever. Nothing is
//! scheduled on the kernel afterwards.

use core::fmt::Write;

use defmt::{debug, error, Format};
use embassy_time::Timer;
use heapless::String;

use vigil_core::scheduler::Halt;
use vigil_core::traits::TextRenderer;

use crate::display::LinkRenderer;

/// Why the node stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Fatal {
    /// The kernel halted (task creation failure or task fault)
    Kernel(Halt),
    /// An embassy task could not be spawned
    Spawn(&'static str),
}

/// Banner shown for a fatal condition
fn banner(reason: &Fatal) -> String<48> {
    let mut text = String::new();
    match reason {
        Fatal::Kernel(Halt::Spawn(_)) => {
            let _ = text.push_str("Failed to create tasks!");
        }
        Fatal::Kernel(Halt::Fault { task, .. }) => {
            let _ = write!(text, "Task fault: {}", task);
        }
        Fatal::Spawn(_) => {
            let _ = text.push_str("Failed to start scheduler!");
        }
    }
    text
}

/// Report `reason` and park forever
pub async fn halt(reason: Fatal) -> ! {
    error!("Node halted: {:?}", reason);
    debug!("Draw commands dropped: {}", LinkRenderer::dropped());

    let mut renderer = LinkRenderer;
    renderer.draw_banner(&banner(&reason), true);

    loop {
        Timer::after_secs(60).await;
    }
}
