//! Display UART transmit task
//!
//! Drains the draw queue onto the display link.

use defmt::*;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::DRAW_QUEUE;

/// Display TX task - sends queued frames to the display terminal
#[embassy_executor::task]
pub async fn display_tx_task(mut tx: BufferedUartTx<'static, UART0>) {
    info!("Display TX task started");

    loop {
        let frame = DRAW_QUEUE.receive().await;
        if let Err(e) = tx.write_all(&frame).await {
            warn!("Failed to send draw frame: {:?}", e);
        } else {
            trace!("Draw frame sent ({} bytes)", frame.len());
        }
    }
}
