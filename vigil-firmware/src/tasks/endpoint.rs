//! Query endpoint task
//!
//! Serves HTTP requests arriving over UART1 from a serial network bridge.
//! One request at a time: the request line is answered once its header
//! block ends, then the bridge closes the connection.

use defmt::*;
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::BufferedUart;
use embassy_time::Duration;
use embedded_io_async::{Read, Write};
use heapless::String;

use vigil_core::endpoint::{Endpoint, Response, DEFAULT_PAGES};

use crate::channels::{peek_timeout, COUNTER, QUERIES, TEMPERATURE};

/// Longest request or header line kept
const LINE_LEN: usize = 128;

/// Where the current request is in its header block
enum RequestState {
    /// Waiting for the request line
    Start,
    /// Request line stored, skipping headers until the blank line
    Headers,
}

/// Endpoint task - answers queries on the serial bridge
#[embassy_executor::task]
pub async fn endpoint_task(
    mut uart: BufferedUart<'static, UART1>,
    data_path: &'static str,
    first_sample: Duration,
) {
    info!("Endpoint task started, data path {}", data_path);

    // Give the sensor one period so the first answer carries a real reading
    match peek_timeout(&TEMPERATURE, first_sample).await {
        Some(celsius) => debug!("First temperature sample: {}", celsius),
        None => warn!("No temperature sample yet, serving zeros"),
    }

    let endpoint = Endpoint::new(data_path, &DEFAULT_PAGES, &COUNTER, &TEMPERATURE, &QUERIES);

    let mut buf = [0u8; 64];
    let mut line: String<LINE_LEN> = String::new();
    let mut request: String<LINE_LEN> = String::new();
    let mut overflow = false;
    let mut state = RequestState::Start;

    loop {
        let n = match uart.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Endpoint UART read error: {:?}", e);
                continue;
            }
        };

        for &byte in &buf[..n] {
            match byte {
                b'\r' => {}
                b'\n' => {
                    match state {
                        RequestState::Start if line.is_empty() => {}
                        RequestState::Start => {
                            // A truncated request line is answered as malformed
                            request = if overflow { String::new() } else { line.clone() };
                            state = RequestState::Headers;
                        }
                        RequestState::Headers if line.is_empty() => {
                            let response = endpoint.handle(&request);
                            debug!(
                                "Request '{}' -> {}",
                                request.as_str(),
                                response.status.code()
                            );
                            send(&mut uart, &response).await;
                            state = RequestState::Start;
                        }
                        RequestState::Headers => {}
                    }
                    line.clear();
                    overflow = false;
                }
                _ => {
                    if line.push(char::from(byte)).is_err() {
                        overflow = true;
                    }
                }
            }
        }
    }
}

/// Write a response head and body
async fn send(uart: &mut BufferedUart<'static, UART1>, response: &Response) {
    let head = response.head();
    let result = match uart.write_all(head.as_bytes()).await {
        Ok(()) => uart.write_all(response.body.as_str().as_bytes()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            if let Err(e) = uart.flush().await {
                warn!("Endpoint UART flush error: {:?}", e);
            }
        }
        Err(e) => warn!("Failed to send response: {:?}", e),
    }
}
