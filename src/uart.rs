//! UART module
//!
//! UART implementation of the control channel for the ESP32-C3 target.

use esp_idf_hal::gpio;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::{config, UartDriver};
use log::info;

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::link::ControlLink;

/// UART control channel
pub struct UartLink {
    uart: UartDriver<'static>,
}

impl UartLink {
    /// Create the control channel on UART1 with the configured baudrate
    pub fn new(
        uart: impl Peripheral<P = esp_idf_hal::uart::UART1> + 'static,
        tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'static,
        rx_pin: impl Peripheral<P = impl gpio::InputPin> + 'static,
        link_config: &LinkConfig,
    ) -> Result<Self> {
        let uart_config = config::Config::new().baudrate(Hertz(link_config.baudrate));

        let uart = UartDriver::new(
            uart,
            tx_pin,
            rx_pin,
            Option::<gpio::Gpio0>::None, // RTS pin (not used)
            Option::<gpio::Gpio1>::None, // CTS pin (not used)
            &uart_config,
        )
        .map_err(|e| Error::LinkError(format!("Failed to create UART driver: {}", e)))?;

        info!("UART initialized with baudrate: {}", link_config.baudrate);

        Ok(Self { uart })
    }
}

impl ControlLink for UartLink {
    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.uart
            .write(data)
            .map_err(|e| Error::LinkError(format!("Failed to write to UART: {}", e)))?;
        Ok(())
    }

    fn receive_data(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.uart.read(buffer, 0) {
            Ok(len) => Ok(len),
            Err(e) => {
                // a timeout just means no data is available
                let error_string = format!("{:?}", e);
                if error_string.contains("TIMEOUT") {
                    Ok(0)
                } else {
                    Err(Error::LinkError(format!("Failed to read from UART: {}", e)))
                }
            }
        }
    }
}
