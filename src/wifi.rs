//! WiFi module
//!
//! Station-mode association as the bridge consumes it: kick off a fresh
//! association, wait (bounded) for the outcome, query link state.

use std::time::Duration;

use crate::error::Result;

/// Station-mode WiFi control
pub trait WifiControl {
    /// Tear down any existing association and start a fresh one
    fn reassociate(&mut self, ssid: &str, password: &str) -> Result<()>;

    /// Block up to `timeout` for the association outcome
    fn wait_association(&mut self, timeout: Duration) -> Result<bool>;

    /// Currently associated to an access point?
    fn is_associated(&self) -> bool;

    /// Signal strength of the current association, if any
    fn rssi(&self) -> Option<i32>;
}

/// WiFi simulator for host builds: associates to anything
pub struct SimWifi {
    associated: bool,
}

impl SimWifi {
    pub fn new() -> Self {
        Self { associated: false }
    }
}

impl Default for SimWifi {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiControl for SimWifi {
    fn reassociate(&mut self, ssid: &str, _password: &str) -> Result<()> {
        log::info!("Simulated association to \"{}\"", ssid);
        self.associated = true;
        Ok(())
    }

    fn wait_association(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.associated)
    }

    fn is_associated(&self) -> bool {
        self.associated
    }

    fn rssi(&self) -> Option<i32> {
        self.associated.then_some(-40)
    }
}

#[cfg(feature = "esp32")]
pub use esp::EspWifiControl;

#[cfg(feature = "esp32")]
mod esp {
    use super::WifiControl;
    use crate::error::{Error, Result};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
    use log::info;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Station-mode driver on top of [`EspWifi`]
    pub struct EspWifiControl {
        wifi: Box<EspWifi<'static>>,
    }

    impl EspWifiControl {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
        ) -> Result<Self> {
            let mut wifi = Box::new(
                EspWifi::new(modem, sysloop, Some(nvs))
                    .map_err(|e| Error::WiFiError(format!("Failed to create WiFi driver: {}", e)))?,
            );

            wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))
                .map_err(|e| Error::WiFiError(format!("Failed to configure station mode: {}", e)))?;
            wifi.start()
                .map_err(|e| Error::WiFiError(format!("Failed to start WiFi: {}", e)))?;

            info!("WiFi started in station mode");

            Ok(Self { wifi })
        }
    }

    impl WifiControl for EspWifiControl {
        fn reassociate(&mut self, ssid: &str, password: &str) -> Result<()> {
            // a failing disconnect just means there was nothing to tear down
            let _ = self.wifi.disconnect();

            let config = ClientConfiguration {
                ssid: heapless::String::try_from(ssid)
                    .map_err(|_| Error::WiFiError("SSID too long".to_string()))?,
                password: heapless::String::try_from(password)
                    .map_err(|_| Error::WiFiError("Password too long".to_string()))?,
                auth_method: AuthMethod::WPA2Personal,
                ..Default::default()
            };

            self.wifi
                .set_configuration(&Configuration::Client(config))
                .map_err(|e| Error::WiFiError(format!("Failed to set credentials: {}", e)))?;
            self.wifi
                .connect()
                .map_err(|e| Error::WiFiError(format!("Failed to initiate association: {}", e)))?;

            Ok(())
        }

        fn wait_association(&mut self, timeout: Duration) -> Result<bool> {
            let deadline = Instant::now() + timeout;

            while Instant::now() < deadline {
                if self.wifi.is_connected().unwrap_or(false) {
                    return Ok(true);
                }
                thread::sleep(Duration::from_millis(100));
            }

            Ok(false)
        }

        fn is_associated(&self) -> bool {
            self.wifi.is_connected().unwrap_or(false)
        }

        fn rssi(&self) -> Option<i32> {
            let mut record = esp_idf_sys::wifi_ap_record_t::default();
            let err = unsafe { esp_idf_sys::esp_wifi_sta_get_ap_info(&mut record) };
            if err == esp_idf_sys::ESP_OK {
                Some(record.rssi as i32)
            } else {
                None
            }
        }
    }
}
