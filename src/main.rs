#[cfg(feature = "esp32")]
use esp_idf_sys as _; // If using the `binstart` feature of `esp-idf-sys`, always keep this module imported

fn main() -> anyhow::Result<()> {
    run()
}

/// Run the bridge on the ESP32-C3: UART control channel, station WiFi,
/// NVS credentials, RTC-memory recovery register
#[cfg(feature = "esp32")]
fn run() -> anyhow::Result<()> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info, warn};

    use atbridge::bridge::{Bridge, Platform};
    use atbridge::config::create_config;
    use atbridge::net::StdTcpStack;
    use atbridge::recovery::RtcScratch;
    use atbridge::status::StatusReporter;
    use atbridge::storage::NvsStorage;
    use atbridge::uart::UartLink;
    use atbridge::wifi::EspWifiControl;

    struct EspPlatform;

    impl Platform for EspPlatform {
        type Link = UartLink;
        type Wifi = EspWifiControl;
        type Stack = StdTcpStack;
        type Store = NvsStorage;
        type Scratch = RtcScratch;
    }

    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("atbridge starting up...");

    let config = create_config();
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let wifi = EspWifiControl::new(peripherals.modem, sysloop, nvs)?;
    let link = UartLink::new(
        peripherals.uart1,
        peripherals.pins.gpio21,
        peripherals.pins.gpio20,
        &config.link,
    )?;
    let store = NvsStorage::new()?;

    let reset_reason = format!("{:?}", esp_idf_hal::reset::ResetReason::get());
    info!("Last reset reason: {}", reset_reason);

    let diag_port = config.diag.port;
    let mut bridge: Bridge<EspPlatform> =
        Bridge::new(link, wifi, StdTcpStack, store, RtcScratch, config)
            .with_reset_reason(reset_reason);

    match StatusReporter::bind(diag_port) {
        Ok(status) => bridge = bridge.with_status(status),
        Err(e) => warn!("Status server unavailable: {}", e),
    }

    if let Err(e) = bridge.run() {
        error!("Bridge stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// Run the bridge on a host: a TCP console stands in for the UART, the WiFi
/// simulator associates to anything, and two files stand in for NVS and the
/// reset-surviving scratch memory
#[cfg(not(feature = "esp32"))]
fn run() -> anyhow::Result<()> {
    use log::{error, info, warn};

    use atbridge::bridge::{Bridge, Platform};
    use atbridge::config::create_config;
    use atbridge::link::TcpConsole;
    use atbridge::net::StdTcpStack;
    use atbridge::recovery::FileScratch;
    use atbridge::status::StatusReporter;
    use atbridge::storage::FileStorage;
    use atbridge::wifi::SimWifi;

    struct HostPlatform;

    impl Platform for HostPlatform {
        type Link = TcpConsole;
        type Wifi = SimWifi;
        type Stack = StdTcpStack;
        type Store = FileStorage;
        type Scratch = FileScratch;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("atbridge starting up (host mode)...");

    let config = create_config();
    let link = TcpConsole::bind(config.link.console_port)?;
    let store = FileStorage::new("atbridge-creds.bin");
    let scratch = FileScratch::new(std::env::temp_dir().join("atbridge-scratch.bin"));

    info!("==================================================");
    info!("atbridge is running");
    info!("Control console port: {}", config.link.console_port);
    info!("Status page port: {}", config.diag.port);
    info!("==================================================");

    let diag_port = config.diag.port;
    let mut bridge: Bridge<HostPlatform> =
        Bridge::new(link, SimWifi::new(), StdTcpStack, store, scratch, config)
            .with_reset_reason("process start");

    match StatusReporter::bind(diag_port) {
        Ok(status) => bridge = bridge.with_status(status),
        Err(e) => warn!("Status server unavailable: {}", e),
    }

    if let Err(e) = bridge.run() {
        error!("Bridge stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}
