//! Status module
//!
//! Read-only diagnostics page on a fixed port: recent (redacted) command
//! history plus link and uptime numbers. Requests are polled cooperatively
//! from the bridge loop, never blocking it.

use log::{debug, info};
use tiny_http::{Request, Response, Server};

use crate::error::{Error, Result};
use crate::history::{CommandHistory, HISTORY_SIZE};

/// Everything the report shows, sampled at request time
pub struct StatusSnapshot<'a> {
    pub history: &'a CommandHistory<HISTORY_SIZE>,
    pub connections: usize,
    pub server_port: Option<u16>,
    pub rssi: Option<i32>,
    pub uptime_secs: u64,
    pub reset_reason: &'a str,
}

/// Render the plain-text status report
pub fn build_report(snapshot: &StatusSnapshot<'_>) -> String {
    let mut report = String::from("atbridge WiFi serial modem\n\nAT history:\n");

    for entry in snapshot.history.iter() {
        report.push_str("> ");
        report.push_str(entry);
        report.push('\n');
    }

    let port = match snapshot.server_port {
        Some(port) => port.to_string(),
        None => String::from("-"),
    };
    let rssi = match snapshot.rssi {
        Some(rssi) => rssi.to_string(),
        None => String::from("n/a"),
    };

    report.push_str(&format!(
        "\nconnections: {}, server port: {}\nRSSI: {}, uptime: {} sec, reset reason: {}\n",
        snapshot.connections, port, rssi, snapshot.uptime_secs, snapshot.reset_reason
    ));

    report
}

/// Cooperative HTTP endpoint serving the status report
pub struct StatusReporter {
    server: Server,
}

impl StatusReporter {
    /// Bind the reporter on the given port
    pub fn bind(port: u16) -> Result<Self> {
        let server = Server::http(("0.0.0.0", port))
            .map_err(|e| Error::General(format!("Failed to bind status server on port {}: {}", port, e)))?;

        info!("Status server listening on port {}", port);
        Ok(Self { server })
    }

    /// One pending request, if any (non-blocking)
    pub fn try_recv(&mut self) -> Option<Request> {
        match self.server.try_recv() {
            Ok(request) => request,
            Err(e) => {
                debug!("Status server receive failed: {}", e);
                None
            }
        }
    }

    /// Answer a request with the report
    pub fn respond(&mut self, request: Request, snapshot: &StatusSnapshot<'_>) {
        if request.url() != "/" {
            if let Err(e) = request.respond(Response::empty(404)) {
                debug!("Status response failed: {}", e);
            }
            return;
        }

        let report = build_report(snapshot);
        if let Err(e) = request.respond(Response::from_string(report)) {
            debug!("Status response failed: {}", e);
        }
    }
}
