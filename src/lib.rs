pub mod at;
pub mod bridge;
pub mod config;
pub mod creds;
pub mod error;
pub mod history;
pub mod link;
pub mod net;
pub mod recovery;
pub mod slots;
pub mod status;
pub mod storage;
pub mod tcp_server;
#[cfg(feature = "esp32")]
pub mod uart;
pub mod wifi;

pub use bridge::{Bridge, Platform};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
