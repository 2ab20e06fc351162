//! Bus configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Channel buffer size for bus requests
    #[serde(default = "default_channel_buffer", rename = "bus-buffer")]
    pub channel_buffer: usize,

    /// Channel buffer size for each mailbox
    #[serde(default = "default_mailbox_buffer", rename = "mailbox-buffer")]
    pub mailbox_buffer: usize,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1024
}

fn default_mailbox_buffer() -> usize {
    debug!("default_mailbox_buffer: called");
    256
}

impl Default for BusConfig {
    fn default() -> Self {
        debug!("BusConfig::default: called");
        Self {
            channel_buffer: 1024,
            mailbox_buffer: 256,
        }
    }
}
