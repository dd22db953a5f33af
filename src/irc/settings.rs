use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// connection settings of the irc bot
pub struct IrcSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// PEM file with the CA the server certificate is checked against. The
    /// system trust store is used if unset.
    pub ca_file: Option<PathBuf>,
    pub nickname: String,
    pub realname: String,
    /// server password sent with `PASS`
    pub password: Option<String>,
    /// channel (or nickname) the alerts are sent to
    pub channel: String,
    pub channel_key: Option<String>,
    #[serde_as(as = "DurationSeconds<f64>")]
    pub send_timeout: Duration,
    #[serde_as(as = "DurationSeconds<f64>")]
    pub reconnect_initial_interval: Duration,
    #[serde_as(as = "DurationSeconds<f64>")]
    pub reconnect_max_interval: Duration,
    /// number of notifications waiting for the connection before new ones are dropped
    pub queue_capacity: usize,
}

impl IrcSettings {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
