use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{
    alertmanager_webhook_receiver::AlertReceiverSettings, irc::IrcSettings, log::LogSettings,
    pipeline::NotifySettings, telemetry_endpoint::TelemetryEndpointSettings,
};

/// prefix of environment variables overriding the config file, e.g. `PROMIRC__IRC__CHANNEL`
const ENV_PREFIX: &str = "PROMIRC";

/// Settings are loaded once in `main` and handed down to the components.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub irc: IrcSettings,
    pub notify: NotifySettings,
    pub alert_webhook_receiver: AlertReceiverSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(command().get_matches())
    }

    fn load_from(opts: ArgMatches) -> Result<Self> {
        let config_path = opts.value_of("config").unwrap_or("./config.yaml");

        let conf = Config::builder()
            .set_default("irc.host", "irc.hackint.org")?
            .set_default("irc.port", 6697)?
            .set_default("irc.tls", true)?
            .set_default("irc.nickname", "prom-irc")?
            .set_default("irc.realname", "prom-irc")?
            .set_default("irc.channel", "#fleaz")?
            .set_default("irc.send_timeout", 10.0)?
            .set_default("irc.reconnect_initial_interval", 1.0)?
            .set_default("irc.reconnect_max_interval", 300.0)?
            .set_default("irc.queue_capacity", 64)?
            .set_default("notify.shorten_instances", true)?
            .set_default("notify.representative_alert", "payload-first")?
            .set_default("alert_webhook_receiver.bind_address", "127.0.0.1")?
            .set_default("alert_webhook_receiver.port", 8083)?
            .set_default("alert_webhook_receiver.path", "/notify")?
            .set_default("telemetry_endpoint.bind_address", "127.0.0.1")?
            .set_default("telemetry_endpoint.port", 9187)?
            .set_default("log.level", "info")?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("irc.host", opts.value_of("host"))?
            .set_override_option("irc.port", opts.value_of("port"))?
            .set_override_option("irc.channel", opts.value_of("channel"))?
            .set_override_option("irc.nickname", opts.value_of("nickname"))?
            .set_override_option("irc.realname", opts.value_of("realname"))?
            .set_override_option("irc.ca_file", opts.value_of("cafile"))?
            .set_override_option("log.level", opts.value_of("level"))?
            .build()
            .context("can't load config")?;

        conf.try_deserialize().context("invalid config")
    }
}

fn command() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .author(clap::crate_authors!())
        .args(&[
            Arg::new("config")
                .help("path of config file")
                .takes_value(true)
                .short('c')
                .long("config")
                .default_value("./config.yaml"),
            Arg::new("level")
                .help("log level")
                .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                .ignore_case(true)
                .takes_value(true)
                .long("log"),
            Arg::new("host")
                .help("hostname of the irc server")
                .takes_value(true)
                .long("host"),
            Arg::new("port")
                .help("port of the irc server")
                .takes_value(true)
                .long("port"),
            Arg::new("channel")
                .help("channel (or nickname) to send notifications to")
                .takes_value(true)
                .long("channel"),
            Arg::new("nickname")
                .help("nickname to assume once connected")
                .takes_value(true)
                .long("nickname"),
            Arg::new("realname")
                .help("realname (gecos) to assume once connected")
                .takes_value(true)
                .long("realname"),
            Arg::new("cafile")
                .help("PEM file of the CA that verifies the server certificate")
                .takes_value(true)
                .long("cafile"),
        ])
}
