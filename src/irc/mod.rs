//! irc transport: the bot's connection, channel membership and the sink the
//! rendered notifications are delivered to.

pub mod client;
pub mod codec;
pub mod message;
pub mod session;
pub mod settings;

pub use client::IrcClient;
pub use settings::IrcSettings;
