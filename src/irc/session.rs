//! Registration and channel membership of the bot as an explicit state machine.
//!
//! The session doesn't do any io. It is fed the events of the connection and
//! answers with the messages that have to be written to the server.

use std::fmt;

use thiserror::Error;

use super::{
    message::{Message, ERR_NICKNAMEINUSE, RPL_ENDOFNAMES, RPL_WELCOME},
    settings::IrcSettings,
};

/// numeric replies telling us we can't join the channel
const JOIN_FAILURES: [&str; 4] = ["471", "473", "474", "475"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// socket is open, registration was sent
    Connecting,
    /// registered with the server, not in the channel
    Connected,
    /// alerts can be delivered
    Joined,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Joined => "joined",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("server closed the link: {0}")]
    Closed(String),
    #[error("cannot join {channel} ({code}): {reason}")]
    JoinFailed {
        channel: String,
        code: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Session {
    state: ConnectionState,
    /// nickname we currently hold or are trying to get
    nickname: String,
    configured_nickname: String,
    realname: String,
    password: Option<String>,
    channel: String,
    channel_key: Option<String>,
}

impl Session {
    pub fn new(settings: &IrcSettings) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            nickname: settings.nickname.clone(),
            configured_nickname: settings.nickname.clone(),
            realname: settings.realname.clone(),
            password: settings.password.clone(),
            channel: settings.channel.clone(),
            channel_key: settings.channel_key.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == ConnectionState::Joined
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!(channel = %self.channel, "irc session {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Messages are only sent to the channel when it starts with a channel prefix,
    /// otherwise the target is a nickname and there is nothing to join.
    fn targets_channel(&self) -> bool {
        self.channel.starts_with(['#', '&', '+', '!'])
    }

    fn join(&self) -> Message {
        Message::join(&self.channel, self.channel_key.as_deref())
    }

    fn is_own(&self, nick: Option<&str>) -> bool {
        nick.map_or(false, |nick| nick.eq_ignore_ascii_case(&self.nickname))
    }

    fn is_channel(&self, channel: Option<&str>) -> bool {
        channel.map_or(false, |channel| channel.eq_ignore_ascii_case(&self.channel))
    }

    /// the socket was opened, returns the registration
    pub fn connect(&mut self) -> Vec<Message> {
        self.nickname = self.configured_nickname.clone();
        self.set_state(ConnectionState::Connecting);

        let mut messages = Vec::with_capacity(3);
        if let Some(password) = &self.password {
            messages.push(Message::pass(password));
        }
        messages.push(Message::nick(&self.nickname));
        messages.push(Message::user(&self.configured_nickname, &self.realname));

        messages
    }

    pub fn disconnect(&mut self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// advances the state machine with a message received from the server
    pub fn handle(&mut self, message: &Message) -> Result<Vec<Message>, SessionError> {
        let mut replies = Vec::new();

        match message.command.as_str() {
            "PING" => replies.push(Message::pong(message.param(0).unwrap_or_default())),
            "ERROR" => {
                self.disconnect();
                return Err(SessionError::Closed(
                    message.param(0).unwrap_or_default().to_owned(),
                ));
            }
            RPL_WELCOME if self.state == ConnectionState::Connecting => {
                // the server tells us which nickname we ended up with
                if let Some(nick) = message.param(0) {
                    self.nickname = nick.to_owned();
                }

                if self.targets_channel() {
                    self.set_state(ConnectionState::Connected);
                    replies.push(self.join());
                } else {
                    self.set_state(ConnectionState::Joined);
                }
            }
            ERR_NICKNAMEINUSE if self.state == ConnectionState::Connecting => {
                self.nickname.push('_');
                tracing::warn!("nickname in use, retrying as {}", self.nickname);
                replies.push(Message::nick(&self.nickname));
            }
            RPL_ENDOFNAMES
                if self.state == ConnectionState::Connected && self.is_channel(message.param(1)) =>
            {
                self.set_state(ConnectionState::Joined);
            }
            "JOIN"
                if self.state == ConnectionState::Connected
                    && self.is_own(message.source_nick())
                    && self.is_channel(message.param(0)) =>
            {
                self.set_state(ConnectionState::Joined);
            }
            "KICK" if self.is_channel(message.param(0)) && self.is_own(message.param(1)) => {
                tracing::warn!(
                    "kicked from {} by {}: {}",
                    self.channel,
                    message.source_nick().unwrap_or_default(),
                    message.param(2).unwrap_or_default()
                );
                self.set_state(ConnectionState::Connected);
                replies.push(self.join());
            }
            "NICK" if self.is_own(message.source_nick()) => {
                if let Some(nick) = message.param(0) {
                    self.nickname = nick.to_owned();
                }
            }
            // retried by reconnecting, which is subject to the reconnect backoff
            code if JOIN_FAILURES.contains(&code) && self.is_channel(message.param(1)) => {
                self.disconnect();
                return Err(SessionError::JoinFailed {
                    channel: self.channel.clone(),
                    code: code.to_owned(),
                    reason: message.params.last().cloned().unwrap_or_default(),
                });
            }
            _ => {}
        }

        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings() -> IrcSettings {
        IrcSettings {
            host: "irc.example.net".into(),
            port: 6697,
            tls: true,
            ca_file: None,
            nickname: "prom-irc".into(),
            realname: "prom irc".into(),
            password: None,
            channel: "#fleaz".into(),
            channel_key: None,
            send_timeout: Duration::from_secs(10),
            reconnect_initial_interval: Duration::from_secs(1),
            reconnect_max_interval: Duration::from_secs(300),
            queue_capacity: 64,
        }
    }

    fn msg(line: &str) -> Message {
        line.parse().unwrap()
    }

    fn joined_session() -> Session {
        let mut session = Session::new(&settings());
        session.connect();
        session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();
        session.handle(&msg(":srv 366 prom-irc #fleaz :End of /NAMES list.")).unwrap();
        session
    }

    #[test]
    fn registration() {
        let mut session = Session::new(&settings());
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let registration = session.connect();

        assert_eq!(session.state(), ConnectionState::Connecting);
        assert_eq!(
            registration,
            [Message::nick("prom-irc"), Message::user("prom-irc", "prom irc")]
        );
    }

    #[test]
    fn registration_with_password() {
        let mut session = Session::new(&IrcSettings {
            password: Some("hunter2".into()),
            ..settings()
        });

        assert_eq!(session.connect()[0], Message::pass("hunter2"));
    }

    #[test]
    fn welcome_joins_channel() {
        let mut session = Session::new(&settings());
        session.connect();

        let replies = session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(replies, [Message::join("#fleaz", None)]);
        assert!(!session.is_joined());
    }

    #[test]
    fn end_of_names_completes_join() {
        let session = joined_session();
        assert!(session.is_joined());
    }

    #[test]
    fn names_of_other_channel_are_ignored() {
        let mut session = Session::new(&settings());
        session.connect();
        session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();
        session.handle(&msg(":srv 366 prom-irc #other :End of /NAMES list.")).unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn join_echo_completes_join() {
        let mut session = Session::new(&settings());
        session.connect();
        session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();
        session.handle(&msg(":prom-irc!bot@host JOIN :#Fleaz")).unwrap();

        assert!(session.is_joined());
    }

    #[test]
    fn answers_ping() {
        let mut session = joined_session();

        let replies = session.handle(&msg("PING :irc.example.net")).unwrap();

        assert_eq!(replies, [Message::pong("irc.example.net")]);
    }

    #[test]
    fn nickname_collision() {
        let mut session = Session::new(&settings());
        session.connect();

        let replies = session
            .handle(&msg(":srv 433 * prom-irc :Nickname is already in use"))
            .unwrap();

        assert_eq!(replies, [Message::nick("prom-irc_")]);
        assert_eq!(session.nickname(), "prom-irc_");

        // reconnecting starts over with the configured nickname
        session.disconnect();
        session.connect();
        assert_eq!(session.nickname(), "prom-irc");
    }

    #[test]
    fn kick_rejoins() {
        let mut session = joined_session();

        let replies = session
            .handle(&msg(":op!op@host KICK #fleaz prom-irc :bye"))
            .unwrap();

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(replies, [Message::join("#fleaz", None)]);

        let other_kick = msg(":op!op@host KICK #fleaz someone :bye");
        let replies = session.handle(&other_kick).unwrap();
        assert!(replies.is_empty());
    }

    #[test]
    fn error_closes_session() {
        let mut session = joined_session();

        let res = session.handle(&msg("ERROR :Closing link (ping timeout)"));

        assert_eq!(res, Err(SessionError::Closed("Closing link (ping timeout)".into())));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn nickname_target_needs_no_join() {
        let mut session = Session::new(&IrcSettings {
            channel: "oncall".into(),
            ..settings()
        });
        session.connect();

        let replies = session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();

        assert!(replies.is_empty());
        assert!(session.is_joined());
    }

    #[test]
    fn banned_from_channel_ends_session() {
        let mut session = Session::new(&settings());
        session.connect();
        session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();

        let banned = msg(":srv 474 prom-irc #fleaz :Cannot join channel (+b)");
        let res = session.handle(&banned);

        assert_eq!(
            res,
            Err(SessionError::JoinFailed {
                channel: "#fleaz".into(),
                code: "474".into(),
                reason: "Cannot join channel (+b)".into(),
            })
        );
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn join_failure_for_other_channel_is_ignored() {
        let mut session = Session::new(&settings());
        session.connect();
        session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();

        let replies = session
            .handle(&msg(":srv 475 prom-irc #other :Cannot join channel (+k)"))
            .unwrap();

        assert!(replies.is_empty());
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn join_with_key() {
        let mut session = Session::new(&IrcSettings {
            channel_key: Some("secret".into()),
            ..settings()
        });
        session.connect();

        let replies = session.handle(&msg(":srv 001 prom-irc :Welcome")).unwrap();

        assert_eq!(replies, [Message::join("#fleaz", Some("secret"))]);
    }
}
