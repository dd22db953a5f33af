//! irc protocol lines as described in RFC 1459 section 2.3.1

use std::{fmt, str::FromStr};

use thiserror::Error;

/// welcome message, registration is complete
pub const RPL_WELCOME: &str = "001";
/// end of the names list sent after joining a channel
pub const RPL_ENDOFNAMES: &str = "366";
/// the requested nickname is taken
pub const ERR_NICKNAMEINUSE: &str = "433";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageParseError {
    #[error("empty message")]
    Empty,
    #[error("message has a prefix but no command")]
    MissingCommand,
}

impl Message {
    pub fn new<I, S>(command: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: None,
            command: command.to_owned(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn nick(nickname: &str) -> Self {
        Self::new("NICK", [nickname])
    }

    pub fn user(username: &str, realname: &str) -> Self {
        Self::new("USER", [username, "0", "*", realname])
    }

    pub fn pass(password: &str) -> Self {
        Self::new("PASS", [password])
    }

    pub fn join(channel: &str, key: Option<&str>) -> Self {
        match key {
            Some(key) => Self::new("JOIN", [channel, key]),
            None => Self::new("JOIN", [channel]),
        }
    }

    pub fn pong(token: &str) -> Self {
        Self::new("PONG", [token])
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", [target, text])
    }

    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", [reason])
    }

    /// nickname part of the prefix (`nick!user@host`)
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|prefix| prefix.split(['!', '@']).next())
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');

        if rest.is_empty() {
            return Err(MessageParseError::Empty);
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
                rest = tail.trim_start_matches(' ');
                Some(prefix.to_owned())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(MessageParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_owned());
            rest = tail;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }

        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {param}")?;
            }

            // the last parameter may contain spaces or start with a colon
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_prefix_and_trailing() {
        let msg: Message = ":nick!user@host PRIVMSG #chan :hello there".parse().unwrap();

        assert_eq!(msg.prefix.as_deref(), Some("nick!user@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, ["#chan", "hello there"]);
        assert_eq!(msg.source_nick(), Some("nick"));
    }

    #[test]
    fn parse_numeric() {
        let msg: Message = ":irc.example.net 366 prom-irc #fleaz :End of /NAMES list."
            .parse()
            .unwrap();

        assert_eq!(msg.command, RPL_ENDOFNAMES);
        assert_eq!(msg.param(1), Some("#fleaz"));
    }

    #[test]
    fn parse_without_prefix() {
        let msg: Message = "PING :irc.example.net\r\n".parse().unwrap();

        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, ["irc.example.net"]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Message>(), Err(MessageParseError::Empty));
        assert_eq!("\r\n".parse::<Message>(), Err(MessageParseError::Empty));
        assert_eq!(":prefix".parse::<Message>(), Err(MessageParseError::MissingCommand));
    }

    #[test]
    fn serialize() {
        assert_eq!(Message::nick("prom-irc").to_string(), "NICK prom-irc");
        assert_eq!(
            Message::user("prom-irc", "prom irc").to_string(),
            "USER prom-irc 0 * :prom irc"
        );
        assert_eq!(
            Message::privmsg("#fleaz", "→ host1").to_string(),
            "PRIVMSG #fleaz :→ host1"
        );
        assert_eq!(
            Message::privmsg("#fleaz", ":)").to_string(),
            "PRIVMSG #fleaz ::)"
        );
        assert_eq!(Message::join("#fleaz", Some("key")).to_string(), "JOIN #fleaz key");
    }

    #[test]
    fn serialized_message_parses_back() {
        let msg = Message::privmsg("#fleaz", "[\x0305FIRING\x03:1] Disk - low space");
        assert_eq!(msg.to_string().parse::<Message>().unwrap(), msg);
    }
}
