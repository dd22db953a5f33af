//! The connection to the irc server.
//!
//! [IrcClient::run] keeps the bot connected and in the channel, reconnecting with
//! an exponential backoff, and delivers queued notifications whenever the
//! [Session] is joined.

use std::{path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};
use tokio_util::codec::Framed;

use super::{
    codec::IrcCodec,
    message::Message,
    session::Session,
    settings::IrcSettings,
};
use crate::{
    delivery::{deliver, DeliveryError, DeliverySink, RenderedNotification},
    metrics::Metrics,
};

/// maximum length of a line on the wire, including CRLF
const MAX_LINE_LEN: usize = 512;
/// room for the `:nick!user@host ` prefix the server adds when relaying our messages
const RELAY_PREFIX_RESERVE: usize = 100;

/// plain tcp or tls stream
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

type Connection = Framed<Box<dyn Transport>, IrcCodec>;

pub struct IrcClient {
    settings: IrcSettings,
    session: Session,
    tls: Option<tokio_native_tls::TlsConnector>,
    metrics: Arc<Metrics>,
}

impl IrcClient {
    pub fn new(settings: IrcSettings, metrics: Arc<Metrics>) -> Result<Self> {
        let tls = if settings.tls {
            Some(tls_connector(settings.ca_file.as_deref())?)
        } else {
            None
        };

        Ok(Self {
            session: Session::new(&settings),
            settings,
            tls,
            metrics,
        })
    }

    /// Main loop, returns once the [Outbox](crate::delivery::Outbox) was closed.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RenderedNotification>) {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.settings.reconnect_initial_interval,
            max_interval: self.settings.reconnect_max_interval,
            max_elapsed_time: None,
            ..Default::default()
        };

        loop {
            self.metrics.record_connection_attempt();

            match self.connect().await {
                Ok(conn) => match self.serve(conn, &mut rx, &mut backoff).await {
                    Ok(()) => return,
                    Err(err) => tracing::warn!(
                        state = %self.session.state(),
                        "irc connection lost: {err:#}"
                    ),
                },
                Err(err) => tracing::warn!("could not connect to irc server: {err:#}"),
            }

            self.session.disconnect();

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.settings.reconnect_max_interval);
            tracing::info!("reconnecting in {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect(&self) -> Result<Connection> {
        let address = self.settings.server_address();
        tracing::info!(tls = self.tls.is_some(), "connecting to {address}");

        let tcp = TcpStream::connect(&address)
            .await
            .with_context(|| format!("failed to connect to {address}"))?;

        let stream: Box<dyn Transport> = match &self.tls {
            Some(tls) => Box::new(
                tls.connect(&self.settings.host, tcp)
                    .await
                    .context("tls handshake failed")?,
            ),
            None => Box::new(tcp),
        };

        Ok(Framed::new(stream, IrcCodec::new()))
    }

    /// Drives one connection until it fails or the outbox is closed.
    async fn serve(
        &mut self,
        mut conn: Connection,
        rx: &mut mpsc::Receiver<RenderedNotification>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<()> {
        for message in self.session.connect() {
            conn.send(message).await?;
        }

        loop {
            tokio::select! {
                incoming = conn.next() => {
                    let message = match incoming {
                        Some(message) => message?,
                        None => bail!("connection closed by server"),
                    };

                    let was_joined = self.session.is_joined();

                    for reply in self.session.handle(&message)? {
                        conn.send(reply).await?;
                    }

                    if self.session.is_joined() && !was_joined {
                        tracing::info!(
                            "joined {} as {}",
                            self.session.channel(),
                            self.session.nickname()
                        );
                        backoff.reset();
                    }
                }
                notification = rx.recv(), if self.session.is_joined() => {
                    let notification = match notification {
                        Some(notification) => notification,
                        None => {
                            tracing::info!("outbox closed, leaving irc");
                            conn.send(Message::quit("shutting down")).await?;
                            return Ok(());
                        }
                    };

                    let mut sink = IrcSink { conn: &mut conn };
                    deliver(
                        &mut sink,
                        &notification,
                        self.settings.send_timeout,
                        &self.metrics,
                    )
                    .await
                    .context("delivery failed")?;
                }
            }
        }
    }
}

fn tls_connector(ca_file: Option<&Path>) -> Result<tokio_native_tls::TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    // a configured CA replaces the system trust store
    if let Some(path) = ca_file {
        let pem = std::fs::read(path)
            .with_context(|| format!("could not read ca file {}", path.display()))?;
        let certificate =
            native_tls::Certificate::from_pem(&pem).context("ca file is no valid PEM certificate")?;

        builder
            .add_root_certificate(certificate)
            .disable_built_in_roots(true);
    }

    let connector = builder.build().context("failed to build tls connector")?;

    Ok(connector.into())
}

/// Writes lines as `PRIVMSG`s to the connection.
struct IrcSink<'a> {
    conn: &'a mut Connection,
}

#[async_trait]
impl DeliverySink for IrcSink<'_> {
    async fn send(&mut self, target: &str, line: &str) -> Result<(), DeliveryError> {
        let texts = privmsg_texts(target, line);
        if texts.is_empty() {
            tracing::debug!("not sending empty line to {target}");
        }

        for text in texts {
            self.conn.send(Message::privmsg(target, text)).await?;
        }

        Ok(())
    }
}

/// Splits `line` at line breaks (a message can't contain them) and truncates the
/// parts so the relayed message fits into [MAX_LINE_LEN].
fn privmsg_texts<'a>(target: &str, line: &'a str) -> Vec<&'a str> {
    let overhead = "PRIVMSG ".len() + target.len() + " :".len() + "\r\n".len();
    let max_len = MAX_LINE_LEN.saturating_sub(overhead + RELAY_PREFIX_RESERVE);

    line.split(['\r', '\n'])
        .filter(|text| !text.is_empty())
        .map(|text| truncate(text, max_len))
        .collect()
}

fn truncate(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}
