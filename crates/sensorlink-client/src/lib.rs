//! Simulated sensor device.
//!
//! A [`SessionClient`] drives one [`SpikeGenerator`] over one persistent
//! WebSocket: generate a sample, send it, block for the gateway's echo, sleep
//! `spike_timeout` seconds, repeat. Connecting is a single attempt and the
//! loop never reconnects; retry policy belongs to whatever supervises the
//! process.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::rngs::StdRng;
use sensorlink_core::{SpikeGenerator, StatusMessage};
use thiserror::Error;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Device-side failures. Each one ends the client's loop.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("gateway rejected credentials: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("failed to encode sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("connection closed by gateway")]
    Closed,
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// How long to wait for the gateway to answer our close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// RFC 3986 unreserved characters pass through; everything else is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Unconnected device: gateway URL, credentials and generator.
pub struct SessionClient<R = StdRng> {
    url: String,
    passwd: String,
    generator: SpikeGenerator<R>,
}

impl<R: Rng> SessionClient<R> {
    /// `url` is the gateway's device endpoint, e.g.
    /// `ws://127.0.0.1:9000/devices/auth/ws`. The serial number is taken from
    /// the generator.
    pub fn new(
        url: impl Into<String>,
        passwd: impl Into<String>,
        generator: SpikeGenerator<R>,
    ) -> Self {
        Self {
            url: url.into(),
            passwd: passwd.into(),
            generator,
        }
    }

    pub fn sn(&self) -> &str {
        self.generator.sn()
    }

    /// Handshake target with `sn` and `passwd` as query parameters.
    pub fn target(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}sn={}&passwd={}",
            self.url,
            percent_encode(self.sn()),
            percent_encode(&self.passwd)
        )
    }

    /// One blocking connection attempt followed by the gateway's
    /// acknowledgement. No retries.
    pub fn connect(self) -> Result<ConnectedClient<R>, ClientError> {
        let (mut socket, _) =
            tungstenite::connect(self.target()).map_err(|source| ClientError::Connection {
                url: self.url.clone(),
                source,
            })?;
        log::info!("connected to {} as {}", self.url, self.sn());

        let reply = read_reply(&mut socket)?;
        let acknowledgement = match serde_json::from_str::<StatusMessage>(&reply) {
            Ok(status) if !status.is_ok() => return Err(ClientError::Auth(status.message)),
            Ok(status) => status.message,
            // Plain-text acknowledgements are accepted as-is.
            Err(_) => reply,
        };
        log::info!("gateway: {acknowledgement}");

        Ok(ConnectedClient {
            socket,
            generator: self.generator,
            acknowledgement,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Authenticated device streaming telemetry.
pub struct ConnectedClient<R = StdRng> {
    socket: Socket,
    generator: SpikeGenerator<R>,
    acknowledgement: String,
    stop: Arc<AtomicBool>,
}

impl<R: Rng> ConnectedClient<R> {
    /// Message the gateway sent after accepting the handshake.
    pub fn acknowledgement(&self) -> &str {
        &self.acknowledgement
    }

    /// Setting the flag ends [`run`](Self::run) before its next tick.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// One exchange: generate, send, wait for the echo. Returns the echo.
    pub fn tick(&mut self) -> Result<String, ClientError> {
        let sample = self.generator.generate_sample();
        let payload = sample.to_json()?;
        self.socket.send(Message::text(payload))?;
        read_reply(&mut self.socket)
    }

    /// Exchange samples until `ticks` are done (forever when `None`), the
    /// stop flag is set, or anything fails. The connection is released on
    /// return either way. Returns the number of completed exchanges.
    pub fn run(mut self, ticks: Option<u64>) -> Result<u64, ClientError> {
        let interval = self.generator.config().tick_interval();
        let mut done = 0u64;
        while !self.stopped() && ticks.is_none_or(|n| done < n) {
            let echo = self.tick()?;
            log::info!("RECV: {echo}");
            done += 1;
            if ticks.is_some_and(|n| done >= n) {
                break;
            }
            self.pause(interval);
        }
        self.shutdown();
        Ok(done)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep for `interval`, waking early if stopped.
    fn pause(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        loop {
            let now = Instant::now();
            if now >= deadline || self.stopped() {
                return;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.socket.close(None) {
            log::debug!("close not sent: {e}");
            return;
        }
        if let MaybeTlsStream::Plain(stream) = self.socket.get_mut() {
            if let Err(e) = stream.set_read_timeout(Some(CLOSE_TIMEOUT)) {
                log::debug!("close drain unbounded: {e}");
            }
        }
        // Drain until the gateway completes the close handshake or goes quiet.
        while self.socket.read().is_ok() {}
    }
}

/// Next text (or binary, lossily decoded) message, skipping control frames.
fn read_reply(socket: &mut Socket) -> Result<String, ClientError> {
    loop {
        match socket.read()? {
            Message::Text(text) => return Ok(text.as_str().to_string()),
            Message::Binary(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Message::Close(_) => return Err(ClientError::Closed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}

fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlink_core::GeneratorConfig;

    fn client(url: &str, passwd: &str) -> SessionClient {
        let generator = SpikeGenerator::seeded("DEV001", GeneratorConfig::default(), 1).unwrap();
        SessionClient::new(url, passwd, generator)
    }

    #[test]
    fn test_target_embeds_credentials() {
        let c = client("ws://127.0.0.1:9000/devices/auth/ws", "secret1");
        assert_eq!(
            c.target(),
            "ws://127.0.0.1:9000/devices/auth/ws?sn=DEV001&passwd=secret1"
        );
    }

    #[test]
    fn test_target_appends_to_existing_query() {
        let c = client("ws://gw/devices/auth/ws?v=2", "s");
        assert_eq!(c.target(), "ws://gw/devices/auth/ws?v=2&sn=DEV001&passwd=s");
    }

    #[test]
    fn test_target_encodes_reserved_characters() {
        let c = client("ws://gw/ws", "p&ss=wörd 1");
        assert_eq!(c.target(), "ws://gw/ws?sn=DEV001&passwd=p%26ss%3Dw%C3%B6rd%201");
    }

    #[test]
    fn test_percent_encode_unreserved_passthrough() {
        assert_eq!(percent_encode("AZaz09-_.~"), "AZaz09-_.~");
        assert_eq!(percent_encode(""), "");
    }

    #[test]
    fn test_connect_refused_is_connection_error() {
        // Bind then release a port so nothing is listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let c = client(&format!("ws://127.0.0.1:{port}/devices/auth/ws"), "secret1");
        match c.connect() {
            Err(ClientError::Connection { url, .. }) => {
                assert!(!url.contains("secret1"));
            }
            Err(other) => panic!("expected connection error, got {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
