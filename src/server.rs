//! Blocking SCPI control server.
//!
//! One control session runs at a time: the accept loop hands each connection
//! to [`BridgeServer::handle_connection`], which returns only after the peer
//! disconnects or sends `EXIT`. Further clients wait in the listen backlog.
//! Each session owns a [`CaptureWatcher`] for the data plane and ends with
//! [`Instrument::reset_to_safe_state`](crate::instrument::Instrument::reset_to_safe_state).

use crate::config::ServerConfig;
use crate::dataplane::{CaptureSink, CaptureWatcher, LoggingSink};
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::BridgeResult;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Longest accepted command line in bytes, newline included.
pub const MAX_LINE_LEN: u64 = 4096;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the socket
    Disconnected,
    /// Peer sent `EXIT`
    Exit,
}

/// Control-plane listener bound to the SCPI port.
pub struct BridgeServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn CaptureSink>,
    poll_interval: Duration,
}

impl std::fmt::Debug for BridgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeServer")
            .field("listener", &self.listener)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl BridgeServer {
    /// Bind to `bind_address:scpi_port`. Port 0 picks a free port.
    pub fn bind(config: &ServerConfig, dispatcher: Dispatcher) -> BridgeResult<Self> {
        let listener = TcpListener::bind((config.bind_address.as_str(), config.scpi_port))?;
        info!(address = %listener.local_addr()?, "SCPI server listening");
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            sink: Arc::new(LoggingSink),
            poll_interval: Duration::from_millis(config.capture_poll_ms),
        })
    }

    /// Replace the capture sink used by every session's watcher
    pub fn with_sink(mut self, sink: Arc<dyn CaptureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Address actually bound
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serve sessions until the listener fails.
    pub fn serve(&self) -> BridgeResult<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => self.handle_connection(stream),
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        Ok(())
    }

    /// Accept and serve exactly one session.
    pub fn serve_one(&self) -> BridgeResult<SessionEnd> {
        let (stream, _) = self.listener.accept()?;
        Ok(self.handle_connection_inner(stream))
    }

    /// Run one session to completion, then reset the instrument.
    pub fn handle_connection(&self, stream: TcpStream) {
        self.handle_connection_inner(stream);
    }

    fn handle_connection_inner(&self, stream: TcpStream) -> SessionEnd {
        let session = Uuid::new_v4();
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let span = info_span!("session", %session, %peer);
        let _guard = span.enter();
        info!("control session opened");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }

        let watcher = match CaptureWatcher::spawn(
            Arc::clone(self.dispatcher.instrument()),
            Arc::clone(&self.sink),
            self.poll_interval,
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "capture watcher unavailable, data plane disabled");
                None
            }
        };

        let end = match stream.try_clone() {
            Ok(writer) => {
                run_session(&self.dispatcher, BufReader::new(stream), writer).unwrap_or_else(|e| {
                    debug!(error = %e, "session I/O ended");
                    SessionEnd::Disconnected
                })
            }
            Err(e) => {
                warn!(error = %e, "could not split control stream");
                SessionEnd::Disconnected
            }
        };

        if let Some(watcher) = watcher {
            watcher.shutdown();
        }
        self.dispatcher.instrument().lock().reset_to_safe_state();
        info!(reason = ?end, "control session closed");
        end
    }
}

/// Read lines from `reader` and dispatch them, writing query replies to
/// `writer`. Returns when the reader is exhausted or `EXIT` arrives.
///
/// Unhandled lines produce no reply.
pub fn run_session<R: BufRead, W: Write>(
    dispatcher: &Dispatcher,
    mut reader: R,
    mut writer: W,
) -> io::Result<SessionEnd> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if (&mut reader).take(MAX_LINE_LEN).read_until(b'\n', &mut buf)? == 0 {
            return Ok(SessionEnd::Disconnected);
        }
        if buf.last() != Some(&b'\n') && buf.len() as u64 == MAX_LINE_LEN {
            warn!(limit = MAX_LINE_LEN, "command line too long, discarded");
            skip_rest_of_line(&mut reader)?;
            continue;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match dispatcher.dispatch_line(line) {
            Outcome::Exit => return Ok(SessionEnd::Exit),
            Outcome::Handled(Some(reply)) => {
                writeln!(writer, "{reply}")?;
                writer.flush()?;
            }
            Outcome::Handled(None) | Outcome::NotHandled => {}
        }
    }
}

/// Drop input up to and including the next newline without buffering it.
fn skip_rest_of_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::family::Series3000A;
    use crate::hardware::sim::SimulatedScope;
    use crate::instrument::Instrument;
    use std::io::Cursor;

    fn dispatcher() -> Dispatcher {
        let scope = SimulatedScope::builder(Box::new(Series3000A))
            .model("3406D MSO")
            .build();
        Dispatcher::new(Instrument::new(Box::new(scope)).into_shared())
    }

    #[test]
    fn replies_only_to_queries() {
        let d = dispatcher();
        let input = Cursor::new("A:ON\r\nCHANS?\nNONSENSE\n\nA:RANGE?\n");
        let mut output = Vec::new();
        let end = run_session(&d, input, &mut output).unwrap();
        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(String::from_utf8(output).unwrap(), "4\n1\n");
    }

    #[test]
    fn exit_stops_reading() {
        let d = dispatcher();
        let input = Cursor::new("EXIT\nCHANS?\n");
        let mut output = Vec::new();
        assert_eq!(run_session(&d, input, &mut output).unwrap(), SessionEnd::Exit);
        assert!(output.is_empty());
    }

    #[test]
    fn invalid_utf8_is_not_fatal() {
        let d = dispatcher();
        let input = Cursor::new(b"\xff\xfe:ON\nCHANS?\n".to_vec());
        let mut output = Vec::new();
        run_session(&d, input, &mut output).unwrap();
        assert_eq!(output, b"4\n");
    }

    #[test]
    fn over_long_line_is_dropped_and_session_continues() {
        let d = dispatcher();
        let mut input = vec![b'A'; 3 * MAX_LINE_LEN as usize];
        input.extend_from_slice(b":ON\nCHANS?\nA:ON\n");
        let mut output = Vec::new();
        let end = run_session(&d, Cursor::new(input), &mut output).unwrap();
        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(output, b"4\n");
        assert!(d.instrument().lock().state().channels[0].enabled);
    }

    #[test]
    fn line_just_under_the_limit_is_dispatched() {
        let d = dispatcher();
        let mut line = b"CHANS?".to_vec();
        line.resize(MAX_LINE_LEN as usize - 1, b' ');
        line.push(b'\n');
        let mut output = Vec::new();
        run_session(&d, Cursor::new(line), &mut output).unwrap();
        assert_eq!(output, b"4\n");
    }
}
