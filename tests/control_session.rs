//! Control sessions over a real TCP socket.

use scope_bridge::config::ServerConfig;
use scope_bridge::dataplane::CaptureSink;
use scope_bridge::dispatch::Dispatcher;
use scope_bridge::hardware::family::Series6000E;
use scope_bridge::hardware::sim::SimulatedScope;
use scope_bridge::instrument::Instrument;
use scope_bridge::server::{BridgeServer, SessionEnd};
use scope_bridge::state::ArmSnapshot;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct CountingSink {
    captures: AtomicUsize,
}

impl CaptureSink for CountingSink {
    fn on_capture(&self, _snapshot: &ArmSnapshot) {
        self.captures.fetch_add(1, Ordering::SeqCst);
    }
}

fn server() -> BridgeServer {
    let scope = SimulatedScope::builder(Box::new(Series6000E))
        .model("6424E")
        .serial("JR123/0042")
        .auto_complete(true)
        .build();
    let dispatcher = Dispatcher::new(Instrument::new(Box::new(scope)).into_shared());
    let config = ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        scpi_port: 0,
        capture_poll_ms: 1,
    };
    BridgeServer::bind(&config, dispatcher).unwrap()
}

fn query(stream: &mut TcpStream, reader: &mut BufReader<TcpStream>, line: &str) -> String {
    writeln!(stream, "{line}").unwrap();
    let mut reply = String::new();
    reader.read_line(&mut reply).unwrap();
    reply.trim_end().to_string()
}

#[test]
fn test_exit_ends_session_and_resets_instrument() {
    let server = Arc::new(server());
    let addr = server.local_addr().unwrap();
    let dispatcher = Arc::clone(server.dispatcher());
    let handle = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.serve_one().unwrap())
    };

    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let idn = query(&mut stream, &mut reader, "*IDN?");
    assert!(idn.contains("6424E"), "unexpected identity {idn}");
    assert!(idn.contains("JR123/0042"));

    // commands without a reply, then a query proves they were applied in order
    writeln!(stream, "A:ON").unwrap();
    writeln!(stream, "B:ON").unwrap();
    writeln!(stream, "what is this").unwrap();
    writeln!(stream, "A:RANGE 3").unwrap();
    assert_eq!(query(&mut stream, &mut reader, "A:RANGE?"), "5");
    assert_eq!(query(&mut stream, &mut reader, "CHANS?"), "4");
    assert!(dispatcher.instrument().lock().state().channels[1].enabled);

    writeln!(stream, "EXIT").unwrap();
    assert_eq!(handle.join().unwrap(), SessionEnd::Exit);

    let inst = dispatcher.instrument().lock();
    assert!(!inst.state().any_source_enabled());
    assert!(!inst.state().trigger.armed);
}

#[test]
fn test_disconnect_while_armed_stops_and_disables() {
    let sink = Arc::new(CountingSink::default());
    let server = Arc::new(server().with_sink(sink.clone()));
    let addr = server.local_addr().unwrap();
    let dispatcher = Arc::clone(server.dispatcher());
    let handle = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.serve_one().unwrap())
    };

    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    writeln!(stream, "RATE 1250000000").unwrap();
    writeln!(stream, "C:ON").unwrap();
    writeln!(stream, "START").unwrap();
    assert_eq!(query(&mut stream, &mut reader, "CHANS?"), "4");

    let start = Instant::now();
    while sink.captures.load(Ordering::SeqCst) < 2 && start.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(sink.captures.load(Ordering::SeqCst) >= 2);

    drop(reader);
    drop(stream);
    assert_eq!(handle.join().unwrap(), SessionEnd::Disconnected);

    let inst = dispatcher.instrument().lock();
    assert!(!inst.state().trigger.armed);
    assert!(!inst.state().channels[2].enabled);
    assert!(inst.state().timing.depth_changed);
}
