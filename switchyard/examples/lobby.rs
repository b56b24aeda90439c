//! Chat lobby over loopback TCP.
//!
//! Two clients connect, register under a sender name, and chat. The lobby
//! echoes every chat line back to its sender through the sender map.
//!
//! Run with: `RUST_LOG=debug cargo run --example lobby`

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use switchyard::prelude::*;
use tracing_subscriber::EnvFilter;

struct Lobby {
    routes: OnceLock<Routes>,
    lines: AtomicU64,
}

impl EventHandler for Lobby {
    fn handler_table(self: Arc<Self>) -> HandlerTable {
        let on_register = Arc::clone(&self);
        HandlerTable::new()
            .on_client_registration(move |msg, routes| {
                let sender = msg
                    .sender_id
                    .clone()
                    .ok_or_else(|| HandlerError::new("registration without sender"))?;
                tracing::info!(sender = %sender, client = %msg.data, "sender joined");
                routes.senders().register(sender, msg.data.clone());
                let _ = on_register.routes.set(routes.clone());
                Ok(())
            })
            .on("Chat", move |msg| {
                let line = self.lines.fetch_add(1, Ordering::Relaxed) + 1;
                let sender = msg.sender_id.as_deref().unwrap_or("anonymous");
                tracing::info!(line, sender, text = %msg.data, "chat");

                let routes = self
                    .routes
                    .get()
                    .ok_or_else(|| HandlerError::new("no sender registered yet"))?;
                routes.send_to_sender(sender, &Message::new("Echo", msg.data.clone()))?;
                Ok(())
            })
    }
}

fn run_client(addr: std::net::SocketAddr, name: &str, lines: &[&str]) -> Result<(), TransportError> {
    let framer = Framer::new(JsonCodec);
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    framer.write_message(
        &mut stream,
        &Message::new(EventType::client_registration(), "").with_sender(name),
    )?;
    for line in lines {
        framer.write_message(&mut stream, &Message::new("Chat", *line).with_sender(name))?;
    }
    stream.flush()?;

    for _ in lines {
        let echo = framer.read_message(&mut stream)?;
        println!("[{}] echo: {}", name, echo.data);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let streams = Arc::new(ClientStreamRegistry::new());

    let acceptor_streams = Arc::clone(&streams);
    thread::spawn(move || {
        let next_id = AtomicU64::new(1);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let id = format!("client-{}", next_id.fetch_add(1, Ordering::Relaxed));
                    if let Err(e) = acceptor_streams.insert(id, stream) {
                        tracing::error!(error = %e, "failed to register stream");
                    }
                }
                Err(e) => tracing::error!(error = %e, "accept error"),
            }
        }
    });

    let mut handlers = HandlerRegistry::new();
    handlers.register(
        "lobby",
        Arc::new(Lobby {
            routes: OnceLock::new(),
            lines: AtomicU64::new(0),
        }),
    );

    let receiver = ReceiverBuilder::new()
        .streams(streams)
        .handlers(handlers)
        .priorities(PriorityMap::new().with(EventType::client_registration(), 10))
        .poll_interval(Duration::from_millis(20))
        .dispatch_interval(Duration::from_millis(20))
        .shutdown_mode(ShutdownMode::Drain)
        .start()?;

    let alice = thread::spawn(move || run_client(addr, "alice", &["hi", "anyone here?"]));
    let bob = thread::spawn(move || run_client(addr, "bob", &["hello alice"]));

    for client in [alice, bob] {
        if let Err(e) = client.join().map_err(|_| "client thread panicked")? {
            eprintln!("client error: {}", e);
        }
    }

    let report = receiver.stop()?;
    println!(
        "received={} dispatched={} failures={} stopped in {:?}",
        report.stats.received,
        report.stats.dispatched,
        report.stats.handler_failures,
        report.elapsed
    );
    Ok(())
}
