use clap::Parser;
use std::net::TcpListener;
use std::time::Instant;

use cc_send::{ByteOrder, FrameReceiver};
use tracing_subscriber::filter::EnvFilter;

fn init_env_filter(env_filter: EnvFilter) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_level(true)
        .with_target(true);

    let subscriber = subscriber.finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> std::io::Result<()> {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to set logger: {e}");
    }

    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        init_env_filter(env_filter);
    }

    let args = Args::parse();
    let listener = TcpListener::bind(&args.addr)?;
    let receiver = FrameReceiver::new(args.byte_order);
    println!("Receiver listening on {}", listener.local_addr()?);

    // Senders open one connection per round, so connections are served one at a time.
    loop {
        let (mut stream, addr) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                println!("Failed to accept connection: {e}");
                continue;
            }
        };
        println!("Accepted connection from: {addr}");
        let start = Instant::now();
        match receiver.receive_into_sink(&mut stream) {
            Ok(n) => {
                let delta = start.elapsed();
                let throughput = ((n * 8) as f64 / delta.as_secs_f64()) / 1e6;
                let secs = delta.as_secs_f64();
                println!("Received {n} bytes from {addr} in {secs:.3} s: {throughput:.2} Mbps");
            }
            Err(e) => println!("Frame from {addr} incomplete: {e}"),
        }
    }
}

/// Accepts frames from a sender and reports their size and throughput.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The address <ip:port> to listen on.
    #[arg(short, long, default_value = "0.0.0.0:5060")]
    addr: String,
    /// Byte order of the 4-byte length header.
    #[arg(short, long, value_enum, default_value_t = ByteOrder::Native)]
    byte_order: ByteOrder,
}
