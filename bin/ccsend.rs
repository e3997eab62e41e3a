use std::io::BufReader;
use std::process::ExitCode;

use cc_send::{Args, FixedRounds, Prompt, RepeatDecision, RoundReport, Session};
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

fn print_statistics(round: &RoundReport) {
    if let Some(notice) = round.frame.header_notice.message() {
        println!("{notice}");
    }
    println!("Total Bytes sent: {}", round.total_bytes());
    println!("File '{}' has been sent.", round.payload_name);
    println!(
        "[{}] round {}: {} chunks, {:.3} s, {:.2} Mbps ({})",
        round.id,
        round.round,
        round.frame.chunk_writes,
        round.elapsed.as_secs_f64(),
        round.throughput_mbps(),
        round.congestion_control.as_deref().unwrap_or("unknown"),
    );
}

fn main() -> ExitCode {
    // The log bridge has to be in place before the library logs anything.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to set logger: {e}");
    }

    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        init_env_filter(env_filter);
    }

    let args = Args::parse_legacy();
    let config = args.session_config();
    println!("ALGO: {}", config.algorithm);
    println!("Sender started");

    let decision: Box<dyn RepeatDecision> = match args.rounds {
        Some(rounds) => Box::new(FixedRounds::new(rounds.get())),
        None => Box::new(Prompt::new(BufReader::new(std::io::stdin()), std::io::stdout())),
    };

    let mut session = Session::new(config, args.payload_source(), decision);
    match session.run(print_statistics) {
        Ok(totals) => {
            println!("Ending relationship with the receiver.");
            println!("{} round(s), {} bytes in total", totals.rounds, totals.bytes_sent);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            eprintln!("Total Bytes sent: {}", session.totals().bytes_sent);
            ExitCode::FAILURE
        }
    }
}
