//! moldfeed — multicast feed decoder with gap recovery.
//!
//! Joins one MoldUDP64 feed channel, renders every application message as a
//! text line on stdout, and fills sequence gaps from the channel's unicast
//! retransmission peer when the operator asks for it. Diagnostics go to
//! stderr so the decoded stream stays machine-consumable.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use codec::{DecodeOptions, Decoder};
use ingest::{signal, Ingest, IngestOptions};
use network::{McastReceiver, RecvBatch, Rerequester, DEFAULT_MCAST_RCVBUF};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "moldfeed", version, about = "MoldUDP64 multicast feed decoder")]
struct Args {
    /// Channel configuration file
    #[arg(long, default_value = "config/config.ini")]
    config: PathBuf,

    /// Recover sequence gaps from the retransmission peer
    #[arg(long)]
    gap_fill: bool,

    /// Download from this sequence to the live edge, then stop
    /// (combine with --gap-fill to stay on the live feed afterwards)
    #[arg(long, default_value_t = 0)]
    start_seq: u64,

    /// Stop after this many messages
    #[arg(long)]
    max_messages: Option<u64>,

    /// Prefix every field with its schema name
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        error!("FATAL: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    signal::install();

    let cfg = config::load_config(&args.config)?;

    let receiver = McastReceiver::open(
        cfg.net.mcast_ip,
        cfg.net.mcast_port,
        cfg.net.interface_ip,
        cfg.net.mcast_source_ip,
    )
    .context("multicast open failed")?;
    if let Err(e) = receiver.set_rcvbuf(DEFAULT_MCAST_RCVBUF) {
        warn!(error = %e, "could not grow multicast receive buffer");
    }
    receiver.set_read_timeout(Some(Duration::from_millis(250)))?;

    let rerequester = open_rerequester(&args, &cfg)?;
    let gap_fill = args.gap_fill && rerequester.is_some();

    let decoder = Decoder::new(
        &cfg.catalog,
        DecodeOptions {
            verbose: args.verbose,
        },
    );
    let mut ingest = Ingest::new(
        decoder,
        rerequester,
        IngestOptions {
            gap_fill,
            start_seq: args.start_seq,
            max_messages: args.max_messages,
            startup_recover_cap: u64::from(cfg.recovery.max_recovery_message_count),
        },
    );

    let stdout = std::io::stdout();
    let mut sink = stdout.lock();
    let mut batch = RecvBatch::new();

    info!(gap_fill, start_seq = args.start_seq, "ingest running");
    while !signal::stop_requested() && !ingest.finished() {
        let n = receiver.recv_batch(&mut batch)?;
        for i in 0..n {
            let pkt = batch.datagram(i);
            if pkt.is_empty() {
                continue;
            }
            ingest
                .handle_datagram(pkt, &mut sink)
                .context("output write failed")?;
            if ingest.finished() {
                break;
            }
        }
    }

    sink.flush().ok();
    info!(total = ingest.state().total_msgs, "stopped");
    Ok(())
}

/// Open the retransmission client according to what the operator asked for:
/// download mode cannot run without it, plain gap-fill degrades with a
/// warning, and a live-only session does not need it at all.
fn open_rerequester(args: &Args, cfg: &config::AppConfig) -> Result<Option<Rerequester>> {
    let Some(peer_ip) = cfg.net.rerequest_ip else {
        if args.start_seq > 0 {
            bail!("download mode needs a retransmission peer in the channel file");
        }
        if args.gap_fill {
            warn!("no retransmission peer configured; gap-fill disabled");
        }
        return Ok(None);
    };

    match Rerequester::open(
        peer_ip,
        cfg.net.rerequest_port,
        cfg.recovery.max_recovery_message_count,
        cfg.recovery.rerequest_rcvbuf,
        Duration::from_millis(cfg.recovery.rerequest_timeout_ms),
    ) {
        Ok(r) => Ok(Some(r)),
        Err(e) if args.start_seq > 0 => {
            Err(e).context("retransmission open failed in download mode")
        }
        Err(e) => {
            if args.gap_fill {
                warn!(error = %e, "retransmission unavailable; gap-fill disabled");
            }
            Ok(None)
        }
    }
}
