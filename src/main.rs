use booking_reconciler::application::config::ReconcilerConfig;
use booking_reconciler::application::reconciler::{BookingOrder, PaymentReconciler};
use booking_reconciler::domain::booking::{DomainName, OwnerId};
use booking_reconciler::domain::payment::{Amount, ChannelMessage, CorrelationId, Msisdn};
use booking_reconciler::domain::ports::{BookingStoreBox, ChannelConnectorBox, PaymentGatewayBox};
use booking_reconciler::infrastructure::in_memory::InMemoryBookingStore;
use booking_reconciler::infrastructure::scripted::{
    ChannelStep, ConnectionScript, GatewayResponse, ScriptedConnector, ScriptedGateway,
};
use booking_reconciler::interfaces::csv::booking_writer::BookingWriter;
use booking_reconciler::interfaces::csv::script_reader::{ScriptEvent, ScriptReader, ScriptRow};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;

/// Replays a scripted gateway/relay session through the payment reconciler
/// and prints the outcome plus the resulting bookings.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script CSV describing gateway and relay behavior
    script: PathBuf,

    /// Domain to book
    #[arg(long)]
    domain: String,

    /// Booking owner identifier
    #[arg(long)]
    owner: String,

    /// Payer phone number (07…, +254… or 254…)
    #[arg(long)]
    phone: String,

    /// Charge amount in whole shillings
    #[arg(long)]
    amount: u64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Overall confirmation window in milliseconds
    #[arg(long, default_value_t = 120_000)]
    confirmation_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let order = BookingOrder {
        domain: DomainName::parse(&cli.domain).into_diagnostic()?,
        owner: OwnerId::new(&cli.owner),
        amount: Amount::new(cli.amount).into_diagnostic()?,
        payer: Msisdn::parse(&cli.phone).into_diagnostic()?,
    };

    // Unless the script says otherwise, the gateway acks with a fixed
    // checkout id that deliver rows can reference.
    let mut gateway_response = GatewayResponse::Ack {
        correlation_id: Some(CorrelationId::new("SIM-CHECKOUT-1")),
    };
    let mut gateway_delay = Duration::ZERO;
    let mut connections: Vec<ConnectionScript> = vec![Vec::new()];

    let file = File::open(&cli.script).into_diagnostic()?;
    for row in ScriptReader::new(file).rows() {
        match row {
            Ok(row) => apply_row(
                row,
                &mut gateway_response,
                &mut gateway_delay,
                &mut connections,
            ),
            Err(e) => {
                eprintln!("Error reading script row: {e}");
            }
        }
    }

    let gateway: PaymentGatewayBox =
        Box::new(ScriptedGateway::new(gateway_response).with_delay(gateway_delay));
    let connector: ChannelConnectorBox = Box::new(ScriptedConnector::new(connections));

    let store: BookingStoreBox = match cli.db_path {
        // Use persistent storage (RocksDB)
        Some(path) => open_persistent_store(path)?,
        None => Box::new(InMemoryBookingStore::new()),
    };

    let config = ReconcilerConfig {
        confirmation_timeout: Duration::from_millis(cli.confirmation_timeout_ms),
        ..Default::default()
    };
    let reconciler = PaymentReconciler::new(gateway, connector, store, config);

    let (_cancel, cancel_rx) = oneshot::channel();
    let report = reconciler.reconcile(order, cancel_rx).await;

    match &report.outcome {
        Ok(booking) => {
            println!(
                "outcome: confirmed ({} until {})",
                booking.domain_name,
                booking.expires_at.to_rfc3339()
            );
        }
        Err(failure) => {
            println!("outcome: failed ({failure})");
            if failure.requires_manual_reconciliation() {
                eprintln!(
                    "ATTENTION: charge captured without a booking record; reference {}",
                    report.request.account_reference
                );
            }
        }
    }

    let bookings = reconciler.into_results().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BookingWriter::new(stdout.lock());
    writer.write_bookings(bookings).into_diagnostic()?;

    Ok(())
}

fn apply_row(
    row: ScriptRow,
    gateway_response: &mut GatewayResponse,
    gateway_delay: &mut Duration,
    connections: &mut Vec<ConnectionScript>,
) {
    let delay = Duration::from_millis(row.delay_ms.unwrap_or(0));
    match row.event {
        ScriptEvent::Ack => {
            *gateway_response = GatewayResponse::Ack {
                correlation_id: row.correlation_id.map(CorrelationId::new),
            };
            *gateway_delay = delay;
        }
        ScriptEvent::Reject => {
            *gateway_response = GatewayResponse::Reject {
                reason: row.reason.unwrap_or_else(|| "rejected by script".to_string()),
            };
            *gateway_delay = delay;
        }
        ScriptEvent::Deliver => {
            let message = ChannelMessage {
                correlation_id: row.correlation_id.map(CorrelationId::new),
                result_code: row.result_code,
                reason: row.reason,
            };
            current(connections).push(ChannelStep::deliver_after(delay, message));
        }
        ScriptEvent::Close => {
            current(connections).push(ChannelStep::close_after(delay));
            connections.push(Vec::new());
        }
        // The connection stays open; nothing to script.
        ScriptEvent::Silence => {}
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent_store(path: PathBuf) -> Result<BookingStoreBox> {
    let store = booking_reconciler::infrastructure::rocksdb::RocksDbBookingStore::open(path)
        .into_diagnostic()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent_store(_path: PathBuf) -> Result<BookingStoreBox> {
    Err(miette::miette!(
        "persistent storage requires the storage-rocksdb feature"
    ))
}

fn current(connections: &mut Vec<ConnectionScript>) -> &mut ConnectionScript {
    if connections.is_empty() {
        connections.push(Vec::new());
    }
    let last = connections.len() - 1;
    &mut connections[last]
}
