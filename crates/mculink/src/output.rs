use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mculink_session::{Reply, TelemetrySnapshot};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    event: &'static str,
    endpoint: &'a str,
    correlation_id: &'a str,
    body: &'a str,
    elapsed_ms: u64,
    timestamp: String,
}

pub fn print_reply(reply: &Reply, endpoint: &str, elapsed: Duration, format: OutputFormat) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                event: "reply",
                endpoint,
                correlation_id: &reply.correlation_id,
                body: &reply.body,
                elapsed_ms,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "ELAPSED", "REPLY"])
                .add_row(vec![
                    reply.correlation_id.clone(),
                    format!("{elapsed_ms}ms"),
                    reply.body.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} elapsed={}ms reply={}",
                reply.correlation_id, elapsed_ms, reply.body
            );
        }
        OutputFormat::Raw => print_line(&reply.body),
    }
}

/// What a telemetry line reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// The device acknowledged the start command after this long.
    Started(Duration),
    /// A fresh rate sample.
    Sample(u32),
    /// Final tally; carries how long the stop command took.
    Summary(Duration),
}

#[derive(Serialize)]
struct TelemetryOutput<'a> {
    event: &'static str,
    endpoint: &'a str,
    updates_per_second: Option<u32>,
    latest_value: Option<&'a str>,
    update_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    round_trip_ms: Option<u64>,
    timestamp: String,
}

pub fn print_telemetry(
    event: TelemetryEvent,
    snapshot: &TelemetrySnapshot,
    endpoint: &str,
    format: OutputFormat,
) {
    let (name, rate, round_trip) = match event {
        TelemetryEvent::Started(took) => ("started", None, Some(took)),
        TelemetryEvent::Sample(fps) => ("sample", Some(fps), None),
        TelemetryEvent::Summary(took) => ("summary", snapshot.last_rate, Some(took)),
    };
    let round_trip_ms = round_trip.map(|took| took.as_millis() as u64);
    let latest = snapshot.latest_value.as_deref();

    match format {
        OutputFormat::Json => {
            let out = TelemetryOutput {
                event: name,
                endpoint,
                updates_per_second: rate,
                latest_value: latest,
                update_count: snapshot.update_count,
                round_trip_ms,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "UPDATES/S", "COUNT", "LATEST", "ROUND TRIP"])
                .add_row(vec![
                    name.to_string(),
                    display_or_dash(rate),
                    snapshot.update_count.to_string(),
                    latest.unwrap_or("-").to_string(),
                    round_trip_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms}ms")),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match round_trip_ms {
            Some(ms) => println!(
                "{name}: took={ms}ms updates/s={} count={} latest={}",
                display_or_dash(rate),
                snapshot.update_count,
                latest.unwrap_or("-")
            ),
            None => println!(
                "{name}: updates/s={} count={} latest={}",
                display_or_dash(rate),
                snapshot.update_count,
                latest.unwrap_or("-")
            ),
        },
        OutputFormat::Raw => {
            if let TelemetryEvent::Sample(fps) = event {
                print_line(&fps.to_string());
            }
        }
    }
}

/// Timing of one benchmark batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchBatch {
    pub payload_bytes: usize,
    pub count: u32,
    pub total: Duration,
}

impl BenchBatch {
    pub fn new(payload_bytes: usize, count: u32, total: Duration) -> Self {
        Self {
            payload_bytes,
            count,
            total,
        }
    }

    pub fn per_message(&self) -> Duration {
        self.total / self.count.max(1)
    }
}

#[derive(Serialize)]
struct BenchOutput<'a> {
    event: &'static str,
    endpoint: &'a str,
    payload_bytes: usize,
    count: u32,
    total_ms: u64,
    ms_per_message: f64,
    timestamp: String,
}

pub fn print_bench(batch: &BenchBatch, endpoint: &str, format: OutputFormat) {
    let total_ms = batch.total.as_millis() as u64;
    let ms_per_message = batch.per_message().as_secs_f64() * 1000.0;
    match format {
        OutputFormat::Json => {
            let out = BenchOutput {
                event: "bench",
                endpoint,
                payload_bytes: batch.payload_bytes,
                count: batch.count,
                total_ms,
                ms_per_message,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PAYLOAD", "COUNT", "TOTAL", "PER MESSAGE"])
                .add_row(vec![
                    format!("{} bytes", batch.payload_bytes),
                    batch.count.to_string(),
                    format!("{total_ms}ms"),
                    format!("{ms_per_message:.2}ms"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sending {} byte msg: {ms_per_message:.2} ms/msg ({} msgs in {total_ms}ms)",
                batch.payload_bytes, batch.count
            );
        }
        OutputFormat::Raw => print_line(&format!("{ms_per_message:.3}")),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_line(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn display_or_dash(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
