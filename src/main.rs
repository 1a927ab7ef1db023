//! NIDS agent entrypoint: reads newline-delimited JSON samples from a file
//! (batch) or stdin (streaming) and writes one JSON result per line to stdout.
//! Alerts go to the log and, when enabled, the encrypted journal and the uplink.

use nids_agent::{
    config::DetectorConfig, features::Sample, logging::StructuredLogger,
    session::DetectionSession, storage::AlertJournal, uplink::AlertUplink, DetectError,
    DetectionResult,
};
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

static STOP: AtomicBool = AtomicBool::new(false);

/// How often an idle stream rechecks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(200);

/// Output line for a sample that produced no result.
#[derive(Serialize)]
struct LineError {
    line: usize,
    error: String,
}

fn parse_line(line: &str) -> Result<Sample, DetectError> {
    Ok(Sample::from_json_str(line)?)
}

fn write_outcome(
    out: &mut impl Write,
    line: usize,
    outcome: Result<DetectionResult, DetectError>,
) -> std::io::Result<()> {
    match outcome {
        Ok(result) => StructuredLogger::emit_json(&result, out),
        Err(e) => StructuredLogger::emit_json(
            &LineError {
                line,
                error: e.to_string(),
            },
            out,
        ),
    }
}

/// Whole file as one batch; results come back in input order.
fn run_batch(
    session: &mut DetectionSession,
    path: &Path,
    out: &mut impl Write,
) -> Result<(), BoxError> {
    let text = std::fs::read_to_string(path)?;
    let mut parsed = Vec::new();
    let mut samples = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(s) => {
                parsed.push((i + 1, None));
                samples.push(s);
            }
            Err(e) => {
                session.record_rejected(&e);
                parsed.push((i + 1, Some(e)));
            }
        }
    }
    info!(path = %path.display(), samples = samples.len(), "batch loaded");

    let mut results = session.predict_batch(&samples).into_iter();
    for (n, parse_err) in parsed {
        let outcome = match parse_err {
            Some(e) => Err(e),
            None => match results.next() {
                Some(r) => r,
                None => break,
            },
        };
        write_outcome(out, n, outcome)?;
    }
    Ok(())
}

/// Lines are read on their own thread so the stop flag is honoured while
/// input is idle.
fn spawn_line_reader<R>(input: R) -> Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = sync_channel(1024);
    std::thread::spawn(move || {
        for line in input.lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn run_stream(
    session: &mut DetectionSession,
    lines: &Receiver<std::io::Result<String>>,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> Result<(), BoxError> {
    let mut n = 0;
    loop {
        if stop.load(Ordering::Relaxed) {
            info!(lines = n, "interrupted; stopping stream");
            break;
        }
        let line = match lines.recv_timeout(STOP_POLL) {
            Ok(line) => line?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        n += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outcome = match parse_line(line) {
            Ok(s) => session.predict_single(&s),
            Err(e) => {
                session.record_rejected(&e);
                Err(e)
            }
        };
        write_outcome(out, n, outcome)?;
        out.flush()?;
    }
    Ok(())
}

fn attach_sinks(session: &mut DetectionSession, config: &DetectorConfig) -> Result<(), BoxError> {
    if config.journal.enabled {
        std::fs::create_dir_all(&config.data_dir)?;
        let secret = match std::env::var("NIDS_JOURNAL_SECRET") {
            Ok(s) => s.into_bytes(),
            Err(_) => {
                warn!("NIDS_JOURNAL_SECRET not set; journal key derived from placeholder");
                b"sensor-secret-placeholder".to_vec()
            }
        };
        let path = config.journal_path();
        session.add_sink(Box::new(AlertJournal::open(&path, &secret)?));
        info!(path = %path.display(), "alert journal enabled");
    }
    if let Some(uplink) = AlertUplink::new(config.uplink.clone()) {
        info!(url = uplink.alerts_url(), sensor_id = uplink.sensor_id(), "alert uplink enabled");
        session.add_sink(Box::new(uplink));
    }
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("NIDS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = DetectorConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), "NIDS agent starting");

    let mut session = DetectionSession::load(&config)?;
    attach_sinks(&mut session, &config)?;

    // second Ctrl+C skips the graceful path (e.g. a sink stuck flushing)
    let _ = ctrlc::set_handler(|| {
        if STOP.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => run_batch(&mut session, &path, &mut out)?,
        None => {
            info!("reading samples from stdin (Ctrl+C to stop)");
            let lines = spawn_line_reader(BufReader::new(std::io::stdin()));
            run_stream(&mut session, &lines, &STOP, &mut out)?;
        }
    }
    out.flush()?;
    session.flush_sinks();

    let stats = session.stats();
    info!(
        samples = stats.samples,
        anomalies = stats.anomalies,
        packet_alerts = stats.packet_alerts,
        host_alerts = stats.host_alerts,
        errors = stats.errors,
        compromised_hosts = session.windows().compromised().count(),
        "NIDS agent stopping"
    );
    Ok(())
}
