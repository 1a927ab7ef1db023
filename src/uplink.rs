//! Uplink client: forward raised alerts to a central collector API.
//!
//! Alerts are queued to a background sender thread, so a slow or unreachable
//! collector never stalls detection. A full queue drops the alert and counts it.

use crate::alerts::{Alert, AlertSink, SinkError};
use crate::config::UplinkConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

const ALERTS_PATH: &str = "/api/v1/alerts";

#[derive(Serialize)]
struct AlertPayload<'a> {
    sensor_id: &'a str,
    severity: &'a str,
    #[serde(flatten)]
    alert: &'a Alert,
}

enum Outbound {
    Alert(Alert),
    /// Acked once everything queued before it has been attempted.
    Flush(SyncSender<()>),
}

/// Blocking HTTP side, owned by the sender thread.
struct UplinkClient {
    client: reqwest::blocking::Client,
    url: String,
    sensor_id: String,
}

impl UplinkClient {
    fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), String> {
        let res = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(format!("{} {}", status, text));
        }
        Ok(())
    }

    fn report(&self, alert: &Alert) -> Result<(), String> {
        self.post(&AlertPayload {
            sensor_id: &self.sensor_id,
            severity: alert.kind.severity(),
            alert,
        })
    }

    fn run(self, rx: Receiver<Outbound>, delivered: Arc<AtomicU64>) {
        for msg in rx {
            match msg {
                Outbound::Alert(alert) => match self.report(&alert) {
                    Ok(()) => {
                        delivered.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            alert_id = %alert.id,
                            kind = alert.kind.as_str(),
                            "uplink alert reported"
                        );
                    }
                    Err(e) => warn!(alert_id = %alert.id, error = %e, "uplink alert failed"),
                },
                Outbound::Flush(ack) => {
                    let _ = ack.try_send(());
                }
            }
        }
    }
}

pub struct AlertUplink {
    tx: SyncSender<Outbound>,
    url: String,
    sensor_id: String,
    flush_timeout: Duration,
    dropped: AtomicU64,
    delivered: Arc<AtomicU64>,
    // detached on drop; the thread exits once the queue is drained
    _sender: JoinHandle<()>,
}

impl AlertUplink {
    /// None when the uplink is disabled, has no endpoint, or the HTTP client
    /// or sender thread cannot be started.
    pub fn new(config: UplinkConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let endpoint = config.endpoint.as_ref()?.trim_end_matches('/');
        let sensor_id = config
            .sensor_id
            .clone()
            .unwrap_or_else(|| "local-sensor".to_string());
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| warn!(error = %e, "uplink client unavailable"))
            .ok()?;

        let url = format!("{}{}", endpoint, ALERTS_PATH);
        let worker = UplinkClient {
            client,
            url: url.clone(),
            sensor_id: sensor_id.clone(),
        };
        let (tx, rx) = sync_channel(config.queue_capacity.max(1));
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = delivered.clone();
        let sender = std::thread::Builder::new()
            .name("nids-uplink".to_string())
            .spawn(move || worker.run(rx, counter))
            .map_err(|e| warn!(error = %e, "uplink sender thread unavailable"))
            .ok()?;

        Some(Self {
            tx,
            url,
            sensor_id,
            flush_timeout: timeout,
            dropped: AtomicU64::new(0),
            delivered,
            _sender: sender,
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn alerts_url(&self) -> &str {
        &self.url
    }

    /// Alerts discarded because the queue was full or the sender had stopped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Alerts the collector accepted.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl AlertSink for AlertUplink {
    fn name(&self) -> &'static str {
        "uplink"
    }

    fn emit(&self, alert: &Alert) -> Result<(), SinkError> {
        match self.tx.try_send(Outbound::Alert(alert.clone())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err("uplink queue full; alert dropped".into())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err("uplink sender stopped; alert dropped".into())
            }
        }
    }

    fn flush(&self) {
        let (ack_tx, ack_rx) = sync_channel(1);
        if self.tx.try_send(Outbound::Flush(ack_tx)).is_err() {
            warn!(
                dropped = self.dropped(),
                "uplink queue full at flush; pending alerts may be lost"
            );
            return;
        }
        if ack_rx.recv_timeout(self.flush_timeout).is_err() {
            warn!(
                timeout_secs = self.flush_timeout.as_secs(),
                "uplink did not drain before flush deadline"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::session::SourceId;
    use chrono::Utc;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    fn config(enabled: bool, endpoint: Option<&str>) -> UplinkConfig {
        UplinkConfig {
            enabled,
            endpoint: endpoint.map(str::to_string),
            ..Default::default()
        }
    }

    fn alert() -> Alert {
        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now(),
            result_id: "r-1".to_string(),
            source: SourceId::new("10.9.0.1", Some(4444)),
            kind: AlertKind::PacketAnomaly { votes: 3 },
        }
    }

    /// Accepts connections and never answers.
    fn silent_collector() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for conn in listener.incoming().flatten() {
                held.push(conn);
            }
        });
        format!("http://{}", addr)
    }

    fn read_body(conn: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = conn.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let l = l.to_ascii_lowercase();
                        l.strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return String::from_utf8_lossy(&buf[end + 4..end + 4 + len]).into_owned();
                }
            }
        }
    }

    /// Answers 200 to every request and hands the request body to the test.
    fn accepting_collector() -> (String, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            for mut conn in listener.incoming().flatten() {
                let body = read_body(&mut conn);
                let _ = conn.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
                let _ = tx.send(body);
            }
        });
        (format!("http://{}", addr), rx)
    }

    #[test]
    fn disabled_or_missing_endpoint_yields_none() {
        assert!(AlertUplink::new(config(false, Some("http://collector:8080"))).is_none());
        assert!(AlertUplink::new(config(true, None)).is_none());
    }

    #[test]
    fn url_and_default_sensor() {
        let u = AlertUplink::new(config(true, Some("http://collector:8080/"))).unwrap();
        assert_eq!(u.alerts_url(), "http://collector:8080/api/v1/alerts");
        assert_eq!(u.sensor_id(), "local-sensor");
    }

    #[test]
    fn emit_does_not_wait_for_unresponsive_collector() {
        let endpoint = silent_collector();
        let u = AlertUplink::new(UplinkConfig {
            timeout_secs: 2,
            queue_capacity: 1,
            ..config(true, Some(endpoint.as_str()))
        })
        .unwrap();

        let start = Instant::now();
        let results: Vec<_> = (0..5).map(|_| u.emit(&alert())).collect();
        assert!(start.elapsed() < Duration::from_millis(500));

        assert!(results[0].is_ok());
        // one alert in flight plus one queued at most
        assert!(results.iter().filter(|r| r.is_err()).count() >= 3);
        assert!(u.dropped() >= 3);
        assert_eq!(u.delivered(), 0);
    }

    #[test]
    fn flush_delivers_queued_alert() {
        let (endpoint, bodies) = accepting_collector();
        let u = AlertUplink::new(UplinkConfig {
            timeout_secs: 5,
            sensor_id: Some("sensor-7".to_string()),
            ..config(true, Some(endpoint.as_str()))
        })
        .unwrap();

        let a = alert();
        u.emit(&a).unwrap();
        u.flush();
        assert_eq!(u.delivered(), 1);

        let body = bodies.recv_timeout(Duration::from_secs(5)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["sensor_id"], "sensor-7");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["id"], a.id.as_str());
        assert_eq!(json["src_ip"], "10.9.0.1");
        assert_eq!(json["kind"]["type"], "packet_anomaly");
    }
}
