//! Prometheus exposition of watt checker readings.
//!
//! Gauges are refreshed at scrape time: every request to `/metrics` collects
//! all devices concurrently (each through its own polling cache) before the
//! registry is encoded.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::future::join_all;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::session::WattChecker;
use crate::transport::Transport;

/// Help text shared by the reading gauges.
const HELP: &str = "REX-BTWATTCH";

/// Label carrying the device display name.
const NAME_LABEL: &str = "Name";

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[NAME_LABEL])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Metrics for a set of device sessions.
pub struct Exporter<T> {
    registry: Registry,
    watt: GaugeVec,
    voltage: GaugeVec,
    ampere: GaugeVec,
    up: GaugeVec,
    devices: Vec<Arc<WattChecker<T>>>,
}

impl<T: Transport> Exporter<T> {
    /// Registers the gauges for `devices`.
    pub fn new(devices: Vec<Arc<WattChecker<T>>>) -> Result<Self> {
        let registry = Registry::new();
        let watt = gauge(&registry, "REXBTWATTCH_Watt", HELP)?;
        let voltage = gauge(&registry, "REXBTWATTCH_Voltage", HELP)?;
        let ampere = gauge(&registry, "REXBTWATTCH_Ampere", HELP)?;
        let up = gauge(
            &registry,
            "REXBTWATTCH_Up",
            "1 if the last poll of the REX-BTWATTCH succeeded",
        )?;

        Ok(Self {
            registry,
            watt,
            voltage,
            ampere,
            up,
            devices,
        })
    }

    /// Returns the exported sessions.
    #[must_use]
    pub fn devices(&self) -> &[Arc<WattChecker<T>>] {
        &self.devices
    }

    /// Collects every device and encodes the registry in text format.
    pub async fn render(&self) -> Result<String> {
        let samples = join_all(self.devices.iter().map(|device| device.collect())).await;

        for (device, sample) in self.devices.iter().zip(samples) {
            let labels = [device.name()];
            let reading = sample.reading();
            self.watt.with_label_values(&labels).set(reading.power_w);
            self.voltage.with_label_values(&labels).set(reading.voltage_v);
            self.ampere.with_label_values(&labels).set(reading.current_ma);
            self.up
                .with_label_values(&labels)
                .set(if sample.is_available() { 1.0 } else { 0.0 });
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {e}")).into())
    }
}

/// Builds the HTTP router serving `GET /metrics`.
pub fn router<T: Transport + 'static>(exporter: Arc<Exporter<T>>) -> Router {
    Router::new()
        .route("/metrics", get(metrics::<T>))
        .with_state(exporter)
}

async fn metrics<T: Transport + 'static>(State(exporter): State<Arc<Exporter<T>>>) -> Response {
    match exporter.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!("failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandCode, MeasurementMode};
    use crate::session::SessionConfig;
    use crate::transport::MockTransport;
    use chrono::NaiveDate;

    async fn device(name: &str, mock: &MockTransport) -> Arc<WattChecker<MockTransport>> {
        mock.push_response(CommandCode::ClockSet, 0x00, &[]);
        mock.push_response(CommandCode::StartMeasurement, 0x00, &[]);
        let device = WattChecker::new(name, mock.clone(), SessionConfig::default());
        let time = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        device.set_clock(time).await.unwrap();
        device
            .start_measurement(MeasurementMode::Normal)
            .await
            .unwrap();
        Arc::new(device)
    }

    fn measurement(current: u32, voltage: u32, power: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&current.to_le_bytes()[..3]);
        data.extend_from_slice(&voltage.to_le_bytes()[..3]);
        data.extend_from_slice(&power.to_le_bytes()[..3]);
        data.extend_from_slice(&[0, 0, 0, 1, 1, 24]);
        data
    }

    #[tokio::test]
    async fn test_render_reports_each_device() {
        let desk = MockTransport::new();
        let fridge = MockTransport::new();
        let devices = vec![device("desk", &desk).await, device("fridge", &fridge).await];

        desk.push_response(
            CommandCode::ReadMeasurement,
            0x00,
            &measurement(128, 100_000, 2000),
        );
        fridge.push_response(CommandCode::ReadMeasurement, 0x04, &[0; 15]);

        let exporter = Exporter::new(devices).unwrap();
        let body = exporter.render().await.unwrap();

        assert!(body.contains("# HELP REXBTWATTCH_Watt REX-BTWATTCH"));
        assert!(body.contains("REXBTWATTCH_Watt{Name=\"desk\"} 10"));
        assert!(body.contains("REXBTWATTCH_Voltage{Name=\"desk\"} 100"));
        assert!(body.contains("REXBTWATTCH_Ampere{Name=\"desk\"} 1"));
        assert!(body.contains("REXBTWATTCH_Up{Name=\"desk\"} 1"));
        assert!(body.contains("REXBTWATTCH_Watt{Name=\"fridge\"} 0"));
        assert!(body.contains("REXBTWATTCH_Up{Name=\"fridge\"} 0"));
    }

    #[tokio::test]
    async fn test_render_without_devices() {
        let exporter = Exporter::<MockTransport>::new(Vec::new()).unwrap();
        assert!(exporter.devices().is_empty());
        assert!(exporter.render().await.unwrap().is_empty());
    }
}
