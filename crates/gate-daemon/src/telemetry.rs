use std::env;

use anyhow::Result;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    resource::Resource,
    runtime::Tokio,
    trace::{self, Sampler},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SAMPLING_ENV: &str = "GATE_OTEL_SAMPLING_RATE";

#[derive(Debug)]
pub struct TelemetryGuard {
    tracer_installed: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.tracer_installed {
            global::shutdown_tracer_provider();
        }
    }
}

/// Installs the global subscriber: env-filtered console logs plus an OTLP
/// trace exporter when sampling is enabled.
pub fn init(service_name: &str) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (sampling_rate, sampling_warning) =
        parse_sampling_rate(env::var(SAMPLING_ENV).ok().as_deref());

    let (tracer, otel_error) = match build_tracer(service_name, sampling_rate) {
        Ok(tracer) => (tracer, None),
        Err(error) => (None, Some(error)),
    };
    let tracer_installed = tracer.is_some();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .init();

    if let Some(message) = sampling_warning {
        warn!("{message}");
    }

    if let Some(error) = otel_error {
        warn!(%error, "failed to initialize OTEL exporter; continuing with console logs only");
    }

    info!(sampling_rate, "telemetry sampling configured");

    Ok(TelemetryGuard { tracer_installed })
}

fn build_tracer(service_name: &str, sampling_rate: f64) -> Result<Option<trace::Tracer>> {
    if sampling_rate <= 0.0 {
        return Ok(None);
    }

    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = opentelemetry_otlp::new_exporter().tonic();
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            trace::Config::default()
                .with_sampler(Sampler::TraceIdRatioBased(sampling_rate))
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .with_exporter(exporter)
        .install_batch(Tokio)?;

    Ok(Some(tracer))
}

/// Trace export is off unless a ratio in `0.0..=1.0` is configured.
pub fn parse_sampling_rate(raw: Option<&str>) -> (f64, Option<String>) {
    match raw {
        None => (0.0, None),
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return (
                    0.0,
                    Some(format!("{SAMPLING_ENV} is empty; trace export disabled")),
                );
            }

            match trimmed.parse::<f64>() {
                Ok(parsed) if parsed.is_nan() => (
                    0.0,
                    Some(format!(
                        "{SAMPLING_ENV}='{trimmed}' is not a valid float; trace export disabled"
                    )),
                ),
                Ok(parsed) => {
                    if (0.0..=1.0).contains(&parsed) {
                        (parsed, None)
                    } else {
                        let clamped = parsed.clamp(0.0, 1.0);
                        (
                            clamped,
                            Some(format!(
                                "{SAMPLING_ENV}={trimmed} outside 0.0..=1.0; clamped to {clamped}"
                            )),
                        )
                    }
                }
                Err(_) => (
                    0.0,
                    Some(format!(
                        "{SAMPLING_ENV}='{trimmed}' is not a valid float; trace export disabled"
                    )),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_sampling_rate;

    #[test]
    fn parse_valid_sampling_rate() {
        assert_eq!(parse_sampling_rate(Some("0.25")), (0.25, None));
        assert_eq!(parse_sampling_rate(Some("1")), (1.0, None));
    }

    #[test]
    fn unset_sampling_rate_disables_export() {
        assert_eq!(parse_sampling_rate(None), (0.0, None));
    }

    #[test]
    fn parse_out_of_bounds_sampling_rate() {
        let (rate, warning) = parse_sampling_rate(Some("1.5"));
        assert_eq!(rate, 1.0);
        assert!(warning
            .unwrap()
            .contains("GATE_OTEL_SAMPLING_RATE=1.5 outside 0.0..=1.0"));

        let (rate, warning) = parse_sampling_rate(Some("-0.3"));
        assert_eq!(rate, 0.0);
        assert!(warning
            .unwrap()
            .contains("GATE_OTEL_SAMPLING_RATE=-0.3 outside"));
    }

    #[test]
    fn parse_invalid_sampling_rate() {
        let (rate, warning) = parse_sampling_rate(Some("abc"));
        assert_eq!(rate, 0.0);
        assert!(warning
            .unwrap()
            .contains("GATE_OTEL_SAMPLING_RATE='abc' is not a valid float"));

        let (rate, _) = parse_sampling_rate(Some("NaN"));
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn parse_empty_sampling_rate() {
        let (rate, warning) = parse_sampling_rate(Some("   "));
        assert_eq!(rate, 0.0);
        assert!(warning
            .unwrap()
            .contains("GATE_OTEL_SAMPLING_RATE is empty; trace export disabled"));
    }
}
