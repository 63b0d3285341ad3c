use std::collections::HashMap;

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use percent_encoding::percent_decode_str;

pub const DEFAULT_SERVICE_NAME: &str = "ai-gateway";

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("unsupported {0} value: {1}")]
	UnsupportedValue(&'static str, String),
	#[error("only the grpc protocol is supported for OTLP logs, got {0:?}")]
	UnsupportedLogsProtocol(String),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MetricsExporterKind {
	None,
	Console,
	/// The always-on Prometheus reader supplied by the host.
	#[default]
	Prometheus,
	Otlp,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogsExporterKind {
	#[default]
	None,
	Console,
	Otlp,
}

/// Config is the OpenTelemetry export configuration, resolved entirely from standard
/// `OTEL_*` environment variables.
#[derive(Clone, Debug, Default)]
pub struct Config {
	pub disabled: bool,
	pub metrics_exporter: MetricsExporterKind,
	pub metrics_endpoint: Option<String>,
	pub logs_exporter: LogsExporterKind,
	pub logs_endpoint: Option<String>,
	pub logs_headers: Vec<(String, String)>,
	pub service_name: String,
	/// Sorted by key; values are URL-decoded.
	pub resource_attributes: Vec<(String, String)>,
}

impl Config {
	pub fn from_env() -> Result<Config, Error> {
		Self::from_lookup(&|k| std::env::var(k).ok())
	}

	/// from_lookup resolves the configuration from an arbitrary variable source. The env is
	/// injected so the parsing rules are testable without process-global state.
	pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Config, Error> {
		let disabled = get("OTEL_SDK_DISABLED")
			.map(|v| v.eq_ignore_ascii_case("true"))
			.unwrap_or(false);

		let metrics_exporter = match get("OTEL_METRICS_EXPORTER").as_deref() {
			None | Some("prometheus") => MetricsExporterKind::Prometheus,
			Some("none") => MetricsExporterKind::None,
			Some("console") => MetricsExporterKind::Console,
			Some("otlp") => MetricsExporterKind::Otlp,
			Some(other) => {
				return Err(Error::UnsupportedValue(
					"OTEL_METRICS_EXPORTER",
					other.to_string(),
				));
			},
		};

		// The metrics-specific endpoint wins over the generic one.
		let metrics_endpoint =
			get("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT").or_else(|| get("OTEL_EXPORTER_OTLP_ENDPOINT"));

		let logs_exporter = match get("OTEL_LOGS_EXPORTER").as_deref() {
			None | Some("none") => LogsExporterKind::None,
			Some("console") => LogsExporterKind::Console,
			Some("otlp") => LogsExporterKind::Otlp,
			Some(other) => {
				return Err(Error::UnsupportedValue(
					"OTEL_LOGS_EXPORTER",
					other.to_string(),
				));
			},
		};

		if logs_exporter == LogsExporterKind::Otlp {
			// Only grpc is supported for the OTLP logs path.
			let protocol = get("OTEL_EXPORTER_OTLP_LOGS_PROTOCOL")
				.or_else(|| get("OTEL_EXPORTER_OTLP_PROTOCOL"))
				.unwrap_or_else(|| "grpc".to_string());
			if protocol != "grpc" {
				return Err(Error::UnsupportedLogsProtocol(protocol));
			}
		}

		let logs_endpoint =
			get("OTEL_EXPORTER_OTLP_LOGS_ENDPOINT").or_else(|| get("OTEL_EXPORTER_OTLP_ENDPOINT"));
		let logs_headers = get("OTEL_EXPORTER_OTLP_LOGS_HEADERS")
			.or_else(|| get("OTEL_EXPORTER_OTLP_HEADERS"))
			.map(|v| parse_key_values(&v))
			.unwrap_or_default();

		let service_name =
			get("OTEL_SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
		let resource_attributes = get("OTEL_RESOURCE_ATTRIBUTES")
			.map(|v| parse_key_values(&v))
			.unwrap_or_default();

		Ok(Config {
			disabled,
			metrics_exporter,
			metrics_endpoint,
			logs_exporter,
			logs_endpoint,
			logs_headers,
			service_name,
			resource_attributes,
		})
	}

	/// resource builds the OTel resource: configured attributes (sorted by key), with
	/// `service.name` taking the configured override.
	pub fn resource(&self) -> Resource {
		let mut builder = Resource::builder();
		for (k, v) in &self.resource_attributes {
			if k == "service.name" {
				continue;
			}
			builder = builder.with_attribute(KeyValue::new(k.clone(), v.clone()));
		}
		builder = builder.with_service_name(self.service_name.clone());
		builder.build()
	}
}

/// metric_exporter builds the OTLP/gRPC metric exporter when the environment selected one.
/// The always-on Prometheus reader is supplied by the host and needs no exporter here.
pub fn metric_exporter(
	cfg: &Config,
) -> Option<Result<opentelemetry_otlp::MetricExporter, opentelemetry_otlp::ExporterBuildError>> {
	if cfg.disabled || cfg.metrics_exporter != MetricsExporterKind::Otlp {
		return None;
	}
	let mut builder = opentelemetry_otlp::MetricExporter::builder().with_tonic();
	if let Some(endpoint) = &cfg.metrics_endpoint {
		builder = builder.with_endpoint(endpoint.clone());
	}
	Some(builder.build())
}

/// log_exporter builds the OTLP/gRPC logs exporter when the environment selected one.
pub fn log_exporter(
	cfg: &Config,
) -> Option<Result<opentelemetry_otlp::LogExporter, opentelemetry_otlp::ExporterBuildError>> {
	if cfg.disabled || cfg.logs_exporter != LogsExporterKind::Otlp {
		return None;
	}
	let mut builder = opentelemetry_otlp::LogExporter::builder().with_tonic();
	if let Some(endpoint) = &cfg.logs_endpoint {
		builder = builder.with_endpoint(endpoint.clone());
	}
	Some(builder.build())
}

/// parse_key_values parses comma-separated `k=v` pairs with URL-decoded values, deduplicated
/// (last wins) and sorted by key on emit.
pub fn parse_key_values(s: &str) -> Vec<(String, String)> {
	let mut map = HashMap::new();
	for pair in s.split(',') {
		let pair = pair.trim();
		if pair.is_empty() {
			continue;
		}
		let Some((k, v)) = pair.split_once('=') else {
			continue;
		};
		let value = percent_decode_str(v)
			.decode_utf8()
			.map(|c| c.to_string())
			.unwrap_or_else(|_| v.to_string());
		map.insert(k.to_string(), value);
	}
	let mut out: Vec<(String, String)> = map.into_iter().collect();
	out.sort_by(|a, b| a.0.cmp(&b.0));
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
		move |k| {
			vars
				.iter()
				.find(|(name, _)| *name == k)
				.map(|(_, v)| v.to_string())
		}
	}

	#[test]
	fn defaults() {
		let cfg = Config::from_lookup(&lookup(&[])).unwrap();
		assert!(!cfg.disabled);
		assert_eq!(cfg.metrics_exporter, MetricsExporterKind::Prometheus);
		assert_eq!(cfg.logs_exporter, LogsExporterKind::None);
		assert_eq!(cfg.service_name, "ai-gateway");
	}

	#[test]
	fn metrics_endpoint_specific_wins() {
		let cfg = Config::from_lookup(&lookup(&[
			("OTEL_METRICS_EXPORTER", "otlp"),
			("OTEL_EXPORTER_OTLP_ENDPOINT", "http://generic:4317"),
			("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT", "http://metrics:4317"),
		]))
		.unwrap();
		assert_eq!(cfg.metrics_exporter, MetricsExporterKind::Otlp);
		assert_eq!(cfg.metrics_endpoint.as_deref(), Some("http://metrics:4317"));
	}

	#[test]
	fn logs_fall_back_to_generic_endpoint() {
		let cfg = Config::from_lookup(&lookup(&[
			("OTEL_LOGS_EXPORTER", "otlp"),
			("OTEL_EXPORTER_OTLP_ENDPOINT", "http://generic:4317"),
		]))
		.unwrap();
		assert_eq!(cfg.logs_exporter, LogsExporterKind::Otlp);
		assert_eq!(cfg.logs_endpoint.as_deref(), Some("http://generic:4317"));
	}

	#[test]
	fn non_grpc_logs_protocol_is_rejected() {
		let err = Config::from_lookup(&lookup(&[
			("OTEL_LOGS_EXPORTER", "otlp"),
			("OTEL_EXPORTER_OTLP_LOGS_PROTOCOL", "http/protobuf"),
		]))
		.unwrap_err();
		assert!(matches!(err, Error::UnsupportedLogsProtocol(_)));
	}

	#[test]
	fn sdk_disabled() {
		let cfg = Config::from_lookup(&lookup(&[("OTEL_SDK_DISABLED", "TRUE")])).unwrap();
		assert!(cfg.disabled);
	}

	#[test]
	fn resource_attributes_decode_and_sort() {
		let parsed = parse_key_values("zone=us%2Deast,team=ai%20infra,app=gw");
		assert_eq!(
			parsed,
			vec![
				("app".to_string(), "gw".to_string()),
				("team".to_string(), "ai infra".to_string()),
				("zone".to_string(), "us-east".to_string()),
			]
		);
	}

	#[test]
	fn malformed_pairs_are_skipped_and_last_wins() {
		let parsed = parse_key_values("a=1,,oops,a=2");
		assert_eq!(parsed, vec![("a".to_string(), "2".to_string())]);
	}

	#[test]
	fn unknown_exporter_value_errors() {
		let err = Config::from_lookup(&lookup(&[("OTEL_METRICS_EXPORTER", "statsd")])).unwrap_err();
		assert!(matches!(err, Error::UnsupportedValue("OTEL_METRICS_EXPORTER", _)));
	}
}
