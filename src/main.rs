mod config;
mod entry;
mod handler;
mod location_table;
mod pipeline;
mod sitewise;
mod store;
mod telemetry;

use crate::config::Config;
use crate::handler::HandlerContext;
use crate::location_table::LocationTable;
use crate::sitewise::SiteWiseStore;
use anyhow::Result;
use lambda_runtime::{run, service_fn, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

fn init_tracing(config: &Config) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,stock_forwarder=info".into());
    // CloudWatch stamps each line on ingestion.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .without_time();

    if let Some(endpoint) = &config.otlp_endpoint {
        let endpoint = normalize_otlp_http_endpoint(endpoint);
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(endpoint);
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(OTelTraceConfig::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "stock-forwarder"),
            ])))
            .install_batch(Tokio)?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn normalize_otlp_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains("/v1/traces") {
        return trimmed.to_string();
    }
    format!("{}/v1/traces", trimmed.trim_end_matches('/'))
}

async fn function_handler(
    ctx: &HandlerContext,
    event: LambdaEvent<Value>,
) -> Result<(), lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    let span = tracing::info_span!("invocation", request_id = %context.request_id);
    async {
        let outcome = ctx.handle_event(&payload).await;
        outcome.log_summary();
    }
    .instrument(span)
    .await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let table = Arc::new(LocationTable::load(config.location_table_path.as_deref())?);
    let store = Arc::new(SiteWiseStore::from_config(&config).await);
    let ctx = HandlerContext::new(&config, table, store);

    let ctx = &ctx;
    let result = run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(ctx, event).await
    }))
    .await;

    opentelemetry::global::shutdown_tracer_provider();
    result.map_err(|err| anyhow::anyhow!(err.to_string()))
}
