//! Checkout server entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use api::config::{BusTarget, Config, ConfigError, LogFormat};
use event_bus::{Broker, EventPublisher, InMemoryBroker, ProducerRuntime};
use flags::{FaultInjector, FlagdFileProvider};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How long queued order events may take to flush at shutdown.
const PRODUCER_GRACE: Duration = Duration::from_secs(5);

/// `service.name` and instrumentation scope of exported spans.
const SERVICE_NAME: &str = "checkout";

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(String),

    #[error("message bus unavailable: {0}")]
    Bus(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Installs the global tracer provider, exporting over OTLP when an endpoint
/// is configured. An exporter that cannot be built is reported, not fatal.
fn init_tracer_provider(endpoint: Option<&str>) -> (SdkTracerProvider, Option<String>) {
    let resource = Resource::builder().with_service_name(SERVICE_NAME).build();
    let builder = SdkTracerProvider::builder().with_resource(resource);
    let exporter = endpoint.map(|endpoint| {
        SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
    });
    let (builder, exporter_error) = match exporter {
        Some(Ok(exporter)) => (builder.with_batch_exporter(exporter), None),
        Some(Err(e)) => (builder, Some(e.to_string())),
        None => (builder, None),
    };

    let provider = builder.build();
    global::set_tracer_provider(provider.clone());
    (provider, exporter_error)
}

fn init_tracing(log_level: &str, format: LogFormat, provider: &SdkTracerProvider) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let spans = tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME));
    let registry = tracing_subscriber::registry().with(filter).with(spans);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn connect_bus(target: &BusTarget) -> Result<Option<Arc<dyn Broker>>, StartupError> {
    match target {
        BusTarget::Disabled => Ok(None),
        BusTarget::InMemory => Ok(Some(Arc::new(InMemoryBroker::new()))),
        #[cfg(feature = "kafka")]
        BusTarget::Kafka(addr) => {
            let broker =
                event_bus::KafkaBroker::new(addr).map_err(|e| StartupError::Bus(e.to_string()))?;
            Ok(Some(Arc::new(broker)))
        }
        #[cfg(not(feature = "kafka"))]
        BusTarget::Kafka(addr) => Err(StartupError::Bus(format!(
            "KAFKA_ADDR={addr} requires building with the `kafka` feature"
        ))),
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    // 1. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))?;

    // 2. Fault injection flags
    let faults = match &config.flagd_file {
        Some(path) => {
            let provider = FlagdFileProvider::new(path);
            tracing::info!(path = %provider.path().display(), "reading feature flags");
            FaultInjector::new(Arc::new(provider))
        }
        None => FaultInjector::disabled(),
    };

    // 3. Producer runtime, when a bus is configured
    let runtime = connect_bus(&config.bus)?
        .map(|broker| ProducerRuntime::start(broker, config.producer_queue_capacity));
    let publisher = runtime
        .as_ref()
        .map(|runtime| EventPublisher::new(runtime.handle(), faults.clone()));
    if publisher.is_none() {
        tracing::info!("KAFKA_ADDR not set, order events are disabled");
    }

    // 4. Build the application
    let (state, _services) = api::create_default_state(
        faults,
        publisher,
        config.checkout_config(),
        config.request_timeout,
    );
    let app = api::create_app(state, metrics_handle);

    // 5. Serve until signalled
    let addr = config.addr();
    tracing::info!(%addr, "starting checkout server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 6. Flush order events and stop the drain task
    if let Some(runtime) = runtime {
        runtime.shutdown(PRODUCER_GRACE).await;
    }

    served?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    let endpoint = config.as_ref().ok().and_then(|c| c.otlp_endpoint.as_deref());
    let (provider, exporter_error) = init_tracer_provider(endpoint);
    match &config {
        Ok(config) => init_tracing(&config.log_level, config.log_format, &provider),
        Err(_) => init_tracing("info", LogFormat::Text, &provider),
    }
    if let Some(e) = exporter_error {
        tracing::warn!(error = %e, "span export disabled");
    }

    let code = match config.map_err(StartupError::from) {
        Ok(config) => match run(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "checkout server failed");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            ExitCode::FAILURE
        }
    };

    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = %e, "failed to flush spans");
    }
    code
}
