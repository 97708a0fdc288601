#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use argh::FromArgs;
use client_cert_strategy::command::{self, fingerprint, server};
use client_cert_strategy::configuration::watcher::ConfigWatcher;
use client_cert_strategy::configuration::{self, Configuration, ObservabilityConfig};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::attribute::SERVICE_VERSION;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

fn set_tracing(config: Option<ObservabilityConfig>) -> Result<(), configuration::Error> {
    if let Some(ObservabilityConfig {
        tracing: Some(tracing_config),
    }) = config
    {
        let resource = Resource::builder()
            .with_service_name(env!("CARGO_PKG_NAME"))
            .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
            .build();
        let otlp_exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&tracing_config.endpoint)
            .with_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(otlp_exporter)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource)
            .with_sampler(Sampler::TraceIdRatioBased(tracing_config.sampling_rate))
            .build();

        let tracer = tracer_provider.tracer("client-cert-strategy");
        let _ = global::set_tracer_provider(tracer_provider);
        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().json())
            .with(telemetry)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    }
    Ok(())
}

#[derive(FromArgs, PartialEq, Debug)]
/// An HTTPS service authenticating its clients with TLS certificates
struct GlobalArguments {
    #[argh(option, short = 'c', default = "String::from(\"config.toml\")")]
    /// the path to the configuration file, defaults to `config.toml`
    config: String,

    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Fingerprint(fingerprint::Options),
    Serve(server::Options),
}

fn main() -> Result<(), command::Error> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli_args: GlobalArguments = argh::from_env();

    if let SubCommand::Fingerprint(options) = &cli_args.subcommand {
        return fingerprint::Command::run(options);
    }

    let config = Configuration::load(&cli_args.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.global.max_concurrent_requests)
        .enable_all()
        .build()?
        .block_on(run_server(cli_args.config, config))
}

async fn run_server(config_path: String, config: Configuration) -> Result<(), command::Error> {
    set_tracing(config.observability.clone())?;

    let server = Arc::new(server::Command::new(&config)?);
    let _watcher = ConfigWatcher::new(&config_path, server.clone())?;

    server.run().await?;
    Ok(())
}
