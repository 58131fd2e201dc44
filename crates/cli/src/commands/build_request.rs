use crate::commands::{read_input, CliError};
use callback::{CallbackRequestBuilder, KeySource, SystemKeySource};
use chrono::{DateTime, Utc};
use clap::Args;
use common::config::loader::load_callback_config;
use common::config::CallbackConfig;
use shared_clients::{HttpClient, ReqwestHttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info_span;
use transform::SpecReshaper;
use uuid::Uuid;

#[derive(Debug, Args)]
pub struct BuildRequestArgs {
    /// Reshaping operations applied to the input document (JSON)
    #[arg(long, value_name = "FILE")]
    pub spec: PathBuf,

    /// Input document (JSON)
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Callback configuration (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Use this instant (RFC 3339) for timestamp keys
    #[arg(long, value_name = "RFC3339")]
    pub fixed_time: Option<String>,

    /// Use this UUID for uuid keys
    #[arg(long, value_name = "UUID")]
    pub fixed_uuid: Option<String>,

    /// Dispatch the request after building it
    #[arg(long)]
    pub send: bool,

    /// HTTP timeout in seconds for auth and dispatch calls
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Pins whichever of time and UUID was given on the command line.
struct PinnedKeySource {
    time: Option<DateTime<Utc>>,
    uuid: Option<Uuid>,
}

impl KeySource for PinnedKeySource {
    fn now(&self) -> DateTime<Utc> {
        self.time.unwrap_or_else(|| SystemKeySource.now())
    }

    fn uuid(&self) -> Uuid {
        self.uuid.unwrap_or_else(|| SystemKeySource.uuid())
    }
}

impl BuildRequestArgs {
    fn key_source(&self) -> Result<PinnedKeySource, CliError> {
        let time = self
            .fixed_time
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| CliError::Argument(format!("--fixed-time '{raw}': {e}")))
            })
            .transpose()?;
        let uuid = self
            .fixed_uuid
            .as_deref()
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|e| CliError::Argument(format!("--fixed-uuid '{raw}': {e}")))
            })
            .transpose()?;
        Ok(PinnedKeySource { time, uuid })
    }

    /// A pinned time applies to both generated keys and `$now` in the body.
    fn request_builder(
        &self,
        http: Arc<dyn HttpClient>,
        config: &CallbackConfig,
    ) -> Result<CallbackRequestBuilder, CliError> {
        let source = self.key_source()?;
        let mut builder = CallbackRequestBuilder::new(http);
        if let Some(time) = source.time {
            builder = builder.with_reshaper(Arc::new(SpecReshaper::at(time)));
        }
        Ok(builder
            .with_key_source(Arc::new(source))
            .with_span(info_span!("callback", url = %config.url())))
    }
}

pub fn handle_build_request(args: &BuildRequestArgs) -> Result<(), CliError> {
    let spec = read_input(&args.spec)?;
    let input = read_input(&args.input)?;
    let config = load_callback_config(&args.config).map_err(CliError::build)?;

    let http = ReqwestHttpClient::with_timeout(Duration::from_secs(args.timeout_secs))
        .map_err(CliError::build)?;
    let builder = args.request_builder(Arc::new(http), &config)?;

    let rt = Runtime::new().map_err(CliError::build)?;
    rt.block_on(async {
        let request = builder
            .build_with_config(&spec, &input, &config)
            .await
            .map_err(CliError::build)?;
        let rendered = serde_json::to_string_pretty(&request).map_err(CliError::build)?;
        println!("{rendered}");

        if args.send {
            let resp = builder.send(&request).await.map_err(CliError::build)?;
            if !resp.is_success() {
                tracing::warn!(status = resp.status, "partner returned a non-success status");
            }
            println!("HTTP {}", resp.status);
            println!("{}", resp.body);
        }
        Ok::<(), CliError>(())
    })
}
