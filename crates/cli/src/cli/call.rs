use clap::Args;
use console::style;
use nexus_client::{
    CancellationToken, HttpTransport, NoAuth, PageOutcome, QueryClient, RetryPolicy, StaticToken,
    TokenSource, TransportConfig,
};
use nexus_codegen::CONFIG_FILENAME;
use nexus_common::{Endpoint, EndpointRole};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cli::run_cli_async;
use crate::common::{load_config, load_manifest};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    #[arg(value_name = "DOMAIN", help = "Configured domain the operation belongs to")]
    pub domain: String,
    #[arg(value_name = "OPERATION", help = "Operation name, e.g. listWorkspaces")]
    pub operation: String,
    #[arg(long = "base-url", value_name = "URL", help = "API base URL")]
    pub base_url: String,
    #[arg(
        long = "param",
        short = 'p',
        value_name = "NAME=VALUE",
        value_parser = parse_param,
        help = "Path or query parameter (repeatable; repeating a name sends a list)"
    )]
    pub params: Vec<(String, String)>,
    #[arg(long, value_name = "JSON", help = "JSON request body for mutations")]
    pub body: Option<String>,
    #[arg(long, value_name = "TOKEN", help = "Bearer token sent with the request")]
    pub token: Option<String>,
    #[arg(long = "all-pages", help = "Follow the cursor of an infinite query to the last page")]
    pub all_pages: bool,
    #[arg(
        long,
        value_name = "N",
        default_value_t = 0,
        help = "Retry transient failures of reads up to N times"
    )]
    pub retries: u32,
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Per-request timeout"
    )]
    pub timeout: u64,
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        default_value = CONFIG_FILENAME,
        help = "Path to the generator configuration"
    )]
    pub config: PathBuf,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}

/// Fold `--param` pairs into an invocation object; a repeated name becomes a list.
fn params_object(pairs: &[(String, String)]) -> Value {
    let mut params = Map::new();
    for (name, value) in pairs {
        let value = Value::String(value.clone());
        match params.get_mut(name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => *existing = Value::Array(vec![existing.take(), value]),
            None => {
                params.insert(name.clone(), value);
            }
        }
    }
    Value::Object(params)
}

pub async fn run(args: CallArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: CallArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let manifest = load_manifest(&config, &args.domain)?;
    let endpoint = manifest.get(&args.operation).ok_or_else(|| {
        format!(
            "domain `{}` has no operation `{}`; see `nexus endpoints {}`",
            args.domain, args.operation, args.domain
        )
    })?;

    let body = match &args.body {
        Some(_) if endpoint.role != EndpointRole::Mutation => {
            return Err(format!(
                "--body is only accepted by mutations, not by {} ({})",
                endpoint.key, endpoint.role
            ));
        }
        Some(raw) => {
            Some(serde_json::from_str(raw).map_err(|err| format!("Invalid --body JSON: {err}"))?)
        }
        None => None,
    };

    let client = build_client(&args)?;
    let params = params_object(&args.params);
    let cancel = CancellationToken::new();
    debug!(endpoint = %endpoint.key, params = %params, "Calling endpoint.");

    match endpoint.role {
        EndpointRole::Query => {
            let value = client
                .query(endpoint, &params, &cancel)
                .await
                .map_err(|err| err.to_string())?;
            print_json(&value)
        }
        EndpointRole::InfiniteQuery => {
            fetch_pages(&client, endpoint, &params, args.all_pages, &cancel).await
        }
        EndpointRole::Mutation => {
            let value = client
                .mutate(endpoint, &params, body, &cancel)
                .await
                .map_err(|err| err.to_string())?;
            print_json(&value)
        }
    }
}

fn build_client(args: &CallArgs) -> Result<QueryClient, String> {
    let tokens: Arc<dyn TokenSource> = match &args.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(NoAuth),
    };
    let config = TransportConfig::new(&args.base_url)
        .map_err(|err| err.to_string())?
        .with_timeout(Duration::from_secs(args.timeout));
    let transport = HttpTransport::new(config, tokens).map_err(|err| err.to_string())?;

    let retry = if args.retries == 0 {
        RetryPolicy::none()
    } else {
        RetryPolicy::exponential(args.retries, RETRY_BASE_DELAY)
    };
    Ok(QueryClient::with_retry(Arc::new(transport), retry))
}

async fn fetch_pages(
    client: &QueryClient,
    endpoint: &Endpoint,
    params: &Value,
    all_pages: bool,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let pages = client
        .infinite_query(endpoint, params)
        .map_err(|err| err.to_string())?;

    loop {
        match pages
            .fetch_next_page(cancel)
            .await
            .map_err(|err| err.to_string())?
        {
            PageOutcome::Page { index, data } => {
                eprintln!("{}", style(format!("page {}", index + 1)).dim());
                print_json(&data)?;
                if !all_pages {
                    if pages.has_next_page() {
                        eprintln!(
                            "{}",
                            style("more pages available; pass --all-pages to follow them").dim()
                        );
                    }
                    return Ok(());
                }
            }
            PageOutcome::Exhausted => return Ok(()),
        }
    }
}

fn print_json(value: &Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("taskId=t-1").unwrap(),
            ("taskId".to_string(), "t-1".to_string())
        );
        assert_eq!(
            parse_param("nextPageToken=").unwrap(),
            ("nextPageToken".to_string(), String::new())
        );
        assert!(parse_param("=value").is_err());
        assert!(parse_param("taskId").is_err());
    }

    #[test]
    fn test_repeated_params_become_lists() {
        let pairs = [
            ("status".to_string(), "open".to_string()),
            ("accountId".to_string(), "a1".to_string()),
            ("status".to_string(), "blocked".to_string()),
            ("status".to_string(), "done".to_string()),
        ];
        assert_eq!(
            params_object(&pairs),
            json!({"accountId": "a1", "status": ["open", "blocked", "done"]})
        );
        assert_eq!(params_object(&[]), json!({}));
    }
}
