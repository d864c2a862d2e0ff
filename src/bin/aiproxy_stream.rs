//! aiproxy-stream: open a streaming chat completion and print the deltas as they arrive.
//!
//! Usage:
//!   aiproxy-stream <url> [--body <json>] [--header <name: value>]... [--chunked] [--raw]
//!
//! `--chunked` routes the request through the alternate (raw chunk) transport instead of
//! the default line transport. `--raw` prints each decoded chunk as JSON instead of the
//! concatenated text.

use ai_proxy_transport::types::ChatCompletionChunk;
use ai_proxy_transport::{ClientConfig, ProxyClient};
use anyhow::{bail, Context};
use futures::StreamExt;
use std::io::Write;
use tracing_subscriber::EnvFilter;

struct Args {
    url: String,
    body: Option<String>,
    headers: Vec<(String, String)>,
    chunked: bool,
    raw: bool,
}

fn print_usage() {
    println!(
        r#"aiproxy-stream: stream a chat completion through ai-proxy-transport

USAGE:
    aiproxy-stream <url> [OPTIONS]

OPTIONS:
    --body <json>               Request body (POST). Without it a GET is sent
    --header <name: value>      Extra request header, repeatable
    --chunked                   Use the raw-chunk alternate transport
    --raw                       Print every decoded chunk as JSON
    --help                      Show this help message

ENVIRONMENT:
    AI_HTTP_TIMEOUT_SECS            Request timeout (default 30)
    AI_PROXY_PRINT_REQUEST_BODIES   Log outgoing bodies (1/true)
    AI_PROXY_PRINT_RESPONSE_BODIES  Log incoming chunks (1/true)
    RUST_LOG                        Log filter (e.g. ai_proxy_transport=debug)"#
    );
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Args>> {
    let mut url = None;
    let mut body = None;
    let mut headers = Vec::new();
    let mut chunked = false;
    let mut raw = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(None),
            "--body" => body = Some(iter.next().context("--body needs a value")?.clone()),
            "--header" => {
                let h = iter.next().context("--header needs a value")?;
                let (k, v) = h
                    .split_once(':')
                    .with_context(|| format!("header {:?} is not `name: value`", h))?;
                headers.push((k.trim().to_string(), v.trim().to_string()));
            }
            "--chunked" => chunked = true,
            "--raw" => raw = true,
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            other => {
                if url.replace(other.to_string()).is_some() {
                    bail!("more than one URL given");
                }
            }
        }
    }

    let url = url.context("missing <url>")?;
    Ok(Some(Args {
        url,
        body,
        headers,
        chunked,
        raw,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    let mut builder = ProxyClient::builder().config(ClientConfig::from_env());
    if args.chunked {
        builder = builder.http_client(reqwest::Client::new());
    }
    let client = builder.build()?;

    let method = if args.body.is_some() {
        reqwest::Method::POST
    } else {
        reqwest::Method::GET
    };
    let mut request = client.request(method, &args.url)?.headers(args.headers);
    if let Some(body) = args.body {
        request = request.header("content-type", "application/json").body(body);
    }

    let mut stream = client
        .open_stream::<ChatCompletionChunk>(request)
        .await
        .context("failed to open stream")?;

    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("stream failed")?;
        if args.raw {
            writeln!(stdout, "{}", serde_json::to_string(&chunk)?)?;
        } else {
            write!(stdout, "{}", chunk.text())?;
        }
        stdout.flush()?;
    }
    if !args.raw {
        writeln!(stdout)?;
    }

    let stats = stream.stats();
    tracing::info!(
        request_id = stream.request_id(),
        reads = stats.reads(),
        yielded = stats.yielded(),
        skipped = stats.skipped(),
        malformed = stats.malformed(),
        "stream complete"
    );
    Ok(())
}
