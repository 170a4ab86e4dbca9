//!
//! src/main.rs  Andrew Belles  Oct 16th, 2026
//!
//! Entry point: parses the command line, wires config into each component
//! and runs one download session for the given soundcloud url
//!
//!

mod config;
mod errors;
mod logging;
mod types;

mod fetch;
mod store;
mod scrape;
mod credential;
mod resolve;
mod rendition;
mod download;
mod session;

#[cfg(test)]
mod test_support;

use std::{path::PathBuf, process::ExitCode};

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use crate::config::AppConfig;
use crate::credential::{CredentialManager, CredentialProvider, ProbeValidator};
use crate::download::HttpDownloader;
use crate::errors::ScdlError;
use crate::fetch::ApiClient;
use crate::scrape::SiteScraper;
use crate::session::{Report, Session};
use crate::store::FileTokenStore;

const USAGE: &str = "usage: sc-dl <soundcloud-url> [output_dir | -o <output_dir>]";

#[derive(Debug, PartialEq)]
struct Invocation {
    url: String,
    output_dir: Option<PathBuf>
}

/// Positional url, then an optional dir given positionally or with -o
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation, String> {
    let mut url = None;
    let mut output_dir = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(USAGE.to_string()),
            "-o" | "--output" => {
                let dir = args.next().ok_or_else(|| format!("{arg} needs a directory"))?;
                output_dir = Some(PathBuf::from(dir));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            other if url.is_none() => url = Some(other.to_string()),
            other if output_dir.is_none() => output_dir = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument {other}")),
        }
    }

    let url = url.ok_or_else(|| USAGE.to_string())?;
    Ok( Invocation { url, output_dir } )
}

async fn run(cfgs: &AppConfig, raw_url: &str, output_dir: PathBuf) -> Result<Report, ScdlError> {
    let short_http = fetch::shortlink_client(&cfgs.http, &cfgs.site)?;
    let expanded = fetch::expand_shortlink(&short_http, &cfgs.site, raw_url).await;
    let url = fetch::validate_soundcloud_url(&expanded)?;
    tokio::fs::create_dir_all(&output_dir).await?;

    let site_http = fetch::site_client(&cfgs.http, &cfgs.site)?;
    let api       = ApiClient::new(&cfgs.http, &cfgs.site)?;

    let scraper   = SiteScraper::new(site_http, &cfgs.site, &cfgs.scrape)?;
    let validator = ProbeValidator::new(ApiClient::new(&cfgs.http, &cfgs.site)?);
    let store     = FileTokenStore::new(&cfgs.cache.token_path);
    let manager   = CredentialManager::new(scraper, validator, store, cfgs.scrape.retry_delay);

    let credential = manager.obtain().await?;
    let fetcher = HttpDownloader::new(fetch::media_client(&cfgs.http, &cfgs.site)?, &cfgs.output);

    let mut session = Session::new(manager, api, fetcher, output_dir, credential);
    session.run(url.as_str()).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cfgs = match config::load_config() {
        Ok(cfgs) => cfgs,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.kind());
            return ExitCode::from(1);
        }
    };

    let _guard = match logging::init_logging(&cfgs.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.kind());
            return ExitCode::from(1);
        }
    };

    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    let output_dir = invocation.output_dir.unwrap_or_else(|| cfgs.output.dir.clone());

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", %run_id);
    info!(
        parent: &span,
        service = "sc-dl",
        version = %env!("CARGO_PKG_VERSION"),
        url = %invocation.url,
        "starting"
    );

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        result = run(&cfgs, &invocation.url, output_dir).instrument(span) => Some(result),
    };

    match outcome {
        None => {
            eprintln!("cancelled by user");
            ExitCode::from(130)
        }
        Some(Ok(report)) => {
            println!("done. downloaded {report} tracks.");
            if report.skipped > 0 {
                println!("{} track(s) had no mp3 available.", report.skipped);
            }
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            error!(kind = e.kind(), error = %e, "run.failed");
            eprintln!("error [{}]: {e}", e.kind());
            ExitCode::from(1)
        }
    }
}
