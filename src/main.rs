mod browser;
mod config;
mod model;
mod normalizer;
mod orchestrator;
mod parser;
mod request;
mod scraper;

use browser::{BrowserDriver, HttpDriver};
use clap::Parser;
use config::{load_settings, Cli, DriverKind};
use model::ConfigError;
use orchestrator::ScrapeOrchestrator;
use parser::OddsExtractor;
use request::parse_request;
use scraper::{PageFetcher, ResourcePool};
use serde_json::json;
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::{fs, io};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the JSON response; logs go to stderr.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let cli = Cli::parse();
    if cli.health {
        println!("{}", json!({ "ok": true }));
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (registry, extractor_settings) = load_settings(cli.settings.as_deref())?;
    let sites: Vec<&str> = registry.names().collect();
    info!(origins = ?cli.allowed_origins, "Loaded {} site profiles: {}", sites.len(), sites.join(", "));

    let raw = read_request(&cli)?;
    let request = match parse_request(&raw, &registry, cli.deadline()) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected request: {}", e);
            println!("{}", json!({ "error": e.to_string() }));
            return Ok(ExitCode::from(2));
        }
    };

    let driver = build_driver(&cli).await?;
    let pool = Arc::new(ResourcePool::new(driver, cli.max_sessions));
    info!(max_sessions = pool.capacity(), driver = ?cli.driver, "Session pool ready");

    let fetcher = Arc::new(PageFetcher::new(pool.clone(), cli.settle()));
    let orchestrator = ScrapeOrchestrator::new(fetcher, Arc::new(registry), OddsExtractor::new(extractor_settings));

    let response = orchestrator.scrape(&request).await;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(ExitCode::SUCCESS)
}

fn read_request(cli: &Cli) -> io::Result<String> {
    match &cli.request {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

async fn build_driver(cli: &Cli) -> Result<Arc<dyn BrowserDriver>, ConfigError> {
    match cli.driver {
        DriverKind::Http => Ok(Arc::new(HttpDriver::new(&cli.user_agent))),
        #[cfg(feature = "chromium")]
        DriverKind::Chromium => {
            let driver = browser::chromium::ChromiumDriver::launch(&cli.user_agent)
                .await
                .map_err(|e| ConfigError::Driver(e.to_string()))?;
            Ok(Arc::new(driver))
        }
        #[cfg(not(feature = "chromium"))]
        DriverKind::Chromium => Err(ConfigError::UnknownDriver(
            "chromium (built without the 'chromium' feature)".into(),
        )),
    }
}
