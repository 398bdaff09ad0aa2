use anyhow::Result;
use nsr_crawler::{
    config::Config,
    crawler::crawl,
    fetcher::HttpFetcher,
    sink::{MemorySink, RecordSink},
};
use std::sync::Arc;

const ENV_LOG_JSON: &str = "CRAWL_LOG_JSON";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries records, logs go to stderr
    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    // Load configuration
    let config = Config::from_env()?;

    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone()));
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&config, fetcher, sink.clone()).await?;

    for record in sink.get_all().await? {
        println!("{}", serde_json::to_string(&record)?);
    }
    eprintln!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
