#![allow(dead_code, missing_docs, clippy::expect_used)]

use tracing::info;
use url::Url;

pub mod models;

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

pub fn url(path: &str) -> Url {
    Url::parse("https://management.example.com/subscriptions/sub-1/")
        .and_then(|base| base.join(path))
        .expect("valid url")
}
