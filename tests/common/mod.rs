//! Helpers shared by the integration tests: a scripted dish and HTTP scraping helpers.
#![allow(dead_code)]

use std::{collections::VecDeque, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use pingmon::{dish::DishClient, error::TransportError, sample::DishSample};
use tracing_subscriber::EnvFilter;

pub fn start_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the mock dish does once its script runs out.
#[derive(Clone, Copy)]
pub enum AfterScript {
    /// Never answer again.
    Hang,
    /// Fail every poll.
    Fail,
}

/// Dish replaying scripted outcomes; `None` entries fail the poll.
pub struct MockDish {
    script: VecDeque<Option<DishSample>>,
    after_script: AfterScript,
}

impl MockDish {
    pub fn new(script: Vec<Option<DishSample>>, after_script: AfterScript) -> Self {
        Self {
            script: script.into(),
            after_script,
        }
    }

    pub fn unreachable() -> Self {
        Self::new(vec![], AfterScript::Fail)
    }
}

#[async_trait]
impl DishClient for MockDish {
    async fn poll(&mut self) -> Result<DishSample, TransportError> {
        match self.script.pop_front() {
            Some(Some(sample)) => Ok(sample),
            Some(None) => Err(TransportError::Connect("mock dish refused".to_string())),
            None => match self.after_script {
                AfterScript::Hang => std::future::pending().await,
                AfterScript::Fail => Err(TransportError::Timeout),
            },
        }
    }

    fn target(&self) -> String {
        "mock-dish".to_string()
    }
}

pub fn valid(drop_rate: f64, sample_count: u64) -> Option<DishSample> {
    Some(DishSample::new(drop_rate, Some(sample_count)))
}

/// Issues `GET path` and returns the status code and body.
pub async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    let response = reqwest::get(format!("http://{addr}{path}"))
        .await
        .unwrap_or_else(|e| panic!("GET {path} failed: {e}"));
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| panic!("GET {path} returned an unreadable body: {e}"));
    (status, body)
}

/// Issues `GET /health` and decodes its JSON body.
pub async fn get_health(addr: SocketAddr) -> (u16, serde_json::Value) {
    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

/// Value of an unlabelled sample in a Prometheus text listing.
pub fn metric_value(listing: &str, name: &str) -> Option<f64> {
    listing.lines().find_map(|line| {
        line.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(|value| value.parse().ok())
    })
}

/// Scrapes `/metrics` until `done` holds, failing the test after a few seconds.
pub async fn scrape_until(addr: SocketAddr, done: impl Fn(&str) -> bool) -> String {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (status, body) = http_get(addr, "/metrics").await;
        assert_eq!(status, 200);
        if done(&body) {
            return body;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "metrics never reached the expected state:\n{body}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
