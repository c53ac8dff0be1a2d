//! Transport to the dish.
//!
//! The poller only knows the [`DishClient`] capability. [`GrpcDishClient`] is the production
//! implementation talking to the dish's local gRPC API; tests plug in scripted clients.

mod grpc;
pub mod proto;

use async_trait::async_trait;

pub use grpc::GrpcDishClient;

use crate::{error::TransportError, sample::DishSample};

/// One remote call returning the dish's current link quality.
#[async_trait]
pub trait DishClient: Send {
    /// Fetches one sample. Errors of any kind are reported, never panicked on.
    async fn poll(&mut self) -> Result<DishSample, TransportError>;

    /// Human readable target, used in logs.
    fn target(&self) -> String;
}
