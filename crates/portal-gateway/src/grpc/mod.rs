//! tonic implementations of the Portal gRPC services.

mod redirector;
mod shortener;

pub use redirector::RedirectorGrpcServer;
pub use shortener::ShortenerGrpcServer;
