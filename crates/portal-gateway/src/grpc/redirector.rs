use std::sync::Arc;

use crate::error::AppError;
use portal_proto_schema::redirector::v1::redirector_service_server::RedirectorService;
use portal_proto_schema::redirector::v1::{ResolveRequest, ResolveResponse};
use portal_redirector::Redirector;
use tonic::{Request, Response, Status};

pub struct RedirectorGrpcServer {
    redirector: Arc<dyn Redirector>,
}

impl RedirectorGrpcServer {
    pub fn new(redirector: Arc<dyn Redirector>) -> Self {
        Self { redirector }
    }
}

#[tonic::async_trait]
impl RedirectorService for RedirectorGrpcServer {
    async fn resolve(
        &self,
        request: Request<ResolveRequest>,
    ) -> Result<Response<ResolveResponse>, Status> {
        let short_code = request.into_inner().short_code;
        let original_url = self
            .redirector
            .resolve(&short_code)
            .await
            .map_err(AppError::from)?;

        Ok(Response::new(ResolveResponse { original_url }))
    }
}
