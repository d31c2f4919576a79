use std::sync::Arc;

use crate::error::AppError;
use crate::identity::{resolve_user, METADATA_KEY};
use portal_core::{Shortener, User};
use portal_proto_schema::shortener::v1 as proto;
use portal_proto_schema::shortener::v1::shortener_service_server::ShortenerService;
use tonic::metadata::MetadataValue;
use tonic::{Request, Response, Status};

pub struct ShortenerGrpcServer {
    shortener: Arc<dyn Shortener>,
}

impl ShortenerGrpcServer {
    pub fn new(shortener: Arc<dyn Shortener>) -> Self {
        Self { shortener }
    }
}

fn caller<T>(request: &Request<T>) -> User {
    resolve_user(
        request
            .metadata()
            .get(METADATA_KEY)
            .and_then(|value| value.to_str().ok()),
    )
}

/// Wraps `message` and echoes the caller's id back in the metadata.
fn respond<T>(user: &User, message: T) -> Result<Response<T>, Status> {
    let id = MetadataValue::try_from(user.id.as_str())
        .map_err(|e| Status::internal(format!("user id is not valid metadata: {e}")))?;

    let mut response = Response::new(message);
    response.metadata_mut().insert(METADATA_KEY, id);
    Ok(response)
}

#[tonic::async_trait]
impl ShortenerService for ShortenerGrpcServer {
    async fn shorten(
        &self,
        request: Request<proto::ShortenRequest>,
    ) -> Result<Response<proto::ShortenResponse>, Status> {
        let user = caller(&request);
        let original_url = request.into_inner().original_url;

        let short_url = self
            .shortener
            .shorten(&user, &original_url)
            .await
            .map_err(AppError::from)?;

        respond(&user, proto::ShortenResponse { short_url })
    }

    async fn shorten_batch(
        &self,
        request: Request<proto::ShortenBatchRequest>,
    ) -> Result<Response<proto::ShortenBatchResponse>, Status> {
        let user = caller(&request);
        let items = request
            .into_inner()
            .items
            .into_iter()
            .map(Into::into)
            .collect();

        let results = self
            .shortener
            .shorten_batch(&user, items)
            .await
            .map_err(AppError::from)?;

        respond(
            &user,
            proto::ShortenBatchResponse {
                results: results.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn list_user_urls(
        &self,
        request: Request<proto::ListUserUrlsRequest>,
    ) -> Result<Response<proto::ListUserUrlsResponse>, Status> {
        let user = caller(&request);

        let urls = self
            .shortener
            .list_user_urls(&user)
            .await
            .map_err(AppError::from)?;

        respond(
            &user,
            proto::ListUserUrlsResponse {
                urls: urls.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn delete_user_urls(
        &self,
        request: Request<proto::DeleteUserUrlsRequest>,
    ) -> Result<Response<proto::DeleteUserUrlsResponse>, Status> {
        let user = caller(&request);
        let codes = request.into_inner().short_codes;

        self.shortener
            .delete_batch(&user, codes)
            .await
            .map_err(AppError::from)?;

        respond(&user, proto::DeleteUserUrlsResponse {})
    }
}
