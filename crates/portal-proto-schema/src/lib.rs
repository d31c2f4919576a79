//! Generated gRPC bindings and conversions to the core domain types.

mod convert;

pub mod shortener {
    pub mod v1 {
        tonic::include_proto!("portal.shortener.v1");
    }
}

pub mod redirector {
    pub mod v1 {
        tonic::include_proto!("portal.redirector.v1");
    }
}
