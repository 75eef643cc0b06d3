//! Who is calling, as far as admission is concerned.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use ink_core::models::ClientKey;

const UNKNOWN_PEER: &str = "unknown";

/// Keys a request by the peer IP. Requests without a peer address (unix
/// sockets, some test setups) share one key.
pub fn client_key(req: &HttpRequest) -> ClientKey {
    let ip = req
        .peer_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_PEER.to_string());
    ClientKey(ip)
}

/// Extractor form of [`client_key`].
#[derive(Debug, Clone)]
pub struct ClientKeyExtractor(pub ClientKey);

impl FromRequest for ClientKeyExtractor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self(client_key(req))))
    }
}
