//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Hold one verifying and one non-verifying reqwest client
//! - Turn `OutboundOptions` into a ready-to-send request
//!
//! # Design Decisions
//! - No idle connections are kept, so a socket never outlives its request
//! - Redirects are not followed and environment proxies are ignored: one hop
//! - Deadlines are enforced by the caller, which drops the request future

use reqwest::{redirect, Client, RequestBuilder};

use crate::error::ProxyResult;
use crate::upstream::options::OutboundOptions;
use crate::upstream::tls::ensure_crypto_provider;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    verifying: Client,
    insecure: Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        ensure_crypto_provider();
        Ok(Self {
            verifying: build(false)?,
            insecure: build(true)?,
        })
    }

    /// Client honouring the options' TLS flag.
    pub fn for_options(&self, options: &OutboundOptions) -> &Client {
        if options.verify_tls {
            &self.verifying
        } else {
            &self.insecure
        }
    }

    /// Build the outbound request described by `options`.
    pub fn request(&self, options: &OutboundOptions) -> ProxyResult<RequestBuilder> {
        let url = options.url()?;
        let mut builder = self
            .for_options(options)
            .request(options.method.clone(), url)
            .headers(options.headers.clone());
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

fn build(accept_invalid_certs: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(redirect::Policy::none())
        .no_proxy()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}
