// src/google.rs ---------------------------------------------------------------
use hyper::{client::HttpConnector, Client as HyperClient};
use hyper_rustls::HttpsConnector;

use google_calendar3 as cal3;
use google_gmail1 as gmail1;

use crate::credentials::Credential;

// -----------------------------------------------------------------------------
// type aliases
pub type Https       = HttpsConnector<HttpConnector>;
pub type HttpClient  = HyperClient<Https>;
pub type GMailHub    = gmail1::Gmail<Https>;
pub type CalendarHub = cal3::CalendarHub<Https>;

/// One TLS client shared by the hubs and the token endpoint.
pub fn https_client() -> HttpClient {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .https_or_http()
        .enable_http1()
        .build();
    HyperClient::builder().build(https)
}

// The hubs take the already-obtained bearer token; its lifecycle belongs to
// the credential store, not to yup-oauth2.
pub fn gmail_hub(client: &HttpClient, credential: &Credential) -> GMailHub {
    gmail1::Gmail::new(client.clone(), credential.token.clone())
}

pub fn calendar_hub(client: &HttpClient, credential: &Credential) -> CalendarHub {
    cal3::CalendarHub::new(client.clone(), credential.token.clone())
}
