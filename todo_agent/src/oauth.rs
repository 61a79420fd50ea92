// src/oauth.rs ----------------------------------------------------------------
use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hyper::{header::CONTENT_TYPE, Body, Request};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};
use url::Url;

// re-exported OAuth types
use google_gmail1::oauth2::read_application_secret;

use crate::{
    config::AuthConfig,
    credentials::{Credential, OAuthFlow},
    error::AuthError,
    google::HttpClient,
};

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Deserialize)]
struct TokenResponse {
    access_token:  String,
    #[serde(default)]
    expires_in:    Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope:         Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error:             String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Refresh and consent against Google's OAuth endpoints.
pub struct GoogleOAuth {
    client:             HttpClient,
    client_secret_path: PathBuf,
    interactive:        bool,
}

impl GoogleOAuth {
    pub fn new(client: HttpClient, config: &AuthConfig) -> Self {
        Self {
            client,
            client_secret_path: config.client_secret_path.clone(),
            interactive:        config.interactive_consent,
        }
    }

    async fn post_form(
        &self,
        token_uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let req = Request::post(token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))?;

        let resp   = self.client.request(req).await?;
        let status = resp.status();
        let bytes  = hyper::body::to_bytes(resp.into_body()).await?;

        if !status.is_success() {
            return Err(token_error(status, &bytes));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl OAuthFlow for GoogleOAuth {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NoRefreshToken)?;
        let resp = self
            .post_form(
                token_uri(credential),
                &[
                    ("client_id", credential.client_id.as_str()),
                    ("client_secret", credential.client_secret.as_str()),
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                ],
            )
            .await?;

        Ok(apply_token_response(credential.clone(), resp, Utc::now()))
    }

    async fn consent(&self, scopes: &[String]) -> Result<Credential, AuthError> {
        if !self.interactive {
            return Err(AuthError::ConsentUnavailable);
        }

        let secret = read_application_secret(&self.client_secret_path)
            .await
            .map_err(AuthError::ClientSecret)?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(AuthError::Redirect)?;
        let port = listener.local_addr().map_err(AuthError::Redirect)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let state    = random_token(32);
        let verifier = random_token(64);
        let url = authorization_url(
            &secret.auth_uri,
            &secret.client_id,
            &redirect_uri,
            scopes,
            &state,
            &code_challenge(&verifier),
        )?;

        tracing::info!(%url, "waiting for consent, open this URL to authorize access");
        if let Err(e) = open::that(url.as_str()) {
            tracing::warn!(error = %e, "could not launch a browser");
        }

        let code = wait_for_code(&listener, &state).await?;

        let resp = self
            .post_form(
                &secret.token_uri,
                &[
                    ("code", code.as_str()),
                    ("client_id", secret.client_id.as_str()),
                    ("client_secret", secret.client_secret.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code_verifier", verifier.as_str()),
                ],
            )
            .await?;

        tracing::info!("consent granted");
        let base = Credential {
            token_uri:     secret.token_uri,
            client_id:     secret.client_id,
            client_secret: secret.client_secret,
            scopes:        scopes.to_vec(),
            ..Default::default()
        };
        Ok(apply_token_response(base, resp, Utc::now()))
    }
}

// -----------------------------------------------------------------------------
// helpers
/// Records written without a token endpoint use Google's.
fn token_uri(credential: &Credential) -> &str {
    if credential.token_uri.is_empty() {
        GOOGLE_TOKEN_URI
    } else {
        &credential.token_uri
    }
}

/// Fields the endpoint leaves out keep their previous values.
fn apply_token_response(mut base: Credential, resp: TokenResponse, now: DateTime<Utc>) -> Credential {
    base.token  = resp.access_token;
    base.expiry = resp.expires_in.map(|secs| now + Duration::seconds(secs));
    if let Some(refresh) = resp.refresh_token {
        base.refresh_token = Some(refresh);
    }
    if let Some(scope) = resp.scope {
        base.scopes = scope.split_whitespace().map(str::to_owned).collect();
    }
    base
}

fn token_error(status: hyper::StatusCode, body: &[u8]) -> AuthError {
    let message = match serde_json::from_slice::<TokenErrorResponse>(body) {
        Ok(TokenErrorResponse { error, error_description: Some(desc) }) => format!("{error}: {desc}"),
        Ok(TokenErrorResponse { error, .. }) => error,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    };
    AuthError::TokenEndpoint { status, message }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// PKCE S256 challenge.
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn authorization_url(
    auth_uri: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    challenge: &str,
) -> Result<Url, AuthError> {
    let scope = scopes.join(" ");
    Ok(Url::parse_with_params(
        auth_uri,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )?)
}

/// Accept loopback connections until one carries the authorization result.
async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, _) = listener.accept().await.map_err(AuthError::Redirect)?;

        let mut request_line = String::new();
        {
            let mut reader = BufReader::new(&mut stream);
            reader
                .read_line(&mut request_line)
                .await
                .map_err(AuthError::Redirect)?;
        }

        let outcome = parse_redirect(&request_line, expected_state);
        let page = match &outcome {
            Some(Ok(_))  => "Authorization complete. You can close this window.",
            Some(Err(_)) => "Authorization failed. Check the service log.",
            None         => "Waiting for authorization.",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {page}",
            page.len()
        );
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            tracing::debug!(error = %e, "could not answer consent redirect");
        }

        if let Some(result) = outcome {
            return result;
        }
    }
}

/// `None` for requests that carry neither a code nor an error (favicon etc).
fn parse_redirect(request_line: &str, expected_state: &str) -> Option<Result<String, AuthError>> {
    let target = request_line.split_whitespace().nth(1)?;
    let url    = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Some(Err(AuthError::ConsentDenied(error.clone())));
    }
    let code = params.get("code")?;
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Some(Err(AuthError::StateMismatch));
    }
    Some(Ok(code.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        net::SocketAddr,
        sync::{Arc, Mutex},
    };

    use axum::{extract::State, http::StatusCode, routing::post, Form, Router};

    use crate::credentials::{CredentialFile, CredentialStore};

    fn response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    type Posted = Arc<Mutex<Vec<HashMap<String, String>>>>;

    #[derive(Clone)]
    struct FakeTokenServer {
        status: StatusCode,
        reply:  &'static str,
        posted: Posted,
    }

    async fn token(
        State(server): State<FakeTokenServer>,
        Form(fields): Form<HashMap<String, String>>,
    ) -> (StatusCode, &'static str) {
        server.posted.lock().unwrap().push(fields);
        (server.status, server.reply)
    }

    /// Serves `POST /token` on a loopback port; returns its URI and the forms it received.
    async fn token_endpoint(status: StatusCode, reply: &'static str) -> (String, Posted) {
        let posted = Posted::default();
        let app = Router::new().route("/token", post(token)).with_state(FakeTokenServer {
            status,
            reply,
            posted: posted.clone(),
        });

        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        (format!("http://{addr}/token"), posted)
    }

    // plain http only, so no system roots are needed
    fn loopback_client() -> HttpClient {
        let tls = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(rustls::RootCertStore::empty())
            .with_no_client_auth();
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();
        hyper::Client::builder().build(https)
    }

    fn headless(secret_path: PathBuf) -> GoogleOAuth {
        let config = AuthConfig {
            client_secret_path:  secret_path,
            interactive_consent: false,
            ..AuthConfig::default()
        };
        GoogleOAuth::new(loopback_client(), &config)
    }

    fn stored(token_uri: String) -> Credential {
        Credential {
            token:         "stale".into(),
            refresh_token: Some("r-1".into()),
            token_uri,
            client_id:     "cid".into(),
            client_secret: "csecret".into(),
            scopes:        vec!["mail".into(), "calendar".into()],
            expiry:        Some(Utc::now() - Duration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn refresh_posts_refresh_grant_and_merges_reply() {
        let (uri, posted) =
            token_endpoint(StatusCode::OK, r#"{"access_token":"fresh","expires_in":3600}"#).await;
        let before = Utc::now();

        let got = headless(PathBuf::from("credentials.json"))
            .refresh(&stored(uri.clone()))
            .await
            .unwrap();

        let forms = posted.lock().unwrap().clone();
        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form.len(), 4);
        assert_eq!(form["client_id"], "cid");
        assert_eq!(form["client_secret"], "csecret");
        assert_eq!(form["refresh_token"], "r-1");
        assert_eq!(form["grant_type"], "refresh_token");

        assert_eq!(got.token, "fresh");
        assert_eq!(got.refresh_token.as_deref(), Some("r-1"));
        assert_eq!(got.token_uri, uri);
        assert!(got.expiry.unwrap() > before + Duration::minutes(59));
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_token_endpoint_error() {
        let (uri, posted) = token_endpoint(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )
        .await;

        let err = headless(PathBuf::from("credentials.json"))
            .refresh(&stored(uri))
            .await
            .unwrap_err();

        assert_eq!(posted.lock().unwrap().len(), 1);
        match err {
            AuthError::TokenEndpoint { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "invalid_grant: Token has been expired or revoked.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_sends_nothing() {
        let (uri, posted) = token_endpoint(StatusCode::OK, r#"{"access_token":"x"}"#).await;
        let credential = Credential {
            refresh_token: None,
            ..stored(uri)
        };

        let err = headless(PathBuf::from("credentials.json"))
            .refresh(&credential)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::NoRefreshToken));
        assert!(posted.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_token_uri_falls_back_to_google() {
        assert_eq!(token_uri(&Credential::default()), GOOGLE_TOKEN_URI);
        let custom = stored("http://127.0.0.1:9/token".into());
        assert_eq!(token_uri(&custom), "http://127.0.0.1:9/token");
    }

    #[tokio::test]
    async fn headless_consent_is_unavailable_before_reading_the_secret() {
        let dir = tempfile::tempdir().unwrap();
        let oauth = headless(dir.path().join("absent.json"));

        let err = oauth.consent(&["mail".to_string()]).await.unwrap_err();

        assert!(matches!(err, AuthError::ConsentUnavailable));
    }

    #[tokio::test]
    async fn store_refreshes_expired_record_through_the_token_endpoint() {
        let (uri, posted) =
            token_endpoint(StatusCode::OK, r#"{"access_token":"fresh","expires_in":3600}"#).await;
        let dir  = tempfile::tempdir().unwrap();
        let file = CredentialFile::new(dir.path().join("token.json"));
        file.save(&stored(uri)).await.unwrap();

        let store = CredentialStore::new(
            file.clone(),
            Arc::new(headless(dir.path().join("absent.json"))),
            vec!["mail".into(), "calendar".into()],
        );

        assert_eq!(store.obtain().await.unwrap().token, "fresh");
        assert_eq!(file.load().await.unwrap().unwrap().token, "fresh");
        assert_eq!(posted.lock().unwrap().len(), 1);
    }

    #[test]
    fn refresh_response_keeps_refresh_token_and_scopes() {
        let base = Credential {
            token:         "old".into(),
            refresh_token: Some("keep-me".into()),
            scopes:        vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let now = Utc::now();
        let got = apply_token_response(
            base,
            response(r#"{"access_token":"new","expires_in":3599,"token_type":"Bearer"}"#),
            now,
        );

        assert_eq!(got.token, "new");
        assert_eq!(got.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(got.scopes, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(got.expiry, Some(now + Duration::seconds(3599)));
    }

    #[test]
    fn consent_response_sets_refresh_token_and_scopes() {
        let got = apply_token_response(
            Credential::default(),
            response(r#"{"access_token":"t","refresh_token":"r","scope":"x y"}"#),
            Utc::now(),
        );

        assert_eq!(got.refresh_token.as_deref(), Some("r"));
        assert_eq!(got.scopes, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(got.expiry, None);
    }

    #[test]
    fn token_error_prefers_structured_body() {
        let err = token_error(
            hyper::StatusCode::BAD_REQUEST,
            br#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        );
        match err {
            AuthError::TokenEndpoint { status, message } => {
                assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
                assert_eq!(message, "invalid_grant: Token has been expired or revoked.");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = token_error(hyper::StatusCode::BAD_GATEWAY, b" upstream down ");
        assert!(matches!(err, AuthError::TokenEndpoint { message, .. } if message == "upstream down"));
    }

    #[test]
    fn pkce_challenge_matches_rfc7636_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn random_tokens_are_alphanumeric() {
        let token = random_token(40);
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn authorization_url_carries_offline_pkce_request() {
        let url = authorization_url(
            "https://accounts.google.com/o/oauth2/auth",
            "client-1",
            "http://127.0.0.1:4242",
            &["scope/a".into(), "scope/b".into()],
            "st4te",
            "chal",
        )
        .unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4242");
        assert_eq!(params["scope"], "scope/a scope/b");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], "st4te");
    }

    #[test]
    fn redirect_with_code_and_state_yields_code() {
        let got = parse_redirect("GET /?state=abc&code=4%2F0Ad HTTP/1.1\r\n", "abc");
        assert_eq!(got.unwrap().unwrap(), "4/0Ad");
    }

    #[test]
    fn redirect_edge_cases() {
        assert!(parse_redirect("GET /favicon.ico HTTP/1.1\r\n", "abc").is_none());
        assert!(parse_redirect("", "abc").is_none());
        assert!(matches!(
            parse_redirect("GET /?code=x&state=evil HTTP/1.1", "abc"),
            Some(Err(AuthError::StateMismatch))
        ));
        assert!(matches!(
            parse_redirect("GET /?error=access_denied&state=abc HTTP/1.1", "abc"),
            Some(Err(AuthError::ConsentDenied(reason))) if reason == "access_denied"
        ));
    }
}
