//! CAS single sign-on handshake.
//!
//! Logs into a CAS gateway for a given service URL and hands back a
//! [`Session`] whose cookie jar carries the resulting service session.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{header, Client, Url};
use thiserror::Error;
use tracing::{debug, info};

static EXECUTION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"name="execution" value="([^"]*)""#).expect("valid execution token regex")
});

/// Errors that can occur during the CAS handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login form carried no execution token.
    #[error("CAS login form has no execution token")]
    TokenMissing,

    /// The credential POST was not answered with a redirect.
    #[error("CAS login failed (HTTP {status}): invalid credentials or server error")]
    InvalidCredentialsOrServer { status: u16 },

    /// Redirect answer without a `Location` header.
    #[error("CAS login redirect has no Location header")]
    MissingRedirect,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// An authenticated session.
///
/// Requests made through [`Session::client`] share the cookie jar filled
/// during the handshake and follow redirects normally.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
}

impl Session {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// CAS authenticator for one gateway.
#[derive(Debug, Clone)]
pub struct CasAuthenticator {
    gateway: String,
    timeout: Duration,
}

impl CasAuthenticator {
    /// `gateway` is the CAS base URL, without `/cas/login`.
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> Self {
        Self {
            gateway: gateway.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/cas/login", self.gateway)
    }

    /// Log into the gateway for `service_url`.
    ///
    /// Each call starts from an empty cookie jar. Nothing is retried.
    pub async fn login(
        &self,
        service_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let jar = Arc::new(Jar::default());
        let handshake = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .timeout(self.timeout)
            .build()?;

        let login_url = Url::parse_with_params(&self.login_url(), &[("service", service_url)])
            .map_err(|e| AuthError::InvalidUrl(format!("{}: {}", self.login_url(), e)))?;

        debug!("Fetching CAS login form for {}", service_url);
        let form = handshake.get(login_url.clone()).send().await?.text().await?;
        let execution = EXECUTION_TOKEN
            .captures(&form)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(AuthError::TokenMissing)?;

        let response = handshake
            .post(login_url.clone())
            .form(&[
                ("username", username),
                ("password", password),
                ("execution", execution.as_str()),
                ("_eventId", "submit"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_redirection() {
            return Err(AuthError::InvalidCredentialsOrServer {
                status: status.as_u16(),
            });
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingRedirect)?;
        let target = login_url
            .join(location)
            .map_err(|e| AuthError::InvalidUrl(format!("{}: {}", location, e)))?;

        debug!("Following CAS redirect to {}", target);
        handshake.get(target).send().await?;

        let client = Client::builder()
            .cookie_provider(jar)
            .timeout(self.timeout)
            .build()?;

        info!("CAS login succeeded for {}", service_url);
        Ok(Session { client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Form, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LOGIN_FORM: &str = r#"<form method="post">
        <input type="hidden" name="execution" value="e1s1-token"/>
    </form>"#;

    #[derive(Clone, Default)]
    struct Stub {
        form: &'static str,
        post_status: Option<StatusCode>,
        location: Option<&'static str>,
        posts: Arc<AtomicUsize>,
    }

    async fn login_form(State(stub): State<Stub>) -> &'static str {
        stub.form
    }

    async fn submit(State(stub): State<Stub>, Form(fields): Form<HashMap<String, String>>) -> Response {
        stub.posts.fetch_add(1, Ordering::SeqCst);
        let valid = fields.get("execution").map(String::as_str) == Some("e1s1-token")
            && fields.get("_eventId").map(String::as_str) == Some("submit")
            && fields.get("username").map(String::as_str) == Some("migrator");
        if !valid {
            return (StatusCode::BAD_REQUEST, "bad form").into_response();
        }
        if let Some(status) = stub.post_status {
            return (status, "login page again").into_response();
        }
        let mut headers = HeaderMap::new();
        if let Some(location) = stub.location {
            headers.insert(header::LOCATION, location.parse().unwrap());
        }
        (StatusCode::FOUND, headers).into_response()
    }

    async fn callback() -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::SET_COOKIE, "wp_session=abc; Path=/".parse().unwrap());
        headers.insert(header::LOCATION, "/elsewhere".parse().unwrap());
        (StatusCode::FOUND, headers).into_response()
    }

    async fn protected(headers: HeaderMap) -> Response {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if cookie.contains("wp_session=abc") {
            "secret export".into_response()
        } else {
            StatusCode::FORBIDDEN.into_response()
        }
    }

    async fn spawn(stub: Stub) -> String {
        let router = Router::new()
            .route("/cas/login", get(login_form).post(submit))
            .route("/callback", get(callback))
            .route("/protected", get(protected))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn authenticator(base: &str) -> CasAuthenticator {
        CasAuthenticator::new(format!("{}/", base), Duration::from_secs(5))
    }

    #[test]
    fn test_login_url_trims_trailing_slash() {
        let auth = CasAuthenticator::new("https://sso.example.org/cau/", Duration::from_secs(1));
        assert_eq!(auth.login_url(), "https://sso.example.org/cau/cas/login");
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_post() {
        let stub = Stub {
            form: "<html>maintenance</html>",
            location: Some("/callback"),
            ..Default::default()
        };
        let posts = stub.posts.clone();
        let base = spawn(stub).await;

        let result = authenticator(&base)
            .login("https://blog.example.org/wp-admin/export.php", "migrator", "pw")
            .await;

        assert!(matches!(result, Err(AuthError::TokenMissing)));
        assert_eq!(posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_redirect_post_is_invalid_credentials() {
        let stub = Stub {
            form: LOGIN_FORM,
            post_status: Some(StatusCode::OK),
            ..Default::default()
        };
        let base = spawn(stub).await;

        let result = authenticator(&base)
            .login("https://blog.example.org/", "migrator", "wrong")
            .await;

        match result {
            Err(AuthError::InvalidCredentialsOrServer { status }) => assert_eq!(status, 200),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_without_location_fails() {
        let stub = Stub {
            form: LOGIN_FORM,
            ..Default::default()
        };
        let base = spawn(stub).await;

        let result = authenticator(&base)
            .login("https://blog.example.org/", "migrator", "pw")
            .await;
        assert!(matches!(result, Err(AuthError::MissingRedirect)));
    }

    #[tokio::test]
    async fn test_successful_login_keeps_service_cookies() {
        let stub = Stub {
            form: LOGIN_FORM,
            location: Some("/callback?ticket=ST-1"),
            ..Default::default()
        };
        let posts = stub.posts.clone();
        let base = spawn(stub).await;

        let session = authenticator(&base)
            .login(&format!("{}/protected", base), "migrator", "pw")
            .await
            .unwrap();
        assert_eq!(posts.load(Ordering::SeqCst), 1);

        let body = session
            .client()
            .get(format!("{}/protected", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "secret export");
    }
}
