//! Two-step form login against the Keycloak identity provider.
//!
//! 1. GET the entry point, which lands on the login page and sets the
//!    pre-session cookies.
//! 2. POST the credentials to the form's `action` without following the
//!    redirect, then send the single next hop by hand.
//!
//! A rejected login comes back as a plain 200 with the form re-rendered; a
//! successful one ends with a 302 into the application.

use std::fmt;

use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::{form_urlencoded, Url};

use crate::address::Endpoint;
use crate::error::{AuthError, Result};
use crate::session::Session;
use crate::transport::{Redirects, Transport};

const LOGIN_FORM_SELECTOR: &str = "form#kc-form-login[action]";

/// Username and password for the identity provider.
///
/// The password is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.username)
            .append_pair("password", &self.password)
            .append_pair("rememberMe", "off")
            .append_pair("credentialId", "")
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Logs in and returns a session carrying the provider's cookies.
pub async fn authenticate<T: Transport>(
    transport: T,
    endpoint: Endpoint,
    credentials: &Credentials,
) -> Result<Session<T>> {
    info!("Authenticating as {}...", credentials.username());

    let entry = transport
        .get(&endpoint.login_entry(), Redirects::Follow)
        .await?;
    let action = login_form_action(&String::from_utf8_lossy(&entry.body))
        .ok_or(AuthError::LoginFormNotFound)?;
    let action = resolve(&entry.url, &action).ok_or(AuthError::LoginFormNotFound)?;
    debug!(%action, "found login form");

    let response = transport
        .post_form(action.as_str(), credentials.form_body())
        .await?;

    if response.status == StatusCode::OK {
        return Err(AuthError::InvalidCredentials.into());
    }

    let next = response
        .location
        .as_deref()
        .filter(|_| response.status.is_redirection())
        .and_then(|location| resolve(action.as_str(), location))
        .ok_or(AuthError::UnexpectedResponse {
            status: response.status,
        })?;
    debug!(%next, status = %response.status, "following login redirect");

    let response = transport.get(next.as_str(), Redirects::Manual).await?;
    if response.status != StatusCode::FOUND {
        return Err(AuthError::UnexpectedResponse {
            status: response.status,
        }
        .into());
    }

    info!("Authenticated.");
    Ok(Session::new(transport, endpoint))
}

/// Pulls the submission URL out of the provider's login page.
fn login_form_action(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(LOGIN_FORM_SELECTOR).ok()?;
    let form = document.select(&selector).next()?;
    let action = form.value().attr("action")?.trim();

    if action.is_empty() {
        None
    } else {
        Some(action.to_string())
    }
}

fn resolve(base: &str, reference: &str) -> Option<Url> {
    match Url::parse(base) {
        Ok(base) => base.join(reference).ok(),
        Err(_) => Url::parse(reference).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{credentials, reply, FakeTransport, Recorded};

    const ENTRY: &str = "https://bridge.klett.de/oauth2/authorization/keycloak-ekv";
    const LOGIN_PAGE: &str = "https://id.klett.de/realms/ekv/protocol/openid-connect/auth?client_id=bridge";
    const ACTION: &str =
        "https://id.klett.de/realms/ekv/login-actions/authenticate?session_code=abc&execution=42";
    const CALLBACK: &str = "https://bridge.klett.de/login/oauth2/code/keycloak-ekv?code=xyz";

    fn login_page() -> String {
        r#"<html><body>
            <form id="kc-form-login" onsubmit="login.disabled = true; return true;"
                  action="https://id.klett.de/realms/ekv/login-actions/authenticate?session_code=abc&amp;execution=42"
                  method="post">
              <input name="username"><input name="password" type="password">
            </form>
        </body></html>"#
            .to_string()
    }

    fn provider(post_status: StatusCode, callback_status: StatusCode) -> FakeTransport {
        FakeTransport::new(move |request: &Recorded| match (request.method, request.url.as_str()) {
            ("GET", ENTRY) => {
                let mut r = reply(StatusCode::OK, login_page().into_bytes());
                r.url = LOGIN_PAGE.to_string();
                r
            }
            ("POST", ACTION) => {
                let mut r = reply(post_status, Vec::new());
                if post_status.is_redirection() {
                    r.location = Some(CALLBACK.to_string());
                }
                r
            }
            ("GET", CALLBACK) => reply(callback_status, Vec::new()),
            _ => reply(StatusCode::NOT_FOUND, Vec::new()),
        })
    }

    #[tokio::test]
    async fn successful_login_walks_the_redirect_chain_by_hand() {
        let transport = provider(StatusCode::FOUND, StatusCode::FOUND);

        let session = authenticate(transport, Endpoint::default(), &credentials())
            .await
            .unwrap();

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, ENTRY);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].url, ACTION);
        assert_eq!(
            requests[1].body.as_deref(),
            Some("username=reader&password=s3cret%26pass&rememberMe=off&credentialId=")
        );
        assert_eq!(requests[2].url, CALLBACK);
        assert_eq!(requests[2].redirects, Redirects::Manual);
    }

    #[tokio::test]
    async fn plain_ok_after_post_means_rejected_credentials() {
        let transport = std::sync::Arc::new(provider(StatusCode::OK, StatusCode::FOUND));

        let err = authenticate(transport.clone(), Endpoint::default(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        assert_eq!(transport.requests().len(), 2, "no request after the rejected POST");
    }

    #[tokio::test]
    async fn final_hop_other_than_found_is_unexpected() {
        let transport = provider(StatusCode::FOUND, StatusCode::OK);

        let err = authenticate(transport, Endpoint::default(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Auth(AuthError::UnexpectedResponse { status }) if status == StatusCode::OK
        ));
    }

    #[tokio::test]
    async fn non_redirect_error_after_post_is_unexpected() {
        let transport = provider(StatusCode::BAD_REQUEST, StatusCode::FOUND);

        let err = authenticate(transport, Endpoint::default(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Auth(AuthError::UnexpectedResponse { status }) if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn missing_form_fails_before_posting() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_| {
            reply(StatusCode::OK, b"<html><body>maintenance</body></html>".to_vec())
        }));

        let err = authenticate(transport.clone(), Endpoint::default(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::LoginFormNotFound)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn form_action_is_entity_decoded() {
        assert_eq!(login_form_action(&login_page()).as_deref(), Some(ACTION));
    }

    #[test]
    fn other_forms_are_ignored() {
        let html = r#"<form id="search" action="/search" method="get"></form>"#;
        assert_eq!(login_form_action(html), None);
    }

    #[test]
    fn relative_action_resolves_against_login_page() {
        let url = resolve(LOGIN_PAGE, "/realms/ekv/login-actions/authenticate?x=1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://id.klett.de/realms/ekv/login-actions/authenticate?x=1"
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("reader"));
        assert!(!rendered.contains("s3cret"));
    }
}
