//! Application default credentials.
//!
//! Discovery and token exchange are done by `google-cloud-auth`, so every
//! credential type it understands works here: external account (workload
//! identity federation), service account keys, gcloud user credentials,
//! impersonated service accounts and the metadata server.

use google_cloud_auth::credentials::{Builder, CacheableResource};
use http::{header::AUTHORIZATION, Extensions, HeaderMap};

use crate::{CredentialProvider, Error, Result};

/// Application default credentials, discovered when an access token is
/// first needed.
///
/// The lookup is lazy so that argument errors never touch the credential
/// chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApplicationDefaultCredentials;

impl CredentialProvider for ApplicationDefaultCredentials {
    fn access_token(&self) -> Result<String> {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return Err(Error::CredentialsError(format!(
                    "failed to start async runtime: {}",
                    e
                )))
            }
        };

        // The credentials cache may spawn tasks: build inside the runtime
        let headers = runtime.block_on(async {
            log::debug!("Application default credentials: Loading");
            let credentials = match Builder::default().build() {
                Ok(credentials) => credentials,
                Err(e) => return Err(Error::CredentialsNotFound(e.to_string())),
            };
            log::debug!("Application default credentials: Requesting access token");
            match credentials.headers(Extensions::new()).await {
                Ok(CacheableResource::New { data, .. }) => Ok(data),
                Ok(CacheableResource::NotModified) => Err(Error::CredentialsError(
                    "no authorization headers returned".into(),
                )),
                Err(e) => Err(Error::CredentialsError(e.to_string())),
            }
        })?;
        bearer_token(&headers)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(Error::CredentialsError(
            "credentials did not produce an authorization header".into(),
        ));
    };
    match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) => Ok(token.to_string()),
        None => Err(Error::CredentialsError(
            "credentials did not produce a bearer token".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::with_env;

    use http::HeaderValue;
    use httptest::{matchers::request, responders::json_encoded, Expectation, Server};
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn bearer_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer ya29.token"));
        headers.insert("x-goog-user-project", HeaderValue::from_static("quota"));
        assert_eq!(bearer_token(&headers), Ok("ya29.token".into()));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert!(matches!(
            bearer_token(&basic),
            Err(Error::CredentialsError(_))
        ));

        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(Error::CredentialsError(_))
        ));
    }

    #[test]
    fn missing_credentials_file() {
        with_env(
            &[(
                "GOOGLE_APPLICATION_CREDENTIALS",
                Some("/nonexistent/credentials.json"),
            )],
            || {
                assert!(matches!(
                    ApplicationDefaultCredentials.access_token(),
                    Err(Error::CredentialsNotFound(_))
                ));
            },
        );
    }

    #[test]
    fn malformed_credentials_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"client_id\": \"no type\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        with_env(&[("GOOGLE_APPLICATION_CREDENTIALS", Some(&path))], || {
            assert!(matches!(
                ApplicationDefaultCredentials.access_token(),
                Err(Error::CredentialsNotFound(_))
            ));
        });
    }

    #[test]
    fn authorized_user_credentials() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token")).respond_with(
                json_encoded(json!({
                    "access_token": "user-token",
                    "token_type": "Bearer",
                    "expires_in": 3599,
                    "scope": "https://www.googleapis.com/auth/cloud-platform"
                })),
            ),
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let credentials = json!({
            "type": "authorized_user",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "secret",
            "refresh_token": "refresh",
            "token_uri": server.url_str("/token"),
        });
        write!(file, "{}", credentials).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        with_env(&[("GOOGLE_APPLICATION_CREDENTIALS", Some(&path))], || {
            assert_eq!(
                ApplicationDefaultCredentials.access_token(),
                Ok("user-token".into())
            );
        });
    }
}
