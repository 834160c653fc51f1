//! Client for the IAM Service Account Credentials API.

use serde::{Deserialize, Serialize};

use crate::{send_json, CredentialProvider, Error, IdTokenGenerator, Result};

const IAM_CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

/// Calls `generateIdToken`, authorized with access tokens from `C`.
pub struct IamCredentialsClient<C> {
    credentials: C,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl<C: CredentialProvider> IamCredentialsClient<C> {
    pub fn new(credentials: C) -> Self {
        Self {
            credentials,
            endpoint: IAM_CREDENTIALS_ENDPOINT.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Overrides the API root, `https://iamcredentials.googleapis.com` by default.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl<C: CredentialProvider> IdTokenGenerator for IamCredentialsClient<C> {
    fn generate_id_token(
        &self,
        name: &str,
        audience: &str,
        include_email: bool,
    ) -> Result<String> {
        let access_token = self.credentials.access_token()?;

        let url = format!(
            "{}/v1/{}:generateIdToken",
            self.endpoint.trim_end_matches('/'),
            name
        );
        log::debug!("IAM credentials: Requesting identity token from {}", url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&GenerateIdTokenRequest {
                audience,
                include_email,
            });
        match send_json::<GenerateIdTokenResponse>(request) {
            Ok(response) => Ok(response.token),
            Err(e) => Err(Error::RemoteInvocation(format!("{}: {}", name, e))),
        }
    }
}
