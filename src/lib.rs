//! `gcp-id-token` mints OIDC identity tokens for Google Cloud service accounts
//! using whatever ambient credentials the environment provides, including
//! workload identity federation (external account) credentials that
//! `gcloud auth print-identity-token` cannot use.
//!
//! ```no_run
//! match gcp_id_token::generate_identity_token("my-project", "my-sa") {
//!     Ok(token) => println!("{}", token),
//!     Err(e) => eprintln!("{}", e)
//! }
//! ```
//!
//! The token is always minted for the `sigstore` audience and includes the
//! service account email.
//!
//! # Credentials
//!
//! Application default credentials are loaded with `google-cloud-auth`, which
//! looks in the usual places:
//! * the file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! * the gcloud well-known file (`~/.config/gcloud/application_default_credentials.json`)
//! * the GCE metadata server
//!
//! The credentials must be allowed to call `generateIdToken` on the target
//! service account (`roles/iam.serviceAccountOpenIdTokenCreator`).

use serde::de::DeserializeOwned;
use std::fmt;

pub mod credentials;
pub mod iam;

#[cfg(test)]
#[macro_use]
extern crate lazy_static;

#[cfg(test)]
mod test_env;

pub use credentials::ApplicationDefaultCredentials;
pub use iam::IamCredentialsClient;

pub type Result<T> = std::result::Result<T, Error>;

/// Audience of every identity token minted by this crate
pub const AUDIENCE: &str = "sigstore";

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No usable application default credentials were found
    CredentialsNotFound(String),
    /// Credentials were found but an access token could not be obtained with them
    CredentialsError(String),
    /// The identity token request to the IAM credentials service failed
    RemoteInvocation(String),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CredentialsNotFound(s) => write!(f, "credentials not found: {}", s),
            Error::CredentialsError(s) => write!(f, "credential error: {}", s),
            Error::RemoteInvocation(s) => write!(f, "identity token request failed: {}", s),
        }
    }
}
impl std::error::Error for Error {}

/// Something that can hand out OAuth access tokens for Google APIs.
pub trait CredentialProvider {
    fn access_token(&self) -> Result<String>;
}

/// Something that can mint an identity token for a service account.
pub trait IdTokenGenerator {
    /// `name` is the service account resource name, see [`service_account_resource_name`].
    fn generate_id_token(
        &self,
        name: &str,
        audience: &str,
        include_email: bool,
    ) -> Result<String>;
}

impl<G: IdTokenGenerator + ?Sized> IdTokenGenerator for &G {
    fn generate_id_token(
        &self,
        name: &str,
        audience: &str,
        include_email: bool,
    ) -> Result<String> {
        (**self).generate_id_token(name, audience, include_email)
    }
}

/// Returns the IAM resource name of a service account in a project.
///
/// No escaping is done: both values are expected to be plain identifiers.
///
/// ```
/// assert_eq!(
///     gcp_id_token::service_account_resource_name("my-project", "my-sa"),
///     "projects/-/serviceAccounts/my-sa@my-project.iam.gserviceaccount.com"
/// );
/// ```
pub fn service_account_resource_name(project_id: &str, service_account_name: &str) -> String {
    format!(
        "projects/-/serviceAccounts/{}@{}.iam.gserviceaccount.com",
        service_account_name, project_id
    )
}

pub struct IdentityTokenFetcher<G> {
    generator: G,
}

impl<G: IdTokenGenerator> IdentityTokenFetcher<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Returns a `sigstore` identity token for the service account
    /// `<service_account_name>@<project_id>.iam.gserviceaccount.com`.
    ///
    /// The token is returned as is, it is not parsed or validated.
    pub fn fetch(&self, project_id: &str, service_account_name: &str) -> Result<String> {
        let name = service_account_resource_name(project_id, service_account_name);
        log::debug!("Requesting identity token for {}", name);
        self.generator.generate_id_token(&name, AUDIENCE, true)
    }
}

// Sends the request and decodes a JSON response body. Non-success statuses
// are errors that carry the response body, Google APIs explain themselves there.
pub(crate) fn send_json<T: DeserializeOwned>(
    request: reqwest::blocking::RequestBuilder,
) -> std::result::Result<T, String> {
    let http_response = match request.send() {
        Ok(response) => response,
        Err(e) => return Err(format!("request failed: {}", e)),
    };
    let status = http_response.status();
    if !status.is_success() {
        let body = http_response.text().unwrap_or_default();
        return Err(format!("server responded {}: {}", status, body.trim()));
    }
    match http_response.json::<T>() {
        Ok(value) => Ok(value),
        Err(e) => Err(format!("failed to parse response: {}", e)),
    }
}

/// Returns a `sigstore` identity token for the service account, authenticating
/// with application default credentials.
pub fn generate_identity_token(project_id: &str, service_account_name: &str) -> Result<String> {
    let client = IamCredentialsClient::new(ApplicationDefaultCredentials);
    IdentityTokenFetcher::new(client).fetch(project_id, service_account_name)
}
