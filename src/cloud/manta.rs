use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use openssl::base64;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{Id, PKey, Private};
use openssl::sign::Signer;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::{Method, StatusCode, Url};

use crate::cloud::store::{ObjectHeaders, RemoteStore};
use crate::config::UploadConfig;
use crate::constants::{DIRECTORY_CONTENT_TYPE, OBJECT_CONTENT_TYPE, USER_AGENT};
use crate::error::StoreError;
use crate::security::credential_scrubber::scrub_credentials;

/// Object store client for Joyent Manta.
///
/// Every request is signed with the HTTP Signature scheme over the `date`
/// header, using the configured private key.
pub struct MantaStore {
    client: Client,
    base_url: Url,
    key: PKey<Private>,
    key_id: String,
    algorithm: &'static str,
}

impl MantaStore {
    /// Create a client from a resolved configuration.
    ///
    /// Loads the private key and builds the HTTP client; no request is sent.
    pub fn new(config: &UploadConfig) -> Result<Self, StoreError> {
        let key = load_private_key(&config.key_path)?;
        let algorithm = signature_algorithm(&key)?;

        check_fingerprint(&key, &config.key_fingerprint);

        let base_url = Url::parse(&config.endpoint_url).map_err(|e| {
            StoreError::Transport(format!("invalid Manta URL '{}': {}", config.endpoint_url, e))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.tuning.connection_timeout())
            .timeout(config.tuning.connection_timeout())
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            key,
            key_id: key_id_for(&config.principal, &config.key_fingerprint),
            algorithm,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn authorization(&self, date: &str) -> Result<String, StoreError> {
        let signing_error = |e: openssl::error::ErrorStack| StoreError::Signing(e.to_string());

        let mut signer = Signer::new(MessageDigest::sha256(), &self.key).map_err(signing_error)?;
        signer
            .update(signing_string(date).as_bytes())
            .map_err(signing_error)?;
        let signature = signer.sign_to_vec().map_err(signing_error)?;

        Ok(format!(
            "Signature keyId=\"{}\",algorithm=\"{}\",headers=\"date\",signature=\"{}\"",
            self.key_id,
            self.algorithm,
            base64::encode_block(&signature)
        ))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let url = object_url(&self.base_url, path)?;
        let date = http_date(Utc::now());
        let authorization = self.authorization(&date)?;

        debug!("{} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header(DATE, date)
            .header(AUTHORIZATION, authorization))
    }

    fn send(path: &str, request: RequestBuilder) -> Result<(), StoreError> {
        let response = request
            .send()
            .map_err(|e| StoreError::Transport(scrub_credentials(&e.to_string())))?;
        check_response(path, response)
    }
}

impl RemoteStore for MantaStore {
    fn put(&self, path: &str, local_file: &Path, headers: &ObjectHeaders) -> Result<(), StoreError> {
        let file = fs::File::open(local_file)?;
        let length = file.metadata()?.len();

        let mut request = self
            .request(Method::PUT, path)?
            .header(CONTENT_TYPE, OBJECT_CONTENT_TYPE)
            .body(Body::sized(file, length));
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        Self::send(path, request)
    }

    fn probe(&self, path: &str) -> Result<(), StoreError> {
        Self::send(path, self.request(Method::HEAD, path)?)
    }

    fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        let request = self
            .request(Method::PUT, path)?
            .header(CONTENT_TYPE, DIRECTORY_CONTENT_TYPE);
        Self::send(path, request)
    }
}

/// Append each segment of `path` to the endpoint, percent-encoding it so
/// `#`, `?` and `%` in file names stay part of the object name.
fn object_url(base: &Url, path: &str) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| StoreError::Transport(format!("Manta URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn check_response(path: &str, response: Response) -> Result<(), StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().unwrap_or_default();
    Err(classify_status(status, path, message))
}

/// Map a non-success status onto the store error the pipeline reasons about.
fn classify_status(status: StatusCode, path: &str, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth {
            status: status.as_u16(),
            message,
        },
        _ => StoreError::Http {
            status: status.as_u16(),
            path: path.to_string(),
            message,
        },
    }
}

/// `account` signs as `/account/keys/fp`; `account/sub` as
/// `/account/users/sub/keys/fp`.
fn key_id_for(principal: &str, fingerprint: &str) -> String {
    match principal.split_once('/') {
        Some((account, subuser)) => format!("/{}/users/{}/keys/{}", account, subuser, fingerprint),
        None => format!("/{}/keys/{}", principal, fingerprint),
    }
}

fn signing_string(date: &str) -> String {
    format!("date: {}", date)
}

/// RFC 1123 date as required by the `date` header.
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn load_private_key(path: &Path) -> Result<PKey<Private>, StoreError> {
    let pem = fs::read(path)?;
    PKey::private_key_from_pem(&pem).map_err(|e| {
        StoreError::Signing(format!("unable to parse private key {}: {}", path.display(), e))
    })
}

fn signature_algorithm(key: &PKey<Private>) -> Result<&'static str, StoreError> {
    match key.id() {
        Id::RSA => Ok("rsa-sha256"),
        Id::EC => Ok("ecdsa-sha256"),
        other => Err(StoreError::Signing(format!("unsupported key type {:?}", other))),
    }
}

/// Warn when the configured key id does not match the loaded key.
///
/// Only RSA keys are checked; both the legacy MD5 form and the `SHA256:`
/// form are understood. A mismatch is not fatal since the server decides.
fn check_fingerprint(key: &PKey<Private>, configured: &str) {
    let Some(blob) = ssh_public_key_blob(key) else {
        return;
    };
    let configured = configured.trim();

    let matches = if let Some(expected) = configured.strip_prefix("SHA256:") {
        sha256_fingerprint(&blob).map(|fp| fp == expected)
    } else {
        md5_fingerprint(&blob).map(|fp| fp == configured.trim_start_matches("MD5:"))
    };

    match matches {
        Some(true) => debug!("Key fingerprint matches private key"),
        Some(false) => warn!("Configured key id does not match the fingerprint of the private key"),
        None => debug!("Unable to compute key fingerprint"),
    }
}

/// SSH wire encoding of an RSA public key.
fn ssh_public_key_blob(key: &PKey<Private>) -> Option<Vec<u8>> {
    let rsa = key.rsa().ok()?;
    let mut blob = Vec::new();
    push_ssh_string(&mut blob, b"ssh-rsa");
    push_ssh_mpint(&mut blob, &rsa.e().to_vec());
    push_ssh_mpint(&mut blob, &rsa.n().to_vec());
    Some(blob)
}

fn push_ssh_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn push_ssh_mpint(out: &mut Vec<u8>, magnitude: &[u8]) {
    if magnitude.first().map_or(false, |b| b & 0x80 != 0) {
        out.extend_from_slice(&(magnitude.len() as u32 + 1).to_be_bytes());
        out.push(0);
        out.extend_from_slice(magnitude);
    } else {
        push_ssh_string(out, magnitude);
    }
}

fn md5_fingerprint(blob: &[u8]) -> Option<String> {
    let digest = hash(MessageDigest::md5(), blob).ok()?;
    Some(
        digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

fn sha256_fingerprint(blob: &[u8]) -> Option<String> {
    let digest = hash(MessageDigest::sha256(), blob).ok()?;
    Some(base64::encode_block(&digest).trim_end_matches('=').to_string())
}
