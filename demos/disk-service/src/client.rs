//! Generated-style clients of the disk service.

use http::Method;
use pollux_core::decode::{self, DecodeError};
use pollux_core::{
    HttpResponse, Poller, PollerError, PollerOptions, ResponseError, ResumeToken, TransportError,
    success_status_codes,
};
use tracing::debug;
use url::Url;

use crate::models::{AnimalClassification, Disk, DiskUpdate};

const CREATE_OR_UPDATE: &str = "Disks_CreateOrUpdate";
const DELETE: &str = "Disks_Delete";

/// Errors of the generated clients.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ClientError {
    #[display("Invalid URL: {_0}")]
    Url(url::ParseError),

    #[display("Request failed: {_0}")]
    Request(reqwest::Error),

    #[display("{_0}")]
    Transport(TransportError),

    #[display("Service error: {_0}")]
    Service(ResponseError),

    #[display("{_0}")]
    Poller(PollerError),

    #[display("Cannot decode the response: {_0}")]
    Decode(DecodeError),
}

/// Options of the `begin_*` operations.
#[derive(Debug, Clone, Default)]
pub struct BeginOptions {
    /// Resumes an operation started earlier instead of starting a new one.
    pub resume_token: Option<ResumeToken>,
}

impl BeginOptions {
    #[must_use]
    pub fn with_resume_token(mut self, resume_token: ResumeToken) -> Self {
        self.resume_token = Some(resume_token);
        self
    }
}

/// Client of the `/disks` endpoints.
#[derive(Debug, Clone)]
pub struct DisksClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl DisksClient {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    fn disk_url(&self, name: &str) -> Result<Url, ClientError> {
        Ok(self.endpoint.join(&format!("api/disks/{name}"))?)
    }

    fn create_or_update_options() -> PollerOptions {
        PollerOptions::new(CREATE_OR_UPDATE).with_success_status_codes(success_status_codes!(200, 201))
    }

    fn delete_options() -> PollerOptions {
        PollerOptions::new(DELETE).with_success_status_codes(success_status_codes!(200, 204))
    }

    /// Reads a disk.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on a non-`2xx` answer, or on an unexpected body.
    pub async fn get(&self, name: &str) -> Result<Disk, ClientError> {
        let url = self.disk_url(name)?;
        let response = self.client.get(url).send().await?;
        let response = HttpResponse::from_reqwest(Method::GET, response).await?;
        if !response.status().is_success() {
            return Err(ResponseError::from_response(&response).into());
        }

        serde_json::from_slice(response.body()).map_err(|error| DecodeError::Json(error).into())
    }

    /// Starts creating or resizing a disk.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be sent, or when the resume token is not
    /// a token of this operation.
    pub async fn begin_create_or_update(
        &self,
        name: &str,
        update: &DiskUpdate,
        options: BeginOptions,
    ) -> Result<Poller<Disk>, ClientError> {
        if let Some(token) = options.resume_token {
            return Ok(Poller::resume(
                &token,
                self.client.clone(),
                Self::create_or_update_options(),
            )?);
        }

        let url = self.disk_url(name)?;
        debug!(%url, ?update, "creating or updating disk");
        let response = self.client.put(url).json(update).send().await?;
        let response = HttpResponse::from_reqwest(Method::PUT, response).await?;

        Ok(Poller::create(
            response,
            self.client.clone(),
            Self::create_or_update_options(),
        )?)
    }

    /// Starts deleting a disk.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be sent, or when the resume token is not
    /// a token of this operation.
    pub async fn begin_delete(
        &self,
        name: &str,
        options: BeginOptions,
    ) -> Result<Poller<()>, ClientError> {
        if let Some(token) = options.resume_token {
            return Ok(Poller::resume(
                &token,
                self.client.clone(),
                Self::delete_options(),
            )?);
        }

        let url = self.disk_url(name)?;
        debug!(%url, "deleting disk");
        let response = self.client.delete(url).send().await?;
        let response = HttpResponse::from_reqwest(Method::DELETE, response).await?;

        Ok(Poller::create(
            response,
            self.client.clone(),
            Self::delete_options(),
        )?)
    }
}

/// Client of the polymorphic `/animals` endpoints.
#[derive(Debug, Clone)]
pub struct PetsClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl PetsClient {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    async fn fetch(&self, path: &str) -> Result<HttpResponse, ClientError> {
        let url = self.endpoint.join(path)?;
        let response = self.client.get(url).send().await?;
        let response = HttpResponse::from_reqwest(Method::GET, response).await?;
        if !response.status().is_success() {
            return Err(ResponseError::from_response(&response).into());
        }
        Ok(response)
    }

    /// Reads one animal of the given kind.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on a non-`2xx` answer, or on an undecodable body.
    pub async fn get_animal(&self, kind: &str) -> Result<AnimalClassification, ClientError> {
        let response = self.fetch(&format!("api/animals/{kind}")).await?;
        Ok(decode::decode(response.body())?)
    }

    /// Reads every animal, in the order of the service.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, on a non-`2xx` answer, or when any animal
    /// cannot be decoded.
    pub async fn list_animals(&self) -> Result<Vec<AnimalClassification>, ClientError> {
        let response = self.fetch("api/animals").await?;
        Ok(decode::decode_many(response.body())?)
    }
}
