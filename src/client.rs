use crate::config::Credential;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(
        "The details entered are incorrect. Run `meshctl config --email <your_email> --password <your_password>` or contact your account owner for the required permissions."
    )]
    AuthenticationFailed,
    #[error(
        "It looks like you're not logged in. Run `meshctl config` to make sure you have the required permissions."
    )]
    NotLoggedIn(#[source] reqwest::Error),
    #[error(
        "Your access token has expired or was rejected (HTTP {0}). Run `meshctl config --email <your_email> --password <your_password>` to generate a new one."
    )]
    TokenRejected(u16),
    #[error("The mesh API rejected the request: status code {status}. Message: {message}")]
    WriteRejected { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    host: Url,
    http: Client,
    token: String,
}

impl ApiClient {
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let parsed = Url::parse(host).context("parsing API host URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static("meshctl/0.1"))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            host: parsed,
            http,
            token: token.to_string(),
        })
    }

    pub fn from_credential(credential: &Credential) -> Result<Self> {
        Self::new(&credential.host, &credential.access_token)
    }

    pub fn get(&self, collection: &str, params: &[(String, String)]) -> Result<ResponseData> {
        self.request(Method::GET, collection, params, None, false)
    }

    /// Creates a record, asking PostgREST to echo the representation back.
    pub fn create(&self, collection: &str, record: &Value) -> Result<ResponseData> {
        self.request(Method::POST, collection, &[], Some(record), true)
    }

    pub fn delete(&self, collection: &str, params: &[(String, String)]) -> Result<ResponseData> {
        self.request(Method::DELETE, collection, params, None, false)
    }

    // Non-2xx statuses are returned in ResponseData; the caller decides
    // whether that means an expired token or a rejected write.
    fn request(
        &self,
        method: Method,
        collection: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        representation: bool,
    ) -> Result<ResponseData> {
        let normalized = collection.trim_start_matches('/');
        let url = self
            .host
            .join(normalized)
            .with_context(|| format!("joining `{collection}` to the API host"))?;

        let accept = if representation {
            HeaderValue::from_static("application/vnd.pgrst.object+json")
        } else {
            HeaderValue::from_static("application/json")
        };
        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, accept);

        if !params.is_empty() {
            request = request.query(params);
        }
        if representation {
            request = request.header("Prefer", "return=representation");
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(ApiError::NotLoggedIn)?;
        let status = response.status().as_u16();
        let text = response.text().context("reading response body")?;
        let json = serde_json::from_str(&text).ok();

        Ok(ResponseData {
            status,
            body: text,
            json,
        })
    }
}

/// Exchanges email and password for a bearer token via the login RPC.
pub fn login(host: &str, email: &str, password: &str) -> Result<String> {
    let url = Url::parse(host)
        .context("parsing API host URL")?
        .join("rpc/login")
        .context("building login URL")?;
    let http = Client::builder()
        .user_agent(HeaderValue::from_static("meshctl/0.1"))
        .build()
        .context("building HTTP client")?;

    let response = http
        .post(url)
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .map_err(ApiError::NotLoggedIn)?;

    if response.status() != StatusCode::OK {
        return Err(ApiError::AuthenticationFailed.into());
    }

    let payload: Value = response.json().context("decoding login response")?;
    payload
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("login response did not contain a token"))
}
