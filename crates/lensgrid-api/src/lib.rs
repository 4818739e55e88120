// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use lensgrid_app::{
    CategoryId, CategoryPage, ConsolidatedStock, Cylinder, CylinderBand, FetchError, FetchReply,
    FetchRequest, Identity, RecordDetail, RecordId, RecordKind, RecordPayload, Role, Sphere,
    SphereSign, StoreId, UserId, partition_cylinders, require_non_empty,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client for the inventory backend. Every request carries the
/// bearer token when one is configured.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn list_cylinders(&self) -> Result<Vec<Cylinder>, FetchError> {
        self.get_json("cyl", &[], "cylinder list")
    }

    pub fn list_spheres(&self, sign: SphereSign) -> Result<Vec<Sphere>, FetchError> {
        self.get_json("sph", &[("type", sign.as_str())], "sphere list")
    }

    pub fn load_cylinder_bands(&self) -> Result<Vec<CylinderBand>, FetchError> {
        let values = self.list_cylinders()?;
        Ok(partition_cylinders(&values))
    }

    /// A successful but empty sphere list is reported as
    /// [`FetchError::Empty`], not as an empty range.
    pub fn load_sphere_range(&self, sign: SphereSign) -> Result<Vec<Sphere>, FetchError> {
        let spheres = self.list_spheres(sign)?;
        require_non_empty(sign, spheres)
    }

    pub fn consolidated_stock(
        &self,
        category: CategoryId,
    ) -> Result<ConsolidatedStock, FetchError> {
        let category = category.to_string();
        self.get_json(
            "bags",
            &[("categoryId", category.as_str())],
            "consolidated stock",
        )
    }

    pub fn record_detail(&self, record: RecordId) -> Result<RecordDetail, FetchError> {
        self.get_json(&format!("records/{record}"), &[], "record detail")
    }

    pub fn fetch(&self, request: FetchRequest) -> Result<FetchReply, FetchError> {
        match request {
            FetchRequest::Cylinders => self.list_cylinders().map(FetchReply::Cylinders),
            FetchRequest::Spheres(sign) => self.load_sphere_range(sign).map(FetchReply::Spheres),
            FetchRequest::Stock(category) => {
                self.consolidated_stock(category).map(FetchReply::Stock)
            }
            FetchRequest::Record(record) => self.record_detail(record).map(FetchReply::Record),
        }
    }

    pub fn list_categories(&self, page: u32, limit: u32, search: &str) -> Result<CategoryPage> {
        let page = page.max(1).to_string();
        let limit = limit.max(1).to_string();
        let mut query = vec![("page", page.as_str()), ("limit", limit.as_str())];
        if !search.trim().is_empty() {
            query.push(("search", search.trim()));
        }
        self.get_json("categories", &query, "category page")
            .map_err(anyhow::Error::from)
    }

    pub fn submit_record(&self, kind: RecordKind, payload: &RecordPayload) -> Result<()> {
        let url = self.endpoint(&format!("records/{}", kind.endpoint()));
        let response = self
            .authorize(self.http.post(&url))
            .json(payload)
            .send()
            .map_err(|error| connection_error(&url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow::Error::from(clean_error_response(status, &body))
                .context(format!("submit {} record", kind.label())));
        }

        tracing::info!(
            kind = kind.label(),
            client_id = payload.client_id.get(),
            category_id = payload.category_id.get(),
            lines = payload.bag.len(),
            quantity = payload.quantity,
            "record submitted"
        );
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, FetchError> {
        let url = self.endpoint(path);
        let response = self
            .authorize(self.http.get(&url).query(query))
            .send()
            .map_err(|error| connection_error(&url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let body = response
            .text()
            .map_err(|error| connection_error(&url, &error))?;
        serde_json::from_str(&body).map_err(|error| FetchError::Decode {
            what: what.to_owned(),
            message: error.to_string(),
        })
    }
}

fn connection_error(url: &str, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timed out -- check that the backend is running or raise api.timeout".to_owned()
    } else {
        format!("{error} -- check api.base_url and that the backend is running")
    };
    FetchError::Transport {
        url: url.to_owned(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> FetchError {
    let code = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.trim().is_empty()
    {
        return FetchError::Status {
            code,
            message: message.trim().to_owned(),
        };
    }

    let trimmed = body.trim();
    let message = if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        trimmed.to_owned()
    } else {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_owned()
    };
    FetchError::Status { code, message }
}

/// Claims carried in the session token. The backend signs and verifies;
/// this side only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub store_id: Option<i64>,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.exp > 0 && now_unix >= self.exp
    }

    pub fn identity(&self) -> Result<Identity> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| anyhow!("token role {:?} is not recognized", self.role))?;
        Ok(Identity {
            user_id: UserId::new(self.id),
            username: self.username.clone(),
            role,
            store_id: self.store_id.map(StoreId::new),
            store_name: self.store_name.clone(),
            full_name: self.full_name.clone(),
        })
    }
}

pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(claims), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("session token is not a JWT -- expected three dot-separated segments");
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(claims.trim_end_matches('='))
        .context("decode token claims")?;
    serde_json::from_slice(&bytes).context("parse token claims")
}

pub fn decode_identity(token: &str) -> Result<Identity> {
    decode_claims(token)?.identity()
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid user id {text:?}"))),
    }
}
