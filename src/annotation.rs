use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::Equation;
use crate::error::MetabError;
use crate::record::Record;

/// Remote source of gene and reaction annotations.
///
/// `Ok(None)` means the service answered and does not know the id; `Err` is
/// reserved for transport and status failures.
pub trait AnnotationClient: Send + Sync {
    fn service(&self) -> &'static str;
    fn gene_reactions(&self, gene: &str) -> Result<Option<BTreeSet<String>>, MetabError>;
    fn reaction_equation(&self, reaction: &str) -> Result<Option<Equation>, MetabError>;
}

#[derive(Clone)]
struct HttpFetcher {
    client: Client,
    service: &'static str,
}

impl HttpFetcher {
    fn new(service: &'static str) -> Result<Self, MetabError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("micrometab/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MetabError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| MetabError::Http(err.to_string()))?;
        Ok(Self { client, service })
    }

    fn send_with_retries(&self, id: &str, url: &str) -> Result<Response, MetabError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(MetabError::UpstreamUnavailable {
                        service: self.service,
                        id: id.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    /// Body text, `None` on 404 or an empty body.
    fn get_text(&self, id: &str, url: &str) -> Result<Option<String>, MetabError> {
        let response = self.send_with_retries(id, url)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| format!("{} request failed", self.service));
            return Err(MetabError::UpstreamStatus {
                service: self.service,
                status,
                message,
            });
        }
        let text = response
            .text()
            .map_err(|err| MetabError::UpstreamUnavailable {
                service: self.service,
                id: id.to_string(),
                message: err.to_string(),
            })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// The KEGG REST `get` endpoint, which answers with flat-file records.
#[derive(Clone)]
pub struct KeggHttpClient {
    http: HttpFetcher,
    base_url: String,
}

impl KeggHttpClient {
    pub fn new() -> Result<Self, MetabError> {
        Ok(Self {
            http: HttpFetcher::new("KEGG")?,
            base_url: "https://rest.kegg.jp".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn entry_url(&self, id: &str) -> String {
        format!("{}/get/{}", self.base_url.trim_end_matches('/'), id)
    }
}

impl AnnotationClient for KeggHttpClient {
    fn service(&self) -> &'static str {
        "KEGG"
    }

    fn gene_reactions(&self, gene: &str) -> Result<Option<BTreeSet<String>>, MetabError> {
        let Some(text) = self.http.get_text(gene, &self.entry_url(gene))? else {
            return Ok(None);
        };
        Ok(Some(parse_kegg_gene_reactions(&text)))
    }

    fn reaction_equation(&self, reaction: &str) -> Result<Option<Equation>, MetabError> {
        let Some(text) = self.http.get_text(reaction, &self.entry_url(reaction))? else {
            return Ok(None);
        };
        parse_kegg_reaction_equation(reaction, &text).map(Some)
    }
}

pub fn parse_kegg_gene_reactions(text: &str) -> BTreeSet<String> {
    Record::parse(text)
        .values("DBLINKS")
        .filter_map(|line| line.strip_prefix("RN:"))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

pub fn parse_kegg_reaction_equation(reaction: &str, text: &str) -> Result<Equation, MetabError> {
    let record = Record::parse(text);
    let raw = record
        .first("EQUATION")
        .ok_or_else(|| MetabError::MalformedRecord {
            family: "reaction",
            id: reaction.to_string(),
            reason: "entry has no EQUATION".to_string(),
        })?;
    raw.parse::<Equation>()
        .map_err(|_| MetabError::MalformedRecord {
            family: "reaction",
            id: reaction.to_string(),
            reason: format!("equation without arrow: {raw}"),
        })
}

/// The TogoWS mirror of KEGG, which answers with JSON field extracts.
#[derive(Clone)]
pub struct TogowsHttpClient {
    http: HttpFetcher,
    base_url: String,
}

impl TogowsHttpClient {
    pub fn new() -> Result<Self, MetabError> {
        Ok(Self {
            http: HttpFetcher::new("TogoWS")?,
            base_url: "http://togows.org/entry".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn field_url(&self, database: &str, id: &str, field: &str) -> String {
        format!(
            "{}/{database}/{id}/{field}.json",
            self.base_url.trim_end_matches('/')
        )
    }

    fn get_json(&self, id: &str, url: &str) -> Result<Option<Value>, MetabError> {
        let Some(text) = self.http.get_text(id, url)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| MetabError::UpstreamUnavailable {
                service: "TogoWS",
                id: id.to_string(),
                message: format!("invalid JSON: {err}"),
            })
    }
}

impl AnnotationClient for TogowsHttpClient {
    fn service(&self) -> &'static str {
        "TogoWS"
    }

    fn gene_reactions(&self, gene: &str) -> Result<Option<BTreeSet<String>>, MetabError> {
        let url = self.field_url("kegg-genes", gene, "dblinks");
        Ok(self.get_json(gene, &url)?.and_then(|json| parse_togows_dblinks(&json)))
    }

    fn reaction_equation(&self, reaction: &str) -> Result<Option<Equation>, MetabError> {
        let url = self.field_url("kegg-reaction", reaction, "equation");
        let Some(json) = self.get_json(reaction, &url)? else {
            return Ok(None);
        };
        let Some(raw) = json
            .as_array()
            .and_then(|items| items.first())
            .and_then(|value| value.as_str())
        else {
            return Ok(None);
        };
        raw.parse::<Equation>().map(Some)
    }
}

/// `[{"RN": ["R00001", ...], ...}]`; an empty array is an unknown gene and a
/// record without `RN` links catalyzes nothing.
pub fn parse_togows_dblinks(json: &Value) -> Option<BTreeSet<String>> {
    let entry = json.as_array()?.first()?;
    let reactions = entry
        .get("RN")
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(reactions)
}
