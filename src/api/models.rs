use serde::{Deserialize, Serialize};

/// Incoming message to be parsed.
#[derive(Serialize, Deserialize)]
pub struct ParseRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkTitle {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    pub mentions: Vec<String>,
    pub emoticons: Vec<String>,
    pub links: Vec<LinkTitle>,
}

/// A registered REST endpoint, listed by the fallback handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub method: String,
}
