use std::fmt;
use serde::{Serialize, Deserialize};

pub mod dns;
pub mod http;

pub use http::{classify, LIMIT};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Decoded {
    Request(Request),
    Response(Response),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub path:   String,
    pub host:   Option<String>,
    pub url:    Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status:            u16,
    pub transfer_encoding: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_tls(tls: bool) -> Self {
        match tls {
            true  => Scheme::Https,
            false => Scheme::Http,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scheme::Http  => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}
