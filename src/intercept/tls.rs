use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use anyhow::{Result, anyhow};
use rustls_pemfile::{certs, read_one, Item};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, PrivateKey};
use rustls::{RootCertStore, ServerConfig, ServerName};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use super::Config;

/// Inbound and outbound TLS configuration of the proxy.
#[derive(Clone)]
pub struct Tls {
    pub server: Arc<ServerConfig>,
    pub client: Arc<ClientConfig>,
}

impl Tls {
    pub fn load(cfg: &Config) -> Result<Self> {
        let server = server_config(&cfg.cert, &cfg.key)?;
        let client = client_config(cfg.verify, cfg.roots.as_deref())?;
        Ok(Self {
            server: Arc::new(server),
            client: Arc::new(client),
        })
    }
}

pub fn server_config(cert: &Path, key: &Path) -> Result<ServerConfig> {
    let chain = load_certs(cert)?.into_iter().map(Certificate).collect();
    let key   = load_key(key)?;

    Ok(ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(chain, key)?)
}

pub fn client_config(verify: bool, roots: Option<&Path>) -> Result<ClientConfig> {
    let mut store = RootCertStore::empty();
    store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    if let Some(path) = roots {
        let (added, _) = store.add_parsable_certificates(&load_certs(path)?);
        if added == 0 {
            return Err(anyhow!("no CA certificates loaded from {}", path.display()));
        }
    }

    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(store)
        .with_no_client_auth();

    if !verify {
        config.dangerous().set_certificate_verifier(Arc::new(Unverified));
    }

    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = certs(&mut reader)?;
    match certs.is_empty() {
        true  => Err(anyhow!("no certificates in {}", path.display())),
        false => Ok(certs),
    }
}

fn load_key(path: &Path) -> Result<PrivateKey> {
    let mut reader = BufReader::new(File::open(path)?);
    loop {
        match read_one(&mut reader)? {
            Some(Item::PKCS8Key(key)) => return Ok(PrivateKey(key)),
            Some(Item::RSAKey(key))   => return Ok(PrivateKey(key)),
            Some(Item::ECKey(key))    => return Ok(PrivateKey(key)),
            Some(_)                   => continue,
            None                      => return Err(anyhow!("no private key in {}", path.display())),
        }
    }
}

struct Unverified;

impl ServerCertVerifier for Unverified {
    fn verify_server_cert(
        &self,
        _end_entity:    &Certificate,
        _intermediates: &[Certificate],
        _server_name:   &ServerName,
        _scts:          &mut dyn Iterator<Item = &[u8]>,
        _ocsp:          &[u8],
        _now:           SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
