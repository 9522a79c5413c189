use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::{Certificate, ClientBuilder};

use crate::config::HueTrekConfig;
use crate::error::ApiResult;

/// Decides which TLS peers the http client accepts.
pub trait TransportPolicy: Send + Sync {
    fn configure(&self, builder: ClientBuilder) -> ApiResult<ClientBuilder>;
}

/// Trust whatever the platform trusts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTrust;

impl TransportPolicy for SystemTrust {
    fn configure(&self, builder: ClientBuilder) -> ApiResult<ClientBuilder> {
        Ok(builder)
    }
}

/// Trust only the given certificates, and nothing from the platform store.
#[derive(Clone)]
pub struct PinnedCertificates {
    certs: Vec<Certificate>,
}

impl PinnedCertificates {
    pub fn from_pem_files(files: &[Utf8PathBuf]) -> ApiResult<Self> {
        let mut certs = vec![];
        for file in files {
            let pem = fs::read(file)?;
            certs.push(Certificate::from_pem(&pem)?);
            log::debug!("Pinned certificate from {file}");
        }
        Ok(Self { certs })
    }
}

impl TransportPolicy for PinnedCertificates {
    fn configure(&self, builder: ClientBuilder) -> ApiResult<ClientBuilder> {
        let builder = self
            .certs
            .iter()
            .cloned()
            .fold(builder.tls_built_in_root_certs(false), ClientBuilder::add_root_certificate);
        Ok(builder)
    }
}

pub fn policy_from_config(conf: &HueTrekConfig) -> ApiResult<Arc<dyn TransportPolicy>> {
    if conf.pinned_certificates.is_empty() {
        Ok(Arc::new(SystemTrust))
    } else {
        Ok(Arc::new(PinnedCertificates::from_pem_files(
            &conf.pinned_certificates,
        )?))
    }
}

pub fn build_http_client(
    policy: &dyn TransportPolicy,
    timeout: Duration,
) -> ApiResult<reqwest::Client> {
    let builder = reqwest::Client::builder().timeout(timeout);
    Ok(policy.configure(builder)?.build()?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camino::Utf8PathBuf;

    use crate::error::{ApiError, ErrorKind};
    use crate::transport::{PinnedCertificates, SystemTrust, build_http_client};

    #[test]
    fn system_trust_builds_client() {
        assert!(build_http_client(&SystemTrust, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn missing_pinned_certificate_is_an_error() {
        let res = PinnedCertificates::from_pem_files(&[Utf8PathBuf::from(
            "/nonexistent/huetrek/bridge.pem",
        )]);

        let Err(err) = res else {
            panic!("expected an error");
        };
        assert!(matches!(err, ApiError::IOError(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn empty_pin_set_builds_client() {
        let policy = PinnedCertificates::from_pem_files(&[]).unwrap();
        assert!(build_http_client(&policy, Duration::from_secs(1)).is_ok());
    }
}
