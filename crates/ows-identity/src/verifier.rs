//! Predicate-based mutual-TLS peer verification.
//!
//! Both sides of a connection skip certificate-authority validation
//! entirely. Instead, each verifier extracts the Ed25519 public key
//! embedded in the peer's self-signed certificate and asks a
//! caller-supplied [`PeerPredicate`] whether that key is recognized. This
//! is the *entire* authentication model; there is no bearer-token or
//! cookie layer anywhere in the system.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};

use crate::certificate::extract_ed25519_public_key;
use crate::error::IdentityError;

/// A predicate deciding whether a peer's raw Ed25519 public key is allowed
/// to connect, used in place of certificate-authority validation.
pub trait PeerPredicate: fmt::Debug + Send + Sync {
    /// Returns `true` if `public_key` is a recognized peer.
    fn is_valid_peer(&self, public_key: &[u8; 32]) -> bool;
}

fn verify_cert_signature(
    provider: &CryptoProvider,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &DigitallySignedStruct,
    tls13: bool,
) -> Result<HandshakeSignatureValid, rustls::Error> {
    if tls13 {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &provider.signature_verification_algorithms,
        )
    } else {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &provider.signature_verification_algorithms,
        )
    }
}

/// Verifies server certificates by extracting the embedded Ed25519 key and
/// consulting a [`PeerPredicate`], instead of a certificate authority chain.
#[derive(Debug)]
pub struct PredicateServerVerifier<P> {
    predicate: P,
    provider: Arc<CryptoProvider>,
}

impl<P: PeerPredicate> PredicateServerVerifier<P> {
    /// Builds a verifier around `predicate`, using the ring crypto provider
    /// for the underlying handshake-signature checks.
    #[must_use]
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl<P: PeerPredicate + 'static> ServerCertVerifier for PredicateServerVerifier<P> {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let public_key = extract_ed25519_public_key(end_entity.as_ref())
            .map_err(|err| rustls::Error::General(err.to_string()))?;
        if self.predicate.is_valid_peer(&public_key) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                IdentityError::PeerNotAuthorized.to_string(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_cert_signature(&self.provider, message, cert, dss, false)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_cert_signature(&self.provider, message, cert, dss, true)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Verifies client certificates by extracting the embedded Ed25519 key and
/// consulting a [`PeerPredicate`], instead of a certificate authority chain.
#[derive(Debug)]
pub struct PredicateClientVerifier<P> {
    predicate: P,
    provider: Arc<CryptoProvider>,
}

impl<P: PeerPredicate> PredicateClientVerifier<P> {
    /// Builds a verifier around `predicate`, using the ring crypto provider
    /// for the underlying handshake-signature checks.
    #[must_use]
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl<P: PeerPredicate + 'static> ClientCertVerifier for PredicateClientVerifier<P> {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let public_key = extract_ed25519_public_key(end_entity.as_ref())
            .map_err(|err| rustls::Error::General(err.to_string()))?;
        if self.predicate.is_valid_peer(&public_key) {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                IdentityError::PeerNotAuthorized.to_string(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_cert_signature(&self.provider, message, cert, dss, false)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_cert_signature(&self.provider, message, cert, dss, true)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use ed25519_dalek::SigningKey;

    #[derive(Debug)]
    struct AllowList(Vec<[u8; 32]>);

    impl PeerPredicate for AllowList {
        fn is_valid_peer(&self, public_key: &[u8; 32]) -> bool {
            self.0.iter().any(|k| k == public_key)
        }
    }

    #[test]
    fn server_verifier_accepts_a_listed_key() {
        let signing_key = SigningKey::from_bytes(&[42u8; 32]);
        let cert = crate::certificate::make_self_signed(&signing_key).expect("cert");
        let predicate = AllowList(vec![signing_key.verifying_key().to_bytes()]);
        let verifier = PredicateServerVerifier::new(predicate);
        let name = ServerName::try_from("peer").expect("server name");
        let result = verifier.verify_server_cert(
            &cert.cert_der,
            &[],
            &name,
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn server_verifier_rejects_an_unlisted_key() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let cert = crate::certificate::make_self_signed(&signing_key).expect("cert");
        let predicate = AllowList(vec![[0u8; 32]]);
        let verifier = PredicateServerVerifier::new(predicate);
        let name = ServerName::try_from("peer").expect("server name");
        let result = verifier.verify_server_cert(
            &cert.cert_der,
            &[],
            &name,
            &[],
            UnixTime::now(),
        );
        assert!(result.is_err());
    }
}
