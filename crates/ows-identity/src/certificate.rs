//! In-memory self-signed X.509 certificates binding an Ed25519 identity key.
//!
//! There is no certificate authority in this system. Every node and user
//! presents a self-signed certificate whose subject public key *is* its
//! Ed25519 identity key; the other side extracts that key and checks it
//! against a caller-supplied predicate instead of walking a trust chain.

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use rcgen::{CertificateParams, KeyPair as RcgenKeyPair};
use rustls_pki_types::{CertificateDer, PrivatePkcs8KeyDer};

use crate::error::IdentityError;

/// A self-signed certificate and its matching PKCS#8-encoded private key,
/// ready to hand to a rustls server or client config.
pub struct IdentityCertificate {
    /// DER-encoded self-signed certificate.
    pub cert_der: CertificateDer<'static>,
    /// PKCS#8 DER-encoded Ed25519 private key.
    pub key_der: PrivatePkcs8KeyDer<'static>,
}

/// Builds a self-signed certificate whose subject public key is the given
/// Ed25519 signing key's public key.
pub fn make_self_signed(signing_key: &SigningKey) -> Result<IdentityCertificate, IdentityError> {
    let pkcs8 = signing_key
        .to_pkcs8_der()
        .map_err(|err| IdentityError::Certificate(err.to_string()))?;
    let key_pair = RcgenKeyPair::from_pkcs8_der_and_sign_algo(pkcs8.as_bytes(), &rcgen::PKCS_ED25519)
        .map_err(|err| IdentityError::Certificate(err.to_string()))?;
    let params = CertificateParams::new(Vec::<String>::new())
        .map_err(|err| IdentityError::Certificate(err.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|err| IdentityError::Certificate(err.to_string()))?;
    Ok(IdentityCertificate {
        cert_der: cert.der().clone(),
        key_der: PrivatePkcs8KeyDer::from(pkcs8.as_bytes().to_vec()),
    })
}

/// Extracts the raw 32-byte Ed25519 public key embedded in a peer's
/// certificate's subject public key info.
pub fn extract_ed25519_public_key(cert_der: &[u8]) -> Result<[u8; 32], IdentityError> {
    let (_, cert) = x509_parser::parse_x509_certificate(cert_der)
        .map_err(|err| IdentityError::InvalidPeerCertificate(err.to_string()))?;
    let spki = cert.public_key();
    let raw = spki.subject_public_key.as_ref();
    raw.try_into().map_err(|_| {
        IdentityError::InvalidPeerCertificate(format!(
            "expected a 32-byte Ed25519 public key, got {} bytes",
            raw.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn self_signed_certificate_embeds_the_signing_key() {
        let signing_key = SigningKey::from_bytes(&[11u8; 32]);
        let cert = make_self_signed(&signing_key).expect("make cert");
        let extracted =
            extract_ed25519_public_key(cert.cert_der.as_ref()).expect("extract public key");
        assert_eq!(extracted, signing_key.verifying_key().to_bytes());
    }
}
