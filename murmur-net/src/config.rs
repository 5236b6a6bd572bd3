use std::fmt;
use std::sync::Arc;

use murmur_handshake::{HandshakePattern, KeyPair, PublicKey, Role, PROOF_LEN};

use crate::error::Error;

/// Signature of the public key verifier callback: the peer's 32-byte static
/// key and the 64-byte proof that accompanied it.
pub type VerifierFn = dyn Fn(&[u8; 32], &[u8; PROOF_LEN]) -> bool + Send + Sync;

/// Connection configuration.
///
/// Which fields are mandatory depends on the handshake pattern and on the
/// side this config is used for; [`Config::validate`] is run before any I/O
/// by the listener and dialer entry points.
#[derive(Clone)]
pub struct Config {
    /// The handshake pattern both peers agreed on out of band.
    pub pattern: HandshakePattern,
    /// This peer's Noise static key pair.
    pub local_static: Option<KeyPair>,
    /// The peer's static public key, for patterns that pre-share it.
    pub remote_static: Option<PublicKey>,
    /// Data both peers exchanged before the handshake, bound into the
    /// handshake hash.
    pub prologue: Vec<u8>,
    /// Signature over `local_static`'s public key by this peer's root key;
    /// sent to the peer whenever the pattern transmits our static in-band.
    pub static_public_key_proof: Option<Vec<u8>>,
    /// Callback that judges the peer's static key when the pattern
    /// transmits it in-band.
    pub public_key_verifier: Option<Arc<VerifierFn>>,
    /// Require the peers to read and write in strict alternation after the
    /// handshake.
    pub half_duplex: bool,
}

impl Config {
    /// A config for `pattern` with everything else unset.
    pub fn new(pattern: HandshakePattern) -> Self {
        Self {
            pattern,
            local_static: None,
            remote_static: None,
            prologue: Vec::new(),
            static_public_key_proof: None,
            public_key_verifier: None,
            half_duplex: false,
        }
    }

    /// Check that every hook and key the pattern demands of `role` is
    /// present, before any I/O happens.
    pub(crate) fn validate(&self, role: Role) -> Result<(), Error> {
        if self.pattern.requires_local_static(role) && self.local_static.is_none() {
            return Err(Error::ConfigInvalid(
                "pattern requires a local static key pair",
            ));
        }
        if self.pattern.requires_remote_static(role) && self.remote_static.is_none() {
            return Err(Error::ConfigInvalid(
                "pattern requires the remote static public key",
            ));
        }
        if self.pattern.transmits_static(role) {
            match &self.static_public_key_proof {
                None => {
                    return Err(Error::ConfigInvalid(
                        "pattern requires a static public key proof",
                    ));
                }
                Some(proof) if proof.len() != PROOF_LEN => {
                    return Err(Error::ConfigInvalid(
                        "static public key proof must be 64 bytes",
                    ));
                }
                Some(_) => {}
            }
        }
        if self.pattern.transmits_static(role.peer()) && self.public_key_verifier.is_none() {
            return Err(Error::ConfigInvalid(
                "pattern requires a public key verifier",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("pattern", &self.pattern)
            .field("local_static", &self.local_static.is_some())
            .field("remote_static", &self.remote_static.is_some())
            .field("prologue_len", &self.prologue.len())
            .field("proof", &self.static_public_key_proof.is_some())
            .field("verifier", &self.public_key_verifier.is_some())
            .field("half_duplex", &self.half_duplex)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_handshake::HandshakePattern::*;
    use rand_core::OsRng;

    fn full_config(pattern: HandshakePattern) -> Config {
        let pair = KeyPair::generate(&mut OsRng);
        let remote = KeyPair::generate(&mut OsRng);
        Config {
            local_static: Some(pair),
            remote_static: Some(remote.public),
            static_public_key_proof: Some(vec![0u8; PROOF_LEN]),
            public_key_verifier: Some(Arc::new(|_, _| true)),
            ..Config::new(pattern)
        }
    }

    #[test]
    fn full_config_passes_everywhere() {
        for pattern in HandshakePattern::ALL {
            let config = full_config(pattern);
            config.validate(Role::Initiator).unwrap();
            config.validate(Role::Responder).unwrap();
        }
    }

    #[test]
    fn initiator_verifier_requirements() {
        // Patterns whose responder transmits a static need a verifier on the
        // initiator side.
        for pattern in [NX, KX, XX, IX] {
            let mut config = full_config(pattern);
            config.public_key_verifier = None;
            assert_eq!(
                config.validate(Role::Initiator).unwrap_err(),
                Error::ConfigInvalid("pattern requires a public key verifier"),
                "{}",
                pattern.name()
            );
        }
    }

    #[test]
    fn responder_proof_requirements() {
        for pattern in [NX, KX, XX, IX] {
            let mut config = full_config(pattern);
            config.static_public_key_proof = None;
            assert_eq!(
                config.validate(Role::Responder).unwrap_err(),
                Error::ConfigInvalid("pattern requires a static public key proof"),
                "{}",
                pattern.name()
            );
        }
    }

    #[test]
    fn initiator_proof_requirements() {
        for pattern in [X, XN, XK, XX, IN, IK, IX] {
            let mut config = full_config(pattern);
            config.static_public_key_proof = None;
            assert_eq!(
                config.validate(Role::Initiator).unwrap_err(),
                Error::ConfigInvalid("pattern requires a static public key proof"),
                "{}",
                pattern.name()
            );
        }
    }

    #[test]
    fn responder_verifier_requirements() {
        for pattern in [X, XN, XK, XX, IN, IK, IX] {
            let mut config = full_config(pattern);
            config.public_key_verifier = None;
            assert_eq!(
                config.validate(Role::Responder).unwrap_err(),
                Error::ConfigInvalid("pattern requires a public key verifier"),
                "{}",
                pattern.name()
            );
        }
    }

    #[test]
    fn static_key_requirements() {
        let mut config = full_config(KK);
        config.local_static = None;
        assert!(config.validate(Role::Initiator).is_err());
        assert!(config.validate(Role::Responder).is_err());

        let mut config = full_config(NK);
        config.remote_static = None;
        assert!(config.validate(Role::Initiator).is_err());
        // The NK responder pre-shares its own key, not the initiator's.
        config.validate(Role::Responder).unwrap();
    }

    #[test]
    fn short_proof_rejected() {
        let mut config = full_config(XX);
        config.static_public_key_proof = Some(vec![0u8; 32]);
        assert_eq!(
            config.validate(Role::Initiator).unwrap_err(),
            Error::ConfigInvalid("static public key proof must be 64 bytes"),
        );
    }

    #[test]
    fn nn_needs_nothing() {
        let config = Config::new(NN);
        config.validate(Role::Initiator).unwrap();
        config.validate(Role::Responder).unwrap();
    }
}
