//! Handshake pattern definitions.
//!
//! Each pattern is a compiled-in table of token sequences: an optional set of
//! pre-messages (keys known out of band before the first message) and an
//! ordered list of message scripts. The tables fully determine message
//! direction, message count, and which side transmits a static key, so the
//! handshake driver is a single loop over them.

/// Version details of the Noise dialect this crate speaks.
pub const NOISE_DRAFT_VERSION: &str = "33";
/// DH function component of the protocol name.
pub const DH_NAME: &str = "25519";
/// AEAD component of the protocol name.
pub const AEAD_NAME: &str = "ChaChaPoly";
/// Hash component of the protocol name.
pub const HASH_NAME: &str = "SHA256";

/// Which side of the handshake this state machine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The side that sends the first handshake message.
    Initiator,
    /// The side that receives the first handshake message.
    Responder,
}

impl Role {
    /// The opposite role.
    pub fn peer(self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

/// Handshake tokens.
///
/// `e` and `s` emit or consume a public key; the two-letter tokens mix a
/// Diffie-Hellman result into the chaining key.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Ephemeral public key.
    e,
    /// Static public key (encrypted once a handshake key is installed).
    s,
    /// DH between both ephemeral keys.
    ee,
    /// DH between the initiator's ephemeral and the responder's static.
    es,
    /// DH between the initiator's static and the responder's ephemeral.
    se,
    /// DH between both static keys.
    ss,
}

/// The supported handshake patterns.
///
/// One-way patterns (`N`, `K`, `X`) consist of a single message; the sender
/// can transmit afterwards but never receive. Interactive patterns are named
/// by the status of the initiator's and responder's static keys:
/// **N**one, **K**nown ahead of time, **X**mitted during the handshake, or
/// **I**mmediately transmitted in the first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakePattern {
    N,
    K,
    X,
    NN,
    NK,
    NX,
    KN,
    KK,
    KX,
    XN,
    XK,
    XX,
    IN,
    IK,
    IX,
}

use HandshakePattern::*;
use Token::*;

impl HandshakePattern {
    /// Every supported pattern, in protocol-name order.
    pub const ALL: [HandshakePattern; 15] = [
        N, K, X, NN, NK, NX, KN, KK, KX, XN, XK, XX, IN, IK, IX,
    ];

    /// The pattern's name as it appears in the protocol string.
    pub fn name(&self) -> &'static str {
        match self {
            N => "N",
            K => "K",
            X => "X",
            NN => "NN",
            NK => "NK",
            NX => "NX",
            KN => "KN",
            KK => "KK",
            KX => "KX",
            XN => "XN",
            XK => "XK",
            XX => "XX",
            IN => "IN",
            IK => "IK",
            IX => "IX",
        }
    }

    /// The full protocol name, e.g. `Noise_XX_25519_ChaChaPoly_SHA256`.
    ///
    /// This exact byte string is the initial handshake hash preimage.
    pub fn protocol_name(&self) -> String {
        format!("Noise_{}_{DH_NAME}_{AEAD_NAME}_{HASH_NAME}", self.name())
    }

    /// Pre-message tokens for the initiator side.
    pub fn initiator_pre_messages(&self) -> &'static [Token] {
        match self {
            K | KN | KK | KX => &[s],
            _ => &[],
        }
    }

    /// Pre-message tokens for the responder side.
    pub fn responder_pre_messages(&self) -> &'static [Token] {
        match self {
            N | K | X | NK | KK | XK | IK => &[s],
            _ => &[],
        }
    }

    /// The message scripts, in order. Even-indexed messages are sent by the
    /// initiator, odd-indexed by the responder.
    pub fn messages(&self) -> &'static [&'static [Token]] {
        match self {
            N => &[&[e, es]],
            K => &[&[e, es, ss]],
            X => &[&[e, es, s, ss]],
            NN => &[&[e], &[e, ee]],
            NK => &[&[e, es], &[e, ee]],
            NX => &[&[e], &[e, ee, s, es]],
            KN => &[&[e], &[e, ee, se]],
            KK => &[&[e, es, ss], &[e, ee, se]],
            KX => &[&[e], &[e, ee, se, s, es]],
            XN => &[&[e], &[e, ee], &[s, se]],
            XK => &[&[e, es], &[e, ee], &[s, se]],
            XX => &[&[e], &[e, ee, s, es], &[s, se]],
            IN => &[&[e, s], &[e, ee, se]],
            IK => &[&[e, es, s, ss], &[e, ee, se]],
            IX => &[&[e, s], &[e, ee, se, s, es]],
        }
    }

    /// Whether the pattern consists of a single one-way message.
    pub fn is_one_way(&self) -> bool {
        self.messages().len() == 1
    }

    /// Whether `role` transmits its static key inside a handshake message.
    pub fn transmits_static(&self, role: Role) -> bool {
        self.messages().iter().enumerate().any(|(i, tokens)| {
            let sender = if i % 2 == 0 {
                Role::Initiator
            } else {
                Role::Responder
            };
            sender == role && tokens.contains(&s)
        })
    }

    /// Whether `role` must hold a local static key pair.
    ///
    /// A static key is needed exactly when it is communicated to the peer,
    /// either out of band (pre-message) or in-band.
    pub fn requires_local_static(&self, role: Role) -> bool {
        let pre = match role {
            Role::Initiator => self.initiator_pre_messages(),
            Role::Responder => self.responder_pre_messages(),
        };
        !pre.is_empty() || self.transmits_static(role)
    }

    /// Whether `role` must know the peer's static public key up front.
    pub fn requires_remote_static(&self, role: Role) -> bool {
        let peer_pre = match role {
            Role::Initiator => self.responder_pre_messages(),
            Role::Responder => self.initiator_pre_messages(),
        };
        !peer_pre.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_names() {
        assert_eq!(NN.protocol_name(), "Noise_NN_25519_ChaChaPoly_SHA256");
        assert_eq!(X.protocol_name(), "Noise_X_25519_ChaChaPoly_SHA256");
        // Two-letter pattern names put the protocol string at exactly the
        // hash length, exercising the zero-padding-free initialization path.
        assert_eq!(XX.protocol_name().len(), 32);
        assert_eq!(N.protocol_name().len(), 31);
    }

    #[test]
    fn message_counts() {
        for pattern in HandshakePattern::ALL {
            let count = pattern.messages().len();
            assert!((1..=3).contains(&count), "{}: {count}", pattern.name());
            assert_eq!(pattern.is_one_way(), count == 1);
        }
    }

    #[test]
    fn every_message_script_is_non_empty() {
        for pattern in HandshakePattern::ALL {
            for tokens in pattern.messages() {
                assert!(!tokens.is_empty());
            }
        }
    }

    #[test]
    fn static_transmission_sets() {
        let initiator_sends: Vec<_> = HandshakePattern::ALL
            .into_iter()
            .filter(|p| p.transmits_static(Role::Initiator))
            .collect();
        assert_eq!(initiator_sends, [X, XN, XK, XX, IN, IK, IX]);

        let responder_sends: Vec<_> = HandshakePattern::ALL
            .into_iter()
            .filter(|p| p.transmits_static(Role::Responder))
            .collect();
        assert_eq!(responder_sends, [NX, KX, XX, IX]);
    }

    #[test]
    fn remote_static_requirements_follow_pre_messages() {
        assert!(NK.requires_remote_static(Role::Initiator));
        assert!(!NK.requires_remote_static(Role::Responder));
        assert!(KK.requires_remote_static(Role::Initiator));
        assert!(KK.requires_remote_static(Role::Responder));
        assert!(!XX.requires_remote_static(Role::Initiator));
        assert!(!XX.requires_remote_static(Role::Responder));
    }

    #[test]
    fn local_static_requirements() {
        assert!(!NN.requires_local_static(Role::Initiator));
        assert!(!NN.requires_local_static(Role::Responder));
        assert!(KN.requires_local_static(Role::Initiator));
        assert!(!KN.requires_local_static(Role::Responder));
        assert!(XX.requires_local_static(Role::Initiator));
        assert!(XX.requires_local_static(Role::Responder));
        // One-way patterns always require the responder's static.
        for pattern in [N, K, X] {
            assert!(pattern.requires_local_static(Role::Responder));
        }
    }
}
