use hickory_proto::rr::dnssec::rdata::DS;
use hickory_proto::rr::dnssec::{Algorithm, DigestType};

use super::errors::ValidationError;
use super::signed_zone::SignedZone;

/// Key tag of the IANA root KSK-2017.
pub const ROOT_ANCHOR_KEY_TAG: u16 = 20326;

/// SHA-256 digest of the IANA root KSK-2017, as published in the IANA
/// root anchors file.
pub const ROOT_ANCHOR_DIGEST: &str =
    "E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D";

/// The DS record obtained out-of-band that terminates every chain of
/// trust. Defaults to the IANA root KSK-2017; configurable through
/// [`Settings`](super::Settings) so the anchor can be rotated without a
/// recompile. Online RFC 5011 anchor updates are not implemented.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub key_tag: u16,
    pub algorithm: Algorithm,
    pub digest_type: DigestType,
    pub digest: Vec<u8>,
}

impl TrustAnchor {
    /// The 2017 IANA root key signing key.
    pub fn ksk_2017() -> Self {
        TrustAnchor {
            key_tag: ROOT_ANCHOR_KEY_TAG,
            algorithm: Algorithm::RSASHA256,
            digest_type: DigestType::SHA256,
            digest: hex::decode(ROOT_ANCHOR_DIGEST).expect("root anchor digest is valid hex"),
        }
    }

    fn to_ds(&self) -> DS {
        DS::new(
            self.key_tag,
            self.algorithm,
            self.digest_type,
            self.digest.clone(),
        )
    }
}

impl Default for TrustAnchor {
    fn default() -> Self {
        TrustAnchor::ksk_2017()
    }
}

/// The final link of the chain: the root zone's DNSKEY set must contain a
/// key whose digest equals the trust anchor.
pub(crate) fn verify_root_signed_zone(
    root: &SignedZone,
    anchor: &TrustAnchor,
) -> Result<(), ValidationError> {
    root.verify_ds(&anchor.to_ds())
}
