//! DNSSEC chain-of-trust validation (RFC 4033-4035, 6840).
//!
//! [`Validator`] decorates an outbound [`Exchange`](crate::exchange::Exchange):
//! for every question it fetches the answer RRset together with its
//! RRSIGs, builds the delegation chain from the queried zone up to the
//! root by fetching DNSKEY and DS records for every ancestor in parallel,
//! and verifies signatures and DS digests link by link until the root
//! DNSKEY matches the configured trust anchor.
//!
//! Zones that publish no RRSIG pass through unvalidated unless
//! [`Settings::strict`] is set; see the crate documentation for the
//! rationale. NSEC/NSEC3 proofs of non-existence are not implemented, so
//! negative responses also pass through as-is.

mod chain;
mod errors;
mod root;
mod rrset;
mod signed_zone;
#[cfg(test)]
pub(crate) mod test_support;
mod validator;

pub use errors::ValidationError;
pub use root::{TrustAnchor, ROOT_ANCHOR_DIGEST, ROOT_ANCHOR_KEY_TAG};
pub use validator::{wrap_dns_exchange, Settings, Validator};
