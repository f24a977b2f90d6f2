//! DNS resolver components centered on a DNSSEC-validating exchange.
//!
//! The crate wraps an outbound DNS exchange (one request, one wire round
//! trip, one response) with a validator that walks the DNSSEC chain of
//! trust from the queried zone up to the IANA root key signing key, and
//! refuses to return any answer whose RRset cannot be proven authentic.
//!
//! ```no_run
//! use hickory_proto::rr::{DNSClass, Name, RecordType};
//! use sigchain::{Settings, Validator};
//! use std::str::FromStr;
//!
//! # async fn example() -> Result<(), sigchain::ValidationError> {
//! let validator = Validator::new(Settings::default());
//! let zone = Name::from_str("example.com.").unwrap();
//! let rrset = validator
//!     .fetch_and_validate(&zone, DNSClass::IN, RecordType::A)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Answers from zones that publish no RRSIG at all are passed through
//! without validation: a large share of the public DNS is still unsigned
//! and refusing it would break resolution wholesale. Set
//! [`Settings::strict`] to reject unsigned answers instead. Negative
//! responses pass through as-is; NSEC/NSEC3 denial proofs are not
//! implemented.

pub mod cache;
pub mod dnssec;
pub mod exchange;


pub use cache::{Cache, NoopCache, ResponseCache};
pub use dnssec::{wrap_dns_exchange, Settings, TrustAnchor, ValidationError, Validator};
pub use exchange::{
    exchange_fn, wrap_exchange_with_cache, Exchange, ExchangeError, ExchangeFn, UdpExchange,
};
