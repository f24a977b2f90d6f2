use hickory_proto::error::ProtoError;
use hickory_proto::rr::dnssec::DigestType;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use thiserror::Error;

use crate::exchange::ExchangeError;

/// Everything that can go wrong while fetching and validating an RRset.
///
/// Leaf variants name the individual DNSSEC failure; wrapper variants add
/// the zone and key-tag context of the step that failed, so the rendered
/// message reads as the full failure path, e.g.
/// `cannot create delegation chain: cannot query delegation for com.:
/// cannot fetch DNSKEY records: record not found`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("record not found")]
    RecordNotFound,

    #[error("RRSIG not found")]
    RRSigNotFound,

    /// The upstream resolver answered SERVFAIL. Upstreams are assumed to
    /// validate themselves, so this usually signals their own DNSSEC
    /// verdict.
    #[error("for {zone} {class} {rtype}: DNSSEC validation might have failed upstream")]
    UpstreamValidationFailed {
        zone: Name,
        class: DNSClass,
        rtype: RecordType,
    },

    #[error("RRSIG has expired")]
    RRSigExpired,

    #[error("DNSKEY record not found for key tag {key_tag}")]
    DnsKeyNotFound { key_tag: u16 },

    #[error("DS record does not match DNSKEY: DS digest is {received} but calculated digest is {computed}")]
    InvalidDs { received: String, computed: String },

    #[error("unknown DS digest type {0:?}")]
    UnknownDsDigestType(DigestType),

    /// The cryptographic signature check itself failed.
    #[error("RRSet validation failed for zone {zone} and key tag {key_tag}: {source}")]
    RRSetValidation {
        zone: Name,
        key_tag: u16,
        #[source]
        source: ProtoError,
    },

    #[error("cannot encode owner name: {0}")]
    NameEncoding(#[source] ProtoError),

    #[error("cannot fetch desired RRSet and RRSig: {source}")]
    FetchAnswer {
        #[source]
        source: Box<ValidationError>,
    },

    #[error("cannot fetch DNSKEY records: {source}")]
    FetchDnsKey {
        #[source]
        source: Box<ValidationError>,
    },

    #[error("cannot fetch DS records: {source}")]
    FetchDs {
        #[source]
        source: Box<ValidationError>,
    },

    #[error("cannot query delegation for {zone}: {source}")]
    Delegation {
        zone: Name,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("cannot create delegation chain: {source}")]
    DelegationChain {
        #[source]
        source: Box<ValidationError>,
    },

    #[error("for zone {zone} and RRSIG key tag {key_tag}: {source}")]
    ZoneVerification {
        zone: Name,
        key_tag: u16,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("for DS with key tag {key_tag}: {source}")]
    DsVerification {
        key_tag: u16,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("failed validating root zone: {source}")]
    RootAnchor {
        #[source]
        source: Box<ValidationError>,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl ValidationError {
    /// Unwraps the contextual wrappers down to the failure that started
    /// the chain.
    pub fn root_cause(&self) -> &ValidationError {
        match self {
            ValidationError::FetchAnswer { source }
            | ValidationError::FetchDnsKey { source }
            | ValidationError::FetchDs { source }
            | ValidationError::Delegation { source, .. }
            | ValidationError::DelegationChain { source }
            | ValidationError::ZoneVerification { source, .. }
            | ValidationError::DsVerification { source, .. }
            | ValidationError::RootAnchor { source } => source.root_cause(),
            other => other,
        }
    }
}
