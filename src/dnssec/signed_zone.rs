use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use hickory_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS, SIG};
use hickory_proto::rr::dnssec::{Algorithm, DigestType, Verifier};
use hickory_proto::rr::{Name, RData, Record};
use hickory_proto::serialize::binary::BinEncodable;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::errors::ValidationError;

/// Verification state for one level of the delegation chain: the zone's
/// DNSKEYs with their self-signature, and (except for the root) the DS
/// records the parent publishes for it, with the parent's signature.
///
/// Built once per validation and never mutated.
#[derive(Debug)]
pub(crate) struct SignedZone {
    pub(crate) zone: Name,
    pub(crate) dnskey_rrsigs: Vec<Record>,
    pub(crate) dnskey_rrset: Vec<Record>,
    pub(crate) ds_rrsigs: Vec<Record>,
    pub(crate) ds_rrset: Vec<Record>,
    dnskeys: HashMap<(u16, Algorithm), DNSKEY>,
}

impl SignedZone {
    pub(crate) fn new(
        zone: Name,
        dnskey_rrsigs: Vec<Record>,
        dnskey_rrset: Vec<Record>,
        ds_rrsigs: Vec<Record>,
        ds_rrset: Vec<Record>,
    ) -> Self {
        let dnskeys = dnskey_rrset_to_map(&dnskey_rrset);
        SignedZone {
            zone,
            dnskey_rrsigs,
            dnskey_rrset,
            ds_rrsigs,
            ds_rrset,
            dnskeys,
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.zone.is_root()
    }

    fn dnskey_for(&self, key_tag: u16, algorithm: Algorithm) -> Result<&DNSKEY, ValidationError> {
        self.dnskeys
            .get(&(key_tag, algorithm))
            .ok_or(ValidationError::DnsKeyNotFound { key_tag })
    }

    /// Verifies one RRSIG over an RRset with this zone's DNSKEYs: the
    /// signing key must be present, the validity window must contain the
    /// current time, and the signature must cover the canonical RRset.
    pub(crate) fn verify_rrsig(
        &self,
        rrsig: &Record,
        rrset: &[Record],
    ) -> Result<(), ValidationError> {
        let sig = match rrsig.data() {
            Some(RData::DNSSEC(DNSSECRData::SIG(sig))) => sig,
            _ => return Err(ValidationError::RRSigNotFound),
        };

        let dnskey = self.dnskey_for(sig.key_tag(), sig.algorithm())?;

        if !rrsig_currently_valid(sig) {
            return Err(ValidationError::RRSigExpired);
        }

        let first = rrset.first().ok_or(ValidationError::RecordNotFound)?;
        let tbs = hickory_proto::rr::dnssec::tbs::rrset_tbs_with_sig(
            first.name(),
            first.dns_class(),
            sig,
            rrset,
        )
        .and_then(|tbs| dnskey.verify(tbs.as_ref(), sig.sig()));
        tbs.map_err(|source| ValidationError::RRSetValidation {
                zone: self.zone.clone(),
                key_tag: sig.key_tag(),
                source,
            })
    }

    /// Verifies an RRset against a set of RRSIGs; one valid signature is
    /// sufficient. On total failure the first error is reported.
    pub(crate) fn verify_rrsigs(
        &self,
        rrsigs: &[Record],
        rrset: &[Record],
    ) -> Result<(), ValidationError> {
        if rrsigs.is_empty() {
            return Err(ValidationError::RRSigNotFound);
        }

        let mut first_err = None;
        for rrsig in rrsigs {
            match self.verify_rrsig(rrsig, rrset) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Err(ValidationError::RRSigNotFound),
        }
    }

    /// Checks a DS record against this zone's DNSKEYs: the digest in the
    /// DS must equal the digest of the matching key (RFC 4034 §5.1.4).
    pub(crate) fn verify_ds(&self, ds: &DS) -> Result<(), ValidationError> {
        let dnskey = self.dnskey_for(ds.key_tag(), ds.algorithm())?;
        let computed = compute_ds_digest(&self.zone, dnskey, ds.digest_type())?;

        if computed.as_slice() != ds.digest() {
            return Err(ValidationError::InvalidDs {
                received: hex::encode(ds.digest()),
                computed: hex::encode(&computed),
            });
        }

        Ok(())
    }

    /// Every DS the parent published must match one of this zone's keys.
    pub(crate) fn verify_ds_rrset(&self) -> Result<(), ValidationError> {
        for record in &self.ds_rrset {
            let ds = match record.data() {
                Some(RData::DNSSEC(DNSSECRData::DS(ds))) => ds,
                _ => continue,
            };
            self.verify_ds(ds)
                .map_err(|source| ValidationError::DsVerification {
                    key_tag: ds.key_tag(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}

/// Indexes a DNSKEY RRset by (key tag, algorithm). Key tags are 16-bit
/// fingerprints and may collide across algorithms; within one (tag,
/// algorithm) pair the last key wins.
fn dnskey_rrset_to_map(rrset: &[Record]) -> HashMap<(u16, Algorithm), DNSKEY> {
    let mut dnskeys = HashMap::with_capacity(rrset.len());
    for record in rrset {
        let dnskey = match record.data() {
            Some(RData::DNSSEC(DNSSECRData::DNSKEY(dnskey))) => dnskey,
            _ => continue,
        };
        let Ok(key_tag) = dnskey.calculate_key_tag() else {
            continue;
        };
        dnskeys.insert((key_tag, dnskey.algorithm()), dnskey.clone());
    }
    dnskeys
}

fn rrsig_currently_valid(sig: &SIG) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0) as u32;
    sig.sig_inception() <= now && now <= sig.sig_expiration()
}

fn dnskey_flags(dnskey: &DNSKEY) -> u16 {
    let mut flags = 0u16;
    if dnskey.zone_key() {
        flags |= 0b0000_0001_0000_0000;
    }
    if dnskey.secure_entry_point() {
        flags |= 0b0000_0000_0000_0001;
    }
    if dnskey.revoke() {
        flags |= 0b0000_0000_1000_0000;
    }
    flags
}

/// Digest of canonical wire-format owner name + DNSKEY RDATA, the value a
/// DS record carries for the key (RFC 4034 §5.1.4).
pub(crate) fn compute_ds_digest(
    owner: &Name,
    dnskey: &DNSKEY,
    digest_type: DigestType,
) -> Result<Vec<u8>, ValidationError> {
    let owner_wire = owner
        .to_lowercase()
        .to_bytes()
        .map_err(ValidationError::NameEncoding)?;

    let mut input = Vec::with_capacity(owner_wire.len() + 4 + dnskey.public_key().len());
    input.extend_from_slice(&owner_wire);
    input.extend_from_slice(&dnskey_flags(dnskey).to_be_bytes());
    input.push(3); // protocol is always 3
    input.push(dnskey.algorithm().into());
    input.extend_from_slice(dnskey.public_key());

    match digest_type {
        DigestType::SHA256 => Ok(Sha256::digest(&input).to_vec()),
        DigestType::SHA384 => Ok(Sha384::digest(&input).to_vec()),
        DigestType::SHA512 => Ok(Sha512::digest(&input).to_vec()),
        other => Err(ValidationError::UnknownDsDigestType(other)),
    }
}
