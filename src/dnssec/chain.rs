use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use super::errors::ValidationError;
use super::root::{verify_root_signed_zone, TrustAnchor};
use super::rrset::fetch_rrset_with_rrsigs;
use super::signed_zone::SignedZone;
use crate::exchange::Exchange;

/// The chain of trust from the queried zone to the root: index 0 is the
/// queried (child) zone, the last element is `.`.
pub(crate) type DelegationChain = Vec<SignedZone>;

/// Queries the records needed to validate `zone`: DNSKEY and DS RRsets
/// for the zone and every ancestor up to the root, all in flight
/// concurrently. Results are placed by chain index regardless of arrival
/// order; the first error to arrive wins and is returned once every
/// in-flight query has settled.
pub(crate) async fn new_delegation_chain(
    exchange: &Arc<dyn Exchange>,
    zone: &Name,
    class: DNSClass,
) -> Result<DelegationChain, ValidationError> {
    let labels = usize::from(zone.num_labels());

    let mut pending: FuturesUnordered<_> = (0..=labels)
        .map(|i| {
            // 'www.example.com.', 'example.com.', 'com.', '.'
            let ancestor = zone.trim_to(labels - i);
            async move {
                let result = query_delegation(exchange, &ancestor, class).await;
                let result = result.map_err(|source| ValidationError::Delegation {
                    zone: ancestor,
                    source: Box::new(source),
                });
                (i, result)
            }
        })
        .collect();

    let mut zones: Vec<Option<SignedZone>> = Vec::new();
    zones.resize_with(labels + 1, || None);
    let mut first_err = None;

    while let Some((i, result)) = pending.next().await {
        match result {
            Ok(signed_zone) => zones[i] = Some(signed_zone),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_err {
        return Err(err);
    }

    Ok(zones.into_iter().flatten().collect())
}

/// Fetches the DNSKEY and DS RRsets for one zone. The root zone has no
/// DS record, so only its DNSKEYs are queried. For every other zone both
/// fetches run concurrently and the first failure cancels its sibling.
async fn query_delegation(
    exchange: &Arc<dyn Exchange>,
    zone: &Name,
    class: DNSClass,
) -> Result<SignedZone, ValidationError> {
    if zone.is_root() {
        let (dnskey_rrsigs, dnskey_rrset) = query_dnskey(exchange, zone, class).await?;
        return Ok(SignedZone::new(
            zone.clone(),
            dnskey_rrsigs,
            dnskey_rrset,
            Vec::new(),
            Vec::new(),
        ));
    }

    let ((dnskey_rrsigs, dnskey_rrset), (ds_rrsigs, ds_rrset)) = tokio::try_join!(
        query_dnskey(exchange, zone, class),
        query_ds(exchange, zone, class),
    )?;

    Ok(SignedZone::new(
        zone.clone(),
        dnskey_rrsigs,
        dnskey_rrset,
        ds_rrsigs,
        ds_rrset,
    ))
}

async fn query_dnskey(
    exchange: &Arc<dyn Exchange>,
    zone: &Name,
    class: DNSClass,
) -> Result<(Vec<Record>, Vec<Record>), ValidationError> {
    query_signed_rrset(exchange, zone, class, RecordType::DNSKEY)
        .await
        .map_err(|source| ValidationError::FetchDnsKey {
            source: Box::new(source),
        })
}

async fn query_ds(
    exchange: &Arc<dyn Exchange>,
    zone: &Name,
    class: DNSClass,
) -> Result<(Vec<Record>, Vec<Record>), ValidationError> {
    query_signed_rrset(exchange, zone, class, RecordType::DS)
        .await
        .map_err(|source| ValidationError::FetchDs {
            source: Box::new(source),
        })
}

async fn query_signed_rrset(
    exchange: &Arc<dyn Exchange>,
    zone: &Name,
    class: DNSClass,
    rtype: RecordType,
) -> Result<(Vec<Record>, Vec<Record>), ValidationError> {
    let (rrsigs, rrset) = fetch_rrset_with_rrsigs(exchange, zone, class, rtype).await?;
    if rrset.is_empty() {
        return Err(ValidationError::RecordNotFound);
    }
    if rrsigs.is_empty() {
        return Err(ValidationError::RRSigNotFound);
    }
    Ok((rrsigs, rrset))
}

/// Walks the chain from child to root verifying every link:
///
/// 1. the answer RRSIG under the child zone's DNSKEYs,
/// 2. each zone's DNSKEY RRset under its own keys (the KSK self-signature),
/// 3. each zone's DS RRset under its parent's DNSKEYs,
/// 4. each DS digest against the zone's own keys,
///
/// terminating with the trust-anchor check on the root DNSKEY set. Any
/// failure aborts the whole chain; partial trust is never reported.
pub(crate) fn verify_chain(
    chain: &[SignedZone],
    answer_rrsigs: &[Record],
    answer_rrset: &[Record],
    anchor: &TrustAnchor,
) -> Result<(), ValidationError> {
    if answer_rrsigs.is_empty() {
        return Err(ValidationError::RRSigNotFound);
    }

    let child = match chain.first() {
        Some(signed_zone) => signed_zone,
        None => return Err(ValidationError::RecordNotFound),
    };

    child
        .verify_rrsigs(answer_rrsigs, answer_rrset)
        .map_err(|source| ValidationError::ZoneVerification {
            zone: child.zone.clone(),
            key_tag: leading_key_tag(answer_rrsigs),
            source: Box::new(source),
        })?;

    for (i, signed_zone) in chain.iter().enumerate() {
        signed_zone
            .verify_rrsigs(&signed_zone.dnskey_rrsigs, &signed_zone.dnskey_rrset)
            .map_err(|source| ValidationError::ZoneVerification {
                zone: signed_zone.zone.clone(),
                key_tag: leading_key_tag(&signed_zone.dnskey_rrsigs),
                source: Box::new(source),
            })?;

        if signed_zone.is_root() {
            verify_root_signed_zone(signed_zone, anchor).map_err(|source| {
                ValidationError::RootAnchor {
                    source: Box::new(source),
                }
            })?;
            break;
        }

        // The parent signs the child's DS RRset. The chain always ends in
        // the root zone, so every non-root element has a successor.
        let parent = &chain[i + 1];
        parent
            .verify_rrsigs(&signed_zone.ds_rrsigs, &signed_zone.ds_rrset)
            .map_err(|source| ValidationError::ZoneVerification {
                zone: signed_zone.zone.clone(),
                key_tag: leading_key_tag(&signed_zone.ds_rrsigs),
                source: Box::new(source),
            })?;

        signed_zone.verify_ds_rrset()?;
    }

    Ok(())
}

fn leading_key_tag(rrsigs: &[Record]) -> u16 {
    rrsigs
        .iter()
        .find_map(|record| match record.data() {
            Some(RData::DNSSEC(DNSSECRData::SIG(sig))) => Some(sig.key_tag()),
            _ => None,
        })
        .unwrap_or(0)
}
