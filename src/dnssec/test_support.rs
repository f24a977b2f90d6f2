//! Fixture machinery shared by the DNSSEC test modules: deterministic
//! record builders, an in-memory exchange serving canned responses, and a
//! fully signed zone hierarchy backed by freshly generated ECDSA P-256
//! keys so chain verification exercises real signatures.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS, SIG};
use hickory_proto::rr::dnssec::{tbs, Algorithm, DigestType};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};

use super::root::TrustAnchor;
use super::signed_zone::compute_ds_digest;
use crate::exchange::{Exchange, ExchangeError};

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32
}

pub(crate) fn a_record(name: &Name, last_octet: u8) -> Record {
    Record::from_rdata(
        name.clone(),
        300,
        RData::A(A(Ipv4Addr::new(192, 0, 2, last_octet))),
    )
}

pub(crate) fn dnskey_record(zone: &Name, dnskey: &DNSKEY) -> Record {
    Record::from_rdata(
        zone.clone(),
        3600,
        RData::DNSSEC(DNSSECRData::DNSKEY(dnskey.clone())),
    )
}

/// An RRSIG whose signature bytes are garbage; useful wherever the test
/// must fail after the key lookup or validity checks.
pub(crate) fn rrsig_record(
    owner: &Name,
    covered: RecordType,
    signer: &Name,
    key_tag: u16,
) -> Record {
    let now = unix_now();
    rrsig_record_with_window(owner, covered, signer, key_tag, now - 3600, now + 3600)
}

pub(crate) fn rrsig_record_with_window(
    owner: &Name,
    covered: RecordType,
    signer: &Name,
    key_tag: u16,
    inception: u32,
    expiration: u32,
) -> Record {
    let sig = SIG::new(
        covered,
        Algorithm::ECDSAP256SHA256,
        owner.num_labels(),
        300,
        expiration,
        inception,
        key_tag,
        signer.clone(),
        vec![0xde, 0xad, 0xbe, 0xef],
    );
    Record::from_rdata(owner.clone(), 300, RData::DNSSEC(DNSSECRData::SIG(sig)))
}

/// A freshly generated ECDSA P-256 zone key that can sign RRsets the
/// validator will accept.
pub(crate) struct TestKey {
    keypair: EcdsaKeyPair,
    rng: SystemRandom,
    pub(crate) dnskey: DNSKEY,
    pub(crate) key_tag: u16,
}

impl TestKey {
    pub(crate) fn generate() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let keypair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();

        // DNSKEY public key format for P-256 is X || Y without the SEC1
        // uncompressed-point prefix byte.
        let mut public_key = keypair.public_key().as_ref().to_vec();
        public_key.remove(0);

        let dnskey = DNSKEY::new(true, true, false, Algorithm::ECDSAP256SHA256, public_key);
        let key_tag = dnskey.calculate_key_tag().unwrap();

        TestKey {
            keypair,
            rng,
            dnskey,
            key_tag,
        }
    }

    pub(crate) fn sign_rrset(&self, rrset: &[Record], signer: &Name) -> Record {
        let now = unix_now();
        self.sign_rrset_with_window(rrset, signer, now - 3600, now + 3600)
    }

    pub(crate) fn sign_rrset_with_window(
        &self,
        rrset: &[Record],
        signer: &Name,
        inception: u32,
        expiration: u32,
    ) -> Record {
        let first = rrset.first().expect("rrset to sign is not empty");
        let template = SIG::new(
            first.record_type(),
            Algorithm::ECDSAP256SHA256,
            first.name().num_labels(),
            first.ttl(),
            expiration,
            inception,
            self.key_tag,
            signer.clone(),
            Vec::new(),
        );

        let to_sign =
            tbs::rrset_tbs_with_sig(first.name(), first.dns_class(), &template, rrset).unwrap();
        let signature = self
            .keypair
            .sign(&self.rng, to_sign.as_ref())
            .unwrap()
            .as_ref()
            .to_vec();

        let sig = SIG::new(
            first.record_type(),
            Algorithm::ECDSAP256SHA256,
            first.name().num_labels(),
            first.ttl(),
            expiration,
            inception,
            self.key_tag,
            signer.clone(),
            signature,
        );
        Record::from_rdata(
            first.name().clone(),
            first.ttl(),
            RData::DNSSEC(DNSSECRData::SIG(sig)),
        )
    }
}

/// In-memory exchange answering from a canned (name, type) -> records
/// map. Unknown questions get an empty NOERROR answer. Calls are counted
/// so tests can assert how many queries a code path issued.
pub(crate) struct FixtureExchange {
    answers: Mutex<HashMap<(Name, RecordType), Vec<Record>>>,
    servfail: bool,
    calls: Arc<AtomicUsize>,
}

impl FixtureExchange {
    pub(crate) fn new() -> Self {
        FixtureExchange {
            answers: Mutex::new(HashMap::new()),
            servfail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An exchange that answers SERVFAIL to everything, the way a
    /// validating upstream reports its own DNSSEC failures.
    pub(crate) fn servfail() -> Arc<dyn Exchange> {
        Arc::new(FixtureExchange {
            answers: Mutex::new(HashMap::new()),
            servfail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn answer(&self, name: &Name, rtype: RecordType, records: Vec<Record>) {
        self.answers
            .lock()
            .unwrap()
            .insert((name.to_lowercase(), rtype), records);
    }

    pub(crate) fn remove(&self, name: &Name, rtype: RecordType) {
        self.answers
            .lock()
            .unwrap()
            .remove(&(name.to_lowercase(), rtype));
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Exchange for FixtureExchange {
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);

        if self.servfail {
            response.set_response_code(ResponseCode::ServFail);
            return Ok(response);
        }

        if let Some(query) = request.queries().first() {
            response.add_query(query.clone());
            let key = (query.name().to_lowercase(), query.query_type());
            if let Some(records) = self.answers.lock().unwrap().get(&key) {
                for record in records {
                    response.add_answer(record.clone());
                }
            }
        }

        Ok(response)
    }
}

impl From<&SignedHierarchy> for FixtureExchange {
    fn from(hierarchy: &SignedHierarchy) -> Self {
        let fixture = FixtureExchange::new();
        hierarchy.install_responses(&fixture);
        fixture
    }
}

struct HierarchyZone {
    name: Name,
    key: TestKey,
}

/// A chain of signed fixture zones, child first, with the root appended
/// automatically. Every zone's DNSKEY set is self-signed, every non-root
/// zone's DS is derived from its actual key and signed by the parent, so
/// the whole chain verifies against [`SignedHierarchy::trust_anchor`].
pub(crate) struct SignedHierarchy {
    zones: Vec<HierarchyZone>,
}

impl SignedHierarchy {
    pub(crate) fn for_zones(names: &[&str]) -> Self {
        let mut zones: Vec<HierarchyZone> = names
            .iter()
            .map(|name| HierarchyZone {
                name: Name::from_str(name).unwrap(),
                key: TestKey::generate(),
            })
            .collect();
        zones.push(HierarchyZone {
            name: Name::root(),
            key: TestKey::generate(),
        });
        SignedHierarchy { zones }
    }

    fn zone(&self, name: &Name) -> &HierarchyZone {
        self.zones
            .iter()
            .find(|zone| &zone.name == name)
            .expect("zone is part of the hierarchy")
    }

    fn dnskey_answer(&self, zone: &HierarchyZone) -> Vec<Record> {
        let rrset = vec![dnskey_record(&zone.name, &zone.key.dnskey)];
        let rrsig = zone.key.sign_rrset(&rrset, &zone.name);
        let mut answer = rrset;
        answer.push(rrsig);
        answer
    }

    fn ds_answer(&self, index: usize) -> Vec<Record> {
        let zone = &self.zones[index];
        let parent = &self.zones[index + 1];
        let digest =
            compute_ds_digest(&zone.name, &zone.key.dnskey, DigestType::SHA256).unwrap();
        self.ds_answer_with_digest(zone, parent, digest)
    }

    fn tampered_ds_answer(&self, index: usize) -> Vec<Record> {
        let zone = &self.zones[index];
        let parent = &self.zones[index + 1];
        let mut digest =
            compute_ds_digest(&zone.name, &zone.key.dnskey, DigestType::SHA256).unwrap();
        digest[0] ^= 0xff;
        self.ds_answer_with_digest(zone, parent, digest)
    }

    fn ds_answer_with_digest(
        &self,
        zone: &HierarchyZone,
        parent: &HierarchyZone,
        digest: Vec<u8>,
    ) -> Vec<Record> {
        let ds = DS::new(
            zone.key.key_tag,
            Algorithm::ECDSAP256SHA256,
            DigestType::SHA256,
            digest,
        );
        let rrset = vec![Record::from_rdata(
            zone.name.clone(),
            3600,
            RData::DNSSEC(DNSSECRData::DS(ds)),
        )];
        let rrsig = parent.key.sign_rrset(&rrset, &parent.name);
        let mut answer = rrset;
        answer.push(rrsig);
        answer
    }

    /// The A RRset for `zone` with its valid RRSIG, as
    /// (rrsigs, rrset).
    pub(crate) fn signed_answer(&self, name: &Name) -> (Vec<Record>, Vec<Record>) {
        let zone = self.zone(name);
        let rrset = vec![a_record(&zone.name, 1)];
        let rrsig = zone.key.sign_rrset(&rrset, &zone.name);
        (vec![rrsig], rrset)
    }

    fn install_responses(&self, fixture: &FixtureExchange) {
        for (index, zone) in self.zones.iter().enumerate() {
            fixture.answer(&zone.name, RecordType::DNSKEY, self.dnskey_answer(zone));
            if !zone.name.is_root() {
                fixture.answer(&zone.name, RecordType::DS, self.ds_answer(index));
            }
        }

        // The child zone also serves the signed answer RRset.
        let child = &self.zones[0];
        let (rrsigs, rrset) = self.signed_answer(&child.name);
        let mut answer = rrset;
        answer.extend(rrsigs);
        fixture.answer(&child.name, RecordType::A, answer);
    }

    pub(crate) fn exchange(&self) -> Arc<dyn Exchange> {
        Arc::new(FixtureExchange::from(self))
    }

    /// Exchange with the (zone, type) response removed, so the fetch for
    /// it comes back empty.
    pub(crate) fn exchange_without(&self, rtype: RecordType, zone: &str) -> Arc<dyn Exchange> {
        let fixture = FixtureExchange::from(self);
        fixture.remove(&Name::from_str(zone).unwrap(), rtype);
        Arc::new(fixture)
    }

    /// Exchange whose DS digest for `zone` is flipped but still signed by
    /// the parent, so only the digest comparison can catch it.
    pub(crate) fn exchange_with_tampered_ds(&self, zone: &str) -> Arc<dyn Exchange> {
        let fixture = FixtureExchange::from(self);
        let name = Name::from_str(zone).unwrap();
        let index = self
            .zones
            .iter()
            .position(|candidate| candidate.name == name)
            .expect("zone is part of the hierarchy");
        fixture.answer(&name, RecordType::DS, self.tampered_ds_answer(index));
        Arc::new(fixture)
    }

    /// Exchange whose answer RRSIG for `zone` expired an hour ago.
    pub(crate) fn exchange_with_expired_answer(&self, zone: &str) -> Arc<dyn Exchange> {
        let fixture = FixtureExchange::from(self);
        let name = Name::from_str(zone).unwrap();
        let hierarchy_zone = self.zone(&name);

        let rrset = vec![a_record(&name, 1)];
        let now = unix_now();
        let rrsig =
            hierarchy_zone
                .key
                .sign_rrset_with_window(&rrset, &name, now - 7200, now - 3600);
        let mut answer = rrset;
        answer.push(rrsig);
        fixture.answer(&name, RecordType::A, answer);
        Arc::new(fixture)
    }

    /// Trust anchor matching the fixture root key, standing in for the
    /// IANA anchor.
    pub(crate) fn trust_anchor(&self) -> TrustAnchor {
        let root = &self.zones[self.zones.len() - 1];
        TrustAnchor {
            key_tag: root.key.key_tag,
            algorithm: Algorithm::ECDSAP256SHA256,
            digest_type: DigestType::SHA256,
            digest: compute_ds_digest(&root.name, &root.key.dnskey, DigestType::SHA256).unwrap(),
        }
    }
}
