use std::sync::Arc;

use hickory_proto::op::{Edns, Message, Query, ResponseCode};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use super::errors::ValidationError;
use crate::exchange::Exchange;

// EDNS0 payload size advertised on every DNSSEC-aware query (RFC 4035).
pub(crate) const EDNS_UDP_PAYLOAD_SIZE: u16 = 4096;

/// Builds the query the validator sends upstream: one question, recursion
/// desired, and an OPT pseudo-record with the DO bit so the upstream
/// includes RRSIGs in its answer.
pub(crate) fn new_dnssec_request(name: &Name, class: DNSClass, qtype: RecordType) -> Message {
    let mut query = Query::query(name.to_lowercase(), qtype);
    query.set_query_class(class);

    let mut request = Message::new();
    request.add_query(query);
    request.set_recursion_desired(true);

    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_UDP_PAYLOAD_SIZE);
    edns.set_dnssec_ok(true);
    edns.set_version(0);
    request.set_edns(edns);

    request
}

/// Fetches the RRset for (name, class, type) and splits the answer
/// section into its RRSIGs and the records they cover.
///
/// An upstream SERVFAIL is reported as a validation failure rather than a
/// transport error: validating upstreams answer SERVFAIL when their own
/// DNSSEC check rejected the zone. An empty RRset is returned empty, not
/// as an error.
pub(crate) async fn fetch_rrset_with_rrsigs(
    exchange: &Arc<dyn Exchange>,
    name: &Name,
    class: DNSClass,
    qtype: RecordType,
) -> Result<(Vec<Record>, Vec<Record>), ValidationError> {
    let request = new_dnssec_request(name, class, qtype);
    let response = exchange.exchange(request).await?;

    if response.response_code() == ResponseCode::ServFail {
        return Err(ValidationError::UpstreamValidationFailed {
            zone: name.clone(),
            class,
            rtype: qtype,
        });
    }

    Ok(split_rrsigs_and_rrset(response))
}

/// Splits an answer section into (RRSIGs, covered records), both in
/// arrival order. All RRSIGs are kept: zones signed with more than one
/// algorithm return one signature per algorithm and any single valid one
/// is sufficient.
pub(crate) fn split_rrsigs_and_rrset(mut response: Message) -> (Vec<Record>, Vec<Record>) {
    let answers = response.take_answers();
    let mut rrsigs = Vec::new();
    let mut rrset = Vec::with_capacity(answers.len());

    for record in answers {
        match record.data() {
            Some(RData::DNSSEC(DNSSECRData::SIG(_))) => rrsigs.push(record),
            _ => rrset.push(record),
        }
    }

    (rrsigs, rrset)
}
