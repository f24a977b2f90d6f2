use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};

use super::chain::{new_delegation_chain, verify_chain};
use super::errors::ValidationError;
use super::root::TrustAnchor;
use super::rrset::fetch_rrset_with_rrsigs;
use crate::cache::{Cache, NoopCache};
use crate::exchange::{wrap_exchange_with_cache, Exchange, ExchangeError, UdpExchange};

/// Validator configuration. `Default` gives a working setup: UDP exchange
/// to 1.1.1.1:53, no response cache, the IANA KSK-2017 trust anchor, and
/// unsigned zones passed through.
pub struct Settings {
    /// When false, [`wrap_dns_exchange`] returns the exchange unchanged.
    pub enabled: bool,
    /// Outbound exchange used for the answer and all delegation queries.
    pub exchange: Option<Arc<dyn Exchange>>,
    /// Optional request/response cache wrapped around the exchange.
    pub cache: Option<Arc<dyn Cache>>,
    /// Trust anchor terminating every chain. Defaults to the IANA root
    /// KSK-2017.
    pub trust_anchor: Option<TrustAnchor>,
    /// Reject zones that publish no RRSIG instead of passing them
    /// through.
    pub strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            exchange: None,
            cache: None,
            trust_anchor: None,
            strict: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(anchor) = &self.trust_anchor {
            if anchor.digest.is_empty() {
                bail!("trust anchor digest cannot be empty");
            }
        }
        Ok(())
    }
}

/// Validates DNS answers against the DNSSEC chain of trust.
///
/// The validator holds no mutable state; it is safe to share behind an
/// [`Arc`] and call from many tasks concurrently. Each call builds its
/// delegation chain from scratch; the injected cache is the only
/// persistent element.
pub struct Validator {
    exchange: Arc<dyn Exchange>,
    trust_anchor: TrustAnchor,
    strict: bool,
}

impl Validator {
    pub fn new(settings: Settings) -> Self {
        let exchange = settings
            .exchange
            .unwrap_or_else(|| Arc::new(UdpExchange::default()));
        let cache = settings.cache.unwrap_or_else(|| Arc::new(NoopCache));
        Validator {
            exchange: wrap_exchange_with_cache(exchange, cache),
            trust_anchor: settings.trust_anchor.unwrap_or_default(),
            strict: settings.strict,
        }
    }

    /// IN-class convenience over [`Validator::fetch_and_validate`],
    /// discarding the RRset.
    pub async fn validate(&self, zone: &Name, qtype: RecordType) -> Result<(), ValidationError> {
        self.fetch_and_validate(zone, DNSClass::IN, qtype)
            .await
            .map(|_| ())
    }

    /// Fetches the RRset for (zone, class, type) and proves it authentic
    /// under the chain of trust, returning the validated records.
    ///
    /// Unsigned zones (no RRSIG in the answer) are returned without
    /// validation unless strict mode is on. Empty answers are returned
    /// empty: without NSEC support a negative response cannot be
    /// authenticated either way.
    pub async fn fetch_and_validate(
        &self,
        zone: &Name,
        class: DNSClass,
        qtype: RecordType,
    ) -> Result<Vec<Record>, ValidationError> {
        let mut zone = zone.clone();
        zone.set_fqdn(true);

        let (rrsigs, rrset) = fetch_rrset_with_rrsigs(&self.exchange, &zone, class, qtype)
            .await
            .map_err(|source| ValidationError::FetchAnswer {
                source: Box::new(source),
            })?;

        if rrset.is_empty() {
            return Ok(rrset);
        }

        if rrsigs.is_empty() {
            if self.strict {
                return Err(ValidationError::RRSigNotFound);
            }
            tracing::debug!("no RRSIG for {} {} {}, passing unsigned answer through", zone, class, qtype);
            return Ok(rrset);
        }

        let chain = new_delegation_chain(&self.exchange, &zone, class)
            .await
            .map_err(|source| ValidationError::DelegationChain {
                source: Box::new(source),
            })?;
        tracing::debug!("delegation chain for {} has {} zones", zone, chain.len());

        verify_chain(&chain, &rrsigs, &rrset, &self.trust_anchor)?;
        tracing::debug!("validated {} {} {} ({} records)", zone, class, qtype, rrset.len());

        Ok(rrset)
    }

    /// Validates every question in `request` and assembles a synthetic
    /// response holding only the validated answers. Authority and
    /// additional sections from upstream are not preserved.
    pub async fn exchange_and_validate(
        &self,
        request: &Message,
    ) -> Result<Message, ValidationError> {
        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);
        response.set_recursion_desired(request.recursion_desired());
        response.set_recursion_available(true);
        response.set_response_code(ResponseCode::NoError);

        for query in request.queries() {
            response.add_query(query.clone());
            let rrset = self
                .fetch_and_validate(query.name(), query.query_class(), query.query_type())
                .await?;
            for record in rrset {
                response.add_answer(record);
            }
        }

        Ok(response)
    }
}

struct ValidatingExchange {
    validator: Validator,
}

#[async_trait]
impl Exchange for ValidatingExchange {
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError> {
        self.validator
            .exchange_and_validate(&request)
            .await
            .map_err(|err| {
                tracing::warn!("DNSSEC validation failed: {err}");
                ExchangeError::Validation(Box::new(err))
            })
    }
}

/// Turns an unvalidated exchange into a validating one. With
/// `settings.enabled == false` the exchange is returned unchanged. A
/// validation failure surfaces as [`ExchangeError::Validation`]; servers
/// embedding the wrapper are expected to answer SERVFAIL downstream.
pub fn wrap_dns_exchange(exchange: Arc<dyn Exchange>, settings: Settings) -> Arc<dyn Exchange> {
    if !settings.enabled {
        return exchange;
    }

    let validator = Validator::new(Settings {
        exchange: Some(exchange),
        ..settings
    });
    Arc::new(ValidatingExchange { validator })
}
