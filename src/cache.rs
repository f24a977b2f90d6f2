use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hickory_proto::op::Message;
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};

/// A request-keyed response cache consumed by the exchange wrapper.
///
/// `get` returning `None` means a miss. Implementations own their
/// thread-safety; both methods are called concurrently from many tasks.
pub trait Cache: Send + Sync {
    fn get(&self, request: &Message) -> Option<Message>;
    fn add(&self, request: &Message, response: &Message);
}

/// Cache that never stores anything. The default for the validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _request: &Message) -> Option<Message> {
        None
    }

    fn add(&self, _request: &Message, _response: &Message) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: Name,
    class: DNSClass,
    rtype: RecordType,
    dnssec_ok: bool,
}

fn cache_key(request: &Message) -> Option<CacheKey> {
    let query = request.queries().first()?;
    let dnssec_ok = match request.extensions() {
        Some(edns) => edns.dnssec_ok(),
        None => false,
    };
    Some(CacheKey {
        name: query.name().to_lowercase(),
        class: query.query_class(),
        rtype: query.query_type(),
        dnssec_ok,
    })
}

#[derive(Debug)]
struct CachedResponse {
    response: Message,
    expires_at: Instant,
}

#[derive(Debug)]
struct ResponseCacheInner {
    entries: HashMap<CacheKey, CachedResponse>,
    order: VecDeque<CacheKey>,
    max_entries: usize,
}

/// Bounded in-memory response cache.
///
/// Entries are keyed by question (name, class, type) plus the DO bit and
/// live for the minimum TTL of the response's answers. Insertion order is
/// evicted first once the cache is full. Responses without answers are
/// not cached.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<ResponseCacheInner>,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        ResponseCache {
            inner: Mutex::new(ResponseCacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_entries: max_entries.max(1),
            }),
        }
    }
}

impl Cache for ResponseCache {
    fn get(&self, request: &Message) -> Option<Message> {
        let key = cache_key(request)?;
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.entries.get(&key) {
            None => return None,
            Some(entry) => entry.expires_at <= Instant::now(),
        };
        if expired {
            inner.entries.remove(&key);
            return None;
        }

        let mut response = inner.entries.get(&key)?.response.clone();
        response.set_id(request.id());
        Some(response)
    }

    fn add(&self, request: &Message, response: &Message) {
        let Some(key) = cache_key(request) else {
            return;
        };
        let Some(ttl) = response.answers().iter().map(Record::ttl).min() else {
            return;
        };
        if ttl == 0 {
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.entries.contains_key(&key) {
            while inner.entries.len() >= inner.max_entries {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
            }
            inner.order.push_back(key.clone());
        }
        inner.entries.insert(
            key,
            CachedResponse {
                response: response.clone(),
                expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
            },
        );
    }
}
