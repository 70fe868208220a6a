//! Deterministic cache keys.

use std::fmt;

use nexus_common::{Endpoint, EndpointKey, EndpointRole};
use serde_json::{Map, Value};

/// Identity of a cached read: domain, tag, operation and the canonical
/// form of its parameters.
///
/// Two invocations with equal parameters produce equal keys regardless of
/// the order their object keys were written in. Infinite queries leave the
/// cursor parameter out so every page of a sequence shares one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// API domain of the endpoint.
    pub domain: String,
    /// Tag of the endpoint; invalidation targets it.
    pub tag: String,
    /// Operation name.
    pub operation: String,
    /// Canonical JSON of the parameters; empty when there are none.
    pub params: String,
}

impl CacheKey {
    /// Key for `params` as they go on the wire.
    ///
    /// `null` parameters and `null` list items are never sent, so they do not
    /// take part in the key either.
    pub fn new(key: &EndpointKey, params: &Value) -> Self {
        let params = match params {
            Value::Null => String::new(),
            Value::Object(map) => {
                let sent = sent_params(map);
                if sent.is_empty() {
                    String::new()
                } else {
                    canonicalize(&Value::Object(sent)).to_string()
                }
            }
            other => canonicalize(other).to_string(),
        };
        Self {
            domain: key.domain.clone(),
            tag: key.tag.clone(),
            operation: key.operation.clone(),
            params,
        }
    }

    /// Key for an endpoint invocation, without the cursor of infinite queries.
    pub fn for_endpoint(endpoint: &Endpoint, params: &Value) -> Self {
        match (&endpoint.cursor_param, params) {
            (Some(cursor), Value::Object(map)) if endpoint.role == EndpointRole::InfiniteQuery => {
                let mut stripped = map.clone();
                stripped.remove(cursor);
                Self::new(&endpoint.key, &Value::Object(stripped))
            }
            _ => Self::new(&endpoint.key, params),
        }
    }

    /// Whether the key belongs to `{domain, tag}`.
    pub fn has_tag(&self, domain: &str, tag: &str) -> bool {
        self.domain == domain && self.tag == tag
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.tag, self.operation)?;
        if !self.params.is_empty() {
            write!(f, " {}", self.params)?;
        }
        Ok(())
    }
}

fn sent_params(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            let value = match value {
                Value::Array(items) => {
                    Value::Array(items.iter().filter(|item| !item.is_null()).cloned().collect())
                }
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Rebuild a value with object keys in sorted order at every depth.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
