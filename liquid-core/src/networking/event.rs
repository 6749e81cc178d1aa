//! Queued events and the request batches built from them
//!
//! An [`Event`] is one payload addressed to an endpoint with an HTTP verb.
//! During a flush cycle, events taken from the head of the queue are grouped
//! into [`RouteBatch`]es, one per `(endpoint, method)` pair, and each batch is
//! sent as a single request whose body is a JSON array of the payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Structured event payload: an insertion-ordered map of JSON values
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// HTTP verbs accepted by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

/// One queued request payload
///
/// Fields are fixed at construction; the queue only ever clones or drops events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    endpoint: String,
    method: HttpMethod,
    payload: Payload,
    enqueued_at: DateTime<Utc>,
}

impl Event {
    pub fn new(payload: Payload, endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            method,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    /// Unique id used to commit exactly the events that were sent
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

/// Events sharing one `(endpoint, method)` pair, sent as a single request
#[derive(Debug, Clone)]
pub struct RouteBatch {
    pub endpoint: String,
    pub method: HttpMethod,
    pub events: Vec<Event>,
}

impl RouteBatch {
    /// Request body: JSON array of the payloads in queue order
    pub fn body(&self) -> Result<Vec<u8>> {
        let payloads: Vec<&Payload> = self.events.iter().map(Event::payload).collect();
        Ok(serde_json::to_vec(&payloads)?)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.events.iter().map(Event::id).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Partition events by route, ordered by each route's first appearance
///
/// Relative order inside every batch matches the input order.
pub fn group_by_route(events: Vec<Event>) -> Vec<RouteBatch> {
    let mut batches: Vec<RouteBatch> = Vec::new();

    for event in events {
        match batches
            .iter_mut()
            .find(|b| b.method == event.method && b.endpoint == event.endpoint)
        {
            Some(batch) => batch.events.push(event),
            None => batches.push(RouteBatch {
                endpoint: event.endpoint.clone(),
                method: event.method,
                events: vec![event],
            }),
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(name: &str) -> Payload {
        let mut p = Payload::new();
        p.insert("name".to_string(), json!(name));
        p
    }

    #[test]
    fn test_parse_http_method() {
        assert_eq!("POST".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!(matches!(
            "FETCH".parse::<HttpMethod>(),
            Err(Error::InvalidMethod(m)) if m == "FETCH"
        ));
        assert!("".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_method_serializes_uppercase() {
        assert_eq!(serde_json::to_value(HttpMethod::Delete).unwrap(), json!("DELETE"));
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
    }

    #[test]
    fn test_events_get_distinct_ids() {
        let a = Event::new(payload("a"), "events", HttpMethod::Post);
        let b = Event::new(payload("a"), "events", HttpMethod::Post);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.endpoint(), "events");
        assert_eq!(a.method(), HttpMethod::Post);
    }

    #[test]
    fn test_group_by_route_keeps_order() {
        let events = vec![
            Event::new(payload("a"), "events", HttpMethod::Post),
            Event::new(payload("b"), "users/1", HttpMethod::Put),
            Event::new(payload("c"), "events", HttpMethod::Post),
            Event::new(payload("d"), "events", HttpMethod::Put),
        ];

        let batches = group_by_route(events);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].endpoint, "events");
        assert_eq!(batches[0].method, HttpMethod::Post);
        let names: Vec<_> = batches[0]
            .events
            .iter()
            .map(|e| e.payload()["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("c")]);
        assert_eq!(batches[1].endpoint, "users/1");
        assert_eq!(batches[2].method, HttpMethod::Put);
        assert_eq!(batches[2].endpoint, "events");
    }

    #[test]
    fn test_batch_body_is_array_of_payloads() {
        let mut nested = payload("a");
        nested.insert("props".to_string(), json!({"z": 1, "a": [true, null, 2.5]}));
        let batch = RouteBatch {
            endpoint: "events".to_string(),
            method: HttpMethod::Post,
            events: vec![
                Event::new(nested, "events", HttpMethod::Post),
                Event::new(payload("b"), "events", HttpMethod::Post),
            ],
        };

        let body: serde_json::Value = serde_json::from_slice(&batch.body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!([
                {"name": "a", "props": {"z": 1, "a": [true, null, 2.5]}},
                {"name": "b"}
            ])
        );
    }
}
