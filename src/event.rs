//! Event records decoded from the datagram event stream

use crate::constants::ATTRIBUTE_SEPARATOR;
use crate::names::EventName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// One event raised by OpenSIPS.
///
/// On the wire an event is a name line followed by `key::value` attribute
/// lines and bare value lines, closed by an empty line:
///
/// ```text
/// E_ACC_CDR
/// method::INVITE
/// sip_code::200
///
/// ```
///
/// Attributes are keyed (last write wins); bare values keep arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatagramEvent {
    name: String,
    attributes: HashMap<String, String>,
    values: Vec<String>,
    origin: Option<SocketAddr>,
}

impl DatagramEvent {
    /// Create an empty event with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
            values: Vec::new(),
            origin: None,
        }
    }

    /// Event name, the first line of the frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed name, if this is one of the well-known OpenSIPS events.
    pub fn event_name(&self) -> Option<EventName> {
        EventName::from_wire(&self.name)
    }

    /// Check whether this event carries the given well-known name.
    pub fn is(&self, name: EventName) -> bool {
        self.name == name.as_str()
    }

    /// Look up an attribute by key (case-sensitive).
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|s| s.as_str())
    }

    /// All attributes as a map.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Bare values in arrival order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Address of the datagram that completed this event.
    pub fn origin(&self) -> Option<SocketAddr> {
        self.origin
    }

    /// Set or overwrite an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .insert(key.into(), value.into());
    }

    /// Append a bare value.
    pub fn push_value(&mut self, value: impl Into<String>) {
        self.values
            .push(value.into());
    }

    pub(crate) fn set_origin(&mut self, origin: Option<SocketAddr>) {
        self.origin = origin;
    }

    /// Builder-style variant of [`set_origin`](Self::set_origin) for tests and forwarding.
    pub fn with_origin(mut self, origin: SocketAddr) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Serialize to the datagram wire format.
    ///
    /// Attributes come first, sorted by key for deterministic output, then the
    /// bare values in order, then the terminating empty line. Feeding the
    /// result to an [`EventFramer`](crate::EventFramer) yields an equal event
    /// (minus `origin`) as long as no value is empty or contains `::`.
    pub fn to_wire_format(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push_str(&self.name);
        out.push('\n');

        let mut sorted: Vec<_> = self
            .attributes
            .iter()
            .collect();
        sorted.sort_by_key(|(k, _)| k.as_str());
        for (key, value) in sorted {
            out.push_str(key);
            out.push_str(ATTRIBUTE_SEPARATOR);
            out.push_str(value);
            out.push('\n');
        }

        for value in &self.values {
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}
