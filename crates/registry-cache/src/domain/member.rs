//! # Member Records
//!
//! A cached registry member: identity fields from the registry and resolver
//! events, a whitelisted attribute bag fed by `TextChanged`, and three
//! key-rotation lists.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute names accepted from `TextChanged` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKey {
    /// Platform-wide company identifier.
    #[serde(rename = "staticId")]
    StaticId,
    /// X.500 distinguished name (JSON object).
    #[serde(rename = "x500Name")]
    X500Name,
    /// Member flag.
    #[serde(rename = "isMember")]
    IsMember,
    /// Financial institution flag.
    #[serde(rename = "isFinancialInstitution")]
    IsFinancialInstitution,
    /// Fund management flag.
    #[serde(rename = "isFMS")]
    IsFms,
    /// Messaging node id on the platform network.
    #[serde(rename = "komgoMnid")]
    KomgoMnid,
    /// Messaging node id on the partner network.
    #[serde(rename = "vaktMnid")]
    VaktMnid,
    /// Company id on the partner network.
    #[serde(rename = "vaktStaticId")]
    VaktStaticId,
    /// SWIFT key flag.
    #[serde(rename = "hasSWIFTKey")]
    HasSwiftKey,
    /// Member type.
    #[serde(rename = "memberType")]
    MemberType,
    /// Subscribed products (JSON array).
    #[serde(rename = "komgoProducts")]
    KomgoProducts,
    /// Node keys, always kept as the raw string.
    #[serde(rename = "nodeKeys")]
    NodeKeys,
    /// Registered company address.
    #[serde(rename = "companyAddress")]
    CompanyAddress,
}

impl AttributeKey {
    /// Every whitelisted key.
    pub const ALL: [AttributeKey; 13] = [
        AttributeKey::StaticId,
        AttributeKey::X500Name,
        AttributeKey::IsMember,
        AttributeKey::IsFinancialInstitution,
        AttributeKey::IsFms,
        AttributeKey::KomgoMnid,
        AttributeKey::VaktMnid,
        AttributeKey::VaktStaticId,
        AttributeKey::HasSwiftKey,
        AttributeKey::MemberType,
        AttributeKey::KomgoProducts,
        AttributeKey::NodeKeys,
        AttributeKey::CompanyAddress,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKey::StaticId => "staticId",
            AttributeKey::X500Name => "x500Name",
            AttributeKey::IsMember => "isMember",
            AttributeKey::IsFinancialInstitution => "isFinancialInstitution",
            AttributeKey::IsFms => "isFMS",
            AttributeKey::KomgoMnid => "komgoMnid",
            AttributeKey::VaktMnid => "vaktMnid",
            AttributeKey::VaktStaticId => "vaktStaticId",
            AttributeKey::HasSwiftKey => "hasSWIFTKey",
            AttributeKey::MemberType => "memberType",
            AttributeKey::KomgoProducts => "komgoProducts",
            AttributeKey::NodeKeys => "nodeKeys",
            AttributeKey::CompanyAddress => "companyAddress",
        }
    }

    /// Look up a key by wire name. Case sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    /// Values for this key are stored verbatim, never JSON-parsed.
    pub fn is_raw(&self) -> bool {
        matches!(self, AttributeKey::NodeKeys)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value. `TextChanged` values are JSON-parsed when they parse,
/// otherwise kept as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(serde_json::Number),
    /// Plain text.
    Text(String),
    /// Any other JSON (objects, arrays, null).
    Json(Value),
}

impl AttributeValue {
    /// Interpret a raw `TextChanged` value.
    pub fn parse_text(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_json(value),
            Err(_) => AttributeValue::Text(raw.to_string()),
        }
    }

    /// Wrap a JSON value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => AttributeValue::Number(n),
            Value::String(s) => AttributeValue::Text(s),
            other => AttributeValue::Json(other),
        }
    }

    /// JSON form of the value.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Number(n) => Value::Number(n.clone()),
            AttributeValue::Text(s) => Value::String(s.clone()),
            AttributeValue::Json(v) => v.clone(),
        }
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// The three key-rotation lists of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyList {
    /// Ethereum signing keys.
    EthPubKeys,
    /// RSA messaging keys on the platform network.
    KomgoMessagingPubKeys,
    /// RSA messaging keys on the partner network.
    VaktMessagingPubKeys,
}

impl KeyList {
    /// Record field name of the list.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyList::EthPubKeys => "ethPubKeys",
            KeyList::KomgoMessagingPubKeys => "komgoMessagingPubKeys",
            KeyList::VaktMessagingPubKeys => "vaktMessagingPubKeys",
        }
    }
}

/// One entry in a key-rotation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    /// Key material (hex for eth keys, JWK JSON for messaging keys).
    pub key: String,
    /// UTC seconds at which the entry was applied.
    pub eff_date: i64,
    /// Termination date carried by the event.
    pub term_date: u64,
    /// Latest key in the list.
    pub current: bool,
    /// Revoked by a later event.
    pub revoked: bool,
    /// Address derived from the key (eth keys only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl KeyEntry {
    /// A fresh, current, unrevoked entry.
    pub fn new(key: impl Into<String>, eff_date: i64, term_date: u64) -> Self {
        Self {
            key: key.into(),
            eff_date,
            term_date,
            current: true,
            revoked: false,
            address: None,
        }
    }

    /// Attach a derived address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// A cached registry member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// keccak256(parent_node ++ label). Primary key.
    pub node: String,
    /// Parent node hash.
    pub parent_node: String,
    /// Label hash.
    pub label: String,
    /// Owner address.
    pub owner: String,
    /// Resolver contract address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,
    /// Address record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// ABI record (decoded text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,
    /// Reverse resolution node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_node: Option<String>,
    /// Ethereum keys.
    #[serde(default)]
    pub eth_pub_keys: Vec<KeyEntry>,
    /// Platform messaging keys.
    #[serde(default)]
    pub komgo_messaging_pub_keys: Vec<KeyEntry>,
    /// Partner messaging keys.
    #[serde(default)]
    pub vakt_messaging_pub_keys: Vec<KeyEntry>,
    /// Whitelisted text attributes.
    #[serde(flatten)]
    pub attributes: BTreeMap<AttributeKey, AttributeValue>,
}

impl MemberRecord {
    /// New member with only identity fields set.
    pub fn new(
        node: impl Into<String>,
        parent_node: impl Into<String>,
        label: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            parent_node: parent_node.into(),
            label: label.into(),
            owner: owner.into(),
            resolver: None,
            address: None,
            abi: None,
            reverse_node: None,
            eth_pub_keys: Vec::new(),
            komgo_messaging_pub_keys: Vec::new(),
            vakt_messaging_pub_keys: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attribute value by key.
    pub fn attribute(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(&key)
    }

    /// `staticId` attribute as text.
    pub fn static_id(&self) -> Option<&str> {
        self.attribute(AttributeKey::StaticId)
            .and_then(AttributeValue::as_text)
    }

    /// Entries of a key list.
    pub fn keys(&self, list: KeyList) -> &[KeyEntry] {
        match list {
            KeyList::EthPubKeys => &self.eth_pub_keys,
            KeyList::KomgoMessagingPubKeys => &self.komgo_messaging_pub_keys,
            KeyList::VaktMessagingPubKeys => &self.vakt_messaging_pub_keys,
        }
    }

    /// Mutable entries of a key list.
    pub fn keys_mut(&mut self, list: KeyList) -> &mut Vec<KeyEntry> {
        match list {
            KeyList::EthPubKeys => &mut self.eth_pub_keys,
            KeyList::KomgoMessagingPubKeys => &mut self.komgo_messaging_pub_keys,
            KeyList::VaktMessagingPubKeys => &mut self.vakt_messaging_pub_keys,
        }
    }

    /// Append `entry` as the new current key, clearing the previous current
    /// flag first.
    pub fn push_current_key(&mut self, list: KeyList, mut entry: KeyEntry) {
        let entries = self.keys_mut(list);
        for existing in entries.iter_mut().filter(|e| e.current) {
            existing.current = false;
        }
        entry.current = true;
        entries.push(entry);
    }

    /// Mark the entry at `index` revoked. Returns false when out of range.
    pub fn revoke_key(&mut self, list: KeyList, index: usize) -> bool {
        match self.keys_mut(list).get_mut(index) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    /// Value of a filterable field, as JSON.
    pub fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "node" => Some(Value::String(self.node.clone())),
            "parentNode" => Some(Value::String(self.parent_node.clone())),
            "label" => Some(Value::String(self.label.clone())),
            "owner" => Some(Value::String(self.owner.clone())),
            "resolver" => self.resolver.clone().map(Value::String),
            "address" => self.address.clone().map(Value::String),
            "reverseNode" => self.reverse_node.clone().map(Value::String),
            other => AttributeKey::parse(other)
                .and_then(|key| self.attribute(key))
                .map(AttributeValue::to_json),
        }
    }
}
