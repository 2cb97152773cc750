//! Request parameter tree
//!
//! Query strings such as `filter[roles.name]=admin&filter[id][]=1&filter[id][]=2`
//! and JSON bodies both parse into the same ordered tree, so the rest of the
//! parser only deals with one shape.

/// One node of the parameter tree
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<ParamValue>),
    /// Ordered map; keys keep their first-seen order
    Map(Vec<(String, ParamValue)>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Child of a map node
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        match self {
            ParamValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Items of a list, or the values of a map in key order
    pub fn items(&self) -> Vec<&ParamValue> {
        match self {
            ParamValue::List(items) => items.iter().collect(),
            ParamValue::Map(entries) => entries.iter().map(|(_, v)| v).collect(),
            ParamValue::Scalar(_) => Vec::new(),
        }
    }

    /// Scalars of this node: a scalar yields itself, a list its scalar items
    pub fn scalars(&self) -> Vec<String> {
        match self {
            ParamValue::Scalar(s) => vec![s.clone()],
            ParamValue::List(items) => items
                .iter()
                .filter_map(|item| item.as_scalar().map(str::to_string))
                .collect(),
            ParamValue::Map(_) => Vec::new(),
        }
    }

    fn insert(&mut self, segments: &[String], value: String) {
        let Some((head, rest)) = segments.split_first() else {
            *self = ParamValue::Scalar(value);
            return;
        };

        if head.is_empty() {
            if !matches!(self, ParamValue::List(_)) {
                *self = ParamValue::List(Vec::new());
            }
            if let ParamValue::List(items) = self {
                let mut child = ParamValue::Map(Vec::new());
                child.insert(rest, value);
                items.push(child);
            }
            return;
        }

        if !matches!(self, ParamValue::Map(_)) {
            *self = ParamValue::Map(Vec::new());
        }
        if let ParamValue::Map(entries) = self {
            let index = match entries.iter().position(|(k, _)| k == head) {
                Some(index) => index,
                None => {
                    entries.push((head.clone(), ParamValue::Map(Vec::new())));
                    entries.len() - 1
                }
            };
            entries[index].1.insert(rest, value);
        }
    }
}

impl From<&serde_json::Value> for ParamValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Scalar(String::new()),
            serde_json::Value::Bool(b) => ParamValue::Scalar(b.to_string()),
            serde_json::Value::Number(n) => ParamValue::Scalar(n.to_string()),
            serde_json::Value::String(s) => ParamValue::Scalar(s.clone()),
            serde_json::Value::Array(items) => {
                ParamValue::List(items.iter().map(ParamValue::from).collect())
            }
            serde_json::Value::Object(map) => ParamValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), ParamValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Top-level request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    root: ParamValue,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            root: ParamValue::Map(Vec::new()),
        }
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (with or without a leading `?`)
    ///
    /// Pairs that are not valid percent-encoded UTF-8 are skipped.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode(raw_key), decode(raw_value)) else {
                log::warn!("Skipping undecodable query parameter: {}", pair);
                continue;
            };
            params.set(&key, value);
        }

        params
    }

    /// Build from a JSON object; any other JSON shape gives empty params
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => Self {
                root: ParamValue::from(value),
            },
            _ => Self::default(),
        }
    }

    /// Set a value under a bracketed key such as `filter[id][]`
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let segments = split_key(key);
        if segments.first().map_or(true, |s| s.is_empty()) {
            return;
        }
        self.root.insert(&segments, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.root.get(name)
    }

    /// Scalar value of a top-level parameter
    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_scalar)
    }

    pub fn is_empty(&self) -> bool {
        self.root.items().is_empty()
    }
}

fn decode(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}

/// `filter[roles.name][]` -> `["filter", "roles.name", ""]`
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(close) => {
                segments.push(stripped[..close].to_string());
                rest = &stripped[close + 1..];
            }
            None => {
                // Unbalanced bracket: keep the remainder as a literal segment
                segments.push(stripped.to_string());
                rest = "";
            }
        }
    }
    segments
}
