//! HTTP method and per-request option types.
//!
//! [`RequestOptions`] is the options bag every call site passes to the client.
//! Some of its fields shape what the upstream authorizes (and therefore feed
//! the [`Fingerprint`](crate::Fingerprint)); the rest only affect paging and
//! presentation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

/// HTTP verbs the upstream service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// Read a collection or a single record.
    Get,
    /// Create records or run a query.
    Post,
    /// Update records.
    Put,
    /// Delete records.
    Delete,
}

impl HttpMethod {
    /// Lowercase verb, as it appears inside fingerprints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    /// Uppercase verb, as it appears on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            _ => anyhow::bail!("Unknown HTTP method: {s}"),
        }
    }
}

/// Options for a single upstream request.
///
/// # Examples
///
/// ```
/// use tokenkeep_common::RequestOptions;
/// use serde_json::json;
///
/// let options = RequestOptions::builder()
///     .fields("id,name")
///     .filter("active:1")
///     .page("2")
///     .body(json!({ "name": "Ada" }))
///     .build();
///
/// assert_eq!(options.fields.as_deref(), Some("id,name"));
/// assert!(options.loading);
/// ```
#[derive(Debug, Clone, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// JSON request body. An object with a `sql` member carries a raw query.
    #[builder(default, setter(strip_option))]
    pub body: Option<Value>,
    /// Page number.
    #[builder(default, setter(strip_option, into))]
    pub page: Option<String>,
    /// Sort expression.
    #[builder(default, setter(strip_option, into))]
    pub sort: Option<String>,
    /// Joined collections, sent as the `collections` header.
    #[builder(default, setter(strip_option, into))]
    pub joins: Option<String>,
    /// Row filter.
    #[builder(default, setter(strip_option, into))]
    pub filter: Option<String>,
    /// Free-text search expression.
    #[builder(default, setter(strip_option, into))]
    pub search: Option<String>,
    /// Geographic proximity expression.
    #[builder(default, setter(strip_option, into))]
    pub nearby: Option<String>,
    /// Fields to hide from the response.
    #[builder(default, setter(strip_option, into))]
    pub hidden: Option<String>,
    /// Fields to include in the response.
    #[builder(default, setter(strip_option, into))]
    pub fields: Option<String>,
    /// End-user session value.
    #[builder(default, setter(strip_option, into))]
    pub session: Option<String>,
    /// Validation rules applied upstream.
    #[builder(default, setter(strip_option, into))]
    pub validation: Option<String>,
    /// Permission rules applied upstream.
    #[builder(default, setter(strip_option, into))]
    pub permissions: Option<String>,
    /// Whether progress should be reported. Has no effect on the request itself.
    #[builder(default = true)]
    pub loading: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RequestOptions {
    /// Whether the body is a JSON array.
    #[must_use]
    pub fn body_is_array(&self) -> bool {
        matches!(self.body, Some(Value::Array(_)))
    }

    /// Raw query text, when the body is an object carrying a `sql` member.
    ///
    /// Non-string members are converted the way JavaScript string
    /// concatenation converts them, so keys match the ones FrontQL clients
    /// have already written to token stores.
    #[must_use]
    pub fn raw_sql(&self) -> Option<String> {
        let sql = self.body.as_ref()?.as_object()?.get("sql")?;
        Some(script_text(sql))
    }
}

/// `String(value)` as a JavaScript engine would produce it.
fn script_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => script_number(number),
        // Array.prototype.join: nested nulls become empty strings
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => script_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn script_number(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        // Integral doubles print without a fraction below 1e21
        Some(float) if float.fract() == 0.0 && float.abs() < 1e21 => format!("{float:.0}"),
        _ => number.to_string(),
    }
}
