//! Named parameters and textual parameter binding.
//!
//! Statement templates carry placeholders of the form `:name` (ASCII letters and
//! digits only). Binding replaces each placeholder with the literal produced by
//! the dialect's value sanitizer. Quoted regions of the template (string
//! literals and delimited identifiers) are copied verbatim, so a literal that
//! was already substituted, or that the caller wrote by hand, is never rescanned.
//!
//! # Example
//! ```ignore
//! let params = Params::new()
//!     .bind(":name", "O'Brien")
//!     .bind_typed(":id", 7, "INT UNSIGNED");
//! ```

use crate::error::{DbError, DbResult};
use crate::value::Value;
use indexmap::IndexMap;

/// A value together with its optional declared SQL column type.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,
    pub ty: Option<String>,
}

impl Param {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ty: None,
        }
    }

    pub fn typed(value: impl Into<Value>, ty: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ty: Some(ty.into()),
        }
    }
}

/// Placeholder name → typed parameter, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: IndexMap<String, Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value using the dialect's default type for its kind.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), Param::new(value));
        self
    }

    /// Bind a value checked against an explicit column type descriptor.
    pub fn bind_typed(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        ty: impl Into<String>,
    ) -> Self {
        self.entries.insert(name.into(), Param::typed(value, ty));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, param: Param) {
        self.entries.insert(name.into(), param);
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build parameters from a JSON object such as submitted form data.
    ///
    /// Each member is either a scalar, a list of strings, or an object with
    /// `value` and `type` keys.
    pub fn from_json(json: &serde_json::Value) -> DbResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| DbError::invalid_parameter("parameters must be a JSON object"))?;
        let mut params = Params::new();
        for (name, entry) in object {
            params.insert(name.clone(), Param::try_from(entry.clone())?);
        }
        Ok(params)
    }
}

impl TryFrom<serde_json::Value> for Param {
    type Error = DbError;

    fn try_from(json: serde_json::Value) -> DbResult<Self> {
        match json {
            serde_json::Value::Object(mut map) => {
                let value = map.remove("value").ok_or_else(|| {
                    DbError::invalid_parameter("missing parameter data value to sanitize")
                })?;
                let ty = match map.remove("type") {
                    Some(serde_json::Value::String(ty)) => ty,
                    Some(_) => {
                        return Err(DbError::invalid_parameter(
                            "parameter data SQL type must be a string",
                        ));
                    }
                    None => {
                        return Err(DbError::invalid_parameter(
                            "missing parameter data SQL type",
                        ));
                    }
                };
                Ok(Param::typed(json_scalar(value)?, ty))
            }
            other => Ok(Param::new(json_scalar(other)?)),
        }
    }
}

fn json_scalar(json: serde_json::Value) -> DbResult<Value> {
    use serde_json::Value as J;
    Ok(match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        J::String(s) => Value::Text(s),
        J::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| match item {
                    J::String(s) => Ok(s),
                    other => Err(DbError::invalid_parameter(format!(
                        "list parameter members must be strings, got {other}"
                    ))),
                })
                .collect::<DbResult<_>>()?,
        ),
        J::Object(_) => {
            return Err(DbError::invalid_parameter(
                "nested parameter data objects are not allowed",
            ));
        }
    })
}

/// Whether `name` is a valid placeholder token: `:` followed by one or more ASCII
/// letters or digits.
pub fn is_valid_placeholder(name: &str) -> bool {
    name.strip_prefix(':')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Replace every placeholder in `template` with the literal returned by `sanitize`.
///
/// Fails with `InvalidParameterData` when a parameter name violates the
/// placeholder grammar or when the template references a placeholder that has
/// no parameter. Unused parameters are ignored.
pub fn bind_template<F>(template: &str, params: &Params, mut sanitize: F) -> DbResult<String>
where
    F: FnMut(&Value, Option<&str>) -> DbResult<String>,
{
    if let Some((name, _)) = params.iter().find(|(name, _)| !is_valid_placeholder(name)) {
        return Err(DbError::invalid_parameter(format!(
            "invalid parameter name \"{name}\""
        )));
    }

    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '`' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            ':' => {
                let start = i;
                let mut end = i + 1;
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start + 1 {
                    out.push(':');
                    continue;
                }
                let name = &template[start..end];
                let param = params.get(name).ok_or_else(|| {
                    DbError::invalid_parameter(format!("no parameter bound for placeholder \"{name}\""))
                })?;
                out.push_str(&sanitize(&param.value, param.ty.as_deref())?);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sanitize(value: &Value, ty: Option<&str>) -> DbResult<String> {
        Ok(match (value, ty) {
            (Value::Int(i), _) => i.to_string(),
            (Value::Text(s), _) => format!("'{}'", s.replace('\'', "\\'")),
            (_, Some(ty)) => format!("<{ty}>"),
            _ => "?".to_string(),
        })
    }

    #[test]
    fn placeholder_grammar() {
        assert!(is_valid_placeholder(":id"));
        assert!(is_valid_placeholder(":mediaID2"));
        assert!(!is_valid_placeholder("id"));
        assert!(!is_valid_placeholder(":"));
        assert!(!is_valid_placeholder(":media_id"));
        assert!(!is_valid_placeholder(":é"));
    }

    #[test]
    fn binds_every_occurrence() {
        let params = Params::new().bind(":id", 7);
        let sql = bind_template("a = :id OR b = :id", &params, fake_sanitize).unwrap();
        assert_eq!(sql, "a = 7 OR b = 7");
    }

    #[test]
    fn longest_name_wins() {
        let params = Params::new().bind(":id", 1).bind(":idx", 2);
        let sql = bind_template(":idx, :id", &params, fake_sanitize).unwrap();
        assert_eq!(sql, "2, 1");
    }

    #[test]
    fn substituted_literals_are_not_rescanned() {
        let params = Params::new().bind(":a", ":b").bind(":b", "oops");
        let sql = bind_template("x = :a AND y = :b", &params, fake_sanitize).unwrap();
        assert_eq!(sql, "x = ':b' AND y = 'oops'");
    }

    #[test]
    fn quoted_regions_are_copied_verbatim() {
        let params = Params::new().bind(":t", 1);
        let sql = bind_template(
            "`col:t` = '10:t\\'s' AND c = :t",
            &params,
            fake_sanitize,
        )
        .unwrap();
        assert_eq!(sql, "`col:t` = '10:t\\'s' AND c = 1");
    }

    #[test]
    fn invalid_name_is_rejected_before_binding() {
        let params = Params::new().bind("id", 1);
        let err = bind_template("a = 1", &params, fake_sanitize).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn unbound_placeholder_fails_closed() {
        let err = bind_template("a = :missing", &Params::new(), fake_sanitize).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn lone_colon_is_kept() {
        let sql = bind_template("@v := 1", &Params::new(), fake_sanitize).unwrap();
        assert_eq!(sql, "@v := 1");
    }

    #[test]
    fn json_object_needs_value_and_type() {
        let p = Param::try_from(serde_json::json!({"value": 5, "type": "TINYINT"})).unwrap();
        assert_eq!(p, Param::typed(5, "TINYINT"));

        let err = Param::try_from(serde_json::json!({"value": 5})).unwrap_err();
        assert!(err.is_invalid_parameter());
        let err = Param::try_from(serde_json::json!({"type": "INT"})).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn json_array_becomes_list() {
        let params = Params::from_json(&serde_json::json!({
            ":tags": ["a", "b"],
            ":n": "x",
        }))
        .unwrap();
        assert_eq!(
            params.get(":tags").unwrap().value,
            Value::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(params.get(":n").unwrap().value, Value::Text("x".into()));

        let err = Params::from_json(&serde_json::json!({":tags": [1]})).unwrap_err();
        assert!(err.is_invalid_parameter());
    }
}
