//! Helpers for reading loosely-typed YAML scalars.
//!
//! Document authors routinely write `version: 123` or `deployment: 42`; these
//! helpers accept any scalar where the model expects a string.
//!
//! Plain scalars such as `1.10` or `0x1A` resolve to numbers that print
//! differently (`1.1`, `26`). [`parse_spelled`] keeps the source text of such
//! scalars so identity fields never collapse into one another.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{DeserializeOwned, DeserializeSeed, Error as _, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

/// Parses a single YAML document into a tree.
///
/// Numbers and booleans whose resolved value renders differently from the
/// source (`1.10`, `0x1A`, `0o17`, `True`) become strings holding the source
/// text. Every other node keeps its resolved type.
pub fn parse_spelled(bytes: &[u8]) -> Result<Value, serde_yaml::Error> {
    let shape = Value::deserialize(serde_yaml::Deserializer::from_slice(bytes))?;
    Spelled(&shape).deserialize(serde_yaml::Deserializer::from_slice(bytes))
}

/// Parses every document of a multi-document stream like [`parse_spelled`].
pub fn parse_spelled_stream(
    bytes: &[u8],
) -> impl Iterator<Item = Result<Value, serde_yaml::Error>> + '_ {
    serde_yaml::Deserializer::from_slice(bytes)
        .zip(serde_yaml::Deserializer::from_slice(bytes))
        .map(|(resolved, source)| {
            let shape = Value::deserialize(resolved)?;
            Spelled(&shape).deserialize(source)
        })
}

/// Walks a second pass over the same events, guided by the resolved tree.
struct Spelled<'a>(&'a Value);

impl<'de> DeserializeSeed<'de> for Spelled<'_> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.0 {
            Value::Mapping(shape) => deserializer.deserialize_map(SpelledMapping(shape)),
            Value::Sequence(shape) => deserializer.deserialize_seq(SpelledSequence(shape)),
            Value::Number(_) | Value::Bool(_) => {
                let source = String::deserialize(deserializer)?;
                if scalar_string(self.0).as_deref() == Some(source.as_str()) {
                    Ok(self.0.clone())
                } else {
                    Ok(Value::String(source))
                }
            }
            Value::Null | Value::String(_) | Value::Tagged(_) => Value::deserialize(deserializer),
        }
    }
}

struct SpelledMapping<'a>(&'a Mapping);

impl<'de> Visitor<'de> for SpelledMapping<'_> {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a YAML mapping")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::with_capacity(self.0.len());
        for (key, value) in self.0 {
            let key = access
                .next_key_seed(Spelled(key))?
                .ok_or_else(|| A::Error::custom("mapping ended early"))?;
            let value = access.next_value_seed(Spelled(value))?;
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }
}

struct SpelledSequence<'a>(&'a [Value]);

impl<'de> Visitor<'de> for SpelledSequence<'_> {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a YAML sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut sequence = Vec::with_capacity(self.0.len());
        for shape in self.0 {
            let item = access
                .next_element_seed(Spelled(shape))?
                .ok_or_else(|| A::Error::custom("sequence ended early"))?;
            sequence.push(item);
        }
        Ok(Value::Sequence(sequence))
    }
}

/// Renders a scalar YAML value as a string.
///
/// Returns `None` for sequences and mappings. `null` renders as the empty
/// string so that it is reported by validation rather than by the parser.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Looks up `key` in a mapping value.
pub fn member<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_mapping().and_then(|m| m.get(key))
}

/// Looks up `key` in a mapping value and renders it as a string.
pub fn member_string(value: &Value, key: &str) -> Option<String> {
    member(value, key).and_then(scalar_string)
}

/// Reads a string→string mapping out of a mapping value, skipping
/// non-scalar entries.
pub fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_mapping)
        .map(|mapping| {
            mapping
                .iter()
                .filter_map(|(k, v)| Some((scalar_string(k)?, scalar_string(v)?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Deserializes any scalar into a `String`.
pub(crate) fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_string(&value).ok_or_else(|| D::Error::custom("expected a scalar value"))
}

/// Deserializes an optional scalar into an `Option<String>`.
///
/// An explicit `null` is treated as absent.
pub(crate) fn deserialize_optional_scalar<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => scalar_string(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a scalar value")),
    }
}

/// Deserializes an optional mapping of scalars into a string map.
pub(crate) fn deserialize_scalar_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(mapping) = Option::<BTreeMap<String, Value>>::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };

    mapping
        .into_iter()
        .map(|(key, value)| {
            scalar_string(&value)
                .map(|s| (key.clone(), s))
                .ok_or_else(|| D::Error::custom(format!("value of '{key}' must be a scalar")))
        })
        .collect()
}

/// Deserializes a number or boolean, also accepting a string kept in its
/// source spelling by [`parse_spelled`].
pub(crate) fn deserialize_resolved<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::String(source) => serde_yaml::from_str(&source).map_err(D::Error::custom)?,
        value => value,
    };
    serde_yaml::from_value(value).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_string_renders_numbers() {
        let value: Value = serde_yaml::from_str("123").unwrap();
        assert_eq!(scalar_string(&value).as_deref(), Some("123"));

        let value: Value = serde_yaml::from_str("0.11").unwrap();
        assert_eq!(scalar_string(&value).as_deref(), Some("0.11"));

        let value: Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(scalar_string(&value).as_deref(), Some("true"));
    }

    #[test]
    fn scalar_string_rejects_collections() {
        let value: Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert_eq!(scalar_string(&value), None);
    }

    #[test]
    fn spelled_keeps_source_text_of_lossy_scalars() {
        let yaml = b"version: 1.10\nhex: 0x1A\noctal: 0o17\npadded: 007\nflag: True\n";
        let tree = parse_spelled(yaml).unwrap();

        assert_eq!(member(&tree, "version"), Some(&Value::String("1.10".into())));
        assert_eq!(member(&tree, "hex"), Some(&Value::String("0x1A".into())));
        assert_eq!(member(&tree, "octal"), Some(&Value::String("0o17".into())));
        assert_eq!(member(&tree, "padded"), Some(&Value::String("007".into())));
        assert_eq!(member(&tree, "flag"), Some(&Value::String("True".into())));
    }

    #[test]
    fn spelled_keeps_lossless_scalars_typed() {
        let yaml = "count: 500\nratio: 0.11\nenabled: true\nempty: ~\nname: '1.10'\n";
        let tree = parse_spelled(yaml.as_bytes()).unwrap();
        let resolved: Value = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(tree, resolved);
    }

    #[test]
    fn spelled_walks_nested_collections_and_aliases() {
        let yaml = b"base: &v 1.10\nitems:\n- [1, 2.50]\n- {copy: *v}\n";
        let tree = parse_spelled(yaml).unwrap();

        let items = member(&tree, "items").and_then(Value::as_sequence).unwrap();
        assert_eq!(items[0][1], Value::String("2.50".into()));
        assert_eq!(items[0][0], Value::Number(1.into()));
        assert_eq!(member(&items[1], "copy"), Some(&Value::String("1.10".into())));
    }

    #[test]
    fn spelled_stream_parses_each_document() {
        let trees: Vec<Value> = parse_spelled_stream(b"a: 1.10\n---\nb: 2\n")
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(trees.len(), 2);
        assert_eq!(member_string(&trees[0], "a").as_deref(), Some("1.10"));
        assert_eq!(member_string(&trees[1], "b").as_deref(), Some("2"));
    }

    #[test]
    fn spelled_reports_syntax_errors() {
        assert!(parse_spelled(b"key: [unclosed").is_err());
        assert!(parse_spelled(b"a: 1\na: 2\n").is_err());
    }

    #[test]
    fn string_map_skips_nested_values() {
        let value: Value = serde_yaml::from_str("a: 1\nb: [x]\nc: text").unwrap();
        let map = string_map(Some(&value));

        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["c"], "text");
    }
}
