//! Extended pointer paths over untyped YAML trees.
//!
//! A path is a `/`-delimited list of segments resolved left to right:
//!
//! | Segment | Meaning |
//! |---------|---------|
//! | `name` | map member `name` |
//! | `3` | sequence element at index 3 |
//! | `level=warning` | first sequence element whose `level` member is `warning` |
//! | `thresholds?` | map member `thresholds`, created empty if absent |
//! | `-` | (final segment only) append after the last element |
//!
//! `~1` and `~0` inside a segment decode to `/` and `~`.
//!
//! Resolution never panics: any segment that cannot be followed yields
//! [`PatchError::Resolution`] and leaves the tree untouched.

use std::fmt;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::error::PatchError;
use crate::yaml::{member, scalar_string};

/// One step of an extended pointer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A map member; `optional` members are created when absent.
    Key {
        /// Member name.
        name: String,
        /// Whether the member may be created.
        optional: bool,
    },
    /// A zero-based sequence index.
    Index(usize),
    /// The first sequence element whose `field` stringifies to `value`.
    Selector {
        /// Member compared on each element.
        field: String,
        /// Expected value.
        value: String,
    },
    /// The position after the last sequence element.
    Append,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "-" {
            return Self::Append;
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(idx) = raw.parse() {
                return Self::Index(idx);
            }
        }
        if let Some((field, value)) = raw.split_once('=') {
            if !field.is_empty() {
                return Self::Selector {
                    field: unescape(field),
                    value: unescape(value),
                };
            }
        }
        match raw.strip_suffix('?') {
            Some(name) => Self::Key {
                name: unescape(name),
                optional: true,
            },
            None => Self::Key {
                name: unescape(raw),
                optional: false,
            },
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key { name, optional } => {
                write!(f, "{name}{}", if *optional { "?" } else { "" })
            }
            Self::Index(idx) => write!(f, "{idx}"),
            Self::Selector { field, value } => write!(f, "{field}={value}"),
            Self::Append => f.write_str("-"),
        }
    }
}

fn unescape(raw: &str) -> String {
    raw.replace("~1", "/").replace("~0", "~")
}

/// A parsed extended pointer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    raw: String,
    segments: Vec<Segment>,
}

impl FromStr for Pointer {
    type Err = PatchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| PatchError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must start with '/'"))?;

        let segments: Vec<Segment> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').map(Segment::parse).collect()
        };

        if let Some(pos) = segments.iter().position(|s| *s == Segment::Append) {
            if pos + 1 != segments.len() {
                return Err(invalid("'-' is only allowed as the final segment"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Pointer {
    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Sets the addressed value.
    ///
    /// Overwrites a map member, an indexed or selected sequence element, or
    /// appends when the final segment is `-`. The root path replaces the
    /// whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Resolution`] if any segment cannot be resolved.
    pub fn replace(&self, tree: &mut Value, value: Value) -> Result<(), PatchError> {
        let Some((last, parents)) = self.segments.split_last() else {
            *tree = value;
            return Ok(());
        };

        let parent = self.walk(tree, parents)?;
        match (last, parent) {
            (Segment::Key { name, .. }, Value::Mapping(map)) => {
                map.insert(Value::String(name.clone()), value);
                Ok(())
            }
            (Segment::Index(idx), Value::Mapping(map)) => {
                map.insert(Value::String(idx.to_string()), value);
                Ok(())
            }
            (Segment::Index(idx), Value::Sequence(seq)) => {
                let len = seq.len();
                let slot = seq
                    .get_mut(*idx)
                    .ok_or_else(|| self.fail(last, &format!("index out of range (length {len})")))?;
                *slot = value;
                Ok(())
            }
            (Segment::Selector { field, value: expected }, Value::Sequence(seq)) => {
                let pos = select(seq, field, expected).ok_or_else(|| self.fail(last, "no element matches"))?;
                seq[pos] = value;
                Ok(())
            }
            (Segment::Append, Value::Sequence(seq)) => {
                seq.push(value);
                Ok(())
            }
            (_, other) => Err(self.fail(last, &format!("cannot address {}", kind(other)))),
        }
    }

    /// Deletes the addressed map member or sequence element.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Resolution`] if any segment cannot be resolved,
    /// the target does not exist, or the path is the root or ends in `-`.
    pub fn remove(&self, tree: &mut Value) -> Result<(), PatchError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(PatchError::Resolution {
                path: self.raw.clone(),
                reason: "cannot remove the document root".to_string(),
            });
        };

        let parent = self.walk(tree, parents)?;
        match (last, parent) {
            (Segment::Key { name, .. }, Value::Mapping(map)) => map
                .remove(name.as_str())
                .map(drop)
                .ok_or_else(|| self.fail(last, "no such member")),
            (Segment::Index(idx), Value::Mapping(map)) => map
                .remove(idx.to_string().as_str())
                .map(drop)
                .ok_or_else(|| self.fail(last, "no such member")),
            (Segment::Index(idx), Value::Sequence(seq)) => {
                if *idx >= seq.len() {
                    let len = seq.len();
                    return Err(self.fail(last, &format!("index out of range (length {len})")));
                }
                seq.remove(*idx);
                Ok(())
            }
            (Segment::Selector { field, value: expected }, Value::Sequence(seq)) => {
                let pos = select(seq, field, expected).ok_or_else(|| self.fail(last, "no element matches"))?;
                seq.remove(pos);
                Ok(())
            }
            (Segment::Append, _) => Err(self.fail(last, "cannot remove past the last element")),
            (_, other) => Err(self.fail(last, &format!("cannot address {}", kind(other)))),
        }
    }

    /// Follows `segments` from `tree`, creating optional members on the way.
    fn walk<'a>(&self, tree: &'a mut Value, segments: &[Segment]) -> Result<&'a mut Value, PatchError> {
        let mut node = tree;

        for (pos, segment) in segments.iter().enumerate() {
            node = match (segment, node) {
                (Segment::Key { name, optional }, Value::Mapping(map)) => {
                    let key = Value::String(name.clone());
                    if !map.contains_key(&key) {
                        if !*optional {
                            return Err(self.fail(segment, "no such member"));
                        }
                        map.insert(key.clone(), empty_container(segments.get(pos + 1)));
                    }
                    map.get_mut(&key)
                        .ok_or_else(|| self.fail(segment, "no such member"))?
                }
                (Segment::Index(idx), Value::Mapping(map)) => map
                    .get_mut(idx.to_string().as_str())
                    .ok_or_else(|| self.fail(segment, "no such member"))?,
                (Segment::Index(idx), Value::Sequence(seq)) => {
                    let len = seq.len();
                    seq.get_mut(*idx).ok_or_else(|| {
                        self.fail(segment, &format!("index out of range (length {len})"))
                    })?
                }
                (Segment::Selector { field, value }, Value::Sequence(seq)) => {
                    let pos = select(seq, field, value)
                        .ok_or_else(|| self.fail(segment, "no element matches"))?;
                    &mut seq[pos]
                }
                (_, other) => {
                    return Err(self.fail(segment, &format!("cannot address {}", kind(other))));
                }
            };
        }

        Ok(node)
    }

    fn fail(&self, segment: &Segment, reason: &str) -> PatchError {
        PatchError::Resolution {
            path: self.raw.clone(),
            reason: format!("segment '{segment}': {reason}"),
        }
    }
}

/// Creates the container a missing optional member should hold, based on
/// how the next segment addresses it.
fn empty_container(next: Option<&Segment>) -> Value {
    match next {
        Some(Segment::Key { .. }) => Value::Mapping(Mapping::new()),
        _ => Value::Sequence(Vec::new()),
    }
}

fn select(seq: &[Value], field: &str, expected: &str) -> Option<usize> {
    seq.iter().position(|element| {
        member(element, field)
            .and_then(scalar_string)
            .is_some_and(|actual| actual == expected)
    })
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Mapping(_) => "a mapping",
        Value::Sequence(_) => "a sequence",
        Value::Null => "null",
        _ => "a scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn tree() -> Value {
        serde_yaml::from_str(
            r"
spec:
  indicators:
  - name: latency
    thresholds:
    - {level: warning, value: 500}
    - {level: critical, value: 1000}
  - name: errors
",
        )
        .unwrap()
    }

    fn get<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
        path.iter().try_fold(tree, |node, seg| match seg.parse::<usize>() {
            Ok(idx) => node.as_sequence()?.get(idx),
            Err(_) => member(node, seg),
        })
    }

    #[test_case("name", Segment::Key { name: "name".into(), optional: false } ; "key")]
    #[test_case("thresholds?", Segment::Key { name: "thresholds".into(), optional: true } ; "optional key")]
    #[test_case("12", Segment::Index(12) ; "index")]
    #[test_case("level=warning", Segment::Selector { field: "level".into(), value: "warning".into() } ; "selector")]
    #[test_case("a~1b", Segment::Key { name: "a/b".into(), optional: false } ; "escaped slash")]
    #[test_case("-", Segment::Append ; "append")]
    fn parses_segment(raw: &str, expected: Segment) {
        assert_eq!(Segment::parse(raw), expected);
    }

    #[test]
    fn rejects_relative_path() {
        assert!(matches!(
            "spec/indicators".parse::<Pointer>(),
            Err(PatchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn rejects_append_in_the_middle() {
        assert!(matches!(
            "/spec/-/name".parse::<Pointer>(),
            Err(PatchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn display_round_trips_raw_path() {
        let pointer: Pointer = "/spec/indicators/name=latency".parse().unwrap();
        assert_eq!(pointer.to_string(), "/spec/indicators/name=latency");
        assert_eq!(pointer.segments().len(), 3);
    }

    #[test]
    fn replace_by_index() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/1/name".parse().unwrap();
        pointer.replace(&mut tree, Value::from("renamed")).unwrap();

        assert_eq!(
            get(&tree, &["spec", "indicators", "1", "name"]),
            Some(&Value::from("renamed"))
        );
    }

    #[test]
    fn replace_by_selector() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/name=latency/thresholds/level=critical/value"
            .parse()
            .unwrap();
        pointer.replace(&mut tree, Value::from(5000)).unwrap();

        assert_eq!(
            get(&tree, &["spec", "indicators", "0", "thresholds", "1", "value"]),
            Some(&Value::from(5000))
        );
    }

    #[test]
    fn selector_compares_stringified_values() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/0/thresholds/value=500/level".parse().unwrap();
        pointer.replace(&mut tree, Value::from("minor")).unwrap();

        assert_eq!(
            get(&tree, &["spec", "indicators", "0", "thresholds", "0", "level"]),
            Some(&Value::from("minor"))
        );
    }

    #[test]
    fn replace_sets_new_map_member() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/1/promql".parse().unwrap();
        pointer.replace(&mut tree, Value::from("up")).unwrap();

        assert_eq!(
            get(&tree, &["spec", "indicators", "1", "promql"]),
            Some(&Value::from("up"))
        );
    }

    #[test]
    fn append_creates_optional_sequence() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/name=errors/thresholds?/-".parse().unwrap();
        pointer.replace(&mut tree, Value::from("new")).unwrap();

        let thresholds = get(&tree, &["spec", "indicators", "1", "thresholds"])
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(thresholds, &vec![Value::from("new")]);
    }

    #[test]
    fn optional_member_followed_by_key_becomes_mapping() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/layout?/title".parse().unwrap();
        pointer.replace(&mut tree, Value::from("Overview")).unwrap();

        assert_eq!(
            get(&tree, &["spec", "layout", "title"]),
            Some(&Value::from("Overview"))
        );
    }

    #[test]
    fn missing_member_without_optional_fails() {
        let mut tree = tree();
        let before = tree.clone();
        let pointer: Pointer = "/spec/indicators/name=errors/thresholds/-".parse().unwrap();

        let err = pointer.replace(&mut tree, Value::from("new")).unwrap_err();

        assert!(matches!(err, PatchError::Resolution { .. }));
        assert_eq!(tree, before);
    }

    #[test]
    fn out_of_range_index_fails() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/35/thresholds/0".parse().unwrap();

        let err = pointer.replace(&mut tree, Value::from(1)).unwrap_err();
        assert!(err.to_string().contains("segment '35'"));
    }

    #[test]
    fn unmatched_selector_fails() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/name=missing/promql".parse().unwrap();

        assert!(pointer.replace(&mut tree, Value::from("x")).is_err());
    }

    #[test]
    fn remove_by_selector() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/0/thresholds/level=warning".parse().unwrap();
        pointer.remove(&mut tree).unwrap();

        let thresholds = get(&tree, &["spec", "indicators", "0", "thresholds"])
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(thresholds.len(), 1);
        assert_eq!(
            member(&thresholds[0], "level"),
            Some(&Value::from("critical"))
        );
    }

    #[test]
    fn remove_map_member() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/0/thresholds".parse().unwrap();
        pointer.remove(&mut tree).unwrap();

        assert!(get(&tree, &["spec", "indicators", "0", "thresholds"]).is_none());
        assert!(pointer.remove(&mut tree).is_err());
    }

    #[test]
    fn remove_root_fails() {
        let mut tree = tree();
        let pointer: Pointer = "/".parse().unwrap();
        assert!(pointer.remove(&mut tree).is_err());
    }

    #[test]
    fn replace_root_swaps_tree() {
        let mut tree = tree();
        let pointer: Pointer = "/".parse().unwrap();
        pointer.replace(&mut tree, Value::from("scalar")).unwrap();
        assert_eq!(tree, Value::from("scalar"));
    }

    #[test]
    fn key_into_scalar_fails() {
        let mut tree = tree();
        let pointer: Pointer = "/spec/indicators/0/name/first".parse().unwrap();

        let err = pointer.replace(&mut tree, Value::from("x")).unwrap_err();
        assert!(err.to_string().contains("cannot address a scalar"));
    }
}
