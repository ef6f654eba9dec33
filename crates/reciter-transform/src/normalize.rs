//! Record normalizer: raw source item → [`FeatureGraph`]
//!
//! Two jobs. Typed set descriptors (`{"SS": [...]}`, `{"NS": [...]}`,
//! `{"BS": [...]}`) are rewritten into sorted lists everywhere in the item.
//! Then the feature record is located among the envelope shapes in use
//! (`reCiterFeature` wrapper first, the item itself otherwise) and decoded,
//! article by article.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use crate::model::{ArticleFeature, FeatureGraph};
use crate::scalar::sanitize;

const ENVELOPE_KEY: &str = "reCiterFeature";
const ARTICLES_KEY: &str = "reCiterArticleFeatures";

/// Counters over all normalized items.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    pub graphs: usize,
    /// Items without a usable identifier
    pub skipped: usize,
    /// Articles that failed to decode (siblings kept)
    pub articles_rejected: usize,
}

#[derive(Debug, Default)]
pub struct Normalizer {
    stats: NormalizeStats,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> NormalizeStats {
        self.stats
    }

    /// Decode one raw item; `None` when it carries no usable identifier.
    pub fn normalize(&mut self, raw: Value) -> Option<FeatureGraph> {
        let Value::Object(mut item) = rewrite_sets(raw) else {
            log::warn!("skipping non-object source item");
            self.stats.skipped += 1;
            return None;
        };

        let legacy_uid = item.get("uid").and_then(identifier_text);
        let mut feature = match item.remove(ENVELOPE_KEY) {
            Some(Value::Object(inner)) => inner,
            _ => item,
        };

        let Some(person_identifier) = feature
            .get("personIdentifier")
            .and_then(identifier_text)
            .or_else(|| feature.get("uid").and_then(identifier_text))
            .or(legacy_uid)
        else {
            log::warn!("skipping source item without personIdentifier or uid");
            self.stats.skipped += 1;
            return None;
        };

        let raw_articles = feature.remove(ARTICLES_KEY);
        let mut graph: FeatureGraph = match serde_json::from_value(Value::Object(feature)) {
            Ok(g) => g,
            Err(e) => {
                log::warn!("{person_identifier}: undecodable feature record: {e}");
                self.stats.skipped += 1;
                return None;
            }
        };
        graph.person_identifier = person_identifier;
        graph.articles = self.decode_articles(&graph.person_identifier, raw_articles);
        self.stats.graphs += 1;
        Some(graph)
    }

    fn decode_articles(&mut self, owner: &str, raw: Option<Value>) -> Vec<ArticleFeature> {
        let items = match raw {
            Some(Value::Array(items)) => items,
            Some(v @ Value::Object(_)) => vec![v],
            Some(Value::Null) | None => return Vec::new(),
            Some(other) => {
                log::warn!("{owner}: {ARTICLES_KEY} is not a list: {other}");
                return Vec::new();
            }
        };

        let mut articles = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<ArticleFeature>(item) {
                Ok(a) => articles.push(a),
                Err(e) => {
                    log::warn!("{owner}: rejecting article #{i}: {e}");
                    self.stats.articles_rejected += 1;
                }
            }
        }
        articles
    }
}

fn identifier_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => sanitize(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(s).filter(|s| !s.is_empty())
}

/// Recursively replace typed set descriptors with sorted lists.
///
/// `SS` and `BS` sort lexicographically; `NS` elements are parsed to numbers
/// and sorted numerically (unparseable elements are kept as strings, last).
pub fn rewrite_sets(v: Value) -> Value {
    match v {
        Value::Object(map) => match set_descriptor(&map) {
            Some(kind) => {
                let Some(Value::Array(items)) = map.into_iter().next().map(|(_, v)| v) else {
                    unreachable!("set descriptor holds an array")
                };
                rewrite_set(kind, items)
            }
            None => Value::Object(map.into_iter().map(|(k, v)| (k, rewrite_sets(v))).collect()),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_sets).collect()),
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetKind {
    Strings,
    Numbers,
    Binary,
}

fn set_descriptor(map: &Map<String, Value>) -> Option<SetKind> {
    if map.len() != 1 {
        return None;
    }
    let (key, value) = map.iter().next()?;
    if !value.is_array() {
        return None;
    }
    match key.as_str() {
        "SS" => Some(SetKind::Strings),
        "NS" => Some(SetKind::Numbers),
        "BS" => Some(SetKind::Binary),
        _ => None,
    }
}

fn rewrite_set(kind: SetKind, items: Vec<Value>) -> Value {
    match kind {
        SetKind::Strings | SetKind::Binary => {
            let mut items = items;
            items.sort_by(|a, b| sort_text(a).cmp(&sort_text(b)));
            Value::Array(items)
        }
        SetKind::Numbers => {
            let mut items: Vec<Value> = items.into_iter().map(parse_number).collect();
            items.sort_by(compare_numeric);
            Value::Array(items)
        }
    }
}

fn sort_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_number(v: Value) -> Value {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                Value::Number(i.into())
            } else if let Some(n) = t.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => sort_text(a).cmp(&sort_text(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sets_become_sorted_lists_without_loss() {
        let raw = json!({
            "tags": {"SS": ["pear", "apple", "fig"]},
            "scores": {"NS": ["10", "2.5", "-1"]},
            "blobs": {"BS": ["Yg==", "YQ=="]},
            "nested": [{"deep": {"SS": ["b", "a"]}}],
            "notASet": {"SS": ["x"], "other": 1}
        });
        let out = rewrite_sets(raw);
        assert_eq!(out["tags"], json!(["apple", "fig", "pear"]));
        assert_eq!(out["scores"], json!([-1, 2.5, 10]));
        assert_eq!(out["blobs"], json!(["YQ==", "Yg=="]));
        assert_eq!(out["nested"][0]["deep"], json!(["a", "b"]));
        assert_eq!(out["notASet"], json!({"SS": ["x"], "other": 1}));
    }

    #[test]
    fn envelope_first_then_top_level() {
        let mut n = Normalizer::new();
        let wrapped = n
            .normalize(json!({
                "uid": "abc1001",
                "usingS3": 0,
                "reCiterFeature": {"personIdentifier": "abc1001", "precision": 0.9,
                                   "reCiterArticleFeatures": [{"pmid": 1}]}
            }))
            .unwrap();
        assert_eq!(wrapped.person_identifier, "abc1001");
        assert_eq!(wrapped.precision.render(), "0.9");
        assert_eq!(wrapped.articles.len(), 1);

        let bare = n
            .normalize(json!({"personIdentifier": "xyz2002", "mode": "STRICT"}))
            .unwrap();
        assert_eq!(bare.person_identifier, "xyz2002");
        assert_eq!(bare.mode.render(), "STRICT");
    }

    #[test]
    fn falls_back_to_uid() {
        let mut n = Normalizer::new();
        let g = n
            .normalize(json!({"uid": "legacy1", "reCiterFeature": {"recall": 1}}))
            .unwrap();
        assert_eq!(g.person_identifier, "legacy1");
    }

    #[test]
    fn missing_identifier_is_skipped() {
        let mut n = Normalizer::new();
        assert!(n.normalize(json!({"reCiterFeature": {"precision": 1}})).is_none());
        assert!(n.normalize(json!({"personIdentifier": "  "})).is_none());
        assert!(n.normalize(json!("not an object")).is_none());
        assert_eq!(n.stats().skipped, 3);
    }

    #[test]
    fn bad_article_does_not_sink_siblings() {
        let mut n = Normalizer::new();
        let g = n
            .normalize(json!({
                "personIdentifier": "abc1001",
                "reCiterArticleFeatures": [{"pmid": 1}, "garbage", {"pmid": 3}]
            }))
            .unwrap();
        assert_eq!(g.articles.len(), 2);
        assert_eq!(n.stats().articles_rejected, 1);
        assert_eq!(n.stats().graphs, 1);
    }

    #[test]
    fn article_sets_are_rewritten_before_decode() {
        let mut n = Normalizer::new();
        let g = n
            .normalize(json!({
                "personIdentifier": "abc1001",
                "reCiterArticleFeatures": [{"pmid": 1, "doi": {"SS": ["b", "a"]}}]
            }))
            .unwrap();
        assert_eq!(g.articles[0].doi.render(), "a,b");
    }
}
