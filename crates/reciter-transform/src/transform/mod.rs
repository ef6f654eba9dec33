//! Tabular transformer: feature graphs → one RowSet per feature table
//!
//! Rows of one article are built into scratch row sets first and only moved
//! into the output when every table succeeded, so a bad article never leaves
//! half its rows behind.

mod affiliation;
mod article;
mod author;
mod department;
mod grant;
mod keyword;
mod person;
mod relationship;

use rustc_hash::FxHashMap;

use crate::model::{ArticleFeature, FeatureGraph};
use crate::rowset::{RowSet, TransformError};
use crate::table::Table;

/// Tables derived from feature graphs, in load order.
pub const FEATURE_TABLES: [Table; 9] = [
    Table::Person,
    Table::PersonArticle,
    Table::PersonArticleAuthor,
    Table::PersonArticleDepartment,
    Table::PersonArticleGrant,
    Table::PersonArticleKeyword,
    Table::PersonArticleRelationship,
    Table::PersonArticleScopusTargetAuthorAffiliation,
    Table::PersonArticleScopusNonTargetAuthorAffiliation,
];

/// What a row builder needs to know about the article it is working on.
pub(crate) struct ArticleCtx<'a> {
    pub person: &'a str,
    pub pmid: String,
    pub article: &'a ArticleFeature,
}

impl ArticleCtx<'_> {
    /// `personIdentifier, pmid` prefix shared by every article table.
    fn key(&self) -> [String; 2] {
        [self.person.to_string(), self.pmid.clone()]
    }
}

/// Per-article row sets (everything but `person`).
struct ArticleRows {
    article: RowSet,
    author: RowSet,
    department: RowSet,
    grant: RowSet,
    keyword: RowSet,
    relationship: RowSet,
    target: RowSet,
    non_target: RowSet,
}

impl ArticleRows {
    fn new() -> Self {
        Self {
            article: RowSet::for_table(Table::PersonArticle),
            author: RowSet::for_table(Table::PersonArticleAuthor),
            department: RowSet::for_table(Table::PersonArticleDepartment),
            grant: RowSet::for_table(Table::PersonArticleGrant),
            keyword: RowSet::for_table(Table::PersonArticleKeyword),
            relationship: RowSet::for_table(Table::PersonArticleRelationship),
            target: RowSet::for_table(Table::PersonArticleScopusTargetAuthorAffiliation),
            non_target: RowSet::for_table(Table::PersonArticleScopusNonTargetAuthorAffiliation),
        }
    }

    fn build(&mut self, ctx: &ArticleCtx<'_>) -> Result<(), TransformError> {
        article::rows(ctx, &mut self.article)?;
        author::rows(ctx, &mut self.author)?;
        department::rows(ctx, &mut self.department)?;
        grant::rows(ctx, &mut self.grant)?;
        keyword::rows(ctx, &mut self.keyword)?;
        relationship::rows(ctx, &mut self.relationship)?;
        affiliation::target_rows(ctx, &mut self.target)?;
        affiliation::non_target_rows(ctx, &mut self.non_target)?;
        Ok(())
    }

    fn append(&mut self, other: &mut ArticleRows) {
        self.article.append(&mut other.article);
        self.author.append(&mut other.author);
        self.department.append(&mut other.department);
        self.grant.append(&mut other.grant);
        self.keyword.append(&mut other.keyword);
        self.relationship.append(&mut other.relationship);
        self.target.append(&mut other.target);
        self.non_target.append(&mut other.non_target);
    }

    fn into_vec(self, person: RowSet) -> Vec<RowSet> {
        vec![
            person,
            self.article,
            self.author,
            self.department,
            self.grant,
            self.keyword,
            self.relationship,
            self.target,
            self.non_target,
        ]
    }
}

#[derive(Debug, Default, Clone)]
pub struct TransformStats {
    pub entities: usize,
    pub articles: usize,
    /// Missing pmid or failed row construction
    pub articles_skipped: usize,
    pub rows: FxHashMap<&'static str, usize>,
}

#[derive(Debug, Default)]
pub struct Transformer {
    stats: TransformStats,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TransformStats {
        &self.stats
    }

    /// Row sets for [`FEATURE_TABLES`], in that order.
    pub fn transform(&mut self, graphs: &[FeatureGraph]) -> Vec<RowSet> {
        let mut persons = RowSet::for_table(Table::Person);
        let mut out = ArticleRows::new();

        for graph in graphs {
            let owner = graph.person_identifier.as_str();
            if let Err(e) = person::rows(graph, &mut persons) {
                log::warn!("{owner}: person row failed: {e}");
                continue;
            }
            self.stats.entities += 1;

            for article in &graph.articles {
                let pmid = article.pmid.render();
                if pmid.is_empty() {
                    log::warn!("{owner}: skipping article without pmid");
                    self.stats.articles_skipped += 1;
                    continue;
                }
                let ctx = ArticleCtx {
                    person: owner,
                    pmid,
                    article,
                };
                let mut scratch = ArticleRows::new();
                match scratch.build(&ctx) {
                    Ok(()) => {
                        out.append(&mut scratch);
                        self.stats.articles += 1;
                    }
                    Err(e) => {
                        log::warn!("{owner}: skipping article {}: {e}", ctx.pmid);
                        self.stats.articles_skipped += 1;
                    }
                }
            }
        }

        let sets = out.into_vec(persons);
        for rs in &sets {
            if let Some(t) = Table::from_name(rs.table()) {
                *self.stats.rows.entry(t.name()).or_default() += rs.len();
            }
        }
        sets
    }
}

/// Render a fixed list of fields after the `personIdentifier, pmid` key.
pub(crate) fn keyed_row<const N: usize>(ctx: &ArticleCtx<'_>, fields: [String; N]) -> Vec<String> {
    let mut row = Vec::with_capacity(N + 2);
    row.extend(ctx.key());
    row.extend(fields);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use serde_json::json;

    fn graph(v: serde_json::Value) -> FeatureGraph {
        Normalizer::new().normalize(v).unwrap()
    }

    #[test]
    fn one_row_set_per_feature_table() {
        let mut t = Transformer::new();
        let sets = t.transform(&[]);
        let names: Vec<_> = sets.iter().map(|r| r.table().to_string()).collect();
        let expected: Vec<_> = FEATURE_TABLES.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, expected);
        assert!(sets.iter().all(RowSet::is_empty));
    }

    #[test]
    fn article_without_pmid_is_skipped_siblings_kept() {
        let g = graph(json!({
            "personIdentifier": "abc1001",
            "reCiterArticleFeatures": [
                {"articleTitle": "no pmid", "articleKeywords": [{"keyword": "x"}]},
                {"pmid": 42, "articleKeywords": [{"keyword": "Neoplasms"}]}
            ]
        }));
        let mut t = Transformer::new();
        let sets = t.transform(&[g]);
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[1].len(), 1);
        assert_eq!(sets[1].rows()[0][1], "42");
        assert_eq!(sets[5].rows(), &[vec!["abc1001".to_string(), "Neoplasms".into(), "42".into()]]);
        assert_eq!(t.stats().articles, 1);
        assert_eq!(t.stats().articles_skipped, 1);
        assert_eq!(t.stats().rows["person_article_keyword"], 1);
    }

    #[test]
    fn graph_without_articles_still_yields_person_row() {
        let g = graph(json!({"personIdentifier": "abc1001", "dateAdded": 1704164645678_i64}));
        let sets = Transformer::new().transform(&[g]);
        assert_eq!(sets[0].rows()[0][1], "2024-01-02T03:04:05.678+00:00");
        assert!(sets[1..].iter().all(RowSet::is_empty));
    }
}
