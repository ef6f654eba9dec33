//! Scopus affiliation tables: target-author matches and known non-target
//! institutions

use serde_json::Value;

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};
use crate::scalar::sanitize;

/// `person_article_scopus_target_author_affiliation`; entries without a
/// Scopus affiliation id (or id `0`) are dropped.
pub(super) fn target_rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    let affiliations = &ctx.article.evidence.affiliation_evidence.scopus_target_author_affiliation;
    for aff in affiliations {
        let id = aff
            .target_author_institutional_affiliation_article_scopus_affiliation_id
            .render();
        if id.is_empty() || id == "0" {
            continue;
        }
        out.push(keyed_row(
            ctx,
            [
                aff.target_author_institutional_affiliation_source.render(),
                aff.target_author_institutional_affiliation_identity.render(),
                aff.target_author_institutional_affiliation_article_scopus_label
                    .render(),
                id,
                aff.target_author_institutional_affiliation_match_type.render(),
                aff.target_author_institutional_affiliation_match_type_score
                    .render(),
            ],
        ))?;
    }
    Ok(())
}

/// `person_article_scopus_non_target_author_affiliation`: one row per
/// `label,id,count` string.
pub(super) fn non_target_rows(
    ctx: &ArticleCtx<'_>,
    out: &mut RowSet,
) -> Result<(), TransformError> {
    let known = &ctx
        .article
        .evidence
        .affiliation_evidence
        .scopus_non_target_author_affiliation
        .non_target_author_institutional_affiliation_match_known_institution;
    for entry in known {
        let Value::String(s) = entry else {
            log::warn!(
                "{}: non-string known institution on article {}: {entry}",
                ctx.person,
                ctx.pmid
            );
            continue;
        };
        match split_known_institution(s) {
            Some([label, id, count]) => out.push(keyed_row(ctx, [label, id, count]))?,
            None => log::warn!(
                "{}: unexpected known institution format on article {}: {s:?}",
                ctx.person,
                ctx.pmid
            ),
        }
    }
    Ok(())
}

/// Split `label,id,count` on the last two commas so commas inside the label
/// survive.
fn split_known_institution(s: &str) -> Option<[String; 3]> {
    let mut parts = s.rsplitn(3, ',');
    let count = parts.next()?;
    let id = parts.next()?;
    let label = parts.next()?;
    Some([sanitize(label), sanitize(id), sanitize(count)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleFeature;
    use crate::table::Table;
    use serde_json::json;

    #[test]
    fn label_commas_survive() {
        assert_eq!(
            split_known_institution("Weill Cornell Medicine, New York, NY,60007997,12"),
            Some([
                "Weill Cornell Medicine, New York, NY".to_string(),
                "60007997".to_string(),
                "12".to_string()
            ])
        );
        assert_eq!(split_known_institution("no commas"), None);
        assert_eq!(split_known_institution("one,comma"), None);
    }

    fn article(v: serde_json::Value) -> ArticleFeature {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn target_rows_skip_missing_and_zero_ids() {
        let a = article(json!({
            "pmid": 7,
            "evidence": {"affiliationEvidence": {"scopusTargetAuthorAffiliation": [
                {"targetAuthorInstitutionalAffiliationArticleScopusAffiliationId": 60007997,
                 "targetAuthorInstitutionalAffiliationIdentity": "WCM"},
                {"targetAuthorInstitutionalAffiliationArticleScopusAffiliationId": 0},
                {"targetAuthorInstitutionalAffiliationSource": "SCOPUS"}
            ]}}
        }));
        let ctx = ArticleCtx {
            person: "abc1001",
            pmid: "7".into(),
            article: &a,
        };
        let mut out = RowSet::for_table(Table::PersonArticleScopusTargetAuthorAffiliation);
        target_rows(&ctx, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0][3], "WCM");
        assert_eq!(out.rows()[0][5], "60007997");
    }

    #[test]
    fn non_target_accepts_single_string_and_skips_junk() {
        let a = article(json!({
            "pmid": 7,
            "evidence": {"affiliationEvidence": {"scopusNonTargetAuthorAffiliation": {
                "nonTargetAuthorInstitutionalAffiliationMatchKnownInstitution":
                    ["Columbia University,60030162,3", {"odd": true}, "broken"]
            }}}
        }));
        let ctx = ArticleCtx {
            person: "abc1001",
            pmid: "7".into(),
            article: &a,
        };
        let mut out = RowSet::for_table(Table::PersonArticleScopusNonTargetAuthorAffiliation);
        non_target_rows(&ctx, &mut out).unwrap();
        assert_eq!(
            out.rows(),
            &[vec![
                "abc1001".to_string(),
                "7".into(),
                "Columbia University".into(),
                "60030162".into(),
                "3".into()
            ]]
        );
    }
}
