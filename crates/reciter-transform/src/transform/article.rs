//! `person_article`: the top-level scoring row of one article

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    let a = ctx.article;
    let ev = &a.evidence;
    let name = &ev.author_name_evidence;
    let email = &ev.email_evidence;
    let journal = &ev.journal_category_evidence;
    let rel = &ev.relationship_evidence;
    let neg = &rel.relationship_negative_match;
    let edu = &ev.education_year_evidence;
    let gender = &ev.gender_evidence;
    let person_type = &ev.person_type_evidence;
    let count = &ev.article_count_evidence;
    let pubmed = &ev.affiliation_evidence.pubmed_target_author_affiliation;
    let non_target = &ev.affiliation_evidence.scopus_non_target_author_affiliation;
    let fb = &ev.feedback_evidence;

    out.push(keyed_row(
        ctx,
        [
            a.authorship_likelihood_score.render(),
            a.pmcid.render(),
            a.user_assertion.render(),
            a.publication_date_display.render(),
            a.publication_date_standardized.render(),
            a.publication_type.publication_type_canonical.render(),
            a.scopus_doc_id.render(),
            a.journal_title_verbose.render(),
            a.article_title.render(),
            // author name evidence
            name.article_author_name.first_name.render(),
            name.article_author_name.last_name.render(),
            name.institutional_author_name.first_name.render(),
            name.institutional_author_name.middle_name.render(),
            name.institutional_author_name.last_name.render(),
            name.name_match_first_score.render(),
            name.name_match_first_type.render(),
            name.name_match_middle_score.render(),
            name.name_match_middle_type.render(),
            name.name_match_last_score.render(),
            name.name_match_last_type.render(),
            name.name_match_modifier_score.render(),
            name.name_score_total.render(),
            email.email_match.render(),
            email.email_match_score.render(),
            journal.journal_subfield_science_metrix_label.render(),
            journal.journal_subfield_science_metrix_id.render(),
            journal.journal_subfield_department.render(),
            journal.journal_subfield_score.render(),
            rel.relationship_evidence_total_score.render(),
            neg.relationship_minimum_total_score.render(),
            neg.relationship_non_match_count.render(),
            neg.relationship_non_match_score.render(),
            // education, gender, person type, article count
            edu.article_year.render(),
            edu.identity_bachelor_year.render(),
            edu.discrepancy_degree_year_bachelor.render(),
            edu.discrepancy_degree_year_bachelor_score.render(),
            edu.identity_doctoral_year.render(),
            edu.discrepancy_degree_year_doctoral.render(),
            edu.discrepancy_degree_year_doctoral_score.render(),
            gender.gender_score_article.render(),
            gender.gender_score_identity.render(),
            gender.gender_score_identity_article_discrepancy.render(),
            person_type.person_type.render(),
            person_type.person_type_score.render(),
            count.count_articles_retrieved.render(),
            count.article_count_score.render(),
            pubmed
                .target_author_institutional_affiliation_article_pubmed_label
                .render(),
            pubmed
                .target_author_institutional_affiliation_match_type_score
                .render(),
            non_target
                .non_target_author_institutional_affiliation_source
                .render(),
            non_target
                .non_target_author_institutional_affiliation_score
                .render(),
            // bibliographic
            a.date_publication_added_to_entrez.render(),
            a.doi.render(),
            a.issn.preferred(),
            a.issue.render(),
            a.journal_title_iso_abbreviation.render(),
            a.pages.render(),
            a.times_cited.render(),
            a.volume.render(),
            // feedback
            fb.feedback_score_cites.render(),
            fb.feedback_score_co_author_name.render(),
            fb.feedback_score_email.render(),
            fb.feedback_score_institution.render(),
            fb.feedback_score_journal.render(),
            fb.feedback_score_journal_sub_field.render(),
            fb.feedback_score_keyword.render(),
            fb.feedback_score_orcid.render(),
            fb.feedback_score_orcid_co_author.render(),
            fb.feedback_score_organization.render(),
            fb.feedback_score_target_author_name.render(),
            fb.feedback_score_year.render(),
            a.total_article_score_standardized.render(),
            a.total_article_score_non_standardized.render(),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleFeature;
    use crate::table::Table;
    use serde_json::json;

    fn build(article: serde_json::Value) -> Vec<String> {
        let article: ArticleFeature = serde_json::from_value(article).unwrap();
        let ctx = ArticleCtx {
            person: "abc1001",
            pmid: article.pmid.render(),
            article: &article,
        };
        let mut out = RowSet::for_table(Table::PersonArticle);
        rows(&ctx, &mut out).unwrap();
        out.rows()[0].clone()
    }

    fn col(row: &[String], name: &str) -> String {
        let i = Table::PersonArticle
            .columns()
            .iter()
            .position(|c| *c == name)
            .unwrap();
        row[i].clone()
    }

    #[test]
    fn fields_land_in_their_columns() {
        let row = build(json!({
            "pmid": 31234567,
            "userAssertion": "ACCEPTED",
            "articleTitle": "Title with\nnewline",
            "totalArticleScoreStandardized": 9.5,
            "issn": [{"issntype": "Print", "issn": "0028-4793"}],
            "evidence": {
                "authorNameEvidence": {"institutionalAuthorName": {"middleName": "Q"}},
                "relationshipEvidence": {"relationshipNegativeMatch": {"relationshipNonMatchCount": 3}},
                "affiliationEvidence": {
                    "scopusNonTargetAuthorAffiliation": [{"nonTargetAuthorInstitutionalAffiliationScore": -0.5}]
                },
                "feedbackEvidence": {"feedbackScoreYear": 0.25}
            }
        }));
        assert_eq!(row.len(), 74);
        assert_eq!(col(&row, "personIdentifier"), "abc1001");
        assert_eq!(col(&row, "pmid"), "31234567");
        assert_eq!(col(&row, "userAssertion"), "ACCEPTED");
        assert_eq!(col(&row, "articleTitle"), "Title withnewline");
        assert_eq!(col(&row, "institutionalAuthorNameMiddleName"), "Q");
        assert_eq!(col(&row, "relationshipNonMatchCount"), "3");
        assert_eq!(col(&row, "scopusNonTargetAuthorInstitutionalAffiliationScore"), "-0.5");
        assert_eq!(col(&row, "issn"), "0028-4793");
        assert_eq!(col(&row, "feedbackScoreYear"), "0.25");
        assert_eq!(col(&row, "totalArticleScoreStandardized"), "9.5");
    }

    #[test]
    fn missing_scores_are_empty_not_zero() {
        let row = build(json!({"pmid": 1}));
        assert_eq!(col(&row, "authorshipLikelihoodScore"), "");
        assert_eq!(col(&row, "nameScoreTotal"), "");
        assert_eq!(col(&row, "timesCited"), "");
    }
}
