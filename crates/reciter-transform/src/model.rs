//! Feature graph model: serde structs for a scored person record
//!
//! Every field is optional in practice. Evidence objects that arrive as
//! non-objects decode to their defaults, single objects are accepted where
//! lists are expected, and scalar leaves accept any JSON type.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::scalar::Scalar;

// === Lenient decoders ===

/// Object → `T`, anything else → `T::default()`.
fn object_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(d)? {
        v @ Value::Object(_) => T::deserialize(v).map_err(de::Error::custom),
        _ => Ok(T::default()),
    }
}

/// List of objects, or a single object; non-object elements are dropped.
fn one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .map(|v| T::deserialize(v).map_err(de::Error::custom))
            .collect(),
        v @ Value::Object(_) => Ok(vec![T::deserialize(v).map_err(de::Error::custom)?]),
        _ => Ok(Vec::new()),
    }
}

/// List of scalars, or a single scalar; `null` is an empty list.
fn scalar_list<'de, D>(d: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

/// First element of a list, a single object, or default.
fn first_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(d)? {
        Value::Array(items) => match items.into_iter().find(Value::is_object) {
            Some(v) => T::deserialize(v).map_err(de::Error::custom),
            None => Ok(T::default()),
        },
        v @ Value::Object(_) => T::deserialize(v).map_err(de::Error::custom),
        _ => Ok(T::default()),
    }
}

// === Person level ===

/// Canonical scored record of one person.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureGraph {
    /// Resolved by the normalizer (`personIdentifier`, else legacy `uid`)
    #[serde(skip)]
    pub person_identifier: String,
    pub date_added: Scalar,
    pub date_updated: Scalar,
    pub precision: Scalar,
    pub recall: Scalar,
    pub count_suggested_articles: Scalar,
    pub count_pending_articles: Scalar,
    pub overall_accuracy: Scalar,
    pub mode: Scalar,
    /// Decoded one by one by the normalizer
    #[serde(skip)]
    pub articles: Vec<ArticleFeature>,
}

// === Article level ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleFeature {
    pub pmid: Scalar,
    pub pmcid: Scalar,
    pub authorship_likelihood_score: Scalar,
    pub user_assertion: Scalar,
    pub publication_date_display: Scalar,
    pub publication_date_standardized: Scalar,
    #[serde(deserialize_with = "object_or_default")]
    pub publication_type: PublicationType,
    #[serde(rename = "scopusDocID")]
    pub scopus_doc_id: Scalar,
    pub journal_title_verbose: Scalar,
    pub article_title: Scalar,
    pub date_publication_added_to_entrez: Scalar,
    pub doi: Scalar,
    #[serde(deserialize_with = "issn")]
    pub issn: Issn,
    pub issue: Scalar,
    #[serde(rename = "journalTitleISOabbreviation")]
    pub journal_title_iso_abbreviation: Scalar,
    pub pages: Scalar,
    pub times_cited: Scalar,
    pub volume: Scalar,
    pub total_article_score_standardized: Scalar,
    pub total_article_score_non_standardized: Scalar,
    #[serde(deserialize_with = "object_or_default")]
    pub evidence: Evidence,
    #[serde(deserialize_with = "one_or_many")]
    pub article_keywords: Vec<Keyword>,
    #[serde(rename = "reCiterArticleAuthorFeatures", deserialize_with = "one_or_many")]
    pub authors: Vec<AuthorFeature>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicationType {
    pub publication_type_canonical: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IssnEntry {
    pub issntype: Scalar,
    pub issn: Scalar,
}

/// Typed ISSN list, or a bare value from older records.
#[derive(Debug)]
pub enum Issn {
    Typed(Vec<IssnEntry>),
    Plain(Scalar),
}

impl Default for Issn {
    fn default() -> Self {
        Issn::Plain(Scalar::default())
    }
}

const ISSN_PRIORITY: [&str; 3] = ["Linking", "Print", "Electronic"];

impl Issn {
    /// Linking, then Print, then Electronic; empty when none is typed.
    pub fn preferred(&self) -> String {
        match self {
            Issn::Plain(s) => s.render(),
            Issn::Typed(entries) => ISSN_PRIORITY
                .iter()
                .find_map(|wanted| {
                    entries
                        .iter()
                        .find(|e| e.issntype.render().eq_ignore_ascii_case(wanted))
                        .and_then(|e| e.issn.text())
                })
                .unwrap_or_default(),
        }
    }
}

fn issn<'de, D: Deserializer<'de>>(d: D) -> Result<Issn, D::Error> {
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(Issn::Typed(
            items
                .into_iter()
                .filter(Value::is_object)
                .map(|v| IssnEntry::deserialize(v).map_err(de::Error::custom))
                .collect::<Result<_, _>>()?,
        )),
        v @ Value::Object(_) => Ok(Issn::Typed(vec![
            IssnEntry::deserialize(v).map_err(de::Error::custom)?,
        ])),
        other => Ok(Issn::Plain(Scalar::new(other))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Keyword {
    pub keyword: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorFeature {
    pub first_name: Scalar,
    pub last_name: Scalar,
    pub equal_contrib: Scalar,
    pub rank: Scalar,
    pub orcid: Scalar,
    pub target_author: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonName {
    pub first_name: Scalar,
    pub middle_name: Scalar,
    pub last_name: Scalar,
}

// === Evidence ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Evidence {
    #[serde(deserialize_with = "object_or_default")]
    pub author_name_evidence: AuthorNameEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub email_evidence: EmailEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub journal_category_evidence: JournalCategoryEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub relationship_evidence: RelationshipEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub education_year_evidence: EducationYearEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub gender_evidence: GenderEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub person_type_evidence: PersonTypeEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub article_count_evidence: ArticleCountEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub affiliation_evidence: AffiliationEvidence,
    #[serde(deserialize_with = "object_or_default")]
    pub feedback_evidence: FeedbackEvidence,
    #[serde(deserialize_with = "one_or_many")]
    pub organizational_unit_evidence: Vec<OrganizationalUnitEvidence>,
    #[serde(deserialize_with = "object_or_default")]
    pub grant_evidence: GrantEvidence,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorNameEvidence {
    #[serde(deserialize_with = "object_or_default")]
    pub article_author_name: PersonName,
    #[serde(deserialize_with = "object_or_default")]
    pub institutional_author_name: PersonName,
    pub name_match_first_score: Scalar,
    pub name_match_first_type: Scalar,
    pub name_match_middle_score: Scalar,
    pub name_match_middle_type: Scalar,
    pub name_match_last_score: Scalar,
    pub name_match_last_type: Scalar,
    pub name_match_modifier_score: Scalar,
    pub name_score_total: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailEvidence {
    pub email_match: Scalar,
    pub email_match_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalCategoryEvidence {
    pub journal_subfield_science_metrix_label: Scalar,
    #[serde(rename = "journalSubfieldScienceMetrixID")]
    pub journal_subfield_science_metrix_id: Scalar,
    pub journal_subfield_department: Scalar,
    pub journal_subfield_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipEvidence {
    pub relationship_evidence_total_score: Scalar,
    #[serde(deserialize_with = "object_or_default")]
    pub relationship_negative_match: RelationshipNegativeMatch,
    #[serde(deserialize_with = "one_or_many")]
    pub relationship_positive_match: Vec<RelationshipPositiveMatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipNegativeMatch {
    pub relationship_minimum_total_score: Scalar,
    pub relationship_non_match_count: Scalar,
    pub relationship_non_match_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipPositiveMatch {
    #[serde(deserialize_with = "object_or_default")]
    pub relationship_name_article: PersonName,
    #[serde(alias = "relationshipNameIdenity", deserialize_with = "object_or_default")]
    pub relationship_name_identity: PersonName,
    pub relationship_type: Scalar,
    pub relationship_match_type: Scalar,
    pub relationship_matching_score: Scalar,
    pub relationship_verbose_match_modifier_score: Scalar,
    pub relationship_match_modifier_mentor: Scalar,
    pub relationship_match_modifier_mentor_senior_author: Scalar,
    pub relationship_match_modifier_manager: Scalar,
    pub relationship_match_modifier_manager_senior_author: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationYearEvidence {
    pub article_year: Scalar,
    pub identity_bachelor_year: Scalar,
    pub discrepancy_degree_year_bachelor: Scalar,
    pub discrepancy_degree_year_bachelor_score: Scalar,
    pub identity_doctoral_year: Scalar,
    pub discrepancy_degree_year_doctoral: Scalar,
    pub discrepancy_degree_year_doctoral_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenderEvidence {
    pub gender_score_article: Scalar,
    pub gender_score_identity: Scalar,
    pub gender_score_identity_article_discrepancy: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonTypeEvidence {
    pub person_type: Scalar,
    pub person_type_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleCountEvidence {
    pub count_articles_retrieved: Scalar,
    pub article_count_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AffiliationEvidence {
    #[serde(deserialize_with = "object_or_default")]
    pub pubmed_target_author_affiliation: PubmedTargetAuthorAffiliation,
    /// Older records carry a list here; the first entry is the one that counts
    #[serde(deserialize_with = "first_or_default")]
    pub scopus_non_target_author_affiliation: ScopusNonTargetAuthorAffiliation,
    #[serde(deserialize_with = "one_or_many")]
    pub scopus_target_author_affiliation: Vec<ScopusTargetAuthorAffiliation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PubmedTargetAuthorAffiliation {
    pub target_author_institutional_affiliation_article_pubmed_label: Scalar,
    pub target_author_institutional_affiliation_match_type_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopusNonTargetAuthorAffiliation {
    pub non_target_author_institutional_affiliation_source: Scalar,
    pub non_target_author_institutional_affiliation_score: Scalar,
    /// `label,id,count` strings
    #[serde(deserialize_with = "scalar_list")]
    pub non_target_author_institutional_affiliation_match_known_institution: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopusTargetAuthorAffiliation {
    pub target_author_institutional_affiliation_source: Scalar,
    pub target_author_institutional_affiliation_identity: Scalar,
    pub target_author_institutional_affiliation_article_scopus_label: Scalar,
    pub target_author_institutional_affiliation_article_scopus_affiliation_id: Scalar,
    pub target_author_institutional_affiliation_match_type: Scalar,
    pub target_author_institutional_affiliation_match_type_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackEvidence {
    pub feedback_score_cites: Scalar,
    pub feedback_score_co_author_name: Scalar,
    pub feedback_score_email: Scalar,
    pub feedback_score_institution: Scalar,
    pub feedback_score_journal: Scalar,
    pub feedback_score_journal_sub_field: Scalar,
    pub feedback_score_keyword: Scalar,
    pub feedback_score_orcid: Scalar,
    pub feedback_score_orcid_co_author: Scalar,
    pub feedback_score_organization: Scalar,
    pub feedback_score_target_author_name: Scalar,
    pub feedback_score_year: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationalUnitEvidence {
    pub identity_organizational_unit: Scalar,
    pub article_affiliation: Scalar,
    pub organizational_unit_type: Scalar,
    pub organizational_unit_matching_score: Scalar,
    pub organizational_unit_modifier: Scalar,
    pub organizational_unit_modifier_score: Scalar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GrantEvidence {
    #[serde(deserialize_with = "one_or_many")]
    pub grants: Vec<Grant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Grant {
    pub article_grant: Scalar,
    pub grant_match_score: Scalar,
    pub institution_grant: Scalar,
}

// === Identity directory ===

/// One item of the identity table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IdentityRecord {
    pub uid: Scalar,
    #[serde(deserialize_with = "object_or_default")]
    pub identity: Identity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    #[serde(deserialize_with = "object_or_default")]
    pub primary_name: PersonName,
    pub title: Scalar,
    #[serde(deserialize_with = "scalar_list")]
    pub emails: Vec<Value>,
    pub primary_organizational_unit: Scalar,
    pub primary_institution: Scalar,
    #[serde(deserialize_with = "scalar_list")]
    pub known_relationships: Vec<Value>,
    #[serde(deserialize_with = "scalar_list")]
    pub person_types: Vec<Value>,
}
