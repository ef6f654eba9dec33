//! Table catalog: every warehouse table the pipeline writes, with its
//! fixed column order

/// Person tables, in load order.
pub const CATALOG: [Table; 10] = [
    Table::Person,
    Table::PersonArticle,
    Table::PersonArticleAuthor,
    Table::PersonArticleDepartment,
    Table::PersonArticleGrant,
    Table::PersonArticleKeyword,
    Table::PersonArticleRelationship,
    Table::PersonArticleScopusTargetAuthorAffiliation,
    Table::PersonArticleScopusNonTargetAuthorAffiliation,
    Table::PersonPersonType,
];

/// Every table the schema knows about.
pub const ALL: [Table; 14] = [
    Table::Person,
    Table::PersonArticle,
    Table::PersonArticleAuthor,
    Table::PersonArticleDepartment,
    Table::PersonArticleGrant,
    Table::PersonArticleKeyword,
    Table::PersonArticleRelationship,
    Table::PersonArticleScopusTargetAuthorAffiliation,
    Table::PersonArticleScopusNonTargetAuthorAffiliation,
    Table::PersonPersonType,
    Table::IdentityTemp,
    Table::AnalysisNih,
    Table::AnalysisNihCites,
    Table::AnalysisNihCitesClin,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Person,
    PersonArticle,
    PersonArticleAuthor,
    PersonArticleDepartment,
    PersonArticleGrant,
    PersonArticleKeyword,
    PersonArticleRelationship,
    PersonArticleScopusTargetAuthorAffiliation,
    PersonArticleScopusNonTargetAuthorAffiliation,
    PersonPersonType,
    IdentityTemp,
    AnalysisNih,
    AnalysisNihCites,
    AnalysisNihCitesClin,
}

/// Master-data columns on `person`, filled from `identity_temp`.
pub const PERSON_MASTER_COLUMNS: [&str; 7] = [
    "firstName",
    "middleName",
    "lastName",
    "title",
    "primaryEmail",
    "primaryOrganizationalUnit",
    "primaryInstitution",
];

const PERSON: &[&str] = &[
    "personIdentifier",
    "dateAdded",
    "dateUpdated",
    "precision",
    "recall",
    "countSuggestedArticles",
    "countPendingArticles",
    "overallAccuracy",
    "mode",
];

const PERSON_ARTICLE: &[&str] = &[
    "personIdentifier",
    "pmid",
    "authorshipLikelihoodScore",
    "pmcid",
    "userAssertion",
    "publicationDateDisplay",
    "publicationDateStandardized",
    "publicationTypeCanonical",
    "scopusDocID",
    "journalTitleVerbose",
    "articleTitle",
    "articleAuthorNameFirstName",
    "articleAuthorNameLastName",
    "institutionalAuthorNameFirstName",
    "institutionalAuthorNameMiddleName",
    "institutionalAuthorNameLastName",
    "nameMatchFirstScore",
    "nameMatchFirstType",
    "nameMatchMiddleScore",
    "nameMatchMiddleType",
    "nameMatchLastScore",
    "nameMatchLastType",
    "nameMatchModifierScore",
    "nameScoreTotal",
    "emailMatch",
    "emailMatchScore",
    "journalSubfieldScienceMetrixLabel",
    "journalSubfieldScienceMetrixID",
    "journalSubfieldDepartment",
    "journalSubfieldScore",
    "relationshipEvidenceTotalScore",
    "relationshipMinimumTotalScore",
    "relationshipNonMatchCount",
    "relationshipNonMatchScore",
    "articleYear",
    "identityBachelorYear",
    "discrepancyDegreeYearBachelor",
    "discrepancyDegreeYearBachelorScore",
    "identityDoctoralYear",
    "discrepancyDegreeYearDoctoral",
    "discrepancyDegreeYearDoctoralScore",
    "genderScoreArticle",
    "genderScoreIdentity",
    "genderScoreIdentityArticleDiscrepancy",
    "personType",
    "personTypeScore",
    "countArticlesRetrieved",
    "articleCountScore",
    "targetAuthorInstitutionalAffiliationArticlePubmedLabel",
    "pubmedTargetAuthorInstitutionalAffiliationMatchTypeScore",
    "scopusNonTargetAuthorInstitutionalAffiliationSource",
    "scopusNonTargetAuthorInstitutionalAffiliationScore",
    "datePublicationAddedToEntrez",
    "doi",
    "issn",
    "issue",
    "journalTitleISOabbreviation",
    "pages",
    "timesCited",
    "volume",
    "feedbackScoreCites",
    "feedbackScoreCoAuthorName",
    "feedbackScoreEmail",
    "feedbackScoreInstitution",
    "feedbackScoreJournal",
    "feedbackScoreJournalSubField",
    "feedbackScoreKeyword",
    "feedbackScoreOrcid",
    "feedbackScoreOrcidCoAuthor",
    "feedbackScoreOrganization",
    "feedbackScoreTargetAuthorName",
    "feedbackScoreYear",
    "totalArticleScoreStandardized",
    "totalArticleScoreNonStandardized",
];

const PERSON_ARTICLE_AUTHOR: &[&str] = &[
    "personIdentifier",
    "pmid",
    "firstName",
    "lastName",
    "equalContrib",
    "rank",
    "orcid",
    "targetAuthor",
];

const PERSON_ARTICLE_DEPARTMENT: &[&str] = &[
    "personIdentifier",
    "pmid",
    "identityOrganizationalUnit",
    "articleAffiliation",
    "organizationalUnitType",
    "organizationalUnitMatchingScore",
    "organizationalUnitModifier",
    "organizationalUnitModifierScore",
];

const PERSON_ARTICLE_GRANT: &[&str] = &[
    "personIdentifier",
    "pmid",
    "articleGrant",
    "grantMatchScore",
    "institutionGrant",
];

const PERSON_ARTICLE_KEYWORD: &[&str] = &["personIdentifier", "keyword", "pmid"];

const PERSON_ARTICLE_RELATIONSHIP: &[&str] = &[
    "personIdentifier",
    "pmid",
    "relationshipNameArticleFirstName",
    "relationshipNameArticleLastName",
    "relationshipNameIdentityFirstName",
    "relationshipNameIdentityLastName",
    "relationshipType",
    "relationshipMatchType",
    "relationshipMatchingScore",
    "relationshipVerboseMatchModifierScore",
    "relationshipMatchModifierMentor",
    "relationshipMatchModifierMentorSeniorAuthor",
    "relationshipMatchModifierManager",
    "relationshipMatchModifierManagerSeniorAuthor",
];

const PERSON_ARTICLE_SCOPUS_TARGET: &[&str] = &[
    "personIdentifier",
    "pmid",
    "targetAuthorInstitutionalAffiliationSource",
    "scopusTargetAuthorInstitutionalAffiliationIdentity",
    "targetAuthorInstitutionalAffiliationArticleScopusLabel",
    "targetAuthorInstitutionalAffiliationArticleScopusAffiliationId",
    "targetAuthorInstitutionalAffiliationMatchType",
    "targetAuthorInstitutionalAffiliationMatchTypeScore",
];

const PERSON_ARTICLE_SCOPUS_NON_TARGET: &[&str] = &[
    "personIdentifier",
    "pmid",
    "nonTargetAuthorInstitutionLabel",
    "nonTargetAuthorInstitutionID",
    "nonTargetAuthorInstitutionCount",
];

const PERSON_PERSON_TYPE: &[&str] = &["personIdentifier", "personType"];

const IDENTITY_TEMP: &[&str] = &[
    "lastName",
    "title",
    "firstName",
    "middleName",
    "primaryEmail",
    "primaryOrganizationalUnit",
    "primaryInstitution",
    "personIdentifier",
    "knownRelationshipCount",
];

const ANALYSIS_NIH: &[&str] = &[
    "pmid",
    "year",
    "is_research_article",
    "is_clinical",
    "relative_citation_ratio",
    "nih_percentile",
    "citation_count",
    "citations_per_year",
    "expected_citations_per_year",
    "field_citation_rate",
    "provisional",
    "doi",
    "human",
    "animal",
    "molecular_cellular",
    "apt",
    "x_coord",
    "y_coord",
];

const CITATION_EDGE: &[&str] = &["cited_pmid", "citing_pmid"];

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Person => "person",
            Table::PersonArticle => "person_article",
            Table::PersonArticleAuthor => "person_article_author",
            Table::PersonArticleDepartment => "person_article_department",
            Table::PersonArticleGrant => "person_article_grant",
            Table::PersonArticleKeyword => "person_article_keyword",
            Table::PersonArticleRelationship => "person_article_relationship",
            Table::PersonArticleScopusTargetAuthorAffiliation => {
                "person_article_scopus_target_author_affiliation"
            }
            Table::PersonArticleScopusNonTargetAuthorAffiliation => {
                "person_article_scopus_non_target_author_affiliation"
            }
            Table::PersonPersonType => "person_person_type",
            Table::IdentityTemp => "identity_temp",
            Table::AnalysisNih => "analysis_nih",
            Table::AnalysisNihCites => "analysis_nih_cites",
            Table::AnalysisNihCitesClin => "analysis_nih_cites_clin",
        }
    }

    /// Columns written by the pipeline, in staging-file order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Person => PERSON,
            Table::PersonArticle => PERSON_ARTICLE,
            Table::PersonArticleAuthor => PERSON_ARTICLE_AUTHOR,
            Table::PersonArticleDepartment => PERSON_ARTICLE_DEPARTMENT,
            Table::PersonArticleGrant => PERSON_ARTICLE_GRANT,
            Table::PersonArticleKeyword => PERSON_ARTICLE_KEYWORD,
            Table::PersonArticleRelationship => PERSON_ARTICLE_RELATIONSHIP,
            Table::PersonArticleScopusTargetAuthorAffiliation => PERSON_ARTICLE_SCOPUS_TARGET,
            Table::PersonArticleScopusNonTargetAuthorAffiliation => PERSON_ARTICLE_SCOPUS_NON_TARGET,
            Table::PersonPersonType => PERSON_PERSON_TYPE,
            Table::IdentityTemp => IDENTITY_TEMP,
            Table::AnalysisNih => ANALYSIS_NIH,
            Table::AnalysisNihCites | Table::AnalysisNihCitesClin => CITATION_EDGE,
        }
    }

    /// Subject key used to supersede rows on append.
    pub fn subject_key(self) -> Option<&'static str> {
        match self {
            Table::AnalysisNih | Table::AnalysisNihCites | Table::AnalysisNihCitesClin => None,
            _ => Some("personIdentifier"),
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
