//! End-to-end decode + flatten of a realistic scored record

use reciter_transform::{FEATURE_TABLES, Normalizer, RowSet, Table, Transformer};
use serde_json::json;

fn sample_item() -> serde_json::Value {
    json!({
        "uid": "jad1001",
        "usingS3": 0,
        "reCiterFeature": {
            "personIdentifier": "jad1001",
            "dateAdded": 1704164645678_i64,
            "dateUpdated": "NULL",
            "precision": 0.91,
            "recall": 0.88,
            "countSuggestedArticles": 12,
            "countPendingArticles": 3,
            "overallAccuracy": 0.9,
            "mode": "AS_EVIDENCE_API",
            "reCiterArticleFeatures": [
                {
                    "pmid": 35000001,
                    "userAssertion": "ACCEPTED",
                    "articleTitle": "Outcomes of  a trial\r\n",
                    "issn": [
                        {"issntype": "Electronic", "issn": "1533-4406"},
                        {"issntype": "Print", "issn": "0028-4793"}
                    ],
                    "articleKeywords": [{"keyword": "Humans"}, {"keyword": " "}, {"keyword": "Adult"}],
                    "reCiterArticleAuthorFeatures": [
                        {"firstName": "Jane", "lastName": "Doe", "rank": 1, "targetAuthor": true},
                        {"firstName": "John", "lastName": "Roe", "rank": 2, "targetAuthor": false}
                    ],
                    "evidence": {
                        "organizationalUnitEvidence": {
                            "identityOrganizationalUnit": "Medicine",
                            "organizationalUnitMatchingScore": 2.0
                        },
                        "grantEvidence": {"grants": [{"articleGrant": "R01 CA000001", "grantMatchScore": 1.5}]},
                        "relationshipEvidence": {
                            "relationshipEvidenceTotalScore": 1.2,
                            "relationshipPositiveMatch": [{
                                "relationshipNameArticle": {"firstName": "A", "lastName": "Mentor"},
                                "relationshipNameIdenity": {"firstName": "Alan", "lastName": "Mentor"},
                                "relationshipType": {"SS": ["MENTOR", "CO_AUTHOR"]}
                            }]
                        },
                        "affiliationEvidence": {
                            "scopusTargetAuthorAffiliation": [{
                                "targetAuthorInstitutionalAffiliationArticleScopusAffiliationId": 60007997,
                                "targetAuthorInstitutionalAffiliationMatchType": "POSITIVE_MATCH_INDIVIDUAL"
                            }],
                            "scopusNonTargetAuthorAffiliation": {
                                "nonTargetAuthorInstitutionalAffiliationMatchKnownInstitution":
                                    "Memorial Sloan Kettering, NY,60008358,4"
                            }
                        },
                        "feedbackEvidence": "unavailable"
                    }
                },
                {"articleTitle": "orphan without pmid"},
                42
            ]
        }
    })
}

fn table<'a>(sets: &'a [RowSet], t: Table) -> &'a RowSet {
    sets.iter().find(|r| r.table() == t.name()).unwrap()
}

#[test]
fn flattens_one_record_into_every_table() {
    let mut normalizer = Normalizer::new();
    let graph = normalizer.normalize(sample_item()).unwrap();
    assert_eq!(normalizer.stats().articles_rejected, 1);

    let mut transformer = Transformer::new();
    let sets = transformer.transform(&[graph]);
    assert_eq!(sets.len(), FEATURE_TABLES.len());

    let person = table(&sets, Table::Person);
    assert_eq!(
        person.rows()[0],
        vec![
            "jad1001",
            "2024-01-02T03:04:05.678+00:00",
            "",
            "0.91",
            "0.88",
            "12",
            "3",
            "0.9",
            "AS_EVIDENCE_API"
        ]
    );

    let article = table(&sets, Table::PersonArticle);
    assert_eq!(article.len(), 1);
    let col = |name: &str| {
        let i = article.header().iter().position(|h| h == name).unwrap();
        article.rows()[0][i].clone()
    };
    assert_eq!(col("articleTitle"), "Outcomes of  a trial");
    assert_eq!(col("issn"), "0028-4793");
    assert_eq!(col("feedbackScoreCites"), "");
    assert_eq!(col("relationshipEvidenceTotalScore"), "1.2");

    let keywords = table(&sets, Table::PersonArticleKeyword);
    let kw: Vec<_> = keywords.rows().iter().map(|r| r[1].as_str()).collect();
    assert_eq!(kw, vec!["Humans", "Adult"]);

    let authors = table(&sets, Table::PersonArticleAuthor);
    let flags: Vec<_> = authors.rows().iter().map(|r| r[7].as_str()).collect();
    assert_eq!(flags, vec!["1", "0"]);

    assert_eq!(table(&sets, Table::PersonArticleDepartment).len(), 1);
    assert_eq!(table(&sets, Table::PersonArticleGrant).len(), 1);

    let rel = table(&sets, Table::PersonArticleRelationship);
    assert_eq!(rel.rows()[0][4], "Alan");
    assert_eq!(rel.rows()[0][6], "CO_AUTHOR,MENTOR");

    assert_eq!(table(&sets, Table::PersonArticleScopusTargetAuthorAffiliation).len(), 1);
    let non_target = table(&sets, Table::PersonArticleScopusNonTargetAuthorAffiliation);
    assert_eq!(non_target.rows()[0][2], "Memorial Sloan Kettering, NY");

    let stats = transformer.stats();
    assert_eq!(stats.entities, 1);
    assert_eq!(stats.articles, 1);
    assert_eq!(stats.articles_skipped, 1);
}

#[test]
fn every_row_matches_header_arity() {
    let graph = Normalizer::new().normalize(sample_item()).unwrap();
    for rs in Transformer::new().transform(&[graph]) {
        for row in rs.rows() {
            assert_eq!(row.len(), rs.header().len(), "{}", rs.table());
        }
    }
}
