//! Identity directory → master data (`identity_temp`) and person types

use serde_json::Value;

use crate::model::IdentityRecord;
use crate::normalize::rewrite_sets;
use crate::rowset::{RowSet, TransformError};
use crate::scalar::sanitize;
use crate::table::Table;

/// Institutional domains, most preferred first.
pub const DEFAULT_PREFERRED_DOMAINS: [&str; 6] = [
    "@med.cornell.edu",
    "@qatar-med.cornell.edu",
    "@nyp.org",
    "@hss.edu",
    "@mskcc.org",
    "@rockefeller.edu",
];

/// Output of one identity transform.
#[derive(Debug)]
pub struct IdentityRows {
    /// Reference row set for `identity_temp`
    pub master: RowSet,
    pub person_types: RowSet,
    /// Items dropped for lack of a `uid` or failing to decode
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct IdentityTransformer {
    preferred_domains: Vec<String>,
}

impl Default for IdentityTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFERRED_DOMAINS.iter().map(|d| d.to_string()).collect())
    }
}

impl IdentityTransformer {
    pub fn new(preferred_domains: Vec<String>) -> Self {
        Self { preferred_domains }
    }

    pub fn transform(&self, items: Vec<Value>) -> Result<IdentityRows, TransformError> {
        let mut master = RowSet::for_table(Table::IdentityTemp);
        let mut person_types = RowSet::for_table(Table::PersonPersonType);
        let mut skipped = 0;

        for item in items {
            let record: IdentityRecord = match serde_json::from_value(rewrite_sets(item)) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("skipping undecodable identity: {e}");
                    skipped += 1;
                    continue;
                }
            };
            let Some(uid) = record.uid.text() else {
                log::warn!("skipping identity without uid");
                skipped += 1;
                continue;
            };
            let identity = &record.identity;

            let emails: Vec<String> = identity.emails.iter().filter_map(email_text).collect();
            let relationship_count = identity
                .known_relationships
                .iter()
                .filter(|rel| rel.get("uid").is_some_and(|u| !u.is_null() && u.as_str() != Some("")))
                .count();

            master.push(vec![
                identity.primary_name.last_name.render(),
                identity.title.render(),
                identity.primary_name.first_name.render(),
                identity.primary_name.middle_name.render(),
                self.primary_email(&emails),
                identity.primary_organizational_unit.render(),
                identity.primary_institution.render(),
                uid.clone(),
                relationship_count.to_string(),
            ])?;

            for person_type in &identity.person_types {
                if let Some(t) = person_type.as_str().map(sanitize).filter(|t| !t.is_empty()) {
                    person_types.push(vec![uid.clone(), t])?;
                }
            }
        }

        log::debug!(
            "identity transform: {} people, {} person types, {skipped} skipped",
            master.len(),
            person_types.len()
        );
        Ok(IdentityRows {
            master,
            person_types,
            skipped,
        })
    }

    /// First address on a preferred domain (domains in priority order), else
    /// the first address, else empty.
    pub fn primary_email(&self, emails: &[String]) -> String {
        self.preferred_domains
            .iter()
            .find_map(|domain| emails.iter().find(|e| e.contains(domain.as_str())))
            .or_else(|| emails.first())
            .cloned()
            .unwrap_or_default()
    }
}

/// Address text truncated at its first comma.
fn email_text(v: &Value) -> Option<String> {
    let s = v.as_str()?;
    let first = s.split(',').next().unwrap_or(s);
    Some(sanitize(first)).filter(|e| !e.is_empty())
}
