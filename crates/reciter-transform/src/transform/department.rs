//! `person_article_department`: organizational-unit evidence

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    for unit in &ctx.article.evidence.organizational_unit_evidence {
        out.push(keyed_row(
            ctx,
            [
                unit.identity_organizational_unit.render(),
                unit.article_affiliation.render(),
                unit.organizational_unit_type.render(),
                unit.organizational_unit_matching_score.render(),
                unit.organizational_unit_modifier.render(),
                unit.organizational_unit_modifier_score.render(),
            ],
        ))?;
    }
    Ok(())
}
