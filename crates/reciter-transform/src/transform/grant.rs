//! `person_article_grant`

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    for grant in &ctx.article.evidence.grant_evidence.grants {
        out.push(keyed_row(
            ctx,
            [
                grant.article_grant.render(),
                grant.grant_match_score.render(),
                grant.institution_grant.render(),
            ],
        ))?;
    }
    Ok(())
}
