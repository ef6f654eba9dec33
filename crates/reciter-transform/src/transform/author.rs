//! `person_article_author`: the article's author list

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    for author in &ctx.article.authors {
        let target = if author.target_author.is_truthy() { "1" } else { "0" };
        out.push(keyed_row(
            ctx,
            [
                author.first_name.render(),
                author.last_name.render(),
                author.equal_contrib.render(),
                author.rank.render(),
                author.orcid.render(),
                target.to_string(),
            ],
        ))?;
    }
    Ok(())
}
