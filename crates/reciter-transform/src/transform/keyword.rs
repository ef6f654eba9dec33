//! `person_article_keyword`; column order is `personIdentifier, keyword, pmid`

use super::ArticleCtx;
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    for kw in &ctx.article.article_keywords {
        let Some(keyword) = kw.keyword.text() else {
            log::debug!("{}: empty keyword on article {}", ctx.person, ctx.pmid);
            continue;
        };
        out.push(vec![ctx.person.to_string(), keyword, ctx.pmid.clone()])?;
    }
    Ok(())
}
