//! `person_article_relationship`: positive relationship matches

use super::{ArticleCtx, keyed_row};
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(ctx: &ArticleCtx<'_>, out: &mut RowSet) -> Result<(), TransformError> {
    let evidence = &ctx.article.evidence.relationship_evidence;
    for m in &evidence.relationship_positive_match {
        out.push(keyed_row(
            ctx,
            [
                m.relationship_name_article.first_name.render(),
                m.relationship_name_article.last_name.render(),
                m.relationship_name_identity.first_name.render(),
                m.relationship_name_identity.last_name.render(),
                m.relationship_type.render(),
                m.relationship_match_type.render(),
                m.relationship_matching_score.render(),
                m.relationship_verbose_match_modifier_score.render(),
                m.relationship_match_modifier_mentor.render(),
                m.relationship_match_modifier_mentor_senior_author.render(),
                m.relationship_match_modifier_manager.render(),
                m.relationship_match_modifier_manager_senior_author.render(),
            ],
        ))?;
    }
    Ok(())
}
