//! `person`: one summary row per feature graph

use crate::model::FeatureGraph;
use crate::rowset::{RowSet, TransformError};

pub(super) fn rows(graph: &FeatureGraph, out: &mut RowSet) -> Result<(), TransformError> {
    out.push(vec![
        graph.person_identifier.clone(),
        graph.date_added.render_epoch_millis(),
        graph.date_updated.render_epoch_millis(),
        graph.precision.render(),
        graph.recall.render(),
        graph.count_suggested_articles.render(),
        graph.count_pending_articles.render(),
        graph.overall_accuracy.render(),
        graph.mode.render(),
    ])
}
