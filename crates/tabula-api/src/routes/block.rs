//! Embeddable table

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::collections::HashMap;
use tabula_core::Column;
use tracing::debug;

use crate::render::{ColumnVisibility, render_block};
use crate::state::AppState;

/// Column flags keyed by column key; an absent flag leaves the column visible
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct BlockQuery(HashMap<String, String>);

impl BlockQuery {
    pub fn visibility(&self) -> ColumnVisibility {
        let mut visibility = ColumnVisibility::all();
        for (key, flag) in &self.0 {
            match key.parse::<Column>() {
                Ok(column) => visibility.apply_flag(column, flag),
                Err(e) => debug!("Ignoring block parameter: {}", e),
            }
        }
        visibility
    }
}

/// GET /block
async fn block(State(state): State<AppState>, Query(query): Query<BlockQuery>) -> Html<String> {
    let record_set = state.fetcher.get().await;
    Html(render_block(&record_set, &query.visibility()))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/block", get(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> BlockQuery {
        BlockQuery(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_visibility_flags_by_column_key() {
        let visibility = query(&[("fname", "0"), ("DATE", "off"), ("email", "yes")]).visibility();

        assert!(visibility.is_visible(Column::Id));
        assert!(!visibility.is_visible(Column::FirstName));
        assert!(visibility.is_visible(Column::LastName));
        assert!(visibility.is_visible(Column::Email));
        assert!(!visibility.is_visible(Column::Date));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let visibility = query(&[("phone", "false"), ("page", "2")]).visibility();

        for column in Column::ALL {
            assert!(visibility.is_visible(column));
        }
    }
}
