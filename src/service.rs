// Request orchestration: validate input, build the query, execute it
// against the store, normalize the rows.
//
// Validation failures are returned before the store is touched; storage
// problems and schema drift are kept distinct so the HTTP layer can map
// them to the right status codes.

use thiserror::Error;

use crate::db::Store;
use crate::normalize::{self, PlayerRecord, SchemaMismatch};
use crate::query::{QueryError, QuerySpec};
use crate::schema::{PositionSelector, UnknownPosition};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    UnknownPosition(#[from] UnknownPosition),

    #[error(transparent)]
    BadQuery(#[from] QueryError),

    #[error("no players matched the requested filter")]
    NoMatches,

    #[error(transparent)]
    SchemaDrift(#[from] SchemaMismatch),

    #[error("storage backend failed")]
    Storage(#[source] anyhow::Error),
}

/// All players of one position group (or the DEF aggregate), ordered by
/// total points. A valid group with no rows is an empty list, not an error.
pub fn players_by_position(
    store: &dyn Store,
    position: &str,
) -> Result<Vec<PlayerRecord>, ServiceError> {
    let selector = PositionSelector::parse(position)?;
    run(store, &QuerySpec::by_position(selector))
}

/// Every rostered player for one team across all position tables. An empty
/// result is reported as no-matches so the HTTP layer can answer 404.
pub fn players_by_team(
    store: &dyn Store,
    team_code: &str,
) -> Result<Vec<PlayerRecord>, ServiceError> {
    let records = run(store, &QuerySpec::by_team(team_code))?;
    if records.is_empty() {
        return Err(ServiceError::NoMatches);
    }
    Ok(records)
}

/// Case-insensitive name search, optionally scoped to one position group.
pub fn search_players(
    store: &dyn Store,
    name: &str,
    position: Option<&str>,
) -> Result<Vec<PlayerRecord>, ServiceError> {
    let scope = position.map(PositionSelector::parse).transpose()?;
    let spec = QuerySpec::search_by_name(name, scope)?;
    let records = run(store, &spec)?;
    if records.is_empty() {
        return Err(ServiceError::NoMatches);
    }
    Ok(records)
}

/// Health probe: one trivial round trip.
pub fn check_health(store: &dyn Store) -> Result<(), ServiceError> {
    store.ping().map_err(ServiceError::Storage)
}

fn run(store: &dyn Store, spec: &QuerySpec) -> Result<Vec<PlayerRecord>, ServiceError> {
    let rows = store.fetch(spec).map_err(ServiceError::Storage)?;
    Ok(normalize::normalize(&rows, spec.projection)?)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
