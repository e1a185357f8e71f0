// Season-fixture loading: JSON stat exports into the position tables.
//
// Fixture keys are the provider's PascalCase names. Rows missing a player
// id or name are skipped with a warning rather than failing the file, and
// a missing season file is a warning so partial fixture sets still load.
// Total points and rank are read as provided; computing them is the
// provider's job, not this service's.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::db::{Database, StatRowInsert, Team};
use crate::schema::{Position, ALL_POSITIONS};

/// Rank assigned to fixture rows that arrive without one, sorting them
/// behind every ranked player.
const UNRANKED: i64 = 999;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub teams: usize,
    pub players: usize,
    pub skipped: usize,
}

/// Load `teams.json` plus every `{TAG}_season.json` found in `data_dir`.
/// Teams load first so the stat tables' team references resolve.
pub fn load_fixtures(db: &Database, data_dir: &Path) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();

    summary.teams = load_teams(db, &data_dir.join("teams.json"))?;
    info!("Loaded {} teams", summary.teams);

    for position in ALL_POSITIONS {
        let path = data_dir.join(format!("{}_season.json", position.tag()));
        if !path.exists() {
            warn!("No season fixture for {position} at {}", path.display());
            continue;
        }

        let (loaded, skipped) = load_position(db, position, &path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!("Loaded {loaded} {position} rows ({skipped} skipped)");
        summary.players += loaded;
        summary.skipped += skipped;
    }

    Ok(summary)
}

fn load_teams(db: &Database, path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let fixtures: Vec<TeamFixture> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let teams: Vec<Team> = fixtures
        .into_iter()
        .map(|t| Team {
            code: t.team_code,
            name: t.team_name,
            division: t.division,
        })
        .collect();

    db.upsert_teams(&teams)
}

fn load_position(db: &Database, position: Position, path: &Path) -> Result<(usize, usize)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: Vec<JsonValue> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut rows = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for value in &raw {
        match parse_row(position, value) {
            Some(row) => rows.push(row),
            None => {
                warn!("Skipping {position} fixture row without player id/name");
                skipped += 1;
            }
        }
    }

    db.import_stats(position, &rows)?;
    Ok((rows.len(), skipped))
}

/// Convert one fixture object into an insert row, or `None` when the row
/// has no usable identity. The stat vector is aligned with the position
/// schema's column order.
fn parse_row(position: Position, value: &JsonValue) -> Option<StatRowInsert> {
    match position {
        Position::QB => {
            let p: QbSeason = deserialize(value)?;
            build_row(
                p.base,
                vec![
                    p.passing_yards.unwrap_or(0.0),
                    p.passing_tds.unwrap_or(0.0),
                    p.interceptions.unwrap_or(0.0),
                    p.rushing_yards.unwrap_or(0.0),
                    p.rushing_tds.unwrap_or(0.0),
                ],
            )
        }
        Position::RB => {
            let p: RbSeason = deserialize(value)?;
            build_row(
                p.base,
                vec![
                    p.rushing_yards.unwrap_or(0.0),
                    p.rushing_tds.unwrap_or(0.0),
                    p.receptions.unwrap_or(0.0),
                    p.receiving_yards.unwrap_or(0.0),
                    p.receiving_tds.unwrap_or(0.0),
                ],
            )
        }
        Position::WR | Position::TE => {
            let p: ReceivingSeason = deserialize(value)?;
            build_row(
                p.base,
                vec![
                    p.receptions.unwrap_or(0.0),
                    p.targets.unwrap_or(0.0),
                    p.receiving_yards.unwrap_or(0.0),
                    p.receiving_tds.unwrap_or(0.0),
                ],
            )
        }
        Position::K => {
            let p: KickerSeason = deserialize(value)?;
            // Attempt totals are not in the fixture; they are derived from
            // the per-range made/missed counts the provider does ship.
            let field_goals = p.made_total();
            let field_goal_attempts = field_goals + p.missed_total();
            let extra_points = p.pat_made.unwrap_or(0.0);
            let extra_point_attempts = extra_points + p.pat_missed.unwrap_or(0.0);
            build_row(
                p.base,
                vec![
                    field_goals,
                    field_goal_attempts,
                    extra_points,
                    extra_point_attempts,
                ],
            )
        }
        Position::LB | Position::DL | Position::DB => {
            let p: DefenseSeason = deserialize(value)?;
            build_row(
                p.base,
                vec![
                    p.tackles.unwrap_or(0.0),
                    p.assisted_tackles.unwrap_or(0.0),
                    p.sacks.unwrap_or(0.0),
                    p.tackles_for_loss.unwrap_or(0.0),
                    p.interceptions.unwrap_or(0.0),
                    p.forced_fumbles.unwrap_or(0.0),
                    p.fumble_recoveries.unwrap_or(0.0),
                    p.passes_defended.unwrap_or(0.0),
                    p.qb_hits.unwrap_or(0.0),
                ],
            )
        }
    }
}

fn deserialize<'de, T: Deserialize<'de>>(value: &'de JsonValue) -> Option<T> {
    T::deserialize(value).ok()
}

fn build_row(base: SeasonBase, stats: Vec<f64>) -> Option<StatRowInsert> {
    let player_id = base.player_id?;
    let name = base.player_name?;
    let team = base.team.filter(|t| !t.trim().is_empty());
    Some(StatRowInsert {
        player_id,
        name,
        team,
        stats,
        total_points: base.total_points.unwrap_or(0.0),
        rank: base.rank.map(|r| r as i64).unwrap_or(UNRANKED),
    })
}

// ---------------------------------------------------------------------------
// Fixture shapes
// ---------------------------------------------------------------------------

/// Fields common to every season fixture row.
#[derive(Debug, Deserialize)]
struct SeasonBase {
    #[serde(rename = "PlayerId")]
    player_id: Option<String>,
    #[serde(rename = "PlayerName")]
    player_name: Option<String>,
    #[serde(rename = "Team")]
    team: Option<String>,
    #[serde(rename = "TotalPoints")]
    total_points: Option<f64>,
    #[serde(rename = "Rank")]
    rank: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TeamFixture {
    team_code: String,
    team_name: String,
    #[serde(default)]
    division: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QbSeason {
    #[serde(flatten)]
    base: SeasonBase,
    #[serde(rename = "PassingYDS")]
    passing_yards: Option<f64>,
    #[serde(rename = "PassingTD")]
    passing_tds: Option<f64>,
    #[serde(rename = "PassingInt")]
    interceptions: Option<f64>,
    #[serde(rename = "RushingYDS")]
    rushing_yards: Option<f64>,
    #[serde(rename = "RushingTD")]
    rushing_tds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RbSeason {
    #[serde(flatten)]
    base: SeasonBase,
    #[serde(rename = "RushingYDS")]
    rushing_yards: Option<f64>,
    #[serde(rename = "RushingTD")]
    rushing_tds: Option<f64>,
    #[serde(rename = "ReceivingRec")]
    receptions: Option<f64>,
    #[serde(rename = "ReceivingYDS")]
    receiving_yards: Option<f64>,
    #[serde(rename = "ReceivingTD")]
    receiving_tds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReceivingSeason {
    #[serde(flatten)]
    base: SeasonBase,
    #[serde(rename = "ReceivingRec")]
    receptions: Option<f64>,
    #[serde(rename = "Targets")]
    targets: Option<f64>,
    #[serde(rename = "ReceivingYDS")]
    receiving_yards: Option<f64>,
    #[serde(rename = "ReceivingTD")]
    receiving_tds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct KickerSeason {
    #[serde(flatten)]
    base: SeasonBase,
    #[serde(rename = "FgMade_0-19")]
    fg_made_0_19: Option<f64>,
    #[serde(rename = "FgMade_20-29")]
    fg_made_20_29: Option<f64>,
    #[serde(rename = "FgMade_30-39")]
    fg_made_30_39: Option<f64>,
    #[serde(rename = "FgMade_40-49")]
    fg_made_40_49: Option<f64>,
    #[serde(rename = "FgMade_50")]
    fg_made_50: Option<f64>,
    #[serde(rename = "FgMiss_0-19")]
    fg_miss_0_19: Option<f64>,
    #[serde(rename = "FgMiss_20-29")]
    fg_miss_20_29: Option<f64>,
    #[serde(rename = "FgMiss_30-39")]
    fg_miss_30_39: Option<f64>,
    #[serde(rename = "PatMade")]
    pat_made: Option<f64>,
    #[serde(rename = "PatMissed")]
    pat_missed: Option<f64>,
}

impl KickerSeason {
    fn made_total(&self) -> f64 {
        [
            self.fg_made_0_19,
            self.fg_made_20_29,
            self.fg_made_30_39,
            self.fg_made_40_49,
            self.fg_made_50,
        ]
        .iter()
        .map(|v| v.unwrap_or(0.0))
        .sum()
    }

    fn missed_total(&self) -> f64 {
        [self.fg_miss_0_19, self.fg_miss_20_29, self.fg_miss_30_39]
            .iter()
            .map(|v| v.unwrap_or(0.0))
            .sum()
    }
}

#[derive(Debug, Deserialize)]
struct DefenseSeason {
    #[serde(flatten)]
    base: SeasonBase,
    #[serde(rename = "TacklesTot")]
    tackles: Option<f64>,
    #[serde(rename = "TacklesAst")]
    assisted_tackles: Option<f64>,
    #[serde(rename = "TacklesSck")]
    sacks: Option<f64>,
    #[serde(rename = "TacklesTfl")]
    tackles_for_loss: Option<f64>,
    #[serde(rename = "TurnoverInt")]
    interceptions: Option<f64>,
    #[serde(rename = "TurnoverFrcFum")]
    forced_fumbles: Option<f64>,
    #[serde(rename = "TurnoverFumRec")]
    fumble_recoveries: Option<f64>,
    #[serde(rename = "PDef")]
    passes_defended: Option<f64>,
    #[serde(rename = "QBHit")]
    qb_hits: Option<f64>,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
