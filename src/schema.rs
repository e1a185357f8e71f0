// Static table metadata for the eight position groups.
//
// Every other module that needs to know a position's backing table, its
// column list, or which columns are numeric looks it up here instead of
// branching on the position tag. Table names only ever come from this
// fixed enumeration; they are never derived from request input.

use std::fmt;

use thiserror::Error;

/// The eight recognized position groups, each backed by exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    K,
    LB,
    DL,
    DB,
}

/// All position groups in registry order. Fan-out queries iterate this.
pub const ALL_POSITIONS: [Position; 8] = [
    Position::QB,
    Position::RB,
    Position::WR,
    Position::TE,
    Position::K,
    Position::LB,
    Position::DL,
    Position::DB,
];

/// The three groups that make up the defensive aggregate. Their tables
/// share an identical column shape, which is what makes the DEF union
/// well-formed.
pub const DEFENSIVE_POSITIONS: [Position; 3] = [Position::LB, Position::DL, Position::DB];

/// The accepted tag set, used in validation error messages.
pub const VALID_TAGS: &str = "QB, RB, WR, TE, K, LB, DL, DB";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown position `{input}`, expected one of {VALID_TAGS}")]
pub struct UnknownPosition {
    pub input: String,
}

impl Position {
    /// Parse a position tag, case-insensitively. There is no fallback:
    /// anything outside the fixed set is an error. `DEF` is not a position
    /// group; callers that accept the defensive aggregate parse a
    /// [`PositionSelector`] instead.
    pub fn parse(input: &str) -> Result<Position, UnknownPosition> {
        match input.to_ascii_uppercase().as_str() {
            "QB" => Ok(Position::QB),
            "RB" => Ok(Position::RB),
            "WR" => Ok(Position::WR),
            "TE" => Ok(Position::TE),
            "K" => Ok(Position::K),
            "LB" => Ok(Position::LB),
            "DL" => Ok(Position::DL),
            "DB" => Ok(Position::DB),
            _ => Err(UnknownPosition {
                input: input.to_string(),
            }),
        }
    }

    /// The canonical upper-case tag.
    pub fn tag(&self) -> &'static str {
        self.schema().tag
    }

    /// The static table schema for this group.
    pub fn schema(&self) -> &'static TableSchema {
        match self {
            Position::QB => &QB_SCHEMA,
            Position::RB => &RB_SCHEMA,
            Position::WR => &WR_SCHEMA,
            Position::TE => &TE_SCHEMA,
            Position::K => &K_SCHEMA,
            Position::LB => &LB_SCHEMA,
            Position::DL => &DL_SCHEMA,
            Position::DB => &DB_SCHEMA,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a `/players/{position}` request resolved to: a single real group,
/// or the synthetic defensive aggregate (a derived union of LB+DL+DB with
/// no table and no identity of its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSelector {
    Single(Position),
    Defense,
}

impl PositionSelector {
    /// Parse a request tag, accepting `DEF` (case-insensitive) as the
    /// defensive aggregate in addition to the eight real groups.
    pub fn parse(input: &str) -> Result<PositionSelector, UnknownPosition> {
        if input.eq_ignore_ascii_case("DEF") {
            return Ok(PositionSelector::Defense);
        }
        Position::parse(input).map(PositionSelector::Single)
    }

    /// The groups this selector expands to, in registry order.
    pub fn groups(&self) -> Vec<Position> {
        match self {
            PositionSelector::Single(p) => vec![*p],
            PositionSelector::Defense => DEFENSIVE_POSITIONS.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Table schemas
// ---------------------------------------------------------------------------

/// How a stat column is exposed through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whole-number stat (yards, touchdowns, receptions, ...).
    Counting,
    /// Stat that may carry halves or other fractions (sacks, split tackles).
    Fractional,
}

/// One position-specific stat column and its canonical API field name.
#[derive(Debug)]
pub struct ColumnSpec {
    pub column: &'static str,
    pub field: &'static str,
    pub kind: FieldKind,
}

/// Everything the query builder and normalizer need to know about one
/// position table. The identity columns (`playerid`, `playername`, `team`)
/// and the ranking pair (`totalpoints`, `rank`) are present in every table
/// and handled uniformly, so only the stat columns vary per schema.
#[derive(Debug)]
pub struct TableSchema {
    pub tag: &'static str,
    pub table: &'static str,
    pub stat_columns: &'static [ColumnSpec],
}

const fn counting(column: &'static str, field: &'static str) -> ColumnSpec {
    ColumnSpec {
        column,
        field,
        kind: FieldKind::Counting,
    }
}

const fn fractional(column: &'static str, field: &'static str) -> ColumnSpec {
    ColumnSpec {
        column,
        field,
        kind: FieldKind::Fractional,
    }
}

static QB_SCHEMA: TableSchema = TableSchema {
    tag: "QB",
    table: "qb_stats",
    stat_columns: &[
        counting("passingyards", "passing_yards"),
        counting("passingtds", "passing_tds"),
        counting("interceptions", "interceptions"),
        counting("rushingyards", "rushing_yards"),
        counting("rushingtds", "rushing_tds"),
    ],
};

static RB_SCHEMA: TableSchema = TableSchema {
    tag: "RB",
    table: "rb_stats",
    stat_columns: &[
        counting("rushingyards", "rushing_yards"),
        counting("rushingtds", "rushing_tds"),
        counting("receptions", "receptions"),
        counting("receivingyards", "receiving_yards"),
        counting("receivingtds", "receiving_tds"),
    ],
};

// WR and TE share the receiving shape; they stay separate schemas because
// they are separate tables with separate rank spaces.
const RECEIVING_COLUMNS: &[ColumnSpec] = &[
    counting("receptions", "receptions"),
    counting("targets", "targets"),
    counting("receivingyards", "receiving_yards"),
    counting("receivingtds", "receiving_tds"),
];

static WR_SCHEMA: TableSchema = TableSchema {
    tag: "WR",
    table: "wr_stats",
    stat_columns: RECEIVING_COLUMNS,
};

static TE_SCHEMA: TableSchema = TableSchema {
    tag: "TE",
    table: "te_stats",
    stat_columns: RECEIVING_COLUMNS,
};

static K_SCHEMA: TableSchema = TableSchema {
    tag: "K",
    table: "k_stats",
    stat_columns: &[
        counting("fieldgoals", "field_goals"),
        counting("fieldgoalattempts", "field_goal_attempts"),
        counting("extrapoints", "extra_points"),
        counting("extrapointattempts", "extra_point_attempts"),
    ],
};

// Defensive stats are recorded with fractional precision (half sacks,
// split tackles), matching the REAL columns in the store.
const DEFENSIVE_COLUMNS: &[ColumnSpec] = &[
    fractional("tackles", "tackles"),
    fractional("tackles_ast", "assisted_tackles"),
    fractional("sacks", "sacks"),
    fractional("tackles_tfl", "tackles_for_loss"),
    fractional("interceptions", "interceptions"),
    fractional("forced_fumbles", "forced_fumbles"),
    fractional("fumble_recoveries", "fumble_recoveries"),
    fractional("passes_defended", "passes_defended"),
    fractional("qb_hits", "qb_hits"),
];

static LB_SCHEMA: TableSchema = TableSchema {
    tag: "LB",
    table: "lb_stats",
    stat_columns: DEFENSIVE_COLUMNS,
};

static DL_SCHEMA: TableSchema = TableSchema {
    tag: "DL",
    table: "dl_stats",
    stat_columns: DEFENSIVE_COLUMNS,
};

static DB_SCHEMA: TableSchema = TableSchema {
    tag: "DB",
    table: "db_stats",
    stat_columns: DEFENSIVE_COLUMNS,
};

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_all_tags_case_insensitively() {
        for pos in ALL_POSITIONS {
            assert_eq!(Position::parse(pos.tag()).unwrap(), pos);
            assert_eq!(Position::parse(&pos.tag().to_lowercase()).unwrap(), pos);
        }
        assert_eq!(Position::parse("qB").unwrap(), Position::QB);
    }

    #[test]
    fn parse_rejects_unknown_tags() {
        let err = Position::parse("xyz").unwrap_err();
        assert_eq!(err.input, "xyz");
        // The message must name the accepted set.
        assert!(err.to_string().contains("QB, RB, WR, TE, K, LB, DL, DB"));
    }

    #[test]
    fn parse_rejects_def_as_real_group() {
        // DEF is only valid through the selector, never as a group.
        assert!(Position::parse("DEF").is_err());
    }

    #[test]
    fn selector_accepts_def_and_real_groups() {
        assert_eq!(
            PositionSelector::parse("def").unwrap(),
            PositionSelector::Defense
        );
        assert_eq!(
            PositionSelector::parse("rb").unwrap(),
            PositionSelector::Single(Position::RB)
        );
        assert!(PositionSelector::parse("OL").is_err());
    }

    #[test]
    fn selector_expands_defense_to_three_groups() {
        let groups = PositionSelector::Defense.groups();
        assert_eq!(groups, vec![Position::LB, Position::DL, Position::DB]);

        let single = PositionSelector::Single(Position::TE).groups();
        assert_eq!(single, vec![Position::TE]);
    }

    #[test]
    fn every_schema_names_its_own_table() {
        for pos in ALL_POSITIONS {
            let schema = pos.schema();
            assert_eq!(schema.tag, pos.tag());
            assert!(schema.table.ends_with("_stats"));
            assert!(!schema.stat_columns.is_empty());
        }
    }

    #[test]
    fn wr_and_te_share_the_receiving_shape() {
        let wr: Vec<_> = Position::WR.schema().stat_columns.iter().map(|c| c.column).collect();
        let te: Vec<_> = Position::TE.schema().stat_columns.iter().map(|c| c.column).collect();
        assert_eq!(wr, te);
        assert_ne!(Position::WR.schema().table, Position::TE.schema().table);
    }

    #[test]
    fn defensive_tables_share_one_shape() {
        let shapes: Vec<Vec<&str>> = DEFENSIVE_POSITIONS
            .iter()
            .map(|p| p.schema().stat_columns.iter().map(|c| c.column).collect())
            .collect();
        assert_eq!(shapes[0], shapes[1]);
        assert_eq!(shapes[1], shapes[2]);
    }

    #[test]
    fn defensive_stats_are_fractional() {
        for col in Position::LB.schema().stat_columns {
            assert_eq!(col.kind, FieldKind::Fractional, "{}", col.column);
        }
        for col in Position::K.schema().stat_columns {
            assert_eq!(col.kind, FieldKind::Counting, "{}", col.column);
        }
    }
}
