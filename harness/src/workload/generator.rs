//! Deterministic SQL statement generation
//!
//! Every statement is a pure function of the generator's seed and run date
//! plus `(scenario, worker, operation index, batch size)`, so a run can be
//! replayed exactly. Insert keys never collide across workers; update and
//! delete stay inside the worker's own key range except in mixed scenarios,
//! where they deliberately target slices every worker shares.
//!
//! Expected table columns:
//! `id bigint, batch_id bigint, worker varchar, name varchar,
//! category varchar, status varchar, value double, version integer,
//! payload varchar, created_at timestamp, partition_date date`

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::scenario::{ScenarioId, ScenarioKind};

/// Keys reserved for one worker across the whole run
pub const WORKER_KEY_SPAN: u64 = 1_000_000_000_000;

/// Keys reserved for one worker within one scenario
pub const SCENARIO_KEY_SPAN: u64 = 1_000_000_000;

const CATEGORIES: [&str; 6] = ["Electronics", "Books", "Clothing", "Home", "Sports", "Toys"];
const STATUSES: [&str; 5] = ["Active", "Pending", "Inactive", "Processing", "Completed"];
const PAYLOAD_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Statement intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Select => "select",
        })
    }
}

/// A single SQL statement plus its intent tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub statement: String,
}

/// Key of row `row_offset` written by `worker_id` at `operation_index`
pub fn row_key(
    worker_id: usize,
    scenario_ordinal: usize,
    operation_index: usize,
    batch_size: usize,
    row_offset: usize,
) -> u64 {
    worker_id as u64 * WORKER_KEY_SPAN
        + scenario_ordinal as u64 * SCENARIO_KEY_SPAN
        + (operation_index * batch_size + row_offset) as u64
}

/// Produces the statements workers execute
#[derive(Debug, Clone)]
pub struct OperationGenerator {
    table: String,
    seed: u64,
    run_date: NaiveDate,
}

impl OperationGenerator {
    pub fn new(table: impl Into<String>, seed: u64, run_date: NaiveDate) -> Self {
        Self {
            table: table.into(),
            seed,
            run_date,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Intent of the operation at `operation_index` for a scenario kind.
    /// Mixed scenarios cycle insert, update, delete, select.
    pub fn kind_for(kind: ScenarioKind, operation_index: usize) -> OperationKind {
        match kind {
            ScenarioKind::Insert => OperationKind::Insert,
            ScenarioKind::Update => OperationKind::Update,
            ScenarioKind::Delete => OperationKind::Delete,
            ScenarioKind::Mixed => match operation_index % 4 {
                0 => OperationKind::Insert,
                1 => OperationKind::Update,
                2 => OperationKind::Delete,
                _ => OperationKind::Select,
            },
        }
    }

    pub fn generate(
        &self,
        scenario: ScenarioId,
        batch_size: usize,
        worker_id: usize,
        worker_label: &str,
        operation_index: usize,
    ) -> Operation {
        let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(&[
            self.seed,
            scenario.ordinal as u64,
            worker_id as u64,
            operation_index as u64,
        ]));
        let ctx = StatementContext {
            scenario,
            batch_size,
            worker_id,
            operation_index,
            shared: scenario.kind.is_contended(),
        };

        let kind = Self::kind_for(scenario.kind, operation_index);
        let statement = match kind {
            OperationKind::Insert => self.insert(&ctx, worker_label, &mut rng),
            OperationKind::Update => self.update(&ctx, &mut rng),
            OperationKind::Delete => self.delete(&ctx, &mut rng),
            OperationKind::Select => self.select(&ctx),
        };
        Operation { kind, statement }
    }

    fn insert(&self, ctx: &StatementContext, worker_label: &str, rng: &mut ChaCha8Rng) -> String {
        let date = self.run_date.format("%Y-%m-%d");
        let worker = escape_literal(worker_label);

        let values: Vec<String> = (0..ctx.batch_size)
            .map(|offset| {
                let id = row_key(
                    ctx.worker_id,
                    ctx.scenario.ordinal,
                    ctx.operation_index,
                    ctx.batch_size,
                    offset,
                );
                let category = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
                let value = (rng.random_range(1.0..10_000.0_f64) * 100.0).round() / 100.0;
                let payload_len = rng.random_range(10..=100);
                let payload: String = (0..payload_len)
                    .map(|_| PAYLOAD_CHARS[rng.random_range(0..PAYLOAD_CHARS.len())] as char)
                    .collect();
                let (h, m, s) = (
                    rng.random_range(0..24),
                    rng.random_range(0..60),
                    rng.random_range(0..60),
                );
                format!(
                    "({id}, {batch}, '{worker}', 'stress_test_{id}', '{category}', 'Active', \
                     {value}, 1, '{payload}', TIMESTAMP '{date} {h:02}:{m:02}:{s:02}', DATE '{date}')",
                    batch = ctx.operation_index,
                )
            })
            .collect();

        format!("INSERT INTO {} VALUES {}", self.table, values.join(", "))
    }

    fn update(&self, ctx: &StatementContext, rng: &mut ChaCha8Rng) -> String {
        let predicate = ctx.slice_predicate();
        match ctx.operation_index % 3 {
            0 => {
                let value = (rng.random_range(10.0..2_000.0_f64) * 100.0).round() / 100.0;
                format!(
                    "UPDATE {} SET value = {value}, version = version + 1 WHERE {predicate}",
                    self.table
                )
            }
            1 => {
                let status = STATUSES[rng.random_range(0..STATUSES.len())];
                format!(
                    "UPDATE {} SET status = '{status}', version = version + 1 WHERE {predicate}",
                    self.table
                )
            }
            _ => {
                let multiplier = (rng.random_range(0.8..1.2_f64) * 100.0).round() / 100.0;
                format!(
                    "UPDATE {} SET value = value * {multiplier}, version = version + 1 \
                     WHERE {predicate} AND version < 5",
                    self.table
                )
            }
        }
    }

    fn delete(&self, ctx: &StatementContext, rng: &mut ChaCha8Rng) -> String {
        // Mixed scenarios only ever delete at every fourth index
        let by_status = if ctx.shared {
            (ctx.operation_index / 4) % 2 == 1
        } else {
            ctx.operation_index % 2 == 1
        };

        if by_status {
            let status = STATUSES[rng.random_range(0..STATUSES.len())];
            let scope = if ctx.shared {
                String::new()
            } else {
                format!("{} AND ", ctx.home_range())
            };
            format!(
                "DELETE FROM {} WHERE {scope}status = '{status}'",
                self.table
            )
        } else {
            format!("DELETE FROM {} WHERE {}", self.table, ctx.slice_predicate())
        }
    }

    fn select(&self, ctx: &StatementContext) -> String {
        let t = &self.table;
        match (ctx.operation_index / 4) % 5 {
            0 => format!("SELECT COUNT(*) FROM {t}"),
            1 => format!("SELECT partition_date, COUNT(*) FROM {t} GROUP BY 1"),
            2 => format!("SELECT partition_date, AVG(value) FROM {t} GROUP BY partition_date"),
            3 => format!("SELECT * FROM {t} ORDER BY id DESC LIMIT 10"),
            _ => format!("SELECT name, MAX(value), MIN(value) FROM {t} GROUP BY name LIMIT 5"),
        }
    }
}

struct StatementContext {
    scenario: ScenarioId,
    batch_size: usize,
    worker_id: usize,
    operation_index: usize,
    shared: bool,
}

impl StatementContext {
    fn home_range(&self) -> String {
        let lo = self.worker_id as u64 * WORKER_KEY_SPAN;
        format!("id BETWEEN {lo} AND {}", lo + WORKER_KEY_SPAN - 1)
    }

    /// Rows written at this operation index in any scenario, restricted to
    /// the worker's own range unless the scenario is contended
    fn slice_predicate(&self) -> String {
        let lo = (self.operation_index * self.batch_size) as u64;
        let hi = lo + self.batch_size as u64 - 1;
        let slice = format!("MOD(id, {SCENARIO_KEY_SPAN}) BETWEEN {lo} AND {hi}");
        if self.shared {
            slice
        } else {
            format!("{} AND {slice}", self.home_range())
        }
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Fold several integers into one well-mixed seed (splitmix64 finalizer)
fn derive_seed(parts: &[u64]) -> u64 {
    parts.iter().fold(0x9E37_79B9_7F4A_7C15, |acc, part| {
        let mut z = acc ^ part.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn generator() -> OperationGenerator {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        OperationGenerator::new("stress_test.catalog_stress", 7, date)
    }

    fn id(ordinal: usize, kind: ScenarioKind) -> ScenarioId {
        ScenarioId { ordinal, kind }
    }

    #[test]
    fn test_row_keys_unique_across_workers_and_scenarios() {
        let mut seen = HashSet::new();
        for ordinal in 0..3 {
            for worker in 0..4 {
                for op in 0..5 {
                    for offset in 0..7 {
                        assert!(seen.insert(row_key(worker, ordinal, op, 7, offset)));
                    }
                }
            }
        }
        assert_eq!(seen.len(), 3 * 4 * 5 * 7);
    }

    #[test]
    fn test_insert_emits_batch_of_rows() {
        let op = generator().generate(id(0, ScenarioKind::Insert), 3, 2, "iceberg_hms-w2", 4);
        assert_eq!(op.kind, OperationKind::Insert);
        assert!(op.statement.starts_with("INSERT INTO stress_test.catalog_stress VALUES ("));
        assert_eq!(op.statement.matches("DATE '2024-05-17'").count(), 3);
        for offset in 0..3 {
            let key = row_key(2, 0, 4, 3, offset);
            assert!(op.statement.contains(&format!("({key}, 4, 'iceberg_hms-w2'")));
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generator().generate(id(1, ScenarioKind::Insert), 5, 0, "w0", 3);
        let b = generator().generate(id(1, ScenarioKind::Insert), 5, 0, "w0", 3);
        assert_eq!(a, b);

        let other_seed = OperationGenerator::new(
            "stress_test.catalog_stress",
            8,
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
        );
        let c = other_seed.generate(id(1, ScenarioKind::Insert), 5, 0, "w0", 3);
        assert_ne!(a.statement, c.statement);
    }

    #[test]
    fn test_update_scoped_to_own_range() {
        let op = generator().generate(id(1, ScenarioKind::Update), 10, 3, "w3", 2);
        assert_eq!(op.kind, OperationKind::Update);
        let lo = 3 * WORKER_KEY_SPAN;
        assert!(
            op.statement
                .contains(&format!("id BETWEEN {lo} AND {}", lo + WORKER_KEY_SPAN - 1))
        );
        assert!(op.statement.contains("MOD(id, 1000000000) BETWEEN 20 AND 29"));
    }

    #[test]
    fn test_delete_alternates_key_range_and_status() {
        let by_range = generator().generate(id(2, ScenarioKind::Delete), 10, 1, "w1", 0);
        assert!(by_range.statement.contains("MOD(id, 1000000000) BETWEEN 0 AND 9"));

        let by_status = generator().generate(id(2, ScenarioKind::Delete), 10, 1, "w1", 1);
        assert!(by_status.statement.contains("status = '"));
        assert!(by_status.statement.contains("id BETWEEN 1000000000000 AND"));
    }

    #[test]
    fn test_mixed_rotates_all_kinds() {
        let kinds: Vec<OperationKind> = (0..8)
            .map(|i| OperationGenerator::kind_for(ScenarioKind::Mixed, i))
            .collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Insert,
                OperationKind::Update,
                OperationKind::Delete,
                OperationKind::Select,
                OperationKind::Insert,
                OperationKind::Update,
                OperationKind::Delete,
                OperationKind::Select,
            ]
        );
    }

    #[test]
    fn test_mixed_update_targets_shared_slice() {
        let g = generator();
        let a = g.generate(id(3, ScenarioKind::Mixed), 10, 0, "w0", 5);
        let b = g.generate(id(3, ScenarioKind::Mixed), 10, 1, "w1", 5);
        assert_eq!(a.kind, OperationKind::Update);
        assert!(!a.statement.contains("id BETWEEN"));
        assert!(a.statement.contains("MOD(id, 1000000000) BETWEEN 50 AND 59"));
        assert!(b.statement.contains("MOD(id, 1000000000) BETWEEN 50 AND 59"));
    }

    #[test]
    fn test_mixed_select_is_read_only() {
        let op = generator().generate(id(0, ScenarioKind::Mixed), 10, 0, "w0", 3);
        assert_eq!(op.kind, OperationKind::Select);
        assert!(op.statement.starts_with("SELECT"));
    }

    #[test]
    fn test_worker_label_is_escaped() {
        let op = generator().generate(id(0, ScenarioKind::Insert), 1, 0, "o'brien", 0);
        assert!(op.statement.contains("'o''brien'"));
    }
}
