use crate::db::{Column, Database, TableShape, Value};
use crate::error::RowkitError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::{BTreeMap, HashMap};
use std::{fs, path::Path};
use tracing::{debug, info};

/// Row key naming the row so later rows can reference it.
const ALIAS_KEY: &str = "_id";

#[derive(Debug, Deserialize)]
struct FixtureBlock {
    model: String,
    #[serde(default, deserialize_with = "rows_or_empty")]
    rows: Vec<Mapping>,
}

/// `rows:` with nothing after it parses as null; treat it like `rows: []`.
fn rows_or_empty<'de, D>(deserializer: D) -> Result<Vec<Mapping>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Mapping>>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a fixture document is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureOptions {
    /// Empty every table named in the document before inserting, so loading
    /// the same file twice leaves the same rows.
    pub truncate_tables: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            truncate_tables: true,
        }
    }
}

/// Rows inserted per entity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixtureStats {
    pub rows: BTreeMap<String, usize>,
}

impl FixtureStats {
    pub fn total(&self) -> usize {
        self.rows.values().sum()
    }
}

/// Rows recorded under `<Model>.<alias>`, including their assigned key.
#[derive(Debug, Default)]
struct References {
    rows: HashMap<(String, String), Vec<(&'static Column, Value)>>,
}

impl References {
    fn lookup(&self, db: &Database, model: &str, alias: &str, column: &str) -> Option<Value> {
        let model = db.shape(model).map(|s| s.name).unwrap_or(model);
        self.rows
            .get(&(model.to_string(), alias.to_string()))?
            .iter()
            .find(|(c, _)| c.name.eq_ignore_ascii_case(column))
            .map(|(_, v)| v.clone())
    }
}

/// Load `file_name` from `base_dir` and insert its rows.
pub async fn load_fixtures(
    db: &Database,
    base_dir: &Path,
    file_name: &str,
    options: FixtureOptions,
) -> Result<FixtureStats, RowkitError> {
    let path = base_dir.join(file_name);
    let contents = fs::read_to_string(&path)
        .map_err(|e| RowkitError::fixture(format!("cannot read {}: {e}", path.display())))?;
    let stats = load_fixtures_str(db, &contents, options).await?;
    info!(path = %path.display(), rows = stats.total(), "fixtures loaded");
    Ok(stats)
}

/// Insert the rows of an in-memory fixture document.
///
/// Rows are inserted one statement at a time; rows inserted before a
/// failure are kept.
pub async fn load_fixtures_str(
    db: &Database,
    contents: &str,
    options: FixtureOptions,
) -> Result<FixtureStats, RowkitError> {
    let blocks = parse_document(contents)?;
    let mut shapes = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let shape = db
            .shape(&block.model)
            .ok_or_else(|| RowkitError::fixture(format!("unknown model {:?}", block.model)))?;
        shapes.push(shape);
    }

    if options.truncate_tables {
        let mut emptied: Vec<&str> = Vec::new();
        for shape in &shapes {
            if emptied.contains(&shape.table) {
                continue;
            }
            let removed = db
                .truncate_table(shape)
                .await
                .map_err(|e| RowkitError::fixture(format!("{}: {e}", shape.name)))?;
            debug!(table = shape.table, removed, "fixture table truncated");
            emptied.push(shape.table);
        }
    }

    let mut refs = References::default();
    let mut stats = FixtureStats::default();
    for (block, shape) in blocks.into_iter().zip(shapes) {
        for row in block.rows {
            let (alias, mut columns) = resolve_row(db, shape, row, &refs)?;
            let id = db
                .insert_columns(shape, columns.clone())
                .await
                .map_err(|e| RowkitError::fixture(format!("{}: {e}", shape.name)))?;

            if let Some(alias) = alias {
                if let Some(pk) = shape.primary_key() {
                    columns.retain(|(c, _)| c.name != pk.name);
                    columns.push((pk, Value::Integer(id)));
                }
                debug!(model = shape.name, alias = %alias, id, "fixture row recorded");
                refs.rows.insert((shape.name.to_string(), alias), columns);
            }
            *stats.rows.entry(shape.name.to_string()).or_default() += 1;
        }
    }

    Ok(stats)
}

fn parse_document(contents: &str) -> Result<Vec<FixtureBlock>, RowkitError> {
    let doc: Yaml = serde_yaml::from_str(contents)
        .map_err(|e| RowkitError::fixture(format!("malformed fixture document: {e}")))?;
    match doc {
        Yaml::Null => Ok(Vec::new()),
        Yaml::Sequence(blocks) => blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| parse_block(index, block))
            .collect(),
        Yaml::Mapping(tables) => tables
            .into_iter()
            .map(|(model, rows)| {
                let model = model
                    .as_str()
                    .ok_or_else(|| RowkitError::fixture("table names must be strings"))?
                    .to_string();
                let rows: Option<Vec<Mapping>> = serde_yaml::from_value(rows).map_err(|e| {
                    RowkitError::fixture(format!("rows of {model} must be mappings: {e}"))
                })?;
                Ok(FixtureBlock {
                    model,
                    rows: rows.unwrap_or_default(),
                })
            })
            .collect(),
        _ => Err(RowkitError::fixture(
            "fixture document must be a list of blocks or a mapping of tables",
        )),
    }
}

fn parse_block(index: usize, block: Yaml) -> Result<FixtureBlock, RowkitError> {
    let model = block
        .get("model")
        .and_then(Yaml::as_str)
        .map(|m| format!(" ({m})"))
        .unwrap_or_default();
    serde_yaml::from_value(block)
        .map_err(|e| RowkitError::fixture(format!("block {index}{model}: {e}")))
}

type ResolvedRow = (Option<String>, Vec<(&'static Column, Value)>);

fn resolve_row(
    db: &Database,
    shape: &'static TableShape,
    row: Mapping,
    refs: &References,
) -> Result<ResolvedRow, RowkitError> {
    let mut alias = None;
    let mut columns = Vec::with_capacity(row.len());

    for (key, value) in row {
        let key = key
            .as_str()
            .ok_or_else(|| RowkitError::fixture(format!("{}: non-string column name", shape.name)))?;
        if key == ALIAS_KEY {
            alias = Some(scalar_string(&value).ok_or_else(|| {
                RowkitError::fixture(format!("{}: {ALIAS_KEY} must be a scalar", shape.name))
            })?);
            continue;
        }
        let column = shape.column(key).ok_or_else(|| {
            RowkitError::fixture(format!("{} has no column {key:?}", shape.name))
        })?;
        columns.push((column, to_value(db, shape, key, value, refs)?));
    }

    Ok((alias, columns))
}

fn to_value(
    db: &Database,
    shape: &TableShape,
    key: &str,
    value: Yaml,
    refs: &References,
) -> Result<Value, RowkitError> {
    match value {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Integer(i64::from(b))),
        Yaml::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .ok_or_else(|| RowkitError::fixture(format!("{}.{key}: number out of range", shape.name))),
        Yaml::String(s) => match parse_reference(&s) {
            Some((model, alias, column)) => refs
                .lookup(db, model, alias, column)
                .ok_or_else(|| {
                    RowkitError::fixture(format!("{}.{key}: unresolved reference {s:?}", shape.name))
                }),
            None => Ok(Value::Text(s)),
        },
        Yaml::Sequence(_) | Yaml::Mapping(_) | Yaml::Tagged(_) => Err(RowkitError::fixture(
            format!("{}.{key}: only scalar values are supported", shape.name),
        )),
    }
}

fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split `{{ $.Model.alias.column }}` into its three parts.
fn parse_reference(s: &str) -> Option<(&str, &str, &str)> {
    let inner = s
        .trim()
        .strip_prefix("{{")?
        .strip_suffix("}}")?
        .trim()
        .strip_prefix("$.")?;
    let mut parts = inner.split('.');
    let (model, alias, column) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || [model, alias, column].iter().any(|p| p.is_empty()) {
        return None;
    }
    Some((model, alias, column))
}
