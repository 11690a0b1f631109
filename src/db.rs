//! Sqlite-backed [DocStore]/[EvidenceSource] adapter.
//!
//! Each collection is one `(id, doc)` table with the record serialized as a
//! JSON document, so the generic clause language compiles uniformly to
//! `json_extract`/`json_each` expressions. Filter fields come from engine
//! code, never from callers, so interpolating them into SQL text is safe;
//! all values go through bind parameters.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    str::FromStr,
};

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::{
    error::BoxDynError,
    migrate::{
        MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator,
    },
    pool::PoolOptions,
    sqlite::{Sqlite, SqliteConnectOptions},
    ConnectOptions, Pool, QueryBuilder, Row,
};

use crate::{
    error::CagError,
    properties::{Oid, Record, Statement},
    query::{Clause, Filter, FindOptions},
    store::{BulkResponse, DocStore, EvidenceSource, ItemError},
};

pub const CAG_STORE_DB: &str = "sqlite:cag_store.db";

/// Upper bound on bind parameters per statement.
///
/// <https://www.sqlite.org/limits.html#max_variable_number>
pub const SQLITE_LIMIT_VARIABLE_NUMBER: usize = 32766;

/// Id-list queries are chunked well below the bind limit so the grounding
/// clauses still fit alongside the id binds.
const ID_CHUNK: usize = 500;

fn push_bind_value(qb: &mut QueryBuilder<Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        }
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

fn push_value_list(qb: &mut QueryBuilder<Sqlite>, values: &[Value]) {
    let last_sep = values.len().saturating_sub(1);
    for (idx, value) in values.iter().enumerate() {
        push_bind_value(qb, value);
        if idx < last_sep {
            qb.push(", ");
        }
    }
}

fn push_clause(qb: &mut QueryBuilder<Sqlite>, clause: &Clause) {
    match clause {
        Clause::Eq { field, value } => {
            qb.push(format!("json_extract(doc, '$.{field}') = "));
            push_bind_value(qb, value);
        }
        Clause::In {
            field,
            values,
            negate,
        } => {
            if values.is_empty() {
                // IN () is not valid SQL; an empty allow list matches nothing.
                qb.push(if *negate { "1" } else { "0" });
                return;
            }
            qb.push(format!("json_extract(doc, '$.{field}') "));
            if *negate {
                qb.push("NOT ");
            }
            qb.push("IN (");
            push_value_list(qb, values);
            qb.push(")");
        }
        Clause::Any {
            field,
            values,
            negate,
        } => {
            if values.is_empty() {
                qb.push(if *negate { "1" } else { "0" });
                return;
            }
            if *negate {
                qb.push("NOT ");
            }
            qb.push(format!(
                "EXISTS (SELECT 1 FROM json_each(doc, '$.{field}') WHERE json_each.value IN ("
            ));
            push_value_list(qb, values);
            qb.push("))");
        }
    }
}

pub fn push_filter(qb: &mut QueryBuilder<Sqlite>, filter: &Filter) {
    for (idx, clause) in filter.clauses().iter().enumerate() {
        if idx > 0 {
            qb.push(" AND ");
        }
        push_clause(qb, clause);
    }
}

/// Subject-or-object grounding intersection: the factor's chosen concept or
/// any candidate grounding falls inside the node's component set.
fn push_grounding_clause(qb: &mut QueryBuilder<Sqlite>, factor: &str, components: &BTreeSet<String>) {
    qb.push(format!("(json_extract(doc, '$.{factor}.concept') IN ("));
    let last_sep = components.len().saturating_sub(1);
    for (idx, component) in components.iter().enumerate() {
        qb.push_bind(component.clone());
        if idx < last_sep {
            qb.push(", ");
        }
    }
    qb.push(format!(
        ") OR EXISTS (SELECT 1 FROM json_each(doc, '$.{factor}.candidates') \
         WHERE json_extract(json_each.value, '$.name') IN ("
    ));
    for (idx, component) in components.iter().enumerate() {
        qb.push_bind(component.clone());
        if idx < last_sep {
            qb.push(", ");
        }
    }
    qb.push(")))");
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the store database and run migrations.
    pub async fn connect(db_path: &Path) -> Result<Self, CagError> {
        let fqdb = format!("sqlite:{}", db_path.display());
        tracing::debug!("Initializing document store from file: {:?}", fqdb);
        if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
            Sqlite::create_database(&fqdb).await?;
        }
        let options = SqliteConnectOptions::from_str(&fqdb)?
            .read_only(false)
            .disable_statement_logging()
            .create_if_missing(true);
        let pool = PoolOptions::<Sqlite>::new().connect_with(options).await?;

        let migrator = Migrator::new(migrations()).await.map_err(sqlx::Error::from)?;
        migrator.run(&pool).await.map_err(sqlx::Error::from)?;

        let graphs = sqlx::query("SELECT COUNT(*) FROM graphs")
            .fetch_one(&pool)
            .await?;
        let edges = sqlx::query("SELECT COUNT(*) FROM edges")
            .fetch_one(&pool)
            .await?;
        tracing::info!(
            "Document store initialized.\n \
             \tGraph count:\t{:?} \n \
             \tEdge count:\t{:?}",
            graphs.get::<u32, usize>(0),
            edges.get::<u32, usize>(0)
        );
        Ok(SqliteStore { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn fetch_docs(&self, qb: &mut QueryBuilder<'_, Sqlite>) -> Result<Vec<String>, CagError> {
        let query = qb.build();
        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("[SqliteStore] SQL error: {}", e);
            CagError::from(e)
        })?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("doc"))
            .collect())
    }

    async fn statement_chunk(
        &self,
        ids: &[Oid],
        grounding: Option<(&BTreeSet<String>, &BTreeSet<String>)>,
    ) -> Result<Vec<Statement>, CagError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM statements WHERE id IN (");
        let last_sep = ids.len().saturating_sub(1);
        for (idx, id) in ids.iter().enumerate() {
            qb.push_bind(id.as_str().to_string());
            if idx < last_sep {
                qb.push(", ");
            }
        }
        qb.push(")");
        if let Some((source_components, target_components)) = grounding {
            qb.push(" AND json_extract(doc, '$.state') != 'DISCARDED' AND ");
            push_grounding_clause(&mut qb, "subj", source_components);
            qb.push(" AND ");
            push_grounding_clause(&mut qb, "obj", target_components);
        }
        self.fetch_docs(&mut qb)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_str::<Statement>(&doc).map_err(CagError::from))
            .collect()
    }

    /// Fetch in chunks, then restore the caller's id ordering. Ids with no
    /// surviving statement are simply absent from the result.
    async fn statements_ordered(
        &self,
        reference_ids: &[Oid],
        grounding: Option<(&BTreeSet<String>, &BTreeSet<String>)>,
    ) -> Result<Vec<Statement>, CagError> {
        if reference_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id = BTreeMap::new();
        for chunk in reference_ids.chunks(ID_CHUNK) {
            for statement in self.statement_chunk(chunk, grounding).await? {
                by_id.insert(statement.id.clone(), statement);
            }
        }
        Ok(reference_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}

impl DocStore for SqliteStore {
    async fn find<R: Record>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<R>, CagError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT doc FROM {} ", R::COLLECTION));
        if !filter.is_empty() {
            qb.push("WHERE ");
            push_filter(&mut qb, filter);
        }
        if let Some(limit) = options.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }
        self.fetch_docs(&mut qb)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_str::<R>(&doc).map_err(CagError::from))
            .collect()
    }

    async fn insert<R: Record>(&self, records: Vec<R>) -> Result<BulkResponse, CagError> {
        let mut response = BulkResponse::default();
        let sql = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", R::COLLECTION);
        for record in records {
            let id = record.id().clone();
            if id.is_nil() {
                response.errors.push(ItemError {
                    id,
                    reason: "insert requires an assigned id".to_string(),
                });
                continue;
            }
            let doc = serde_json::to_string(&record)?;
            match sqlx::query(&sql)
                .bind(id.as_str())
                .bind(&doc)
                .execute(&self.pool)
                .await
            {
                Ok(_) => response.items.push(id),
                Err(e) => response.errors.push(ItemError {
                    id,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(response)
    }

    async fn update<R: Record>(&self, records: Vec<R>) -> Result<BulkResponse, CagError> {
        let mut response = BulkResponse::default();
        let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", R::COLLECTION);
        for record in records {
            let id = record.id().clone();
            let doc = serde_json::to_string(&record)?;
            match sqlx::query(&sql)
                .bind(&doc)
                .bind(id.as_str())
                .execute(&self.pool)
                .await
            {
                Ok(done) if done.rows_affected() == 0 => response.errors.push(ItemError {
                    id,
                    reason: "no record with this id".to_string(),
                }),
                Ok(_) => response.items.push(id),
                Err(e) => response.errors.push(ItemError {
                    id,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(response)
    }

    async fn remove<R: Record>(&self, filter: &Filter) -> Result<u64, CagError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} ", R::COLLECTION));
        if !filter.is_empty() {
            qb.push("WHERE ");
            push_filter(&mut qb, filter);
        }
        let done = qb.build().execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn remove_many<R: Record>(&self, ids: &[Oid]) -> Result<u64, CagError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb =
                QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id IN (", R::COLLECTION));
            let last_sep = chunk.len().saturating_sub(1);
            for (idx, id) in chunk.iter().enumerate() {
                qb.push_bind(id.as_str().to_string());
                if idx < last_sep {
                    qb.push(", ");
                }
            }
            qb.push(")");
            deleted += qb.build().execute(&self.pool).await?.rows_affected();
        }
        Ok(deleted)
    }

    async fn count<R: Record>(&self, filter: &Filter) -> Result<u64, CagError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} ", R::COLLECTION));
        if !filter.is_empty() {
            qb.push("WHERE ");
            push_filter(&mut qb, filter);
        }
        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>(0) as u64)
    }
}

impl EvidenceSource for SqliteStore {
    async fn statements_by_id(&self, ids: &[Oid]) -> Result<Vec<Statement>, CagError> {
        self.statements_ordered(ids, None).await
    }

    async fn matching_evidence(
        &self,
        source_components: &BTreeSet<String>,
        target_components: &BTreeSet<String>,
        reference_ids: &[Oid],
    ) -> Result<Vec<Statement>, CagError> {
        if source_components.is_empty() || target_components.is_empty() {
            return Ok(Vec::new());
        }
        self.statements_ordered(reference_ids, Some((source_components, target_components)))
            .await
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let mut migrations = Vec::new();
            for migration in self.0 {
                if matches!(migration.kind, MigrationType::ReversibleUp) {
                    migrations.push(SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        migration.kind,
                        migration.sql.into(),
                        false,
                    ));
                }
            }
            Ok(migrations)
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![Migration {
        version: 1,
        description: "create_collection_tables",
        sql: "\
            CREATE TABLE graphs (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE nodes (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE edges (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE node_groups (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE scenarios (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE scenario_results (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE sensitivity_results (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE TABLE statements (id TEXT PRIMARY KEY, doc TEXT NOT NULL); \
            CREATE INDEX idx_nodes_model ON nodes (json_extract(doc, '$.model_id')); \
            CREATE INDEX idx_edges_model ON edges (json_extract(doc, '$.model_id')); \
            CREATE INDEX idx_scenarios_model ON scenarios (json_extract(doc, '$.model_id')); \
            CREATE INDEX idx_statements_project ON statements (json_extract(doc, '$.project_id'));",
        kind: MigrationType::ReversibleUp,
    }])
}
