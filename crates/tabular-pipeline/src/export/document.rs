//! Document-store writer (MongoDB).
//!
//! Each row becomes one document keyed by the column names. The conflict
//! policy logic lives in [`write_documents`], which works against any
//! [`DocumentCollection`].

use super::{ExportTable, TableWriter, export_runtime};
use crate::config::{BackendKind, ConflictPolicy, DbConfig};
use crate::credentials::Secret;
use crate::error::{PipelineError, Result};
use crate::types::CellValue;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::{Client, Collection};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

pub const DEFAULT_MONGO_HOST: &str = "localhost";
pub const DEFAULT_MONGO_PORT: u16 = 27017;
pub const DEFAULT_MONGO_USERNAME: &str = "admin";
pub const DEFAULT_MONGO_PASSWORD: &str = "password";
pub const DEFAULT_MONGO_DATABASE: &str = "test_db";

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// The operations the document writer needs from a collection.
pub trait DocumentCollection {
    /// Remove the collection and all its documents.
    fn drop_collection(&mut self) -> Result<()>;

    fn count_documents(&self) -> Result<u64>;

    fn insert_many(&mut self, documents: Vec<Document>) -> Result<()>;
}

/// Apply `policy` and insert every row of `table` as a document.
pub fn write_documents<C: DocumentCollection>(
    collection: &mut C,
    name: &str,
    table: &ExportTable,
    policy: ConflictPolicy,
) -> Result<usize> {
    match policy {
        ConflictPolicy::Replace => collection.drop_collection()?,
        ConflictPolicy::Fail => {
            if collection.count_documents()? > 0 {
                return Err(PipelineError::CollectionExists(name.to_string()));
            }
        }
        ConflictPolicy::Append => {}
    }

    let documents: Vec<Document> = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .zip(row)
                .map(|((column, _), cell)| (column.clone(), to_bson(cell)))
                .collect()
        })
        .collect();

    let count = documents.len();
    if count > 0 {
        collection.insert_many(documents)?;
    }
    debug!("Inserted {} documents into '{}'", count, name);
    Ok(count)
}

fn to_bson(cell: &CellValue) -> Bson {
    match cell {
        CellValue::Null => Bson::Null,
        CellValue::Bool(v) => Bson::Boolean(*v),
        CellValue::Int(v) => Bson::Int64(*v),
        CellValue::Float(v) => Bson::Double(*v),
        CellValue::Text(v) => Bson::String(v.clone()),
    }
}

/// A MongoDB collection driven on a borrowed runtime.
pub struct MongoCollection<'rt> {
    runtime: &'rt Runtime,
    collection: Collection<Document>,
}

impl DocumentCollection for MongoCollection<'_> {
    fn drop_collection(&mut self) -> Result<()> {
        self.runtime
            .block_on(async { self.collection.drop().await })
            .map_err(map_mongo_error)
    }

    fn count_documents(&self) -> Result<u64> {
        self.runtime
            .block_on(async { self.collection.count_documents(doc! {}).await })
            .map_err(map_mongo_error)
    }

    fn insert_many(&mut self, documents: Vec<Document>) -> Result<()> {
        self.runtime
            .block_on(async { self.collection.insert_many(documents).await })
            .map(|_| ())
            .map_err(map_mongo_error)
    }
}

/// The driver connects lazily, so an unreachable server surfaces as a
/// server-selection failure on the first operation.
fn map_mongo_error(error: mongodb::error::Error) -> PipelineError {
    if matches!(*error.kind, ErrorKind::ServerSelection { .. }) {
        PipelineError::connection(BackendKind::Mongo.as_str(), error)
    } else {
        PipelineError::DocumentStore(error)
    }
}

/// Writes tables to MongoDB collections.
pub struct MongoWriter {
    host: String,
    port: u16,
    username: String,
    password: Secret,
    database: String,
    server_selection_timeout: Duration,
}

impl MongoWriter {
    /// Fill unset parameters with the local development defaults.
    pub fn from_config(db: &DbConfig) -> Self {
        Self {
            host: db
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_MONGO_HOST.to_string()),
            port: db.port.unwrap_or(DEFAULT_MONGO_PORT),
            username: db
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_MONGO_USERNAME.to_string()),
            password: db
                .password
                .clone()
                .unwrap_or_else(|| Secret::new(DEFAULT_MONGO_PASSWORD)),
            database: db
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_MONGO_DATABASE.to_string()),
            server_selection_timeout: SERVER_SELECTION_TIMEOUT,
        }
    }

    fn client_options(&self) -> ClientOptions {
        let credential = (!self.username.is_empty() && !self.password.is_empty()).then(|| {
            let mut credential = Credential::default();
            credential.username = Some(self.username.clone());
            credential.password = Some(self.password.expose().to_string());
            credential
        });

        ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: self.host.clone(),
                port: Some(self.port),
            }])
            .credential(credential)
            .server_selection_timeout(self.server_selection_timeout)
            .build()
    }
}

impl TableWriter for MongoWriter {
    fn backend(&self) -> BackendKind {
        BackendKind::Mongo
    }

    fn write(&self, table: &ExportTable, destination: &str, policy: ConflictPolicy) -> Result<usize> {
        info!(
            "Exporting {} rows to mongodb collection '{}.{}' ({})",
            table.rows.len(),
            self.database,
            destination,
            policy.as_str()
        );

        let runtime = export_runtime()?;
        let _context = runtime.enter();
        let client = Client::with_options(self.client_options())
            .map_err(|e| PipelineError::connection(BackendKind::Mongo.as_str(), e))?;

        let mut collection = MongoCollection {
            runtime: &runtime,
            collection: client.database(&self.database).collection::<Document>(destination),
        };
        let result = write_documents(&mut collection, destination, table, policy);
        drop(collection);

        debug!("Shutting down mongodb client");
        runtime.block_on(async { client.shutdown().await });
        result
    }
}
