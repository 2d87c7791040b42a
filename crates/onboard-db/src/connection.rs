//! Connecting the portal to a SurrealDB server.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::store::SurrealDocumentStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Host and port of the WebSocket endpoint, e.g. `127.0.0.1:8000`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "onboard".into(),
            database: "portal".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// An authenticated client scoped to the portal's namespace and database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Connected to SurrealDB");
        Ok(Self { db })
    }

    /// Apply any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    /// A document store sharing this connection.
    pub fn document_store(&self) -> SurrealDocumentStore<Client> {
        SurrealDocumentStore::new(self.db.clone())
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
