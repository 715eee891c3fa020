//! Database client and connection management

use crate::{Address, DbError, DbResult, PgCursor};
use pgq_core::{CollectError, CollectResult, Database, RowCursor};
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::{debug, info, instrument, warn};

/// Single lazily-opened PostgreSQL connection
pub struct PgClient {
    address: Address,
    conn: Option<PgConnection>,
}

impl PgClient {
    /// Create a client from a connection address. Nothing is opened yet.
    pub fn new(address: &str) -> DbResult<Self> {
        Ok(Self {
            address: Address::parse(address)?,
            conn: None,
        })
    }

    /// Address with credentials removed
    pub fn address(&self) -> &str {
        self.address.sanitized()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connect(&self) -> DbResult<PgConnection> {
        let connect = PgConnection::connect_with(self.address.options());
        let conn = match self.address.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| DbError::Timeout(limit))??,
            None => connect.await?,
        };
        Ok(conn)
    }

    /// Test the open connection; closes it if the server does not answer
    pub async fn ping(&mut self) -> DbResult<()> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(DbError::ConfigError("connection is not open".to_string()));
        };
        if let Err(e) = conn.ping().await {
            self.conn = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Database for PgClient {
    #[instrument(skip(self), fields(address = %self.address.sanitized()))]
    async fn ensure_connected(&mut self) -> CollectResult<()> {
        if self.conn.is_some() {
            match self.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "connection lost, reconnecting"),
            }
        }

        let conn = self
            .connect()
            .await
            .map_err(|e| CollectError::ConnectionError(e.to_string()))?;
        info!("Connected to database");
        self.conn = Some(conn);
        Ok(())
    }

    async fn query<'a>(&'a mut self, sql: &'a str) -> CollectResult<Box<dyn RowCursor + 'a>> {
        if self.conn.is_none() {
            self.ensure_connected().await?;
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| CollectError::ConnectionError("connection is not open".to_string()))?;

        debug!(sql, "executing query");
        let cursor = PgCursor::open(conn, sql).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "error closing connection");
            }
        }
    }
}
