use crate::config::DatabaseUrl;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

/// Connects and spawns the connection driver onto the runtime.
pub async fn connect(url: &DatabaseUrl) -> Result<Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(url.as_str(), NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(error = %err, "database connection closed with error");
        }
    });
    debug!(database = %url, "connected to database");
    Ok(client)
}

/// Doubles embedded quotes so any name can be used as a quoted identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders `value` as a single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
