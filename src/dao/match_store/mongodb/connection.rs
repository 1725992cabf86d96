use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{MongoDaoError, MongoResult};

/// How hard to try before giving up on a fresh client.
#[derive(Debug, Clone, Copy)]
pub struct ConnectAttempts {
    max_attempts: u32,
    first_delay: Duration,
    max_delay: Duration,
}

impl ConnectAttempts {
    /// Startup budget: the server may still be booting next to us.
    pub const STARTUP: Self = Self {
        max_attempts: 10,
        first_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// Reconnect budget: the storage supervisor already backs off between calls.
    pub const RECONNECT: Self = Self {
        max_attempts: 1,
        first_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };
}

/// Send a `ping` command to `database`.
pub async fn ping(database: &Database) -> mongodb::error::Result<()> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}

/// Build a client for `database_name` and wait until the server answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
    budget: ConnectAttempts,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = budget.first_delay;
    loop {
        attempts += 1;
        match ping(&database).await {
            Ok(()) => {
                debug!(database = database_name, attempts, "MongoDB answered ping");
                return Ok((client, database));
            }
            Err(source) if attempts >= budget.max_attempts => {
                return Err(MongoDaoError::InitialPing { attempts, source });
            }
            Err(err) => {
                warn!(
                    attempts,
                    wait_ms = delay.as_millis(),
                    error = %err,
                    "MongoDB ping failed while connecting; retrying"
                );
                sleep(delay).await;
                delay = (delay * 2).min(budget.max_delay);
            }
        }
    }
}
