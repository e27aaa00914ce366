// Library side of the `mapper` admin CLI

pub mod bulk_map;
pub mod report;
pub mod review;

use anyhow::Result;

use crate::database_ops::db::Db;
use crate::util::env as env_util;

/// Connect using `--db-url` or the usual env resolution. Never migrates.
pub async fn connect(database_url: Option<String>, max_connections: u32) -> Result<Db> {
    env_util::init_env();
    let url = match database_url {
        Some(url) => url,
        None => env_util::db_url_prefer_session()?,
    };
    Db::connect_no_migrate(&url, max_connections).await
}
