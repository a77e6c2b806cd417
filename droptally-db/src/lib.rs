mod pool;
mod schema;
mod url;

pub mod db;
pub mod models;

pub(crate) use schema::*;

pub use pool::{ConnectionPool, PooledConnection, get_pool};
pub use url::postgres_url_from_environment;

pub use diesel::r2d2::PoolError;
pub use diesel::result::QueryResult;
pub use diesel::{Connection, PgConnection};

/// The implicit "global" group; every player is a member.
pub const GLOBAL_GROUP_ID: i32 = 2;
