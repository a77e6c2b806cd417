use diesel::prelude::*;
use log::warn;

pub fn set_current_user_statement_timeout(
    conn: &mut PgConnection,
    timeout_seconds: i64,
) -> QueryResult<usize> {
    // `alter role` cannot take a prepared parameter. `timeout_seconds` is an
    // i64 so its format cannot contain a quote character.
    diesel::sql_query(format!(
        "alter role CURRENT_USER set statement_timeout='{}s'",
        timeout_seconds
    ))
    .execute(conn)
}

pub const POINT_DIVISOR_OPTION: &str = "dt_points_gp_per_point";
pub const DEFAULT_POINT_DIVISOR: i64 = 1_000_000;

pub fn option_value(conn: &mut PgConnection, key: &str) -> QueryResult<Option<String>> {
    use crate::schema::app_options::dsl;

    dsl::app_options
        .filter(dsl::option_key.eq(key))
        .select(dsl::option_value)
        .first(conn)
        .optional()
}

/// The GP-per-point divisor for drop point awards. Operators have stored
/// booleans and floats in this option over the years, so parse leniently.
pub fn point_divisor(conn: &mut PgConnection) -> QueryResult<i64> {
    let Some(raw) = option_value(conn, POINT_DIVISOR_OPTION)? else {
        return Ok(DEFAULT_POINT_DIVISOR);
    };

    let value = raw.trim();
    let parsed = match value.to_lowercase().as_str() {
        "true" | "yes" | "on" => Some(1),
        "false" | "no" | "off" => Some(0),
        _ => value
            .parse::<i64>()
            .ok()
            .or_else(|| value.parse::<f64>().ok().map(|f| f as i64)),
    };

    Ok(parsed.unwrap_or_else(|| {
        warn!("Unparseable {POINT_DIVISOR_OPTION} option {value:?}, using default");
        DEFAULT_POINT_DIVISOR
    }))
}
