use crate::models::NewNotification;
use diesel::prelude::*;

/// Inserts a pending notification. Returns None when the DB-level unique
/// index on (kind, player, group, payload) already holds an identical row.
pub fn insert_notification(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> QueryResult<Option<i64>> {
    use crate::schema::notification_queue::dsl;

    notification
        .insert_into(dsl::notification_queue)
        .on_conflict_do_nothing()
        .returning(dsl::id)
        .get_result(conn)
        .optional()
}

pub fn pending_notification_count(conn: &mut PgConnection) -> QueryResult<i64> {
    use crate::schema::notification_queue::dsl;

    dsl::notification_queue
        .filter(dsl::status.eq("pending"))
        .count()
        .get_result(conn)
}
