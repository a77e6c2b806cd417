use crate::normalize::display_names_equivalent;
use droptally_db::db;
use droptally_db::{PgConnection, QueryResult};
use log::info;

/// Result of the auth gate: does the player exist, and may this submission
/// mutate state under their name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthDecision {
    pub player_exists: bool,
    pub authed: bool,
}

/// Decides whether a submission may mutate state under `player_name`.
///
/// A bound account only authenticates with its stored hash. An unbound
/// (legacy) account binds to the first hash that claims it; if another
/// player already owns that hash under an equivalent display name, that
/// player's name is refreshed to the submitted form first.
pub fn check_auth(
    conn: &mut PgConnection,
    player_name: &str,
    account_hash: &str,
) -> QueryResult<AuthDecision> {
    let Some(player) = db::player_by_name(conn, player_name)? else {
        return Ok(AuthDecision {
            player_exists: false,
            authed: false,
        });
    };

    if let Some(stored_hash) = &player.account_hash {
        return Ok(AuthDecision {
            player_exists: true,
            authed: stored_hash == account_hash,
        });
    }

    // First-writer-wins binding for legacy accounts. When the hash already
    // belongs to a player whose name only drifts by display separators,
    // refresh that player's spelling to the submitted form.
    if let Some(hash_owner) = db::player_by_account_hash(conn, account_hash)? {
        if hash_owner.player_id != player.player_id
            && hash_owner.player_name != player_name
            && display_names_equivalent(&hash_owner.player_name, player_name)
        {
            info!(
                "Account hash already bound to {}; refreshing their display name to {player_name}",
                hash_owner.player_name
            );
            db::update_player_name(conn, hash_owner.player_id, player_name, chrono::Utc::now())?;
        }
    }
    db::bind_account_hash(conn, player.player_id, account_hash)?;

    Ok(AuthDecision {
        player_exists: true,
        authed: true,
    })
}
