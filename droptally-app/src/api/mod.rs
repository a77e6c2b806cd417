mod admin;
mod check;
mod error;
mod health;
mod views;
mod webhook;

pub use error::ApiError;

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        webhook::webhook,
        webhook::webhook_not_multipart,
        webhook::submit,
        webhook::submit_not_multipart,
        check::check,
        admin::force_rebuild,
        admin::sync_groups,
        views::load_config,
        views::top_players,
        views::top_groups,
        views::top_npcs,
        views::player_search,
        views::group_search,
        health::health,
        health::ping,
    ]
}
