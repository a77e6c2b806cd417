diesel::table! {
    players (player_id) {
        player_id -> Int4,
        wom_id -> Nullable<Int4>,
        player_name -> Text,
        account_hash -> Nullable<Text>,
        user_id -> Nullable<Int4>,
        log_slots -> Int4,
        total_level -> Int4,
        hidden -> Bool,
        date_added -> Timestamp,
        date_updated -> Timestamp,
    }
}

diesel::table! {
    users (user_id) {
        user_id -> Int4,
        username -> Text,
        auth_token -> Text,
        discord_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    user_configurations (id) {
        id -> Int8,
        user_id -> Int4,
        config_key -> Text,
        config_value -> Text,
    }
}

diesel::table! {
    groups (group_id) {
        group_id -> Int4,
        group_name -> Text,
        wom_group_id -> Nullable<Int4>,
        description -> Nullable<Text>,
        icon_url -> Nullable<Text>,
        invite_url -> Nullable<Text>,
        date_added -> Timestamp,
        date_updated -> Timestamp,
    }
}

diesel::table! {
    group_configurations (id) {
        id -> Int8,
        group_id -> Int4,
        config_key -> Text,
        config_value -> Text,
        long_value -> Nullable<Text>,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    group_members (player_id, group_id) {
        player_id -> Int4,
        group_id -> Int4,
    }
}

diesel::table! {
    items (item_id) {
        item_id -> Int4,
        item_name -> Text,
        stackable -> Bool,
        noted -> Bool,
    }
}

diesel::table! {
    npcs (npc_id) {
        npc_id -> Int4,
        npc_name -> Text,
    }
}

diesel::table! {
    drops (drop_id) {
        drop_id -> Int8,
        player_id -> Int4,
        item_id -> Int4,
        npc_id -> Int4,
        value -> Int8,
        quantity -> Int4,
        partition -> Int4,
        image_url -> Nullable<Text>,
        authenticated -> Bool,
        used_api -> Bool,
        unique_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    personal_bests (id) {
        id -> Int8,
        player_id -> Int4,
        npc_id -> Int4,
        team_size -> Text,
        personal_best_ms -> Int8,
        kill_time_ms -> Int8,
        new_pb -> Bool,
        image_url -> Nullable<Text>,
        used_api -> Bool,
        unique_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    combat_achievements (id) {
        id -> Int8,
        player_id -> Int4,
        task_name -> Text,
        image_url -> Nullable<Text>,
        used_api -> Bool,
        unique_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    collection_log_entries (log_id) {
        log_id -> Int8,
        player_id -> Int4,
        item_id -> Int4,
        npc_id -> Int4,
        reported_slots -> Nullable<Int4>,
        image_url -> Nullable<Text>,
        used_api -> Bool,
        unique_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    player_pets (id) {
        id -> Int8,
        player_id -> Int4,
        item_id -> Int4,
        pet_name -> Text,
        unique_id -> Nullable<Text>,
        date_added -> Timestamp,
    }
}

diesel::table! {
    notification_queue (id) {
        id -> Int8,
        notification_type -> Text,
        player_id -> Int4,
        group_id -> Nullable<Int4>,
        data -> Text,
        status -> Text,
        created_at -> Timestamp,
        processed_at -> Nullable<Timestamp>,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    point_credits (id) {
        id -> Int8,
        player_id -> Nullable<Int4>,
        group_id -> Nullable<Int4>,
        source -> Text,
        amount -> Int8,
        amount_remaining -> Int8,
        earned_at -> Timestamp,
        expires_at -> Nullable<Timestamp>,
        status -> Text,
        revoked_at -> Nullable<Timestamp>,
        revocation_reason -> Nullable<Text>,
    }
}

diesel::table! {
    point_debits (id) {
        id -> Int8,
        player_id -> Nullable<Int4>,
        group_id -> Nullable<Int4>,
        spent_by_player_id -> Nullable<Int4>,
        amount -> Int8,
        reason -> Text,
        allocations -> Jsonb,
        activation_id -> Nullable<Int8>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    premium_features (id) {
        id -> Int4,
        feature_key -> Text,
        name -> Text,
        scope -> Text,
        cost_points -> Int8,
        duration_days -> Int4,
        allow_multiple -> Bool,
        active -> Bool,
    }
}

diesel::table! {
    feature_activations (id) {
        id -> Int8,
        player_id -> Nullable<Int4>,
        group_id -> Nullable<Int4>,
        feature_id -> Int4,
        start_at -> Timestamp,
        end_at -> Timestamp,
        auto_renew -> Bool,
        status -> Text,
    }
}

diesel::table! {
    recurring_point_grants (id) {
        id -> Int8,
        player_id -> Int4,
        source -> Text,
        external_ref -> Nullable<Text>,
        amount_per_period -> Int8,
        cadence -> Text,
        last_granted_at -> Nullable<Timestamp>,
        next_due_at -> Nullable<Timestamp>,
        status -> Text,
    }
}

diesel::table! {
    app_options (option_key) {
        option_key -> Text,
        option_value -> Text,
    }
}

diesel::joinable!(feature_activations -> premium_features (feature_id));
diesel::joinable!(group_members -> players (player_id));
diesel::joinable!(group_members -> groups (group_id));
diesel::joinable!(user_configurations -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    players,
    users,
    user_configurations,
    groups,
    group_configurations,
    group_members,
    items,
    npcs,
    drops,
    personal_bests,
    combat_achievements,
    collection_log_entries,
    player_pets,
    notification_queue,
    point_credits,
    point_debits,
    premium_features,
    feature_activations,
    recurring_point_grants,
    app_options,
);
