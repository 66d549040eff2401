//! Diesel tables for the service tables.
//!
//! Rust names are snake_case; `sql_name` maps them to the physical camelCase columns.

diesel::table! {
    users (id) {
        #[sql_name = "_id"]
        id -> BigInt,
        #[sql_name = "id"]
        remote_id -> Nullable<BigInt>,
        email -> Text,
        username -> Text,
        timezone -> Nullable<Text>,
        #[sql_name = "isSubAccount"]
        is_sub_account -> Integer,
        #[sql_name = "isNotProtected"]
        is_not_protected -> Nullable<Integer>,
        #[sql_name = "createdAt"]
        created_at -> Nullable<BigInt>,
        #[sql_name = "updatedAt"]
        updated_at -> Nullable<BigInt>,
    }
}

diesel::table! {
    #[sql_name = "syncRangeCheckpoints"]
    sync_range_checkpoints (id) {
        #[sql_name = "_id"]
        id -> BigInt,
        user_id -> Nullable<BigInt>,
        #[sql_name = "subUserId"]
        sub_user_id -> Nullable<BigInt>,
        #[sql_name = "collName"]
        coll_name -> Text,
        symbol -> Text,
        timeframe -> Text,
        #[sql_name = "baseStartFrom"]
        base_start_from -> Nullable<BigInt>,
        #[sql_name = "baseStartTo"]
        base_start_to -> Nullable<BigInt>,
        #[sql_name = "currStart"]
        curr_start -> Nullable<BigInt>,
        #[sql_name = "currEnd"]
        curr_end -> Nullable<BigInt>,
        #[sql_name = "createdAt"]
        created_at -> Nullable<BigInt>,
        #[sql_name = "updatedAt"]
        updated_at -> Nullable<BigInt>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(sync_range_checkpoints, users,);
