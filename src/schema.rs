diesel::table! {
    beers (seq) {
        seq -> BigInt,
        id -> Text,
        cat_name -> Nullable<Text>,
        style_name -> Nullable<Text>,
        brewery_id -> Nullable<Text>,
        doc -> Text,
    }
}

diesel::table! {
    breweries (seq) {
        seq -> BigInt,
        id -> Text,
        doc -> Text,
    }
}

diesel::table! {
    favorites (seq) {
        seq -> BigInt,
        username -> Text,
        beer_id -> Text,
    }
}

diesel::table! {
    login_session (id) {
        id -> Text,
        username -> Text,
        created_at -> Timestamp,
        expires_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    reviews (seq) {
        seq -> BigInt,
        id -> Text,
        beer_id -> Text,
        user_id -> Text,
        rating -> SmallInt,
        review -> Text,
        tastes -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    user_reviews (seq) {
        seq -> BigInt,
        username -> Text,
        review_id -> Text,
    }
}

diesel::table! {
    users (username) {
        username -> Text,
        id -> Text,
        password -> Text,
        created_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    beers,
    breweries,
    favorites,
    login_session,
    reviews,
    user_reviews,
    users,
);
