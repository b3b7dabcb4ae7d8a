diesel::table! {
    stocks (symbol) {
        symbol -> Text,
        name -> Nullable<Text>,
        sector -> Nullable<Text>,
    }
}

diesel::table! {
    transactions (id) {
        id -> Text,
        symbol -> Text,
        date -> Date,
        kind -> Text,
        quantity -> BigInt,
        price -> BigInt,
        total_cost -> BigInt,
        description -> Text,
    }
}

diesel::table! {
    holdings (symbol) {
        symbol -> Text,
        quantity -> BigInt,
        average_cost -> BigInt,
        total_cost -> BigInt,
        last_price -> Nullable<BigInt>,
        market_value -> Nullable<BigInt>,
        unrealized_gain -> Nullable<BigInt>,
        unrealized_gain_bp -> Nullable<Integer>,
        cost_source -> Text,
    }
}

diesel::table! {
    quotes (id) {
        id -> Integer,
        symbol -> Text,
        last_price -> BigInt,
        previous_close -> BigInt,
        change -> BigInt,
        change_bp -> Integer,
        volume -> BigInt,
        captured_at -> Timestamp,
    }
}
