diesel::table! {
    transactions (id) {
        id -> Text,
        amount -> Double,
        #[sql_name = "type"]
        kind -> Text,
        date -> Timestamp,
        description -> Text,
        patient_id -> Nullable<Text>,
        appointment_id -> Nullable<Text>,
        payment_method -> Text,
        created_at -> Timestamp,
        created_by -> Nullable<Text>,
    }
}

diesel::table! {
    payment_tables (id) {
        id -> Text,
        name -> Text,
        value -> Double,
    }
}
