diesel::table! {
    appointments (id) {
        id -> Text,
        patient_id -> Text,
        volunteer_id -> Nullable<Text>,
        date -> Text,
        time -> Text,
        status -> Text,
        notes -> Nullable<Text>,
        price -> Double,
        amount_paid -> Double,
        payment_status -> Text,
    }
}

diesel::table! {
    medical_records (id) {
        id -> Text,
        appointment_id -> Text,
        patient_id -> Text,
        volunteer_id -> Text,
        chief_complaint -> Text,
        history -> Text,
        procedures -> Nullable<Text>,
        prescription -> Nullable<Text>,
        content -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    specialties (id) {
        id -> Text,
        name -> Text,
        anamnesis_type -> Text,
    }
}

diesel::table! {
    form_templates (id) {
        id -> Text,
        title -> Text,
        #[sql_name = "type"]
        form_type -> Text,
        schema_config -> Text,
        specialties -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamp,
        active -> Bool,
    }
}
