diesel::table! {
    users (id) {
        id -> Text,
        name -> Text,
        username -> Text,
        password -> Text,
        role -> Text,
        avatar -> Nullable<Text>,
        volunteer_id -> Nullable<Text>,
    }
}

diesel::table! {
    audit_logs (id) {
        id -> Integer,
        user_id -> Text,
        user_name -> Text,
        action -> Text,
        resource -> Text,
        resource_id -> Nullable<Text>,
        details -> Nullable<Text>,
        ip_address -> Nullable<Text>,
        timestamp -> Timestamp,
    }
}

diesel::table! {
    clinic_settings (id) {
        id -> Text,
        clinic_name -> Text,
        company_name -> Nullable<Text>,
        cnpj -> Nullable<Text>,
        address -> Nullable<Text>,
        city -> Nullable<Text>,
        phone -> Nullable<Text>,
        email -> Nullable<Text>,
        website -> Nullable<Text>,
        logo_url -> Nullable<Text>,
        primary_color -> Text,
        backup_frequency -> Text,
        backup_time -> Text,
        last_backup_at -> Nullable<Text>,
    }
}
