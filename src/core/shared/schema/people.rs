diesel::table! {
    patients (id) {
        id -> Text,
        name -> Text,
        cpf -> Text,
        cpf_lookup -> Text,
        rg -> Nullable<Text>,
        birth_date -> Text,
        whatsapp -> Text,
        email -> Nullable<Text>,
        address -> Text,
        personal_income -> Double,
        family_income -> Double,
        observations -> Nullable<Text>,
        files -> Text,
        photo -> Nullable<Text>,
        active -> Bool,
        payment_table_id -> Nullable<Text>,
        guardian_name -> Nullable<Text>,
        guardian_cpf -> Nullable<Text>,
        guardian_phone -> Nullable<Text>,
        lgpd_consent -> Bool,
        lgpd_consent_date -> Nullable<Text>,
    }
}

diesel::table! {
    volunteers (id) {
        id -> Text,
        name -> Text,
        email -> Text,
        password -> Text,
        birth_date -> Text,
        phone -> Text,
        specialty -> Text,
        license_number -> Text,
        availability -> Text,
        files -> Text,
        active -> Bool,
        appointment_duration -> Integer,
        photo -> Nullable<Text>,
        lgpd_consent -> Bool,
        lgpd_consent_date -> Nullable<Text>,
    }
}
