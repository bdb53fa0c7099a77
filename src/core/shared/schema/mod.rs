pub mod billing;
pub mod clinical;
pub mod core;
pub mod people;

pub use self::billing::*;
pub use self::clinical::*;
pub use self::core::*;
pub use self::people::*;

diesel::joinable!(appointments -> patients (patient_id));
diesel::joinable!(appointments -> volunteers (volunteer_id));
diesel::joinable!(medical_records -> appointments (appointment_id));
diesel::joinable!(medical_records -> patients (patient_id));
diesel::joinable!(medical_records -> volunteers (volunteer_id));
diesel::joinable!(transactions -> appointments (appointment_id));
diesel::joinable!(transactions -> patients (patient_id));

diesel::allow_tables_to_appear_in_same_query!(
    appointments,
    audit_logs,
    clinic_settings,
    form_templates,
    medical_records,
    patients,
    payment_tables,
    specialties,
    transactions,
    users,
    volunteers,
);
