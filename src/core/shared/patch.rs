//! Partial-update helpers for `PUT` handlers.
//!
//! Request bodies mirror the row with every field optional; only the fields
//! that were sent are copied onto the loaded row, and their names are
//! collected for the audit trail.

/// Copies each present `Option<T>` field of `$req` onto the `T` field of
/// `$target`, pushing the field name onto `$changed`.
macro_rules! apply_present {
    ($target:expr, $req:expr, $changed:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $req.$field {
                $target.$field = value;
                $changed.push(stringify!($field));
            }
        )+
    };
}

/// Same as [`apply_present!`] for nullable columns (`Option<T>` targets).
macro_rules! apply_present_opt {
    ($target:expr, $req:expr, $changed:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $req.$field {
                $target.$field = Some(value);
                $changed.push(stringify!($field));
            }
        )+
    };
}

pub(crate) use apply_present;
pub(crate) use apply_present_opt;
