pub mod billing;
pub use self::billing::*;

pub mod clinical;
pub use self::clinical::*;

pub mod core;
pub use self::core::*;

pub mod people;
pub use self::people::*;

pub use super::schema;
