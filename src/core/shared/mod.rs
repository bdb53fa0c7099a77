pub mod enums;
pub mod error;
pub mod models;
pub mod patch;
pub mod schema;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod utils;

pub use enums::*;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
pub use utils::{create_conn, run_migrations, DbPool};
