pub mod users;

pub use users::{StoreError, UserStore};
