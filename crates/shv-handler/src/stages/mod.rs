//! Built-in handler stages (spec.md §4.4.4).

pub mod app;
pub mod device;
pub mod login;
pub mod records;
pub mod responses;
pub mod signals;

pub use app::AppStage;
pub use device::{Alert, DeviceStage};
pub use login::{InMemoryUserDb, LoginStage, LoginType, UserDb};
pub use records::{Record, RecordsStage, RecordsStore};
pub use responses::ResponsesStage;
pub use signals::SignalsStage;
