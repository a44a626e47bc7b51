pub mod app;

pub use app::{App, AppSpec, AppStatus};
