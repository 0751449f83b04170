pub mod cancel;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod fs_ops;
pub mod request;
pub mod state_machine;
pub mod template;
pub mod traits;

pub use cancel::*;
pub use config::*;
pub use config_loader::*;
pub use error::*;
pub use request::*;
pub use state_machine::*;
pub use template::*;
pub use traits::*;
