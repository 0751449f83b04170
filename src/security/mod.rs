pub mod command_executor;
pub mod token_manager;

pub use command_executor::SystemCommandRunner;
pub use token_manager::SecureTokenManager;
