pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod security;

pub use self::core::*;
pub use orchestration::{ReleaseOrchestrator, WorkflowRunResolver};
pub use plugins::{GitHubRepositoryClient, HomebrewPublisher, ScoopPublisher, WingetPublisher};
pub use security::{SecureTokenManager, SystemCommandRunner};
