mod git_workspace;

pub mod github_plugin;
pub mod homebrew_plugin;
pub mod scoop_plugin;
pub mod winget_plugin;

pub use github_plugin::GitHubRepositoryClient;
pub use homebrew_plugin::HomebrewPublisher;
pub use scoop_plugin::ScoopPublisher;
pub use winget_plugin::WingetPublisher;
