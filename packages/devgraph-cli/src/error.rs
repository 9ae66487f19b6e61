//! Maps library errors onto the three non-zero exit codes the CLI
//! contract promises: 1 user error, 2 system error, 3 readiness not met.

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    User(String),
    System(String),
    ReadinessNotMet(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::User(_) => 1,
            CliError::System(_) => 2,
            CliError::ReadinessNotMet(_) => 3,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CliError::User(m) | CliError::System(m) | CliError::ReadinessNotMet(m) => m,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for CliError {}

impl From<devgraph_ir::IrError> for CliError {
    fn from(e: devgraph_ir::IrError) -> Self {
        match &e {
            devgraph_ir::IrError::Config(_) | devgraph_ir::IrError::Query(_) => CliError::User(e.to_string()),
            devgraph_ir::IrError::Storage(devgraph_storage::StorageError::Locked(_))
            | devgraph_ir::IrError::Storage(devgraph_storage::StorageError::NotFound(_, _)) => {
                CliError::ReadinessNotMet(e.to_string())
            }
            _ => CliError::System(e.to_string()),
        }
    }
}

impl From<devgraph_hub::HubError> for CliError {
    fn from(e: devgraph_hub::HubError) -> Self {
        match &e {
            devgraph_hub::HubError::RepoNotFound(_) => CliError::User(e.to_string()),
            _ => CliError::System(e.to_string()),
        }
    }
}

impl From<devgraph_storage::StorageError> for CliError {
    fn from(e: devgraph_storage::StorageError) -> Self {
        match &e {
            devgraph_storage::StorageError::Locked(_) => CliError::ReadinessNotMet(e.to_string()),
            devgraph_storage::StorageError::NotFound(_, _) => CliError::ReadinessNotMet(e.to_string()),
            _ => CliError::System(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_cli_contract() {
        assert_eq!(CliError::User("x".into()).exit_code(), 1);
        assert_eq!(CliError::System("x".into()).exit_code(), 2);
        assert_eq!(CliError::ReadinessNotMet("x".into()).exit_code(), 3);
    }

    #[test]
    fn locked_storage_error_maps_to_readiness_not_met() {
        let e = devgraph_storage::StorageError::Locked("pkg/main".into());
        assert_eq!(CliError::from(e).exit_code(), 3);
    }

    #[test]
    fn repo_not_found_maps_to_user_error() {
        let e = devgraph_hub::HubError::RepoNotFound("acme/widgets".into());
        assert_eq!(CliError::from(e).exit_code(), 1);
    }
}
