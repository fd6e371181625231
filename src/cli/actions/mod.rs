pub mod admin;
pub mod report;
pub mod server;

use anyhow::Result;
use std::path::PathBuf;

/// What the process was asked to do.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    CreateSuperuser {
        dsn: String,
        email: String,
        password: Option<String>,
        name: String,
    },
    ChangePassword {
        dsn: String,
        email: String,
        password: Option<String>,
    },
    UpgradeSuperuser {
        dsn: String,
        email: String,
    },
    Report {
        dsn: String,
        output: PathBuf,
    },
}

impl Action {
    /// Execute the action.
    ///
    /// # Errors
    /// Returns an error if the action fails; the binary exits non-zero.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
            Self::CreateSuperuser {
                dsn,
                email,
                password,
                name,
            } => admin::create_superuser(&dsn, &email, password.as_deref(), &name).await,
            Self::ChangePassword {
                dsn,
                email,
                password,
            } => admin::change_password(&dsn, &email, password.as_deref()).await,
            Self::UpgradeSuperuser { dsn, email } => admin::upgrade_superuser(&dsn, &email).await,
            Self::Report { dsn, output } => report::execute(&dsn, &output).await,
        }
    }
}
