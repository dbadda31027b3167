use clap::{Args, Subcommand};

/// Where and as whom client commands talk to the server.
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Server base URL
    #[arg(long, env = "REDLINE_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Bearer token (see `redline admin token`)
    #[arg(long, env = "REDLINE_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Mint a token for a user and print the credential to add to the config file
    Token {
        /// User id from the [[users]] table
        #[arg(long)]
        user: String,
    },
}
