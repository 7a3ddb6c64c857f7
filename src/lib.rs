pub mod config;
pub mod corpus;
pub mod error;
pub mod http;
pub mod insights;
pub mod prompts;
pub mod sections;

/// Load a `.env` file from the working directory if one exists.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
