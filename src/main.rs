use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match testair::cli::run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
