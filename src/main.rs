use complymap::cli::ComplyMapCLI;
use complymap::BoxError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    ComplyMapCLI::run().await
}
