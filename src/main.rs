use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    wireline_cli::run().await
}
