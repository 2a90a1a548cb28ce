use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    entropic_cli::main_entry().await
}
