#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fcors_lib::run().await?;
    Ok(())
}
