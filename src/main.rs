#[tokio::main]
async fn main() -> anyhow::Result<()> {
    focusplay_lib::run().await
}
