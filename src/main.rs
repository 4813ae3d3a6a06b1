use clap::Parser;
use color_eyre::Result;
use meet_faces::{
    init_logging,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    App::new(Args::parse())?.run().await
}
