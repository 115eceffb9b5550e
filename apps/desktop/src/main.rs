use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{SessionState, UploadCandidate, UploadSession};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    relay_url: String,
    /// Noisy face image to clean up.
    image: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut session = UploadSession::new(args.relay_url);
    session.select_files(vec![UploadCandidate::from_path(&args.image)?]);
    session.submit().await;

    match session.state() {
        SessionState::Resolved { .. } => {
            let bytes = session
                .result_png_bytes()?
                .ok_or_else(|| anyhow!("resolved session carries no image"))?;
            let output = args.image.with_extension("denoised.png");
            std::fs::write(&output, bytes)?;
            println!("Denoised image written to {}", output.display());
            Ok(())
        }
        SessionState::Failed { message, .. } => Err(anyhow!("denoise failed: {message}")),
        other => Err(anyhow!("unexpected session state: {other:?}")),
    }
}
