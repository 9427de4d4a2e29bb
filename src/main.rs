use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use barscan::error::Result;
use barscan::settings::{Mode, Settings};
use barscan::{logging, receipt, session};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "barscan failed");
        eprintln!("barscan: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    logging::init(&settings.log)?;

    match settings.mode {
        Mode::Session => {
            let receipts = session::run(&settings).await?;
            let rendered = receipt::render_receipts(&receipts);
            println!("{rendered}");
            receipt::write_receipts(&settings.data.receipts, &receipts)?;
            info!(path = %settings.data.receipts.display(), receipts = receipts.len(), "receipts saved");
        }
        Mode::Serve => {
            let catalog = session::load_catalog_from(&settings)?;
            let shutdown = CancellationToken::new();
            let interrupt = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("interrupted");
                        interrupt.cancel();
                    }
                    Err(e) => error!(error = %e, "cannot listen for interrupts"),
                }
            });
            session::serve(&settings, catalog, shutdown).await?;
        }
    }
    Ok(())
}
