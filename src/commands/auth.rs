use anyhow::Result;

use crate::{config, gcal};

pub async fn run() -> Result<()> {
    let cfg = config::load_config()?;

    println!("Authenticating with Google...");

    let account = gcal::authenticate(&cfg).await?;

    println!("\nAuthenticated as: {}", account);
    println!("\nNow run `taskmirror status` to preview the mirror,");
    println!("or `taskmirror sync` to synchronize.");

    Ok(())
}
