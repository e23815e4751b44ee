use anyhow::Result;

use crate::config;
use crate::openproject::OpenProjectClient;

/// List OpenProject project names and ids, for picking the `project`
/// config value.
pub async fn run() -> Result<()> {
    let cfg = config::load_config()?;
    let client = OpenProjectClient::new(&cfg.openproject.url, &cfg.openproject.api_key);

    let projects = client.list_projects().await?;

    if projects.is_empty() {
        println!("No projects visible to this API key.");
        return Ok(());
    }

    for (name, id) in &projects {
        println!("{:>6}  {}", id, name);
    }

    Ok(())
}
