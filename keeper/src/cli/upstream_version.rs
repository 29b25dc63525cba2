use log::info;

use crate::{http::Http, upstream, Result};

/// Prints the latest docker-keeper release.
pub fn upstream_version() -> Result<()> {
    let upstream = upstream::upstream_version(&Http::new()?)?;
    info!("latest docker-keeper release: {upstream}");
    println!("{upstream}");
    Ok(())
}
