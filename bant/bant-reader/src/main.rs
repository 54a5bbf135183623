mod config;
mod dump;

use anyhow::{Result, bail};
use bant_crypt::emulated::EmulatedTag;
use bant_crypt::{BantReader, FileSeedSource, ReadOutcome};

fn main() -> Result<()> {
    env_logger::init();

    let config = config::parse()?;
    log::info!("seed database: {}", config.seeds.path.display());

    let mut tag = EmulatedTag::load(&config.tag.path)?;
    let mut reader = BantReader::new(FileSeedSource::new(&config.seeds.path));

    match reader.run(&mut tag)? {
        ReadOutcome::Unverified => log::info!("not a BANT tag"),
        ReadOutcome::Unsupported { product_id } => {
            log::info!("BANT product {product_id:#06x} has no known seed");
        }
        ReadOutcome::Complete(image) => dump::write(&image, config.output.path.as_deref())?,
        ReadOutcome::Incomplete(image) => {
            dump::write(&image, config.output.path.as_deref())?;
            bail!(
                "incomplete read: {} of {} pages",
                image.pages_read(),
                image.pages_total()
            );
        }
    }

    Ok(())
}
