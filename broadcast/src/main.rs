use broadcast::Broadcast;
use maelstrom_common::{logging, Maelstrom};

pub fn main() -> anyhow::Result<()> {
    logging::init();

    let mut maelstrom = Maelstrom::stdio();
    Broadcast::new().register(&mut maelstrom)?;
    maelstrom.start()?;
    Ok(())
}
