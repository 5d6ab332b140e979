use maelstrom_common::{logging, Maelstrom};

fn main() -> anyhow::Result<()> {
    logging::init();

    let mut maelstrom = Maelstrom::stdio();
    echo::register(&mut maelstrom)?;
    maelstrom.start()?;
    Ok(())
}
