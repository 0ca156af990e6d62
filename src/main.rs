use anyhow::Result;

fn main() -> Result<()> {
    gantry::run()?;
    Ok(())
}
