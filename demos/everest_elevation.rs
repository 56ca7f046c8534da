use anyhow::Result;
use eesmoke::{EVEREST, SRTM_DATASET, Session};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Reads credentials from ~/.config/earthengine/credentials.
    let session = Session::from_env()?;

    println!("{}", session.echo("Greetings from the Earth Engine servers!")?);

    let elevation = session.sample_point(SRTM_DATASET, EVEREST, 30.0, "elevation")?;
    println!("Mount Everest elevation (m): {}", elevation);
    Ok(())
}
