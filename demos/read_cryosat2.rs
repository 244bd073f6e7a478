use anyhow::Result;
use sitvar::{SEA_ICE_VOLUME, Settings, read_cryosat2};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Point it at a file via SITVAR_CRYOSAT2 or a `.sitvarrc` file.
    let settings = Settings::from_env()?;

    let ds = read_cryosat2(&settings.cryosat2_file)?;
    println!("{ds}");

    if let Some(volume) = ds.data_var(SEA_ICE_VOLUME) {
        let valid: Vec<f64> = volume.values().iter().copied().filter(|v| !v.is_nan()).collect();
        if !valid.is_empty() {
            let mean = valid.iter().sum::<f64>() / valid.len() as f64;
            println!("mean {SEA_ICE_VOLUME}: {mean:.3} over {} cells", valid.len());
        }
    }
    Ok(())
}
