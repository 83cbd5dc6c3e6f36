/// Replay a trained wavelet decoder over the held-out fold of a recording
///
/// Usage: `wavelet-eval [options.json]`
use wavelet_decoder::{eval, DecoderOptions};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading options from: {}", path);
            DecoderOptions::from_file(&path)?
        }
        None => DecoderOptions::default(),
    };

    log::info!("=== Wavelet decoder evaluation ===");
    log::info!("  - Dataset: {}", options.data_path.display());
    log::info!("  - Model: {}", options.model_path.display());
    log::info!("  - Timesteps: {}", options.model_timesteps);
    log::info!("  - CV folds: {}", options.num_cvs);
    log::info!("  - Batch size: {}", options.batch_size);

    let report = eval::run(&options)?;

    log::info!("Frames shown: {}", report.frames);
    log::info!("Weighted loss: {}", report.losses.weighted);
    log::info!("DONE!");

    Ok(())
}
