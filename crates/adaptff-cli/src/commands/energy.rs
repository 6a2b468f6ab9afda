use super::load_geometries;
use crate::cli::EnergyArgs;
use crate::config::{PartialRunConfig, RunConfig};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use adaptff::core::io::report::{self, EvaluatedGeometry};
use adaptff::core::params::store::ParameterStore;
use adaptff::engine::batch::{Batch, Evaluation, GeometryResult};
use adaptff::engine::error::EngineError;
use adaptff::engine::forcefield::ForceField;
use adaptff::engine::progress::ProgressReporter;
use std::path::Path;
use tracing::info;

pub fn run(args: EnergyArgs) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(&args)?;

    let results = evaluate(&config, true)?;
    let energies = results.iter().map(|r| (r.name.as_str(), r.energy));
    match &config.energies {
        Some(path) => {
            report::write_energies_to_path(path, energies).map_err(EngineError::from)?;
            println!(
                "Energies of {} geometries written to: {}",
                results.len(),
                path.display()
            );
        }
        None => {
            report::write_energies(std::io::stdout().lock(), energies)
                .map_err(|e| anyhow::anyhow!("Failed to write energies: {e}"))?;
        }
    }
    Ok(())
}

/// Loads the parameter file and geometries named by `config` and evaluates them,
/// writing the gradient report when one is requested.
pub(crate) fn evaluate(config: &RunConfig, show_progress: bool) -> Result<Vec<GeometryResult>> {
    info!("Loading parameters from {:?}", &config.parameters);
    let params = ParameterStore::load(&config.parameters).map_err(EngineError::from)?;

    let prototype = match config.method {
        Some(method) => ForceField::from_config(method),
        None => ForceField::from_method(params.method())?,
    };
    info!(
        "Using method '{}' with {} parameters.",
        prototype.method(),
        params.len()
    );

    let geometries = load_geometries(&config.geometries)?;
    let mut batch = Batch::new(&prototype, geometries);

    let evaluation = if config.gradients.is_some() {
        Evaluation::Gradient
    } else {
        Evaluation::Energy
    };
    let handler = CliProgressHandler::new();
    let reporter = if show_progress {
        ProgressReporter::with_callback(handler.get_callback())
    } else {
        ProgressReporter::new()
    };
    let results = batch.evaluate(&params, evaluation, &reporter)?;

    if let Some(path) = &config.gradients {
        write_gradients(path, &batch, &results)?;
        println!("Gradients written to: {}", path.display());
    }
    Ok(results)
}

fn write_gradients(path: &Path, batch: &Batch, results: &[GeometryResult]) -> Result<()> {
    let evaluated: Vec<EvaluatedGeometry> = batch
        .geometries()
        .iter()
        .zip(results)
        .filter_map(|(geometry, result)| {
            result.gradient.as_ref().map(|gradient| EvaluatedGeometry {
                name: &geometry.name,
                topology: &geometry.topology,
                gradient,
            })
        })
        .collect();
    report::write_gradients_to_path(path, &evaluated).map_err(EngineError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;
    use crate::error::CliError;
    use adaptff::engine::config::MethodConfig;
    use std::fs;
    use tempfile::tempdir;

    fn run_config(dir: &Path) -> RunConfig {
        RunConfig {
            method: None,
            parameters: fixtures::write(dir, "gold.params", fixtures::GOLD_PARAMS),
            geometries: vec![
                fixtures::write(dir, "dimer.toml", fixtures::GOLD_DIMER),
                fixtures::write(dir, "trimer.toml", fixtures::GOLD_TRIMER),
            ],
            energies: None,
            gradients: None,
        }
    }

    #[test]
    fn method_defaults_to_the_parameter_file_tag() {
        let dir = tempdir().unwrap();
        let results = evaluate(&run_config(dir.path()), false).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "dimer");
        assert_eq!(results[1].name, "trimer");
        assert!(results[1].energy < results[0].energy);
        assert!(results.iter().all(|r| r.gradient.is_none()));
    }

    #[test]
    fn gradients_are_written_when_requested() {
        let dir = tempdir().unwrap();
        let gradients = dir.path().join("gradients.csv");
        let config = RunConfig {
            gradients: Some(gradients.clone()),
            ..run_config(dir.path())
        };
        let results = evaluate(&config, false).unwrap();
        assert!(results.iter().all(|r| r.gradient.is_some()));

        let text = fs::read_to_string(&gradients).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "geometry,atom,label,gx,gy,gz");
        assert_eq!(lines.len(), 1 + 2 + 3);
        assert!(lines[1].starts_with("dimer,0,Au,"));
        assert!(lines[5].starts_with("trimer,2,Au,"));
    }

    #[test]
    fn explicit_method_without_matching_keys_reports_the_sentinel() {
        let dir = tempdir().unwrap();
        let config = RunConfig {
            method: Some("amberff".parse::<MethodConfig>().unwrap()),
            ..run_config(dir.path())
        };
        let results = evaluate(&config, false).unwrap();
        assert!(results.iter().all(|r| r.energy >= 1.0e5));
    }

    #[test]
    fn missing_parameter_file_is_reported() {
        let dir = tempdir().unwrap();
        let config = RunConfig {
            parameters: dir.path().join("missing.params"),
            ..run_config(dir.path())
        };
        assert!(matches!(
            evaluate(&config, false),
            Err(CliError::Core(EngineError::ParamFile(_)))
        ));
    }
}
