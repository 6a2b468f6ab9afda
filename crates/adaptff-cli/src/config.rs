use crate::cli::EnergyArgs;
use crate::error::{CliError, Result};
use adaptff::engine::config::MethodConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOutputConfig {
    energies: Option<PathBuf>,
    gradients: Option<PathBuf>,
}

/// Run configuration as written on disk; relative paths are resolved against
/// the directory of the file.
///
/// ```toml
/// method = "adaptivegupta:2.0,true"
/// parameters = "gold.params"
/// geometries = ["dimer.toml", "trimer.toml"]
///
/// [output]
/// energies = "energies.csv"
/// gradients = "gradients.csv"
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialRunConfig {
    method: Option<String>,
    parameters: Option<PathBuf>,
    geometries: Option<Vec<PathBuf>>,
    output: Option<PartialOutputConfig>,
}

/// Fully resolved settings of an `energy` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// `None` means the method the parameter file is tagged with.
    pub method: Option<MethodConfig>,
    pub parameters: PathBuf,
    pub geometries: Vec<PathBuf>,
    pub energies: Option<PathBuf>,
    pub gradients: Option<PathBuf>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(p) = self.parameters.as_mut() {
            resolve(p);
        }
        for p in self.geometries.iter_mut().flatten() {
            resolve(p);
        }
        if let Some(output) = self.output.as_mut() {
            output.energies.iter_mut().for_each(resolve);
            output.gradients.iter_mut().for_each(resolve);
        }
    }

    pub fn merge_with_cli(mut self, args: &EnergyArgs) -> Result<RunConfig> {
        self.apply_set_values(&args.set_values)?;
        let output = self.output.take().unwrap_or_default();

        let method = args
            .method
            .as_ref()
            .or(self.method.as_ref())
            .map(|m| {
                m.parse::<MethodConfig>()
                    .map_err(|e| CliError::Config(e.to_string()))
            })
            .transpose()?;

        let parameters = args
            .params
            .clone()
            .or(self.parameters)
            .ok_or_else(|| {
                CliError::Config(
                    "A parameter file is required either in the config file (`parameters`) or via --params."
                        .to_string(),
                )
            })?;

        let geometries = if args.geometries.is_empty() {
            self.geometries.unwrap_or_default()
        } else {
            args.geometries.clone()
        };
        if geometries.is_empty() {
            return Err(CliError::Config(
                "At least one geometry is required either in the config file (`geometries`) or as an argument."
                    .to_string(),
            ));
        }

        Ok(RunConfig {
            method,
            parameters,
            geometries,
            energies: args.energies.clone().or(output.energies),
            gradients: args.gradients.clone().or(output.gradients),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            match key {
                "method" => self.method = Some(value.to_string()),
                "parameters" => self.parameters = Some(PathBuf::from(value)),
                "output.energies" => {
                    self.output.get_or_insert_with(Default::default).energies =
                        Some(PathBuf::from(value));
                }
                "output.gradients" => {
                    self.output.get_or_insert_with(Default::default).gradients =
                        Some(PathBuf::from(value));
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
