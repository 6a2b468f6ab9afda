use crate::core::forcefield::exp::ExpFlavor;
use crate::core::forcefield::term::LabelSource;
use crate::core::forcefield::terms::gupta::GuptaOptions;
use crate::core::forcefield::terms::lennard_jones::LennardJonesOptions;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const AMBER: &str = "amberff";
const GUPTA: &str = "adaptivegupta";
const SWG: &str = "adaptiveSWGFF";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown method '{0}'")]
    UnknownMethod(String),
    #[error("Illegal option '{option}' for {method}")]
    MalformedOption {
        method: &'static str,
        option: String,
    },
    #[error("Unknown exponential mode {0} (expected 0-10)")]
    UnknownExpMode(u8),
}

/// `amberff`: bond, angle, dihedral and Lennard-Jones/Coulomb terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmberConfig {
    pub caching: bool,
    pub total_shift: bool,
    pub labels: LabelSource,
    pub lennard_jones: LennardJonesOptions,
}

impl Default for AmberConfig {
    fn default() -> Self {
        Self {
            caching: true,
            total_shift: false,
            labels: LabelSource::AtomTypes,
            lennard_jones: LennardJonesOptions::default(),
        }
    }
}

impl AmberConfig {
    /// Replaces the Lennard-Jones options; labels and caching follow this configuration.
    pub fn with_lennard_jones(mut self, options: LennardJonesOptions) -> Self {
        self.lennard_jones = LennardJonesOptions {
            labels: self.labels,
            caching: self.caching,
            ..options
        };
        self
    }
}

/// `adaptiveSWGFF`: Stillinger-Weber-Gong two- and three-body terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwgConfig {
    pub blow_fac_close: f64,
    pub caching: bool,
}

impl Default for SwgConfig {
    fn default() -> Self {
        Self {
            blow_fac_close: 0.2,
            caching: true,
        }
    }
}

/// The closed set of adaptive force fields, selected by method string.
///
/// | String                                        | Force field            |
/// |-----------------------------------------------|------------------------|
/// | `amberff[:opt,...]` (`nocache`, `totalshift`, `ids`) | [`AmberConfig`] |
/// | `adaptivegupta:<blowDist>,<cache>[,<expMode>]` | [`GuptaOptions`]      |
/// | `adaptiveSWGFF[:blowfacclose=<f>]`            | [`SwgConfig`]          |
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MethodConfig {
    Amber(AmberConfig),
    Gupta(GuptaOptions),
    Swg(SwgConfig),
}

impl MethodConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Amber(_) => AMBER,
            Self::Gupta(_) => GUPTA,
            Self::Swg(_) => SWG,
        }
    }
}

fn parse_amber(options: Option<&str>) -> Result<AmberConfig, ConfigError> {
    let mut config = AmberConfig::default();
    for option in options
        .into_iter()
        .flat_map(|o| o.split(','))
        .map(str::trim)
        .filter(|o| !o.is_empty())
    {
        match option {
            "nocache" => config.caching = false,
            "totalshift" => config.total_shift = true,
            "ids" => config.labels = LabelSource::SpecialIds,
            other => {
                return Err(ConfigError::MalformedOption {
                    method: AMBER,
                    option: other.to_string(),
                });
            }
        }
    }
    let lennard_jones = config.lennard_jones;
    Ok(config.with_lennard_jones(lennard_jones))
}

fn parse_gupta(options: Option<&str>) -> Result<GuptaOptions, ConfigError> {
    let options = options.ok_or(ConfigError::MissingParameter("blow distance"))?;
    let malformed = || ConfigError::MalformedOption {
        method: GUPTA,
        option: options.to_string(),
    };
    let fields: Vec<&str> = options.split(',').map(str::trim).collect();
    let (blow, cache, mode) = match fields.as_slice() {
        [blow, cache] => (blow, cache, None),
        [blow, cache, mode] => (blow, cache, Some(mode)),
        [_] => return Err(ConfigError::MissingParameter("caching flag")),
        _ => return Err(malformed()),
    };
    let blow_dist = blow.parse::<f64>().map_err(|_| malformed())?;
    let caching = cache.parse::<bool>().map_err(|_| malformed())?;
    let exp = match mode {
        None => ExpFlavor::Standard,
        Some(mode) => {
            let mode = mode.parse::<u8>().map_err(|_| malformed())?;
            ExpFlavor::from_mode(mode).ok_or(ConfigError::UnknownExpMode(mode))?
        }
    };
    Ok(GuptaOptions {
        blow_dist,
        caching,
        exp,
    })
}

fn parse_swg(options: Option<&str>) -> Result<SwgConfig, ConfigError> {
    let mut config = SwgConfig::default();
    if let Some(option) = options.map(str::trim).filter(|o| !o.is_empty()) {
        let malformed = || ConfigError::MalformedOption {
            method: SWG,
            option: option.to_string(),
        };
        let value = option.strip_prefix("blowfacclose=").ok_or_else(malformed)?;
        config.blow_fac_close = value.trim().parse().map_err(|_| malformed())?;
    }
    Ok(config)
}

impl FromStr for MethodConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, options) = match s.split_once(':') {
            Some((name, options)) => (name.trim(), Some(options)),
            None => (s, None),
        };
        match name {
            AMBER => parse_amber(options).map(Self::Amber),
            GUPTA => parse_gupta(options).map(Self::Gupta),
            SWG => parse_swg(options).map(Self::Swg),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for MethodConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amber(config) => {
                let mut options = Vec::new();
                if !config.caching {
                    options.push("nocache");
                }
                if config.total_shift {
                    options.push("totalshift");
                }
                if config.labels == LabelSource::SpecialIds {
                    options.push("ids");
                }
                if options.is_empty() {
                    write!(f, "{AMBER}")
                } else {
                    write!(f, "{AMBER}:{}", options.join(","))
                }
            }
            Self::Gupta(options) => write!(
                f,
                "{GUPTA}:{},{},{}",
                options.blow_dist,
                options.caching,
                options.exp.mode()
            ),
            Self::Swg(config) => write!(f, "{SWG}:blowfacclose={}", config.blow_fac_close),
        }
    }
}

/// Programmatic construction of [`LennardJonesOptions`]; every cutoff and scale is required.
#[derive(Default)]
pub struct LennardJonesOptionsBuilder {
    blow_dist: Option<f64>,
    blow_close: Option<f64>,
    scale_14: Option<f64>,
    scale_14_electrostatic: Option<f64>,
    labels: Option<LabelSource>,
    caching: Option<bool>,
}

impl LennardJonesOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blow_dist(mut self, factor: f64) -> Self {
        self.blow_dist = Some(factor);
        self
    }
    pub fn blow_close(mut self, factor: f64) -> Self {
        self.blow_close = Some(factor);
        self
    }
    pub fn scale_14(mut self, scale: f64) -> Self {
        self.scale_14 = Some(scale);
        self
    }
    pub fn scale_14_electrostatic(mut self, scale: f64) -> Self {
        self.scale_14_electrostatic = Some(scale);
        self
    }
    pub fn labels(mut self, labels: LabelSource) -> Self {
        self.labels = Some(labels);
        self
    }
    pub fn caching(mut self, caching: bool) -> Self {
        self.caching = Some(caching);
        self
    }

    pub fn build(self) -> Result<LennardJonesOptions, ConfigError> {
        Ok(LennardJonesOptions {
            blow_dist: self
                .blow_dist
                .ok_or(ConfigError::MissingParameter("blow_dist"))?,
            blow_close: self
                .blow_close
                .ok_or(ConfigError::MissingParameter("blow_close"))?,
            scale_14: self
                .scale_14
                .ok_or(ConfigError::MissingParameter("scale_14"))?,
            scale_14_electrostatic: self
                .scale_14_electrostatic
                .ok_or(ConfigError::MissingParameter("scale_14_electrostatic"))?,
            labels: self.labels.unwrap_or_default(),
            caching: self.caching.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_amberff_uses_defaults() {
        let config: MethodConfig = "amberff".parse().unwrap();
        assert_eq!(config, MethodConfig::Amber(AmberConfig::default()));
        assert_eq!(config.to_string(), "amberff");
    }

    #[test]
    fn amberff_options_are_applied_to_every_term() {
        let config: MethodConfig = "amberff:nocache,totalshift,ids".parse().unwrap();
        let MethodConfig::Amber(amber) = config else {
            panic!("expected amberff, got {config:?}");
        };
        assert!(!amber.caching);
        assert!(amber.total_shift);
        assert_eq!(amber.labels, LabelSource::SpecialIds);
        assert!(!amber.lennard_jones.caching);
        assert_eq!(amber.lennard_jones.labels, LabelSource::SpecialIds);
        assert_eq!(config.to_string(), "amberff:nocache,totalshift,ids");
    }

    #[test]
    fn unknown_amberff_option_is_rejected() {
        assert_eq!(
            "amberff:fast".parse::<MethodConfig>(),
            Err(ConfigError::MalformedOption {
                method: "amberff",
                option: "fast".to_string()
            })
        );
    }

    #[test]
    fn gupta_string_sets_cutoff_caching_and_exp_mode() {
        let config: MethodConfig = "adaptivegupta:2.5,false,5".parse().unwrap();
        assert_eq!(
            config,
            MethodConfig::Gupta(GuptaOptions {
                blow_dist: 2.5,
                caching: false,
                exp: ExpFlavor::Limit { squarings: 8 },
            })
        );
        assert_eq!(config.to_string(), "adaptivegupta:2.5,false,5");
    }

    #[test]
    fn gupta_exp_modes_three_and_ten_are_standard() {
        for mode in ["3", "10"] {
            let config: MethodConfig = format!("adaptivegupta:2.0,true,{mode}").parse().unwrap();
            let MethodConfig::Gupta(options) = config else {
                panic!("expected adaptivegupta");
            };
            assert_eq!(options.exp, ExpFlavor::Standard);
        }
    }

    #[test]
    fn gupta_rejects_unknown_exp_mode_and_missing_fields() {
        assert_eq!(
            "adaptivegupta:2.0,true,42".parse::<MethodConfig>(),
            Err(ConfigError::UnknownExpMode(42))
        );
        assert_eq!(
            "adaptivegupta".parse::<MethodConfig>(),
            Err(ConfigError::MissingParameter("blow distance"))
        );
        assert_eq!(
            "adaptivegupta:2.0".parse::<MethodConfig>(),
            Err(ConfigError::MissingParameter("caching flag"))
        );
        assert!(matches!(
            "adaptivegupta:far,true".parse::<MethodConfig>(),
            Err(ConfigError::MalformedOption { method: "adaptivegupta", .. })
        ));
    }

    #[test]
    fn swgff_parses_close_contact_factor() {
        assert_eq!(
            "adaptiveSWGFF".parse::<MethodConfig>().unwrap(),
            MethodConfig::Swg(SwgConfig::default())
        );
        let config: MethodConfig = "adaptiveSWGFF:blowfacclose=0.35".parse().unwrap();
        assert_eq!(
            config,
            MethodConfig::Swg(SwgConfig {
                blow_fac_close: 0.35,
                caching: true
            })
        );
        assert_eq!(config.to_string(), "adaptiveSWGFF:blowfacclose=0.35");
        assert!(matches!(
            "adaptiveSWGFF:closeness=0.35".parse::<MethodConfig>(),
            Err(ConfigError::MalformedOption { method: "adaptiveSWGFF", .. })
        ));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert_eq!(
            "adaptivemorse:foo".parse::<MethodConfig>(),
            Err(ConfigError::UnknownMethod("adaptivemorse:foo".to_string()))
        );
    }

    #[test]
    fn lennard_jones_builder_requires_cutoffs_and_scales() {
        let result = LennardJonesOptionsBuilder::new()
            .blow_dist(15.0)
            .blow_close(0.7)
            .scale_14(0.5)
            .build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("scale_14_electrostatic"))
        );

        let options = LennardJonesOptionsBuilder::new()
            .blow_dist(15.0)
            .blow_close(0.7)
            .scale_14(0.5)
            .scale_14_electrostatic(0.8)
            .caching(false)
            .build()
            .unwrap();
        assert_eq!(options.blow_dist, 15.0);
        assert_eq!(options.labels, LabelSource::AtomTypes);
        assert!(!options.caching);
    }

    #[test]
    fn amber_config_keeps_its_labels_when_lennard_jones_options_change() {
        let amber = AmberConfig {
            labels: LabelSource::SpecialIds,
            ..AmberConfig::default()
        };
        let options = LennardJonesOptionsBuilder::new()
            .blow_dist(10.0)
            .blow_close(0.5)
            .scale_14(1.0)
            .scale_14_electrostatic(1.0)
            .build()
            .unwrap();
        let amber = amber.with_lennard_jones(options);
        assert_eq!(amber.lennard_jones.labels, LabelSource::SpecialIds);
        assert_eq!(amber.lennard_jones.blow_dist, 10.0);
    }
}
