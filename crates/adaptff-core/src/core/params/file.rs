use super::store::{ParamStoreError, ParameterStore};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const METHOD_OPEN: &str = "<PARAMETERSFOR>";
const METHOD_CLOSE: &str = "</PARAMETERSFOR>";
const FITNESS_OPEN: &str = "<PARAMETERFITNESS>";
const FITNESS_CLOSE: &str = "</PARAMETERFITNESS>";
const BLOCK_OPEN: &str = "<PARAMETERS>";
const BLOCK_CLOSE: &str = "</PARAMETERS>";
const KEY_OPEN: &str = "<ATOM>";
const KEY_CLOSE: &str = "</ATOM>";
const VALUES_OPEN: &str = "<VALUES>";
const VALUES_CLOSE: &str = "</VALUES>";

#[derive(Debug, Error)]
pub enum ParamFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Parameter file parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Invalid parameter layout: {0}")]
    Layout(#[from] ParamStoreError),
}

impl ParamFileError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{METHOD_OPEN}")?;
        writeln!(f, "{}", self.method())?;
        writeln!(f, "{METHOD_CLOSE}")?;
        writeln!(f, "{FITNESS_OPEN}")?;
        writeln!(f, "{}", self.fitness())?;
        writeln!(f, "{FITNESS_CLOSE}")?;
        for key in self.keys() {
            let Some(values) = self.values_for(key) else {
                continue;
            };
            writeln!(f, "{BLOCK_OPEN}")?;
            writeln!(f, "{KEY_OPEN}")?;
            writeln!(f, "{key}")?;
            writeln!(f, "{KEY_CLOSE}")?;
            writeln!(f, "{VALUES_OPEN}")?;
            for value in values {
                writeln!(f, "{value}")?;
            }
            writeln!(f, "{VALUES_CLOSE}")?;
            writeln!(f, "{BLOCK_CLOSE}")?;
        }
        Ok(())
    }
}

impl FromStr for ParameterStore {
    type Err = ParamFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s
            .lines()
            .enumerate()
            .map(|(n, line)| (n + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        match lines.next() {
            Some((_, METHOD_OPEN)) => {}
            Some((n, line)) => {
                return Err(ParamFileError::parse(
                    n,
                    format!("expected '{METHOD_OPEN}', found '{line}'"),
                ));
            }
            None => return Err(ParamFileError::parse(0, "empty parameter file")),
        }

        let mut method = String::new();
        let mut fitness = f64::INFINITY;
        let mut keys: Vec<(String, usize)> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        let mut state = Section::Method;
        let mut current_key: Option<String> = None;
        let mut current_count = 0usize;

        for (n, line) in lines {
            state = match (state, line) {
                (Section::Method, METHOD_CLOSE) => Section::Between,
                (Section::Method, text) => {
                    method = text.to_string();
                    Section::Method
                }
                (Section::Between, FITNESS_OPEN) => Section::Fitness,
                (Section::Between, BLOCK_OPEN) => Section::Block,
                (Section::Fitness, FITNESS_CLOSE) => Section::Between,
                (Section::Fitness, text) => {
                    fitness = parse_value(n, text)?;
                    Section::Fitness
                }
                (Section::Block, KEY_OPEN) => Section::Key,
                (Section::Key, KEY_CLOSE) => Section::Block,
                (Section::Key, text) => {
                    current_key = Some(text.to_string());
                    Section::Key
                }
                (Section::Block, VALUES_OPEN) => {
                    current_count = 0;
                    Section::Values
                }
                (Section::Values, VALUES_CLOSE) => Section::Block,
                (Section::Values, text) => {
                    let token = text.split_whitespace().next().unwrap_or(text);
                    values.push(parse_value(n, token)?);
                    current_count += 1;
                    Section::Values
                }
                (Section::Block, BLOCK_CLOSE) => {
                    let key = current_key
                        .take()
                        .ok_or_else(|| ParamFileError::parse(n, "parameter block without key"))?;
                    keys.push((key, current_count));
                    current_count = 0;
                    Section::Between
                }
                (_, text) => {
                    return Err(ParamFileError::parse(n, format!("unexpected line '{text}'")));
                }
            };
        }

        if !matches!(state, Section::Between) {
            return Err(ParamFileError::parse(0, "unterminated section at end of input"));
        }

        let mut store = ParameterStore::new(method, keys)?.with_values(values)?;
        store.set_fitness(fitness);
        Ok(store)
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Method,
    Between,
    Fitness,
    Block,
    Key,
    Values,
}

fn parse_value(line: usize, text: &str) -> Result<f64, ParamFileError> {
    text.parse::<f64>()
        .map_err(|e| ParamFileError::parse(line, format!("invalid number '{text}': {e}")))
}

impl ParameterStore {
    pub fn load(path: &Path) -> Result<Self, ParamFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamFileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        content.parse()
    }

    pub fn save(&self, path: &Path) -> Result<(), ParamFileError> {
        std::fs::write(path, self.to_string()).map_err(|e| ParamFileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}
