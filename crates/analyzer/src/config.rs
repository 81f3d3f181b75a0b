/// How to launch the external analyzer.
///
/// The configured command line is extended with three positional
/// arguments per job: the job id, the target URL, and the options
/// payload serialized as JSON.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Executable to run (e.g. `python3`).
    pub program: String,
    /// Leading arguments (e.g. the analyzer script path).
    pub args: Vec<String>,
}

impl WorkerConfig {
    /// Parse a whitespace-separated command line.
    pub fn parse(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "python3".to_string());
        Self {
            program,
            args: parts.collect(),
        }
    }

    /// Load from the `ANALYZER_COMMAND` environment variable.
    ///
    /// Defaults to `python3 services/analyzer.py`, matching the stock
    /// analyzer layout.
    pub fn from_env() -> Self {
        let command = std::env::var("ANALYZER_COMMAND")
            .unwrap_or_else(|_| "python3 services/analyzer.py".to_string());
        Self::parse(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_program_and_args() {
        let config = WorkerConfig::parse("python3 services/analyzer.py");
        assert_eq!(config.program, "python3");
        assert_eq!(config.args, vec!["services/analyzer.py"]);
    }

    #[test]
    fn parse_bare_program_has_no_args() {
        let config = WorkerConfig::parse("analyzer");
        assert_eq!(config.program, "analyzer");
        assert!(config.args.is_empty());
    }
}
