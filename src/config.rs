use crate::error::{ForgeError, ForgeResult};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub optimizer: OptimizerParams,
    #[command(flatten)]
    pub thresholds: PerformanceThresholds,
    #[command(flatten)]
    pub collaborators: CollaboratorParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    #[arg(long, default_value_t = 5)]
    pub max_iterations: usize,
    /// Optimization iterations that must run before a non-improving one ends the loop.
    #[arg(long, default_value_t = 3)]
    pub min_iterations_before_stop: usize,
    /// Part always optimized when present in the library. Empty means none.
    #[arg(long, default_value = "")]
    pub primary_target: String,
    #[arg(long, default_value_t = 50)]
    pub sequence_iterations: u32,

    // === TARGET STRENGTH ===
    #[arg(long, default_value_t = 100.0)]
    pub low_ratio_threshold: f64,
    #[arg(long, default_value_t = 0.8)]
    pub target_strength_high: f64,
    #[arg(long, default_value_t = 0.5)]
    pub target_strength_moderate: f64,
    #[arg(long, default_value_t = 0.7)]
    pub target_strength_default: f64,

    // Accept "p" + regulator name matches as gate links
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub allow_heuristic_links: bool,

    #[arg(long, default_value_t = false)]
    pub strict: bool,
    #[arg(long, default_value = "outputs/circuit_optimization")]
    pub output_dir: String,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            min_iterations_before_stop: 3,
            primary_target: String::new(),
            sequence_iterations: 50,
            low_ratio_threshold: 100.0,
            target_strength_high: 0.8,
            target_strength_moderate: 0.5,
            target_strength_default: 0.7,
            allow_heuristic_links: true,
            strict: false,
            output_dir: "outputs/circuit_optimization".to_string(),
        }
    }
}

impl OptimizerParams {
    pub fn primary_target(&self) -> Option<&str> {
        let name = self.primary_target.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

#[derive(Args, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    #[arg(long, default_value_t = 500.0)]
    pub min_on_off_ratio: f64,
    /// Percent of the ON signal.
    #[arg(long, default_value_t = 0.1)]
    pub max_leakage_pct: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            min_on_off_ratio: 500.0,
            max_leakage_pct: 0.1,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorParams {
    #[arg(long, default_value = "cello")]
    pub synthesis_command: String,
    #[arg(
        long,
        default_value = "--verilog {circuit} --ucf {library} --output {output}"
    )]
    pub synthesis_args: String,
    #[arg(long, default_value_t = 600)]
    pub synthesis_timeout_secs: u64,

    #[arg(long, default_value = "promoter-optimizer")]
    pub sequence_optimizer_command: String,
    #[arg(long, default_value_t = 300)]
    pub sequence_timeout_secs: u64,
}

impl Default for CollaboratorParams {
    fn default() -> Self {
        Self {
            synthesis_command: "cello".to_string(),
            synthesis_args: "--verilog {circuit} --ucf {library} --output {output}".to_string(),
            synthesis_timeout_secs: 600,
            sequence_optimizer_command: "promoter-optimizer".to_string(),
            sequence_timeout_secs: 300,
        }
    }
}

impl CollaboratorParams {
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn sequence_timeout(&self) -> Duration {
        Duration::from_secs(self.sequence_timeout_secs)
    }

    /// Splits the argument template on whitespace, substituting placeholders.
    pub fn render_synthesis_args(&self, circuit: &str, library: &str, output: &str) -> Vec<String> {
        self.synthesis_args
            .split_whitespace()
            .map(|a| {
                a.replace("{circuit}", circuit)
                    .replace("{library}", library)
                    .replace("{output}", output)
            })
            .collect()
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> ForgeResult<()> {
        for (name, v) in [
            ("target_strength_high", self.optimizer.target_strength_high),
            ("target_strength_moderate", self.optimizer.target_strength_moderate),
            ("target_strength_default", self.optimizer.target_strength_default),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ForgeError::Config(format!(
                    "--{} must lie in [0, 1], got {}",
                    name.replace('_', "-"),
                    v
                )));
            }
        }
        if self.thresholds.min_on_off_ratio < 0.0 || self.thresholds.max_leakage_pct < 0.0 {
            return Err(ForgeError::Config(
                "performance thresholds must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Copies every value the user typed on the command line over `self`.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(optimizer.max_iterations);
        update_if_present!(optimizer.min_iterations_before_stop);
        update_if_present!(optimizer.primary_target);
        update_if_present!(optimizer.sequence_iterations);
        update_if_present!(optimizer.low_ratio_threshold);
        update_if_present!(optimizer.target_strength_high);
        update_if_present!(optimizer.target_strength_moderate);
        update_if_present!(optimizer.target_strength_default);
        update_if_present!(optimizer.allow_heuristic_links);
        update_if_present!(optimizer.strict);
        update_if_present!(optimizer.output_dir);

        update_if_present!(thresholds.min_on_off_ratio);
        update_if_present!(thresholds.max_leakage_pct);

        update_if_present!(collaborators.synthesis_command);
        update_if_present!(collaborators.synthesis_args);
        update_if_present!(collaborators.synthesis_timeout_secs);
        update_if_present!(collaborators.sequence_optimizer_command);
        update_if_present!(collaborators.sequence_timeout_secs);
    }
}
