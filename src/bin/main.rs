//! diabetes-risk command line interface
//!
//! Fits the risk model once per process (downloading the dataset or falling
//! back to synthetic data) and scores patients from flags or stdin.

use clap::{Args, Parser, Subcommand, ValueEnum};
use diabetes_risk::core::{Result, RiskError, WorkingSetStrategy};
use diabetes_risk::utils::scaling::FeatureScaler;
use diabetes_risk::utils::stats::class_balance;
use diabetes_risk::{
    load, Dataset, FittedPipeline, LoaderConfig, ModelCell, PatientFeatures, Pipeline,
    PipelineConfig, PredictionResult, ADVISORY_BOUNDS, DEFAULT_DATASET_URL, FEATURE_NAMES,
};
use env_logger::Env;
use log::{error, info, warn};
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

static MODEL: ModelCell = ModelCell::new();

const DISCLAIMER: &str = "For educational and informational purposes only. Not medical advice \
and no replacement for diagnosis by a qualified healthcare provider.";

#[derive(Parser)]
#[command(name = "diabetes-risk")]
#[command(about = "Diabetes risk scoring with a calibrated linear SVM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(flatten)]
    data: DataArgs,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct DataArgs {
    /// Skip the download and use the synthetic dataset
    #[arg(long, global = true)]
    offline: bool,

    /// Read the dataset from a local CSV file
    #[arg(long, global = true, value_name = "PATH")]
    dataset_file: Option<PathBuf>,

    /// Dataset URL
    #[arg(long, global = true, env = "DIABETES_DATASET_URL", default_value = DEFAULT_DATASET_URL)]
    dataset_url: String,

    /// Download timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    timeout_secs: u64,
}

#[derive(Args)]
struct ModelArgs {
    /// Regularization parameter C
    #[arg(short = 'C', global = true, default_value = "1.0")]
    c: f64,

    /// Convergence tolerance
    #[arg(long, global = true, default_value = "0.001")]
    epsilon: f64,

    /// Maximum solver iterations
    #[arg(long, global = true, default_value = "100000")]
    max_iterations: usize,

    /// Working set selection strategy
    #[arg(long, global = true, default_value = "second-order")]
    working_set_strategy: CliWorkingSetStrategy,

    /// Cross validation folds for probability calibration
    #[arg(long, global = true, default_value = "5")]
    calibration_folds: usize,

    /// Refuse to serve a model whose holdout accuracy is below this fraction
    #[arg(long, global = true)]
    min_test_accuracy: Option<f64>,
}

#[derive(ValueEnum, Clone, Debug)]
enum CliWorkingSetStrategy {
    /// Second order selection (libsvm style, default)
    #[value(name = "second-order")]
    SecondOrder,
    /// Maximal violating pair, first order only
    #[value(name = "max-violating-pair")]
    MaximalViolatingPair,
}

impl From<CliWorkingSetStrategy> for WorkingSetStrategy {
    fn from(cli_strategy: CliWorkingSetStrategy) -> Self {
        match cli_strategy {
            CliWorkingSetStrategy::SecondOrder => WorkingSetStrategy::SecondOrder,
            CliWorkingSetStrategy::MaximalViolatingPair => WorkingSetStrategy::MaximalViolatingPair,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score one patient given on the command line
    Predict(PredictArgs),
    /// Score patients read line by line from stdin
    Interactive,
    /// Show model accuracy and holdout metrics
    Evaluate(EvaluateArgs),
    /// Describe the dataset the model would be fit on
    Dataset,
}

#[derive(Args)]
struct PredictArgs {
    /// Number of pregnancies
    #[arg(long, default_value = "1")]
    pregnancies: f64,

    /// Plasma glucose (mg/dL)
    #[arg(long, default_value = "120")]
    glucose: f64,

    /// Diastolic blood pressure (mmHg)
    #[arg(long, default_value = "70")]
    blood_pressure: f64,

    /// Triceps skin fold thickness (mm)
    #[arg(long, default_value = "23")]
    skin_thickness: f64,

    /// 2-hour serum insulin (µU/mL)
    #[arg(long, default_value = "80")]
    insulin: f64,

    /// Body mass index (kg/m²)
    #[arg(long, default_value = "32.0")]
    bmi: f64,

    /// Diabetes pedigree function
    #[arg(long, alias = "dpf", default_value = "0.47")]
    diabetes_pedigree: f64,

    /// Age (years)
    #[arg(long, default_value = "33")]
    age: f64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl PredictArgs {
    fn features(&self) -> PatientFeatures {
        PatientFeatures {
            pregnancies: self.pregnancies,
            glucose: self.glucose,
            blood_pressure: self.blood_pressure,
            skin_thickness: self.skin_thickness,
            insulin: self.insulin,
            bmi: self.bmi,
            diabetes_pedigree: self.diabetes_pedigree,
            age: self.age,
        }
    }
}

#[derive(Args)]
struct EvaluateArgs {
    /// Print the model summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PredictOutput {
    input: PatientFeatures,
    prediction: PredictionResult,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match &cli.command {
        Commands::Predict(args) => predict_command(&cli, args),
        Commands::Interactive => interactive_command(&cli),
        Commands::Evaluate(args) => evaluate_command(&cli, args),
        Commands::Dataset => dataset_command(&cli),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn loader_config(args: &DataArgs) -> LoaderConfig {
    LoaderConfig {
        url: args.dataset_url.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        offline: args.offline,
        file: args.dataset_file.clone(),
        ..LoaderConfig::default()
    }
}

fn pipeline_config(args: &ModelArgs) -> PipelineConfig {
    let mut config = PipelineConfig {
        calibration_folds: args.calibration_folds,
        min_test_accuracy: args.min_test_accuracy,
        ..PipelineConfig::default()
    };
    config.optimizer.c = args.c;
    config.optimizer.epsilon = args.epsilon;
    config.optimizer.max_iterations = args.max_iterations;
    config.optimizer.working_set_strategy = args.working_set_strategy.clone().into();
    config
}

fn fitted_pipeline(cli: &Cli) -> Result<Arc<FittedPipeline>> {
    MODEL.get_or_fit(|| {
        let dataset = load(&loader_config(&cli.data));
        info!("Fitting model on {} records", dataset.len());
        Pipeline::fit(&dataset, &pipeline_config(&cli.model))
    })
}

/// Clamp finite inputs into the advisory ranges, warning for each change
fn clamp_input(raw: PatientFeatures) -> PatientFeatures {
    if raw.first_non_finite().is_some() {
        return raw;
    }
    let (clamped, adjusted) = raw.clamp_to_bounds();
    for name in adjusted {
        if let Some(bounds) = ADVISORY_BOUNDS.iter().find(|b| b.name == name) {
            warn!(
                "{name} is outside [{}, {}], clamped",
                bounds.min, bounds.max
            );
        }
    }
    clamped
}

/// Parse one line of eight comma-separated values in model column order
fn parse_features(line: &str) -> Result<PatientFeatures> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FEATURE_NAMES.len() {
        return Err(RiskError::MalformedInput(format!(
            "expected {} comma-separated values, found {}",
            FEATURE_NAMES.len(),
            fields.len()
        )));
    }

    let mut values = [0.0; 8];
    for (i, field) in fields.iter().enumerate() {
        values[i] = field.parse::<f64>().map_err(|_| {
            let name = FEATURE_NAMES[i];
            RiskError::MalformedInput(format!("invalid value for {name}: {field:?}"))
        })?;
    }
    Ok(PatientFeatures::from_array(values))
}

fn format_result(result: &PredictionResult) -> String {
    format!(
        "{} (diabetic {:.1}%, non-diabetic {:.1}%)",
        result.verdict(),
        result.probability_positive * 100.0,
        result.probability_negative * 100.0
    )
}

fn predict_command(cli: &Cli, args: &PredictArgs) -> Result<()> {
    let pipeline = fitted_pipeline(cli)?;
    let input = clamp_input(args.features());
    let prediction = pipeline.predict(&input)?;

    if args.json {
        let output = PredictOutput { input, prediction };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| RiskError::SerializationError(e.to_string()))?;
        println!("{json}");
    } else {
        println!("{}", prediction.verdict());
        println!("  Probability diabetic:     {:.1}%", prediction.probability_positive * 100.0);
        println!("  Probability non-diabetic: {:.1}%", prediction.probability_negative * 100.0);
        eprintln!("\n{DISCLAIMER}");
    }

    Ok(())
}

fn interactive_command(cli: &Cli) -> Result<()> {
    let pipeline = fitted_pipeline(cli)?;
    eprintln!(
        "Enter {} comma-separated values ({}), or 'quit' to exit",
        FEATURE_NAMES.len(),
        FEATURE_NAMES.join(", ")
    );
    eprintln!("{DISCLAIMER}");

    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match parse_features(line).and_then(|raw| pipeline.predict(&clamp_input(raw))) {
            Ok(result) => println!("{}", format_result(&result)),
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}

fn evaluate_command(cli: &Cli, args: &EvaluateArgs) -> Result<()> {
    let pipeline = fitted_pipeline(cli)?;
    let summary = pipeline.summary();

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| RiskError::SerializationError(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    println!("=== Model Evaluation ===");
    println!("Dataset:         {}", summary.origin);
    println!("Train accuracy:  {:.2}%", summary.train_accuracy * 100.0);
    println!("Test accuracy:   {:.2}%", summary.test_accuracy * 100.0);
    println!("Samples:         {}", summary.n_records);
    println!("Features:        {}", summary.n_features);
    println!("Support vectors: {}", summary.n_support_vectors);

    let metrics = &summary.test_metrics;
    println!("\nHoldout Metrics:");
    println!("  True Positives:  {}", metrics.true_positives);
    println!("  True Negatives:  {}", metrics.true_negatives);
    println!("  False Positives: {}", metrics.false_positives);
    println!("  False Negatives: {}", metrics.false_negatives);
    println!("  Precision:       {:.4}", summary.precision);
    println!("  Recall:          {:.4}", summary.recall);
    println!("  F1 Score:        {:.4}", summary.f1_score);
    println!("  Specificity:     {:.4}", summary.specificity);
    eprintln!("\n{DISCLAIMER}");

    Ok(())
}

fn dataset_command(cli: &Cli) -> Result<()> {
    let dataset = load(&loader_config(&cli.data));
    let labels: Vec<bool> = dataset.outcomes().iter().map(|o| o.is_positive()).collect();
    let (positive, negative, fraction) = class_balance(&labels);
    let scaler = FeatureScaler::fit(&dataset.feature_matrix())?;

    println!("=== Dataset ===");
    println!("Origin:       {}", dataset.origin());
    println!("Records:      {}", dataset.len());
    println!(
        "Diabetic:     {positive} ({:.1}%)",
        fraction * 100.0
    );
    println!("Non-diabetic: {negative}");
    println!("\n{:<26} {:>10} {:>10}", "Feature", "Mean", "Std");
    for (name, stats) in FEATURE_NAMES.iter().zip(scaler.stats()) {
        println!("{name:<26} {:>10.3} {:>10.3}", stats.mean, stats.std);
    }

    Ok(())
}
