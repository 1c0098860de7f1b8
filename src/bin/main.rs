use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, ValueEnum};
use p3_baby_bear::BabyBear;
use p3_field::{PrimeField64, TwoAdicField};
use p3_koala_bear::KoalaBear;
use rand::{
    SeedableRng,
    distr::{Distribution, StandardUniform},
    rngs::StdRng,
};
use tracing::{info, warn};
use tracing_forest::{ForestLayer, util::LevelFilter};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};
use serde::{Serialize, de::DeserializeOwned};
use whir_recursion::{
    errors::RecursionError,
    poly::evals::EvaluationsList,
    recursion::{RecursiveVerifier, Satisfiability},
    whir::{
        hints::{Configuration, Hints, ProofObject},
        parameters::WhirConfig,
        prover::prove_recursion,
    },
};

const CONFIGURATION_FILE: &str = "configuration.json";
const HINTS_FILE: &str = "hints.json";
const PROOF_FILE: &str = "proof.json";

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Recursion(#[from] RecursionError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Field {
    BabyBear,
    KoalaBear,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short = 'd', long, default_value = "12")]
    num_variables: usize,

    #[arg(long = "hiding-variables", default_value = "8")]
    hiding_variables: usize,

    #[arg(short = 'r', long, default_value = "1")]
    rate: usize,

    /// Folding factor of every phase of the witness instance.
    #[arg(short = 'k', long = "fold", value_delimiter = ',', default_value = "4,4,4")]
    folding_factor: Vec<usize>,

    /// Folding factor of every phase of the hiding instance.
    #[arg(long = "hiding-fold", value_delimiter = ',', default_value = "4,4")]
    hiding_folding_factor: Vec<usize>,

    #[arg(short = 'q', long, default_value = "8")]
    num_queries: usize,

    #[arg(short = 'p', long, default_value = "0")]
    pow_bits: usize,

    #[arg(short = 'b', long, default_value = "1")]
    batch_size: usize,

    #[arg(short = 'f', long, value_enum, default_value = "baby-bear")]
    field: Field,

    #[arg(short = 's', long, default_value = "0")]
    seed: u64,

    /// Flip a bit of the first leaf sibling hash to show a rejected proof.
    #[arg(long)]
    tamper: bool,

    /// Write configuration.json, hints.json and proof.json to this directory.
    #[arg(long, value_name = "DIR")]
    dump: Option<PathBuf>,

    /// Check the JSON files in this directory instead of proving a random instance.
    #[arg(long, value_name = "DIR", conflicts_with = "dump")]
    load: Option<PathBuf>,
}

fn main() -> Result<(), DemoError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();

    let args = Args::parse();
    match args.field {
        Field::BabyBear => run::<BabyBear>(args),
        Field::KoalaBear => run::<KoalaBear>(args),
    }
}

/// Proves a random instance, or loads a dumped one, then checks it against the recursive
/// verifier circuit.
fn run<F>(args: Args) -> Result<(), DemoError>
where
    F: PrimeField64 + TwoAdicField,
    StandardUniform: Distribution<F>,
{
    let (configuration, hints, proof) = match &args.load {
        Some(dir) => (
            read_json(&dir.join(CONFIGURATION_FILE))?,
            read_json(&dir.join(HINTS_FILE))?,
            read_json(&dir.join(PROOF_FILE))?,
        ),
        None => prove::<F>(&args)?,
    };

    if let Some(dir) = &args.dump {
        fs::create_dir_all(dir).map_err(|source| DemoError::Io {
            path: dir.clone(),
            source,
        })?;
        write_json(&dir.join(CONFIGURATION_FILE), &configuration)?;
        write_json(&dir.join(HINTS_FILE), &hints)?;
        write_json(&dir.join(PROOF_FILE), &proof)?;
        info!(dir = %dir.display(), "wrote proof files");
    }

    let verifier = RecursiveVerifier::<F>::new(configuration)?;
    match verifier.check(&hints, &proof)? {
        Satisfiability::Satisfied => info!("circuit satisfied"),
        Satisfiability::Rejected(violation) => {
            info!(index = violation.index, check = ?violation.check, "circuit rejected the proof");
        }
    }

    Ok(())
}

fn prove<F>(args: &Args) -> Result<(Configuration, Hints, ProofObject), RecursionError>
where
    F: PrimeField64 + TwoAdicField,
    StandardUniform: Distribution<F>,
{
    let witness_config = WhirConfig::with_default_domain::<F>(
        args.num_variables,
        args.rate,
        args.folding_factor.clone(),
        args.num_queries,
        args.pow_bits,
        args.batch_size,
    );
    let hiding_config = WhirConfig::with_default_domain::<F>(
        args.hiding_variables,
        args.rate,
        args.hiding_folding_factor.clone(),
        args.num_queries,
        args.pow_bits,
        args.batch_size,
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let witness_polynomials = (0..args.batch_size)
        .map(|_| EvaluationsList::rand(&mut rng, args.num_variables))
        .collect();
    let hiding_polynomials = (0..args.batch_size)
        .map(|_| EvaluationsList::rand(&mut rng, args.hiding_variables))
        .collect();

    let mut output = prove_recursion::<F>(
        &witness_config,
        &hiding_config,
        witness_polynomials,
        hiding_polynomials,
    )?;

    if args.tamper {
        let paths = &mut output.hints.witness.first_round.path.merkle_paths[0];
        paths.leaf_sibling_hashes[0].0[0] ^= 1;
        warn!("flipped one bit of the first leaf sibling hash");
    }

    Ok((output.configuration, output.hints, output.proof))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DemoError> {
    let file = File::open(path).map_err(|source| DemoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DemoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DemoError> {
    let file = File::create(path).map_err(|source| DemoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| DemoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| DemoError::Io {
        path: path.to_path_buf(),
        source,
    })
}
