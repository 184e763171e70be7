use anyhow::{Context, bail};
use clap::Parser;
use core::str::FromStr;
use tidemark::{CoordinatorConfig, DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK};

/// Runtime configuration for the `tidemark` binary.
///
/// Every value can come from a CLI flag or an environment variable (a `.env`
/// file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tidemark",
    version,
    about = "Threaded FizzBuzz: one producer thread per label, one lock-step printer"
)]
pub struct CliArgs {
    /// The printer waits while a label queue holds this many words or fewer.
    ///
    /// Environment variable: `LOW_WATERMARK`
    #[arg(long, env = "LOW_WATERMARK", default_value_t = DEFAULT_LOW_WATERMARK)]
    pub low_watermark: usize,

    /// A label thread waits while its queue holds this many words or more.
    /// Must be greater than the low watermark.
    ///
    /// Environment variable: `HIGH_WATERMARK`
    #[arg(long, env = "HIGH_WATERMARK", default_value_t = DEFAULT_HIGH_WATERMARK)]
    pub high_watermark: usize,

    /// Last number printed; every round prints `0..=STEPS`.
    ///
    /// Environment variable: `STEP_BOUND`
    #[arg(long, env = "STEP_BOUND", default_value_t = 100)]
    pub steps: u64,

    /// `multiple:label` pairs for the first round, in print order.
    ///
    /// Environment variable: `PAIRS` (comma separated)
    #[arg(
        long = "pair",
        env = "PAIRS",
        value_delimiter = ',',
        default_value = "3:Fizz,5:Buzz"
    )]
    pub pairs: Vec<Pair>,

    /// `multiple:label` pairs for an optional second round, run after the
    /// first one has been torn down.
    ///
    /// Environment variable: `RERUN_PAIRS` (comma separated)
    #[arg(long = "rerun-pair", env = "RERUN_PAIRS", value_delimiter = ',')]
    pub rerun_pairs: Vec<Pair>,

    /// Also label step zero, which is a multiple of every number.
    #[arg(long, env = "LABEL_ZERO", default_value_t = false)]
    pub label_zero: bool,
}

/// A `multiple:label` pair such as `3:Fizz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub multiple: u64,
    pub label: String,
}

impl FromStr for Pair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((multiple, label)) = s.split_once(':') else {
            bail!("expected MULTIPLE:LABEL, got {s:?}");
        };
        let multiple = multiple
            .trim()
            .parse()
            .with_context(|| format!("invalid multiple in pair {s:?}"))?;
        Ok(Self {
            multiple,
            label: label.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub coordinator: CoordinatorConfig,
    pub rounds: Vec<Vec<Pair>>,
    pub label_zero: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.pairs.is_empty() {
            bail!("at least one PAIR is required");
        }

        for pair in args.pairs.iter().chain(&args.rerun_pairs) {
            if pair.multiple == 0 {
                bail!("multiple for label {:?} must be greater than 0", pair.label);
            }
        }

        let coordinator =
            CoordinatorConfig::new(args.low_watermark, args.high_watermark, args.steps)?;

        let mut rounds = vec![args.pairs];
        if !args.rerun_pairs.is_empty() {
            rounds.push(args.rerun_pairs);
        }

        Ok(Self {
            coordinator,
            rounds,
            label_zero: args.label_zero,
        })
    }
}
