use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use distributions::{
    composer,
    document::{CompositeDocument, PlotDocument},
    layers::LayerCollection,
    sampler::{self, SamplerConfig, Slab},
};
use log::info;

/// The layer name used when the curves are passed as flat arrays.
const FLAT_ARRAY_LAYER_NAME: &str = "layer";

/// Where the layers to compose come from.
enum Input {
    Document(PathBuf),
    FlatArrays {
        distances: Vec<f64>,
        material_densities: Vec<f64>,
        probability_densities: Vec<f64>,
        cumulative_probabilities: Vec<f64>,
    },
    Slabs(Vec<(String, Slab)>),
}

/// Everything parsed from the command line.
struct Options {
    input: Input,
    config: SamplerConfig,
    bands: bool,
    write_document: Option<PathBuf>,
    outfile: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args(std::env::args().skip(1))?;
    let collection = load_collection(options.input, &options.config)?;
    collection.ensure_non_empty()?;
    info!(
        "Loaded {} layers over {} distances: {}",
        collection.len(),
        collection.axis().len(),
        collection.names().collect::<Vec<_>>().join(", ")
    );

    if let Some(path) = &options.write_document {
        let file = File::create(path)
            .with_context(|| format!("layer document {} couldn't be created", path.display()))?;
        PlotDocument::from_collection(&collection).to_writer(BufWriter::new(file))?;
        info!("Wrote layer document to {}", path.display());
    }

    let output = if options.bands {
        let composition = composer::compose_with_bands(&collection);
        log_summary(&collection, &composition.totals);
        CompositeDocument::from_composition(collection.axis(), &composition)
    } else {
        let totals = composer::compose(&collection);
        log_summary(&collection, &totals);
        CompositeDocument::from_totals(collection.axis(), &totals)
    };

    match &options.outfile {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("output file {} couldn't be created", path.display()))?;
            output.to_writer(BufWriter::new(file))?;
            info!("Wrote composed curves to {}", path.display());
        }
        None => {
            let mut writer = io::stdout().lock();
            output.to_writer(&mut writer)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Parse the `--key=value` command line arguments.
fn parse_args<I: Iterator<Item = String>>(args: I) -> Result<Options> {
    let mut data_path: Option<PathBuf> = None;
    let mut distances: Option<Vec<f64>> = None;
    let mut material_densities: Option<Vec<f64>> = None;
    let mut probability_densities: Option<Vec<f64>> = None;
    let mut cumulative_probabilities: Option<Vec<f64>> = None;
    let mut slabs: Vec<(String, Slab)> = Vec::new();
    let mut config = SamplerConfig::default();
    let mut bands = false;
    let mut write_document: Option<PathBuf> = None;
    let mut outfile: Option<PathBuf> = None;

    for arg in args {
        let (key, value) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
        match key {
            "--data" => data_path = Some(PathBuf::from(value)),
            "--distances" => distances = Some(parse_list(key, value)?),
            "--material-densities" => material_densities = Some(parse_list(key, value)?),
            "--probability-densities" => probability_densities = Some(parse_list(key, value)?),
            "--cumulative-probabilities" => {
                cumulative_probabilities = Some(parse_list(key, value)?);
            }
            "--slab" => slabs.push(parse_slab(value)?),
            "--steps" => {
                config.steps = value.parse().with_context(|| {
                    format!("\"--steps\" needs to be passed a whole number, got \"{value}\"")
                })?;
            }
            "--margin" => {
                config.margin = value.parse().with_context(|| {
                    format!("\"--margin\" needs to be passed a number, got \"{value}\"")
                })?;
            }
            "--mode" => config.mode = value.parse()?,
            "--bands" => bands = true,
            "--write-document" => write_document = Some(PathBuf::from(value)),
            "--outfile" => outfile = Some(PathBuf::from(value)),
            _ => bail!("Unknown argument {key}"),
        }
    }
    config.validate()?;

    let flat_arrays = [
        &distances,
        &material_densities,
        &probability_densities,
        &cumulative_probabilities,
    ]
    .iter()
    .any(|array| array.is_some());
    let sources = usize::from(data_path.is_some())
        + usize::from(flat_arrays)
        + usize::from(!slabs.is_empty());
    if sources != 1 {
        bail!(
            "Please provide exactly one input: \"--data=PATH\", the four flat arrays \
             (\"--distances\", \"--material-densities\", \"--probability-densities\", \
             \"--cumulative-probabilities\") or one or more \"--slab=NAME:START:END\"!"
        );
    }

    let input = if let Some(path) = data_path {
        Input::Document(path)
    } else if flat_arrays {
        Input::FlatArrays {
            distances: distances.context("\"--distances\" is missing")?,
            material_densities: material_densities
                .context("\"--material-densities\" is missing")?,
            probability_densities: probability_densities
                .context("\"--probability-densities\" is missing")?,
            cumulative_probabilities: cumulative_probabilities
                .context("\"--cumulative-probabilities\" is missing")?,
        }
    } else {
        Input::Slabs(slabs)
    };

    Ok(Options {
        input,
        config,
        bands,
        write_document,
        outfile,
    })
}

/// Parse a comma-separated list of numbers.
fn parse_list(key: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .with_context(|| format!("\"{key}\" contains \"{item}\", which is not a number"))
        })
        .collect()
}

/// Parse a slab given as `NAME:START:END`.
fn parse_slab(value: &str) -> Result<(String, Slab)> {
    let mut parts = value.rsplitn(3, ':');
    let (Some(end), Some(start), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("\"--slab\" needs to be passed NAME:START:END, got \"{value}\"");
    };
    let start: f64 = start
        .parse()
        .with_context(|| format!("slab \"{name}\" has an invalid start \"{start}\""))?;
    let end: f64 = end
        .parse()
        .with_context(|| format!("slab \"{name}\" has an invalid end \"{end}\""))?;
    Ok((name.to_owned(), Slab::new(start, end)?))
}

/// Turn the selected input into a validated layer collection.
fn load_collection(input: Input, config: &SamplerConfig) -> Result<LayerCollection> {
    let collection = match input {
        Input::Document(path) => PlotDocument::from_path(&path)
            .with_context(|| format!("layer document {} couldn't be loaded", path.display()))?
            .into_collection()?,
        Input::FlatArrays {
            distances,
            material_densities,
            probability_densities,
            cumulative_probabilities,
        } => PlotDocument::from_flat_arrays(
            FLAT_ARRAY_LAYER_NAME,
            distances,
            material_densities,
            probability_densities,
            cumulative_probabilities,
        )
        .into_collection()?,
        Input::Slabs(slabs) => {
            info!(
                "Sampling {} slabs with {} steps, margin {} ({:?} mode)",
                slabs.len(),
                config.steps,
                config.margin,
                config.mode
            );
            sampler::sample_layers(&slabs, config)?
        }
    };
    Ok(collection)
}

/// Log a short description of the composed curves.
fn log_summary(collection: &LayerCollection, totals: &composer::CompositeDistribution) {
    let last = totals.len() - 1;
    info!(
        "At distance {} the combined absorption is {:.6} and the transmittance {:.6}",
        collection.axis().last(),
        totals.absorption_combined[last],
        totals.transmittance_combined[last]
    );
    match totals.finite_material_density_max() {
        Some(max) => info!("Largest finite material density: {max}"),
        None => info!("No finite material density"),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_args, parse_list, parse_slab, Input};

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| (*value).to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_list_with_infinity() {
        assert_eq!(
            vec![0f64, 0.5, f64::INFINITY],
            parse_list("--material-densities", "0, 0.5,inf").unwrap()
        );
    }

    #[test]
    fn slab_name_may_contain_colons() {
        let (name, slab) = parse_slab("glass:front:-0.5:1.5").unwrap();
        assert_eq!("glass:front", name);
        assert_eq!(-0.5, slab.start());
        assert_eq!(1.5, slab.end());
    }

    #[test]
    fn rejects_inverted_slab() {
        assert!(parse_slab("wall:2:1").is_err());
    }

    #[test]
    fn rejects_two_inputs() {
        assert!(parse_args(args(&["--data=plot.json", "--slab=a:0:1"])).is_err());
    }

    #[test]
    fn rejects_missing_input() {
        assert!(parse_args(args(&["--steps=10"])).is_err());
    }

    #[test]
    fn rejects_incomplete_flat_arrays() {
        assert!(parse_args(args(&["--distances=0,1", "--material-densities=0,0"])).is_err());
    }

    #[test]
    fn parses_slab_input() {
        let options = parse_args(args(&[
            "--slab=a:0:1",
            "--slab=b:0.5:2",
            "--steps=10",
            "--bands",
        ]))
        .unwrap();
        assert!(options.bands);
        assert_eq!(10, options.config.steps);
        match options.input {
            Input::Slabs(slabs) => assert_eq!(2, slabs.len()),
            _ => panic!("expected slab input"),
        }
    }
}
