//! The persisted JSON shape of sampled layers, and of composed curves handed to renderers.
//!
//! Layer documents look like
//! ```json
//! { "Distances": [...],
//!   "Distributions": {
//!     "<layer name>": {
//!       "MaterialDensities": [...],
//!       "ProbabilityDensities": [...],
//!       "CumulativeProbabilities": [...] } } }
//! ```
//! where the order of the layers in `Distributions` is the order they are composed in.
//! Non-finite values are written as the strings `"Infinity"` and `"-Infinity"`.
//! When reading, the bare tokens `Infinity`, `-Infinity` and `NaN` written by Python's
//! `json` module are accepted as well.

use std::{
    borrow::Cow,
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::{
    axis::DistanceAxis,
    composer::{CompositeDistribution, Composition},
    error::{DistributionError, Result},
    layers::{LayerCollection, LayerDistribution},
};

/// The three curves of one layer as stored in a [`PlotDocument`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    #[serde(rename = "MaterialDensities", with = "named_floats")]
    pub material_densities: Vec<f64>,
    #[serde(rename = "ProbabilityDensities", with = "named_floats")]
    pub probability_densities: Vec<f64>,
    #[serde(
        rename = "CumulativeProbabilities",
        alias = "CummulativeProbabilities",
        with = "named_floats"
    )]
    pub cumulative_probabilities: Vec<f64>,
}

impl From<&LayerDistribution> for DistributionRecord {
    fn from(layer: &LayerDistribution) -> Self {
        Self {
            material_densities: layer.material_densities().to_vec(),
            probability_densities: layer.probability_densities().to_vec(),
            cumulative_probabilities: layer.cumulative_probabilities().to_vec(),
        }
    }
}

/// A set of named layers sampled on one shared axis, as read from and written to disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotDocument {
    #[serde(rename = "Distances", with = "named_floats")]
    pub distances: Vec<f64>,
    #[serde(rename = "Distributions", with = "ordered_map")]
    pub distributions: Vec<(String, DistributionRecord)>,
}

impl PlotDocument {
    /// Parse a document from JSON text.
    ///
    /// # Errors
    ///
    /// * If the text is not JSON or misses a required key.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(&quote_named_literals(text)).map_err(classify)
    }

    /// Read a document from any reader.
    ///
    /// # Errors
    ///
    /// * If reading fails, the data is not JSON or misses a required key.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    /// Read a document from the file at the given path.
    ///
    /// # Errors
    ///
    /// * If the file can't be opened, see also [`PlotDocument::from_reader`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading layer document {}", path.display());
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Build a document holding a single layer from four flat arrays.
    pub fn from_flat_arrays(
        name: &str,
        distances: Vec<f64>,
        material_densities: Vec<f64>,
        probability_densities: Vec<f64>,
        cumulative_probabilities: Vec<f64>,
    ) -> Self {
        Self {
            distances,
            distributions: vec![(
                name.to_owned(),
                DistributionRecord {
                    material_densities,
                    probability_densities,
                    cumulative_probabilities,
                },
            )],
        }
    }

    /// Build the document describing the given collection.
    pub fn from_collection(collection: &LayerCollection) -> Self {
        Self {
            distances: collection.axis().distances().to_vec(),
            distributions: collection
                .iter()
                .map(|(name, layer)| (name.to_owned(), DistributionRecord::from(layer)))
                .collect(),
        }
    }

    /// Validate this document into a [`LayerCollection`], keeping the layer order.
    ///
    /// # Errors
    ///
    /// * If the distances don't form a valid axis.
    /// * If a layer's curves are invalid or don't match the number of distances.
    /// * If a layer name is used twice.
    pub fn into_collection(self) -> Result<LayerCollection> {
        let mut collection = LayerCollection::new(DistanceAxis::new(self.distances)?);
        for (name, record) in self.distributions {
            let layer = LayerDistribution::new(
                record.material_densities,
                record.probability_densities,
                record.cumulative_probabilities,
            )
            .map_err(|err| err.in_layer(&name))?;
            collection.push(name, layer)?;
        }
        Ok(collection)
    }

    /// Write this document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// * If writing fails.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// The four aggregate curves as stored in a [`CompositeDocument`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeRecord {
    #[serde(rename = "MaterialDensitySum", with = "named_floats")]
    pub material_density_sum: Vec<f64>,
    #[serde(rename = "FreeFlightProbabilitySum", with = "named_floats")]
    pub free_flight_probability_sum: Vec<f64>,
    #[serde(rename = "AbsorptionCombined", with = "named_floats")]
    pub absorption_combined: Vec<f64>,
    #[serde(rename = "TransmittanceCombined", with = "named_floats")]
    pub transmittance_combined: Vec<f64>,
}

impl From<&CompositeDistribution> for CompositeRecord {
    fn from(composite: &CompositeDistribution) -> Self {
        Self {
            material_density_sum: composite.material_density_sum.clone(),
            free_flight_probability_sum: composite.free_flight_probability_sum.clone(),
            absorption_combined: composite.absorption_combined.clone(),
            transmittance_combined: composite.transmittance_combined.clone(),
        }
    }
}

/// The curves before and after one layer was composed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandRecord {
    #[serde(rename = "Previous")]
    pub previous: CompositeRecord,
    #[serde(rename = "Accumulated")]
    pub accumulated: CompositeRecord,
}

/// Composed curves as handed to a renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeDocument {
    #[serde(rename = "Distances", with = "named_floats")]
    pub distances: Vec<f64>,
    #[serde(flatten)]
    pub totals: CompositeRecord,
    #[serde(
        rename = "Bands",
        with = "ordered_map",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub bands: Vec<(String, BandRecord)>,
}

impl CompositeDocument {
    /// Describe just the final curves of a composition.
    pub fn from_totals(axis: &DistanceAxis, totals: &CompositeDistribution) -> Self {
        Self {
            distances: axis.distances().to_vec(),
            totals: CompositeRecord::from(totals),
            bands: Vec::new(),
        }
    }

    /// Describe the final curves of a composition and the band of every layer.
    pub fn from_composition(axis: &DistanceAxis, composition: &Composition) -> Self {
        Self {
            distances: axis.distances().to_vec(),
            totals: CompositeRecord::from(&composition.totals),
            bands: composition
                .bands
                .iter()
                .map(|band| {
                    (
                        band.name.clone(),
                        BandRecord {
                            previous: CompositeRecord::from(&band.previous),
                            accumulated: CompositeRecord::from(&band.accumulated),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Write this document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// * If writing fails.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Non-finite literals that are valid outside of JSON strings in Python's `json` dialect.
/// `-Infinity` comes first so it isn't read as a minus followed by `Infinity`.
const BARE_LITERALS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

/// Put quotes around every bare non-finite literal outside of strings, turning
/// `[1.0, Infinity]` into `[1.0, "Infinity"]`.
fn quote_named_literals(text: &str) -> Cow<'_, str> {
    if !BARE_LITERALS.iter().any(|literal| text.contains(literal)) {
        return Cow::Borrowed(text);
    }
    let mut quoted = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if let Some(literal) = BARE_LITERALS
            .iter()
            .find(|literal| rest.starts_with(**literal))
        {
            quoted.push('"');
            quoted.push_str(literal);
            quoted.push('"');
            rest = &rest[literal.len()..];
            continue;
        }
        quoted.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Cow::Owned(quoted)
}

/// Sort JSON errors into document problems and I/O problems.
fn classify(err: serde_json::Error) -> DistributionError {
    match err.classify() {
        Category::Io => DistributionError::Json(err),
        Category::Syntax | Category::Data | Category::Eof => {
            DistributionError::MalformedDocument(err.to_string())
        }
    }
}

/// (De)serialize a list of floats, writing non-finite values as named literals.
mod named_floats {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum NamedFloat {
        Number(f64),
        Named(String),
    }

    impl From<f64> for NamedFloat {
        fn from(value: f64) -> Self {
            if value.is_finite() {
                Self::Number(value)
            } else if value.is_nan() {
                Self::Named("NaN".to_owned())
            } else if value.is_sign_positive() {
                Self::Named("Infinity".to_owned())
            } else {
                Self::Named("-Infinity".to_owned())
            }
        }
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(values: &Vec<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&value| NamedFloat::from(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<NamedFloat>::deserialize(deserializer)?
            .into_iter()
            .map(|value| match value {
                NamedFloat::Number(number) => Ok(number),
                NamedFloat::Named(name) => match name.as_str() {
                    "Infinity" => Ok(f64::INFINITY),
                    "-Infinity" => Ok(f64::NEG_INFINITY),
                    "NaN" => Ok(f64::NAN),
                    _ => Err(de::Error::custom(format!(
                        "unknown floating point literal \"{name}\""
                    ))),
                },
            })
            .collect()
    }
}

/// (De)serialize a JSON object as a list of entries, keeping the key order.
mod ordered_map {
    use std::{fmt, marker::PhantomData};

    use serde::{
        de::{MapAccess, Visitor},
        Deserialize, Deserializer, Serialize, Serializer,
    };

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping layer names to their data")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
