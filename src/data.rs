use crate::config::AppConfig;
use crate::error::{DataError, DataResult};
use crate::topology::Topology;
use crate::types::EducationRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Copies shipped inside the binary, used when neither the remote endpoint
/// nor a configured fallback file yields usable data.
pub static BUNDLED_TOPOLOGY: &str = include_str!("../data/counties.json");
pub static BUNDLED_EDUCATION: &str = include_str!("../data/for_user_education.json");

pub const TOPOLOGY_FILE: &str = "counties.json";
pub const EDUCATION_FILE: &str = "for_user_education.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    File,
    Bundled,
}

#[derive(Debug, Clone)]
pub struct Datasets {
    pub topology: Topology,
    pub education: Vec<EducationRecord>,
    pub topology_source: Source,
    pub education_source: Source,
}

/// Below this share of counties with a record, a remote dataset and a bundled
/// one are treated as unrelated.
const MIN_JOIN_COVERAGE: f64 = 0.5;

/// Fetches the topology and then the education records. The second request
/// starts only after the first has settled.
pub async fn load_datasets(config: &AppConfig) -> DataResult<Datasets> {
    info!("Loading data...");

    let client = build_client(config)?;

    let (mut topology, mut topology_source) = acquire(
        &client,
        "topology",
        &config.input.topology_url,
        config.input.topology_fallback.as_deref(),
        BUNDLED_TOPOLOGY,
        validate_topology,
    )
    .await?;

    let (mut education, mut education_source) = acquire(
        &client,
        "education",
        &config.input.education_url,
        config.input.education_fallback.as_deref(),
        BUNDLED_EDUCATION,
        validate_education,
    )
    .await?;

    // A bundled copy only joins cleanly against its bundled partner.
    if (topology_source == Source::Bundled) != (education_source == Source::Bundled) {
        let covered = coverage(&topology, &education)?;
        if covered < MIN_JOIN_COVERAGE {
            warn!(coverage = covered, "Datasets do not join, using the bundled pair");
            if topology_source == Source::Bundled {
                education = serde_json::from_str(BUNDLED_EDUCATION)?;
                education_source = Source::Bundled;
            } else {
                topology = Topology::from_slice(BUNDLED_TOPOLOGY.as_bytes())?;
                topology_source = Source::Bundled;
            }
        }
    }

    info!(
        arcs = topology.arcs.len(),
        records = education.len(),
        ?topology_source,
        ?education_source,
        "Datasets loaded"
    );

    Ok(Datasets {
        topology,
        education,
        topology_source,
        education_source,
    })
}

/// Downloads both remote datasets into `dir` under the bundled file names, so
/// the next build embeds them as the fallback copies.
pub async fn vendor_datasets(config: &AppConfig, dir: &Path) -> DataResult<()> {
    let client = build_client(config)?;

    let topology = fetch_bytes(&client, &config.input.topology_url).await?;
    validate_topology(&Topology::from_slice(&topology)?)?;
    let education = fetch_bytes(&client, &config.input.education_url).await?;
    validate_education(&serde_json::from_slice(&education)?)?;

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(TOPOLOGY_FILE), &topology).await?;
    tokio::fs::write(dir.join(EDUCATION_FILE), &education).await?;
    info!(dir = ?dir, topology_bytes = topology.len(), education_bytes = education.len(), "Datasets vendored");
    Ok(())
}

fn build_client(config: &AppConfig) -> DataResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.input.timeout_secs))
        .build()?)
}

/// A topology is usable only if it decodes and has at least one county.
fn validate_topology(topology: &Topology) -> DataResult<()> {
    if topology.decode()?.counties.is_empty() {
        return Err(DataError::Topology("no county geometries".to_string()));
    }
    Ok(())
}

fn validate_education(records: &Vec<EducationRecord>) -> DataResult<()> {
    if records.is_empty() {
        return Err(DataError::Topology("no education records".to_string()));
    }
    Ok(())
}

fn coverage(topology: &Topology, education: &[EducationRecord]) -> DataResult<f64> {
    let counties = topology.counties()?;
    if counties.is_empty() {
        return Ok(0.0);
    }
    let ids: HashSet<u32> = education.iter().map(|r| r.fips).collect();
    let matched = counties.iter().filter(|c| ids.contains(&c.fips)).count();
    Ok(matched as f64 / counties.len() as f64)
}

async fn acquire<T: DeserializeOwned>(
    client: &reqwest::Client,
    dataset: &str,
    url: &str,
    fallback: Option<&Path>,
    bundled: &str,
    validate: fn(&T) -> DataResult<()>,
) -> DataResult<(T, Source)> {
    match fetch_json::<T>(client, url).await.and_then(|value| validate(&value).map(|_| value)) {
        Ok(value) => return Ok((value, Source::Remote)),
        Err(e) => warn!(dataset, url, error = %e, "Remote fetch failed, using fallback data"),
    }

    if let Some(path) = fallback {
        match read_json::<T>(path).await.and_then(|value| validate(&value).map(|_| value)) {
            Ok(value) => return Ok((value, Source::File)),
            Err(e) => warn!(dataset, path = ?path, error = %e, "Fallback file unusable, using bundled copy"),
        }
    }

    let value: T = serde_json::from_str(bundled)?;
    validate(&value)?;
    Ok((value, Source::Bundled))
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> DataResult<Vec<u8>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DataError::Status(status));
    }
    Ok(response.bytes().await?.to_vec())
}

async fn fetch_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> DataResult<T> {
    let body = fetch_bytes(client, url).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> DataResult<T> {
    let body = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Education records keyed by FIPS id.
#[derive(Debug, Clone, Default)]
pub struct EducationIndex {
    records: HashMap<u32, EducationRecord>,
}

impl EducationIndex {
    pub fn new(records: Vec<EducationRecord>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            if map.contains_key(&record.fips) {
                warn!(fips = record.fips, "Duplicate education record ignored");
                continue;
            }
            map.insert(record.fips, record);
        }
        Self { records: map }
    }

    pub fn get(&self, fips: u32) -> Option<&EducationRecord> {
        self.records.get(&fips)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn percentages(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.values().map(|r| r.bachelors_or_higher)
    }
}
