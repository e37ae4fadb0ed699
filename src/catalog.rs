//! TIC catalog lookup with an on-disk CSV cache.
//! Queries the MAST portal (Mast.Catalogs.Tic.Cone) for stars around the field
//! center, keeps those brighter than the magnitude cutoff and caches them as
//! `<data>/<field>.csv` so later runs skip the network entirely.
//! A stale cache has to be deleted by hand.
//! Latency: a cone of ~5 arcmin is a single page, 1-5s depending on MAST load.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Field;
use crate::geometry::SkyPoint;

const API_URL: &str = "https://mast.stsci.edu/api/v0/invoke";
const SERVICE: &str = "Mast.Catalogs.Tic.Cone";
const PAGE_SIZE: u32 = 50_000;
const MAX_POLLS: u32 = 30; // MAST answers EXECUTING until the query finishes
const POLL_DELAY_MS: u64 = 1000;

/// Star as kept in the cache and plotted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    pub ra: f64,
    pub dec: f64,
    pub mag: f64,
}

/// Raw catalog row. Not every TIC entry has a GAIA magnitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatalogEntry {
    pub ra: f64,
    pub dec: f64,
    pub gaia_mag: Option<f64>,
}

/// Anything that can answer a cone search.
pub trait CatalogService {
    async fn query_region(&self, center: SkyPoint, radius_deg: f64) -> Result<Vec<CatalogEntry>>;
}

// *************** MAST Request/Response Types ***************

#[derive(Serialize)]
struct MastRequest {
    service: &'static str,
    format: &'static str,
    params: ConeParams,
    pagesize: u32,
    page: u32,
}

#[derive(Serialize)]
struct ConeParams {
    ra: f64,
    dec: f64,
    radius: f64,
}

#[derive(Deserialize)]
struct MastResponse {
    status: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<MastRow>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct MastRow {
    ra: Option<f64>,
    dec: Option<f64>,
    #[serde(rename = "GAIAmag")]
    gaia_mag: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    #[serde(default)]
    pages_filtered: u32,
}

// *************** MAST Client ***************

pub struct MastCatalog {
    client: Client,
    url: String,
}

impl MastCatalog {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: API_URL.to_string(),
        })
    }

    async fn fetch_page(&self, request: &MastRequest) -> Result<MastResponse> {
        let body = serde_json::to_string(request).context("Failed to encode MAST request")?;

        for poll in 1..=MAX_POLLS {
            let response = self
                .client
                .post(&self.url)
                .form(&[("request", body.as_str())])
                .send()
                .await
                .context("Failed to send request to MAST")?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                bail!("MAST API error {}: {}", status, text);
            }

            let parsed: MastResponse = response
                .json()
                .await
                .context("Failed to parse MAST response")?;

            match parsed.status.as_str() {
                "EXECUTING" => {
                    debug!("MAST still executing (poll {}/{})", poll, MAX_POLLS);
                    tokio::time::sleep(Duration::from_millis(POLL_DELAY_MS)).await;
                }
                "ERROR" => bail!(
                    "MAST query failed: {}",
                    parsed.msg.as_deref().unwrap_or("no message")
                ),
                _ => return Ok(parsed),
            }
        }

        bail!("MAST query still executing after {} polls", MAX_POLLS)
    }
}

impl CatalogService for MastCatalog {
    async fn query_region(&self, center: SkyPoint, radius_deg: f64) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let request = MastRequest {
                service: SERVICE,
                format: "json",
                params: ConeParams {
                    ra: center.x,
                    dec: center.y,
                    radius: radius_deg,
                },
                pagesize: PAGE_SIZE,
                page,
            };
            let response = self.fetch_page(&request).await?;

            entries.extend(response.data.into_iter().filter_map(|row| {
                Some(CatalogEntry {
                    ra: row.ra?,
                    dec: row.dec?,
                    gaia_mag: row.gaia_mag,
                })
            }));

            let pages = response.paging.map_or(1, |p| p.pages_filtered);
            if page >= pages {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }
}

// *************** Cache Lookup ***************

/// Returns the stars for `field`, from `cache_path` if it exists, otherwise
/// from `service` (the result is then written to `cache_path`).
pub async fn lookup<S: CatalogService>(service: &S, field: &Field, cache_path: &Path) -> Result<Vec<StarRecord>> {
    if cache_path.is_file() {
        info!(
            "Legacy region file found for field {}. We will use the legacy file; if this is not what you want, delete {}",
            field.name,
            cache_path.display()
        );
        return read_cache(cache_path);
    }

    info!("No region file found for field {}. We will query MAST.", field.name);
    let entries = service
        .query_region(field.center, field.search_radius_deg)
        .await
        .with_context(|| format!("Failed to query TIC around field {}", field.name))?;

    let stars = brighter_than(&entries, field.magnitude_cutoff);
    info!(
        "TIC returned {} stars, {} brighter than magnitude {}",
        entries.len(),
        stars.len(),
        field.magnitude_cutoff
    );

    write_cache(cache_path, &stars)?;
    Ok(stars.into_iter().map(|(_, star)| star).collect())
}

/// Keeps entries with a GAIA magnitude strictly below `cutoff`, paired with
/// their row number in the query result.
fn brighter_than(entries: &[CatalogEntry], cutoff: f64) -> Vec<(usize, StarRecord)> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(row, entry)| {
            let mag = entry.gaia_mag.filter(|mag| *mag < cutoff)?;
            Some((
                row,
                StarRecord {
                    ra: entry.ra,
                    dec: entry.dec,
                    mag,
                },
            ))
        })
        .collect()
}

fn cache_tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes `,ra,dec,mag` with the query row number as the leading index column.
/// Rows go to `<path>.tmp` first, which is renamed over `path` once complete.
fn write_cache(path: &Path, stars: &[(usize, StarRecord)]) -> Result<()> {
    let tmp = cache_tmp_path(path);
    let mut writer = csv::Writer::from_path(&tmp)
        .with_context(|| format!("Failed to create catalog cache {}", tmp.display()))?;

    writer.write_record(["", "ra", "dec", "mag"])?;
    for (row, star) in stars {
        writer.write_record([
            row.to_string(),
            star.ra.to_string(),
            star.dec.to_string(),
            star.mag.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write catalog cache {}", tmp.display()))?;
    drop(writer);

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} to {}", tmp.display(), path.display()))
}

/// Reads a cache file, locating the columns by header and ignoring the index.
pub fn read_cache(path: &Path) -> Result<Vec<StarRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open catalog cache {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .with_context(|| format!("Catalog cache {} has no '{}' column", path.display(), name))
    };
    let (ra_col, dec_col, mag_col) = (column("ra")?, column("dec")?, column("mag")?);

    let mut stars = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed row {} in {}", line + 1, path.display()))?;
        let field = |col: usize| -> Result<f64> {
            record
                .get(col)
                .unwrap_or_default()
                .trim()
                .parse()
                .with_context(|| format!("Bad number in row {} of {}", line + 1, path.display()))
        };
        stars.push(StarRecord {
            ra: field(ra_col)?,
            dec: field(dec_col)?,
            mag: field(mag_col)?,
        });
    }

    Ok(stars)
}
